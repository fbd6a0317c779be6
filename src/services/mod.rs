pub mod blob_store;
pub mod fs_service;
pub mod paths;
