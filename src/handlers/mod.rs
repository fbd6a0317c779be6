pub mod fs_handlers;
pub mod health_handlers;
