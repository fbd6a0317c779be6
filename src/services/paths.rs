//! Path arithmetic for the emulated directory tree.
//!
//! Item identifiers look like absolute paths (`/docs/report.txt`); store
//! pathnames never carry a leading slash. Everything in this module is pure
//! string manipulation — no store access — so the mutation operations all
//! agree on how an identifier maps to a key or prefix.

/// Canonical store prefix for a folder identifier.
///
/// Strips all leading slashes and guarantees exactly one trailing slash for
/// non-empty results. `""` and `"/"` both denote the store root and map to
/// the empty prefix. Idempotent.
pub fn normalize_prefix(id: &str) -> String {
    let trimmed = id.trim_start_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    }
}

/// Identifier with leading and trailing slashes removed — the exact store
/// key for a file, or the folder prefix minus its trailing slash.
pub fn clean_id(id: &str) -> &str {
    id.trim_start_matches('/').trim_end_matches('/')
}

/// Last path segment of an identifier (empty for the root).
pub fn leaf_name(id: &str) -> &str {
    let clean = clean_id(id);
    clean.rsplit('/').next().unwrap_or(clean)
}

/// Everything before the last segment of a clean identifier, without a
/// trailing slash. `"a/b/c"` -> `"a/b"`, `"a"` -> `""`.
pub fn parent_of(clean: &str) -> &str {
    match clean.rfind('/') {
        Some(pos) => &clean[..pos],
        None => "",
    }
}

/// Identifier of `name` created under `parent_id`, in UI form.
pub fn child_id(parent_id: &str, name: &str) -> String {
    let parent = clean_id(parent_id);
    if parent.is_empty() {
        format!("/{}", name)
    } else {
        format!("/{}/{}", parent, name)
    }
}

/// Validate a user-supplied leaf name and return it trimmed.
///
/// Separators, null bytes and dot segments are rejected before any store
/// interaction happens; a name that passed this check can be appended to a
/// prefix without escaping the parent folder.
pub fn validate_name(raw: &str) -> Result<String, &'static str> {
    if raw.contains('/') || raw.contains('\\') {
        return Err("contains a path separator");
    }
    if raw.contains('\0') {
        return Err("contains a null byte");
    }
    let name = raw.trim();
    if name.is_empty() {
        return Err("cannot be empty");
    }
    if name == "." || name == ".." {
        return Err("cannot be a dot segment");
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        for id in ["", "/", "//", "/a", "a/", "//a/b", "/a/b/c"] {
            let once = normalize_prefix(id);
            assert_eq!(normalize_prefix(&once), once, "id = {:?}", id);
        }
    }

    #[test]
    fn root_spellings_normalize_to_empty_prefix() {
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix("//"), "");
    }

    #[test]
    fn prefix_gets_exactly_one_trailing_slash() {
        assert_eq!(normalize_prefix("/a/b"), "a/b/");
        assert_eq!(normalize_prefix("a/b/"), "a/b/");
        assert_eq!(normalize_prefix("///a"), "a/");
    }

    #[test]
    fn clean_and_leaf() {
        assert_eq!(clean_id("/a/b/"), "a/b");
        assert_eq!(clean_id("/"), "");
        assert_eq!(leaf_name("/a/b/c.txt"), "c.txt");
        assert_eq!(leaf_name("/a"), "a");
        assert_eq!(leaf_name("/"), "");
    }

    #[test]
    fn parent_and_child() {
        assert_eq!(parent_of("a/b/c"), "a/b");
        assert_eq!(parent_of("a"), "");
        assert_eq!(child_id("/", "x"), "/x");
        assert_eq!(child_id("", "x"), "/x");
        assert_eq!(child_id("/docs", "x"), "/docs/x");
    }

    #[test]
    fn validate_name_accepts_ordinary_names() {
        assert_eq!(validate_name("report.txt").unwrap(), "report.txt");
        assert_eq!(validate_name("  padded  ").unwrap(), "padded");
        assert_eq!(validate_name("...").unwrap(), "...");
    }

    #[test]
    fn validate_name_rejects_traversal() {
        assert!(validate_name("..").is_err());
        assert!(validate_name(" .. ").is_err());
        assert!(validate_name(".").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name("a\\b").is_err());
        assert!(validate_name("a\0b").is_err());
        assert!(validate_name("").is_err());
        assert!(validate_name("   ").is_err());
    }
}
