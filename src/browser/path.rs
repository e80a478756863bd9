//! Virtual path to storage prefix mapping
//!
//! Listing prefixes travel as query parameters, so a literal `..` there is
//! just a key component. Staying inside the base directory relies on
//! [`normalize`] always re-prefixing with it. Single-object keys end up in
//! the request path, where URL handling collapses `.` and `..`; those keys
//! must pass [`has_relative_segments`] and [`is_within_base`].

/// Delimiter used for the virtual directory hierarchy
pub const DELIMITER: &str = "/";

/// Convert a virtual path into a storage prefix.
///
/// The result never starts or ends with `/`. With a base directory the
/// result is always rooted under it, whether or not the caller already
/// included it.
pub fn normalize(virtual_path: &str, base_directory: &str) -> String {
    let path = virtual_path.trim_matches('/');
    let base = base_directory.trim_matches('/');

    if base.is_empty() {
        return path.to_string();
    }

    let remainder = strip_base(path, base);
    join(base, remainder)
}

/// Storage prefix used as a listing boundary: the normalized path plus a
/// trailing delimiter, or empty for the bucket root.
pub fn listing_prefix(virtual_path: &str, base_directory: &str) -> String {
    let mut prefix = normalize(virtual_path, base_directory);
    if !prefix.is_empty() {
        prefix.push_str(DELIMITER);
    }
    prefix
}

/// Whether a fully-qualified key lies inside the base directory
pub fn is_within_base(key: &str, base_directory: &str) -> bool {
    let base = base_directory.trim_matches('/');
    if base.is_empty() {
        return true;
    }
    key.strip_prefix(base)
        .map(|rest| rest.starts_with('/') && rest.len() > 1)
        .unwrap_or(false)
}

/// Whether a key contains `.`, `..` or empty segments, which URL path
/// normalization would rewrite before the request reaches the store
pub fn has_relative_segments(key: &str) -> bool {
    key.split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
}

/// Last segment of a key, ignoring a trailing delimiter
pub fn file_name(key: &str) -> &str {
    let trimmed = key.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Remove `base` when it is the leading segment of `path`
fn strip_base<'a>(path: &'a str, base: &str) -> &'a str {
    match path.strip_prefix(base) {
        Some("") => "",
        Some(rest) if rest.starts_with('/') => &rest[1..],
        _ => path,
    }
}

fn join(base: &str, rest: &str) -> String {
    format!("{}/{}", base, rest).trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_paths() {
        assert_eq!(normalize("", ""), "");
        assert_eq!(normalize("/", ""), "");
        assert_eq!(listing_prefix("/", ""), "");
    }

    #[test]
    fn test_strips_slashes() {
        assert_eq!(normalize("/docs/2024/", ""), "docs/2024");
        assert_eq!(normalize("//docs//", ""), "docs");
        assert_eq!(listing_prefix("docs", ""), "docs/");
    }

    #[test]
    fn test_base_directory_prefixing() {
        assert_eq!(normalize("docs", "shared"), "shared/docs");
        assert_eq!(normalize("shared/docs", "shared"), "shared/docs");
        assert_eq!(normalize("/shared/docs/", "/shared/"), "shared/docs");
        assert_eq!(normalize("", "shared"), "shared");
        assert_eq!(normalize("shared", "shared"), "shared");
        assert_eq!(listing_prefix("/", "shared"), "shared/");
    }

    #[test]
    fn test_base_directory_matches_whole_segment() {
        assert_eq!(normalize("sharedfiles/x", "shared"), "shared/sharedfiles/x");
    }

    #[test]
    fn test_nested_base_directory() {
        assert_eq!(normalize("2024", "teams/finance"), "teams/finance/2024");
        assert_eq!(normalize("teams/finance/2024", "teams/finance"), "teams/finance/2024");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let paths = ["", "/", "a", "/a/", "//a//b//", "shared", "shared/x", "x/shared", "../up"];
        let bases = ["", "shared", "/shared/", "a/b"];

        for base in bases {
            for path in paths {
                let once = normalize(path, base);
                assert_eq!(normalize(&once, base), once, "path={:?} base={:?}", path, base);
                assert!(!once.starts_with('/'));
                assert!(!once.ends_with('/'));
            }
        }
    }

    #[test]
    fn test_dot_dot_stays_literal() {
        assert_eq!(normalize("../secrets", "shared"), "shared/../secrets");
    }

    #[test]
    fn test_is_within_base() {
        assert!(is_within_base("anything/at/all.txt", ""));
        assert!(is_within_base("shared/a.txt", "shared"));
        assert!(is_within_base("shared/a.txt", "/shared/"));
        assert!(!is_within_base("sharedfiles/a.txt", "shared"));
        assert!(!is_within_base("private/a.txt", "shared"));
        assert!(!is_within_base("shared", "shared"));
    }

    #[test]
    fn test_relative_segments() {
        assert!(has_relative_segments("shared/../private/a.txt"));
        assert!(has_relative_segments("shared/./a.txt"));
        assert!(has_relative_segments("shared//a.txt"));
        assert!(has_relative_segments("/shared/a.txt"));
        assert!(has_relative_segments(".."));
        assert!(!has_relative_segments("shared/a.txt"));
        assert!(!has_relative_segments("shared/..hidden/a...txt"));
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("a/b/report.pdf"), "report.pdf");
        assert_eq!(file_name("report.pdf"), "report.pdf");
        assert_eq!(file_name("a/b/"), "b");
    }
}
