//! Small shared helpers
//!
//! Currently just filename sanitization for names that arrive from
//! untrusted sources (HTTP headers, URL paths) and end up on the local
//! filesystem.

use std::borrow::Cow;

/// Name used when sanitization leaves nothing usable.
pub(crate) const FALLBACK_FILENAME: &str = "download";

/// Reduce an externally supplied filename to a safe basename
///
/// Keeps only the last path segment, drops control characters and leading
/// dots, and falls back to `"download"` when nothing survives. Names that
/// are already clean come back borrowed.
///
/// # Examples
///
/// ```
/// use groundcrew::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("report.tar.gz"), "report.tar.gz");
/// assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
/// assert_eq!(sanitize_filename(".."), "download");
/// ```
#[must_use]
pub fn sanitize_filename(name: &str) -> Cow<'_, str> {
    let clean = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_control);
    if clean {
        return Cow::Borrowed(name);
    }

    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let filtered: String = base.chars().filter(|c| !c.is_control()).collect();
    let trimmed = filtered.trim_start_matches('.');
    if trimmed.is_empty() {
        Cow::Borrowed(FALLBACK_FILENAME)
    } else {
        Cow::Owned(trimmed.to_string())
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_clean_names_borrowed() {
        let sanitized = sanitize_filename("repo-1.2.3.tar.gz");
        assert_eq!(sanitized, "repo-1.2.3.tar.gz");
        assert!(matches!(sanitized, Cow::Borrowed(_)));
    }

    #[test]
    fn keeps_the_extension() {
        assert_eq!(sanitize_filename("bar.zip"), "bar.zip");
    }

    #[test]
    fn strips_directory_traversal() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("/etc/shadow"), "shadow");
    }

    #[test]
    fn strips_windows_separators() {
        assert_eq!(sanitize_filename(r"..\..\boot.ini"), "boot.ini");
    }

    #[test]
    fn strips_leading_dots() {
        assert_eq!(sanitize_filename(".hidden"), "hidden");
        assert_eq!(sanitize_filename("...name"), "name");
    }

    #[test]
    fn drops_control_characters() {
        assert_eq!(sanitize_filename("fi\u{0}le\nname"), "filename");
    }

    #[test]
    fn falls_back_when_nothing_survives() {
        assert_eq!(sanitize_filename(""), FALLBACK_FILENAME);
        assert_eq!(sanitize_filename(".."), FALLBACK_FILENAME);
        assert_eq!(sanitize_filename("dir/"), FALLBACK_FILENAME);
        assert_eq!(sanitize_filename("\u{1}\u{2}"), FALLBACK_FILENAME);
    }
}
