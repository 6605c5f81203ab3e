//! Filename hygiene for untrusted uploads.
//!
//! Uploaded filenames may carry directory components, traversal sequences, or
//! control characters. Everything here reduces them to a safe basename before
//! any path is built from them.

/// Reduce an untrusted filename to a safe basename.
///
/// Directory components (both separator styles) are discarded, unsafe
/// characters are replaced with underscores, and leading dots are stripped so
/// the result can never be hidden or traverse upward. Returns `None` when
/// nothing usable remains.
#[must_use]
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let basename = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    let cleaned: String = basename
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() || cleaned.chars().all(|ch| ch == '_' || ch == '.') {
        return None;
    }
    Some(cleaned)
}

/// Split a sanitized filename into `(stem, lowercased extension)`.
///
/// A missing extension yields an empty string.
#[must_use]
pub fn split_stem(name: &str) -> (String, String) {
    name.rsplit_once('.').map_or_else(
        || (name.to_string(), String::new()),
        |(stem, ext)| (stem.to_string(), ext.to_ascii_lowercase()),
    )
}

/// Build an output filename from a stem and new extension.
#[must_use]
pub fn derived_file_name(stem: &str, extension: &str) -> String {
    format!("{stem}.{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_pass_through() {
        assert_eq!(
            sanitize_file_name("report.pdf").as_deref(),
            Some("report.pdf")
        );
    }

    #[test]
    fn traversal_reduces_to_basename() {
        assert_eq!(
            sanitize_file_name("../../etc/passwd.pdf").as_deref(),
            Some("passwd.pdf")
        );
        assert_eq!(
            sanitize_file_name("C:\\Users\\victim\\doc.pdf").as_deref(),
            Some("doc.pdf")
        );
    }

    #[test]
    fn unsafe_characters_become_underscores() {
        assert_eq!(
            sanitize_file_name("my report (final).pdf").as_deref(),
            Some("my_report__final_.pdf")
        );
    }

    #[test]
    fn hidden_and_empty_names_are_rejected() {
        assert!(sanitize_file_name("").is_none());
        assert!(sanitize_file_name("..").is_none());
        assert!(sanitize_file_name("...").is_none());
        assert!(sanitize_file_name("///").is_none());
        assert_eq!(sanitize_file_name(".bashrc").as_deref(), Some("bashrc"));
    }

    #[test]
    fn split_stem_lowercases_extension() {
        assert_eq!(
            split_stem("Report.PDF"),
            ("Report".to_string(), "pdf".to_string())
        );
        assert_eq!(split_stem("noext"), ("noext".to_string(), String::new()));
    }

    #[test]
    fn derived_name_appends_extension() {
        assert_eq!(derived_file_name("report", "docx"), "report.docx");
    }
}
