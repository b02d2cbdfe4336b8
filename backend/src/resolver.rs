//! Column name resolution.
//!
//! Two matching modes are used across the crate:
//!
//! - [`resolve`]: trimmed, case-insensitive. Used for every Template lookup.
//! - [`resolve_normalized`]: additionally ignores spaces and line breaks
//!   anywhere in the header. Used for reference-sheet headers in validation,
//!   where headers are often typed by hand with stray spacing.

/// Find the first column equal to `name` after trimming and lowercasing both.
///
/// Internal whitespace is significant: `"Last Name"` does not match
/// `"lastname"`.
pub fn resolve<'a>(name: &str, columns: &'a [String]) -> Option<&'a str> {
    let wanted = name.trim().to_lowercase();
    columns
        .iter()
        .find(|col| col.trim().to_lowercase() == wanted)
        .map(String::as_str)
}

/// Header normalization: trimmed, lowercased, spaces and newlines removed.
pub fn normalize_header(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .filter(|c| *c != ' ' && *c != '\n' && *c != '\r')
        .collect()
}

/// Find the first column whose normalized header equals the normalized `name`.
pub fn resolve_normalized<'a>(name: &str, columns: &'a [String]) -> Option<&'a str> {
    let wanted = normalize_header(name);
    columns
        .iter()
        .find(|col| normalize_header(col) == wanted)
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_resolve_case_insensitive() {
        let columns = cols(&["Last Name", "id"]);
        assert_eq!(resolve("ID", &columns), Some("id"));
        assert_eq!(resolve("  last name ", &columns), Some("Last Name"));
    }

    #[test]
    fn test_resolve_keeps_internal_whitespace() {
        let columns = cols(&["Last Name", "id"]);
        assert_eq!(resolve("lastname", &columns), None);
    }

    #[test]
    fn test_resolve_first_match_wins() {
        let columns = cols(&["Code", " code "]);
        assert_eq!(resolve("CODE", &columns), Some("Code"));
    }

    #[test]
    fn test_resolve_normalized_ignores_spaces() {
        let columns = cols(&["Country\nCode", "Label"]);
        assert_eq!(resolve_normalized("country code", &columns), Some("Country\nCode"));
        assert_eq!(normalize_header(" Sales Org "), "salesorg");
    }
}
