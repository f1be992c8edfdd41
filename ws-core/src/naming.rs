//! Identity-derived names.
//!
//! Workspace names, cluster resource names and DNS labels are all built from
//! the same per-character rule ([`sanitize_label`]) so they stay aligned for a
//! given employee.

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use crate::employee::Employee;
use crate::error::{CoreError, Result};

/// Maximum length of a single DNS label.
pub const MAX_LABEL_LEN: usize = 63;

/// Longest workspace name; `<name>-secret` must still fit in one label.
pub const MAX_WORKSPACE_NAME_LEN: usize = MAX_LABEL_LEN - "-secret".len();

/// Reduce an identity field to a DNS-safe label.
///
/// Diacritics are stripped (`"José"` -> `"jose"`), everything outside
/// `[a-z0-9]` is dropped and the result is capped at 63 characters.
pub fn sanitize_label(input: &str) -> String {
    input
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .take(MAX_LABEL_LEN)
        .collect()
}

/// Workspace name for an employee, e.g. `ada-lovelace`.
///
/// Each whitespace-separated word of the first and last name is sanitized
/// with [`sanitize_label`] and the words are joined with hyphens.
pub fn workspace_name(employee: &Employee) -> Result<String> {
    let words: Vec<String> = employee
        .first_name
        .split_whitespace()
        .chain(employee.last_name.split_whitespace())
        .map(sanitize_label)
        .filter(|word| !word.is_empty())
        .collect();

    if words.is_empty() {
        return Err(CoreError::InvalidInput(format!(
            "employee {} has no usable name characters",
            employee.employee_id
        )));
    }

    let mut name = words.join("-");
    // Service names must begin with a letter.
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert_str(0, "ws-");
    }
    name.truncate(MAX_WORKSPACE_NAME_LEN);

    Ok(name.trim_end_matches('-').to_string())
}

/// Fully qualified workspace hostname: `<first>.<last>.<domain>`.
pub fn hostname(employee: &Employee, domain: &str) -> Result<String> {
    let first = sanitize_label(&employee.first_name);
    let last = sanitize_label(&employee.last_name);

    if first.is_empty() || last.is_empty() {
        return Err(CoreError::InvalidInput(format!(
            "cannot derive a DNS name for employee {}",
            employee.employee_id
        )));
    }

    Ok(format!("{first}.{last}.{}", domain.trim_end_matches('.')))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employee(first: &str, last: &str) -> Employee {
        Employee {
            employee_id: "emp-1".to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: "someone@example.com".to_string(),
            department: "Engineering".to_string(),
            role: "developer".to_string(),
        }
    }

    #[test]
    fn test_sanitize_strips_diacritics() {
        assert_eq!(sanitize_label("José"), "jose");
        assert_eq!(sanitize_label("Müller-Lüdenscheidt"), "mullerludenscheidt");
        assert_eq!(sanitize_label("Ørsted"), "rsted");
    }

    #[test]
    fn test_sanitize_drops_punctuation_and_spaces() {
        assert_eq!(sanitize_label("O'Neil"), "oneil");
        assert_eq!(sanitize_label("Mary Ann"), "maryann");
        assert_eq!(sanitize_label("R2 D2!"), "r2d2");
        assert_eq!(sanitize_label(""), "");
    }

    #[test]
    fn test_sanitize_truncates_to_label_limit() {
        let long = "a".repeat(200);
        let label = sanitize_label(&long);
        assert_eq!(label.len(), MAX_LABEL_LEN);
    }

    #[test]
    fn test_sanitize_is_deterministic_and_charset_bounded() {
        for input in ["Zoë", "İlkay", "Anne-Marie", "名前", "Ça va", "x".repeat(80).as_str()] {
            let a = sanitize_label(input);
            let b = sanitize_label(input);
            assert_eq!(a, b);
            assert!(a.len() <= MAX_LABEL_LEN);
            assert!(a.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_workspace_name() {
        assert_eq!(workspace_name(&employee("Ada", "Lovelace")).unwrap(), "ada-lovelace");
        assert_eq!(workspace_name(&employee("Mary Ann", "O'Neil")).unwrap(), "mary-ann-oneil");
        assert_eq!(workspace_name(&employee("José", "Núñez")).unwrap(), "jose-nunez");
    }

    #[test]
    fn test_workspace_name_fits_resource_suffixes() {
        let name = workspace_name(&employee(&"a".repeat(40), &"b".repeat(40))).unwrap();
        assert!(name.len() <= MAX_WORKSPACE_NAME_LEN);
        assert!(!name.ends_with('-'));
        assert!(format!("{name}-secret").len() <= MAX_LABEL_LEN);
    }

    #[test]
    fn test_workspace_name_starting_with_digit_gets_prefix() {
        assert_eq!(workspace_name(&employee("3rd", "Shift")).unwrap(), "ws-3rd-shift");
    }

    #[test]
    fn test_workspace_name_rejects_empty_identity() {
        assert!(workspace_name(&employee("!!", "  ")).is_err());
    }

    #[test]
    fn test_hostname() {
        assert_eq!(
            hostname(&employee("Ada", "Lovelace"), "innovatech.local").unwrap(),
            "ada.lovelace.innovatech.local"
        );
        assert_eq!(
            hostname(&employee("José", "Ñúñez"), "example.com.").unwrap(),
            "jose.nunez.example.com"
        );
        assert!(hostname(&employee("Ada", "---"), "example.com").is_err());
    }

    #[test]
    fn test_workspace_name_and_hostname_share_labels() {
        let e = employee("Zoë", "Brontë");
        let name = workspace_name(&e).unwrap();
        let host = hostname(&e, "example.com").unwrap();
        let labels: Vec<&str> = host.split('.').take(2).collect();
        assert_eq!(name, labels.join("-"));
    }
}
