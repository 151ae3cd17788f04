//! Rendered document validation.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::document::Document;
use crate::error::{TemplateError, TemplateResult};

const DNS1123_LABEL_FMT: &str = "[a-z0-9]([-a-z0-9]*[a-z0-9])?";
const DNS1123_SUBDOMAIN_MAX_LENGTH: usize = 253;
const DNS1123_SUBDOMAIN_ERROR_MSG: &str = "a lowercase RFC 1123 subdomain must consist of lower case alphanumeric characters, '-' or '.', and must start and end with an alphanumeric character";

fn dns1123_subdomain_fmt() -> String {
    format!("{0}(\\.{0})*", DNS1123_LABEL_FMT)
}

fn dns1123_subdomain_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!("^{}$", dns1123_subdomain_fmt()))
            .expect("DNS-1123 subdomain pattern is a valid regex")
    })
}

/// Check `value` against the RFC 1123 subdomain rules. Returns the list of
/// rule violations, empty when valid.
pub fn dns1123_subdomain_violations(value: &str) -> Vec<String> {
    let mut violations = Vec::new();
    if value.len() > DNS1123_SUBDOMAIN_MAX_LENGTH {
        violations.push(format!(
            "must be no more than {} characters",
            DNS1123_SUBDOMAIN_MAX_LENGTH
        ));
    }
    if !dns1123_subdomain_regex().is_match(value) {
        violations.push(format!(
            "{} (e.g. 'example.com', regex used for validation is '{}')",
            DNS1123_SUBDOMAIN_ERROR_MSG,
            dns1123_subdomain_fmt()
        ));
    }
    violations
}

/// Check the `metadata.name` of every rendered document, stopping at the
/// first invalid one.
pub fn validate_rendered_templates(docs: &[Vec<u8>]) -> TemplateResult<()> {
    for (index, bytes) in docs.iter().enumerate() {
        let doc = Document::from_yaml(bytes)
            .map_err(|e| e.context(format!("decoding rendered document {}", index)))?;
        let violations = dns1123_subdomain_violations(doc.name());
        if !violations.is_empty() {
            return Err(TemplateError::InvalidName {
                name: doc.name().to_string(),
                violations,
            });
        }
    }
    debug!(count = docs.len(), "Validated rendered templates");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> Vec<u8> {
        format!("kind: ConfigMap\nmetadata:\n  name: {:?}\n", name).into_bytes()
    }

    #[test]
    fn test_dns1123_subdomain() {
        let valid = ["hi", "a", "a-b.c-d", "0.9", "test-cluster.example.com"];
        for name in valid {
            assert!(dns1123_subdomain_violations(name).is_empty(), "name: {}", name);
        }
        let invalid = ["", "h i", "Hi", "-a", "a-", "a..b", ".a", "a_b"];
        for name in invalid {
            assert_eq!(dns1123_subdomain_violations(name).len(), 1, "name: {}", name);
        }
    }

    #[test]
    fn test_too_long() {
        let name = "a".repeat(254);
        let violations = dns1123_subdomain_violations(&name);
        assert_eq!(violations, vec!["must be no more than 253 characters".to_string()]);
        assert!(dns1123_subdomain_violations(&"a".repeat(253)).is_empty());
    }

    #[test]
    fn test_validate_rendered_templates() {
        assert!(validate_rendered_templates(&[named("hi"), named("there")]).is_ok());
        assert!(validate_rendered_templates(&[]).is_ok());

        let err = validate_rendered_templates(&[named("hi"), named("h i")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value for metadata.name: \"h i\", a lowercase RFC 1123 subdomain must consist of lower case alphanumeric characters, '-' or '.', and must start and end with an alphanumeric character (e.g. 'example.com', regex used for validation is '[a-z0-9]([-a-z0-9]*[a-z0-9])?(\\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*')"
        );
    }

    #[test]
    fn test_validate_stops_at_first_failure() {
        let err = validate_rendered_templates(&[named("Bad"), b"not: [valid".to_vec()]).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidName { ref name, .. } if name == "Bad"));
    }

    #[test]
    fn test_validate_decode_failure() {
        let err = validate_rendered_templates(&[b"metadata:\n  name: x\n".to_vec()]).unwrap_err();
        assert!(err.to_string().contains("Object 'Kind' is missing"));
    }
}
