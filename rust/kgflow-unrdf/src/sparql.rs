//! Safe IRI interpolation for SPARQL templates.
//!
//! IRI arguments are always formatted inside `<...>`; characters that
//! could break out of that syntax are percent-encoded, and the scheme
//! prefix is validated against RFC 3986 (`ALPHA *(ALPHA / DIGIT / "+" /
//! "-" / ".") ":"`).

use crate::error::{UnrdfError, UnrdfResult};

const INJECTION_CHARS: [char; 8] = ['<', '>', '"', '\'', '\\', '\n', '\r', '\t'];

/// Escape an IRI for interpolation into a SPARQL query.
///
/// Control characters and angle brackets are percent-encoded; an IRI
/// without a valid scheme is rejected outright.
pub fn escape_sparql_iri(iri: &str) -> UnrdfResult<String> {
    let escaped: String = if iri.chars().any(|c| INJECTION_CHARS.contains(&c)) {
        iri.chars()
            .flat_map(|c| {
                if INJECTION_CHARS.contains(&c) || c == ' ' {
                    let mut buf = [0u8; 4];
                    c.encode_utf8(&mut buf)
                        .bytes()
                        .map(|b| format!("%{b:02X}"))
                        .collect::<Vec<_>>()
                } else {
                    vec![c.to_string()]
                }
            })
            .collect()
    } else {
        iri.to_string()
    };

    if !has_valid_scheme(&escaped) {
        return Err(UnrdfError::Validation(format!(
            "invalid IRI scheme: {}",
            &escaped.chars().take(50).collect::<String>()
        )));
    }
    Ok(escaped)
}

/// Format an IRI for SPARQL, escaped and wrapped in angle brackets
pub fn sparql_iri(iri: &str) -> UnrdfResult<String> {
    Ok(format!("<{}>", escape_sparql_iri(iri)?))
}

fn has_valid_scheme(iri: &str) -> bool {
    let mut chars = iri.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    for c in chars {
        if c == ':' {
            return true;
        }
        if !(c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.') {
            return false;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("urn:task:test", "<urn:task:test>"; "plain urn")]
    #[test_case("http://example.org/x", "<http://example.org/x>"; "http iri")]
    fn formats_valid_iris(input: &str, expected: &str) {
        assert_eq!(sparql_iri(input).unwrap(), expected);
    }

    #[test]
    fn escapes_injection_characters() {
        let escaped = escape_sparql_iri("urn:task:a>b").unwrap();
        assert!(!escaped.contains('>'));
        assert!(escaped.contains("%3E"));
    }

    #[test]
    fn escapes_quotes_and_newlines() {
        let escaped = escape_sparql_iri("urn:x:\"}\nASK").unwrap();
        assert!(!escaped.contains('"'));
        assert!(!escaped.contains('\n'));
    }

    #[test_case("no-scheme-at-all"; "missing colon")]
    #[test_case("9urn:task"; "digit-leading scheme")]
    #[test_case(""; "empty")]
    fn rejects_invalid_schemes(input: &str) {
        assert!(escape_sparql_iri(input).is_err());
    }
}
