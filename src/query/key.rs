//! Composite key encoding used by `_key(index, key, ...)`.
//!
//! Components are joined with `~`. A component may contain a reserved
//! character when it is backslash-escaped, or any non-alphanumeric character
//! as a `*XXXX` escape holding its four-digit hex code point.

use crate::error::GrammarError;

const SEPARATOR: char = '~';

fn is_reserved(c: char) -> bool {
    matches!(c, '~' | ',' | '\\' | '*')
}

/// Join key components, escaping reserved characters
pub fn encode<S: AsRef<str>>(parts: &[S]) -> String {
    let mut out = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            out.push(SEPARATOR);
        }
        for c in part.as_ref().chars() {
            if is_reserved(c) {
                out.push('\\');
            }
            out.push(c);
        }
    }
    out
}

fn hex_escape(chars: &[char]) -> Option<char> {
    if chars.len() < 4 || !chars[..4].iter().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let code: String = chars[..4].iter().collect();
    u32::from_str_radix(&code, 16).ok().and_then(char::from_u32)
}

/// Split an encoded key into exactly `arity` non-empty components
pub fn decode(index: &str, key: &str, arity: usize) -> Result<Vec<String>, GrammarError> {
    let chars: Vec<char> = key.chars().collect();
    let mut parts = vec![String::new()];
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                let escaped = chars.get(i + 1).ok_or_else(|| GrammarError::InvalidKeyEscape {
                    key: key.to_string(),
                })?;
                push(&mut parts, *escaped);
                i += 2;
            }
            '*' => match hex_escape(&chars[i + 1..]) {
                Some(decoded) => {
                    push(&mut parts, decoded);
                    i += 5;
                }
                None => {
                    push(&mut parts, c);
                    i += 1;
                }
            },
            SEPARATOR => {
                parts.push(String::new());
                i += 1;
            }
            _ => {
                push(&mut parts, c);
                i += 1;
            }
        }
    }

    if parts.len() != arity {
        return Err(GrammarError::KeyArity {
            index: index.to_string(),
            key: key.to_string(),
            expected: arity,
            found: parts.len(),
        });
    }
    if parts.iter().any(String::is_empty) {
        return Err(GrammarError::EmptyKeyComponent {
            index: index.to_string(),
            key: key.to_string(),
        });
    }
    Ok(parts)
}

fn push(parts: &mut [String], c: char) {
    if let Some(last) = parts.last_mut() {
        last.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_simple() {
        assert_eq!(decode("pk", "a~1", 2).unwrap(), vec!["a", "1"]);
        assert_eq!(decode("pk", "ALFKI", 1).unwrap(), vec!["ALFKI"]);
    }

    #[test]
    fn test_decode_escapes() {
        assert_eq!(decode("pk", r"a\~b~1", 2).unwrap(), vec!["a~b", "1"]);
        assert_eq!(decode("pk", "a*007Eb~1", 2).unwrap(), vec!["a~b", "1"]);
        // `*` not followed by four hex digits is literal
        assert_eq!(decode("pk", "a*b~1", 2).unwrap(), vec!["a*b", "1"]);
    }

    #[test]
    fn test_decode_arity() {
        assert_eq!(
            decode("pk", "a~1~x", 2),
            Err(GrammarError::KeyArity {
                index: "pk".into(),
                key: "a~1~x".into(),
                expected: 2,
                found: 3,
            })
        );
        assert!(matches!(
            decode("pk", "a", 2),
            Err(GrammarError::KeyArity { found: 1, .. })
        ));
    }

    #[test]
    fn test_decode_empty_component() {
        assert!(matches!(
            decode("pk", "a~", 2),
            Err(GrammarError::EmptyKeyComponent { .. })
        ));
        assert!(matches!(
            decode("pk", r"a\", 1),
            Err(GrammarError::InvalidKeyEscape { .. })
        ));
    }

    #[test]
    fn test_encode_decode() {
        let parts = ["a~b", "x,y", r"c\d", "5*"];
        let encoded = encode(&parts);
        assert_eq!(encoded, r"a\~b~x\,y~c\\d~5\*");
        assert_eq!(decode("pk", &encoded, 4).unwrap(), parts);
    }
}
