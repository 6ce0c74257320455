//! Bracketed entry tokenizer.
//!
//! Header entries look like `<1;"Physical time";s;FLOAT;64;SCALAR;;>` or
//! `{Triad;3;1;"Triad 1";[0;"Position matrix";<2>]}`. An entry is split on
//! its separator at the outermost level only; nested bracketed sub-entries
//! are kept verbatim (quotes included) so they can be tokenized again later.

/// Opening brackets recognised for nesting.
const OPEN: &[u8] = b"<[{(";
/// Closing brackets recognised for nesting.
const CLOSE: &[u8] = b">]})";

/// Result of tokenizing one entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokens {
    pub fields: Vec<String>,
    /// Bytes consumed from the input, including both brackets.
    pub consumed: usize,
}

/// Tokenize the entry starting at `input[0]`, which must be `open`.
///
/// Whitespace outside double quotes is dropped. Quotes delimiting a whole
/// field are stripped; quotes inside nested sub-entries are kept. Returns
/// `None` if the entry is not terminated by `close`.
pub fn tokenize(input: &[u8], open: u8, close: u8, separator: u8) -> Option<Tokens> {
    if input.first() != Some(&open) {
        return None;
    }

    let mut fields = Vec::new();
    let mut current = Vec::new();
    let mut nested = 0usize;
    let mut quoted = false;

    for (i, &c) in input.iter().enumerate().skip(1) {
        if c == b'"' {
            quoted = !quoted;
            if nested > 0 {
                current.push(c);
            }
            continue;
        }
        if quoted {
            current.push(c);
            continue;
        }
        if c.is_ascii_whitespace() {
            continue;
        }

        if nested == 0 && c == close {
            fields.push(into_string(current));
            if fields.len() == 1 && fields[0].is_empty() {
                fields.clear();
            }
            return Some(Tokens { fields, consumed: i + 1 });
        }
        if OPEN.contains(&c) {
            nested += 1;
        } else if CLOSE.contains(&c) {
            nested = nested.saturating_sub(1);
        } else if nested == 0 && c == separator {
            fields.push(into_string(std::mem::take(&mut current)));
            continue;
        }
        current.push(c);
    }

    None
}

/// Tokenize a field that may be wrapped in `open`/`close`, e.g. block
/// sizes `(3,3)`. A bare field is treated as a single token; empty
/// tokens are dropped.
pub fn split_list(field: &str, open: u8, close: u8, separator: u8) -> Vec<String> {
    let bytes = field.as_bytes();
    let fields = if bytes.first() == Some(&open) {
        tokenize(bytes, open, close, separator).map(|t| t.fields).unwrap_or_default()
    } else {
        field.split(separator as char).map(str::to_string).collect()
    };
    fields.into_iter().filter(|f| !f.is_empty()).collect()
}

fn into_string(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(s: &str, open: u8, close: u8) -> Vec<String> {
        tokenize(s.as_bytes(), open, close, b';').unwrap().fields
    }

    #[test]
    fn test_simple_variable() {
        let f = fields(r#"<1;"Physical time";s;FLOAT;64;SCALAR;;>"#, b'<', b'>');
        assert_eq!(f, ["1", "Physical time", "s", "FLOAT", "64", "SCALAR", "", ""]);
    }

    #[test]
    fn test_reference_only() {
        assert_eq!(fields("<12>", b'<', b'>'), ["12"]);
        assert_eq!(fields("[ 4 ]", b'[', b']'), ["4"]);
        assert!(fields("<>", b'<', b'>').is_empty());
    }

    #[test]
    fn test_nested_kept_verbatim() {
        let input = r#"{Triad; 3; 1; "Triad 1"; [0;"Position matrix";<2>]<5>}"#;
        let t = tokenize(input.as_bytes(), b'{', b'}', b';').unwrap();
        assert_eq!(t.consumed, input.len());
        assert_eq!(t.fields[0], "Triad");
        assert_eq!(t.fields[3], "Triad 1");
        assert_eq!(t.fields[4], r#"[0;"Position matrix";<2>]<5>"#);
    }

    #[test]
    fn test_block_sizes() {
        let f = fields("<7;Stress;Pa;FLOAT;32;TENSOR3;(3,6);(Bottom,Mid,Top)>", b'<', b'>');
        assert_eq!(f[6], "(3,6)");
        assert_eq!(split_list(&f[6], b'(', b')', b','), ["3", "6"]);
        assert_eq!(split_list(&f[7], b'(', b')', b','), ["Bottom", "Mid", "Top"]);
        assert!(split_list("", b'(', b')', b',').is_empty());
        assert_eq!(split_list("4", b'(', b')', b','), ["4"]);
    }

    #[test]
    fn test_consumed_and_unterminated() {
        let t = tokenize(b"<1><2>", b'<', b'>', b';').unwrap();
        assert_eq!(t.consumed, 3);
        assert!(tokenize(b"<1;abc", b'<', b'>', b';').is_none());
        assert!(tokenize(b"x<1>", b'<', b'>', b';').is_none());
    }
}
