//! `:name` placeholder scanning and rewriting.
//!
//! Endpoint queries use named placeholders (`WHERE id = :id`). Connectors
//! translate those into their dialect's native style before binding:
//! `$1`-style numbered parameters for Postgres, `?` positional parameters
//! for SQLite and Snowflake.
//!
//! The scanner skips string literals, quoted identifiers, comments and
//! Postgres `::type` casts, so `SELECT ':x'` and `price::numeric` never
//! produce a placeholder.

/// Native placeholder style of a dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `$1`, `$2`, ... — repeated names reuse the same ordinal.
    Numbered,
    /// `?` — one binding per occurrence, names may repeat.
    Positional,
}

/// Distinct placeholder names in first-occurrence order.
pub fn extract_placeholders(sql: &str) -> Vec<String> {
    let mut names = Vec::new();
    scan(sql, |name| {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
        String::new()
    });
    names
}

/// Rewrite `:name` placeholders into the given style.
///
/// Returns the rewritten SQL and the bind-order list of parameter names.
/// For [`PlaceholderStyle::Positional`] the list has one entry per
/// occurrence; for [`PlaceholderStyle::Numbered`] one entry per distinct
/// name, in ordinal order.
pub fn rewrite_placeholders(sql: &str, style: PlaceholderStyle) -> (String, Vec<String>) {
    let mut order: Vec<String> = Vec::new();
    let rewritten = scan(sql, |name| match style {
        PlaceholderStyle::Numbered => {
            let idx = match order.iter().position(|n| n == name) {
                Some(i) => i,
                None => {
                    order.push(name.to_string());
                    order.len() - 1
                }
            };
            format!("${}", idx + 1)
        }
        PlaceholderStyle::Positional => {
            order.push(name.to_string());
            "?".to_string()
        }
    });
    (rewritten, order)
}

/// Walk the SQL text, calling `replace` for every placeholder and splicing
/// its return value into the output.
fn scan(sql: &str, mut replace: impl FnMut(&str) -> String) -> String {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => {
                let quote = bytes[i];
                out.push(bytes[i] as char);
                i += 1;
                while i < bytes.len() {
                    out.push(bytes[i] as char);
                    if bytes[i] == quote {
                        // doubled quote is an escape, stay inside the literal
                        if i + 1 < bytes.len() && bytes[i + 1] == quote {
                            out.push(bytes[i + 1] as char);
                            i += 2;
                            continue;
                        }
                        i += 1;
                        break;
                    }
                    i += 1;
                }
            }
            b'-' if i + 1 < bytes.len() && bytes[i + 1] == b'-' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    out.push(bytes[i] as char);
                    i += 1;
                }
            }
            b'/' if i + 1 < bytes.len() && bytes[i + 1] == b'*' => {
                out.push_str("/*");
                i += 2;
                while i < bytes.len() {
                    if bytes[i] == b'*' && i + 1 < bytes.len() && bytes[i + 1] == b'/' {
                        out.push_str("*/");
                        i += 2;
                        break;
                    }
                    out.push(bytes[i] as char);
                    i += 1;
                }
            }
            b':' => {
                // `::` is a cast, not a placeholder
                if i + 1 < bytes.len() && bytes[i + 1] == b':' {
                    out.push_str("::");
                    i += 2;
                    continue;
                }
                let start = i + 1;
                let mut end = start;
                while end < bytes.len()
                    && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
                {
                    end += 1;
                }
                if end > start && !bytes[start].is_ascii_digit() {
                    let name = &sql[start..end];
                    let replacement = replace(name);
                    out.push_str(&replacement);
                    i = end;
                } else {
                    out.push(':');
                    i += 1;
                }
            }
            b => {
                // non-ASCII bytes are part of a multi-byte char; copy it whole
                if b.is_ascii() {
                    out.push(b as char);
                    i += 1;
                } else {
                    let ch = sql[i..].chars().next().unwrap_or('\u{fffd}');
                    out.push(ch);
                    i += ch.len_utf8();
                }
            }
        }
    }
    out
}
