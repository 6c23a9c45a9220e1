//! JSON text to document parsing
//!
//! Flow authors write filters the way the mongo shell accepts them:
//! `{ name: 'Olav', age: { $gt: 40 }, _id: ObjectId("...") }`. Before handing
//! the text to `serde_json` the relaxed syntax is rewritten into strict JSON:
//! - single-quoted strings become double-quoted;
//! - a bare word followed by `:` is a key and gets quoted;
//! - shell constructors (`ObjectId`, `ISODate`, `NumberInt`, `NumberLong`)
//!   become their extended JSON form.
//!
//! Any other bare word in value position is malformed, except `true`,
//! `false` and `null`. Extended JSON such as `{"$oid": "..."}` is
//! interpreted by `bson` afterwards.

use bson::{Bson, Document as BsonDocument};

use crate::DocumentError;

/// Parse JSON text (strict or relaxed) into a document.
///
/// The top-level value must be an object.
pub fn parse_document(text: &str) -> Result<BsonDocument, DocumentError> {
    let malformed = |reason: String| DocumentError::MalformedJson {
        text: text.to_string(),
        reason,
    };

    let strict = to_strict_json(text).map_err(malformed)?;
    let json: serde_json::Value =
        serde_json::from_str(&strict).map_err(|e| malformed(e.to_string()))?;

    if !json.is_object() {
        return Err(malformed("expected a JSON object".to_string()));
    }

    match Bson::try_from(json) {
        Ok(Bson::Document(doc)) => Ok(doc),
        Ok(other) => Err(malformed(format!(
            "expected a document, found {:?}",
            other.element_type()
        ))),
        Err(e) => Err(malformed(e.to_string())),
    }
}

/// Rewrite relaxed JSON into strict JSON
fn to_strict_json(text: &str) -> Result<String, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut pos = 0;

    while let Some(&c) = chars.get(pos) {
        pos += 1;
        match c {
            '"' | '\'' => {
                out.push('"');
                pos = copy_string(&chars, pos, c, &mut out)?;
                out.push('"');
            }
            c if c.is_ascii_digit() || c == '-' => {
                out.push(c);
                pos = copy_number(&chars, pos, &mut out);
            }
            c if is_word_start(c) => {
                let start = pos - 1;
                while chars.get(pos).is_some_and(|&next| is_word_char(next)) {
                    pos += 1;
                }
                let word: String = chars[start..pos].iter().collect();

                match next_significant(&chars, pos) {
                    Some(':') => {
                        out.push('"');
                        out.push_str(&word);
                        out.push('"');
                    }
                    Some('(') => pos = rewrite_constructor(&word, &chars, pos, &mut out)?,
                    _ => match word.as_str() {
                        "true" | "false" | "null" => out.push_str(&word),
                        _ => return Err(format!("expecting a value but found '{}'", word)),
                    },
                }
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

/// Rewrite a shell constructor call into extended JSON.
///
/// `pos` points just past the constructor name. Returns the position after
/// the closing parenthesis.
fn rewrite_constructor(
    name: &str,
    chars: &[char],
    pos: usize,
    out: &mut String,
) -> Result<usize, String> {
    let key = match name {
        "ObjectId" => "$oid",
        "ISODate" => "$date",
        "NumberInt" => "$numberInt",
        "NumberLong" => "$numberLong",
        _ => return Err(format!("unsupported constructor '{}'", name)),
    };

    // Step over '('
    let mut pos = skip_whitespace(chars, skip_whitespace(chars, pos) + 1);
    let mut argument = String::new();
    match chars.get(pos) {
        Some(&quote) if quote == '"' || quote == '\'' => {
            pos = copy_string(chars, pos + 1, quote, &mut argument)?;
        }
        Some(&c) if c.is_ascii_digit() || c == '-' => {
            argument.push(c);
            pos = copy_number(chars, pos + 1, &mut argument);
        }
        _ => return Err(format!("{}() expects a string or number argument", name)),
    }

    pos = skip_whitespace(chars, pos);
    if chars.get(pos) != Some(&')') {
        return Err(format!("expected ')' after the {} argument", name));
    }

    out.push_str(&format!("{{\"{}\": \"{}\"}}", key, argument));
    Ok(pos + 1)
}

/// Copy the body of a string literal opened by `quote`, re-escaped for a
/// double-quoted JSON string. The closing quote is consumed but not written.
fn copy_string(
    chars: &[char],
    mut pos: usize,
    quote: char,
    out: &mut String,
) -> Result<usize, String> {
    while let Some(&c) = chars.get(pos) {
        pos += 1;
        match c {
            '\\' => {
                let Some(&escaped) = chars.get(pos) else {
                    return Err("unterminated escape sequence".to_string());
                };
                pos += 1;
                // \' is not a valid JSON escape
                if escaped == '\'' {
                    out.push('\'');
                } else {
                    out.push('\\');
                    out.push(escaped);
                }
            }
            '"' if quote == '\'' => out.push_str("\\\""),
            c if c == quote => return Ok(pos),
            c => out.push(c),
        }
    }
    Err("unterminated string literal".to_string())
}

/// Copy the rest of a number literal starting at `pos`
fn copy_number(chars: &[char], mut pos: usize, out: &mut String) -> usize {
    while let Some(&c) = chars.get(pos) {
        if !(c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-')) {
            break;
        }
        out.push(c);
        pos += 1;
    }
    pos
}

fn skip_whitespace(chars: &[char], mut pos: usize) -> usize {
    while chars.get(pos).is_some_and(|c| c.is_whitespace()) {
        pos += 1;
    }
    pos
}

fn next_significant(chars: &[char], pos: usize) -> Option<char> {
    chars.get(skip_whitespace(chars, pos)).copied()
}

fn is_word_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$' || c == '.'
}
