//! Shared text-format helpers: string escaping rules per format, token scanning and
//! field-end detection.

use std::io::Write;

use crate::config::CsvSettings;
use crate::error::{NullableError, Result};
use crate::io::ReadBuffer;

//==================================================================================
// 1. Field ends and tokens
//==================================================================================

/// Characters that may continue a bare identifier such as `null` or `NULL`.
pub fn is_ident_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// A TabSeparated field ends at a tab, a line break or the end of input.
pub fn is_escaped_field_end(next: Option<u8>) -> bool {
    matches!(next, None | Some(b'\t') | Some(b'\n') | Some(b'\r'))
}

/// A CSV field ends at the delimiter, a line break or the end of input.
pub fn is_csv_field_end(next: Option<u8>, delimiter: u8) -> bool {
    match next {
        None | Some(b'\n') | Some(b'\r') => true,
        Some(byte) => byte == delimiter,
    }
}

pub fn csv_delimiter(settings: &CsvSettings) -> Result<u8> {
    let delimiter = settings.delimiter;
    if !delimiter.is_ascii() {
        return Err(NullableError::ContractViolation(format!(
            "CSV delimiter '{}' is not a single-byte character",
            delimiter
        )));
    }
    Ok(delimiter as u8)
}

/// Consumes a bare numeric literal (digits, sign, point, exponent, `inf`, `nan`).
pub fn read_number_token<'a>(r: &mut ReadBuffer<'a>, row: usize) -> Result<&'a str> {
    let token = r.take_while(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'-' || b == b'.');
    if token.is_empty() {
        let found = match r.peek() {
            Some(byte) => format!("'{}'", byte.escape_ascii()),
            None => "end of input".to_string(),
        };
        return Err(NullableError::malformed(
            row,
            format!("expected a number, found {}", found),
        ));
    }
    // The token is ASCII by construction.
    std::str::from_utf8(token).map_err(|e| NullableError::malformed(row, e.to_string()))
}

fn utf8(bytes: Vec<u8>, row: usize) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| NullableError::malformed(row, e.to_string()))
}

fn unescape(byte: u8) -> Option<u8> {
    match byte {
        b'b' => Some(0x08),
        b'f' => Some(0x0C),
        b'n' => Some(b'\n'),
        b'r' => Some(b'\r'),
        b't' => Some(b'\t'),
        b'0' => Some(0),
        b'\\' | b'\'' | b'"' => Some(byte),
        _ => None,
    }
}

fn read_escape(r: &mut ReadBuffer, row: usize) -> Result<u8> {
    match r.next_byte() {
        Some(byte) => unescape(byte).ok_or_else(|| {
            NullableError::malformed(
                row,
                format!("unknown escape sequence '\\{}'", byte.escape_ascii()),
            )
        }),
        None => Err(NullableError::malformed(row, "unterminated escape sequence")),
    }
}

//==================================================================================
// 2. Escaped (TabSeparated)
//==================================================================================

pub fn write_escaped_string(value: &str, w: &mut dyn Write) -> Result<()> {
    for &byte in value.as_bytes() {
        match byte {
            b'\\' => w.write_all(b"\\\\")?,
            b'\t' => w.write_all(b"\\t")?,
            b'\n' => w.write_all(b"\\n")?,
            b'\r' => w.write_all(b"\\r")?,
            0 => w.write_all(b"\\0")?,
            0x08 => w.write_all(b"\\b")?,
            0x0C => w.write_all(b"\\f")?,
            _ => w.write_all(&[byte])?,
        }
    }
    Ok(())
}

/// Reads up to the next unescaped field end. Unknown escapes are malformed.
pub fn read_escaped_string(r: &mut ReadBuffer, row: usize) -> Result<String> {
    let mut out = Vec::new();
    while let Some(byte) = r.peek() {
        match byte {
            b'\t' | b'\n' | b'\r' => break,
            b'\\' => {
                r.advance(1);
                out.push(read_escape(r, row)?);
            }
            _ => {
                r.advance(1);
                out.push(byte);
            }
        }
    }
    utf8(out, row)
}

//==================================================================================
// 3. Quoted (SQL literals)
//==================================================================================

pub fn write_quoted_string(value: &str, w: &mut dyn Write) -> Result<()> {
    w.write_all(b"'")?;
    for &byte in value.as_bytes() {
        match byte {
            b'\'' => w.write_all(b"\\'")?,
            b'\\' => w.write_all(b"\\\\")?,
            _ => w.write_all(&[byte])?,
        }
    }
    w.write_all(b"'")?;
    Ok(())
}

pub fn read_quoted_string(r: &mut ReadBuffer, row: usize) -> Result<String> {
    r.expect_byte(b'\'', row)?;
    let mut out = Vec::new();
    loop {
        match r.next_byte() {
            Some(b'\'') => break,
            Some(b'\\') => out.push(read_escape(r, row)?),
            Some(byte) => out.push(byte),
            None => return Err(NullableError::malformed(row, "unterminated quoted string")),
        }
    }
    utf8(out, row)
}

//==================================================================================
// 4. CSV
//==================================================================================

/// Always double-quotes, so a value such as `\N` can never be mistaken for NULL.
pub fn write_csv_string(value: &str, w: &mut dyn Write) -> Result<()> {
    w.write_all(b"\"")?;
    for &byte in value.as_bytes() {
        if byte == b'"' {
            w.write_all(b"\"\"")?;
        } else {
            w.write_all(&[byte])?;
        }
    }
    w.write_all(b"\"")?;
    Ok(())
}

/// Reads a double-quoted field (`""` is a literal quote) or a bare field up to the
/// next field end.
pub fn read_csv_string(r: &mut ReadBuffer, delimiter: u8, row: usize) -> Result<String> {
    let mut out = Vec::new();
    if r.peek() == Some(b'"') {
        r.advance(1);
        loop {
            match r.next_byte() {
                Some(b'"') if r.peek() == Some(b'"') => {
                    r.advance(1);
                    out.push(b'"');
                }
                Some(b'"') => break,
                Some(byte) => out.push(byte),
                None => return Err(NullableError::malformed(row, "unterminated CSV string")),
            }
        }
    } else {
        out.extend_from_slice(r.take_while(|b| !is_csv_field_end(Some(b), delimiter)));
    }
    utf8(out, row)
}

//==================================================================================
// 5. JSON
//==================================================================================

pub fn write_json_string(value: &str, w: &mut dyn Write) -> Result<()> {
    serde_json::to_writer(&mut *w, value)?;
    Ok(())
}

/// Scans one JSON string token and decodes it with `serde_json`.
pub fn read_json_string(r: &mut ReadBuffer, row: usize) -> Result<String> {
    let start = r.position();
    let rest = r.remaining();
    r.expect_byte(b'"', row)?;
    loop {
        match r.next_byte() {
            Some(b'"') => break,
            Some(b'\\') => {
                if r.next_byte().is_none() {
                    return Err(NullableError::malformed(row, "unterminated JSON string"));
                }
            }
            Some(_) => {}
            None => return Err(NullableError::malformed(row, "unterminated JSON string")),
        }
    }
    let token = &rest[..r.position() - start];
    serde_json::from_slice::<String>(token).map_err(|e| NullableError::malformed(row, e.to_string()))
}

//==================================================================================
// 6. XML
//==================================================================================

pub fn write_xml_escaped(bytes: &[u8], w: &mut dyn Write) -> Result<()> {
    for &byte in bytes {
        match byte {
            b'&' => w.write_all(b"&amp;")?,
            b'<' => w.write_all(b"&lt;")?,
            b'>' => w.write_all(b"&gt;")?,
            b'"' => w.write_all(b"&quot;")?,
            b'\'' => w.write_all(b"&apos;")?,
            _ => w.write_all(&[byte])?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escaped_string_rejects_unknown_escape() {
        let mut r = ReadBuffer::new(b"\\Nabc");
        assert!(matches!(
            read_escaped_string(&mut r, 0),
            Err(NullableError::MalformedInput { .. })
        ));

        let mut r = ReadBuffer::new(b"a\\tb\tnext");
        assert_eq!(read_escaped_string(&mut r, 0).unwrap(), "a\tb");
        assert_eq!(r.peek(), Some(b'\t'));
    }

    #[test]
    fn test_csv_string_quoting() {
        let mut out = Vec::new();
        write_csv_string("say \"hi\"", &mut out).unwrap();
        assert_eq!(out, b"\"say \"\"hi\"\"\"");

        let mut r = ReadBuffer::new(&out);
        assert_eq!(read_csv_string(&mut r, b',', 0).unwrap(), "say \"hi\"");

        let mut r = ReadBuffer::new(b"\\Nabc,2");
        assert_eq!(read_csv_string(&mut r, b',', 0).unwrap(), "\\Nabc");
    }

    #[test]
    fn test_json_string_token() {
        let mut r = ReadBuffer::new(b"\"a\\\"b\",1");
        assert_eq!(read_json_string(&mut r, 0).unwrap(), "a\"b");
        assert_eq!(r.peek(), Some(b','));
    }

    #[test]
    fn test_quoted_string() {
        let mut out = Vec::new();
        write_quoted_string("it's", &mut out).unwrap();
        assert_eq!(out, b"'it\\'s'");
        let mut r = ReadBuffer::new(&out);
        assert_eq!(read_quoted_string(&mut r, 0).unwrap(), "it's");
    }
}
