//! Header value escaping for protocol levels 1.1 and later.
//!
//! | raw  | escaped |
//! |------|---------|
//! | `\n` | `\\n`   |
//! | `:`  | `\\c`   |
//! | `\\` | `\\\\`  |
//! | `\r` | `\\r` (1.2 only) |

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::ParseError;

/// Undoes the escaping of one header key or value.
///
/// Returns a cheap slice of `raw` when nothing is escaped. Any escape
/// sequence outside the table is rejected.
pub(crate) fn unescape(raw: Bytes, carriage_return: bool) -> Result<Bytes, ParseError> {
    if !raw.contains(&b'\\') {
        return Ok(raw);
    }

    let mut out = BytesMut::with_capacity(raw.len());
    let mut bytes = raw.iter();
    while let Some(&b) = bytes.next() {
        if b != b'\\' {
            out.put_u8(b);
            continue;
        }
        let unescaped = match bytes.next() {
            Some(b'n') => b'\n',
            Some(b'c') => b':',
            Some(b'\\') => b'\\',
            Some(b'r') if carriage_return => b'\r',
            Some(&other) => {
                return Err(ParseError::invalid_header(format!("undefined escape sequence \\{}", char::from(other))));
            }
            None => return Err(ParseError::invalid_header("dangling escape at end of header")),
        };
        out.put_u8(unescaped);
    }
    Ok(out.freeze())
}

pub(crate) fn escape_into(raw: &[u8], carriage_return: bool, dst: &mut BytesMut) {
    for &b in raw {
        match b {
            b'\n' => dst.put_slice(b"\\n"),
            b':' => dst.put_slice(b"\\c"),
            b'\\' => dst.put_slice(b"\\\\"),
            b'\r' if carriage_return => dst.put_slice(b"\\r"),
            _ => dst.put_u8(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_values_are_untouched() {
        let raw = Bytes::from_static(b"/queue/a");
        assert_eq!(unescape(raw.clone(), true).unwrap(), raw);
    }

    #[test]
    fn unescape_table() {
        let raw = Bytes::from_static(br"a\cb\nc\\d\re");
        assert_eq!(unescape(raw.clone(), true).unwrap().as_ref(), b"a:b\nc\\d\re");
        assert!(unescape(raw, false).is_err());
    }

    #[test]
    fn bad_sequences() {
        assert!(unescape(Bytes::from_static(br"a\t"), true).is_err());
        assert!(unescape(Bytes::from_static(br"a\"), true).is_err());
    }

    #[test]
    fn escape_reverses_unescape() {
        let mut dst = BytesMut::new();
        escape_into(b"key:with\\odd\nchars\r", true, &mut dst);
        assert_eq!(dst.as_ref(), br"key\cwith\\odd\nchars\r");
        assert_eq!(unescape(dst.freeze(), true).unwrap().as_ref(), b"key:with\\odd\nchars\r");

        let mut dst = BytesMut::new();
        escape_into(b"cr\r", false, &mut dst);
        assert_eq!(dst.as_ref(), b"cr\r");
    }
}
