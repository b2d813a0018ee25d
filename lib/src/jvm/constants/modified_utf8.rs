use std::fmt;

/// Modified UTF-8 format used in class files.
///
/// See [this `DataInput` section for details][0]. Quoting from that section:
///
/// > The differences between this format and the standard UTF-8 format are the following:
/// >
/// >  * The null byte `\u0000` is encoded in 2-byte format rather than 1-byte, so that the encoded
/// >    strings never have embedded nulls.
/// >  * Only the 1-byte, 2-byte, and 3-byte formats are used.
/// >  * Supplementary characters are represented in the form of surrogate pairs.
///
/// [0]: https://docs.oracle.com/en/java/javase/17/docs/api/java.base/java/io/DataInput.html#modified-utf-8
pub fn encode_modified_utf8(string: &str) -> Vec<u8> {
    let mut buffer: Vec<u8> = vec![];
    for c in string.chars() {
        // Handle the exception for how `\u{0000}` is represented
        let len: usize = if c == '\u{0000}' { 2 } else { c.len_utf8() };
        let code: u32 = c as u32;

        match len {
            1 => buffer.push(code as u8),
            2 => {
                buffer.push((code >> 6 & 0x1F) as u8 | 0b1100_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }
            3 => {
                buffer.push((code >> 12 & 0x0F) as u8 | 0b1110_0000);
                buffer.push((code >> 6 & 0x3F) as u8 | 0b1000_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }

            // Supplementary characters: main divergence from unicode
            _ => {
                buffer.push(0b1110_1101);
                buffer.push(((code >> 16 & 0x0F) as u8).wrapping_sub(1) & 0x0F | 0b1010_0000);
                buffer.push((code >> 10 & 0x3F) as u8 | 0b1000_0000);

                buffer.push(0b1110_1101);
                buffer.push(((code >> 6 & 0x0F) as u8) | 0b1011_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }
        }
    }
    buffer
}

/// Text of a `Utf8` constant
///
/// Java strings are sequences of UTF-16 code units, and nothing stops a class file from holding
/// an unpaired surrogate (`"\uD800"` is a legal string literal). Such text has no `String` form,
/// so it is kept as code units instead. Valid text is always stored as `Utf8`, which makes the
/// derived equality an equality of content.
#[derive(Clone, Hash, Eq, PartialEq, Debug)]
pub enum JavaString {
    Utf8(String),
    InvalidUtf8(Vec<u16>),
}

impl JavaString {
    /// The text, if it is valid Unicode
    pub fn as_str(&self) -> Option<&str> {
        match self {
            JavaString::Utf8(string) => Some(string),
            JavaString::InvalidUtf8(_) => None,
        }
    }

    /// Modified UTF-8 encoding of the text
    pub fn encode(&self) -> Vec<u8> {
        match self {
            JavaString::Utf8(string) => encode_modified_utf8(string),
            JavaString::InvalidUtf8(units) => encode_utf16_units(units),
        }
    }
}

impl From<&str> for JavaString {
    fn from(string: &str) -> JavaString {
        JavaString::Utf8(String::from(string))
    }
}

impl From<String> for JavaString {
    fn from(string: String) -> JavaString {
        JavaString::Utf8(string)
    }
}

impl fmt::Display for JavaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JavaString::Utf8(string) => f.write_str(string),
            JavaString::InvalidUtf8(units) => f.write_str(&String::from_utf16_lossy(units)),
        }
    }
}

/// Modified UTF-8 encoding of raw code units, one to three bytes per unit
fn encode_utf16_units(units: &[u16]) -> Vec<u8> {
    let mut buffer: Vec<u8> = Vec::with_capacity(units.len());
    for unit in units {
        let code = *unit;
        if code != 0 && code < 0x80 {
            buffer.push(code as u8);
        } else if code < 0x800 {
            buffer.push((code >> 6 & 0x1F) as u8 | 0b1100_0000);
            buffer.push((code & 0x3F) as u8 | 0b1000_0000);
        } else {
            buffer.push((code >> 12 & 0x0F) as u8 | 0b1110_0000);
            buffer.push((code >> 6 & 0x3F) as u8 | 0b1000_0000);
            buffer.push((code & 0x3F) as u8 | 0b1000_0000);
        }
    }
    buffer
}

/// Inverse of [`encode_modified_utf8`]
///
/// Bytes are decoded into UTF-16 code units first, so that surrogate pairs recombine. Returns
/// `None` on malformed input. Unpaired surrogates are not malformed: they come back as
/// [`JavaString::InvalidUtf8`].
pub fn decode_modified_utf8(bytes: &[u8]) -> Option<JavaString> {
    let continuation = |idx: usize| -> Option<u16> {
        match bytes.get(idx) {
            Some(b) if b & 0b1100_0000 == 0b1000_0000 => Some((b & 0x3F) as u16),
            _ => None,
        }
    };

    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        let b = bytes[idx];
        if b & 0b1000_0000 == 0 {
            units.push(b as u16);
            idx += 1;
        } else if b & 0b1110_0000 == 0b1100_0000 {
            units.push(((b & 0x1F) as u16) << 6 | continuation(idx + 1)?);
            idx += 2;
        } else if b & 0b1111_0000 == 0b1110_0000 {
            units.push(
                ((b & 0x0F) as u16) << 12 | continuation(idx + 1)? << 6 | continuation(idx + 2)?,
            );
            idx += 3;
        } else {
            return None;
        }
    }
    Some(match String::from_utf16(&units) {
        Ok(string) => JavaString::Utf8(string),
        Err(_) => JavaString::InvalidUtf8(units),
    })
}
