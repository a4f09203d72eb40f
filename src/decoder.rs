// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use crate::{error::PreprocessError, location::Location, output::OutputKind};

const BOM_UTF8: &[u8] = b"\xEF\xBB\xBF";
const BOM_UTF16_BE: &[u8] = b"\xFE\xFF";
const BOM_UTF16_LE: &[u8] = b"\xFF\xFE";

/// Decoding step before tokenization.
///
/// - A UTF-8 byte order mark is skipped.
/// - UTF-16 input (big or little endian, recognized by its byte order mark)
///   is transcoded to UTF-8 first.
/// - Everything else is passed through unchanged. Bytes above 127 are not
///   validated here; the lexer diagnoses them where the literal context is
///   known.
pub fn decode(data: &[u8]) -> Result<String, PreprocessError> {
    if data.starts_with(BOM_UTF8) {
        Ok(String::from_utf8_lossy(&data[BOM_UTF8.len()..]).into_owned())
    } else if data.starts_with(BOM_UTF16_BE) {
        decode_utf16(&data[BOM_UTF16_BE.len()..], u16::from_be_bytes)
    } else if data.starts_with(BOM_UTF16_LE) {
        decode_utf16(&data[BOM_UTF16_LE.len()..], u16::from_le_bytes)
    } else {
        Ok(String::from_utf8_lossy(data).into_owned())
    }
}

fn decode_utf16(data: &[u8], combine: fn([u8; 2]) -> u16) -> Result<String, PreprocessError> {
    if data.len() % 2 != 0 {
        return Err(PreprocessError::new(
            OutputKind::SyntaxError,
            Location::default(),
            "truncated UTF-16 input",
        ));
    }

    let units = data
        .chunks_exact(2)
        .map(|pair| combine([pair[0], pair[1]]))
        .collect::<Vec<_>>();

    char::decode_utf16(units.into_iter())
        .collect::<Result<String, _>>()
        .map_err(|_| {
            PreprocessError::new(
                OutputKind::SyntaxError,
                Location::default(),
                "invalid UTF-16 input",
            )
        })
}

#[cfg(test)]
mod tests {
    use crate::decoder::decode;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_plain() {
        assert_eq!(decode(b"int x;").unwrap(), "int x;");
    }

    #[test]
    fn test_decode_utf8_bom() {
        assert_eq!(decode(b"\xEF\xBB\xBFint x;").unwrap(), "int x;");
    }

    #[test]
    fn test_decode_utf16_le() {
        assert_eq!(decode(b"\xFF\xFEa\x00b\x00").unwrap(), "ab");
    }

    #[test]
    fn test_decode_utf16_be() {
        assert_eq!(decode(b"\xFE\xFF\x00a\x00b").unwrap(), "ab");
    }

    #[test]
    fn test_decode_truncated_utf16() {
        assert!(decode(b"\xFF\xFEa\x00b").is_err());
    }
}
