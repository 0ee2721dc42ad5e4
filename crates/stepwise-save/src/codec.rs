//! Byte encoding for saves.
//!
//! ```text
//! [method u8] [document bytes]
//! ```
//!
//! Method `0` stores the JSON text as is; method `1` gzips it. Any other
//! header byte, an empty buffer, or a body that fails to decompress or
//! parse is an error.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use stepwise_core::Value;

use crate::error::SaveError;
use crate::format::SaveDocument;

/// Compression applied to the document body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionMethod {
    /// Plain JSON text.
    None = 0,
    /// Gzip-compressed JSON text.
    #[default]
    Gzip = 1,
}

impl CompressionMethod {
    /// The header byte for this method.
    pub fn header_byte(self) -> u8 {
        self as u8
    }

    /// Parse a header byte.
    pub fn from_header_byte(byte: u8) -> Result<Self, SaveError> {
        match byte {
            0 => Ok(Self::None),
            1 => Ok(Self::Gzip),
            _ => Err(SaveError::UnknownCompression { byte }),
        }
    }
}

/// Encode `document` behind a one-byte compression header.
pub fn encode_save(
    document: &SaveDocument,
    method: CompressionMethod,
) -> Result<Vec<u8>, SaveError> {
    let json = serde_json::to_vec(&document.to_value()?)?;
    let mut out = Vec::with_capacity(json.len() + 1);
    out.push(method.header_byte());
    match method {
        CompressionMethod::None => out.extend_from_slice(&json),
        CompressionMethod::Gzip => {
            let mut encoder = GzEncoder::new(out, Compression::default());
            encoder.write_all(&json).map_err(SaveError::Compression)?;
            out = encoder.finish().map_err(SaveError::Compression)?;
        }
    }
    Ok(out)
}

/// Decode bytes produced by [`encode_save`] into a raw document.
///
/// The result is not yet migrated; pass it to
/// [`load_save`](crate::load_save).
pub fn decode_save(bytes: &[u8]) -> Result<Value, SaveError> {
    let (&header, body) = bytes.split_first().ok_or(SaveError::EmptyInput)?;
    let json = match CompressionMethod::from_header_byte(header)? {
        CompressionMethod::None => body.to_vec(),
        CompressionMethod::Gzip => {
            let mut json = Vec::new();
            GzDecoder::new(body)
                .read_to_end(&mut json)
                .map_err(SaveError::Compression)?;
            json
        }
    };
    let value: Value = serde_json::from_slice(&json)?;
    value.validate()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::{load_save, LoadOptions, MigrationRegistry};
    use crate::serialize::serialize_save;
    use stepwise_test_utils::{collect, default_runtime};

    fn document() -> SaveDocument {
        let mut runtime = default_runtime();
        runtime.enqueue(collect(3.0, 0)).unwrap();
        runtime.enqueue(collect(4.0, 9)).unwrap();
        runtime.step_once().unwrap();
        serialize_save(&runtime, 1_700_000_000_000.0).unwrap()
    }

    #[test]
    fn both_methods_decode_to_the_same_document() {
        let doc = document();
        for method in [CompressionMethod::None, CompressionMethod::Gzip] {
            let bytes = encode_save(&doc, method).unwrap();
            assert_eq!(bytes[0], method.header_byte());
            let loaded = load_save(
                decode_save(&bytes).unwrap(),
                &MigrationRegistry::builtin(),
                &LoadOptions::default(),
            )
            .unwrap();
            assert_eq!(loaded.document, doc);
            assert_eq!(loaded.report.steps_applied(), 0);
        }
    }

    #[test]
    fn uncompressed_body_is_json_text() {
        let bytes = encode_save(&document(), CompressionMethod::None).unwrap();
        assert_eq!(bytes[1], b'{');
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(matches!(decode_save(&[]), Err(SaveError::EmptyInput)));
    }

    #[test]
    fn unknown_header_is_an_error() {
        assert!(matches!(
            decode_save(&[2, b'{', b'}']),
            Err(SaveError::UnknownCompression { byte: 2 })
        ));
    }

    #[test]
    fn corrupt_gzip_is_an_error() {
        let mut bytes = encode_save(&document(), CompressionMethod::Gzip).unwrap();
        // Clobber the gzip magic.
        bytes[1] = 0;
        bytes[2] = 0;
        assert!(matches!(
            decode_save(&bytes),
            Err(SaveError::Compression(_))
        ));
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(matches!(
            decode_save(&[0, b'{', b'x']),
            Err(SaveError::Json(_))
        ));
        assert!(matches!(decode_save(&[0]), Err(SaveError::Json(_))));
    }
}
