use base64::{engine::general_purpose::STANDARD, Engine};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhotoError {
    #[error("An image of your land is required.")]
    Empty,
    #[error("Photo data URI must be base64-encoded.")]
    NotBase64Uri,
    #[error("Photo is not valid base64.")]
    InvalidBase64,
    #[error("Photo is not a recognized image format.")]
    UnrecognizedFormat,
}

/// A base64-encoded photo as uploaded by a caller.
///
/// Accepts a data URI (`data:<mime>;base64,<body>`) or bare base64. The bytes are
/// only sniffed for a known image signature, never decoded into pixels.
#[derive(Clone, PartialEq, Eq)]
pub struct PhotoPayload {
    body: String,
    media_type: String,
    size: usize,
}

impl PhotoPayload {
    pub fn parse(input: &str) -> Result<Self, PhotoError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(PhotoError::Empty);
        }

        let (declared_type, body) = match input.strip_prefix("data:") {
            Some(rest) => {
                let (header, body) = rest.split_once(',').ok_or(PhotoError::NotBase64Uri)?;
                let media_type = header
                    .strip_suffix(";base64")
                    .ok_or(PhotoError::NotBase64Uri)?;
                (Some(media_type), body.trim())
            }
            None => (None, input),
        };

        if body.is_empty() {
            return Err(PhotoError::Empty);
        }

        let bytes = STANDARD
            .decode(body)
            .map_err(|_| PhotoError::InvalidBase64)?;
        let format = image::guess_format(&bytes).map_err(|_| PhotoError::UnrecognizedFormat)?;

        let media_type = match declared_type {
            Some(declared) if !declared.is_empty() => declared.to_string(),
            _ => format.to_mime_type().to_string(),
        };

        Ok(Self {
            body: body.to_string(),
            media_type,
            size: bytes.len(),
        })
    }

    /// The base64 payload without any data-URI prefix.
    pub fn base64_body(&self) -> &str {
        &self.body
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Decoded size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.body)
    }
}

impl fmt::Debug for PhotoPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhotoPayload")
            .field("media_type", &self.media_type)
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    fn png_base64() -> String {
        STANDARD.encode(PNG_SIGNATURE)
    }

    #[test]
    fn test_data_uri_prefix_is_stripped() {
        let uri = format!("data:image/png;base64,{}", png_base64());
        let photo = PhotoPayload::parse(&uri).unwrap();
        assert_eq!(photo.base64_body(), png_base64());
        assert_eq!(photo.media_type(), "image/png");
        assert_eq!(photo.size(), PNG_SIGNATURE.len());
        assert_eq!(photo.to_data_uri(), uri);
    }

    #[test]
    fn test_bare_base64_gets_sniffed_media_type() {
        let photo = PhotoPayload::parse(&png_base64()).unwrap();
        assert_eq!(photo.media_type(), "image/png");
        assert!(photo.to_data_uri().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_rejects_bad_payloads() {
        assert_eq!(PhotoPayload::parse("  "), Err(PhotoError::Empty));
        assert_eq!(
            PhotoPayload::parse("data:image/png;base64,"),
            Err(PhotoError::Empty)
        );
        assert_eq!(
            PhotoPayload::parse("data:image/png,abc"),
            Err(PhotoError::NotBase64Uri)
        );
        assert_eq!(
            PhotoPayload::parse("data:image/png;base64"),
            Err(PhotoError::NotBase64Uri)
        );
        assert_eq!(
            PhotoPayload::parse("not base64!"),
            Err(PhotoError::InvalidBase64)
        );
        assert_eq!(
            PhotoPayload::parse(&STANDARD.encode(b"plain text, not an image")),
            Err(PhotoError::UnrecognizedFormat)
        );
    }

    #[test]
    fn test_debug_does_not_dump_payload() {
        let photo = PhotoPayload::parse(&png_base64()).unwrap();
        let debug = format!("{:?}", photo);
        assert!(!debug.contains(&png_base64()));
    }
}
