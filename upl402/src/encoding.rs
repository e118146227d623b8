//! Base64 encoding for header-borne payloads.
//!
//! Payment proofs travel as base64-of-JSON inside a single HTTP header.
//! [`Base64Bytes`] keeps the encoded representation as bytes so it can be
//! compared, transported, and decoded without intermediate copies.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use std::fmt;

/// Bytes holding base64-encoded data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base64Bytes(Vec<u8>);

impl Base64Bytes {
    /// Encodes raw binary data into base64.
    pub fn encode<T: AsRef<[u8]>>(input: T) -> Self {
        Self(b64.encode(input.as_ref()).into_bytes())
    }

    /// Decodes back to the raw binary data.
    ///
    /// # Errors
    ///
    /// Returns an error if the contained bytes are not valid base64.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        b64.decode(&self.0)
    }

    /// Consumes the wrapper, returning the base64 text.
    #[must_use]
    pub fn into_string(self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl AsRef<[u8]> for Base64Bytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for Base64Bytes {
    fn from(slice: &[u8]) -> Self {
        Self(slice.to_vec())
    }
}

impl From<&str> for Base64Bytes {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl fmt::Display for Base64Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}
