//! Turning typed values into request bodies and response bytes back into
//! typed values.
//!
//! Two capabilities, three implementations: [`Json`] is the default
//! structured codec, [`Raw`] is a byte passthrough, and `()` stands for "no
//! body" on the request side and "ignore the body" on the response side.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("could not encode the request body")]
    Encode(#[source] serde_json::Error),
    #[error("could not decode the response body")]
    Decode(#[source] serde_json::Error),
}

/// A typed request value that knows how to become body bytes.
pub trait IntoBody {
    /// The Content-Type to send alongside the body, if any.
    fn content_type(&self) -> Option<&'static str>;

    fn into_body(self) -> Result<Option<Vec<u8>>, CodecError>;
}

/// A typed response value rebuilt from body bytes.
pub trait FromBody: Sized {
    fn from_body(body: &[u8]) -> Result<Self, CodecError>;
}

impl IntoBody for () {
    fn content_type(&self) -> Option<&'static str> {
        None
    }

    fn into_body(self) -> Result<Option<Vec<u8>>, CodecError> {
        Ok(None)
    }
}

impl FromBody for () {
    fn from_body(_body: &[u8]) -> Result<Self, CodecError> {
        Ok(())
    }
}

/// The default structured codec: JSON via serde.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoBody for Json<T> {
    fn content_type(&self) -> Option<&'static str> {
        Some("application/json; charset=utf-8")
    }

    fn into_body(self) -> Result<Option<Vec<u8>>, CodecError> {
        serde_json::to_vec(&self.0).map(Some).map_err(CodecError::Encode)
    }
}

impl<T: DeserializeOwned> FromBody for Json<T> {
    fn from_body(body: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(body).map(Json).map_err(CodecError::Decode)
    }
}

/// Raw byte passthrough, for endpoints that speak something other than JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raw(pub Vec<u8>);

impl IntoBody for Raw {
    fn content_type(&self) -> Option<&'static str> {
        Some("application/octet-stream")
    }

    fn into_body(self) -> Result<Option<Vec<u8>>, CodecError> {
        Ok(Some(self.0))
    }
}

impl FromBody for Raw {
    fn from_body(body: &[u8]) -> Result<Self, CodecError> {
        Ok(Raw(body.to_vec()))
    }
}
