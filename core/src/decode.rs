//! Decoding of successful response bodies into the caller's target type.
//!
//! The target type picks the strategy: `()` skips decoding, `Bytes`/`Vec<u8>`
//! take the raw payload, `String` takes its text form, and [`Json<T>`] (or
//! `serde_json::Value`) parses it as JSON.

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::Error;

/// A type a raw response body can be turned into.
pub trait Decode: Sized {
    fn decode(raw: Bytes) -> Result<Self, Error>;
}

/// Decode `raw` into `T`.
pub fn decode<T: Decode>(raw: Bytes) -> Result<T, Error> {
    T::decode(raw)
}

impl Decode for () {
    fn decode(_raw: Bytes) -> Result<Self, Error> {
        Ok(())
    }
}

impl Decode for Bytes {
    fn decode(raw: Bytes) -> Result<Self, Error> {
        Ok(raw)
    }
}

impl Decode for Vec<u8> {
    fn decode(raw: Bytes) -> Result<Self, Error> {
        Ok(raw.to_vec())
    }
}

impl Decode for String {
    fn decode(raw: Bytes) -> Result<Self, Error> {
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }
}

impl Decode for serde_json::Value {
    fn decode(raw: Bytes) -> Result<Self, Error> {
        serde_json::from_slice(&raw).map_err(Error::Decode)
    }
}

/// Marker for "parse the body as JSON into `T`".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T> Json<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> std::ops::Deref for Json<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: DeserializeOwned> Decode for Json<T> {
    fn decode(raw: Bytes) -> Result<Self, Error> {
        serde_json::from_slice(&raw).map(Json).map_err(Error::Decode)
    }
}
