//! Request body conversion

use crate::error::EngineResult;
use crate::types::{DataPoint, NewParser, NewResource, NewStream};

/// Anything that can become a JSON request body
///
/// Strings are taken as already-serialized JSON and sent verbatim; they are
/// not parsed or validated locally, so malformed documents are rejected by
/// the platform rather than the client.
pub trait Payload {
    fn to_body(&self) -> EngineResult<String>;
}

impl Payload for str {
    fn to_body(&self) -> EngineResult<String> {
        Ok(self.to_string())
    }
}

impl Payload for String {
    fn to_body(&self) -> EngineResult<String> {
        Ok(self.clone())
    }
}

impl Payload for serde_json::Value {
    fn to_body(&self) -> EngineResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<P: Payload + ?Sized> Payload for &P {
    fn to_body(&self) -> EngineResult<String> {
        (**self).to_body()
    }
}

macro_rules! json_payload {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Payload for $ty {
                fn to_body(&self) -> EngineResult<String> {
                    Ok(serde_json::to_string(self)?)
                }
            }
        )+
    };
}

json_payload!(NewResource, NewStream, NewParser, DataPoint);
