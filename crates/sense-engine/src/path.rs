//! Request address construction
//!
//! Every entity lives under `users/{identity}` on the configured endpoint.
//! Identifiers are pushed as single path segments, so `url` percent-escapes
//! anything that is not a valid segment character.

use crate::error::{EngineError, EngineResult};
use crate::types::{Identity, ParserId, ResourceId, StreamId};
use url::Url;

/// Addressable platform locations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Resources,
    Resource(&'a ResourceId),
    Streams(&'a ResourceId),
    Stream(&'a ResourceId, &'a StreamId),
    Parsers(&'a ResourceId),
    Parser(&'a ResourceId, &'a ParserId),
    StreamData(&'a ResourceId, &'a StreamId),
}

impl<'a> Route<'a> {
    fn segments(&self) -> Vec<&'a str> {
        match *self {
            Route::Resources => vec!["resources"],
            Route::Resource(rid) => vec!["resources", rid.as_str()],
            Route::Streams(rid) => vec!["resources", rid.as_str(), "streams"],
            Route::Stream(rid, sid) => vec!["resources", rid.as_str(), "streams", sid.as_str()],
            Route::Parsers(rid) => vec!["resources", rid.as_str(), "parsers"],
            Route::Parser(rid, pid) => vec!["resources", rid.as_str(), "parsers", pid.as_str()],
            Route::StreamData(rid, sid) => {
                vec!["resources", rid.as_str(), "streams", sid.as_str(), "data"]
            }
        }
    }

    /// Full address of this route for `identity` under `base`
    pub fn url(&self, base: &Url, identity: &Identity) -> EngineResult<Url> {
        let segments = self.segments();
        // `url` silently drops "." and ".." segments
        if std::iter::once(identity.as_str())
            .chain(segments.iter().copied())
            .any(|segment| matches!(segment, "" | "." | ".."))
        {
            return Err(EngineError::configuration(format!(
                "empty or dot-segment identifier in request path {}",
                segments.join("/")
            )));
        }

        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| EngineError::configuration(format!("endpoint cannot carry a path: {base}")))?
            .pop_if_empty()
            .push("users")
            .push(identity.as_str())
            .extend(segments);
        Ok(url)
    }
}
