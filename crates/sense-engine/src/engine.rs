//! Blocking client for the platform REST API
//!
//! Each operation is one request/response exchange: build the address, attach
//! the identity, send, then either extract the created identifier or return
//! the body verbatim.

use crate::config::{DeletePolicy, EngineConfig};
use crate::error::{EngineError, EngineResult};
use crate::path::Route;
use crate::payload::Payload;
use crate::types::{
    DataPoint, DataQuery, EntitySummary, Identity, ParserId, ResourceId, StreamId,
};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Client bound to one platform endpoint and one identity
///
/// The engine holds no per-call state. Concurrent calls on a shared `&Engine`
/// are independent; rebinding the identity needs `&mut self`, so it cannot
/// race with calls in flight. [`Engine::with_identity`] gives a second value
/// that shares the connection pool.
#[derive(Debug, Clone)]
pub struct Engine {
    http: Client,
    base: Url,
    config: Arc<EngineConfig>,
    identity: Identity,
    identity_header: HeaderName,
    identity_value: HeaderValue,
}

impl Engine {
    /// Create an engine for the default endpoint
    pub fn new(identity: impl Into<String>) -> EngineResult<Self> {
        Self::from_config(EngineConfig {
            identity: identity.into(),
            ..Default::default()
        })
    }

    /// Create an engine for `endpoint`
    pub fn connect(endpoint: impl Into<String>, identity: impl Into<String>) -> EngineResult<Self> {
        Self::from_config(EngineConfig::new(endpoint, identity))
    }

    /// Create an engine from a full configuration
    ///
    /// No network traffic happens here.
    pub fn from_config(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let base = config.endpoint_url()?;
        let identity = Identity::new(config.identity.clone())?;
        let identity_value = header_value(&identity)?;
        let identity_header = HeaderName::from_bytes(config.identity_header.trim().as_bytes())
            .map_err(|e| {
                EngineError::configuration(format!(
                    "invalid identity header {}: {e}",
                    config.identity_header
                ))
            })?;

        let http = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()
            .map_err(|e| EngineError::configuration(format!("failed to build HTTP client: {e}")))?;

        debug!(
            "Engine bound to {} as {} (timeout {:?})",
            base,
            identity,
            config.timeout()
        );

        Ok(Self {
            http,
            base,
            config: Arc::new(config),
            identity,
            identity_header,
            identity_value,
        })
    }

    /// Identity used for subsequent requests
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Base endpoint
    pub fn endpoint(&self) -> &Url {
        &self.base
    }

    /// Get configuration reference
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Rebind the identity for all later calls
    pub fn set_identity(&mut self, identity: impl Into<String>) -> EngineResult<()> {
        let identity = Identity::new(identity)?;
        self.identity_value = header_value(&identity)?;
        debug!("Identity rebound to {}", identity);
        Arc::make_mut(&mut self.config).identity = identity.to_string();
        self.identity = identity;
        Ok(())
    }

    /// Copy of this engine bound to another identity
    pub fn with_identity(&self, identity: impl Into<String>) -> EngineResult<Self> {
        let mut engine = self.clone();
        engine.set_identity(identity)?;
        Ok(engine)
    }

    /// Create a resource and return its identifier
    pub fn create_resource<P: Payload + ?Sized>(&self, payload: &P) -> EngineResult<ResourceId> {
        let id = self.create(Route::Resources, payload)?;
        info!("Created resource {}", id);
        Ok(ResourceId::from(id))
    }

    /// Create a stream under `resource`
    pub fn create_stream<P: Payload + ?Sized>(
        &self,
        resource: &ResourceId,
        payload: &P,
    ) -> EngineResult<StreamId> {
        let id = self.create(Route::Streams(resource), payload)?;
        info!("Created stream {} on resource {}", id, resource);
        Ok(StreamId::from(id))
    }

    /// Create a parser under `resource`
    ///
    /// The owning stream is named by the payload's `stream_id`, not by the
    /// request path.
    pub fn create_parser<P: Payload + ?Sized>(
        &self,
        resource: &ResourceId,
        payload: &P,
    ) -> EngineResult<ParserId> {
        let id = self.create(Route::Parsers(resource), payload)?;
        info!("Created parser {} on resource {}", id, resource);
        Ok(ParserId::from(id))
    }

    /// Delete a resource
    ///
    /// With [`DeletePolicy::Cascade`] this is exactly one request and the
    /// platform removes the resource's streams and parsers. With
    /// [`DeletePolicy::Explicit`] parsers and then streams are listed and
    /// deleted first. A failure part way leaves the remaining entities in
    /// place.
    pub fn delete_resource(&self, resource: &ResourceId) -> EngineResult<()> {
        if self.config.delete_policy == DeletePolicy::Explicit {
            self.delete_children(resource)?;
        }
        self.execute(self.request(Method::DELETE, Route::Resource(resource))?)?;
        info!("Deleted resource {}", resource);
        Ok(())
    }

    /// Append a data point to a stream, returning the platform's reply
    pub fn post_stream_data<P: Payload + ?Sized>(
        &self,
        resource: &ResourceId,
        stream: &StreamId,
        payload: &P,
    ) -> EngineResult<String> {
        let request = self.request(Method::POST, Route::StreamData(resource, stream))?;
        self.execute(with_body(request, payload)?)
    }

    /// Stored measurements of a stream, verbatim
    pub fn get_stream_data(&self, resource: &ResourceId, stream: &StreamId) -> EngineResult<String> {
        self.get_stream_data_with(resource, stream, &DataQuery::default())
    }

    /// Stored measurements of a stream filtered by `query`, verbatim
    pub fn get_stream_data_with(
        &self,
        resource: &ResourceId,
        stream: &StreamId,
        query: &DataQuery,
    ) -> EngineResult<String> {
        let mut request = self.request(Method::GET, Route::StreamData(resource, stream))?;
        let pairs = query.pairs();
        if !pairs.is_empty() {
            request = request.query(&pairs);
        }
        self.execute(request)
    }

    /// Stored measurements decoded as data points
    pub fn get_data_points(
        &self,
        resource: &ResourceId,
        stream: &StreamId,
    ) -> EngineResult<Vec<DataPoint>> {
        let body = self.get_stream_data(resource, stream)?;
        serde_json::from_str(&body)
            .map_err(|e| EngineError::protocol(format!("stream data is not a list of points: {e}")))
    }

    /// All resources of the bound identity, verbatim
    pub fn list_resources(&self) -> EngineResult<String> {
        self.read(Route::Resources)
    }

    /// One resource, verbatim
    pub fn get_resource(&self, resource: &ResourceId) -> EngineResult<String> {
        self.read(Route::Resource(resource))
    }

    /// Replace a resource's attributes
    pub fn update_resource<P: Payload + ?Sized>(
        &self,
        resource: &ResourceId,
        payload: &P,
    ) -> EngineResult<()> {
        self.update(Route::Resource(resource), payload)
    }

    /// Streams of a resource, verbatim
    pub fn list_streams(&self, resource: &ResourceId) -> EngineResult<String> {
        self.read(Route::Streams(resource))
    }

    /// One stream, verbatim
    pub fn get_stream(&self, resource: &ResourceId, stream: &StreamId) -> EngineResult<String> {
        self.read(Route::Stream(resource, stream))
    }

    /// Replace a stream's attributes
    pub fn update_stream<P: Payload + ?Sized>(
        &self,
        resource: &ResourceId,
        stream: &StreamId,
        payload: &P,
    ) -> EngineResult<()> {
        self.update(Route::Stream(resource, stream), payload)
    }

    /// Delete one stream
    pub fn delete_stream(&self, resource: &ResourceId, stream: &StreamId) -> EngineResult<()> {
        self.execute(self.request(Method::DELETE, Route::Stream(resource, stream))?)?;
        info!("Deleted stream {} on resource {}", stream, resource);
        Ok(())
    }

    /// Parsers of a resource, verbatim
    pub fn list_parsers(&self, resource: &ResourceId) -> EngineResult<String> {
        self.read(Route::Parsers(resource))
    }

    /// One parser, verbatim
    pub fn get_parser(&self, resource: &ResourceId, parser: &ParserId) -> EngineResult<String> {
        self.read(Route::Parser(resource, parser))
    }

    /// Replace a parser's attributes
    pub fn update_parser<P: Payload + ?Sized>(
        &self,
        resource: &ResourceId,
        parser: &ParserId,
        payload: &P,
    ) -> EngineResult<()> {
        self.update(Route::Parser(resource, parser), payload)
    }

    /// Delete one parser
    pub fn delete_parser(&self, resource: &ResourceId, parser: &ParserId) -> EngineResult<()> {
        self.execute(self.request(Method::DELETE, Route::Parser(resource, parser))?)?;
        info!("Deleted parser {} on resource {}", parser, resource);
        Ok(())
    }

    fn delete_children(&self, resource: &ResourceId) -> EngineResult<()> {
        let parsers = self.child_ids(Route::Parsers(resource))?;
        let streams = self.child_ids(Route::Streams(resource))?;
        debug!(
            "Deleting {} parsers and {} streams of resource {}",
            parsers.len(),
            streams.len(),
            resource
        );

        for parser in parsers {
            self.delete_parser(resource, &ParserId::from(parser))?;
        }
        for stream in streams {
            self.delete_stream(resource, &StreamId::from(stream))?;
        }
        Ok(())
    }

    fn child_ids(&self, route: Route<'_>) -> EngineResult<Vec<String>> {
        let body = self.read(route)?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        let children: Vec<EntitySummary> = serde_json::from_str(&body)
            .map_err(|e| EngineError::protocol(format!("unexpected listing: {e}")))?;
        Ok(children.into_iter().map(|child| child.id).collect())
    }

    fn create<P: Payload + ?Sized>(&self, route: Route<'_>, payload: &P) -> EngineResult<String> {
        let request = self.request(Method::POST, route)?;
        let body = self.execute(with_body(request, payload)?)?;
        extract_identifier(&body)
    }

    fn read(&self, route: Route<'_>) -> EngineResult<String> {
        self.execute(self.request(Method::GET, route)?)
    }

    fn update<P: Payload + ?Sized>(&self, route: Route<'_>, payload: &P) -> EngineResult<()> {
        let request = self.request(Method::PUT, route)?;
        self.execute(with_body(request, payload)?)?;
        Ok(())
    }

    /// Address the route and attach the credentials
    fn request(&self, method: Method, route: Route<'_>) -> EngineResult<RequestBuilder> {
        let url = route.url(&self.base, &self.identity)?;
        debug!("{} {}", method, url);

        let mut request = self
            .http
            .request(method, url)
            .header(self.identity_header.clone(), self.identity_value.clone());
        if let Some(key) = &self.config.api_key {
            request = request.query(&[("key", key)]);
        }
        Ok(request)
    }

    /// Send and map non-success statuses to [`EngineError::Remote`]
    fn execute(&self, request: RequestBuilder) -> EngineResult<String> {
        let response = request.send()?;
        let status = response.status();
        let body = response.text()?;

        if status.is_success() {
            Ok(body)
        } else {
            if status.is_server_error() {
                warn!("Server error {}: {}", status, body);
            } else {
                debug!("Request rejected with {}: {}", status, body);
            }
            Err(EngineError::remote(status.as_u16(), body))
        }
    }
}

fn with_body<P: Payload + ?Sized>(request: RequestBuilder, payload: &P) -> EngineResult<RequestBuilder> {
    Ok(request
        .header(CONTENT_TYPE, "application/json")
        .body(payload.to_body()?))
}

fn header_value(identity: &Identity) -> EngineResult<HeaderValue> {
    if !identity.as_str().is_ascii() {
        return Err(EngineError::configuration(format!(
            "identity {identity} must be ASCII to be sent as a header value"
        )));
    }
    HeaderValue::from_str(identity.as_str()).map_err(|_| {
        EngineError::configuration(format!(
            "identity {identity} cannot be sent as a header value"
        ))
    })
}

/// Identifier of a created entity
///
/// The platform answers creates with the bare identifier as text, not a JSON
/// document, so the body is only trimmed.
fn extract_identifier(body: &str) -> EngineResult<String> {
    let id = body.trim();
    if id.is_empty() {
        return Err(EngineError::protocol(
            "create succeeded but the response carried no identifier",
        ));
    }
    Ok(id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_extract_identifier_trims() {
        assert_eq!(extract_identifier("42").unwrap(), "42");
        assert_eq!(extract_identifier("  r-17\r\n").unwrap(), "r-17");
    }

    #[test]
    fn test_extract_identifier_does_not_decode_json() {
        assert_eq!(extract_identifier("\"42\"").unwrap(), "\"42\"");
        assert_eq!(extract_identifier(r#"{"id":42}"#).unwrap(), r#"{"id":42}"#);
    }

    #[test]
    fn test_extract_identifier_empty_is_protocol_error() {
        assert!(matches!(extract_identifier(""), Err(EngineError::Protocol(_))));
        assert!(matches!(extract_identifier(" \n\t"), Err(EngineError::Protocol(_))));
    }

    #[test]
    fn test_new_rejects_empty_identity() {
        assert!(matches!(Engine::new(""), Err(EngineError::Configuration(_))));
        assert!(matches!(
            Engine::connect("http://localhost:8080", "  "),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn test_new_rejects_bad_endpoint() {
        assert!(matches!(
            Engine::connect("localhost:8080/api", "1"),
            Err(EngineError::Configuration(_))
        ));
        assert!(matches!(
            Engine::connect("", "1"),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn test_non_ascii_identity_rejected_for_header() {
        assert!(matches!(
            Engine::new("anv\u{e4}ndare"),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_identity_header_rejected() {
        let config = EngineConfig {
            identity_header: "X User".to_string(),
            ..EngineConfig::new("http://localhost:8080", "1")
        };
        assert!(matches!(
            Engine::from_config(config),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn test_set_identity_rebinds() {
        let mut engine = Engine::new("1").unwrap();
        engine.set_identity("2").unwrap();
        assert_eq!(engine.identity().as_str(), "2");
        assert_eq!(engine.config().identity, "2");

        // failed rebind keeps the previous identity
        assert!(engine.set_identity("").is_err());
        assert!(engine.set_identity("anv\u{e4}ndare").is_err());
        assert_eq!(engine.identity().as_str(), "2");
        assert_eq!(engine.config().identity, "2");
    }

    #[test]
    fn test_rebuild_from_config_keeps_rebound_identity() {
        let mut engine = Engine::new("1").unwrap();
        engine.set_identity("2").unwrap();
        let rebuilt = Engine::from_config(engine.config().clone()).unwrap();
        assert_eq!(rebuilt.identity().as_str(), "2");
    }

    #[test]
    fn test_with_identity_leaves_original() {
        let engine = Engine::new("1").unwrap();
        let other = engine.with_identity("2").unwrap();
        assert_eq!(engine.identity().as_str(), "1");
        assert_eq!(engine.config().identity, "1");
        assert_eq!(other.identity().as_str(), "2");
        assert_eq!(other.config().identity, "2");
        assert_eq!(other.endpoint(), engine.endpoint());
    }

    #[test]
    fn test_config_timeout_applied() {
        let config = EngineConfig::new("http://localhost:8080", "1")
            .with_timeout(Duration::from_secs(2));
        let engine = Engine::from_config(config).unwrap();
        assert_eq!(engine.config().timeout(), Duration::from_secs(2));
    }

    #[test]
    fn test_engine_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
    }
}
