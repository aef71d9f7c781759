//! Sense Engine - client for a sensor-data platform
//!
//! Manages resources (data sources), their streams (measurement channels)
//! and parsers (rules turning raw input into stream values) over the
//! platform's HTTP+JSON API.
//!
//! ## Features
//!
//! - **Blocking operations** - one request/response exchange per call, with an explicit timeout
//! - **Raw or typed payloads** - pre-serialized JSON strings or the model types in [`types`]
//! - **Typed failures** - configuration, transport, remote status and protocol errors
//! - **Explicit delete ordering** - optional child-first deletion of resources
//!
//! ## Quick Start
//!
//! ```no_run
//! use sense_engine::Engine;
//!
//! fn main() -> Result<(), sense_engine::EngineError> {
//!     let engine = Engine::connect("http://localhost:8080", "1")?;
//!
//!     let resource = engine.create_resource(r#"{"label":"demo42"}"#)?;
//!     let stream = engine.create_stream(&resource, r#"{"description":"light measure"}"#)?;
//!     engine.post_stream_data(&resource, &stream, r#"{"value":"3113"}"#)?;
//!     println!("{}", engine.get_stream_data(&resource, &stream)?);
//!
//!     engine.delete_resource(&resource)?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod path;
pub mod payload;
pub mod types;

// Re-exports for convenience
pub use config::{ConfigLoader, DeletePolicy, EngineConfig};
pub use engine::Engine;
pub use error::{ConfigError, EngineError, EngineResult};
pub use payload::Payload;
pub use types::{
    DataPoint, DataQuery, EntitySummary, Identity, NewParser, NewResource, NewStream, ParserId,
    ResourceId, StreamId,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
