//! The control-plane server: config loading, logging bootstrap, and the
//! `PdService` trait plus its in-process implementation. The `pd-server`
//! binary (`src/main.rs`) is the thinnest possible shell around this
//! library so integration tests can drive `PdServer` directly without a
//! transport in the loop.

pub mod config;
pub mod error;
pub mod service;

pub use config::{Cli, ServerConfig};
pub use error::{Error, Result, ServiceError};
pub use service::{PdServer, PdService, RequestHeader, ResponseHeader};
