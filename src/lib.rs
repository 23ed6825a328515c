//! a single-threaded-per-connection HTTP/1.x server framework core (`spec.md` §1's OVERVIEW):
//! parsing, request/response dispatch, and connection-lifetime management, decoupled from any
//! particular reactor or transport via the [`net::Endpoint`]/[`net::Connection`] collaborator
//! interfaces.

pub mod buffer;
pub mod clock;
pub mod config;
pub mod h1;
pub mod log;
pub mod net;
pub mod reactor;
pub mod service;

pub use config::ServerConfig;
pub use h1::{Http1ConnectionFactory, HttpRequest, HttpResponse, Transport};
pub use net::{Connector, ConnectorConfig};
pub use service::{HandlerError, HttpHandler};
