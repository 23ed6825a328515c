//! HTTP/1.x wire protocol (`spec.md` §2's `h1` module): request-line/header parsing, the request
//! dispatch channel, response encoding, and the per-connection [`transport::Transport`] state
//! machine that ties them to a [`crate::net::Endpoint`].

pub mod body;
pub mod channel;
pub mod codec;
pub mod date;
pub mod encode;
pub mod error;
pub mod factory;
pub mod header;
pub mod parser;
pub mod request;
pub mod response;
pub mod transport;
pub mod version;

pub use factory::Http1ConnectionFactory;
pub use request::HttpRequest;
pub use response::HttpResponse;
pub use transport::Transport;
pub use version::HttpVersion;
