pub mod acceptor;
pub mod buffer;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod logging;
pub mod message;
pub mod reader;
pub mod registry;
pub mod request;
pub mod response;
pub mod router;
pub mod routing;
pub mod server;

/// Re-exports of common components for easier access
pub use acceptor::{ConnectionAcceptor, ConnectionHandler};
pub use config::ServerConfig;
pub use connection::Connection;
pub use dispatcher::Dispatcher;
pub use error::{ServerError, ServerResult};
pub use http::{Method, Status};
pub use message::Message;
pub use reader::LineByteReader;
pub use registry::HandlerRegistry;
pub use request::Request;
pub use response::Response;
pub use router::{RequestHandler, Router};
pub use routing::{Module, RoutingTable};
pub use server::Server;
