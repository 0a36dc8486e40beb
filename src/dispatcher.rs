use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::{ServerError, ServerResult};
use crate::http::{Status, HF_HOST};
use crate::reader::LineByteReader;
use crate::request::Request;
use crate::response::Response;
use crate::router::RequestHandler;
use crate::routing::{Module, RoutingTable};
use log::{debug, error, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// Per-connection orchestration: read one request, answer it locally or
/// through a module, and write the response back.
///
/// This is the only place that turns errors into canned responses.
pub struct Dispatcher {
    hostname: String,
    timeout: Duration,
    max_buffer_size: usize,
    compress_responses: bool,
    expiration_hours: i64,
    routing: Arc<RoutingTable>,
    handler: Arc<dyn RequestHandler>,
}

impl Dispatcher {
    pub fn new(
        config: &ServerConfig,
        routing: Arc<RoutingTable>,
        handler: Arc<dyn RequestHandler>,
    ) -> Self {
        Self {
            hostname: config.hostname.clone(),
            timeout: config.socket_timeout(),
            max_buffer_size: config.max_buffer_size,
            compress_responses: config.compress_responses,
            expiration_hours: config.expiration_hours,
            routing,
            handler,
        }
    }

    /// Serve one request/response exchange. Failures are logged, never returned.
    pub fn handle_connection(&self, connection: &mut Connection) {
        debug!(
            "new connection {} from {}",
            connection.id(),
            connection.peer_addr()
        );

        if let Err(e) = self.exchange(connection) {
            warn!(
                "connection {} from {} aborted: {}",
                connection.id(),
                connection.peer_addr(),
                e
            );
        }
    }

    fn exchange(&self, connection: &mut Connection) -> ServerResult<()> {
        connection.set_timeout(self.timeout)?;
        let mut reader = LineByteReader::with_limit(connection.reader()?, self.max_buffer_size);

        let mut response = match Request::parse(&mut reader) {
            Ok(request) => {
                debug!("{} {}", request.method(), request.uri());
                self.respond(&request)
            }
            Err(e) if e.is_transport() => return Err(e),
            Err(e) => {
                debug!("rejecting request from {}: {}", connection.peer_addr(), e);
                Response::from(e.status())
            }
        };

        response.set_header(HF_HOST, &self.hostname);
        response.write_to(connection)
    }

    /// Produce the response for a parsed request
    pub fn respond(&self, request: &Request) -> Response {
        match self.routing.resolve(request.path()) {
            Some((module, path)) => self.forward(request, &module, &path),
            None => self.handle_locally(request),
        }
    }

    fn forward(&self, request: &Request, module: &Module, path: &str) -> Response {
        let forwarded = request.forwarded(path);
        match self.relay(&forwarded, module) {
            Ok(response) => response,
            Err(e) => {
                debug!("forwarding {} to {} failed: {}", request.path(), module, e);
                Response::from(Status::InternalServerError)
            }
        }
    }

    fn relay(&self, request: &Request, module: &Module) -> ServerResult<Response> {
        let mut connection = Connection::connect(&module.hostname, module.port, self.timeout)?;
        let mut reader = LineByteReader::with_limit(connection.reader()?, self.max_buffer_size);

        let response = request
            .send_to(&mut connection, &mut reader)
            .map_err(|e| ServerError::Forwarding(format!("{}: {}", module, e)));

        let _ = connection.close();
        response
    }

    fn handle_locally(&self, request: &Request) -> Response {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.handler.handle_request(request)));

        let mut response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                debug!("{} {}: {}", request.method(), request.path(), e);
                Response::from(e.status())
            }
            Err(_) => {
                error!("handler panicked on {} {}", request.method(), request.path());
                Response::from(Status::InternalServerError)
            }
        };

        response.expire(self.expiration_hours);
        if self.compress_responses {
            response.compress_with_gzip(request);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Method, HF_ACCEPT_ENCODING, HF_CONTENT_ENCODING, HF_EXPIRES};
    use crate::router::Router;

    fn dispatcher(config: &ServerConfig, routing: RoutingTable, router: Router) -> Dispatcher {
        Dispatcher::new(config, Arc::new(routing), Arc::new(router))
    }

    #[test]
    fn test_local_miss_is_404() {
        let dispatcher = dispatcher(&ServerConfig::new(), RoutingTable::new(), Router::new());
        let response = dispatcher.respond(&Request::new(Method::Get, "/nothing/here"));
        assert_eq!(response.status_code(), 404);
        assert!(String::from_utf8_lossy(response.body()).contains("not found"));
    }

    #[test]
    fn test_handler_errors_become_canned_responses() {
        let mut router = Router::new();
        router.get("/bad", |_| Err(ServerError::BadRequest("missing id".to_string())));
        router.get("/broken", |_| Err(ServerError::Handler("database down".to_string())));
        router.get("/panic", |_| panic!("handler bug"));
        let dispatcher = dispatcher(&ServerConfig::new(), RoutingTable::new(), router);

        let status = |path: &str| dispatcher.respond(&Request::new(Method::Get, path)).status_code();
        assert_eq!(status("/bad"), 400);
        assert_eq!(status("/broken"), 500);
        assert_eq!(status("/panic"), 500);
    }

    #[test]
    fn test_unreachable_module_is_500() {
        // Grab a free port and release it so nothing listens there
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let routing =
            RoutingTable::from_modules(vec![Module::new("a", "127.0.0.1", port).unwrap()]).unwrap();
        let config = ServerConfig::new().with_socket_timeout(Duration::from_millis(500));
        let dispatcher = dispatcher(&config, routing, Router::new());

        let response = dispatcher.respond(&Request::new(Method::Get, "/a/foo"));
        assert_eq!(response.status_code(), 500);
    }

    #[test]
    fn test_response_policy_applies_to_local_responses() {
        let mut router = Router::new();
        router.get("/page", |_| Ok(Response::text("some page content")));
        let config = ServerConfig::new()
            .with_compression(true)
            .with_expiration_hours(1);
        let dispatcher = dispatcher(&config, RoutingTable::new(), router);

        let mut request = Request::new(Method::Get, "/page");
        request.set_header(HF_ACCEPT_ENCODING, "gzip");
        let response = dispatcher.respond(&request);
        assert_eq!(response.header(HF_CONTENT_ENCODING), Some("gzip"));
        assert!(response.has_header(HF_EXPIRES));

        let response = dispatcher.respond(&Request::new(Method::Get, "/page"));
        assert_eq!(response.body(), b"some page content");
    }

    #[test]
    fn test_unrepresentable_expiration_still_answers() {
        let mut router = Router::new();
        router.get("/page", |_| Ok(Response::text("page")));
        let config = ServerConfig::new().with_expiration_hours(i64::MAX);
        let dispatcher = dispatcher(&config, RoutingTable::new(), router);

        let response = dispatcher.respond(&Request::new(Method::Get, "/page"));
        assert_eq!(response.status_code(), 200);
        assert!(!response.has_header(HF_EXPIRES));
    }
}
