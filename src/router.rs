use crate::error::{ServerError, ServerResult};
use crate::http::{Method, Status};
use crate::request::Request;
use crate::response::Response;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Anything that can answer a request locally.
///
/// Handlers report misses and bad input as typed errors
/// (`ServerError::NotFound`, `ServerError::BadRequest`); the dispatcher turns
/// those into canned responses.
pub trait RequestHandler: Send + Sync {
    fn handle_request(&self, request: &Request) -> ServerResult<Response>;
}

impl<F> RequestHandler for F
where
    F: Fn(&Request) -> ServerResult<Response> + Send + Sync,
{
    fn handle_request(&self, request: &Request) -> ServerResult<Response> {
        self(request)
    }
}

/// A handler function for processing HTTP requests
pub type HandlerFn = Arc<dyn Fn(&Request) -> ServerResult<Response> + Send + Sync>;

/// A route entry in the router
#[derive(Clone)]
struct RouteEntry {
    method: Method,
    path: String,
    handler: HandlerFn,
}

// Custom Debug implementation for RouteEntry since handler can't be automatically derived
impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("handler", &"<function>")
            .finish()
    }
}

/// A static route table for local requests
#[derive(Clone, Default)]
pub struct Router {
    routes: Vec<RouteEntry>,
    not_found_handler: Option<HandlerFn>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes)
            .field("not_found_handler", &self.not_found_handler.is_some())
            .finish()
    }
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route to the router
    pub fn add_route<F>(&mut self, method: Method, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&Request) -> ServerResult<Response> + Send + Sync + 'static,
    {
        self.routes.push(RouteEntry {
            method,
            path: path.to_string(),
            handler: Arc::new(handler),
        });

        self
    }

    pub fn get<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&Request) -> ServerResult<Response> + Send + Sync + 'static,
    {
        self.add_route(Method::Get, path, handler)
    }

    pub fn post<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&Request) -> ServerResult<Response> + Send + Sync + 'static,
    {
        self.add_route(Method::Post, path, handler)
    }

    pub fn put<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&Request) -> ServerResult<Response> + Send + Sync + 'static,
    {
        self.add_route(Method::Put, path, handler)
    }

    pub fn delete<F>(&mut self, path: &str, handler: F) -> &mut Self
    where
        F: Fn(&Request) -> ServerResult<Response> + Send + Sync + 'static,
    {
        self.add_route(Method::Delete, path, handler)
    }

    /// Answer unmatched requests with this handler instead of a 404
    pub fn set_not_found_handler<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&Request) -> ServerResult<Response> + Send + Sync + 'static,
    {
        self.not_found_handler = Some(Arc::new(handler));
        self
    }

    /// Check if a path matches a route pattern
    fn path_matches(&self, pattern: &str, path: &str) -> bool {
        if pattern == path {
            return true;
        }

        // Wildcard match at end (e.g., "/users/*")
        if let Some(prefix) = pattern.strip_suffix('*') {
            return path.starts_with(prefix);
        }

        // Path parameters (e.g., "/users/:id") match any single segment
        let pattern_segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
        let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if pattern_segments.len() != path_segments.len() {
            return false;
        }

        pattern_segments
            .iter()
            .zip(&path_segments)
            .all(|(pattern_seg, path_seg)| pattern_seg.starts_with(':') || pattern_seg == path_seg)
    }

    /// Extract path parameters from a request path based on a route pattern
    pub fn extract_params(&self, pattern: &str, path: &str) -> HashMap<String, String> {
        let mut params = HashMap::new();

        if !pattern.contains(':') {
            return params;
        }

        let pattern_segments: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
        let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        if pattern_segments.len() != path_segments.len() {
            return params;
        }

        for (pattern_seg, path_seg) in pattern_segments.iter().zip(&path_segments) {
            if let Some(name) = pattern_seg.strip_prefix(':') {
                params.insert(name.to_string(), path_seg.to_string());
            }
        }

        params
    }
}

impl RequestHandler for Router {
    fn handle_request(&self, request: &Request) -> ServerResult<Response> {
        for route in &self.routes {
            if route.method == request.method() && self.path_matches(&route.path, request.path()) {
                let params = self.extract_params(&route.path, request.path());
                if params.is_empty() {
                    return (route.handler)(request);
                }

                // `:name` segments are handed to the handler as parameters
                let mut request = request.clone();
                for (name, value) in &params {
                    request.set_param(name, value)?;
                }
                return (route.handler)(&request);
            }
        }

        match &self.not_found_handler {
            Some(handler) => handler(request),
            None => Err(ServerError::NotFound(format!(
                "{} {}",
                request.method(),
                request.path()
            ))),
        }
    }
}

/// A handler that answers every request with the same canned status
pub fn canned(status: Status) -> impl Fn(&Request) -> ServerResult<Response> + Send + Sync {
    move |_| Ok(Response::from(status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_router_exact_match() {
        let mut router = Router::new();
        router.get("/", |_| Ok(Response::text("Home")));
        router.get("/users", |_| Ok(Response::text("Users")));

        let response = router.handle_request(&Request::new(Method::Get, "/")).unwrap();
        assert!(response.is_ok());
        assert_eq!(response.body(), b"Home");

        let response = router
            .handle_request(&Request::new(Method::Get, "/users?page=2"))
            .unwrap();
        assert_eq!(response.body(), b"Users");

        let result = router.handle_request(&Request::new(Method::Get, "/not-found"));
        assert!(matches!(result, Err(ServerError::NotFound(_))));
    }

    #[test]
    fn test_router_method_matching() {
        let mut router = Router::new();
        router.get("/api", |_| Ok(Response::text("GET")));
        router.post("/api", |_| Ok(Response::text("POST")));

        let response = router.handle_request(&Request::new(Method::Post, "/api")).unwrap();
        assert_eq!(response.body(), b"POST");

        let result = router.handle_request(&Request::new(Method::Put, "/api"));
        assert!(matches!(result, Err(ServerError::NotFound(_))));
    }

    #[test]
    fn test_router_wildcards_and_params() {
        let mut router = Router::new();
        router.get("/static/*", |req| Ok(Response::text(req.path())));
        router.get("/users/:id", |req| Ok(Response::text(req.param("id").unwrap_or("-"))));

        let response = router
            .handle_request(&Request::new(Method::Get, "/static/css/site.css"))
            .unwrap();
        assert_eq!(response.body(), b"/static/css/site.css");
        let response = router
            .handle_request(&Request::new(Method::Get, "/users/7?id=9&sort=asc"))
            .unwrap();
        assert_eq!(response.body(), b"7");

        let params = router.extract_params("/users/:id/posts/:post_id", "/users/123/posts/456");
        assert_eq!(params.get("id").unwrap(), "123");
        assert_eq!(params.get("post_id").unwrap(), "456");
        assert!(router.extract_params("/users", "/users").is_empty());
    }

    #[test]
    fn test_not_found_handler() {
        let mut router = Router::new();
        router.set_not_found_handler(canned(Status::AccessDenied));
        let response = router.handle_request(&Request::new(Method::Get, "/x")).unwrap();
        assert_eq!(response.status_code(), 403);
    }
}
