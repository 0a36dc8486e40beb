//! Local handlers resolved by route key and created on first use.
//!
//! A request for `/shop/cart` asks for the handler registered under
//! `shop.cart`. The first handler built for a key is cached and shared by
//! all later requests; a failed build is retried on the next request.

use crate::error::{ServerError, ServerResult};
use crate::request::Request;
use crate::response::Response;
use crate::router::RequestHandler;
use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Builds a handler instance for one route key
pub type HandlerFactory = Arc<dyn Fn() -> ServerResult<Arc<dyn RequestHandler>> + Send + Sync>;

#[derive(Default)]
pub struct HandlerRegistry {
    factories: HashMap<String, HandlerFactory>,
    resolved: RwLock<HashMap<String, Arc<dyn RequestHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, key: &str, factory: F) -> &mut Self
    where
        F: Fn() -> ServerResult<Arc<dyn RequestHandler>> + Send + Sync + 'static,
    {
        self.factories.insert(key.to_string(), Arc::new(factory));
        self
    }

    /// Route key for a request path: `/shop/cart` → `shop.cart`
    pub fn route_key(path: &str) -> String {
        path.trim_start_matches('/').replace('/', ".")
    }

    pub fn is_cached(&self, key: &str) -> bool {
        self.resolved.read().contains_key(key)
    }

    /// The cached handler for `key`, creating it on first use
    pub fn resolve(&self, key: &str) -> ServerResult<Arc<dyn RequestHandler>> {
        if let Some(handler) = self.resolved.read().get(key) {
            return Ok(handler.clone());
        }

        let factory = self
            .factories
            .get(key)
            .ok_or_else(|| ServerError::NotFound(format!("no handler for {}", key)))?;

        // Built without holding the lock; a concurrent first build may win
        let handler = factory()?;
        let handler = self
            .resolved
            .write()
            .entry(key.to_string())
            .or_insert_with(|| {
                debug!("created handler for {}", key);
                handler
            })
            .clone();
        Ok(handler)
    }
}

impl RequestHandler for HandlerRegistry {
    fn handle_request(&self, request: &Request) -> ServerResult<Response> {
        let handler = self.resolve(&Self::route_key(request.path()))?;
        handler.handle_request(request)
    }
}
