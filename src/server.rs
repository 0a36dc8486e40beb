use crate::acceptor::{ConnectionAcceptor, ConnectionHandler};
use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::dispatcher::Dispatcher;
use crate::error::{ServerError, ServerResult};
use crate::router::RequestHandler;
use crate::routing::RoutingTable;
use log::info;
use std::net::SocketAddr;
use std::sync::Arc;

/// The server core: configuration, routing table, local handler and acceptor.
///
/// The process entry point calls [`Server::init`] and then [`Server::start`]
/// (or [`Server::run`] for both).
pub struct Server {
    config: ServerConfig,
    handler: Arc<dyn RequestHandler>,
    routing: Arc<RoutingTable>,
    acceptor: Option<ConnectionAcceptor>,
}

impl Server {
    pub fn new(config: ServerConfig, handler: Arc<dyn RequestHandler>) -> Self {
        Self {
            config,
            handler,
            routing: Arc::new(RoutingTable::new()),
            acceptor: None,
        }
    }

    /// Validate the configuration and prepare routing table and acceptor.
    ///
    /// A previously started acceptor is closed first.
    pub fn init(&mut self) -> ServerResult<()> {
        self.close();
        self.config.validate()?;

        self.routing = Arc::new(RoutingTable::from_modules(self.config.modules.clone())?);
        for module in &self.config.modules {
            info!("module {}", module);
        }

        let acceptor = ConnectionAcceptor::new(self.config.socket_address(), self.config.backlog)?
            .with_max_connections(self.config.max_connections);
        self.acceptor = Some(acceptor);

        info!("initialization done");
        Ok(())
    }

    /// Begin accepting connections
    pub fn start(&mut self) -> ServerResult<()> {
        let dispatcher = Arc::new(Dispatcher::new(
            &self.config,
            self.routing.clone(),
            self.handler.clone(),
        ));
        let handler: ConnectionHandler =
            Arc::new(move |connection: &mut Connection| dispatcher.handle_connection(connection));

        let acceptor = self
            .acceptor
            .as_mut()
            .ok_or_else(|| ServerError::Config("server was not initialized".to_string()))?;
        acceptor.start(handler)?;

        info!("listener thread started");
        Ok(())
    }

    pub fn run(&mut self) -> ServerResult<()> {
        self.init()?;
        self.start()
    }

    /// Stop accepting new connections
    pub fn close(&mut self) {
        if let Some(mut acceptor) = self.acceptor.take() {
            acceptor.close();
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The address actually bound, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.acceptor.as_ref().and_then(ConnectionAcceptor::local_addr)
    }

    /// The live routing table; modules may be added or removed at runtime
    pub fn routing_table(&self) -> &Arc<RoutingTable> {
        &self.routing
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.close();
    }
}
