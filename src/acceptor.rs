use crate::connection::Connection;
use crossbeam::channel::{self, Receiver, SendTimeoutError, Sender};
use log::{debug, error, info, warn};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 80;
pub const DEFAULT_BACKLOG: u32 = 10;

/// How often an idle accept loop re-checks whether it was closed
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Called once per accepted connection, on that connection's own thread
pub type ConnectionHandler = Arc<dyn Fn(&mut Connection) + Send + Sync>;

/// The ConnectionAcceptor owns the listening socket and runs the accept loop
/// on a dedicated thread. Every accepted connection is handed to the handler
/// on a thread of its own and closed afterwards, whatever the handler did.
pub struct ConnectionAcceptor {
    address: SocketAddr,
    backlog: u32,
    max_connections: usize,
    local_addr: Option<SocketAddr>,
    closed: Arc<AtomicBool>,
    connection_count: Arc<AtomicUsize>,
    thread: Option<JoinHandle<()>>,
}

impl ConnectionAcceptor {
    /// Create an acceptor for the given address; nothing is bound until `start`
    pub fn new<A: ToSocketAddrs>(addr: A, backlog: u32) -> io::Result<Self> {
        let address = addr.to_socket_addrs()?.next().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "No socket addresses found")
        })?;

        Ok(Self {
            address,
            backlog,
            max_connections: num_cpus::get() * 64,
            local_addr: None,
            closed: Arc::new(AtomicBool::new(false)),
            connection_count: Arc::new(AtomicUsize::new(0)),
            thread: None,
        })
    }

    /// Limit how many connections are handled at the same time
    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    /// Bind the listening socket and start the accept loop.
    ///
    /// A bind failure is logged and returned; the loop is not started then.
    pub fn start(&mut self, handler: ConnectionHandler) -> io::Result<()> {
        if self.thread.is_some() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "acceptor is already running",
            ));
        }

        let listener = match Self::create_listener(&self.address, self.backlog) {
            Ok(listener) => listener,
            Err(e) => {
                error!("cannot listen on {}: {}", self.address, e);
                return Err(e);
            }
        };
        let local_addr = listener.local_addr()?;

        self.closed.store(false, Ordering::SeqCst);
        let worker = AcceptLoop {
            listener,
            handler,
            closed: self.closed.clone(),
            connection_count: self.connection_count.clone(),
            permits: channel::bounded(self.max_connections),
        };
        let thread = thread::Builder::new()
            .name(format!("acceptor-{}", local_addr.port()))
            .spawn(move || worker.run())?;

        info!("accepting connections on {}", local_addr);
        self.local_addr = Some(local_addr);
        self.thread = Some(thread);
        Ok(())
    }

    /// Stop accepting. Connections already being handled run to completion.
    pub fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("accept loop terminated abnormally");
            }
            info!("acceptor on {:?} closed", self.local_addr);
        }
    }

    /// Get the local address this acceptor is bound to
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().map_or(false, |thread| !thread.is_finished())
    }

    /// Total number of connections accepted so far
    pub fn connection_count(&self) -> usize {
        self.connection_count.load(Ordering::Relaxed)
    }

    /// Create a properly configured listening socket
    fn create_listener(addr: &SocketAddr, backlog: u32) -> io::Result<TcpListener> {
        let domain = if addr.is_ipv6() {
            Domain::IPV6
        } else {
            Domain::IPV4
        };

        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&SockAddr::from(*addr))?;
        socket.listen(i32::try_from(backlog).unwrap_or(i32::MAX))?;

        // Polled so that `close` is noticed without a pending connection
        socket.set_nonblocking(true)?;

        Ok(socket.into())
    }
}

impl Drop for ConnectionAcceptor {
    fn drop(&mut self) {
        self.close();
    }
}

struct AcceptLoop {
    listener: TcpListener,
    handler: ConnectionHandler,
    closed: Arc<AtomicBool>,
    connection_count: Arc<AtomicUsize>,
    permits: (Sender<()>, Receiver<()>),
}

impl AcceptLoop {
    fn run(self) {
        while !self.closed.load(Ordering::SeqCst) {
            match self.listener.accept() {
                Ok((stream, peer_addr)) => {
                    if !self.acquire_permit() {
                        break;
                    }
                    let id = self.connection_count.fetch_add(1, Ordering::Relaxed);
                    self.spawn_handler(stream, peer_addr, id);
                }
                Err(e) => wait_after_accept_error(&e),
            }
        }
        debug!("accept loop on {:?} finished", self.listener.local_addr());
    }

    /// Wait for a free slot; false if the acceptor was closed meanwhile
    fn acquire_permit(&self) -> bool {
        loop {
            match self.permits.0.send_timeout((), POLL_INTERVAL) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(())) => {
                    if self.closed.load(Ordering::SeqCst) {
                        return false;
                    }
                }
                Err(SendTimeoutError::Disconnected(())) => return false,
            }
        }
    }

    fn spawn_handler(&self, stream: TcpStream, peer_addr: SocketAddr, id: usize) {
        let handler = self.handler.clone();
        let permit = Permit(self.permits.1.clone());

        let spawned = thread::Builder::new()
            .name(format!("connection-{}", id))
            .spawn(move || {
                let _permit = permit;
                handle_stream(stream, peer_addr, id, handler);
            });

        if let Err(e) = spawned {
            warn!("cannot spawn handler for connection {} from {}: {}", id, peer_addr, e);
        }
    }
}

/// Pause before the next accept, whether the listener was idle or failing
fn wait_after_accept_error(e: &io::Error) {
    if e.kind() != io::ErrorKind::WouldBlock {
        debug!("accept failed: {}", e);
    }
    thread::sleep(POLL_INTERVAL);
}

fn handle_stream(stream: TcpStream, peer_addr: SocketAddr, id: usize, handler: ConnectionHandler) {
    // Accepted sockets may inherit the listener's non-blocking mode
    let connection = stream
        .set_nonblocking(false)
        .and_then(|()| Connection::new(stream, peer_addr, id));
    let mut connection = match connection {
        Ok(connection) => connection,
        Err(e) => {
            warn!("cannot set up connection {} from {}: {}", id, peer_addr, e);
            return;
        }
    };

    if panic::catch_unwind(AssertUnwindSafe(|| handler(&mut connection))).is_err() {
        error!("handler for connection {} from {} panicked", id, peer_addr);
    }

    if let Err(e) = connection.close() {
        debug!("closing connection {}: {}", id, e);
    }
}

/// A slot in the connection limit, returned when dropped
struct Permit(Receiver<()>);

impl Drop for Permit {
    fn drop(&mut self) {
        let _ = self.0.try_recv();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpStream;

    #[test]
    fn test_handler_runs_and_connection_is_closed() {
        let mut acceptor = ConnectionAcceptor::new("127.0.0.1:0", 10).unwrap();
        acceptor
            .start(Arc::new(|connection: &mut Connection| {
                let _ = connection.write_all(b"hi");
            }))
            .unwrap();
        let addr = acceptor.local_addr().unwrap();

        let mut client = TcpStream::connect(addr).unwrap();
        client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let mut received = Vec::new();
        client.read_to_end(&mut received).unwrap();
        assert_eq!(received, b"hi");

        acceptor.close();
        assert!(!acceptor.is_running());
        assert_eq!(acceptor.connection_count(), 1);
    }

    #[test]
    fn test_panicking_handler_still_closes() {
        let mut acceptor = ConnectionAcceptor::new("127.0.0.1:0", 10).unwrap();
        acceptor
            .start(Arc::new(|_: &mut Connection| panic!("handler failure")))
            .unwrap();
        let addr = acceptor.local_addr().unwrap();

        for _ in 0..2 {
            let mut client = TcpStream::connect(addr).unwrap();
            client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
            let mut received = Vec::new();
            client.read_to_end(&mut received).unwrap();
            assert!(received.is_empty());
        }
        assert!(acceptor.is_running());
    }

    #[test]
    fn test_accept_errors_back_off() {
        let start = std::time::Instant::now();
        wait_after_accept_error(&io::Error::new(io::ErrorKind::Other, "too many open files"));
        wait_after_accept_error(&io::Error::from(io::ErrorKind::WouldBlock));
        assert!(start.elapsed() >= POLL_INTERVAL * 2);
    }

    #[test]
    fn test_bind_failure_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut acceptor =
            ConnectionAcceptor::new(taken.local_addr().unwrap(), 10).unwrap();
        assert!(acceptor.start(Arc::new(|_: &mut Connection| {})).is_err());
        assert!(!acceptor.is_running());
    }
}
