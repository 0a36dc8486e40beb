use crate::error::{ServerError, ServerResult};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Default read/write timeout applied to every socket
pub const DEFAULT_SOCKET_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Represents one TCP connection, inbound or outbound
pub struct Connection {
    stream: TcpStream,
    peer_addr: SocketAddr,
    id: usize,
    timeout: Duration,
}

impl Connection {
    /// Create a new connection from a TcpStream
    pub fn new(stream: TcpStream, peer_addr: SocketAddr, id: usize) -> io::Result<Self> {
        // Set TCP_NODELAY to disable Nagle's algorithm
        stream.set_nodelay(true)?;

        Ok(Self {
            stream,
            peer_addr,
            id,
            timeout: DEFAULT_SOCKET_TIMEOUT,
        })
    }

    /// Open an outbound connection, trying every address the hostname resolves to
    pub fn connect(hostname: &str, port: u16, timeout: Duration) -> ServerResult<Self> {
        let addresses = (hostname, port).to_socket_addrs().map_err(|e| {
            ServerError::Forwarding(format!("cannot resolve {}:{}: {}", hostname, port, e))
        })?;

        let mut last_error = None;
        for address in addresses {
            match TcpStream::connect_timeout(&address, timeout) {
                Ok(stream) => {
                    let mut connection = Self::new(stream, address, 0)?;
                    connection.set_timeout(timeout)?;
                    return Ok(connection);
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(ServerError::Forwarding(match last_error {
            Some(e) => format!("cannot connect to {}:{}: {}", hostname, port, e),
            None => format!("{}:{} resolved to no addresses", hostname, port),
        }))
    }

    /// A second handle on the socket for reading while this one writes
    pub fn reader(&self) -> io::Result<TcpStream> {
        self.stream.try_clone()
    }

    /// Close the connection in both directions
    pub fn close(&mut self) -> io::Result<()> {
        self.stream.shutdown(Shutdown::Both)
    }

    /// Get the connection's peer address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Get the connection's unique ID
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Set the read and write timeout of the socket
    pub fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.stream.set_read_timeout(Some(timeout))?;
        self.stream.set_write_timeout(Some(timeout))?;
        self.timeout = timeout;
        Ok(())
    }

    /// Get a reference to the underlying TcpStream
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}
