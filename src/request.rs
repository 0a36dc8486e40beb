use crate::connection::Connection;
use crate::error::{ServerError, ServerResult};
use crate::http::{Method, CRLF, HF_HOST, HTTP_VERSION};
use crate::message::Message;
use crate::reader::LineByteReader;
use crate::response::Response;
use std::io::{Read, Write};
use std::ops::{Deref, DerefMut};
use std::time::Duration;

/// HTTP Request
///
/// The stored path never carries a query string; parameters live in their
/// own list and are appended again by [`Request::uri`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    path: String,
    params: Vec<(String, String)>,
    message: Message,
}

impl Request {
    /// Create a new request, splitting any query suffix off the uri
    pub fn new(method: Method, uri: &str) -> Self {
        let mut request = Self {
            method,
            path: String::new(),
            params: Vec::new(),
            message: Message::new(),
        };
        request.set_path(uri);
        request
    }

    /// Parse a request from a stream
    pub fn from_reader<R: Read>(reader: R) -> ServerResult<Self> {
        Self::parse(&mut LineByteReader::new(reader))
    }

    /// Parse request line, header and (unless HEAD) body
    pub fn parse<R: Read>(reader: &mut LineByteReader<R>) -> ServerResult<Self> {
        let line = reader.read_line()?;
        if line.is_empty() {
            return Err(ServerError::Protocol("request line is missing".to_string()));
        }

        let parts: Vec<&str> = line.split(' ').collect();
        if parts.len() != 3 {
            return Err(ServerError::Protocol(format!(
                "request line has the wrong format: {}",
                line
            )));
        }
        let method: Method = parts[0].parse()?;
        if parts[2] != HTTP_VERSION {
            return Err(ServerError::Protocol(format!(
                "wrong http version {}, expected: {}",
                parts[2], HTTP_VERSION
            )));
        }
        if parts[1].is_empty() {
            return Err(ServerError::Protocol("empty request path".to_string()));
        }

        let mut request = Self::new(method, parts[1]);
        request.message.read_header(reader)?;
        if request.method != Method::Head {
            request.message.read_body(reader)?;
        }

        Ok(request)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// The path without its query string
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Set the path; a `?` suffix is parsed into parameters
    pub fn set_path(&mut self, uri: &str) {
        match uri.find('?') {
            Some(pos) => {
                self.path = uri[..pos].to_string();
                self.parse_query(&uri[pos + 1..]);
            }
            None => self.path = uri.to_string(),
        }
    }

    /// The path without its leading slash
    pub fn reduced_path(&self) -> &str {
        self.path.strip_prefix('/').unwrap_or(&self.path)
    }

    /// Path plus the reconstructed query string
    pub fn uri(&self) -> String {
        let mut uri = self.path.clone();
        for (i, (name, value)) in self.params.iter().enumerate() {
            uri.push(if i == 0 { '?' } else { '&' });
            uri.push_str(name);
            uri.push('=');
            uri.push_str(value);
        }
        uri
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.param(name).is_some()
    }

    /// Add or replace a query parameter
    pub fn set_param(&mut self, name: &str, value: &str) -> ServerResult<()> {
        if value.contains('\n') {
            return Err(ServerError::BadRequest(
                "parameter value contains linefeed".to_string(),
            ));
        }
        self.insert_param(name, value);
        Ok(())
    }

    /// Parameters in insertion order
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    /// A copy of this request addressed to a different base path
    pub fn forwarded(&self, path: &str) -> Self {
        let mut request = self.clone();
        request.path = path.to_string();
        request
    }

    /// Serialize request line, header and body
    pub fn write_to<W: Write>(&self, writer: &mut W) -> ServerResult<()> {
        write!(writer, "{} {} {}{}", self.method, self.uri(), HTTP_VERSION, CRLF)?;
        self.message.write_header_fields(writer)?;
        self.message.write_body(writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Write this request to `output` and parse the reply from `input`
    pub fn send_to<W: Write, R: Read>(
        &self,
        output: &mut W,
        input: &mut LineByteReader<R>,
    ) -> ServerResult<Response> {
        self.write_to(output)?;
        Response::parse(input)
    }

    /// Open a connection to `hostname:port` and forward this request over it
    pub fn send_to_host(
        &mut self,
        hostname: &str,
        port: u16,
        timeout: Duration,
    ) -> ServerResult<Response> {
        let mut connection = Connection::connect(hostname, port, timeout)?;
        self.set_header(HF_HOST, hostname);
        let mut input = LineByteReader::new(connection.reader()?);
        let response = self.send_to(&mut connection, &mut input);
        let _ = connection.close();
        response
    }

    fn parse_query(&mut self, query: &str) {
        for pair in query.split('&') {
            // Pairs without a name are dropped
            if let Some(eq_pos) = pair.find('=').filter(|&pos| pos > 0) {
                self.insert_param(&pair[..eq_pos], &pair[eq_pos + 1..]);
            }
        }
    }

    fn insert_param(&mut self, name: &str, value: &str) {
        match self.params.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.params.push((name.to_string(), value.to_string())),
        }
    }
}

impl Default for Request {
    fn default() -> Self {
        Self::new(Method::Get, "/")
    }
}

impl Deref for Request {
    type Target = Message;

    fn deref(&self) -> &Message {
        &self.message
    }
}

impl DerefMut for Request {
    fn deref_mut(&mut self) -> &mut Message {
        &mut self.message
    }
}
