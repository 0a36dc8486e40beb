use crate::error::{ServerError, ServerResult};
use crate::http::{
    http_date, Status, CRLF, HF_ACCEPT_ENCODING, HF_CONTENT_ENCODING, HF_CONTENT_TYPE, HF_EXPIRES,
    HTTP_VERSION,
};
use crate::message::Message;
use crate::reader::LineByteReader;
use crate::request::Request;
use chrono::{TimeDelta, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use log::debug;
use std::io::{Read, Write};
use std::ops::{Deref, DerefMut};

const GZIP: &str = "gzip";

/// HTTP Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status_code: u16,
    status_reason: String,
    message: Message,
}

impl Response {
    /// Create a new response
    pub fn new(status_code: u16, status_reason: &str) -> Self {
        Self {
            status_code,
            status_reason: status_reason.to_string(),
            message: Message::new(),
        }
    }

    /// An empty `200 OK` response
    pub fn ok() -> Self {
        Self::new(Status::Ok.code(), Status::Ok.reason())
    }

    /// A `200 OK` response carrying plain text
    pub fn text(body: &str) -> Self {
        let mut response = Self::ok();
        response.set_header(HF_CONTENT_TYPE, "text/plain; charset=utf-8");
        response.set_body(body.as_bytes().to_vec());
        response
    }

    /// Parse a response from a stream
    pub fn from_reader<R: Read>(reader: R) -> ServerResult<Self> {
        Self::parse(&mut LineByteReader::new(reader))
    }

    /// Parse status line, header and body
    pub fn parse<R: Read>(reader: &mut LineByteReader<R>) -> ServerResult<Self> {
        let line = reader.read_line()?;
        if line.is_empty() {
            return Err(ServerError::Protocol("status line is missing".to_string()));
        }

        let (version, rest) = line
            .split_once(' ')
            .ok_or_else(|| ServerError::Protocol(format!("invalid status line: {}", line)))?;
        if version != HTTP_VERSION {
            return Err(ServerError::Protocol(format!(
                "wrong http version {}, expected: {}",
                version, HTTP_VERSION
            )));
        }
        let (code, reason) = rest
            .split_once(' ')
            .ok_or_else(|| ServerError::Protocol(format!("invalid status line: {}", line)))?;
        let status_code: u16 = code
            .parse()
            .map_err(|_| ServerError::Protocol(format!("not a status code: {}", code)))?;
        if reason.is_empty() {
            return Err(ServerError::Protocol(format!("no status reason supplied: {}", line)));
        }

        let mut response = Self::new(status_code, reason);
        response.message.read_header(reader)?;
        response.message.read_body(reader)?;
        Ok(response)
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn status_reason(&self) -> &str {
        &self.status_reason
    }

    pub fn set_status(&mut self, status_code: u16, status_reason: &str) {
        self.status_code = status_code;
        self.status_reason = status_reason.to_string();
    }

    pub fn status_line(&self) -> String {
        format!("{} {} {}", HTTP_VERSION, self.status_code, self.status_reason)
    }

    pub fn is_ok(&self) -> bool {
        self.status_code == Status::Ok.code()
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Set `Expires` to now plus `hours`.
    ///
    /// Negative hours, or a date chrono cannot represent, leave it untouched.
    pub fn expire(&mut self, hours: i64) {
        if hours < 0 {
            return;
        }
        let expires =
            TimeDelta::try_hours(hours).and_then(|delta| Utc::now().checked_add_signed(delta));
        match expires {
            Some(expires) => self.set_header(HF_EXPIRES, &http_date(expires)),
            None => debug!("expiration of {} hours is out of range", hours),
        }
    }

    /// Gzip the body if the request accepts it.
    ///
    /// If compression fails the response is left as it was.
    pub fn compress_with_gzip(&mut self, request: &Request) {
        match request.header(HF_ACCEPT_ENCODING) {
            Some(accepted) if accepted.contains(GZIP) => {}
            _ => return,
        }

        match gzip(self.body()) {
            Ok(compressed) => {
                self.set_header(HF_CONTENT_ENCODING, GZIP);
                self.set_body(compressed);
            }
            Err(e) => debug!("leaving response uncompressed: {}", e),
        }
    }

    /// Serialize status line, header and body
    pub fn write_to<W: Write>(&self, writer: &mut W) -> ServerResult<()> {
        write!(writer, "{}{}", self.status_line(), CRLF)?;
        self.message.write_header_fields(writer)?;
        self.message.write_body(writer)?;
        writer.flush()?;
        Ok(())
    }
}

impl From<Status> for Response {
    /// A canned response with a small html body
    fn from(status: Status) -> Self {
        let mut response = Self::new(status.code(), status.reason());
        response.set_header(HF_CONTENT_TYPE, "text/html; charset=utf-8");
        response.set_body(format!("<html><h1>{}</h1></html>", status.message()));
        response
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::ok()
    }
}

impl Deref for Response {
    type Target = Message;

    fn deref(&self) -> &Message {
        &self.message
    }
}

impl DerefMut for Response {
    fn deref_mut(&mut self) -> &mut Message {
        &mut self.message
    }
}

fn gzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;
    use flate2::read::GzDecoder;

    #[test]
    fn test_canned_responses() {
        let response = Response::from(Status::NotFound);
        assert_eq!(response.status_code(), 404);
        assert!(!response.is_ok());
        assert!(String::from_utf8_lossy(response.body()).contains("not found"));

        let response = Response::from(Status::AccessDenied);
        assert_eq!(response.status_code(), 403);
        assert!(Response::from(Status::Ok).is_ok());
    }

    #[test]
    fn test_status_line_parsing() {
        let response = Response::from_reader(&b"HTTP/1.1 302 Found Elsewhere\r\n\r\n"[..]).unwrap();
        assert_eq!(response.status_code(), 302);
        assert_eq!(response.status_reason(), "Found Elsewhere");

        for bad in [
            &b"HTTP/1.0 200 OK\r\n\r\n"[..],
            &b"HTTP/1.1 abc OK\r\n\r\n"[..],
            &b"HTTP/1.1 200 \r\n\r\n"[..],
            &b"HTTP/1.1 200\r\n\r\n"[..],
            &b"HTTP/1.1\r\n\r\n"[..],
            &b"\r\n"[..],
        ] {
            assert!(matches!(Response::from_reader(bad), Err(ServerError::Protocol(_))));
        }
    }

    #[test]
    fn test_expire() {
        let mut response = Response::ok();
        response.expire(-1);
        assert!(response.header(HF_EXPIRES).is_none());

        response.expire(2);
        let expires = response.header(HF_EXPIRES).unwrap();
        assert!(expires.ends_with(" GMT"));
        assert_eq!(expires.len(), "Sun, 06 Nov 1994 08:49:37 GMT".len());
    }

    #[test]
    fn test_expire_out_of_range_is_ignored() {
        let mut response = Response::ok();
        response.expire(10_000_000_000);
        assert!(response.header(HF_EXPIRES).is_none());

        response.expire(i64::MAX);
        assert!(response.header(HF_EXPIRES).is_none());
    }

    #[test]
    fn test_gzip_only_when_accepted() {
        let original = b"hello hello hello hello hello".to_vec();

        let mut response = Response::ok();
        response.set_body(original.clone());
        response.compress_with_gzip(&Request::new(Method::Get, "/"));
        assert_eq!(response.body(), &original[..]);
        assert!(response.header(HF_CONTENT_ENCODING).is_none());

        let mut request = Request::new(Method::Get, "/");
        request.set_header(HF_ACCEPT_ENCODING, "deflate, gzip");
        response.compress_with_gzip(&request);
        assert_eq!(response.header(HF_CONTENT_ENCODING), Some("gzip"));
        assert_eq!(
            response.header("Content-Length"),
            Some(response.body().len().to_string().as_str())
        );

        let mut decoded = Vec::new();
        GzDecoder::new(response.body()).read_to_end(&mut decoded).unwrap();
        assert_eq!(decoded, original);
    }
}
