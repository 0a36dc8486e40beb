use crate::error::{ServerError, ServerResult};
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;

/// The only protocol version spoken on the wire
pub const HTTP_VERSION: &str = "HTTP/1.1";
pub const CRLF: &str = "\r\n";

pub const HF_CONTENT_LENGTH: &str = "Content-Length";
pub const HF_CONTENT_ENCODING: &str = "Content-Encoding";
pub const HF_CONTENT_TYPE: &str = "Content-Type";
pub const HF_ACCEPT_ENCODING: &str = "Accept-Encoding";
pub const HF_EXPIRES: &str = "Expires";
pub const HF_HOST: &str = "Host";

/// Status codes the server synthesizes on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok = 200,
    BadRequest = 400,
    Unauthorized = 401,
    AccessDenied = 403,
    NotFound = 404,
    InternalServerError = 500,
}

impl Status {
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Reason phrase used on the status line
    pub fn reason(&self) -> &'static str {
        match *self {
            Status::Ok => "OK",
            Status::BadRequest => "Bad Request",
            Status::Unauthorized => "Unauthorized",
            Status::AccessDenied => "Forbidden",
            Status::NotFound => "Not Found",
            Status::InternalServerError => "Internal Server Error",
        }
    }

    /// Text shown in the body of a canned response
    pub fn message(&self) -> &'static str {
        match *self {
            Status::Ok => "ok",
            Status::BadRequest => "bad request",
            Status::Unauthorized => "unauthorized",
            Status::AccessDenied => "access denied",
            Status::NotFound => "not found",
            Status::InternalServerError => "internal server error",
        }
    }
}

/// HTTP Methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Options,
    Trace,
    Connect,
    Patch,
}

impl Method {
    /// Convert the method to a string
    pub fn as_str(&self) -> &'static str {
        match *self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
            Method::Patch => "PATCH",
        }
    }
}

impl FromStr for Method {
    type Err = ServerError;

    fn from_str(s: &str) -> ServerResult<Self> {
        match s {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "OPTIONS" => Ok(Method::Options),
            "TRACE" => Ok(Method::Trace),
            "CONNECT" => Ok(Method::Connect),
            "PATCH" => Ok(Method::Patch),
            _ => Err(ServerError::Protocol(format!("Invalid method: {}", s))),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format a timestamp as an HTTP date, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`
pub fn http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
