//! Header fields and body shared by requests and responses.

use crate::error::{ServerError, ServerResult};
use crate::http::{CRLF, HF_CONTENT_LENGTH};
use crate::reader::LineByteReader;
use std::collections::HashMap;
use std::io::{Read, Write};

/// Header map plus body.
///
/// Field names keep the spelling they were last set with; lookups ignore
/// case. Setting the body always refreshes `Content-Length`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a header value
    pub fn header(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.headers.get(name) {
            return Some(value.as_str());
        }
        self.headers
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    /// Set a header, replacing any field with the same name
    pub fn set_header(&mut self, name: &str, value: &str) {
        let name = name.trim();
        self.remove_header(name);
        self.headers.insert(name.to_string(), value.trim().to_string());
    }

    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        let existing = self
            .headers
            .keys()
            .find(|field| field.eq_ignore_ascii_case(name))
            .cloned()?;
        self.headers.remove(&existing)
    }

    pub fn header_names(&self) -> impl Iterator<Item = &str> {
        self.headers.keys().map(String::as_str)
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Set the body and update content-length
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
        let length = self.body.len().to_string();
        self.set_header(HF_CONTENT_LENGTH, &length);
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// The declared body length; `None` if absent or empty
    pub fn content_length(&self) -> ServerResult<Option<usize>> {
        let value = match self.header(HF_CONTENT_LENGTH) {
            Some(value) if !value.is_empty() => value,
            _ => return Ok(None),
        };

        let length: i64 = value.parse().map_err(|_| {
            ServerError::Protocol(format!("invalid value for field {}: {}", HF_CONTENT_LENGTH, value))
        })?;
        if length < 0 {
            return Err(ServerError::Protocol(format!(
                "negative value for field: {}",
                HF_CONTENT_LENGTH
            )));
        }
        usize::try_from(length)
            .map(Some)
            .map_err(|_| ServerError::Protocol(format!("{} too large: {}", HF_CONTENT_LENGTH, value)))
    }

    /// Read header lines up to and including the blank line
    pub fn read_header<R: Read>(&mut self, reader: &mut LineByteReader<R>) -> ServerResult<()> {
        loop {
            let line = reader.read_line()?;
            if line.is_empty() {
                return Ok(());
            }

            let colon = line.find(':').ok_or_else(|| {
                ServerError::Protocol(format!("wrong header field format, expected colon in: {}", line))
            })?;
            let name = line[..colon].trim();
            if name.is_empty() {
                return Err(ServerError::Protocol(format!("empty header field name in: {}", line)));
            }
            self.set_header(name, &line[colon + 1..]);
        }
    }

    /// Read exactly `Content-Length` bytes of body, if declared
    pub fn read_body<R: Read>(&mut self, reader: &mut LineByteReader<R>) -> ServerResult<()> {
        match self.content_length()? {
            Some(length) if length > 0 => {
                self.body = reader.read_bytes(length)?;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    pub fn write_header_fields<W: Write>(&self, writer: &mut W) -> ServerResult<()> {
        for (name, value) in &self.headers {
            write!(writer, "{}: {}{}", name, value, CRLF)?;
        }
        writer.write_all(CRLF.as_bytes())?;
        Ok(())
    }

    pub fn write_body<W: Write>(&self, writer: &mut W) -> ServerResult<()> {
        if !self.body.is_empty() {
            writer.write_all(&self.body)?;
        }
        Ok(())
    }
}
