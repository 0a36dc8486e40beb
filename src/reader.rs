//! Line- and length-framed reads over a byte stream.

use crate::buffer::Buffer;
use crate::error::{ServerError, ServerResult};
use std::io::{self, BufReader, Read};

/// Upper bound for any single accumulated read (100 MiB)
pub const MAX_BUFFER_SIZE: usize = 100 * 1024 * 1024;

const CR: u8 = b'\r';
const LF: u8 = b'\n';

/// Reads lines and fixed-size blocks from a stream.
///
/// Lines end at LF; a CR directly in front of the LF is dropped, any other CR
/// is kept as data. Bytes pulled from the stream beyond a `read_bytes` request
/// stay pending and are handed out first by the next read.
pub struct LineByteReader<R> {
    inner: BufReader<R>,
    pending: Buffer,
    line: Buffer,
}

impl<R: Read> LineByteReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_limit(reader, MAX_BUFFER_SIZE)
    }

    /// Create a reader whose accumulators never exceed `max_size` bytes
    pub fn with_limit(reader: R, max_size: usize) -> Self {
        Self {
            inner: BufReader::new(reader),
            pending: Buffer::with_limit(0, max_size),
            line: Buffer::with_limit(256, max_size),
        }
    }

    /// Read the next line without its terminator.
    ///
    /// Fails with `StreamClosed` if the stream ends before a LF is seen.
    pub fn read_line(&mut self) -> ServerResult<String> {
        self.line.reset();
        let mut pending_cr = false;

        loop {
            match self.next_byte()? {
                LF => break,
                CR => {
                    if pending_cr {
                        self.line.write(&[CR])?;
                    }
                    pending_cr = true;
                }
                byte => {
                    if pending_cr {
                        self.line.write(&[CR])?;
                        pending_cr = false;
                    }
                    self.line.write(&[byte])?;
                }
            }
        }

        let text = String::from_utf8_lossy(self.line.slice()).into_owned();
        self.line.reset();
        Ok(text)
    }

    /// Read exactly `length` bytes
    pub fn read_bytes(&mut self, length: usize) -> ServerResult<Vec<u8>> {
        if length > self.pending.max_size() {
            return Err(ServerError::ResourceLimit(format!(
                "cannot read {} bytes, limit is {}",
                length,
                self.pending.max_size()
            )));
        }

        while self.pending.available_data() < length {
            if self.pending.read_from(&mut self.inner)? == 0 {
                return Err(ServerError::StreamClosed(
                    "not enough data in stream".to_string(),
                ));
            }
        }

        self.pending.take(length)
    }

    fn next_byte(&mut self) -> ServerResult<u8> {
        let mut byte = [0u8; 1];
        if self.pending.read(&mut byte) == 1 {
            return Ok(byte[0]);
        }

        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => {
                    return Err(ServerError::StreamClosed(
                        "end of stream before line terminator".to_string(),
                    ))
                }
                Ok(_) => return Ok(byte[0]),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_crlf_and_bare_lf() {
        let mut reader = LineByteReader::new(Cursor::new(b"abc\r\ndef\n".to_vec()));
        assert_eq!(reader.read_line().unwrap(), "abc");
        assert_eq!(reader.read_line().unwrap(), "def");
    }

    #[test]
    fn test_lone_cr_is_data() {
        let mut reader = LineByteReader::new(Cursor::new(b"a\rb\n".to_vec()));
        assert_eq!(reader.read_line().unwrap(), "a\rb");

        let mut reader = LineByteReader::new(Cursor::new(b"a\r\r\n".to_vec()));
        assert_eq!(reader.read_line().unwrap(), "a\r");
    }

    #[test]
    fn test_end_of_stream_mid_line() {
        let mut reader = LineByteReader::new(Cursor::new(b"partial".to_vec()));
        assert!(matches!(reader.read_line(), Err(ServerError::StreamClosed(_))));

        let mut reader = LineByteReader::new(Cursor::new(Vec::new()));
        assert!(matches!(reader.read_line(), Err(ServerError::StreamClosed(_))));
    }

    #[test]
    fn test_read_bytes_keeps_leftover() {
        let mut reader = LineByteReader::new(Cursor::new(b"12345rest\n".to_vec()));
        assert_eq!(reader.read_bytes(5).unwrap(), b"12345");
        assert_eq!(reader.read_line().unwrap(), "rest");
    }

    #[test]
    fn test_read_bytes_short_stream() {
        let mut reader = LineByteReader::new(Cursor::new(b"abc".to_vec()));
        assert!(matches!(reader.read_bytes(4), Err(ServerError::StreamClosed(_))));
    }

    #[test]
    fn test_limits() {
        let mut reader = LineByteReader::with_limit(Cursor::new(vec![b'x'; 64]), 16);
        assert!(matches!(reader.read_bytes(17), Err(ServerError::ResourceLimit(_))));

        let mut reader = LineByteReader::with_limit(Cursor::new(vec![b'x'; 64]), 16);
        assert!(matches!(reader.read_line(), Err(ServerError::ResourceLimit(_))));
    }
}
