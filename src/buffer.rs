use crate::error::{ServerError, ServerResult};
use std::io::{self, Read};

/// Size of a single chunk pulled from a reader
pub const CHUNK_SIZE: usize = 1024;

/// A growable byte accumulator with a hard upper bound on its size
pub struct Buffer {
    data: Vec<u8>,
    read_pos: usize,
    write_pos: usize,
    max_size: usize,
}

impl Buffer {
    /// Create a new buffer with the specified capacity and no practical limit
    pub fn new(capacity: usize) -> Self {
        Self::with_limit(capacity, usize::MAX)
    }

    /// Create a new buffer that refuses to grow beyond `max_size` bytes
    pub fn with_limit(capacity: usize, max_size: usize) -> Self {
        Self {
            data: vec![0; capacity.min(max_size)],
            read_pos: 0,
            write_pos: 0,
            max_size,
        }
    }

    /// Read one chunk from a reader into the buffer.
    ///
    /// Returns the number of bytes read, 0 meaning end of stream.
    pub fn read_from<R: Read>(&mut self, reader: &mut R) -> ServerResult<usize> {
        self.ensure_capacity(CHUNK_SIZE.min(self.max_size - self.available_data()).max(1))?;

        let bytes_read = loop {
            match reader.read(&mut self.data[self.write_pos..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        };
        self.write_pos += bytes_read;

        Ok(bytes_read)
    }

    /// Ensure the buffer has at least the specified additional capacity
    fn ensure_capacity(&mut self, additional: usize) -> ServerResult<()> {
        if self.data.len() - self.write_pos >= additional {
            return Ok(());
        }

        let needed = self.available_data() + additional;
        if needed > self.max_size {
            return Err(ServerError::ResourceLimit(format!(
                "buffer would grow to {} bytes, limit is {}",
                needed, self.max_size
            )));
        }

        // Compact the buffer if possible
        if self.read_pos > 0 {
            self.data.copy_within(self.read_pos..self.write_pos, 0);
            self.write_pos -= self.read_pos;
            self.read_pos = 0;
        }

        // Resize if still needed
        if self.data.len() - self.write_pos < additional {
            let new_capacity = needed.max(self.data.len() * 2).min(self.max_size);
            self.data.resize(new_capacity, 0);
        }

        Ok(())
    }

    /// Reset the buffer, clearing all data
    pub fn reset(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
    }

    /// Get the amount of data available to read
    pub fn available_data(&self) -> usize {
        self.write_pos - self.read_pos
    }

    /// The size this buffer may never exceed
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Write a slice of data to the buffer
    pub fn write(&mut self, data: &[u8]) -> ServerResult<usize> {
        self.ensure_capacity(data.len())?;

        self.data[self.write_pos..self.write_pos + data.len()].copy_from_slice(data);
        self.write_pos += data.len();

        Ok(data.len())
    }

    /// Read a slice of data from the buffer
    pub fn read(&mut self, data: &mut [u8]) -> usize {
        let to_copy = data.len().min(self.available_data());
        data[..to_copy].copy_from_slice(&self.data[self.read_pos..self.read_pos + to_copy]);
        self.consume(to_copy);
        to_copy
    }

    /// Remove exactly `amount` bytes from the front of the buffer
    pub fn take(&mut self, amount: usize) -> ServerResult<Vec<u8>> {
        if amount > self.available_data() {
            return Err(ServerError::ResourceLimit(format!(
                "cannot take {} bytes, only {} buffered",
                amount,
                self.available_data()
            )));
        }

        let taken = self.data[self.read_pos..self.read_pos + amount].to_vec();
        self.consume(amount);
        Ok(taken)
    }

    /// Get a slice of the buffer's data
    pub fn slice(&self) -> &[u8] {
        &self.data[self.read_pos..self.write_pos]
    }

    fn consume(&mut self, amount: usize) {
        self.read_pos += amount;

        // If we've read everything, reset positions
        if self.read_pos == self.write_pos {
            self.reset();
        }
    }
}
