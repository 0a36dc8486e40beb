use std::io::Cursor;
use webrelay::buffer::Buffer;
use webrelay::ServerError;

#[test]
fn test_buffer_creation() {
    let buffer = Buffer::new(1024);
    assert_eq!(buffer.available_data(), 0);
    assert!(buffer.slice().is_empty());
    assert_eq!(buffer.max_size(), usize::MAX);
}

#[test]
fn test_buffer_write_and_read() {
    let mut buffer = Buffer::new(1024);
    let data = b"Hello, World!";

    assert_eq!(buffer.write(data).unwrap(), data.len());
    assert_eq!(buffer.slice(), data);

    let mut read_data = vec![0; data.len()];
    assert_eq!(buffer.read(&mut read_data), data.len());
    assert_eq!(read_data, data);
    assert_eq!(buffer.available_data(), 0);

    // Reading from an empty buffer yields nothing
    assert_eq!(buffer.read(&mut read_data), 0);
}

#[test]
fn test_buffer_read_from() {
    let mut buffer = Buffer::new(16);
    let data = b"Hello, World!";
    let mut cursor = Cursor::new(data);

    let bytes_read = buffer.read_from(&mut cursor).unwrap();
    assert_eq!(bytes_read, data.len());
    assert_eq!(buffer.slice(), data);
    assert_eq!(buffer.read_from(&mut cursor).unwrap(), 0);
}

#[test]
fn test_buffer_take() {
    let mut buffer = Buffer::new(16);
    buffer.write(b"0123456789").unwrap();

    assert_eq!(buffer.take(4).unwrap(), b"0123");
    assert_eq!(buffer.slice(), b"456789");
    assert!(buffer.take(7).is_err());
    assert_eq!(buffer.take(6).unwrap(), b"456789");
    assert_eq!(buffer.available_data(), 0);
}

#[test]
fn test_buffer_auto_resize() {
    let mut buffer = Buffer::new(16);
    let data = vec![7; 32];

    assert_eq!(buffer.write(&data).unwrap(), data.len());
    assert_eq!(buffer.available_data(), 32);
    assert_eq!(buffer.slice(), &data[..]);
}

#[test]
fn test_buffer_compaction() {
    // A fixed 16 byte limit only fits the second write if consumed space is reused
    let mut buffer = Buffer::with_limit(16, 16);

    buffer.write(b"0123456789").unwrap();
    let mut read_data = vec![0; 5];
    buffer.read(&mut read_data);
    assert_eq!(buffer.available_data(), 5);

    buffer.write(b"ABCDEFGHIJ").unwrap();
    assert_eq!(buffer.available_data(), 15);
    assert_eq!(buffer.slice(), b"56789ABCDEFGHIJ");
}

#[test]
fn test_buffer_limit() {
    let mut buffer = Buffer::with_limit(4, 8);
    buffer.write(b"12345678").unwrap();

    let result = buffer.write(b"9");
    assert!(matches!(result, Err(ServerError::ResourceLimit(_))));

    // Consumed space can be reused without crossing the limit
    buffer.take(4).unwrap();
    buffer.write(b"abcd").unwrap();
    assert_eq!(buffer.slice(), b"5678abcd");

    let mut cursor = Cursor::new(b"more".to_vec());
    assert!(matches!(
        buffer.read_from(&mut cursor),
        Err(ServerError::ResourceLimit(_))
    ));
}

#[test]
fn test_buffer_reset() {
    let mut buffer = Buffer::new(1024);
    buffer.write(b"Hello, World!").unwrap();

    buffer.reset();
    assert_eq!(buffer.available_data(), 0);
    buffer.write(b"again").unwrap();
    assert_eq!(buffer.slice(), b"again");
}
