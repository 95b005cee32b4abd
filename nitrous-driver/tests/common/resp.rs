//! Just enough RESP2 for the fake store: command frames in, replies out.

use bytes::{Buf, BytesMut};

/// Largest bulk payload a real server accepts.
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Largest argument count accepted for one command.
pub const MAX_ARGS: usize = 1024 * 1024;

const CRLF: &[u8] = b"\r\n";

#[derive(Debug, PartialEq, Eq)]
pub enum FrameError {
    /// Input that is not an array of bulk strings.
    NotACommand,
    /// A length header that is not a number.
    BadLength,
    /// A length header above the server limits.
    TooLarge,
}

/// Replies the fake store sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Status(&'static str),
    Error(&'static str),
    Integer(i64),
    Bulk(Option<String>),
    Array(Vec<String>),
}

impl Reply {
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Reply::Status(status) => line(out, b'+', status),
            Reply::Error(message) => line(out, b'-', message),
            Reply::Integer(value) => line(out, b':', &value.to_string()),
            Reply::Bulk(None) => out.extend_from_slice(b"$-1\r\n"),
            Reply::Bulk(Some(data)) => bulk(out, data),
            Reply::Array(items) => {
                line(out, b'*', &items.len().to_string());
                for item in items {
                    bulk(out, item);
                }
            }
        }
    }
}

fn line(out: &mut Vec<u8>, prefix: u8, text: &str) {
    out.push(prefix);
    out.extend_from_slice(text.as_bytes());
    out.extend_from_slice(CRLF);
}

fn bulk(out: &mut Vec<u8>, data: &str) {
    line(out, b'$', &data.len().to_string());
    out.extend_from_slice(data.as_bytes());
    out.extend_from_slice(CRLF);
}

/// Decodes one command, leaving a partial frame buffered.
///
/// Lengths are checked against the limits before anything is sized from
/// them, so a hostile header is an error rather than an allocation.
pub fn decode_command(buf: &mut BytesMut) -> Result<Option<Vec<String>>, FrameError> {
    let Some((count, mut pos)) = header(buf, 0, b'*', MAX_ARGS)? else {
        return Ok(None);
    };
    let mut args = Vec::new();
    for _ in 0..count {
        let Some((len, start)) = header(buf, pos, b'$', MAX_BULK_LEN)? else {
            return Ok(None);
        };
        let end = start.checked_add(len).ok_or(FrameError::TooLarge)?;
        let next = end.checked_add(CRLF.len()).ok_or(FrameError::TooLarge)?;
        if buf.len() < next {
            return Ok(None);
        }
        if &buf[end..next] != CRLF {
            return Err(FrameError::BadLength);
        }
        args.push(String::from_utf8_lossy(&buf[start..end]).into_owned());
        pos = next;
    }
    buf.advance(pos);
    Ok(Some(args))
}

/// Parses `<prefix><n>\r\n` at `pos`; returns `n` and the offset after it.
fn header(
    buf: &[u8],
    pos: usize,
    prefix: u8,
    limit: usize,
) -> Result<Option<(usize, usize)>, FrameError> {
    let Some(&first) = buf.get(pos) else {
        return Ok(None);
    };
    if first != prefix {
        return Err(FrameError::NotACommand);
    }
    let Some(offset) = buf[pos..].windows(2).position(|window| window == CRLF) else {
        return Ok(None);
    };
    let digits = std::str::from_utf8(&buf[pos + 1..pos + offset]).map_err(|_| FrameError::BadLength)?;
    let value: usize = digits.parse().map_err(|_| FrameError::BadLength)?;
    if value > limit {
        return Err(FrameError::TooLarge);
    }
    Ok(Some((value, pos + offset + CRLF.len())))
}

#[test]
fn oversized_headers_are_rejected() {
    let mut count = BytesMut::from(&b"*9223372036854775807\r\n"[..]);
    assert_eq!(decode_command(&mut count), Err(FrameError::TooLarge));

    let mut len = BytesMut::from(&b"*1\r\n$9223372036854775807\r\n"[..]);
    assert_eq!(decode_command(&mut len), Err(FrameError::TooLarge));

    let mut overflow = BytesMut::from(&b"*1\r\n$99999999999999999999999\r\n"[..]);
    assert_eq!(decode_command(&mut overflow), Err(FrameError::BadLength));
}

#[test]
fn partial_frames_wait_for_more_input() {
    let mut buf = BytesMut::from(&b"*2\r\n$3\r\nGET\r\n$3\r\nfo"[..]);
    assert_eq!(decode_command(&mut buf), Ok(None));
    buf.extend_from_slice(b"o\r\n*1\r\n$4\r\nPING\r\n");
    assert_eq!(decode_command(&mut buf), Ok(Some(vec!["GET".to_string(), "foo".to_string()])));
    assert_eq!(decode_command(&mut buf), Ok(Some(vec!["PING".to_string()])));
    assert!(buf.is_empty());
}
