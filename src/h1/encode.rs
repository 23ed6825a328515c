//! response head/body encoding. grounded on `h1/proto/encode.rs`'s `encode_head_inner`/
//! `encode_version_status_reason`/`encode_headers`, adapted to this crate's hand-rolled
//! `HeaderFieldList`/`HttpVersion`/`BodyLength` instead of `http::Response<B>`/`HeaderMap`/
//! `StatusCode`/`BodySize` — and simplified because `spec.md` §4.4 assigns the connection-level
//! headers (`Connection`, `Keep-Alive`, `Server`, `Date`) to the transport, not the handler, so
//! unlike the teacher there is no need to scan a caller-supplied header map for those names: the
//! channel already rejected them on the way in (see `h1::channel`).

use bytes::BytesMut;

use super::{date::DateHandle, header::HeaderFieldList, response::BodyLength, version::HttpVersion};

/// the product string injected into every response's `Server` header.
pub const SERVER: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// `spec.md` §4.4: "Body framing: if the handler set a content-length, emit it and a raw body; if
/// not and version >= 1.1, switch to chunked; if not and version < 1.1, omit framing and close
/// connection after body." Decides framing independent of persistence so the transport can still
/// honor an explicit fixed length on an otherwise-closing connection.
pub fn framing_for(body_length: BodyLength, version: HttpVersion) -> super::codec::TransferCoding {
    use super::codec::TransferCoding;
    match (body_length, version) {
        (BodyLength::Fixed(len), _) => TransferCoding::length(len),
        (BodyLength::Empty, _) => TransferCoding::length(0),
        (BodyLength::Chunked, HttpVersion::Http11 | HttpVersion::Http20) => TransferCoding::encode_chunked(),
        (BodyLength::Chunked, _) => TransferCoding::eof(),
    }
}

/// everything the transport needs to decide about persistence, passed down rather than read off
/// shared state so this function stays a pure formatter.
pub struct Persistence {
    pub keep_alive: bool,
    pub timeout_secs: u64,
    pub requests_remaining: u32,
}

/// write the status line and all headers (handler-set plus transport-injected connection-level
/// ones), terminated by the blank line. returns the framing the body must be written with.
pub fn encode_head(
    status: u16,
    reason: Option<&[u8]>,
    headers: &HeaderFieldList,
    body_length: BodyLength,
    version: HttpVersion,
    persistence: &Persistence,
    date: &DateHandle,
    dst: &mut BytesMut,
) -> super::codec::TransferCoding {
    encode_status_line(dst, version, status, reason);

    for field in headers.iter() {
        dst.extend_from_slice(b"\r\n");
        dst.extend_from_slice(field.name.as_bytes());
        dst.extend_from_slice(b": ");
        dst.extend_from_slice(&field.value);
    }

    if persistence.keep_alive {
        dst.extend_from_slice(b"\r\nconnection: keep-alive\r\nkeep-alive: timeout=");
        let mut buf = itoa::Buffer::new();
        dst.extend_from_slice(buf.format(persistence.timeout_secs).as_bytes());
        dst.extend_from_slice(b", max=");
        dst.extend_from_slice(buf.format(persistence.requests_remaining).as_bytes());
    } else {
        dst.extend_from_slice(b"\r\nconnection: close");
    }

    dst.extend_from_slice(b"\r\nserver: ");
    dst.extend_from_slice(SERVER.as_bytes());

    dst.extend_from_slice(b"\r\ndate: ");
    super::date::write_header(date, dst);

    let encoding = framing_for(body_length, version);
    match encoding {
        super::codec::TransferCoding::Length(n) => write_length_header(dst, n),
        super::codec::TransferCoding::EncodeChunked => dst.extend_from_slice(b"\r\ntransfer-encoding: chunked"),
        super::codec::TransferCoding::Eof => {}
        _ => unreachable!("framing_for only produces encode-side codings"),
    }
    dst.extend_from_slice(b"\r\n\r\n");
    encoding
}

fn encode_status_line(dst: &mut BytesMut, version: HttpVersion, status: u16, reason: Option<&[u8]>) {
    match version {
        HttpVersion::Http11 | HttpVersion::Unknown => dst.extend_from_slice(b"HTTP/1.1 "),
        HttpVersion::Http10 => dst.extend_from_slice(b"HTTP/1.0 "),
        HttpVersion::Http09 => dst.extend_from_slice(b"HTTP/1.0 "),
        HttpVersion::Http20 => dst.extend_from_slice(b"HTTP/1.1 "),
    }
    let mut buf = itoa::Buffer::new();
    dst.extend_from_slice(buf.format(status).as_bytes());
    dst.extend_from_slice(b" ");
    match reason {
        Some(reason) => dst.extend_from_slice(reason),
        None => dst.extend_from_slice(canonical_reason(status).as_bytes()),
    }
}

fn write_length_header(dst: &mut BytesMut, len: u64) {
    dst.extend_from_slice(b"\r\ncontent-length: ");
    let mut buf = itoa::Buffer::new();
    dst.extend_from_slice(buf.format(len).as_bytes());
}

/// the subset of RFC 7231/9110 reason phrases this crate is likely to emit; a status code outside
/// this set gets an empty reason phrase (`spec.md` §6) rather than a guessed one.
pub fn canonical_reason(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        431 => "Request Header Fields Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        505 => "HTTP Version Not Supported",
        // `spec.md` §6: a status code with no canonical phrase emits an empty reason rather than
        // a generic class-level placeholder.
        _ => "",
    }
}

#[cfg(test)]
mod test {
    use bytes::Bytes;

    use super::*;
    use crate::h1::date::DateState;
    use std::cell::RefCell;

    fn date_handle() -> DateHandle {
        RefCell::new(DateState::new())
    }

    #[test]
    fn encodes_keep_alive_head_with_fixed_length() {
        let mut headers = HeaderFieldList::new();
        headers.push("content-type", "text/plain");
        let date = date_handle();
        let mut dst = BytesMut::new();

        let persistence = Persistence {
            keep_alive: true,
            timeout_secs: 60,
            requests_remaining: 99,
        };

        encode_head(
            200,
            None,
            &headers,
            BodyLength::Fixed(5),
            HttpVersion::Http11,
            &persistence,
            &date,
            &mut dst,
        );

        let text = String::from_utf8(dst.to_vec()).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK"));
        assert!(text.contains("content-type: text/plain"));
        assert!(text.contains("connection: keep-alive"));
        assert!(text.contains("keep-alive: timeout=60, max=99"));
        assert!(text.contains("content-length: 5"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn decaying_connection_emits_close_and_chunked_for_http11() {
        let headers = HeaderFieldList::new();
        let date = date_handle();
        let mut dst = BytesMut::new();
        let persistence = Persistence {
            keep_alive: false,
            timeout_secs: 0,
            requests_remaining: 0,
        };

        let encoding = encode_head(
            200,
            None,
            &headers,
            BodyLength::Chunked,
            HttpVersion::Http11,
            &persistence,
            &date,
            &mut dst,
        );

        let text = String::from_utf8(dst.to_vec()).unwrap();
        assert!(text.contains("connection: close"));
        assert!(text.contains("transfer-encoding: chunked"));
        assert!(encoding.is_upgrade() == false);
    }

    #[test]
    fn http10_chunked_request_falls_back_to_eof_framing() {
        let headers = HeaderFieldList::new();
        let date = date_handle();
        let mut dst = BytesMut::new();
        let persistence = Persistence {
            keep_alive: false,
            timeout_secs: 0,
            requests_remaining: 0,
        };

        let encoding = encode_head(
            200,
            None,
            &headers,
            BodyLength::Chunked,
            HttpVersion::Http10,
            &persistence,
            &date,
            &mut dst,
        );

        assert!(encoding.is_eof());
        let text = String::from_utf8(dst.to_vec()).unwrap();
        assert!(!text.contains("transfer-encoding"));
    }

    #[test]
    fn canonical_reason_covers_common_statuses() {
        assert_eq!(canonical_reason(200), "OK");
        assert_eq!(canonical_reason(404), "Not Found");
        assert_eq!(canonical_reason(599), "", "codes with no canonical phrase emit an empty reason");
    }

    #[test]
    fn custom_reason_overrides_canonical() {
        let headers = HeaderFieldList::new();
        let date = date_handle();
        let mut dst = BytesMut::new();
        let persistence = Persistence {
            keep_alive: true,
            timeout_secs: 5,
            requests_remaining: 1,
        };
        encode_head(
            418,
            Some(b"I'm a teapot"),
            &headers,
            BodyLength::Empty,
            HttpVersion::Http11,
            &persistence,
            &date,
            &mut dst,
        );
        let _ = Bytes::new();
        let text = String::from_utf8(dst.to_vec()).unwrap();
        assert!(text.starts_with("HTTP/1.1 418 I'm a teapot"));
    }
}
