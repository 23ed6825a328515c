//! request/response body transfer coding, ported closely from `h1/proto/codec.rs`'s
//! `TransferCoding`/`ChunkedState`/`ChunkResult` — grounded directly per `SPEC_FULL.md` §4.2: this
//! state machine is already byte-restartable and needs no rework to satisfy the chunk-boundary
//! invariance property under test in `tests/parser_chunk_boundary.rs`. Operates on `bytes::BytesMut`
//! in place of the teacher's `PagedBytesMut` (this crate has no paged-buffer / io-uring concern).

use core::{fmt, mem};
use std::io;

use bytes::{Buf, Bytes, BytesMut};

/// how a message body is framed, for both decoding an inbound body and encoding an outbound one.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TransferCoding {
    /// no body.
    Eof,
    /// `Content-Length: n`.
    Length(u64),
    /// `Transfer-Encoding: chunked`, decoding.
    DecodeChunked(ChunkedState, u64),
    /// `Transfer-Encoding: chunked`, encoding.
    EncodeChunked,
    /// `Connection: Upgrade` / `CONNECT` — pass bytes through untransformed.
    Upgrade,
}

impl TransferCoding {
    pub const fn eof() -> Self {
        Self::Eof
    }

    pub const fn length(len: u64) -> Self {
        Self::Length(len)
    }

    pub const fn decode_chunked() -> Self {
        Self::DecodeChunked(ChunkedState::Size, 0)
    }

    pub const fn encode_chunked() -> Self {
        Self::EncodeChunked
    }

    pub const fn upgrade() -> Self {
        Self::Upgrade
    }

    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }

    pub fn is_upgrade(&self) -> bool {
        matches!(self, Self::Upgrade)
    }

    #[inline]
    pub fn set_eof(&mut self) {
        *self = Self::Eof;
    }

    /// encode one chunk of body data into `dst`, consuming `bytes` according to this coding's
    /// framing rules (fixed length truncates at the remaining count; chunked wraps in a
    /// size-prefixed frame; upgrade passes through verbatim).
    pub fn encode(&mut self, mut bytes: Bytes, dst: &mut BytesMut) {
        if bytes.is_empty() {
            return;
        }
        match *self {
            Self::Upgrade => dst.extend_from_slice(&bytes),
            Self::EncodeChunked => encode_chunk(&bytes, dst),
            Self::Length(ref mut rem) => {
                let len = bytes.len() as u64;
                if *rem >= len {
                    dst.extend_from_slice(&bytes);
                    *rem -= len;
                } else {
                    let rem = mem::replace(rem, 0);
                    dst.extend_from_slice(&bytes.split_to(rem as usize));
                }
            }
            Self::Eof => {}
            _ => unreachable!("decode-only TransferCoding variant used to encode"),
        }
    }

    /// write whatever end-of-body marker this coding needs (`0\r\n\r\n` for chunked; nothing for
    /// fixed-length/upgrade/eof).
    pub fn encode_eof(&mut self, dst: &mut BytesMut) {
        match *self {
            Self::Eof | Self::Upgrade | Self::Length(0) => {}
            Self::EncodeChunked => dst.extend_from_slice(b"0\r\n\r\n"),
            Self::Length(n) => unreachable!("unexpected eof for Length body with {n} bytes remaining"),
            _ => unreachable!("decode-only TransferCoding variant used to encode"),
        }
    }

    /// decode one unit of body from `src`, advancing past whatever was consumed. see
    /// [`ChunkResult`] for the outcome contract.
    pub fn decode(&mut self, src: &mut BytesMut) -> ChunkResult {
        match *self {
            Self::Length(0) | Self::DecodeChunked(ChunkedState::End, _) => {
                *self = Self::Eof;
                ChunkResult::Eof
            }
            Self::Eof => ChunkResult::AlreadyEof,
            ref _this if src.is_empty() => ChunkResult::InsufficientData,
            Self::Length(ref mut rem) => ChunkResult::Ok(bounded_split(rem, src)),
            Self::Upgrade => ChunkResult::Ok(src.split().freeze()),
            Self::DecodeChunked(ref mut state, ref mut size) => loop {
                let mut buf = None;
                *state = match state.step(src, size, &mut buf) {
                    Ok(Some(state)) => state,
                    Ok(None) => return ChunkResult::InsufficientData,
                    Err(e) => return ChunkResult::Err(e),
                };
                if matches!(state, ChunkedState::End) {
                    return self.decode(src);
                }
                if let Some(buf) = buf {
                    return ChunkResult::Ok(buf);
                }
            },
        }
    }

    pub fn try_set(&mut self, other: Self) -> Result<(), super::error::ProtoError> {
        match (&self, &other) {
            (TransferCoding::Upgrade, TransferCoding::Upgrade) => Ok(()),
            (TransferCoding::Upgrade, _) | (TransferCoding::DecodeChunked(..), _) | (TransferCoding::Length(..), _) => {
                Err(super::error::ProtoError::DuplicateFraming)
            }
            _ => {
                *self = other;
                Ok(())
            }
        }
    }
}

fn encode_chunk(bytes: &Bytes, dst: &mut BytesMut) {
    // chunk sizes are lower-case hexadecimal (`spec.md` §6); `itoa` only formats decimal, so the
    // size token is written directly.
    dst.extend_from_slice(format!("{:x}\r\n", bytes.len()).as_bytes());
    dst.extend_from_slice(bytes);
    dst.extend_from_slice(b"\r\n");
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ChunkedState {
    Size,
    SizeLws,
    Extension,
    SizeLf,
    Body,
    BodyCr,
    BodyLf,
    Trailer,
    TrailerLf,
    EndCr,
    EndLf,
    End,
}

macro_rules! byte {
    ($rdr:ident) => {{
        if $rdr.len() > 0 {
            let b = $rdr[0];
            $rdr.advance(1);
            b
        } else {
            return Ok(None);
        }
    }};
}

impl ChunkedState {
    fn step(&mut self, body: &mut BytesMut, size: &mut u64, buf: &mut Option<Bytes>) -> io::Result<Option<Self>> {
        match *self {
            Self::Size => Self::read_size(body, size),
            Self::SizeLws => Self::read_size_lws(body),
            Self::Extension => Self::read_extension(body),
            Self::SizeLf => Self::read_size_lf(body, size),
            Self::Body => Self::read_body(body, size, buf),
            Self::BodyCr => Self::read_body_cr(body),
            Self::BodyLf => Self::read_body_lf(body),
            Self::Trailer => Self::read_trailer(body),
            Self::TrailerLf => Self::read_trailer_lf(body),
            Self::EndCr => Self::read_end_cr(body),
            Self::EndLf => Self::read_end_lf(body),
            Self::End => Ok(Some(Self::End)),
        }
    }

    fn read_size(rdr: &mut BytesMut, size: &mut u64) -> io::Result<Option<Self>> {
        macro_rules! or_overflow {
            ($e:expr) => {
                match $e {
                    Some(val) => val,
                    None => return Err(io::Error::new(io::ErrorKind::InvalidData, "invalid chunk size: overflow")),
                }
            };
        }

        let radix = 16;
        match byte!(rdr) {
            b @ b'0'..=b'9' => {
                *size = or_overflow!(size.checked_mul(radix));
                *size = or_overflow!(size.checked_add((b - b'0') as u64));
            }
            b @ b'a'..=b'f' => {
                *size = or_overflow!(size.checked_mul(radix));
                *size = or_overflow!(size.checked_add((b + 10 - b'a') as u64));
            }
            b @ b'A'..=b'F' => {
                *size = or_overflow!(size.checked_mul(radix));
                *size = or_overflow!(size.checked_add((b + 10 - b'A') as u64));
            }
            b'\t' | b' ' => return Ok(Some(Self::SizeLws)),
            b';' => return Ok(Some(Self::Extension)),
            b'\r' => return Ok(Some(Self::SizeLf)),
            _ => return Err(io::Error::new(io::ErrorKind::InvalidInput, "invalid chunk size line")),
        }

        Ok(Some(Self::Size))
    }

    fn read_size_lws(rdr: &mut BytesMut) -> io::Result<Option<Self>> {
        match byte!(rdr) {
            b'\t' | b' ' => Ok(Some(Self::SizeLws)),
            b';' => Ok(Some(Self::Extension)),
            b'\r' => Ok(Some(Self::SizeLf)),
            _ => Err(io::Error::new(io::ErrorKind::InvalidInput, "invalid chunk size linear white space")),
        }
    }

    fn read_extension(rdr: &mut BytesMut) -> io::Result<Option<Self>> {
        match byte!(rdr) {
            b'\r' => Ok(Some(Self::SizeLf)),
            b'\n' => Err(io::Error::new(io::ErrorKind::InvalidData, "chunk extension contains bare newline")),
            _ => Ok(Some(Self::Extension)),
        }
    }

    fn read_size_lf(rdr: &mut BytesMut, size: &mut u64) -> io::Result<Option<Self>> {
        match byte!(rdr) {
            b'\n' if *size > 0 => Ok(Some(Self::Body)),
            b'\n' if *size == 0 => Ok(Some(Self::EndCr)),
            _ => Err(io::Error::new(io::ErrorKind::InvalidInput, "invalid chunk size LF")),
        }
    }

    fn read_body(rdr: &mut BytesMut, rem: &mut u64, buf: &mut Option<Bytes>) -> io::Result<Option<Self>> {
        if rdr.is_empty() {
            Ok(None)
        } else {
            *buf = Some(bounded_split(rem, rdr));
            if *rem > 0 {
                Ok(Some(Self::Body))
            } else {
                Ok(Some(Self::BodyCr))
            }
        }
    }

    fn read_body_cr(rdr: &mut BytesMut) -> io::Result<Option<Self>> {
        match byte!(rdr) {
            b'\r' => Ok(Some(Self::BodyLf)),
            _ => Err(io::Error::new(io::ErrorKind::InvalidInput, "invalid chunk body CR")),
        }
    }

    fn read_body_lf(rdr: &mut BytesMut) -> io::Result<Option<Self>> {
        match byte!(rdr) {
            b'\n' => Ok(Some(Self::Size)),
            _ => Err(io::Error::new(io::ErrorKind::InvalidInput, "invalid chunk body LF")),
        }
    }

    fn read_trailer(rdr: &mut BytesMut) -> io::Result<Option<Self>> {
        match byte!(rdr) {
            b'\r' => Ok(Some(Self::TrailerLf)),
            _ => Ok(Some(Self::Trailer)),
        }
    }

    fn read_trailer_lf(rdr: &mut BytesMut) -> io::Result<Option<Self>> {
        match byte!(rdr) {
            b'\n' => Ok(Some(Self::EndCr)),
            _ => Err(io::Error::new(io::ErrorKind::InvalidInput, "invalid trailer end LF")),
        }
    }

    fn read_end_cr(rdr: &mut BytesMut) -> io::Result<Option<Self>> {
        match byte!(rdr) {
            b'\r' => Ok(Some(Self::EndLf)),
            _ => Ok(Some(Self::Trailer)),
        }
    }

    fn read_end_lf(rdr: &mut BytesMut) -> io::Result<Option<Self>> {
        match byte!(rdr) {
            b'\n' => Ok(Some(Self::End)),
            _ => Err(io::Error::new(io::ErrorKind::InvalidInput, "invalid chunk end LF")),
        }
    }
}

/// outcome of one [`TransferCoding::decode`] call.
#[derive(Debug)]
pub enum ChunkResult {
    /// non-empty chunk data.
    Ok(Bytes),
    Err(io::Error),
    /// more input bytes required before another chunk can be produced.
    InsufficientData,
    /// coder reached EOF state just now.
    Eof,
    /// coder had already reached EOF state on a previous call.
    AlreadyEof,
}

impl fmt::Display for ChunkResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok(_) => f.write_str("chunked data."),
            Self::InsufficientData => f.write_str("insufficient data; more input bytes required."),
            Self::Eof => f.write_str("coder reached EOF state."),
            Self::AlreadyEof => f.write_str("coder already reached EOF state."),
            Self::Err(e) => fmt::Display::fmt(e, f),
        }
    }
}

fn bounded_split(rem: &mut u64, buf: &mut BytesMut) -> Bytes {
    let len = buf.len() as u64;
    if *rem >= len {
        *rem -= len;
        buf.split().freeze()
    } else {
        let rem = mem::replace(rem, 0);
        buf.split_to(rem as usize).freeze()
    }
}
