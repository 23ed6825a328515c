//! `spec.md` §3: "HttpVersion — tagged variant over {0.9, 1.0, 1.1, 2.0, Unknown}. Unknown
//! triggers 505 at parse time." Deliberately a hand-rolled enum rather than `http::Version` (the
//! teacher's dependency): this crate has no h2/h3 feature gate to share a version type across, and
//! the data model calls for exactly these five tags with `Unknown` as a first-class outcome, not
//! an error.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http09,
    Http10,
    Http11,
    Http20,
    Unknown,
}

impl HttpVersion {
    /// parses the 8-byte `HTTP/x.y` token (no leading/trailing whitespace).
    pub fn parse(token: &[u8]) -> Self {
        match token {
            b"HTTP/0.9" => Self::Http09,
            b"HTTP/1.0" => Self::Http10,
            b"HTTP/1.1" => Self::Http11,
            b"HTTP/2.0" | b"HTTP/2" => Self::Http20,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http09 => "HTTP/0.9",
            Self::Http10 => "HTTP/1.0",
            Self::Http11 => "HTTP/1.1",
            Self::Http20 => "HTTP/2.0",
            Self::Unknown => "HTTP/1.1",
        }
    }

    /// whether this crate's HTTP/1 transport can serve the version at all (HTTP/2.0 and Unknown
    /// both resolve to a 505 at parse time per `spec.md` §3/§8 scenario 5).
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Http09 | Self::Http10 | Self::Http11)
    }

    /// default persistence for this version absent any `Connection` header (HTTP/1.1 defaults to
    /// keep-alive, HTTP/1.0 and older default to close).
    pub fn default_keep_alive(&self) -> bool {
        matches!(self, Self::Http11)
    }
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unsupported_versions_are_unknown_or_http2() {
        assert_eq!(HttpVersion::parse(b"HTTP/9.9"), HttpVersion::Unknown);
        assert!(!HttpVersion::Unknown.is_supported());
        assert!(!HttpVersion::Http20.is_supported());
    }

    #[test]
    fn http10_defaults_to_close() {
        assert!(!HttpVersion::Http10.default_keep_alive());
        assert!(HttpVersion::Http11.default_keep_alive());
    }
}
