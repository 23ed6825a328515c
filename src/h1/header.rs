//! `spec.md` §3: `HeaderField`/`HeaderFieldList`, hand-rolled rather than built on `http::HeaderMap`
//! (the teacher's choice via `httparse::Header`/`http::HeaderMap`) because the data model calls for
//! an explicitly *ordered*, duplicate-permitting list with case-insensitive-by-name lookup — the
//! literal shape `http::HeaderMap` does not expose (it groups duplicates under one key and does not
//! preserve arbitrary insertion order across distinct names).

use bytes::Bytes;

/// a header name. stored verbatim (preserving the wire casing for re-emission) with
/// case-insensitive `Eq`/`Hash`... except `HeaderFieldList` does linear lookup, not hashing, so
/// only `Eq`-by-ascii-lowercase is needed here.
#[derive(Debug, Clone)]
pub struct HeaderName(Bytes);

impl HeaderName {
    pub fn from_bytes(bytes: Bytes) -> Self {
        Self(bytes)
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).unwrap_or("")
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn eq_ignore_ascii_case(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other.as_bytes())
    }
}

impl PartialEq for HeaderName {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}
impl Eq for HeaderName {}

/// a single (name, value) pair. `spec.md` §3: "compared case-insensitively on name equality;
/// values are preserved verbatim."
#[derive(Debug, Clone)]
pub struct HeaderField {
    pub name: HeaderName,
    pub value: Bytes,
}

impl HeaderField {
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            name: HeaderName::from_bytes(name.into()),
            value: value.into(),
        }
    }

    pub fn value_str(&self) -> &str {
        std::str::from_utf8(&self.value).unwrap_or("")
    }
}

/// `spec.md` §3: "an ordered sequence of HeaderField. Duplicates are permitted (required for
/// `Set-Cookie`). Lookup is case-insensitive, first-match."
#[derive(Debug, Clone, Default)]
pub struct HeaderFieldList {
    fields: Vec<HeaderField>,
}

impl HeaderFieldList {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn push(&mut self, name: impl Into<Bytes>, value: impl Into<Bytes>) {
        self.fields.push(HeaderField::new(name, value));
    }

    pub fn push_field(&mut self, field: HeaderField) {
        self.fields.push(field);
    }

    /// first value matching `name`, case-insensitive.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(HeaderField::value_str)
    }

    /// every value matching `name`, case-insensitive, in insertion order (e.g. all `Set-Cookie`
    /// values on a response).
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |f| f.name.eq_ignore_ascii_case(name))
            .map(HeaderField::value_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// remove every field matching `name`, case-insensitive.
    pub fn remove(&mut self, name: &str) {
        self.fields.retain(|f| !f.name.eq_ignore_ascii_case(name));
    }

    pub fn iter(&self) -> impl Iterator<Item = &HeaderField> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// response-side connection-level headers the transport owns exclusively: `spec.md` §4.3's "reject
/// connection-level headers if supplied by the user (Transfer-Encoding, TE, Upgrade, Connection,
/// Keep-Alive)" plus §4.4's "Response header injection" list (`Connection`/`Keep-Alive`, `Server`,
/// `Date`). A handler's [`super::response::HttpResponse::set_header`] call naming one of these is
/// silently dropped — the transport is the sole writer.
pub const CONNECTION_LEVEL_RESPONSE_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "transfer-encoding",
    "te",
    "upgrade",
    "date",
    "server",
];

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive_first_match() {
        let mut list = HeaderFieldList::new();
        list.push("Content-Type", "text/plain");
        list.push("X-Custom", "a");
        list.push("x-custom", "b");

        assert_eq!(list.get("content-type"), Some("text/plain"));
        assert_eq!(list.get("X-CUSTOM"), Some("a"));
        assert_eq!(list.get_all("x-custom").collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn duplicates_preserved_for_set_cookie() {
        let mut list = HeaderFieldList::new();
        list.push("Set-Cookie", "a=1");
        list.push("Set-Cookie", "b=2");
        assert_eq!(list.len(), 2);
        assert_eq!(list.get_all("set-cookie").count(), 2);
    }
}
