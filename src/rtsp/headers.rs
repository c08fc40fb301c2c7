//! RTSP header name constants and a case-insensitive header bag.

use std::collections::HashMap;

/// Generic RTSP header names.
pub mod names {
    pub const CSEQ: &str = "CSeq";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const CONTENT_LENGTH: &str = "Content-Length";
    pub const SESSION: &str = "Session";
    pub const TRANSPORT: &str = "Transport";
    pub const USER_AGENT: &str = "User-Agent";
    pub const WWW_AUTHENTICATE: &str = "WWW-Authenticate";
    pub const AUTHORIZATION: &str = "Authorization";
}

/// RAOP-specific header names.
pub mod raop {
    /// 16 random bytes, base64 (no padding); sent on OPTIONS.
    pub const APPLE_CHALLENGE: &str = "Apple-Challenge";
    /// Present on the OPTIONS response iff the receiver is "legacy Apple".
    pub const APPLE_RESPONSE: &str = "Apple-Response";
    /// Receiver's preferred audio latency, in frames.
    pub const AUDIO_LATENCY: &str = "Audio-Latency";
    /// Client instance identifier, echoed on every request.
    pub const CLIENT_INSTANCE: &str = "Client-Instance";
    /// DACP remote-control identifier.
    pub const DACP_ID: &str = "DACP-ID";
    /// Active-Remote token, paired with `DACP_ID`.
    pub const ACTIVE_REMOTE: &str = "Active-Remote";
    /// Receiver identification string, used for capability derivation.
    pub const SERVER: &str = "Server";
    /// `RECORD`'s `npt=` range.
    pub const RANGE: &str = "Range";
    /// Headphone/speaker presence probe, read from the `SETUP` response.
    pub const AUDIO_JACK_STATUS: &str = "Audio-Jack-Status";
}

/// A case-insensitive RTSP header collection. Lookups ignore case; the first-inserted casing of
/// a name is preserved on the wire.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    inner: HashMap<String, String>,
}

impl Headers {
    /// An empty header bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, replacing any existing header with the same name (case-insensitive).
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.inner.retain(|k, _| !k.eq_ignore_ascii_case(&name));
        self.inner.insert(name, value.into());
    }

    /// Look up a header by name, case-insensitively.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether a header with this name is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Parsed `CSeq` value.
    #[must_use]
    pub fn cseq(&self) -> Option<u32> {
        self.get(names::CSEQ)?.parse().ok()
    }

    /// Parsed `Content-Length` value.
    #[must_use]
    pub fn content_length(&self) -> Option<usize> {
        self.get(names::CONTENT_LENGTH)?.parse().ok()
    }

    /// `Session` header value, with any trailing `;timeout=...` still attached.
    #[must_use]
    pub fn session(&self) -> Option<&str> {
        self.get(names::SESSION)
    }

    /// Iterate all headers in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of headers present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether no headers are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl FromIterator<(String, String)> for Headers {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "application/sdp");
        assert_eq!(headers.get("content-type"), Some("application/sdp"));
    }

    #[test]
    fn insert_replaces_existing_case_insensitively() {
        let mut headers = Headers::new();
        headers.insert("CSeq", "1");
        headers.insert("cseq", "2");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.cseq(), Some(2));
    }
}
