use super::{Method, headers::names, Headers};

/// An outgoing RTSP request.
#[derive(Debug, Clone)]
pub struct RtspRequest {
    /// RTSP method.
    pub method: Method,
    /// Full request URI, e.g. `rtsp://192.168.1.10/{session_id}`.
    pub uri: String,
    /// Request headers.
    pub headers: Headers,
    /// Request body, empty for most methods.
    pub body: Vec<u8>,
}

impl RtspRequest {
    /// A bare request with no headers or body.
    #[must_use]
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Start a fluent builder.
    #[must_use]
    pub fn builder(method: Method, uri: impl Into<String>) -> RtspRequestBuilder {
        RtspRequestBuilder::new(method, uri)
    }

    /// Serialize to the bytes sent on the wire.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut output = Vec::with_capacity(256 + self.body.len());

        output.extend_from_slice(self.method.as_str().as_bytes());
        output.push(b' ');
        output.extend_from_slice(self.uri.as_bytes());
        output.extend_from_slice(b" RTSP/1.0\r\n");

        for (name, value) in self.headers.iter() {
            output.extend_from_slice(name.as_bytes());
            output.extend_from_slice(b": ");
            output.extend_from_slice(value.as_bytes());
            output.extend_from_slice(b"\r\n");
        }

        if !self.body.is_empty() {
            let len_header = format!("{}: {}\r\n", names::CONTENT_LENGTH, self.body.len());
            output.extend_from_slice(len_header.as_bytes());
        }

        output.extend_from_slice(b"\r\n");
        output.extend_from_slice(&self.body);

        output
    }
}

/// Fluent [`RtspRequest`] builder.
#[derive(Debug)]
pub struct RtspRequestBuilder {
    request: RtspRequest,
}

impl RtspRequestBuilder {
    /// Start building a request for `method`/`uri`.
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            request: RtspRequest::new(method, uri),
        }
    }

    /// Set an arbitrary header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.headers.insert(name, value);
        self
    }

    /// Set the `CSeq` header.
    #[must_use]
    pub fn cseq(self, seq: u32) -> Self {
        self.header(names::CSEQ, seq.to_string())
    }

    /// Set the `Content-Type` header.
    #[must_use]
    pub fn content_type(self, content_type: &str) -> Self {
        self.header(names::CONTENT_TYPE, content_type)
    }

    /// Set the `User-Agent` header.
    #[must_use]
    pub fn user_agent(self, agent: &str) -> Self {
        self.header(names::USER_AGENT, agent)
    }

    /// Set the `Session` header.
    #[must_use]
    pub fn session(self, session_id: &str) -> Self {
        self.header(names::SESSION, session_id)
    }

    /// Set a raw body.
    #[must_use]
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.request.body = body;
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> RtspRequest {
        self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_simple_request() {
        let request = RtspRequest::builder(Method::Options, "rtsp://192.168.1.10:5000/*")
            .cseq(1)
            .user_agent("test/1.0")
            .build();

        let encoded = request.encode();
        let text = String::from_utf8_lossy(&encoded);

        assert!(text.starts_with("OPTIONS rtsp://192.168.1.10:5000/* RTSP/1.0\r\n"));
        assert!(text.contains("CSeq: 1\r\n"));
        assert!(text.contains("User-Agent: test/1.0\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[test]
    fn encode_with_body_sets_content_length() {
        let body = b"volume: -10.000000\r\n".to_vec();
        let request = RtspRequest::builder(Method::SetParameter, "rtsp://example.com/1")
            .cseq(5)
            .content_type("text/parameters")
            .body(body.clone())
            .build();

        let encoded = request.encode();
        let text = String::from_utf8_lossy(&encoded);

        assert!(text.contains("Content-Type: text/parameters\r\n"));
        assert!(text.contains(&format!("Content-Length: {}\r\n", body.len())));
        assert!(encoded.ends_with(&body));
    }
}
