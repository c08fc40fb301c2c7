use super::{Headers, RtspResponse, StatusCode};
use thiserror::Error;

/// Errors produced while incrementally parsing an RTSP response.
#[derive(Debug, Error)]
pub enum RtspCodecError {
    #[error("invalid status line: {0}")]
    InvalidStatusLine(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("response too large: {size} bytes")]
    ResponseTooLarge { size: usize },
}

/// Sans-IO incremental RTSP response parser. Feed bytes as they arrive with [`feed`], then call
/// [`decode`] until it returns `Ok(None)`.
///
/// [`feed`]: RtspCodec::feed
/// [`decode`]: RtspCodec::decode
pub struct RtspCodec {
    buffer: Vec<u8>,
    max_size: usize,
    state: ParseState,
}

#[derive(Debug, Clone)]
enum ParseState {
    StatusLine,
    Headers {
        version: String,
        status: StatusCode,
        reason: String,
    },
    Body {
        version: String,
        status: StatusCode,
        reason: String,
        headers: Headers,
        content_length: usize,
    },
}

impl RtspCodec {
    /// A codec with the default 1 MiB response cap.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            max_size: 1024 * 1024,
            state: ParseState::StatusLine,
        }
    }

    /// Override the maximum buffered response size.
    #[must_use]
    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = size;
        self
    }

    /// Append freshly read bytes to the internal buffer.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<(), RtspCodecError> {
        if self.buffer.len() + bytes.len() > self.max_size {
            return Err(RtspCodecError::ResponseTooLarge {
                size: self.buffer.len() + bytes.len(),
            });
        }
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    /// Try to decode a complete response from the buffered bytes.
    pub fn decode(&mut self) -> Result<Option<RtspResponse>, RtspCodecError> {
        loop {
            match &self.state {
                ParseState::StatusLine => {
                    let Some(line_end) = self.find_line_end() else {
                        return Ok(None);
                    };
                    let line = String::from_utf8_lossy(&self.buffer[..line_end]).to_string();
                    let (version, status, reason) = Self::parse_status_line(&line)?;
                    self.buffer.drain(..line_end + 2);
                    self.state = ParseState::Headers {
                        version,
                        status,
                        reason,
                    };
                }

                ParseState::Headers {
                    version,
                    status,
                    reason,
                } => {
                    let Some((headers, body_start)) = self.parse_headers()? else {
                        return Ok(None);
                    };
                    let content_length = headers.content_length().unwrap_or(0);
                    self.buffer.drain(..body_start);

                    if content_length == 0 {
                        let response = RtspResponse {
                            version: version.clone(),
                            status: *status,
                            reason: reason.clone(),
                            headers,
                            body: Vec::new(),
                        };
                        self.state = ParseState::StatusLine;
                        return Ok(Some(response));
                    }

                    self.state = ParseState::Body {
                        version: version.clone(),
                        status: *status,
                        reason: reason.clone(),
                        headers,
                        content_length,
                    };
                }

                ParseState::Body {
                    version,
                    status,
                    reason,
                    headers,
                    content_length,
                } => {
                    if self.buffer.len() < *content_length {
                        return Ok(None);
                    }
                    let body = self.buffer.drain(..*content_length).collect();
                    let response = RtspResponse {
                        version: version.clone(),
                        status: *status,
                        reason: reason.clone(),
                        headers: headers.clone(),
                        body,
                    };
                    self.state = ParseState::StatusLine;
                    return Ok(Some(response));
                }
            }
        }
    }

    /// Discard all buffered state (used after a connection reset).
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = ParseState::StatusLine;
    }

    /// Bytes currently buffered but not yet parsed into a response.
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn find_line_end(&self) -> Option<usize> {
        self.buffer.windows(2).position(|w| w == b"\r\n")
    }

    fn parse_status_line(line: &str) -> Result<(String, StatusCode, String), RtspCodecError> {
        let mut parts = line.splitn(3, ' ');

        let version = parts
            .next()
            .ok_or_else(|| RtspCodecError::InvalidStatusLine(line.to_string()))?
            .to_string();

        let status = parts
            .next()
            .ok_or_else(|| RtspCodecError::InvalidStatusLine(line.to_string()))?
            .parse::<u16>()
            .map_err(|_| RtspCodecError::InvalidStatusLine(line.to_string()))?;

        let reason = parts.next().unwrap_or("").to_string();

        Ok((version, StatusCode(status), reason))
    }

    fn parse_headers(&self) -> Result<Option<(Headers, usize)>, RtspCodecError> {
        if self.buffer.starts_with(b"\r\n") {
            return Ok(Some((Headers::new(), 2)));
        }

        let Some(header_end) = self.buffer.windows(4).position(|w| w == b"\r\n\r\n") else {
            return Ok(None);
        };

        let header_str = String::from_utf8_lossy(&self.buffer[..header_end]);
        let mut headers = Headers::new();

        for line in header_str.split("\r\n") {
            if line.is_empty() {
                continue;
            }
            let colon_pos = line
                .find(':')
                .ok_or_else(|| RtspCodecError::InvalidHeader(line.to_string()))?;
            let name = line[..colon_pos].trim().to_string();
            let value = line[colon_pos + 1..].trim().to_string();
            headers.insert(name, value);
        }

        Ok(Some((headers, header_end + 4)))
    }
}

impl Default for RtspCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_response_with_no_body() {
        let mut codec = RtspCodec::new();
        codec
            .feed(b"RTSP/1.0 200 OK\r\nCSeq: 1\r\nSession: abc\r\n\r\n")
            .unwrap();
        let response = codec.decode().unwrap().unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.cseq(), Some(1));
        assert_eq!(response.session(), Some("abc"));
    }

    #[test]
    fn waits_for_full_body_before_decoding() {
        let mut codec = RtspCodec::new();
        codec
            .feed(b"RTSP/1.0 200 OK\r\nContent-Length: 5\r\n\r\nhel")
            .unwrap();
        assert!(codec.decode().unwrap().is_none());
        codec.feed(b"lo").unwrap();
        let response = codec.decode().unwrap().unwrap();
        assert_eq!(response.body, b"hello");
    }

    #[test]
    fn handles_two_responses_fed_back_to_back() {
        let mut codec = RtspCodec::new();
        codec
            .feed(b"RTSP/1.0 200 OK\r\nCSeq: 1\r\n\r\nRTSP/1.0 200 OK\r\nCSeq: 2\r\n\r\n")
            .unwrap();
        let first = codec.decode().unwrap().unwrap();
        let second = codec.decode().unwrap().unwrap();
        assert_eq!(first.cseq(), Some(1));
        assert_eq!(second.cseq(), Some(2));
    }

    #[test]
    fn rejects_oversized_responses() {
        let mut codec = RtspCodec::new().with_max_size(4);
        assert!(matches!(
            codec.feed(b"too much"),
            Err(RtspCodecError::ResponseTooLarge { .. })
        ));
    }
}
