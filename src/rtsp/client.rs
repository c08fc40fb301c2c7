//! The RTSP client: one TCP connection per receiver, carrying the handshake and all in-session
//! requests (FLUSH, SET_PARAMETER, TEARDOWN).

use std::net::SocketAddr;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD_NO_PAD as BASE64, Engine as _};
use rand::RngCore;
use thiserror::Error;

use super::digest::{DigestChallenge, DigestResponse};
use super::headers::{names, raop};
use super::{Headers, Method, RtspCodec, RtspRequest, RtspResponse, StatusCode};
use crate::error::StreamError;
use crate::net::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Errors specific to constructing and driving an [`RtspClient`]; callers generally see these
/// folded into [`StreamError`] via [`RtspClientError::into_stream_error`].
#[derive(Debug, Error)]
pub enum RtspClientError {
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed response: {0}")]
    Codec(#[from] super::RtspCodecError),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("server returned {status} {reason}")]
    ProtocolError { status: u16, reason: String },

    #[error("authentication challenge could not be satisfied: {0}")]
    AuthFailed(String),
}

impl RtspClientError {
    /// Fold into the crate-wide error taxonomy for a request to `device` using `method`.
    #[must_use]
    pub fn into_stream_error(self, method: Method, device: SocketAddr) -> StreamError {
        match self {
            RtspClientError::Io(source) => StreamError::TransportDown { device, source },
            RtspClientError::Codec(err) => StreamError::MalformedPacket(err.to_string()),
            RtspClientError::Timeout(elapsed) => StreamError::Timeout {
                method,
                device,
                elapsed_secs: elapsed.as_secs(),
            },
            RtspClientError::ProtocolError { status, reason } => StreamError::RtspProtocolError {
                method,
                device,
                status,
                reason,
            },
            RtspClientError::AuthFailed(message) => StreamError::AuthRequired { device, message },
        }
    }
}

/// Identifiers a client presents on every request, generated once per session.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    /// 64 hex characters, derived from 8 random bytes.
    pub client_instance: String,
    /// Paired with `active_remote` for DACP remote-control addressing.
    pub dacp_id: String,
    /// Paired with `dacp_id`.
    pub active_remote: String,
}

impl ClientIdentity {
    /// Generate fresh random identifiers.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();

        let mut instance_bytes = [0u8; 8];
        rng.fill_bytes(&mut instance_bytes);
        let client_instance = instance_bytes.iter().map(|b| format!("{b:02X}")).collect();

        let dacp_id: String = (0..8).map(|_| format!("{:X}", rng.next_u32() % 16)).collect();
        let active_remote = (rng.next_u32() % 4_000_000_000).to_string();

        Self {
            client_instance,
            dacp_id,
            active_remote,
        }
    }
}

/// Credentials used to answer a Digest challenge. Password-only auth (no username) is common for
/// RAOP; an empty username is passed through to the digest computation unchanged.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// RTSP client bound to one TCP stream `T`. Generic so the handshake and request logic can be
/// exercised against an in-memory duplex pair in tests, without a real socket.
pub struct RtspClient<T> {
    stream: T,
    codec: RtspCodec,
    cseq: u32,
    session_id: Option<String>,
    identity: ClientIdentity,
    credentials: Credentials,
    request_timeout: Duration,
    read_buf: [u8; 4096],
}

impl<T> RtspClient<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already-connected stream.
    pub fn new(stream: T, identity: ClientIdentity, request_timeout: Duration) -> Self {
        Self {
            stream,
            codec: RtspCodec::new(),
            cseq: 0,
            session_id: None,
            identity,
            credentials: Credentials::default(),
            request_timeout,
            read_buf: [0u8; 4096],
        }
    }

    /// Set the credentials used to answer a `401` challenge.
    pub fn set_credentials(&mut self, credentials: Credentials) {
        self.credentials = credentials;
    }

    /// The server-assigned session id, once `ANNOUNCE` has completed.
    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Send `request`, retrying exactly once with a computed `Authorization` header if the
    /// server answers `401`. `lowercase_password` matches a capability quirk some receivers
    /// require: the Digest HA1 is computed against the password lowercased first.
    pub async fn send(
        &mut self,
        mut request: RtspRequest,
        lowercase_password: bool,
    ) -> Result<RtspResponse, RtspClientError> {
        self.cseq += 1;
        request.headers.insert(names::CSEQ, self.cseq.to_string());
        request
            .headers
            .insert(raop::CLIENT_INSTANCE, &self.identity.client_instance);
        request
            .headers
            .insert(raop::DACP_ID, &self.identity.dacp_id);
        request
            .headers
            .insert(raop::ACTIVE_REMOTE, &self.identity.active_remote);

        if let Some(session_id) = &self.session_id {
            if !request.headers.contains(names::SESSION) {
                request.headers.insert(names::SESSION, session_id.clone());
            }
        }

        let response = self.roundtrip(request.clone()).await?;

        if response.status == StatusCode::UNAUTHORIZED {
            let Some(challenge_header) = response.headers.get(names::WWW_AUTHENTICATE) else {
                return Err(RtspClientError::AuthFailed(
                    "401 with no WWW-Authenticate header".to_string(),
                ));
            };
            let Some(challenge) = DigestChallenge::parse(challenge_header) else {
                return Err(RtspClientError::AuthFailed(
                    "unsupported authentication scheme".to_string(),
                ));
            };

            let password = if lowercase_password {
                self.credentials.password.to_lowercase()
            } else {
                self.credentials.password.clone()
            };

            let mut rng = rand::thread_rng();
            let cnonce: String = (0..16).map(|_| format!("{:x}", rng.next_u32() % 16)).collect();

            let digest_response = DigestResponse::compute(
                &challenge,
                &self.credentials.username,
                &password,
                request.method.as_str(),
                &request.uri,
                &cnonce,
            );

            self.cseq += 1;
            request
                .headers
                .insert(names::CSEQ, self.cseq.to_string());
            request
                .headers
                .insert(names::AUTHORIZATION, digest_response.to_string());

            let retried = self.roundtrip(request).await?;
            if retried.status == StatusCode::UNAUTHORIZED {
                return Err(RtspClientError::AuthFailed(
                    "credentials rejected twice".to_string(),
                ));
            }
            return self.check_status(retried);
        }

        self.check_status(response)
    }

    fn check_status(&mut self, response: RtspResponse) -> Result<RtspResponse, RtspClientError> {
        if let Some(session_id) = response.session() {
            self.session_id = Some(session_id.split(';').next().unwrap_or(session_id).to_string());
        }

        if !response.is_success() {
            return Err(RtspClientError::ProtocolError {
                status: response.status.as_u16(),
                reason: response.reason.clone(),
            });
        }

        Ok(response)
    }

    // Write and read are timed separately rather than as one combined budget, so a slow write
    // can't eat into the time a legitimately slow receiver gets to answer.
    async fn roundtrip(&mut self, request: RtspRequest) -> Result<RtspResponse, RtspClientError> {
        net::timeout(self.request_timeout, self.write_request(&request))
            .await
            .map_err(|_| RtspClientError::Timeout(self.request_timeout))??;

        net::timeout(self.request_timeout, self.read_response())
            .await
            .map_err(|_| RtspClientError::Timeout(self.request_timeout))?
    }

    async fn write_request(&mut self, request: &RtspRequest) -> Result<(), RtspClientError> {
        let encoded = request.encode();
        self.stream.write_all(&encoded).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn read_response(&mut self) -> Result<RtspResponse, RtspClientError> {
        loop {
            if let Some(response) = self.codec.decode()? {
                return Ok(response);
            }
            let n = self.stream.read(&mut self.read_buf).await?;
            if n == 0 {
                return Err(RtspClientError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed mid-response",
                )));
            }
            self.codec.feed(&self.read_buf[..n])?;
        }
    }
}

/// Generate 16 random bytes and base64-encode them without padding, for the `Apple-Challenge`
/// header.
#[must_use]
pub fn generate_apple_challenge() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64.encode(bytes)
}

/// Build the bare `OPTIONS *` request; capability headers are layered in by the caller since
/// they depend on the challenge just generated.
#[must_use]
pub fn options_request(apple_challenge: &str, user_agent: &str) -> RtspRequest {
    RtspRequest::builder(Method::Options, "*")
        .user_agent(user_agent)
        .header(raop::APPLE_CHALLENGE, apple_challenge)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::tests::duplex_pair;

    fn spawn_fake_server(
        mut server: impl AsyncRead + AsyncWrite + Unpin + Send + 'static,
        responses: Vec<&'static str>,
    ) {
        tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            for response in responses {
                // Drain one request (ANNOUNCE/SETUP bodies vary; just read what's pending).
                let _ = server.read(&mut buf).await;
                server.write_all(response.as_bytes()).await.unwrap();
                server.flush().await.unwrap();
            }
        });
    }

    #[tokio::test]
    async fn successful_request_returns_response_without_retry() {
        let (client_io, server_io) = duplex_pair();
        spawn_fake_server(server_io, vec!["RTSP/1.0 200 OK\r\nCSeq: 1\r\n\r\n"]);

        let mut client = RtspClient::new(
            client_io,
            ClientIdentity::generate(),
            Duration::from_secs(1),
        );

        let request = RtspRequest::builder(Method::Options, "*").build();
        let response = client.send(request, false).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn retries_once_on_401_with_digest_authorization() {
        let (client_io, server_io) = duplex_pair();
        spawn_fake_server(
            server_io,
            vec![
                "RTSP/1.0 401 Unauthorized\r\nCSeq: 1\r\nWWW-Authenticate: Digest realm=\"raop\", nonce=\"abc\"\r\n\r\n",
                "RTSP/1.0 200 OK\r\nCSeq: 2\r\n\r\n",
            ],
        );

        let mut client = RtspClient::new(
            client_io,
            ClientIdentity::generate(),
            Duration::from_secs(1),
        );
        client.set_credentials(Credentials {
            username: String::new(),
            password: "secret".to_string(),
        });

        let request = RtspRequest::builder(Method::Announce, "rtsp://1.2.3.4/1").build();
        let response = client.send(request, false).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn session_header_is_captured_and_reused() {
        let (client_io, server_io) = duplex_pair();
        spawn_fake_server(
            server_io,
            vec!["RTSP/1.0 200 OK\r\nCSeq: 1\r\nSession: 12345;timeout=60\r\n\r\n"],
        );

        let mut client = RtspClient::new(
            client_io,
            ClientIdentity::generate(),
            Duration::from_secs(1),
        );
        let request = RtspRequest::builder(Method::Announce, "rtsp://1.2.3.4/1").build();
        client.send(request, false).await.unwrap();
        assert_eq!(client.session_id(), Some("12345"));
    }

    #[tokio::test]
    async fn unanswered_request_fails_with_timeout_not_a_hang() {
        let (client_io, server_io) = duplex_pair();
        // Keep the server end alive but never respond, so the client is genuinely waiting on the
        // network rather than hitting EOF.
        std::mem::forget(server_io);

        let mut client = RtspClient::new(
            client_io,
            ClientIdentity::generate(),
            Duration::from_millis(50),
        );

        let request = RtspRequest::builder(Method::Options, "*").build();
        let err = client.send(request, false).await.unwrap_err();
        assert!(matches!(err, RtspClientError::Timeout(_)));
    }

    #[test]
    fn apple_challenge_is_16_bytes_base64_no_pad() {
        let challenge = generate_apple_challenge();
        assert!(!challenge.contains('='));
        let decoded = BASE64.decode(&challenge).unwrap();
        assert_eq!(decoded.len(), 16);
    }
}
