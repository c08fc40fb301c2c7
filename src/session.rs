//! Per-receiver session: one RTSP connection plus its three UDP sockets.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use rand::Rng;
use tokio::net::UdpSocket;
use tracing::warn;

use crate::clock::Clock;
use crate::codec;
use crate::config::StreamConfig;
use crate::error::StreamError;
use crate::metadata::{self, Volume};
use crate::net::udp;
use crate::net::TcpStream;
use crate::rtsp::capabilities::Capabilities;
use crate::rtsp::client::{generate_apple_challenge, options_request, ClientIdentity, Credentials};
use crate::rtsp::headers::{names, raop};
use crate::rtsp::{Method, RtspClient, RtspRequest, RtspResponse};
use crate::sdp;
use crate::sync::SyncEngine;

/// A receiver's negotiated transport details, parsed from the `SETUP` response.
#[derive(Debug, Clone, Copy)]
pub struct Transport {
    /// Receiver's negotiated audio UDP port.
    pub server_port: u16,
    /// Receiver's negotiated control UDP port.
    pub control_port: u16,
    /// Receiver's negotiated timing UDP port.
    pub timing_port: u16,
}

/// The `Audio-Jack-Status` speaker-type probe result, re-exported at this level since it is the
/// one piece of SETUP-response data callers usually want alongside [`Transport`].
pub use crate::rtsp::capabilities::SpeakerType;

/// One receiver's end-to-end connection: RTSP control channel plus audio/control/timing UDP
/// sockets, capabilities, and that receiver's sync cadence.
pub struct Session {
    /// Address this session's RTSP connection and UDP sockets are talking to.
    pub remote_addr: SocketAddr,
    rtsp: RtspClient<TcpStream>,
    audio_socket: UdpSocket,
    control_socket: UdpSocket,
    timing_socket: UdpSocket,
    /// Receiver capabilities derived from the OPTIONS/SETUP exchange.
    pub capabilities: Capabilities,
    /// This receiver's sync/timing cadence state.
    pub sync: SyncEngine,
    session_uri_id: u32,
    local_ip: std::net::IpAddr,
    malformed_packets: AtomicU64,
}

impl Session {
    /// Open the RTSP TCP connection and bind the three UDP sockets, preferring the configured
    /// ports and falling back to ephemeral ones.
    ///
    /// # Errors
    /// Returns [`StreamError::TransportDown`] if the TCP connection or any UDP bind fails.
    pub async fn open(
        remote_addr: SocketAddr,
        local_ip: std::net::IpAddr,
        config: &StreamConfig,
        credentials: Credentials,
    ) -> Result<Self, StreamError> {
        let stream = TcpStream::connect(remote_addr)
            .await
            .map_err(|source| StreamError::TransportDown {
                device: remote_addr,
                source,
            })?;

        let mut rtsp = RtspClient::new(stream, ClientIdentity::generate(), config.rtsp_request_timeout);
        rtsp.set_credentials(credentials);

        let (audio_socket, _) = udp::bind_preferred(config.audio_port)
            .await
            .map_err(|source| StreamError::TransportDown {
                device: remote_addr,
                source,
            })?;
        let (control_socket, _) = udp::bind_preferred(config.control_port)
            .await
            .map_err(|source| StreamError::TransportDown {
                device: remote_addr,
                source,
            })?;
        let (timing_socket, _) = udp::bind_preferred(config.timing_port)
            .await
            .map_err(|source| StreamError::TransportDown {
                device: remote_addr,
                source,
            })?;

        let session_uri_id: u32 = rand::thread_rng().r#gen();

        Ok(Self {
            remote_addr,
            rtsp,
            audio_socket,
            control_socket,
            timing_socket,
            capabilities: Capabilities::default(),
            sync: SyncEngine::new(Clock::new(), config.timesync_interval_frames, config.default_latency_frames),
            session_uri_id,
            local_ip,
            malformed_packets: AtomicU64::new(0),
        })
    }

    fn session_uri(&self) -> String {
        format!("rtsp://{}/{}", self.local_ip, self.session_uri_id)
    }

    /// Number of inbound datagrams on this session's control/timing sockets that failed to
    /// decode as any known packet shape, since the session was opened. Dropped silently as they
    /// arrive; this counter is the only record of them.
    pub fn malformed_packet_count(&self) -> u64 {
        self.malformed_packets.load(Ordering::Relaxed)
    }

    /// Run OPTIONS → ANNOUNCE → SETUP → RECORD → initial volume, deriving capabilities along the
    /// way and connecting the UDP sockets to the receiver's negotiated ports.
    ///
    /// # Errors
    /// Returns a [`StreamError`] if any RTSP exchange fails or transport connection breaks.
    pub async fn handshake(
        &mut self,
        user_agent: &str,
        encrypted_key: Option<(&str, &str)>,
        initial_seq: u16,
        initial_ts: u32,
        initial_volume: Volume,
    ) -> Result<(Transport, SpeakerType), StreamError> {
        let challenge = generate_apple_challenge();
        let options = options_request(&challenge, user_agent);
        let options_response = self.rtsp_send(Method::Options, options).await?;
        self.capabilities = Capabilities::from_options_response(&options_response);

        let sdp_body = sdp::announce_sdp(
            self.session_uri_id,
            &self.local_ip.to_string(),
            &self.remote_addr.ip().to_string(),
            encrypted_key,
        );
        let announce = RtspRequest::builder(Method::Announce, self.session_uri())
            .user_agent(user_agent)
            .content_type("application/sdp")
            .body(sdp_body.into_bytes())
            .build();
        self.rtsp_send(Method::Announce, announce).await?;

        let local_control_port = self.control_socket.local_addr().ok().map(|a| a.port()).unwrap_or(0);
        let local_timing_port = self.timing_socket.local_addr().ok().map(|a| a.port()).unwrap_or(0);

        let transport_header = format!(
            "RTP/AVP/UDP;unicast;interleaved=0-1;mode=record;control_port={local_control_port};timing_port={local_timing_port}"
        );
        let setup = RtspRequest::builder(Method::Setup, self.session_uri())
            .user_agent(user_agent)
            .header(names::TRANSPORT, transport_header)
            .build();
        let setup_response = self.rtsp_send(Method::Setup, setup).await?;

        let transport = parse_transport(setup_response.headers.get(names::TRANSPORT)).unwrap_or(Transport {
            server_port: self.remote_addr.port(),
            control_port: self.remote_addr.port() + 1,
            timing_port: self.remote_addr.port() + 2,
        });

        let remote_ip = self.remote_addr.ip().to_string();
        udp::connect(&self.audio_socket, &remote_ip, transport.server_port)
            .await
            .map_err(|source| StreamError::TransportDown {
                device: self.remote_addr,
                source,
            })?;
        udp::connect(&self.control_socket, &remote_ip, transport.control_port)
            .await
            .map_err(|source| StreamError::TransportDown {
                device: self.remote_addr,
                source,
            })?;
        udp::connect(&self.timing_socket, &remote_ip, transport.timing_port)
            .await
            .map_err(|source| StreamError::TransportDown {
                device: self.remote_addr,
                source,
            })?;

        let speaker_type = SpeakerType::from_header(setup_response.headers.get(raop::AUDIO_JACK_STATUS));

        let record = RtspRequest::builder(Method::Record, self.session_uri())
            .user_agent(user_agent)
            .header(raop::RANGE, "npt=0-")
            .header("RTP-Info", format!("seq={initial_seq};rtptime={initial_ts}"))
            .build();
        let record_response = self.rtsp_send(Method::Record, record).await?;

        self.capabilities = self
            .capabilities
            .with_audio_latency(record_response.headers.get(raop::AUDIO_LATENCY));
        if let Some(frames) = self.capabilities.audio_latency_frames {
            self.sync.set_audio_latency(frames);
        }

        let volume_request = RtspRequest::builder(Method::SetParameter, self.session_uri())
            .user_agent(user_agent)
            .content_type("text/parameters")
            .body(metadata::volume_body(initial_volume))
            .build();
        self.rtsp_send(Method::SetParameter, volume_request).await?;

        Ok((transport, speaker_type))
    }

    async fn rtsp_send(&mut self, method: Method, request: RtspRequest) -> Result<RtspResponse, StreamError> {
        self.rtsp
            .send(request, self.capabilities.lowercase_password)
            .await
            .map_err(|err| err.into_stream_error(method, self.remote_addr))
    }

    /// Send one already-encoded audio packet (identical across the whole receiver group) on this
    /// session's audio socket.
    ///
    /// # Errors
    /// Returns [`StreamError::TransportDown`] if the datagram cannot be sent.
    pub async fn send_audio(&self, packet: &Bytes) -> Result<(), StreamError> {
        self.audio_socket
            .send(packet)
            .await
            .map(|_| ())
            .map_err(|source| StreamError::TransportDown {
                device: self.remote_addr,
                source,
            })
    }

    /// Send a sync packet if the cadence says one is due, given the RTP timestamp of the next
    /// audio packet to be emitted.
    ///
    /// # Errors
    /// Returns [`StreamError::TransportDown`] if the datagram cannot be sent.
    pub async fn maybe_send_sync(&mut self, next_ts: u32) -> Result<(), StreamError> {
        if !self.sync.is_due() {
            return Ok(());
        }
        let packet = self.sync.build_sync(next_ts);
        self.control_socket
            .send(&packet)
            .await
            .map(|_| ())
            .map_err(|source| StreamError::TransportDown {
                device: self.remote_addr,
                source,
            })
    }

    /// Poll the control socket once for a pending resend request, without blocking if none has
    /// arrived. Returns the decoded request so the caller (which owns the shared backlog) can
    /// look up and resend the missing payloads. A datagram that doesn't decode as a resend
    /// request is dropped and counted (see [`Session::malformed_packet_count`]), not treated as
    /// a session failure.
    ///
    /// # Errors
    /// Returns [`StreamError::TransportDown`] on a genuine socket error (not "would block").
    pub fn try_recv_resend_request(&self) -> Result<Option<codec::ResendRequest>, StreamError> {
        let mut buf = [0u8; 1500];
        match self.control_socket.try_recv(&mut buf) {
            Ok(n) => match codec::decode_resend_request(&buf[..n]) {
                Ok(request) => Ok(Some(request)),
                Err(err) => {
                    self.malformed_packets.fetch_add(1, Ordering::Relaxed);
                    warn!(device = %self.remote_addr, error = %err, "dropping malformed control datagram");
                    Ok(None)
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(source) => Err(StreamError::TransportDown {
                device: self.remote_addr,
                source,
            }),
        }
    }

    /// Resend a single previously emitted payload, unchanged, to the control port.
    ///
    /// # Errors
    /// Returns [`StreamError::TransportDown`] if the datagram cannot be sent.
    pub async fn resend(&self, payload: &Bytes) -> Result<(), StreamError> {
        self.control_socket
            .send(payload)
            .await
            .map(|_| ())
            .map_err(|source| StreamError::TransportDown {
                device: self.remote_addr,
                source,
            })
    }

    /// Poll the timing socket once for an inbound timing request and, if one arrived, answer it
    /// immediately. A datagram that doesn't decode as a timing request is dropped and counted
    /// (see [`Session::malformed_packet_count`]), not treated as a session failure.
    ///
    /// # Errors
    /// Returns [`StreamError::TransportDown`] on a genuine socket error (not "would block").
    pub async fn service_timing_socket(&self) -> Result<(), StreamError> {
        let mut buf = [0u8; 1500];
        let received_at = Clock::new().now_ntp();
        match self.timing_socket.try_recv(&mut buf) {
            Ok(n) => {
                let request = match codec::decode_timing_request(&buf[..n]) {
                    Ok(request) => request,
                    Err(err) => {
                        self.malformed_packets.fetch_add(1, Ordering::Relaxed);
                        warn!(device = %self.remote_addr, error = %err, "dropping malformed timing datagram");
                        return Ok(());
                    }
                };
                let response = self.sync.answer_timing_request(&request, received_at);
                self.timing_socket
                    .send(&response)
                    .await
                    .map(|_| ())
                    .map_err(|source| StreamError::TransportDown {
                        device: self.remote_addr,
                        source,
                    })
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(()),
            Err(source) => Err(StreamError::TransportDown {
                device: self.remote_addr,
                source,
            }),
        }
    }

    /// Send an arbitrary already-built `SET_PARAMETER`/RTSP request on this session's control
    /// channel (volume, progress, metadata, FLUSH, TEARDOWN all funnel through this).
    ///
    /// # Errors
    /// Returns a [`StreamError`] if the exchange fails.
    pub async fn send_rtsp(
        &mut self,
        method: Method,
        headers: &[(&str, String)],
        content_type: Option<&str>,
        body: Vec<u8>,
        user_agent: &str,
    ) -> Result<(), StreamError> {
        let mut builder = RtspRequest::builder(method, self.session_uri()).user_agent(user_agent);
        if let Some(content_type) = content_type {
            builder = builder.content_type(content_type);
        }
        for (name, value) in headers {
            builder = builder.header(*name, value.clone());
        }
        let request = builder.body(body).build();
        self.rtsp_send(method, request).await.map(|_| ())
    }
}

fn parse_transport(header: Option<&str>) -> Option<Transport> {
    let header = header?;
    let mut server_port = None;
    let mut control_port = None;
    let mut timing_port = None;

    for field in header.split(';') {
        let Some((key, value)) = field.split_once('=') else {
            continue;
        };
        match key {
            "server_port" => server_port = value.parse().ok(),
            "control_port" => control_port = value.parse().ok(),
            "timing_port" => timing_port = value.parse().ok(),
            _ => {}
        }
    }

    Some(Transport {
        server_port: server_port?,
        control_port: control_port?,
        timing_port: timing_port?,
    })
}
