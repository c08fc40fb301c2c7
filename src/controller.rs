//! Group-level orchestration: the single logical RTP clock, fan-out, resend/timing service,
//! and the stream state machine.

use std::net::{IpAddr, SocketAddr};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::warn;

use crate::audio::{AudioFormat as PipelineAudioFormat, AudioPipeline, FRAMES_PER_PACKET, SAMPLE_RATE, SessionKey};
use crate::backlog::Backlog;
use crate::config::StreamConfig;
use crate::crypto::AppleRsaPublicKey;
use crate::error::StreamError;
use crate::metadata::{self, Volume};
use crate::rtsp::client::Credentials;
use crate::rtsp::Method;
use crate::session::Session;

use base64::{engine::general_purpose::STANDARD_NO_PAD as BASE64, Engine as _};

/// Top-level stream state, following the Idle → Connecting → Streaming ⇄ Paused → TornDown
/// machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// No sessions open.
    Idle,
    /// Sessions are being opened and handshaken.
    Connecting,
    /// Audio is flowing.
    Streaming,
    /// FLUSH has been sent; the auto-teardown timer is running.
    Paused,
    /// All sessions torn down; a resume must replay the full handshake.
    TornDown,
}

fn time_per_packet() -> Duration {
    Duration::from_secs_f64(f64::from(FRAMES_PER_PACKET as u32) / f64::from(SAMPLE_RATE))
}

/// Drives one logical stream across every receiver in the group: one shared [`AudioPipeline`]
/// (so every receiver gets byte-identical packets, per-destination only) and one shared
/// [`Backlog`] so a resend request from any receiver can be answered from the same ring.
pub struct ReceiverGroup {
    sessions: Vec<Session>,
    pipeline: Option<AudioPipeline>,
    backlog: Mutex<Backlog>,
    state: StreamState,
    paused_since: Option<Instant>,
    stream_start: Option<(Instant, u64)>,
    packets_sent: u64,
    config: StreamConfig,
    local_ip: IpAddr,
    credentials: Credentials,
    encryption: Option<([u8; 16], [u8; 16])>,
    receiver_addrs: Vec<SocketAddr>,
    volume: Volume,
}

impl ReceiverGroup {
    /// Build an idle group targeting `receiver_addrs`. `encryption`, when set, is the raw
    /// AES-128 key/IV pair used for every receiver in the group; it is wrapped with RSA-OAEP
    /// fresh for each SETUP rather than reused across receivers.
    #[must_use]
    pub fn new(
        local_ip: IpAddr,
        config: StreamConfig,
        credentials: Credentials,
        encryption: Option<([u8; 16], [u8; 16])>,
        receiver_addrs: Vec<SocketAddr>,
    ) -> Self {
        let backlog_size = config.backlog_size;
        Self {
            sessions: Vec::new(),
            pipeline: None,
            backlog: Mutex::new(Backlog::new(backlog_size)),
            state: StreamState::Idle,
            paused_since: None,
            stream_start: None,
            packets_sent: 0,
            config,
            local_ip,
            credentials,
            encryption,
            receiver_addrs,
            volume: Volume::MAX,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Number of receivers currently in the group.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sessions.len()
    }

    /// Open and handshake every configured receiver, isolating single-receiver handshake
    /// failures. Fails the whole connect attempt only if every receiver is unreachable, or if a
    /// non-session-local error (capability mismatch, fatal internal) occurs.
    ///
    /// # Errors
    /// Returns a [`StreamError`] if no receiver could be connected, or if a non-retryable error
    /// (e.g. [`StreamError::CapabilityMismatch`]) occurs during any handshake.
    pub async fn connect(&mut self) -> Result<(), StreamError> {
        self.state = StreamState::Connecting;

        let wrapped_key = match self.encryption {
            Some((key, iv)) => {
                let rsa_key = AppleRsaPublicKey::load()
                    .map_err(|e| StreamError::FatalInternal(e.to_string()))?;
                let wrapped = rsa_key
                    .encrypt_oaep(&key)
                    .map_err(|e| StreamError::FatalInternal(e.to_string()))?;
                Some((BASE64.encode(wrapped), BASE64.encode(iv)))
            }
            None => None,
        };

        let mut sessions = Vec::new();
        let initial_seq: u16 = rand::thread_rng().r#gen();
        let initial_ts: u32 = rand::thread_rng().r#gen();

        for addr in self.receiver_addrs.clone() {
            let opened = Session::open(addr, self.local_ip, &self.config, self.credentials.clone()).await;
            let mut session = match opened {
                Ok(session) => session,
                Err(err) if err.is_session_local() => {
                    warn!(device = %addr, error = %err, "failed to open session, dropping from group");
                    continue;
                }
                Err(err) => return Err(err),
            };

            let encrypted_key = wrapped_key.as_ref().map(|(key, iv)| (key.as_str(), iv.as_str()));
            let handshake = session
                .handshake(
                    &self.config.user_agent,
                    encrypted_key,
                    initial_seq,
                    initial_ts,
                    self.volume,
                )
                .await;

            match handshake {
                Ok(_) => sessions.push(session),
                Err(err) if err.is_session_local() => {
                    warn!(device = %addr, error = %err, "handshake failed, dropping from group");
                }
                Err(err) => return Err(err),
            }
        }

        if sessions.is_empty() {
            self.state = StreamState::Idle;
            return Err(StreamError::FatalInternal(
                "no receivers could be connected".to_string(),
            ));
        }

        let ssrc: u32 = rand::thread_rng().r#gen();
        let pipeline_format = match self.encryption {
            Some((key, iv)) => PipelineAudioFormat::EncryptedAlac(SessionKey::new(key, iv)),
            None => PipelineAudioFormat::UnencryptedAlac,
        };

        self.sessions = sessions;
        self.pipeline = Some(AudioPipeline::new(ssrc, pipeline_format));
        self.backlog.lock().expect("backlog lock poisoned").clear();
        self.stream_start = None;
        self.packets_sent = 0;
        self.state = StreamState::Streaming;

        Ok(())
    }

    /// Encode one packet's worth of PCM, pace it against the shared clock, and fan it out,
    /// byte-identical, to every session's audio socket. Sessions that fail to receive it are
    /// dropped from the group with a warning rather than aborting the whole send.
    ///
    /// # Errors
    /// Returns [`StreamError::FatalInternal`] if the stream isn't currently [`StreamState::Streaming`].
    pub async fn send_frame(&mut self, pcm: &[u8]) -> Result<(), StreamError> {
        if self.state != StreamState::Streaming {
            return Err(StreamError::FatalInternal(
                "send_frame called while not streaming".to_string(),
            ));
        }
        self.pace_for_packet(self.packets_sent).await;

        let pipeline = self
            .pipeline
            .as_mut()
            .ok_or_else(|| StreamError::FatalInternal("no audio pipeline".to_string()))?;

        let seq = pipeline.sequence();
        let packet = pipeline.encode_packet(pcm);
        let next_ts = pipeline.timestamp();

        self.backlog
            .lock()
            .expect("backlog lock poisoned")
            .store(seq, packet.clone());

        let mut failed = Vec::new();
        for (idx, session) in self.sessions.iter_mut().enumerate() {
            if let Err(err) = session.send_audio(&packet).await {
                warn!(device = %session.remote_addr, error = %err, "audio send failed, dropping session");
                failed.push(idx);
                continue;
            }
            session.sync.record_frames_sent(FRAMES_PER_PACKET as u32);
            if let Err(err) = session.maybe_send_sync(next_ts).await {
                warn!(device = %session.remote_addr, error = %err, "sync send failed, dropping session");
                failed.push(idx);
            }
        }
        self.drop_sessions(&failed);
        self.packets_sent += 1;

        if self.sessions.is_empty() {
            self.state = StreamState::Idle;
            return Err(StreamError::FatalInternal(
                "all receivers dropped out of the group".to_string(),
            ));
        }

        Ok(())
    }

    async fn pace_for_packet(&mut self, index: u64) {
        let (start, start_index) = *self.stream_start.get_or_insert_with(|| (Instant::now(), index));
        let offset = index.saturating_sub(start_index);
        #[allow(clippy::cast_possible_truncation)]
        let scheduled = start + time_per_packet() * offset as u32;
        let now = Instant::now();
        if let Some(remaining) = scheduled.checked_duration_since(now) {
            tokio::time::sleep(remaining).await;
        }
    }

    /// Poll every session's control and timing sockets once for pending resend/timing requests,
    /// answering resends from the shared backlog. Non-blocking: safe to call on a tight loop.
    pub async fn service_sockets(&mut self) {
        let mut failed = Vec::new();

        for (idx, session) in self.sessions.iter_mut().enumerate() {
            match session.try_recv_resend_request() {
                Ok(Some(request)) => {
                    let resend = self
                        .backlog
                        .lock()
                        .expect("backlog lock poisoned")
                        .fetch_range(request.missed_seq, request.count);
                    for (_, payload) in resend {
                        if let Err(err) = session.resend(&payload).await {
                            warn!(device = %session.remote_addr, error = %err, "resend failed, dropping session");
                            failed.push(idx);
                            break;
                        }
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(device = %session.remote_addr, error = %err, "control socket error, dropping session");
                    failed.push(idx);
                    continue;
                }
            }

            if let Err(err) = session.service_timing_socket().await {
                warn!(device = %session.remote_addr, error = %err, "timing socket error, dropping session");
                failed.push(idx);
            }
        }

        self.drop_sessions(&failed);
    }

    fn drop_sessions(&mut self, indices: &[usize]) {
        for &idx in indices.iter().rev() {
            self.sessions.remove(idx);
        }
    }

    /// FLUSH every session and start the pause-auto-teardown timer.
    ///
    /// # Errors
    /// Returns [`StreamError::FatalInternal`] if the stream isn't currently streaming.
    pub async fn pause(&mut self) -> Result<(), StreamError> {
        if self.state != StreamState::Streaming {
            return Err(StreamError::FatalInternal(
                "pause called while not streaming".to_string(),
            ));
        }

        let mut failed = Vec::new();
        for (idx, session) in self.sessions.iter_mut().enumerate() {
            let result = session
                .send_rtsp(Method::Flush, &[], None, Vec::new(), &self.config.user_agent)
                .await;
            if let Err(err) = result {
                warn!(device = %session.remote_addr, error = %err, "FLUSH failed, dropping session");
                failed.push(idx);
                continue;
            }
            session.sync.reset_for_resume();
        }
        self.drop_sessions(&failed);

        if let Some(pipeline) = self.pipeline.as_mut() {
            pipeline.flush();
        }

        self.state = StreamState::Paused;
        self.paused_since = Some(Instant::now());
        self.stream_start = None;

        Ok(())
    }

    /// If paused for at least `pause_teardown_timeout`, issue TEARDOWN to every session. Returns
    /// whether a teardown was performed.
    ///
    /// # Errors
    /// Propagates any error from [`Self::teardown`].
    pub async fn tick_pause_timeout(&mut self) -> Result<bool, StreamError> {
        let Some(since) = self.paused_since else {
            return Ok(false);
        };
        if since.elapsed() < self.config.pause_teardown_timeout {
            return Ok(false);
        }
        self.teardown().await?;
        Ok(true)
    }

    /// Resume a paused or torn-down stream. From [`StreamState::Paused`] this just resumes
    /// sending (seq/timestamp continue monotonically); from [`StreamState::TornDown`] it replays
    /// the full handshake against fresh sessions with a new SSRC.
    ///
    /// # Errors
    /// Returns [`StreamError::FatalInternal`] if called from any other state, or whatever
    /// [`Self::connect`] can return when resuming from a teardown.
    pub async fn resume(&mut self) -> Result<(), StreamError> {
        match self.state {
            StreamState::Paused => {
                self.state = StreamState::Streaming;
                self.paused_since = None;
                self.stream_start = None;
                Ok(())
            }
            StreamState::TornDown => self.connect().await,
            _ => Err(StreamError::FatalInternal(
                "resume called from a state that is neither paused nor torn down".to_string(),
            )),
        }
    }

    /// TEARDOWN every session and release the pipeline and backlog.
    ///
    /// # Errors
    /// This method isolates per-session TEARDOWN failures (logged, not propagated); it only
    /// fails if the group was already idle.
    pub async fn teardown(&mut self) -> Result<(), StreamError> {
        for session in &mut self.sessions {
            if let Err(err) = session
                .send_rtsp(Method::Teardown, &[], None, Vec::new(), &self.config.user_agent)
                .await
            {
                warn!(device = %session.remote_addr, error = %err, "TEARDOWN failed");
            }
        }

        self.sessions.clear();
        self.pipeline = None;
        self.backlog.lock().expect("backlog lock poisoned").clear();
        self.paused_since = None;
        self.state = StreamState::TornDown;

        Ok(())
    }

    /// Drain and TEARDOWN everything, regardless of current state.
    ///
    /// # Errors
    /// Propagates any error from [`Self::teardown`].
    pub async fn stop(&mut self) -> Result<(), StreamError> {
        self.teardown().await
    }

    /// Push a new volume level to every session.
    ///
    /// # Errors
    /// Propagates a [`StreamError`] only if every session rejects it; individual rejections are
    /// isolated like any other session-local failure.
    pub async fn set_volume(&mut self, volume: Volume) -> Result<(), StreamError> {
        self.volume = volume;
        let body = metadata::volume_body(volume);
        self.push_to_all(Method::SetParameter, "text/parameters", body, "volume push").await
    }

    /// Push playback progress (as RTP timestamps) to every session.
    ///
    /// # Errors
    /// Propagates a [`StreamError`] only if every session rejects it; individual rejections are
    /// isolated like any other session-local failure.
    pub async fn push_progress(&mut self, start: u32, current: u32, end: u32) -> Result<(), StreamError> {
        let body = metadata::progress_body(start, current, end);
        self.push_to_all(Method::SetParameter, "text/parameters", body, "progress push").await
    }

    /// Push already-encoded track metadata to every session that wants it. `content_type` is
    /// `"application/x-dmap-tagged"` for DAAP or `"application/xml"` for PList; encoding the
    /// body is the caller's responsibility, not this engine's.
    ///
    /// # Errors
    /// Propagates a [`StreamError`] only if every session rejects it; individual rejections are
    /// isolated like any other session-local failure.
    pub async fn push_metadata(&mut self, content_type: &str, body: Vec<u8>) -> Result<(), StreamError> {
        self.push_to_all(Method::SetParameter, content_type, body, "metadata push").await
    }

    /// Push raw album art image bytes to every session, via the Rogue Amoeba
    /// `X_RA_SET_ALBUM_ART` extension request. `content_type` is the image's MIME type (e.g.
    /// `"image/jpeg"`); decoding or transcoding the image is the caller's responsibility.
    ///
    /// # Errors
    /// Propagates a [`StreamError`] only if every session rejects it; individual rejections are
    /// isolated like any other session-local failure.
    pub async fn push_album_art(&mut self, content_type: &str, image_bytes: Vec<u8>) -> Result<(), StreamError> {
        self.push_to_all(Method::XRaSetAlbumArt, content_type, image_bytes, "album art push")
            .await
    }

    /// Send `body` with the given method/content-type to every session, dropping any session
    /// that rejects it. Shared by every push-style operation (volume, progress, metadata, album
    /// art) since they differ only in method, content type, and body.
    async fn push_to_all(
        &mut self,
        method: Method,
        content_type: &str,
        body: Vec<u8>,
        context: &str,
    ) -> Result<(), StreamError> {
        let mut failed = Vec::new();
        for (idx, session) in self.sessions.iter_mut().enumerate() {
            let result = session
                .send_rtsp(method, &[], Some(content_type), body.clone(), &self.config.user_agent)
                .await;
            if let Err(err) = result {
                warn!(device = %session.remote_addr, error = %err, context, "push failed, dropping session");
                failed.push(idx);
            }
        }
        self.drop_sessions(&failed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> ReceiverGroup {
        ReceiverGroup::new(
            "127.0.0.1".parse().unwrap(),
            StreamConfig::default(),
            Credentials::default(),
            None,
            vec!["127.0.0.1:5000".parse().unwrap()],
        )
    }

    #[test]
    fn time_per_packet_matches_352_frames_at_44100hz() {
        let expected = 352.0 / 44_100.0;
        assert!((time_per_packet().as_secs_f64() - expected).abs() < 1e-9);
    }

    #[test]
    fn starts_idle_with_no_receivers() {
        let g = group();
        assert_eq!(g.state(), StreamState::Idle);
        assert_eq!(g.receiver_count(), 0);
    }

    #[tokio::test]
    async fn send_frame_before_connect_is_rejected() {
        let mut g = group();
        let err = g.send_frame(&[0u8; 1024]).await.unwrap_err();
        assert!(matches!(err, StreamError::FatalInternal(_)));
    }

    #[tokio::test]
    async fn pause_before_streaming_is_rejected() {
        let mut g = group();
        let err = g.pause().await.unwrap_err();
        assert!(matches!(err, StreamError::FatalInternal(_)));
    }

    #[tokio::test]
    async fn resume_from_idle_is_rejected() {
        let mut g = group();
        let err = g.resume().await.unwrap_err();
        assert!(matches!(err, StreamError::FatalInternal(_)));
    }

    #[tokio::test]
    async fn tick_pause_timeout_is_a_no_op_when_not_paused() {
        let mut g = group();
        assert!(!g.tick_pause_timeout().await.unwrap());
    }

    #[tokio::test]
    async fn push_style_operations_succeed_with_no_connected_sessions() {
        let mut g = group();
        g.set_volume(Volume::MAX).await.unwrap();
        g.push_progress(0, 1000, 2000).await.unwrap();
        g.push_metadata("application/x-dmap-tagged", vec![1, 2, 3]).await.unwrap();
        g.push_album_art("image/jpeg", vec![0xFF, 0xD8]).await.unwrap();
    }
}
