//! SDP body construction for the `ANNOUNCE` request.

use std::fmt::Write as _;

/// One session- or media-level SDP attribute line (`a=name` or `a=name:value`).
#[derive(Debug, Clone)]
struct Attribute {
    name: String,
    value: Option<String>,
}

/// A single `m=` media section and its attributes.
#[derive(Debug, Clone, Default)]
struct MediaSection {
    media_type: String,
    port: u16,
    protocol: String,
    formats: Vec<String>,
    attributes: Vec<Attribute>,
}

/// Fluent builder for an SDP session description, specialized to the one shape RAOP needs:
/// a single audio media section describing 44.1 kHz stereo Apple Lossless.
///
/// Attributes are kept in insertion order so the encoded body is deterministic and `rtpmap`
/// always precedes `fmtp`.
#[derive(Debug, Default)]
pub struct SdpBuilder {
    origin: Option<(String, String, String, String)>,
    session_name: String,
    connection: Option<String>,
    timing: Option<(u64, u64)>,
    media: Vec<MediaSection>,
    current_media: Option<MediaSection>,
}

impl SdpBuilder {
    /// Start a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `o=` origin. `addr` selects `IP4`/`IP6` based on whether it contains a colon.
    #[must_use]
    pub fn origin(mut self, username: &str, session_id: &str, session_version: &str, addr: &str) -> Self {
        self.origin = Some((
            username.to_string(),
            session_id.to_string(),
            session_version.to_string(),
            addr.to_string(),
        ));
        self
    }

    /// Set `s=` session name.
    #[must_use]
    pub fn session_name(mut self, name: &str) -> Self {
        self.session_name = name.to_string();
        self
    }

    /// Set `c=` connection address.
    #[must_use]
    pub fn connection(mut self, addr: &str) -> Self {
        self.connection = Some(addr.to_string());
        self
    }

    /// Set `t=` timing (RAOP always uses `0 0`).
    #[must_use]
    pub fn timing(mut self, start: u64, stop: u64) -> Self {
        self.timing = Some((start, stop));
        self
    }

    /// Start a new `m=` media section. Any previously open section is finalized first.
    #[must_use]
    pub fn media(mut self, media_type: &str, port: u16, protocol: &str, formats: &[&str]) -> Self {
        if let Some(section) = self.current_media.take() {
            self.media.push(section);
        }
        self.current_media = Some(MediaSection {
            media_type: media_type.to_string(),
            port,
            protocol: protocol.to_string(),
            formats: formats.iter().map(ToString::to_string).collect(),
            attributes: Vec::new(),
        });
        self
    }

    /// Add an `a=` attribute to the currently open media section.
    #[must_use]
    pub fn media_attribute(mut self, name: &str, value: Option<&str>) -> Self {
        if let Some(section) = &mut self.current_media {
            section.attributes.push(Attribute {
                name: name.to_string(),
                value: value.map(str::to_string),
            });
        }
        self
    }

    /// Encode the built session description as the bytes sent in the `ANNOUNCE` body.
    #[must_use]
    pub fn encode(mut self) -> String {
        if let Some(section) = self.current_media.take() {
            self.media.push(section);
        }

        let mut out = String::new();
        writeln_crlf(&mut out, "v=0");

        if let Some((username, session_id, session_version, addr)) = &self.origin {
            let addr_type = if addr.contains(':') { "IP6" } else { "IP4" };
            writeln_crlf(
                &mut out,
                &format!("o={username} {session_id} {session_version} IN {addr_type} {addr}"),
            );
        }

        writeln_crlf(&mut out, &format!("s={}", self.session_name));

        if let Some(addr) = &self.connection {
            let addr_type = if addr.contains(':') { "IP6" } else { "IP4" };
            writeln_crlf(&mut out, &format!("c=IN {addr_type} {addr}"));
        }

        if let Some((start, stop)) = self.timing {
            writeln_crlf(&mut out, &format!("t={start} {stop}"));
        }

        for section in &self.media {
            writeln_crlf(
                &mut out,
                &format!(
                    "m={} {} {} {}",
                    section.media_type,
                    section.port,
                    section.protocol,
                    section.formats.join(" ")
                ),
            );
            for attr in &section.attributes {
                match &attr.value {
                    Some(value) => writeln_crlf(&mut out, &format!("a={}:{value}", attr.name)),
                    None => writeln_crlf(&mut out, &format!("a={}", attr.name)),
                }
            }
        }

        out
    }
}

fn writeln_crlf(out: &mut String, line: &str) {
    write!(out, "{line}\r\n").expect("writing to a String never fails");
}

/// Build the ANNOUNCE SDP body for a session. `rsaaeskey`/`aesiv` (both base64, no padding) are
/// included only when `encrypted` is true; unencrypted receivers never see those attributes.
#[must_use]
pub fn announce_sdp(
    session_id: u32,
    client_ip: &str,
    server_ip: &str,
    encrypted: Option<(&str, &str)>,
) -> String {
    let mut builder = SdpBuilder::new()
        .origin("iTunes", &session_id.to_string(), "0", client_ip)
        .session_name("iTunes")
        .connection(server_ip)
        .timing(0, 0)
        .media("audio", 0, "RTP/AVP", &["96"])
        .media_attribute("rtpmap", Some("96 AppleLossless"))
        .media_attribute("fmtp", Some("96 352 0 16 40 10 14 2 255 0 0 44100"));

    if let Some((rsaaeskey, aesiv)) = encrypted {
        builder = builder
            .media_attribute("rsaaeskey", Some(rsaaeskey))
            .media_attribute("aesiv", Some(aesiv));
    }

    builder.media_attribute("min-latency", Some("11025")).encode()
}
