//! HTTP Digest authentication (RFC 2617) for the `401 Unauthorized` challenge some receivers
//! issue on `ANNOUNCE`/`SETUP`.

use md5::{Digest, Md5};
use std::fmt;

/// A parsed `WWW-Authenticate: Digest ...` challenge.
#[derive(Debug, Clone)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,
    pub qop: Option<String>,
}

impl DigestChallenge {
    /// Parse a `WWW-Authenticate` header value. Returns `None` if it isn't a `Digest` challenge
    /// or is missing `realm`/`nonce`.
    #[must_use]
    pub fn parse(header_value: &str) -> Option<Self> {
        let rest = header_value.trim().strip_prefix("Digest")?.trim();

        let mut realm = None;
        let mut nonce = None;
        let mut opaque = None;
        let mut qop = None;

        for field in split_directives(rest) {
            let Some((key, value)) = field.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = unquote(value.trim());

            match key {
                "realm" => realm = Some(value),
                "nonce" => nonce = Some(value),
                "opaque" => opaque = Some(value),
                "qop" => qop = Some(value),
                _ => {}
            }
        }

        Some(Self {
            realm: realm?,
            nonce: nonce?,
            opaque,
            qop,
        })
    }
}

/// A computed `Authorization: Digest ...` response, ready to serialize into a header value.
pub struct DigestResponse {
    pub username: String,
    pub realm: String,
    pub nonce: String,
    pub uri: String,
    pub response: String,
    pub opaque: Option<String>,
    pub qop: Option<String>,
    pub nc: Option<u32>,
    pub cnonce: Option<String>,
}

impl DigestResponse {
    /// Compute the response for `method`/`uri`, given `username`/`password` and the server's
    /// challenge. When the challenge advertises `qop=auth`, `cnonce` is used as-is and `nc` is
    /// fixed at 1 (this client never reuses a nonce across requests).
    #[must_use]
    pub fn compute(
        challenge: &DigestChallenge,
        username: &str,
        password: &str,
        method: &str,
        uri: &str,
        cnonce: &str,
    ) -> Self {
        let ha1 = md5_hex(&format!("{username}:{}:{password}", challenge.realm));
        let ha2 = md5_hex(&format!("{method}:{uri}"));

        let (response, nc) = match challenge.qop.as_deref() {
            Some(qop) if qop.contains("auth") => {
                let nc = 1u32;
                let response = md5_hex(&format!(
                    "{ha1}:{}:{nc:08x}:{cnonce}:auth:{ha2}",
                    challenge.nonce
                ));
                (response, Some(nc))
            }
            _ => (md5_hex(&format!("{ha1}:{}:{ha2}", challenge.nonce)), None),
        };

        Self {
            username: username.to_string(),
            realm: challenge.realm.clone(),
            nonce: challenge.nonce.clone(),
            uri: uri.to_string(),
            response,
            opaque: challenge.opaque.clone(),
            qop: challenge
                .qop
                .as_deref()
                .filter(|q| q.contains("auth"))
                .map(|_| "auth".to_string()),
            nc,
            cnonce: challenge
                .qop
                .as_deref()
                .filter(|q| q.contains("auth"))
                .map(|_| cnonce.to_string()),
        }
    }
}

impl fmt::Display for DigestResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", response=\"{}\"",
            self.username, self.realm, self.nonce, self.uri, self.response
        )?;
        if let Some(opaque) = &self.opaque {
            write!(f, ", opaque=\"{opaque}\"")?;
        }
        if let (Some(qop), Some(nc), Some(cnonce)) = (&self.qop, self.nc, &self.cnonce) {
            write!(f, ", qop={qop}, nc={nc:08x}, cnonce=\"{cnonce}\"")?;
        }
        Ok(())
    }
}

fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn unquote(value: &str) -> String {
    value.trim_matches('"').to_string()
}

/// Split a comma-separated directive list without breaking on commas inside quoted strings.
fn split_directives(input: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ',' if !in_quotes => {
                fields.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        fields.push(current.trim().to_string());
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_basic_challenge() {
        let challenge =
            DigestChallenge::parse(r#"Digest realm="receiver", nonce="abc123""#).unwrap();
        assert_eq!(challenge.realm, "receiver");
        assert_eq!(challenge.nonce, "abc123");
        assert!(challenge.qop.is_none());
        assert!(challenge.opaque.is_none());
    }

    #[test]
    fn parses_a_challenge_with_qop_and_opaque() {
        let challenge = DigestChallenge::parse(
            r#"Digest realm="receiver", nonce="abc123", qop="auth", opaque="xyz""#,
        )
        .unwrap();
        assert_eq!(challenge.qop.as_deref(), Some("auth"));
        assert_eq!(challenge.opaque.as_deref(), Some("xyz"));
    }

    #[test]
    fn rejects_non_digest_schemes() {
        assert!(DigestChallenge::parse(r#"Basic realm="x""#).is_none());
    }

    #[test]
    fn compute_without_qop_matches_rfc2069_formula() {
        let challenge = DigestChallenge::parse(r#"Digest realm="r", nonce="n""#).unwrap();
        let response = DigestResponse::compute(&challenge, "u", "p", "ANNOUNCE", "/1", "cn");

        let ha1 = md5_hex("u:r:p");
        let ha2 = md5_hex("ANNOUNCE:/1");
        let expected = md5_hex(&format!("{ha1}:n:{ha2}"));

        assert_eq!(response.response, expected);
        assert!(response.qop.is_none());
    }

    #[test]
    fn compute_with_qop_auth_includes_nc_and_cnonce() {
        let challenge =
            DigestChallenge::parse(r#"Digest realm="r", nonce="n", qop="auth""#).unwrap();
        let response = DigestResponse::compute(&challenge, "u", "p", "ANNOUNCE", "/1", "cn");

        assert_eq!(response.qop.as_deref(), Some("auth"));
        assert_eq!(response.nc, Some(1));
        assert_eq!(response.cnonce.as_deref(), Some("cn"));

        let rendered = response.to_string();
        assert!(rendered.contains("qop=auth"));
        assert!(rendered.contains("nc=00000001"));
    }
}
