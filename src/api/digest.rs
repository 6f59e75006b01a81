//! HTTP digest authentication ([RFC 2617](https://www.rfc-editor.org/rfc/rfc2617)).
//!
//! The handshake is two plain requests: an unauthenticated probe that the server answers with
//! `401` and a `WWW-Authenticate: Digest …` challenge, and a retry carrying the computed
//! `Authorization` header.

use std::{fmt, str::FromStr};

use chrono::Utc;
use http::{
    Response,
    StatusCode,
    Uri,
    header::{AUTHORIZATION, WWW_AUTHENTICATE},
    uri::PathAndQuery,
};
use ureq::{Agent, Body};

use crate::prelude::*;

#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    #[error("invalid request URI")]
    InvalidUri(#[from] http::uri::InvalidUri),

    #[error("probe request failed")]
    Probe(#[source] ureq::Error),

    #[error("probe returned unexpected status {0}")]
    UnexpectedProbeStatus(StatusCode),

    #[error("no digest challenge in the `401` response")]
    MissingChallenge,

    #[error("invalid digest challenge: {0}")]
    InvalidChallenge(&'static str),

    #[error("unsupported digest algorithm `{0}`")]
    UnsupportedAlgorithm(String),

    #[error("unsupported quality of protection `{0}`")]
    UnsupportedQop(String),

    #[error("authenticated request failed")]
    Retry(#[source] ureq::Error),

    #[error("credentials rejected with status {0}")]
    Rejected(StatusCode),
}

#[derive(Copy, Clone)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// Perform a digest-authenticated `GET`.
///
/// The agent must be configured not to treat HTTP statuses as errors, otherwise the challenge
/// never reaches here.
#[instrument(skip_all, fields(url = url))]
pub fn get(
    agent: &Agent,
    url: &str,
    credentials: Credentials<'_>,
) -> Result<Response<Body>, DigestError> {
    let uri: Uri = url.parse()?;
    let digest_uri = uri.path_and_query().map_or("/", PathAndQuery::as_str);

    debug!("probing…");
    let probe = agent.get(url).call().map_err(DigestError::Probe)?;
    let status = probe.status();
    if status.is_success() {
        warn!("the server did not ask for credentials");
        return Ok(probe);
    }
    if status != StatusCode::UNAUTHORIZED {
        return Err(DigestError::UnexpectedProbeStatus(status));
    }

    let challenge = probe
        .headers()
        .get_all(WWW_AUTHENTICATE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| is_digest_scheme(value))
        .ok_or(DigestError::MissingChallenge)?
        .parse::<Challenge>()?;
    debug!(realm = %challenge.realm, algorithm = ?challenge.algorithm, "challenged");

    let cnonce = client_nonce(&challenge.nonce);
    let authorization = challenge.authorize(credentials, "GET", digest_uri, &cnonce);
    let response = agent
        .get(url)
        .header(AUTHORIZATION, authorization.to_string())
        .call()
        .map_err(DigestError::Retry)?;
    match response.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(DigestError::Rejected(response.status()))
        }
        _ => Ok(response),
    }
}

fn is_digest_scheme(header: &str) -> bool {
    header.get(..6).is_some_and(|scheme| scheme.eq_ignore_ascii_case("digest"))
        && header[6..].starts_with(' ')
}

fn client_nonce(server_nonce: &str) -> String {
    let seed = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let digest = md5::compute(format!("{seed}:{server_nonce}"));
    format!("{digest:x}")[..16].to_string()
}

fn md5_hex(data: impl AsRef<[u8]>) -> String {
    format!("{:x}", md5::compute(data))
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Algorithm {
    Md5,
    Md5Sess,
}

impl Algorithm {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Md5Sess => "MD5-sess",
        }
    }
}

/// Parsed `WWW-Authenticate: Digest …` header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Challenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: Option<String>,

    /// Explicitly announced algorithm, [`None`] means the default MD5.
    pub algorithm: Option<Algorithm>,

    /// Whether the server offered `qop=auth`. Without it, the RFC 2069 compatible form is used.
    pub qop_auth: bool,
}

impl FromStr for Challenge {
    type Err = DigestError;

    fn from_str(header: &str) -> Result<Self, Self::Err> {
        if !is_digest_scheme(header) {
            return Err(DigestError::MissingChallenge);
        }

        let mut realm = None;
        let mut nonce = None;
        let mut opaque = None;
        let mut algorithm = None;
        let mut qop_auth = false;

        for (key, value) in parse_parameters(&header[7..])? {
            match key.to_ascii_lowercase().as_str() {
                "realm" => realm = Some(value),
                "nonce" => nonce = Some(value),
                "opaque" => opaque = Some(value),
                "algorithm" => {
                    algorithm = Some(if value.eq_ignore_ascii_case("MD5") {
                        Algorithm::Md5
                    } else if value.eq_ignore_ascii_case("MD5-sess") {
                        Algorithm::Md5Sess
                    } else {
                        return Err(DigestError::UnsupportedAlgorithm(value));
                    });
                }
                "qop" => {
                    qop_auth = value.split(',').any(|qop| qop.trim().eq_ignore_ascii_case("auth"));
                    if !qop_auth {
                        return Err(DigestError::UnsupportedQop(value));
                    }
                }
                _ => {}
            }
        }

        Ok(Self {
            realm: realm.ok_or(DigestError::InvalidChallenge("missing realm"))?,
            nonce: nonce.ok_or(DigestError::InvalidChallenge("missing nonce"))?,
            opaque,
            algorithm,
            qop_auth,
        })
    }
}

impl Challenge {
    pub fn authorize<'a>(
        &'a self,
        credentials: Credentials<'a>,
        method: &str,
        uri: &'a str,
        cnonce: &'a str,
    ) -> Authorization<'a> {
        let nc = "00000001";
        let mut ha1 =
            md5_hex(format!("{}:{}:{}", credentials.username, self.realm, credentials.password));
        if self.algorithm == Some(Algorithm::Md5Sess) {
            ha1 = md5_hex(format!("{ha1}:{}:{cnonce}", self.nonce));
        }
        let ha2 = md5_hex(format!("{method}:{uri}"));
        let response = if self.qop_auth {
            md5_hex(format!("{ha1}:{}:{nc}:{cnonce}:auth:{ha2}", self.nonce))
        } else {
            md5_hex(format!("{ha1}:{}:{ha2}", self.nonce))
        };
        Authorization {
            challenge: self,
            username: credentials.username,
            uri,
            cnonce: self.qop_auth.then_some(cnonce),
            nc,
            response,
        }
    }
}

/// `Authorization: Digest …` header value.
#[must_use]
pub struct Authorization<'a> {
    challenge: &'a Challenge,
    username: &'a str,
    uri: &'a str,
    cnonce: Option<&'a str>,
    nc: &'static str,
    pub response: String,
}

impl fmt::Display for Authorization<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"Digest username="{}", realm="{}", nonce="{}", uri="{}", response="{}""#,
            quote(self.username),
            quote(&self.challenge.realm),
            quote(&self.challenge.nonce),
            quote(self.uri),
            self.response,
        )?;
        if let Some(algorithm) = self.challenge.algorithm {
            write!(f, ", algorithm={}", algorithm.as_str())?;
        }
        if let Some(opaque) = &self.challenge.opaque {
            write!(f, r#", opaque="{}""#, quote(opaque))?;
        }
        if let Some(cnonce) = self.cnonce {
            write!(f, r#", qop=auth, nc={}, cnonce="{}""#, self.nc, quote(cnonce))?;
        }
        Ok(())
    }
}

fn quote(value: &str) -> String {
    value.replace('\\', r"\\").replace('"', r#"\""#)
}

/// Split `key=value, key="quoted, value"` auth parameters.
fn parse_parameters(input: &str) -> Result<Vec<(String, String)>, DigestError> {
    let mut parameters = Vec::new();
    let mut chars = input.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=') {
            key.push(c);
        }
        if chars.next() != Some('=') {
            return Err(DigestError::InvalidChallenge("parameter without a value"));
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some('\\') => value.extend(chars.next()),
                    Some(c) => value.push(c),
                    None => return Err(DigestError::InvalidChallenge("unterminated quoted value")),
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| *c != ',') {
                value.push(c);
            }
        }
        parameters.push((key.trim().to_string(), value.trim().to_string()));
    }
    Ok(parameters)
}
