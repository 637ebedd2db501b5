//! Extracts segment URLs and the AES-128 key directive from an M3U8 body (C8).

use thiserror::Error;
use url::Url;

pub const IV_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct Encryption {
    pub method: String,
    pub key_url: Url,
    pub iv: Option<[u8; IV_LEN]>,
}

#[derive(Debug, Clone)]
pub struct Playlist {
    pub segments: Vec<Url>,
    pub encryption: Option<Encryption>,
}

#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("playlist has no media segments")]
    NoSegments,
    #[error("#EXT-X-KEY is missing METHOD or URI")]
    IncompleteKeyDirective,
    #[error("invalid segment or key URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid IV literal: {0}")]
    InvalidIv(String),
}

fn resolve(base_url: &Url, raw: &str) -> Result<Url, url::ParseError> {
    if raw.starts_with("http://") || raw.starts_with("https://") {
        Url::parse(raw)
    } else {
        base_url.join(raw)
    }
}

fn parse_key_directive(line: &str, base_url: &Url) -> Result<Encryption, PlaylistError> {
    let content = line
        .trim_start_matches("#EXT-X-KEY:")
        .trim();

    let mut method: Option<String> = None;
    let mut key_url: Option<Url> = None;
    let mut iv: Option<[u8; IV_LEN]> = None;

    for part in content.split(',') {
        let part = part.trim();
        if let Some(v) = part.strip_prefix("METHOD=") {
            method = Some(v.trim().to_string());
        } else if let Some(v) = part.strip_prefix("URI=") {
            let uri = v.trim().trim_matches('"');
            key_url = Some(resolve(base_url, uri)?);
        } else if let Some(v) = part.strip_prefix("IV=") {
            let hex_str = v.trim().trim_start_matches("0x").trim_start_matches("0X");
            if hex_str.len() != IV_LEN * 2 {
                return Err(PlaylistError::InvalidIv(v.to_string()));
            }
            let bytes = hex::decode(hex_str).map_err(|e| PlaylistError::InvalidIv(e.to_string()))?;
            let mut buf = [0u8; IV_LEN];
            buf.copy_from_slice(&bytes);
            iv = Some(buf);
        }
    }

    match (method, key_url) {
        (Some(method), Some(key_url)) => Ok(Encryption { method, key_url, iv }),
        _ => Err(PlaylistError::IncompleteKeyDirective),
    }
}

/// Parse an M3U8 playlist body into an ordered segment list plus an optional
/// encryption directive. `base_url` is the playlist's own absolute URL, used
/// to resolve relative segment and key URIs.
pub fn parse(body: &str, base_url: &Url) -> Result<Playlist, PlaylistError> {
    let mut segments = Vec::new();
    let mut encryption = None;

    for raw_line in body.lines() {
        let line = raw_line.trim();

        if line.starts_with("#EXT-X-KEY:") {
            encryption = Some(parse_key_directive(line, base_url)?);
        } else if line.starts_with('#') || line.is_empty() {
            continue;
        } else {
            segments.push(resolve(base_url, line)?);
        }
    }

    if segments.is_empty() {
        return Err(PlaylistError::NoSegments);
    }

    Ok(Playlist { segments, encryption })
}
