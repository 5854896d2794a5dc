use crate::entities::InfoHash;
use crate::errors::DomainError;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

/// Characters left unescaped when writing magnet parameters.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

const BTIH_PREFIX: &str = "urn:btih:";

/// A parsed `magnet:?xt=urn:btih:...` link.
#[derive(Debug, Clone, PartialEq)]
pub struct MagnetLink {
    pub info_hash: InfoHash,
    pub display_name: Option<String>,
    pub trackers: Vec<String>,
}

impl MagnetLink {
    pub fn parse(link: &str) -> Result<Self, DomainError> {
        let link = link.trim();
        let url = Url::parse(link)
            .map_err(|e| DomainError::InvalidMagnet(format!("not a URI: {}", e)))?;

        if url.scheme() != "magnet" {
            return Err(DomainError::InvalidMagnet(format!(
                "expected magnet scheme, got {}",
                url.scheme()
            )));
        }

        let mut hashes = Vec::new();
        let mut display_name = None;
        let mut trackers: Vec<String> = Vec::new();

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "xt" => {
                    let is_btih = value
                        .get(..BTIH_PREFIX.len())
                        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(BTIH_PREFIX));
                    if is_btih {
                        hashes.push(value[BTIH_PREFIX.len()..].to_string());
                    }
                }
                "dn" if !value.is_empty() => display_name = Some(value.into_owned()),
                "tr" if !value.is_empty() => {
                    if !trackers.iter().any(|t| t == &*value) {
                        trackers.push(value.into_owned());
                    }
                }
                _ => {}
            }
        }

        let raw_hash = match hashes.as_slice() {
            [single] => single,
            [] => {
                return Err(DomainError::InvalidMagnet(
                    "missing xt=urn:btih parameter".to_string(),
                ))
            }
            _ => {
                return Err(DomainError::InvalidMagnet(
                    "more than one xt=urn:btih parameter".to_string(),
                ))
            }
        };

        let info_hash = InfoHash::parse(raw_hash)
            .map_err(|_| DomainError::InvalidMagnet(format!("malformed info hash: {}", raw_hash)))?;

        Ok(Self {
            info_hash,
            display_name,
            trackers,
        })
    }

    /// Rebuilds the link with the canonical tracker list first, followed by
    /// any of the link's own trackers that are not already in it.
    pub fn with_fallback_trackers(&self, fallback: &[String]) -> String {
        let mut magnet = format!("magnet:?xt={}{}", BTIH_PREFIX, self.info_hash);

        if let Some(name) = &self.display_name {
            magnet.push_str("&dn=");
            magnet.extend(utf8_percent_encode(name, COMPONENT));
        }

        let extra = self.trackers.iter().filter(|t| !fallback.contains(t));
        for tracker in fallback.iter().chain(extra) {
            magnet.push_str("&tr=");
            magnet.extend(utf8_percent_encode(tracker, COMPONENT));
        }

        magnet
    }
}
