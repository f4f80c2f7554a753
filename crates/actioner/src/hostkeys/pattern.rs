//! `known_hosts` host pattern lists.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::fmt;

/// Name a host is looked up under: `host`, or `[host]:port` off port 22.
#[must_use]
pub fn lookup_name(host: &str, port: u16) -> String {
    if port == 22 {
        host.to_ascii_lowercase()
    } else {
        format!("[{}]:{port}", host.to_ascii_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pattern {
    Glob { glob: String, negated: bool },
    Hashed { salt: Vec<u8>, hash: Vec<u8> },
}

impl Pattern {
    fn parse(raw: &str) -> Result<Self, String> {
        if let Some(hashed) = raw.strip_prefix("|1|") {
            let (salt, hash) = hashed
                .split_once('|')
                .ok_or_else(|| format!("malformed hashed host {raw:?}"))?;
            let salt = STANDARD
                .decode(salt)
                .map_err(|e| format!("malformed hashed host salt: {e}"))?;
            let hash = STANDARD
                .decode(hash)
                .map_err(|e| format!("malformed hashed host hash: {e}"))?;
            return Ok(Self::Hashed { salt, hash });
        }

        let (glob, negated) = match raw.strip_prefix('!') {
            Some(rest) => (rest, true),
            None => (raw, false),
        };
        if glob.is_empty() {
            return Err(format!("empty host pattern in {raw:?}"));
        }
        Ok(Self::Glob {
            glob: glob.to_ascii_lowercase(),
            negated,
        })
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Glob { glob, .. } => wildcard_match(glob.as_bytes(), name.as_bytes()),
            Self::Hashed { salt, hash } => {
                let Ok(mut mac) = Hmac::<Sha1>::new_from_slice(salt) else {
                    return false;
                };
                mac.update(name.as_bytes());
                mac.verify_slice(hash).is_ok()
            }
        }
    }

    fn negated(&self) -> bool {
        matches!(self, Self::Glob { negated: true, .. })
    }
}

/// Comma-separated host patterns from one trust database line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPatterns {
    raw: String,
    patterns: Vec<Pattern>,
}

impl HostPatterns {
    /// Parse a pattern list such as `web*.example.com,!web9.example.com`.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let patterns = raw
            .split(',')
            .map(Pattern::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            raw: raw.to_string(),
            patterns,
        })
    }

    /// A negated match rejects outright; otherwise any positive match accepts.
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        let mut matched = false;
        for pattern in &self.patterns {
            if pattern.matches(name) {
                if pattern.negated() {
                    return false;
                }
                matched = true;
            }
        }
        matched
    }
}

impl fmt::Display for HostPatterns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// `*` matches any run of bytes, `?` exactly one.
fn wildcard_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some(b'*') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == b'?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, consumed)) => {
                    p = star + 1;
                    t = consumed + 1;
                    backtrack = Some((star, consumed + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}
