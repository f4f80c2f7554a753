//! Host key trust decisions for outbound SSH sessions.
//!
//! The trust database uses `known_hosts` syntax, one entry per line:
//!
//! ```text
//! # comment
//! @cert-authority *.example.com ssh-ed25519 AAAA...   (trusted host CA)
//! @revoked * ssh-rsa AAAA...                           (never trusted)
//! db1.example.com,[db1.example.com]:2222 ssh-ed25519 AAAA...
//! ```
//!
//! Verification order: revocation, then certificate authorities, then
//! pinned keys.

mod pattern;

pub use pattern::{lookup_name, HostPatterns};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ssh_key::certificate::CertType;
use ssh_key::public::KeyData;
use ssh_key::{Algorithm, Certificate, Fingerprint, HashAlg, PublicKey};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

const CERT_AUTHORITY_MARKER: &str = "@cert-authority";
const REVOKED_MARKER: &str = "@revoked";
const CERT_ALGORITHM_SUFFIX: &str = "-cert-v01@openssh.com";

/// Host key algorithms offered when a certificate authority could vouch for
/// the server. Servers with a host certificate also offer their plain key, so
/// certificates have to come first or they are never negotiated.
pub const CERTIFICATE_FIRST_HOST_KEY_ALGORITHMS: &str = "\
ssh-ed25519-cert-v01@openssh.com,\
ecdsa-sha2-nistp256-cert-v01@openssh.com,\
ecdsa-sha2-nistp384-cert-v01@openssh.com,\
ecdsa-sha2-nistp521-cert-v01@openssh.com,\
rsa-sha2-512-cert-v01@openssh.com,\
rsa-sha2-256-cert-v01@openssh.com,\
ssh-rsa-cert-v01@openssh.com,\
ssh-ed25519,\
ecdsa-sha2-nistp256,\
ecdsa-sha2-nistp384,\
ecdsa-sha2-nistp521,\
rsa-sha2-512,\
rsa-sha2-256,\
ssh-rsa";

/// One parsed trust database line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustEntry {
    /// Key trusted to sign host certificates for matching hosts
    CertificateAuthority {
        /// Hosts this authority may vouch for
        hosts: HostPatterns,
        /// Authority signing key
        key: PublicKey,
    },
    /// Key distrusted for every host
    Revoked {
        /// Distrusted key
        key: PublicKey,
    },
    /// Expected key for matching hosts
    Pinned {
        /// Hosts this key belongs to
        hosts: HostPatterns,
        /// Expected host key
        key: PublicKey,
    },
}

impl TrustEntry {
    fn parse(line: &str) -> std::result::Result<Self, String> {
        let fields: Vec<&str> = line.split_whitespace().collect();

        match fields[0] {
            CERT_AUTHORITY_MARKER => {
                let [hosts, key_type, key_base64, ..] = fields[1..] else {
                    return Err("expected host patterns and a public key".to_string());
                };
                Ok(Self::CertificateAuthority {
                    hosts: HostPatterns::parse(hosts)?,
                    key: parse_public_key(key_type, key_base64, &fields[4..])?,
                })
            }
            REVOKED_MARKER => {
                // Host patterns are optional on revocations and never consulted.
                let rest = match fields[1..] {
                    [first, ..] if Algorithm::new(first).is_ok() => &fields[1..],
                    [_, ..] => &fields[2..],
                    [] => &fields[1..],
                };
                let [key_type, key_base64, ..] = rest else {
                    return Err("expected a public key".to_string());
                };
                Ok(Self::Revoked {
                    key: parse_public_key(key_type, key_base64, &rest[2..])?,
                })
            }
            marker if marker.starts_with('@') => Err(format!("unknown marker {marker:?}")),
            hosts => {
                let [key_type, key_base64, ..] = fields[1..] else {
                    return Err("expected a public key after the host patterns".to_string());
                };
                Ok(Self::Pinned {
                    hosts: HostPatterns::parse(hosts)?,
                    key: parse_public_key(key_type, key_base64, &fields[3..])?,
                })
            }
        }
    }

    fn key(&self) -> &PublicKey {
        match self {
            Self::CertificateAuthority { key, .. }
            | Self::Revoked { key }
            | Self::Pinned { key, .. } => key,
        }
    }
}

impl fmt::Display for TrustEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = self.key().to_openssh().map_err(|_| fmt::Error)?;
        match self {
            Self::CertificateAuthority { hosts, .. } => {
                write!(f, "{CERT_AUTHORITY_MARKER} {hosts} {key}")
            }
            Self::Revoked { .. } => write!(f, "{REVOKED_MARKER} * {key}"),
            Self::Pinned { hosts, .. } => write!(f, "{hosts} {key}"),
        }
    }
}

fn parse_public_key(
    key_type: &str,
    key_base64: &str,
    comment: &[&str],
) -> std::result::Result<PublicKey, String> {
    let mut openssh = format!("{key_type} {key_base64}");
    if !comment.is_empty() {
        openssh.push(' ');
        openssh.push_str(&comment.join(" "));
    }
    PublicKey::from_openssh(&openssh).map_err(|e| format!("invalid {key_type} public key: {e}"))
}

/// Host key or certificate offered by a server during the handshake.
#[derive(Debug, Clone)]
pub enum PresentedKey {
    /// Plain public key
    Key(KeyData),
    /// OpenSSH certificate
    Certificate(Box<Certificate>),
}

impl PresentedKey {
    /// Decode an SSH wire-format host key blob.
    pub fn from_wire(blob: &[u8]) -> Result<Self> {
        let algorithm = wire_algorithm(blob).ok_or_else(|| Error::Transport {
            stage: "error decoding host key",
            message: "truncated key blob".to_string(),
        })?;
        let openssh = format!("{algorithm} {}", STANDARD.encode(blob));

        if algorithm.ends_with(CERT_ALGORITHM_SUFFIX) {
            Certificate::from_openssh(&openssh)
                .map(|cert| Self::Certificate(Box::new(cert)))
                .map_err(|e| Error::transport("error decoding host certificate", e))
        } else {
            PublicKey::from_openssh(&openssh)
                .map(|key| Self::Key(key.key_data().clone()))
                .map_err(|e| Error::transport("error decoding host key", e))
        }
    }

    /// Key material the server will prove possession of.
    #[must_use]
    pub fn key_data(&self) -> &KeyData {
        match self {
            Self::Key(key) => key,
            Self::Certificate(cert) => cert.public_key(),
        }
    }

    /// SHA256 fingerprint of [`Self::key_data`].
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        self.key_data().fingerprint(HashAlg::Sha256)
    }
}

impl From<PublicKey> for PresentedKey {
    fn from(key: PublicKey) -> Self {
        Self::Key(key.key_data().clone())
    }
}

impl From<Certificate> for PresentedKey {
    fn from(cert: Certificate) -> Self {
        Self::Certificate(Box::new(cert))
    }
}

/// Algorithm name prefixed to a wire-format key.
fn wire_algorithm(blob: &[u8]) -> Option<&str> {
    let len_bytes: [u8; 4] = blob.get(..4)?.try_into().ok()?;
    let len = usize::try_from(u32::from_be_bytes(len_bytes)).ok()?;
    let name = blob.get(4..4usize.checked_add(len)?)?;
    std::str::from_utf8(name).ok()
}

/// Parsed trust database.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustDatabase {
    entries: Vec<TrustEntry>,
}

impl TrustDatabase {
    /// Parse trust database text. Any unrecognized line fails the whole parse.
    pub fn parse(text: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let entry = TrustEntry::parse(line).map_err(|reason| Error::HostKeyFormat {
                line: index + 1,
                reason,
            })?;
            entries.push(entry);
        }
        Ok(Self { entries })
    }

    /// Parsed entries, in file order.
    #[must_use]
    pub fn entries(&self) -> &[TrustEntry] {
        &self.entries
    }

    /// Whether any `@cert-authority` line is present.
    #[must_use]
    pub fn has_certificate_authorities(&self) -> bool {
        self.entries
            .iter()
            .any(|entry| matches!(entry, TrustEntry::CertificateAuthority { .. }))
    }

    /// Decide whether `presented` is acceptable for `host:port` right now.
    pub fn verify(&self, host: &str, port: u16, presented: &PresentedKey) -> Result<()> {
        let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
        self.verify_at(host, port, presented, now)
    }

    /// [`Self::verify`] with an explicit Unix time for certificate validity.
    pub fn verify_at(
        &self,
        host: &str,
        port: u16,
        presented: &PresentedKey,
        now: u64,
    ) -> Result<()> {
        let untrusted = |reason: String| Error::Untrusted {
            host: host.to_string(),
            reason,
        };
        let name = lookup_name(host, port);

        if self.is_revoked(presented.key_data()) {
            return Err(untrusted(format!(
                "host key {} is revoked",
                presented.fingerprint()
            )));
        }

        if let PresentedKey::Certificate(cert) = presented {
            if self.is_revoked(cert.signature_key()) {
                return Err(untrusted(format!(
                    "certificate authority {} is revoked",
                    cert.signature_key().fingerprint(HashAlg::Sha256)
                )));
            }
            if self.certificate_trusted(host, &name, cert, now) {
                return Ok(());
            }
        }

        let pinned = self.entries.iter().any(|entry| match entry {
            TrustEntry::Pinned { hosts, key } => {
                hosts.matches(&name) && key.key_data() == presented.key_data()
            }
            _ => false,
        });
        if pinned {
            return Ok(());
        }

        Err(untrusted(format!(
            "no trusted key matches {}",
            presented.fingerprint()
        )))
    }

    fn is_revoked(&self, key: &KeyData) -> bool {
        self.entries
            .iter()
            .any(|entry| matches!(entry, TrustEntry::Revoked { key: revoked } if revoked.key_data() == key))
    }

    fn certificate_trusted(&self, host: &str, name: &str, cert: &Certificate, now: u64) -> bool {
        if cert.cert_type() != CertType::Host {
            return false;
        }

        let principals = cert.valid_principals();
        if !principals.is_empty() && !principals.iter().any(|p| p.eq_ignore_ascii_case(host)) {
            return false;
        }

        let authorities: Vec<Fingerprint> = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                TrustEntry::CertificateAuthority { hosts, key }
                    if hosts.matches(name) && key.key_data() == cert.signature_key() =>
                {
                    Some(key.fingerprint(HashAlg::Sha256))
                }
                _ => None,
            })
            .collect();

        // Checks the validity window and the CA signature.
        !authorities.is_empty() && cert.validate_at(now, &authorities).is_ok()
    }
}

impl FromStr for TrustDatabase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TrustDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{entry}")?;
        }
        Ok(())
    }
}

/// How a remote command authenticates the server it connects to.
#[derive(Debug, Clone)]
pub enum HostKeyPolicy {
    /// Accept any host key (explicit `hostKeys: ignore`)
    Ignore,
    /// Check against a trust database
    Verify(TrustDatabase),
}

impl HostKeyPolicy {
    /// Option value that disables host key checking.
    pub const IGNORE: &'static str = "ignore";

    /// Build a policy from the `hostKeys` rule option. Absent means an empty
    /// database, which trusts nothing.
    pub fn from_option(value: Option<&str>) -> Result<Self> {
        match value {
            Some(Self::IGNORE) => Ok(Self::Ignore),
            Some(text) => TrustDatabase::parse(text).map(Self::Verify),
            None => Ok(Self::Verify(TrustDatabase::default())),
        }
    }

    /// Host key algorithm preference list to negotiate with, if the
    /// transport default is not good enough.
    #[must_use]
    pub fn host_key_preferences(&self) -> Option<&'static str> {
        match self {
            Self::Verify(db) if db.has_certificate_authorities() => {
                Some(CERTIFICATE_FIRST_HOST_KEY_ALGORITHMS)
            }
            _ => None,
        }
    }

    /// Decide whether `presented` is acceptable for `host:port`.
    pub fn verify(&self, host: &str, port: u16, presented: &PresentedKey) -> Result<()> {
        match self {
            Self::Ignore => Ok(()),
            Self::Verify(db) => db.verify(host, port, presented),
        }
    }
}
