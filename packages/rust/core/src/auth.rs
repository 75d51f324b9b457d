//! Credential verification for maintenance operators.
//!
//! No secret lives in source: operators are listed in the config file with
//! the SHA-256 hex digest of their secret.

use prodcat_shared::UserEntry;
use sha2::{Digest, Sha256};

/// Checks a name/secret pair.
pub trait CredentialVerifier {
    fn verify(&self, name: &str, secret: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Credential {
    name: String,
    digest: String,
    admin: bool,
}

/// Verifier over `[[users]]` config entries.
#[derive(Debug, Clone, Default)]
pub struct DigestCredentials {
    users: Vec<Credential>,
}

impl DigestCredentials {
    pub fn from_entries(entries: &[UserEntry]) -> Self {
        let users = entries
            .iter()
            .map(|e| Credential {
                name: e.name.clone(),
                digest: e.secret_sha256.trim().to_ascii_lowercase(),
                admin: e.admin,
            })
            .collect();
        Self { users }
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Whether the named user exists and has the admin flag.
    pub fn is_admin(&self, name: &str) -> bool {
        self.users.iter().any(|u| u.name == name && u.admin)
    }
}

impl CredentialVerifier for DigestCredentials {
    fn verify(&self, name: &str, secret: &str) -> bool {
        let Some(user) = self.users.iter().find(|u| u.name == name) else {
            return false;
        };
        constant_time_eq(secret_digest(secret).as_bytes(), user.digest.as_bytes())
    }
}

/// Lowercase hex SHA-256 of `secret`, the format stored in config.
pub fn secret_digest(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> DigestCredentials {
        DigestCredentials::from_entries(&[
            UserEntry {
                name: "nico".into(),
                secret_sha256: secret_digest("correct horse"),
                admin: true,
            },
            UserEntry {
                name: "randy".into(),
                secret_sha256: secret_digest("battery staple").to_ascii_uppercase(),
                admin: false,
            },
        ])
    }

    #[test]
    fn digest_is_lowercase_hex() {
        assert_eq!(
            secret_digest("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn verify_accepts_only_matching_pairs() {
        let v = verifier();
        assert!(v.verify("nico", "correct horse"));
        assert!(v.verify("randy", "battery staple"));
        assert!(!v.verify("nico", "battery staple"));
        assert!(!v.verify("nobody", "correct horse"));
        assert!(!v.verify("nico", ""));
    }

    #[test]
    fn admin_flag_is_tracked() {
        let v = verifier();
        assert!(v.is_admin("nico"));
        assert!(!v.is_admin("randy"));
        assert!(!v.is_admin("nobody"));
    }

    #[test]
    fn empty_verifier_rejects_everyone() {
        let v = DigestCredentials::default();
        assert!(v.is_empty());
        assert!(!v.verify("", ""));
    }
}
