//! Public type definitions for the keydir library.
//!
//! This module contains the data structures exchanged with callers: parsed
//! key descriptors handed in by a [`KeyEngine`](crate::KeyEngine), the key
//! and contact records handed back by the store, and the partial-update and
//! search query shapes.

use chrono::{DateTime, Utc};

use crate::identifier;

/// Credential format of a stored key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyFamily {
    /// OpenPGP transferable public key
    OpenPgp,
    /// X.509 certificate (S/MIME)
    X509,
}

impl KeyFamily {
    /// Stable name used in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyFamily::OpenPgp => "openpgp",
            KeyFamily::X509 => "x509",
        }
    }
}

impl std::str::FromStr for KeyFamily {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openpgp" | "pgp" => Ok(KeyFamily::OpenPgp),
            "x509" | "x.509" | "smime" => Ok(KeyFamily::X509),
            _ => Err(format!("unknown key family: {}", s)),
        }
    }
}

impl std::fmt::Display for KeyFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Key material as reported by the parsing capability.
///
/// `id` is the bare fingerprint in upper-case hex, without any protocol
/// suffix. `longids` lists every secondary identifier that must resolve to
/// this key: OpenPGP primary and subkey ids, or the `X509-` issuer+serial
/// identifier of a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    /// Bare fingerprint (upper-case hex)
    pub id: String,
    /// Credential format
    pub family: KeyFamily,
    /// Secondary identifiers
    pub longids: Vec<String>,
    /// Whether the material carries a revocation
    pub revoked: bool,
    /// Expiration time, if the key expires
    pub expiration: Option<DateTime<Utc>>,
    /// Serialized key material
    pub material: Vec<u8>,
}

impl ParsedKey {
    /// Fingerprint under which this key is stored, including the protocol
    /// suffix for X.509 certificates.
    pub fn storage_fingerprint(&self) -> String {
        identifier::storage_fingerprint(&self.id, self.family)
    }
}

/// A stored key as returned by read paths.
///
/// `revoked` is computed from the revocation ledger at read time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubkeyInfo {
    /// Bare fingerprint (protocol suffix stripped)
    pub fingerprint: String,
    /// Credential format
    pub family: KeyFamily,
    /// Secondary identifiers resolving to this key
    pub longids: Vec<String>,
    /// Whether the fingerprint is in the revocation ledger
    pub revoked: bool,
    /// Expiration time, if the key expires
    pub expires_on: Option<DateTime<Utc>>,
    /// Last time freshness was checked against an external source
    pub last_check: Option<DateTime<Utc>>,
    /// Serialized key material (merged form)
    pub material: Vec<u8>,
}

impl PubkeyInfo {
    /// Fingerprint under which this key is stored.
    pub fn storage_fingerprint(&self) -> String {
        identifier::storage_fingerprint(&self.fingerprint, self.family)
    }

    /// Whether the key had expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_on.is_some_and(|exp| exp <= now)
    }

    /// A key is usable for new messages as long as it is not revoked.
    pub fn is_usable(&self) -> bool {
        !self.revoked
    }
}

/// A contact as returned by read paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    /// Normalized (lower-case) email address
    pub email: String,
    /// Display name
    pub name: Option<String>,
    /// Last time the contact was used in a message
    pub last_use: Option<DateTime<Utc>>,
    /// The resolved key: the preferred key for email lookups, the exact key
    /// for fingerprint/longid lookups
    pub pubkey: Option<PubkeyInfo>,
    /// Whether the contact has at least one usable key
    pub has_pgp: bool,
}

/// Input record for bulk [`save`](crate::ContactStore::save_contacts).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewContact {
    /// Email address
    pub email: String,
    /// Display name
    pub name: Option<String>,
    /// Last time the contact was used in a message
    pub last_use: Option<DateTime<Utc>>,
    /// Key to link to the contact
    pub pubkey: Option<ParsedKey>,
    /// Freshness check time for `pubkey`
    pub pubkey_last_check: Option<DateTime<Utc>>,
}

/// Partial update of a contact.
///
/// Outer `None` leaves the stored value untouched; `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactUpdate {
    /// New display name
    pub name: Option<Option<String>>,
    /// New last-use time
    pub last_use: Option<Option<DateTime<Utc>>>,
    /// Key to import (or merge) and link to the contact
    pub pubkey: Option<ParsedKey>,
    /// Freshness check time, applied to `pubkey` only
    pub pubkey_last_check: Option<Option<DateTime<Utc>>>,
}

impl ContactUpdate {
    /// Update that only sets the display name.
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(Some(name.into())),
            ..Self::default()
        }
    }

    /// Update that only imports and links a key.
    pub fn pubkey(pubkey: ParsedKey) -> Self {
        Self {
            pubkey: Some(pubkey),
            ..Self::default()
        }
    }

    /// Whether applying the update would leave the contact unchanged.
    ///
    /// `pubkey_last_check` alone does not count, since it only applies
    /// together with a `pubkey`.
    pub fn is_noop(&self) -> bool {
        self.name.is_none() && self.last_use.is_none() && self.pubkey.is_none()
    }
}

/// Contact search query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactSearch {
    /// Prefix of any word of the email or name; `None` matches everyone
    pub substring: Option<String>,
    /// `Some(true)`: only contacts with a usable key;
    /// `Some(false)`: only contacts without one
    pub has_usable_key: Option<bool>,
    /// Maximum number of results
    pub limit: Option<usize>,
}

impl ContactSearch {
    /// Query by word prefix.
    pub fn substring(substring: impl Into<String>) -> Self {
        Self {
            substring: Some(substring.into()),
            ..Self::default()
        }
    }

    /// Restrict results to contacts with (or without) a usable key.
    pub fn with_usable_key(mut self, has_usable_key: bool) -> Self {
        self.has_usable_key = Some(has_usable_key);
        self
    }

    /// Cap the number of results.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn info(expires_on: Option<DateTime<Utc>>) -> PubkeyInfo {
        PubkeyInfo {
            fingerprint: "D6662C5FB9BDE9DA01F3994AAA1EF832D8CCA4F2".to_string(),
            family: KeyFamily::X509,
            longids: vec![],
            revoked: false,
            expires_on,
            last_check: None,
            material: vec![],
        }
    }

    #[test]
    fn test_key_family_round_trip() {
        for family in [KeyFamily::OpenPgp, KeyFamily::X509] {
            assert_eq!(family.as_str().parse::<KeyFamily>().unwrap(), family);
        }
        assert!("ssh".parse::<KeyFamily>().is_err());
    }

    #[test]
    fn test_storage_fingerprint_suffix() {
        assert_eq!(
            info(None).storage_fingerprint(),
            "D6662C5FB9BDE9DA01F3994AAA1EF832D8CCA4F2-X509"
        );
    }

    #[test]
    fn test_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let past = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let future = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        assert!(info(Some(past)).is_expired_at(now));
        assert!(!info(Some(future)).is_expired_at(now));
        assert!(!info(None).is_expired_at(now));
    }

    #[test]
    fn test_update_noop() {
        assert!(ContactUpdate::default().is_noop());
        assert!(!ContactUpdate::name("Alice").is_noop());
        assert!(ContactUpdate {
            pubkey_last_check: Some(None),
            ..ContactUpdate::default()
        }
        .is_noop());
        assert!(!ContactUpdate {
            name: Some(None),
            ..ContactUpdate::default()
        }
        .is_noop());
    }
}
