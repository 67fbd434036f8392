//! Identifier classification and protocol-suffix handling.
//!
//! Callers look contacts up by email, full fingerprint, OpenPGP key id
//! ("longid") or the `X509-` issuer+serial reference found in PKCS#7
//! recipient infos. X.509 fingerprints are stored with a `-X509` suffix so
//! they never collide with an OpenPGP fingerprint made of the same hex
//! digits. All suffix stripping and adding lives in this module.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use der::asn1::{AnyRef, UintRef};
use der::{Decode, Encode, EncodeValue, FixedTag, Length, Tag, Tagged, Writer};

use crate::error::{Error, Result};
use crate::types::KeyFamily;

/// Suffix appended to X.509 certificate fingerprints in storage.
pub const X509_FINGERPRINT_SUFFIX: &str = "-X509";

/// Prefix of the issuer+serial identifier of an X.509 certificate.
pub const X509_LONGID_PREFIX: &str = "X509-";

/// A classified lookup identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    /// Normalized (lower-case) email address
    Email(String),
    /// Upper-case hex fingerprint, possibly carrying the `-X509` suffix
    Fingerprint(String),
    /// OpenPGP key id (upper-case hex) or `X509-` issuer+serial reference
    Longid(String),
}

impl Identifier {
    /// Classify an identifier string.
    ///
    /// Returns `None` for strings that match no supported shape; such
    /// identifiers simply resolve to nothing.
    pub fn parse(input: &str) -> Option<Identifier> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        if input.contains('@') {
            return normalize_email(input).map(Identifier::Email);
        }

        if let Some(reference) = input.strip_prefix(X509_LONGID_PREFIX) {
            // base64 is case sensitive, keep the input as is
            return STANDARD
                .decode(reference)
                .ok()
                .filter(|der| !der.is_empty())
                .map(|_| Identifier::Longid(input.to_string()));
        }

        let upper = input.to_uppercase();
        if let Some(bare) = upper.strip_suffix(X509_FINGERPRINT_SUFFIX) {
            return is_fingerprint_hex(bare).then(|| Identifier::Fingerprint(upper.clone()));
        }
        if is_fingerprint_hex(&upper) {
            return Some(Identifier::Fingerprint(upper));
        }
        if upper.len() == 16 && is_hex(&upper) {
            return Some(Identifier::Longid(upper));
        }

        None
    }
}

/// Lower-case an email address after a basic structural check.
///
/// Accepts `local@domain` with no whitespace and exactly one `@`.
pub fn normalize_email(email: &str) -> Option<String> {
    let email = email.trim();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty()
        || domain.is_empty()
        || domain.contains('@')
        || email.chars().any(char::is_whitespace)
    {
        return None;
    }
    Some(email.to_lowercase())
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// v4 (SHA-1, 40 hex) and v5/v6 (SHA-256, 64 hex) fingerprints.
pub(crate) fn is_fingerprint_hex(s: &str) -> bool {
    (s.len() == 40 || s.len() == 64) && is_hex(s)
}

/// Fingerprint under which a key of `family` is stored.
pub fn storage_fingerprint(id: &str, family: KeyFamily) -> String {
    let bare = strip_fingerprint(id).to_uppercase();
    match family {
        KeyFamily::OpenPgp => bare,
        KeyFamily::X509 => format!("{}{}", bare, X509_FINGERPRINT_SUFFIX),
    }
}

/// Remove the protocol suffix, if any.
pub fn strip_fingerprint(fingerprint: &str) -> &str {
    fingerprint
        .strip_suffix(X509_FINGERPRINT_SUFFIX)
        .unwrap_or(fingerprint)
}

/// Family implied by a storage fingerprint.
pub fn family_of(fingerprint: &str) -> KeyFamily {
    if fingerprint.ends_with(X509_FINGERPRINT_SUFFIX) {
        KeyFamily::X509
    } else {
        KeyFamily::OpenPgp
    }
}

/// Revocation ledger entries that revoke `fingerprint`.
///
/// A revocation recorded for either protocol's credential applies to the
/// other protocol's credential sharing the same fingerprint bytes.
pub fn revocation_aliases(fingerprint: &str) -> [String; 2] {
    let bare = strip_fingerprint(fingerprint);
    [
        bare.to_string(),
        format!("{}{}", bare, X509_FINGERPRINT_SUFFIX),
    ]
}

/// PKCS#7 `IssuerAndSerialNumber`.
struct IssuerAndSerialNumber<'a> {
    issuer: AnyRef<'a>,
    serial_number: UintRef<'a>,
}

impl FixedTag for IssuerAndSerialNumber<'_> {
    const TAG: Tag = Tag::Sequence;
}

impl EncodeValue for IssuerAndSerialNumber<'_> {
    fn value_len(&self) -> der::Result<Length> {
        self.issuer.encoded_len()? + self.serial_number.encoded_len()?
    }

    fn encode_value(&self, writer: &mut impl Writer) -> der::Result<()> {
        self.issuer.encode(writer)?;
        self.serial_number.encode(writer)
    }
}

/// Build the `X509-` identifier of a certificate from its issuer
/// distinguished name (DER-encoded `Name`) and serial number (big-endian
/// integer bytes).
///
/// The identifier is the base64 of the DER `IssuerAndSerialNumber` a
/// PKCS#7 recipient carries.
pub fn x509_longid(issuer_der: &[u8], serial: &[u8]) -> Result<String> {
    let invalid = |e: der::Error| Error::InvalidInput(format!("bad issuer or serial: {}", e));

    let issuer = AnyRef::from_der(issuer_der).map_err(invalid)?;
    if issuer.tag() != Tag::Sequence {
        return Err(Error::InvalidInput(format!(
            "issuer is a {}, not a Name",
            issuer.tag()
        )));
    }
    let serial = if serial.is_empty() { &[0u8][..] } else { serial };
    let der = IssuerAndSerialNumber {
        issuer,
        serial_number: UintRef::new(serial).map_err(invalid)?,
    }
    .to_der()
    .map_err(invalid)?;

    Ok(format!("{}{}", X509_LONGID_PREFIX, STANDARD.encode(der)))
}
