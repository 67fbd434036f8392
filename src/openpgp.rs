//! OpenPGP key engine backed by rpgp.
//!
//! Parses transferable public keys (or secret keys, keeping only the
//! public part) and merges two copies of the same key by taking the union
//! of their signatures, so that a revocation seen once is never lost.

use std::io::Cursor;

use pgp::composed::{
    Deserializable, SignedKeyDetails, SignedPublicKey, SignedPublicSubKey, SignedSecretKey,
};
use pgp::packet::Signature;
use pgp::types::{KeyDetails, SignedUser, SignedUserAttribute};

use crate::engine::KeyEngine;
use crate::error::{Error, Result};
use crate::types::{KeyFamily, ParsedKey};

/// [`KeyEngine`] for OpenPGP keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenPgpEngine;

impl KeyEngine for OpenPgpEngine {
    fn parse(&self, material: &[u8]) -> Result<ParsedKey> {
        let key = parse_public_key(material)?;
        describe(&key)
    }

    fn merge(&self, existing: &[u8], incoming: &[u8]) -> Result<Vec<u8>> {
        let existing = parse_public_key(existing)?;
        let incoming = parse_public_key(incoming)?;
        let merged = merge_public_keys(&existing, &incoming)?;
        public_key_to_armored(&merged).map(String::into_bytes)
    }
}

/// Parse a public key from bytes (armored or binary).
/// Secret keys are accepted and reduced to their public part.
fn parse_public_key(data: &[u8]) -> Result<SignedPublicKey> {
    if let Ok((key, _headers)) = SignedPublicKey::from_armor_single(Cursor::new(data)) {
        return Ok(key);
    }

    if let Ok(key) = SignedPublicKey::from_bytes(Cursor::new(data)) {
        return Ok(key);
    }

    if let Ok((key, _headers)) = SignedSecretKey::from_armor_single(Cursor::new(data)) {
        return Ok(key.signed_public_key());
    }

    SignedSecretKey::from_bytes(Cursor::new(data))
        .map(|key| key.signed_public_key())
        .map_err(|e| Error::Parse(e.to_string()))
}

fn public_key_to_armored(key: &SignedPublicKey) -> Result<String> {
    key.to_armored_string(None.into())
        .map_err(|e| Error::Parse(e.to_string()))
}

fn fingerprint_to_hex(key: &impl KeyDetails) -> String {
    hex::encode_upper(key.fingerprint().as_bytes())
}

fn keyid_to_hex(key: &impl KeyDetails) -> String {
    hex::encode_upper(key.key_id().as_ref())
}

fn describe(key: &SignedPublicKey) -> Result<ParsedKey> {
    let mut longids = vec![keyid_to_hex(&key.primary_key)];
    for subkey in &key.public_subkeys {
        let longid = keyid_to_hex(&subkey.key);
        if !longids.contains(&longid) {
            longids.push(longid);
        }
    }

    Ok(ParsedKey {
        id: fingerprint_to_hex(&key.primary_key),
        family: KeyFamily::OpenPgp,
        longids,
        revoked: !key.details.revocation_signatures.is_empty(),
        expiration: key.expires_at(),
        material: public_key_to_armored(key)?.into_bytes(),
    })
}

/// Signatures of `a` followed by those of `b` not already present.
fn union_signatures(a: &[Signature], b: &[Signature]) -> Vec<Signature> {
    let mut merged = a.to_vec();
    for sig in b {
        if !merged.contains(sig) {
            merged.push(sig.clone());
        }
    }
    merged
}

/// Merge two copies of the same certificate.
///
/// User ids, user attributes and subkeys are matched by packet identity;
/// their signature lists, and the primary key's direct and revocation
/// signatures, become the union of both copies.
pub fn merge_public_keys(
    existing: &SignedPublicKey,
    incoming: &SignedPublicKey,
) -> Result<SignedPublicKey> {
    let fp_existing = fingerprint_to_hex(&existing.primary_key);
    let fp_incoming = fingerprint_to_hex(&incoming.primary_key);
    if fp_existing != fp_incoming {
        return Err(Error::InvalidInput(format!(
            "Certificate fingerprints do not match: {} vs {}",
            fp_existing, fp_incoming
        )));
    }

    let mut users: Vec<SignedUser> = existing.details.users.clone();
    for user in &incoming.details.users {
        match users.iter_mut().find(|u| u.id == user.id) {
            Some(known) => {
                *known = SignedUser::new(
                    known.id.clone(),
                    union_signatures(&known.signatures, &user.signatures),
                );
            }
            None => users.push(user.clone()),
        }
    }

    let mut user_attributes: Vec<SignedUserAttribute> = existing.details.user_attributes.clone();
    for attr in &incoming.details.user_attributes {
        match user_attributes.iter_mut().find(|a| a.attr == attr.attr) {
            Some(known) => {
                *known = SignedUserAttribute::new(
                    known.attr.clone(),
                    union_signatures(&known.signatures, &attr.signatures),
                );
            }
            None => user_attributes.push(attr.clone()),
        }
    }

    let mut public_subkeys: Vec<SignedPublicSubKey> = existing.public_subkeys.clone();
    for subkey in &incoming.public_subkeys {
        let subkey_fp = fingerprint_to_hex(&subkey.key);
        match public_subkeys
            .iter_mut()
            .find(|s| fingerprint_to_hex(&s.key) == subkey_fp)
        {
            Some(known) => {
                known.signatures = union_signatures(&known.signatures, &subkey.signatures);
            }
            None => public_subkeys.push(subkey.clone()),
        }
    }

    Ok(SignedPublicKey {
        primary_key: existing.primary_key.clone(),
        details: SignedKeyDetails::new(
            union_signatures(
                &existing.details.revocation_signatures,
                &incoming.details.revocation_signatures,
            ),
            union_signatures(
                &existing.details.direct_signatures,
                &incoming.details.direct_signatures,
            ),
            users,
            user_attributes,
        ),
        public_subkeys,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_garbage_is_parse_error() {
        let err = OpenPgpEngine.parse(b"definitely not a key").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
        assert!(err.is_malformed_input());
    }

    #[test]
    fn test_merge_garbage_is_parse_error() {
        let err = OpenPgpEngine.merge(b"nope", b"nope").unwrap_err();
        assert!(err.is_malformed_input());
    }

    #[test]
    fn test_union_signatures_empty() {
        assert!(union_signatures(&[], &[]).is_empty());
    }
}
