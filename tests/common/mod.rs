//! Shared fixtures for the integration tests.
//!
//! `ScriptedEngine` understands a line-based key description instead of
//! real OpenPGP/X.509 material:
//!
//! ```text
//! fingerprint: B790AE8F425DC44633A8C086DF63659C3B4A81FB
//! family: openpgp
//! longid: DF63659C3B4A81FB
//! expires: 1700000000000
//! sig: self-2019
//! sig: revocation
//! ```
//!
//! Merging two descriptions keeps every line of both, so a `sig:
//! revocation` line survives merging with an older copy.

#![allow(dead_code)]

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use keydir::{ContactStore, Error, KeyEngine, KeyFamily, ParsedKey, Result};

#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptedEngine;

impl KeyEngine for ScriptedEngine {
    fn parse(&self, material: &[u8]) -> Result<ParsedKey> {
        let text = std::str::from_utf8(material).map_err(|e| Error::Parse(e.to_string()))?;
        let mut id = None;
        let mut family = KeyFamily::OpenPgp;
        let mut longids = Vec::new();
        let mut revoked = false;
        let mut expiration = None;

        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let (field, value) = line
                .split_once(':')
                .ok_or_else(|| Error::Parse(format!("bad line {:?}", line)))?;
            let value = value.trim();
            match field.trim() {
                "fingerprint" => id = Some(value.to_string()),
                "family" => {
                    family = value.parse().map_err(Error::Parse)?;
                }
                "longid" => longids.push(value.to_string()),
                "expires" => {
                    let millis: i64 = value.parse().map_err(|_| Error::Parse(value.into()))?;
                    expiration = DateTime::from_timestamp_millis(millis);
                }
                "sig" => revoked |= value == "revocation",
                other => return Err(Error::Parse(format!("unknown field {:?}", other))),
            }
        }

        Ok(ParsedKey {
            id: id.ok_or_else(|| Error::Parse("missing fingerprint".into()))?,
            family,
            longids,
            revoked,
            expiration,
            material: material.to_vec(),
        })
    }

    fn merge(&self, existing: &[u8], incoming: &[u8]) -> Result<Vec<u8>> {
        let existing = String::from_utf8(existing.to_vec()).map_err(|e| anyhow!(e))?;
        let incoming = String::from_utf8(incoming.to_vec()).map_err(|e| anyhow!(e))?;
        let fingerprint = |text: &str| {
            text.lines()
                .find(|l| l.starts_with("fingerprint:"))
                .map(str::to_string)
        };
        if fingerprint(&existing) != fingerprint(&incoming) {
            return Err(anyhow!("cannot merge different keys").into());
        }

        let mut lines: Vec<&str> = existing.lines().collect();
        for line in incoming.lines() {
            if !lines.contains(&line) {
                lines.push(line);
            }
        }
        Ok(lines.join("\n").into_bytes())
    }
}

/// Engine whose merge output describes some other key.
#[derive(Debug, Default, Clone, Copy)]
pub struct SwappingEngine;

impl KeyEngine for SwappingEngine {
    fn parse(&self, material: &[u8]) -> Result<ParsedKey> {
        ScriptedEngine.parse(material)
    }

    fn merge(&self, _existing: &[u8], _incoming: &[u8]) -> Result<Vec<u8>> {
        Ok(openpgp_key(OTHER_FP, &[], &["self"]))
    }
}

/// Engine that refuses to merge anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingMergeEngine;

impl KeyEngine for FailingMergeEngine {
    fn parse(&self, material: &[u8]) -> Result<ParsedKey> {
        ScriptedEngine.parse(material)
    }

    fn merge(&self, _existing: &[u8], _incoming: &[u8]) -> Result<Vec<u8>> {
        Err(anyhow!("merge backend unavailable").into())
    }
}

fn describe(fingerprint: &str, family: &str, longids: &[&str], sigs: &[&str], expires: Option<i64>) -> Vec<u8> {
    let mut text = format!("fingerprint: {}\nfamily: {}\n", fingerprint, family);
    for longid in longids {
        text.push_str(&format!("longid: {}\n", longid));
    }
    if let Some(expires) = expires {
        text.push_str(&format!("expires: {}\n", expires));
    }
    for sig in sigs {
        text.push_str(&format!("sig: {}\n", sig));
    }
    text.into_bytes()
}

pub fn openpgp_key(fingerprint: &str, longids: &[&str], sigs: &[&str]) -> Vec<u8> {
    describe(fingerprint, "openpgp", longids, sigs, None)
}

pub fn expiring_openpgp_key(fingerprint: &str, longids: &[&str], expires: DateTime<Utc>) -> Vec<u8> {
    describe(
        fingerprint,
        "openpgp",
        longids,
        &["self"],
        Some(expires.timestamp_millis()),
    )
}

pub fn x509_cert(fingerprint: &str, longids: &[&str], sigs: &[&str]) -> Vec<u8> {
    describe(fingerprint, "x509", longids, sigs, None)
}

/// Primary longid of an OpenPGP v4 fingerprint.
pub fn longid_of(fingerprint: &str) -> &str {
    &fingerprint[fingerprint.len() - 16..]
}

pub fn store() -> ContactStore {
    ContactStore::open_in_memory(ScriptedEngine).unwrap()
}

pub const ABBDEF_FP: &str = "B790AE8F425DC44633A8C086DF63659C3B4A81FB";
pub const ABBDEF_SUBKEY: &str = "621DE1814AD675E0";
pub const ABCDEF_FP: &str = "3155F118B6E732B3638A1CE1608BCD797A23FB91";
pub const ABCDEF_SUBKEY: &str = "2D47A41943DFAFCE";
pub const ABCDDF_FP: &str = "6CF53D2329C2A80828F499D375AA44AB8930F7E9";
pub const ABCDDF_SUBKEY: &str = "92CFDAC7AA3A4253";
pub const ABDDEF_FP: &str = "9E020D9B752FD3FFF17ED9B65FCC1541CF282951";
pub const ABDDEF_SUBKEY: &str = "EAA7A05FE34F3A1A";
pub const ABCD_VWXYZ_FP: &str = "1A2B3C4D5E6F708192A3B4C5D6E7F80912345678";

pub const SOME_REVOKED_VALID_FP: &str = "D6662C5FB9BDE9DA01F3994AAA1EF832D8CCA4F2";
pub const SOME_REVOKED_1_FP: &str = "A5CFC8E8EA4AE69989FE2631097EEBF354259A5E";
pub const SOME_REVOKED_2_FP: &str = "3930752556D57C46A1C56B63DE8538DDA1648C76";

pub const ACTALIS_FP: &str = "16BB407403A3ADC55E1E0E4AF93EEC8FB187C923";
pub const ACTALIS_LONGID: &str = "X509-MIGiMIGNMQswCQYDVQQGEwJJVDEQMA4GA1UECAwHQmVyZ2FtbzEZMBcGA1UEBwwQUG9udGUgU2Fu\
IFBpZXRybzEjMCEGA1UECgwaQWN0YWxpcyBTLnAuQS4vMDMzNTg1MjA5NjcxLDAqBgNVBAMMI0FjdGFsaXMgQ2xpZW50IE\
F1dGhlbnRpY2F0aW9uIENBIEcyAhBj9wJecA85RTAfsvulZ0+E";

pub const OTHER_FP: &str = "0000111122223333444455556666777788889999";

/// The four `ab..ef@test.com` keys with their primary and subkey longids.
pub fn test_com_keys() -> Vec<(&'static str, Vec<u8>)> {
    [
        ("abbdef@test.com", ABBDEF_FP, ABBDEF_SUBKEY),
        ("abcdef@test.com", ABCDEF_FP, ABCDEF_SUBKEY),
        ("abcddf@test.com", ABCDDF_FP, ABCDDF_SUBKEY),
        ("abddef@test.com", ABDDEF_FP, ABDDEF_SUBKEY),
    ]
    .into_iter()
    .map(|(email, fp, subkey)| (email, openpgp_key(fp, &[longid_of(fp), subkey], &["self"])))
    .collect()
}
