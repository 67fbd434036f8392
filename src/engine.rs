//! The key-material capability consumed by the store.
//!
//! The directory never interprets key bytes itself. Parsing, merging and
//! revocation detection are delegated to a [`KeyEngine`]; with the
//! `openpgp` feature, [`OpenPgpEngine`](crate::OpenPgpEngine) provides one
//! for OpenPGP keys.

use crate::error::Result;
use crate::types::ParsedKey;

/// Parse and merge capability for serialized key material.
pub trait KeyEngine: Send {
    /// Parse serialized key material into a descriptor.
    ///
    /// Structurally invalid input must fail with
    /// [`Error::Parse`](crate::Error::Parse).
    fn parse(&self, material: &[u8]) -> Result<ParsedKey>;

    /// Merge `incoming` into `existing`, both being material of the same
    /// key.
    ///
    /// The result must keep every signature seen in either input, so that
    /// `revoked(existing) || revoked(incoming)` implies `revoked(result)`.
    fn merge(&self, existing: &[u8], incoming: &[u8]) -> Result<Vec<u8>>;
}

impl<E: KeyEngine + ?Sized> KeyEngine for Box<E> {
    fn parse(&self, material: &[u8]) -> Result<ParsedKey> {
        (**self).parse(material)
    }

    fn merge(&self, existing: &[u8], incoming: &[u8]) -> Result<Vec<u8>> {
        (**self).merge(existing, incoming)
    }
}
