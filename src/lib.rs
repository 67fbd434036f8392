//! # keydir
//!
//! A local directory of correspondents' public keys for an end-to-end
//! encrypted mail client.
//!
//! For each known email address the directory resolves the currently
//! trusted public key, OpenPGP or X.509, and never silently treats a
//! revoked key as usable again. It provides:
//!
//! - **Lookup**: by email, full fingerprint, OpenPGP key id ("longid") or
//!   the X.509 issuer+serial reference of a PKCS#7 recipient
//! - **Merge on import**: material for a known fingerprint is merged, not
//!   overwritten
//! - **Revocation ledger**: append-only, checked on every read, shared by
//!   the OpenPGP and X.509 credentials of one fingerprint
//! - **Prefix search**: over the words of contact emails and names
//!
//! ## Design
//!
//! The directory does not parse or verify key material. A [`KeyEngine`]
//! supplied by the caller turns bytes into a [`ParsedKey`] and merges two
//! copies of the same key. With the `openpgp` feature, [`OpenPgpEngine`]
//! implements it on top of [rpgp](https://docs.rs/pgp).
//!
//! ## Features
//!
//! - `openpgp`: OpenPGP engine (requires `pgp`)

// Modules
mod config;
mod engine;
mod error;
mod types;

pub mod identifier;
pub mod keystore;
pub mod searchable;

#[cfg(feature = "openpgp")]
mod openpgp;

// Re-export error types
pub use error::{Error, Result};

// Re-export all public types
pub use types::{
    Contact,
    ContactSearch,
    ContactUpdate,
    KeyFamily,
    NewContact,
    ParsedKey,
    PubkeyInfo,
};

pub use config::StoreConfig;
pub use engine::KeyEngine;
pub use identifier::{Identifier, x509_longid};
pub use keystore::ContactStore;

#[cfg(feature = "openpgp")]
pub use openpgp::{OpenPgpEngine, merge_public_keys};
