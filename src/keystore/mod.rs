//! SQLite-backed contact and key storage.
//!
//! This module provides persistent storage for correspondents' public
//! keys. Each key is stored once per fingerprint and indexed by its
//! longids; each email is linked to every key it was ever seen with and
//! indexed by the words of its address and display name.
//!
//! # Features
//!
//! - **Merge on import**: importing a known fingerprint merges the material,
//!   so an older export never drops a revocation
//! - **Revocation ledger**: revoked fingerprints stay revoked, across the
//!   OpenPGP and X.509 variants of the same fingerprint
//! - **Lookup**: by email, fingerprint, longid or X.509 issuer+serial
//! - **Prefix search**: over the words of emails and names
//!
//! # In-Memory Store for Testing
//!
//! ```ignore
//! use keydir::{ContactStore, ContactUpdate};
//!
//! let mut store = ContactStore::open_in_memory(my_engine)?;
//! let key = store.parse_key(&armored)?;
//! store.update_contact("alice@example.com", &ContactUpdate::pubkey(key))?;
//!
//! let alice = store.get_contact("alice@example.com")?.unwrap();
//! assert!(alice.has_pgp);
//! ```

mod schema;
mod store;

pub use schema::SCHEMA_VERSION;
pub use store::ContactStore;
