//! ContactStore implementation.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::config::StoreConfig;
use crate::engine::KeyEngine;
use crate::error::{Error, Result};
use crate::identifier::{self, Identifier};
use crate::searchable;
use crate::types::{
    Contact, ContactSearch, ContactUpdate, KeyFamily, NewContact, ParsedKey, PubkeyInfo,
};

use super::schema::init_schema;

/// SQLite-backed directory of contacts and their public keys.
///
/// # Database Schema
///
/// - `pubkeys`: one row per fingerprint (X.509 rows carry the `-X509` suffix)
/// - `pubkey_longids`: OpenPGP key ids and X.509 issuer+serial references
/// - `emails`: contact name and last use
/// - `email_pubkeys`: which keys were linked to which email, and when
/// - `searchable`: tagged word tokens for prefix search
/// - `revocations`: append-only ledger of revoked fingerprints
///
/// Every write that touches more than one table runs in a single
/// transaction.
///
/// # Thread Safety
///
/// The `ContactStore` is not `Sync` due to the underlying SQLite connection.
/// Concurrent access from several processes relies on SQLite's own locking.
pub struct ContactStore {
    conn: Connection,
    path: Option<PathBuf>,
    engine: Box<dyn KeyEngine>,
    config: StoreConfig,
}

impl ContactStore {
    /// Open or create a store at the given path.
    ///
    /// Parent directories must already exist.
    pub fn open(path: impl AsRef<Path>, engine: impl KeyEngine + 'static) -> Result<Self> {
        Self::with_config(StoreConfig::at(path.as_ref()), engine)
    }

    /// Create an in-memory store.
    ///
    /// Useful for testing or when persistence is not needed.
    pub fn open_in_memory(engine: impl KeyEngine + 'static) -> Result<Self> {
        Self::with_config(StoreConfig::default(), engine)
    }

    /// Open a store as described by `config`.
    pub fn with_config(config: StoreConfig, engine: impl KeyEngine + 'static) -> Result<Self> {
        let conn = match &config.path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };

        conn.execute("PRAGMA foreign_keys = ON", [])?;
        init_schema(&conn)?;

        tracing::debug!("Opened contact store at {:?}", config.path);

        Ok(Self {
            conn,
            path: config.path.clone(),
            engine: Box::new(engine),
            config,
        })
    }

    /// Get the database path, or `None` for an in-memory store.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The configuration the store was opened with.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Parse key material with the store's engine.
    pub fn parse_key(&self, material: &[u8]) -> Result<ParsedKey> {
        let key = self.engine.parse(material)?;
        validate_parsed(&key)?;
        Ok(key)
    }

    /// Build a contact record for [`save_contacts`](Self::save_contacts),
    /// parsing `material` if given.
    pub fn contact_from_bytes(
        &self,
        email: &str,
        name: Option<&str>,
        material: Option<&[u8]>,
        pubkey_last_check: Option<DateTime<Utc>>,
        last_use: Option<DateTime<Utc>>,
    ) -> Result<NewContact> {
        let email = require_email(email)?;
        let pubkey = material.map(|m| self.parse_key(m)).transpose()?;
        Ok(NewContact {
            email,
            name: name.map(str::to_string),
            last_use,
            pubkey,
            pubkey_last_check,
        })
    }

    /// Create or replace contacts in bulk.
    ///
    /// Name and last use of an existing contact are replaced by the values
    /// in the record. Keys are imported (or merged into the stored copy)
    /// and linked to the email. All records are written in one transaction.
    pub fn save_contacts(&mut self, contacts: &[NewContact]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for contact in contacts {
            let email = require_email(&contact.email)?;
            write_email(
                &tx,
                &email,
                Some(contact.name.as_deref()),
                Some(contact.last_use),
            )?;
            if let Some(pubkey) = &contact.pubkey {
                let fingerprint = import_key(
                    &tx,
                    self.engine.as_ref(),
                    pubkey,
                    contact.pubkey_last_check.map(Some),
                )?;
                link_key(&tx, &email, &fingerprint)?;
            }
        }
        tx.commit()?;
        tracing::debug!("Saved {} contacts", contacts.len());
        Ok(())
    }

    /// Save a single contact.
    pub fn save_contact(&mut self, contact: &NewContact) -> Result<()> {
        self.save_contacts(std::slice::from_ref(contact))
    }

    /// Apply a partial update to a contact, creating it if needed.
    ///
    /// Fields left as `None` in `update` are not touched. A supplied
    /// `pubkey` is merged into any stored copy of the same fingerprint and
    /// linked to the email; `pubkey_last_check` applies to that key only.
    pub fn update_contact(&mut self, email: &str, update: &ContactUpdate) -> Result<()> {
        self.update_contacts(&[email], update)
    }

    /// Apply the same partial update to several contacts in one transaction.
    pub fn update_contacts(&mut self, emails: &[&str], update: &ContactUpdate) -> Result<()> {
        let emails = emails
            .iter()
            .map(|email| require_email(email))
            .collect::<Result<Vec<_>>>()?;

        if update.pubkey.is_none() && update.pubkey_last_check.is_some() {
            tracing::debug!("Ignoring pubkey_last_check without pubkey");
        }

        // An empty update only creates missing contacts
        if update.is_noop() {
            let mut all_known = true;
            for email in &emails {
                all_known &= email_exists(&self.conn, email)?;
            }
            if all_known {
                tracing::debug!("Nothing to update for {} contacts", emails.len());
                return Ok(());
            }
        }

        let tx = self.conn.transaction()?;
        let fingerprint = match &update.pubkey {
            Some(pubkey) => Some(import_key(
                &tx,
                self.engine.as_ref(),
                pubkey,
                update.pubkey_last_check,
            )?),
            None => None,
        };
        for email in &emails {
            write_email(
                &tx,
                email,
                update.name.as_ref().map(Option::as_deref),
                update.last_use,
            )?;
            if let Some(fingerprint) = &fingerprint {
                link_key(&tx, email, fingerprint)?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Look a contact up by email, fingerprint, longid or X.509
    /// issuer+serial reference.
    ///
    /// For an email the returned `pubkey` is the preferred key of that
    /// email. For any other identifier it is exactly the key the identifier
    /// names, and the contact is the email that key was most recently
    /// linked to.
    pub fn get_contact(&self, identifier: &str) -> Result<Option<Contact>> {
        match Identifier::parse(identifier) {
            None => Ok(None),
            Some(Identifier::Email(email)) => load_contact(&self.conn, &email, self.prefer_unexpired()),
            Some(id) => {
                let Some(fingerprint) = resolve_key(&self.conn, &id)? else {
                    return Ok(None);
                };
                let email: Option<String> = self
                    .conn
                    .query_row(
                        "SELECT email FROM email_pubkeys WHERE fingerprint = ?1
                         ORDER BY seq DESC LIMIT 1",
                        [&fingerprint],
                        |row| row.get(0),
                    )
                    .optional()?;
                let Some(email) = email else {
                    return Ok(None);
                };
                let Some(mut contact) = load_contact(&self.conn, &email, self.prefer_unexpired())?
                else {
                    return Ok(None);
                };
                contact.pubkey = load_pubkey(&self.conn, &fingerprint)?;
                Ok(Some(contact))
            }
        }
    }

    /// Look several contacts up; results are in input order.
    pub fn get_contacts(&self, identifiers: &[&str]) -> Result<Vec<Option<Contact>>> {
        identifiers
            .iter()
            .map(|identifier| self.get_contact(identifier))
            .collect()
    }

    /// Resolve an identifier to a key, whether or not it is linked to any
    /// email.
    pub fn get_pubkey(&self, identifier: &str) -> Result<Option<PubkeyInfo>> {
        match Identifier::parse(identifier) {
            None => Ok(None),
            Some(Identifier::Email(email)) => {
                let candidates = linked_pubkeys(&self.conn, &email)?;
                Ok(pick_preferred(candidates, self.prefer_unexpired(), Utc::now()))
            }
            Some(id) => match resolve_key(&self.conn, &id)? {
                Some(fingerprint) => load_pubkey(&self.conn, &fingerprint),
                None => Ok(None),
            },
        }
    }

    /// All keys ever linked to an email, most recently linked first.
    pub fn get_pubkeys_for(&self, email: &str) -> Result<Vec<PubkeyInfo>> {
        let Some(email) = identifier::normalize_email(email) else {
            return Ok(Vec::new());
        };
        Ok(linked_pubkeys(&self.conn, &email)?
            .into_iter()
            .map(|(info, _)| info)
            .collect())
    }

    /// Search contacts by word prefix and key availability.
    ///
    /// Every word of `substring` must be a prefix of some word of the
    /// contact's email or name. Matches come back in index order. A blank
    /// or absent `substring` lists every contact; one made only of
    /// separators matches nobody.
    pub fn search_contacts(&self, query: &ContactSearch) -> Result<Vec<Contact>> {
        let limit = query.limit.or(self.config.search_limit);
        let words = query
            .substring
            .as_deref()
            .map(searchable::query_words)
            .unwrap_or_default();

        let candidates = match words.split_first() {
            Some((first, rest)) => prefix_scan(&self.conn, first, rest)?,
            None if query.substring.as_deref().is_some_and(|s| !s.trim().is_empty()) => {
                // only separators: no word to match
                Vec::new()
            }
            None => all_emails(&self.conn)?,
        };
        tracing::debug!(
            "Search {:?} yielded {} candidates",
            query.substring,
            candidates.len()
        );

        let mut contacts = Vec::new();
        for email in candidates {
            if limit.is_some_and(|limit| contacts.len() >= limit) {
                break;
            }
            let Some(contact) = load_contact(&self.conn, &email, self.prefer_unexpired())? else {
                continue;
            };
            if query
                .has_usable_key
                .is_some_and(|wanted| contact.has_pgp != wanted)
            {
                continue;
            }
            contacts.push(contact);
        }
        Ok(contacts)
    }

    /// Serialized material of the keys linked to the contacts matching
    /// `query`.
    ///
    /// With `has_usable_key: Some(true)` only non-revoked keys are
    /// returned. Each key appears once.
    pub fn search_key_material(&self, query: &ContactSearch) -> Result<Vec<Vec<u8>>> {
        let only_usable = query.has_usable_key == Some(true);
        let mut seen = std::collections::HashSet::new();
        let mut materials = Vec::new();
        for contact in self.search_contacts(query)? {
            for (info, _) in linked_pubkeys(&self.conn, &contact.email)? {
                if only_usable && !info.is_usable() {
                    continue;
                }
                if seen.insert(info.storage_fingerprint()) {
                    materials.push(info.material);
                }
            }
        }
        Ok(materials)
    }

    /// Record a fingerprint as revoked.
    ///
    /// Accepts bare or `-X509` suffixed fingerprints. Recording the same
    /// fingerprint twice is not an error.
    pub fn mark_revoked(&mut self, fingerprint: &str) -> Result<()> {
        let fingerprint = require_fingerprint(fingerprint)?;
        record_revocation(&self.conn, &fingerprint)
    }

    /// Whether `fingerprint`, or the other protocol's credential with the
    /// same fingerprint bytes, is revoked.
    pub fn is_revoked(&self, fingerprint: &str) -> Result<bool> {
        let fingerprint = require_fingerprint(fingerprint)?;
        is_revoked_in(&self.conn, &fingerprint)
    }

    /// Number of stored contacts.
    pub fn count_contacts(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM emails", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Number of stored keys.
    pub fn count_pubkeys(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pubkeys", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Storage fingerprints of all keys, sorted.
    pub fn list_fingerprints(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT fingerprint FROM pubkeys ORDER BY fingerprint")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut fingerprints = Vec::new();
        for row in rows {
            fingerprints.push(row?);
        }
        Ok(fingerprints)
    }

    fn prefer_unexpired(&self) -> bool {
        self.config.prefer_unexpired
    }
}

fn require_email(email: &str) -> Result<String> {
    identifier::normalize_email(email)
        .ok_or_else(|| Error::InvalidInput(format!("not a valid email: {:?}", email)))
}

fn require_fingerprint(fingerprint: &str) -> Result<String> {
    match Identifier::parse(fingerprint) {
        Some(Identifier::Fingerprint(fingerprint)) => Ok(fingerprint),
        _ => Err(Error::InvalidInput(format!(
            "not a fingerprint: {:?}",
            fingerprint
        ))),
    }
}

fn validate_parsed(key: &ParsedKey) -> Result<()> {
    if !identifier::is_fingerprint_hex(&key.id.to_uppercase()) {
        return Err(Error::Parse(format!(
            "engine reported malformed fingerprint {:?}",
            key.id
        )));
    }
    Ok(())
}

fn email_exists(conn: &Connection, email: &str) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM emails WHERE email = ?1)",
        [email],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

fn from_millis(millis: Option<i64>) -> Option<DateTime<Utc>> {
    millis.and_then(DateTime::from_timestamp_millis)
}

/// Insert or update the email row, recomputing its search tokens whenever
/// the name is written.
fn write_email(
    conn: &Connection,
    email: &str,
    name: Option<Option<&str>>,
    last_use: Option<Option<DateTime<Utc>>>,
) -> Result<()> {
    let current: Option<Option<String>> = conn
        .query_row("SELECT name FROM emails WHERE email = ?1", [email], |row| {
            row.get(0)
        })
        .optional()?;

    let reindex_name = match current {
        None => {
            conn.execute(
                "INSERT INTO emails (email, name, last_use) VALUES (?1, ?2, ?3)",
                params![email, name.flatten(), last_use.flatten().map(to_millis)],
            )?;
            tracing::debug!("Created contact {}", email);
            Some(name.flatten())
        }
        Some(_) => {
            if let Some(name) = name {
                conn.execute(
                    "UPDATE emails SET name = ?2 WHERE email = ?1",
                    params![email, name],
                )?;
            }
            if let Some(last_use) = last_use {
                conn.execute(
                    "UPDATE emails SET last_use = ?2 WHERE email = ?1",
                    params![email, last_use.map(to_millis)],
                )?;
            }
            name
        }
    };

    if let Some(name) = reindex_name {
        write_searchable(conn, email, name)?;
    }
    Ok(())
}

fn write_searchable(conn: &Connection, email: &str, name: Option<&str>) -> Result<()> {
    conn.execute("DELETE FROM searchable WHERE email = ?1", [email])?;
    let mut stmt = conn.prepare("INSERT INTO searchable (token, email) VALUES (?1, ?2)")?;
    for token in searchable::index_entries(email, name) {
        stmt.execute(params![token, email])?;
    }
    Ok(())
}

/// Import `key`, merging it into the stored copy of the same fingerprint.
///
/// Returns the storage fingerprint.
fn import_key(
    conn: &Connection,
    engine: &dyn KeyEngine,
    key: &ParsedKey,
    last_check: Option<Option<DateTime<Utc>>>,
) -> Result<String> {
    validate_parsed(key)?;
    let fingerprint = key.storage_fingerprint();

    let existing: Option<Vec<u8>> = conn
        .query_row(
            "SELECT material FROM pubkeys WHERE fingerprint = ?1",
            [&fingerprint],
            |row| row.get(0),
        )
        .optional()?;

    let stored = match existing {
        Some(existing) if existing == key.material => key.clone(),
        Some(existing) => {
            let merged = engine.merge(&existing, &key.material)?;
            let merged = engine.parse(&merged)?;
            if merged.storage_fingerprint() != fingerprint {
                tracing::error!(
                    "Merging into {} produced material for {}",
                    fingerprint,
                    merged.storage_fingerprint()
                );
                return Err(Error::InvariantViolation(format!(
                    "merge of {} produced a different key {}",
                    fingerprint,
                    merged.storage_fingerprint()
                )));
            }
            tracing::debug!("Merged new material into {}", fingerprint);
            merged
        }
        None => {
            tracing::debug!("Importing new key {}", fingerprint);
            key.clone()
        }
    };

    conn.execute(
        "INSERT INTO pubkeys (fingerprint, family, material, expires_on, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(fingerprint) DO UPDATE SET
            family = excluded.family,
            material = excluded.material,
            expires_on = excluded.expires_on,
            updated_at = excluded.updated_at",
        params![
            &fingerprint,
            stored.family.as_str(),
            &stored.material,
            stored.expiration.map(to_millis),
            to_millis(Utc::now()),
        ],
    )?;

    if let Some(last_check) = last_check {
        conn.execute(
            "UPDATE pubkeys SET last_check = ?2 WHERE fingerprint = ?1",
            params![&fingerprint, last_check.map(to_millis)],
        )?;
    }

    // Longids only accumulate: an older export must not unindex a subkey
    let mut insert_longid = conn.prepare(
        "INSERT OR IGNORE INTO pubkey_longids (longid, fingerprint) VALUES (?1, ?2)",
    )?;
    for longid in stored.longids.iter().chain(key.longids.iter()) {
        insert_longid.execute(params![normalize_longid(longid), &fingerprint])?;
    }

    if stored.revoked || key.revoked {
        record_revocation(conn, &fingerprint)?;
    }

    Ok(fingerprint)
}

fn normalize_longid(longid: &str) -> String {
    if longid.starts_with(identifier::X509_LONGID_PREFIX) {
        longid.to_string()
    } else {
        longid.to_uppercase()
    }
}

/// Link a key to an email, making it the most recently linked one.
fn link_key(conn: &Connection, email: &str, fingerprint: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO email_pubkeys (email, fingerprint, seq)
         VALUES (?1, ?2, (SELECT COALESCE(MAX(seq), 0) + 1 FROM email_pubkeys))
         ON CONFLICT(email, fingerprint) DO UPDATE SET seq = excluded.seq",
        params![email, fingerprint],
    )?;
    tracing::debug!("Linked {} to {}", fingerprint, email);
    Ok(())
}

fn record_revocation(conn: &Connection, fingerprint: &str) -> Result<()> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO revocations (fingerprint) VALUES (?1)",
        [fingerprint],
    )?;
    if inserted > 0 {
        tracing::info!("Recorded revocation of {}", fingerprint);
    }
    Ok(())
}

/// Read-time revocation check across both protocol suffixes.
fn is_revoked_in(conn: &Connection, fingerprint: &str) -> Result<bool> {
    let [bare, suffixed] = identifier::revocation_aliases(fingerprint);
    let revoked: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM revocations WHERE fingerprint IN (?1, ?2))",
        params![bare, suffixed],
        |row| row.get(0),
    )?;
    Ok(revoked)
}

/// Storage fingerprint a non-email identifier refers to.
fn resolve_key(conn: &Connection, id: &Identifier) -> Result<Option<String>> {
    match id {
        Identifier::Email(_) => Ok(None),
        Identifier::Fingerprint(fingerprint) => {
            // A bare fingerprint may name an OpenPGP key or an X.509
            // certificate; the exact match wins.
            let candidates = if fingerprint.ends_with(identifier::X509_FINGERPRINT_SUFFIX) {
                vec![fingerprint.clone()]
            } else {
                vec![
                    fingerprint.clone(),
                    identifier::storage_fingerprint(fingerprint, KeyFamily::X509),
                ]
            };
            for candidate in candidates {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM pubkeys WHERE fingerprint = ?1)",
                    [&candidate],
                    |row| row.get(0),
                )?;
                if exists {
                    return Ok(Some(candidate));
                }
            }
            Ok(None)
        }
        Identifier::Longid(longid) => {
            let mut stmt = conn.prepare(
                "SELECT l.fingerprint FROM pubkey_longids l
                 JOIN pubkeys p ON p.fingerprint = l.fingerprint
                 WHERE l.longid = ?1
                 ORDER BY p.updated_at DESC, l.fingerprint",
            )?;
            let fingerprints = stmt
                .query_map([longid], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            if fingerprints.len() > 1 {
                tracing::warn!(
                    "Longid {} is shared by {} keys, using {}",
                    longid,
                    fingerprints.len(),
                    fingerprints[0]
                );
            }
            Ok(fingerprints.into_iter().next())
        }
    }
}

fn load_pubkey(conn: &Connection, fingerprint: &str) -> Result<Option<PubkeyInfo>> {
    let row = conn
        .query_row(
            "SELECT family, material, expires_on, last_check FROM pubkeys WHERE fingerprint = ?1",
            [fingerprint],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Vec<u8>>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, Option<i64>>(3)?,
                ))
            },
        )
        .optional()?;
    let Some((family, material, expires_on, last_check)) = row else {
        return Ok(None);
    };

    let family = family.parse::<KeyFamily>().map_err(|e| {
        tracing::error!("Stored key {} has {}", fingerprint, e);
        Error::InvariantViolation(e)
    })?;
    if family != identifier::family_of(fingerprint) {
        tracing::error!("Stored key {} is tagged {}", fingerprint, family);
        return Err(Error::InvariantViolation(format!(
            "key {} stored as {}",
            fingerprint, family
        )));
    }

    let mut stmt =
        conn.prepare("SELECT longid FROM pubkey_longids WHERE fingerprint = ?1 ORDER BY longid")?;
    let longids = stmt
        .query_map([fingerprint], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;

    Ok(Some(PubkeyInfo {
        fingerprint: identifier::strip_fingerprint(fingerprint).to_string(),
        family,
        longids,
        revoked: is_revoked_in(conn, fingerprint)?,
        expires_on: from_millis(expires_on),
        last_check: from_millis(last_check),
        material,
    }))
}

/// Keys linked to `email` with their link sequence, most recent first.
fn linked_pubkeys(conn: &Connection, email: &str) -> Result<Vec<(PubkeyInfo, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT fingerprint, seq FROM email_pubkeys WHERE email = ?1 ORDER BY seq DESC",
    )?;
    let links = stmt
        .query_map([email], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut keys = Vec::with_capacity(links.len());
    for (fingerprint, seq) in links {
        match load_pubkey(conn, &fingerprint)? {
            Some(info) => keys.push((info, seq)),
            None => {
                tracing::error!("{} links to missing key {}", email, fingerprint);
                return Err(Error::InvariantViolation(format!(
                    "{} links to missing key {}",
                    email, fingerprint
                )));
            }
        }
    }
    Ok(keys)
}

/// Choose the key to use for an email.
///
/// Non-revoked keys beat revoked ones; with `prefer_unexpired`, non-expired
/// keys beat expired ones next; then the most recently linked wins. The
/// link sequence is unique per store, and the fingerprint breaks any
/// remaining tie.
pub(crate) fn pick_preferred(
    candidates: Vec<(PubkeyInfo, i64)>,
    prefer_unexpired: bool,
    now: DateTime<Utc>,
) -> Option<PubkeyInfo> {
    candidates
        .into_iter()
        .min_by(|(a, a_seq), (b, b_seq)| {
            let a_expired = prefer_unexpired && a.is_expired_at(now);
            let b_expired = prefer_unexpired && b.is_expired_at(now);
            a.revoked
                .cmp(&b.revoked)
                .then(a_expired.cmp(&b_expired))
                .then(b_seq.cmp(a_seq))
                .then_with(|| a.fingerprint.cmp(&b.fingerprint))
        })
        .map(|(info, _)| info)
}

fn load_contact(conn: &Connection, email: &str, prefer_unexpired: bool) -> Result<Option<Contact>> {
    let row = conn
        .query_row(
            "SELECT name, last_use FROM emails WHERE email = ?1",
            [email],
            |row| Ok((row.get::<_, Option<String>>(0)?, row.get::<_, Option<i64>>(1)?)),
        )
        .optional()?;
    let Some((name, last_use)) = row else {
        return Ok(None);
    };

    let candidates = linked_pubkeys(conn, email)?;
    let has_pgp = candidates.iter().any(|(info, _)| info.is_usable());
    let pubkey = pick_preferred(candidates, prefer_unexpired, Utc::now());

    Ok(Some(Contact {
        email: email.to_string(),
        name,
        last_use: from_millis(last_use),
        pubkey,
        has_pgp,
    }))
}

fn all_emails(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT email FROM emails ORDER BY email")?;
    let emails = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(emails)
}

/// Range scan over the token index for `first`, then keep the emails that
/// also have a token starting with each of `rest`.
fn prefix_scan(conn: &Connection, first: &str, rest: &[String]) -> Result<Vec<String>> {
    let (lower, upper) = searchable::word_range(first);
    let mut stmt = conn.prepare(
        "SELECT email FROM searchable WHERE token >= ?1 AND token < ?2 ORDER BY token, email",
    )?;
    let rows = stmt
        .query_map(params![lower, upper], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut check = conn.prepare(
        "SELECT EXISTS(SELECT 1 FROM searchable WHERE email = ?1 AND token >= ?2 AND token < ?3)",
    )?;
    let mut emails: Vec<String> = Vec::new();
    'candidates: for email in rows {
        if emails.contains(&email) {
            continue;
        }
        for word in rest {
            let (lower, upper) = searchable::word_range(word);
            let found: bool = check.query_row(params![&email, lower, upper], |row| row.get(0))?;
            if !found {
                continue 'candidates;
            }
        }
        emails.push(email);
    }
    Ok(emails)
}
