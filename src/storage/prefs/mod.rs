//! Scoring profiles, the active profile pair, admin password and administrators.
//!
//! The whole preferences record is small, so it lives in memory and every mutation
//! rewrites the `prefs` file atomically. Memory only changes after the rewrite
//! succeeds.


use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::Rng;
use tracing::{debug, info, instrument};

use super::atomic::replace_file;
use super::error::{StorageError, StorageResult};
use super::store::PreferencesStore;
use crate::constants::{PREFS_FILE, SALT_LEN};
use crate::format::{FormatError, FormatResult, KvReader, KvWriter};
use crate::hashing::{Blake3PasswordHasher, PasswordHasher, Salt};
use crate::model::ScoringProfile;

const KEY_SALT: &str = "salt";
const KEY_HASH: &str = "hash";
const KEY_HINT: &str = "hint";
const KEY_ADMINS: &str = "admins";
const KEY_FIRST: &str = "first";
const KEY_SECOND: &str = "second";
const KEY_PROFILES: &str = "profiles";
const KEY_PROFILE_NAME: &str = "name";

/// Compares two digests without stopping at the first differing byte.
fn digests_match(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredPassword {
    salt: Salt,
    hash: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Preferences {
    password: Option<StoredPassword>,
    hint: String,
    administrators: BTreeSet<String>,
    first: Option<String>,
    second: Option<String>,
    profiles: Vec<ScoringProfile>,
}

impl Preferences {
    fn profile(&self, name: &str) -> Option<&ScoringProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    fn active(&self, slot: &Option<String>) -> Option<ScoringProfile> {
        slot.as_deref().and_then(|name| self.profile(name)).cloned()
    }

    fn write_to<W: Write>(&self, writer: &mut KvWriter<W>) -> io::Result<()> {
        if let Some(password) = &self.password {
            writer.write(KEY_SALT, &hex::encode(password.salt))?;
            writer.write(KEY_HASH, &hex::encode(&password.hash))?;
        }
        writer.write(KEY_HINT, &self.hint)?;
        writer.write_list(KEY_ADMINS, &self.administrators)?;
        writer.write(KEY_FIRST, self.first.as_deref().unwrap_or_default())?;
        writer.write(KEY_SECOND, self.second.as_deref().unwrap_or_default())?;
        writer.write_u64(KEY_PROFILES, self.profiles.len() as u64)?;
        for profile in &self.profiles {
            profile.write_to(writer, KEY_PROFILE_NAME)?;
        }
        Ok(())
    }

    fn read_from<R: BufRead>(reader: &mut KvReader<R>) -> FormatResult<Self> {
        let password = if reader.peek_key()? == Some(KEY_SALT) {
            let salt = reader.expect_parsed(KEY_SALT, |v| {
                let mut salt = [0u8; SALT_LEN];
                hex::decode_to_slice(v, &mut salt).ok().map(|_| salt)
            })?;
            let hash = reader.expect_parsed(KEY_HASH, |v| hex::decode(v).ok())?;
            Some(StoredPassword { salt, hash })
        } else {
            None
        };

        let hint = reader.expect(KEY_HINT)?;
        let administrators = reader.expect_list(KEY_ADMINS)?.into_iter().collect();
        let first = Some(reader.expect(KEY_FIRST)?).filter(|n| !n.is_empty());
        let second = Some(reader.expect(KEY_SECOND)?).filter(|n| !n.is_empty());

        let count = reader.expect_u64(KEY_PROFILES)?;
        let mut profiles: Vec<ScoringProfile> = Vec::new();
        for _ in 0..count {
            let profile = ScoringProfile::read_from(reader, KEY_PROFILE_NAME)?;
            if profiles.iter().any(|p| p.name == profile.name) {
                return Err(FormatError::Inconsistent("duplicate profile name"));
            }
            profiles.push(profile);
        }

        let mut prefs = Self {
            password,
            hint,
            administrators,
            first,
            second,
            profiles,
        };
        // A slot naming a profile that no longer exists reads as unset.
        if prefs.first.as_deref().is_some_and(|n| prefs.profile(n).is_none()) {
            prefs.first = None;
        }
        if prefs.second.as_deref().is_some_and(|n| prefs.profile(n).is_none()) {
            prefs.second = None;
        }
        Ok(prefs)
    }
}

/// File-backed [`PreferencesStore`].
pub struct TextPreferencesStore {
    path: PathBuf,
    hasher: Arc<dyn PasswordHasher>,
    prefs: Preferences,
}

impl std::fmt::Debug for TextPreferencesStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextPreferencesStore")
            .field("path", &self.path)
            .field("profiles", &self.prefs.profiles.len())
            .field("has_password", &self.prefs.password.is_some())
            .finish()
    }
}

impl TextPreferencesStore {
    pub fn open(root: &Path) -> StorageResult<Self> {
        Self::open_with_hasher(root, Arc::new(Blake3PasswordHasher))
    }

    #[instrument(skip_all, fields(root = %root.display()))]
    pub fn open_with_hasher(root: &Path, hasher: Arc<dyn PasswordHasher>) -> StorageResult<Self> {
        let path = root.join(PREFS_FILE);
        let prefs = match File::open(&path) {
            Ok(file) => {
                let mut reader = KvReader::new(BufReader::new(file));
                Preferences::read_from(&mut reader).map_err(|e| StorageError::decode(&path, e))?
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Preferences::default(),
            Err(e) => return Err(e.into()),
        };

        info!(
            profiles = prefs.profiles.len(),
            administrators = prefs.administrators.len(),
            "Preferences opened"
        );
        Ok(Self {
            path,
            hasher,
            prefs,
        })
    }

    fn commit(&mut self, next: Preferences) -> StorageResult<()> {
        replace_file(&self.path, |w| next.write_to(w))?;
        self.prefs = next;
        Ok(())
    }
}

impl PreferencesStore for TextPreferencesStore {
    fn add_profile(&mut self, profile: ScoringProfile) -> StorageResult<bool> {
        if profile.name.is_empty() || self.prefs.profile(&profile.name).is_some() {
            return Ok(false);
        }
        let name = profile.name.clone();
        let mut next = self.prefs.clone();
        next.profiles.push(profile);
        self.commit(next)?;
        debug!(profile = %name, "Profile added");
        Ok(true)
    }

    fn remove_profile(&mut self, name: &str) -> StorageResult<bool> {
        if self.prefs.profile(name).is_none() {
            return Ok(false);
        }
        let mut next = self.prefs.clone();
        next.profiles.retain(|p| p.name != name);
        for slot in [&mut next.first, &mut next.second] {
            if slot.as_deref() == Some(name) {
                *slot = None;
            }
        }
        self.commit(next)?;
        debug!(profile = name, "Profile removed");
        Ok(true)
    }

    fn profile(&self, name: &str) -> Option<ScoringProfile> {
        self.prefs.profile(name).cloned()
    }

    fn profiles(&self) -> Vec<ScoringProfile> {
        self.prefs.profiles.clone()
    }

    fn first_profile(&self) -> Option<ScoringProfile> {
        self.prefs.active(&self.prefs.first)
    }

    fn second_profile(&self) -> Option<ScoringProfile> {
        self.prefs.active(&self.prefs.second)
    }

    fn set_first_profile(&mut self, name: &str) -> StorageResult<bool> {
        if self.prefs.profile(name).is_none() {
            return Ok(false);
        }
        let next = Preferences {
            first: Some(name.to_string()),
            ..self.prefs.clone()
        };
        self.commit(next)?;
        Ok(true)
    }

    fn set_second_profile(&mut self, name: &str) -> StorageResult<bool> {
        if self.prefs.profile(name).is_none() {
            return Ok(false);
        }
        let next = Preferences {
            second: Some(name.to_string()),
            ..self.prefs.clone()
        };
        self.commit(next)?;
        Ok(true)
    }

    fn has_password(&self) -> bool {
        self.prefs.password.is_some()
    }

    fn check_password(&self, password: &str) -> bool {
        let Some(stored) = &self.prefs.password else {
            return false;
        };
        let candidate = self.hasher.hash_password(&stored.salt, password);
        digests_match(&candidate, &stored.hash)
    }

    fn set_password(&mut self, password: &str, hint: &str) -> StorageResult<()> {
        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill(&mut salt);
        let hash = self.hasher.hash_password(&salt, password);

        let next = Preferences {
            password: Some(StoredPassword { salt, hash }),
            hint: hint.to_string(),
            ..self.prefs.clone()
        };
        self.commit(next)?;
        info!("Admin password rotated");
        Ok(())
    }

    fn password_hint(&self) -> Option<String> {
        Some(self.prefs.hint.clone()).filter(|h| !h.is_empty())
    }

    fn administrators(&self) -> BTreeSet<String> {
        self.prefs.administrators.clone()
    }

    fn set_administrators(&mut self, administrators: BTreeSet<String>) -> StorageResult<()> {
        let next = Preferences {
            administrators,
            ..self.prefs.clone()
        };
        self.commit(next)
    }

    fn is_administrator(&self, name: &str) -> bool {
        self.prefs.administrators.contains(name)
    }
}
