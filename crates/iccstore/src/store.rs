//! Append-only directory of generated profiles.
//!
//! Files are named `custom_saturation_<timestamp>.icc` where the timestamp is
//! fixed-width basic ISO-8601 in UTC, so "current" is a query over keys
//! rather than over filesystem modification times. Each profile has a TOML
//! sidecar with the same stem recording the level it was generated from.
//!
//! Types:
//!
//! - `ProfileStore` owns the directory and implements `put`, `list`,
//!   `latest`, `read` and `prune`.
//! - `StoredProfile` is the metadata view of one entry.
//! - `ProfileListing` is a sorted snapshot of keys; iterating it reads
//!   sidecars on demand and may be repeated.
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shaderfx::SaturationLevel;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::profile::{format_key_timestamp, parse_key_timestamp, ColorProfile};

pub const PROFILE_PREFIX: &str = "custom_saturation_";
pub const PROFILE_EXTENSION: &str = "icc";
const SIDECAR_EXTENSION: &str = "toml";
const MAX_KEY_ATTEMPTS: u32 = 1000;
const STAGING_PREFIX: &str = ".incoming-";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No profile found")]
    NotFound,

    #[error("profile store I/O failed at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode profile metadata: {0}")]
    Metadata(#[from] toml::ser::Error),

    #[error("could not allocate a unique profile key for {0}")]
    KeyExhausted(String),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredProfile {
    pub key: String,
    pub path: PathBuf,
    pub created: DateTime<Utc>,
    /// `None` when the sidecar is missing or unreadable.
    pub level: Option<SaturationLevel>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    created: DateTime<Utc>,
    level: SaturationLevel,
}

#[derive(Debug, Clone)]
pub struct ProfileStore {
    root: PathBuf,
}

impl ProfileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persists `profile` under a fresh key. Existing entries are never
    /// touched; a key collision on the same timestamp takes a numeric suffix.
    ///
    /// The bytes are staged in a temporary file inside the store and linked
    /// into place only once complete, so a listed profile is never partial.
    pub fn put(&self, profile: &ColorProfile) -> Result<StoredProfile, StoreError> {
        fs::create_dir_all(&self.root).map_err(io_error(&self.root))?;

        let mut staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(&self.root)
            .map_err(io_error(&self.root))?;
        let staged_path = staged.path().to_path_buf();
        staged
            .write_all(profile.bytes())
            .map_err(io_error(&staged_path))?;
        staged
            .as_file()
            .sync_all()
            .map_err(io_error(&staged_path))?;

        let sidecar = toml::to_string_pretty(&Sidecar {
            created: profile.created(),
            level: profile.level(),
        })?;

        let stamp = format_key_timestamp(profile.created());
        for attempt in 0..MAX_KEY_ATTEMPTS {
            let key = if attempt == 0 {
                format!("{PROFILE_PREFIX}{stamp}")
            } else {
                format!("{PROFILE_PREFIX}{stamp}-{attempt}")
            };
            let path = self.profile_path(&key);
            let sidecar_path = self.sidecar_path(&key);

            match write_new(&sidecar_path, sidecar.as_bytes()) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(key = %key, "profile key taken; trying next suffix");
                    continue;
                }
                Err(err) => return Err(io_error(&sidecar_path)(err)),
            }

            match staged.persist_noclobber(&path) {
                Ok(_) => {
                    info!(key = %key, path = %path.display(), level = %profile.level(), "stored ICC profile");
                    return Ok(StoredProfile {
                        key,
                        path,
                        created: profile.created(),
                        level: Some(profile.level()),
                    });
                }
                Err(err) => {
                    discard_sidecar(&sidecar_path);
                    if err.error.kind() != io::ErrorKind::AlreadyExists {
                        return Err(io_error(&path)(err.error));
                    }
                    debug!(key = %key, "profile key taken; trying next suffix");
                    staged = err.file;
                }
            }
        }

        Err(StoreError::KeyExhausted(stamp))
    }

    /// Snapshot of all entries, oldest first.
    pub fn list(&self) -> Result<ProfileListing, StoreError> {
        let mut entries = Vec::new();
        let dir = match fs::read_dir(&self.root) {
            Ok(dir) => dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.root.display(), "profile directory absent; store is empty");
                return Ok(ProfileListing {
                    root: self.root.clone(),
                    entries,
                });
            }
            Err(err) => return Err(io_error(&self.root)(err)),
        };

        for entry in dir {
            let entry = entry.map_err(io_error(&self.root))?;
            if !entry.file_type().map(|kind| kind.is_file()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if let Some((key, created)) = parse_profile_name(name) {
                entries.push(ListedKey {
                    key,
                    path: entry.path(),
                    created,
                });
            }
        }

        entries.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.key.cmp(&b.key)));
        Ok(ProfileListing {
            root: self.root.clone(),
            entries,
        })
    }

    /// Entry with the greatest timestamp; ties go to the lexically greatest key.
    pub fn latest(&self) -> Result<StoredProfile, StoreError> {
        self.list()?.last().ok_or(StoreError::NotFound)
    }

    pub fn read(&self, entry: &StoredProfile) -> Result<Vec<u8>, StoreError> {
        fs::read(&entry.path).map_err(io_error(&entry.path))
    }

    /// Deletes all but the newest `keep` entries and returns what was removed.
    pub fn prune(&self, keep: usize) -> Result<Vec<StoredProfile>, StoreError> {
        let listing = self.list()?;
        let excess = listing.len().saturating_sub(keep);
        let mut removed = Vec::with_capacity(excess);

        for entry in listing.iter().take(excess) {
            fs::remove_file(&entry.path).map_err(io_error(&entry.path))?;
            let sidecar = self.sidecar_path(&entry.key);
            if let Err(err) = fs::remove_file(&sidecar) {
                if err.kind() != io::ErrorKind::NotFound {
                    warn!(path = %sidecar.display(), error = %err, "failed to remove profile sidecar");
                }
            }
            debug!(key = %entry.key, "pruned profile");
            removed.push(entry);
        }

        if !removed.is_empty() {
            info!(removed = removed.len(), kept = keep, "pruned old profiles");
        }
        Ok(removed)
    }

    fn profile_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.{PROFILE_EXTENSION}"))
    }

    fn sidecar_path(&self, key: &str) -> PathBuf {
        sidecar_path(&self.root, key)
    }
}

/// Creates `path` exclusively; a partial write is removed again.
fn write_new(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    if let Err(err) = file.write_all(contents).and_then(|()| file.sync_all()) {
        discard_sidecar(path);
        return Err(err);
    }
    Ok(())
}

fn discard_sidecar(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %err, "failed to remove orphaned profile sidecar");
        }
    }
}

fn sidecar_path(root: &Path, key: &str) -> PathBuf {
    root.join(format!("{key}.{SIDECAR_EXTENSION}"))
}

/// Splits `custom_saturation_<stamp>[-<n>].icc` into its key and timestamp.
fn parse_profile_name(name: &str) -> Option<(String, DateTime<Utc>)> {
    let key = name.strip_suffix(&format!(".{PROFILE_EXTENSION}"))?;
    let rest = key.strip_prefix(PROFILE_PREFIX)?;
    let stamp = match rest.split_once('-') {
        Some((stamp, suffix)) if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) => stamp,
        Some(_) => return None,
        None => rest,
    };
    let created = parse_key_timestamp(stamp)?;
    Some((key.to_string(), created))
}

#[derive(Debug, Clone)]
struct ListedKey {
    key: String,
    path: PathBuf,
    created: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ProfileListing {
    root: PathBuf,
    entries: Vec<ListedKey>,
}

impl ProfileListing {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> ListingIter<'_> {
        ListingIter {
            root: &self.root,
            inner: self.entries.iter(),
        }
    }

    pub fn last(&self) -> Option<StoredProfile> {
        self.iter().next_back()
    }
}

impl<'a> IntoIterator for &'a ProfileListing {
    type Item = StoredProfile;
    type IntoIter = ListingIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct ListingIter<'a> {
    root: &'a Path,
    inner: std::slice::Iter<'a, ListedKey>,
}

impl ListingIter<'_> {
    fn hydrate(&self, listed: &ListedKey) -> StoredProfile {
        StoredProfile {
            key: listed.key.clone(),
            path: listed.path.clone(),
            created: listed.created,
            level: read_sidecar_level(&sidecar_path(self.root, &listed.key)),
        }
    }
}

impl Iterator for ListingIter<'_> {
    type Item = StoredProfile;

    fn next(&mut self) -> Option<Self::Item> {
        let listed = self.inner.next()?;
        Some(self.hydrate(listed))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl DoubleEndedIterator for ListingIter<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let listed = self.inner.next_back()?;
        Some(self.hydrate(listed))
    }
}

impl ExactSizeIterator for ListingIter<'_> {}

fn read_sidecar_level(path: &Path) -> Option<SaturationLevel> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            if err.kind() != io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %err, "failed to read profile sidecar");
            }
            return None;
        }
    };
    match toml::from_str::<Sidecar>(&raw) {
        Ok(sidecar) => Some(sidecar.level),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring malformed profile sidecar");
            None
        }
    }
}
