//! Disk-backed store of translated part archives.
//!
//! Each translated part is written once to the working store as a
//! standalone archive whose first line declares its bound. Later
//! references, in this run or a later one, reuse the archive and read the
//! bound back instead of translating the part again. A read-only prebuilt
//! store is consulted before the working store and is never written.

use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use l2rib_math::Bound;
use thiserror::Error;

use crate::ldraw::PartId;
use crate::rib::write_bound_declaration;

/// Errors from the cache backing store.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Unable to create cache directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unable to write cache entry {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid bound in cache entry {path}: {line}")]
    InvalidBound { path: PathBuf, line: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// When a working store entry may be reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Freshness {
    /// Any existing entry is reused.
    Always,

    /// Only entries written at or after the given instant are reused.
    /// Compared at whole-second resolution, like file timestamps.
    SinceRunStart(SystemTime),
}

impl Freshness {
    /// Policy for caching disabled, anchored at the current time.
    pub fn since_now() -> Self {
        Freshness::SinceRunStart(SystemTime::now())
    }

    pub fn accepts(&self, modified: SystemTime) -> bool {
        match self {
            Freshness::Always => true,
            Freshness::SinceRunStart(start) => whole_seconds(modified) >= whole_seconds(*start),
        }
    }
}

fn whole_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Which store a cached part came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheOrigin {
    Prebuilt,
    Working,
}

/// A previously translated part.
#[derive(Clone, Debug, PartialEq)]
pub struct CachedPart {
    pub id: PartId,

    /// Archive path relative to the store root, as referenced in output
    pub archive: String,

    pub bound: Bound,

    pub origin: CacheOrigin,
}

/// Prebuilt and working archive stores plus the in-memory bound memo.
#[derive(Debug)]
pub struct PartCache {
    prebuilt: Option<PathBuf>,
    working: PathBuf,
    freshness: Freshness,
    bounds: HashMap<PartId, Bound>,
}

impl PartCache {
    pub fn new(working: impl Into<PathBuf>, freshness: Freshness) -> Self {
        Self {
            prebuilt: None,
            working: working.into(),
            freshness,
            bounds: HashMap::new(),
        }
    }

    /// Add a read-only store searched before the working one.
    pub fn with_prebuilt(mut self, prebuilt: impl Into<PathBuf>) -> Self {
        self.prebuilt = Some(prebuilt.into());
        self
    }

    /// Number of bounds memoised in this run.
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Find a reusable archive for `id`.
    ///
    /// Unreadable entries are reported and treated as a miss so the part is
    /// translated again.
    pub fn lookup(&mut self, id: &PartId) -> Option<CachedPart> {
        let archive = id.archive_name();

        if let Some(prebuilt) = &self.prebuilt {
            let path = prebuilt.join(&archive);
            if path.is_file() {
                match self.bound_for(id, &path) {
                    Ok(bound) => {
                        log::debug!("Prebuilt hit: {}", id);
                        return Some(CachedPart {
                            id: id.clone(),
                            archive,
                            bound,
                            origin: CacheOrigin::Prebuilt,
                        });
                    }
                    Err(e) => log::warn!("{e}"),
                }
            }
        }

        let path = self.working.join(&archive);
        let fresh = path.is_file()
            && fs::metadata(&path)
                .and_then(|meta| meta.modified())
                .is_ok_and(|modified| self.freshness.accepts(modified));
        if !fresh {
            log::debug!("Cache miss: {}", id);
            return None;
        }

        match self.bound_for(id, &path) {
            Ok(bound) => {
                log::debug!("Cache hit: {}", id);
                Some(CachedPart {
                    id: id.clone(),
                    archive,
                    bound,
                    origin: CacheOrigin::Working,
                })
            }
            Err(e) => {
                log::warn!("{e}");
                None
            }
        }
    }

    /// Persist a translated fragment and memoise its bound.
    ///
    /// Returns the path written.
    pub fn store(&mut self, id: &PartId, bound: &Bound, fragment: &str) -> CacheResult<PathBuf> {
        let path = self.working.join(id.archive_name());

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| CacheError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut content = String::with_capacity(fragment.len() + 64);
        write_bound_declaration(&mut content, bound);
        content.push_str(fragment);
        fs::write(&path, content).map_err(|source| CacheError::Write {
            path: path.clone(),
            source,
        })?;

        self.bounds.insert(id.clone(), *bound);
        Ok(path)
    }

    /// Bound memoised for `id` in this run.
    pub fn bound(&self, id: &PartId) -> Option<&Bound> {
        self.bounds.get(id)
    }

    fn bound_for(&mut self, id: &PartId, path: &Path) -> CacheResult<Bound> {
        if let Some(bound) = self.bounds.get(id) {
            return Ok(*bound);
        }
        let bound = read_bound(path)?;
        self.bounds.insert(id.clone(), bound);
        Ok(bound)
    }
}

/// Read the bound declared on the first line of an archive.
///
/// Archives without geometry carry no declaration and have an empty bound.
pub fn read_bound(path: &Path) -> CacheResult<Bound> {
    let file = fs::File::open(path)?;
    let mut first = String::new();
    BufReader::new(file).read_line(&mut first)?;

    let Some(values) = first.trim().strip_prefix("Bound") else {
        return Ok(Bound::EMPTY);
    };
    values.parse().map_err(|_| CacheError::InvalidBound {
        path: path.to_path_buf(),
        line: first.trim().to_string(),
    })
}
