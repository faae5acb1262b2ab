//! Part library search path.

use std::path::PathBuf;

use crate::ldraw::PartId;

/// Folders probed under the library root, highest priority first.
pub const SEARCH_FOLDERS: [&str; 4] = ["p/48", "p", "parts", "models"];

/// Locates part source files on disk.
#[derive(Clone, Debug)]
pub struct PartLibrary {
    /// LDraw library root, if one is configured
    root: Option<PathBuf>,

    /// Directory for identifiers given as plain relative paths
    base_dir: PathBuf,
}

impl PartLibrary {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root,
            base_dir: PathBuf::from("."),
        }
    }

    /// Resolve bare identifiers against `base_dir` instead of the
    /// working directory.
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Every path probed for `id`, in search order.
    pub fn candidates(&self, id: &PartId) -> Vec<PathBuf> {
        let relative = id.without_resolution_prefix();
        let mut paths = Vec::with_capacity(SEARCH_FOLDERS.len() + 1);
        if let Some(root) = &self.root {
            for folder in SEARCH_FOLDERS {
                paths.push(root.join(folder).join(relative.as_str()));
            }
        }
        paths.push(self.base_dir.join(relative.as_str()));
        paths
    }

    /// First existing file for `id`.
    pub fn locate(&self, id: &PartId) -> Option<PathBuf> {
        let found = self.candidates(id).into_iter().find(|path| path.is_file());
        if found.is_none() {
            log::debug!("Part {} not found in library", id);
        }
        found
    }
}

impl Default for PartLibrary {
    fn default() -> Self {
        Self::new(None)
    }
}
