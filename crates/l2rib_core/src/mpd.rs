//! Multi-document (MPD) models.
//!
//! An MPD file packs a main model and any number of named sub-documents,
//! each introduced by a `0 FILE <name>` record. Sub-documents may be
//! referenced before they are defined, so their bounds are found by
//! fixed-point iteration: translate the main model, translate every
//! sub-document, translate the main model again, and repeat until no
//! reference is left pending.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::PathBuf;

use l2rib_math::Bound;
use thiserror::Error;

use crate::ldraw::{file_boundary, LineStream, PartId};
use crate::translate::{Translation, Translator};

/// Errors from multi-document resolution.
#[derive(Error, Debug)]
pub enum MpdError {
    #[error("multi-document model did not converge after {passes} passes, unresolved: {}", names(.pending))]
    NoConvergence { passes: usize, pending: Vec<PartId> },

    #[error("Unable to write sub-document {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type MpdResult<T> = Result<T, MpdError>;

fn names(ids: &[PartId]) -> String {
    ids.iter().map(PartId::as_str).collect::<Vec<_>>().join(", ")
}

/// One unit of a multi-document file, without its `FILE` record.
#[derive(Clone, Debug, PartialEq)]
pub struct SubDocument {
    pub name: PartId,
    pub records: Vec<(usize, String)>,
}

impl SubDocument {
    fn stream(&self) -> LineStream {
        LineStream::from_records(self.records.clone())
    }
}

/// A multi-document file split into its units.
#[derive(Clone, Debug, PartialEq)]
pub struct MultiDocument {
    pub main: SubDocument,

    /// Sub-documents in file order
    pub parts: Vec<SubDocument>,
}

/// Split `text` into units if it is a multi-document file.
///
/// The first `FILE` record names the main model; records before it belong
/// to the main model too. Returns `None` when there is no `FILE` record.
/// A repeated name keeps its first definition.
pub fn scan(text: &str) -> Option<MultiDocument> {
    let mut units: Vec<SubDocument> = Vec::new();
    let mut preamble = Vec::new();

    for (i, line) in text.lines().enumerate() {
        let record = (i + 1, line.trim_end_matches('\r').to_string());
        if let Some(name) = file_boundary(&record.1) {
            units.push(SubDocument {
                name,
                records: Vec::new(),
            });
            continue;
        }
        match units.last_mut() {
            Some(unit) => unit.records.push(record),
            None => preamble.push(record),
        }
    }

    let mut units = units.into_iter();
    let mut main = units.next()?;
    preamble.append(&mut main.records);
    main.records = preamble;

    let mut seen = BTreeSet::new();
    let parts = units
        .filter(|unit| {
            let first = seen.insert(unit.name.clone());
            if !first {
                log::warn!("Duplicate sub-document {}, keeping the first", unit.name);
            }
            first
        })
        .collect();

    Some(MultiDocument { main, parts })
}

/// Resolution state of a sub-document.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DocState {
    /// Declared, bound not yet known
    Pending,

    /// Translated with every reference resolved
    Resolved(Bound),
}

/// Bounds of the sub-documents of the model being translated.
#[derive(Clone, Debug, Default)]
pub struct DocumentTable {
    states: HashMap<PartId, DocState>,
}

impl DocumentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a sub-document name; references to it no longer go to the
    /// part library.
    pub fn declare(&mut self, name: PartId) {
        self.states.entry(name).or_insert(DocState::Pending);
    }

    pub fn state(&self, name: &PartId) -> Option<&DocState> {
        self.states.get(name)
    }

    pub fn resolve(&mut self, name: &PartId, bound: Bound) {
        self.states.insert(name.clone(), DocState::Resolved(bound));
    }

    /// Names still pending, sorted.
    pub fn pending(&self) -> Vec<PartId> {
        let mut pending: Vec<PartId> = self
            .states
            .iter()
            .filter(|(_, state)| matches!(state, DocState::Pending))
            .map(|(name, _)| name.clone())
            .collect();
        pending.sort();
        pending
    }

    /// Forget every sub-document, as before a new model.
    pub fn clear(&mut self) {
        self.states.clear();
    }
}

/// Converged translation of a multi-document model.
#[derive(Clone, Debug)]
pub struct MpdOutcome {
    pub translation: Translation,

    /// Fragment of the main model, with its bound declaration
    pub fragment: String,

    /// Sub-document sweeps needed
    pub cycles: usize,
}

/// Resolve every unit of `document`.
///
/// Each sub-document is written to `<mpd_dir>/<name>.rib`. Gives up after
/// one more cycle than there are sub-documents, which is enough for any
/// chain of forward references; only a reference cycle between
/// sub-documents exceeds it.
pub fn resolve(translator: &mut Translator, document: &MultiDocument) -> MpdResult<MpdOutcome> {
    translator.documents_mut().clear();
    for part in &document.parts {
        translator.documents_mut().declare(part.name.clone());
    }

    let (first, _) = translate_main(translator, document);
    log::debug!(
        "MPD main pass: {} forward references",
        first.pending.len()
    );

    let cap = document.parts.len() + 1;
    let mut cycles = 0;
    loop {
        cycles += 1;
        for part in &document.parts {
            translate_part(translator, part)?;
        }
        let (translation, fragment) = translate_main(translator, document);
        log::debug!(
            "MPD cycle {}: {} references pending",
            cycles,
            translation.pending.len()
        );

        if translation.is_complete() {
            log::info!("Multi-document model resolved in {} cycles", cycles);
            return Ok(MpdOutcome {
                translation,
                fragment,
                cycles,
            });
        }
        if cycles >= cap {
            return Err(MpdError::NoConvergence {
                passes: cycles,
                pending: translator.documents().pending(),
            });
        }
    }
}

fn translate_main(translator: &mut Translator, document: &MultiDocument) -> (Translation, String) {
    let mut fragment = String::new();
    let translation = translator.translate_unit(&mut document.main.stream(), None, &mut fragment);
    (translation, fragment)
}

/// Translate one sub-document to its own archive and record its bound once
/// it no longer depends on anything pending.
fn translate_part(translator: &mut Translator, part: &SubDocument) -> MpdResult<()> {
    let mut fragment = String::new();
    let translation = translator.translate_unit(&mut part.stream(), None, &mut fragment);

    let path = translator.options().mpd_dir.join(part.name.archive_name());
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| MpdError::Write {
            path: path.clone(),
            source,
        })?;
    }
    fs::write(&path, fragment).map_err(|source| MpdError::Write {
        path: path.clone(),
        source,
    })?;

    if translation.is_complete() {
        translator
            .documents_mut()
            .resolve(&part.name, translation.bound);
    }
    Ok(())
}
