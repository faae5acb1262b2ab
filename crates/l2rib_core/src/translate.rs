//! Recursive LDraw to RIB translation.
//!
//! A [`Translator`] is the run context: it owns the palette, the part
//! library, the archive cache and the multi-document table, and drives the
//! recursive resolution of part references. Each translated unit produces a
//! RIB fragment plus the bound of everything it contains.

use std::collections::{BTreeSet, HashSet};
use std::fmt::Write;
use std::path::{Path, PathBuf};

use l2rib_math::Bound;
use thiserror::Error;

use crate::batch::GeometryBatcher;
use crate::cache::{CacheOrigin, Freshness, PartCache};
use crate::ldraw::{self, parse_command, Command, LineStream, Meta, PartId, PartRef};
use crate::library::PartLibrary;
use crate::mpd::{self, DocState, DocumentTable, MpdError};
use crate::palette::Palette;
use crate::rib::{write_archive_reference, write_bound_declaration, write_matrix};
use crate::settings::Settings;

/// Errors that stop a translation as a whole.
#[derive(Error, Debug)]
pub enum TranslateError {
    #[error("Unable to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Mpd(#[from] MpdError),
}

pub type TranslateResult<T> = Result<T, TranslateError>;

/// Emission options that do not belong to a particular component.
#[derive(Clone, Debug)]
pub struct TranslateOptions {
    /// Reference child archives with `DelayedReadArchive` when their bound
    /// is known
    pub delayed_read_archive: bool,

    /// Where multi-document sub-units are written
    pub mpd_dir: PathBuf,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            delayed_read_archive: true,
            mpd_dir: PathBuf::from("."),
        }
    }
}

/// Result of translating one unit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Translation {
    pub bound: Bound,

    /// Sub-documents referenced before their bound was known
    pub pending: BTreeSet<PartId>,
}

impl Translation {
    /// True once no referenced sub-document is still unresolved.
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Counters for one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TranslateStats {
    pub parts_translated: usize,
    pub cache_hits: usize,
    pub prebuilt_hits: usize,
    pub missing_parts: usize,
    pub malformed_records: usize,
}

/// Run context for translating models.
pub struct Translator {
    options: TranslateOptions,
    palette: Palette,
    library: PartLibrary,
    cache: PartCache,
    documents: DocumentTable,
    stats: TranslateStats,

    /// Parts currently being translated, to break reference cycles
    in_progress: HashSet<PartId>,
}

impl Translator {
    pub fn new(
        options: TranslateOptions,
        palette: Palette,
        library: PartLibrary,
        cache: PartCache,
    ) -> Self {
        Self {
            options,
            palette,
            library,
            cache,
            documents: DocumentTable::new(),
            stats: TranslateStats::default(),
            in_progress: HashSet::new(),
        }
    }

    /// Build a translator from loaded settings.
    ///
    /// A missing colour configuration is reported and leaves the palette
    /// empty; every colour then resolves to the fallback.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut palette = Palette::new();
        let colour_config = settings.colour_config_path();
        if let Err(e) = palette.load(&colour_config) {
            log::warn!(
                "Unable to load colour configuration {}: {}",
                colour_config.display(),
                e
            );
        }

        let freshness = if settings.use_cache {
            Freshness::Always
        } else {
            Freshness::since_now()
        };
        let mut cache = PartCache::new(&settings.cache_dir, freshness);
        if let Some(prebuilt) = settings.prebuilt_dir() {
            cache = cache.with_prebuilt(prebuilt);
        }

        let options = TranslateOptions {
            delayed_read_archive: settings.delayed_read_archive,
            mpd_dir: settings.mpd_dir.clone(),
        };

        Self::new(
            options,
            palette,
            PartLibrary::new(settings.ldraw_dir.clone()),
            cache,
        )
    }

    pub fn options(&self) -> &TranslateOptions {
        &self.options
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn documents(&self) -> &DocumentTable {
        &self.documents
    }

    pub fn documents_mut(&mut self) -> &mut DocumentTable {
        &mut self.documents
    }

    pub fn stats(&self) -> TranslateStats {
        self.stats
    }

    /// Log the run summary.
    pub fn log_summary(&self) {
        let s = &self.stats;
        log::info!(
            "Translated {} parts ({} cached, {} prebuilt, {} missing, {} malformed records, {} unknown colours)",
            s.parts_translated,
            s.cache_hits,
            s.prebuilt_hits,
            s.missing_parts,
            s.malformed_records,
            self.palette.unknown_warnings()
        );
    }

    /// Translate a model file, single or multi-document.
    ///
    /// Returns the top-level translation and its fragment, which starts
    /// with the bound declaration.
    pub fn translate_model<P: AsRef<Path>>(
        &mut self,
        path: P,
    ) -> TranslateResult<(Translation, String)> {
        let text = read_model(path.as_ref())?;
        match mpd::scan(&text) {
            Some(document) => {
                log::info!(
                    "{} is a multi-document model with {} sub-documents",
                    path.as_ref().display(),
                    document.parts.len()
                );
                let outcome = mpd::resolve(self, &document)?;
                Ok((outcome.translation, outcome.fragment))
            }
            None => Ok(self.translate_text(&text)),
        }
    }

    /// Translate a single-document file as the unnamed top-level unit.
    pub fn translate_file<P: AsRef<Path>>(
        &mut self,
        path: P,
    ) -> TranslateResult<(Translation, String)> {
        let text = read_model(path.as_ref())?;
        Ok(self.translate_text(&text))
    }

    /// Translate in-memory LDraw text as the unnamed top-level unit.
    pub fn translate_text(&mut self, text: &str) -> (Translation, String) {
        let mut out = String::new();
        let translation = self.translate_unit(&mut LineStream::new(text), None, &mut out);
        (translation, out)
    }

    /// Translate records from `stream` until it ends or reaches the next
    /// `0 FILE` boundary.
    ///
    /// A named unit is persisted to the cache and `out` receives a reference
    /// to it; the unnamed unit writes its bound declaration and fragment
    /// straight to `out`. A `FILE` record before any other record names the
    /// unit itself and is skipped; later ones are pushed back onto the
    /// stream for the caller.
    pub fn translate_unit(
        &mut self,
        stream: &mut LineStream,
        part: Option<&PartId>,
        out: &mut String,
    ) -> Translation {
        let mut body = String::new();
        let mut batcher = GeometryBatcher::new();
        let mut translation = Translation::default();
        let mut started = false;

        while let Some((line_number, line)) = stream.next_record() {
            let command = match parse_command(line_number, &line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    log::warn!("{}: {}", part.map_or("<model>", PartId::as_str), e);
                    self.stats.malformed_records += 1;
                    continue;
                }
            };

            match command {
                Command::Meta(Meta::File(_)) if started => {
                    stream.push_front((line_number, line));
                    break;
                }
                Command::Meta(Meta::File(_)) | Command::Meta(Meta::Comment) => {}
                Command::Meta(Meta::Colour(definition)) => {
                    if let Err(e) = self.palette.apply_definition(&definition) {
                        log::warn!("Line {}: bad colour definition: {}", line_number, e);
                    }
                }
                Command::Meta(Meta::Write(text)) => {
                    let _ = writeln!(body, "# {text}");
                }
                Command::PartRef(reference) => {
                    batcher.flush(&mut body, &mut self.palette);
                    self.insert_part(&reference, &mut body, &mut translation);
                }
                Command::Line(seg) => {
                    expand_points(&mut translation.bound, &seg.points);
                    batcher.push_segment(&mut body, &mut self.palette, seg.colour, seg.points);
                }
                Command::OptionalLine(opt) => {
                    let points = opt.all_points();
                    expand_points(&mut translation.bound, &points);
                    batcher.push_optional(&mut body, &mut self.palette, opt.colour, points);
                }
                Command::Triangle(tri) => {
                    expand_points(&mut translation.bound, &tri.points);
                    batcher.push_triangle(&mut body, &mut self.palette, tri.colour, tri.points);
                }
                Command::Quad(quad) => {
                    expand_points(&mut translation.bound, &quad.points);
                    batcher.push_quad(&mut body, &mut self.palette, quad.colour, quad.points);
                }
            }
            started = true;
        }
        batcher.flush(&mut body, &mut self.palette);

        match part {
            Some(id) => self.persist(id, &translation.bound, body, out),
            None => {
                write_bound_declaration(out, &translation.bound);
                out.push_str(&body);
            }
        }
        translation
    }

    /// Store a named unit and reference it, or inline it when it cannot
    /// be stored. An inlined unit is translated again at its next
    /// reference.
    fn persist(&mut self, id: &PartId, bound: &Bound, body: String, out: &mut String) {
        match self.cache.store(id, bound, &body) {
            Ok(path) => {
                log::debug!("Wrote {}", path.display());
                write_archive_reference(
                    out,
                    &id.archive_name(),
                    bound,
                    self.options.delayed_read_archive,
                );
            }
            Err(e) => {
                log::warn!("{e}");
                out.push_str(&body);
            }
        }
    }

    /// Resolve a part reference and emit its placement block.
    ///
    /// References that cannot be resolved emit nothing and leave the bound
    /// unchanged.
    fn insert_part(&mut self, reference: &PartRef, body: &mut String, translation: &mut Translation) {
        let mut invocation = String::new();

        let name = match self.documents.state(&reference.part) {
            Some(state) => {
                let archive = reference.part.archive_name();
                match state {
                    DocState::Resolved(bound) => {
                        let bound = *bound;
                        translation.bound.expand_transformed(&bound, &reference.matrix);
                        write_archive_reference(
                            &mut invocation,
                            &archive,
                            &bound,
                            self.options.delayed_read_archive,
                        );
                    }
                    DocState::Pending => {
                        translation.pending.insert(reference.part.clone());
                        write_archive_reference(&mut invocation, &archive, &Bound::EMPTY, false);
                    }
                }
                reference.part.clone()
            }
            None => {
                let key = reference.part.without_resolution_prefix();
                let Some(child) = self.resolve_library_part(&key, &mut invocation) else {
                    return;
                };
                translation.bound.expand_transformed(&child.bound, &reference.matrix);
                translation.pending.extend(child.pending);
                key
            }
        };

        body.push_str("AttributeBegin\n");
        let _ = writeln!(body, "Attribute \"identifier\" \"string name\" [\"{name}\"]");
        body.push_str("IfBegin \"$user:l2ribPass == 'main'\"\n");
        self.palette.write_colour(body, reference.colour);
        body.push_str("ElseIf \"$user:l2ribPass == 'shadow'\"\n");
        body.push_str("Surface \"null\"\n");
        body.push_str("IfEnd\n");
        write_matrix(body, &reference.matrix);
        body.push_str(&invocation);
        body.push_str("AttributeEnd\n");
    }

    /// Find, reuse or translate a library part, writing its invocation.
    fn resolve_library_part(&mut self, id: &PartId, invocation: &mut String) -> Option<Translation> {
        let Some(path) = self.library.locate(id) else {
            log::warn!("Unable to open file for part: {}", id);
            self.stats.missing_parts += 1;
            return None;
        };

        if let Some(hit) = self.cache.lookup(id) {
            match hit.origin {
                CacheOrigin::Prebuilt => self.stats.prebuilt_hits += 1,
                CacheOrigin::Working => self.stats.cache_hits += 1,
            }
            write_archive_reference(
                invocation,
                &hit.archive,
                &hit.bound,
                self.options.delayed_read_archive,
            );
            return Some(Translation {
                bound: hit.bound,
                pending: BTreeSet::new(),
            });
        }

        if self.in_progress.contains(id) {
            log::warn!("Part {} references itself, skipping", id);
            return None;
        }

        let text = match ldraw::read_source(&path) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("Unable to read {}: {}", path.display(), e);
                self.stats.missing_parts += 1;
                return None;
            }
        };

        log::debug!("Translating {} from {}", id, path.display());
        self.in_progress.insert(id.clone());
        let child = self.translate_unit(&mut LineStream::new(&text), Some(id), invocation);
        self.in_progress.remove(id);
        self.stats.parts_translated += 1;
        Some(child)
    }
}

fn read_model(path: &Path) -> TranslateResult<String> {
    ldraw::read_source(path).map_err(|source| TranslateError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn expand_points(bound: &mut Bound, points: &[l2rib_math::Vec3]) {
    for p in points {
        bound.expand(*p);
    }
}
