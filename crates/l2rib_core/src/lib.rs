//! l2rib core - LDraw to RenderMan RIB translation.
//!
//! This crate provides:
//!
//! - **LDraw parsing**: records, part identifiers, line streams
//! - **Palette**: colour definitions, dithered colours and material emission
//! - **Translation**: recursive part resolution with a disk-backed archive
//!   cache, geometry batching and bound accumulation
//! - **MPD support**: fixed-point resolution of multi-document models
//!
//! # Example
//!
//! ```ignore
//! use l2rib_core::{Settings, Translator};
//!
//! let settings = Settings::load(Settings::default_path()?)?;
//! let mut translator = Translator::from_settings(&settings);
//! let (translation, fragment) = translator.translate_model("house.ldr")?;
//! println!("Bound {} ({} bytes of RIB)", translation.bound, fragment.len());
//! ```

pub mod batch;
pub mod cache;
pub mod ldraw;
pub mod library;
pub mod mpd;
pub mod palette;
pub mod rib;
pub mod settings;
pub mod translate;

// Re-export commonly used types
pub use cache::{CacheError, Freshness, PartCache};
pub use ldraw::{LineStream, PartId};
pub use library::PartLibrary;
pub use mpd::{MpdError, MultiDocument};
pub use palette::{ColourDefinition, Palette};
pub use settings::{Light, Settings, SettingsError, ShadowMode};
pub use translate::{TranslateError, TranslateOptions, TranslateStats, Translation, Translator};
