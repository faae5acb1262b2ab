//! Colour palette for LDraw colour codes.
//!
//! The palette is a fixed table of 512 slots filled from `!COLOUR`
//! definitions. Lookups of undefined codes above 256 synthesize a dither
//! of two base colours; other undefined codes fall back to a warning
//! colour. Both outcomes are written back so each code warns at most once.

use std::collections::HashSet;
use std::fmt::Write;
use std::path::Path;

use l2rib_math::Vec3;
use thiserror::Error;

use crate::ldraw::{parse_command, read_source, ColourToken, Command, Meta};

/// Number of slots in the palette.
pub const PALETTE_SIZE: usize = 512;

/// Colour that inherits the enclosing part's colour.
pub const INHERIT_COLOUR: u32 = 16;

/// Colour that selects the edge colour of the enclosing part.
pub const EDGE_COLOUR: u32 = 24;

/// Codes above this are dithers of two base codes.
pub const DITHER_BASE: u32 = 256;

const FALLBACK_RGB: Vec3 = Vec3::new(1.0, 0.0, 0.0);
const FALLBACK_EDGE: Vec3 = Vec3::new(0.0, 1.0, 1.0);

/// Errors that can occur while reading colour definitions.
#[derive(Error, Debug)]
pub enum PaletteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing value after {0}")]
    MissingValue(&'static str),

    #[error("invalid {field} value `{value}`")]
    InvalidValue { field: &'static str, value: String },
}

pub type PaletteResult<T> = Result<T, PaletteError>;

/// Surface class of a colour.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Material {
    #[default]
    Plain,
    Metal,
    Translucent,
    Rubber,
    /// Verbatim scene statements emitted instead of the usual colour block
    Custom(String),
}

/// Edge colour of a definition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Edge {
    Rgb(Vec3),
    /// Refers to another code's base colour until references are resolved
    Code(u32),
}

/// A single colour definition.
#[derive(Clone, Debug, PartialEq)]
pub struct ColourDefinition {
    pub name: String,
    pub code: u32,

    /// Base colour (RGB, 0-1)
    pub rgb: Vec3,

    /// Opacity (0-1) for translucent colours
    pub alpha: Option<f32>,

    pub edge: Edge,
    pub material: Material,
}

impl ColourDefinition {
    /// Create an opaque plain colour with a synthesized edge.
    pub fn new(name: impl Into<String>, code: u32, rgb: Vec3) -> Self {
        Self {
            name: name.into(),
            code,
            rgb,
            alpha: None,
            edge: Edge::Rgb(Vec3::ONE - rgb),
            material: Material::Plain,
        }
    }

    /// Parse the text following `!COLOUR`.
    ///
    /// Returns `Ok(None)` when the record has no usable code.
    pub fn parse(definition: &str) -> PaletteResult<Option<Self>> {
        let mut rest = definition;
        let name = take_token(&mut rest).unwrap_or_default().to_string();
        let mut code: Option<u32> = None;
        let mut rgb = Vec3::ZERO;
        let mut alpha = None;
        let mut edge = None;
        let mut material = Material::Plain;

        while let Some(keyword) = take_token(&mut rest) {
            match keyword {
                "CODE" => {
                    let value = take_token(&mut rest).ok_or(PaletteError::MissingValue("CODE"))?;
                    code = Some(value.parse().map_err(|_| PaletteError::InvalidValue {
                        field: "CODE",
                        value: value.to_string(),
                    })?);
                }
                "VALUE" => {
                    let value = take_token(&mut rest).ok_or(PaletteError::MissingValue("VALUE"))?;
                    rgb = parse_hex_rgb(value).ok_or_else(|| PaletteError::InvalidValue {
                        field: "VALUE",
                        value: value.to_string(),
                    })?;
                }
                "EDGE" => {
                    let value = take_token(&mut rest).ok_or(PaletteError::MissingValue("EDGE"))?;
                    edge = Some(parse_edge(value).ok_or_else(|| PaletteError::InvalidValue {
                        field: "EDGE",
                        value: value.to_string(),
                    })?);
                }
                "ALPHA" => {
                    let value = take_token(&mut rest).ok_or(PaletteError::MissingValue("ALPHA"))?;
                    let a: u8 = value.parse().map_err(|_| PaletteError::InvalidValue {
                        field: "ALPHA",
                        value: value.to_string(),
                    })?;
                    alpha = Some(f32::from(a) / 255.0);
                    material = Material::Translucent;
                }
                "LUMINANCE" => {
                    take_token(&mut rest).ok_or(PaletteError::MissingValue("LUMINANCE"))?;
                }
                "CHROME" | "METALLIC" | "MATTE_METALLIC" => material = Material::Metal,
                "RUBBER" => material = Material::Rubber,
                "MATERIAL" => {
                    material = Material::Custom(rest.trim().to_string());
                    break;
                }
                // PEARLESCENT and unknown keywords have no rendering
                _ => {}
            }
        }

        let Some(code) = code.filter(|c| (*c as usize) < PALETTE_SIZE) else {
            log::debug!("Ignoring colour definition {name} without a usable code");
            return Ok(None);
        };

        Ok(Some(Self {
            name,
            code,
            rgb,
            alpha,
            edge: edge.unwrap_or(Edge::Rgb(Vec3::ONE - rgb)),
            material,
        }))
    }
}

/// Split the next whitespace-delimited token off `rest`.
fn take_token<'a>(rest: &mut &'a str) -> Option<&'a str> {
    let s = rest.trim_start();
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    let (token, tail) = s.split_at(end);
    *rest = tail;
    (!token.is_empty()).then_some(token)
}

/// Parse `#RRGGBB` or `0xRRGGBB`.
fn parse_hex_rgb(value: &str) -> Option<Vec3> {
    let hex = value
        .strip_prefix('#')
        .or_else(|| value.strip_prefix("0x"))
        .or_else(|| value.strip_prefix("0X"))?;
    let channel = |i: usize| -> Option<f32> {
        let digits = hex.get(i * 2..i * 2 + 2)?;
        u8::from_str_radix(digits, 16).ok().map(|v| f32::from(v) / 255.0)
    };
    Some(Vec3::new(channel(0)?, channel(1)?, channel(2)?))
}

fn parse_edge(value: &str) -> Option<Edge> {
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        return value.parse().ok().map(Edge::Code);
    }
    parse_hex_rgb(value).map(Edge::Rgb)
}

/// Palette slot state.
#[derive(Clone, Debug, Default)]
enum Slot {
    #[default]
    Undefined,
    Defined(ColourDefinition),
    /// Looked up without a definition; already warned
    Unknown,
}

/// The colour table for one run.
#[derive(Clone, Debug)]
pub struct Palette {
    slots: Vec<Slot>,
    /// Out-of-range codes already warned about
    warned_out_of_range: HashSet<u32>,
    /// Warnings issued for codes without a definition
    unknown_warnings: usize,
}

impl Palette {
    /// Create an empty palette.
    pub fn new() -> Self {
        Self {
            slots: vec![Slot::Undefined; PALETTE_SIZE],
            warned_out_of_range: HashSet::new(),
            unknown_warnings: 0,
        }
    }

    /// Number of colour codes reported as unknown or out of range so far.
    pub fn unknown_warnings(&self) -> usize {
        self.unknown_warnings
    }

    /// Load every `!COLOUR` record of a colour configuration file, then
    /// resolve edge references.
    ///
    /// Malformed records are skipped with a warning. Returns the number of
    /// definitions applied.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> PaletteResult<usize> {
        let path = path.as_ref();
        let content = read_source(path)?;
        let mut count = 0;

        for (i, line) in content.lines().enumerate() {
            let Ok(Some(Command::Meta(Meta::Colour(definition)))) = parse_command(i + 1, line)
            else {
                continue;
            };
            match self.apply_definition(&definition) {
                Ok(true) => count += 1,
                Ok(false) => {}
                Err(e) => log::warn!("{}:{}: bad colour definition: {}", path.display(), i + 1, e),
            }
        }

        self.resolve_edge_references();
        log::info!("Loaded {} colour definitions from {}", count, path.display());
        Ok(count)
    }

    /// Parse and store one definition. Returns whether a slot was written.
    pub fn apply_definition(&mut self, definition: &str) -> PaletteResult<bool> {
        match ColourDefinition::parse(definition)? {
            Some(def) => {
                self.define(def);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Store a definition in its slot, replacing any previous one.
    ///
    /// Codes outside the table are ignored.
    pub fn define(&mut self, def: ColourDefinition) {
        if let Some(slot) = self.slots.get_mut(def.code as usize) {
            *slot = Slot::Defined(def);
        }
    }

    /// Definition stored for a code, without synthesis.
    pub fn get(&self, code: u32) -> Option<&ColourDefinition> {
        match self.slots.get(code as usize) {
            Some(Slot::Defined(def)) => Some(def),
            _ => None,
        }
    }

    /// Replace every `Edge::Code` with the referenced code's base colour.
    ///
    /// References to undefined codes fall back to the inverse of the base
    /// colour.
    pub fn resolve_edge_references(&mut self) {
        for i in 0..self.slots.len() {
            let Slot::Defined(def) = &self.slots[i] else {
                continue;
            };
            let Edge::Code(code) = def.edge else {
                continue;
            };
            let rgb = match self.get(code) {
                Some(target) => target.rgb,
                None => {
                    log::warn!("Colour {} has edge code {} which is not defined", def.code, code);
                    Vec3::ONE - def.rgb
                }
            };
            if let Slot::Defined(def) = &mut self.slots[i] {
                def.edge = Edge::Rgb(rgb);
            }
        }
    }

    /// Concrete edge colour of a definition.
    pub fn edge_rgb(&self, def: &ColourDefinition) -> Vec3 {
        match def.edge {
            Edge::Rgb(rgb) => rgb,
            Edge::Code(code) => self.get(code).map_or(Vec3::ONE - def.rgb, |d| d.rgb),
        }
    }

    /// Resolve a palette index, synthesizing dithers on first use.
    ///
    /// Returns `None` for codes with no usable definition; each such code
    /// is warned about once per palette.
    pub fn resolve(&mut self, code: u32) -> Option<&ColourDefinition> {
        let Some(slot) = self.slots.get(code as usize) else {
            if self.warned_out_of_range.insert(code) {
                log::warn!("Invalid colour code {code}");
                self.unknown_warnings += 1;
            }
            return None;
        };

        if matches!(slot, Slot::Undefined) {
            self.unknown_warnings += 1;
            let next = match self.synthesize_dither(code) {
                Some(def) => {
                    log::warn!("Unknown colour code {}, using {}", code, def.name);
                    Slot::Defined(def)
                }
                None => {
                    log::warn!("Unknown colour code {code} encountered");
                    Slot::Unknown
                }
            };
            self.slots[code as usize] = next;
        }

        self.get(code)
    }

    /// Average of the two base colours that a dither code encodes.
    fn synthesize_dither(&self, code: u32) -> Option<ColourDefinition> {
        if code <= DITHER_BASE {
            return None;
        }
        let a = self.get((code - DITHER_BASE) % 16)?;
        let b = self.get((code - DITHER_BASE) / 16)?;

        let alpha = match (a.alpha, b.alpha) {
            (None, None) => None,
            (x, y) => Some(0.5 * (x.unwrap_or(1.0) + y.unwrap_or(1.0))),
        };

        Some(ColourDefinition {
            name: format!("Dither of {} and {}", a.name, b.name),
            code,
            rgb: 0.5 * (a.rgb + b.rgb),
            alpha,
            edge: Edge::Rgb(0.5 * (self.edge_rgb(a) + self.edge_rgb(b))),
            material: if alpha.is_some() {
                Material::Translucent
            } else {
                Material::Plain
            },
        })
    }

    /// Write the colour statements for a record's colour field.
    pub fn write_colour(&mut self, out: &mut String, colour: ColourToken) {
        match colour {
            ColourToken::Index(INHERIT_COLOUR) => {}
            // Must stay a shader lookup: archives are shared between parents
            ColourToken::Index(EDGE_COLOUR) => out.push_str("Surface \"edgeConstant\"\n"),
            ColourToken::Index(code) => {
                let Some(def) = self.resolve(code).cloned() else {
                    if (code as usize) < PALETTE_SIZE {
                        let _ = writeln!(out, "# Unknown color code: {code}");
                    }
                    write_rgb(out, FALLBACK_RGB, FALLBACK_EDGE);
                    return;
                };
                self.write_definition(out, &def);
            }
            ColourToken::Direct(hex) => write_direct(out, hex),
        }
    }

    fn write_definition(&self, out: &mut String, def: &ColourDefinition) {
        let _ = writeln!(out, "# {}", def.name);
        if let Material::Custom(directive) = &def.material {
            out.push_str("# custom material\n");
            let _ = writeln!(out, "{directive}");
            return;
        }
        if let Some(a) = def.alpha {
            let _ = writeln!(out, "Opacity {a} {a} {a}");
        }
        write_rgb(out, def.rgb, self.edge_rgb(def));
        match def.material {
            Material::Plain | Material::Custom(_) => {}
            Material::Metal => out.push_str("Surface \"metal\"\n"),
            Material::Translucent => out.push_str(
                "Surface \"glass\" \"Kd\" [0.3] \"uniform float eta\" [1.33] \"uniform float refrraysamples\" [3]\n",
            ),
            Material::Rubber => out.push_str("Surface \"matte\"\n"),
        }
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new()
    }
}

fn write_rgb(out: &mut String, rgb: Vec3, edge: Vec3) {
    let _ = writeln!(out, "Color {} {} {}", rgb.x, rgb.y, rgb.z);
    let _ = writeln!(
        out,
        "Attribute \"user\" \"uniform color l2ribEdgeColor\" [{} {} {}]",
        edge.x, edge.y, edge.z
    );
}

/// Direct colours: bit 25 set is opaque, otherwise bit 24 set is half
/// transparent.
fn write_direct(out: &mut String, hex: u32) {
    let channel = |shift: u32| f32::from(((hex >> shift) & 0xFF) as u8) / 255.0;
    let (r, g, b) = (channel(16), channel(8), channel(0));
    if hex & 0x0200_0000 != 0 {
        let _ = writeln!(out, "Color {r} {g} {b}");
        out.push_str("Opacity 1 1 1\n");
    } else if hex & 0x0100_0000 != 0 {
        let _ = writeln!(out, "Color {r} {g} {b}");
        out.push_str("Opacity 0.5 0.5 0.5\n");
    }
    out.push_str("Surface \"plastic\"\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette_with(defs: &[&str]) -> Palette {
        let mut palette = Palette::new();
        for def in defs {
            palette.apply_definition(def).unwrap();
        }
        palette.resolve_edge_references();
        palette
    }

    #[test]
    fn test_parse_basic_definition() {
        let def = ColourDefinition::parse("Red CODE 4 VALUE #C91A09 EDGE #333333")
            .unwrap()
            .unwrap();

        assert_eq!(def.name, "Red");
        assert_eq!(def.code, 4);
        assert!((def.rgb.x - 201.0 / 255.0).abs() < 1e-6);
        assert_eq!(def.edge, Edge::Rgb(Vec3::splat(51.0 / 255.0)));
        assert_eq!(def.material, Material::Plain);
        assert_eq!(def.alpha, None);
    }

    #[test]
    fn test_parse_hex_prefix_variants() {
        let def = ColourDefinition::parse("Blue CODE 1 VALUE 0x0000FF")
            .unwrap()
            .unwrap();
        assert_eq!(def.rgb, Vec3::new(0.0, 0.0, 1.0));
        // No EDGE: inverse of the base colour
        assert_eq!(def.edge, Edge::Rgb(Vec3::new(1.0, 1.0, 0.0)));
    }

    #[test]
    fn test_parse_alpha_and_materials() {
        let glass = ColourDefinition::parse("Trans_Clear CODE 47 VALUE #FFFFFF EDGE #C3C3C3 ALPHA 128")
            .unwrap()
            .unwrap();
        assert_eq!(glass.material, Material::Translucent);
        assert!((glass.alpha.unwrap() - 128.0 / 255.0).abs() < 1e-6);

        let chrome = ColourDefinition::parse("Chrome_Silver CODE 383 VALUE #E0E0E0 EDGE 0 CHROME")
            .unwrap()
            .unwrap();
        assert_eq!(chrome.material, Material::Metal);
        assert_eq!(chrome.edge, Edge::Code(0));

        let rubber = ColourDefinition::parse("Rubber_Black CODE 256 VALUE #212121 LUMINANCE 0 RUBBER")
            .unwrap()
            .unwrap();
        assert_eq!(rubber.material, Material::Rubber);
    }

    #[test]
    fn test_parse_custom_material() {
        let def = ColourDefinition::parse(
            "Glow CODE 99 VALUE #FFFF00 MATERIAL Surface \"constant\" # bright",
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            def.material,
            Material::Custom("Surface \"constant\" # bright".to_string())
        );
    }

    #[test]
    fn test_parse_rejects_malformed_value() {
        assert!(ColourDefinition::parse("Bad CODE 5 VALUE #GG0000").is_err());
        assert!(ColourDefinition::parse("Bad CODE 5 VALUE").is_err());
        assert!(ColourDefinition::parse("Bad CODE five VALUE #000000").is_err());
    }

    #[test]
    fn test_parse_ignores_out_of_range_code() {
        assert_eq!(ColourDefinition::parse("Huge CODE 512 VALUE #000000").unwrap(), None);
        assert_eq!(ColourDefinition::parse("NoCode VALUE #000000").unwrap(), None);
    }

    #[test]
    fn test_edge_reference_resolution() {
        let palette = palette_with(&[
            "Black CODE 0 VALUE #000000 EDGE #595959",
            "Chrome CODE 383 VALUE #E0E0E0 EDGE 0 CHROME",
        ]);
        assert_eq!(palette.get(383).unwrap().edge, Edge::Rgb(Vec3::ZERO));
    }

    #[test]
    fn test_write_defined_colour() {
        let mut palette = palette_with(&["Red CODE 4 VALUE #FF0000 EDGE #000000"]);
        let mut out = String::new();
        palette.write_colour(&mut out, ColourToken::Index(4));

        assert_eq!(
            out,
            "# Red\nColor 1 0 0\nAttribute \"user\" \"uniform color l2ribEdgeColor\" [0 0 0]\n"
        );
    }

    #[test]
    fn test_write_translucent_colour() {
        let mut palette = palette_with(&["Trans CODE 47 VALUE #FFFFFF EDGE #FFFFFF ALPHA 51"]);
        let mut out = String::new();
        palette.write_colour(&mut out, ColourToken::Index(47));

        assert!(out.contains("Opacity 0.2 0.2 0.2\n"));
        assert!(out.contains("Surface \"glass\""));
    }

    #[test]
    fn test_write_custom_colour() {
        let mut palette = palette_with(&["Glow CODE 99 VALUE #FFFF00 MATERIAL Surface \"constant\""]);
        let mut out = String::new();
        palette.write_colour(&mut out, ColourToken::Index(99));

        assert_eq!(out, "# Glow\n# custom material\nSurface \"constant\"\n");
    }

    #[test]
    fn test_special_codes() {
        let mut palette = Palette::new();
        let mut out = String::new();
        palette.write_colour(&mut out, ColourToken::Index(INHERIT_COLOUR));
        assert!(out.is_empty());

        palette.write_colour(&mut out, ColourToken::Index(EDGE_COLOUR));
        assert_eq!(out, "Surface \"edgeConstant\"\n");
    }

    #[test]
    fn test_dither_synthesis() {
        // 256 + 4 + 16 * 1: dither of codes 4 and 1
        let mut palette = palette_with(&[
            "Blue CODE 1 VALUE #0000FF EDGE #000000",
            "Red CODE 4 VALUE #FF0000 EDGE #000000",
        ]);
        let code = DITHER_BASE + 4 + 16;
        let dither = palette.resolve(code).cloned().unwrap();

        assert_eq!(dither.rgb, Vec3::new(0.5, 0.0, 0.5));
        assert_eq!(dither.name, "Dither of Red and Blue");
        assert_eq!(dither.material, Material::Plain);

        // Cached back into the table
        assert_eq!(palette.get(code), Some(&dither));
    }

    #[test]
    fn test_dither_of_translucent_is_translucent() {
        let mut palette = palette_with(&[
            "Clear CODE 1 VALUE #FFFFFF ALPHA 0",
            "Red CODE 4 VALUE #FF0000",
        ]);
        let dither = palette.resolve(DITHER_BASE + 4 + 16).cloned().unwrap();

        assert_eq!(dither.material, Material::Translucent);
        assert_eq!(dither.alpha, Some(0.5));
    }

    #[test]
    fn test_unknown_dither_falls_back_once() {
        let mut palette = Palette::new();
        let code = DITHER_BASE + 3 + 16 * 2;

        let mut out = String::new();
        palette.write_colour(&mut out, ColourToken::Index(code));
        assert!(out.contains("Color 1 0 0\n"));
        assert!(matches!(palette.slots[code as usize], Slot::Unknown));
        assert_eq!(palette.unknown_warnings(), 1);

        // Repeated lookups stay on the fallback without re-synthesizing
        let mut again = String::new();
        palette.write_colour(&mut again, ColourToken::Index(code));
        assert_eq!(out, again);
        assert!(palette.resolve(code).is_none());
        assert_eq!(palette.unknown_warnings(), 1);
    }

    #[test]
    fn test_out_of_range_code() {
        let mut palette = Palette::new();
        let mut out = String::new();
        palette.write_colour(&mut out, ColourToken::Index(600));

        assert!(out.starts_with("Color 1 0 0\n"));
        assert!(palette.warned_out_of_range.contains(&600));

        palette.write_colour(&mut out, ColourToken::Index(600));
        assert_eq!(palette.unknown_warnings(), 1);
    }

    #[test]
    fn test_direct_colours() {
        let mut palette = Palette::new();

        let mut opaque = String::new();
        palette.write_colour(&mut opaque, ColourToken::Direct(0x02FF_0000));
        assert_eq!(opaque, "Color 1 0 0\nOpacity 1 1 1\nSurface \"plastic\"\n");

        let mut half = String::new();
        palette.write_colour(&mut half, ColourToken::Direct(0x0100_00FF));
        assert_eq!(half, "Color 0 0 1\nOpacity 0.5 0.5 0.5\nSurface \"plastic\"\n");
    }

    #[test]
    fn test_load_colour_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ldconfig.ldr");
        std::fs::write(
            &path,
            "0 LDraw.org Configuration File\n\
             0 !COLOUR Black CODE 0 VALUE #05131D EDGE #595959\n\
             0 !COLOUR Broken CODE 2 VALUE nothex\n\
             0 !COLOUR Red CODE 4 VALUE #C91A09 EDGE 0\n\
             3 4 0 0 0 1 0 0 0 1 0\n",
        )
        .unwrap();

        let mut palette = Palette::new();
        let count = palette.load(&path).unwrap();

        assert_eq!(count, 2);
        assert!(palette.get(2).is_none());
        assert_eq!(palette.get(4).unwrap().edge, Edge::Rgb(palette.get(0).unwrap().rgb));
    }

    #[test]
    fn test_load_latin1_colour_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ldconfig.ldr");
        std::fs::write(
            &path,
            b"0 Author: Ren\xe9 Fran\xe7ois\n0 !COLOUR Red CODE 4 VALUE #C91A09 EDGE #333333\n",
        )
        .unwrap();

        let mut palette = Palette::new();
        assert_eq!(palette.load(&path).unwrap(), 1);
        assert_eq!(palette.get(4).unwrap().name, "Red");
    }

    #[test]
    fn test_load_missing_file() {
        let mut palette = Palette::new();
        assert!(matches!(
            palette.load("/nonexistent/ldconfig.ldr"),
            Err(PaletteError::Io(_))
        ));
    }
}
