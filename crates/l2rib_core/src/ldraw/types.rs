//! LDraw record types.
//!
//! These types represent parsed records before they are translated.

use std::fmt;

use l2rib_math::{Mat4, Vec3};

/// A normalized part identifier.
///
/// Lower-cased, slash separated and free of spaces, so that the same part
/// spelled `Parts\3001.DAT` or `parts/3001.dat` maps to one cache key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartId(String);

/// Prefix that selects the high resolution primitive folder.
const RESOLUTION_PREFIX: &str = "48/";

impl PartId {
    /// Normalize a raw identifier as it appears in a file.
    pub fn normalize(raw: &str) -> Self {
        let id = raw
            .chars()
            .filter(|c| *c != ' ' && *c != '\r')
            .map(|c| if c == '\\' { '/' } else { c.to_ascii_lowercase() })
            .collect();
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Identifier with a leading `48/` removed.
    ///
    /// The high resolution folder is first on the search path, so the
    /// prefix adds nothing to lookup and would only split the cache.
    pub fn without_resolution_prefix(&self) -> PartId {
        match self.0.strip_prefix(RESOLUTION_PREFIX) {
            Some(rest) if !rest.is_empty() => PartId(rest.to_string()),
            _ => self.clone(),
        }
    }

    /// Relative path of the translated archive: the extension is replaced
    /// by `rib`, or added when there is none.
    pub fn archive_name(&self) -> String {
        let stem_start = self.0.rfind('/').map_or(0, |i| i + 1);
        match self.0[stem_start..].rfind('.') {
            Some(dot) => format!("{}.rib", &self.0[..stem_start + dot]),
            None => format!("{}.rib", self.0),
        }
    }
}

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Colour field of a geometry record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColourToken {
    /// An index into the palette.
    Index(u32),

    /// Direct colour in the `0x2RRGGBB` / `0x3RRGGBB` extended syntax.
    Direct(u32),
}

/// A parsed meta command (kind 0).
#[derive(Clone, Debug, PartialEq)]
pub enum Meta {
    /// `0 FILE <name>`: start of a sub-document
    File(PartId),

    /// `0 !COLOUR ...`: the remainder after the keyword
    Colour(String),

    /// `0 WRITE <text>` or `0 PRINT <text>`
    Write(String),

    /// Any other comment
    Comment,
}

/// A part reference (kind 1).
#[derive(Clone, Debug, PartialEq)]
pub struct PartRef {
    pub colour: ColourToken,

    /// Placement with the zero-scale clamp already applied
    pub matrix: Mat4,

    pub part: PartId,
}

/// A line segment (kind 2).
#[derive(Clone, Debug, PartialEq)]
pub struct LineSeg {
    pub colour: ColourToken,
    pub points: [Vec3; 2],
}

/// A triangle (kind 3).
#[derive(Clone, Debug, PartialEq)]
pub struct Triangle {
    pub colour: ColourToken,
    pub points: [Vec3; 3],
}

/// A quadrilateral (kind 4).
#[derive(Clone, Debug, PartialEq)]
pub struct Quad {
    pub colour: ColourToken,
    pub points: [Vec3; 4],
}

/// An optional line (kind 5).
///
/// Only `points` are segment geometry; `controls` are the two test points
/// the render-time line plugin uses to decide visibility.
#[derive(Clone, Debug, PartialEq)]
pub struct OptionalLine {
    pub colour: ColourToken,
    pub points: [Vec3; 2],
    pub controls: [Vec3; 2],
}

impl OptionalLine {
    /// Endpoints followed by control points.
    pub fn all_points(&self) -> [Vec3; 4] {
        [self.points[0], self.points[1], self.controls[0], self.controls[1]]
    }
}

/// One parsed LDraw record.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Meta(Meta),
    PartRef(PartRef),
    Line(LineSeg),
    Triangle(Triangle),
    Quad(Quad),
    OptionalLine(OptionalLine),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_case_and_separators() {
        let id = PartId::normalize("S\\3001S01.DAT");
        assert_eq!(id.as_str(), "s/3001s01.dat");
    }

    #[test]
    fn test_normalize_strips_spaces_and_cr() {
        let id = PartId::normalize(" My Model.ldr\r");
        assert_eq!(id.as_str(), "mymodel.ldr");
    }

    #[test]
    fn test_archive_name() {
        assert_eq!(PartId::normalize("3001.dat").archive_name(), "3001.rib");
        assert_eq!(PartId::normalize("s/3001s01.dat").archive_name(), "s/3001s01.rib");
        assert_eq!(PartId::normalize("v1.0/noext").archive_name(), "v1.0/noext.rib");
    }

    #[test]
    fn test_resolution_prefix() {
        let id = PartId::normalize("48\\4-4cyli.dat");
        assert_eq!(id.without_resolution_prefix().as_str(), "4-4cyli.dat");

        let plain = PartId::normalize("4-4cyli.dat");
        assert_eq!(plain.without_resolution_prefix(), plain);
    }

    #[test]
    fn test_optional_line_points() {
        let line = OptionalLine {
            colour: ColourToken::Index(24),
            points: [Vec3::ZERO, Vec3::X],
            controls: [Vec3::Y, Vec3::Z],
        };
        assert_eq!(line.all_points(), [Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z]);
    }
}
