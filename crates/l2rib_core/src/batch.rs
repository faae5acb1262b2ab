//! Batching of same-colour geometry runs.
//!
//! Consecutive lines of one colour and kind become a single call to the
//! render-time line procedural; consecutive faces of one colour become a
//! single `PointsPolygons`. A colour change flushes the pending run, so
//! runs are never reordered across colours.

use std::collections::BTreeSet;
use std::fmt::Write;

use l2rib_math::{Bound, OrdPoint, Vec3};

use crate::ldraw::ColourToken;
use crate::palette::Palette;
use crate::rib::write_points;

/// Edge vectors shorter than this are treated as degenerate.
const DEGENERATE_LENGTH: f32 = 1e-6;

/// Solid lines versus optional (conditional) lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind {
    Solid,
    Optional,
}

impl LineKind {
    /// Type code understood by the line procedural.
    fn code(self) -> u32 {
        match self {
            LineKind::Solid => 1,
            LineKind::Optional => 2,
        }
    }

    /// Points per record.
    fn stride(self) -> usize {
        match self {
            LineKind::Solid => 2,
            LineKind::Optional => 4,
        }
    }
}

#[derive(Clone, Debug)]
struct LineBatch {
    colour: ColourToken,
    kind: LineKind,
    points: Vec<Vec3>,
}

#[derive(Clone, Debug)]
struct FaceBatch {
    colour: ColourToken,
    sizes: Vec<u32>,
    points: Vec<Vec3>,
}

/// Pending line and face runs of one unit being translated.
#[derive(Clone, Debug, Default)]
pub struct GeometryBatcher {
    lines: Option<LineBatch>,
    faces: Option<FaceBatch>,
}

impl GeometryBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_none() && self.faces.is_none()
    }

    /// Add a solid segment.
    pub fn push_segment(
        &mut self,
        out: &mut String,
        palette: &mut Palette,
        colour: ColourToken,
        points: [Vec3; 2],
    ) {
        self.push_lines(out, palette, colour, LineKind::Solid, &points);
    }

    /// Add an optional line: two endpoints followed by two control points.
    pub fn push_optional(
        &mut self,
        out: &mut String,
        palette: &mut Palette,
        colour: ColourToken,
        points: [Vec3; 4],
    ) {
        self.push_lines(out, palette, colour, LineKind::Optional, &points);
    }

    fn push_lines(
        &mut self,
        out: &mut String,
        palette: &mut Palette,
        colour: ColourToken,
        kind: LineKind,
        points: &[Vec3],
    ) {
        if self
            .lines
            .as_ref()
            .is_some_and(|run| run.colour != colour || run.kind != kind)
        {
            self.flush_lines(out, palette);
        }
        self.lines
            .get_or_insert_with(|| LineBatch {
                colour,
                kind,
                points: Vec::new(),
            })
            .points
            .extend_from_slice(points);
    }

    pub fn push_triangle(
        &mut self,
        out: &mut String,
        palette: &mut Palette,
        colour: ColourToken,
        points: [Vec3; 3],
    ) {
        self.push_face(out, palette, colour, &points);
    }

    /// Add a quad, swapping the last two vertices of a bowtie.
    pub fn push_quad(
        &mut self,
        out: &mut String,
        palette: &mut Palette,
        colour: ColourToken,
        points: [Vec3; 4],
    ) {
        self.push_face(out, palette, colour, &simple_quad_order(points));
    }

    fn push_face(
        &mut self,
        out: &mut String,
        palette: &mut Palette,
        colour: ColourToken,
        points: &[Vec3],
    ) {
        if self.faces.as_ref().is_some_and(|run| run.colour != colour) {
            self.flush_faces(out, palette);
        }
        let run = self.faces.get_or_insert_with(|| FaceBatch {
            colour,
            sizes: Vec::new(),
            points: Vec::new(),
        });
        run.sizes.push(points.len() as u32);
        run.points.extend_from_slice(points);
    }

    /// Flush both pending runs, lines first.
    pub fn flush(&mut self, out: &mut String, palette: &mut Palette) {
        self.flush_lines(out, palette);
        self.flush_faces(out, palette);
    }

    /// Emit the pending line run as a call to the line procedural.
    ///
    /// The argument string is `<count> <type> <x y z>...`, with type 1 for
    /// solid segments (2 points each) and 2 for optional lines (endpoints
    /// then control points, 4 points each).
    pub fn flush_lines(&mut self, out: &mut String, palette: &mut Palette) {
        let Some(run) = self.lines.take() else {
            return;
        };
        let bound = Bound::from_points(run.points.iter().copied());

        out.push_str("IfBegin \"$user:l2ribLines == 1\"\n");
        out.push_str("AttributeBegin\n");
        // Lines should never be visible to ray tracing
        out.push_str(
            "Attribute \"visibility\" \"int trace\" [0] \"string transmission\" [\"transparent\"]\n",
        );
        palette.write_colour(out, run.colour);
        let _ = write!(
            out,
            "Procedural \"DynamicLoad\" [\"line.rll\" \"{} {}",
            run.points.len() / run.kind.stride(),
            run.kind.code()
        );
        write_points(out, &run.points);
        let _ = writeln!(out, "\"] [ {bound}]");
        out.push_str("AttributeEnd\n");
        out.push_str("IfEnd\n");
    }

    /// Emit the pending face run as one polygon mesh.
    pub fn flush_faces(&mut self, out: &mut String, palette: &mut Palette) {
        let Some(run) = self.faces.take() else {
            return;
        };

        out.push_str("AttributeBegin\n");
        palette.write_colour(out, run.colour);
        out.push_str("PointsPolygons [");
        for size in &run.sizes {
            let _ = write!(out, " {size}");
        }
        out.push_str("]\n[");
        for index in 0..run.points.len() {
            let _ = write!(out, " {index}");
        }
        out.push_str("]\n\"P\" [");
        write_points(out, &run.points);
        out.push_str("]\n");
        out.push_str("AttributeEnd\n");
    }
}

/// Vertex order that keeps a quad from self-intersecting.
pub fn simple_quad_order(points: [Vec3; 4]) -> [Vec3; 4] {
    let [p1, p2, p3, p4] = points;
    if is_bowtie(p1, p2, p3, p4) {
        [p1, p2, p4, p3]
    } else {
        points
    }
}

/// Test whether the quad `p1 p2 p3 p4` is self-intersecting.
///
/// The points are assumed roughly coplanar. `p4` is projected onto the
/// plane through the first three points; the quad is a bowtie when `p2`
/// and the projected `p4` fall on the same side of the plane through the
/// diagonal `p1 p3` perpendicular to the quad.
///
/// Degenerate input (repeated points, near-zero edges, colinear first
/// three points) is never reported as a bowtie.
pub fn is_bowtie(p1: Vec3, p2: Vec3, p3: Vec3, p4: Vec3) -> bool {
    let distinct: BTreeSet<OrdPoint> = [p1, p2, p3, p4].into_iter().map(OrdPoint).collect();
    if distinct.len() < 4 {
        return false;
    }

    let e1 = p2 - p1;
    let e2 = p3 - p1;
    if e1.length() < DEGENERATE_LENGTH || e2.length() < DEGENERATE_LENGTH {
        return false;
    }
    let v1 = e1.normalize();
    let v2 = e2.normalize();

    let n = v1.cross(v2);
    if n.length() < DEGENERATE_LENGTH {
        return false;
    }
    let n = n.normalize();

    // Make all four points coplanar
    let p4p = p4 - (p4 - p1).dot(n) * n;

    let n2 = n.cross(v2);
    let d = n2.dot(p1);
    (n2.dot(p2) > d) == (n2.dot(p4p) > d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::ColourDefinition;

    fn palette() -> Palette {
        let mut palette = Palette::new();
        palette.define(ColourDefinition::new("Red", 4, Vec3::new(1.0, 0.0, 0.0)));
        palette.define(ColourDefinition::new("Blue", 1, Vec3::new(0.0, 0.0, 1.0)));
        palette
    }

    fn segments_cross(a: Vec3, b: Vec3, c: Vec3, d: Vec3) -> bool {
        // 2D test in the XY plane
        let orient = |p: Vec3, q: Vec3, r: Vec3| (q.x - p.x) * (r.y - p.y) - (q.y - p.y) * (r.x - p.x);
        let d1 = orient(a, b, c);
        let d2 = orient(a, b, d);
        let d3 = orient(c, d, a);
        let d4 = orient(c, d, b);
        (d1 > 0.0) != (d2 > 0.0) && (d3 > 0.0) != (d4 > 0.0) && d1 != 0.0 && d2 != 0.0
    }

    fn is_simple(q: [Vec3; 4]) -> bool {
        !segments_cross(q[0], q[1], q[2], q[3]) && !segments_cross(q[1], q[2], q[3], q[0])
    }

    #[test]
    fn test_convex_quad_is_not_bowtie() {
        let square = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        assert!(!is_bowtie(square[0], square[1], square[2], square[3]));
        assert_eq!(simple_quad_order(square), square);
    }

    #[test]
    fn test_bowtie_is_corrected() {
        let bowtie = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
        ];
        assert!(!is_simple(bowtie));
        assert!(is_bowtie(bowtie[0], bowtie[1], bowtie[2], bowtie[3]));

        let fixed = simple_quad_order(bowtie);
        assert_eq!(fixed, [bowtie[0], bowtie[1], bowtie[3], bowtie[2]]);
        assert!(is_simple(fixed));
    }

    #[test]
    fn test_bowtie_out_of_plane_fourth_point() {
        // Fourth point lifted off the plane still classifies by projection
        let bowtie = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(0.0, 2.0, 0.0),
            Vec3::new(2.0, 2.0, 0.3),
        ];
        assert!(is_bowtie(bowtie[0], bowtie[1], bowtie[2], bowtie[3]));
    }

    #[test]
    fn test_degenerate_quads_are_left_alone() {
        let repeated = [Vec3::ZERO, Vec3::X, Vec3::X, Vec3::Y];
        assert_eq!(simple_quad_order(repeated), repeated);

        let colinear = [Vec3::ZERO, Vec3::X, Vec3::X * 2.0, Vec3::Y];
        assert!(!is_bowtie(colinear[0], colinear[1], colinear[2], colinear[3]));

        let tiny = [
            Vec3::ZERO,
            Vec3::splat(1e-8),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
        ];
        assert!(!is_bowtie(tiny[0], tiny[1], tiny[2], tiny[3]));
    }

    #[test]
    fn test_same_colour_faces_share_a_batch() {
        let mut palette = palette();
        let mut batcher = GeometryBatcher::new();
        let mut out = String::new();
        let red = ColourToken::Index(4);

        batcher.push_triangle(&mut out, &mut palette, red, [Vec3::ZERO, Vec3::X, Vec3::Y]);
        batcher.push_quad(
            &mut out,
            &mut palette,
            red,
            [Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y],
        );
        assert!(out.is_empty());

        batcher.flush(&mut out, &mut palette);
        assert_eq!(out.matches("PointsPolygons").count(), 1);
        assert!(out.contains("PointsPolygons [ 3 4]\n[ 0 1 2 3 4 5 6]\n"));
        assert!(batcher.is_empty());
    }

    #[test]
    fn test_colour_change_flushes_faces() {
        let mut palette = palette();
        let mut batcher = GeometryBatcher::new();
        let mut out = String::new();

        let tri = [Vec3::ZERO, Vec3::X, Vec3::Y];
        batcher.push_triangle(&mut out, &mut palette, ColourToken::Index(4), tri);
        batcher.push_triangle(&mut out, &mut palette, ColourToken::Index(1), tri);
        assert!(out.contains("# Red"));
        assert!(!out.contains("# Blue"));

        batcher.flush(&mut out, &mut palette);
        let red = out.find("# Red").unwrap();
        let blue = out.find("# Blue").unwrap();
        assert!(red < blue);
    }

    #[test]
    fn test_line_kind_change_flushes_lines() {
        let mut palette = palette();
        let mut batcher = GeometryBatcher::new();
        let mut out = String::new();
        let red = ColourToken::Index(4);

        batcher.push_segment(&mut out, &mut palette, red, [Vec3::ZERO, Vec3::X]);
        batcher.push_segment(&mut out, &mut palette, red, [Vec3::X, Vec3::Y]);
        batcher.push_optional(&mut out, &mut palette, red, [Vec3::ZERO, Vec3::Z, Vec3::X, Vec3::Y]);
        assert!(out.contains("[\"line.rll\" \"2 1 0 0 0 1 0 0 1 0 0 0 1 0\"] [ 0 1 0 1 0 0]\n"));

        batcher.flush(&mut out, &mut palette);
        assert!(out.contains("[\"line.rll\" \"1 2 0 0 0 0 0 1 1 0 0 0 1 0\"]"));
        assert_eq!(out.matches("IfBegin \"$user:l2ribLines == 1\"").count(), 2);
    }

    #[test]
    fn test_flush_empty_writes_nothing() {
        let mut palette = palette();
        let mut batcher = GeometryBatcher::new();
        let mut out = String::new();
        batcher.flush(&mut out, &mut palette);
        assert!(out.is_empty());
    }
}
