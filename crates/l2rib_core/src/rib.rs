//! RIB statement helpers shared by the batcher and the translator.

use std::fmt::Write;

use l2rib_math::{Bound, Mat4, Vec3};

/// Write `ConcatTransform [...]` with the matrix in column-major order.
pub fn write_matrix(out: &mut String, matrix: &Mat4) {
    out.push_str("ConcatTransform [");
    for value in matrix.to_cols_array() {
        let _ = write!(out, " {value}");
    }
    out.push_str("]\n");
}

/// Write the leading bound declaration of a unit, if it has geometry.
pub fn write_bound_declaration(out: &mut String, bound: &Bound) {
    if !bound.is_empty() {
        let _ = writeln!(out, "Bound {bound}");
    }
}

/// Reference a previously produced archive.
///
/// The deferred form needs a bound; units without geometry are always
/// read eagerly.
pub fn write_archive_reference(out: &mut String, archive: &str, bound: &Bound, delayed: bool) {
    if delayed && !bound.is_empty() {
        let _ = writeln!(
            out,
            "Procedural \"DelayedReadArchive\" [\"{archive}\"] [{bound}]"
        );
    } else {
        let _ = writeln!(out, "ReadArchive \"{archive}\"");
    }
}

/// Write points as a flat, space separated coordinate list.
pub fn write_points(out: &mut String, points: &[Vec3]) {
    for p in points {
        let _ = write!(out, " {} {} {}", p.x, p.y, p.z);
    }
}
