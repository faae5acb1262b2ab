// Transform utilities for Mat4
//
// Extends glam::Mat4 with the placement conventions of part references:
// building a matrix from the twelve file coefficients and clamping
// degenerate scale.

use glam::{Mat4, Vec3, Vec4};

/// Replacement for an exactly-zero diagonal scale entry.
pub const ZERO_SCALE_CLAMP: f32 = 0.001;

/// Extension trait for Mat4 to provide placement utilities
pub trait Mat4Ext {
    /// Build an affine matrix from a translation and a row-major 3x3 block
    /// `[a b c d e f g h i]`, so that `p' = M * p + t`.
    ///
    /// The basis columns end up as `(a, d, g)`, `(b, e, h)` and `(c, f, i)`.
    fn from_placement(translation: Vec3, rows: [f32; 9]) -> Self;

    /// Replace exactly-zero diagonal scale entries with [`ZERO_SCALE_CLAMP`].
    fn with_zero_scale_clamped(self) -> Self;
}

impl Mat4Ext for Mat4 {
    fn from_placement(translation: Vec3, rows: [f32; 9]) -> Self {
        let [a, b, c, d, e, f, g, h, i] = rows;
        Mat4::from_cols(
            Vec4::new(a, d, g, 0.0),
            Vec4::new(b, e, h, 0.0),
            Vec4::new(c, f, i, 0.0),
            translation.extend(1.0),
        )
    }

    fn with_zero_scale_clamped(mut self) -> Self {
        if self.x_axis.x == 0.0 {
            self.x_axis.x = ZERO_SCALE_CLAMP;
        }
        if self.y_axis.y == 0.0 {
            self.y_axis.y = ZERO_SCALE_CLAMP;
        }
        if self.z_axis.z == 0.0 {
            self.z_axis.z = ZERO_SCALE_CLAMP;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_identity() {
        let mat = Mat4::from_placement(Vec3::ZERO, [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        assert_eq!(mat, Mat4::IDENTITY);
    }

    #[test]
    fn test_placement_rows_map_points() {
        // x' = 2y, y' = -x, z' = z, then translate
        let mat = Mat4::from_placement(
            Vec3::new(10.0, 20.0, 30.0),
            [0.0, 2.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0, 1.0],
        );
        let p = mat.transform_point3(Vec3::new(1.0, 2.0, 3.0));

        assert_eq!(p, Vec3::new(14.0, 19.0, 33.0));
    }

    #[test]
    fn test_placement_columns_are_basis() {
        let mat = Mat4::from_placement(Vec3::ZERO, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);

        assert_eq!(mat.x_axis, Vec4::new(1.0, 4.0, 7.0, 0.0));
        assert_eq!(mat.y_axis, Vec4::new(2.0, 5.0, 8.0, 0.0));
        assert_eq!(mat.z_axis, Vec4::new(3.0, 6.0, 9.0, 0.0));
        assert_eq!(mat.w_axis, Vec4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_zero_scale_clamp() {
        let flat = Mat4::from_placement(Vec3::ZERO, [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0])
            .with_zero_scale_clamped();

        assert_eq!(flat.x_axis.x, 1.0);
        assert_eq!(flat.y_axis.y, ZERO_SCALE_CLAMP);
        assert_eq!(flat.z_axis.z, 1.0);
    }

    #[test]
    fn test_zero_scale_clamp_leaves_negative_scale() {
        let mirrored = Mat4::from_scale(Vec3::new(-1.0, 1.0, 1.0)).with_zero_scale_clamped();
        assert_eq!(mirrored.x_axis.x, -1.0);
    }
}
