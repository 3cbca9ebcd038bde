use nalgebra::{Matrix2, Matrix3, Point2, Vector2, Vector3};

/// `p -> linear * p + translation`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffineTransform {
    pub linear: Matrix2<f64>,
    pub translation: Vector2<f64>,
}

impl AffineTransform {
    /// The unique affine map taking each `src[i]` to `dst[i]`.
    ///
    /// Returns `None` when the source points are collinear.
    pub fn from_point_pairs(src: &[Point2<f64>; 3], dst: &[Point2<f64>; 3]) -> Option<Self> {
        let s = Matrix3::new(
            src[0].x, src[0].y, 1.0, //
            src[1].x, src[1].y, 1.0, //
            src[2].x, src[2].y, 1.0,
        );
        let s_inv = s.try_inverse()?;
        let row_x = s_inv * Vector3::new(dst[0].x, dst[1].x, dst[2].x);
        let row_y = s_inv * Vector3::new(dst[0].y, dst[1].y, dst[2].y);
        Some(Self {
            linear: Matrix2::new(row_x[0], row_x[1], row_y[0], row_y[1]),
            translation: Vector2::new(row_x[2], row_y[2]),
        })
    }

    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        Point2::from(self.linear * p.coords + self.translation)
    }

    /// Apply only the linear part.
    #[inline]
    pub fn apply_vector(&self, v: Vector2<f64>) -> Vector2<f64> {
        self.linear * v
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn maps_source_points_exactly() {
        let src = [
            Point2::new(0.0, -1.0),
            Point2::new(0.0, 0.0),
            Point2::new(-1.0, 0.0),
        ];
        let dst = [
            Point2::new(500.0, 100.0),
            Point2::new(500.0, 400.0),
            Point2::new(100.0, 400.0),
        ];
        let t = AffineTransform::from_point_pairs(&src, &dst).unwrap();
        for (s, d) in src.iter().zip(dst.iter()) {
            let m = t.apply(*s);
            assert_relative_eq!(m.x, d.x, epsilon = 1e-9);
            assert_relative_eq!(m.y, d.y, epsilon = 1e-9);
        }
    }

    #[test]
    fn collinear_source_is_rejected() {
        let src = [
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(2.0, 2.0),
        ];
        assert!(AffineTransform::from_point_pairs(&src, &src).is_none());
    }
}
