use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

/// Radial lens distortion `1 + k1 r^2 + k2 r^4 + k3 r^6`. Tangential terms
/// are not modelled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RadialDistortion {
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
}

impl RadialDistortion {
    pub fn new(k1: f64, k2: f64, k3: f64) -> Self {
        Self { k1, k2, k3 }
    }

    /// Radial scale factor for a normalized radius squared `r2`.
    #[inline]
    pub fn factor(&self, r2: f64) -> f64 {
        1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3))
    }

    /// Apply distortion to a normalized image point.
    #[inline]
    pub fn distort(&self, x: f64, y: f64) -> (f64, f64) {
        let d = self.factor(x * x + y * y);
        (x * d, y * d)
    }

    /// Remove distortion from a normalized point by fixed-point iteration.
    pub fn undistort(&self, xd: f64, yd: f64) -> (f64, f64) {
        let (mut x, mut y) = (xd, yd);
        for _ in 0..20 {
            let d = self.factor(x * x + y * y);
            if d.abs() < 1e-12 || !d.is_finite() {
                break;
            }
            let (nx, ny) = (xd / d, yd / d);
            let moved = (nx - x).abs() + (ny - y).abs();
            x = nx;
            y = ny;
            if moved < 1e-12 {
                break;
            }
        }
        (x, y)
    }
}

/// Camera matrix plus radial distortion.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    /// `[[fx, 0, cx], [0, fy, cy], [0, 0, 1]]`
    pub k: Matrix3<f64>,
    pub distortion: RadialDistortion,
}

impl Default for Intrinsics {
    fn default() -> Self {
        Self {
            k: Matrix3::identity(),
            distortion: RadialDistortion::default(),
        }
    }
}

impl Intrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64, distortion: RadialDistortion) -> Self {
        Self {
            k: Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0),
            distortion,
        }
    }

    #[inline]
    pub fn fx(&self) -> f64 {
        self.k[(0, 0)]
    }

    #[inline]
    pub fn fy(&self) -> f64 {
        self.k[(1, 1)]
    }

    #[inline]
    pub fn cx(&self) -> f64 {
        self.k[(0, 2)]
    }

    #[inline]
    pub fn cy(&self) -> f64 {
        self.k[(1, 2)]
    }

    /// Distortion in the common 5-slot layout `[k1, k2, p1, p2, k3]`
    /// with both tangential slots zero.
    pub fn dist_vector(&self) -> [f64; 5] {
        let d = self.distortion;
        [d.k1, d.k2, 0.0, 0.0, d.k3]
    }

    /// Normalized camera coordinates to pixels, distortion applied.
    #[inline]
    pub fn normalized_to_pixel(&self, x: f64, y: f64) -> Point2<f64> {
        let (xd, yd) = self.distortion.distort(x, y);
        Point2::new(self.fx() * xd + self.cx(), self.fy() * yd + self.cy())
    }

    /// Pixels to undistorted normalized camera coordinates.
    pub fn pixel_to_normalized(&self, p: Point2<f64>) -> (f64, f64) {
        let xd = (p.x - self.cx()) / self.fx();
        let yd = (p.y - self.cy()) / self.fy();
        self.distortion.undistort(xd, yd)
    }

    /// Project a board point seen from the pose `(rvec, tvec)`.
    pub fn project(&self, rvec: &Vector3<f64>, tvec: &Vector3<f64>, p: &Point3<f64>) -> Point2<f64> {
        let pc = Rotation3::new(*rvec) * p + tvec;
        self.normalized_to_pixel(pc.x / pc.z, pc.y / pc.z)
    }

    /// Remove lens distortion from a pixel, keeping the same camera matrix.
    pub fn undistort_pixel(&self, p: Point2<f64>) -> Point2<f64> {
        let (x, y) = self.pixel_to_normalized(p);
        Point2::new(self.fx() * x + self.cx(), self.fy() * y + self.cy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn dist_vector_leaves_tangential_slots_empty() {
        let k = Intrinsics::new(1.0, 1.0, 0.0, 0.0, RadialDistortion::new(0.1, -0.2, 0.03));
        assert_eq!(k.dist_vector(), [0.1, -0.2, 0.0, 0.0, 0.03]);
    }

    #[test]
    fn undistortion_inverts_distortion() {
        let d = RadialDistortion::new(-0.25, 0.08, -0.01);
        let (xd, yd) = d.distort(0.3, -0.2);
        let (x, y) = d.undistort(xd, yd);
        assert_relative_eq!(x, 0.3, epsilon = 1e-9);
        assert_relative_eq!(y, -0.2, epsilon = 1e-9);
    }

    #[test]
    fn projection_of_point_on_optical_axis_hits_principal_point() {
        let k = Intrinsics::new(500.0, 480.0, 320.0, 240.0, RadialDistortion::new(0.2, 0.0, 0.0));
        let p = k.project(&Vector3::zeros(), &Vector3::new(0.0, 0.0, 5.0), &Point3::origin());
        assert_relative_eq!(p.x, 320.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 240.0, epsilon = 1e-12);

        let p = k.project(&Vector3::zeros(), &Vector3::new(0.0, 0.0, 5.0), &Point3::new(1.0, 0.0, 0.0));
        // x = 0.2, radial = 1 + 0.2 * 0.04
        assert_relative_eq!(p.x, 320.0 + 500.0 * 0.2 * 1.008, epsilon = 1e-9);
    }

    #[test]
    fn undistort_pixel_is_identity_without_distortion() {
        let k = Intrinsics::new(600.0, 600.0, 300.0, 200.0, RadialDistortion::default());
        let p = Point2::new(412.5, 17.25);
        let u = k.undistort_pixel(p);
        assert_relative_eq!(u.x, p.x, epsilon = 1e-9);
        assert_relative_eq!(u.y, p.y, epsilon = 1e-9);
    }
}
