//! Closed-form initial guesses: focal lengths from board homographies
//! (principal point fixed at the image centre) and per-view poses.

use chesscal_core::{Homography, ImageSize};
use log::debug;
use nalgebra::{Matrix2, Matrix3, Rotation3, Vector2, Vector3};

/// Focal lengths `(fx, fy)` from plane-to-image homographies.
///
/// With zero skew and a known principal point each homography gives two
/// linear constraints on `(1/fx^2, 1/fy^2)`. Falls back to the larger
/// image dimension when the views are degenerate (e.g. all fronto-parallel).
pub(crate) fn init_focal_lengths(homographies: &[Homography], cx: f64, cy: f64, size: ImageSize) -> (f64, f64) {
    let fallback = size.width.max(size.height).max(1) as f64;
    let centre = Matrix3::new(1.0, 0.0, -cx, 0.0, 1.0, -cy, 0.0, 0.0, 1.0);

    let mut ata = Matrix2::<f64>::zeros();
    let mut atb = Vector2::<f64>::zeros();
    for h in homographies {
        let hc = centre * h.h;
        let hc = hc / hc.norm();
        let (h0, h1, h2) = (hc[(0, 0)], hc[(1, 0)], hc[(2, 0)]);
        let (v0, v1, v2) = (hc[(0, 1)], hc[(1, 1)], hc[(2, 1)]);

        let rows = [
            (Vector2::new(h0 * v0, h1 * v1), -h2 * v2),
            (Vector2::new(h0 * h0 - v0 * v0, h1 * h1 - v1 * v1), -(h2 * h2 - v2 * v2)),
        ];
        for (a, b) in rows {
            ata += a * a.transpose();
            atb += a * b;
        }
    }

    let Some(ab) = ata.try_inverse().map(|inv| inv * atb) else {
        debug!("degenerate homographies, focal length falls back to {fallback}");
        return (fallback, fallback);
    };
    let fx = (1.0 / ab.x.abs()).sqrt();
    let fy = (1.0 / ab.y.abs()).sqrt();
    let plausible = |f: f64| f.is_finite() && f > 0.05 * fallback && f < 50.0 * fallback;
    if plausible(fx) && plausible(fy) {
        (fx, fy)
    } else {
        debug!("implausible focal estimate ({fx:.1}, {fy:.1}), falling back to {fallback}");
        (fallback, fallback)
    }
}

/// Board pose `(rvec, tvec)` from a homography and camera matrix.
///
/// The rotation is projected onto SO(3); the board is kept in front of
/// the camera.
pub(crate) fn pose_from_homography(k: &Matrix3<f64>, h: &Homography) -> Option<(Vector3<f64>, Vector3<f64>)> {
    let m = k.try_inverse()? * h.h;
    let c1: Vector3<f64> = m.column(0).into_owned();
    let c2: Vector3<f64> = m.column(1).into_owned();
    let c3: Vector3<f64> = m.column(2).into_owned();

    let norm = c1.norm() + c2.norm();
    if norm < 1e-12 {
        return None;
    }
    let mut lambda = 2.0 / norm;
    if (lambda * c3).z < 0.0 {
        lambda = -lambda;
    }

    let r1 = lambda * c1;
    let r2 = lambda * c2;
    let r3 = r1.cross(&r2);
    let t = lambda * c3;

    let r = Matrix3::from_columns(&[r1, r2, r3]);
    let svd = r.svd(true, true);
    let (u, v_t) = (svd.u?, svd.v_t?);
    let mut rot = u * v_t;
    if rot.determinant() < 0.0 {
        let mut u = u;
        u.column_mut(2).neg_mut();
        rot = u * v_t;
    }

    let rvec = Rotation3::from_matrix_unchecked(rot).scaled_axis();
    (rvec.iter().all(|v| v.is_finite()) && t.iter().all(|v| v.is_finite())).then_some((rvec, t))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn k() -> Matrix3<f64> {
        Matrix3::new(800.0, 0.0, 320.0, 0.0, 760.0, 240.0, 0.0, 0.0, 1.0)
    }

    fn homography(rvec: Vector3<f64>, t: Vector3<f64>) -> Homography {
        let r = Rotation3::new(rvec).into_inner();
        let rt = Matrix3::from_columns(&[r.column(0).into_owned(), r.column(1).into_owned(), t]);
        Homography::new(k() * rt)
    }

    #[test]
    fn focal_lengths_from_tilted_views() {
        let hs = [
            homography(Vector3::new(0.3, 0.0, 0.0), Vector3::new(-3.0, -2.0, 12.0)),
            homography(Vector3::new(0.0, 0.35, 0.1), Vector3::new(-2.0, -3.0, 14.0)),
            homography(Vector3::new(-0.2, 0.25, -0.1), Vector3::new(-4.0, -1.0, 13.0)),
        ];
        let (fx, fy) = init_focal_lengths(&hs, 320.0, 240.0, ImageSize::new(640, 480));
        assert_relative_eq!(fx, 800.0, max_relative = 1e-6);
        assert_relative_eq!(fy, 760.0, max_relative = 1e-6);
    }

    #[test]
    fn fronto_parallel_views_fall_back() {
        let hs = [homography(Vector3::zeros(), Vector3::new(0.0, 0.0, 10.0))];
        let (fx, fy) = init_focal_lengths(&hs, 320.0, 240.0, ImageSize::new(640, 480));
        assert_eq!((fx, fy), (640.0, 640.0));
    }

    #[test]
    fn pose_is_recovered_from_exact_homography() {
        let rvec = Vector3::new(0.1, -0.2, 0.05);
        let t = Vector3::new(-3.0, -2.5, 11.0);
        let h = homography(rvec, t);
        // Arbitrary, negative overall scale.
        let h = Homography::new(h.h * -0.37);

        let (r_est, t_est) = pose_from_homography(&k(), &h).expect("pose");
        assert_relative_eq!(r_est, rvec, epsilon = 1e-9);
        assert_relative_eq!(t_est, t, epsilon = 1e-9);
    }
}
