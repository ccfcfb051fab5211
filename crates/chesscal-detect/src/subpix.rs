use crate::params::SubPixParams;
use chesscal_core::{sample_bilinear, GrayImageView};
use nalgebra::{Matrix2, Point2, Vector2};

/// Refine a saddle-point corner to sub-pixel accuracy.
///
/// Gradient-orthogonality criterion: for every pixel `p` in a Gaussian
/// weighted window around the corner `q`, the image gradient at `p` is
/// orthogonal to `p - q`. Each iteration solves the resulting 2x2 normal
/// equations and re-centres the window.
///
/// Returns `start` unchanged when the window carries no structure or the
/// estimate wanders further than `radius` pixels away.
pub fn refine_corner(
    img: &GrayImageView<'_>,
    start: Point2<f32>,
    radius: u32,
    params: &SubPixParams,
) -> Point2<f32> {
    if img.is_empty() || radius == 0 || !start.x.is_finite() || !start.y.is_finite() {
        return start;
    }
    let r = radius as i32;
    let rf = radius as f32;

    let mut q = start;
    for _ in 0..params.max_iterations {
        let mut g = Matrix2::<f32>::zeros();
        let mut b = Vector2::<f32>::zeros();

        for dy in -r..=r {
            for dx in -r..=r {
                let (ox, oy) = (dx as f32, dy as f32);
                let (x, y) = (q.x + ox, q.y + oy);
                let gx = 0.5 * (sample_bilinear(img, x + 1.0, y) - sample_bilinear(img, x - 1.0, y));
                let gy = 0.5 * (sample_bilinear(img, x, y + 1.0) - sample_bilinear(img, x, y - 1.0));
                let w = (-((ox / rf).powi(2) + (oy / rf).powi(2))).exp();

                let gxx = w * gx * gx;
                let gxy = w * gx * gy;
                let gyy = w * gy * gy;
                g[(0, 0)] += gxx;
                g[(0, 1)] += gxy;
                g[(1, 0)] += gxy;
                g[(1, 1)] += gyy;
                b.x += gxx * ox + gxy * oy;
                b.y += gxy * ox + gyy * oy;
            }
        }

        if g.determinant().abs() < 1e-6 {
            break;
        }
        let Some(step) = g.try_inverse().map(|inv| inv * b) else {
            break;
        };
        if !step.x.is_finite() || !step.y.is_finite() {
            return start;
        }

        q += step;
        if step.norm() < params.epsilon {
            break;
        }
    }

    if (q - start).norm() > rf {
        start
    } else {
        q
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// Anti-aliased X-junction with its saddle point at (`cx`, `cy`).
    fn saddle_image(size: usize, cx: f32, cy: f32) -> Vec<u8> {
        const SS: usize = 8;
        let mut data = vec![0u8; size * size];
        for y in 0..size {
            for x in 0..size {
                let mut acc = 0.0f32;
                for sy in 0..SS {
                    for sx in 0..SS {
                        let px = x as f32 - 0.5 + (sx as f32 + 0.5) / SS as f32;
                        let py = y as f32 - 0.5 + (sy as f32 + 0.5) / SS as f32;
                        if (px - cx) * (py - cy) < 0.0 {
                            acc += 255.0;
                        }
                    }
                }
                data[y * size + x] = (acc / (SS * SS) as f32).round() as u8;
            }
        }
        data
    }

    #[test]
    fn converges_to_the_true_saddle_point() {
        let data = saddle_image(40, 20.3, 19.6);
        let img = GrayImageView {
            width: 40,
            height: 40,
            data: &data,
        };
        let params = SubPixParams::default();
        let refined = refine_corner(&img, Point2::new(20.0, 20.0), 5, &params);
        assert_abs_diff_eq!(refined.x, 20.3, epsilon = 0.1);
        assert_abs_diff_eq!(refined.y, 19.6, epsilon = 0.1);
    }

    #[test]
    fn flat_window_returns_start() {
        let data = vec![128u8; 32 * 32];
        let img = GrayImageView {
            width: 32,
            height: 32,
            data: &data,
        };
        let start = Point2::new(16.0, 16.0);
        assert_eq!(
            refine_corner(&img, start, 4, &SubPixParams::default()),
            start
        );
    }
}
