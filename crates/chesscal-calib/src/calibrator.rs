use crate::intrinsics::{Intrinsics, RadialDistortion};
use crate::lm::{solve, NllsProblem};
use crate::params::CalibrationParams;
use crate::result::{CalibrationResult, ViewPose};
use crate::zhang::{init_focal_lengths, pose_from_homography};
use chesscal_core::{estimate_homography, CornerSet, Homography, ImageSize};
use chesscal_coverage::select;
use log::{debug, info, warn};
use nalgebra::{DMatrix, DVector, Point2, Point3, Vector3};
use rayon::prelude::*;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// `[fx, fy, cx, cy, k1, k2, k3]`
const INTRINSIC_PARAMS: usize = 7;
const POSE_PARAMS: usize = 6;

/// Calibrate from `corner_sets` with default solver settings.
///
/// `num_selections` of `None` or `Some(0)` fits every usable view;
/// otherwise at most that many views are chosen by image coverage first.
pub fn calibrate(corner_sets: &[CornerSet], num_selections: Option<usize>) -> CalibrationResult {
    CameraCalibrator::new(CalibrationParams {
        num_selections,
        ..Default::default()
    })
    .calibrate(corner_sets)
}

/// Calibrate from a single view, without any view selection.
pub fn calibrate_single(corner_set: &CornerSet) -> CalibrationResult {
    calibrate(std::slice::from_ref(corner_set), None)
}

/// Zhang-style calibration: homography based initial guess followed by a
/// joint Levenberg–Marquardt refinement of intrinsics, radial distortion
/// and every view's pose.
#[derive(Clone, Debug, Default)]
pub struct CameraCalibrator {
    params: CalibrationParams,
}

struct View {
    object: Vec<Point3<f64>>,
    image: Vec<Point2<f64>>,
}

impl View {
    fn from_corner_set(set: &CornerSet) -> Self {
        Self {
            object: set
                .object_corners()
                .iter()
                .map(|p| Point3::new(p.x as f64, p.y as f64, p.z as f64))
                .collect(),
            image: set
                .image_corners()
                .iter()
                .map(|p| Point2::new(p.x as f64, p.y as f64))
                .collect(),
        }
    }

    fn homography(&self) -> Option<Homography> {
        let plane: Vec<Point2<f64>> = self.object.iter().map(|p| Point2::new(p.x, p.y)).collect();
        estimate_homography(&plane, &self.image)
    }

    /// Residuals `projected - observed`, interleaved `[du, dv]` per point.
    fn residuals_into(&self, intr: &Intrinsics, pose: &[f64], out: &mut [f64]) {
        let rvec = Vector3::new(pose[0], pose[1], pose[2]);
        let tvec = Vector3::new(pose[3], pose[4], pose[5]);
        for (i, (obj, img)) in self.object.iter().zip(&self.image).enumerate() {
            let p = intr.project(&rvec, &tvec, obj);
            out[2 * i] = p.x - img.x;
            out[2 * i + 1] = p.y - img.y;
        }
    }

    /// L2 norm of the reprojection residual divided by the point count.
    fn normalized_error(&self, intr: &Intrinsics, pose: &[f64]) -> f64 {
        let mut r = vec![0.0; 2 * self.object.len()];
        self.residuals_into(intr, pose, &mut r);
        let norm = r.iter().map(|v| v * v).sum::<f64>().sqrt();
        norm / self.object.len().max(1) as f64
    }
}

fn unpack_intrinsics(x: &[f64]) -> Intrinsics {
    Intrinsics::new(x[0], x[1], x[2], x[3], RadialDistortion::new(x[4], x[5], x[6]))
}

/// Joint reprojection problem over all views.
struct BundleProblem<'a> {
    views: &'a [View],
    /// First residual row of each view.
    offsets: Vec<usize>,
    rows: usize,
}

impl<'a> BundleProblem<'a> {
    fn new(views: &'a [View]) -> Self {
        let mut offsets = Vec::with_capacity(views.len());
        let mut rows = 0;
        for v in views {
            offsets.push(rows);
            rows += 2 * v.object.len();
        }
        Self {
            views,
            offsets,
            rows,
        }
    }

    fn pose_slice<'x>(&self, x: &'x [f64], view: usize) -> &'x [f64] {
        let start = INTRINSIC_PARAMS + POSE_PARAMS * view;
        &x[start..start + POSE_PARAMS]
    }

    fn step(value: f64) -> f64 {
        1e-6 * (1.0 + value.abs())
    }
}

impl NllsProblem for BundleProblem<'_> {
    fn residuals(&self, x: &DVector<f64>) -> DVector<f64> {
        let xs = x.as_slice();
        let intr = unpack_intrinsics(xs);
        let mut r = DVector::zeros(self.rows);
        for (v, view) in self.views.iter().enumerate() {
            let len = 2 * view.object.len();
            let out = &mut r.as_mut_slice()[self.offsets[v]..self.offsets[v] + len];
            view.residuals_into(&intr, self.pose_slice(xs, v), out);
        }
        r
    }

    /// Central differences. Pose columns only touch their own view's rows.
    fn jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        let mut jac = DMatrix::zeros(self.rows, x.len());

        for j in 0..INTRINSIC_PARAMS {
            let h = Self::step(x[j]);
            let mut xp = x.clone();
            let mut xm = x.clone();
            xp[j] += h;
            xm[j] -= h;
            let col = (self.residuals(&xp) - self.residuals(&xm)) / (2.0 * h);
            jac.set_column(j, &col);
        }

        let xs = x.as_slice();
        let intr = unpack_intrinsics(xs);
        let blocks: Vec<DMatrix<f64>> = self
            .views
            .par_iter()
            .enumerate()
            .map(|(v, view)| {
                let len = 2 * view.object.len();
                let mut block = DMatrix::zeros(len, POSE_PARAMS);
                let base = self.pose_slice(xs, v);
                let mut rp = vec![0.0; len];
                let mut rm = vec![0.0; len];
                for k in 0..POSE_PARAMS {
                    let h = Self::step(base[k]);
                    let mut pp = [0.0; POSE_PARAMS];
                    pp.copy_from_slice(base);
                    let mut pm = pp;
                    pp[k] += h;
                    pm[k] -= h;
                    view.residuals_into(&intr, &pp, &mut rp);
                    view.residuals_into(&intr, &pm, &mut rm);
                    for i in 0..len {
                        block[(i, k)] = (rp[i] - rm[i]) / (2.0 * h);
                    }
                }
                block
            })
            .collect();

        for (v, block) in blocks.iter().enumerate() {
            let col = INTRINSIC_PARAMS + POSE_PARAMS * v;
            jac.view_mut((self.offsets[v], col), block.shape())
                .copy_from(block);
        }
        jac
    }
}

impl CameraCalibrator {
    pub fn new(params: CalibrationParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &CalibrationParams {
        &self.params
    }

    /// Usable views: valid sets sharing the image size of the first valid one.
    fn usable_sets(corner_sets: &[CornerSet]) -> (Vec<CornerSet>, ImageSize) {
        let mut size = None;
        let mut good = Vec::new();
        for set in corner_sets.iter().filter(|s| s.is_valid()) {
            let required = *size.get_or_insert(set.source_image_size());
            if set.source_image_size() != required {
                debug!(
                    "skipping view with image size {}x{}, expected {}x{}",
                    set.source_image_size().width,
                    set.source_image_size().height,
                    required.width,
                    required.height
                );
                continue;
            }
            good.push(set.clone());
        }
        (good, size.unwrap_or_default())
    }

    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self, corner_sets), fields(views = corner_sets.len())))]
    pub fn calibrate(&self, corner_sets: &[CornerSet]) -> CalibrationResult {
        let (mut sets, size) = Self::usable_sets(corner_sets);
        if let Some(k) = self.params.num_selections.filter(|&k| k > 0) {
            sets = select(&sets, k);
        }
        if sets.is_empty() || size.is_empty() {
            debug!("no usable views, calibration skipped");
            return CalibrationResult::default();
        }

        let mut views = Vec::with_capacity(sets.len());
        let mut homographies = Vec::with_capacity(sets.len());
        let mut used = Vec::with_capacity(sets.len());
        for set in sets {
            let view = View::from_corner_set(&set);
            match view.homography() {
                Some(h) => {
                    views.push(view);
                    homographies.push(h);
                    used.push(set);
                }
                None => warn!("dropping view: board homography could not be estimated"),
            }
        }
        if views.is_empty() {
            return CalibrationResult::default();
        }

        let (cx, cy) = (size.width as f64 / 2.0, size.height as f64 / 2.0);
        let (fx, fy) = init_focal_lengths(&homographies, cx, cy, size);
        let k0 = Intrinsics::new(fx, fy, cx, cy, RadialDistortion::default());
        debug!("initial intrinsics fx={fx:.2} fy={fy:.2} cx={cx:.2} cy={cy:.2}");

        let mut x0 = Vec::with_capacity(INTRINSIC_PARAMS + POSE_PARAMS * views.len());
        x0.extend_from_slice(&[fx, fy, cx, cy, 0.0, 0.0, 0.0]);
        for h in &homographies {
            let Some((r, t)) = pose_from_homography(&k0.k, h) else {
                warn!("board pose could not be initialized, calibration failed");
                return CalibrationResult::default();
            };
            x0.extend(r.iter().chain(t.iter()).copied());
        }

        let problem = BundleProblem::new(&views);
        let (x, report) = solve(&problem, DVector::from_vec(x0), &self.params.solver);
        debug!(
            "lm: {} evaluations, cost {:.4e} -> {:.4e}, converged={}",
            report.iterations, report.initial_cost, report.final_cost, report.converged
        );

        let xs = x.as_slice();
        if xs.iter().any(|v| !v.is_finite()) || xs[0] <= 0.0 || xs[1] <= 0.0 {
            warn!("calibration diverged");
            return CalibrationResult::default();
        }
        let intrinsics = unpack_intrinsics(xs);

        let per_view_errors: Vec<f64> = views
            .par_iter()
            .enumerate()
            .map(|(v, view)| view.normalized_error(&intrinsics, problem.pose_slice(xs, v)))
            .collect();
        let reprojection_error = per_view_errors.iter().sum::<f64>() / per_view_errors.len() as f64;

        let poses = (0..views.len())
            .map(|v| {
                let p = problem.pose_slice(xs, v);
                ViewPose {
                    rotation: Vector3::new(p[0], p[1], p[2]),
                    translation: Vector3::new(p[3], p[4], p[5]),
                }
            })
            .collect();

        info!(
            "calibrated from {} views: fx={:.2} fy={:.2} k=({:.4}, {:.4}, {:.4}), error {:.4} px",
            views.len(),
            intrinsics.fx(),
            intrinsics.fy(),
            intrinsics.distortion.k1,
            intrinsics.distortion.k2,
            intrinsics.distortion.k3,
            reprojection_error
        );

        CalibrationResult {
            intrinsics,
            reprojection_error,
            per_view_errors,
            poses,
            corner_sets: used,
            source_image_size: size,
            success: true,
        }
    }
}
