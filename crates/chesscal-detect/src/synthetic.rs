//! Synthetic chessboard views for tests and benchmarks.
//!
//! Boards live on the `z = 0` plane in board units, one unit per square,
//! with inner corner `(col, row)` at `(col, row, 0)`. The printed board has
//! `(width + 1) x (height + 1)` squares, a one-square white margin and is
//! rendered over a mid-gray background.

use chesscal_core::{BoardSize, ImageSize};
use image::GrayImage;
use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector3};
use rayon::prelude::*;

const BACKGROUND: u8 = 128;

/// Rigid board-to-camera transform, rotation given as a rotation vector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoardPose {
    pub rotation: Vector3<f64>,
    pub translation: Vector3<f64>,
}

impl BoardPose {
    pub fn new(rotation: Vector3<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Board-plane to normalized-image homography `[r1 r2 t]`.
    fn plane_homography(&self) -> Matrix3<f64> {
        let r = Rotation3::new(self.rotation).into_inner();
        let mut h = Matrix3::zeros();
        h.set_column(0, &r.column(0));
        h.set_column(1, &r.column(1));
        h.set_column(2, &self.translation);
        h
    }
}

/// Pinhole camera with up to three radial distortion terms.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyntheticCamera {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
}

impl SyntheticCamera {
    pub fn pinhole(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            k1: 0.0,
            k2: 0.0,
            k3: 0.0,
        }
    }

    pub fn with_radial(mut self, k1: f64, k2: f64, k3: f64) -> Self {
        self.k1 = k1;
        self.k2 = k2;
        self.k3 = k3;
        self
    }

    fn radial(&self, r2: f64) -> f64 {
        1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3))
    }

    /// Project a board-frame point into pixels.
    pub fn project(&self, pose: &BoardPose, p: Point3<f64>) -> Point2<f64> {
        let pc = Rotation3::new(pose.rotation) * p + pose.translation;
        let (x, y) = (pc.x / pc.z, pc.y / pc.z);
        let d = self.radial(x * x + y * y);
        Point2::new(self.fx * x * d + self.cx, self.fy * y * d + self.cy)
    }

    /// Ground-truth pixel positions of every inner corner, row-major.
    pub fn project_corners(&self, board: BoardSize, pose: &BoardPose) -> Vec<Point2<f32>> {
        (0..board.height)
            .flat_map(|r| (0..board.width).map(move |c| (c, r)))
            .map(|(c, r)| {
                let p = self.project(pose, Point3::new(c as f64, r as f64, 0.0));
                Point2::new(p.x as f32, p.y as f32)
            })
            .collect()
    }

    /// Normalized undistorted ray through pixel (`u`, `v`).
    fn unproject(&self, u: f64, v: f64) -> (f64, f64) {
        let xd = (u - self.cx) / self.fx;
        let yd = (v - self.cy) / self.fy;
        let (mut x, mut y) = (xd, yd);
        if self.k1 == 0.0 && self.k2 == 0.0 && self.k3 == 0.0 {
            return (x, y);
        }
        for _ in 0..10 {
            let d = self.radial(x * x + y * y);
            x = xd / d;
            y = yd / d;
        }
        (x, y)
    }

    /// Render the board seen from `pose`, averaging `supersample^2`
    /// samples per pixel. Pixel centres sit on integer coordinates.
    pub fn render_board(
        &self,
        board: BoardSize,
        pose: &BoardPose,
        size: ImageSize,
        supersample: u32,
    ) -> GrayImage {
        let width = size.width as usize;
        let Some(inv) = pose.plane_homography().try_inverse() else {
            return GrayImage::from_pixel(size.width, size.height, image::Luma([BACKGROUND]));
        };
        let ss = supersample.max(1);
        let weight = 1.0 / (ss * ss) as f64;

        let mut buf = vec![BACKGROUND; width * size.height as usize];
        if width > 0 {
            buf.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
                for (x, px) in row.iter_mut().enumerate() {
                    let mut acc = 0.0;
                    for sy in 0..ss {
                        for sx in 0..ss {
                            let u = x as f64 - 0.5 + (sx as f64 + 0.5) / ss as f64;
                            let v = y as f64 - 0.5 + (sy as f64 + 0.5) / ss as f64;
                            let (nx, ny) = self.unproject(u, v);
                            let b = inv * Vector3::new(nx, ny, 1.0);
                            acc += if b.z > 0.0 {
                                board_intensity(board, b.x / b.z, b.y / b.z)
                            } else {
                                BACKGROUND as f64
                            };
                        }
                    }
                    *px = (acc * weight).round().clamp(0.0, 255.0) as u8;
                }
            });
        }
        GrayImage::from_raw(size.width, size.height, buf).unwrap_or_else(|| {
            GrayImage::from_pixel(size.width, size.height, image::Luma([BACKGROUND]))
        })
    }
}

fn board_intensity(board: BoardSize, bx: f64, by: f64) -> f64 {
    let (w, h) = (board.width as f64, board.height as f64);
    if bx < -2.0 || by < -2.0 || bx >= w + 1.0 || by >= h + 1.0 {
        return BACKGROUND as f64;
    }
    if bx < -1.0 || by < -1.0 || bx >= w || by >= h {
        return 255.0;
    }
    let i = (bx.floor() as i64) + 1;
    let j = (by.floor() as i64) + 1;
    if (i + j) % 2 == 0 {
        0.0
    } else {
        255.0
    }
}
