use log::warn;
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// Number of *inner* corners of a chessboard along each axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoardSize {
    pub width: u32,
    pub height: u32,
}

impl BoardSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Build from user-entered (possibly negative) dimensions.
    ///
    /// Negative values are normalized to their absolute value.
    pub fn from_signed(width: i32, height: i32) -> Self {
        Self {
            width: width.unsigned_abs(),
            height: height.unsigned_abs(),
        }
    }

    /// Total number of inner corners, `width * height`.
    #[inline]
    pub fn corner_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Row-major index of the corner at (`col`, `row`).
    #[inline]
    pub fn index(&self, col: u32, row: u32) -> usize {
        debug_assert!(col < self.width && row < self.height);
        row as usize * self.width as usize + col as usize
    }
}

/// Image dimensions in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width as f64 * self.height as f64
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Chessboard corners detected in one image.
///
/// `object_corners` is always the full synthetic board grid `(col, row, 0)`
/// in row-major order. `image_corners` holds one point per object corner
/// when the set is valid and is empty otherwise.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CornerSet {
    board_size: BoardSize,
    image_corners: Vec<Point2<f32>>,
    object_corners: Vec<Point3<f32>>,
    source_image_size: ImageSize,
    valid: bool,
}

impl CornerSet {
    /// An invalid (not detected) corner set for the given board.
    pub fn invalid(board_size: BoardSize) -> Self {
        Self {
            board_size,
            image_corners: Vec::new(),
            object_corners: object_grid(board_size),
            source_image_size: ImageSize::default(),
            valid: false,
        }
    }

    /// A valid corner set from a successful detection.
    ///
    /// `image_corners` must be row-major and contain exactly
    /// `board_size.corner_count()` points; anything else yields an invalid set.
    pub fn from_detection(
        board_size: BoardSize,
        image_corners: Vec<Point2<f32>>,
        source_image_size: ImageSize,
    ) -> Self {
        let expected = board_size.corner_count();
        if expected == 0 || image_corners.len() != expected {
            warn!(
                "rejecting detection with {} corners for a {}x{} board",
                image_corners.len(),
                board_size.width,
                board_size.height
            );
            return Self::invalid(board_size);
        }
        Self {
            board_size,
            image_corners,
            object_corners: object_grid(board_size),
            source_image_size,
            valid: true,
        }
    }

    #[inline]
    pub fn board_size(&self) -> BoardSize {
        self.board_size
    }

    #[inline]
    pub fn image_corners(&self) -> &[Point2<f32>] {
        &self.image_corners
    }

    #[inline]
    pub fn object_corners(&self) -> &[Point3<f32>] {
        &self.object_corners
    }

    /// Size of the image the corners were found in. Meaningless when invalid.
    #[inline]
    pub fn source_image_size(&self) -> ImageSize {
        self.source_image_size
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Copy of this set with every image corner passed through `f`.
    ///
    /// Validity, board and image size are preserved.
    pub fn map_image_corners<F>(&self, f: F) -> Self
    where
        F: FnMut(&Point2<f32>) -> Point2<f32>,
    {
        Self {
            image_corners: self.image_corners.iter().map(f).collect(),
            ..self.clone()
        }
    }

    /// Border ring of the detected grid.
    ///
    /// Traversal: top row left to right, right column top to bottom, bottom
    /// row right to left, left column bottom to top. Each grid corner appears
    /// once, so a `W x H` board (both >= 2) yields `2W + 2H - 4` points.
    /// A board with a single row or column degenerates to that line.
    /// Returns an empty vector when the image corners are incomplete.
    pub fn outer_boundary(&self) -> Vec<Point2<f32>> {
        let w = self.board_size.width as usize;
        let h = self.board_size.height as usize;
        if w == 0 || h == 0 || self.image_corners.len() < w * h {
            return Vec::new();
        }
        let at = |col: usize, row: usize| self.image_corners[row * w + col];

        let mut ring = Vec::with_capacity(2 * (w + h));
        ring.extend((0..w).map(|c| at(c, 0)));
        ring.extend((1..h).map(|r| at(w - 1, r)));
        if h > 1 {
            ring.extend((0..w - 1).rev().map(|c| at(c, h - 1)));
        }
        if w > 1 {
            ring.extend((1..h - 1).rev().map(|r| at(0, r)));
        }
        ring
    }
}

fn object_grid(board_size: BoardSize) -> Vec<Point3<f32>> {
    (0..board_size.height)
        .flat_map(|row| (0..board_size.width).map(move |col| Point3::new(col as f32, row as f32, 0.0)))
        .collect()
}
