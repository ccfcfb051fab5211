use crate::candidates::{extract_candidates, is_saddle, normalize_contrast};
use crate::grid::assemble_board;
use crate::params::DetectorParams;
use crate::subpix::refine_corner;
use chesscal_core::{BoardSize, CornerSet, GrayImageView, ImageSize};
use image::{DynamicImage, GrayImage};
use log::{debug, info};
use rayon::prelude::*;
use std::borrow::Cow;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Chessboard inner-corner detector.
///
/// Detection never fails loudly: anything short of a complete, unambiguous
/// board yields [`CornerSet::invalid`].
#[derive(Clone, Debug, Default)]
pub struct CornerDetector {
    params: DetectorParams,
}

impl CornerDetector {
    pub fn new(params: DetectorParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &DetectorParams {
        &self.params
    }

    /// Find the `board_width x board_height` inner corners in `image`.
    ///
    /// Negative dimensions are taken by absolute value.
    pub fn detect(&self, image: &DynamicImage, board_width: i32, board_height: i32) -> CornerSet {
        let board = BoardSize::from_signed(board_width, board_height);
        let gray = match image {
            DynamicImage::ImageLuma8(g) => Cow::Borrowed(g),
            other => Cow::Owned(other.to_luma8()),
        };
        self.detect_gray(&gray, board)
    }

    /// Detection on an already grayscale image.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "debug",
            skip(self, img),
            fields(width = img.width(), height = img.height(), board_w = board.width, board_h = board.height)
        )
    )]
    pub fn detect_gray(&self, img: &GrayImage, board: BoardSize) -> CornerSet {
        let size = ImageSize::new(img.width(), img.height());
        if size.is_empty() || board.width < 2 || board.height < 2 {
            debug!(
                "skipping detection: image {}x{}, board {}x{}",
                size.width, size.height, board.width, board.height
            );
            return CornerSet::invalid(board);
        }

        let normalized;
        let work = if self.params.normalize_image {
            normalized = normalize_contrast(img);
            &normalized
        } else {
            img
        };

        let view = GrayImageView {
            width: work.width() as usize,
            height: work.height() as usize,
            data: work.as_raw(),
        };
        let mut candidates = extract_candidates(work, &self.params);
        let raw_count = candidates.len();
        candidates.retain(|c| is_saddle(&view, c.position, self.params.saddle_radius));
        debug!("{} ChESS candidates, {} saddle points", raw_count, candidates.len());
        if candidates.len() < board.corner_count() {
            debug!(
                "only {} candidates for {} board corners",
                candidates.len(),
                board.corner_count()
            );
            return CornerSet::invalid(board);
        }

        let Some(assembled) = assemble_board(
            &candidates,
            board,
            self.params.growth_tolerance,
            self.params.max_seeds,
        ) else {
            debug!("no unique {}x{} lattice among {} candidates", board.width, board.height, candidates.len());
            return CornerSet::invalid(board);
        };

        let sp = &self.params.subpix;
        let refined = assembled
            .corners
            .iter()
            .zip(&assembled.spacing)
            .map(|(&p, &spacing)| {
                let radius = (sp.max_spacing_fraction * spacing).floor().max(2.0) as u32;
                refine_corner(&view, p, radius.min(sp.window_radius.max(2)), sp)
            })
            .collect();

        CornerSet::from_detection(board, refined, size)
    }

    /// Detect every image in parallel. Output positions match `images`.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self, images), fields(count = images.len())))]
    pub fn detect_batch(
        &self,
        images: &[DynamicImage],
        board_width: i32,
        board_height: i32,
    ) -> Vec<CornerSet> {
        let sets: Vec<CornerSet> = images
            .par_iter()
            .map(|img| self.detect(img, board_width, board_height))
            .collect();
        info!(
            "detected boards in {}/{} images",
            sets.iter().filter(|s| s.is_valid()).count(),
            sets.len()
        );
        sets
    }
}
