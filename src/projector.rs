//! Forward and backward projections over all the rays of an acquisition.
//!
//! The geometry is the same for every slice of a projection volume, so the
//! system matrix rows are calculated once, when the `Projector` is built, and
//! reused for every slice and every iteration.
//!
//! Back-projections are accumulated with rayon's `fold_chunks`: each job
//! projects a contiguous chunk of rays into its own image-sized buffer, and the
//! buffers are summed at the end. Forward projections only read the image, so
//! each ray is independent.

use rayon::prelude::*;

use crate::{
    geometry::Acquisition,
    grid::Grid,
    image::{Image, ImageData},
    system_matrix::{Joseph, Siddon, SystemMatrix, SystemMatrixKind, SystemMatrixRow},
    types::Intensityf32,
};

pub struct Projector {
    grid: Grid,
    rows: Vec<SystemMatrixRow>,
    sensitivity: ImageData,
}

impl Projector {

    pub fn new<S: SystemMatrix>(acquisition: &Acquisition, grid: Grid) -> Self {
        let rows: Vec<SystemMatrixRow> = (0..acquisition.n_rays())
            .into_par_iter()
            .map(|i| {
                let mut row = SystemMatrixRow::new::<S>(&acquisition.ray1(i), grid);
                row.shrink_to_fit();
                row
            })
            .collect();
        let mut projector = Self { grid, rows, sensitivity: vec![] };
        projector.sensitivity = projector.back_project(&vec![1.0; acquisition.n_rays()]);
        projector
    }

    pub fn with_kind(kind: SystemMatrixKind, acquisition: &Acquisition, grid: Grid) -> Self {
        match kind {
            SystemMatrixKind::Siddon => Self::new::<Siddon>(acquisition, grid),
            SystemMatrixKind::Joseph => Self::new::<Joseph>(acquisition, grid),
        }
    }

    pub fn grid(&self) -> Grid { self.grid }
    pub fn n_rays(&self) -> usize { self.rows.len() }

    /// Back-projection of ones: the total weight with which each pixel is
    /// seen by the acquisition
    pub fn sensitivity(&self) -> &[Intensityf32] { &self.sensitivity }

    /// Simulated measurement of `image` along every ray, in projection-major
    /// order
    pub fn forward_project(&self, image: &Image) -> Vec<Intensityf32> {
        debug_assert_eq!(image.grid, self.grid);
        self.rows
            .par_iter()
            .map(|row| forward_project(row, &image.data))
            .collect()
    }

    /// Spread each ray's value in `sinogram` over the pixels it crosses
    pub fn back_project(&self, sinogram: &[Intensityf32]) -> ImageData {
        debug_assert_eq!(sinogram.len(), self.n_rays());
        self.fold_rays(|_row, i| Some(sinogram[i]))
    }

    /// Back-projection of the ratio of measured to simulated projections of
    /// `image`: the multiplicative ML correction, before normalization by the
    /// sensitivity. Rays whose simulated projection is exactly zero are
    /// skipped; any positive projection, however small, is used, so the
    /// correction does not depend on the scale of the data.
    pub fn ml_ratio_backprojection(&self, image: &Image, measured: &[Intensityf32]) -> ImageData {
        debug_assert_eq!(image.grid, self.grid);
        debug_assert_eq!(measured.len(), self.n_rays());
        self.fold_rays(|row, i| {
            let y = measured[i];
            if y == 0.0 { return None }
            let expected = forward_project(row, &image.data);
            (expected > 0.0).then(|| y / expected)
        })
    }

    /// Back-project, along every ray, the value returned for it by
    /// `value_for_ray`. Rays for which it returns `None` are skipped.
    fn fold_rays<F>(&self, value_for_ray: F) -> ImageData
    where
        F: Fn(&SystemMatrixRow, usize) -> Option<Intensityf32> + Sync,
    {
        let grid = self.grid;
        // Rayon is too eager in spawning small jobs, each of which requires the
        // construction and subsequent combination of expensive accumulators
        // (whole images). So here we try to limit it to one job per thread.
        let job_size = (self.rows.len() / rayon::current_num_threads()).max(1);
        self.rows
            .par_iter()
            .enumerate()
            .fold_chunks(
                job_size,
                || Image::zeros_buffer(grid),
                |mut backprojection, (i, row)| {
                    if let Some(value) = value_for_ray(row, i) {
                        back_project(&mut backprojection, row, value);
                    }
                    backprojection
                },
            )
            .reduce(|| Image::zeros_buffer(grid), elementwise_add)
    }
}

#[inline]
pub fn forward_project(row: &SystemMatrixRow, image: &[Intensityf32]) -> Intensityf32 {
    let mut projection = 0.0;
    for (j, w) in row {
        projection += w * image[j]
    }
    projection
}

#[inline]
pub fn back_project(backprojection: &mut [Intensityf32], row: &SystemMatrixRow, value: Intensityf32) {
    for (j, w) in row {
        backprojection[j] += w * value;
    }
}

fn elementwise_add(mut a: ImageData, b: ImageData) -> ImageData {
    for (l, r) in a.iter_mut().zip(&b) { *l += r }
    a
}
