//! Accelerated Penalized Maximum-Likelihood reconstruction.
//!
//! Every iteration replaces both the Poisson log-likelihood and the
//! neighbourhood penalty with separable surrogates, built from the current
//! image. The surrogate of pixel `j` is maximized by the non-negative root of
//!
//!   2F_j x² + G_j x + E_j = 0
//!
//! where
//!
//! + `E_j = -x_j Σ_i a_ij y_i / ŷ_i` comes from the likelihood (`y` measured,
//!   `ŷ` simulated projections of the current image),
//!
//! + `G_j = s_j + (penalty part)`, with `s_j = Σ_i a_ij` the sensitivity,
//!
//! + `F_j` and the penalty part of `G_j` are described in `penalty`.
//!
//! With `beta = 0`, `F` vanishes and the update reduces to MLEM:
//! `x_j ← x_j Σ_i a_ij y_i / ŷ_i / s_j`.
//!
//! All pixels are updated simultaneously from the previous iteration's image:
//! each slice keeps two image buffers, which swap roles at the end of every
//! iteration.

use std::time::Instant;

use log::{debug, info, trace, warn};
use ndarray::{Array3, ArrayView1, ArrayView2, ArrayView3, ArrayViewMut2, Axis, Zip};
use rayon::prelude::*;

use crate::{
    config::apml::Config,
    error::{ReconError, Result},
    geometry::Acquisition,
    grid::Grid,
    image::{Image, ImageData},
    penalty::{surrogate_coefficients, Penalty},
    projector::Projector,
    types::{Intensityf32, Ratiof32},
};

/// The parameters which control the iterations of a single slice
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Settings {
    pub beta: Ratiof32,
    pub penalty: Penalty,
}

/// Performs APML iterations on a single slice.
pub struct Solver<'p> {
    projector: &'p Projector,
    measured : Vec<Intensityf32>,
    settings : Settings,
    current  : Image,
    next     : Image,
    // Penalty surrogate coefficients, reused between iterations
    f: ImageData,
    g: ImageData,
}

impl<'p> Solver<'p> {

    /// `measured` holds one value per ray of `projector`, in projection-major
    /// order.
    pub fn new(projector: &'p Projector, measured: Vec<Intensityf32>, initial: Image, settings: Settings) -> Self {
        let grid = projector.grid();
        debug_assert_eq!(initial.grid, grid);
        debug_assert_eq!(measured.len(), projector.n_rays());
        Self {
            projector, measured, settings,
            current: initial,
            next   : Image::zeros(grid),
            f: Image::zeros_buffer(grid),
            g: Image::zeros_buffer(grid),
        }
    }

    pub fn image(&self) -> &Image { &self.current }
    pub fn into_image(self) -> Image { self.current }

    pub fn one_iteration(&mut self) {
        let Settings { beta, penalty } = self.settings;

        // -------- Forward project, take ratio, back-project -------------------
        let ratio = self.projector.ml_ratio_backprojection(&self.current, &self.measured);

        // -------- Penalty surrogate --------------------------------------------
        if beta > 0.0 {
            surrogate_coefficients(&self.current, penalty, beta, &mut self.f, &mut self.g);
        }

        // -------- Synchronous update: reads only `current`, writes only `next` -
        let sensitivity = self.projector.sensitivity();
        let (f, g) = (&self.f[..], &self.g[..]);
        Zip::from(&mut self.next.data[..])
            .and(&self.current.data[..])
            .and(&ratio[..])
            .and(sensitivity)
            .and(f)
            .and(g)
            .par_for_each(|next, &x, &r, &s, &f, &g| *next = update_pixel(x, r, s, f, g));

        std::mem::swap(&mut self.current, &mut self.next);
    }

    /// Perform `iterations` iterations, checking for non-finite pixels after
    /// each one. `slice` is used only to report errors.
    pub fn run(&mut self, iterations: usize, slice: usize) -> Result<()> {
        for iteration in 0..iterations {
            self.one_iteration();
            if !self.current.data.par_iter().all(|x| x.is_finite()) {
                return Err(ReconError::NumericInstability { slice, iteration });
            }
            trace!("slice {slice}: iteration {iteration} done");
        }
        Ok(())
    }

    /// An infinite sequence of images, each one made by performing one
    /// iteration on the previous one.
    pub fn iterations(mut self) -> impl Iterator<Item = Image> + 'p {
        std::iter::from_fn(move || {
            self.one_iteration();
            Some(self.current.clone())
        })
    }
}

/// New value of a pixel with current value `x`, given its back-projected
/// ratio, sensitivity and penalty surrogate coefficients.
#[inline]
pub fn update_pixel(
    x          : Intensityf32,
    ratio      : Intensityf32,
    sensitivity: Intensityf32,
    f          : Intensityf32,
    g_penalty  : Intensityf32,
) -> Intensityf32 {
    let e = -x * ratio;
    let g = sensitivity + g_penalty;
    let updated = if f > 0.0 {
        // e <= 0 and f > 0, so the discriminant is at least g²
        let root = (g * g - 8.0 * e * f).sqrt();
        // Avoid cancellation between -g and root
        if g > 0.0 { -2.0 * e / (g + root) }
        else       { (root - g) / (4.0 * f) }
    } else if g > 0.0 {
        -e / g
    } else {
        // Neither seen by any ray, nor coupled to any neighbour
        0.0
    };
    // Written so that NaN is not clamped away
    if updated < 0.0 { 0.0 } else { updated }
}

// ----- Whole-volume reconstruction ----------------------------------------------------

/// Reconstructs projection volumes according to a `Config`.
#[derive(Clone, Debug)]
pub struct Reconstructor {
    config: Config,
}

impl Reconstructor {

    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config { &self.config }

    /// Reconstruct `data` (projection, slice, pixel) acquired at angles
    /// `theta`, starting from `init` (slice, row, column).
    pub fn run(&self, data: ArrayView3<f32>, theta: ArrayView1<f32>, init: ArrayView3<f32>) -> Result<Array3<f32>> {
        match self.config.threads {
            None => self.run_in_current_pool(data, theta, init),
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
                pool.install(|| self.run_in_current_pool(data, theta, init))
            }
        }
    }

    fn run_in_current_pool(&self, data: ArrayView3<f32>, theta: ArrayView1<f32>, init: ArrayView3<f32>) -> Result<Array3<f32>> {
        let acquisition = self.validate(data, theta, init)?;
        let Config { iterations, grid, beta, penalty, projector: kind, .. } = self.config;
        let grid = Grid::new(grid);
        let (n_projections, n_slices, n_pixels) = data.dim();

        let mut output = init.to_owned();
        if iterations == 0 {
            debug!("No iterations requested: returning initial estimate");
            return Ok(output);
        }

        info!("APML: {n_slices} slices of {n_projections} projections x {n_pixels} pixels \
               -> {n}x{n} grid, {iterations} iterations, beta = {beta}, {penalty:?} penalty, \
               {kind:?} projector, {threads} threads",
              n = grid.n, threads = rayon::current_num_threads());
        let start = Instant::now();

        let projector = Projector::with_kind(kind, &acquisition, grid);
        debug!("Built system matrix in {} ms", start.elapsed().as_millis());

        let settings = Settings { beta, penalty };
        output.axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(data.axis_iter(Axis(1)).into_par_iter())
            .enumerate()
            .try_for_each(|(slice, (estimate, sinogram))| {
                reconstruct_slice(&projector, settings, iterations, slice, sinogram, estimate)
            })?;

        info!("APML finished in {} ms", start.elapsed().as_millis());
        Ok(output)
    }

    /// Check all inputs before any work is done, and describe the geometry
    fn validate(&self, data: ArrayView3<f32>, theta: ArrayView1<f32>, init: ArrayView3<f32>) -> Result<Acquisition> {
        let (n_projections, n_slices, n_pixels) = data.dim();
        let n = self.config.grid;

        if n_projections == 0 || n_slices == 0 || n_pixels == 0 {
            return Err(ReconError::InvalidShape(format!(
                "projection data must be non-empty in every dimension, got {:?}", data.dim()
            )));
        }
        if theta.len() != n_projections {
            return Err(ReconError::InvalidShape(format!(
                "{} angles supplied for {n_projections} projections", theta.len()
            )));
        }
        if init.dim() != (n_slices, n, n) {
            return Err(ReconError::InvalidShape(format!(
                "initial estimate has shape {:?}, expected {:?}", init.dim(), (n_slices, n, n)
            )));
        }

        if !data.into_par_iter().all(|&y| y.is_finite() && y >= 0.0) {
            return Err(ReconError::InvalidData("projection data must be finite and non-negative".into()));
        }
        if !theta.iter().all(|t| t.is_finite()) {
            return Err(ReconError::InvalidData("projection angles must be finite".into()));
        }
        if !init.into_par_iter().all(|&x| x.is_finite() && x >= 0.0) {
            return Err(ReconError::InvalidData("initial estimate must be finite and non-negative".into()));
        }

        let center = self.config.center.unwrap_or(n_pixels as f32 / 2.0);
        let acquisition = Acquisition::new(theta.to_vec(), n_pixels, center);
        if !acquisition.center_on_detector() {
            warn!("Centre of rotation {center} lies outside the detector [0, {n_pixels}]");
        }
        Ok(acquisition)
    }
}

fn reconstruct_slice(
    projector : &Projector,
    settings  : Settings,
    iterations: usize,
    slice     : usize,
    sinogram  : ArrayView2<f32>,
    estimate  : ArrayViewMut2<f32>,
) -> Result<()> {
    // Projection-major, matching the order of the projector's rays
    let measured: Vec<f32> = sinogram.iter().copied().collect();
    let initial = Image::from_array(projector.grid(), estimate.view())?;
    let mut solver = Solver::new(projector, measured, initial, settings);
    solver.run(iterations, slice)?;
    solver.image().write_into(estimate);
    debug!("slice {slice} done");
    Ok(())
}

/// Reconstruct a projection volume with the default penalty and projector.
///
/// `data` has shape (projections, slices, pixels), `theta` holds one angle (in
/// radians) per projection, `center` is the detector pixel coordinate of the
/// rotation axis, and `init_matrix` (slices, `num_grid`, `num_grid`) is the
/// initial estimate. The result has the same shape as `init_matrix`.
pub fn reconstruct(
    data       : ArrayView3<f32>,
    theta      : ArrayView1<f32>,
    center     : f32,
    num_grid   : i32,
    iters      : i32,
    beta       : f32,
    init_matrix: ArrayView3<f32>,
) -> Result<Array3<f32>> {
    let grid = usize::try_from(num_grid).ok().filter(|&n| n > 0).ok_or_else(|| {
        ReconError::InvalidParameter(format!("grid size must be positive, got {num_grid}"))
    })?;
    let iterations = usize::try_from(iters).map_err(|_| {
        ReconError::InvalidParameter(format!("iteration count must not be negative, got {iters}"))
    })?;
    let config = Config { center: Some(center), beta, ..Config::new(iterations, grid) };
    Reconstructor::new(config)?.run(data, theta, init_matrix)
}
