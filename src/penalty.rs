//! Neighbourhood penalties and their decoupled surrogates.
//!
//! The penalty is a sum over the 8-neighbourhood of each pixel,
//!
//!   R(x) = ½ Σ_j Σ_{k ∈ N(j)} w_jk ψ(x_j - x_k)
//!
//! with base weights 1 for the four edge-sharing neighbours and 1/√2 for the
//! four diagonal ones, normalized so that the weights of the neighbours which
//! exist (fewer at the edges and corners of the grid) add up to one.
//!
//! Each pair term is replaced by De Pierro's separable surrogate, evaluated at
//! the current image. Pixel `j` then contributes
//!
//!   F_j = 2β Σ_k w_jk γ_jk
//!   G_j = -2β Σ_k w_jk γ_jk (x_j + x_k)
//!
//! to the per-pixel quadratic solved by the update, where `γ_jk` is the
//! curvature of the potential `ψ` at the current difference `x_j - x_k`.

use rayon::prelude::*;
use serde::Deserialize;

use crate::{
    error::{ReconError, Result},
    grid::Grid,
    image::Image,
    index::{index1_to_2, index2_to_1, Index1_u, Index2_u},
    types::{Intensityf32, Ratiof32, Weightf32},
};

/// The potential function applied to differences between neighbours
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Penalty {
    /// ψ(t) = t²
    #[default]
    Quadratic,
    /// Lange's edge-preserving potential, ψ(t) = 2δ²(|t|/δ - ln(1 + |t|/δ)):
    /// quadratic for differences much smaller than `delta`, linear for much
    /// larger ones.
    Hybrid { delta: Intensityf32 },
}

impl Penalty {

    /// ψ'(t) / 2t: the weight with which a difference `t` enters the surrogate
    #[inline]
    pub fn curvature(&self, difference: Intensityf32) -> Ratiof32 {
        match *self {
            Penalty::Quadratic       => 1.0,
            Penalty::Hybrid { delta } => 1.0 / (1.0 + difference.abs() / delta),
        }
    }

    /// ψ(t)
    pub fn potential(&self, difference: Intensityf32) -> Intensityf32 {
        match *self {
            Penalty::Quadratic       => difference * difference,
            Penalty::Hybrid { delta } => {
                let t = difference.abs() / delta;
                2.0 * delta * delta * (t - t.ln_1p())
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            Penalty::Quadratic => Ok(()),
            Penalty::Hybrid { delta } if delta.is_finite() && delta > 0.0 => Ok(()),
            Penalty::Hybrid { delta } => Err(ReconError::InvalidParameter(format!(
                "hybrid penalty delta must be positive and finite, got {delta}"
            ))),
        }
    }
}

use std::f32::consts::FRAC_1_SQRT_2;

static NEIGHBOURHOOD: [(isize, isize, Weightf32); 8] = [
    ( 1,  0, 1.0), (-1,  0, 1.0), ( 0,  1, 1.0), ( 0, -1, 1.0),
    ( 1,  1, FRAC_1_SQRT_2), ( 1, -1, FRAC_1_SQRT_2),
    (-1,  1, FRAC_1_SQRT_2), (-1, -1, FRAC_1_SQRT_2),
];

/// The neighbours of pixel `index` which lie inside `grid`, with their
/// normalized weights.
pub fn neighbours(grid: Grid, index: Index2_u) -> impl Iterator<Item = (Index1_u, Weightf32)> {
    let existing = move |&(dx, dy, w): &(isize, isize, Weightf32)| {
        shifted(grid, index, dx, dy).map(|k| (k, w))
    };
    let total: Weightf32 = NEIGHBOURHOOD.iter().filter_map(existing).map(|(_, w)| w).sum();
    NEIGHBOURHOOD.iter()
        .filter_map(existing)
        .map(move |(k, w)| (k, w / total))
}

fn shifted(grid: Grid, [ix, iy]: Index2_u, dx: isize, dy: isize) -> Option<Index1_u> {
    let x = ix.checked_add_signed(dx)?;
    let y = iy.checked_add_signed(dy)?;
    (x < grid.n && y < grid.n).then(|| index2_to_1([x, y], grid.n))
}

/// Fill `f` and `g` with the penalty's contributions to the surrogate
/// coefficients of every pixel, evaluated at `image`.
pub fn surrogate_coefficients(
    image  : &Image,
    penalty: Penalty,
    beta   : Ratiof32,
    f      : &mut [Intensityf32],
    g      : &mut [Intensityf32],
) {
    let grid = image.grid;
    let x = &image.data;
    f.par_iter_mut()
        .zip(g.par_iter_mut())
        .enumerate()
        .for_each(|(j, (f, g))| {
            let (mut fj, mut gj) = (0.0, 0.0);
            for (k, w) in neighbours(grid, index1_to_2(j, grid.n)) {
                let wg = w * penalty.curvature(x[j] - x[k]);
                fj += wg;
                gj -= wg * (x[j] + x[k]);
            }
            *f = 2.0 * beta * fj;
            *g = 2.0 * beta * gj;
        });
}

/// Value of the penalty R(x) for `image`, without the factor β
pub fn penalty_value(image: &Image, penalty: Penalty) -> f64 {
    let grid = image.grid;
    let x = &image.data;
    let total: f64 = (0..grid.size())
        .into_par_iter()
        .map(|j| {
            neighbours(grid, index1_to_2(j, grid.n))
                .map(|(k, w)| (w * penalty.potential(x[j] - x[k])) as f64)
                .sum::<f64>()
        })
        .sum();
    total / 2.0
}
