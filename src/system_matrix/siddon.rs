use crate::{
    geometry::{Ray, PARALLEL_TOLERANCE},
    grid::Grid,
    index::index2_to_1,
    types::Lengthf32,
};

use super::{SystemMatrix, SystemMatrixRow};

/// Exact ray-tracing through the pixel grid.
///
/// All the distances at which the ray crosses a grid line are collected and
/// sorted. Consecutive crossings delimit the segment of the ray lying in a
/// single pixel: the segment's length is the weight, and its midpoint
/// identifies the pixel.
pub struct Siddon;

impl SystemMatrix for Siddon {

    fn update_system_matrix_row(row: &mut SystemMatrixRow, ray: &Ray, grid: Grid) {
        // Throw away previous ray's values
        row.clear();

        let Some((enter, leave)) = ray.chord(grid) else { return };

        let mut crossings = crossings(ray, grid, enter, leave);
        crossings.sort_unstable_by(Lengthf32::total_cmp);

        for pair in crossings.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let length = b - a;
            // Rays through (or very near) pixel corners produce spurious
            // slivers between almost-coincident crossings
            if length <= negligible(a, b) { continue }
            let midpoint = ray.at(0.5 * (a + b));
            if let Some(index) = grid.pixel_containing(midpoint) {
                row.push(index2_to_1(index, grid.n), length);
            }
        }
    }

    fn buffers(grid: Grid) -> SystemMatrixRow {
        // A straight line can cross at most 2n - 1 pixels of an n x n grid
        SystemMatrixRow::with_capacity(2 * grid.n)
    }
}

/// Distances along `ray` of the grid lines it crosses between `enter` and
/// `leave`, including both end points.
fn crossings(ray: &Ray, grid: Grid, enter: Lengthf32, leave: Lengthf32) -> Vec<Lengthf32> {
    let mut crossings = Vec::with_capacity(2 * grid.n + 4);
    crossings.push(enter);
    crossings.push(leave);
    for k in 0..2 {
        let (o, d) = (ray.origin[k], ray.direction[k]);
        if d.abs() < PARALLEL_TOLERANCE { continue }
        for line in 0..=grid.n {
            let t = (line as Lengthf32 - grid.half_width - o) / d;
            if t > enter && t < leave { crossings.push(t) }
        }
    }
    crossings
}

#[inline]
fn negligible(a: Lengthf32, b: Lengthf32) -> Lengthf32 {
    16.0 * Lengthf32::EPSILON * a.abs().max(b.abs()).max(1.0)
}
