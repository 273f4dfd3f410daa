use crate::{
    geometry::Ray,
    grid::Grid,
    index::index2_to_1,
    types::{Lengthf32, Weightf32},
};

use super::{SystemMatrix, SystemMatrixRow};

const NEGLIGIBLE_SHARE: Weightf32 = 1e-5;

/// Linear-interpolation projector.
///
/// The ray is sampled where it crosses the centre line of each pixel column
/// perpendicular to its dominant direction. Each sample carries the length of
/// ray per column, `1 / |cos|` of the angle to the dominant axis, shared
/// between the two pixels whose centres straddle the sample.
pub struct Joseph;

impl SystemMatrix for Joseph {

    fn update_system_matrix_row(row: &mut SystemMatrixRow, ray: &Ray, grid: Grid) {
        // Throw away previous ray's values
        row.clear();

        let d = ray.direction;
        // Step along `k`, interpolate along `m`
        let (k, m) = if d.x.abs() >= d.y.abs() { (0, 1) } else { (1, 0) };
        let step_length: Weightf32 = 1.0 / d[k].abs();
        let n = grid.n;
        let h = grid.half_width;

        for column in 0..n {
            let u = column as Lengthf32 + 0.5 - h;
            let t = (u - ray.origin[k]) / d[k];
            let v = ray.origin[m] + t * d[m];

            // Position in units of pixels, relative to the centre of pixel 0
            let position = v + h - 0.5;
            let below = position.floor();
            let fraction = position - below;
            let below = below as i64;

            for (j, share) in [(below, 1.0 - fraction), (below + 1, fraction)] {
                // Shares within rounding error of zero are noise
                if j < 0 || j >= n as i64 || share <= NEGLIGIBLE_SHARE { continue }
                let j = j as usize;
                let pixel = if k == 0 { [column, j] } else { [j, column] };
                row.push(index2_to_1(pixel, n), share * step_length);
            }
        }
    }

    fn buffers(grid: Grid) -> SystemMatrixRow {
        // At most two pixels per column
        SystemMatrixRow::with_capacity(2 * grid.n)
    }
}
