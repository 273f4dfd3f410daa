//! Parallel-beam acquisition geometry.
//!
//! Each measured sample corresponds to a straight ray through the object. For
//! projection angle `theta` and detector pixel `d`, the ray runs in direction
//! `(cos theta, sin theta)` and passes through the point `s * (-sin theta, cos
//! theta)`, where `s = d + 0.5 - center` is the signed distance of the
//! detector pixel's centre from the rotation axis.

use crate::grid::Grid;
use crate::types::{Anglef32, Lengthf32, Point, Vector};

/// Directions whose component along an axis is smaller than this are treated
/// as parallel to the other axis.
pub const PARALLEL_TOLERANCE: Lengthf32 = 1e-7;

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    /// Point on the ray closest to the rotation axis
    pub origin: Point,
    /// Unit vector along the ray
    pub direction: Vector,
}

impl Ray {

    pub fn new(angle: Anglef32, offset: Lengthf32) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            origin: Point::new(-offset * sin, offset * cos),
            direction: Vector::new(cos, sin),
        }
    }

    /// Position along the ray at (signed) distance `t` from `origin`
    #[inline]
    pub fn at(&self, t: Lengthf32) -> Point { self.origin + self.direction * t }

    /// Distances along the ray at which it enters and leaves the grid, or
    /// `None` if it misses the grid entirely.
    pub fn chord(&self, grid: Grid) -> Option<(Lengthf32, Lengthf32)> {
        let h = grid.half_width;
        let mut enter = Lengthf32::NEG_INFINITY;
        let mut leave = Lengthf32::INFINITY;
        for k in 0..2 {
            let (o, d) = (self.origin[k], self.direction[k]);
            if d.abs() < PARALLEL_TOLERANCE {
                // Parallel to this pair of boundaries: either always between
                // them or never
                if o.abs() >= h { return None }
            } else {
                let a = (-h - o) / d;
                let b = ( h - o) / d;
                enter = enter.max(a.min(b));
                leave = leave.min(a.max(b));
            }
        }
        if leave > enter { Some((enter, leave)) } else { None }
    }

    /// Length of the ray inside the grid
    pub fn chord_length(&self, grid: Grid) -> Lengthf32 {
        self.chord(grid).map_or(0.0, |(enter, leave)| leave - enter)
    }
}

/// The angles and detector layout with which the projection data were
/// acquired.
#[derive(Clone, Debug)]
pub struct Acquisition {
    pub angles: Vec<Anglef32>,
    pub n_pixels: usize,
    pub center: Lengthf32,
}

impl Acquisition {

    pub fn new(angles: Vec<Anglef32>, n_pixels: usize, center: Lengthf32) -> Self {
        Self { angles, n_pixels, center }
    }

    /// `n_angles` evenly spaced angles covering `[0, π)`, with the rotation
    /// axis in the middle of the detector.
    pub fn evenly_spaced(n_angles: usize, n_pixels: usize) -> Self {
        let step = std::f32::consts::PI / n_angles as Anglef32;
        let angles = (0..n_angles).map(|i| i as Anglef32 * step).collect();
        Self::new(angles, n_pixels, n_pixels as Lengthf32 / 2.0)
    }

    pub fn n_angles(&self) -> usize { self.angles.len() }

    /// Total number of rays: one per (angle, detector pixel) pair
    pub fn n_rays(&self) -> usize { self.n_angles() * self.n_pixels }

    /// Signed distance of detector pixel `d` from the rotation axis
    pub fn offset(&self, d: usize) -> Lengthf32 {
        d as Lengthf32 + 0.5 - self.center
    }

    pub fn ray(&self, p: usize, d: usize) -> Ray {
        Ray::new(self.angles[p], self.offset(d))
    }

    /// Ray with the given position in projection-major order
    pub fn ray1(&self, i: usize) -> Ray {
        self.ray(i / self.n_pixels, i % self.n_pixels)
    }

    /// Whether the rotation axis lies on the detector
    pub fn center_on_detector(&self) -> bool {
        self.center >= 0.0 && self.center <= self.n_pixels as Lengthf32
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;
    use float_eq::assert_float_eq;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    #[rstest(/**/  angle   , offset, expected_length,
             case(0.0      ,  0.0  , 10.0),
             case(FRAC_PI_2,  3.7  , 10.0),
             case(PI       , -4.9  , 10.0),
             case(FRAC_PI_4,  0.0  , 10.0 * std::f32::consts::SQRT_2),
             case(0.0      ,  5.0  ,  0.0), // grazing the boundary
             case(0.0      ,  6.0  ,  0.0), // misses completely
             case(FRAC_PI_4,  7.1  ,  0.0), // misses the corner
    )]
    fn chord_lengths(angle: Anglef32, offset: Lengthf32, expected_length: Lengthf32) {
        let grid = Grid::new(10);
        let length = Ray::new(angle, offset).chord_length(grid);
        assert_float_eq!(length, expected_length, abs <= 1e-4);
    }

    #[test]
    fn ray_passes_through_offset_point() {
        let ray = Ray::new(FRAC_PI_2, 2.0);
        // Vertical ray, shifted in -x
        assert_float_eq!(ray.origin.x, -2.0, abs <= 1e-6);
        assert_float_eq!(ray.origin.y,  0.0, abs <= 1e-6);
        assert_float_eq!(ray.direction.x, 0.0, abs <= 1e-6);
    }

    #[test]
    fn detector_offsets_are_symmetric_about_default_center() {
        let acq = Acquisition::evenly_spaced(4, 6);
        let offsets: Vec<_> = (0..6).map(|d| acq.offset(d)).collect();
        assert_eq!(offsets, vec![-2.5, -1.5, -0.5, 0.5, 1.5, 2.5]);
        assert_eq!(acq.n_angles(), 4);
        assert_eq!(acq.n_rays(), 24);
        assert!(acq.center_on_detector());
    }
}
