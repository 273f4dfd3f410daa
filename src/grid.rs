//! The square grid of pixels on which each slice is reconstructed.
//!
//! Pixels have unit size, and the grid is centred on the rotation axis, so it
//! spans `[-n/2, n/2]` in both x and y.

use crate::types::{Lengthf32, Point};
use crate::index::{Index1_u, Index2_u, index1_to_2};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Grid {
    pub n: usize,
    pub half_width: Lengthf32,
}

impl Grid {

    pub fn new(n: usize) -> Self {
        Self { n, half_width: n as Lengthf32 / 2.0 }
    }

    /// Number of pixels in the grid
    pub fn size(&self) -> usize { self.n * self.n }

    /// Find centre of pixel with given 2D index
    pub fn pixel_centre(&self, [ix, iy]: Index2_u) -> Point {
        Point::new(ix as Lengthf32 + 0.5 - self.half_width,
                   iy as Lengthf32 + 0.5 - self.half_width)
    }

    /// Find centre of pixel with given 1D index
    pub fn pixel_centre1(&self, i: Index1_u) -> Point {
        self.pixel_centre(index1_to_2(i, self.n))
    }

    /// Index of the pixel containing `p`, if `p` lies inside the grid
    pub fn pixel_containing(&self, p: Point) -> Option<Index2_u> {
        let ix = (p.x + self.half_width).floor();
        let iy = (p.y + self.half_width).floor();
        let n = self.n as Lengthf32;
        if ix >= 0.0 && iy >= 0.0 && ix < n && iy < n {
            Some([ix as usize, iy as usize])
        } else {
            None
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x.abs() <= self.half_width && p.y.abs() <= self.half_width
    }
}
