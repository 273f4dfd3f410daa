//! Synthetic objects for testing and benchmarking reconstructions.

use itertools::iproduct;
use ndarray::{Array3, Axis};
use rand::Rng;
use rand_distr::{Distribution, Poisson};

use crate::{
    grid::Grid,
    image::Image,
    index::index2_to_1,
    projector::Projector,
    types::{Anglef32, Intensityf32, Lengthf32, Point},
};

/// A uniform ellipse, whose value is added to those of any other ellipses
/// covering the same point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ellipse {
    pub centre   : Point,
    pub semi_axes: (Lengthf32, Lengthf32),
    /// Anticlockwise rotation of the first semi-axis from the x-axis
    pub rotation : Anglef32,
    pub value    : Intensityf32,
}

impl Ellipse {

    pub fn contains(&self, p: Point) -> bool {
        let (sin, cos) = self.rotation.sin_cos();
        let d = p - self.centre;
        let u = ( d.x * cos + d.y * sin) / self.semi_axes.0;
        let v = (-d.x * sin + d.y * cos) / self.semi_axes.1;
        u * u + v * v <= 1.0
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Phantom {
    pub ellipses: Vec<Ellipse>,
}

impl Phantom {

    /// Uniform disk centred on the rotation axis
    pub fn disk(radius: Lengthf32, value: Intensityf32) -> Self {
        Self { ellipses: vec![Ellipse {
            centre: Point::origin(),
            semi_axes: (radius, radius),
            rotation: 0.0,
            value,
        }]}
    }

    /// The modified (high-contrast) Shepp-Logan head phantom, scaled so that
    /// its outer ellipse just fits in a circle of the given radius. Intensities
    /// are in [0, 1].
    pub fn shepp_logan(radius: Lengthf32) -> Self {
        #[rustfmt::skip]
        const ELLIPSES: [(f32, f32, f32, f32, f32, f32); 10] = [
            // value     a       b        x0       y0     degrees
            (  1.0 , 0.69  , 0.92  ,  0.0  ,  0.0   ,   0.0),
            ( -0.8 , 0.6624, 0.874 ,  0.0  , -0.0184,   0.0),
            ( -0.2 , 0.11  , 0.31  ,  0.22 ,  0.0   , -18.0),
            ( -0.2 , 0.16  , 0.41  , -0.22 ,  0.0   ,  18.0),
            (  0.1 , 0.21  , 0.25  ,  0.0  ,  0.35  ,   0.0),
            (  0.1 , 0.046 , 0.046 ,  0.0  ,  0.1   ,   0.0),
            (  0.1 , 0.046 , 0.046 ,  0.0  , -0.1   ,   0.0),
            (  0.1 , 0.046 , 0.023 , -0.08 , -0.605 ,   0.0),
            (  0.1 , 0.023 , 0.023 ,  0.0  , -0.606 ,   0.0),
            (  0.1 , 0.023 , 0.046 ,  0.06 , -0.605 ,   0.0),
        ];
        let ellipses = ELLIPSES.iter()
            .map(|&(value, a, b, x0, y0, degrees)| Ellipse {
                centre   : Point::new(x0 * radius, y0 * radius),
                semi_axes: (a * radius, b * radius),
                rotation : degrees.to_radians(),
                value,
            })
            .collect();
        Self { ellipses }
    }

    pub fn value_at(&self, p: Point) -> Intensityf32 {
        self.ellipses.iter()
            .filter(|e| e.contains(p))
            .map(|e| e.value)
            .sum()
    }

    /// Sample the phantom at the centre of every pixel of `grid`
    pub fn rasterize(&self, grid: Grid) -> Image {
        let mut image = Image::zeros(grid);
        for (ix, iy) in iproduct!(0..grid.n, 0..grid.n) {
            let value = self.value_at(grid.pixel_centre([ix, iy]));
            image[index2_to_1([ix, iy], grid.n)] = value;
        }
        image
    }

    /// Projections of the rasterized phantom, repeated in `n_slices` identical
    /// slices, with shape (projection, slice, detector pixel).
    pub fn projection_data(&self, projector: &Projector, n_projections: usize, n_slices: usize) -> Array3<Intensityf32> {
        let sinogram = projector.forward_project(&self.rasterize(projector.grid()));
        let n_pixels = sinogram.len() / n_projections.max(1);
        let mut data = Array3::zeros((n_projections, n_slices, n_pixels));
        for mut slice in data.axis_iter_mut(Axis(1)) {
            for (sample, &value) in slice.iter_mut().zip(&sinogram) {
                *sample = value;
            }
        }
        data
    }
}

/// Replace every projection value by a Poisson-distributed count with that
/// mean. Non-positive values become zero.
pub fn add_poisson_noise<R: Rng>(data: &mut Array3<Intensityf32>, rng: &mut R) {
    for value in data.iter_mut() {
        *value = match Poisson::new(*value) {
            Ok(poisson) => poisson.sample(rng),
            Err(_) => 0.0,
        };
    }
}
