use ndarray::{ArrayView2, ArrayViewMut2};

use crate::error::{ReconError, Result};
use crate::grid::Grid;
use crate::index::{index2_to_1, Index1_u, Index2_u};
use crate::types::Intensityf32;

pub type ImageData = Vec<Intensityf32>;

/// A single reconstructed slice: pixel values on a `Grid`, stored row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub grid: Grid,
    pub data: ImageData,
}

impl Image {

    pub fn new(grid: Grid, data: ImageData) -> Result<Self> {
        if data.len() != grid.size() {
            return Err(ReconError::InvalidShape(format!(
                "image data has {} elements, but a {n}x{n} grid needs {}",
                data.len(), grid.size(), n = grid.n
            )));
        }
        Ok(Self { grid, data })
    }

    pub fn ones (grid: Grid) -> Self { Self { grid, data: vec![1.0; grid.size()] } }
    pub fn zeros(grid: Grid) -> Self { Self { grid, data: Self::zeros_buffer(grid) } }

    /// A new empty data store matching the size of `grid`
    pub fn zeros_buffer(grid: Grid) -> ImageData { vec![0.0; grid.size()] }

    /// Copy of a 2D (row, column) array
    pub fn from_array(grid: Grid, array: ArrayView2<Intensityf32>) -> Result<Self> {
        if array.dim() != (grid.n, grid.n) {
            return Err(ReconError::InvalidShape(format!(
                "slice has shape {:?}, expected ({n}, {n})", array.dim(), n = grid.n
            )));
        }
        // `iter` visits elements in logical (row-major) order whatever the
        // memory layout of `array`
        Ok(Self { grid, data: array.iter().copied().collect() })
    }

    /// Write the pixel values into a 2D (row, column) array of matching shape
    pub fn write_into(&self, mut target: ArrayViewMut2<Intensityf32>) {
        for (pixel, &value) in target.iter_mut().zip(&self.data) {
            *pixel = value;
        }
    }

    pub fn is_finite(&self) -> bool { self.data.iter().all(|x| x.is_finite()) }

    pub fn sum(&self) -> Intensityf32 { self.data.iter().sum() }
}

impl core::ops::IndexMut<Index1_u> for Image {
    #[inline]
    fn index_mut(&mut self, i: Index1_u) -> &mut Self::Output { &mut self.data[i] }
}

impl core::ops::Index<Index1_u> for Image {
    type Output = Intensityf32;
    #[inline]
    fn index(&self, i: Index1_u) -> &Self::Output { &self.data[i] }
}

impl core::ops::IndexMut<Index2_u> for Image {
    fn index_mut(&mut self, i2: Index2_u) -> &mut Self::Output {
        let i1 = index2_to_1(i2, self.grid.n);
        &mut self.data[i1]
    }
}

impl core::ops::Index<Index2_u> for Image {
    type Output = Intensityf32;
    fn index(&self, i2: Index2_u) -> &Self::Output {
        let i1 = index2_to_1(i2, self.grid.n);
        &self.data[i1]
    }
}
