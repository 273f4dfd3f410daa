//! Sparse rows of the system matrix: which pixels each ray is coupled to, and
//! how strongly.
//!
//! The algorithm used to calculate the elements is abstracted behind the
//! `SystemMatrix` trait. Two implementations are provided:
//!
//! + `Siddon`: weights are the exact lengths of the ray's intersections with
//!   the pixels it crosses.
//!
//! + `Joseph`: the ray is sampled once per pixel column (or row) along its
//!   dominant direction, with linear interpolation between the two nearest
//!   pixels in the other direction.

pub mod siddon;
pub mod joseph;

pub use siddon::Siddon;
pub use joseph::Joseph;

use serde::Deserialize;

use crate::geometry::Ray;
use crate::grid::Grid;
use crate::index::Index1_u;
use crate::types::Weightf32;

pub type SystemMatrixElement = (Index1_u, Weightf32);

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SystemMatrixRow(pub Vec<SystemMatrixElement>);

impl SystemMatrixRow {

    pub fn new<S: SystemMatrix>(ray: &Ray, grid: Grid) -> Self {
        let mut row = S::buffers(grid);
        S::update_system_matrix_row(&mut row, ray, grid);
        row
    }

    pub fn with_capacity(capacity: usize) -> Self { Self(Vec::with_capacity(capacity)) }

    #[inline] pub fn clear(&mut self) { self.0.clear() }
    #[inline] pub fn push(&mut self, index: Index1_u, weight: Weightf32) { self.0.push((index, weight)) }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn iter(&self) -> std::slice::Iter<SystemMatrixElement> { self.0.iter() }

    /// Sum of the weights: the (effective) length of the ray inside the grid
    pub fn total_weight(&self) -> Weightf32 { self.0.iter().map(|(_, w)| w).sum() }

    /// Trim excess capacity left over from the working buffer
    pub fn shrink_to_fit(&mut self) { self.0.shrink_to_fit() }
}

impl<'a> IntoIterator for &'a SystemMatrixRow {
    type Item = SystemMatrixElement;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, SystemMatrixElement>>;
    fn into_iter(self) -> Self::IntoIter { self.0.iter().copied() }
}

impl IntoIterator for SystemMatrixRow {
    type Item = SystemMatrixElement;
    type IntoIter = std::vec::IntoIter<Self::Item>;
    fn into_iter(self) -> Self::IntoIter { self.0.into_iter() }
}

/// Abstract interface for the calculation of system matrix elements
pub trait SystemMatrix {
    /// Place the indices and weights of the pixels coupled to `ray` in `row`,
    /// discarding its previous contents.
    fn update_system_matrix_row(row: &mut SystemMatrixRow, ray: &Ray, grid: Grid);

    /// Empty row with enough capacity for any ray through `grid`. Rows are
    /// calculated into reusable buffers, to avoid repeated allocation.
    fn buffers(grid: Grid) -> SystemMatrixRow;
}

/// Choice of system matrix algorithm, as it appears in configuration files.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SystemMatrixKind {
    #[default]
    Siddon,
    Joseph,
}
