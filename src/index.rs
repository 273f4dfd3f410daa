//! Conversion between flat and 2D pixel indices.
//!
//! Pixel `[ix, iy]` of an `n x n` grid lives at flat index `ix * n + iy`: the
//! first index (image row) runs along x, the second (image column) along y,
//! matching the (row, column) layout of each slice of the image volume.

use std::ops::{Add, Div, Mul, Rem};

#[allow(non_camel_case_types)] pub type Index1_u = usize;
#[allow(non_camel_case_types)] pub type Index2_u = [usize; 2];

pub fn index2_to_1<T>([ix, iy]: [T; 2], n: T) -> T
where
    T: Mul<Output = T> + Add<Output = T>
{
    ix * n + iy
}

pub fn index1_to_2<T>(i: T, n: T) -> [T; 2]
where
    T: Div<Output = T> + Rem<Output = T> + Copy
{
    [i / n, i % n]
}
