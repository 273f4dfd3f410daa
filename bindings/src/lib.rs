use numpy::{IntoPyArray, PyArray3, PyReadonlyArray1, PyReadonlyArray3};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

/// Penalized maximum-likelihood reconstruction of parallel-beam projections.
///
/// Args:
///     data:        projections, shape (projections, slices, detector pixels)
///     theta:       projection angles in radians, one per projection
///     center:      detector pixel coordinate of the rotation axis
///     num_grid:    side length of the reconstructed slices, in pixels
///     iters:       number of iterations
///     beta:        strength of the quadratic smoothing penalty
///     init_matrix: initial estimate, shape (slices, num_grid, num_grid)
///
/// Returns:
///     The reconstruction, with the shape of `init_matrix`
#[pyfunction]
#[allow(clippy::too_many_arguments)]
fn pml<'py>(
    py         : Python<'py>,
    data       : PyReadonlyArray3<'py, f32>,
    theta      : PyReadonlyArray1<'py, f32>,
    center     : f32,
    num_grid   : i32,
    iters      : i32,
    beta       : f32,
    init_matrix: PyReadonlyArray3<'py, f32>,
) -> PyResult<Bound<'py, PyArray3<f32>>> {
    let (data, theta, init) = (data.as_array(), theta.as_array(), init_matrix.as_array());
    let reconstruction = py
        .allow_threads(|| apml::reconstruct(data, theta, center, num_grid, iters, beta, init))
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    Ok(reconstruction.into_pyarray_bound(py))
}

#[pymodule]
#[pyo3(name = "pml")]
/// Accelerated penalized maximum-likelihood tomographic reconstruction
fn pml_module(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(pml, m)?)?;
    Ok(())
}
