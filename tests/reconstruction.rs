use ndarray::{s, Array1, Array3, Axis};
use float_eq::assert_float_eq;
use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_isaac::IsaacRng;

use apml::{
    apml::{Reconstructor, Settings, Solver},
    fom::{self, ROI},
    geometry::Acquisition,
    grid::Grid,
    image::Image,
    penalty::Penalty,
    phantom::{add_poisson_noise, Phantom},
    projector::Projector,
    system_matrix::{Siddon, SystemMatrixKind},
    reconstruct, Config,
};

struct Problem {
    grid: Grid,
    acquisition: Acquisition,
    projector: Projector,
    truth: Image,
    data: Array3<f32>,
}

impl Problem {
    fn disk(n: usize, n_angles: usize, radius: f32, n_slices: usize) -> Self {
        let grid = Grid::new(n);
        let acquisition = Acquisition::evenly_spaced(n_angles, n);
        let projector = Projector::new::<Siddon>(&acquisition, grid);
        let phantom = Phantom::disk(radius, 1.0);
        let truth = phantom.rasterize(grid);
        let data = phantom.projection_data(&projector, n_angles, n_slices);
        Self { grid, acquisition, projector, truth, data }
    }

    fn theta(&self) -> Array1<f32> { Array1::from(self.acquisition.angles.clone()) }

    fn ones(&self) -> Array3<f32> {
        let n_slices = self.data.len_of(Axis(1));
        Array3::ones((n_slices, self.grid.n, self.grid.n))
    }

    fn slice(&self, volume: &Array3<f32>, s: usize) -> Image {
        Image::from_array(self.grid, volume.index_axis(Axis(0), s)).unwrap()
    }

    fn sinogram(&self, s: usize) -> Vec<f32> {
        self.data.index_axis(Axis(1), s).iter().copied().collect()
    }

    fn run(&self, iters: i32, beta: f32) -> Array3<f32> {
        let center = self.acquisition.center;
        reconstruct(self.data.view(), self.theta().view(), center, self.grid.n as i32, iters, beta, self.ones().view()).unwrap()
    }
}

#[test]
fn output_has_shape_of_initial_estimate() {
    let problem = Problem::disk(12, 10, 4.0, 3);
    let result = problem.run(2, 0.1);
    assert_eq!(result.dim(), (3, 12, 12));
}

#[test]
fn zero_iterations_return_initial_estimate() {
    let problem = Problem::disk(10, 8, 3.0, 2);
    let mut rng = IsaacRng::seed_from_u64(7);
    let init = Array3::from_shape_fn((2, 10, 10), |_| rng.gen_range(0.0..5.0_f32));
    let result = reconstruct(problem.data.view(), problem.theta().view(), 5.0, 10, 0, 0.5, init.view()).unwrap();
    assert_eq!(result, init);
}

#[test]
fn disk_phantom_is_recovered() {
    let problem = Problem::disk(64, 180, 20.0, 2);
    let result = problem.run(50, 0.01);
    for s in 0..2 {
        let image = problem.slice(&result, s);
        let mse = fom::mse(&image, &problem.truth).unwrap();
        assert!(mse < 0.01, "slice {s}: MSE {mse}");

        let interior   = fom::mean(&image.values_inside_roi(&ROI::Disk((0.0, 0.0), 15.0))).unwrap();
        let background = fom::mean(&image.values_inside_roi(&ROI::Annulus((0.0, 0.0), 24.0, 31.0))).unwrap();
        assert_float_eq!(interior, 1.0, abs <= 0.05);
        assert!(background < 0.1, "slice {s}: background {background}");
    }
    // Identical slices give the same reconstruction, up to the order of
    // floating-point sums
    assert_float_eq!(problem.slice(&result, 0).data, problem.slice(&result, 1).data, abs_all <= 1e-3);
}

#[test]
fn consistent_uniform_image_is_kept() {
    // Data which are exactly the projections of a uniform image, with that
    // image as the initial estimate
    let (n, n_angles, n_slices, value) = (16, 20, 2, 2.0);
    let grid = Grid::new(n);
    let acquisition = Acquisition::evenly_spaced(n_angles, n);
    let projector = Projector::new::<Siddon>(&acquisition, grid);
    let sinogram = projector.forward_project(&Image::new(grid, vec![value; grid.size()]).unwrap());
    let data = Array3::from_shape_fn((n_angles, n_slices, n), |(p, _, d)| sinogram[p * n + d]);
    let theta = Array1::from(acquisition.angles.clone());
    let init = Array3::from_elem((n_slices, n, n), value);
    for beta in [0.0, 0.3, 5.0] {
        let result = reconstruct(data.view(), theta.view(), acquisition.center, n as i32, 10, beta, init.view()).unwrap();
        assert_float_eq!(result.into_raw_vec(), init.clone().into_raw_vec(), rmax_all <= 1e-3, "beta = {beta}");
    }
}

#[test]
fn reconstruction_scales_with_data() {
    let problem = Problem::disk(32, 60, 10.0, 1);
    let reference = problem.run(10, 0.0);
    assert!(reference.sum() > 100.0);

    let scale = 1e-8;
    let data = problem.data.mapv(|y| y * scale);
    let init = problem.ones().mapv(|x| x * scale);
    let scaled = reconstruct(data.view(), problem.theta().view(), problem.acquisition.center, 32, 10, 0.0, init.view()).unwrap();
    let rescaled = scaled.mapv(|x| x / scale);
    assert_float_eq!(rescaled.into_raw_vec(), reference.into_raw_vec(), abs_all <= 1e-3);
}

#[test]
fn uniform_problem_is_point_symmetric() {
    let n = 16;
    let n_angles = 12;
    let data = Array3::from_elem((n_angles, 1, n), 3.0);
    let theta = Array1::from(Acquisition::evenly_spaced(n_angles, n).angles);
    let init = Array3::ones((1, n, n));
    let result = reconstruct(data.view(), theta.view(), n as f32 / 2.0, n as i32, 10, 0.2, init.view()).unwrap();
    for i in 0..n {
        for j in 0..n {
            let (a, b) = (result[[0, i, j]], result[[0, n - 1 - i, n - 1 - j]]);
            assert_float_eq!(a, b, abs <= 1e-4, rmax <= 1e-3, "pixel [{i}, {j}]");
        }
    }
}

#[test]
fn residual_decreases_with_iterations() {
    let problem = Problem::disk(32, 60, 10.0, 1);
    let measured = problem.sinogram(0);
    let residuals: Vec<f32> = [5, 20, 50].into_iter()
        .map(|iters| {
            let result = problem.run(iters, 0.0);
            fom::projection_residual(&problem.projector, &problem.slice(&result, 0), &measured)
        })
        .collect();
    println!("{residuals:?}");
    assert!(residuals[1] <= residuals[0]);
    assert!(residuals[2] <= residuals[1]);
}

#[test]
fn unpenalized_likelihood_never_decreases() {
    let mut problem = Problem::disk(16, 30, 5.0, 1);
    problem.data.mapv_inplace(|y| 10.0 * y);
    add_poisson_noise(&mut problem.data, &mut IsaacRng::seed_from_u64(1234));
    let measured = problem.sinogram(0);

    let settings = Settings { beta: 0.0, penalty: Penalty::Quadratic };
    let solver = Solver::new(&problem.projector, measured.clone(), Image::ones(problem.grid), settings);
    let mut previous = fom::poisson_log_likelihood(&problem.projector, &Image::ones(problem.grid), &measured);
    for image in solver.iterations().take(10) {
        let current = fom::poisson_log_likelihood(&problem.projector, &image, &measured);
        assert!(current >= previous - 1e-5 * previous.abs(), "{current} < {previous}");
        previous = current;
    }
}

#[test]
fn penalty_smooths_noisy_reconstructions() {
    let mut problem = Problem::disk(32, 45, 10.0, 1);
    problem.data.mapv_inplace(|y| 5.0 * y);
    add_poisson_noise(&mut problem.data, &mut IsaacRng::seed_from_u64(99));

    let roughness = |beta| {
        let result = problem.run(20, beta);
        fom::roughness(&problem.slice(&result, 0), Penalty::Quadratic)
    };
    let (rough, smooth) = (roughness(0.0), roughness(50.0));
    assert!(smooth < rough, "beta = 50: {smooth}, beta = 0: {rough}");
}

#[test]
fn joseph_projector_with_hybrid_penalty() {
    let problem = Problem::disk(32, 90, 10.0, 1);
    let config = Config {
        beta: 0.01,
        penalty: Penalty::Hybrid { delta: 0.1 },
        projector: SystemMatrixKind::Joseph,
        threads: Some(2),
        ..Config::new(30, 32)
    };
    let result = Reconstructor::new(config).unwrap()
        .run(problem.data.view(), problem.theta().view(), problem.ones().view())
        .unwrap();
    let image = problem.slice(&result, 0);
    assert!(image.is_finite());
    let mse = fom::mse(&image, &problem.truth).unwrap();
    assert!(mse < 0.03, "MSE {mse}");
}

#[test]
fn off_detector_center_still_reconstructs() {
    let problem = Problem::disk(8, 6, 2.0, 1);
    let result = reconstruct(problem.data.view(), problem.theta().view(), -3.0, 8, 3, 0.1, problem.ones().view()).unwrap();
    assert!(result.iter().all(|x| x.is_finite() && *x >= 0.0));
}

#[test]
fn padded_detector_with_shifted_center() {
    // Empty detector pixels on one side, with the centre of rotation moved
    // along with the data
    let problem = Problem::disk(32, 60, 10.0, 1);
    let pad = 4;
    let (n_angles, n_slices, n_pixels) = problem.data.dim();
    let mut padded = Array3::zeros((n_angles, n_slices, n_pixels + pad));
    padded.slice_mut(s![.., .., pad..]).assign(&problem.data);

    let run = |center: f32| {
        let result = reconstruct(padded.view(), problem.theta().view(), center, 32, 30, 0.0, problem.ones().view()).unwrap();
        problem.slice(&result, 0)
    };
    let shifted = run(problem.acquisition.center + pad as f32);

    // The default centre, in the middle of the padded detector, is wrong
    let misaligned = run((n_pixels + pad) as f32 / 2.0);
    let good = fom::mse(&shifted,    &problem.truth).unwrap();
    let bad  = fom::mse(&misaligned, &problem.truth).unwrap();
    assert!(good < 0.02, "MSE {good}");
    assert!(2.0 * good < bad, "shifted centre: {good}, default centre: {bad}");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]
    #[test]
    fn reconstructions_are_non_negative(
        n        in 2..8_usize,
        n_angles in 1..6_usize,
        n_pixels in 2..8_usize,
        n_slices in 1..3_usize,
        iters    in 0..5_i32,
        beta     in 0.0..2.0_f32,
        seed     in any::<u64>(),
    ) {
        let mut rng = IsaacRng::seed_from_u64(seed);
        let data = Array3::from_shape_fn((n_angles, n_slices, n_pixels), |_| {
            if rng.gen_bool(0.2) { 0.0 } else { rng.gen_range(0.0..10.0_f32) }
        });
        let init = Array3::from_shape_fn((n_slices, n, n), |_| rng.gen_range(0.0..3.0_f32));
        let theta = Array1::from_shape_fn(n_angles, |_| rng.gen_range(0.0..std::f32::consts::PI));
        let center = n_pixels as f32 / 2.0;
        let result = reconstruct(data.view(), theta.view(), center, n as i32, iters, beta, init.view()).unwrap();
        prop_assert_eq!(result.dim(), (n_slices, n, n));
        prop_assert!(result.iter().all(|x| x.is_finite() && *x >= 0.0));
    }
}
