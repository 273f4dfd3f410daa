//! Figures of merit for judging reconstructions.

use crate::{
    error::{ReconError, Result},
    image::{Image, ImageData},
    projector::Projector,
    types::{Intensityf32, Lengthf32, Point, Ratiof32},
};

pub use crate::penalty::penalty_value as roughness;

/// Mean squared difference between corresponding pixels
pub fn mse(image: &Image, truth: &Image) -> Result<Intensityf32> {
    if image.grid != truth.grid {
        return Err(ReconError::InvalidShape(format!(
            "cannot compare {n}x{n} image with {m}x{m} image", n = image.grid.n, m = truth.grid.n
        )));
    }
    let sum: f64 = image.data.iter().zip(&truth.data)
        .map(|(a, b)| ((a - b) as f64).powi(2))
        .sum();
    Ok((sum / image.data.len() as f64) as Intensityf32)
}

/// ‖A x - y‖ / ‖y‖: how far the projections of `image` are from the
/// measurement. The plain norm of the difference, if the measurement is all
/// zero.
pub fn projection_residual(projector: &Projector, image: &Image, measured: &[Intensityf32]) -> Ratiof32 {
    let expected = projector.forward_project(image);
    let difference: f64 = expected.iter().zip(measured)
        .map(|(e, y)| ((e - y) as f64).powi(2))
        .sum();
    let norm: f64 = measured.iter().map(|&y| (y as f64).powi(2)).sum();
    let residual = if norm > 0.0 { (difference / norm).sqrt() } else { difference.sqrt() };
    residual as Ratiof32
}

/// Σ y ln ŷ - ŷ over all rays, dropping terms which do not depend on the
/// image. Rays with measured counts whose simulated projection is zero are
/// skipped, as they are by the reconstruction.
pub fn poisson_log_likelihood(projector: &Projector, image: &Image, measured: &[Intensityf32]) -> f64 {
    projector.forward_project(image).iter().zip(measured)
        .map(|(&expected, &y)| {
            let (expected, y) = (expected as f64, y as f64);
            if y == 0.0             { -expected }
            else if expected > 0.0  { y * expected.ln() - expected }
            else                    { 0.0 }
        })
        .sum()
}

#[derive(Clone, Debug)]
pub enum ROI {
    Disk((Lengthf32, Lengthf32), Lengthf32),
    /// Centre, inner radius, outer radius
    Annulus((Lengthf32, Lengthf32), Lengthf32, Lengthf32),
}

impl ROI {
    pub fn contains(&self, p: Point) -> bool {
        let distance2 = |(cx, cy): (Lengthf32, Lengthf32)| {
            let (x, y) = (p.x - cx, p.y - cy);
            x*x + y*y
        };
        match *self {
            ROI::Disk(centre, r) => distance2(centre) < r*r,
            ROI::Annulus(centre, inner, outer) => {
                let d2 = distance2(centre);
                inner*inner <= d2 && d2 < outer*outer
            }
        }
    }
}

impl Image {

    pub fn values_inside_roi(&self, roi: &ROI) -> ImageData {
        self.data.iter().copied()
            .enumerate()
            .filter(|&(index, _)| roi.contains(self.grid.pixel_centre1(index)))
            .map(|(_, value)| value)
            .collect()
    }

    /// Contrast recovery coefficients of `rois`, whose true activities are
    /// `roi_activities`, relative to the mean of the `background_rois`. `None`
    /// if any ROI contains no pixel centres.
    pub fn roi_crcs(
        &self,
        rois           : &[ROI], roi_activities     : &[Intensityf32],
        background_rois: &[ROI], background_activity:  Intensityf32,
    ) -> Option<Vec<Ratiof32>> {
        let background_means = background_rois.iter()
            .map(|roi| mean(&self.values_inside_roi(roi)))
            .collect::<Option<Vec<_>>>()?;
        let background_measured = mean(&background_means)?;

        rois.iter().zip(roi_activities)
            .map(|(roi, &roi_activity)| {
                let roi_measured = mean(&self.values_inside_roi(roi))?;
                Some(((roi_measured / background_measured) - 1.0) /
                     ((roi_activity / background_activity) - 1.0))
            })
            .collect()
    }
}

pub fn mean(data: &[Intensityf32]) -> Option<Intensityf32> {
    (!data.is_empty()).then(|| data.iter().sum::<Intensityf32>() / data.len() as Intensityf32)
}
