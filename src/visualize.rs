//! PNG output for generated samples and decision regions.

use crate::nn::Layer;
use crate::tensor::Tensor;
use crate::train::{predict, TrainError};
use image::{GrayImage, ImageFormat, Luma, Rgb, RgbImage};
use log::info;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisualizeError {
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Model(#[from] TrainError),

    #[error("cannot draw an empty tensor")]
    Empty,

    #[error("image of {rows}x{cols} pixels is too large")]
    TooLarge { rows: usize, cols: usize },
}

pub type Result<T> = std::result::Result<T, VisualizeError>;

const CLASS_0: Rgb<u8> = Rgb([0, 0, 255]);
const CLASS_1: Rgb<u8> = Rgb([255, 0, 0]);

/// Min-max scales `tensor` to 0..=255, one pixel per element (row `i`
/// becomes image row `i`). A constant tensor renders black.
pub fn to_grayscale(tensor: &Tensor) -> Result<GrayImage> {
    if tensor.is_empty() {
        return Err(VisualizeError::Empty);
    }
    let too_large = || VisualizeError::TooLarge {
        rows: tensor.rows(),
        cols: tensor.cols(),
    };
    let width = u32::try_from(tensor.cols()).map_err(|_| too_large())?;
    let height = u32::try_from(tensor.rows()).map_err(|_| too_large())?;

    let min = tensor.iter().fold(f64::INFINITY, f64::min);
    let max = tensor.iter().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    let factor = if range > 0.0 && range.is_finite() {
        255.0 / range
    } else {
        0.0
    };

    let data = tensor.as_array();
    Ok(GrayImage::from_fn(width, height, |x, y| {
        let v = data[[y as usize, x as usize]];
        Luma([(factor * (v - min)) as u8])
    }))
}

/// Writes [`to_grayscale`] of `tensor` as a PNG file.
pub fn write_grayscale_png<P: AsRef<Path>>(tensor: &Tensor, path: P) -> Result<()> {
    let path = path.as_ref();
    to_grayscale(tensor)?.save_with_format(path, ImageFormat::Png)?;
    info!("wrote {}x{} image to {}", tensor.cols(), tensor.rows(), path.display());
    Ok(())
}

/// Classifies a `res × res` grid over the unit square. Pixel `(x, y)` shows
/// the class of the point
/// `(x / res, y / res)`: blue for class 0, red otherwise.
pub fn decision_map(network: &mut dyn Layer, res: u32) -> Result<RgbImage> {
    let mut img = RgbImage::new(res, res);
    let step = 1.0 / res as f64;
    for x in 0..res {
        for y in 0..res {
            let point = Tensor::column(&[x as f64 * step, y as f64 * step]);
            let colour = if predict(network, &point)? == 0 {
                CLASS_0
            } else {
                CLASS_1
            };
            img.put_pixel(x, y, colour);
        }
    }
    Ok(img)
}

pub fn draw_decision_map<P: AsRef<Path>>(network: &mut dyn Layer, res: u32, path: P) -> Result<()> {
    decision_map(network, res)?.save_with_format(path.as_ref(), ImageFormat::Png)?;
    Ok(())
}
