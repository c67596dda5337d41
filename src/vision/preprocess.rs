//! Image preprocessing for recognition models
//!
//! Handles resizing, normalization, and tensor layout conversion for
//! PaddleOCR-style models.

use image::imageops::{self, FilterType};
use image::RgbaImage;
use ndarray::{Array4, ArrayView4};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

/// Number of colour channels fed to the model (alpha is dropped)
pub const RGB_CHANNELS: usize = 3;

/// Resampling filter used for every resize. Catmull-Rom is bicubic; the
/// recognition models lose accuracy noticeably with nearest-neighbour.
const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

/// Model input size (width x height)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetShape {
    pub width: u32,
    pub height: u32,
}

impl TargetShape {
    /// Input shape of the recognition models
    pub const RECOGNITION: TargetShape = TargetShape { width: 320, height: 48 };
    /// Input shape of the detection models
    pub const DETECTION: TargetShape = TargetShape { width: 640, height: 640 };

    /// Create a validated target shape
    pub fn new(width: u32, height: u32) -> Result<Self, ConfigError> {
        let shape = Self { width, height };
        shape.validate()?;
        Ok(shape)
    }

    /// Reject zero-sized targets
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Number of floats in a 1x3xHxW tensor of this shape
    pub fn tensor_len(&self) -> usize {
        RGB_CHANNELS * self.width as usize * self.height as usize
    }
}

impl Default for TargetShape {
    fn default() -> Self {
        Self::RECOGNITION
    }
}

/// Per-sample normalization applied while building the tensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Normalization {
    /// `x / 255`, values in [0, 1]
    UnitRange,
    /// `((x / 255) - mean) / std`, per channel
    MeanStd { mean: [f32; 3], std: [f32; 3] },
}

impl Normalization {
    /// Constants expected by Paddle Lite models: maps [0, 255] to [-1, 1]
    pub const PADDLE_LITE: Normalization = Normalization::MeanStd {
        mean: [0.5, 0.5, 0.5],
        std: [0.5, 0.5, 0.5],
    };

    #[inline]
    fn apply(&self, channel: usize, sample: u8) -> f32 {
        let value = sample as f32 / 255.0;
        match self {
            Normalization::UnitRange => value,
            Normalization::MeanStd { mean, std } => (value - mean[channel]) / std[channel],
        }
    }
}

/// Memory order of a tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    /// `[1, 3, H, W]`, planar
    Nchw,
    /// `[1, H, W, 3]`, interleaved
    Nhwc,
}

/// Model input tensor with batch size 1
#[derive(Debug, Clone)]
pub struct Tensor {
    data: Array4<f32>,
    layout: TensorLayout,
}

impl Tensor {
    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    /// Shape in the tensor's own layout
    pub fn shape(&self) -> [usize; 4] {
        let dim = self.data.dim();
        [dim.0, dim.1, dim.2, dim.3]
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn height(&self) -> usize {
        match self.layout {
            TensorLayout::Nchw => self.data.dim().2,
            TensorLayout::Nhwc => self.data.dim().1,
        }
    }

    pub fn width(&self) -> usize {
        match self.layout {
            TensorLayout::Nchw => self.data.dim().3,
            TensorLayout::Nhwc => self.data.dim().2,
        }
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    /// Values flattened in logical (row-major) order of the current layout
    pub fn to_flat(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }

    /// Convert a planar tensor to interleaved order: for each pixel the
    /// R, G, B values end up contiguous. Already-NHWC tensors are cloned.
    pub fn to_nhwc(&self) -> Tensor {
        match self.layout {
            TensorLayout::Nhwc => self.clone(),
            TensorLayout::Nchw => Tensor {
                data: self
                    .data
                    .view()
                    .permuted_axes([0, 2, 3, 1])
                    .as_standard_layout()
                    .into_owned(),
                layout: TensorLayout::Nhwc,
            },
        }
    }
}

/// Resize an RGBA image to `target` (aspect ratio is deliberately not
/// preserved) and build a normalized NCHW tensor. Alpha is discarded.
pub fn preprocess(
    image: &RgbaImage,
    target: TargetShape,
    normalization: Normalization,
) -> Result<Tensor, ConfigError> {
    target.validate()?;

    let (src_w, src_h) = image.dimensions();
    let (width, height) = (target.width, target.height);

    let resized = if src_w == 0 || src_h == 0 {
        debug!("Empty source image, producing a black {}x{} input", width, height);
        RgbaImage::new(width, height)
    } else if (src_w, src_h) == (width, height) {
        image.clone()
    } else {
        debug!("Resizing {}x{} -> {}x{}", src_w, src_h, width, height);
        imageops::resize(image, width, height, RESIZE_FILTER)
    };

    let shape = (1, RGB_CHANNELS, height as usize, width as usize);
    let data = Array4::from_shape_fn(shape, |(_, c, y, x)| {
        let pixel = resized.get_pixel(x as u32, y as u32);
        normalization.apply(c, pixel[c])
    });

    Ok(Tensor {
        data,
        layout: TensorLayout::Nchw,
    })
}

/// Preprocess for the recognition models (320x48)
pub fn preprocess_for_recognition(image: &RgbaImage) -> Result<Tensor, ConfigError> {
    preprocess(image, TargetShape::RECOGNITION, Normalization::UnitRange)
}

/// Preprocess for the detection models (640x640)
pub fn preprocess_for_detection(image: &RgbaImage) -> Result<Tensor, ConfigError> {
    preprocess(image, TargetShape::DETECTION, Normalization::UnitRange)
}
