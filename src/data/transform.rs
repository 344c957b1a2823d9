// ============================================================
// Layer 4: Image Transform
// ============================================================
// The fixed geometric + photometric transform applied to every
// sample before it becomes a tensor:
//
//   1. resize to image_size       (bilinear; nearest for masks)
//   2. optional center crop       (must fit inside the resize)
//   3. normalisation              (ImageNet mean/std, or /255)
//   4. HWC → CHW flattening
//
// Depth maps get steps 1, 2 and 4 only: their values are metric
// coordinates, not intensities.

use image::{imageops, imageops::FilterType, GrayImage, ImageBuffer, Pixel, Rgb32FImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::domain::error::{DataError, DataResult};

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Photometric normalisation applied after the geometric steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputNormalization {
    /// Scale to [0, 1] only.
    None,
    /// Scale to [0, 1], then subtract the ImageNet mean and divide by its std.
    #[default]
    Imagenet,
}

impl fmt::Display for InputNormalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None     => f.write_str("none"),
            Self::Imagenet => f.write_str("imagenet"),
        }
    }
}

impl FromStr for InputNormalization {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none"     => Ok(Self::None),
            "imagenet" => Ok(Self::Imagenet),
            other => Err(DataError::UnsupportedValue {
                kind:  "normalization method",
                value: other.to_string(),
            }),
        }
    }
}

/// A transformed image in CHW layout.
#[derive(Debug, Clone, PartialEq)]
pub struct ChwImage {
    pub data:     Vec<f32>,
    pub channels: usize,
    pub height:   usize,
    pub width:    usize,
}

/// Resize → crop → normalise, with all sizes given as (height, width).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageTransform {
    pub image_size:    (u32, u32),
    pub center_crop:   Option<(u32, u32)>,
    pub normalization: InputNormalization,
}

impl Default for ImageTransform {
    fn default() -> Self {
        Self {
            image_size:    (256, 256),
            center_crop:   None,
            normalization: InputNormalization::Imagenet,
        }
    }
}

impl ImageTransform {
    /// Build a transform, rejecting empty sizes and crops larger than
    /// the resized image.
    pub fn new(
        image_size:    (u32, u32),
        center_crop:   Option<(u32, u32)>,
        normalization: InputNormalization,
    ) -> DataResult<Self> {
        let (h, w) = image_size;
        if h == 0 || w == 0 {
            return Err(DataError::InvalidTransform(format!(
                "image_size must be non-zero, got {h}x{w}"
            )));
        }
        if let Some((ch, cw)) = center_crop {
            if ch == 0 || cw == 0 || ch > h || cw > w {
                return Err(DataError::InvalidTransform(format!(
                    "center_crop {ch}x{cw} does not fit inside image_size {h}x{w}"
                )));
            }
        }
        Ok(Self { image_size, center_crop, normalization })
    }

    /// (height, width) of every tensor this transform produces.
    pub fn output_size(&self) -> (u32, u32) {
        self.center_crop.unwrap_or(self.image_size)
    }

    pub fn apply_rgb(&self, image: &RgbImage) -> ChwImage {
        let resized = self.geometry(image, FilterType::Triangle);
        let (w, h)  = resized.dimensions();
        let plane   = (w * h) as usize;

        let mut data = vec![0.0f32; 3 * plane];
        for (x, y, px) in resized.enumerate_pixels() {
            let offset = (y * w + x) as usize;
            for c in 0..3 {
                let v = px[c] as f32 / 255.0;
                data[c * plane + offset] = match self.normalization {
                    InputNormalization::None     => v,
                    InputNormalization::Imagenet => (v - IMAGENET_MEAN[c]) / IMAGENET_STD[c],
                };
            }
        }

        ChwImage { data, channels: 3, height: h as usize, width: w as usize }
    }

    /// Masks are resized with nearest neighbour and scaled to {0, 1}.
    pub fn apply_mask(&self, mask: &GrayImage) -> ChwImage {
        let resized = self.geometry(mask, FilterType::Nearest);
        let (w, h)  = resized.dimensions();
        let data    = resized.pixels().map(|p| p[0] as f32 / 255.0).collect();
        ChwImage { data, channels: 1, height: h as usize, width: w as usize }
    }

    /// Depth maps: geometry only, values untouched.
    pub fn apply_depth(&self, depth: &Rgb32FImage) -> ChwImage {
        let resized = self.geometry(depth, FilterType::Triangle);
        let (w, h)  = resized.dimensions();
        let plane   = (w * h) as usize;

        let mut data = vec![0.0f32; 3 * plane];
        for (x, y, px) in resized.enumerate_pixels() {
            let offset = (y * w + x) as usize;
            for c in 0..3 {
                data[c * plane + offset] = px[c];
            }
        }

        ChwImage { data, channels: 3, height: h as usize, width: w as usize }
    }

    fn geometry<P>(
        &self,
        image:  &ImageBuffer<P, Vec<P::Subpixel>>,
        filter: FilterType,
    ) -> ImageBuffer<P, Vec<P::Subpixel>>
    where
        P: Pixel + 'static,
    {
        let (h, w)  = self.image_size;
        let resized = imageops::resize(image, w, h, filter);

        match self.center_crop {
            Some((ch, cw)) => {
                let x = (w - cw) / 2;
                let y = (h - ch) / 2;
                imageops::crop_imm(&resized, x, y, cw, ch).to_image()
            }
            None => resized,
        }
    }
}
