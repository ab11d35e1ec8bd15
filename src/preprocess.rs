use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{DynamicImage, RgbImage};
use ndarray::{Array3, Array4, ArrayView3, Axis};

use crate::error::{ClassifyError, Result};

/// Memory order of the batched input tensor the network consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    /// batch, channel, height, width
    Nchw,
    /// batch, height, width, channel
    Nhwc,
}

/// The pixel transform a set of frozen weights was trained with.
///
/// Each channel value `v` in `0..=255` becomes `(v / 255 - mean) / std`.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessConfig {
    pub mean: [f32; 3],
    pub std: [f32; 3],
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub layout: TensorLayout,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self::imagenet()
    }
}

impl PreprocessConfig {
    /// Torchvision style ImageNet statistics, channels first.
    pub fn imagenet() -> Self {
        Self {
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
            height: 224,
            width: 224,
            channels: 3,
            layout: TensorLayout::Nchw,
        }
    }

    /// Keras "tf" mode: scales pixels into `[-1, 1]`, channels last.
    pub fn tf_scaled() -> Self {
        Self {
            mean: [0.5, 0.5, 0.5],
            std: [0.5, 0.5, 0.5],
            height: 224,
            width: 224,
            channels: 3,
            layout: TensorLayout::Nhwc,
        }
    }
}

/// A resized, normalized image in height x width x channel order.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pixels: Array3<f32>,
}

impl DecodedImage {
    pub fn shape(&self) -> (usize, usize, usize) {
        self.pixels.dim()
    }

    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.pixels.view()
    }

    /// Adds the leading batch dimension of size 1 and lays the data out for the network.
    pub fn to_batch(&self, layout: TensorLayout) -> Array4<f32> {
        match layout {
            TensorLayout::Nhwc => self.pixels.clone().insert_axis(Axis(0)),
            TensorLayout::Nchw => self
                .pixels
                .view()
                .permuted_axes([2, 0, 1])
                .insert_axis(Axis(0))
                .as_standard_layout()
                .into_owned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Processor {
    pub config: PreprocessConfig,
}

impl Processor {
    /// Create a new instance of the Processor struct
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Decode an encoded byte stream into a pixel grid.
    pub fn decode(&self, bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(ClassifyError::Decode("empty image data".to_string()));
        }
        Ok(image::load_from_memory(bytes)?)
    }

    /// Decode, convert to RGB, resize and apply the model transform.
    pub fn preprocess(&self, bytes: &[u8]) -> Result<DecodedImage> {
        let image = self.decode(bytes)?;
        self.preprocess_image(&image)
    }

    pub fn preprocess_image(&self, image: &DynamicImage) -> Result<DecodedImage> {
        // Drops alpha and expands grayscale.
        let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
        let resized = self.resize(&rgb)?;

        let PreprocessConfig { mean, std: scale, height, width, .. } = self.config;
        let pixels = Array3::from_shape_fn((height, width, 3), |(y, x, c)| {
            let value = resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0;
            (value - mean[c]) / scale[c]
        });
        Ok(DecodedImage { pixels })
    }

    fn resize(&self, image: &DynamicImage) -> Result<RgbImage> {
        let (width, height) = (self.config.width as u32, self.config.height as u32);
        let mut dst_image = Image::new(width, height, PixelType::U8x3);

        let resize_options =
            ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::CatmullRom));
        Resizer::new()
            .resize(image, &mut dst_image, Some(&resize_options))
            .map_err(|e| ClassifyError::Decode(format!("resize failed: {}", e)))?;

        RgbImage::from_raw(width, height, dst_image.buffer().to_vec())
            .ok_or_else(|| ClassifyError::Decode("resized buffer has the wrong size".to_string()))
    }
}
