// src/services/media_processor.rs
use crate::errors::RetouchError;
use crate::models::Media;
use crate::services::region::MaskRegion;
use image::{DynamicImage, GenericImageView, GrayImage, ImageFormat as ImgFormat, Luma};

/// Side of the thumbnail used for frame feature summaries.
const FEATURE_THUMB: u32 = 8;
const LUMA_BINS: usize = 16;

pub struct MediaProcessor;

impl Default for MediaProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn probe_dimensions(&self, data: &[u8]) -> Result<(u32, u32), RetouchError> {
        let img = self.decode(data)?;
        Ok(img.dimensions())
    }

    /// Downscales images whose long edge exceeds `max_edge`. Videos and images
    /// already within bounds pass through unchanged.
    pub fn prepare_for_model(&self, media: &Media, max_edge: u32) -> Result<Media, RetouchError> {
        if media.is_video() {
            return Ok(media.clone());
        }

        let img = self.decode(&media.data)?;
        let (width, height) = img.dimensions();

        if width <= max_edge && height <= max_edge {
            return Ok(media.clone());
        }

        let ratio = (max_edge as f32 / width.max(height) as f32).min(1.0);
        let new_width = ((width as f32 * ratio) as u32).max(1);
        let new_height = ((height as f32 * ratio) as u32).max(1);

        let resized = img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3);
        Ok(Media::new(self.encode_png(&resized)?, "image/png"))
    }

    /// Feature summary for scene grouping: an 8x8 RGB thumbnail followed by a
    /// normalised 16-bin luma histogram, all in 0..=1.
    pub fn frame_features(&self, data: &[u8]) -> Result<Vec<f32>, RetouchError> {
        let img = self.decode(data)?;

        let thumb = img
            .resize_exact(
                FEATURE_THUMB,
                FEATURE_THUMB,
                image::imageops::FilterType::Triangle,
            )
            .to_rgb8();
        let mut features = Vec::with_capacity((FEATURE_THUMB * FEATURE_THUMB * 3) as usize + LUMA_BINS);
        for pixel in thumb.pixels() {
            features.extend(pixel.0.iter().map(|c| *c as f32 / 255.0));
        }

        let luma = img.to_luma8();
        let mut hist = [0u32; LUMA_BINS];
        for pixel in luma.pixels() {
            hist[pixel[0] as usize * LUMA_BINS / 256] += 1;
        }
        let total = (luma.width() as u64 * luma.height() as u64).max(1) as f32;
        features.extend(hist.iter().map(|count| *count as f32 / total));

        Ok(features)
    }

    /// White-on-black PNG mask of `region` on a `width` x `height` canvas.
    pub fn render_mask(
        &self,
        region: &MaskRegion,
        width: u32,
        height: u32,
    ) -> Result<Vec<u8>, RetouchError> {
        if width == 0 || height == 0 {
            return Err(RetouchError::ImageProcessing(
                "Cannot render a mask for an empty canvas".to_string(),
            ));
        }
        let x_end = region.x.saturating_add(region.width).min(width);
        let y_end = region.y.saturating_add(region.height).min(height);

        let mask = GrayImage::from_fn(width, height, |x, y| {
            if x >= region.x && x < x_end && y >= region.y && y < y_end {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        });

        self.encode_png(&DynamicImage::ImageLuma8(mask))
    }

    pub fn decode(&self, data: &[u8]) -> Result<DynamicImage, RetouchError> {
        image::load_from_memory(data)
            .map_err(|e| RetouchError::ImageProcessing(format!("Invalid image format: {}", e)))
    }

    pub fn encode_png(&self, img: &DynamicImage) -> Result<Vec<u8>, RetouchError> {
        let mut output = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut output), ImgFormat::Png)
            .map_err(|e| RetouchError::ImageProcessing(format!("Failed to encode image: {}", e)))?;
        Ok(output)
    }
}
