// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Image decoding into tightly packed RGBA8 pixels.

use crate::error::IoError;
use strata_core::math::Extent2D;
use strata_core::renderer::TextureFormat;

/// Decoded pixels ready for a texture upload.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuImage {
    /// Row-major RGBA8 texels.
    pub pixels: Vec<u8>,
    /// Dimensions in texels.
    pub size: Extent2D,
    /// Format of `pixels`.
    pub format: TextureFormat,
}

impl CpuImage {
    /// A 1×1 image of one color.
    pub fn solid(rgba: [u8; 4], format: TextureFormat) -> Self {
        Self {
            pixels: rgba.to_vec(),
            size: Extent2D::new(1, 1),
            format,
        }
    }

    /// Size of `pixels` in bytes.
    pub fn byte_size(&self) -> usize {
        self.pixels.len()
    }
}

/// Decodes the image formats the texture pool accepts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageLoader {
    /// Tag color images as sRGB.
    pub srgb: bool,
}

impl ImageLoader {
    /// Format hints (lowercase extensions) the loader can decode.
    pub const SUPPORTED: &'static [&'static str] =
        &["png", "jpg", "jpeg", "bmp", "tga", "gif", "ico", "webp"];

    /// A loader producing sRGB color textures.
    pub fn srgb() -> Self {
        Self { srgb: true }
    }

    /// Returns `true` if `hint` names a decodable format.
    pub fn supports(hint: &str) -> bool {
        let hint = hint.trim_start_matches('.');
        Self::SUPPORTED
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(hint))
    }

    /// Decodes `bytes`, using `hint` to pick the decoder when it is known.
    ///
    /// ## Errors
    /// [`IoError::UnsupportedImage`] for an unknown hint, [`IoError::Image`]
    /// when decoding fails.
    pub fn decode(&self, bytes: &[u8], hint: &str) -> Result<CpuImage, IoError> {
        if !hint.is_empty() && !Self::supports(hint) {
            return Err(IoError::UnsupportedImage(hint.to_string()));
        }
        let decoded = match image::ImageFormat::from_extension(hint.trim_start_matches('.')) {
            Some(format) => image::load_from_memory_with_format(bytes, format)?,
            None => image::load_from_memory(bytes)?,
        };
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        log::trace!("Decoded {width}x{height} '{hint}' image.");
        Ok(CpuImage {
            pixels: rgba.into_raw(),
            size: Extent2D::new(width, height),
            format: if self.srgb {
                TextureFormat::Rgba8UnormSrgb
            } else {
                TextureFormat::Rgba8Unorm
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn decodes_png_to_rgba8() {
        let image = ImageLoader::srgb().decode(&png(3, 2, [10, 20, 30, 255]), "png").unwrap();
        assert_eq!(image.size, Extent2D::new(3, 2));
        assert_eq!(image.format, TextureFormat::Rgba8UnormSrgb);
        assert_eq!(image.byte_size(), 24);
        assert_eq!(&image.pixels[..4], &[10, 20, 30, 255]);
    }

    #[test]
    fn hints_are_checked() {
        assert!(ImageLoader::supports("PNG"));
        assert!(ImageLoader::supports(".jpg"));
        assert!(!ImageLoader::supports("exr"));
        assert!(matches!(
            ImageLoader::default().decode(&[], "exr"),
            Err(IoError::UnsupportedImage(_))
        ));
        assert!(matches!(
            ImageLoader::default().decode(&[1, 2, 3], "png"),
            Err(IoError::Image(_))
        ));
    }
}
