//! Raster images and their encoders.

use super::error::{Error, Result};
use image::{ExtendedColorType, ImageEncoder};
use std::path::Path;

/// RGBA8 raster with straight alpha, rows top to bottom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Image {
    /// Wrap an RGBA8 buffer of exactly `width * height * 4` bytes.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(Error::RawSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// RGBA of the pixel at (x, y).
    #[cfg(test)]
    pub(crate) fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.data[i..i + 4].try_into().ok()
    }

    /// Encode as `format`, e.g. `png`, `png24`, `jpeg80`, `png256:m=h`.
    pub fn encode(&self, format: &str) -> Result<Vec<u8>> {
        let format = ImageFormat::parse(format)?;
        let mut out = Vec::new();
        match format {
            ImageFormat::Png => {
                image::codecs::png::PngEncoder::new(&mut out)
                    .write_image(&self.data, self.width, self.height, ExtendedColorType::Rgba8)?;
            }
            #[cfg(feature = "jpeg")]
            ImageFormat::Jpeg { quality } => {
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality)
                    .write_image(&self.rgb(), self.width, self.height, ExtendedColorType::Rgb8)?;
            }
            #[cfg(feature = "tiff")]
            ImageFormat::Tiff => {
                image::codecs::tiff::TiffEncoder::new(std::io::Cursor::new(&mut out))
                    .write_image(&self.data, self.width, self.height, ExtendedColorType::Rgba8)?;
            }
            #[cfg(feature = "webp")]
            ImageFormat::Webp => {
                image::codecs::webp::WebPEncoder::new_lossless(&mut out)
                    .write_image(&self.data, self.width, self.height, ExtendedColorType::Rgba8)?;
            }
        }
        Ok(out)
    }

    /// Encode and write to `path`. An empty format is guessed from the extension.
    pub fn save(&self, path: &Path, format: &str) -> Result<()> {
        let format = if format.is_empty() {
            guess_format(path)?
        } else {
            format
        };
        let bytes = self.encode(format)?;
        std::fs::write(path, bytes)
            .map_err(|e| Error::io(format!("failed to write '{}'", path.display()), e))
    }

    #[cfg(feature = "jpeg")]
    fn rgb(&self) -> Vec<u8> {
        self.data
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect()
    }
}

/// An output encoding selected by a format string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// 32-bit RGBA. Every png variant, including `png24`, keeps alpha.
    Png,
    #[cfg(feature = "jpeg")]
    Jpeg { quality: u8 },
    #[cfg(feature = "tiff")]
    Tiff,
    #[cfg(feature = "webp")]
    Webp,
}

#[cfg(feature = "jpeg")]
const DEFAULT_JPEG_QUALITY: u8 = 85;

impl ImageFormat {
    pub fn parse(format: &str) -> Result<Self> {
        let unknown = || Error::UnknownImageFormat(format.to_string());
        let mut parts = format.trim().split(':');
        let name = parts.next().unwrap_or_default().to_ascii_lowercase();
        let options: Vec<&str> = parts.collect();

        match name.as_str() {
            "png" | "png24" | "png32" => Ok(ImageFormat::Png),
            "png8" | "png256" => {
                log::debug!("'{name}' is written as full color png, palette output is not supported");
                Ok(ImageFormat::Png)
            }
            #[cfg(feature = "jpeg")]
            n if n.starts_with("jpeg") || n.starts_with("jpg") => {
                let digits = n.trim_start_matches("jpeg").trim_start_matches("jpg");
                let mut quality = if digits.is_empty() {
                    DEFAULT_JPEG_QUALITY
                } else {
                    digits.parse::<u8>().map_err(|_| unknown())?
                };
                for opt in &options {
                    if let Some(q) = opt.strip_prefix("quality=") {
                        quality = q.parse::<u8>().map_err(|_| unknown())?;
                    }
                }
                if !(1..=100).contains(&quality) {
                    return Err(unknown());
                }
                Ok(ImageFormat::Jpeg { quality })
            }
            #[cfg(feature = "tiff")]
            "tiff" | "tif" => Ok(ImageFormat::Tiff),
            #[cfg(feature = "webp")]
            "webp" => Ok(ImageFormat::Webp),
            _ => Err(unknown()),
        }
    }
}

fn guess_format(path: &Path) -> Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Ok("png"),
        "jpg" | "jpeg" => Ok("jpeg"),
        "tif" | "tiff" => Ok("tiff"),
        "webp" => Ok("webp"),
        _ => Err(Error::UnknownImageFormat(path.display().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker() -> Image {
        let mut data = Vec::new();
        for y in 0..4u8 {
            for x in 0..4u8 {
                let on = (x + y) % 2 == 0;
                data.extend_from_slice(if on { &[255, 0, 0, 255] } else { &[0, 0, 255, 128] });
            }
        }
        Image::from_rgba(4, 4, data).unwrap()
    }

    #[test]
    fn test_from_rgba_checks_length() {
        assert!(matches!(
            Image::from_rgba(2, 2, vec![0; 15]),
            Err(Error::RawSize { expected: 16, actual: 15 })
        ));
    }

    #[test]
    fn test_png_preserves_pixels() {
        let img = checker();
        let bytes = img.encode("png").unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.as_raw(), img.data());
    }

    #[test]
    fn test_png24_keeps_alpha() {
        let img = Image::from_rgba(2, 2, [0, 0, 255, 128].repeat(4)).unwrap();
        let decoded = image::load_from_memory(&img.encode("png24").unwrap()).unwrap();
        assert_eq!(decoded.color(), image::ColorType::Rgba8);
        assert_eq!(decoded.to_rgba8().as_raw(), img.data());
    }

    #[test]
    fn test_format_options_are_accepted() {
        assert_eq!(
            ImageFormat::parse("png256:m=h").unwrap(),
            ImageFormat::Png
        );
        assert!(ImageFormat::parse("invalidformat").is_err());
        assert!(ImageFormat::parse("").is_err());
    }

    #[cfg(feature = "jpeg")]
    #[test]
    fn test_jpeg_quality() {
        assert_eq!(
            ImageFormat::parse("jpeg80").unwrap(),
            ImageFormat::Jpeg { quality: 80 }
        );
        assert_eq!(
            ImageFormat::parse("jpeg:quality=50").unwrap(),
            ImageFormat::Jpeg { quality: 50 }
        );
        assert!(ImageFormat::parse("jpeg0").is_err());
        let bytes = checker().encode("jpeg").unwrap();
        assert_eq!(&bytes[..2], &[0xff, 0xd8]);
    }

    #[cfg(feature = "jpeg")]
    #[test]
    fn test_jpeg_writes_color_channels_only() {
        let img = Image::from_rgba(8, 8, [200, 40, 40, 128].repeat(64)).unwrap();
        let decoded = image::load_from_memory(&img.encode("jpeg100").unwrap()).unwrap();
        assert_eq!(decoded.color(), image::ColorType::Rgb8);
        let px = decoded.to_rgb8().get_pixel(4, 4).0;
        for (got, want) in px.iter().zip([200u8, 40, 40]) {
            assert!(got.abs_diff(want) <= 4, "{px:?}");
        }
    }

    #[test]
    fn test_save_guesses_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        checker().save(&path, "").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), checker().encode("png").unwrap());
        assert!(checker().save(&dir.path().join("out.unknown"), "").is_err());
    }
}
