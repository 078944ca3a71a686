//! Acquiring data from URLs and decoding raster images.
//!
//! Both are services that the caller can replace: a [`ResourceLoader`] turns an `href`
//! into bytes, and an [`ImageDecoder`] turns bytes into pixels.

use std::fs;
use std::path::{Path, PathBuf};

use crate::surface_utils::shared_surface::{ExclusiveImageSurface, SharedImageSurface};
use crate::surface_utils::{Pixel, PixelOps};

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("invalid data: URL")]
    BadDataUrl,

    #[error("invalid URL: {0}")]
    BadUrl(String),

    #[error("relative reference \"{0}\" without a base path")]
    NoBaseUrl(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not decode image: {0}")]
    Decode(String),
}

pub struct BinaryData {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

fn decode_data_uri(uri: &str) -> Result<BinaryData, IoError> {
    let data_url = data_url::DataUrl::process(uri).map_err(|_| IoError::BadDataUrl)?;

    let mime_type = data_url.mime_type().to_string();

    let (bytes, fragment_id) = data_url.decode_to_vec().map_err(|_| IoError::BadDataUrl)?;

    // data: URLs cannot have fragment identifiers; one here probably means
    // mis-quoted SVG data inside the URL.
    if fragment_id.is_some() {
        return Err(IoError::BadDataUrl);
    }

    Ok(BinaryData {
        data: bytes,
        content_type: Some(mime_type),
    })
}

/// Provides the bytes that an `href` points to.
pub trait ResourceLoader {
    fn load(&self, href: &str) -> Result<BinaryData, IoError>;
}

/// Loads `data:` URLs, `file:` URLs and paths relative to a base directory.
pub struct DefaultResourceLoader {
    base: Option<PathBuf>,
}

impl DefaultResourceLoader {
    /// `base` is the file or directory against which relative references resolve.
    pub fn new(base: Option<PathBuf>) -> DefaultResourceLoader {
        DefaultResourceLoader { base }
    }

    fn resolve_path(&self, href: &str) -> Result<PathBuf, IoError> {
        if href.starts_with("file:") {
            let url = url::Url::parse(href).map_err(|e| IoError::BadUrl(e.to_string()))?;
            return url
                .to_file_path()
                .map_err(|_| IoError::BadUrl(href.to_string()));
        }

        if let Ok(url) = url::Url::parse(href) {
            // Anything else with a scheme would need network access.
            return Err(IoError::BadUrl(format!("unsupported scheme in {}", url)));
        }

        let path = Path::new(href);
        if path.is_absolute() {
            return Ok(path.to_path_buf());
        }

        let base = self
            .base
            .as_ref()
            .ok_or_else(|| IoError::NoBaseUrl(href.to_string()))?;

        let dir = if base.is_dir() {
            base.as_path()
        } else {
            base.parent().unwrap_or_else(|| Path::new("."))
        };

        Ok(dir.join(path))
    }
}

impl ResourceLoader for DefaultResourceLoader {
    fn load(&self, href: &str) -> Result<BinaryData, IoError> {
        if href.starts_with("data:") {
            return decode_data_uri(href);
        }

        let path = self.resolve_path(href)?;
        let data = fs::read(&path)?;

        let content_type = match path.extension().and_then(|e| e.to_str()) {
            Some(e) if e.eq_ignore_ascii_case("png") => Some(String::from("image/png")),
            Some(e) if e.eq_ignore_ascii_case("svg") => Some(String::from("image/svg+xml")),
            _ => None,
        };

        Ok(BinaryData { data, content_type })
    }
}

/// Turns encoded image data into a premultiplied surface.
pub trait ImageDecoder {
    fn decode(&self, data: &BinaryData) -> Result<SharedImageSurface, IoError>;
}

/// Decodes PNG images.
pub struct PngDecoder;

impl ImageDecoder for PngDecoder {
    fn decode(&self, data: &BinaryData) -> Result<SharedImageSurface, IoError> {
        if let Some(ref mime) = data.content_type {
            if mime != "image/png" && !mime.starts_with("application/octet-stream") {
                return Err(IoError::Decode(format!("unsupported image type {}", mime)));
            }
        }

        let mut decoder = png::Decoder::new(data.data.as_slice());
        decoder.set_transformations(png::Transformations::normalize_to_color8());

        let mut reader = decoder
            .read_info()
            .map_err(|e| IoError::Decode(e.to_string()))?;

        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader
            .next_frame(&mut buf)
            .map_err(|e| IoError::Decode(e.to_string()))?;

        let width = i32::try_from(info.width).map_err(|e| IoError::Decode(e.to_string()))?;
        let height = i32::try_from(info.height).map_err(|e| IoError::Decode(e.to_string()))?;

        let mut surface = ExclusiveImageSurface::new(width, height)
            .map_err(|e| IoError::Decode(e.to_string()))?;

        let channels = info.color_type.samples();

        for (y, row) in buf.chunks(info.line_size).take(info.height as usize).enumerate() {
            for (x, p) in row.chunks(channels).take(info.width as usize).enumerate() {
                let pixel = match *p {
                    [gray] => Pixel::new(gray, gray, gray, 255),
                    [gray, a] => Pixel::new(gray, gray, gray, a),
                    [r, g, b] => Pixel::new(r, g, b, 255),
                    [r, g, b, a] => Pixel::new(r, g, b, a),
                    _ => return Err(IoError::Decode(String::from("unexpected pixel format"))),
                };

                surface.set_pixel(x as u32, y as u32, pixel.premultiply());
            }
        }

        Ok(surface.share())
    }
}

/// Loads and decodes the image that `href` points to.
pub fn load_image(
    loader: &dyn ResourceLoader,
    decoder: &dyn ImageDecoder,
    href: &str,
) -> Result<SharedImageSurface, IoError> {
    let data = loader.load(href)?;
    decoder.decode(&data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn encode_png(width: u32, height: u32, rgba: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, width, height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(rgba).unwrap();
        }
        out
    }

    #[test]
    fn data_urls_are_decoded() {
        let loader = DefaultResourceLoader::new(None);
        let data = loader.load("data:text/plain;base64,SGVsbG8=").unwrap();

        assert_eq!(data.data, b"Hello");
        assert_eq!(data.content_type.as_deref(), Some("text/plain"));
    }

    #[test]
    fn data_url_with_fragment_is_an_error() {
        let loader = DefaultResourceLoader::new(None);
        assert!(matches!(
            loader.load("data:text/plain,foo#bar"),
            Err(IoError::BadDataUrl)
        ));
    }

    #[test]
    fn relative_path_needs_base() {
        let loader = DefaultResourceLoader::new(None);
        assert!(matches!(loader.load("foo.png"), Err(IoError::NoBaseUrl(_))));
    }

    #[test]
    fn remote_urls_are_not_loaded() {
        let loader = DefaultResourceLoader::new(None);
        assert!(matches!(
            loader.load("http://example.com/a.png"),
            Err(IoError::BadUrl(_))
        ));
    }

    #[test]
    fn relative_path_resolves_against_base_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = fs::File::create(dir.path().join("data.bin")).unwrap();
        f.write_all(b"xyz").unwrap();

        let loader = DefaultResourceLoader::new(Some(dir.path().join("doc.svg")));
        assert_eq!(loader.load("data.bin").unwrap().data, b"xyz");
    }

    #[test]
    fn png_decoding_premultiplies() {
        let png = encode_png(2, 1, &[255, 0, 0, 255, 255, 255, 255, 128]);
        let surface = PngDecoder
            .decode(&BinaryData {
                data: png,
                content_type: Some(String::from("image/png")),
            })
            .unwrap();

        assert_eq!(surface.width(), 2);
        assert_eq!(surface.get_pixel(0, 0), Pixel::new(255, 0, 0, 255));
        assert_eq!(surface.get_pixel(1, 0), Pixel::new(128, 128, 128, 128));
    }

    #[test]
    fn garbage_is_not_a_png() {
        let res = PngDecoder.decode(&BinaryData {
            data: vec![1, 2, 3],
            content_type: None,
        });
        assert!(matches!(res, Err(IoError::Decode(_))));
    }
}
