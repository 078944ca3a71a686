//! Public Rust API for rsvg.
//!
//! This gets re-exported from the toplevel `lib.rs`.

#![warn(missing_docs)]

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

pub use crate::{
    error::{LoadingError, RenderingError},
    handle::{Handle, SizeCallback, DEFAULT_SIZE},
    io::{BinaryData, DefaultResourceLoader, ImageDecoder, IoError, PngDecoder, ResourceLoader},
    length::{Dpi, DEFAULT_DPI},
    rect::Rect,
    sizing::SizeMode,
    text::{FontDescription, GlyphRun, TextLayout},
};

use crate::rsvg_log;
use crate::surface_utils::{shared_surface::ExclusiveImageSurface, Pixel, PixelOps};

/// An RGBA image with 8 bits per channel and non-premultiplied alpha.
///
/// Rows are stored top to bottom, with no padding between them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pixbuf {
    width: i32,
    height: i32,
    data: Vec<u8>,
}

impl Pixbuf {
    /// Converts a premultiplied surface into a pixel buffer.
    pub(crate) fn from_surface(surface: &ExclusiveImageSurface) -> Pixbuf {
        let data = surface
            .pixels()
            .iter()
            .flat_map(|p| {
                let p = p.unpremultiply();
                [p.r, p.g, p.b, p.a]
            })
            .collect();

        Pixbuf {
            width: surface.width(),
            height: surface.height(),
            data,
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Number of bytes between the starts of consecutive rows.
    pub fn rowstride(&self) -> usize {
        self.width as usize * 4
    }

    /// The pixel data, as RGBA bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Returns the `[r, g, b, a]` components of a pixel.
    ///
    /// # Panics
    ///
    /// Panics if the coordinates are outside the image.
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 4] {
        assert!((x as i32) < self.width && (y as i32) < self.height);

        let ofs = y as usize * self.rowstride() + x as usize * 4;
        [
            self.data[ofs],
            self.data[ofs + 1],
            self.data[ofs + 2],
            self.data[ofs + 3],
        ]
    }

    /// Returns a copy of the image composited over a solid, non-premultiplied `[r, g, b, a]`
    /// color.
    pub fn with_background(&self, color: [u8; 4]) -> Pixbuf {
        let [r, g, b, a] = color;
        let background = Pixel::new(r, g, b, a).premultiply();

        let data = self
            .data
            .chunks_exact(4)
            .flat_map(|p| {
                let p = Pixel::new(p[0], p[1], p[2], p[3])
                    .premultiply()
                    .over(background)
                    .unpremultiply();
                [p.r, p.g, p.b, p.a]
            })
            .collect();

        Pixbuf {
            width: self.width,
            height: self.height,
            data,
        }
    }

    /// Encodes the image as PNG into `w`.
    pub fn write_png<W: Write>(&self, w: W) -> Result<(), png::EncodingError> {
        let mut encoder = png::Encoder::new(w, self.width as u32, self.height as u32);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder.write_header()?;
        writer.write_image_data(&self.data)?;
        writer.finish()
    }

    /// Saves the image as a PNG file.
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<(), png::EncodingError> {
        let file = io::BufWriter::new(File::create(path)?);
        self.write_png(file)
    }
}

fn feed<R: Read>(handle: &mut Handle, mut reader: R) -> Result<(), LoadingError> {
    let mut buf = [0u8; 4096];

    loop {
        let num_read = match reader.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };

        handle.write(&buf[..num_read])?;
    }
}

fn pixbuf_from_file_with_size_mode<P: AsRef<Path>>(
    path: P,
    size_mode: SizeMode,
) -> Result<Pixbuf, LoadingError> {
    let path = path.as_ref();
    let file = File::open(path)?;

    let mut handle = Handle::new();
    handle.set_base_path(path);
    handle.set_size_callback(move |w, h| size_mode.compute(w, h));

    match feed(&mut handle, file).and_then(|()| handle.close()) {
        Ok(()) => (),

        Err(e @ LoadingError::Io(_))
        | Err(e @ LoadingError::LimitExceeded(_))
        | Err(e @ LoadingError::NoSvgRoot) => return Err(e),

        Err(e) => rsvg_log!("{}; keeping what was rendered", e),
    }

    handle.get_output().ok_or(LoadingError::NoSvgRoot)
}

/// Loads an SVG file and renders it at its natural size.
///
/// Unreadable files, documents without an `<svg>` element, and documents too big to
/// render are errors.  Anything else that is wrong with a document is skipped, and the
/// rest of it gets rendered.
///
/// ```no_run
/// let pixbuf = rsvg::pixbuf_from_file("example.svg").unwrap();
/// pixbuf.save_png("example.png").unwrap();
/// ```
pub fn pixbuf_from_file<P: AsRef<Path>>(path: P) -> Result<Pixbuf, LoadingError> {
    pixbuf_from_file_with_size_mode(path, SizeMode::Zoom { x: 1.0, y: 1.0 })
}

/// Loads an SVG file and renders it scaled by a factor in each direction.
pub fn pixbuf_from_file_at_zoom<P: AsRef<Path>>(
    path: P,
    x_zoom: f64,
    y_zoom: f64,
) -> Result<Pixbuf, LoadingError> {
    pixbuf_from_file_with_size_mode(path, SizeMode::Zoom { x: x_zoom, y: y_zoom })
}

/// Loads an SVG file and renders it at a fixed size.
///
/// A `width` or `height` of `-1` keeps the natural size in that direction.
pub fn pixbuf_from_file_at_size<P: AsRef<Path>>(
    path: P,
    width: i32,
    height: i32,
) -> Result<Pixbuf, LoadingError> {
    pixbuf_from_file_with_size_mode(path, SizeMode::Size { width, height })
}

/// Loads an SVG file and renders it zoomed, but no bigger than `max_width`×`max_height`.
pub fn pixbuf_from_file_at_zoom_with_max<P: AsRef<Path>>(
    path: P,
    x_zoom: f64,
    y_zoom: f64,
    max_width: i32,
    max_height: i32,
) -> Result<Pixbuf, LoadingError> {
    pixbuf_from_file_with_size_mode(
        path,
        SizeMode::ZoomMax {
            x: x_zoom,
            y: y_zoom,
            max_width,
            max_height,
        },
    )
}

/// Loads an SVG file and renders it so that it fits within `max_width`×`max_height`,
/// keeping its aspect ratio.  Documents are shrunk but never enlarged.
pub fn pixbuf_from_file_at_max_size<P: AsRef<Path>>(
    path: P,
    max_width: i32,
    max_height: i32,
) -> Result<Pixbuf, LoadingError> {
    pixbuf_from_file_with_size_mode(
        path,
        SizeMode::MaxSize {
            max_width,
            max_height,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixbuf_is_not_premultiplied() {
        let mut surface = ExclusiveImageSurface::new(2, 1).unwrap();
        surface.set_pixel(0, 0, Pixel::new(64, 0, 0, 128));

        let pixbuf = Pixbuf::from_surface(&surface);

        assert_eq!(pixbuf.rowstride(), 8);
        assert_eq!(pixbuf.get_pixel(0, 0), [128, 0, 0, 128]);
        assert_eq!(pixbuf.get_pixel(1, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn background_shows_through_transparent_pixels() {
        let mut surface = ExclusiveImageSurface::new(2, 1).unwrap();
        surface.set_pixel(0, 0, Pixel::new(255, 0, 0, 255));

        let pixbuf = Pixbuf::from_surface(&surface).with_background([0, 0, 255, 255]);

        assert_eq!(pixbuf.get_pixel(0, 0), [255, 0, 0, 255]);
        assert_eq!(pixbuf.get_pixel(1, 0), [0, 0, 255, 255]);
    }

    #[test]
    fn writes_decodable_png() {
        let mut surface = ExclusiveImageSurface::new(3, 2).unwrap();
        surface.set_pixel(2, 1, Pixel::new(0, 0, 255, 255));
        let pixbuf = Pixbuf::from_surface(&surface);

        let mut encoded = Vec::new();
        pixbuf.write_png(&mut encoded).unwrap();

        let decoder = png::Decoder::new(encoded.as_slice());
        let mut reader = decoder.read_info().unwrap();
        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf).unwrap();

        assert_eq!((info.width, info.height), (3, 2));
        assert_eq!(&buf[..info.buffer_size()], pixbuf.pixels());
    }
}
