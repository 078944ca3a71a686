//! Toplevel handle for loading an SVG document into pixels.
//!
//! A [`Handle`] gets bytes with [`Handle::write`], in chunks of any size, and draws the
//! document as it is being read.  This module provides the primitives on which the
//! convenience functions in [`crate::api`] are implemented.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::api::Pixbuf;
use crate::document::{AcquiredNodes, Document};
use crate::drawing_ctx::{DrawingCtx, RenderingConfig, Viewport};
use crate::error::LoadingError;
use crate::io::{DefaultResourceLoader, ImageDecoder, PngDecoder, ResourceLoader};
use crate::length::{Dpi, LengthUnit, NormalizeParams, DEFAULT_DPI};
use crate::node::{CascadedValues, Node, NodeBorrow};
use crate::rect::Rect;
use crate::rsvg_log;
use crate::structure::IntrinsicDimensions;
use crate::surface_utils::shared_surface::checked_stride;
use crate::text::TextLayout;
use crate::transform::Transform;
use crate::util::round_size;
use crate::xml::{DrawingSink, XmlParser};
use crate::borrow_element_as;

/// Size used for a dimension that neither the document nor the size callback specify.
pub const DEFAULT_SIZE: i32 = 500;

/// Gets called with the natural size of a document, and returns the size to render it at.
///
/// Non-positive dimensions in the result mean "use the natural size".
pub type SizeCallback = Box<dyn FnMut(i32, i32) -> (i32, i32)>;

enum LoadState {
    Start,
    Loading(XmlParser<Renderer>),
    Closed(XmlParser<Renderer>),
}

/// Loads an SVG document incrementally and renders it to a pixel buffer.
///
/// Options must be set before the first call to [`write`](#method.write); they are
/// ignored afterwards.
pub struct Handle {
    dpi: Dpi,
    base_path: Option<PathBuf>,
    user_languages: Vec<String>,
    text_layout: Option<Rc<dyn TextLayout>>,
    image_decoder: Rc<dyn ImageDecoder>,
    resource_loader: Option<Rc<dyn ResourceLoader>>,
    size_callback: Option<SizeCallback>,
    load_state: LoadState,
}

impl Default for Handle {
    fn default() -> Handle {
        Handle {
            dpi: Dpi::default(),
            base_path: None,
            user_languages: vec![String::from("en")],
            text_layout: None,
            image_decoder: Rc::new(PngDecoder),
            resource_loader: None,
            size_callback: None,
            load_state: LoadState::Start,
        }
    }
}

impl Handle {
    pub fn new() -> Handle {
        Default::default()
    }

    /// Sets the resolution for both axes.  A non-positive value resets it to the default.
    pub fn set_dpi(&mut self, dpi: f64) {
        self.set_dpi_x_y(dpi, dpi);
    }

    /// Sets the resolution for each axis.  Non-positive values reset it to the default.
    pub fn set_dpi_x_y(&mut self, dpi_x: f64, dpi_y: f64) {
        let sanitize = |d: f64| if d > 0.0 { d } else { DEFAULT_DPI };
        self.dpi = Dpi::new(sanitize(dpi_x), sanitize(dpi_y));
    }

    pub fn dpi(&self) -> Dpi {
        self.dpi
    }

    /// Sets the file or directory against which relative references are resolved.
    pub fn set_base_path<P: AsRef<Path>>(&mut self, path: P) {
        self.base_path = Some(path.as_ref().to_path_buf());
    }

    /// Sets the languages that the `systemLanguage` attribute is tested against.
    pub fn set_user_languages(&mut self, languages: Vec<String>) {
        self.user_languages = languages;
    }

    pub fn set_text_layout(&mut self, text_layout: Rc<dyn TextLayout>) {
        self.text_layout = Some(text_layout);
    }

    pub fn set_image_decoder(&mut self, decoder: Rc<dyn ImageDecoder>) {
        self.image_decoder = decoder;
    }

    /// Replaces the loader for `href`s.  This overrides the base path.
    pub fn set_resource_loader(&mut self, loader: Rc<dyn ResourceLoader>) {
        self.resource_loader = Some(loader);
    }

    pub fn set_size_callback<F>(&mut self, callback: F)
    where
        F: FnMut(i32, i32) -> (i32, i32) + 'static,
    {
        self.size_callback = Some(Box::new(callback));
    }

    fn rendering_config(&self) -> RenderingConfig {
        let resource_loader = self
            .resource_loader
            .clone()
            .unwrap_or_else(|| Rc::new(DefaultResourceLoader::new(self.base_path.clone())));

        RenderingConfig {
            dpi: self.dpi,
            user_languages: self.user_languages.clone(),
            text_layout: self.text_layout.clone(),
            image_decoder: self.image_decoder.clone(),
            resource_loader,
        }
    }

    fn parser(&mut self) -> Result<&mut XmlParser<Renderer>, LoadingError> {
        if let LoadState::Start = self.load_state {
            let renderer = Renderer {
                config: Rc::new(self.rendering_config()),
                size_callback: self.size_callback.take(),
                output: None,
            };

            self.load_state = LoadState::Loading(XmlParser::new(renderer, self.dpi));
        }

        match self.load_state {
            LoadState::Loading(ref mut parser) => Ok(parser),
            LoadState::Closed(_) => Err(LoadingError::AlreadyClosed),
            LoadState::Start => unreachable!(),
        }
    }

    /// Feeds the handle with more data.
    ///
    /// Every complete drawable child of the outermost `<svg>` gets rendered here.
    pub fn write(&mut self, buf: &[u8]) -> Result<(), LoadingError> {
        self.parser()?.write(buf)
    }

    /// Finishes loading the document.
    ///
    /// The output rendered so far is still available after an error.
    pub fn close(&mut self) -> Result<(), LoadingError> {
        let result = self.parser()?.close().map(|_document: Document| ());

        let state = std::mem::replace(&mut self.load_state, LoadState::Start);
        self.load_state = match state {
            LoadState::Loading(parser) => LoadState::Closed(parser),
            other => other,
        };

        result
    }

    /// Returns what has been rendered so far.
    ///
    /// This is `None` until the outermost `<svg>` element has been read.
    pub fn get_output(&self) -> Option<Pixbuf> {
        let parser = match self.load_state {
            LoadState::Start => return None,
            LoadState::Loading(ref p) | LoadState::Closed(ref p) => p,
        };

        parser.with_sink(|renderer| {
            renderer
                .output
                .as_ref()
                .map(|output| Pixbuf::from_surface(output.draw_ctx.surface()))
        })
    }
}

struct Output {
    draw_ctx: DrawingCtx,

    // None if the document's viewBox is empty, in which case nothing gets drawn.
    viewport: Option<Viewport>,
}

/// Draws a document into the output surface while it is being loaded.
struct Renderer {
    config: Rc<RenderingConfig>,
    size_callback: Option<SizeCallback>,
    output: Option<Output>,
}

impl Renderer {
    fn negotiate_size(&mut self, natural_width: i32, natural_height: i32) -> (i32, i32) {
        let (width, height) = match self.size_callback {
            Some(ref mut f) => f(natural_width, natural_height),
            None => (natural_width, natural_height),
        };

        let pick = |requested: i32, natural: i32| {
            if requested > 0 {
                requested
            } else if natural > 0 {
                natural
            } else {
                rsvg_log!(
                    "document has no usable size; using {} pixels",
                    DEFAULT_SIZE
                );
                DEFAULT_SIZE
            }
        };

        (pick(width, natural_width), pick(height, natural_height))
    }
}

/// Computes the natural size of a document in pixels, or `-1` for each unknown dimension.
///
/// Percentages resolve against the `viewBox`; a missing dimension takes the one from the
/// `viewBox`.
fn natural_size(dimensions: &IntrinsicDimensions, dpi: Dpi, font_size: f64) -> (f64, f64) {
    let vbox = dimensions.vbox;
    let (vbox_width, vbox_height) = vbox.map_or((0.0, 0.0), |v| (v.width(), v.height()));
    let params = NormalizeParams::new(dpi, vbox_width, vbox_height, font_size);

    let width = match dimensions.width {
        Some(w) if w.unit == LengthUnit::Percent && vbox.is_none() => -1.0,
        Some(w) => w.normalize(&params),
        None if vbox.is_some() => vbox_width,
        None => -1.0,
    };

    let height = match dimensions.height {
        Some(h) if h.unit == LengthUnit::Percent && vbox.is_none() => -1.0,
        Some(h) => h.normalize(&params),
        None if vbox.is_some() => vbox_height,
        None => -1.0,
    };

    (width, height)
}

fn to_natural_pixels(x: f64) -> i32 {
    if x > 0.0 {
        round_size(x)
    } else {
        -1
    }
}

impl DrawingSink for Renderer {
    fn begin(&mut self, root: &Node) -> Result<(), LoadingError> {
        let dimensions = borrow_element_as!(root, Svg).get_intrinsic_dimensions();
        let font_size = root.borrow_element().get_computed_values().font_size;

        let (natural_width, natural_height) = natural_size(&dimensions, self.config.dpi, font_size);

        let (width, height) = self.negotiate_size(
            to_natural_pixels(natural_width),
            to_natural_pixels(natural_height),
        );

        if checked_stride(width, height).is_none() {
            return Err(LoadingError::LimitExceeded(format!(
                "output of {}x{} pixels is too big",
                width, height
            )));
        }

        let draw_ctx = DrawingCtx::new(width, height, self.config.clone())
            .map_err(|e| LoadingError::LimitExceeded(e.to_string()))?;

        // The document's own viewport, in which its viewBox gets laid out; it is then
        // scaled to the negotiated size.
        let viewport_width = if natural_width > 0.0 {
            natural_width
        } else {
            f64::from(width)
        };

        let viewport_height = if natural_height > 0.0 {
            natural_height
        } else {
            f64::from(height)
        };

        let scale = Transform::new_scale(
            f64::from(width) / viewport_width,
            f64::from(height) / viewport_height,
        );

        let viewport = Viewport::new(self.config.dpi, viewport_width, viewport_height, scale)
            .with_new_viewport(
                dimensions.vbox,
                &Rect::from_size(viewport_width, viewport_height),
                dimensions.preserve_aspect_ratio,
            );

        if viewport.is_none() {
            rsvg_log!("document has an empty viewBox; not rendering it");
        }

        self.output = Some(Output { draw_ctx, viewport });

        Ok(())
    }

    fn draw(&mut self, document: &Document, node: &Node) {
        let output = match self.output {
            Some(ref mut output) => output,
            None => return,
        };

        let viewport = match output.viewport {
            Some(ref viewport) => viewport,
            None => return,
        };

        let mut acquired_nodes = AcquiredNodes::new(document);
        let cascaded = CascadedValues::new_from_node(node);

        if let Err(e) = output.draw_ctx.draw_node_from_stack(
            node,
            &mut acquired_nodes,
            &cascaded,
            viewport,
            false,
        ) {
            rsvg_log!("stopped rendering {}: {}", node, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matches::matches;

    fn load(handle: &mut Handle, svg: &str) -> Result<(), LoadingError> {
        handle.write(svg.as_bytes())?;
        handle.close()
    }

    fn output_size(svg: &str) -> (i32, i32) {
        let mut handle = Handle::new();
        load(&mut handle, svg).unwrap();
        let pixbuf = handle.get_output().unwrap();
        (pixbuf.width(), pixbuf.height())
    }

    #[test]
    fn natural_size_from_width_and_height() {
        assert_eq!(
            output_size(r#"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="30"/>"#),
            (40, 30)
        );
    }

    #[test]
    fn physical_units_use_dpi() {
        let mut handle = Handle::new();
        handle.set_dpi(72.0);
        load(
            &mut handle,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="1in" height="36pt"/>"#,
        )
        .unwrap();

        let pixbuf = handle.get_output().unwrap();
        assert_eq!((pixbuf.width(), pixbuf.height()), (72, 36));
    }

    #[test]
    fn missing_dimensions_come_from_viewbox() {
        assert_eq!(
            output_size(r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 20 10"/>"#),
            (20, 10)
        );

        assert_eq!(
            output_size(
                r#"<svg xmlns="http://www.w3.org/2000/svg" width="50%" viewBox="0 0 20 10"/>"#
            ),
            (10, 10)
        );
    }

    #[test]
    fn unknown_size_falls_back_to_default() {
        assert_eq!(
            output_size(r#"<svg xmlns="http://www.w3.org/2000/svg"/>"#),
            (DEFAULT_SIZE, DEFAULT_SIZE)
        );
    }

    #[test]
    fn size_callback_overrides_natural_size() {
        let mut handle = Handle::new();
        handle.set_size_callback(|w, h| (w * 2, -1 * h));
        load(
            &mut handle,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="20"/>"#,
        )
        .unwrap();

        let pixbuf = handle.get_output().unwrap();
        assert_eq!((pixbuf.width(), pixbuf.height()), (20, 20));
    }

    #[test]
    fn no_output_before_root() {
        let mut handle = Handle::new();
        assert!(handle.get_output().is_none());

        handle.write(b"<?xml version=\"1.0\"?>\n<sv").unwrap();
        assert!(handle.get_output().is_none());

        handle
            .write(b"g xmlns=\"http://www.w3.org/2000/svg\" width=\"4\" height=\"4\">")
            .unwrap();
        assert!(handle.get_output().is_some());
    }

    #[test]
    fn huge_output_is_rejected_before_allocation() {
        let mut handle = Handle::new();
        handle.set_size_callback(|_, _| (i32::MAX / 4, 1));

        assert!(matches!(
            load(
                &mut handle,
                r#"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10"/>"#
            ),
            Err(LoadingError::LimitExceeded(_))
        ));

        assert!(handle.get_output().is_none());
    }

    #[test]
    fn closing_twice_is_an_error() {
        let mut handle = Handle::new();
        load(
            &mut handle,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="1" height="1"/>"#,
        )
        .unwrap();

        assert!(matches!(handle.close(), Err(LoadingError::AlreadyClosed)));
        assert!(matches!(handle.write(b" "), Err(LoadingError::AlreadyClosed)));
        assert!(handle.get_output().is_some());
    }

    #[test]
    fn closing_without_data_has_no_svg_root() {
        let mut handle = Handle::new();
        assert!(matches!(handle.close(), Err(LoadingError::NoSvgRoot)));
    }

    #[test]
    fn dpi_resets_to_default() {
        let mut handle = Handle::new();
        handle.set_dpi_x_y(-1.0, 300.0);
        assert_eq!(handle.dpi(), Dpi::new(DEFAULT_DPI, 300.0));

        handle.set_dpi(0.0);
        assert_eq!(handle.dpi(), Dpi::default());
    }

    #[test]
    fn viewbox_is_scaled_to_output() {
        let mut handle = Handle::new();
        handle.set_size_callback(|_, _| (20, 20));
        load(
            &mut handle,
            r##"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10" viewBox="0 0 100 100">
                  <rect x="50" y="50" width="50" height="50" fill="#00ff00"/>
                </svg>"##,
        )
        .unwrap();

        let pixbuf = handle.get_output().unwrap();
        assert_eq!(pixbuf.get_pixel(5, 5), [0, 0, 0, 0]);
        assert_eq!(pixbuf.get_pixel(15, 15), [0, 255, 0, 255]);
    }
}
