//! The `image` element.

use markup5ever::{expanded_name, local_name, namespace_url, ns};

use crate::aspect_ratio::AspectRatio;
use crate::bbox::BoundingBox;
use crate::document::AcquiredNodes;
use crate::drawing_ctx::{DrawingCtx, Viewport};
use crate::element::{set_attribute, ElementTrait};
use crate::error::*;
use crate::io;
use crate::layout::{self, StackingContext};
use crate::length::*;
use crate::node::{CascadedValues, Node, NodeBorrow};
use crate::parsers::ParseValue;
use crate::rect::Rect;
use crate::rsvg_log;
use crate::xml::Attributes;

/// The `<image>` element.
///
/// `width` and `height` are required; an image without them, or with a zero size, is
/// not rendered.
#[derive(Default)]
pub struct Image {
    x: Length<Horizontal>,
    y: Length<Vertical>,
    width: Option<ULength<Horizontal>>,
    height: Option<ULength<Vertical>>,
    aspect: AspectRatio,
    href: Option<String>,
}

impl Image {
    fn get_rect(&self, params: &NormalizeParams) -> Option<Rect> {
        let w = self.width?.normalize(params);
        let h = self.height?.normalize(params);

        let x = self.x.normalize(params);
        let y = self.y.normalize(params);

        Some(Rect::new(x, y, x + w, y + h)).filter(|r| !r.is_empty())
    }
}

impl ElementTrait for Image {
    fn set_attributes(&mut self, attrs: &Attributes) {
        self.href = attrs.get_href().map(String::from);

        for (attr, value) in attrs.iter() {
            match attr.expanded() {
                expanded_name!("", "x") => set_attribute(&mut self.x, attr.parse(value)),
                expanded_name!("", "y") => set_attribute(&mut self.y, attr.parse(value)),
                expanded_name!("", "width") => set_attribute(&mut self.width, attr.parse(value)),
                expanded_name!("", "height") => set_attribute(&mut self.height, attr.parse(value)),
                expanded_name!("", "preserveAspectRatio") => {
                    set_attribute(&mut self.aspect, attr.parse(value))
                }

                // "path" is used by some older Adobe Illustrator versions
                expanded_name!("", "path") if self.href.is_none() => {
                    self.href = Some(value.to_string())
                }

                _ => (),
            }
        }
    }

    fn draw(
        &self,
        node: &Node,
        acquired_nodes: &mut AcquiredNodes<'_>,
        cascaded: &CascadedValues<'_>,
        viewport: &Viewport,
        draw_ctx: &mut DrawingCtx,
        clipping: bool,
    ) -> Result<BoundingBox, RenderingError> {
        let values = cascaded.get();
        let params = viewport.normalize_params(values);

        let rect = match self.get_rect(&params) {
            Some(r) => r,
            None => return Ok(viewport.empty_bbox()),
        };

        let href = match self.href {
            Some(ref href) => href,
            None => return Ok(viewport.empty_bbox()),
        };

        let surface = {
            let config = draw_ctx.config();
            match io::load_image(
                config.resource_loader.as_ref(),
                config.image_decoder.as_ref(),
                href,
            ) {
                Ok(s) => s,
                Err(e) => {
                    rsvg_log!("could not load image \"{}\": {}", href, e);
                    return Ok(viewport.empty_bbox());
                }
            }
        };

        let image = layout::Image {
            surface,
            is_visible: values.is_visible(),
            rect,
            aspect: self.aspect,
        };

        let stacking_ctx = {
            let elt = node.borrow_element();
            StackingContext::new(acquired_nodes, &elt, values.transform, values)
        };

        draw_ctx.draw_image(&image, &stacking_ctx, acquired_nodes, viewport, values, clipping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use markup5ever::{LocalName, QualName};

    fn image(pairs: &[(&str, &str)]) -> Image {
        let names: Vec<QualName> = pairs
            .iter()
            .map(|(n, _)| QualName::new(None, ns!(), LocalName::from(*n)))
            .collect();
        let attrs = Attributes::from_pairs(names.iter().zip(pairs.iter().map(|(_, v)| *v))).unwrap();

        let mut image = Image::default();
        image.set_attributes(&attrs);
        image
    }

    fn params() -> NormalizeParams {
        NormalizeParams::new(Dpi::default(), 100.0, 100.0, 12.0)
    }

    #[test]
    fn size_is_required() {
        assert!(image(&[("width", "10")]).get_rect(&params()).is_none());
        assert!(image(&[("width", "10"), ("height", "0")]).get_rect(&params()).is_none());
        assert!(image(&[("width", "-10"), ("height", "10")]).get_rect(&params()).is_none());

        let r = image(&[("x", "5"), ("width", "10"), ("height", "50%")])
            .get_rect(&params())
            .unwrap();
        assert!(r.approx_eq(&Rect::new(5.0, 0.0, 15.0, 50.0)));
    }

    #[test]
    fn path_is_a_fallback_for_href() {
        assert_eq!(image(&[("path", "a.png")]).href.as_deref(), Some("a.png"));
        assert_eq!(
            image(&[("href", "b.png"), ("path", "a.png")]).href.as_deref(),
            Some("b.png")
        );
    }
}
