//! Handling of `preserveAspectRatio` values.
//!
//! ```
//! # use rsvg::doctest_only::AspectRatio;
//! # use rsvg::doctest_only::Parse;
//! assert_eq!(
//!     AspectRatio::parse_str("xMidYMid").unwrap(),
//!     AspectRatio::default()
//! );
//! ```
//!
//! See https://www.w3.org/TR/SVG/coords.html#PreserveAspectRatioAttribute

use cssparser::{BasicParseError, Parser};

use crate::enum_default;
use crate::error::*;
use crate::parse_identifiers;
use crate::parsers::Parse;
use crate::rect::Rect;
use crate::transform::Transform;
use crate::viewbox::ViewBox;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum FitMode {
    Meet,
    Slice,
}

enum_default!(FitMode, FitMode::Meet);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Align1D {
    Min,
    Mid,
    Max,
}

impl Align1D {
    fn compute(self, dest_pos: f64, dest_size: f64, obj_size: f64) -> f64 {
        match self {
            Align1D::Min => dest_pos,
            Align1D::Mid => dest_pos + (dest_size - obj_size) / 2.0,
            Align1D::Max => dest_pos + dest_size - obj_size,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Align {
    x: Align1D,
    y: Align1D,
    fit: FitMode,
}

/// Value of `preserveAspectRatio`; `align` is `None` for `none`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AspectRatio {
    defer: bool,
    align: Option<Align>,
}

impl Default for AspectRatio {
    fn default() -> AspectRatio {
        AspectRatio {
            defer: false,
            align: Some(Align {
                x: Align1D::Mid,
                y: Align1D::Mid,
                fit: FitMode::Meet,
            }),
        }
    }
}

impl AspectRatio {
    pub fn is_slice(&self) -> bool {
        matches!(
            self.align,
            Some(Align {
                fit: FitMode::Slice,
                ..
            })
        )
    }

    /// Computes the rectangle inside `viewport` where `vbox` gets mapped.
    pub fn compute(&self, vbox: &ViewBox, viewport: &Rect) -> Rect {
        match self.align {
            None => *viewport,

            Some(Align { x, y, fit }) => {
                let (vb_width, vb_height) = vbox.size();
                let (vp_width, vp_height) = viewport.size();

                let w_factor = vp_width / vb_width;
                let h_factor = vp_height / vb_height;

                let factor = match fit {
                    FitMode::Meet => w_factor.min(h_factor),
                    FitMode::Slice => w_factor.max(h_factor),
                };

                let w = vb_width * factor;
                let h = vb_height * factor;

                let xpos = x.compute(viewport.x0, vp_width, w);
                let ypos = y.compute(viewport.y0, vp_height, h);

                Rect::from_xywh(xpos, ypos, w, h)
            }
        }
    }

    /// Computes the viewport to viewbox transformation.
    ///
    /// The `(vbox.x0, vbox.y0)` corner is mapped to the upper-left corner of the aligned
    /// rectangle inside `viewport`.  Without a `vbox` the transform is just a translation
    /// to the viewport's origin.
    ///
    /// Returns `None` if the vbox or the viewport are empty, which means that the element
    /// should not be rendered, or if the resulting transform is not invertible.
    pub fn viewport_to_viewbox_transform(
        &self,
        vbox: Option<ViewBox>,
        viewport: &Rect,
    ) -> Option<Transform> {
        if viewport.is_empty() {
            return None;
        }

        let transform = match vbox {
            Some(vbox) if vbox.is_empty() => return None,

            Some(vbox) => {
                let r = self.compute(&vbox, viewport);
                Transform::new_translate(r.x0, r.y0)
                    .pre_scale(r.width() / vbox.width(), r.height() / vbox.height())
                    .pre_translate(-vbox.x0, -vbox.y0)
            }

            None => Transform::new_translate(viewport.x0, viewport.y0),
        };

        Some(transform).filter(Transform::is_invertible)
    }
}

fn parse_align_xy<'i>(
    parser: &mut Parser<'i, '_>,
) -> Result<Option<(Align1D, Align1D)>, BasicParseError<'i>> {
    use self::Align1D::*;

    parse_identifiers!(
        parser,

        "none" => None,

        "xMinYMin" => Some((Min, Min)),
        "xMidYMin" => Some((Mid, Min)),
        "xMaxYMin" => Some((Max, Min)),

        "xMinYMid" => Some((Min, Mid)),
        "xMidYMid" => Some((Mid, Mid)),
        "xMaxYMid" => Some((Max, Mid)),

        "xMinYMax" => Some((Min, Max)),
        "xMidYMax" => Some((Mid, Max)),
        "xMaxYMax" => Some((Max, Max)),
    )
}

fn parse_fit_mode<'i>(parser: &mut Parser<'i, '_>) -> Result<FitMode, BasicParseError<'i>> {
    parse_identifiers!(
        parser,
        "meet" => FitMode::Meet,
        "slice" => FitMode::Slice,
    )
}

impl Parse for AspectRatio {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<AspectRatio, ParseError<'i>> {
        let defer = parser
            .try_parse(|p| p.expect_ident_matching("defer"))
            .is_ok();

        let align_xy = parser.try_parse(parse_align_xy)?;
        let fit = parser.try_parse(parse_fit_mode).unwrap_or_default();
        let align = align_xy.map(|(x, y)| Align { x, y, fit });

        Ok(AspectRatio { defer, align })
    }
}
