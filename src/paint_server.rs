//! SVG paint servers.

use crate::bbox::BoundingBox;
use crate::color::{resolve_color, RGBA};
use crate::document::AcquiredNodes;
use crate::drawing_ctx::Viewport;
use crate::element::ElementData;
use crate::error::*;
use crate::gradient::{ResolvedGradient, UserSpaceGradient};
use crate::node::NodeBorrow;
use crate::pattern::{ResolvedPattern, UserSpacePattern};
use crate::rsvg_log;
use crate::state::{Paint, State};

/// A paint server after following its reference, but before knowing what it paints.
pub enum PaintSource {
    None,
    Gradient(ResolvedGradient, Option<RGBA>),
    Pattern(ResolvedPattern, Option<RGBA>),
    SolidColor(RGBA),
}

/// A paint server resolved against the bounding box of the element being painted.
pub enum UserSpacePaintSource {
    None,
    Gradient(UserSpaceGradient, Option<RGBA>),
    Pattern(UserSpacePattern, Option<RGBA>),
    SolidColor(RGBA),
}

impl Paint {
    /// Follows a `url(#id)` reference to a gradient or pattern.
    ///
    /// A reference that cannot be used falls back to the alternate color, or to no
    /// paint at all.  Only an exceeded reference limit is an error.
    pub fn resolve(
        &self,
        acquired_nodes: &mut AcquiredNodes<'_>,
        current_color: RGBA,
    ) -> Result<PaintSource, RenderingError> {
        match *self {
            Paint::Iri {
                ref iri,
                ref alternate,
            } => {
                let alternate = alternate.as_ref().map(|c| resolve_color(c, current_color));

                acquired_nodes
                    .acquire(iri)
                    .and_then(|acquired| {
                        let node = acquired.get();

                        match *node.borrow_element_data() {
                            ElementData::LinearGradient(ref g) => g
                                .resolve(node, acquired_nodes)
                                .map(|g| PaintSource::Gradient(g, alternate)),
                            ElementData::RadialGradient(ref g) => g
                                .resolve(node, acquired_nodes)
                                .map(|g| PaintSource::Gradient(g, alternate)),
                            ElementData::Pattern(ref p) => p
                                .resolve(node, acquired_nodes)
                                .map(|p| PaintSource::Pattern(p, alternate)),
                            _ => Err(AcquireError::InvalidLinkType(iri.clone())),
                        }
                    })
                    .or_else(|err| match (err, alternate) {
                        (AcquireError::MaxReferencesExceeded, _) => {
                            rsvg_log!("maximum number of references exceeded");
                            Err(AcquireError::MaxReferencesExceeded.into())
                        }

                        // A circular reference here means a gradient or pattern with a
                        // cycle in its href chain, which is an invalid paint server.
                        (_, Some(color)) => {
                            rsvg_log!(
                                "could not resolve paint server \"{}\", using alternate color",
                                iri
                            );

                            Ok(PaintSource::SolidColor(color))
                        }

                        (_, None) => {
                            rsvg_log!(
                                "could not resolve paint server \"{}\", no alternate color specified",
                                iri
                            );

                            Ok(PaintSource::None)
                        }
                    })
            }

            Paint::SolidColor(ref color) => {
                Ok(PaintSource::SolidColor(resolve_color(color, current_color)))
            }

            Paint::None => Ok(PaintSource::None),
        }
    }
}

impl PaintSource {
    /// Resolves the paint for an element with bounding box `bbox`.
    pub fn to_user_space(
        &self,
        bbox: &BoundingBox,
        viewport: &Viewport,
        values: &State,
    ) -> UserSpacePaintSource {
        match *self {
            PaintSource::None => UserSpacePaintSource::None,
            PaintSource::SolidColor(c) => UserSpacePaintSource::SolidColor(c),

            PaintSource::Gradient(ref g, c) => {
                // Gradients with zero or one stops paint nothing, or a solid color.
                match g.stops() {
                    [] => return UserSpacePaintSource::None,
                    [stop] => return UserSpacePaintSource::SolidColor(stop.rgba),
                    _ => (),
                }

                match (g.to_user_space(bbox, viewport, values), c) {
                    (Some(gradient), c) => UserSpacePaintSource::Gradient(gradient, c),
                    (None, Some(c)) => UserSpacePaintSource::SolidColor(c),
                    (None, None) => UserSpacePaintSource::None,
                }
            }

            PaintSource::Pattern(ref p, c) => match (p.to_user_space(bbox, viewport, values), c) {
                (Some(pattern), c) => UserSpacePaintSource::Pattern(pattern, c),
                (None, Some(c)) => UserSpacePaintSource::SolidColor(c),
                (None, None) => UserSpacePaintSource::None,
            },
        }
    }
}
