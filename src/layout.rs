//! Layout objects.
//!
//! Elements turn their attributes and computed state into these objects, which carry
//! everything the [`crate::drawing_ctx::DrawingCtx`] needs to render them.

use std::rc::Rc;

use crate::aspect_ratio::AspectRatio;
use crate::coord_units::CoordUnits;
use crate::document::AcquiredNodes;
use crate::element::Element;
use crate::node::*;
use crate::paint_server::PaintSource;
use crate::path_builder::Path;
use crate::rasterizer::FillRule;
use crate::rect::Rect;
use crate::rsvg_log;
use crate::state::State;
use crate::surface_utils::shared_surface::SharedImageSurface;
use crate::text::GlyphRun;
use crate::transform::Transform;
use crate::{borrow_element_as, is_element_of_type};

/// Reference from an element to the `<filter>` that applies to it.
pub enum FilterRef {
    None,

    Node(Node),
}

/// Everything that decides whether an element is rendered in an offscreen layer.
///
/// An element gets a layer if it has `opacity` less than 1, a filter, a mask, or a clip
/// path in `objectBoundingBox` units, since those can only be applied once the element's
/// bounding box is known.  A clip path in `userSpaceOnUse` units is applied while
/// drawing, without a layer.
pub struct StackingContext {
    pub element_name: String,
    pub transform: Transform,
    pub opacity: u8,
    pub filter: FilterRef,
    pub clip_in_user_space: Option<Node>,
    pub clip_in_object_space: Option<Node>,
    pub mask: Option<Node>,
}

impl StackingContext {
    pub fn new(
        acquired_nodes: &mut AcquiredNodes<'_>,
        element: &Element,
        transform: Transform,
        values: &State,
    ) -> StackingContext {
        let element_name = format!("{}", element);

        let clip_uri = values.clip_path.get();
        let (clip_in_user_space, clip_in_object_space) = clip_uri
            .and_then(|node_id| {
                acquired_nodes
                    .acquire(node_id)
                    .ok()
                    .filter(|a| is_element_of_type!(*a.get(), ClipPath))
            })
            .map(|acquired| {
                let clip_node = acquired.get().clone();

                let units = borrow_element_as!(clip_node, ClipPath).get_units();

                match units {
                    CoordUnits::UserSpaceOnUse => (Some(clip_node), None),
                    CoordUnits::ObjectBoundingBox => (None, Some(clip_node)),
                }
            })
            .unwrap_or((None, None));

        if clip_uri.is_some() && clip_in_user_space.is_none() && clip_in_object_space.is_none() {
            rsvg_log!(
                "element {} references \"{}\" which is not a clipPath",
                element,
                clip_uri.unwrap_or_default()
            );
        }

        let mask = values.mask.get().and_then(|mask_id| {
            if let Ok(acquired) = acquired_nodes.acquire(mask_id) {
                let node = acquired.get();

                if is_element_of_type!(node, Mask) {
                    Some(node.clone())
                } else {
                    rsvg_log!(
                        "element {} references \"{}\" which is not a mask",
                        element,
                        mask_id
                    );

                    None
                }
            } else {
                rsvg_log!(
                    "element {} references nonexistent mask \"{}\"",
                    element,
                    mask_id
                );

                None
            }
        });

        let filter = match values.filter.get() {
            None => FilterRef::None,

            Some(filter_id) => match acquired_nodes.acquire(filter_id) {
                Ok(acquired) if is_element_of_type!(acquired.get(), Filter) => {
                    FilterRef::Node(acquired.get().clone())
                }

                // Draw the element as if it had no filter.
                _ => {
                    rsvg_log!(
                        "element {} references invalid filter \"{}\"; rendering it unfiltered",
                        element,
                        filter_id
                    );

                    FilterRef::None
                }
            },
        };

        StackingContext {
            element_name,
            transform,
            opacity: values.opacity,
            filter,
            clip_in_user_space,
            clip_in_object_space,
            mask,
        }
    }

    /// A context that only applies a transform.
    pub fn with_transform(element_name: &str, transform: Transform) -> StackingContext {
        StackingContext {
            element_name: element_name.to_string(),
            transform,
            opacity: 255,
            filter: FilterRef::None,
            clip_in_user_space: None,
            clip_in_object_space: None,
            mask: None,
        }
    }

    pub fn should_isolate(&self) -> bool {
        self.opacity < 255
            || self.clip_in_object_space.is_some()
            || self.mask.is_some()
            || matches!(self.filter, FilterRef::Node(_))
    }
}

/// Paths and basic shapes resolved to a path.
///
/// Note that `stroke_paint` and `fill_paint` are not in user-space coordinates;
/// they are just resolved to a `PaintSource`.  Turning them to a `UserSpacePaintSource`
/// involves knowing the bounding box of the path.
pub struct Shape {
    pub path: Rc<Path>,
    pub is_visible: bool,
    pub fill_paint: PaintSource,
    pub fill_opacity: u8,
    pub fill_rule: FillRule,
    pub stroke_paint: PaintSource,
    pub stroke_opacity: u8,
    pub clip_rule: FillRule,
    pub markers: Markers,
}

/// Resolved marker references of a shape.
#[derive(Default)]
pub struct Markers {
    pub start: Option<Node>,
    pub mid: Option<Node>,
    pub end: Option<Node>,
}

impl Markers {
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.mid.is_none() && self.end.is_none()
    }
}

/// Image in user-space coordinates.
pub struct Image {
    pub surface: SharedImageSurface,
    pub is_visible: bool,
    pub rect: Rect,
    pub aspect: AspectRatio,
}

/// A run of glyphs positioned in user space, with the pen at `(x, y)` on the baseline.
pub struct TextSpan {
    pub run: GlyphRun,
    pub x: f64,
    pub y: f64,
    pub is_visible: bool,
    pub fill_paint: PaintSource,
    pub fill_opacity: u8,
}
