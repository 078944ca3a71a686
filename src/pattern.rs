//! The `pattern` element.

use markup5ever::{namespace_url, ns};
use std::cell::RefCell;

use crate::aspect_ratio::*;
use crate::bbox::BoundingBox;
use crate::coord_units;
use crate::coord_units::CoordUnits;
use crate::document::{AcquiredNodes, NodeStack};
use crate::drawing_ctx::Viewport;
use crate::element::{set_attribute, ElementData, ElementTrait};
use crate::error::*;
use crate::iri::fragment_id;
use crate::length::*;
use crate::node::{Node, NodeBorrow, WeakNode};
use crate::parsers::ParseValue;
use crate::rect::Rect;
use crate::rsvg_log;
use crate::state::State;
use crate::transform::Transform;
use crate::viewbox::*;
use crate::xml::Attributes;

coord_units!(PatternUnits, CoordUnits::ObjectBoundingBox);
coord_units!(PatternContentUnits, CoordUnits::UserSpaceOnUse);

/// Attributes as written on one `<pattern>`; `None` means "not specified here".
#[derive(Clone, Default)]
struct Specified {
    units: Option<PatternUnits>,
    content_units: Option<PatternContentUnits>,
    /// `Some(None)` is a resolved "no viewBox".
    vbox: Option<Option<ViewBox>>,
    preserve_aspect_ratio: Option<AspectRatio>,
    transform: Option<Transform>,
    x: Option<Length<Horizontal>>,
    y: Option<Length<Vertical>>,
    width: Option<ULength<Horizontal>>,
    height: Option<ULength<Vertical>>,
}

impl Specified {
    fn is_complete(&self) -> bool {
        let Specified {
            units,
            content_units,
            vbox,
            preserve_aspect_ratio,
            transform,
            x,
            y,
            width,
            height,
        } = self;

        [
            units.is_some(),
            content_units.is_some(),
            vbox.is_some(),
            preserve_aspect_ratio.is_some(),
            transform.is_some(),
            x.is_some(),
            y.is_some(),
            width.is_some(),
            height.is_some(),
        ]
        .iter()
        .all(|&present| present)
    }

    fn or(self, f: &Specified) -> Specified {
        Specified {
            units: self.units.or(f.units),
            content_units: self.content_units.or(f.content_units),
            vbox: self.vbox.or(f.vbox),
            preserve_aspect_ratio: self.preserve_aspect_ratio.or(f.preserve_aspect_ratio),
            transform: self.transform.or(f.transform),
            x: self.x.or(f.x),
            y: self.y.or(f.y),
            width: self.width.or(f.width),
            height: self.height.or(f.height),
        }
    }
}

/// A pattern partway through resolution.
struct PartialPattern {
    attrs: Specified,

    /// The first pattern in the chain that has element children.
    children: Option<WeakNode>,
}

impl PartialPattern {
    fn is_complete(&self) -> bool {
        self.children.is_some() && self.attrs.is_complete()
    }

    fn or(self, fallback: &PartialPattern) -> PartialPattern {
        PartialPattern {
            attrs: self.attrs.or(&fallback.attrs),
            children: self.children.or_else(|| fallback.children.clone()),
        }
    }

    fn with_defaults(self) -> ResolvedPattern {
        let a = self.attrs;

        ResolvedPattern {
            units: a.units.unwrap_or_default(),
            content_units: a.content_units.unwrap_or_default(),
            vbox: a.vbox.flatten(),
            preserve_aspect_ratio: a.preserve_aspect_ratio.unwrap_or_default(),
            transform: a.transform.unwrap_or_default(),
            x: a.x.unwrap_or_default(),
            y: a.y.unwrap_or_default(),
            width: a.width.unwrap_or_default(),
            height: a.height.unwrap_or_default(),
            children: self.children,
        }
    }
}

#[derive(Clone)]
pub struct ResolvedPattern {
    units: PatternUnits,
    content_units: PatternContentUnits,
    vbox: Option<ViewBox>,
    preserve_aspect_ratio: AspectRatio,
    transform: Transform,
    x: Length<Horizontal>,
    y: Length<Vertical>,
    width: ULength<Horizontal>,
    height: ULength<Vertical>,

    // `None` if no pattern in the chain has children; such a pattern paints nothing.
    children: Option<WeakNode>,
}

/// Pattern normalized to user-space units, ready to be rendered into a tile.
///
/// The tile is the rectangle `(0, 0, width, height)` in tile space.
pub struct UserSpacePattern {
    pub width: f64,
    pub height: f64,

    /// Maps tile space to the user space of the element being painted.
    pub coord_transform: Transform,

    /// Maps the user space of the pattern's contents to tile space.
    pub content_transform: Transform,

    /// Size that percentages in the pattern's contents resolve against.
    pub content_vbox: ViewBox,

    pub node_with_children: Node,
}

#[derive(Default)]
pub struct Pattern {
    attrs: Specified,
    href: Option<String>,
    resolved: RefCell<Option<ResolvedPattern>>,
}

impl ElementTrait for Pattern {
    fn set_attributes(&mut self, attrs: &Attributes) {
        let a = &mut self.attrs;

        for (attr, value) in attrs.iter().filter(|(attr, _)| attr.ns == ns!()) {
            match attr.local.as_ref() {
                "viewBox" => set_attribute(&mut a.vbox, attr.parse(value).map(Some)),
                "preserveAspectRatio" => {
                    set_attribute(&mut a.preserve_aspect_ratio, attr.parse(value))
                }
                "x" => set_attribute(&mut a.x, attr.parse(value)),
                "y" => set_attribute(&mut a.y, attr.parse(value)),
                "width" => set_attribute(&mut a.width, attr.parse(value)),
                "height" => set_attribute(&mut a.height, attr.parse(value)),
                "patternUnits" => set_attribute(&mut a.units, attr.parse(value)),
                "patternContentUnits" => set_attribute(&mut a.content_units, attr.parse(value)),
                "patternTransform" => set_attribute(&mut a.transform, attr.parse(value)),
                _ => (),
            }
        }

        self.href = attrs.get_href().and_then(fragment_id).map(String::from);
    }
}

impl ResolvedPattern {
    fn node_with_children(&self) -> Option<Node> {
        self.children.as_ref().and_then(|wc| wc.upgrade())
    }

    /// Normalizes the pattern for an element with bounding box `bbox`.
    ///
    /// Returns `None` when the pattern would not paint anything: it has no contents, its
    /// tile is empty, or it needs a bounding box that is empty.
    pub fn to_user_space(
        &self,
        bbox: &BoundingBox,
        viewport: &Viewport,
        values: &State,
    ) -> Option<UserSpacePattern> {
        let node_with_children = self.node_with_children()?;

        let units = self.units.0;
        let bbox_transform = bbox.rect_to_transform(units)?;
        let params = viewport.with_units(units).normalize_params(values);

        let rect = Rect::from_xywh(
            self.x.normalize(&params),
            self.y.normalize(&params),
            self.width.normalize(&params),
            self.height.normalize(&params),
        );
        let rect = bbox_transform.transform_rect(&rect);

        if rect.is_empty() {
            return None;
        }

        let (width, height) = rect.size();
        let coord_transform = self.transform.pre_translate(rect.x0, rect.y0);

        let (content_transform, content_vbox) = match self.vbox {
            Some(vbox) => (
                self.preserve_aspect_ratio
                    .viewport_to_viewbox_transform(Some(vbox), &Rect::from_size(width, height))?,
                vbox,
            ),

            None => match self.content_units.0 {
                CoordUnits::ObjectBoundingBox => {
                    let r = bbox.rect.filter(|r| !r.is_empty())?;
                    (
                        Transform::new_scale(r.width(), r.height()),
                        ViewBox::from(Rect::from_size(1.0, 1.0)),
                    )
                }

                CoordUnits::UserSpaceOnUse => (Transform::identity(), viewport.vbox),
            },
        };

        if !coord_transform.is_invertible() {
            return None;
        }

        Some(UserSpacePattern {
            width,
            height,
            coord_transform,
            content_transform,
            content_vbox,
            node_with_children,
        })
    }
}

impl Pattern {
    fn partial(&self, node: &Node) -> PartialPattern {
        PartialPattern {
            attrs: self.attrs.clone(),
            children: node
                .children()
                .any(|child| child.is_element())
                .then(|| node.downgrade()),
        }
    }

    /// Follows the chain of `href` references, inheriting unspecified attributes and the
    /// children of the first pattern in the chain that has any.
    ///
    /// The result is cached in the element.  A broken or circular chain stops the
    /// resolution; the remaining attributes take their defaults.
    pub fn resolve(
        &self,
        node: &Node,
        acquired_nodes: &mut AcquiredNodes<'_>,
    ) -> Result<ResolvedPattern, AcquireError> {
        let mut cache = self.resolved.borrow_mut();
        if let Some(ref pattern) = *cache {
            return Ok(pattern.clone());
        }

        let mut pattern = self.partial(node);
        let mut href = self.href.clone();

        let mut stack = NodeStack::new();
        stack.push(node);

        while !pattern.is_complete() {
            let Some(id) = href.take() else { break };

            let acquired = match acquired_nodes.acquire(&id) {
                Ok(acquired) => acquired,
                Err(AcquireError::MaxReferencesExceeded) => {
                    return Err(AcquireError::MaxReferencesExceeded)
                }
                Err(e) => {
                    rsvg_log!("stopping pattern resolution: {}", e);
                    break;
                }
            };

            let fallback_node = acquired.get();

            if stack.contains(fallback_node) {
                rsvg_log!("circular reference in pattern \"{}\"", id);
                break;
            }

            let (fallback, next) = match *fallback_node.borrow_element_data() {
                ElementData::Pattern(ref p) => (p.partial(fallback_node), p.href.clone()),
                _ => {
                    rsvg_log!("\"{}\" is not a pattern", id);
                    break;
                }
            };

            pattern = pattern.or(&fallback);
            href = next;
            stack.push(fallback_node);
        }

        let pattern = pattern.with_defaults();
        *cache = Some(pattern.clone());

        Ok(pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::borrow_element_as;
    use crate::document::Document;
    use float_cmp::approx_eq;
    use markup5ever::{LocalName, QualName};

    fn qual(name: &str) -> QualName {
        QualName::new(None, ns!(), LocalName::from(name))
    }

    fn attrs(pairs: &[(&str, &str)]) -> Attributes {
        let names: Vec<QualName> = pairs.iter().map(|(n, _)| qual(n)).collect();
        Attributes::from_pairs(names.iter().zip(pairs.iter().map(|(_, v)| *v))).unwrap()
    }

    fn viewport() -> Viewport {
        Viewport::new(Dpi::default(), 100.0, 100.0, Transform::identity())
    }

    #[test]
    fn pattern_without_children_paints_nothing() {
        let mut doc = Document::new();
        let mut root = doc.append_element(&qual("svg"), Attributes::new(), None).unwrap();
        let node = doc
            .append_element(
                &qual("pattern"),
                attrs(&[("width", "10"), ("height", "10"), ("patternUnits", "userSpaceOnUse")]),
                Some(&mut root),
            )
            .unwrap();

        let mut acquired = AcquiredNodes::new(&doc);
        let resolved = borrow_element_as!(node, Pattern)
            .resolve(&node, &mut acquired)
            .unwrap();

        let bbox = BoundingBox::new().with_rect(Rect::from_size(50.0, 50.0));
        assert!(resolved
            .to_user_space(&bbox, &viewport(), &State::default())
            .is_none());
    }

    #[test]
    fn inherits_children_and_attributes_through_href() {
        let mut doc = Document::new();
        let mut root = doc.append_element(&qual("svg"), Attributes::new(), None).unwrap();
        let mut base = doc
            .append_element(
                &qual("pattern"),
                attrs(&[("id", "base"), ("width", "0.5"), ("height", "0.25")]),
                Some(&mut root),
            )
            .unwrap();
        doc.append_element(&qual("rect"), Attributes::new(), Some(&mut base))
            .unwrap();

        let derived = doc
            .append_element(
                &qual("pattern"),
                attrs(&[("id", "derived"), ("href", "#base"), ("x", "0.5")]),
                Some(&mut root),
            )
            .unwrap();

        let mut acquired = AcquiredNodes::new(&doc);
        let resolved = borrow_element_as!(derived, Pattern)
            .resolve(&derived, &mut acquired)
            .unwrap();

        let bbox = BoundingBox::new().with_rect(Rect::new(10.0, 10.0, 50.0, 30.0));
        let user = resolved
            .to_user_space(&bbox, &viewport(), &State::default())
            .unwrap();

        assert!(user.node_with_children == base);
        assert!(approx_eq!(f64, user.width, 20.0));
        assert!(approx_eq!(f64, user.height, 5.0));
        assert_eq!(user.coord_transform.transform_point(0.0, 0.0), (30.0, 10.0));
        assert_eq!(user.content_transform, Transform::identity());
    }

    #[test]
    fn view_box_maps_contents_into_tile() {
        let mut doc = Document::new();
        let mut root = doc.append_element(&qual("svg"), Attributes::new(), None).unwrap();
        let mut node = doc
            .append_element(
                &qual("pattern"),
                attrs(&[
                    ("patternUnits", "userSpaceOnUse"),
                    ("width", "20"),
                    ("height", "20"),
                    ("viewBox", "0 0 10 10"),
                    ("patternTransform", "translate(5, 0)"),
                ]),
                Some(&mut root),
            )
            .unwrap();
        doc.append_element(&qual("rect"), Attributes::new(), Some(&mut node))
            .unwrap();

        let mut acquired = AcquiredNodes::new(&doc);
        let resolved = borrow_element_as!(node, Pattern)
            .resolve(&node, &mut acquired)
            .unwrap();

        let user = resolved
            .to_user_space(&BoundingBox::new(), &viewport(), &State::default())
            .unwrap();

        assert_eq!(user.content_transform.transform_point(10.0, 10.0), (20.0, 20.0));
        assert_eq!(user.coord_transform.transform_point(0.0, 0.0), (5.0, 0.0));
        assert_eq!(user.content_vbox, ViewBox::from(Rect::from_size(10.0, 10.0)));
    }

    #[test]
    fn circular_href_is_broken() {
        let mut doc = Document::new();
        let mut root = doc.append_element(&qual("svg"), Attributes::new(), None).unwrap();
        doc.append_element(
            &qual("pattern"),
            attrs(&[("id", "a"), ("href", "#b")]),
            Some(&mut root),
        )
        .unwrap();
        let b = doc
            .append_element(
                &qual("pattern"),
                attrs(&[("id", "b"), ("href", "#a")]),
                Some(&mut root),
            )
            .unwrap();

        let mut acquired = AcquiredNodes::new(&doc);
        let resolved = borrow_element_as!(b, Pattern).resolve(&b, &mut acquired);
        assert!(resolved.is_ok());
    }
}
