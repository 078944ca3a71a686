//! The `filter` element.

use markup5ever::{expanded_name, local_name, namespace_url, ns};

use crate::coord_units::CoordUnits;
use crate::document::AcquiredNodes;
use crate::drawing_ctx::Viewport;
use crate::element::{set_attribute, ElementTrait};
use crate::filters::{FilterResolveError, FilterSpec};
use crate::is_element_of_type;
use crate::length::*;
use crate::node::{Node, NodeBorrow};
use crate::parsers::ParseValue;
use crate::rect::Rect;
use crate::rsvg_log;
use crate::xml::Attributes;
use crate::{borrow_element_as, coord_units};

coord_units!(FilterUnits, CoordUnits::ObjectBoundingBox);
coord_units!(PrimitiveUnits, CoordUnits::UserSpaceOnUse);

/// The `<filter>` node.
pub struct Filter {
    x: Length<Horizontal>,
    y: Length<Vertical>,
    width: ULength<Horizontal>,
    height: ULength<Vertical>,
    filter_units: FilterUnits,
    primitive_units: PrimitiveUnits,
}

/// A `<filter>` element definition in user-space coordinates.
pub struct UserSpaceFilter {
    pub rect: Rect,
    pub filter_units: CoordUnits,
    pub primitive_units: CoordUnits,
}

impl Default for Filter {
    /// Constructs a new `Filter` with default properties.
    fn default() -> Self {
        Self {
            x: Length::<Horizontal>::new(-0.1, LengthUnit::Percent),
            y: Length::<Vertical>::new(-0.1, LengthUnit::Percent),
            width: ULength::<Horizontal>::new(1.2, LengthUnit::Percent),
            height: ULength::<Vertical>::new(1.2, LengthUnit::Percent),
            filter_units: FilterUnits::default(),
            primitive_units: PrimitiveUnits::default(),
        }
    }
}

impl Filter {
    pub fn get_filter_units(&self) -> CoordUnits {
        self.filter_units.into()
    }

    pub fn get_primitive_units(&self) -> CoordUnits {
        self.primitive_units.into()
    }

    /// Resolves the filter region.  With `objectBoundingBox` units, `params` must be
    /// the ones of a unit square.
    pub fn to_user_space(&self, params: &NormalizeParams) -> UserSpaceFilter {
        let x = self.x.normalize(params);
        let y = self.y.normalize(params);
        let w = self.width.normalize(params);
        let h = self.height.normalize(params);

        UserSpaceFilter {
            rect: Rect::new(x, y, x + w, y + h),
            filter_units: self.get_filter_units(),
            primitive_units: self.get_primitive_units(),
        }
    }
}

impl ElementTrait for Filter {
    fn set_attributes(&mut self, attrs: &Attributes) {
        for (attr, value) in attrs.iter() {
            match attr.expanded() {
                expanded_name!("", "filterUnits") => {
                    set_attribute(&mut self.filter_units, attr.parse(value))
                }
                expanded_name!("", "x") => set_attribute(&mut self.x, attr.parse(value)),
                expanded_name!("", "y") => set_attribute(&mut self.y, attr.parse(value)),
                expanded_name!("", "width") => set_attribute(&mut self.width, attr.parse(value)),
                expanded_name!("", "height") => set_attribute(&mut self.height, attr.parse(value)),
                expanded_name!("", "primitiveUnits") => {
                    set_attribute(&mut self.primitive_units, attr.parse(value))
                }
                _ => (),
            }
        }
    }
}

/// Collects the primitives of a `<filter>` element, resolved to user space.
///
/// Children that are not filter primitives are skipped.  Unknown `fe*` elements are
/// primitives that copy their input to their result.
pub fn extract_filter_spec(
    filter_node: &Node,
    acquired_nodes: &mut AcquiredNodes<'_>,
    viewport: &Viewport,
) -> Result<FilterSpec, FilterResolveError> {
    if !is_element_of_type!(filter_node, Filter) {
        return Err(FilterResolveError::ReferenceToNonFilterElement);
    }

    let filter_element = filter_node.borrow_element();

    let user_space_filter = {
        let filter_values = filter_element.get_computed_values();
        let filter = borrow_element_as!(filter_node, Filter);
        let filter_viewport = viewport.with_units(filter.get_filter_units());

        filter.to_user_space(&filter_viewport.normalize_params(filter_values))
    };

    let primitive_viewport = viewport.with_units(user_space_filter.primitive_units);

    let mut primitives = Vec::new();

    for primitive_node in filter_node.children().filter(|c| c.is_element()) {
        let elt = primitive_node.borrow_element();

        let effect = match elt.as_filter_effect() {
            Some(effect) => effect,
            None => continue,
        };

        let params = primitive_viewport.normalize_params(elt.get_computed_values());

        match effect.resolve(acquired_nodes, &primitive_node) {
            Ok(resolved) => {
                primitives.extend(resolved.into_iter().map(|p| p.into_user_space(&params)));
            }

            Err(e) => {
                rsvg_log!("(filter primitive {} returned an error: {})", elt, e);
                return Err(e);
            }
        }
    }

    Ok(FilterSpec {
        name: filter_element
            .get_id()
            .unwrap_or("(filter element without id)")
            .to_string(),
        user_space_filter,
        primitives,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::length::Dpi;

    #[test]
    fn default_region_is_bbox_with_margin() {
        let filter = Filter::default();
        let params = NormalizeParams::new(Dpi::default(), 1.0, 1.0, 12.0);
        let f = filter.to_user_space(&params);

        assert!(f.rect.approx_eq(&Rect::new(-0.1, -0.1, 1.1, 1.1)));
        assert_eq!(f.filter_units, CoordUnits::ObjectBoundingBox);
        assert_eq!(f.primitive_units, CoordUnits::UserSpaceOnUse);
    }
}
