//! SVG Elements.

use markup5ever::{expanded_name, local_name, namespace_url, ns, QualName};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fmt;

use crate::bbox::BoundingBox;
use crate::cond::Conditions;
use crate::css::{self, Declaration, Stylesheet};
use crate::document::AcquiredNodes;
use crate::drawing_ctx::{DrawingCtx, Viewport};
use crate::error::*;
use crate::filter::Filter;
use crate::filters::{
    blend::FeBlend,
    color_matrix::FeColorMatrix,
    component_transfer::{FeComponentTransfer, FeFuncA, FeFuncB, FeFuncG, FeFuncR},
    composite::FeComposite,
    convolve_matrix::FeConvolveMatrix,
    displacement_map::FeDisplacementMap,
    flood::FeFlood,
    gaussian_blur::FeGaussianBlur,
    image::FeImage,
    lighting::{FeDiffuseLighting, FeDistantLight, FePointLight, FeSpecularLighting, FeSpotLight},
    merge::{FeMerge, FeMergeNode},
    morphology::FeMorphology,
    offset::FeOffset,
    tile::FeTile,
    turbulence::FeTurbulence,
    unknown::FeUnknown,
    FilterEffect,
};
use crate::gradient::{LinearGradient, RadialGradient, Stop};
use crate::image::Image;
use crate::length::Dpi;
use crate::marker::Marker;
use crate::node::*;
use crate::parsers::ParseValue;
use crate::pattern::Pattern;
use crate::rsvg_log;
use crate::shapes::{Circle, Ellipse, Line, Path, Polygon, Polyline, Rect};
use crate::state::{is_presentation_attribute, parse_property_str, State};
use crate::structure::{ClipPath, Group, Link, Mask, NonRendering, Svg, Switch, Symbol, Use};
use crate::style::Style;
use crate::text::{TSpan, Text};
use crate::transform::Transform;
use crate::xml::Attributes;

pub trait ElementTrait {
    /// Sets per-element attributes.
    ///
    /// Each element is supposed to iterate the `attributes`, and parse any ones it needs.
    /// SVG specifies that unknown attributes should be ignored, and known attributes with invalid
    /// values should be ignored so that the attribute ends up with its "initial value".
    ///
    /// You can use the [`set_attribute`] function to do that.
    fn set_attributes(&mut self, _attributes: &Attributes) {}

    /// Draw an element.
    ///
    /// Each element is supposed to draw itself as needed.
    fn draw(
        &self,
        _node: &Node,
        _acquired_nodes: &mut AcquiredNodes<'_>,
        _cascaded: &CascadedValues<'_>,
        viewport: &Viewport,
        _draw_ctx: &mut DrawingCtx,
        _clipping: bool,
    ) -> Result<BoundingBox, RenderingError> {
        // by default elements don't draw themselves
        Ok(viewport.empty_bbox())
    }
}

/// Sets `dest` if `parse_result` is `Ok()`, otherwise just logs the error.
///
/// Implementations of the [`ElementTrait`] trait generally scan a list of attributes
/// for the ones they can handle, and parse their string values.  Per the SVG spec, an attribute
/// with an invalid value should be ignored, and it should fall back to the default value.
///
/// Those default values are set in each element's implementation of the [`Default`] trait:
/// at element creation time, each element gets initialized to its `Default`, and then each
/// attribute gets parsed.  This function will set that attribute's value only if parsing was
/// successful.
pub fn set_attribute<T>(dest: &mut T, parse_result: Result<T, ElementError>) {
    match parse_result {
        Ok(v) => *dest = v,
        Err(e) => {
            rsvg_log!("ignoring attribute with invalid value: {}", e);
        }
    }
}

pub struct Element {
    element_name: QualName,
    attributes: Attributes,
    transform: Transform,
    presentation_attributes: Vec<Declaration>,

    /// All the declarations that apply to the element, in the order they get applied.
    declarations: Vec<Declaration>,

    values: State,
    conditions: Conditions,
    pub element_data: ElementData,
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.element_name().local)?;
        write!(f, " id={}", self.get_id().unwrap_or("None"))?;
        Ok(())
    }
}

macro_rules! element_data {
    (
        elements: $($variant:ident),*;
        primitives: $($primitive:ident),*;
        primitive_children: $($child:ident),* $(,)?
    ) => {
        /// Parsed contents of an element node; one boxed variant per element type.
        pub enum ElementData {
            $($variant(Box<$variant>),)*
            $($primitive(Box<$primitive>),)*
            $($child(Box<$child>),)*
        }

        impl ElementData {
            fn as_element_trait(&self) -> &dyn ElementTrait {
                match self {
                    $(ElementData::$variant(d) => &**d,)*
                    $(ElementData::$primitive(d) => &**d,)*
                    $(ElementData::$child(d) => &**d,)*
                }
            }

            fn as_filter_effect(&self) -> Option<&dyn FilterEffect> {
                match self {
                    $(ElementData::$primitive(d) => Some(&**d),)*
                    _ => None,
                }
            }
        }
    };
}

element_data! {
    elements:
        Circle, ClipPath, Ellipse, Filter, Group, Image, Line, LinearGradient, Link, Marker,
        Mask, NonRendering, Path, Pattern, Polygon, Polyline, RadialGradient, Rect, Stop,
        Style, Svg, Switch, Symbol, Text, TSpan, Use;

    primitives:
        FeBlend, FeColorMatrix, FeComponentTransfer, FeComposite, FeConvolveMatrix,
        FeDiffuseLighting, FeDisplacementMap, FeFlood, FeGaussianBlur, FeImage, FeMerge,
        FeMorphology, FeOffset, FeSpecularLighting, FeTile, FeTurbulence, FeUnknown;

    // only meaningful inside a primitive
    primitive_children:
        FeDistantLight, FeFuncA, FeFuncB, FeFuncG, FeFuncR, FeMergeNode, FePointLight,
        FeSpotLight,
}

type ElementDataCreateFn = fn(attributes: &Attributes) -> ElementData;

/// A function that builds the element `$variant` from its default and parses its attributes.
macro_rules! creator {
    ($variant:ident) => {
        (|attributes: &Attributes| {
            let mut payload = Box::<$variant>::default();
            payload.set_attributes(attributes);
            ElementData::$variant(payload)
        }) as ElementDataCreateFn
    };
}

impl Element {
    /// Takes an XML element name and consumes a list of attribute/value pairs to create an [`Element`].
    ///
    /// This operation does not fail.  Unknown element names produce a group, so that
    /// their known descendants are still rendered; unknown `fe*` names produce a
    /// filter primitive that passes its input through.
    pub fn new(name: &QualName, attributes: Attributes) -> Element {
        let (create_fn, ignore_class) = match ELEMENT_CREATORS.get(name.local.as_ref()) {
            Some(&creator) => creator,
            None if name.local.starts_with("fe") => (creator!(FeUnknown), false),
            None => (creator!(Group), false),
        };

        let attributes = if ignore_class {
            let kept: Vec<(QualName, &str)> = attributes
                .iter()
                .filter(|(n, _)| n.expanded() != expanded_name!("", "class"))
                .collect();

            Attributes::from_pairs(kept.iter().map(|(n, v)| (n, *v))).unwrap_or_default()
        } else {
            attributes
        };

        let element_data = create_fn(&attributes);
        let conditions = Conditions::from_attributes(&attributes);

        let mut e = Self {
            element_name: name.clone(),
            attributes,
            transform: Transform::identity(),
            presentation_attributes: Vec::new(),
            declarations: Vec::new(),
            values: State::default(),
            conditions,
            element_data,
        };

        e.set_transform_and_presentation_attributes();

        e
    }

    pub fn element_name(&self) -> &QualName {
        &self.element_name
    }

    pub fn get_attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn get_id(&self) -> Option<&str> {
        self.attributes.get_id()
    }

    pub fn get_class(&self) -> Option<&str> {
        self.attributes.get_class()
    }

    /// The element's own `transform` attribute.
    pub fn get_transform(&self) -> Transform {
        self.transform
    }

    pub fn get_computed_values(&self) -> &State {
        &self.values
    }

    /// Gathers the element's declarations and computes its state from the parent's.
    ///
    /// Declarations apply in this order: rules from the stylesheet, presentation
    /// attributes, the `style` attribute, and finally every `!important` declaration.
    pub fn cascade(&mut self, stylesheet: &Stylesheet, parent: &State, dpi: Dpi) -> &State {
        let mut declarations = {
            let classes: Vec<&str> = self
                .get_class()
                .map(|c| c.split_whitespace().collect())
                .unwrap_or_default();

            stylesheet.lookup(self.element_name.local.as_ref(), &classes, self.get_id())
        };

        declarations.extend(self.presentation_attributes.iter().cloned());

        if let Some(style) = self
            .attributes
            .iter()
            .find(|(attr, _)| attr.expanded() == expanded_name!("", "style"))
            .map(|(_, value)| value)
        {
            declarations.extend(css::parse_style_attribute(style));
        }

        let (important, mut normal): (Vec<_>, Vec<_>) =
            declarations.into_iter().partition(|d| d.important);
        normal.extend(important);

        self.declarations = normal;
        self.values = self.compute_values(parent, dpi);

        &self.values
    }

    /// Computes the element's state as if its parent had the state `parent`.
    ///
    /// This is used for the normal cascade, and to re-cascade subtrees instanced by `use`.
    pub fn compute_values(&self, parent: &State, dpi: Dpi) -> State {
        let mut values = parent.for_child();
        values.transform = self.transform;

        for decl in &self.declarations {
            values.set_property(&decl.property, parent.font_size, dpi);
        }

        values
    }

    pub fn get_cond(&self, user_languages: &[String]) -> bool {
        self.conditions.allow(user_languages)
    }

    /// Parses the `transform` attribute and the presentation attributes.
    ///
    /// Invalid values are logged and ignored.
    fn set_transform_and_presentation_attributes(&mut self) {
        let transform_attr = match self.element_data {
            ElementData::LinearGradient(_) | ElementData::RadialGradient(_) => None,
            ElementData::Pattern(_) => None,
            _ => Some(expanded_name!("", "transform")),
        };

        for (attr, value) in self.attributes.iter() {
            let expanded = attr.expanded();

            if Some(expanded) == transform_attr {
                let mut transform = Transform::identity();
                set_attribute(&mut transform, attr.parse(value));
                self.transform = transform;
                continue;
            }

            let name = if expanded == expanded_name!(xml "space") {
                "xml:space"
            } else if attr.ns == ns!() && is_presentation_attribute(attr.local.as_ref()) {
                attr.local.as_ref()
            } else {
                continue;
            };

            match parse_property_str(name, value) {
                Ok(property) => self.presentation_attributes.push(Declaration {
                    property,
                    important: false,
                }),

                Err(e) => {
                    rsvg_log!(
                        "ignoring attribute {}=\"{}\" on {}: {}",
                        name,
                        value,
                        self.element_name.local,
                        e
                    );
                }
            }
        }
    }

    /// The element as a filter primitive, if it is one.
    pub fn as_filter_effect(&self) -> Option<&dyn FilterEffect> {
        self.element_data.as_filter_effect()
    }

    /// Elements that are only used through references from other elements, like
    /// `fill="url(#gradient)"`, and never drawn in place.
    pub fn is_accessed_by_reference(&self) -> bool {
        use ElementData::*;

        matches!(
            self.element_data,
            ClipPath(_)
                | Filter(_)
                | LinearGradient(_)
                | Marker(_)
                | Mask(_)
                | Pattern(_)
                | RadialGradient(_)
        )
    }

    /// Whether the element draws something when it is a child of a container.
    pub fn is_renderable(&self) -> bool {
        use ElementData::*;

        !matches!(
            self.element_data,
            ClipPath(_)
                | Filter(_)
                | LinearGradient(_)
                | Marker(_)
                | Mask(_)
                | NonRendering(_)
                | Pattern(_)
                | RadialGradient(_)
                | Stop(_)
                | Style(_)
                | Symbol(_)
        ) && self.as_filter_effect().is_none()
    }

    /// The main drawing function for elements.
    pub fn draw(
        &self,
        node: &Node,
        acquired_nodes: &mut AcquiredNodes<'_>,
        cascaded: &CascadedValues<'_>,
        viewport: &Viewport,
        draw_ctx: &mut DrawingCtx,
        clipping: bool,
    ) -> Result<BoundingBox, RenderingError> {
        let values = cascaded.get();

        if values.is_displayed() && self.get_cond(draw_ctx.user_languages()) {
            self.element_data
                .as_element_trait()
                .draw(node, acquired_nodes, cascaded, viewport, draw_ctx, clipping)
        } else {
            Ok(viewport.empty_bbox())
        }
    }
}

/// Element constructors by local name, and whether the element ignores its `class`
/// attribute.  Light sources, transfer functions, merge nodes and `style` are never
/// matched by class selectors.
///
/// `animate`, `foreignObject` and `textPath` are not supported, so they end up as groups.
static ELEMENT_CREATORS: Lazy<HashMap<&'static str, (ElementDataCreateFn, bool)>> =
    Lazy::new(|| {
        let table: &[(&str, ElementDataCreateFn, bool)] = &[
            ("a", creator!(Link), false),
            ("circle", creator!(Circle), false),
            ("clipPath", creator!(ClipPath), false),
            ("defs", creator!(NonRendering), false),
            ("ellipse", creator!(Ellipse), false),
            ("filter", creator!(Filter), false),
            ("g", creator!(Group), false),
            ("image", creator!(Image), false),
            ("line", creator!(Line), false),
            ("linearGradient", creator!(LinearGradient), false),
            ("marker", creator!(Marker), false),
            ("mask", creator!(Mask), false),
            ("path", creator!(Path), false),
            ("pattern", creator!(Pattern), false),
            ("polygon", creator!(Polygon), false),
            ("polyline", creator!(Polyline), false),
            ("radialGradient", creator!(RadialGradient), false),
            ("rect", creator!(Rect), false),
            ("stop", creator!(Stop), false),
            ("style", creator!(Style), true),
            ("svg", creator!(Svg), false),
            ("switch", creator!(Switch), false),
            ("symbol", creator!(Symbol), false),
            ("text", creator!(Text), false),
            ("tspan", creator!(TSpan), false),
            ("use", creator!(Use), false),
            // filter primitives
            ("feBlend", creator!(FeBlend), false),
            ("feColorMatrix", creator!(FeColorMatrix), false),
            ("feComponentTransfer", creator!(FeComponentTransfer), false),
            ("feComposite", creator!(FeComposite), false),
            ("feConvolveMatrix", creator!(FeConvolveMatrix), false),
            ("feDiffuseLighting", creator!(FeDiffuseLighting), false),
            ("feDisplacementMap", creator!(FeDisplacementMap), false),
            ("feFlood", creator!(FeFlood), false),
            ("feGaussianBlur", creator!(FeGaussianBlur), false),
            ("feImage", creator!(FeImage), false),
            ("feMerge", creator!(FeMerge), false),
            ("feMorphology", creator!(FeMorphology), false),
            ("feOffset", creator!(FeOffset), false),
            ("feSpecularLighting", creator!(FeSpecularLighting), false),
            ("feTile", creator!(FeTile), false),
            ("feTurbulence", creator!(FeTurbulence), false),
            // children of filter primitives
            ("feDistantLight", creator!(FeDistantLight), true),
            ("fePointLight", creator!(FePointLight), true),
            ("feSpotLight", creator!(FeSpotLight), true),
            ("feFuncA", creator!(FeFuncA), true),
            ("feFuncB", creator!(FeFuncB), true),
            ("feFuncG", creator!(FeFuncG), true),
            ("feFuncR", creator!(FeFuncR), true),
            ("feMergeNode", creator!(FeMergeNode), true),
        ];

        table.iter().map(|&(n, c, f)| (n, (c, f))).collect()
    });

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{Color, RGBA};
    use crate::state::Paint;
    use markup5ever::{LocalName, Prefix};

    fn element(name: &str, attrs: &[(&str, &str)]) -> Element {
        let names: Vec<QualName> = attrs
            .iter()
            .map(|(n, _)| match n.split_once(':') {
                Some((p, l)) => QualName::new(Some(Prefix::from(p)), ns!(), LocalName::from(l)),
                None => QualName::new(None, ns!(), LocalName::from(*n)),
            })
            .collect();

        let attributes =
            Attributes::from_pairs(names.iter().zip(attrs.iter().map(|(_, v)| *v))).unwrap();

        Element::new(&QualName::new(None, ns!(svg), LocalName::from(name)), attributes)
    }

    fn red() -> Paint {
        Paint::SolidColor(Color::RGBA(RGBA::new(255, 0, 0, 255)))
    }

    fn blue() -> Paint {
        Paint::SolidColor(Color::RGBA(RGBA::new(0, 0, 255, 255)))
    }

    #[test]
    fn unknown_elements_are_groups() {
        let e = element("frobnicator", &[]);
        assert!(matches!(e.element_data, ElementData::Group(_)));
        assert!(e.is_renderable());

        let e = element("defs", &[]);
        assert!(!e.is_renderable());
    }

    #[test]
    fn presentation_attributes_override_stylesheet() {
        let mut sheet = Stylesheet::new();
        sheet.add_rules_from_str("rect { fill: blue; stroke: blue }");

        let mut e = element("rect", &[("fill", "red")]);
        let values = e.cascade(&sheet, &State::default(), Dpi::default());

        assert_eq!(values.fill, red());
        assert_eq!(values.stroke, blue());
    }

    #[test]
    fn style_attribute_overrides_presentation_attributes() {
        let mut e = element("rect", &[("fill", "red"), ("style", "fill: blue")]);
        let values = e.cascade(&Stylesheet::new(), &State::default(), Dpi::default());
        assert_eq!(values.fill, blue());
    }

    #[test]
    fn important_stylesheet_rules_win() {
        let mut sheet = Stylesheet::new();
        sheet.add_rules_from_str(".a { fill: red !important }");

        let mut e = element("rect", &[("class", "a"), ("style", "fill: blue")]);
        let values = e.cascade(&sheet, &State::default(), Dpi::default());
        assert_eq!(values.fill, red());
    }

    #[test]
    fn invalid_attributes_keep_defaults() {
        let mut e = element("rect", &[("fill", "#zz"), ("transform", "scale(")]);
        let values = e.cascade(&Stylesheet::new(), &State::default(), Dpi::default());

        assert_eq!(values.fill, State::default().fill);
        assert_eq!(e.get_transform(), Transform::identity());
    }

    #[test]
    fn transform_is_personal() {
        let mut parent = State::default();
        parent.transform = Transform::new_translate(5.0, 5.0);

        let mut e = element("g", &[("transform", "scale(2)")]);
        let values = e.cascade(&Stylesheet::new(), &parent, Dpi::default());
        assert_eq!(values.transform, Transform::new_scale(2.0, 2.0));
    }

    #[test]
    fn conditional_attributes() {
        let langs = vec!["en".to_string()];

        assert!(element("g", &[("systemLanguage", "en-GB")]).get_cond(&langs));
        assert!(!element("g", &[("systemLanguage", "fr")]).get_cond(&langs));
        assert!(!element("g", &[("requiredExtensions", "http://example.com/x")]).get_cond(&langs));
        assert!(element("g", &[]).get_cond(&langs));
    }

    #[test]
    fn xml_space_is_a_property() {
        let mut e = element("text", &[("xml:space", "preserve")]);
        let values = e.cascade(&Stylesheet::new(), &State::default(), Dpi::default());
        assert_eq!(values.xml_space, crate::state::XmlSpace::Preserve);
    }
}
