use std::cmp::min;

use cssparser::Parser;
use markup5ever::{expanded_name, local_name, namespace_url, ns};

use crate::document::AcquiredNodes;
use crate::element::{set_attribute, ElementData, ElementTrait};
use crate::error::*;
use crate::node::{Node, NodeBorrow};
use crate::parse_identifiers;
use crate::parsers::{NumberList, NumberListLength, Parse, ParseValue};
use crate::rect::IRect;
use crate::rsvg_log;
use crate::surface_utils::{Pixel, PixelOps};
use crate::util::clamp;
use crate::xml::Attributes;

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterOutput};
use super::{
    FilterEffect, FilterError, FilterResolveError, Input, InputRequirements, Primitive,
    PrimitiveParams, ResolvedPrimitive,
};

/// Upper limit for `tableValues`, so that malicious documents can't make us allocate a lot.
const MAX_TABLE_VALUES: usize = 256;

/// The `feComponentTransfer` filter primitive.
#[derive(Default)]
pub struct FeComponentTransfer {
    base: Primitive,
    params: ComponentTransfer,
}

/// Resolved `feComponentTransfer` primitive for rendering.
#[derive(Clone, Default)]
pub struct ComponentTransfer {
    pub in1: Input,
    pub functions: Functions,
}

impl ElementTrait for FeComponentTransfer {
    fn set_attributes(&mut self, attrs: &Attributes) {
        self.params.in1 = self.base.parse_one_input(attrs);
    }
}

/// Component transfer function types.
#[derive(Clone, Debug, PartialEq)]
pub enum FunctionType {
    Identity,
    Table,
    Discrete,
    Linear,
    Gamma,
}

impl Parse for FunctionType {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Self, ParseError<'i>> {
        Ok(parse_identifiers!(
            parser,
            "identity" => FunctionType::Identity,
            "table" => FunctionType::Table,
            "discrete" => FunctionType::Discrete,
            "linear" => FunctionType::Linear,
            "gamma" => FunctionType::Gamma,
        )?)
    }
}

/// A transfer function for one channel, as given by a `feFuncX` element.
#[derive(Clone, Debug, PartialEq)]
pub struct TransferFunction {
    pub function_type: FunctionType,
    pub table_values: Vec<f64>,
    pub slope: f64,
    pub intercept: f64,
    pub amplitude: f64,
    pub exponent: f64,
    pub offset: f64,
}

impl Default for TransferFunction {
    #[inline]
    fn default() -> Self {
        Self {
            function_type: FunctionType::Identity,
            table_values: Vec::new(),
            slope: 1.0,
            intercept: 0.0,
            amplitude: 1.0,
            exponent: 1.0,
            offset: 0.0,
        }
    }
}

impl TransferFunction {
    /// Computes the function for a channel value in `[0, 1]`.
    fn compute(&self, value: f64) -> f64 {
        match self.function_type {
            FunctionType::Identity => value,

            FunctionType::Table => {
                let n = self.table_values.len() - 1;
                let k = min((value * (n as f64)).floor() as usize, n);

                if k == n {
                    return self.table_values[k];
                }

                let vk = self.table_values[k];
                let vk1 = self.table_values[k + 1];
                let k = k as f64;
                let n = n as f64;

                vk + (value - k / n) * n * (vk1 - vk)
            }

            FunctionType::Discrete => {
                let n = self.table_values.len();
                let k = (value * (n as f64)).floor() as usize;

                self.table_values[min(k, n - 1)]
            }

            FunctionType::Linear => self.slope * value + self.intercept,

            FunctionType::Gamma => self.amplitude * value.powf(self.exponent) + self.offset,
        }
    }

    /// Computes the function on a byte value.
    fn compute_u8(&self, value: u8) -> u8 {
        let v = self.compute(f64::from(value) / 255.0);
        (clamp(v, 0.0, 1.0) * 255.0 + 0.5) as u8
    }
}

impl ElementTrait for TransferFunction {
    fn set_attributes(&mut self, attrs: &Attributes) {
        for (attr, value) in attrs.iter() {
            match attr.expanded() {
                expanded_name!("", "type") => {
                    set_attribute(&mut self.function_type, attr.parse(value))
                }
                expanded_name!("", "tableValues") => {
                    match NumberList::parse_str(value, NumberListLength::Unbounded)
                        .attribute(attr.clone())
                    {
                        Ok(NumberList(v)) if v.len() > MAX_TABLE_VALUES => {
                            rsvg_log!("ignoring tableValues with {} entries", v.len());
                        }
                        Ok(NumberList(v)) => self.table_values = v,
                        Err(e) => rsvg_log!("ignoring attribute with invalid value: {}", e),
                    }
                }
                expanded_name!("", "slope") => set_attribute(&mut self.slope, attr.parse(value)),
                expanded_name!("", "intercept") => {
                    set_attribute(&mut self.intercept, attr.parse(value))
                }
                expanded_name!("", "amplitude") => {
                    set_attribute(&mut self.amplitude, attr.parse(value))
                }
                expanded_name!("", "exponent") => {
                    set_attribute(&mut self.exponent, attr.parse(value))
                }
                expanded_name!("", "offset") => set_attribute(&mut self.offset, attr.parse(value)),

                _ => (),
            }
        }

        // A table function with no values is an identity function.
        match self.function_type {
            FunctionType::Table | FunctionType::Discrete if self.table_values.is_empty() => {
                self.function_type = FunctionType::Identity;
            }
            _ => (),
        }
    }
}

macro_rules! func_x {
    ($(#[$attr:meta])* $func_name:ident) => {
        $(#[$attr])*
        #[derive(Clone, Debug, Default, PartialEq)]
        pub struct $func_name(pub TransferFunction);

        impl ElementTrait for $func_name {
            #[inline]
            fn set_attributes(&mut self, attrs: &Attributes) {
                self.0.set_attributes(attrs);
            }
        }
    };
}

func_x!(
    /// The `<feFuncR>` element.
    FeFuncR
);

func_x!(
    /// The `<feFuncG>` element.
    FeFuncG
);

func_x!(
    /// The `<feFuncB>` element.
    FeFuncB
);

func_x!(
    /// The `<feFuncA>` element.
    FeFuncA
);

/// The transfer functions for each channel.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Functions {
    pub r: TransferFunction,
    pub g: TransferFunction,
    pub b: TransferFunction,
    pub a: TransferFunction,
}

impl ComponentTransfer {
    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        let input_1 = ctx.get_input(&self.in1)?;
        let bounds: IRect = bounds_builder.add_input(&input_1).compute_irect(ctx);

        let functions = &self.functions;

        let surface = input_1.surface().map_pixels(bounds, |_, _, pixel| {
            let pixel = pixel.unpremultiply();

            Pixel {
                r: functions.r.compute_u8(pixel.r),
                g: functions.g.compute_u8(pixel.g),
                b: functions.b.compute_u8(pixel.b),
                a: functions.a.compute_u8(pixel.a),
            }
            .premultiply()
        })?;

        Ok(FilterOutput { surface, bounds })
    }

    pub fn get_input_requirements(&self) -> InputRequirements {
        self.in1.get_requirements()
    }
}

impl FilterEffect for FeComponentTransfer {
    fn resolve(
        &self,
        _acquired_nodes: &mut AcquiredNodes<'_>,
        node: &Node,
    ) -> Result<Vec<ResolvedPrimitive>, FilterResolveError> {
        let mut params = self.params.clone();
        params.functions = get_functions(node);

        Ok(vec![ResolvedPrimitive {
            primitive: self.base.clone(),
            params: PrimitiveParams::ComponentTransfer(params),
        }])
    }
}

/// Finds the last `feFuncX` child of the given type, if any.
macro_rules! func_or_default {
    ($node:expr, $func_type:ident) => {
        $node
            .children()
            .rev()
            .filter(|c| c.is_element())
            .find_map(|c| match *c.borrow_element_data() {
                ElementData::$func_type(ref f) => Some(f.0.clone()),
                _ => None,
            })
            .unwrap_or_default()
    };
}

/// Takes a feComponentTransfer and walks its children to produce the feFuncX arguments.
fn get_functions(node: &Node) -> Functions {
    Functions {
        r: func_or_default!(node, FeFuncR),
        g: func_or_default!(node, FeFuncG),
        b: func_or_default!(node, FeFuncB),
        a: func_or_default!(node, FeFuncA),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::tests::{apply, filter_document_with_children, square, PrimitiveDecl};

    #[test]
    fn extracts_functions() {
        let prims: Vec<PrimitiveDecl<'_>> = vec![(
            "feComponentTransfer",
            &[("id", "ct")],
            vec![
                ("feFuncG", &[("type", "table"), ("tableValues", "0.0 1.0 2.0")]),
                ("feFuncB", &[("type", "table")]),
                // last one wins
                (
                    "feFuncB",
                    &[
                        ("type", "discrete"),
                        ("tableValues", "0.0, 1.0"),
                        ("slope", "1.0"),
                        ("intercept", "2.0"),
                        ("amplitude", "3.0"),
                        ("exponent", "4.0"),
                        ("offset", "5.0"),
                    ],
                ),
            ],
        )];

        let document = filter_document_with_children(&prims);
        let ct = document.lookup_node("ct").unwrap();
        let functions = get_functions(&ct);

        assert_eq!(
            functions,
            Functions {
                r: TransferFunction::default(),

                g: TransferFunction {
                    function_type: FunctionType::Table,
                    table_values: vec![0.0, 1.0, 2.0],
                    ..TransferFunction::default()
                },

                b: TransferFunction {
                    function_type: FunctionType::Discrete,
                    table_values: vec![0.0, 1.0],
                    slope: 1.0,
                    intercept: 2.0,
                    amplitude: 3.0,
                    exponent: 4.0,
                    offset: 5.0,
                },

                a: TransferFunction::default(),
            }
        );
    }

    #[test]
    fn empty_table_is_identity() {
        let mut f = TransferFunction::default();
        f.set_attributes(&crate::filters::tests::attrs(&[("type", "table")]));
        assert_eq!(f.function_type, FunctionType::Identity);
    }

    #[test]
    fn computes_functions() {
        let table = TransferFunction {
            function_type: FunctionType::Table,
            table_values: vec![0.0, 1.0, 0.0],
            ..Default::default()
        };
        assert!((table.compute(0.25) - 0.5).abs() < 1e-9);
        assert!((table.compute(1.0) - 0.0).abs() < 1e-9);

        let discrete = TransferFunction {
            function_type: FunctionType::Discrete,
            table_values: vec![0.2, 0.8],
            ..Default::default()
        };
        assert!((discrete.compute(0.4) - 0.2).abs() < 1e-9);
        assert!((discrete.compute(1.0) - 0.8).abs() < 1e-9);

        let gamma = TransferFunction {
            function_type: FunctionType::Gamma,
            amplitude: 2.0,
            exponent: 2.0,
            offset: 0.1,
            ..Default::default()
        };
        assert!((gamma.compute(0.5) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn inverts_red_channel() {
        let source = square(IRect::from_size(10, 10), Pixel::new(255, 0, 0, 255));

        let prims: Vec<PrimitiveDecl<'_>> = vec![(
            "feComponentTransfer",
            &[],
            vec![("feFuncR", &[("type", "linear"), ("slope", "-1"), ("intercept", "1")])],
        )];

        let output = apply(&filter_document_with_children(&prims), &source);

        assert_eq!(output.get_pixel(5, 5), Pixel::new(0, 0, 0, 255));
    }
}
