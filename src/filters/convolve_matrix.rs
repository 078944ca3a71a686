use cssparser::Parser;
use markup5ever::{expanded_name, local_name, namespace_url, ns};
use nalgebra::DMatrix;

use crate::element::{set_attribute, ElementTrait};
use crate::error::*;
use crate::parse_identifiers;
use crate::parsers::{NumberList, NumberListLength, NumberOptionalNumber, Parse, ParseValue};
use crate::rect::IRect;
use crate::rsvg_log;
use crate::surface_utils::{iterators::PixelRectangle, EdgeMode, Pixel, PixelOps};
use crate::util::clamp;
use crate::xml::Attributes;

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterOutput};
use super::{FilterError, Input, InputRequirements, Primitive};

/// Largest number of kernel elements we accept (a 20×20 kernel).
const MAX_KERNEL_ELEMENTS: usize = 400;

/// The `feConvolveMatrix` filter primitive.
#[derive(Default)]
pub struct FeConvolveMatrix {
    base: Primitive,
    params: ConvolveMatrix,
}

/// Resolved `feConvolveMatrix` primitive for rendering.
#[derive(Clone)]
pub struct ConvolveMatrix {
    in1: Input,
    order: (i32, i32),
    kernel_matrix: Option<DMatrix<f64>>,
    divisor: f64,
    bias: f64,
    target_x: Option<i32>,
    target_y: Option<i32>,
    edge_mode: EdgeMode,
    preserve_alpha: bool,
}

impl Default for ConvolveMatrix {
    /// Constructs a new `ConvolveMatrix` with empty properties.
    #[inline]
    fn default() -> ConvolveMatrix {
        ConvolveMatrix {
            in1: Default::default(),
            order: (3, 3),
            kernel_matrix: None,
            divisor: 0.0,
            bias: 0.0,
            target_x: None,
            target_y: None,
            edge_mode: EdgeMode::Duplicate,
            preserve_alpha: false,
        }
    }
}

impl ElementTrait for FeConvolveMatrix {
    fn set_attributes(&mut self, attrs: &Attributes) {
        self.params.in1 = self.base.parse_one_input(attrs);

        for (attr, value) in attrs.iter() {
            match attr.expanded() {
                expanded_name!("", "order") => {
                    let mut order = NumberOptionalNumber(3, 3);
                    set_attribute(&mut order, attr.parse(value));
                    let NumberOptionalNumber(x, y) = order;
                    if x > 0 && y > 0 {
                        self.params.order = (x, y);
                    } else {
                        rsvg_log!("ignoring order=\"{}\": values must be positive", value);
                    }
                }
                expanded_name!("", "divisor") => {
                    set_attribute(&mut self.params.divisor, attr.parse(value))
                }
                expanded_name!("", "bias") => set_attribute(&mut self.params.bias, attr.parse(value)),
                expanded_name!("", "targetX") => {
                    set_attribute(&mut self.params.target_x, attr.parse(value))
                }
                expanded_name!("", "targetY") => {
                    set_attribute(&mut self.params.target_y, attr.parse(value))
                }
                expanded_name!("", "edgeMode") => {
                    set_attribute(&mut self.params.edge_mode, attr.parse(value))
                }
                expanded_name!("", "preserveAlpha") => {
                    set_attribute(&mut self.params.preserve_alpha, attr.parse(value))
                }

                _ => (),
            }
        }

        // The kernel's size depends on `order`, so parse it last.
        for (attr, value) in attrs
            .iter()
            .filter(|(attr, _)| attr.expanded() == expanded_name!("", "kernelMatrix"))
        {
            let (cols, rows) = self.params.order;
            let number_of_elements = cols as usize * rows as usize;

            // Parse as an unbounded list so that a huge `order` can't make us allocate a
            // huge vector up front.
            let v = match NumberList::parse_str(value, NumberListLength::Unbounded)
                .attribute(attr.clone())
            {
                Ok(NumberList(v)) => v,
                Err(e) => {
                    rsvg_log!("ignoring attribute with invalid value: {}", e);
                    continue;
                }
            };

            if v.len() > MAX_KERNEL_ELEMENTS || v.len() != number_of_elements {
                rsvg_log!(
                    "ignoring kernelMatrix with {} elements; expected {}",
                    v.len(),
                    number_of_elements
                );
                continue;
            }

            self.params.kernel_matrix = Some(DMatrix::from_row_slice(
                rows as usize,
                cols as usize,
                &v,
            ));
        }
    }
}

impl ConvolveMatrix {
    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        #![allow(clippy::many_single_char_names)]

        let input_1 = ctx.get_input(&self.in1)?;
        let bounds: IRect = bounds_builder.add_input(&input_1).compute_irect(ctx);

        let matrix = self.kernel_matrix.as_ref().ok_or_else(|| {
            FilterError::InvalidParameter("kernelMatrix must be specified".to_string())
        })?;

        let (order_x, order_y) = self.order;

        let target_x = match self.target_x {
            Some(x) if x < 0 || x >= order_x => {
                return Err(FilterError::InvalidParameter(
                    "targetX must be less than orderX".to_string(),
                ))
            }
            Some(x) => x,
            None => order_x / 2,
        };

        let target_y = match self.target_y {
            Some(y) if y < 0 || y >= order_y => {
                return Err(FilterError::InvalidParameter(
                    "targetY must be less than orderY".to_string(),
                ))
            }
            Some(y) => y,
            None => order_y / 2,
        };

        // With preserveAlpha the color channels are convolved without premultiplication.
        let input_surface = if self.preserve_alpha {
            input_1.surface().unpremultiply(bounds)?
        } else {
            input_1.surface().clone()
        };

        let divisor = if self.divisor != 0.0 {
            self.divisor
        } else {
            let d = matrix.iter().sum();

            if d != 0.0 {
                d
            } else {
                1.0
            }
        };

        let surface = input_surface.map_pixels(bounds, |x, y, pixel| {
            let kernel_bounds = IRect::new(
                x as i32 - target_x,
                y as i32 - target_y,
                x as i32 - target_x + order_x,
                y as i32 - target_y + order_y,
            );

            let mut r = 0.0;
            let mut g = 0.0;
            let mut b = 0.0;
            let mut a = 0.0;

            for (x, y, pixel) in
                PixelRectangle::within(&input_surface, bounds, kernel_bounds, self.edge_mode)
            {
                let kernel_x = (kernel_bounds.x1 - x - 1) as usize;
                let kernel_y = (kernel_bounds.y1 - y - 1) as usize;
                let factor = matrix[(kernel_y, kernel_x)];

                r += f64::from(pixel.r) / 255.0 * factor;
                g += f64::from(pixel.g) / 255.0 * factor;
                b += f64::from(pixel.b) / 255.0 * factor;

                if !self.preserve_alpha {
                    a += f64::from(pixel.a) / 255.0 * factor;
                }
            }

            if self.preserve_alpha {
                a = f64::from(pixel.a) / 255.0;
            } else {
                a = a / divisor + self.bias;
            }

            let clamped_a = clamp(a, 0.0, 1.0);

            let compute = |x: f64| {
                let x = x / divisor + self.bias * a;

                let x = if self.preserve_alpha {
                    clamp(x, 0.0, 1.0)
                } else {
                    clamp(x, 0.0, clamped_a)
                };

                ((x * 255.0) + 0.5) as u8
            };

            let output = Pixel {
                r: compute(r),
                g: compute(g),
                b: compute(b),
                a: ((clamped_a * 255.0) + 0.5) as u8,
            };

            if self.preserve_alpha {
                output.premultiply()
            } else {
                output
            }
        })?;

        Ok(FilterOutput { surface, bounds })
    }

    pub fn get_input_requirements(&self) -> InputRequirements {
        self.in1.get_requirements()
    }
}

resolve_from_attributes!(FeConvolveMatrix, ConvolveMatrix);

// Used for the preserveAlpha attribute
impl Parse for bool {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Self, ParseError<'i>> {
        Ok(parse_identifiers!(
            parser,
            "false" => false,
            "true" => true,
        )?)
    }
}
