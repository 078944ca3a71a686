use crate::element::ElementTrait;
use crate::rect::IRect;
use crate::xml::Attributes;

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterInput, FilterOutput};
use super::{FilterError, Input, InputRequirements, Primitive};

/// The `feTile` filter primitive.
#[derive(Default)]
pub struct FeTile {
    base: Primitive,
    params: Tile,
}

/// Resolved `feTile` primitive for rendering.
#[derive(Clone, Default)]
pub struct Tile {
    in1: Input,
}

impl ElementTrait for FeTile {
    fn set_attributes(&mut self, attrs: &Attributes) {
        self.params.in1 = self.base.parse_one_input(attrs);
    }
}

impl Tile {
    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        // feTile doesn't consider its inputs in the filter primitive subregion calculation.
        let bounds: IRect = bounds_builder.compute_irect(ctx);

        let input_1 = ctx.get_input(&self.in1)?;

        let surface = match input_1 {
            FilterInput::StandardInput(input_surface) => input_surface,
            FilterInput::PrimitiveOutput(FilterOutput {
                surface: input_surface,
                bounds: input_bounds,
            }) => {
                if input_bounds.is_empty() {
                    return Ok(FilterOutput {
                        surface: input_surface,
                        bounds,
                    });
                }

                input_surface.tile(input_bounds, bounds)?
            }
        };

        Ok(FilterOutput { surface, bounds })
    }

    pub fn get_input_requirements(&self) -> InputRequirements {
        self.in1.get_requirements()
    }
}

resolve_from_attributes!(FeTile, Tile);

#[cfg(test)]
mod tests {
    use crate::filters::tests::{apply_primitives, square};
    use crate::rect::IRect;
    use crate::surface_utils::Pixel;

    #[test]
    fn repeats_subregion_of_input() {
        let red = Pixel::new(255, 0, 0, 255);
        let source = square(IRect::new(0, 0, 1, 2), red);

        // The offset result has a 2×2 subregion whose left column is red.
        let output = apply_primitives(
            &[
                ("feOffset", &[("x", "0"), ("y", "0"), ("width", "2"), ("height", "2")]),
                ("feTile", &[]),
            ],
            &source,
        );

        assert_eq!(output.get_pixel(0, 0), red);
        assert_eq!(output.get_pixel(1, 0), Pixel::default());
        assert_eq!(output.get_pixel(2, 5), red);
        assert_eq!(output.get_pixel(9, 9), Pixel::default());
        assert_eq!(output.get_pixel(8, 9), red);
    }
}
