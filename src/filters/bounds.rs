//! Primitive subregions.
//!
//! A primitive's `x`, `y`, `width` and `height` default to the union of the subregions
//! of the primitive outputs it reads; reading a standard input like `SourceGraphic`
//! makes the default the whole filter effects region instead.

use crate::rect::{IRect, Rect};
use crate::transform::Transform;

use super::context::{FilterContext, FilterInput};

/// What the inputs read so far contribute to the default subregion.
#[derive(Debug, Clone, Copy, PartialEq)]
enum InputExtent {
    Nothing,

    /// Union of primitive outputs, in primitive units.
    Outputs(Rect),

    EffectsRegion,
}

/// Accumulates a primitive's inputs and computes its subregion.
pub struct BoundsBuilder {
    x: Option<f64>,
    y: Option<f64>,
    width: Option<f64>,
    height: Option<f64>,

    /// Primitive units to pixels.
    transform: Transform,

    inputs: InputExtent,
}

/// A filter primitive's subregion, in pixels.
pub struct Bounds {
    /// Clipped to the filter effects region.
    pub clipped: Rect,

    pub unclipped: Rect,
}

impl BoundsBuilder {
    /// `transform` must be invertible; the filter context checks this on creation.
    pub fn new(
        x: Option<f64>,
        y: Option<f64>,
        width: Option<f64>,
        height: Option<f64>,
        transform: Transform,
    ) -> Self {
        BoundsBuilder {
            x,
            y,
            width,
            height,
            transform,
            inputs: InputExtent::Nothing,
        }
    }

    pub fn add_input(mut self, input: &FilterInput) -> Self {
        self.inputs = match (self.inputs, input) {
            (InputExtent::EffectsRegion, _) | (_, FilterInput::StandardInput(_)) => {
                InputExtent::EffectsRegion
            }

            (extent, FilterInput::PrimitiveOutput(output)) => {
                let rect = self.to_primitive_units(&Rect::from(output.bounds));

                match extent {
                    InputExtent::Outputs(r) => InputExtent::Outputs(r.union(&rect)),
                    _ => InputExtent::Outputs(rect),
                }
            }
        };

        self
    }

    fn to_primitive_units(&self, rect: &Rect) -> Rect {
        self.transform
            .invert()
            .unwrap_or_default()
            .transform_rect(rect)
    }

    /// Computes the subregion; attributes that were specified override the
    /// corresponding edges of the default.
    pub fn compute(self, ctx: &FilterContext<'_>) -> Bounds {
        let effects_region = ctx.effects_region();

        let default = match self.inputs {
            InputExtent::Outputs(r) => r,
            _ => self.to_primitive_units(&effects_region),
        };

        let x0 = self.x.unwrap_or(default.x0);
        let y0 = self.y.unwrap_or(default.y0);
        let width = self.width.unwrap_or_else(|| default.width());
        let height = self.height.unwrap_or_else(|| default.height());

        let unclipped = self
            .transform
            .transform_rect(&Rect::new(x0, y0, x0 + width, y0 + height));

        Bounds {
            clipped: unclipped.intersection(&effects_region).unwrap_or_default(),
            unclipped,
        }
    }

    /// The clipped subregion, in whole pixels.
    pub fn compute_irect(self, ctx: &FilterContext<'_>) -> IRect {
        self.compute(ctx).clipped.into()
    }
}
