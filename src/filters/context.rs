use std::collections::HashMap;

use crate::bbox::BoundingBox;
use crate::coord_units::CoordUnits;
use crate::drawing_ctx::Viewport;
use crate::filter::UserSpaceFilter;
use crate::parsers::CustomIdent;
use crate::rect::{IRect, Rect};
use crate::surface_utils::shared_surface::SharedImageSurface;
use crate::transform::Transform;

use super::error::FilterError;
use super::{FilterPlan, Input};

/// The image a primitive produced, and the subregion it covers.
#[derive(Debug, Clone)]
pub struct FilterOutput {
    pub surface: SharedImageSurface,
    pub bounds: IRect,
}

/// The surface a primitive reads for one of its `in` attributes.
///
/// Standard inputs cover the whole filter effects region; primitive outputs only their
/// subregion, which matters for the default subregion of the reading primitive.
#[derive(Debug, Clone)]
pub enum FilterInput {
    StandardInput(SharedImageSurface),
    PrimitiveOutput(FilterOutput),
}

/// State for running the primitives of one filter, in order.
pub struct FilterContext<'a> {
    plan: &'a FilterPlan,

    source_surface: SharedImageSurface,

    last_result: Option<FilterOutput>,
    named_results: HashMap<CustomIdent, FilterOutput>,

    primitive_units: CoordUnits,

    /// In device pixels, clipped to the source surface.
    effects_region: Rect,

    /// Maps primitive units to device pixels.
    ///
    /// With `primitiveUnits="objectBoundingBox"` the unit square is mapped onto the
    /// element's bounding box first, so that lengths like `dx="0.1"` scale with it.
    paffine: Transform,
}

fn units_transform(units: CoordUnits, bbox_rect: &Rect, transform: &Transform) -> Transform {
    match units {
        CoordUnits::UserSpaceOnUse => *transform,
        CoordUnits::ObjectBoundingBox => Transform::new_unchecked(
            bbox_rect.width(),
            0.0,
            0.0,
            bbox_rect.height(),
            bbox_rect.x0,
            bbox_rect.y0,
        )
        .post_transform(transform),
    }
}

impl<'a> FilterContext<'a> {
    /// Creates a new `FilterContext`.
    pub fn new(
        filter: &UserSpaceFilter,
        plan: &'a FilterPlan,
        source_surface: SharedImageSurface,
        node_bbox: BoundingBox,
    ) -> Result<Self, FilterError> {
        // The rect can be empty (for example, if the filter is applied to an empty group).
        // With userSpaceOnUse it's still possible to create images with a filter.
        let bbox_rect = node_bbox.rect.unwrap_or_default();
        let transform = plan.viewport.transform;

        let affine = units_transform(filter.filter_units, &bbox_rect, &transform);
        let paffine = units_transform(filter.primitive_units, &bbox_rect, &transform);

        if !(affine.is_invertible() && paffine.is_invertible()) {
            return Err(FilterError::InvalidParameter(
                "transform is not invertible".to_string(),
            ));
        }

        let effects_region = {
            let surface_rect = Rect::from_size(
                f64::from(source_surface.width()),
                f64::from(source_surface.height()),
            );

            affine
                .transform_rect(&filter.rect)
                .intersection(&surface_rect)
                .unwrap_or_default()
        };

        Ok(Self {
            plan,
            source_surface,
            last_result: None,
            named_results: HashMap::new(),
            primitive_units: filter.primitive_units,
            effects_region,
            paffine,
        })
    }

    /// Returns the surface corresponding to the source graphic.
    #[inline]
    pub fn source_graphic(&self) -> &SharedImageSurface {
        &self.source_surface
    }

    fn planned_input(image: Option<&SharedImageSurface>) -> Result<SharedImageSurface, FilterError> {
        image
            .cloned()
            .ok_or_else(|| FilterError::InvalidParameter("input was not computed".to_string()))
    }

    /// Converts this `FilterContext` into the surface corresponding to the output of the
    /// filter chain.
    #[inline]
    pub fn into_output(self) -> Result<SharedImageSurface, FilterError> {
        match self.last_result {
            Some(FilterOutput { surface, .. }) => Ok(surface),
            None => Ok(SharedImageSurface::empty(
                self.source_surface.width(),
                self.source_surface.height(),
            )?),
        }
    }

    /// Records a primitive's output; later primitives can read it by `name`.
    pub fn store_result(&mut self, name: Option<CustomIdent>, output: FilterOutput) {
        if let Some(name) = name {
            self.named_results.insert(name, output.clone());
        }

        self.last_result = Some(output);
    }

    /// Returns the paffine matrix.
    #[inline]
    pub fn paffine(&self) -> Transform {
        self.paffine
    }

    /// Returns the primitive units.
    #[inline]
    pub fn primitive_units(&self) -> CoordUnits {
        self.primitive_units
    }

    /// Returns the filter effects region.
    #[inline]
    pub fn effects_region(&self) -> Rect {
        self.effects_region
    }

    /// Get a filter primitive's default input as if its `in` were not specified.
    ///
    /// This is the result of the previous primitive, or `SourceGraphic` for the first
    /// one in the chain.  References to non-existent results are treated the same way.
    fn get_unspecified_input(&self) -> FilterInput {
        if let Some(output) = self.last_result.as_ref() {
            FilterInput::PrimitiveOutput(output.clone())
        } else {
            FilterInput::StandardInput(self.source_graphic().clone())
        }
    }

    /// Retrieves the filter input surface according to the SVG rules.
    pub fn get_input(&self, in_: &Input) -> Result<FilterInput, FilterError> {
        match *in_ {
            Input::Unspecified => Ok(self.get_unspecified_input()),

            Input::SourceGraphic => Ok(FilterInput::StandardInput(self.source_graphic().clone())),

            Input::SourceAlpha => Ok(self
                .source_graphic()
                .extract_alpha(self.effects_region().into())
                .map(FilterInput::StandardInput)?),

            Input::BackgroundImage => {
                Self::planned_input(self.plan.background_image.as_ref()).map(FilterInput::StandardInput)
            }

            Input::BackgroundAlpha => {
                let background = Self::planned_input(self.plan.background_image.as_ref())?;
                Ok(background
                    .extract_alpha(self.effects_region().into())
                    .map(FilterInput::StandardInput)?)
            }

            Input::FillPaint => {
                Self::planned_input(self.plan.fill_paint_image.as_ref()).map(FilterInput::StandardInput)
            }

            Input::StrokePaint => {
                Self::planned_input(self.plan.stroke_paint_image.as_ref()).map(FilterInput::StandardInput)
            }

            Input::FilterOutput(ref name) => Ok(self
                .named_results
                .get(name)
                .cloned()
                .map(FilterInput::PrimitiveOutput)
                .unwrap_or_else(|| self.get_unspecified_input())),
        }
    }

    /// The viewport of the filtered element.
    pub fn viewport(&self) -> &Viewport {
        &self.plan.viewport
    }
}

impl FilterInput {
    /// Retrieves the surface from `FilterInput`.
    #[inline]
    pub fn surface(&self) -> &SharedImageSurface {
        match *self {
            FilterInput::StandardInput(ref surface) => surface,
            FilterInput::PrimitiveOutput(FilterOutput { ref surface, .. }) => surface,
        }
    }
}
