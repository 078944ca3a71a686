use std::f64;

use markup5ever::{expanded_name, local_name, namespace_url, ns};
use nalgebra::DMatrix;

use crate::element::{set_attribute, ElementTrait};
use crate::parsers::{NonNegative, NumberOptionalNumber, ParseValue};
use crate::rect::IRect;
use crate::rsvg_log;
use crate::surface_utils::{
    shared_surface::{BlurDirection, Horizontal, SharedImageSurface, Vertical},
    EdgeMode,
};
use crate::xml::Attributes;

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterOutput};
use super::{FilterError, Input, InputRequirements, Primitive};

/// The maximum gaussian blur kernel size.
///
/// The value of 500 is used in webkit.
const MAXIMUM_KERNEL_SIZE: usize = 500;

/// The `feGaussianBlur` filter primitive.
#[derive(Default)]
pub struct FeGaussianBlur {
    base: Primitive,
    params: GaussianBlur,
}

/// Resolved `feGaussianBlur` primitive for rendering.
#[derive(Default, Clone)]
pub struct GaussianBlur {
    pub in1: Input,
    pub std_deviation: (f64, f64),
}

impl ElementTrait for FeGaussianBlur {
    fn set_attributes(&mut self, attrs: &Attributes) {
        self.params.in1 = self.base.parse_one_input(attrs);

        for (attr, value) in attrs.iter() {
            if let expanded_name!("", "stdDeviation") = attr.expanded() {
                let mut std_deviation = NumberOptionalNumber(NonNegative(0.0), NonNegative(0.0));
                set_attribute(&mut std_deviation, attr.parse(value));

                let NumberOptionalNumber(NonNegative(x), NonNegative(y)) = std_deviation;
                self.params.std_deviation = (x, y);
            }
        }
    }
}

/// Samples per pixel when integrating the gaussian over a kernel cell.
const KERNEL_SAMPLES: usize = 32;

/// One-dimensional gaussian kernel, normalized to sum to 1.
///
/// Each weight is the average of the gaussian over its pixel, so that narrow
/// deviations don't collapse into a single spike.  The kernel covers three standard
/// deviations on each side and always has an odd length.
fn gaussian_kernel(std_deviation: f64) -> Vec<f64> {
    debug_assert!(std_deviation > 0.0);

    let radius = ((std_deviation * 3.0).ceil() as usize).clamp(1, (MAXIMUM_KERNEL_SIZE - 1) / 2);
    let two_variance = 2.0 * std_deviation * std_deviation;

    let cell_weight = |offset: usize| {
        (0..KERNEL_SAMPLES)
            .map(|s| {
                let x = offset as f64 - 0.5 + (s as f64 + 0.5) / KERNEL_SAMPLES as f64;
                (-x * x / two_variance).exp()
            })
            .sum::<f64>()
    };

    // Compute one half and mirror it, so the kernel is exactly symmetric.
    let half: Vec<f64> = (0..=radius).map(cell_weight).collect();

    let mut kernel: Vec<f64> = half.iter().rev().chain(half.iter().skip(1)).copied().collect();

    let total: f64 = kernel.iter().sum();
    for w in kernel.iter_mut() {
        *w /= total;
    }

    kernel
}

/// Size of the box blur that, applied three times, approximates a gaussian.
///
/// See the `feGaussianBlur` section of the Filter Effects specification.
fn box_blur_kernel_size(std_deviation: f64) -> usize {
    let d = (std_deviation * 3.0 * (2.0 * f64::consts::PI).sqrt() / 4.0 + 0.5).floor();
    d.min(MAXIMUM_KERNEL_SIZE as f64) as usize
}

/// Blurs along one direction with three successive box blurs.
///
/// An odd box size uses three centered boxes.  An even size `d` uses two boxes of
/// size `d`, centered first on the right and then on the left of the output pixel,
/// followed by a centered box of size `d + 1`.
fn three_box_blurs<B: BlurDirection>(
    surface: &SharedImageSurface,
    bounds: IRect,
    std_deviation: f64,
) -> Result<SharedImageSurface, FilterError> {
    let d = box_blur_kernel_size(std_deviation);
    if d == 0 {
        return Ok(surface.clone());
    }

    let passes = if d % 2 == 1 {
        [(d, d / 2), (d, d / 2), (d, d / 2)]
    } else {
        [(d, d / 2), (d, d / 2 - 1), (d + 1, d / 2)]
    };

    let mut blurred = surface.clone();
    for &(box_size, target) in passes.iter() {
        blurred = blurred.box_blur::<B>(bounds, box_size, target)?;
    }

    Ok(blurred)
}

/// Blurs along one direction by convolving with a sampled gaussian.
fn convolve_gaussian(
    surface: &SharedImageSurface,
    bounds: IRect,
    std_deviation: f64,
    vertical: bool,
) -> Result<SharedImageSurface, FilterError> {
    let kernel = gaussian_kernel(std_deviation);
    let len = kernel.len();
    let center = (len / 2) as i32;

    let (kernel, target) = if vertical {
        (DMatrix::from_vec(len, 1, kernel), (0, center))
    } else {
        (DMatrix::from_vec(1, len, kernel), (center, 0))
    };

    Ok(surface.convolve(bounds, target, &kernel, EdgeMode::None)?)
}

/// Blurs along one direction, picking the method by deviation.
///
/// From a deviation of 2 on, three box blurs are indistinguishable from a true gaussian
/// and much faster.
fn blur_direction<B: BlurDirection>(
    surface: &SharedImageSurface,
    bounds: IRect,
    std_deviation: f64,
) -> Result<SharedImageSurface, FilterError> {
    if std_deviation >= 2.0 {
        three_box_blurs::<B>(surface, bounds, std_deviation)
    } else if std_deviation > 0.0 {
        convolve_gaussian(surface, bounds, std_deviation, B::IS_VERTICAL)
    } else {
        Ok(surface.clone())
    }
}

impl GaussianBlur {
    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        let input_1 = ctx.get_input(&self.in1)?;
        let bounds: IRect = bounds_builder.add_input(&input_1).compute_irect(ctx);

        rsvg_log!("(feGaussianBlur bounds={:?} std_deviation={:?}", bounds, self.std_deviation);

        // The transform may flip an axis, which makes the deviation negative.
        let (std_x, std_y) = self.std_deviation;
        let (std_x, std_y) = ctx.paffine().transform_distance(std_x, std_y);

        let horizontal = blur_direction::<Horizontal>(input_1.surface(), bounds, std_x.abs())?;
        let output_surface = blur_direction::<Vertical>(&horizontal, bounds, std_y.abs())?;

        Ok(FilterOutput {
            surface: output_surface,
            bounds,
        })
    }

    pub fn get_input_requirements(&self) -> InputRequirements {
        self.in1.get_requirements()
    }
}

resolve_from_attributes!(FeGaussianBlur, GaussianBlur);
