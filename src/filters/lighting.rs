//! Lighting filters and light nodes.

use std::cmp::max;

use float_cmp::approx_eq;
use markup5ever::{expanded_name, local_name, namespace_url, ns};
use nalgebra::{Vector2, Vector3};
use num_traits::identities::Zero;

use crate::color::RGBA;
use crate::document::AcquiredNodes;
use crate::element::{set_attribute, ElementData, ElementTrait};
use crate::error::ElementError;
use crate::filters::{
    bounds::BoundsBuilder,
    context::{FilterContext, FilterOutput},
    FilterEffect, FilterError, FilterResolveError, Input, InputRequirements, Primitive,
    PrimitiveParams, ResolvedPrimitive,
};
use crate::node::{CascadedValues, Node, NodeBorrow};
use crate::parsers::{NonNegative, ParseValue};
use crate::rect::IRect;
use crate::surface_utils::{
    shared_surface::{ExclusiveImageSurface, SharedImageSurface},
    Pixel,
};
use crate::transform::Transform;
use crate::util::clamp;
use crate::xml::Attributes;

/// How the surface reflects light; the rest of the lighting model is shared.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Reflection {
    /// `feDiffuseLighting`: Lambertian reflection scaled by `diffuseConstant`.
    Diffuse { constant: f64 },

    /// `feSpecularLighting`: Phong reflection with `specularConstant` and
    /// `specularExponent`.
    Specular { constant: f64, exponent: f64 },
}

#[derive(Clone)]
struct LightingParams {
    in1: Input,
    surface_scale: f64,
    reflection: Reflection,
}

impl LightingParams {
    fn new(reflection: Reflection) -> LightingParams {
        LightingParams {
            in1: Input::default(),
            surface_scale: 1.0,
            reflection,
        }
    }

    fn set_attributes(&mut self, base: &mut Primitive, attrs: &Attributes) {
        self.in1 = base.parse_one_input(attrs);

        for (attr, value) in attrs.iter() {
            match (attr.expanded(), &mut self.reflection) {
                (expanded_name!("", "surfaceScale"), _) => {
                    set_attribute(&mut self.surface_scale, attr.parse(value))
                }

                (expanded_name!("", "diffuseConstant"), Reflection::Diffuse { constant })
                | (expanded_name!("", "specularConstant"), Reflection::Specular { constant, .. }) => {
                    set_non_negative(constant, attr.parse(value))
                }

                (expanded_name!("", "specularExponent"), Reflection::Specular { exponent, .. }) => {
                    set_attribute(exponent, attr.parse(value))
                }

                _ => (),
            }
        }
    }
}

/// The `feDiffuseLighting` element.
pub struct FeDiffuseLighting {
    base: Primitive,
    params: LightingParams,
}

impl Default for FeDiffuseLighting {
    fn default() -> Self {
        FeDiffuseLighting {
            base: Primitive::default(),
            params: LightingParams::new(Reflection::Diffuse { constant: 1.0 }),
        }
    }
}

/// The `feSpecularLighting` element.
pub struct FeSpecularLighting {
    base: Primitive,
    params: LightingParams,
}

impl Default for FeSpecularLighting {
    fn default() -> Self {
        FeSpecularLighting {
            base: Primitive::default(),
            params: LightingParams::new(Reflection::Specular {
                constant: 1.0,
                exponent: 1.0,
            }),
        }
    }
}

/// A lighting primitive with its light source resolved, ready to render.
pub struct Lighting {
    params: LightingParams,
    light: Light,
}

/// The light source child of a lighting primitive, in user space.
#[derive(Debug, PartialEq)]
enum UntransformedLightSource {
    Distant(FeDistantLight),
    Point(FePointLight),
    Spot(FeSpotLight),
}

/// A light source in the pixel space of the filter surface.
enum LightSource {
    /// Unit vector towards a light at infinity.
    Distant(Vector3<f64>),

    Point(Vector3<f64>),

    Spot {
        origin: Vector3<f64>,
        /// Unit vector from the light towards `pointsAt`.
        direction: Vector3<f64>,
        exponent: f64,
        /// Cosine of `limitingConeAngle`.
        cos_cone: Option<f64>,
    },
}

/// Maps a point given in primitive units to the filter surface.
fn to_pixel_space(paffine: Transform, x: f64, y: f64, z: f64) -> Vector3<f64> {
    let (x, y) = paffine.transform_point(x, y);

    // z has no axis of its own, so it is scaled like a length that is neither
    // horizontal nor vertical
    let z = z * paffine.xx.hypot(paffine.yy) / std::f64::consts::SQRT_2;

    Vector3::new(x, y, z)
}

impl UntransformedLightSource {
    fn transform(&self, paffine: Transform) -> LightSource {
        match *self {
            UntransformedLightSource::Distant(FeDistantLight { azimuth, elevation }) => {
                let (azimuth, elevation) = (azimuth.to_radians(), elevation.to_radians());

                LightSource::Distant(Vector3::new(
                    azimuth.cos() * elevation.cos(),
                    azimuth.sin() * elevation.cos(),
                    elevation.sin(),
                ))
            }

            UntransformedLightSource::Point(FePointLight { x, y, z }) => {
                LightSource::Point(to_pixel_space(paffine, x, y, z))
            }

            UntransformedLightSource::Spot(ref spot) => {
                let origin = to_pixel_space(paffine, spot.x, spot.y, spot.z);
                let target = to_pixel_space(
                    paffine,
                    spot.points_at_x,
                    spot.points_at_y,
                    spot.points_at_z,
                );

                LightSource::Spot {
                    origin,
                    direction: (target - origin).try_normalize(0.0).unwrap_or_else(Vector3::zeros),
                    exponent: spot.specular_exponent,
                    cos_cone: spot.limiting_cone_angle.map(|a| a.to_radians().cos()),
                }
            }
        }
    }
}

impl LightSource {
    /// Unit vector from a surface point towards the light, or zero if the point is
    /// at the light.
    fn vector_to_light(&self, surface_point: Vector3<f64>) -> Vector3<f64> {
        match *self {
            LightSource::Distant(v) => v,

            LightSource::Point(origin) | LightSource::Spot { origin, .. } => (origin
                - surface_point)
                .try_normalize(0.0)
                .unwrap_or_else(Vector3::zeros),
        }
    }

    /// Light color arriving along `to_light`; only spot lights attenuate it.
    fn color(&self, lighting_color: RGBA, to_light: Vector3<f64>) -> RGBA {
        let (direction, exponent, cos_cone) = match *self {
            LightSource::Spot {
                direction,
                exponent,
                cos_cone,
                ..
            } => (direction, exponent, cos_cone),
            _ => return lighting_color,
        };

        let cos_angle = -to_light.dot(&direction);

        if cos_angle <= 0.0 || cos_cone.map_or(false, |cos_cone| cos_angle < cos_cone) {
            return RGBA::new(0, 0, 0, 0);
        }

        let attenuation = cos_angle.powf(exponent);
        let scale = |c: u8| (clamp(f64::from(c) * attenuation, 0.0, 255.0) + 0.5) as u8;

        RGBA::new(
            scale(lighting_color.red),
            scale(lighting_color.green),
            scale(lighting_color.blue),
            255,
        )
    }
}

struct Light {
    source: UntransformedLightSource,
    lighting_color: RGBA,
}

/// The `<feDistantLight>` element.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeDistantLight {
    azimuth: f64,
    elevation: f64,
}

/// The `<fePointLight>` element.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FePointLight {
    x: f64,
    y: f64,
    z: f64,
}

/// The `<feSpotLight>` element.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeSpotLight {
    x: f64,
    y: f64,
    z: f64,
    points_at_x: f64,
    points_at_y: f64,
    points_at_z: f64,
    specular_exponent: f64,
    limiting_cone_angle: Option<f64>,
}

impl ElementTrait for FeDistantLight {
    fn set_attributes(&mut self, attrs: &Attributes) {
        for (attr, value) in attrs.iter() {
            let dest = match attr.expanded() {
                expanded_name!("", "azimuth") => &mut self.azimuth,
                expanded_name!("", "elevation") => &mut self.elevation,
                _ => continue,
            };

            set_attribute(dest, attr.parse(value));
        }
    }
}

impl ElementTrait for FePointLight {
    fn set_attributes(&mut self, attrs: &Attributes) {
        for (attr, value) in attrs.iter() {
            let dest = match attr.expanded() {
                expanded_name!("", "x") => &mut self.x,
                expanded_name!("", "y") => &mut self.y,
                expanded_name!("", "z") => &mut self.z,
                _ => continue,
            };

            set_attribute(dest, attr.parse(value));
        }
    }
}

impl ElementTrait for FeSpotLight {
    fn set_attributes(&mut self, attrs: &Attributes) {
        for (attr, value) in attrs.iter() {
            let dest = match attr.expanded() {
                expanded_name!("", "x") => &mut self.x,
                expanded_name!("", "y") => &mut self.y,
                expanded_name!("", "z") => &mut self.z,
                expanded_name!("", "pointsAtX") => &mut self.points_at_x,
                expanded_name!("", "pointsAtY") => &mut self.points_at_y,
                expanded_name!("", "pointsAtZ") => &mut self.points_at_z,
                expanded_name!("", "specularExponent") => &mut self.specular_exponent,

                expanded_name!("", "limitingConeAngle") => {
                    set_attribute(&mut self.limiting_cone_angle, attr.parse(value));
                    continue;
                }

                _ => continue,
            };

            set_attribute(dest, attr.parse(value));
        }
    }
}

impl ElementTrait for FeDiffuseLighting {
    fn set_attributes(&mut self, attrs: &Attributes) {
        self.params.set_attributes(&mut self.base, attrs);
    }
}

impl ElementTrait for FeSpecularLighting {
    fn set_attributes(&mut self, attrs: &Attributes) {
        self.params.set_attributes(&mut self.base, attrs);
    }
}

fn set_non_negative(dest: &mut f64, parse_result: Result<NonNegative, ElementError>) {
    let mut v = NonNegative(*dest);
    set_attribute(&mut v, parse_result);
    *dest = v.0;
}

/// Surface normal scaled by `surface_scale`, or `None` for a flat surface, whose
/// normal is (0, 0, 1).
#[inline]
fn surface_normal(normal: Normal, surface_scale: f64) -> Option<Vector3<f64>> {
    if normal.normal.is_zero() {
        return None;
    }

    let mut n = normal.normal.map(|x| f64::from(x) * surface_scale / 255.);
    n.component_mul_assign(&normal.factor);

    Some(Vector3::new(n.x, n.y, 1.0))
}

impl Reflection {
    /// Factor applied to the light color at a pixel, from the surface normal and the
    /// unit vector towards the light.
    #[inline]
    fn factor(&self, normal: Option<Vector3<f64>>, light_vector: Vector3<f64>) -> f64 {
        match *self {
            Reflection::Diffuse { constant } => {
                let n_dot_l = match normal {
                    Some(n) => n.dot(&light_vector) / n.norm(),
                    None => light_vector.z,
                };

                constant * n_dot_l
            }

            Reflection::Specular { constant, exponent } => {
                // halfway vector between the light and the eye at (0, 0, 1)
                let h = light_vector + Vector3::z();
                let h_norm = h.norm();

                if h_norm == 0.0 {
                    return 0.0;
                }

                let n_dot_h = match normal {
                    Some(n) => n.dot(&h) / n.norm() / h_norm,
                    None => h.z / h_norm,
                };

                if approx_eq!(f64, exponent, 1.0) {
                    constant * n_dot_h
                } else {
                    constant * n_dot_h.powf(exponent)
                }
            }
        }
    }

    /// Diffuse output is opaque; specular output takes the brightest channel as alpha.
    fn alpha(&self, r: u8, g: u8, b: u8) -> u8 {
        match *self {
            Reflection::Diffuse { .. } => 255,
            Reflection::Specular { .. } => max(max(r, g), b),
        }
    }
}

impl Lighting {
    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        let input_1 = ctx.get_input(&self.params.in1)?;
        let bounds: IRect = bounds_builder.add_input(&input_1).compute_irect(ctx);

        // Normals need a 2×2 neighbourhood.
        if bounds.width() < 2 || bounds.height() < 2 {
            return Err(FilterError::LightingInputTooSmall);
        }

        let input_surface = input_1.surface();
        let source = self.light.source.transform(ctx.paffine());
        let LightingParams {
            surface_scale,
            reflection,
            ..
        } = self.params;

        let mut surface = ExclusiveImageSurface::new(input_surface.width(), input_surface.height())?;

        for y in bounds.y_range() {
            for x in bounds.x_range() {
                let (x, y) = (x as u32, y as u32);

                let normal = Normal::at(input_surface, bounds, x, y);
                let z = f64::from(input_surface.get_pixel(x, y).a) / 255.0 * surface_scale;

                let vector = source.vector_to_light(Vector3::new(f64::from(x), f64::from(y), z));
                let color = source.color(self.light.lighting_color, vector);

                let factor = reflection.factor(surface_normal(normal, surface_scale), vector);
                let channel = |c: u8| (clamp(factor * f64::from(c), 0.0, 255.0) + 0.5) as u8;

                let (r, g, b) = (channel(color.red), channel(color.green), channel(color.blue));

                surface.set_pixel(x, y, Pixel { r, g, b, a: reflection.alpha(r, g, b) });
            }
        }

        Ok(FilterOutput {
            surface: surface.share(),
            bounds,
        })
    }

    pub fn get_input_requirements(&self) -> InputRequirements {
        self.params.in1.get_requirements()
    }
}

/// Finds the single light source child of a lighting primitive, and the light color.
fn resolve_light(node: &Node) -> Result<Light, FilterResolveError> {
    let mut sources = node.children().filter_map(|c| {
        if !c.is_element() {
            return None;
        }

        use UntransformedLightSource::*;

        match *c.borrow_element_data() {
            ElementData::FeDistantLight(ref l) => Some(Distant((**l).clone())),
            ElementData::FePointLight(ref l) => Some(Point((**l).clone())),
            ElementData::FeSpotLight(ref l) => Some(Spot((**l).clone())),
            _ => None,
        }
    });

    let source = match (sources.next(), sources.next()) {
        (Some(source), None) => source,
        _ => return Err(FilterResolveError::InvalidLightSourceCount),
    };

    let cascaded = CascadedValues::new_from_node(node);
    let values = cascaded.get();

    Ok(Light {
        source,
        lighting_color: values.resolve(&values.lighting_color),
    })
}

impl FilterEffect for FeDiffuseLighting {
    fn resolve(
        &self,
        _acquired_nodes: &mut AcquiredNodes<'_>,
        node: &Node,
    ) -> Result<Vec<ResolvedPrimitive>, FilterResolveError> {
        Ok(vec![ResolvedPrimitive {
            primitive: self.base.clone(),
            params: PrimitiveParams::DiffuseLighting(Lighting {
                params: self.params.clone(),
                light: resolve_light(node)?,
            }),
        }])
    }
}

impl FilterEffect for FeSpecularLighting {
    fn resolve(
        &self,
        _acquired_nodes: &mut AcquiredNodes<'_>,
        node: &Node,
    ) -> Result<Vec<ResolvedPrimitive>, FilterResolveError> {
        Ok(vec![ResolvedPrimitive {
            primitive: self.base.clone(),
            params: PrimitiveParams::SpecularLighting(Lighting {
                params: self.params.clone(),
                light: resolve_light(node)?,
            }),
        }])
    }
}

/// 2D normal and factor stored separately.
///
/// The normal needs to be multiplied by `surface_scale * factor / 255` and
/// normalized with 1 as the z component.
#[derive(Debug, Clone, Copy)]
pub struct Normal {
    pub factor: Vector2<f64>,
    pub normal: Vector2<i16>,
}

impl Normal {
    #[inline]
    fn new(factor_x: f64, nx: i16, factor_y: f64, ny: i16) -> Normal {
        // Negative nx and ny to account for the different coordinate system.
        Normal {
            factor: Vector2::new(factor_x, factor_y),
            normal: Vector2::new(-nx, -ny),
        }
    }

    /// Sobel normal of the alpha channel at `(x, y)`.
    ///
    /// Neighbours outside of `bounds` are dropped, which turns the central differences
    /// into one-sided ones along the edges.  Rows (or columns) get a weight of 2 for the
    /// one through the pixel and 1 for its neighbours, and the factor normalizes by the
    /// total weight and the width of the difference.  `bounds` must be at least 2×2.
    pub fn at(surface: &SharedImageSurface, bounds: IRect, x: u32, y: u32) -> Normal {
        debug_assert!(bounds.width() >= 2 && bounds.height() >= 2);
        debug_assert!(bounds.contains(x as i32, y as i32));

        let alpha = |x: u32, y: u32| i16::from(surface.get_pixel(x, y).a);

        let left = if x as i32 > bounds.x0 { x - 1 } else { x };
        let right = if (x as i32) + 1 < bounds.x1 { x + 1 } else { x };
        let top = if y as i32 > bounds.y0 { y - 1 } else { y };
        let bottom = if (y as i32) + 1 < bounds.y1 { y + 1 } else { y };

        let weight = |i: u32, center: u32| if i == center { 2 } else { 1 };

        let (mut nx, mut weight_x) = (0, 0);
        for row in top..=bottom {
            let w = weight(row, y);
            nx += w * (alpha(right, row) - alpha(left, row));
            weight_x += w;
        }

        let (mut ny, mut weight_y) = (0, 0);
        for column in left..=right {
            let w = weight(column, x);
            ny += w * (alpha(column, bottom) - alpha(column, top));
            weight_y += w;
        }

        Self::new(
            2.0 / (f64::from(right - left) * f64::from(weight_x)),
            nx,
            2.0 / (f64::from(bottom - top) * f64::from(weight_y)),
            ny,
        )
    }
}
