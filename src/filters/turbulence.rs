use cssparser::Parser;
use markup5ever::{expanded_name, local_name, namespace_url, ns};

use crate::element::{set_attribute, ElementTrait};
use crate::enum_default;
use crate::error::*;
use crate::parse_identifiers;
use crate::parsers::{NonNegative, NumberOptionalNumber, Parse, ParseValue};
use crate::rect::IRect;
use crate::rsvg_log;
use crate::surface_utils::{shared_surface::SharedImageSurface, Pixel, PixelOps};
use crate::util::clamp;
use crate::xml::Attributes;

use super::bounds::BoundsBuilder;
use super::context::{FilterContext, FilterOutput};
use super::{FilterError, Primitive};

/// Limit the number of octaves, since each one costs a full pass of noise.
const MAX_OCTAVES: i32 = 9;

/// Enumeration of the tile stitching modes.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum StitchTiles {
    Stitch,
    NoStitch,
}

enum_default!(StitchTiles, StitchTiles::NoStitch);

/// Enumeration of the noise types.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum NoiseType {
    FractalNoise,
    Turbulence,
}

enum_default!(NoiseType, NoiseType::Turbulence);

/// The `feTurbulence` filter primitive.
#[derive(Default)]
pub struct FeTurbulence {
    base: Primitive,
    params: Turbulence,
}

/// Resolved `feTurbulence` primitive for rendering.
#[derive(Clone)]
pub struct Turbulence {
    base_frequency: (f64, f64),
    num_octaves: i32,
    seed: i32,
    stitch_tiles: StitchTiles,
    type_: NoiseType,
}

impl Default for Turbulence {
    #[inline]
    fn default() -> Turbulence {
        Turbulence {
            base_frequency: (0.0, 0.0),
            num_octaves: 1,
            seed: 0,
            stitch_tiles: Default::default(),
            type_: Default::default(),
        }
    }
}

impl ElementTrait for FeTurbulence {
    fn set_attributes(&mut self, attrs: &Attributes) {
        self.base.parse_no_inputs(attrs);

        for (attr, value) in attrs.iter() {
            match attr.expanded() {
                expanded_name!("", "baseFrequency") => {
                    let NumberOptionalNumber(NonNegative(x), NonNegative(y)) =
                        match attr.parse(value) {
                            Ok(v) => v,
                            Err(e) => {
                                rsvg_log!("ignoring attribute with invalid value: {}", e);
                                continue;
                            }
                        };
                    self.params.base_frequency = (x, y);
                }
                expanded_name!("", "numOctaves") => {
                    set_attribute(&mut self.params.num_octaves, attr.parse(value));
                }
                // Yes, seed needs to be parsed as a number and then truncated.
                expanded_name!("", "seed") => {
                    let mut seed: f64 = 0.0;
                    set_attribute(&mut seed, attr.parse(value));
                    self.params.seed = clamp(
                        seed.trunc(),
                        f64::from(i32::MIN),
                        f64::from(i32::MAX),
                    ) as i32;
                }
                expanded_name!("", "stitchTiles") => {
                    set_attribute(&mut self.params.stitch_tiles, attr.parse(value))
                }
                expanded_name!("", "type") => {
                    set_attribute(&mut self.params.type_, attr.parse(value))
                }
                _ => (),
            }
        }
    }
}

/// The Park and Miller "minimal standard" generator, `r = 16807 * r mod (2^31 - 1)`.
///
/// Computed with Schrage's method so that nothing overflows an `i32`.  Outputs are in
/// `[1, 2^31 - 2]`.
struct ParkMiller(i32);

impl ParkMiller {
    const M: i32 = i32::MAX;
    const A: i32 = 16807;
    const Q: i32 = Self::M / Self::A;
    const R: i32 = Self::M % Self::A;

    fn new(seed: i32) -> ParkMiller {
        let seed = if seed <= 0 {
            -(seed % (Self::M - 1)) + 1
        } else {
            seed
        };

        ParkMiller(seed.min(Self::M - 1))
    }

    fn next(&mut self) -> i32 {
        let hi = self.0 / Self::Q;
        let lo = self.0 % Self::Q;

        let mut r = Self::A * lo - Self::R * hi;
        if r <= 0 {
            r += Self::M;
        }

        self.0 = r;
        r
    }
}

/// Number of distinct lattice points along an axis.
const LATTICE: usize = 256;

/// The tables are doubled, plus two, so that `selector[i + j]` needs no wrapping.
const TABLE_LEN: usize = LATTICE * 2 + 2;

/// Added to coordinates so that they are positive before truncation.
const PERLIN_OFFSET: f64 = 4096.0;

/// Lattice coordinates of one axis: the two surrounding cells and the offsets into them.
#[derive(Clone, Copy)]
struct Axis {
    cell0: usize,
    cell1: usize,
    t0: f64,
    t1: f64,
}

impl Axis {
    fn new(v: f64) -> Axis {
        let t = v + PERLIN_OFFSET;
        let cell0 = t as usize;

        Axis {
            cell0,
            cell1: cell0 + 1,
            t0: t.fract(),
            t1: t.fract() - 1.0,
        }
    }

    /// Wraps cells past the end of the tile back to its start.
    fn wrap(&mut self, period: usize, limit: usize) {
        if self.cell0 >= limit {
            self.cell0 -= period;
        }
        if self.cell1 >= limit {
            self.cell1 -= period;
        }
    }
}

/// Per-axis lattice period, and the cell at which wrapping starts, for stitched tiles.
#[derive(Clone, Copy)]
struct Stitch {
    period: (usize, usize),
    limit: (usize, usize),
}

impl Stitch {
    /// Doubling the frequency doubles the period; the offset is only counted once.
    fn next_octave(&mut self) {
        let offset = PERLIN_OFFSET as usize;

        self.period = (self.period.0 * 2, self.period.1 * 2);
        self.limit = (2 * self.limit.0 - offset, 2 * self.limit.1 - offset);
    }
}

/// Nudges a frequency so that a whole number of lattice cells fits in `tile_len`.
fn stitchable_frequency(frequency: f64, tile_len: f64) -> f64 {
    if frequency == 0.0 {
        return frequency;
    }

    let lo = (tile_len * frequency).floor() / tile_len;
    let hi = (tile_len * frequency).ceil() / tile_len;

    if frequency / lo < hi / frequency {
        lo
    } else {
        hi
    }
}

/// Perlin noise generator for the four channels of `feTurbulence`.
struct NoiseGenerator {
    params: Turbulence,
    tile_size: (f64, f64),

    selector: [usize; TABLE_LEN],

    /// Unit gradient vectors, one table per channel.
    gradients: [[[f64; 2]; TABLE_LEN]; 4],
}

impl NoiseGenerator {
    fn new(params: &Turbulence, tile_width: f64, tile_height: f64) -> Self {
        let mut rng = ParkMiller::new(params.seed);

        let mut gradients = [[[0.0; 2]; TABLE_LEN]; 4];
        for table in gradients.iter_mut() {
            for g in table.iter_mut().take(LATTICE) {
                for c in g.iter_mut() {
                    let n = rng.next() % (2 * LATTICE as i32) - LATTICE as i32;
                    *c = f64::from(n) / LATTICE as f64;
                }

                let len = (g[0] * g[0] + g[1] * g[1]).sqrt();
                if len != 0.0 {
                    g[0] /= len;
                    g[1] /= len;
                }
            }
        }

        let mut selector = [0; TABLE_LEN];
        for (i, s) in selector.iter_mut().enumerate().take(LATTICE) {
            *s = i;
        }

        // Fisher-Yates shuffle, from the top
        for i in (1..LATTICE).rev() {
            let j = rng.next() as usize % LATTICE;
            selector.swap(i, j);
        }

        for i in 0..LATTICE + 2 {
            selector[LATTICE + i] = selector[i];
            for table in gradients.iter_mut() {
                table[LATTICE + i] = table[i];
            }
        }

        NoiseGenerator {
            params: params.clone(),
            tile_size: (tile_width, tile_height),
            selector,
            gradients,
        }
    }

    fn noise2(&self, channel: usize, point: [f64; 2], stitch: Option<Stitch>) -> f64 {
        let mut x = Axis::new(point[0]);
        let mut y = Axis::new(point[1]);

        if let Some(stitch) = stitch {
            x.wrap(stitch.period.0, stitch.limit.0);
            y.wrap(stitch.period.1, stitch.limit.1);
        }

        let mask = LATTICE - 1;
        let i = self.selector[x.cell0 & mask];
        let j = self.selector[x.cell1 & mask];
        let (y0, y1) = (y.cell0 & mask, y.cell1 & mask);

        let gradients = &self.gradients[channel];
        let dot = |cell: usize, tx: f64, ty: f64| {
            let g = gradients[self.selector[cell]];
            tx * g[0] + ty * g[1]
        };

        let s_curve = |t: f64| t * t * (3. - 2. * t);
        let lerp = |t: f64, a: f64, b: f64| a + t * (b - a);

        let (sx, sy) = (s_curve(x.t0), s_curve(y.t0));

        let top = lerp(sx, dot(i + y0, x.t0, y.t0), dot(j + y0, x.t1, y.t0));
        let bottom = lerp(sx, dot(i + y1, x.t0, y.t1), dot(j + y1, x.t1, y.t1));

        lerp(sy, top, bottom)
    }

    /// Sum of the octaves of noise at `point`; `tile_x` and `tile_y` are the offsets of
    /// the point from the tile's origin.
    fn turbulence(&self, channel: usize, point: [f64; 2], tile_x: f64, tile_y: f64) -> f64 {
        let (mut fx, mut fy) = self.params.base_frequency;
        let (tile_w, tile_h) = self.tile_size;

        let mut stitch = None;

        if self.params.stitch_tiles == StitchTiles::Stitch {
            fx = stitchable_frequency(fx, tile_w);
            fy = stitchable_frequency(fy, tile_h);

            let offset = PERLIN_OFFSET as usize;
            let period = ((tile_w * fx + 0.5) as usize, (tile_h * fy + 0.5) as usize);

            stitch = Some(Stitch {
                period,
                limit: (
                    (tile_x * fx) as usize + offset + period.0,
                    (tile_y * fy) as usize + offset + period.1,
                ),
            });
        }

        let mut p = [point[0] * fx, point[1] * fy];
        let mut sum = 0.0;
        let mut amplitude = 1.0;

        for _ in 0..self.params.num_octaves {
            let n = self.noise2(channel, p, stitch);

            sum += match self.params.type_ {
                NoiseType::FractalNoise => n,
                NoiseType::Turbulence => n.abs(),
            } * amplitude;

            p = [p[0] * 2.0, p[1] * 2.0];
            amplitude /= 2.0;

            if let Some(ref mut stitch) = stitch {
                stitch.next_octave();
            }
        }

        sum
    }
}

impl Turbulence {
    pub fn render(
        &self,
        bounds_builder: BoundsBuilder,
        ctx: &FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError> {
        let bounds: IRect = bounds_builder.compute_irect(ctx);

        let affine = ctx.paffine().invert().ok_or_else(|| {
            FilterError::InvalidParameter("the primitive transform is not invertible".to_string())
        })?;

        let params = Turbulence {
            num_octaves: clamp(self.num_octaves, 0, MAX_OCTAVES),
            ..self.clone()
        };

        let noise_generator = NoiseGenerator::new(
            &params,
            f64::from(bounds.width()),
            f64::from(bounds.height()),
        );

        let source = ctx.source_graphic();
        let empty = SharedImageSurface::empty(source.width(), source.height())?;

        let surface = empty.map_pixels(bounds, |x, y, _| {
            let (px, py) = affine.transform_point(f64::from(x), f64::from(y));
            let point = [px, py];

            let generate = |color_channel| {
                let v = noise_generator.turbulence(
                    color_channel,
                    point,
                    f64::from(x as i32 - bounds.x0),
                    f64::from(y as i32 - bounds.y0),
                );

                let v = match self.type_ {
                    NoiseType::FractalNoise => (v * 255.0 + 255.0) / 2.0,
                    NoiseType::Turbulence => v * 255.0,
                };

                (clamp(v, 0.0, 255.0) + 0.5) as u8
            };

            Pixel {
                r: generate(0),
                g: generate(1),
                b: generate(2),
                a: generate(3),
            }
            .premultiply()
        })?;

        Ok(FilterOutput { surface, bounds })
    }
}

resolve_from_attributes!(FeTurbulence, Turbulence);

impl Parse for StitchTiles {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Self, ParseError<'i>> {
        Ok(parse_identifiers!(
            parser,
            "stitch" => StitchTiles::Stitch,
            "noStitch" => StitchTiles::NoStitch,
        )?)
    }
}

impl Parse for NoiseType {
    fn parse<'i>(parser: &mut Parser<'i, '_>) -> Result<Self, ParseError<'i>> {
        Ok(parse_identifiers!(
            parser,
            "fractalNoise" => NoiseType::FractalNoise,
            "turbulence" => NoiseType::Turbulence,
        )?)
    }
}
