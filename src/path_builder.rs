//! Representation of Bézier paths.
//!
//! The path parser and the basic shapes push commands into a [`PathBuilder`], which
//! then gets frozen into an immutable [`Path`].  Commands are kept in absolute user-space
//! coordinates; conversion to device space and flattening happen in [`crate::vpath`].

use tinyvec::TinyVec;

use float_cmp::approx_eq;
use std::f64::consts::*;

use crate::enum_default;
use crate::path_parser::{ParseError, PathParser};
use crate::util::clamp;

/// Whether an arc's sweep should be >= 180 degrees, or smaller.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LargeArc(pub bool);

/// Angular direction in which an arc is drawn.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Sweep {
    Negative,
    Positive,
}

/// "c" command for paths; describes a cubic Bézier segment.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CubicBezierCurve {
    /// The (x, y) coordinates of the first control point.
    pub pt1: (f64, f64),
    /// The (x, y) coordinates of the second control point.
    pub pt2: (f64, f64),
    /// The (x, y) coordinates of the end point of this path segment.
    pub to: (f64, f64),
}

/// Center parameterization of an elliptical arc, or what to do instead.
pub enum ArcParameterization {
    CenterParameters {
        center: (f64, f64),
        /// Radii after correction for out-of-range values.
        radii: (f64, f64),
        theta1: f64,
        delta_theta: f64,
    },
    /// Radii too small; the arc becomes a straight line.
    LineTo,
    /// Start and end points coincide; the arc is dropped.
    Omit,
}

/// "a" command for paths; an elliptical arc in terms of its endpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipticalArc {
    pub r: (f64, f64),
    /// Rotation of the ellipse's x axis, in degrees.
    pub x_axis_rotation: f64,
    pub large_arc: LargeArc,
    pub sweep: Sweep,
    pub from: (f64, f64),
    pub to: (f64, f64),
}

impl EllipticalArc {
    /// Converts from endpoint to center parameterization, enlarging the radii if
    /// there is no solution with the given ones.
    ///
    /// See [B.2.4. Conversion from endpoint to center
    /// parameterization](https://www.w3.org/TR/SVG2/implnote.html#ArcConversionEndpointToCenter)
    pub fn center_parameterization(&self) -> ArcParameterization {
        let EllipticalArc {
            r: (rx, ry),
            x_axis_rotation,
            large_arc,
            sweep,
            from: (x1, y1),
            to: (x2, y2),
        } = *self;

        if x1 == x2 && y1 == y2 {
            return ArcParameterization::Omit;
        }

        if rx * rx < f64::EPSILON || ry * ry < f64::EPSILON {
            return ArcParameterization::LineTo;
        }

        let (mut rx, mut ry) = (rx.abs(), ry.abs());

        let phi = x_axis_rotation * PI / 180.0;
        let (sin_phi, cos_phi) = phi.sin_cos();

        // Move the origin to the midpoint of the chord and align the axes with the ellipse.
        let mid_x = (x1 - x2) / 2.0;
        let mid_y = (y1 - y2) / 2.0;
        let x1_ = cos_phi * mid_x + sin_phi * mid_y;
        let y1_ = -sin_phi * mid_x + cos_phi * mid_y;

        let lambda = (x1_ / rx).powi(2) + (y1_ / ry).powi(2);
        if lambda > 1.0 {
            rx *= lambda.sqrt();
            ry *= lambda.sqrt();
        }

        let d = (rx * y1_).powi(2) + (ry * x1_).powi(2);
        if d == 0.0 {
            return ArcParameterization::Omit;
        }

        let mut k = ((rx * ry).powi(2) / d - 1.0).abs().sqrt();
        if (sweep == Sweep::Positive) == large_arc.0 {
            k = -k;
        }

        let cx_ = k * rx * y1_ / ry;
        let cy_ = -k * ry * x1_ / rx;

        let cx = cos_phi * cx_ - sin_phi * cy_ + (x1 + x2) / 2.0;
        let cy = sin_phi * cx_ + cos_phi * cy_ + (y1 + y2) / 2.0;

        let ux = (x1_ - cx_) / rx;
        let uy = (y1_ - cy_) / ry;
        let vx = (-x1_ - cx_) / rx;
        let vy = (-y1_ - cy_) / ry;

        let u_len = ux.hypot(uy);
        let v_len = vx.hypot(vy);
        if u_len == 0.0 || v_len == 0.0 {
            return ArcParameterization::Omit;
        }

        let mut theta1 = clamp(ux / u_len, -1.0, 1.0).acos();
        if uy < 0.0 {
            theta1 = -theta1;
        }

        let mut delta_theta = clamp((ux * vx + uy * vy) / (u_len * v_len), -1.0, 1.0).acos();
        if ux * vy - uy * vx < 0.0 {
            delta_theta = -delta_theta;
        }

        match sweep {
            Sweep::Positive if delta_theta < 0.0 => delta_theta += 2.0 * PI,
            Sweep::Negative if delta_theta > 0.0 => delta_theta -= 2.0 * PI,
            _ => (),
        }

        ArcParameterization::CenterParameters {
            center: (cx, cy),
            radii: (rx, ry),
            theta1,
            delta_theta,
        }
    }

    /// Approximates the arc with cubic Béziers, each spanning at most a quarter turn.
    ///
    /// An arc that degenerates to a line yields an empty list; callers should draw a
    /// line to `self.to` in that case, which [`EllipticalArc::append_to`] does.
    pub fn to_cubics(&self) -> Vec<CubicBezierCurve> {
        match self.center_parameterization() {
            ArcParameterization::CenterParameters {
                center,
                radii,
                theta1,
                delta_theta,
            } => {
                let n_segs = (delta_theta / (PI * 0.5 + 0.001)).abs().ceil().max(1.0) as usize;
                let d_theta = delta_theta / n_segs as f64;

                let mut theta = theta1;
                let mut curves = Vec::with_capacity(n_segs);
                for _ in 0..n_segs {
                    curves.push(arc_segment(
                        center,
                        radii,
                        self.x_axis_rotation,
                        theta,
                        theta + d_theta,
                    ));
                    theta += d_theta;
                }

                // Land exactly on the requested end point.
                if let Some(last) = curves.last_mut() {
                    last.to = self.to;
                }

                curves
            }

            ArcParameterization::LineTo | ArcParameterization::Omit => Vec::new(),
        }
    }

    /// Appends this arc to `out` as curves or a line.
    fn append_to(&self, out: &mut Vec<PathCommand>) {
        match self.center_parameterization() {
            ArcParameterization::Omit => (),
            ArcParameterization::LineTo => out.push(PathCommand::LineTo(self.to.0, self.to.1)),
            ArcParameterization::CenterParameters { .. } => {
                out.extend(self.to_cubics().into_iter().map(PathCommand::CurveTo))
            }
        }
    }
}

/// Turns an arc segment into a cubic Bézier curve.
///
/// Takes the center, the radii and the x-axis rotation of the ellipse, and the angles
/// of the start and end points.
pub fn arc_segment(
    c: (f64, f64),
    r: (f64, f64),
    x_axis_rotation: f64,
    th0: f64,
    th1: f64,
) -> CubicBezierCurve {
    let (cx, cy) = c;
    let (rx, ry) = r;
    let phi = x_axis_rotation * PI / 180.0;
    let (sin_phi, cos_phi) = phi.sin_cos();
    let (sin_th0, cos_th0) = th0.sin_cos();
    let (sin_th1, cos_th1) = th1.sin_cos();

    let th_half = 0.5 * (th1 - th0);
    let t = (8.0 / 3.0) * (th_half * 0.5).sin().powi(2) / th_half.sin();
    let x1 = rx * (cos_th0 - t * sin_th0);
    let y1 = ry * (sin_th0 + t * cos_th0);
    let x3 = rx * cos_th1;
    let y3 = ry * sin_th1;
    let x2 = x3 + rx * (t * sin_th1);
    let y2 = y3 + ry * (-t * cos_th1);

    let rotate = |x: f64, y: f64| (cx + cos_phi * x - sin_phi * y, cy + sin_phi * x + cos_phi * y);

    CubicBezierCurve {
        pt1: rotate(x1, y1),
        pt2: rotate(x2, y2),
        to: rotate(x3, y3),
    }
}

/// A single path command in absolute coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathCommand {
    MoveTo(f64, f64),
    LineTo(f64, f64),
    CurveTo(CubicBezierCurve),
    Arc(EllipticalArc),
    ClosePath,
}

// TinyVec needs T: Default; paths have no meaningful default command.
enum_default!(
    PathCommand,
    PathCommand::CurveTo(CubicBezierCurve::default())
);

impl PathCommand {
    /// End point of the command, if it moves the current point by itself.
    fn end_point(&self) -> Option<(f64, f64)> {
        match *self {
            PathCommand::MoveTo(x, y) | PathCommand::LineTo(x, y) => Some((x, y)),
            PathCommand::CurveTo(ref c) => Some(c.to),
            PathCommand::Arc(ref a) => Some(a.to),
            PathCommand::ClosePath => None,
        }
    }
}

/// Accumulates path commands.
///
/// Most paths in the wild have fewer than 32 commands, so those are kept on the stack.
#[derive(Default)]
pub struct PathBuilder {
    path_commands: TinyVec<[PathCommand; 32]>,
}

impl PathBuilder {
    /// Parses SVG path data into this builder.
    ///
    /// On error, the commands parsed up to the error stay in the builder, so that the
    /// valid prefix of the path can still be rendered.
    pub fn parse(&mut self, path_str: &str) -> Result<(), ParseError> {
        PathParser::new(self, path_str).parse()
    }

    pub fn into_path(self) -> Path {
        Path {
            commands: self.path_commands.into_iter().collect(),
        }
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        self.path_commands.push(PathCommand::MoveTo(x, y));
    }

    pub fn line_to(&mut self, x: f64, y: f64) {
        self.path_commands.push(PathCommand::LineTo(x, y));
    }

    pub fn curve_to(&mut self, x2: f64, y2: f64, x3: f64, y3: f64, x4: f64, y4: f64) {
        self.path_commands.push(PathCommand::CurveTo(CubicBezierCurve {
            pt1: (x2, y2),
            pt2: (x3, y3),
            to: (x4, y4),
        }));
    }

    #[allow(clippy::too_many_arguments)]
    pub fn arc(
        &mut self,
        x1: f64,
        y1: f64,
        rx: f64,
        ry: f64,
        x_axis_rotation: f64,
        large_arc: LargeArc,
        sweep: Sweep,
        x2: f64,
        y2: f64,
    ) {
        self.path_commands.push(PathCommand::Arc(EllipticalArc {
            r: (rx, ry),
            x_axis_rotation,
            large_arc,
            sweep,
            from: (x1, y1),
            to: (x2, y2),
        }));
    }

    pub fn close_path(&mut self) {
        self.path_commands.push(PathCommand::ClosePath);
    }
}

/// An immutable path.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Path {
    commands: Box<[PathCommand]>,
}

/// A run of commands that starts with a `MoveTo`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubPath<'a> {
    commands: &'a [PathCommand],
}

impl<'a> SubPath<'a> {
    pub fn commands(&self) -> &'a [PathCommand] {
        self.commands
    }

    /// Coordinates of the initial `MoveTo`.
    pub fn origin(&self) -> (f64, f64) {
        match self.commands.first() {
            Some(PathCommand::MoveTo(x, y)) => (*x, *y),
            _ => (0.0, 0.0),
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.commands.last(), Some(PathCommand::ClosePath))
    }

    /// Whether every command leaves the pen at the origin.
    pub fn is_zero_length(&self) -> bool {
        let (ox, oy) = self.origin();

        self.commands.iter().skip(1).all(|cmd| match *cmd {
            PathCommand::CurveTo(ref c) => [c.pt1, c.pt2, c.to]
                .iter()
                .all(|&(x, y)| approx_eq!(f64, x, ox) && approx_eq!(f64, y, oy)),
            _ => cmd
                .end_point()
                .map_or(true, |(x, y)| approx_eq!(f64, x, ox) && approx_eq!(f64, y, oy)),
        })
    }
}

impl Path {
    pub fn iter(&self) -> impl Iterator<Item = &PathCommand> + '_ {
        self.commands.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Iterates over the subpaths.  Commands before the first `MoveTo` are skipped.
    pub fn iter_subpath(&self) -> impl Iterator<Item = SubPath<'_>> + '_ {
        let start = self
            .commands
            .iter()
            .position(|c| matches!(c, PathCommand::MoveTo(..)))
            .unwrap_or(self.commands.len());

        let mut rest = &self.commands[start..];

        std::iter::from_fn(move || {
            if rest.is_empty() {
                return None;
            }

            let len = rest
                .iter()
                .skip(1)
                .position(|c| matches!(c, PathCommand::MoveTo(..)))
                .map_or(rest.len(), |p| p + 1);

            let (commands, tail) = rest.split_at(len);
            rest = tail;
            Some(SubPath { commands })
        })
    }

    /// Returns a copy where every arc has been replaced by cubic curves or lines.
    pub fn without_arcs(&self) -> Path {
        let mut out = Vec::with_capacity(self.commands.len());

        for cmd in self.commands.iter() {
            match cmd {
                PathCommand::Arc(a) => a.append_to(&mut out),
                other => out.push(*other),
            }
        }

        Path {
            commands: out.into_boxed_slice(),
        }
    }
}
