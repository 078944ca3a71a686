//! Parser for SVG path data.
//!
//! Path data is scanned byte by byte.  Commands and their argument lists are fed to a
//! [`PathBuilder`] in absolute coordinates: relative commands are resolved against the
//! current point, horizontal/vertical lines become line-tos, and quadratic curves are
//! raised to cubics.  See the [path data grammar](https://www.w3.org/TR/SVG/paths.html#PathDataBNF).
//!
//! Some peculiarities of the grammar:
//!
//! - Commas between numbers are optional, and so is whitespace: `M-10,20-30-40` is the
//!   same as `M -10 20 -30 -40`, and `M.1.2` is `M 0.1 0.2`.
//!
//! - A command letter may be followed by several argument groups; the command repeats
//!   implicitly, and extra groups after a moveto are treated as linetos.
//!
//! - Arc flags are single characters, so `a1 1 0 00 10 10` is valid.

use std::fmt;

use crate::path_builder::*;

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum ErrorKind {
    /// Path data must start with a moveto.
    ExpectedMoveTo,
    UnexpectedCommand(u8),
    UnexpectedByte(u8),
    InvalidNumber,
    InvalidFlag,
    UnexpectedEof,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseError {
    pub position: usize,
    pub kind: ErrorKind,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = match self.kind {
            ErrorKind::ExpectedMoveTo => "path data must start with a moveto",
            ErrorKind::UnexpectedCommand(_) => "unexpected command",
            ErrorKind::UnexpectedByte(_) => "unexpected character",
            ErrorKind::InvalidNumber => "invalid number",
            ErrorKind::InvalidFlag => "invalid arc flag",
            ErrorKind::UnexpectedEof => "unexpected end of data",
        };
        write!(f, "error at position {}: {}", self.position, description)
    }
}

pub struct PathParser<'b> {
    input: &'b [u8],
    pos: usize,

    builder: &'b mut PathBuilder,

    current: (f64, f64),
    subpath_start: (f64, f64),

    // Control points to reflect for the smooth curve commands; equal to the current
    // point when the previous command was not a curve of the same kind.
    cubic_reflection: (f64, f64),
    quadratic_reflection: (f64, f64),
}

impl<'b> PathParser<'b> {
    pub fn new(builder: &'b mut PathBuilder, path_str: &'b str) -> PathParser<'b> {
        PathParser {
            input: path_str.as_bytes(),
            pos: 0,
            builder,
            current: (0.0, 0.0),
            subpath_start: (0.0, 0.0),
            cubic_reflection: (0.0, 0.0),
            quadratic_reflection: (0.0, 0.0),
        }
    }

    pub fn parse(&mut self) -> Result<(), ParseError> {
        self.skip_whitespace();

        if self.at_end() {
            return Ok(());
        }

        match self.peek() {
            Some(b'M') | Some(b'm') => (),
            _ => return Err(self.error(ErrorKind::ExpectedMoveTo)),
        }

        loop {
            self.skip_whitespace();

            let cmd = match self.peek() {
                None => return Ok(()),
                Some(c) if c.is_ascii_alphabetic() => c,
                Some(c) => return Err(self.error(ErrorKind::UnexpectedByte(c))),
            };

            let cmd_pos = self.pos;
            self.pos += 1;

            self.command(cmd, cmd_pos)?;
        }
    }

    fn command(&mut self, cmd: u8, cmd_pos: usize) -> Result<(), ParseError> {
        let absolute = cmd.is_ascii_uppercase();

        match cmd.to_ascii_uppercase() {
            b'Z' => {
                self.builder.close_path();
                self.set_current_point(self.subpath_start);
                Ok(())
            }

            b'M' => {
                let p = self.coordinate_pair(absolute)?;
                self.subpath_start = p;
                self.set_current_point(p);
                self.builder.move_to(p.0, p.1);

                // Implicit linetos.
                self.repeat(|parser| {
                    let p = parser.coordinate_pair(absolute)?;
                    parser.line_to(p);
                    Ok(())
                })
            }

            b'L' => self.repeat_at_least_once(|parser| {
                let p = parser.coordinate_pair(absolute)?;
                parser.line_to(p);
                Ok(())
            }),

            b'H' => self.repeat_at_least_once(|parser| {
                let mut x = parser.number()?;
                if !absolute {
                    x += parser.current.0;
                }
                parser.line_to((x, parser.current.1));
                Ok(())
            }),

            b'V' => self.repeat_at_least_once(|parser| {
                let mut y = parser.number()?;
                if !absolute {
                    y += parser.current.1;
                }
                parser.line_to((parser.current.0, y));
                Ok(())
            }),

            b'C' => self.repeat_at_least_once(|parser| {
                let p1 = parser.coordinate_pair(absolute)?;
                let p2 = parser.coordinate_pair(absolute)?;
                let p3 = parser.coordinate_pair(absolute)?;
                parser.curve_to(p1, p2, p3);
                Ok(())
            }),

            b'S' => self.repeat_at_least_once(|parser| {
                let p2 = parser.coordinate_pair(absolute)?;
                let p3 = parser.coordinate_pair(absolute)?;
                let p1 = reflect(parser.cubic_reflection, parser.current);
                parser.curve_to(p1, p2, p3);
                Ok(())
            }),

            b'Q' => self.repeat_at_least_once(|parser| {
                let c = parser.coordinate_pair(absolute)?;
                let p = parser.coordinate_pair(absolute)?;
                parser.quadratic_curve_to(c, p);
                Ok(())
            }),

            b'T' => self.repeat_at_least_once(|parser| {
                let p = parser.coordinate_pair(absolute)?;
                let c = reflect(parser.quadratic_reflection, parser.current);
                parser.quadratic_curve_to(c, p);
                Ok(())
            }),

            b'A' => self.repeat_at_least_once(|parser| {
                let rx = parser.number()?;
                let ry = parser.number()?;
                let x_axis_rotation = parser.number()?;
                let large_arc = LargeArc(parser.flag()?);
                let sweep = if parser.flag()? {
                    Sweep::Positive
                } else {
                    Sweep::Negative
                };
                let to = parser.coordinate_pair(absolute)?;

                let from = parser.current;
                parser.set_current_point(to);
                parser.builder.arc(
                    from.0,
                    from.1,
                    rx,
                    ry,
                    x_axis_rotation,
                    large_arc,
                    sweep,
                    to.0,
                    to.1,
                );
                Ok(())
            }),

            _ => Err(ParseError {
                position: cmd_pos,
                kind: ErrorKind::UnexpectedCommand(cmd),
            }),
        }
    }

    fn repeat_at_least_once<F>(&mut self, mut f: F) -> Result<(), ParseError>
    where
        F: FnMut(&mut Self) -> Result<(), ParseError>,
    {
        f(self)?;
        self.repeat(f)
    }

    /// Runs `f` for as long as another argument group follows.
    fn repeat<F>(&mut self, mut f: F) -> Result<(), ParseError>
    where
        F: FnMut(&mut Self) -> Result<(), ParseError>,
    {
        loop {
            self.skip_whitespace();

            // A comma here means another argument group must follow.
            let had_comma = self.peek() == Some(b',');
            if !had_comma && !self.starts_number() {
                return Ok(());
            }

            f(self)?;
        }
    }

    fn set_current_point(&mut self, p: (f64, f64)) {
        self.current = p;
        self.cubic_reflection = p;
        self.quadratic_reflection = p;
    }

    fn line_to(&mut self, p: (f64, f64)) {
        self.set_current_point(p);
        self.builder.line_to(p.0, p.1);
    }

    fn curve_to(&mut self, p1: (f64, f64), p2: (f64, f64), p3: (f64, f64)) {
        self.builder.curve_to(p1.0, p1.1, p2.0, p2.1, p3.0, p3.1);
        self.current = p3;
        self.cubic_reflection = p2;
        self.quadratic_reflection = p3;
    }

    fn quadratic_curve_to(&mut self, c: (f64, f64), p: (f64, f64)) {
        // Raise the quadratic Bézier to a cubic.
        let (x0, y0) = self.current;
        let p1 = ((x0 + 2.0 * c.0) / 3.0, (y0 + 2.0 * c.1) / 3.0);
        let p2 = ((p.0 + 2.0 * c.0) / 3.0, (p.1 + 2.0 * c.1) / 3.0);

        self.builder.curve_to(p1.0, p1.1, p2.0, p2.1, p.0, p.1);
        self.current = p;
        self.cubic_reflection = p;
        self.quadratic_reflection = c;
    }

    fn coordinate_pair(&mut self, absolute: bool) -> Result<(f64, f64), ParseError> {
        let x = self.number()?;
        let y = self.number()?;

        if absolute {
            Ok((x, y))
        } else {
            Ok((x + self.current.0, y + self.current.1))
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn error(&self, kind: ErrorKind) -> ParseError {
        ParseError {
            position: self.pos,
            kind,
        }
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    /// Skips whitespace and at most one comma, with whitespace on either side.
    fn skip_separator(&mut self) {
        self.skip_whitespace();
        if self.peek() == Some(b',') {
            self.pos += 1;
            self.skip_whitespace();
        }
    }

    fn starts_number(&self) -> bool {
        matches!(self.peek(), Some(b'0'..=b'9' | b'+' | b'-' | b'.'))
    }

    fn skip_digits(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn number(&mut self) -> Result<f64, ParseError> {
        self.skip_separator();

        if self.at_end() {
            return Err(self.error(ErrorKind::UnexpectedEof));
        }

        let start = self.pos;

        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.pos += 1;
        }

        let int_digits = self.skip_digits();

        let mut frac_digits = false;
        if self.peek() == Some(b'.') {
            self.pos += 1;
            frac_digits = self.skip_digits();
        }

        if !int_digits && !frac_digits {
            self.pos = start;
            return match self.peek() {
                Some(c) if c.is_ascii_alphabetic() => {
                    Err(self.error(ErrorKind::UnexpectedCommand(c)))
                }
                _ => Err(self.error(ErrorKind::InvalidNumber)),
            };
        }

        // The exponent is only consumed when it is complete, so that "1e" parses as
        // the number 1 followed by something else.
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let before_exponent = self.pos;
            self.pos += 1;

            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }

            if !self.skip_digits() {
                self.pos = before_exponent;
            }
        }

        std::str::from_utf8(&self.input[start..self.pos])
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|n| n.is_finite())
            .ok_or(ParseError {
                position: start,
                kind: ErrorKind::InvalidNumber,
            })
    }

    fn flag(&mut self) -> Result<bool, ParseError> {
        self.skip_separator();

        match self.peek() {
            Some(b'0') => {
                self.pos += 1;
                Ok(false)
            }
            Some(b'1') => {
                self.pos += 1;
                Ok(true)
            }
            None => Err(self.error(ErrorKind::UnexpectedEof)),
            Some(_) => Err(self.error(ErrorKind::InvalidFlag)),
        }
    }
}

fn reflect(control: (f64, f64), about: (f64, f64)) -> (f64, f64) {
    (2.0 * about.0 - control.0, 2.0 * about.1 - control.1)
}

#[cfg(test)]
#[rustfmt::skip]
mod tests {
    use super::*;

    fn parse(path_str: &str) -> (Vec<PathCommand>, Result<(), ParseError>) {
        let mut builder = PathBuilder::default();
        let result = builder.parse(path_str);
        (builder.into_path().iter().cloned().collect(), result)
    }

    fn moveto(x: f64, y: f64) -> PathCommand {
        PathCommand::MoveTo(x, y)
    }

    fn lineto(x: f64, y: f64) -> PathCommand {
        PathCommand::LineTo(x, y)
    }

    fn curveto(x2: f64, y2: f64, x3: f64, y3: f64, x4: f64, y4: f64) -> PathCommand {
        PathCommand::CurveTo(CubicBezierCurve {
            pt1: (x2, y2),
            pt2: (x3, y3),
            to: (x4, y4),
        })
    }

    fn closepath() -> PathCommand {
        PathCommand::ClosePath
    }

    #[test]
    fn handles_empty_data() {
        assert_eq!(parse(""), (vec![], Ok(())));
        assert_eq!(parse("  \n\t"), (vec![], Ok(())));
    }

    #[test]
    fn handles_numbers() {
        assert_eq!(parse("M 10 20").0, vec![moveto(10.0, 20.0)]);
        assert_eq!(parse("M -10 -20").0, vec![moveto(-10.0, -20.0)]);
        assert_eq!(parse("M .10 0.20").0, vec![moveto(0.10, 0.20)]);
        assert_eq!(parse("M 1e2 2E-1").0, vec![moveto(100.0, 0.2)]);
        assert_eq!(parse("M 1.e2 -.5e+1").0, vec![moveto(100.0, -5.0)]);
    }

    #[test]
    fn handles_compact_numbers() {
        assert_eq!(
            parse("M.1-2,3E2-4").0,
            vec![moveto(0.1, -2.0), lineto(300.0, -4.0)]
        );
        assert_eq!(parse("M.1.2").0, vec![moveto(0.1, 0.2)]);
        assert_eq!(
            parse("M10,20,30,40").0,
            vec![moveto(10.0, 20.0), lineto(30.0, 40.0)]
        );
    }

    #[test]
    fn handles_relative_commands() {
        assert_eq!(
            parse("m10 20 l 5 5 h 10 v -5 z m 1 1").0,
            vec![
                moveto(10.0, 20.0),
                lineto(15.0, 25.0),
                lineto(25.0, 25.0),
                lineto(25.0, 20.0),
                closepath(),
                moveto(11.0, 21.0),
            ]
        );
    }

    #[test]
    fn relative_moveto_with_implicit_linetos() {
        assert_eq!(
            parse("m10 20 30 40 50 60").0,
            vec![moveto(10.0, 20.0), lineto(40.0, 60.0), lineto(90.0, 120.0)]
        );
    }

    #[test]
    fn handles_curves() {
        assert_eq!(
            parse("M 0 0 C 1 2 3 4 5 6 S 7 8 9 10").0,
            vec![
                moveto(0.0, 0.0),
                curveto(1.0, 2.0, 3.0, 4.0, 5.0, 6.0),
                curveto(7.0, 8.0, 7.0, 8.0, 9.0, 10.0),
            ]
        );
    }

    #[test]
    fn smooth_curve_without_previous_curve_uses_current_point() {
        assert_eq!(
            parse("M 10 10 S 20 20 30 30").0,
            vec![moveto(10.0, 10.0), curveto(10.0, 10.0, 20.0, 20.0, 30.0, 30.0)]
        );
    }

    #[test]
    fn quadratic_curves_are_raised_to_cubics() {
        assert_eq!(
            parse("M 0 0 Q 3 6 6 0 T 12 0").0,
            vec![
                moveto(0.0, 0.0),
                curveto(2.0, 4.0, 4.0, 4.0, 6.0, 0.0),
                curveto(8.0, -4.0, 10.0, -4.0, 12.0, 0.0),
            ]
        );
    }

    #[test]
    fn handles_arcs_with_compact_flags() {
        let (commands, result) = parse("M 10 10 a20 20 0 01 30 40");
        assert_eq!(result, Ok(()));
        assert_eq!(
            commands[1],
            PathCommand::Arc(EllipticalArc {
                r: (20.0, 20.0),
                x_axis_rotation: 0.0,
                large_arc: LargeArc(false),
                sweep: Sweep::Positive,
                from: (10.0, 10.0),
                to: (40.0, 50.0),
            })
        );
    }

    #[test]
    fn closepath_resets_current_point() {
        assert_eq!(
            parse("M 10 10 L 20 10 Z l 5 5").0,
            vec![moveto(10.0, 10.0), lineto(20.0, 10.0), closepath(), lineto(15.0, 15.0)]
        );
    }

    #[test]
    fn first_command_must_be_moveto() {
        assert_eq!(
            parse("L 10 10"),
            (vec![], Err(ParseError { position: 0, kind: ErrorKind::ExpectedMoveTo }))
        );
    }

    #[test]
    fn keeps_commands_before_an_error() {
        assert_eq!(
            parse("M 10 10 L 20 20 L 30"),
            (
                vec![moveto(10.0, 10.0), lineto(20.0, 20.0)],
                Err(ParseError { position: 20, kind: ErrorKind::UnexpectedEof })
            )
        );

        assert_eq!(
            parse("M 10 10 X 20").1,
            Err(ParseError { position: 8, kind: ErrorKind::UnexpectedCommand(b'X') })
        );

        assert_eq!(
            parse("M 10 10 L 20 #").1,
            Err(ParseError { position: 13, kind: ErrorKind::InvalidNumber })
        );
    }

    #[test]
    fn dangling_comma_is_an_error() {
        assert!(parse("M 10 10,").1.is_err());
        assert!(parse("M 10 10 L 20 20,").1.is_err());
    }

    #[test]
    fn invalid_arc_flag() {
        assert_eq!(
            parse("M 0 0 A 1 1 0 2 0 5 5").1,
            Err(ParseError { position: 14, kind: ErrorKind::InvalidFlag })
        );
    }
}
