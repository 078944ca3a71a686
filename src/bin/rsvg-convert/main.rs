use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::path::PathBuf;

use rsvg::rsvg_convert_only::{Color, Parse};
use rsvg::{Handle, SizeMode};

/// Convert SVG files to PNG images.
#[derive(Parser, Debug)]
#[command(
    name = "rsvg-convert",
    version,
    about,
    disable_help_flag = true,
    disable_version_flag = true
)]
struct Converter {
    /// Pixels per inch
    #[arg(
        short = 'd',
        long = "dpi-x",
        value_name = "float",
        default_value_t = 90.0,
        value_parser = parse_resolution
    )]
    dpi_x: f64,

    /// Pixels per inch
    #[arg(
        short = 'p',
        long = "dpi-y",
        value_name = "float",
        default_value_t = 90.0,
        value_parser = parse_resolution
    )]
    dpi_y: f64,

    /// Horizontal zoom factor
    #[arg(
        short = 'x',
        long = "x-zoom",
        value_name = "float",
        default_value_t = 1.0,
        value_parser = parse_zoom_factor
    )]
    x_zoom: f64,

    /// Vertical zoom factor
    #[arg(
        short = 'y',
        long = "y-zoom",
        value_name = "float",
        default_value_t = 1.0,
        value_parser = parse_zoom_factor
    )]
    y_zoom: f64,

    /// Width [defaults to the width of the SVG]
    #[arg(
        short = 'w',
        long = "width",
        value_name = "pixels",
        allow_negative_numbers = true
    )]
    width: Option<i32>,

    /// Height [defaults to the height of the SVG]
    #[arg(
        short = 'h',
        long = "height",
        value_name = "pixels",
        allow_negative_numbers = true
    )]
    height: Option<i32>,

    /// Set the background color using a CSS color spec
    #[arg(
        short = 'b',
        long = "background-color",
        value_name = "color",
        value_parser = parse_background_color
    )]
    background_color: Option<[u8; 4]>,

    /// Preserve the aspect ratio
    #[arg(short = 'a', long = "keep-aspect-ratio")]
    keep_aspect_ratio: bool,

    /// Print version information
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    version: Option<bool>,

    /// Print help
    #[arg(short = '?', long = "help", action = ArgAction::Help)]
    help: Option<bool>,

    /// The SVG file to convert
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// The PNG file to write
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,
}

impl Converter {
    fn size_mode(&self) -> SizeMode {
        let width = self.width.unwrap_or(-1);
        let height = self.height.unwrap_or(-1);

        #[allow(clippy::float_cmp)]
        let is_identity_zoom = self.x_zoom == 1.0 && self.y_zoom == 1.0;

        if width == -1 && height == -1 {
            SizeMode::Zoom {
                x: self.x_zoom,
                y: self.y_zoom,
            }
        } else if is_identity_zoom {
            SizeMode::Size { width, height }
        } else {
            let unbounded = |d: i32| if d == -1 { i32::MAX } else { d };

            SizeMode::ZoomMax {
                x: self.x_zoom,
                y: self.y_zoom,
                max_width: unbounded(width),
                max_height: unbounded(height),
            }
        }
    }

    fn convert(&self) -> Result<()> {
        let data = std::fs::read(&self.input)
            .with_context(|| format!("could not read {}", self.input.display()))?;

        let mut handle = Handle::new();
        handle.set_dpi_x_y(self.dpi_x, self.dpi_y);
        handle.set_base_path(&self.input);

        let size_mode = self.size_mode();
        let keep_aspect_ratio = self.keep_aspect_ratio;
        let given = (
            self.width.map_or(false, |w| w != -1),
            self.height.map_or(false, |h| h != -1),
        );

        handle.set_size_callback(move |w, h| {
            let size = size_mode.compute(w, h);

            if keep_aspect_ratio {
                fit_keeping_aspect((w, h), size, given)
            } else {
                size
            }
        });

        handle
            .write(&data)
            .and_then(|()| handle.close())
            .with_context(|| format!("could not load {}", self.input.display()))?;

        let mut pixbuf = handle
            .get_output()
            .with_context(|| format!("{} has no <svg> element", self.input.display()))?;

        if let Some(color) = self.background_color {
            pixbuf = pixbuf.with_background(color);
        }

        pixbuf
            .save_png(&self.output)
            .with_context(|| format!("could not write {}", self.output.display()))
    }
}

/// Scales the natural size uniformly so that it fits in `size`.  Only the dimensions
/// that were `given` on the command line constrain the result.
fn fit_keeping_aspect(
    (in_width, in_height): (i32, i32),
    (width, height): (i32, i32),
    (has_width, has_height): (bool, bool),
) -> (i32, i32) {
    if in_width <= 0 || in_height <= 0 || !(has_width || has_height) {
        return (width, height);
    }

    let zoom_x = if has_width {
        f64::from(width) / f64::from(in_width)
    } else {
        f64::INFINITY
    };

    let zoom_y = if has_height {
        f64::from(height) / f64::from(in_height)
    } else {
        f64::INFINITY
    };

    let zoom = f64::min(zoom_x, zoom_y);
    let round = |x: f64| (x + 0.5).floor() as i32;

    (
        round(f64::from(in_width) * zoom),
        round(f64::from(in_height) * zoom),
    )
}

fn parse_resolution(s: &str) -> Result<f64, String> {
    match s.parse::<f64>() {
        Ok(r) if r > 0.0 => Ok(r),
        _ => Err(String::from("Invalid resolution")),
    }
}

fn parse_zoom_factor(s: &str) -> Result<f64, String> {
    match s.parse::<f64>() {
        Ok(z) if z > 0.0 => Ok(z),
        _ => Err(String::from("Invalid zoom factor")),
    }
}

fn parse_background_color(s: &str) -> Result<[u8; 4], String> {
    let invalid = || format!("The argument '{}' can not be parsed as a CSS color value", s);

    match s {
        "none" | "None" => Ok([0, 0, 0, 0]),
        _ => match <Color as Parse>::parse_str(s).map_err(|_| invalid())? {
            Color::RGBA(rgba) => Ok([rgba.red, rgba.green, rgba.blue, rgba.alpha]),
            Color::CurrentColor => Err(invalid()),
        },
    }
}

fn main() -> Result<()> {
    Converter::parse().convert()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_color_is_ok() {
        assert_eq!(parse_background_color("Red"), Ok([255, 0, 0, 255]));
    }

    #[test]
    fn none_is_transparent() {
        assert_eq!(parse_background_color("None"), Ok([0, 0, 0, 0]));
    }

    #[test]
    fn invalid_color_is_an_error() {
        assert!(parse_background_color("foo").is_err());
        assert!(parse_background_color("currentColor").is_err());
    }

    #[test]
    fn keeps_aspect_of_natural_size() {
        assert_eq!(fit_keeping_aspect((100, 50), (40, 40), (true, true)), (40, 20));
        assert_eq!(fit_keeping_aspect((50, 100), (40, 60), (true, true)), (30, 60));
        assert_eq!(fit_keeping_aspect((40, 20), (100, 20), (true, false)), (100, 50));
        assert_eq!(fit_keeping_aspect((40, 20), (80, 40), (false, false)), (80, 40));
    }

    #[test]
    fn zoom_and_size_pick_modes() {
        let converter =
            Converter::parse_from(["rsvg-convert", "-x", "2", "-w", "100", "in.svg", "out.png"]);
        assert_eq!(
            converter.size_mode(),
            SizeMode::ZoomMax {
                x: 2.0,
                y: 1.0,
                max_width: 100,
                max_height: i32::MAX
            }
        );

        let converter = Converter::parse_from(["rsvg-convert", "-h", "-1", "in.svg", "out.png"]);
        assert_eq!(converter.size_mode(), SizeMode::Zoom { x: 1.0, y: 1.0 });
    }

    #[test]
    fn command_is_well_formed() {
        use clap::CommandFactory;
        Converter::command().debug_assert();
    }
}
