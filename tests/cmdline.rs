//! Tests for the `rsvg-convert` program.

use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SVG: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="40" height="20">
  <rect width="20" height="20" fill="#ff0000"/>
</svg>
"##;

struct RsvgConvert {
    cmd: assert_cmd::Command,
    dir: TempDir,
}

impl RsvgConvert {
    fn new() -> Self {
        RsvgConvert {
            cmd: assert_cmd::Command::cargo_bin("rsvg-convert").unwrap(),
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn input(&self, svg: &str) -> PathBuf {
        let path = self.dir.path().join("input.svg");
        fs::write(&path, svg).unwrap();
        path
    }

    fn output(&self) -> PathBuf {
        self.dir.path().join("output.png")
    }

    /// Runs the converter on `svg` with extra arguments, and returns the decoded PNG.
    fn convert(mut self, svg: &str, args: &[&str]) -> DecodedPng {
        let input = self.input(svg);
        let output = self.output();

        self.cmd
            .args(args)
            .arg(&input)
            .arg(&output)
            .assert()
            .success();

        DecodedPng::from_path(&output)
    }
}

struct DecodedPng {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl DecodedPng {
    fn from_path(path: &Path) -> DecodedPng {
        let decoder = png::Decoder::new(fs::File::open(path).unwrap());
        let mut reader = decoder.read_info().unwrap();
        let mut data = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut data).unwrap();

        assert_eq!(info.color_type, png::ColorType::Rgba);
        assert_eq!(info.bit_depth, png::BitDepth::Eight);

        data.truncate(info.buffer_size());

        DecodedPng {
            width: info.width,
            height: info.height,
            data,
        }
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let ofs = ((y * self.width + x) * 4) as usize;
        [
            self.data[ofs],
            self.data[ofs + 1],
            self.data[ofs + 2],
            self.data[ofs + 3],
        ]
    }
}

#[test]
fn converts_at_natural_size() {
    let png = RsvgConvert::new().convert(SVG, &[]);

    assert_eq!(png.size(), (40, 20));
    assert_eq!(png.pixel(10, 10), [255, 0, 0, 255]);
    assert_eq!(png.pixel(30, 10), [0, 0, 0, 0]);
}

#[test]
fn zoom_factors() {
    let png = RsvgConvert::new().convert(SVG, &["-x", "2", "-y", "0.5"]);
    assert_eq!(png.size(), (80, 10));

    let png = RsvgConvert::new().convert(SVG, &["--x-zoom=1.5", "--y-zoom=1.5"]);
    assert_eq!(png.size(), (60, 30));
}

#[test]
fn width_and_height() {
    let png = RsvgConvert::new().convert(SVG, &["-w", "100"]);
    assert_eq!(png.size(), (100, 20));

    let png = RsvgConvert::new().convert(SVG, &["--width", "100", "--height", "50"]);
    assert_eq!(png.size(), (100, 50));
}

#[test]
fn zoom_is_clamped_by_size() {
    let png = RsvgConvert::new().convert(SVG, &["-x", "4", "-y", "4", "-w", "80"]);
    assert_eq!(png.size(), (80, 40));
}

#[test]
fn keep_aspect_ratio() {
    let png = RsvgConvert::new().convert(SVG, &["-w", "100", "-h", "100", "--keep-aspect-ratio"]);
    assert_eq!(png.size(), (100, 50));
}

#[test]
fn resolution_affects_physical_units() {
    let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="1in" height="1in"/>"#;

    let png = RsvgConvert::new().convert(svg, &[]);
    assert_eq!(png.size(), (90, 90));

    let png = RsvgConvert::new().convert(svg, &["-d", "50", "-p", "100"]);
    assert_eq!(png.size(), (50, 100));
}

#[test]
fn background_color() {
    let png = RsvgConvert::new().convert(SVG, &["-b", "#00ff00"]);
    assert_eq!(png.pixel(10, 10), [255, 0, 0, 255]);
    assert_eq!(png.pixel(30, 10), [0, 255, 0, 255]);

    let png = RsvgConvert::new().convert(SVG, &["--background-color=none"]);
    assert_eq!(png.pixel(30, 10), [0, 0, 0, 0]);
}

#[test]
fn invalid_background_color() {
    let mut cmd = RsvgConvert::new();
    let input = cmd.input(SVG);
    let output = cmd.output();

    cmd.cmd
        .arg("-b")
        .arg("not-a-color")
        .arg(input)
        .arg(output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("can not be parsed as a CSS color value"));
}

#[test]
fn invalid_zoom_factor() {
    let mut cmd = RsvgConvert::new();
    let input = cmd.input(SVG);
    let output = cmd.output();

    cmd.cmd
        .arg("-x")
        .arg("-1")
        .arg(input)
        .arg(output)
        .assert()
        .failure();
}

#[test]
fn missing_input_fails() {
    let mut cmd = RsvgConvert::new();
    let input = cmd.dir.path().join("nonexistent.svg");
    let output = cmd.output();

    cmd.cmd
        .arg(&input)
        .arg(&output)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("could not read"));

    assert!(!output.exists());
}

#[test]
fn non_svg_input_fails() {
    let mut cmd = RsvgConvert::new();
    let input = cmd.input("<html/>");
    let output = cmd.output();

    cmd.cmd.arg(input).arg(output).assert().code(1);
}

#[test]
fn version() {
    let expected = predicate::str::starts_with("rsvg-convert ");
    RsvgConvert::new()
        .cmd
        .arg("-v")
        .assert()
        .success()
        .stdout(expected.clone());
    RsvgConvert::new()
        .cmd
        .arg("--version")
        .assert()
        .success()
        .stdout(expected);
}

#[test]
fn help() {
    RsvgConvert::new()
        .cmd
        .arg("-?")
        .assert()
        .success()
        .stdout(predicate::str::contains("--keep-aspect-ratio"));
}
