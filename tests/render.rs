//! Rendering semantics, checked by sampling pixels of the output.

use std::rc::Rc;

use rsvg::{
    BinaryData, FontDescription, GlyphRun, Handle, IoError, Pixbuf, Rect, ResourceLoader,
    TextLayout,
};

const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];
const BLACK: [u8; 4] = [0, 0, 0, 255];
const RED: [u8; 4] = [255, 0, 0, 255];
const GREEN: [u8; 4] = [0, 255, 0, 255];
const BLUE: [u8; 4] = [0, 0, 255, 255];

fn render_with(mut handle: Handle, svg: &str) -> Pixbuf {
    handle.write(svg.as_bytes()).unwrap();
    handle.close().unwrap();
    handle.get_output().unwrap()
}

fn render(svg: &str) -> Pixbuf {
    render_with(Handle::new(), svg)
}

#[test]
fn stroke_is_centered_on_outline() {
    let pixbuf = render(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="40">
  <rect x="10" y="10" width="20" height="20" fill="none" stroke="#ff0000" stroke-width="4"/>
</svg>"##,
    );

    assert_eq!(pixbuf.get_pixel(9, 20), RED);
    assert_eq!(pixbuf.get_pixel(10, 20), RED);
    assert_eq!(pixbuf.get_pixel(20, 20), TRANSPARENT);
    assert_eq!(pixbuf.get_pixel(5, 20), TRANSPARENT);
}

#[test]
fn dashes_alternate_along_the_path() {
    let pixbuf = render(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="10">
  <line x1="0" y1="5" x2="40" y2="5" stroke="#0000ff" stroke-width="4" stroke-dasharray="10"/>
</svg>"##,
    );

    assert_eq!(pixbuf.get_pixel(5, 5), BLUE);
    assert_eq!(pixbuf.get_pixel(15, 5), TRANSPARENT);
    assert_eq!(pixbuf.get_pixel(25, 5), BLUE);
}

#[test]
fn fill_opacity_scales_alpha() {
    let pixbuf = render(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10">
  <rect width="10" height="10" fill="#0000ff" fill-opacity="0.5"/>
</svg>"##,
    );

    assert_eq!(pixbuf.get_pixel(5, 5), [0, 0, 255, 128]);
}

#[test]
fn hidden_elements_are_not_drawn() {
    let pixbuf = render(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="30" height="10">
  <rect width="10" height="10" visibility="hidden"/>
  <g display="none"><rect x="10" width="10" height="10"/></g>
  <rect x="20" width="10" height="10"/>
</svg>"##,
    );

    assert_eq!(pixbuf.get_pixel(5, 5), TRANSPARENT);
    assert_eq!(pixbuf.get_pixel(15, 5), TRANSPARENT);
    assert_eq!(pixbuf.get_pixel(25, 5), BLACK);
}

#[test]
fn stylesheet_rules_cascade_by_specificity() {
    let pixbuf = render(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="30" height="10">
  <style type="text/css"><![CDATA[
    /* rules */
    rect { fill: #0000ff; }
    .warm { fill: #ff0000; }
    #special { fill: #00ff00; }
  ]]></style>
  <rect width="10" height="10"/>
  <rect x="10" width="10" height="10" class="warm"/>
  <rect x="20" width="10" height="10" class="warm" id="special"/>
</svg>"##,
    );

    assert_eq!(pixbuf.get_pixel(5, 5), BLUE);
    assert_eq!(pixbuf.get_pixel(15, 5), RED);
    assert_eq!(pixbuf.get_pixel(25, 5), GREEN);
}

#[test]
fn use_translates_referenced_element() {
    let pixbuf = render(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="10">
  <defs>
    <rect id="r" width="10" height="10" fill="#ff0000"/>
  </defs>
  <use href="#r" x="20"/>
</svg>"##,
    );

    assert_eq!(pixbuf.get_pixel(5, 5), TRANSPARENT);
    assert_eq!(pixbuf.get_pixel(25, 5), RED);
}

#[test]
fn circular_use_is_skipped() {
    let pixbuf = render(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="20" height="10">
  <g id="a">
    <use href="#a"/>
  </g>
  <rect x="10" width="10" height="10"/>
</svg>"##,
    );

    assert_eq!(pixbuf.get_pixel(15, 5), BLACK);
}

#[test]
fn nested_svg_clips_to_its_viewport() {
    let pixbuf = render(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="40">
  <svg x="10" y="10" width="10" height="10">
    <rect width="100" height="100"/>
  </svg>
</svg>"##,
    );

    assert_eq!(pixbuf.get_pixel(5, 5), TRANSPARENT);
    assert_eq!(pixbuf.get_pixel(15, 15), BLACK);
    assert_eq!(pixbuf.get_pixel(25, 25), TRANSPARENT);
}

#[test]
fn switch_picks_first_matching_language() {
    let svg = r##"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10">
  <switch>
    <rect width="10" height="10" systemLanguage="fr" fill="#ff0000"/>
    <rect width="10" height="10" fill="#0000ff"/>
  </switch>
</svg>"##;

    assert_eq!(render(svg).get_pixel(5, 5), BLUE);

    let mut handle = Handle::new();
    handle.set_user_languages(vec![String::from("fr")]);
    assert_eq!(render_with(handle, svg).get_pixel(5, 5), RED);
}

#[test]
fn clip_path_limits_drawing() {
    let pixbuf = render(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="10">
  <defs>
    <clipPath id="c">
      <rect width="20" height="10"/>
    </clipPath>
  </defs>
  <rect width="40" height="10" fill="#00ff00" clip-path="url(#c)"/>
</svg>"##,
    );

    assert_eq!(pixbuf.get_pixel(10, 5), GREEN);
    assert_eq!(pixbuf.get_pixel(30, 5), TRANSPARENT);
}

#[test]
fn mask_uses_luminance() {
    let pixbuf = render(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="10">
  <defs>
    <mask id="m">
      <rect width="20" height="10" fill="#ffffff"/>
      <rect x="20" width="20" height="10" fill="#000000"/>
    </mask>
  </defs>
  <rect width="40" height="10" fill="#0000ff" mask="url(#m)"/>
</svg>"##,
    );

    assert_eq!(pixbuf.get_pixel(10, 5), BLUE);
    assert_eq!(pixbuf.get_pixel(30, 5), TRANSPARENT);
}

#[test]
fn pattern_tiles_its_content() {
    let pixbuf = render(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="20" height="20">
  <defs>
    <pattern id="p" patternUnits="userSpaceOnUse" width="10" height="10">
      <rect width="5" height="5" fill="#ff0000"/>
    </pattern>
  </defs>
  <rect width="20" height="20" fill="url(#p)"/>
</svg>"##,
    );

    assert_eq!(pixbuf.get_pixel(2, 2), RED);
    assert_eq!(pixbuf.get_pixel(7, 7), TRANSPARENT);
    assert_eq!(pixbuf.get_pixel(12, 12), RED);
    assert_eq!(pixbuf.get_pixel(17, 2), TRANSPARENT);
}

#[test]
fn single_stop_gradient_is_solid() {
    let pixbuf = render(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="20" height="10">
  <defs>
    <linearGradient id="one"><stop offset="0.3" stop-color="#00ff00"/></linearGradient>
    <linearGradient id="none"/>
  </defs>
  <rect width="10" height="10" fill="url(#one)"/>
  <rect x="10" width="10" height="10" fill="url(#none)"/>
</svg>"##,
    );

    assert_eq!(pixbuf.get_pixel(1, 5), GREEN);
    assert_eq!(pixbuf.get_pixel(8, 5), GREEN);
    assert_eq!(pixbuf.get_pixel(15, 5), TRANSPARENT);
}

#[test]
fn markers_are_placed_at_vertices() {
    let pixbuf = render(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="40">
  <defs>
    <marker id="m" markerUnits="userSpaceOnUse" markerWidth="10" markerHeight="10"
            refX="5" refY="5">
      <rect width="10" height="10" fill="#0000ff"/>
    </marker>
  </defs>
  <path d="M 20 20 L 80 20" fill="none" marker-start="url(#m)"/>
</svg>"##,
    );

    assert_eq!(pixbuf.get_pixel(20, 20), BLUE);
    assert_eq!(pixbuf.get_pixel(80, 20), TRANSPARENT);
}

#[test]
fn flood_fills_filter_region() {
    let pixbuf = render(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="50" height="50">
  <defs>
    <filter id="f" filterUnits="userSpaceOnUse" x="0" y="0" width="40" height="40">
      <feFlood flood-color="#00ff00"/>
    </filter>
  </defs>
  <rect width="10" height="10" filter="url(#f)"/>
</svg>"##,
    );

    assert_eq!(pixbuf.get_pixel(30, 30), GREEN);
    assert_eq!(pixbuf.get_pixel(45, 45), TRANSPARENT);
}

#[test]
fn offset_moves_source_graphic() {
    let pixbuf = render(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="10">
  <defs>
    <filter id="f" filterUnits="userSpaceOnUse" x="0" y="0" width="40" height="10">
      <feOffset dx="20"/>
    </filter>
  </defs>
  <rect width="10" height="10" filter="url(#f)"/>
</svg>"##,
    );

    assert_eq!(pixbuf.get_pixel(5, 5), TRANSPARENT);
    assert_eq!(pixbuf.get_pixel(25, 5), BLACK);
}

#[test]
fn invalid_filter_reference_renders_unfiltered() {
    let pixbuf = render(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="20" height="10">
  <defs>
    <linearGradient id="g"/>
  </defs>
  <rect width="10" height="10" fill="#ff0000" filter="url(#nonexistent)"/>
  <rect x="10" width="10" height="10" fill="#ff0000" filter="url(#g)"/>
</svg>"##,
    );

    assert_eq!(pixbuf.get_pixel(5, 5), RED);
    assert_eq!(pixbuf.get_pixel(15, 5), RED);
}

#[test]
fn blur_softens_edges() {
    let pixbuf = render(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="60" height="60">
  <defs>
    <filter id="f" filterUnits="userSpaceOnUse" x="0" y="0" width="60" height="60">
      <feGaussianBlur stdDeviation="4"/>
    </filter>
  </defs>
  <rect x="20" y="20" width="20" height="20" filter="url(#f)"/>
</svg>"##,
    );

    let center = pixbuf.get_pixel(30, 30);
    let edge = pixbuf.get_pixel(20, 30);
    let outside = pixbuf.get_pixel(17, 30);

    assert!(center[3] > 240);
    assert!(edge[3] > 64 && edge[3] < 192);
    assert!(outside[3] > 0 && outside[3] < edge[3]);
    assert_eq!(pixbuf.get_pixel(2, 2), TRANSPARENT);
}

/// Lays out every character as a solid square of the font size, half as wide.
struct BlockLayout;

impl TextLayout for BlockLayout {
    fn layout(&self, text: &str, font: &FontDescription, scale: f64) -> Option<GlyphRun> {
        let width = text.chars().count() as f64 * font.size / 2.0;
        let height = font.size;

        let bitmap_width = (width * scale).ceil() as u32;
        let bitmap_height = (height * scale).ceil() as u32;

        Some(GlyphRun {
            width: bitmap_width,
            height: bitmap_height,
            coverage: vec![255; (bitmap_width * bitmap_height) as usize],
            ink_rect: Rect::new(0.0, -height, width, 0.0),
            advance: width,
        })
    }
}

#[test]
fn text_is_drawn_through_layout_service() {
    let svg = r##"<svg xmlns="http://www.w3.org/2000/svg" width="60" height="40">
  <text x="10" y="30" font-size="20">ab</text>
  <text x="40" y="30" font-size="20" text-anchor="middle" fill="#ff0000">  c  </text>
</svg>"##;

    let mut handle = Handle::new();
    handle.set_text_layout(Rc::new(BlockLayout));
    let pixbuf = render_with(handle, svg);

    assert_eq!(pixbuf.get_pixel(15, 20), BLACK);
    assert_eq!(pixbuf.get_pixel(25, 20), BLACK);
    assert_eq!(pixbuf.get_pixel(15, 5), TRANSPARENT);
    assert_eq!(pixbuf.get_pixel(33, 20), TRANSPARENT);

    assert_eq!(pixbuf.get_pixel(37, 20), RED);
    assert_eq!(pixbuf.get_pixel(43, 20), RED);
    assert_eq!(pixbuf.get_pixel(47, 20), TRANSPARENT);
}

#[test]
fn text_without_layout_service_is_skipped() {
    let pixbuf = render(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="40">
  <text x="10" y="30" font-size="20">ab</text>
</svg>"##,
    );

    assert_eq!(pixbuf.get_pixel(15, 20), TRANSPARENT);
}

/// Serves a 2×2 green PNG for any `href`.
struct GreenImage;

impl ResourceLoader for GreenImage {
    fn load(&self, _href: &str) -> Result<BinaryData, IoError> {
        let mut data = Vec::new();

        {
            let mut encoder = png::Encoder::new(&mut data, 2, 2);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);

            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(&[0, 255, 0, 255].repeat(4)).unwrap();
        }

        Ok(BinaryData {
            data,
            content_type: Some(String::from("image/png")),
        })
    }
}

#[test]
fn image_is_scaled_into_its_rectangle() {
    let mut handle = Handle::new();
    handle.set_resource_loader(Rc::new(GreenImage));

    let pixbuf = render_with(
        handle,
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="40" height="40">
  <image x="10" y="10" width="20" height="20" href="green.png"/>
</svg>"##,
    );

    assert_eq!(pixbuf.get_pixel(20, 20), GREEN);
    assert_eq!(pixbuf.get_pixel(5, 5), TRANSPARENT);
    assert_eq!(pixbuf.get_pixel(35, 35), TRANSPARENT);
}
