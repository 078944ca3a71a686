//! Ways of choosing the output size of a document from its natural size.
//!
//! These are the computations behind the `pixbuf_from_file_at_*` family of functions.  All
//! of them take the natural size in pixels, which is `-1` for a dimension that the
//! document does not specify.

use crate::util::round_size;

/// How to compute the size of the output.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum SizeMode {
    /// Scale the natural size by a factor in each direction.
    Zoom { x: f64, y: f64 },

    /// Use a fixed size.  A dimension of `-1` means "use the natural one".
    Size { width: i32, height: i32 },

    /// Zoom, but shrink the result uniformly to fit within a maximum size.
    ZoomMax {
        x: f64,
        y: f64,
        max_width: i32,
        max_height: i32,
    },

    /// Shrink the natural size uniformly to fit within a maximum size; never enlarge it.
    MaxSize { max_width: i32, max_height: i32 },
}

impl SizeMode {
    /// Computes the output size for a document of natural size `width`×`height`.
    pub fn compute(&self, width: i32, height: i32) -> (i32, i32) {
        if let SizeMode::Size {
            width: w,
            height: h,
        } = *self
        {
            let width = if w != -1 { w } else { width };
            let height = if h != -1 { h } else { height };
            return (width, height);
        }

        if width < 0 || height < 0 {
            return (width, height);
        }

        let (width, height) = (f64::from(width), f64::from(height));

        match *self {
            SizeMode::Zoom { x, y } => (round_size(width * x), round_size(height * y)),

            SizeMode::ZoomMax {
                x,
                y,
                max_width,
                max_height,
            } => {
                let mut zoomed_width = width * x;
                let mut zoomed_height = height * y;

                if zoomed_width > f64::from(max_width) || zoomed_height > f64::from(max_height) {
                    let zoom = f64::min(
                        f64::from(max_width) / zoomed_width,
                        f64::from(max_height) / zoomed_height,
                    );

                    zoomed_width *= zoom;
                    zoomed_height *= zoom;
                }

                (round_size(zoomed_width), round_size(zoomed_height))
            }

            SizeMode::MaxSize {
                max_width,
                max_height,
            } => {
                let zoom = f64::min(
                    f64::min(f64::from(max_width) / width, f64::from(max_height) / height),
                    1.0,
                );

                (round_size(width * zoom), round_size(height * zoom))
            }

            SizeMode::Size { .. } => unreachable!(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_rounds_half_up() {
        assert_eq!(SizeMode::Zoom { x: 2.0, y: 0.5 }.compute(100, 50), (200, 25));
        assert_eq!(SizeMode::Zoom { x: 1.5, y: 1.5 }.compute(3, 5), (5, 8));
    }

    #[test]
    fn fixed_size_replaces_only_given_dimensions() {
        assert_eq!(
            SizeMode::Size {
                width: 30,
                height: -1
            }
            .compute(100, 50),
            (30, 50)
        );

        assert_eq!(
            SizeMode::Size {
                width: -1,
                height: -1
            }
            .compute(100, 50),
            (100, 50)
        );

        assert_eq!(
            SizeMode::Size {
                width: 10,
                height: 20
            }
            .compute(-1, -1),
            (10, 20)
        );
    }

    #[test]
    fn zoom_max_shrinks_uniformly() {
        let mode = SizeMode::ZoomMax {
            x: 2.0,
            y: 2.0,
            max_width: 100,
            max_height: 300,
        };

        assert_eq!(mode.compute(100, 50), (100, 50));
        assert_eq!(mode.compute(40, 20), (80, 40));
    }

    #[test]
    fn max_size_never_enlarges() {
        let mode = SizeMode::MaxSize {
            max_width: 50,
            max_height: 50,
        };

        assert_eq!(mode.compute(100, 200), (25, 50));
        assert_eq!(mode.compute(10, 20), (10, 20));
    }

    #[test]
    fn unknown_natural_size_is_unchanged() {
        assert_eq!(SizeMode::Zoom { x: 2.0, y: 2.0 }.compute(-1, 10), (-1, 10));

        let mode = SizeMode::MaxSize {
            max_width: 5,
            max_height: 5,
        };
        assert_eq!(mode.compute(10, -1), (10, -1));
    }
}
