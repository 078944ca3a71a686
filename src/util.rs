//! Miscellaneous utilities.

pub fn clamp<T: PartialOrd>(val: T, low: T, high: T) -> T {
    if val < low {
        low
    } else if val > high {
        high
    } else {
        val
    }
}

#[macro_export]
macro_rules! enum_default {
    ($name:ident, $default:expr) => {
        impl Default for $name {
            #[inline]
            fn default() -> $name {
                $default
            }
        }
    };
}

/// Converts an opacity in `[0.0, 1.0]` to the `0..=255` integer scale used everywhere in
/// the compositor.
pub fn opacity_to_u8(v: f64) -> u8 {
    (clamp(v, 0.0, 1.0) * 255.0 + 0.5).floor() as u8
}

/// Computes `round(a * b / 255)` exactly for 8-bit values.
///
/// This is the usual `t = a * b + 0x80; (t + (t >> 8)) >> 8` trick.
#[inline]
pub fn mul_div_255(a: u8, b: u8) -> u8 {
    let t = u32::from(a) * u32::from(b) + 0x80;
    ((t + (t >> 8)) >> 8) as u8
}

/// Rounds a floating-point size to the nearest integer the way the size negotiation does.
pub fn round_size(x: f64) -> i32 {
    (x + 0.5).floor() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_div_255_is_exact() {
        for a in 0..=255u32 {
            for b in 0..=255u32 {
                let expected = ((a * b) as f64 / 255.0).round() as u8;
                assert_eq!(mul_div_255(a as u8, b as u8), expected, "{} * {}", a, b);
            }
        }
    }

    #[test]
    fn mul_div_255_identities() {
        assert_eq!(mul_div_255(255, 255), 255);
        assert_eq!(mul_div_255(200, 255), 200);
        assert_eq!(mul_div_255(200, 0), 0);
    }

    #[test]
    fn opacity_conversion() {
        assert_eq!(opacity_to_u8(1.0), 255);
        assert_eq!(opacity_to_u8(0.0), 0);
        assert_eq!(opacity_to_u8(0.5), 128);
        assert_eq!(opacity_to_u8(7.0), 255);
        assert_eq!(opacity_to_u8(-1.0), 0);
    }

    #[test]
    fn rounds_sizes_half_up() {
        assert_eq!(round_size(99.5), 100);
        assert_eq!(round_size(99.49), 99);
        assert_eq!(round_size(0.0), 0);
    }
}
