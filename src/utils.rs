pub fn multiple_of(mut value: u32, multiple: u32) -> u32 {
    let remainder = value % multiple;
    if remainder != 0 {
        value += multiple - remainder;
    }

    value
}

/// Converts one sRGB-encoded channel to linear light, for surfaces whose
/// format applies the sRGB curve on write.
pub fn srgb_to_linear(channel: f32) -> f32 {
    if channel <= 0.04045 {
        channel / 12.92
    } else {
        ((channel + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_up_to_multiple() {
        assert_eq!(multiple_of(0, 64), 0);
        assert_eq!(multiple_of(1, 64), 64);
        assert_eq!(multiple_of(64, 64), 64);
        assert_eq!(multiple_of(65, 64), 128);
    }

    #[test]
    fn srgb_endpoints() {
        assert_eq!(srgb_to_linear(0.0), 0.0);
        assert!((srgb_to_linear(1.0) - 1.0).abs() < 1e-6);
        assert!(srgb_to_linear(0.5) < 0.5);
    }
}
