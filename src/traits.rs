//! Small math traits shared across modules

/// Linear interpolation between two values of the same type.
///
/// `t` is expected in `[0, 1]`; implementations do not clamp.
pub trait Lerp {
    fn lerp(&self, other: &Self, t: f64) -> Self;
}

impl Lerp for f64 {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        self + (other - self) * t
    }
}

impl Lerp for u8 {
    fn lerp(&self, other: &Self, t: f64) -> Self {
        f64::from(*self).lerp(&f64::from(*other), t).round().clamp(0.0, 255.0) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lerp_endpoints() {
        assert_eq!(2.0_f64.lerp(&4.0, 0.0), 2.0);
        assert_eq!(2.0_f64.lerp(&4.0, 1.0), 4.0);
        assert_eq!(0_u8.lerp(&255, 0.5), 128);
        assert_eq!(200_u8.lerp(&10, 1.0), 10);
    }
}
