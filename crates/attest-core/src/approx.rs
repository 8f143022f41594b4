//! Tolerance-aware numeric comparison
//!
//! `near` comparisons pick their epsilon from the less precise of the two
//! operand types: half the mantissa width, so `f64` compares at 2^-26 and
//! `f32` at 2^-12. Exact integer operands adopt the float side's epsilon;
//! two integers compare exactly. The scaling constant is a knob, not a
//! constant of nature, so [`Near`] exposes both fields.

use std::fmt;

/// Comparison epsilon for `f64` operands (2^-26)
pub const F64_EPSILON: f64 = 1.0 / (1u64 << 26) as f64;
/// Comparison epsilon for `f32` operands (2^-12)
pub const F32_EPSILON: f64 = 1.0 / (1u64 << 12) as f64;

/// Numeric operand of a tolerance comparison
pub trait Approx: Copy + fmt::Display {
    /// Type-level epsilon, `None` for exactly-represented types
    const EPSILON: Option<f64>;

    /// Numeric view used by the comparison formulas
    fn approx_value(self) -> f64;
}

impl Approx for f64 {
    const EPSILON: Option<f64> = Some(F64_EPSILON);
    fn approx_value(self) -> f64 {
        self
    }
}

impl Approx for f32 {
    const EPSILON: Option<f64> = Some(F32_EPSILON);
    fn approx_value(self) -> f64 {
        self as f64
    }
}

impl Approx for i8 {
    const EPSILON: Option<f64> = None;
    fn approx_value(self) -> f64 {
        self as f64
    }
}

impl Approx for i16 {
    const EPSILON: Option<f64> = None;
    fn approx_value(self) -> f64 {
        self as f64
    }
}

impl Approx for i32 {
    const EPSILON: Option<f64> = None;
    fn approx_value(self) -> f64 {
        self as f64
    }
}

impl Approx for i64 {
    const EPSILON: Option<f64> = None;
    fn approx_value(self) -> f64 {
        self as f64
    }
}

impl Approx for isize {
    const EPSILON: Option<f64> = None;
    fn approx_value(self) -> f64 {
        self as f64
    }
}

impl Approx for u8 {
    const EPSILON: Option<f64> = None;
    fn approx_value(self) -> f64 {
        self as f64
    }
}

impl Approx for u16 {
    const EPSILON: Option<f64> = None;
    fn approx_value(self) -> f64 {
        self as f64
    }
}

impl Approx for u32 {
    const EPSILON: Option<f64> = None;
    fn approx_value(self) -> f64 {
        self as f64
    }
}

impl Approx for u64 {
    const EPSILON: Option<f64> = None;
    fn approx_value(self) -> f64 {
        self as f64
    }
}

impl Approx for usize {
    const EPSILON: Option<f64> = None;
    fn approx_value(self) -> f64 {
        self as f64
    }
}

/// Configured approximate-equality comparison
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Near {
    /// Absolute epsilon before magnitude scaling
    pub epsilon: f64,
    /// Additive term in the magnitude scale
    pub scale: f64,
}

impl Near {
    /// Comparison for the operand pair, using the less precise epsilon
    pub fn of<L: Approx, R: Approx>() -> Self {
        let epsilon = match (L::EPSILON, R::EPSILON) {
            (Some(l), Some(r)) => l.max(r),
            (Some(e), None) | (None, Some(e)) => e,
            (None, None) => 0.0,
        };
        Near {
            epsilon,
            scale: 1.0,
        }
    }

    /// Comparison with an explicit epsilon and the default scale
    pub fn with_epsilon(epsilon: f64) -> Self {
        Near {
            epsilon,
            scale: 1.0,
        }
    }

    /// Whether the operands compare approximately equal
    ///
    /// Exact equality short-circuits, which is what makes equal
    /// infinities compare equal.
    pub fn accepts(self, l: f64, r: f64) -> bool {
        if l == r {
            return true;
        }
        (l - r).abs() < self.epsilon * (self.scale + l.abs().max(r.abs()))
    }
}

/// Absolute-tolerance comparison: `l == r` or `max(l-r, r-l) < tolerance`
pub fn within(tolerance: f64, l: f64, r: f64) -> bool {
    if l == r {
        return true;
    }
    let a = l - r;
    let b = r - l;
    (if a < b { b } else { a }) < tolerance
}

/// Relative-tolerance comparison against `(l-r)/r` and `(r-l)/l`
pub fn within_log(tolerance: f64, l: f64, r: f64) -> bool {
    if l == r {
        return true;
    }
    let a = (l - r) / r;
    let b = (r - l) / l;
    (if a < b { b } else { a }) < tolerance
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epsilon_picks_the_less_precise_side() {
        assert_eq!(Near::of::<f64, f64>().epsilon, F64_EPSILON);
        assert_eq!(Near::of::<f32, f64>().epsilon, F32_EPSILON);
        assert_eq!(Near::of::<i64, f64>().epsilon, F64_EPSILON);
        assert_eq!(Near::of::<i32, i64>().epsilon, 0.0);
    }

    #[test]
    fn near_short_circuits_exact_matches() {
        let near = Near::of::<f64, f64>();
        assert!(near.accepts(f64::INFINITY, f64::INFINITY));
        assert!(near.accepts(0.0, 0.0));
        assert!(!near.accepts(f64::INFINITY, f64::NEG_INFINITY));
    }

    #[test]
    fn near_scales_with_magnitude() {
        let near = Near::of::<f64, f64>();
        assert!(near.accepts(1.0, 1.0 + 1e-9));
        assert!(!near.accepts(1.0, 1.0 + 1e-6));
        assert!(near.accepts(1e9, 1e9 + 1.0));
    }

    #[test]
    fn integer_operands_compare_exactly() {
        let near = Near::of::<i64, i64>();
        assert!(near.accepts(5.0, 5.0));
        assert!(!near.accepts(5.0, 6.0));
    }

    #[test]
    fn within_uses_the_larger_difference() {
        assert!(within(0.5, 1.0, 1.2));
        assert!(!within(0.1, 1.0, 1.2));
        assert!(within(0.0, 3.0, 3.0));
        assert!(!within(0.0, 3.0, 3.0000001));
    }

    #[test]
    fn within_log_is_relative() {
        assert!(within_log(0.02, 100.0, 101.0));
        assert!(!within_log(0.005, 100.0, 101.0));
        assert!(within_log(0.0, 7.0, 7.0));
    }

    #[test]
    fn nan_never_compares_near() {
        let near = Near::of::<f64, f64>();
        assert!(!near.accepts(f64::NAN, f64::NAN));
        assert!(!within(1.0, f64::NAN, 0.0));
    }
}
