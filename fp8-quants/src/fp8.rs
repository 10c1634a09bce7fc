//! 8-bit floating-point encodings written by the quantizer.
//!
//! Both encodings are 1-4-3 (sign, exponent, mantissa) without infinities.
//! They differ in exponent bias, NaN code and negative zero, and each
//! accelerator family defines its own. The conversion is a strategy picked
//! by type: kernels are generic over [`Fp8`], and [`NativeFp8`] fixes the
//! encoding of the build target.

mod e4m3fn;
mod e4m3fnuz;

pub use e4m3fn::F8E4M3Fn;
pub use e4m3fnuz::F8E4M3Fnuz;

/// Encoding of the build target.
#[cfg(not(feature = "fnuz"))]
pub type NativeFp8 = F8E4M3Fn;
/// Encoding of the build target.
#[cfg(feature = "fnuz")]
pub type NativeFp8 = F8E4M3Fnuz;

/// A narrow floating-point element.
pub trait Fp8: Copy + Send + Sync + 'static {
    /// Scaled values are clamped into `[-FORMAT_MAX, FORMAT_MAX]`.
    const FORMAT_MAX: f32;
    const ZERO: Self;

    /// Round-to-nearest-even conversion, saturating to the largest finite
    /// value. NaN maps to the encoding's NaN.
    fn from_f32(x: f32) -> Self;
    fn to_f32(self) -> f32;
}

/// Magnitude layout of a 1-4-3 encoding.
///
/// Positive codes `0..=max` are ordered by value, so a mantissa carry while
/// rounding moves into the next binade by plain integer increment, and the
/// subnormal range rolls into the first normal binade the same way.
struct E4M3 {
    bias: i32,
    max: u8,
}

impl E4M3 {
    const MANTISSA: u32 = 3;
    const SHIFT: u32 = 23 - Self::MANTISSA;

    /// `a` must be non-negative and not NaN.
    fn encode_abs(&self, a: f32) -> u8 {
        let bits = a.to_bits();
        let exp = (bits >> 23) as i32 - 127;

        let code = if exp < 1 - self.bias {
            // subnormal, multiples of 2^(1 - bias - 3)
            let q = a * f32::powi(2., self.bias - 1 + Self::MANTISSA as i32);
            q.round_ties_even() as u32
        } else {
            let biased = (exp + self.bias) as u32;
            if biased > 15 {
                return self.max;
            }
            let mantissa = bits & 0x7f_ffff;
            let rem = mantissa & ((1 << Self::SHIFT) - 1);
            let half = 1 << (Self::SHIFT - 1);

            let mut code = biased << Self::MANTISSA | mantissa >> Self::SHIFT;
            if rem > half || (rem == half && code & 1 == 1) {
                code += 1;
            }
            code
        };
        code.min(self.max as u32) as u8
    }

    fn decode_abs(&self, code: u8) -> f32 {
        let exp = (code >> Self::MANTISSA) as i32;
        let man = (code & 0b111) as f32;
        if exp == 0 {
            man * f32::powi(2., 1 - self.bias - Self::MANTISSA as i32)
        } else {
            (1. + man / 8.) * f32::powi(2., exp - self.bias)
        }
    }
}

#[test]
fn test_native_format() {
    #[cfg(not(feature = "fnuz"))]
    assert_eq!(NativeFp8::FORMAT_MAX, 448.);
    #[cfg(feature = "fnuz")]
    assert_eq!(NativeFp8::FORMAT_MAX, 224.);
}
