use super::{Fp8, E4M3};
use std::fmt;

/// OCP E4M3 ("fn"): bias 7, signed zero, NaN at `S.1111.111`, max 448.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct F8E4M3Fn(u8);

const ENCODING: E4M3 = E4M3 {
    bias: 7,
    max: 0x7e,
};

impl F8E4M3Fn {
    pub const MAX: Self = Self(0x7e);
    pub const NAN: Self = Self(0x7f);

    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    #[inline]
    pub const fn to_bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn is_nan(self) -> bool {
        self.0 & 0x7f == 0x7f
    }
}

impl Fp8 for F8E4M3Fn {
    const FORMAT_MAX: f32 = 448.;
    const ZERO: Self = Self(0);

    fn from_f32(x: f32) -> Self {
        if x.is_nan() {
            return Self::NAN;
        }
        let code = ENCODING.encode_abs(x.abs());
        Self(if x.is_sign_negative() { code | 0x80 } else { code })
    }

    fn to_f32(self) -> f32 {
        if self.is_nan() {
            return f32::NAN;
        }
        let abs = ENCODING.decode_abs(self.0 & 0x7f);
        if self.0 & 0x80 != 0 {
            -abs
        } else {
            abs
        }
    }
}

impl fmt::Debug for F8E4M3Fn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "F8E4M3Fn({:#04x} = {})", self.0, self.to_f32())
    }
}

impl fmt::Display for F8E4M3Fn {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.to_f32(), f)
    }
}

#[test]
fn test_encode() {
    let enc = |x: f32| F8E4M3Fn::from_f32(x).to_bits();

    assert_eq!(enc(0.), 0x00);
    assert_eq!(enc(-0.), 0x80);
    assert_eq!(enc(1.), 0x38);
    assert_eq!(enc(-2.), 0xc0);
    assert_eq!(enc(448.), 0x7e);
    assert_eq!(enc(-448.), 0xfe);
    assert_eq!(enc(f32::powi(2., -6)), 0x08);
    assert_eq!(enc(f32::powi(2., -9)), 0x01);
    // ties go to the even code
    assert_eq!(enc(1.0625), 0x38);
    assert_eq!(enc(1.1875), 0x3a);
    assert_eq!(enc(1.07), 0x39);
    // largest subnormal rounds into the first normal binade
    assert_eq!(enc(0.0152), 0x08);
    // below half the smallest subnormal
    assert_eq!(enc(f32::powi(2., -11)), 0x00);
}

#[test]
fn test_saturate() {
    assert_eq!(F8E4M3Fn::from_f32(464.), F8E4M3Fn::MAX);
    assert_eq!(F8E4M3Fn::from_f32(1e9), F8E4M3Fn::MAX);
    assert_eq!(F8E4M3Fn::from_f32(f32::INFINITY), F8E4M3Fn::MAX);
    assert_eq!(F8E4M3Fn::from_f32(f32::NEG_INFINITY).to_bits(), 0xfe);
    assert!(F8E4M3Fn::from_f32(f32::NAN).is_nan());
    assert!(F8E4M3Fn::NAN.to_f32().is_nan());
}

#[test]
fn test_all_codes() {
    let mut last = -1.;
    for bits in 0..0x7f_u8 {
        let x = F8E4M3Fn::from_bits(bits);
        let val = x.to_f32();
        assert!(val > last, "{x:?}");
        assert_eq!(F8E4M3Fn::from_f32(val), x);
        assert_eq!(F8E4M3Fn::from_f32(-val).to_bits(), bits | 0x80);
        last = val;
    }
    assert_eq!(last, F8E4M3Fn::FORMAT_MAX);
}
