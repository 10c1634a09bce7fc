use super::{Fp8, E4M3};
use std::fmt;

/// E4M3 "fnuz": bias 8, no negative zero, single NaN at `0x80`, max 240.
///
/// The quantizer maps scales onto 224 rather than the encoding limit.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct F8E4M3Fnuz(u8);

const ENCODING: E4M3 = E4M3 {
    bias: 8,
    max: 0x7f,
};

impl F8E4M3Fnuz {
    pub const MAX: Self = Self(0x7f);
    pub const NAN: Self = Self(0x80);

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
        self.0 == 0x80
    }
}

impl Fp8 for F8E4M3Fnuz {
    const FORMAT_MAX: f32 = 224.;
    const ZERO: Self = Self(0);

    fn from_f32(x: f32) -> Self {
        if x.is_nan() {
            return Self::NAN;
        }
        match ENCODING.encode_abs(x.abs()) {
            0 => Self::ZERO,
            code if x.is_sign_negative() => Self(code | 0x80),
            code => Self(code),
        }
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

impl fmt::Debug for F8E4M3Fnuz {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "F8E4M3Fnuz({:#04x} = {})", self.0, self.to_f32())
    }
}

impl fmt::Display for F8E4M3Fnuz {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.to_f32(), f)
    }
}

#[test]
fn test_encode() {
    let enc = |x: f32| F8E4M3Fnuz::from_f32(x).to_bits();

    assert_eq!(enc(0.), 0x00);
    assert_eq!(enc(-0.), 0x00);
    assert_eq!(enc(-1e-9), 0x00);
    assert_eq!(enc(1.), 0x40);
    assert_eq!(enc(-1.), 0xc0);
    assert_eq!(enc(224.), 0x7e);
    assert_eq!(enc(240.), 0x7f);
    assert_eq!(enc(f32::powi(2., -7)), 0x08);
    assert_eq!(enc(f32::powi(2., -10)), 0x01);
    assert_eq!(enc(1.0625), 0x40);
    assert_eq!(enc(1.1875), 0x42);
}

#[test]
fn test_saturate() {
    assert_eq!(F8E4M3Fnuz::from_f32(250.), F8E4M3Fnuz::MAX);
    assert_eq!(F8E4M3Fnuz::from_f32(-1e9).to_bits(), 0xff);
    assert_eq!(F8E4M3Fnuz::from_f32(f32::NAN), F8E4M3Fnuz::NAN);
    assert!(F8E4M3Fnuz::NAN.to_f32().is_nan());
}

#[test]
fn test_all_codes() {
    let mut last = -1.;
    for bits in 0..=0x7f_u8 {
        let x = F8E4M3Fnuz::from_bits(bits);
        let val = x.to_f32();
        assert!(val > last, "{x:?}");
        assert_eq!(F8E4M3Fnuz::from_f32(val), x);
        if bits != 0 {
            assert_eq!(F8E4M3Fnuz::from_f32(-val).to_bits(), bits | 0x80);
        }
        last = val;
    }
    assert_eq!(last, 240.);
}
