use crate::{bail, XtaskError};
use fp8_quants::{bf16, f16, F8E4M3Fn, F8E4M3Fnuz, Fp8, NativeFp8};
use std::{any::TypeId, fmt, str::FromStr};

/// Element type of a raw input tensor.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum DType {
    F32,
    F16,
    BF16,
}

impl DType {
    #[inline]
    pub const fn nbytes(self) -> usize {
        match self {
            Self::F32 => size_of::<f32>(),
            Self::F16 => size_of::<f16>(),
            Self::BF16 => size_of::<bf16>(),
        }
    }
}

impl FromStr for DType {
    type Err = XtaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "f32" | "fp32" | "float" => Ok(Self::F32),
            "f16" | "fp16" | "half" => Ok(Self::F16),
            "bf16" => Ok(Self::BF16),
            _ => bail!("unsupported input type: {s}"),
        }
    }
}

/// FP8 encoding of a quantized file.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Format {
    E4M3Fn,
    E4M3Fnuz,
}

impl Format {
    /// The encoding `fp8-quants` was built for.
    pub fn native() -> Self {
        if TypeId::of::<NativeFp8>() == TypeId::of::<F8E4M3Fnuz>() {
            Self::E4M3Fnuz
        } else {
            Self::E4M3Fn
        }
    }

    pub fn parse_or_native(s: Option<&str>) -> Result<Self, XtaskError> {
        s.map_or_else(|| Ok(Self::native()), str::parse)
    }

    pub fn format_max(self) -> f32 {
        match self {
            Self::E4M3Fn => F8E4M3Fn::FORMAT_MAX,
            Self::E4M3Fnuz => F8E4M3Fnuz::FORMAT_MAX,
        }
    }
}

impl FromStr for Format {
    type Err = XtaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "e4m3fn" | "fn" => Ok(Self::E4M3Fn),
            "e4m3fnuz" | "fnuz" => Ok(Self::E4M3Fnuz),
            _ => bail!("unsupported fp8 format: {s}"),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::E4M3Fn => write!(f, "e4m3fn"),
            Self::E4M3Fnuz => write!(f, "e4m3fnuz"),
        }
    }
}

#[test]
fn test_parse() {
    assert_eq!("fp16".parse::<DType>().unwrap(), DType::F16);
    assert_eq!(" BF16 ".parse::<DType>().unwrap(), DType::BF16);
    assert_eq!("float".parse::<DType>().unwrap().nbytes(), 4);
    assert!("q8_0".parse::<DType>().is_err());

    assert_eq!("fnuz".parse::<Format>().unwrap(), Format::E4M3Fnuz);
    assert_eq!("E4M3FN".parse::<Format>().unwrap(), Format::E4M3Fn);
    assert!("e5m2".parse::<Format>().is_err());
    assert_eq!(Format::parse_or_native(None).unwrap(), Format::native());
    assert_eq!(Format::E4M3Fnuz.format_max(), 224.);
}
