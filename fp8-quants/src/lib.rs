//! Per-token FP8 quantization of activation tensors.
//!
//! The input is a row-major `[num_tokens, hidden_dim]` tensor of a wide float
//! type. In dynamic mode every token first gets `scale = max|x| / FORMAT_MAX`,
//! then every element is cast as `clamp(x / scale, ±FORMAT_MAX)` into the
//! narrow format. In static mode the caller's scales are used as given.
//!
//! Tokens are independent worker groups scheduled on the rayon pool; lanes
//! inside a group are emulated, see [`SUB_GROUP`] and [`MAX_GROUP_WIDTH`].

mod element;
mod estimate;
mod fp8;
mod quantize;
mod reduce;

#[cfg(test)]
mod test_utils;

use log::debug;
use std::fmt;

pub use ::half::{bf16, f16};
pub use element::Element;
pub use fp8::{F8E4M3Fn, F8E4M3Fnuz, Fp8, NativeFp8};
pub use reduce::{MAX_GROUP_WIDTH, SUB_GROUP};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuantizeError {
    /// Input, output and scale sizes disagree.
    LengthMismatch,
    /// Input length is not a whole number of rows.
    Indivisible,
    /// Tokens were given but rows are empty.
    EmptyRow,
    /// Group width is zero or above [`MAX_GROUP_WIDTH`].
    InvalidGroupWidth(usize),
}

impl fmt::Display for QuantizeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::LengthMismatch => write!(f, "input, output and scale lengths do not match"),
            Self::Indivisible => write!(f, "input length is not divisible by row count"),
            Self::EmptyRow => write!(f, "hidden dimension is zero"),
            Self::InvalidGroupWidth(w) => {
                write!(f, "group width {w} is not in 1..={MAX_GROUP_WIDTH}")
            }
        }
    }
}

impl std::error::Error for QuantizeError {}

/// Launch parameters shared by both stages.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct QuantConfig {
    /// Lanes per worker group. `None` picks `min(hidden_dim, 1024)` rounded
    /// up to a whole sub-group.
    pub group_width: Option<usize>,
}

impl QuantConfig {
    #[inline]
    pub const fn with_group_width(group_width: usize) -> Self {
        Self {
            group_width: Some(group_width),
        }
    }

    pub fn group_width(&self, hidden_dim: usize) -> Result<usize, QuantizeError> {
        match self.group_width {
            Some(w) if (1..=MAX_GROUP_WIDTH).contains(&w) => Ok(w),
            Some(w) => Err(QuantizeError::InvalidGroupWidth(w)),
            None => Ok(hidden_dim
                .clamp(1, MAX_GROUP_WIDTH)
                .next_multiple_of(SUB_GROUP)),
        }
    }

    /// Quantizes `input` row by row, one scale per row.
    ///
    /// The row count is `scale.len()`. With `is_static == false` the scales
    /// are computed and written before any element is cast; otherwise they
    /// are read as given and must be positive. An all-zero row in dynamic
    /// mode gets scale `0.` and NaN outputs.
    pub fn quantize_per_token<T: Element, F: Fp8>(
        &self,
        input: &[T],
        output: &mut [F],
        scale: &mut [f32],
        is_static: bool,
    ) -> Result<(), QuantizeError> {
        if output.len() != input.len() {
            return Err(QuantizeError::LengthMismatch);
        }
        let num_tokens = scale.len();
        if num_tokens == 0 {
            return if input.is_empty() {
                Ok(())
            } else {
                Err(QuantizeError::LengthMismatch)
            };
        }
        if input.len() % num_tokens != 0 {
            return Err(QuantizeError::Indivisible);
        }
        let hidden_dim = input.len() / num_tokens;
        if hidden_dim == 0 {
            return Err(QuantizeError::EmptyRow);
        }
        let width = self.group_width(hidden_dim)?;

        debug!(
            "per-token quantize: {num_tokens} x {hidden_dim}, {} scale, {width} lanes",
            if is_static { "static" } else { "dynamic" },
        );

        if !is_static {
            estimate::token_scales(input, scale, hidden_dim, width, F::FORMAT_MAX);
        }
        quantize::quantize_tokens(input, output, scale, hidden_dim, width);
        Ok(())
    }

    /// Quantizes the whole tensor with a single scale.
    ///
    /// `hidden_dim` only shapes the worker groups; the result does not
    /// depend on it.
    pub fn quantize_per_tensor<T: Element, F: Fp8>(
        &self,
        input: &[T],
        output: &mut [F],
        hidden_dim: usize,
        scale: &mut f32,
        is_static: bool,
    ) -> Result<(), QuantizeError> {
        if output.len() != input.len() {
            return Err(QuantizeError::LengthMismatch);
        }
        if hidden_dim == 0 {
            return if input.is_empty() {
                Ok(())
            } else {
                Err(QuantizeError::EmptyRow)
            };
        }
        if input.len() % hidden_dim != 0 {
            return Err(QuantizeError::Indivisible);
        }
        let width = self.group_width(hidden_dim)?;

        debug!(
            "per-tensor quantize: {} x {hidden_dim}, {} scale, {width} lanes",
            input.len() / hidden_dim,
            if is_static { "static" } else { "dynamic" },
        );

        if !is_static {
            *scale = estimate::tensor_absmax(input, hidden_dim, width) / F::FORMAT_MAX;
        }
        quantize::quantize_tensor(input, output, *scale, hidden_dim, width);
        Ok(())
    }
}

/// [`QuantConfig::quantize_per_token`] with the default group width.
#[inline]
pub fn quantize_per_token<T: Element, F: Fp8>(
    input: &[T],
    output: &mut [F],
    scale: &mut [f32],
    is_static: bool,
) -> Result<(), QuantizeError> {
    QuantConfig::default().quantize_per_token(input, output, scale, is_static)
}

/// [`QuantConfig::quantize_per_tensor`] with the default group width.
#[inline]
pub fn quantize_per_tensor<T: Element, F: Fp8>(
    input: &[T],
    output: &mut [F],
    hidden_dim: usize,
    scale: &mut f32,
    is_static: bool,
) -> Result<(), QuantizeError> {
    QuantConfig::default().quantize_per_tensor(input, output, hidden_dim, scale, is_static)
}

#[test]
fn test_default_width() {
    let config = QuantConfig::default();
    assert_eq!(config.group_width(1), Ok(32));
    assert_eq!(config.group_width(33), Ok(64));
    assert_eq!(config.group_width(4096), Ok(1024));
    assert_eq!(
        QuantConfig::with_group_width(0).group_width(16),
        Err(QuantizeError::InvalidGroupWidth(0)),
    );
    assert_eq!(
        QuantConfig::with_group_width(MAX_GROUP_WIDTH + 1).group_width(16),
        Err(QuantizeError::InvalidGroupWidth(MAX_GROUP_WIDTH + 1)),
    );
    assert_eq!(QuantConfig::with_group_width(7).group_width(16), Ok(7));
}
