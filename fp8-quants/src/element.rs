use half::{bf16, f16};

/// Wide floating-point element accepted as quantization input.
pub trait Element: Copy + Send + Sync + 'static {
    /// Elements per 16-byte vector access.
    const VEC: usize = 16 / size_of::<Self>();

    fn to_f32(self) -> f32;
}

impl Element for f32 {
    #[inline]
    fn to_f32(self) -> f32 {
        self
    }
}

impl Element for f16 {
    #[inline]
    fn to_f32(self) -> f32 {
        f16::to_f32(self)
    }
}

impl Element for bf16 {
    #[inline]
    fn to_f32(self) -> f32 {
        bf16::to_f32(self)
    }
}

#[test]
fn test_vec_width() {
    assert_eq!(<f32 as Element>::VEC, 4);
    assert_eq!(<f16 as Element>::VEC, 8);
    assert_eq!(<bf16 as Element>::VEC, 8);
}
