use crate::{
    reduce::{group_max, MAX_GROUP_WIDTH},
    Element,
};
use rayon::iter::{IndexedParallelIterator, ParallelIterator};
use rayon::slice::ParallelSlice;
use std::iter::zip;

/// Maximum of `|x|` over one token, computed by a worker group of `width` lanes.
///
/// Lane `l` visits elements `l`, `l + width`, ... starting from `0.`, so an
/// all-zero token yields exactly `0.`.
pub(crate) fn token_absmax<T: Element>(row: &[T], width: usize) -> f32 {
    let mut lanes = [0.0f32; MAX_GROUP_WIDTH];
    let lanes = &mut lanes[..width];
    for stride in row.chunks(width) {
        for (acc, &x) in zip(&mut *lanes, stride) {
            *acc = acc.max(x.to_f32().abs());
        }
    }
    group_max(lanes)
}

/// Writes `absmax / format_max` for every token.
pub(crate) fn token_scales<T: Element>(
    input: &[T],
    scale: &mut [f32],
    hidden_dim: usize,
    width: usize,
    format_max: f32,
) {
    input
        .par_chunks_exact(hidden_dim)
        .zip(scale)
        .for_each(|(row, scale)| *scale = token_absmax(row, width) / format_max);
}

/// Maximum of `|x|` over all tokens.
pub(crate) fn tensor_absmax<T: Element>(input: &[T], hidden_dim: usize, width: usize) -> f32 {
    input
        .par_chunks_exact(hidden_dim)
        .map(|row| token_absmax(row, width))
        .reduce(|| 0., f32::max)
}

#[test]
fn test_width_independent() {
    use rand::Rng;

    let mut row = vec![0.0f32; 4099];
    rand::thread_rng().fill(&mut row[..]);
    row.iter_mut().for_each(|x| *x = (*x - 0.5) * 26.);

    let expected = row.iter().fold(0.0f32, |m, x| m.max(x.abs()));
    for width in [1, 3, 32, 64, 250, 1000, MAX_GROUP_WIDTH] {
        assert_eq!(token_absmax(&row, width), expected, "width = {width}");
    }
}

#[test]
fn test_negative_max() {
    let row = [0.5f32, -3., 2.75, -0.];
    assert_eq!(token_absmax(&row, 32), 3.);
    assert_eq!(token_absmax(&[-0.0f32; 9], 4), 0.);
}

#[test]
fn test_half_input() {
    use half::{bf16, f16};

    let row = [1.5, -6.25, 0.125, 4.].map(f16::from_f32);
    assert_eq!(token_absmax(&row, 32), 6.25);
    let row = [1.5, -6.25, 0.125, 4.].map(bf16::from_f32);
    assert_eq!(token_absmax(&row, 2), 6.25);
}

#[test]
fn test_scales() {
    let input = [1.0f32, -2., 0.5, -0.25, 0., 0., 0., 0., 448., 1., -1., 0.];
    let mut scale = [f32::NAN; 3];
    token_scales(&input, &mut scale, 4, 32, 448.);
    assert_eq!(scale, [2. / 448., 0., 1.]);
    assert_eq!(tensor_absmax(&input, 4, 32), 448.);
}
