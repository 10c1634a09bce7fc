use crate::{Element, Fp8};
use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use rayon::slice::{ParallelSlice, ParallelSliceMut};
use std::iter::zip;

#[inline(always)]
fn scaled<T: Element, F: Fp8>(x: T, inv: f32) -> F {
    F::from_f32((x.to_f32() * inv).clamp(-F::FORMAT_MAX, F::FORMAT_MAX))
}

/// Casts one token with a worker group of `width` lanes.
///
/// Whole 16-byte vectors are dealt to lanes by stride, then the
/// `len % T::VEC` trailing elements go through a scalar loop with the same
/// striding. A zero `scale` turns zero elements into NaN.
pub(crate) fn quantize_token<T: Element, F: Fp8>(
    row: &[T],
    out: &mut [F],
    scale: f32,
    width: usize,
) {
    debug_assert_eq!(row.len(), out.len());

    let inv = 1. / scale;
    let body = row.len() - row.len() % T::VEC;
    let (vec_x, tail_x) = row.split_at(body);
    let (vec_y, tail_y) = out.split_at_mut(body);

    let busy = width.min((body / T::VEC).max(tail_x.len()));
    for lane in 0..busy {
        let xs = vec_x.chunks_exact(T::VEC).skip(lane).step_by(width);
        let ys = vec_y.chunks_exact_mut(T::VEC).skip(lane).step_by(width);
        for (x, y) in zip(xs, ys) {
            for (&x, y) in zip(x, y) {
                *y = scaled(x, inv);
            }
        }

        let xs = tail_x.iter().skip(lane).step_by(width);
        let ys = tail_y.iter_mut().skip(lane).step_by(width);
        for (&x, y) in zip(xs, ys) {
            *y = scaled(x, inv);
        }
    }
}

/// Each token uses its own scale.
pub(crate) fn quantize_tokens<T: Element, F: Fp8>(
    input: &[T],
    output: &mut [F],
    scale: &[f32],
    hidden_dim: usize,
    width: usize,
) {
    input
        .par_chunks_exact(hidden_dim)
        .zip(output.par_chunks_exact_mut(hidden_dim))
        .zip(scale.par_iter())
        .for_each(|((x, y), &scale)| quantize_token(x, y, scale, width));
}

/// Every token shares `scale`.
pub(crate) fn quantize_tensor<T: Element, F: Fp8>(
    input: &[T],
    output: &mut [F],
    scale: f32,
    hidden_dim: usize,
    width: usize,
) {
    input
        .par_chunks_exact(hidden_dim)
        .zip(output.par_chunks_exact_mut(hidden_dim))
        .for_each(|(x, y)| quantize_token(x, y, scale, width));
}

#[cfg(test)]
fn reference<F: Fp8>(row: &[f32], scale: f32) -> Vec<F> {
    let inv = 1. / scale;
    row.iter()
        .map(|&x| F::from_f32((x * inv).clamp(-F::FORMAT_MAX, F::FORMAT_MAX)))
        .collect()
}

#[test]
fn test_tail() {
    use crate::F8E4M3Fn;

    let row = [3.0f32, -7., 0.1, 448., 900.];
    for width in [1, 2, 32] {
        let mut out = [F8E4M3Fn::ZERO; 5];
        quantize_token(&row, &mut out, 1., width);
        assert_eq!(out.to_vec(), reference::<F8E4M3Fn>(&row, 1.));
        assert_eq!(out[4], F8E4M3Fn::MAX);
    }
}

#[test]
fn test_half_vectors() {
    use crate::F8E4M3Fnuz;
    use half::f16;
    use rand::Rng;

    // 11 = one vector of 8 and a tail of 3
    let mut row = [0.0f32; 11];
    rand::thread_rng().fill(&mut row);
    let row = row.map(|x| f16::from_f32((x - 0.5) * 26.));
    let wide = row.map(f16::to_f32);

    let mut out = [F8E4M3Fnuz::ZERO; 11];
    quantize_token(&row, &mut out, 0.05, 32);
    for (i, (y, r)) in zip(out, reference::<F8E4M3Fnuz>(&wide, 0.05)).enumerate() {
        assert_eq!(y.to_bits(), r.to_bits(), "element {i}");
    }
}

#[test]
fn test_error() {
    use crate::{
        test_utils::{Diff, ErrorCollector},
        F8E4M3Fn,
    };
    use rand::Rng;

    let mut row = vec![0.0f32; 4096];
    rand::thread_rng().fill(&mut row[..]);
    row.iter_mut().for_each(|x| *x = *x * 2. - 1.);
    let scale = row.iter().fold(0.0f32, |m, x| m.max(x.abs())) / F8E4M3Fn::FORMAT_MAX;

    let mut out = vec![F8E4M3Fn::ZERO; row.len()];
    quantize_token(&row, &mut out, scale, 256);

    let mut ec = ErrorCollector::new(1e-4, 0.07);
    for (&a, b) in zip(&row, &out) {
        ec.push(Diff::new(a, b.to_f32() * scale))
    }
    println!("{ec}");

    for &i in ec.outliers() {
        println!("{} vs {}", row[i], out[i].to_f32() * scale);
    }

    assert!(ec.outliers().is_empty());
}

#[test]
fn test_zero_scale() {
    use crate::F8E4M3Fn;

    let mut out = [F8E4M3Fn::ZERO; 6];
    quantize_token(&[0.0f32; 6], &mut out, 0., 4);
    assert!(out.iter().all(|y| y.is_nan()));
}
