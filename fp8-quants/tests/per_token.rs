use fp8_quants::{
    bf16, f16, quantize_per_tensor, quantize_per_token, F8E4M3Fn, F8E4M3Fnuz, Fp8, QuantConfig,
    QuantizeError,
};
use rand::{seq::SliceRandom, Rng};
use std::iter::zip;

fn random_tokens(num_tokens: usize, hidden_dim: usize, amp: f32) -> Vec<f32> {
    let mut data = vec![0.0f32; num_tokens * hidden_dim];
    rand::thread_rng().fill(&mut data[..]);
    data.iter_mut().for_each(|x| *x = (*x * 2. - 1.) * amp);
    data
}

fn absmax(row: &[f32]) -> f32 {
    row.iter().fold(0.0f32, |m, x| m.max(x.abs()))
}

fn reference<F: Fp8>(x: f32, scale: f32) -> F {
    let inv = 1. / scale;
    F::from_f32((x * inv).clamp(-F::FORMAT_MAX, F::FORMAT_MAX))
}

fn quantize<F: Fp8>(input: &[f32], hidden_dim: usize) -> (Vec<F>, Vec<f32>) {
    let mut output = vec![F::ZERO; input.len()];
    let mut scale = vec![0.; input.len() / hidden_dim];
    quantize_per_token(input, &mut output, &mut scale, false).unwrap();
    (output, scale)
}

#[test]
fn test_range() {
    fn check<F: Fp8>() {
        let input = random_tokens(7, 300, 1e4);
        let (output, _) = quantize::<F>(&input, 300);
        assert!(output.iter().all(|y| y.to_f32().abs() <= F::FORMAT_MAX));

        let mut output = vec![F::ZERO; input.len()];
        let mut scale = vec![1e-3; 7];
        quantize_per_token(&input, &mut output, &mut scale, true).unwrap();
        assert!(output.iter().all(|y| y.to_f32().abs() <= F::FORMAT_MAX));
        assert!(output.iter().any(|y| y.to_f32().abs() == F::FORMAT_MAX));
    }
    check::<F8E4M3Fn>();
    check::<F8E4M3Fnuz>();
}

#[test]
fn test_dynamic_scale() {
    let hidden_dim = 513;
    let input = random_tokens(5, hidden_dim, 13.);
    let (output, scale) = quantize::<F8E4M3Fn>(&input, hidden_dim);

    for (row, &s) in zip(input.chunks(hidden_dim), &scale) {
        assert_eq!(s, absmax(row) / F8E4M3Fn::FORMAT_MAX);
    }
    // the largest element of every row lands on the format boundary
    for (y, row) in zip(output.chunks(hidden_dim), input.chunks(hidden_dim)) {
        let max = y.iter().fold(0.0f32, |m, y| m.max(y.to_f32().abs()));
        assert_eq!(max, F8E4M3Fn::FORMAT_MAX, "{}", absmax(row));
    }
}

#[test]
fn test_scale_order_independent() {
    let hidden_dim = 1000;
    let mut input = random_tokens(1, hidden_dim, 5.);
    let (_, expected) = quantize::<F8E4M3Fn>(&input, hidden_dim);

    let mut rng = rand::thread_rng();
    for _ in 0..4 {
        input.shuffle(&mut rng);
        let (_, scale) = quantize::<F8E4M3Fn>(&input, hidden_dim);
        assert_eq!(scale, expected);
    }
    input.reverse();
    for width in [1, 17, 32, 1024] {
        let mut output = vec![F8E4M3Fn::ZERO; hidden_dim];
        let mut scale = [0.];
        QuantConfig::with_group_width(width)
            .quantize_per_token(&input, &mut output, &mut scale, false)
            .unwrap();
        assert_eq!(scale.to_vec(), expected);
    }
}

#[test]
fn test_static_pass_through() {
    let hidden_dim = 64;
    let input = random_tokens(3, hidden_dim, 2.);
    let given = [0.01f32, 0.5, 3.];
    let mut scale = given;
    let mut output = vec![F8E4M3Fnuz::ZERO; input.len()];
    quantize_per_token(&input, &mut output, &mut scale, true).unwrap();

    assert_eq!(scale, given);
    for ((row, y), &s) in zip(zip(input.chunks(hidden_dim), output.chunks(hidden_dim)), &given) {
        for (&x, &y) in zip(row, y) {
            assert_eq!(y, reference::<F8E4M3Fnuz>(x, s));
        }
    }
}

#[test]
fn test_positive_rescale() {
    let hidden_dim = 77;
    let input = random_tokens(4, hidden_dim, 1.);
    let (expected, base) = quantize::<F8E4M3Fn>(&input, hidden_dim);

    for k in [4.0f32, 0.5, 1024.] {
        let scaled = input.iter().map(|x| x * k).collect::<Vec<_>>();
        let (output, scale) = quantize::<F8E4M3Fn>(&scaled, hidden_dim);
        assert_eq!(output, expected, "k = {k}");
        for (s, b) in zip(scale, &base) {
            assert_eq!(s, b * k);
        }
    }

    // non-power-of-two factors agree up to one step of rounding
    let scaled = input.iter().map(|x| x * 3.).collect::<Vec<_>>();
    let (output, scale) = quantize::<F8E4M3Fn>(&scaled, hidden_dim);
    for (s, b) in zip(scale, &base) {
        assert!((s - b * 3.).abs() <= b * 3. * 1e-6);
    }
    for (y, e) in zip(output, expected) {
        let (y, e) = (y.to_f32(), e.to_f32());
        assert!((y - e).abs() <= e.abs() / 8. + 1e-2, "{y} vs {e}");
    }
}

#[test]
fn test_independence() {
    let hidden_dim = 40;
    let mut input = random_tokens(3, hidden_dim, 8.);
    let (output, scale) = quantize::<F8E4M3Fn>(&input, hidden_dim);

    // alone
    let row = &input[hidden_dim..][..hidden_dim];
    let (alone, alone_scale) = quantize::<F8E4M3Fn>(row, hidden_dim);
    assert_eq!(alone, output[hidden_dim..][..hidden_dim]);
    assert_eq!(alone_scale[0], scale[1]);

    // neighbours changed
    input[..hidden_dim].iter_mut().for_each(|x| *x *= 1e3);
    input[2 * hidden_dim..].fill(0.);
    let (changed, changed_scale) = quantize::<F8E4M3Fn>(&input, hidden_dim);
    assert_eq!(changed[hidden_dim..][..hidden_dim], output[hidden_dim..][..hidden_dim]);
    assert_eq!(changed_scale[1], scale[1]);
}

#[test]
fn test_known_dynamic() {
    fn check<F: Fp8>() {
        let input = [1.0f32, -2., 0.5, -0.25];
        let (output, scale) = quantize::<F>(&input, 4);
        assert_eq!(scale, [2. / F::FORMAT_MAX]);

        let expected = [0.5f32, -1., 0.25, -0.125].map(|x| x * F::FORMAT_MAX);
        for (y, e) in zip(&output, expected) {
            assert_eq!(y.to_f32(), e);
        }
    }
    check::<F8E4M3Fn>();
    check::<F8E4M3Fnuz>();
}

#[test]
fn test_all_zero_token() {
    let input = [0.0f32; 8];
    let (output, scale) = quantize::<F8E4M3Fn>(&input, 8);
    assert_eq!(scale, [0.0f32]);
    assert!(output.iter().all(|y| y.is_nan()));

    let (output, scale) = quantize::<F8E4M3Fnuz>(&input, 4);
    assert_eq!(scale, [0.0f32, 0.]);
    assert!(output.iter().all(|y| y.is_nan()));

    // only the zero token degenerates
    let input = [0.0f32, 0., 1., -1.];
    let (output, _) = quantize::<F8E4M3Fn>(&input, 2);
    assert!(output[..2].iter().all(|y| y.is_nan()));
    assert_eq!(output[2], F8E4M3Fn::MAX);
}

#[test]
fn test_static_clamp() {
    fn check<F: Fp8>() {
        let input = [1000.0f32, -1000., F::FORMAT_MAX * 1.01, 1.];
        let mut output = [F::ZERO; 4];
        let mut scale = [1.];
        quantize_per_token(&input, &mut output, &mut scale, true).unwrap();

        let output = output.map(F::to_f32);
        assert_eq!(output, [F::FORMAT_MAX, -F::FORMAT_MAX, F::FORMAT_MAX, 1.]);
    }
    check::<F8E4M3Fn>();
    check::<F8E4M3Fnuz>();
}

#[test]
fn test_tail_elements() {
    // 5 = one f32 vector of 4 and one tail element
    let input = [0.3f32, -1.7, 2.2, 0.01, -4.];
    let (output, scale) = quantize::<F8E4M3Fn>(&input, 5);
    assert_eq!(scale, [4. / F8E4M3Fn::FORMAT_MAX]);
    for (&x, &y) in zip(&input, &output) {
        assert_eq!(y, reference::<F8E4M3Fn>(x, scale[0]));
    }
    assert_eq!(output[4].to_f32(), -F8E4M3Fn::FORMAT_MAX);
}

#[test]
fn test_half_inputs() {
    // 11 x 11 is not a multiple of the 8-wide half vectors
    let wide = random_tokens(11, 11, 13.);

    let input = wide.iter().copied().map(f16::from_f32).collect::<Vec<_>>();
    let rounded = input.iter().map(|x| x.to_f32()).collect::<Vec<_>>();
    let mut output = vec![F8E4M3Fn::ZERO; input.len()];
    let mut scale = vec![0.; 11];
    quantize_per_token(&input, &mut output, &mut scale, false).unwrap();
    for ((row, y), &s) in zip(zip(rounded.chunks(11), output.chunks(11)), &scale) {
        assert_eq!(s, absmax(row) / F8E4M3Fn::FORMAT_MAX);
        for (&x, &y) in zip(row, y) {
            assert_eq!(y, reference::<F8E4M3Fn>(x, s));
        }
    }

    let input = wide.iter().copied().map(bf16::from_f32).collect::<Vec<_>>();
    let rounded = input.iter().map(|x| x.to_f32()).collect::<Vec<_>>();
    let mut output = vec![F8E4M3Fnuz::ZERO; input.len()];
    quantize_per_token(&input, &mut output, &mut scale, false).unwrap();
    for ((row, y), &s) in zip(zip(rounded.chunks(11), output.chunks(11)), &scale) {
        assert_eq!(s, absmax(row) / F8E4M3Fnuz::FORMAT_MAX);
        for (&x, &y) in zip(row, y) {
            assert_eq!(y, reference::<F8E4M3Fnuz>(x, s));
        }
    }
}

#[test]
fn test_no_tokens() {
    let mut output: [F8E4M3Fn; 0] = [];
    let mut scale: [f32; 0] = [];
    assert_eq!(quantize_per_token::<f32, _>(&[], &mut output, &mut scale, false), Ok(()));
    assert_eq!(quantize_per_token::<f32, _>(&[], &mut output, &mut scale, true), Ok(()));
}

#[test]
fn test_shape_errors() {
    let input = [1.0f32; 12];
    let mut output = [F8E4M3Fn::ZERO; 12];
    let mut scale = [7.0f32; 5];

    let mut short = [F8E4M3Fn::ZERO; 11];
    assert_eq!(
        quantize_per_token(&input, &mut short, &mut scale[..3], false),
        Err(QuantizeError::LengthMismatch),
    );
    assert_eq!(
        quantize_per_token(&input, &mut output, &mut scale, false),
        Err(QuantizeError::Indivisible),
    );
    assert_eq!(
        quantize_per_token(&input, &mut output, &mut [], false),
        Err(QuantizeError::LengthMismatch),
    );
    assert_eq!(
        quantize_per_token::<f32, _>(&[], &mut [F8E4M3Fn::ZERO; 0], &mut scale, false),
        Err(QuantizeError::EmptyRow),
    );
    assert_eq!(
        QuantConfig::with_group_width(2048).quantize_per_token(
            &input,
            &mut output,
            &mut scale[..3],
            false
        ),
        Err(QuantizeError::InvalidGroupWidth(2048)),
    );
    // nothing written on failure
    assert!(scale.iter().all(|&s| s == 7.));
    assert!(output.iter().all(|&y| y == F8E4M3Fn::ZERO));
}

#[test]
fn test_per_tensor() {
    let hidden_dim = 11;
    let input = random_tokens(11, hidden_dim, 13.)
        .into_iter()
        .map(f16::from_f32)
        .collect::<Vec<_>>();
    let rounded = input.iter().map(|x| x.to_f32()).collect::<Vec<_>>();

    let mut dynamic = vec![F8E4M3Fn::ZERO; input.len()];
    let mut scale = 0.;
    quantize_per_tensor(&input, &mut dynamic, hidden_dim, &mut scale, false).unwrap();
    assert_eq!(scale, absmax(&rounded) / F8E4M3Fn::FORMAT_MAX);
    for (&x, &y) in zip(&rounded, &dynamic) {
        assert_eq!(y, reference::<F8E4M3Fn>(x, scale));
    }

    // feeding the dynamic scale back in reproduces the output
    let mut fixed = vec![F8E4M3Fn::ZERO; input.len()];
    let mut again = scale;
    quantize_per_tensor(&input, &mut fixed, hidden_dim, &mut again, true).unwrap();
    assert_eq!(again, scale);
    assert_eq!(fixed, dynamic);

    // row shape does not matter
    let mut flat = vec![F8E4M3Fn::ZERO; input.len()];
    let mut flat_scale = 0.;
    quantize_per_tensor(&input, &mut flat, input.len(), &mut flat_scale, false).unwrap();
    assert_eq!(flat_scale, scale);
    assert_eq!(flat, dynamic);
}

#[test]
fn test_per_tensor_errors() {
    let input = [1.0f32; 6];
    let mut output = [F8E4M3Fn::ZERO; 6];
    let mut scale = 1.;
    assert_eq!(
        quantize_per_tensor(&input, &mut output, 4, &mut scale, false),
        Err(QuantizeError::Indivisible),
    );
    assert_eq!(
        quantize_per_tensor(&input, &mut output, 0, &mut scale, false),
        Err(QuantizeError::EmptyRow),
    );
    assert_eq!(
        quantize_per_tensor(&input, &mut output[..5], 3, &mut scale, false),
        Err(QuantizeError::LengthMismatch),
    );
    assert_eq!(
        quantize_per_tensor::<f32, F8E4M3Fn>(&[], &mut [], 0, &mut scale, false),
        Ok(()),
    );
    assert_eq!(scale, 1.);
}
