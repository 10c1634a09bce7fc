use crate::{
    bail,
    utils::{map_file, read_scales, reslice, Format},
    XtaskError, ERR, YES,
};
use fp8_quants::{F8E4M3Fn, F8E4M3Fnuz, Fp8};
use rayon::{iter::ParallelIterator, slice::ParallelSlice};
use std::{fmt::Write, path::PathBuf};

#[derive(Args, Default)]
pub struct ShowArgs {
    /// Quantized file, one byte per element
    file: PathBuf,
    /// Elements per token
    #[clap(long)]
    hidden_dim: usize,
    /// FP8 encoding, may be "e4m3fn" or "e4m3fnuz"; defaults to the build target's
    #[clap(long, short)]
    format: Option<String>,
    /// Scales to list, defaults to the `.scale` file next to the input
    #[clap(long)]
    scale_file: Option<PathBuf>,
    /// Tokens to list
    #[clap(long, short = 'n', default_value = "16")]
    tokens: usize,
    /// Leading elements to print per token
    #[clap(long, short = 'e', default_value = "8")]
    elements: usize,
}

#[derive(Clone, PartialEq, Debug)]
struct TokenSummary {
    /// Elements at `±FORMAT_MAX`.
    at_max: usize,
    nan: usize,
    head: Vec<f32>,
}

impl ShowArgs {
    pub fn show(self) -> Result<(), XtaskError> {
        let Self {
            file,
            hidden_dim,
            format,
            scale_file,
            tokens,
            elements,
        } = self;

        let format = Format::parse_or_native(format.as_deref())?;
        if hidden_dim == 0 {
            bail!("hidden dim must be positive")
        }
        let data = map_file(&file)?;
        if data.len() % hidden_dim != 0 {
            bail!("{} bytes do not split into rows of {hidden_dim}", data.len())
        }
        let n_tokens = data.len() / hidden_dim;

        let scale_file = scale_file.or_else(|| {
            let path = file.with_extension("scale");
            path.is_file().then_some(path)
        });
        let scales = match scale_file {
            Some(path) => read_scales(path)?,
            None => vec![],
        };
        let scale_of = |i: usize| match scales.len() {
            0 => None,
            1 => Some(scales[0]),
            _ => scales.get(i).copied(),
        };
        if scales.len() > 1 && scales.len() != n_tokens {
            bail!("{} scales for {n_tokens} tokens", scales.len())
        }

        let summaries = match format {
            Format::E4M3Fn => summarize::<F8E4M3Fn>(&data, hidden_dim, elements)?,
            Format::E4M3Fnuz => summarize::<F8E4M3Fnuz>(&data, hidden_dim, elements)?,
        };

        let file_name = file.display().to_string();
        println!(
            "\
+-{0:-<1$}-+
| {file_name} |
+-{0:-<1$}-+
",
            "",
            file_name.len()
        );
        println!(
            "{format} (max {}), {n_tokens} tokens x {hidden_dim}",
            format.format_max()
        );
        println!();

        for (i, summary) in summaries.iter().enumerate().take(tokens) {
            let scale = scale_of(i).map_or_else(|| "-".into(), |s| format!("{s:.4e}"));
            let mut head = String::new();
            for x in &summary.head {
                let _ = write!(head, " {x:>8}");
            }
            println!(
                "{i:>6} | scale {scale:>10} | max {:>5} | nan {:>5} |{head}",
                summary.at_max, summary.nan
            );
        }
        if n_tokens > tokens {
            println!("   ... | {} more tokens", n_tokens - tokens);
        }
        println!();

        let nan_tokens = summaries.iter().filter(|s| s.nan > 0).count();
        if nan_tokens == 0 {
            println!("{YES}No NaN element.");
        } else {
            println!("{ERR}{nan_tokens} token(s) hold NaN, their dynamic scale was zero.");
        }
        Ok(())
    }
}

fn summarize<F: Fp8>(
    data: &[u8],
    hidden_dim: usize,
    elements: usize,
) -> Result<Vec<TokenSummary>, XtaskError> {
    let data = reslice::<F>(data)?;
    Ok(data
        .par_chunks(hidden_dim)
        .map(|row| {
            let mut at_max = 0;
            let mut nan = 0;
            for &x in row {
                let x = x.to_f32();
                if x.is_nan() {
                    nan += 1
                } else if x.abs() >= F::FORMAT_MAX {
                    at_max += 1
                }
            }
            TokenSummary {
                at_max,
                nan,
                head: row.iter().take(elements).map(|&x| x.to_f32()).collect(),
            }
        })
        .collect())
}

#[test]
fn test_summarize() {
    let data = [0x38u8, 0x7e, 0xfe, 0x7f, 0x00, 0xc0];
    let summaries = summarize::<F8E4M3Fn>(&data, 3, 2).unwrap();
    assert_eq!(summaries.len(), 2);
    assert_eq!(
        summaries[0],
        TokenSummary {
            at_max: 2,
            nan: 0,
            head: vec![1., 448.],
        }
    );
    assert_eq!((summaries[1].at_max, summaries[1].nan), (0, 1));
    assert!(summaries[1].head[0].is_nan());

    // 224 is the fnuz clamp limit, 240 the encoding limit
    let summaries = summarize::<F8E4M3Fnuz>(&data, 6, 0).unwrap();
    assert_eq!(summaries[0].nan, 0);
    assert_eq!(summaries[0].at_max, 3);
    assert!(summaries[0].head.is_empty());
}
