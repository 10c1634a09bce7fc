use crate::{
    bail,
    utils::{malloc, map_file, read_scales, reslice, reslice_mut, show_file_info, write_scales},
    utils::{DType, FileInfo, Format},
    LogArgs, XtaskError, YES,
};
use fp8_quants::{bf16, f16, Element, F8E4M3Fn, F8E4M3Fnuz, Fp8, QuantConfig};
use log::{info, warn};
use memmap2::MmapMut;
use std::{fs, path::PathBuf, time::Instant};

#[derive(Args, Default)]
pub struct QuantizeArgs {
    /// Raw row-major tensor, native byte order
    file: PathBuf,
    /// Elements per token
    #[clap(long)]
    hidden_dim: usize,
    /// Input element type, may be "f32", "f16" or "bf16"
    #[clap(long, short, default_value = "f32")]
    dtype: String,
    /// FP8 encoding, may be "e4m3fn" or "e4m3fnuz"; defaults to the build target's
    #[clap(long, short)]
    format: Option<String>,
    /// Static scale shared by every token
    #[clap(long, conflicts_with = "scale_file")]
    scale: Option<f32>,
    /// Static scales, one little-endian f32 per token
    #[clap(long)]
    scale_file: Option<PathBuf>,
    /// Quantize the whole tensor with one scale
    #[clap(long)]
    per_tensor: bool,
    /// Lanes per worker group
    #[clap(long)]
    group_width: Option<usize>,
    /// Output directory, defaults to the input's
    #[clap(long, short)]
    output_dir: Option<PathBuf>,

    #[clap(flatten)]
    log: LogArgs,
}

impl QuantizeArgs {
    pub fn quantize(self) -> Result<Vec<FileInfo>, XtaskError> {
        let Self {
            file,
            hidden_dim,
            dtype,
            format,
            scale,
            scale_file,
            per_tensor,
            group_width,
            output_dir,
            log,
        } = self;
        log.init();

        let dtype = dtype.parse::<DType>()?;
        let format = Format::parse_or_native(format.as_deref())?;
        if hidden_dim == 0 {
            bail!("hidden dim must be positive")
        }

        let data = map_file(&file)?;
        if data.len() % (hidden_dim * dtype.nbytes()) != 0 {
            bail!(
                "{} bytes do not split into rows of {hidden_dim} {dtype:?}",
                data.len()
            )
        }
        let n_elements = data.len() / dtype.nbytes();
        let n_tokens = n_elements / hidden_dim;
        let n_scales = if per_tensor { 1 } else { n_tokens };

        let (mut scales, is_static) = match (scale, scale_file) {
            (Some(s), _) => (vec![s; n_scales], true),
            (None, Some(path)) => (read_scales(path)?, true),
            (None, None) => (vec![0.; n_scales], false),
        };
        if scales.len() != n_scales {
            bail!("expect {n_scales} scales, found {}", scales.len())
        }
        if is_static {
            if let Some(s) = scales.iter().find(|s| !(s.is_finite() && **s > 0.)) {
                bail!("static scale must be positive and finite, found {s}")
            }
        }

        info!(
            "quantize {n_tokens} x {hidden_dim} {dtype:?} into {format} with {} {} scale",
            if is_static { "static" } else { "dynamic" },
            if per_tensor { "per-tensor" } else { "per-token" },
        );

        let job = Job {
            data: &data,
            hidden_dim,
            config: QuantConfig { group_width },
            per_tensor,
            is_static,
        };
        let time = Instant::now();
        #[rustfmt::skip]
        let output = match (dtype, format) {
            (DType::F32 , Format::E4M3Fn  ) => job.run::<f32 , F8E4M3Fn  >(&mut scales),
            (DType::F32 , Format::E4M3Fnuz) => job.run::<f32 , F8E4M3Fnuz>(&mut scales),
            (DType::F16 , Format::E4M3Fn  ) => job.run::<f16 , F8E4M3Fn  >(&mut scales),
            (DType::F16 , Format::E4M3Fnuz) => job.run::<f16 , F8E4M3Fnuz>(&mut scales),
            (DType::BF16, Format::E4M3Fn  ) => job.run::<bf16, F8E4M3Fn  >(&mut scales),
            (DType::BF16, Format::E4M3Fnuz) => job.run::<bf16, F8E4M3Fnuz>(&mut scales),
        }?;
        info!("run quantization in {:?}", time.elapsed());

        if !is_static {
            let zeros = scales.iter().filter(|&&s| s == 0.).count();
            if zeros > 0 {
                warn!("{zeros} all-zero scale(s), affected outputs are NaN");
            }
        }

        let dir = match output_dir {
            Some(dir) => dir,
            None => file.parent().map_or_else(PathBuf::new, |p| p.to_path_buf()),
        };
        fs::create_dir_all(&dir)?;
        let stem = file
            .file_stem()
            .map_or_else(|| "tensor".into(), |s| s.to_string_lossy());

        let time = Instant::now();
        let fp8_path = dir.join(format!("{stem}.fp8"));
        fs::write(&fp8_path, &output[..n_elements])?;
        let scale_path = dir.join(format!("{stem}.scale"));
        let scale_bytes = write_scales(&scale_path, &scales)?;
        info!("write files in {:?}", time.elapsed());

        let files = vec![
            FileInfo {
                path: fp8_path,
                n_tokens,
                n_bytes: n_elements,
            },
            FileInfo {
                path: scale_path,
                n_tokens,
                n_bytes: scale_bytes,
            },
        ];
        show_file_info(&files);
        println!("{YES}{format} max = {}", format.format_max());
        Ok(files)
    }
}

struct Job<'a> {
    data: &'a [u8],
    hidden_dim: usize,
    config: QuantConfig,
    per_tensor: bool,
    is_static: bool,
}

impl Job<'_> {
    fn run<T: Element, F: Fp8>(&self, scale: &mut [f32]) -> Result<MmapMut, XtaskError> {
        let src = reslice::<T>(self.data)?;
        let mut ans = malloc::<F>(src.len())?;
        let dst = reslice_mut::<F>(&mut ans, src.len());
        if self.per_tensor {
            let [scale] = scale else {
                bail!("per-tensor quantization takes exactly one scale")
            };
            self.config
                .quantize_per_tensor(src, dst, self.hidden_dim, scale, self.is_static)?
        } else {
            self.config
                .quantize_per_token(src, dst, scale, self.is_static)?
        }
        Ok(ans)
    }
}

#[cfg(test)]
fn quantize_in_temp(name: &str, input: &[f32], args: QuantizeArgs) -> (Vec<u8>, Vec<f32>) {
    let dir = std::env::temp_dir().join(format!("fp8-utils-{}-{name}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let file = dir.join(format!("{name}.bin"));
    let bytes = input.iter().flat_map(|x| x.to_ne_bytes()).collect::<Vec<_>>();
    fs::write(&file, bytes).unwrap();

    let files = QuantizeArgs { file, ..args }.quantize().unwrap();
    let fp8 = fs::read(&files[0].path).unwrap();
    let scale = read_scales(&files[1].path).unwrap();
    fs::remove_dir_all(dir).unwrap();
    (fp8, scale)
}

#[test]
fn test_dynamic_file() {
    let input = [1.0f32, -2., 0.5, -0.25, 0., 0., 0., 0., 448., 1., 0.75, -3.];
    let args = QuantizeArgs {
        hidden_dim: 4,
        dtype: "f32".into(),
        format: Some("e4m3fn".into()),
        ..Default::default()
    };
    let (fp8, scale) = quantize_in_temp("dynamic", &input, args);

    assert_eq!(scale, [2.0f32 / 448., 0., 1.]);
    let values = fp8
        .iter()
        .map(|&b| F8E4M3Fn::from_bits(b).to_f32())
        .collect::<Vec<_>>();
    assert_eq!(values[..4], [224.0f32, -448., 112., -56.]);
    assert!(values[4..8].iter().all(|x| x.is_nan()));
    assert_eq!(values[8..], [448.0f32, 1., 0.75, -3.]);
}

#[test]
fn test_static_file() {
    let input = [1000.0f32, -1.5, 3., 0.25, 0.5, -0.125];
    let args = QuantizeArgs {
        hidden_dim: 3,
        dtype: "f32".into(),
        format: Some("fnuz".into()),
        scale: Some(0.5),
        ..Default::default()
    };
    let (fp8, scale) = quantize_in_temp("static", &input, args);

    assert_eq!(scale, [0.5f32, 0.5]);
    let values = fp8
        .iter()
        .map(|&b| F8E4M3Fnuz::from_bits(b).to_f32())
        .collect::<Vec<_>>();
    assert_eq!(values, [224.0f32, -3., 6., 0.5, 1., -0.25]);
}

#[test]
fn test_per_tensor_file() {
    let input = [1.0f32, -2., 0.5, 4.];
    let args = QuantizeArgs {
        hidden_dim: 2,
        dtype: "f32".into(),
        format: Some("e4m3fn".into()),
        per_tensor: true,
        group_width: Some(1),
        ..Default::default()
    };
    let (fp8, scale) = quantize_in_temp("tensor", &input, args);

    assert_eq!(scale, [4.0f32 / 448.]);
    let values = fp8
        .iter()
        .map(|&b| F8E4M3Fn::from_bits(b).to_f32())
        .collect::<Vec<_>>();
    assert_eq!(values, [112.0f32, -224., 56., 448.]);
}

#[test]
fn test_bad_shape() {
    let dir = std::env::temp_dir().join(format!("fp8-utils-{}-shape", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let file = dir.join("shape.bin");
    fs::write(&file, [0u8; 20]).unwrap();

    let args = QuantizeArgs {
        file: file.clone(),
        hidden_dim: 3,
        dtype: "f32".into(),
        ..Default::default()
    };
    assert!(matches!(args.quantize(), Err(XtaskError::Args(_))));

    let args = QuantizeArgs {
        file,
        hidden_dim: 5,
        dtype: "f32".into(),
        scale: Some(-1.),
        ..Default::default()
    };
    assert!(matches!(args.quantize(), Err(XtaskError::Args(_))));
    fs::remove_dir_all(dir).unwrap();
}
