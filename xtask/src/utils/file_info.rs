use super::MemSize;
use std::{cmp::max, path::PathBuf};

pub(crate) struct FileInfo {
    pub path: PathBuf,
    pub n_tokens: usize,
    pub n_bytes: usize,
}

pub(crate) fn show_file_info(file_info: &[FileInfo]) {
    if file_info.is_empty() {
        return;
    }

    const PATH: &str = "Path";
    const SIZE: &str = "Size";
    const TOKENS: &str = "Tokens";

    let mut max_path_len = PATH.len();
    let mut max_size_len = SIZE.len();
    let mut max_tokens_len = TOKENS.len();

    let mut path = Vec::with_capacity(file_info.len());
    let mut size = Vec::with_capacity(file_info.len());
    let mut tokens = Vec::with_capacity(file_info.len());

    for info in file_info {
        let path_ = info.path.display().to_string();
        let size_ = MemSize(info.n_bytes).to_string();
        let tokens_ = info.n_tokens.to_string();

        max_path_len = max(max_path_len, path_.len());
        max_size_len = max(max_size_len, size_.len());
        max_tokens_len = max(max_tokens_len, tokens_.len());

        path.push(path_);
        size.push(size_);
        tokens.push(tokens_);
    }

    let line = format!(
        "+-{0:-<max_path_len$}-+-{0:-<max_size_len$}-+-{0:-<max_tokens_len$}-+",
        ""
    );
    println!("{line}");
    println!("| {PATH:^max_path_len$} | {SIZE:^max_size_len$} | {TOKENS:^max_tokens_len$} |");
    println!("{line}");
    for (p, s, t) in itertools::izip!(path, size, tokens) {
        println!("| {p:<max_path_len$} | {s:>max_size_len$} | {t:>max_tokens_len$} |");
    }
    println!("{line}");
}
