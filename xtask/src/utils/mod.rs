mod dtype;
mod file_info;
mod output;
mod read;
mod write;

pub(crate) use dtype::{DType, Format};
pub(crate) use file_info::{show_file_info, FileInfo};
pub(crate) use output::MemSize;
pub(crate) use read::{map_file, read_scales, reslice};
pub(crate) use write::{malloc, reslice_mut, write_scales};
