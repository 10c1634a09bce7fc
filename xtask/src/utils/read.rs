use crate::{bail, XtaskError};
use memmap2::Mmap;
use std::{fs::File, path::Path};

pub(crate) fn map_file(path: impl AsRef<Path>) -> Result<Mmap, XtaskError> {
    let file = File::open(path)?;
    Ok(unsafe { Mmap::map(&file) }?)
}

/// Views raw bytes as `T`. Mapped files are page aligned, so only a partial
/// trailing element can fail.
pub(crate) fn reslice<T>(data: &[u8]) -> Result<&[T], XtaskError> {
    let ([], data, []) = (unsafe { data.align_to::<T>() }) else {
        bail!(
            "{} bytes is not a whole number of {}-byte elements",
            data.len(),
            size_of::<T>()
        )
    };
    Ok(data)
}

/// Reads little-endian `f32` scales.
pub(crate) fn read_scales(path: impl AsRef<Path>) -> Result<Vec<f32>, XtaskError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    if bytes.len() % size_of::<f32>() != 0 {
        bail!("{} is not a f32 scale file", path.display())
    }
    Ok(bytes
        .chunks_exact(size_of::<f32>())
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

#[test]
fn test_reslice() {
    let data = [0u32, 1, 2];
    let bytes = unsafe { std::slice::from_raw_parts(data.as_ptr().cast::<u8>(), 12) };
    assert_eq!(reslice::<u32>(bytes).unwrap(), [0, 1, 2]);
    assert!(reslice::<u32>(&bytes[..10]).is_err());
}
