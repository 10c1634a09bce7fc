use crate::XtaskError;
use memmap2::MmapMut;
use std::{alloc::Layout, fs, path::Path};

/// Anonymous mapping holding `len` elements of `T`.
#[inline]
pub(crate) fn malloc<T>(len: usize) -> Result<MmapMut, XtaskError> {
    let size = Layout::array::<T>(len)
        .map_err(|_| XtaskError::Args(format!("cannot allocate {len} elements")))?
        .size();
    // zero-length anonymous maps are rejected by the kernel
    Ok(MmapMut::map_anon(size.max(1))?)
}

#[inline]
pub(crate) fn reslice_mut<T>(data: &mut [u8], len: usize) -> &mut [T] {
    let ([], data, _) = (unsafe { data.align_to_mut::<T>() }) else {
        unreachable!("anonymous maps are page aligned")
    };
    &mut data[..len]
}

pub(crate) fn write_scales(path: impl AsRef<Path>, scale: &[f32]) -> Result<usize, XtaskError> {
    let bytes = scale.iter().flat_map(|s| s.to_le_bytes()).collect::<Vec<_>>();
    fs::write(path, &bytes)?;
    Ok(bytes.len())
}

#[test]
fn test_scales_file() {
    let path = std::env::temp_dir().join(format!("fp8-utils-{}.scale", std::process::id()));
    let scale = [0.5f32, 1e-3, 0., 448.];
    assert_eq!(write_scales(&path, &scale).unwrap(), 16);
    assert_eq!(super::read_scales(&path).unwrap(), scale);
    fs::remove_file(path).unwrap();
}

#[test]
fn test_malloc() {
    let mut mem = malloc::<f32>(3).unwrap();
    let data = reslice_mut::<f32>(&mut mem, 3);
    assert_eq!(data, [0.0f32; 3]);
    let mut mem = malloc::<u8>(0).unwrap();
    assert!(reslice_mut::<u8>(&mut mem, 0).is_empty());
}
