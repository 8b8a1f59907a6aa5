//! Stride-aware conversion between a caller's memory layout and the
//! column-major layout used on disk.

use crate::checksum::checksum;
use crate::error::{Result, SerError};

/// Per-dimension shape plus the caller's byte strides for that dimension.
/// A size of 1 makes the corresponding stride irrelevant (it is never read).
#[derive(Debug, Clone, Copy)]
pub struct AxisLayout {
    pub size: u32,
    pub stride: isize,
}

impl AxisLayout {
    pub fn new(size: u32, stride: isize) -> Self {
        Self { size, stride }
    }
}

/// The four-axis shape/stride description shared by write and read.
#[derive(Debug, Clone, Copy)]
pub struct Layout4 {
    pub i: AxisLayout,
    pub j: AxisLayout,
    pub k: AxisLayout,
    pub l: AxisLayout,
}

impl Layout4 {
    pub fn new(i: AxisLayout, j: AxisLayout, k: AxisLayout, l: AxisLayout) -> Self {
        Self { i, j, k, l }
    }

    fn element_count(&self) -> usize {
        self.i.size as usize * self.j.size as usize * self.k.size as usize * self.l.size as usize
    }
}

/// Linearizes `src` (the caller's strided buffer) into a freshly allocated
/// column-major buffer, then returns it along with its checksum.
///
/// The loop nest is `l, k, j, i` with `i` fastest, matching the reference
/// implementation's `BinarySerializer::WriteArray` exactly: the linear index
/// for element `(i, j, k, l)` is `((l*K + k)*J + j)*I + i`.
pub fn write_array(
    src: &[u8],
    bytes_per_element: usize,
    layout: &Layout4,
) -> Result<(Vec<u8>, String)> {
    let n = layout.element_count();
    let mut out = vec![0u8; n * bytes_per_element];

    let mut pos = 0usize;
    for l in 0..layout.l.size as isize {
        for k in 0..layout.k.size as isize {
            for j in 0..layout.j.size as isize {
                for i in 0..layout.i.size as isize {
                    let src_offset = i * layout.i.stride
                        + j * layout.j.stride
                        + k * layout.k.stride
                        + l * layout.l.stride;
                    let src_offset = usize::try_from(src_offset).map_err(|_| {
                        SerError::MalformedIndex("negative source offset in transcoder".into())
                    })?;
                    let src_end = src_offset + bytes_per_element;
                    if src_end > src.len() {
                        return Err(SerError::MalformedIndex(
                            "source buffer too small for declared strides".into(),
                        ));
                    }
                    out[pos..pos + bytes_per_element].copy_from_slice(&src[src_offset..src_end]);
                    pos += bytes_per_element;
                }
            }
        }
    }

    let sum = checksum(&out);
    Ok((out, sum))
}

/// Scatters a column-major buffer (as produced by [`write_array`]) into the
/// caller's strided destination.
pub fn read_array(
    data: &[u8],
    dest: &mut [u8],
    bytes_per_element: usize,
    layout: &Layout4,
) -> Result<()> {
    let n = layout.element_count();
    let expected_len = n * bytes_per_element;
    if data.len() != expected_len {
        return Err(SerError::MalformedIndex(format!(
            "expected {} bytes of field data, found {}",
            expected_len,
            data.len()
        )));
    }

    let mut pos = 0usize;
    for l in 0..layout.l.size as isize {
        for k in 0..layout.k.size as isize {
            for j in 0..layout.j.size as isize {
                for i in 0..layout.i.size as isize {
                    let dest_offset = i * layout.i.stride
                        + j * layout.j.stride
                        + k * layout.k.stride
                        + l * layout.l.stride;
                    let dest_offset = usize::try_from(dest_offset).map_err(|_| {
                        SerError::MalformedIndex("negative destination offset in transcoder".into())
                    })?;
                    let dest_end = dest_offset + bytes_per_element;
                    if dest_end > dest.len() {
                        return Err(SerError::MalformedIndex(
                            "destination buffer too small for declared strides".into(),
                        ));
                    }
                    dest[dest_offset..dest_end].copy_from_slice(&data[pos..pos + bytes_per_element]);
                    pos += bytes_per_element;
                }
            }
        }
    }

    Ok(())
}
