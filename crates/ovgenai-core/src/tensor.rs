//! Read access to `ov_tensor_t` values produced by the tokenizer.

use std::ffi::c_void;

use ovgenai_sys::{ov_shape_t, ov_tensor_t};
use tracing::warn;

use crate::call;
use crate::error::{GenAiError, Result};
use crate::handle::{AsRawHandle, NativeHandle, TensorKind};
use crate::loader::tensor_api;
use crate::tokenizer::TokenId;

/// An owned OpenVINO tensor of `int64` elements (token ids or attention mask).
#[derive(Debug)]
pub struct Tensor {
    handle: NativeHandle<TensorKind>,
}

// Safety: the tensor is only read through this wrapper, and every native call
// on it is serialized by the call lock.
unsafe impl Send for Tensor {}
unsafe impl Sync for Tensor {}

impl AsRawHandle for Tensor {
    type Raw = ov_tensor_t;

    fn as_raw(&self) -> Result<*mut ov_tensor_t> {
        self.handle.as_raw()
    }
}

impl Tensor {
    pub(crate) fn from_handle(handle: NativeHandle<TensorKind>) -> Self {
        Self { handle }
    }

    /// Dimensions, outermost first. Token tensors are `[batch, sequence]`.
    pub fn shape(&self) -> Result<Vec<usize>> {
        let api = tensor_api()?;
        let ptr = self.as_raw()?;
        let mut shape = ov_shape_t::default();
        call::checked(api, || unsafe { (api.sym.tensor_get_shape)(ptr, &mut shape) })?;

        let dims = if shape.dims.is_null() || shape.rank <= 0 {
            Ok(Vec::new())
        } else {
            let rank = shape.rank as usize;
            unsafe { std::slice::from_raw_parts(shape.dims, rank) }
                .iter()
                .map(|&dim| {
                    usize::try_from(dim).map_err(|_| {
                        GenAiError::UnexpectedOutput(format!("negative tensor dimension {dim}"))
                    })
                })
                .collect()
        };

        let freed = call::locked(|| unsafe { (api.sym.shape_free)(&mut shape) });
        if freed != ovgenai_sys::OV_STATUS_OK {
            warn!(code = freed, "ov_shape_free failed");
        }
        dims
    }

    /// Total number of elements.
    pub fn len(&self) -> Result<usize> {
        let api = tensor_api()?;
        let ptr = self.as_raw()?;
        let mut size = 0usize;
        call::checked(api, || unsafe { (api.sym.tensor_get_size)(ptr, &mut size) })?;
        Ok(size)
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|len| len == 0)
    }

    /// Copy of the element buffer.
    pub fn to_vec_i64(&self) -> Result<Vec<i64>> {
        let len = self.len()?;
        if len == 0 {
            return Ok(Vec::new());
        }
        let api = tensor_api()?;
        let ptr = self.as_raw()?;
        let mut data: *mut c_void = std::ptr::null_mut();
        call::checked(api, || unsafe { (api.sym.tensor_data)(ptr, &mut data) })?;
        if data.is_null() {
            return Err(GenAiError::null_handle("ov_tensor_data"));
        }
        Ok(unsafe { std::slice::from_raw_parts(data.cast::<i64>(), len) }.to_vec())
    }

    /// Elements split into rows along the outermost dimension. A rank-1
    /// tensor is a single row.
    pub fn token_rows(&self) -> Result<Vec<Vec<TokenId>>> {
        let shape = self.shape()?;
        let values = self.to_vec_i64()?;
        let ids = values
            .into_iter()
            .map(|value| {
                TokenId::try_from(value).map_err(|_| {
                    GenAiError::UnexpectedOutput(format!("negative token id {value}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        split_rows(&shape, ids)
    }

    /// Release the tensor now instead of on drop.
    pub fn dispose(&mut self) {
        self.handle.dispose();
    }
}

fn split_rows<T: Clone>(shape: &[usize], values: Vec<T>) -> Result<Vec<Vec<T>>> {
    match shape {
        [] if values.is_empty() => Ok(Vec::new()),
        [_] => Ok(vec![values]),
        [rows, cols] => {
            if rows.checked_mul(*cols) != Some(values.len()) {
                return Err(GenAiError::UnexpectedOutput(format!(
                    "tensor shape {shape:?} does not match {} elements",
                    values.len()
                )));
            }
            if *cols == 0 {
                return Ok(vec![Vec::new(); *rows]);
            }
            Ok(values.chunks(*cols).map(<[T]>::to_vec).collect())
        }
        _ => Err(GenAiError::UnexpectedOutput(format!(
            "expected a rank-1 or rank-2 token tensor, got shape {shape:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn splits_batch_by_sequence_length() {
        let rows = split_rows(&[2, 3], vec![1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(rows, vec![vec![1, 2, 3], vec![4, 5, 6]]);
    }

    #[test]
    fn rank_one_is_one_row() {
        assert_eq!(split_rows(&[3], vec![7, 8, 9]).unwrap(), vec![vec![7, 8, 9]]);
    }

    #[test]
    fn zero_width_rows() {
        assert_eq!(
            split_rows::<u64>(&[2, 0], Vec::new()).unwrap(),
            vec![Vec::<u64>::new(), Vec::new()]
        );
    }

    #[test]
    fn mismatched_shape_is_rejected() {
        let err = split_rows(&[2, 2], vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, GenAiError::UnexpectedOutput(_)), "{err}");
    }

    #[test]
    fn overflowing_shape_is_rejected() {
        let err = split_rows::<u64>(&[usize::MAX, 2], vec![1]).unwrap_err();
        assert!(matches!(err, GenAiError::UnexpectedOutput(_)), "{err}");
    }

    #[test]
    fn higher_rank_is_rejected() {
        let err = split_rows(&[1, 1, 1], vec![1]).unwrap_err();
        assert!(matches!(err, GenAiError::UnexpectedOutput(_)), "{err}");
    }
}
