//! Conversions between Rust values and the native text, string-array and
//! token-buffer representations.

use std::ffi::{CStr, CString, c_char};
use std::path::Path;
use std::ptr;

use ovgenai_sys::ov_genai_char_arrays_t;
use tracing::warn;

use crate::error::{GenAiError, Result};
use crate::platform::TextEncoding;

/// Signature shared by `ov_genai_free` and `ov_free`.
pub(crate) type FreeFn = unsafe extern "C" fn(*const c_char);

//  Text

/// Encode `text` for a native call.
pub(crate) fn to_c_string(text: &str, encoding: TextEncoding) -> Result<CString> {
    let bytes = match encoding {
        TextEncoding::Utf8 => text.as_bytes().to_vec(),
        TextEncoding::Ansi => encode_ansi(text)?,
    };
    CString::new(bytes).map_err(|err| {
        GenAiError::InvalidArgument(format!(
            "text contains an interior NUL at byte {}",
            err.nul_position()
        ))
    })
}

pub(crate) fn path_to_c_string(path: &Path, encoding: TextEncoding) -> Result<CString> {
    let text = path.to_str().ok_or_else(|| {
        GenAiError::InvalidArgument(format!("path is not valid Unicode: {}", path.display()))
    })?;
    to_c_string(text, encoding)
}

/// Decode bytes produced by the native side. Invalid sequences are replaced,
/// never rejected.
pub(crate) fn decode_text(bytes: &[u8], encoding: TextEncoding) -> String {
    match encoding {
        TextEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        TextEncoding::Ansi => decode_ansi(bytes),
    }
}

/// Copy a borrowed native string. Null yields `None`.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string valid for the call.
pub(crate) unsafe fn copy_native_str(ptr: *const c_char, encoding: TextEncoding) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let bytes = unsafe { CStr::from_ptr(ptr) }.to_bytes();
    Some(decode_text(bytes, encoding))
}

/// Copy a native-owned string and release it with `free`.
///
/// # Safety
///
/// `ptr` must be null or a NUL-terminated string allocated by the library
/// that exports `free`, not yet released.
pub(crate) unsafe fn take_native_string(
    ptr: *const c_char,
    encoding: TextEncoding,
    free: FreeFn,
) -> Option<String> {
    let text = unsafe { copy_native_str(ptr, encoding) }?;
    unsafe { free(ptr) };
    Some(text)
}

#[cfg(windows)]
fn encode_ansi(text: &str) -> Result<Vec<u8>> {
    use windows::Win32::Globalization::{
        CP_ACP, MULTI_BYTE_TO_WIDE_CHAR_FLAGS, MultiByteToWideChar, WC_NO_BEST_FIT_CHARS,
        WideCharToMultiByte,
    };
    use windows::core::PCSTR;

    if text.is_empty() {
        return Ok(Vec::new());
    }
    let wide: Vec<u16> = text.encode_utf16().collect();
    let unmappable = || {
        GenAiError::InvalidArgument(format!(
            "text cannot be represented in the active code page: {text:?}"
        ))
    };

    let len = unsafe {
        WideCharToMultiByte(CP_ACP, WC_NO_BEST_FIT_CHARS, &wide, None, PCSTR::null(), None)
    };
    if len <= 0 {
        return Err(unmappable());
    }
    let mut bytes = vec![0u8; len as usize];
    let written = unsafe {
        WideCharToMultiByte(
            CP_ACP,
            WC_NO_BEST_FIT_CHARS,
            &wide,
            Some(&mut bytes),
            PCSTR::null(),
            None,
        )
    };
    bytes.truncate(written.max(0) as usize);

    // Unmappable characters come back as the default char; only an exact
    // round trip is accepted.
    let flags = MULTI_BYTE_TO_WIDE_CHAR_FLAGS(0);
    let back_len = unsafe { MultiByteToWideChar(CP_ACP, flags, &bytes, None) };
    let mut back = vec![0u16; back_len.max(0) as usize];
    unsafe { MultiByteToWideChar(CP_ACP, flags, &bytes, Some(&mut back)) };
    if back != wide {
        return Err(unmappable());
    }
    Ok(bytes)
}

#[cfg(windows)]
fn decode_ansi(bytes: &[u8]) -> String {
    use windows::Win32::Globalization::{CP_ACP, MULTI_BYTE_TO_WIDE_CHAR_FLAGS, MultiByteToWideChar};

    if bytes.is_empty() {
        return String::new();
    }
    let flags = MULTI_BYTE_TO_WIDE_CHAR_FLAGS(0);
    let len = unsafe { MultiByteToWideChar(CP_ACP, flags, bytes, None) };
    let mut wide = vec![0u16; len.max(0) as usize];
    let written = unsafe { MultiByteToWideChar(CP_ACP, flags, bytes, Some(&mut wide)) };
    wide.truncate(written.max(0) as usize);
    String::from_utf16_lossy(&wide)
}

// Outside Windows there is no process code page; Latin-1 stands in for it.
#[cfg(not(windows))]
fn encode_ansi(text: &str) -> Result<Vec<u8>> {
    text.chars()
        .map(|c| {
            u8::try_from(u32::from(c)).map_err(|_| {
                GenAiError::InvalidArgument(format!(
                    "character {c:?} cannot be represented in a single-byte code page"
                ))
            })
        })
        .collect()
}

#[cfg(not(windows))]
fn decode_ansi(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

//  String arrays

/// A `(char**, size)` batch that owns its strings for the duration of a call.
pub(crate) struct StringArray {
    _strings: Vec<CString>,
    _pointers: Vec<*mut c_char>,
    raw: ov_genai_char_arrays_t,
}

impl StringArray {
    pub(crate) fn new<S: AsRef<str>>(items: &[S], encoding: TextEncoding) -> Result<Self> {
        let strings = items
            .iter()
            .map(|item| to_c_string(item.as_ref(), encoding))
            .collect::<Result<Vec<_>>>()?;
        let mut pointers: Vec<*mut c_char> =
            strings.iter().map(|s| s.as_ptr().cast_mut()).collect();
        let raw = ov_genai_char_arrays_t {
            string_array: if pointers.is_empty() {
                ptr::null_mut()
            } else {
                pointers.as_mut_ptr()
            },
            size: pointers.len(),
        };
        Ok(Self {
            _strings: strings,
            _pointers: pointers,
            raw,
        })
    }

    /// Pointer valid while `self` is alive.
    pub(crate) fn as_raw(&self) -> *const ov_genai_char_arrays_t {
        &self.raw
    }

    pub(crate) fn len(&self) -> usize {
        self.raw.size
    }
}

/// Copy every element of a char-array without taking ownership.
///
/// # Safety
///
/// `raw.string_array` must be null (with `size == 0`) or point to `size`
/// valid NUL-terminated strings.
pub(crate) unsafe fn read_char_arrays(
    raw: &ov_genai_char_arrays_t,
    encoding: TextEncoding,
) -> Vec<String> {
    if raw.string_array.is_null() {
        return Vec::new();
    }
    let elements = unsafe { std::slice::from_raw_parts(raw.string_array, raw.size) };
    elements
        .iter()
        .map(|&element| unsafe { copy_native_str(element, encoding) }.unwrap_or_default())
        .collect()
}

/// Copy a native-owned char-array, release each element and the array with
/// `free`, and reset `raw` to empty.
///
/// # Safety
///
/// Same as [`read_char_arrays`]; additionally every element and the array
/// itself must have been allocated by the library exporting `free`.
pub(crate) unsafe fn take_char_arrays(
    raw: &mut ov_genai_char_arrays_t,
    encoding: TextEncoding,
    free: FreeFn,
) -> Vec<String> {
    let texts = unsafe { read_char_arrays(raw, encoding) };
    if !raw.string_array.is_null() {
        let elements = unsafe { std::slice::from_raw_parts(raw.string_array, raw.size) };
        for &element in elements {
            if !element.is_null() {
                unsafe { free(element) };
            }
        }
        unsafe { free(raw.string_array.cast::<c_char>()) };
    } else if raw.size != 0 {
        warn!(size = raw.size, "native string array has a size but no storage");
    }
    *raw = ov_genai_char_arrays_t::default();
    texts
}

//  Token buffers

/// Token ids as the native `int64_t` buffer.
pub(crate) fn token_buffer(tokens: &[u64]) -> Result<Vec<i64>> {
    tokens
        .iter()
        .map(|&token| {
            i64::try_from(token).map_err(|_| {
                GenAiError::InvalidArgument(format!("token id {token} does not fit in int64_t"))
            })
        })
        .collect()
}

pub(crate) fn native_len(len: usize) -> Result<i64> {
    i64::try_from(len)
        .map_err(|_| GenAiError::InvalidArgument(format!("length {len} does not fit in int64_t")))
}

/// A ragged batch of token rows flattened for the native call: one contiguous
/// buffer, the length of each row, and the row count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TokenBatch {
    pub(crate) flat: Vec<i64>,
    pub(crate) row_lengths: Vec<i64>,
}

impl TokenBatch {
    pub(crate) fn new<R: AsRef<[u64]>>(rows: &[R]) -> Result<Self> {
        let total = rows.iter().map(|row| row.as_ref().len()).sum();
        let mut flat = Vec::with_capacity(total);
        let mut row_lengths = Vec::with_capacity(rows.len());
        for row in rows {
            let row = row.as_ref();
            flat.extend(token_buffer(row)?);
            row_lengths.push(native_len(row.len())?);
        }
        Ok(Self { flat, row_lengths })
    }

    pub(crate) fn rows(&self) -> Result<i64> {
        native_len(self.row_lengths.len())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use pretty_assertions::assert_eq;

    use super::*;

    thread_local! {
        static FREED: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
    }

    // Records instead of releasing; tests reclaim the memory themselves.
    unsafe extern "C" fn recording_free(ptr: *const c_char) {
        FREED.with(|freed| freed.borrow_mut().push(ptr as usize));
    }

    fn freed() -> Vec<usize> {
        FREED.with(|freed| freed.take())
    }

    #[test]
    fn utf8_text_passes_through() {
        let c = to_c_string("héllo wörld", TextEncoding::Utf8).unwrap();
        assert_eq!(c.as_bytes(), "héllo wörld".as_bytes());
    }

    #[test]
    fn interior_nul_is_rejected() {
        for encoding in [TextEncoding::Utf8, TextEncoding::Ansi] {
            let err = to_c_string("ab\0cd", encoding).unwrap_err();
            assert!(matches!(err, GenAiError::InvalidArgument(_)), "{err}");
        }
    }

    #[test]
    fn empty_text_is_an_empty_c_string() {
        assert_eq!(to_c_string("", TextEncoding::Utf8).unwrap().as_bytes(), b"");
    }

    #[cfg(not(windows))]
    #[test]
    fn single_byte_encoding_maps_latin1() {
        let c = to_c_string("café", TextEncoding::Ansi).unwrap();
        assert_eq!(c.as_bytes(), b"caf\xe9");
        assert_eq!(decode_text(c.as_bytes(), TextEncoding::Ansi), "café");
    }

    #[cfg(not(windows))]
    #[test]
    fn single_byte_encoding_rejects_wide_characters() {
        let err = to_c_string("日本", TextEncoding::Ansi).unwrap_err();
        assert!(matches!(err, GenAiError::InvalidArgument(_)), "{err}");
    }

    #[test]
    fn invalid_utf8_output_is_replaced() {
        assert_eq!(decode_text(b"ok\xff", TextEncoding::Utf8), "ok\u{fffd}");
    }

    #[test]
    fn string_array_round_trip() {
        for n in [0usize, 1, 10_000] {
            let items: Vec<String> = (0..n).map(|i| format!("prompt {i}")).collect();
            let array = StringArray::new(&items, TextEncoding::Utf8).unwrap();
            assert_eq!(array.len(), n);
            let back = unsafe { read_char_arrays(&*array.as_raw(), TextEncoding::Utf8) };
            assert_eq!(back, items);
        }
    }

    #[test]
    fn empty_string_array_has_null_storage() {
        let array = StringArray::new::<&str>(&[], TextEncoding::Utf8).unwrap();
        let raw = unsafe { &*array.as_raw() };
        assert!(raw.string_array.is_null());
        assert_eq!(raw.size, 0);
    }

    #[test]
    fn string_array_rejects_any_bad_element() {
        let err = StringArray::new(&["fine", "bad\0"], TextEncoding::Utf8)
            .err()
            .unwrap();
        assert!(matches!(err, GenAiError::InvalidArgument(_)), "{err}");
    }

    #[test]
    fn take_native_string_frees_once() {
        let raw = CString::new("native text").unwrap().into_raw();
        let text = unsafe { take_native_string(raw, TextEncoding::Utf8, recording_free) };
        assert_eq!(text.as_deref(), Some("native text"));
        assert_eq!(freed(), vec![raw as usize]);
        drop(unsafe { CString::from_raw(raw) });
    }

    #[test]
    fn take_native_string_skips_null() {
        let text = unsafe { take_native_string(ptr::null(), TextEncoding::Utf8, recording_free) };
        assert_eq!(text, None);
        assert!(freed().is_empty());
    }

    #[test]
    fn take_char_arrays_frees_elements_then_array() {
        let elements: Vec<*mut c_char> = ["a", "bb", "ccc"]
            .iter()
            .map(|s| CString::new(*s).unwrap().into_raw())
            .collect();
        let array = Box::into_raw(elements.clone().into_boxed_slice()).cast::<*mut c_char>();
        let mut raw = ov_genai_char_arrays_t {
            string_array: array,
            size: elements.len(),
        };

        let texts = unsafe { take_char_arrays(&mut raw, TextEncoding::Utf8, recording_free) };
        assert_eq!(texts, vec!["a", "bb", "ccc"]);
        assert!(raw.string_array.is_null());
        assert_eq!(raw.size, 0);

        let mut expected: Vec<usize> = elements.iter().map(|&p| p as usize).collect();
        expected.push(array as usize);
        assert_eq!(freed(), expected);

        for element in elements {
            drop(unsafe { CString::from_raw(element) });
        }
        drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(array, 3)) });
    }

    #[test]
    fn token_ids_must_fit_in_int64() {
        assert_eq!(token_buffer(&[0, 1, i64::MAX as u64]).unwrap(), vec![0, 1, i64::MAX]);
        let err = token_buffer(&[1, u64::MAX]).unwrap_err();
        assert!(matches!(err, GenAiError::InvalidArgument(_)), "{err}");
    }

    #[test]
    fn ragged_batch_layout() {
        let rows: Vec<Vec<u64>> = vec![vec![1, 2, 3], vec![], vec![4]];
        let batch = TokenBatch::new(&rows).unwrap();
        assert_eq!(batch.flat, vec![1, 2, 3, 4]);
        assert_eq!(batch.row_lengths, vec![3, 0, 1]);
        assert_eq!(batch.rows().unwrap(), 3);
    }

    #[test]
    fn empty_batch() {
        let batch = TokenBatch::new::<Vec<u64>>(&[]).unwrap();
        assert!(batch.flat.is_empty());
        assert_eq!(batch.rows().unwrap(), 0);
    }
}
