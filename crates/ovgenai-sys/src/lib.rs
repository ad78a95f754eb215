//! Raw FFI declarations for the OpenVINO GenAI C wrapper (`openvino_genai_c`)
//! and the slice of the OpenVINO C API (`openvino_c`) that owns `ov_tensor_t`.
//!
//! Nothing here is linked at build time. The symbol tables are filled from a
//! [`libloading::Library`] opened by the caller, so a missing or foreign
//! binary surfaces as an error value instead of a link failure.

#![allow(non_camel_case_types)]

use std::ffi::{c_char, c_int, c_void};
use std::fmt;

use libloading::Library;

/// Status returned by every fallible entry point. `0` is success.
pub type ov_status_e = c_int;

pub const OV_STATUS_OK: ov_status_e = 0;

/// Base name of the GenAI C wrapper.
pub const GENAI_LIBRARY: &str = "openvino_genai_c";

/// Base name of the OpenVINO C API library.
pub const OPENVINO_C_LIBRARY: &str = "openvino_c";

macro_rules! opaque {
    ($($name:ident),* $(,)?) => {
        $(
            #[repr(C)]
            pub struct $name {
                _private: [u8; 0],
            }
        )*
    };
}

opaque!(
    ov_genai_tokenizer_t,
    ov_genai_tokenized_inputs_t,
    ov_genai_llm_pipeline_t,
    ov_genai_decoded_results_t,
    ov_tensor_t,
);

/// `char**` plus element count, used for string batches in both directions.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ov_genai_char_arrays_t {
    pub string_array: *mut *mut c_char,
    pub size: usize,
}

impl Default for ov_genai_char_arrays_t {
    fn default() -> Self {
        Self {
            string_array: std::ptr::null_mut(),
            size: 0,
        }
    }
}

/// Tensor shape as reported by `ov_tensor_get_shape`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ov_shape_t {
    pub rank: i64,
    pub dims: *mut i64,
}

impl Default for ov_shape_t {
    fn default() -> Self {
        Self {
            rank: 0,
            dims: std::ptr::null_mut(),
        }
    }
}

/// A required export was absent from an otherwise loadable library.
#[derive(Debug)]
pub struct MissingSymbol {
    pub symbol: &'static str,
    pub source: libloading::Error,
}

impl fmt::Display for MissingSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "symbol '{}' not exported: {}", self.symbol, self.source)
    }
}

impl std::error::Error for MissingSymbol {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

macro_rules! symbol_table {
    (
        $(#[$meta:meta])*
        pub struct $table:ident {
            $( $field:ident : $ty:ty = $symbol:literal, )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        pub struct $table {
            $( pub $field: $ty, )*
        }

        impl $table {
            /// Resolve every entry point of the table from `lib`.
            ///
            /// # Safety
            ///
            /// The declared signatures must match the library's exports, and
            /// the returned function pointers are only valid while `lib`
            /// stays loaded.
            pub unsafe fn load(lib: &Library) -> Result<Self, MissingSymbol> {
                Ok(Self {
                    $(
                        $field: unsafe {
                            *lib.get::<$ty>(concat!($symbol, "\0").as_bytes())
                                .map_err(|source| MissingSymbol { symbol: $symbol, source })?
                        },
                    )*
                })
            }
        }
    };
}

symbol_table! {
    /// Entry points of `openvino_genai_c`.
    pub struct GenAiSymbols {
        llm_sizeof: unsafe extern "C" fn() -> c_int = "ov_genai_llm_sizeof",
        get_error_info: unsafe extern "C" fn(ov_status_e) -> *const c_char = "ov_genai_get_error_info",
        get_last_err_msg: unsafe extern "C" fn() -> *const c_char = "ov_genai_get_last_err_msg",
        free: unsafe extern "C" fn(*const c_char) = "ov_genai_free",

        tokenizer_create: unsafe extern "C" fn(*mut *mut ov_genai_tokenizer_t) -> ov_status_e
            = "ov_genai_tokenizer_create",
        tokenizer_create_with_path: unsafe extern "C" fn(
            *const c_char,
            *mut *mut ov_genai_tokenizer_t,
        ) -> ov_status_e = "ov_genai_tokenizer_create_with_path",
        tokenizer_free: unsafe extern "C" fn(*mut ov_genai_tokenizer_t) = "ov_genai_tokenizer_free",
        tokenizer_encode_string: unsafe extern "C" fn(
            *mut ov_genai_tokenizer_t,
            *const c_char,
            *mut *mut ov_genai_tokenized_inputs_t,
        ) -> ov_status_e = "ov_genai_tokenizer_encode_string",
        tokenizer_encode_strings: unsafe extern "C" fn(
            *mut ov_genai_tokenizer_t,
            *const ov_genai_char_arrays_t,
            *mut *mut ov_genai_tokenized_inputs_t,
        ) -> ov_status_e = "ov_genai_tokenizer_encode_strings",
        tokenizer_decode_string_tokens: unsafe extern "C" fn(
            *mut ov_genai_tokenizer_t,
            *mut i64,
            i64,
            *mut *mut c_char,
        ) -> ov_status_e = "ov_genai_tokenizer_decode_string_tokens",
        tokenizer_decode_tensor: unsafe extern "C" fn(
            *mut ov_genai_tokenizer_t,
            *mut ov_tensor_t,
            *mut ov_genai_char_arrays_t,
        ) -> ov_status_e = "ov_genai_tokenizer_decode_tensor",
        tokenizer_decode_tokens_array: unsafe extern "C" fn(
            *mut ov_genai_tokenizer_t,
            *mut i64,
            *mut i64,
            i64,
            *mut ov_genai_char_arrays_t,
        ) -> ov_status_e = "ov_genai_tokenizer_decode_tokens_array",
        tokenizer_get_bos_token_id: unsafe extern "C" fn(*mut ov_genai_tokenizer_t, *mut i64) -> ov_status_e
            = "ov_genai_tokenizer_get_bos_token_id",
        tokenizer_get_eos_token_id: unsafe extern "C" fn(*mut ov_genai_tokenizer_t, *mut i64) -> ov_status_e
            = "ov_genai_tokenizer_get_eos_token_id",
        tokenizer_get_pad_token_id: unsafe extern "C" fn(*mut ov_genai_tokenizer_t, *mut i64) -> ov_status_e
            = "ov_genai_tokenizer_get_pad_token_id",
        tokenizer_get_bos_token: unsafe extern "C" fn(*mut ov_genai_tokenizer_t, *mut *mut c_char) -> ov_status_e
            = "ov_genai_tokenizer_get_bos_token",
        tokenizer_get_eos_token: unsafe extern "C" fn(*mut ov_genai_tokenizer_t, *mut *mut c_char) -> ov_status_e
            = "ov_genai_tokenizer_get_eos_token",
        tokenizer_get_pad_token: unsafe extern "C" fn(*mut ov_genai_tokenizer_t, *mut *mut c_char) -> ov_status_e
            = "ov_genai_tokenizer_get_pad_token",

        tokenized_inputs_free: unsafe extern "C" fn(*mut ov_genai_tokenized_inputs_t)
            = "ov_genai_tokenized_inputs_free",
        tokenized_inputs_get_input_ids: unsafe extern "C" fn(
            *mut ov_genai_tokenized_inputs_t,
            *mut *mut ov_tensor_t,
        ) -> ov_status_e = "ov_genai_tokenized_inputs_get_input_ids",
        tokenized_inputs_get_attention_mask: unsafe extern "C" fn(
            *mut ov_genai_tokenized_inputs_t,
            *mut *mut ov_tensor_t,
        ) -> ov_status_e = "ov_genai_tokenized_inputs_get_attention_mask",

        // The trailing variadic part always carries one `(key, value)`
        // property pair of C strings.
        llm_pipeline_create_with_model_path: unsafe extern "C" fn(
            *const c_char,
            *const c_char,
            *mut *mut ov_genai_llm_pipeline_t,
            ...
        ) -> ov_status_e = "ov_genai_llm_pipeline_create_with_model_path",
        llm_pipeline_create_with_model_path_tokenizer: unsafe extern "C" fn(
            *const c_char,
            *const ov_genai_tokenizer_t,
            *const c_char,
            *mut *mut ov_genai_llm_pipeline_t,
            ...
        ) -> ov_status_e = "ov_genai_llm_pipeline_create_with_model_path_tokenizer",
        llm_pipeline_free: unsafe extern "C" fn(*mut ov_genai_llm_pipeline_t) = "ov_genai_llm_pipeline_free",
        llm_pipeline_generate_string: unsafe extern "C" fn(
            *mut ov_genai_llm_pipeline_t,
            *const c_char,
            *mut *mut ov_genai_decoded_results_t,
        ) -> ov_status_e = "ov_genai_llm_pipeline_generate_string",
        llm_pipeline_generate_strings: unsafe extern "C" fn(
            *mut ov_genai_llm_pipeline_t,
            *const ov_genai_char_arrays_t,
            *mut *mut ov_genai_decoded_results_t,
        ) -> ov_status_e = "ov_genai_llm_pipeline_generate_strings",

        decoded_results_free: unsafe extern "C" fn(*mut ov_genai_decoded_results_t)
            = "ov_genai_decoded_results_free",
        decoded_results_get_texts: unsafe extern "C" fn(
            *mut ov_genai_decoded_results_t,
            *mut *mut c_char,
        ) -> ov_status_e = "ov_genai_decoded_results_get_texts",
    }
}

symbol_table! {
    /// Tensor entry points of `openvino_c`, used to read token ids out of
    /// tokenizer outputs.
    pub struct TensorSymbols {
        get_last_err_msg: unsafe extern "C" fn() -> *const c_char = "ov_get_last_err_msg",
        free: unsafe extern "C" fn(*const c_char) = "ov_free",
        tensor_get_size: unsafe extern "C" fn(*const ov_tensor_t, *mut usize) -> ov_status_e
            = "ov_tensor_get_size",
        tensor_get_shape: unsafe extern "C" fn(*const ov_tensor_t, *mut ov_shape_t) -> ov_status_e
            = "ov_tensor_get_shape",
        tensor_data: unsafe extern "C" fn(*const ov_tensor_t, *mut *mut c_void) -> ov_status_e
            = "ov_tensor_data",
        shape_free: unsafe extern "C" fn(*mut ov_shape_t) -> ov_status_e = "ov_shape_free",
        tensor_free: unsafe extern "C" fn(*mut ov_tensor_t) = "ov_tensor_free",
    }
}
