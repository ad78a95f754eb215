//! Safe wrapper around `ov_genai_tokenizer_t` and its tokenized outputs.

use std::ffi::c_char;
use std::path::Path;
use std::ptr;

use ovgenai_sys::{
    ov_genai_char_arrays_t, ov_genai_tokenized_inputs_t, ov_genai_tokenizer_t, ov_tensor_t,
};
use tracing::{debug, info};

use crate::call;
use crate::error::{GenAiError, Result};
use crate::handle::{
    AsRawHandle, NativeHandle, TensorKind, TokenizedInputsKind, TokenizerKind,
};
use crate::loader::{GenAi, genai, tensor_api};
use crate::marshal::{self, StringArray, TokenBatch};
use crate::platform::TextEncoding;
use crate::tensor::Tensor;

/// Token ids exchanged with the tokenizer.
pub type TokenId = u64;

// Decoded model text is produced by the tokenizer as UTF-8 on every platform.
const MODEL_TEXT: TextEncoding = TextEncoding::Utf8;

/// Owns an `ov_genai_tokenizer_t`.
#[derive(Debug)]
pub struct Tokenizer {
    handle: NativeHandle<TokenizerKind>,
}

// Safety: the tokenizer is not mutated after creation, and native calls on it
// are serialized by the call lock.
unsafe impl Send for Tokenizer {}
unsafe impl Sync for Tokenizer {}

impl AsRawHandle for Tokenizer {
    type Raw = ov_genai_tokenizer_t;

    fn as_raw(&self) -> Result<*mut ov_genai_tokenizer_t> {
        self.handle.as_raw()
    }
}

impl Tokenizer {
    /// Create a tokenizer with no model attached.
    pub fn new() -> Result<Self> {
        let api = genai()?;
        let mut raw: *mut ov_genai_tokenizer_t = ptr::null_mut();
        call::checked(api, || unsafe { (api.sym.tokenizer_create)(&mut raw) })?;
        let handle = unsafe { NativeHandle::acquire(raw) }?;
        debug!("empty tokenizer created");
        Ok(Self { handle })
    }

    /// Load the tokenizer model from a directory holding
    /// `openvino_tokenizer.xml` and `openvino_detokenizer.xml`.
    pub fn from_path(path: &Path) -> Result<Self> {
        let api = genai()?;
        let c_path = marshal::path_to_c_string(path, api.encoding)?;
        let mut raw: *mut ov_genai_tokenizer_t = ptr::null_mut();

        info!(path = %path.display(), "Loading tokenizer…");
        call::checked(api, || unsafe {
            (api.sym.tokenizer_create_with_path)(c_path.as_ptr(), &mut raw)
        })?;
        let handle = unsafe { NativeHandle::acquire(raw) }?;
        info!(path = %path.display(), "Tokenizer loaded");
        Ok(Self { handle })
    }

    //  Accessors

    pub fn is_disposed(&self) -> bool {
        self.handle.is_disposed()
    }

    /// Release the native tokenizer now. Further calls fail with
    /// [`GenAiError::Disposed`].
    pub fn dispose(&mut self) {
        self.handle.dispose();
    }

    //  Encoding

    pub fn encode(&self, prompt: &str) -> Result<TokenizedInputs> {
        let api = genai()?;
        let tok = self.as_raw()?;
        let c_prompt = marshal::to_c_string(prompt, api.encoding)?;
        let mut raw: *mut ov_genai_tokenized_inputs_t = ptr::null_mut();
        call::checked(api, || unsafe {
            (api.sym.tokenizer_encode_string)(tok, c_prompt.as_ptr(), &mut raw)
        })?;
        TokenizedInputs::acquire(raw)
    }

    /// Encode several prompts into one padded batch.
    pub fn encode_batch<S: AsRef<str>>(&self, prompts: &[S]) -> Result<TokenizedInputs> {
        let api = genai()?;
        let tok = self.as_raw()?;
        let array = StringArray::new(prompts, api.encoding)?;
        let mut raw: *mut ov_genai_tokenized_inputs_t = ptr::null_mut();
        debug!(prompts = array.len(), "encoding batch");
        call::checked(api, || unsafe {
            (api.sym.tokenizer_encode_strings)(tok, array.as_raw(), &mut raw)
        })?;
        TokenizedInputs::acquire(raw)
    }

    //  Decoding

    pub fn decode(&self, tokens: &[TokenId]) -> Result<String> {
        let api = genai()?;
        let tok = self.as_raw()?;
        let mut buffer = marshal::token_buffer(tokens)?;
        let len = marshal::native_len(buffer.len())?;
        let mut out: *mut c_char = ptr::null_mut();
        call::checked(api, || unsafe {
            (api.sym.tokenizer_decode_string_tokens)(tok, buffer.as_mut_ptr(), len, &mut out)
        })?;
        take_text(api, out, "ov_genai_tokenizer_decode_string_tokens")
    }

    /// Decode a ragged batch; one string per row.
    pub fn decode_batch<R: AsRef<[TokenId]>>(&self, rows: &[R]) -> Result<Vec<String>> {
        let api = genai()?;
        let tok = self.as_raw()?;
        let mut batch = TokenBatch::new(rows)?;
        let row_count = batch.rows()?;
        let mut out = ov_genai_char_arrays_t::default();
        call::checked(api, || unsafe {
            (api.sym.tokenizer_decode_tokens_array)(
                tok,
                batch.flat.as_mut_ptr(),
                batch.row_lengths.as_mut_ptr(),
                row_count,
                &mut out,
            )
        })?;
        Ok(unsafe { marshal::take_char_arrays(&mut out, MODEL_TEXT, api.sym.free) })
    }

    /// Decode a `[batch, sequence]` token tensor, such as
    /// [`TokenizedInputs::input_ids`].
    pub fn decode_tensor(&self, tokens: &Tensor) -> Result<Vec<String>> {
        let api = genai()?;
        let tok = self.as_raw()?;
        let tensor = tokens.as_raw()?;
        let mut out = ov_genai_char_arrays_t::default();
        call::checked(api, || unsafe {
            (api.sym.tokenizer_decode_tensor)(tok, tensor, &mut out)
        })?;
        Ok(unsafe { marshal::take_char_arrays(&mut out, MODEL_TEXT, api.sym.free) })
    }

    //  Special tokens
    //
    // The native eos/pad getters currently report the BOS token; the values
    // are passed through unchanged.

    pub fn bos_token_id(&self) -> Result<i64> {
        self.token_id(|api| api.sym.tokenizer_get_bos_token_id)
    }

    pub fn eos_token_id(&self) -> Result<i64> {
        self.token_id(|api| api.sym.tokenizer_get_eos_token_id)
    }

    pub fn pad_token_id(&self) -> Result<i64> {
        self.token_id(|api| api.sym.tokenizer_get_pad_token_id)
    }

    pub fn bos_token(&self) -> Result<String> {
        self.token_text(|api| api.sym.tokenizer_get_bos_token, "ov_genai_tokenizer_get_bos_token")
    }

    pub fn eos_token(&self) -> Result<String> {
        self.token_text(|api| api.sym.tokenizer_get_eos_token, "ov_genai_tokenizer_get_eos_token")
    }

    pub fn pad_token(&self) -> Result<String> {
        self.token_text(|api| api.sym.tokenizer_get_pad_token, "ov_genai_tokenizer_get_pad_token")
    }

    fn token_id(
        &self,
        getter: impl FnOnce(&GenAi) -> unsafe extern "C" fn(*mut ov_genai_tokenizer_t, *mut i64) -> i32,
    ) -> Result<i64> {
        let api = genai()?;
        let tok = self.as_raw()?;
        let getter = getter(api);
        let mut id = 0i64;
        call::checked(api, || unsafe { getter(tok, &mut id) })?;
        Ok(id)
    }

    fn token_text(
        &self,
        getter: impl FnOnce(&GenAi) -> unsafe extern "C" fn(*mut ov_genai_tokenizer_t, *mut *mut c_char) -> i32,
        what: &str,
    ) -> Result<String> {
        let api = genai()?;
        let tok = self.as_raw()?;
        let getter = getter(api);
        let mut out: *mut c_char = ptr::null_mut();
        call::checked(api, || unsafe { getter(tok, &mut out) })?;
        take_text(api, out, what)
    }
}

/// Copy and free a native-owned output string; null after success is a
/// [`PtrNull`](crate::StatusCode::PtrNull) failure.
fn take_text(api: &GenAi, out: *mut c_char, what: &str) -> Result<String> {
    unsafe { marshal::take_native_string(out, MODEL_TEXT, api.sym.free) }
        .ok_or_else(|| GenAiError::null_handle(what))
}

/// Owns an `ov_genai_tokenized_inputs_t`: the ids and attention mask of one
/// encoded prompt or batch.
#[derive(Debug)]
pub struct TokenizedInputs {
    handle: NativeHandle<TokenizedInputsKind>,
}

// Safety: read-only after creation; native calls are serialized.
unsafe impl Send for TokenizedInputs {}
unsafe impl Sync for TokenizedInputs {}

impl AsRawHandle for TokenizedInputs {
    type Raw = ov_genai_tokenized_inputs_t;

    fn as_raw(&self) -> Result<*mut ov_genai_tokenized_inputs_t> {
        self.handle.as_raw()
    }
}

impl TokenizedInputs {
    fn acquire(raw: *mut ov_genai_tokenized_inputs_t) -> Result<Self> {
        let handle = unsafe { NativeHandle::acquire(raw) }?;
        Ok(Self { handle })
    }

    /// `[batch, sequence]` token ids, padded to the longest prompt.
    pub fn input_ids(&self) -> Result<Tensor> {
        self.tensor(|api| api.sym.tokenized_inputs_get_input_ids)
    }

    /// `[batch, sequence]` mask: `1` for real tokens, `0` for padding.
    pub fn attention_mask(&self) -> Result<Tensor> {
        self.tensor(|api| api.sym.tokenized_inputs_get_attention_mask)
    }

    /// Token ids per prompt with padding removed.
    pub fn sequences(&self) -> Result<Vec<Vec<TokenId>>> {
        let ids = self.input_ids()?.token_rows()?;
        let mask = self.attention_mask()?.token_rows()?;
        Ok(strip_padding(ids, &mask))
    }

    pub fn dispose(&mut self) {
        self.handle.dispose();
    }

    fn tensor(
        &self,
        getter: impl FnOnce(
            &GenAi,
        ) -> unsafe extern "C" fn(*mut ov_genai_tokenized_inputs_t, *mut *mut ov_tensor_t) -> i32,
    ) -> Result<Tensor> {
        let api = genai()?;
        // Resolve now so releasing the tensor later never triggers loading.
        tensor_api()?;
        let inputs = self.as_raw()?;
        let getter = getter(api);
        let mut raw: *mut ov_tensor_t = ptr::null_mut();
        call::checked(api, || unsafe { getter(inputs, &mut raw) })?;
        let handle = unsafe { NativeHandle::<TensorKind>::acquire(raw) }?;
        Ok(Tensor::from_handle(handle))
    }
}

fn strip_padding(ids: Vec<Vec<TokenId>>, mask: &[Vec<TokenId>]) -> Vec<Vec<TokenId>> {
    ids.into_iter()
        .enumerate()
        .map(|(row, tokens)| match mask.get(row) {
            Some(mask_row) => tokens
                .into_iter()
                .zip(mask_row)
                .filter(|&(_, &keep)| keep != 0)
                .map(|(token, _)| token)
                .collect(),
            None => tokens,
        })
        .collect()
}
