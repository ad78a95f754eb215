//! Safe wrapper around `ov_genai_llm_pipeline_t`.

use std::ffi::{CString, c_char};
use std::path::Path;
use std::ptr;

use ovgenai_sys::{ov_genai_decoded_results_t, ov_genai_llm_pipeline_t};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::call;
use crate::error::{GenAiError, Result};
use crate::handle::{AsRawHandle, DecodedResultsKind, NativeHandle, PipelineKind};
use crate::loader::{GenAi, genai};
use crate::marshal::{self, StringArray};
use crate::platform::TextEncoding;
use crate::tokenizer::Tokenizer;

/// Options used when compiling a pipeline.
///
/// The native constructor accepts exactly one `(key, value)` property pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineParams {
    /// OpenVINO device name such as `CPU`, `GPU` or `NPU`.
    #[serde(default = "default_device")]
    pub device: String,
    #[serde(default = "default_property_key")]
    pub property_key: String,
    #[serde(default = "default_property_value")]
    pub property_value: String,
}

fn default_device() -> String {
    "CPU".into()
}
fn default_property_key() -> String {
    "PERFORMANCE_HINT".into()
}
fn default_property_value() -> String {
    "LATENCY".into()
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            device: default_device(),
            property_key: default_property_key(),
            property_value: default_property_value(),
        }
    }
}

struct EncodedParams {
    device: CString,
    key: CString,
    value: CString,
}

impl PipelineParams {
    fn encode(&self, encoding: TextEncoding) -> Result<EncodedParams> {
        if self.device.trim().is_empty() {
            return Err(GenAiError::InvalidArgument("device name is empty".into()));
        }
        Ok(EncodedParams {
            device: marshal::to_c_string(&self.device, encoding)?,
            key: marshal::to_c_string(&self.property_key, encoding)?,
            value: marshal::to_c_string(&self.property_value, encoding)?,
        })
    }
}

/// Owns an `ov_genai_llm_pipeline_t`.
#[derive(Debug)]
pub struct LlmPipeline {
    handle: NativeHandle<PipelineKind>,
}

// Safety: native calls on the pipeline are serialized by the call lock.
unsafe impl Send for LlmPipeline {}
unsafe impl Sync for LlmPipeline {}

impl AsRawHandle for LlmPipeline {
    type Raw = ov_genai_llm_pipeline_t;

    fn as_raw(&self) -> Result<*mut ov_genai_llm_pipeline_t> {
        self.handle.as_raw()
    }
}

impl LlmPipeline {
    /// Compile the model in `model_dir` (with its bundled tokenizer).
    pub fn from_model_path(model_dir: &Path, params: &PipelineParams) -> Result<Self> {
        let api = genai()?;
        let c_path = marshal::path_to_c_string(model_dir, api.encoding)?;
        let encoded = params.encode(api.encoding)?;
        let mut raw: *mut ov_genai_llm_pipeline_t = ptr::null_mut();

        info!(path = %model_dir.display(), device = %params.device, "Loading pipeline…");
        call::checked(api, || unsafe {
            (api.sym.llm_pipeline_create_with_model_path)(
                c_path.as_ptr(),
                encoded.device.as_ptr(),
                &mut raw,
                encoded.key.as_ptr(),
                encoded.value.as_ptr(),
            )
        })?;
        let handle = unsafe { NativeHandle::acquire(raw) }?;
        info!(path = %model_dir.display(), "Pipeline loaded");
        Ok(Self { handle })
    }

    /// Compile the model in `model_dir` with an explicitly supplied tokenizer.
    pub fn with_tokenizer(
        model_dir: &Path,
        tokenizer: &Tokenizer,
        params: &PipelineParams,
    ) -> Result<Self> {
        let api = genai()?;
        let c_path = marshal::path_to_c_string(model_dir, api.encoding)?;
        let encoded = params.encode(api.encoding)?;
        let tok = tokenizer.as_raw()?;
        let mut raw: *mut ov_genai_llm_pipeline_t = ptr::null_mut();

        info!(path = %model_dir.display(), device = %params.device, "Loading pipeline with tokenizer…");
        call::checked(api, || unsafe {
            (api.sym.llm_pipeline_create_with_model_path_tokenizer)(
                c_path.as_ptr(),
                tok,
                encoded.device.as_ptr(),
                &mut raw,
                encoded.key.as_ptr(),
                encoded.value.as_ptr(),
            )
        })?;
        let handle = unsafe { NativeHandle::acquire(raw) }?;
        info!(path = %model_dir.display(), "Pipeline loaded");
        Ok(Self { handle })
    }

    pub fn is_disposed(&self) -> bool {
        self.handle.is_disposed()
    }

    pub fn dispose(&mut self) {
        self.handle.dispose();
    }

    //  Generation

    /// Generate a completion for one prompt with the model's default
    /// generation config.
    pub fn generate(&self, prompt: &str) -> Result<String> {
        let api = genai()?;
        let pipe = self.as_raw()?;
        let c_prompt = marshal::to_c_string(prompt, api.encoding)?;
        let mut raw: *mut ov_genai_decoded_results_t = ptr::null_mut();

        debug!(prompt_len = prompt.len(), "generating");
        call::checked(api, || unsafe {
            (api.sym.llm_pipeline_generate_string)(pipe, c_prompt.as_ptr(), &mut raw)
        })?;
        let results = unsafe { NativeHandle::<DecodedResultsKind>::acquire(raw) }?;
        texts(api, &results)
    }

    /// Generate for several prompts in one call.
    ///
    /// The library returns a single rendering of all results; with more than
    /// one prompt each line carries the sequence score before its text.
    pub fn generate_batch<S: AsRef<str>>(&self, prompts: &[S]) -> Result<String> {
        let api = genai()?;
        let pipe = self.as_raw()?;
        let array = StringArray::new(prompts, api.encoding)?;
        let mut raw: *mut ov_genai_decoded_results_t = ptr::null_mut();

        debug!(prompts = array.len(), "generating batch");
        call::checked(api, || unsafe {
            (api.sym.llm_pipeline_generate_strings)(pipe, array.as_raw(), &mut raw)
        })?;
        let results = unsafe { NativeHandle::<DecodedResultsKind>::acquire(raw) }?;
        texts(api, &results)
    }
}

fn texts(api: &GenAi, results: &NativeHandle<DecodedResultsKind>) -> Result<String> {
    let ptr = results.as_raw()?;
    let mut out: *mut c_char = ptr::null_mut();
    call::checked(api, || unsafe { (api.sym.decoded_results_get_texts)(ptr, &mut out) })?;
    unsafe { marshal::take_native_string(out, TextEncoding::Utf8, api.sym.free) }
        .ok_or_else(|| GenAiError::null_handle("ov_genai_decoded_results_get_texts"))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn params_default_to_low_latency_cpu() {
        let params = PipelineParams::default();
        assert_eq!(params.device, "CPU");
        assert_eq!(params.property_key, "PERFORMANCE_HINT");
        assert_eq!(params.property_value, "LATENCY");
    }

    #[test]
    fn params_fill_missing_fields() {
        let params: PipelineParams = serde_json::from_str(r#"{"device":"GPU"}"#).unwrap();
        assert_eq!(
            params,
            PipelineParams {
                device: "GPU".into(),
                ..PipelineParams::default()
            }
        );
    }

    #[test]
    fn empty_device_is_rejected() {
        let params = PipelineParams {
            device: "  ".into(),
            ..PipelineParams::default()
        };
        let err = params.encode(TextEncoding::Utf8).err().unwrap();
        assert!(matches!(err, GenAiError::InvalidArgument(_)), "{err}");
    }

    #[test]
    fn nul_in_property_is_rejected() {
        let params = PipelineParams {
            property_value: "LAT\0ENCY".into(),
            ..PipelineParams::default()
        };
        assert!(params.encode(TextEncoding::Utf8).is_err());
    }
}
