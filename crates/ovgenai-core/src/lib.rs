//! Safe Rust binding for the OpenVINO GenAI C API.
//!
//! The native libraries are located and loaded lazily on first use. Every
//! native call is serialized, its status translated into [`GenAiError`], and
//! every native object is owned by a handle that frees it exactly once.

mod call;
pub mod error;
pub mod handle;
pub mod loader;
mod marshal;
pub mod pipeline;
pub mod platform;
pub mod status;
pub mod tensor;
pub mod tokenizer;

pub use error::{GenAiError, LoadError, Result};
pub use handle::{AsRawHandle, HandleKind, NativeHandle};
pub use loader::{
    LibraryInfo, ResolutionState, configure_search_paths, library_info, probe_file,
    resolution_attempts, resolution_state, resolve,
};
pub use pipeline::{LlmPipeline, PipelineParams};
pub use platform::{LoaderStrategy, Platform, TextEncoding};
pub use status::{ErrorCategory, StatusCode};
pub use tensor::Tensor;
pub use tokenizer::{TokenId, TokenizedInputs, Tokenizer};
