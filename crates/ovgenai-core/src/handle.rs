//! Ownership of opaque native objects.
//!
//! A [`NativeHandle`] holds one pointer returned by a native `create`-style
//! call and hands it back to the matching `free` exactly once, either on an
//! explicit [`NativeHandle::dispose`] or on drop.

use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use ovgenai_sys::{
    ov_genai_decoded_results_t, ov_genai_llm_pipeline_t, ov_genai_tokenized_inputs_t,
    ov_genai_tokenizer_t, ov_tensor_t,
};
use tracing::{debug, warn};

use crate::call;
use crate::error::{GenAiError, Result};
use crate::loader::{genai, tensor_api};

/// A kind of native object and how to release it.
pub trait HandleKind {
    type Raw;

    /// Name used in logs and errors.
    const NAME: &'static str;

    /// Hand `raw` back to the native library.
    ///
    /// # Safety
    ///
    /// `raw` must have been produced for this kind and not released before.
    unsafe fn release(raw: NonNull<Self::Raw>);
}

/// Read-only access to the live native pointer behind a wrapper.
pub trait AsRawHandle {
    type Raw;

    /// The pointer, or [`GenAiError::Disposed`] once released. It must not
    /// be freed or retained past the owner's lifetime.
    fn as_raw(&self) -> Result<*mut Self::Raw>;
}

/// Owner of one native object.
pub struct NativeHandle<K: HandleKind> {
    ptr: Option<NonNull<K::Raw>>,
    _kind: PhantomData<K>,
}

impl<K: HandleKind> NativeHandle<K> {
    /// Take ownership of a pointer a native call just produced. Null fails
    /// with a [`PtrNull`](crate::StatusCode::PtrNull) status.
    ///
    /// # Safety
    ///
    /// A non-null `raw` must be a live object of kind `K` owned by nobody else.
    pub unsafe fn acquire(raw: *mut K::Raw) -> Result<Self> {
        let ptr = NonNull::new(raw).ok_or_else(|| GenAiError::null_handle(K::NAME))?;
        debug!(kind = K::NAME, ptr = ?ptr, "native handle acquired");
        Ok(Self {
            ptr: Some(ptr),
            _kind: PhantomData,
        })
    }

    /// The live pointer, or [`GenAiError::Disposed`].
    pub fn pointer(&self) -> Result<*mut K::Raw> {
        self.ptr
            .map(NonNull::as_ptr)
            .ok_or(GenAiError::Disposed)
    }

    pub fn is_disposed(&self) -> bool {
        self.ptr.is_none()
    }

    /// Release the native object now. Later calls are no-ops.
    pub fn dispose(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            debug!(kind = K::NAME, ptr = ?ptr, "freeing native handle");
            unsafe { K::release(ptr) };
        }
    }
}

impl<K: HandleKind> AsRawHandle for NativeHandle<K> {
    type Raw = K::Raw;

    fn as_raw(&self) -> Result<*mut K::Raw> {
        self.pointer()
    }
}

impl<K: HandleKind> Drop for NativeHandle<K> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<K: HandleKind> fmt::Debug for NativeHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHandle")
            .field("kind", &K::NAME)
            .field("ptr", &self.ptr)
            .finish()
    }
}

//  Kinds

macro_rules! genai_kind {
    ($(#[$meta:meta])* $kind:ident, $raw:ty, $name:literal, $free:ident) => {
        $(#[$meta])*
        pub enum $kind {}

        impl HandleKind for $kind {
            type Raw = $raw;
            const NAME: &'static str = $name;

            unsafe fn release(raw: NonNull<$raw>) {
                match genai() {
                    Ok(api) => call::locked(|| unsafe { (api.sym.$free)(raw.as_ptr()) }),
                    Err(err) => warn!(kind = $name, %err, "library unavailable, leaking handle"),
                }
            }
        }
    };
}

genai_kind!(TokenizerKind, ov_genai_tokenizer_t, "tokenizer", tokenizer_free);
genai_kind!(
    TokenizedInputsKind,
    ov_genai_tokenized_inputs_t,
    "tokenized inputs",
    tokenized_inputs_free
);
genai_kind!(PipelineKind, ov_genai_llm_pipeline_t, "llm pipeline", llm_pipeline_free);
genai_kind!(
    DecodedResultsKind,
    ov_genai_decoded_results_t,
    "decoded results",
    decoded_results_free
);

/// `ov_tensor_t`, released through the OpenVINO C library.
pub enum TensorKind {}

impl HandleKind for TensorKind {
    type Raw = ov_tensor_t;
    const NAME: &'static str = "tensor";

    unsafe fn release(raw: NonNull<ov_tensor_t>) {
        match tensor_api() {
            Ok(api) => call::locked(|| unsafe { (api.sym.tensor_free)(raw.as_ptr()) }),
            Err(err) => warn!(kind = "tensor", %err, "library unavailable, leaking handle"),
        }
    }
}
