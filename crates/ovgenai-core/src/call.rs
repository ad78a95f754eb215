//! Serialized native calls and status translation.
//!
//! The native libraries keep their "last error" text in process-global state,
//! so a call, its status check and the message fetch must not interleave with
//! another thread's call. Every status-returning call goes through
//! [`checked`], which holds [`call_lock`] for the whole sequence.

use std::sync::{Mutex, MutexGuard, PoisonError};

use ovgenai_sys::{OV_STATUS_OK, ov_status_e};
use tracing::{debug, trace};

use crate::error::{GenAiError, Result};
use crate::loader::{GenAi, TensorApi};
use crate::marshal;
use crate::platform::Platform;
use crate::status::StatusCode;

static CALL_LOCK: Mutex<()> = Mutex::new(());

/// Guard serializing foreign calls. A panic while the lock was held leaves no
/// state behind worth protecting, so poisoning is ignored.
pub(crate) fn call_lock() -> MutexGuard<'static, ()> {
    CALL_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Where the diagnostic text for a failed call comes from.
pub(crate) trait ErrorSource {
    /// Native description of the most recent failure, if any. Called with the
    /// call lock held, immediately after the failing call.
    fn last_error_message(&self, code: ov_status_e) -> Option<String>;
}

impl ErrorSource for GenAi {
    fn last_error_message(&self, code: ov_status_e) -> Option<String> {
        pick_message(
            code,
            // Copy of the process-wide message, owned by the caller.
            || unsafe {
                marshal::take_native_string(
                    (self.sym.get_last_err_msg)(),
                    self.encoding,
                    self.sym.free,
                )
            },
            // Static per-code text; never freed.
            || unsafe {
                marshal::copy_native_str((self.sym.get_error_info)(code), self.encoding)
            },
        )
    }
}

/// Choose between the last-error text and the per-code text.
///
/// The last-error text is never cleared, and argument checks that fail with
/// `InvalidCParam` return before writing it, so for that code it belongs to
/// an earlier failure and is skipped.
fn pick_message(
    code: ov_status_e,
    last: impl FnOnce() -> Option<String>,
    info: impl FnOnce() -> Option<String>,
) -> Option<String> {
    let non_blank = |m: &String| !m.trim().is_empty();
    if code != StatusCode::InvalidCParam.as_raw() {
        if let Some(message) = last().filter(non_blank) {
            return Some(message);
        }
    }
    info().filter(non_blank)
}

impl ErrorSource for TensorApi {
    fn last_error_message(&self, _code: ov_status_e) -> Option<String> {
        let encoding = Platform::current().encoding;
        let last = unsafe {
            marshal::take_native_string((self.sym.get_last_err_msg)(), encoding, self.sym.free)
        };
        last.filter(|m| !m.trim().is_empty())
    }
}

/// Turn a raw status into `Ok(())` or a [`GenAiError::Status`].
///
/// The source is only consulted on failure.
pub(crate) fn translate(code: ov_status_e, source: &impl ErrorSource) -> Result<()> {
    if code == OV_STATUS_OK {
        return Ok(());
    }
    let native = source.last_error_message(code);
    let err = match StatusCode::from_raw(code) {
        Some(status) => GenAiError::Status {
            status,
            code,
            message: native.unwrap_or_else(|| status.description().to_owned()),
        },
        None => GenAiError::Status {
            status: StatusCode::UnknownException,
            code,
            message: match native {
                Some(text) => format!("unrecognized status code {code}: {text}"),
                None => format!("unrecognized status code {code}"),
            },
        },
    };
    debug!(code, %err, "native call failed");
    Err(err)
}

/// Run a status-returning native call under the call lock and translate its
/// result before releasing the lock.
pub(crate) fn checked<S, F>(source: &S, call: F) -> Result<()>
where
    S: ErrorSource,
    F: FnOnce() -> ov_status_e,
{
    let _guard = call_lock();
    let code = call();
    trace!(code, "native call returned");
    translate(code, source)
}

/// Run a call that reports no status under the call lock.
pub(crate) fn locked<T>(call: impl FnOnce() -> T) -> T {
    let _guard = call_lock();
    call()
}
