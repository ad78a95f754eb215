//! Status codes returned by every fallible native entry point.

use std::fmt;

use serde::Serialize;

/// Outcome of a native call. Values mirror the C `ov_status_e` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum StatusCode {
    Ok = 0,
    GeneralError = -1,
    NotImplemented = -2,
    NetworkNotLoaded = -3,
    ParameterMismatch = -4,
    NotFound = -5,
    OutOfBounds = -6,
    /// A non-`std::exception` was thrown inside the native library.
    Unexpected = -7,
    RequestBusy = -8,
    ResultNotReady = -9,
    NotAllocated = -10,
    InferNotStarted = -11,
    NetworkNotRead = -12,
    InferCancelled = -13,
    /// The C wrapper rejected an argument (usually a null pointer).
    InvalidCParam = -14,
    UnknownCError = -15,
    NotImplementCMethod = -16,
    UnknownException = -17,
    PtrNull = -100,
}

/// Coarse grouping of failure codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The caller passed something the native side cannot accept.
    CallerMisuse,
    /// The target object is not in a state that allows the operation.
    ResourceState,
    /// The operation is not available in this build of the library.
    Capability,
    /// The native side failed for reasons outside the caller's control.
    BoundaryFault,
}

impl StatusCode {
    pub const ALL: [StatusCode; 19] = [
        Self::Ok,
        Self::GeneralError,
        Self::NotImplemented,
        Self::NetworkNotLoaded,
        Self::ParameterMismatch,
        Self::NotFound,
        Self::OutOfBounds,
        Self::Unexpected,
        Self::RequestBusy,
        Self::ResultNotReady,
        Self::NotAllocated,
        Self::InferNotStarted,
        Self::NetworkNotRead,
        Self::InferCancelled,
        Self::InvalidCParam,
        Self::UnknownCError,
        Self::NotImplementCMethod,
        Self::UnknownException,
        Self::PtrNull,
    ];

    /// Map a raw native value. `None` means the library returned a code this
    /// binding does not know about.
    pub fn from_raw(raw: i32) -> Option<Self> {
        let status = match raw {
            0 => Self::Ok,
            -1 => Self::GeneralError,
            -2 => Self::NotImplemented,
            -3 => Self::NetworkNotLoaded,
            -4 => Self::ParameterMismatch,
            -5 => Self::NotFound,
            -6 => Self::OutOfBounds,
            -7 => Self::Unexpected,
            -8 => Self::RequestBusy,
            -9 => Self::ResultNotReady,
            -10 => Self::NotAllocated,
            -11 => Self::InferNotStarted,
            -12 => Self::NetworkNotRead,
            -13 => Self::InferCancelled,
            -14 => Self::InvalidCParam,
            -15 => Self::UnknownCError,
            -16 => Self::NotImplementCMethod,
            -17 => Self::UnknownException,
            -100 => Self::PtrNull,
            _ => return None,
        };
        Some(status)
    }

    pub fn as_raw(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    /// Failure group, or `None` for [`StatusCode::Ok`].
    pub fn category(self) -> Option<ErrorCategory> {
        let category = match self {
            Self::Ok => return None,
            Self::ParameterMismatch | Self::InvalidCParam | Self::PtrNull => {
                ErrorCategory::CallerMisuse
            }
            Self::NotFound
            | Self::NotAllocated
            | Self::NetworkNotLoaded
            | Self::NetworkNotRead
            | Self::InferNotStarted
            | Self::ResultNotReady
            | Self::RequestBusy => ErrorCategory::ResourceState,
            Self::NotImplemented | Self::NotImplementCMethod => ErrorCategory::Capability,
            Self::GeneralError
            | Self::OutOfBounds
            | Self::InferCancelled
            | Self::Unexpected
            | Self::UnknownCError
            | Self::UnknownException => ErrorCategory::BoundaryFault,
        };
        Some(category)
    }

    /// Built-in text used when the native side supplies no message.
    pub fn description(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::GeneralError => "general error",
            Self::NotImplemented => "not implemented",
            Self::NetworkNotLoaded => "network not loaded",
            Self::ParameterMismatch => "parameter mismatch",
            Self::NotFound => "not found",
            Self::OutOfBounds => "out of bounds",
            Self::Unexpected => "unexpected exception",
            Self::RequestBusy => "request busy",
            Self::ResultNotReady => "result not ready",
            Self::NotAllocated => "not allocated",
            Self::InferNotStarted => "inference not started",
            Self::NetworkNotRead => "network not read",
            Self::InferCancelled => "inference cancelled",
            Self::InvalidCParam => "invalid binding parameter",
            Self::UnknownCError => "unknown binding error",
            Self::NotImplementCMethod => "binding method not implemented",
            Self::UnknownException => "unknown exception",
            Self::PtrNull => "null pointer",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_values_round_trip() {
        for status in StatusCode::ALL {
            assert_eq!(StatusCode::from_raw(status.as_raw()), Some(status));
        }
    }

    #[test]
    fn unknown_raw_values_are_not_mapped() {
        for raw in [1, -18, -99, -101, i32::MIN, i32::MAX] {
            assert_eq!(StatusCode::from_raw(raw), None, "raw {raw}");
        }
    }

    #[test]
    fn only_ok_has_no_category() {
        for status in StatusCode::ALL {
            assert_eq!(status.category().is_none(), status.is_ok(), "{status:?}");
        }
    }

    #[test]
    fn descriptions_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        for status in StatusCode::ALL {
            assert!(seen.insert(status.description()), "{status:?}");
        }
    }

    #[test]
    fn caller_misuse_group() {
        assert_eq!(
            StatusCode::PtrNull.category(),
            Some(ErrorCategory::CallerMisuse)
        );
        assert_eq!(
            StatusCode::InvalidCParam.category(),
            Some(ErrorCategory::CallerMisuse)
        );
        assert_eq!(
            StatusCode::InferCancelled.category(),
            Some(ErrorCategory::BoundaryFault)
        );
    }
}
