//! Platform-dependent choices, computed once per process.

use std::sync::OnceLock;

use serde::Serialize;

/// How the native library is located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoaderStrategy {
    /// Try caller-supplied directories first, then the system search order.
    ExplicitSearch,
    /// Hand the bare file name to the platform loader.
    SystemSearch,
    /// Dynamic loading is not possible; resolution succeeds without a library.
    Inert,
}

/// Encoding used for text and path arguments crossing the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEncoding {
    /// Legacy single-byte code page (the active ANSI code page on Windows).
    Ansi,
    Utf8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Platform {
    pub loader: LoaderStrategy,
    pub encoding: TextEncoding,
}

impl Platform {
    /// The platform of the running process.
    pub fn current() -> Self {
        static CURRENT: OnceLock<Platform> = OnceLock::new();
        *CURRENT.get_or_init(Self::detect)
    }

    fn detect() -> Self {
        if cfg!(target_family = "wasm") {
            Self {
                loader: LoaderStrategy::Inert,
                encoding: TextEncoding::Utf8,
            }
        } else if cfg!(windows) {
            Self {
                loader: LoaderStrategy::ExplicitSearch,
                encoding: TextEncoding::Ansi,
            }
        } else {
            Self {
                loader: LoaderStrategy::SystemSearch,
                encoding: TextEncoding::Utf8,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_is_stable() {
        assert_eq!(Platform::current(), Platform::current());
        assert_eq!(Platform::current(), Platform::detect());
    }

    #[cfg(all(unix, not(target_family = "wasm")))]
    #[test]
    fn unix_defers_to_system_loader() {
        let platform = Platform::current();
        assert_eq!(platform.loader, LoaderStrategy::SystemSearch);
        assert_eq!(platform.encoding, TextEncoding::Utf8);
    }

    #[cfg(windows)]
    #[test]
    fn windows_searches_explicitly() {
        let platform = Platform::current();
        assert_eq!(platform.loader, LoaderStrategy::ExplicitSearch);
        assert_eq!(platform.encoding, TextEncoding::Ansi);
    }
}
