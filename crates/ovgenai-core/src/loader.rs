//! Lazy, once-per-process resolution of the native libraries.
//!
//! Resolution runs on the first foreign call rather than at startup. The
//! outcome, success or failure, is cached for the lifetime of the process:
//! a missing file or a wrong-architecture binary will not fix itself, and
//! repeated failed `dlopen`/`LoadLibrary` attempts are expensive.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use libloading::Library;
use ovgenai_sys::{GENAI_LIBRARY, GenAiSymbols, OPENVINO_C_LIBRARY, TensorSymbols};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::call::call_lock;
use crate::error::LoadError;
use crate::platform::{LoaderStrategy, Platform, TextEncoding};

//  Resolver state machine

/// Terminal value of a successful resolution.
pub enum Resolution<T> {
    Loaded(T),
    /// Loading is categorically unavailable; failures are deferred to the
    /// first real call.
    Inert,
}

/// Observable resolver state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionState {
    Unattempted,
    Resolving,
    Resolved,
    /// Resolved without a library (see [`LoaderStrategy::Inert`]).
    Inert,
    Failed(LoadError),
}

/// Runs a resolution closure at most once and caches its outcome.
///
/// Concurrent first callers block until the winner finishes and then all
/// observe the same outcome.
pub struct Resolver<T> {
    outcome: OnceLock<Result<Resolution<T>, LoadError>>,
    started: AtomicBool,
    attempts: AtomicUsize,
}

impl<T> Resolver<T> {
    pub const fn new() -> Self {
        Self {
            outcome: OnceLock::new(),
            started: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn get_or_resolve<F>(&self, resolve: F) -> Result<&T, LoadError>
    where
        F: FnOnce() -> Result<Resolution<T>, LoadError>,
    {
        let outcome = self.outcome.get_or_init(|| {
            self.started.store(true, Ordering::SeqCst);
            self.attempts.fetch_add(1, Ordering::SeqCst);
            resolve()
        });
        match outcome {
            Ok(Resolution::Loaded(value)) => Ok(value),
            Ok(Resolution::Inert) => Err(LoadError::Unavailable),
            Err(err) => Err(err.clone()),
        }
    }

    /// How many times the resolution closure has run (0 or 1).
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ResolutionState {
        match self.outcome.get() {
            Some(Ok(Resolution::Loaded(_))) => ResolutionState::Resolved,
            Some(Ok(Resolution::Inert)) => ResolutionState::Inert,
            Some(Err(err)) => ResolutionState::Failed(err.clone()),
            None if self.started.load(Ordering::SeqCst) => ResolutionState::Resolving,
            None => ResolutionState::Unattempted,
        }
    }
}

impl<T> Default for Resolver<T> {
    fn default() -> Self {
        Self::new()
    }
}

//  Search paths

static SEARCH_PATHS: OnceLock<Vec<PathBuf>> = OnceLock::new();

/// Set the additional directories searched for the native libraries.
///
/// Only honoured on Windows; elsewhere the platform loader's own search path
/// (`LD_LIBRARY_PATH`, `DYLD_LIBRARY_PATH`) applies. Must be called once,
/// before the first foreign call.
pub fn configure_search_paths<I, P>(paths: I) -> Result<(), LoadError>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    let paths: Vec<PathBuf> = paths.into_iter().map(Into::into).collect();
    debug!(?paths, "configuring native library search paths");
    SEARCH_PATHS
        .set(paths)
        .map_err(|_| LoadError::AlreadyConfigured)
}

/// Freezes the configured paths; later configuration attempts fail.
fn search_paths() -> &'static [PathBuf] {
    SEARCH_PATHS.get_or_init(Vec::new)
}

//  Loaded libraries

/// The loaded GenAI library and its entry points.
pub(crate) struct GenAi {
    _library: Library,
    pub(crate) sym: GenAiSymbols,
    pub(crate) encoding: TextEncoding,
    pipeline_size: i32,
}

/// The loaded OpenVINO C library (tensor access only).
pub(crate) struct TensorApi {
    _library: Library,
    pub(crate) sym: TensorSymbols,
}

static GENAI: Resolver<GenAi> = Resolver::new();
static TENSOR: Resolver<TensorApi> = Resolver::new();

pub(crate) fn genai() -> Result<&'static GenAi, LoadError> {
    GENAI.get_or_resolve(|| report(GENAI_LIBRARY, load_genai(Platform::current())))
}

pub(crate) fn tensor_api() -> Result<&'static TensorApi, LoadError> {
    TENSOR.get_or_resolve(|| report(OPENVINO_C_LIBRARY, load_tensor_api(Platform::current())))
}

/// Force resolution of the GenAI library now instead of on first call.
pub fn resolve() -> Result<(), LoadError> {
    genai().map(|_| ())
}

pub fn resolution_state() -> ResolutionState {
    GENAI.state()
}

/// Number of times resolution of the GenAI library has been attempted.
pub fn resolution_attempts() -> usize {
    GENAI.attempts()
}

/// Summary of the resolved GenAI library.
#[derive(Debug, Clone, Serialize)]
pub struct LibraryInfo {
    pub library: &'static str,
    pub platform: Platform,
    /// `sizeof(ov::genai::LLMPipeline)` as reported by the probe call.
    pub pipeline_size: i32,
}

pub fn library_info() -> Result<LibraryInfo, LoadError> {
    let api = genai()?;
    Ok(LibraryInfo {
        library: GENAI_LIBRARY,
        platform: Platform::current(),
        pipeline_size: api.pipeline_size,
    })
}

fn report<T>(
    library: &str,
    outcome: Result<Resolution<T>, LoadError>,
) -> Result<Resolution<T>, LoadError> {
    match &outcome {
        Ok(Resolution::Loaded(_)) => info!(library, "native library resolved"),
        Ok(Resolution::Inert) => info!(library, "dynamic loading unavailable, binding is inert"),
        Err(err) => error!(library, %err, "native library resolution failed"),
    }
    outcome
}

fn load_genai(platform: Platform) -> Result<Resolution<GenAi>, LoadError> {
    if platform.loader == LoaderStrategy::Inert {
        return Ok(Resolution::Inert);
    }
    let library = open_library(GENAI_LIBRARY, platform.loader, search_paths())?;
    let sym = unsafe { GenAiSymbols::load(&library) }.map_err(|e| LoadError::MissingSymbol {
        library: GENAI_LIBRARY.into(),
        symbol: e.symbol.into(),
        detail: e.source.to_string(),
    })?;

    // Verify the library is callable, not merely present.
    let pipeline_size = {
        let _guard = call_lock();
        unsafe { (sym.llm_sizeof)() }
    };
    if pipeline_size <= 0 {
        return Err(LoadError::Other {
            library: GENAI_LIBRARY.into(),
            detail: format!("size probe returned {pipeline_size}"),
        });
    }
    debug!(pipeline_size, "size probe succeeded");

    Ok(Resolution::Loaded(GenAi {
        _library: library,
        sym,
        encoding: platform.encoding,
        pipeline_size,
    }))
}

fn load_tensor_api(platform: Platform) -> Result<Resolution<TensorApi>, LoadError> {
    if platform.loader == LoaderStrategy::Inert {
        return Ok(Resolution::Inert);
    }
    let library = open_library(OPENVINO_C_LIBRARY, platform.loader, search_paths())?;
    let sym = unsafe { TensorSymbols::load(&library) }.map_err(|e| LoadError::MissingSymbol {
        library: OPENVINO_C_LIBRARY.into(),
        symbol: e.symbol.into(),
        detail: e.source.to_string(),
    })?;
    Ok(Resolution::Loaded(TensorApi {
        _library: library,
        sym,
    }))
}

//  Opening

fn open_library(
    name: &str,
    strategy: LoaderStrategy,
    dirs: &[PathBuf],
) -> Result<Library, LoadError> {
    let file_name = libloading::library_filename(name);
    match strategy {
        LoaderStrategy::Inert => Err(LoadError::Unavailable),
        LoaderStrategy::SystemSearch => {
            if !dirs.is_empty() {
                debug!(
                    ?dirs,
                    "additional search paths are ignored here; use the platform loader's environment"
                );
            }
            open_file(name, &file_name)
        }
        LoaderStrategy::ExplicitSearch => {
            // A candidate that exists but fails to load is more informative
            // than a later "not found" from the system search.
            let mut first_failure = None;
            for dir in dirs {
                let candidate = dir.join(&file_name);
                if !candidate.is_file() {
                    debug!(path = %candidate.display(), "no library in search directory");
                    continue;
                }
                match open_file(name, candidate.as_os_str()) {
                    Ok(library) => {
                        debug!(path = %candidate.display(), "loaded from search directory");
                        return Ok(library);
                    }
                    Err(err) => {
                        warn!(path = %candidate.display(), %err, "candidate library failed to load");
                        first_failure.get_or_insert(err);
                    }
                }
            }
            open_file(name, &file_name).map_err(|err| match (err, first_failure) {
                (LoadError::NotFound { .. }, Some(earlier)) => earlier,
                (err, _) => err,
            })
        }
    }
}

fn open_file(name: &str, file: impl AsRef<std::ffi::OsStr>) -> Result<Library, LoadError> {
    let file = file.as_ref();
    unsafe { Library::new(file) }.map_err(|err| classify(name, &error_chain(&err)))
}

/// Load one file directly, bypassing the cached resolver.
pub fn probe_file(path: &Path) -> Result<(), LoadError> {
    let name = path.display().to_string();
    open_file(&name, OsString::from(path.as_os_str())).map(drop)
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

/// Sort a loader error message into missing-file vs. wrong-binary.
pub(crate) fn classify(library: &str, detail: &str) -> LoadError {
    const BAD_FORMAT: &[&str] = &[
        "wrong elf class",
        "invalid elf header",
        "elf load command",
        "file too short",
        "not a mach-o file",
        "incompatible architecture",
        "wrong architecture",
        "os error 193",
        "not a valid win32 application",
        "os error 216",
    ];
    const NOT_FOUND: &[&str] = &[
        "no such file",
        "image not found",
        "os error 126",
        "specified module could not be found",
        "os error 2)",
    ];

    let lower = detail.to_lowercase();
    let library = library.to_owned();
    let detail = detail.to_owned();
    if BAD_FORMAT.iter().any(|p| lower.contains(p)) {
        LoadError::BadFormat { library, detail }
    } else if NOT_FOUND.iter().any(|p| lower.contains(p)) {
        LoadError::NotFound { library, detail }
    } else {
        LoadError::Other { library, detail }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use super::*;

    #[test]
    fn classifies_missing_libraries() {
        let linux = "libopenvino_genai_c.so: cannot open shared object file: No such file or directory";
        let windows = "LoadLibraryExW failed: The specified module could not be found. (os error 126)";
        for detail in [linux, windows] {
            assert!(matches!(
                classify("openvino_genai_c", detail),
                LoadError::NotFound { .. }
            ));
        }
    }

    #[test]
    fn classifies_wrong_binaries() {
        let details = [
            "libopenvino_genai_c.so: wrong ELF class: ELFCLASS32",
            "libopenvino_genai_c.so: invalid ELF header",
            "dlopen(libopenvino_genai_c.dylib): tried: 'x' (mach-o file, but is an incompatible architecture (have 'x86_64', need 'arm64e')), 'y' (no such file)",
            "LoadLibraryExW failed: %1 is not a valid Win32 application. (os error 193)",
        ];
        for detail in details {
            assert!(
                matches!(classify("openvino_genai_c", detail), LoadError::BadFormat { .. }),
                "{detail}"
            );
        }
    }

    #[test]
    fn unclassified_errors_keep_their_detail() {
        let err = classify("openvino_genai_c", "undefined symbol: _ZN2ov5genai");
        assert_eq!(
            err,
            LoadError::Other {
                library: "openvino_genai_c".into(),
                detail: "undefined symbol: _ZN2ov5genai".into(),
            }
        );
    }

    #[test]
    fn resolver_runs_once_under_contention() {
        const THREADS: usize = 16;
        let resolver: Arc<Resolver<u32>> = Arc::new(Resolver::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                let calls = Arc::clone(&calls);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    resolver
                        .get_or_resolve(|| {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(std::time::Duration::from_millis(20));
                            Ok(Resolution::Loaded(7))
                        })
                        .copied()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Ok(7));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.attempts(), 1);
        assert_eq!(resolver.state(), ResolutionState::Resolved);
    }

    #[test]
    fn failure_is_sticky() {
        let resolver: Resolver<u32> = Resolver::new();
        assert_eq!(resolver.state(), ResolutionState::Unattempted);

        let missing = LoadError::NotFound {
            library: "x".into(),
            detail: "gone".into(),
        };
        let first = resolver.get_or_resolve(|| Err(missing.clone()));
        assert_eq!(first, Err(missing.clone()));

        let second = resolver.get_or_resolve(|| Ok(Resolution::Loaded(1)));
        assert_eq!(second, Err(missing.clone()));
        assert_eq!(resolver.attempts(), 1);
        assert_eq!(resolver.state(), ResolutionState::Failed(missing));
    }

    #[test]
    fn inert_resolution_defers_failure() {
        let resolver: Resolver<u32> = Resolver::new();
        assert_eq!(
            resolver.get_or_resolve(|| Ok(Resolution::Inert)),
            Err(LoadError::Unavailable)
        );
        assert_eq!(resolver.state(), ResolutionState::Inert);
    }

    #[test]
    fn inert_strategy_never_touches_the_filesystem() {
        assert_eq!(
            open_library("openvino_genai_c", LoaderStrategy::Inert, &[]).err(),
            Some(LoadError::Unavailable)
        );
    }

    #[test]
    fn search_paths_freeze_after_first_use() {
        let _ = resolve();
        assert_eq!(
            configure_search_paths(["/opt/intel/openvino/runtime/bin"]),
            Err(LoadError::AlreadyConfigured)
        );
    }

    #[cfg(unix)]
    #[test]
    fn missing_file_is_reported_as_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = probe_file(&dir.path().join("libnothing_here.so")).unwrap_err();
        assert!(matches!(err, LoadError::NotFound { .. }), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn garbage_file_is_reported_as_bad_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("libgarbage.so");
        std::fs::write(&path, vec![0x5a_u8; 4096]).unwrap();
        let err = probe_file(&path).unwrap_err();
        assert!(matches!(err, LoadError::BadFormat { .. }), "{err}");
    }

    #[test]
    fn explicit_search_skips_empty_directories() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_library(
            "ovgenai_definitely_missing",
            LoaderStrategy::ExplicitSearch,
            &[dir.path().to_path_buf()],
        )
        .err()
        .unwrap();
        assert!(matches!(err, LoadError::NotFound { .. }), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn explicit_search_prefers_candidate_failure_over_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let name = "ovgenai_broken_candidate";
        std::fs::write(
            dir.path().join(libloading::library_filename(name)),
            vec![0x5a_u8; 4096],
        )
        .unwrap();
        let err = open_library(
            name,
            LoaderStrategy::ExplicitSearch,
            &[dir.path().to_path_buf()],
        )
        .err()
        .unwrap();
        assert!(matches!(err, LoadError::BadFormat { .. }), "{err}");
    }
}
