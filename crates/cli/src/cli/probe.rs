use ovgenai_core::{LibraryInfo, Platform, ResolutionState};
use serde::Serialize;
use tracing::info;

use crate::cli::GlobalArgs;
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct ProbeReport {
    platform: Platform,
    state: &'static str,
    attempts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    library: Option<LibraryInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub async fn execute(global: GlobalArgs) -> anyhow::Result<()> {
    let cfg = AppConfig::load_or_default()?;
    super::configure_library(&global, &cfg)?;

    info!("Probing native library…");
    let outcome = tokio::task::spawn_blocking(ovgenai_core::library_info).await?;

    let state = match ovgenai_core::resolution_state() {
        ResolutionState::Unattempted => "unattempted",
        ResolutionState::Resolving => "resolving",
        ResolutionState::Resolved => "resolved",
        ResolutionState::Inert => "inert",
        ResolutionState::Failed(_) => "failed",
    };
    let (library, error) = match outcome {
        Ok(info) => (Some(info), None),
        Err(err) => (None, Some(err.to_string())),
    };
    let failed = error.is_some();

    let report = ProbeReport {
        platform: Platform::current(),
        state,
        attempts: ovgenai_core::resolution_attempts(),
        library,
        error,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if failed {
        anyhow::bail!("native library is not usable");
    }
    Ok(())
}
