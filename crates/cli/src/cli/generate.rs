use std::time::Instant;

use ovgenai_core::{LlmPipeline, PipelineParams, Tokenizer};
use tracing::info;

use crate::cli::{GenerateArgs, GlobalArgs};
use crate::config::AppConfig;

pub async fn execute(global: GlobalArgs, args: GenerateArgs) -> anyhow::Result<()> {
    let cfg = AppConfig::load_or_default()?;
    super::configure_library(&global, &cfg)?;

    let mut params = PipelineParams {
        device: args.device.clone().unwrap_or_else(|| cfg.device.clone()),
        ..Default::default()
    };
    if let Some(property) = &args.property {
        let (key, value) = parse_property(property)?;
        params.property_key = key;
        params.property_value = value;
    }

    let text = tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
        let pipeline = match &args.tokenizer {
            Some(dir) => {
                let tokenizer = Tokenizer::from_path(dir)?;
                LlmPipeline::with_tokenizer(&args.model, &tokenizer, &params)?
            }
            None => LlmPipeline::from_model_path(&args.model, &params)?,
        };

        let started = Instant::now();
        let text = pipeline.generate(&args.prompt)?;
        info!(elapsed_ms = started.elapsed().as_millis() as u64, "Generation finished");
        Ok(text)
    })
    .await??;

    println!("{text}");
    Ok(())
}

fn parse_property(text: &str) -> anyhow::Result<(String, String)> {
    match text.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => anyhow::bail!("expected KEY=VALUE, got {text:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_splits_on_first_equals() {
        assert_eq!(
            parse_property("PERFORMANCE_HINT=THROUGHPUT").unwrap(),
            ("PERFORMANCE_HINT".to_string(), "THROUGHPUT".to_string())
        );
        assert_eq!(
            parse_property("CACHE_DIR=a=b").unwrap(),
            ("CACHE_DIR".to_string(), "a=b".to_string())
        );
    }

    #[test]
    fn property_needs_a_key() {
        assert!(parse_property("=LATENCY").is_err());
        assert!(parse_property("LATENCY").is_err());
    }
}
