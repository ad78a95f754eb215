use ovgenai_core::Tokenizer;
use serde::Serialize;

use crate::cli::{DecodeArgs, EncodeArgs, GlobalArgs};
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct Encoded {
    prompt: String,
    tokens: Vec<u64>,
}

pub async fn encode(global: GlobalArgs, args: EncodeArgs) -> anyhow::Result<()> {
    let cfg = AppConfig::load_or_default()?;
    super::configure_library(&global, &cfg)?;

    let encoded = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<Encoded>> {
        let tokenizer = Tokenizer::from_path(&args.tokenizer)?;
        let inputs = match args.prompts.as_slice() {
            [single] => tokenizer.encode(single)?,
            prompts => tokenizer.encode_batch(prompts)?,
        };
        let sequences = inputs.sequences()?;
        Ok(args
            .prompts
            .into_iter()
            .zip(sequences)
            .map(|(prompt, tokens)| Encoded { prompt, tokens })
            .collect())
    })
    .await??;

    println!("{}", serde_json::to_string_pretty(&encoded)?);
    Ok(())
}

pub async fn decode(global: GlobalArgs, args: DecodeArgs) -> anyhow::Result<()> {
    let cfg = AppConfig::load_or_default()?;
    super::configure_library(&global, &cfg)?;

    let text = tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
        let tokenizer = Tokenizer::from_path(&args.tokenizer)?;
        Ok(tokenizer.decode(&args.tokens)?)
    })
    .await??;

    println!("{text}");
    Ok(())
}
