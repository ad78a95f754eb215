//! Scenarios against a real OpenVINO GenAI installation.
//!
//! Set `OVGENAI_TEST_TOKENIZER_DIR` to a directory holding
//! `openvino_tokenizer.xml` / `openvino_detokenizer.xml` to run them, and
//! `OVGENAI_TEST_MODEL_DIR` to an exported LLM for the pipeline scenario.

use std::path::PathBuf;

use ovgenai_core::{GenAiError, LlmPipeline, PipelineParams, StatusCode, Tokenizer};

fn env_dir(var: &str) -> Option<PathBuf> {
    match std::env::var_os(var) {
        Some(dir) => Some(PathBuf::from(dir)),
        None => {
            eprintln!("{var} not set, skipping");
            None
        }
    }
}

#[test]
fn creates_tokenizer_from_valid_path() {
    let Some(dir) = env_dir("OVGENAI_TEST_TOKENIZER_DIR") else {
        return;
    };
    let tokenizer = Tokenizer::from_path(&dir).unwrap();
    assert!(!tokenizer.is_disposed());
}

#[test]
fn bogus_path_fails_with_a_status() {
    if env_dir("OVGENAI_TEST_TOKENIZER_DIR").is_none() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let err = Tokenizer::from_path(&dir.path().join("no-such-tokenizer")).unwrap_err();
    let status = err.status().expect("native status");
    assert_ne!(status, StatusCode::Ok);
}

#[test]
fn encode_and_decode_are_stable() {
    let Some(dir) = env_dir("OVGENAI_TEST_TOKENIZER_DIR") else {
        return;
    };
    let tokenizer = Tokenizer::from_path(&dir).unwrap();

    let inputs = tokenizer.encode_batch(&["hello", "world"]).unwrap();
    let sequences = inputs.sequences().unwrap();
    assert_eq!(sequences.len(), 2);
    assert!(sequences.iter().all(|ids| !ids.is_empty()));

    let shape = inputs.input_ids().unwrap().shape().unwrap();
    assert_eq!(shape[0], 2);

    let first = tokenizer.decode(&sequences[0]).unwrap();
    for _ in 0..3 {
        assert_eq!(tokenizer.decode(&sequences[0]).unwrap(), first);
    }
    assert!(first.contains("hello"), "{first:?}");

    let batch = tokenizer.decode_batch(&sequences).unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0], first);

    let from_tensor = tokenizer.decode_tensor(&inputs.input_ids().unwrap()).unwrap();
    assert_eq!(from_tensor.len(), 2);
}

#[test]
fn disposed_tokenizer_refuses_calls() {
    let Some(dir) = env_dir("OVGENAI_TEST_TOKENIZER_DIR") else {
        return;
    };
    let mut tokenizer = Tokenizer::from_path(&dir).unwrap();
    tokenizer.dispose();
    tokenizer.dispose();
    assert!(tokenizer.is_disposed());
    assert_eq!(tokenizer.encode("hello").unwrap_err(), GenAiError::Disposed);
}

#[test]
fn special_token_ids_are_reported() {
    let Some(dir) = env_dir("OVGENAI_TEST_TOKENIZER_DIR") else {
        return;
    };
    let tokenizer = Tokenizer::from_path(&dir).unwrap();
    let bos = tokenizer.bos_token_id().unwrap();
    assert!(bos >= -1, "{bos}");
    tokenizer.bos_token().unwrap();
}

#[test]
fn pipeline_generates_text() {
    let Some(dir) = env_dir("OVGENAI_TEST_MODEL_DIR") else {
        return;
    };
    let pipeline = LlmPipeline::from_model_path(&dir, &PipelineParams::default()).unwrap();
    let text = pipeline.generate("The capital of France is").unwrap();
    assert!(!text.is_empty());
}
