use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use ledgerloop_engine::commands::corrections::{self, CorrectionRecordOptions};
use ledgerloop_engine::learning::llm::{LlmClient, LlmError};
use serde_json::{Value, json};
use tempfile::{Builder, TempDir};

pub fn temp_home_in_tmp(prefix: &str) -> std::io::Result<(TempDir, PathBuf)> {
    let dir = Builder::new().prefix(prefix).tempdir_in("/tmp")?;
    let home = dir.path().join("ledgerloop-home");
    fs::create_dir_all(&home)?;
    Ok((dir, home))
}

pub fn write_fixture_json(dir: &Path, name: &str, value: &Value) -> std::io::Result<PathBuf> {
    let path = dir.join(name);
    let encoded = serde_json::to_string_pretty(value).map_err(std::io::Error::other)?;
    fs::write(&path, encoded)?;
    Ok(path)
}

/// Records an entity correction and returns the command payload.
pub fn record_entity(
    home: &Path,
    tenant_id: &str,
    description: &str,
    old_value: Option<&str>,
    new_value: &str,
) -> Value {
    let result = corrections::record_with_options(CorrectionRecordOptions {
        tenant_id: tenant_id.to_string(),
        transaction_ref: format!("txn_{}", description.replace(' ', "_")),
        field: "entity".to_string(),
        old_value: old_value.map(std::string::ToString::to_string),
        new_value: new_value.to_string(),
        description: description.to_string(),
        origin: Some("Coinbase".to_string()),
        destination: None,
        actor: "ana@example.com".to_string(),
        home_override: Some(home),
    });
    assert!(result.is_ok());
    if let Ok(success) = result {
        let payload = serde_json::to_value(success);
        assert!(payload.is_ok());
        if let Ok(value) = payload {
            return value;
        }
    }
    Value::Null
}

pub fn transaction(
    id: &str,
    description: &str,
    amount: f64,
    date: &str,
    entity: Option<&str>,
) -> Value {
    json!({
        "id": id,
        "description": description,
        "origin": "Coinbase",
        "destination": "Main wallet",
        "amount": amount,
        "date": date,
        "entity": entity,
        "category": "Crypto income",
    })
}

pub fn approval(confidence: f64, justification: &str) -> String {
    json!({
        "approved": true,
        "confidence": confidence,
        "justification": justification,
    })
    .to_string()
}

pub fn rejection(justification: &str) -> String {
    json!({
        "approved": false,
        "confidence": 0.35,
        "justification": justification,
    })
    .to_string()
}

#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail(LlmError),
    /// Never answers within any sane timeout.
    Hang,
}

/// LLM double that plays back replies in order and records prompts.
#[derive(Debug, Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Reply>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }

    fn next_reply(&self, prompt: &str) -> Reply {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front())
            .unwrap_or(Reply::Fail(LlmError::EmptyResponse))
    }
}

impl LlmClient for ScriptedLlm {
    async fn complete(&self, prompt: &str, _response_schema_hint: &str) -> Result<String, LlmError> {
        match self.next_reply(prompt) {
            Reply::Text(text) => Ok(text),
            Reply::Fail(error) => Err(error),
            Reply::Hang => {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                Ok(approval(0.99, "too late"))
            }
        }
    }
}
