// ============================================================
// Layer 6 — Ollama Client
// ============================================================
// The serving tool stays external. This module only:
//
//   create_model → runs `ollama create <name> -f <Modelfile>`
//   OllamaClient → talks to a running server over its HTTP API
//                    GET  /api/version
//                    POST /api/chat   (non-streaming)
//
// The server URL comes from --host / OLLAMA_HOST and is read the
// way the ollama CLI reads it: a bare host gets port 11434, while
// an explicit http:// or https:// without a port gets 80 or 443.

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::{io::ErrorKind, path::Path, process::Command, time::Duration};

use crate::domain::traits::{ChatBackend, ChatMessage, SamplingOptions};

pub const DEFAULT_HOST: &str = "http://127.0.0.1:11434";
const DEFAULT_PORT: u16 = 11434;

// ─── Wire types ───────────────────────────────────────────────────────────────
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaVersion {
    version: String,
}

#[derive(Debug, Deserialize)]
struct OllamaErrorBody {
    error: String,
}

/// Turn an OLLAMA_HOST value into a base URL without a trailing slash.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.is_empty() {
        return DEFAULT_HOST.to_string();
    }
    let (scheme, rest, default_port) = match host.split_once("://") {
        Some(("http", rest)) => ("http", rest, 80),
        Some(("https", rest)) => ("https", rest, 443),
        Some((scheme, rest)) => (scheme, rest, DEFAULT_PORT),
        None => ("http", host, DEFAULT_PORT),
    };
    let has_port = rest
        .rsplit_once(':')
        .map_or(false, |(_, port)| port.parse::<u16>().is_ok());
    if has_port {
        format!("{scheme}://{rest}")
    } else {
        format!("{scheme}://{rest}:{default_port}")
    }
}

pub struct OllamaClient {
    base_url: String,
    client:   Client,
}

impl OllamaClient {
    pub fn new(host: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { base_url: normalize_host(host), client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Server version; doubles as a reachability check.
    pub fn version(&self) -> Result<String> {
        let url = format!("{}/api/version", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .with_context(|| format!("Cannot connect to Ollama at {}. Is `ollama serve` running?", self.base_url))?;
        if !response.status().is_success() {
            bail!("Ollama returned {} for {}", response.status(), url);
        }
        let version: OllamaVersion = response.json().context("Invalid /api/version response")?;
        Ok(version.version)
    }
}

impl ChatBackend for OllamaClient {
    fn chat(&self, model: &str, messages: &[ChatMessage], options: SamplingOptions) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let request = OllamaChatRequest {
            model,
            messages,
            stream: false,
            options: OllamaOptions {
                temperature: options.temperature,
                top_p: options.top_p,
            },
        };

        tracing::debug!("POST {} ({} messages)", url, messages.len());
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .with_context(|| format!("Cannot connect to Ollama at {}", self.base_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let detail = serde_json::from_str::<OllamaErrorBody>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            bail!("Ollama chat failed ({status}): {detail}");
        }

        let reply: OllamaChatResponse = response.json().context("Invalid /api/chat response")?;
        if !reply.done {
            tracing::warn!("Ollama reported an unfinished response");
        }
        Ok(reply.message.content)
    }
}

// ─── `ollama create` ──────────────────────────────────────────────────────────
/// Register `modelfile` under `name`. Returns the tool's stdout.
pub fn create_model(name: &str, modelfile: &Path) -> Result<String> {
    tracing::info!("Running: ollama create {} -f {}", name, modelfile.display());

    let output = Command::new("ollama")
        .arg("create")
        .arg(name)
        .arg("-f")
        .arg(modelfile)
        .output()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => anyhow::anyhow!("'ollama' not found on PATH. Install Ollama first."),
            _ => anyhow::Error::new(e).context("Cannot run 'ollama create'"),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("ollama create failed ({}): {}", output.status, stderr.trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
