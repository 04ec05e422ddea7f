//! Text-generation backends.
//!
//! [`GeminiGenerator`] talks to the `generateContent` endpoint; [`CommandGenerator`]
//! pipes the prompt into any CLI that answers on stdout. Both are blocking and
//! bounded by the configured timeout. Neither retries.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::io::config::{GeneratorConfig, Provider};
use crate::io::process::run_with_timeout;

/// Abstraction over text-generation services.
pub trait TextGenerator {
    /// Send one instruction payload and return the generated text.
    fn generate(&self, prompt: &str) -> Result<String>;
}

/// Google Gemini over HTTP.
#[derive(Debug)]
pub struct GeminiGenerator {
    client: reqwest::blocking::Client,
    api_key: String,
    endpoint: String,
    temperature: f32,
}

impl GeminiGenerator {
    pub fn new(api_key: String, config: &GeneratorConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("build http client")?;
        let endpoint = format!(
            "{}/models/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            config.model
        );
        Ok(Self {
            client,
            api_key,
            endpoint,
            temperature: config.temperature,
        })
    }
}

impl TextGenerator for GeminiGenerator {
    #[instrument(skip_all, fields(endpoint = %self.endpoint, prompt_bytes = prompt.len()))]
    fn generate(&self, prompt: &str) -> Result<String> {
        let body = GenerateRequest::new(prompt, self.temperature);
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .context("send generateContent request")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => anyhow!("authentication failed ({status}): {}", text.trim()),
                429 => anyhow!("quota exceeded ({status}): {}", text.trim()),
                _ => anyhow!("API error ({status}): {}", text.trim()),
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .context("decode generateContent response")?;
        let text = extract_text(&parsed)?;
        debug!(response_bytes = text.len(), "generation complete");
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

impl<'a> GenerateRequest<'a> {
    fn new(prompt: &'a str, temperature: f32) -> Self {
        Self {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig { temperature },
        }
    }
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

fn extract_text(response: &GenerateResponse) -> Result<String> {
    let text: String = response
        .candidates
        .first()
        .and_then(|candidate| candidate.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|part| part.text.as_deref())
                .collect()
        })
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(anyhow!("no content in response"));
    }
    Ok(text)
}

/// Any CLI that reads the prompt on stdin and prints the answer.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    argv: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandGenerator {
    pub fn new(argv: Vec<String>, timeout: Duration, output_limit_bytes: usize) -> Result<Self> {
        if argv.first().is_none_or(|program| program.trim().is_empty()) {
            return Err(anyhow!("generator command is empty"));
        }
        Ok(Self {
            argv,
            timeout,
            output_limit_bytes,
        })
    }
}

impl TextGenerator for CommandGenerator {
    #[instrument(skip_all, fields(program = %self.argv[0], prompt_bytes = prompt.len()))]
    fn generate(&self, prompt: &str) -> Result<String> {
        let mut cmd = Command::new(&self.argv[0]);
        cmd.args(&self.argv[1..]);
        let output = run_with_timeout(
            cmd,
            Some(prompt.as_bytes()),
            self.timeout,
            self.output_limit_bytes,
        )
        .with_context(|| format!("run generator command {}", self.argv[0]))?;

        if output.timed_out {
            return Err(anyhow!(
                "generator command timed out after {}s",
                self.timeout.as_secs()
            ));
        }
        if !output.status.success() {
            return Err(anyhow!(output.failure_summary("generator command")));
        }
        let text = output.stdout_text();
        if text.trim().is_empty() {
            return Err(anyhow!("no content in response"));
        }
        Ok(text)
    }
}

/// The generator selected by configuration.
#[derive(Debug)]
pub enum ConfiguredGenerator {
    Gemini(GeminiGenerator),
    Command(CommandGenerator),
}

impl TextGenerator for ConfiguredGenerator {
    fn generate(&self, prompt: &str) -> Result<String> {
        match self {
            Self::Gemini(generator) => generator.generate(prompt),
            Self::Command(generator) => generator.generate(prompt),
        }
    }
}

/// Build the configured generator, reading the credential from the environment.
pub fn build_generator(
    config: &GeneratorConfig,
    output_limit_bytes: usize,
) -> Result<ConfiguredGenerator> {
    match config.provider {
        Provider::Gemini => {
            let api_key = std::env::var(&config.api_key_env)
                .ok()
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| {
                    anyhow!("{} not found in environment variables", config.api_key_env)
                })?;
            Ok(ConfiguredGenerator::Gemini(GeminiGenerator::new(
                api_key, config,
            )?))
        }
        Provider::Command => Ok(ConfiguredGenerator::Command(CommandGenerator::new(
            config.command.clone(),
            config.timeout(),
            output_limit_bytes,
        )?)),
    }
}
