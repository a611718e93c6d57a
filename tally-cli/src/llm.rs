use anyhow::{Context, Result, anyhow, bail};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tally_core::Error as CoreError;
use tally_finance::{CategoryService, Query, system_prompt, user_prompt};

use crate::config::LlmSection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    OpenAI,
}

impl Provider {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Anthropic => "https://api.anthropic.com",
            Provider::OpenAI => "https://api.openai.com",
        }
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAI),
            "anthropic" => Ok(Provider::Anthropic),
            other => bail!("unknown llm provider {other:?} (expected openai|anthropic)"),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Provider::Anthropic => "anthropic",
            Provider::OpenAI => "openai",
        })
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: Provider,
    pub model: String,
    pub base_url: String,
    pub temperature: Option<f32>,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl LlmConfig {
    pub fn from_section(section: &LlmSection) -> Result<Self> {
        let provider = section.provider()?;
        Ok(Self {
            provider,
            model: section.model.clone(),
            base_url: section
                .base_url
                .clone()
                .unwrap_or_else(|| provider.default_base_url().to_string())
                .trim_end_matches('/')
                .to_string(),
            temperature: section.temperature,
            max_tokens: section.max_tokens,
            timeout: Duration::from_secs(section.timeout_secs.max(1)),
        })
    }
}

/// Classification service backed by a chat-completion API
pub struct LlmService {
    config: LlmConfig,
    api_key: String,
    client: reqwest::Client,
}

impl LlmService {
    pub fn new(config: LlmConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    /// Blocking completion for the synchronous classifier.
    pub fn chat_complete(&self, system: &str, user: &str) -> Result<String> {
        // Usually called from inside #[tokio::main]; a nested block_on would panic there.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            tokio::task::block_in_place(|| handle.block_on(self.chat_complete_async(system, user)))
        } else {
            let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
            rt.block_on(self.chat_complete_async(system, user))
        }
    }

    async fn chat_complete_async(&self, system: &str, user: &str) -> Result<String> {
        match self.config.provider {
            Provider::Anthropic => self.anthropic_complete(system, user).await,
            Provider::OpenAI => self.openai_complete(system, user).await,
        }
    }

    async fn anthropic_complete(&self, system: &str, user: &str) -> Result<String> {
        let body = AnthropicRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system,
            messages: vec![Message {
                role: "user",
                content: user,
            }],
            temperature: self.config.temperature,
        };

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .headers(headers)
            .json(&body)
            .send()
            .await
            .context("anthropic request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("anthropic error: {status} {txt}");
        }

        let out: AnthropicResponse = resp.json().await.context("parse anthropic response")?;
        Ok(anthropic_text(out))
    }

    async fn openai_complete(&self, system: &str, user: &str) -> Result<String> {
        let body = OpenAiRequest {
            model: &self.config.model,
            messages: vec![
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.config.temperature,
            response_format: ResponseFormat { t: "json_object" },
        };

        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.config.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .context("openai request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("openai error: {status} {txt}");
        }

        let out: OpenAiResponse = resp.json().await.context("parse openai response")?;
        openai_text(out).ok_or_else(|| anyhow!("openai response had no message content"))
    }
}

impl CategoryService for LlmService {
    fn complete(&self, query: &Query<'_>) -> tally_core::Result<String> {
        self.chat_complete(&system_prompt(), &user_prompt(query))
            .map_err(|e| CoreError::Service(format!("{e:#}")))
    }
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    t: String,
    text: Option<String>,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    t: &'static str,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MsgOut,
}

#[derive(Deserialize)]
struct MsgOut {
    content: Option<String>,
}

fn anthropic_text(out: AnthropicResponse) -> String {
    let mut s = String::new();
    for b in out.content {
        if b.t == "text" {
            if let Some(t) = b.text {
                s.push_str(&t);
            }
        }
    }
    s.trim().to_string()
}

fn openai_text(out: OpenAiResponse) -> Option<String> {
    out.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse_and_display() {
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAI);
        assert_eq!(" anthropic ".parse::<Provider>().unwrap(), Provider::Anthropic);
        assert!("ollama".parse::<Provider>().is_err());
        assert_eq!(Provider::OpenAI.to_string(), "openai");
    }

    #[test]
    fn test_config_from_section() {
        let section = LlmSection {
            base_url: Some("http://localhost:8080/".to_string()),
            ..LlmSection::default()
        };
        let cfg = LlmConfig::from_section(&section).unwrap();
        assert_eq!(cfg.provider, Provider::OpenAI);
        assert_eq!(cfg.base_url, "http://localhost:8080");

        let cfg = LlmConfig::from_section(&LlmSection {
            provider: "anthropic".into(),
            timeout_secs: 0,
            ..LlmSection::default()
        })
        .unwrap();
        assert_eq!(cfg.base_url, "https://api.anthropic.com");
        assert_eq!(cfg.timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_openai_request_omits_unset_temperature() {
        let body = OpenAiRequest {
            model: "gpt-5-mini",
            messages: vec![Message {
                role: "user",
                content: "{}",
            }],
            temperature: None,
            response_format: ResponseFormat { t: "json_object" },
        };
        let v = serde_json::to_value(&body).unwrap();
        assert!(v.get("temperature").is_none());
        assert_eq!(v["response_format"]["type"], "json_object");
        assert_eq!(v["messages"][0]["role"], "user");
    }

    #[test]
    fn test_openai_text_extraction() {
        let out: OpenAiResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":" {\"category\":\"Food\"} "}}]}"#,
        )
        .unwrap();
        assert_eq!(openai_text(out).as_deref(), Some("{\"category\":\"Food\"}"));

        let empty: OpenAiResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert_eq!(openai_text(empty), None);
    }

    #[test]
    fn test_anthropic_text_joins_text_blocks() {
        let out: AnthropicResponse = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"{\"category\":"},{"type":"tool_use"},{"type":"text","text":"\"Travel\"}"}]}"#,
        )
        .unwrap();
        assert_eq!(anthropic_text(out), "{\"category\":\"Travel\"}");
    }
}
