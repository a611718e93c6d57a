use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::llm::Provider;
use crate::state::ensure_tally_home;

/// Keys pasted with `tally auth paste-api-key`, stored in `~/.tally/auth.json`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AuthState {
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
}

impl AuthState {
    fn key_for(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::OpenAI => self.openai_api_key.as_deref(),
            Provider::Anthropic => self.anthropic_api_key.as_deref(),
        }
    }
}

/// Environment variables checked for each provider, in order
pub fn env_vars(provider: Provider) -> &'static [&'static str] {
    match provider {
        Provider::OpenAI => &["API_KEY", "OPENAI_API_KEY", "API_TOKEN"],
        Provider::Anthropic => &["ANTHROPIC_API_KEY", "API_KEY"],
    }
}

fn auth_path() -> Result<PathBuf> {
    Ok(ensure_tally_home()?.join("auth.json"))
}

pub fn load_auth() -> Result<AuthState> {
    let p = auth_path()?;
    if !p.exists() {
        return Ok(AuthState::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

pub fn save_auth(auth: &AuthState) -> Result<()> {
    let p = auth_path()?;
    let s = serde_json::to_string_pretty(auth)?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

/// Resolve the credential for `provider`: environment first, then auth.json.
/// A missing key is a startup error.
pub fn resolve_api_key(provider: Provider) -> Result<String> {
    let from_env = env_vars(provider)
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|v| !v.trim().is_empty());
    let stored = load_auth()?;
    pick_key(provider, from_env, &stored)
}

fn pick_key(provider: Provider, from_env: Option<String>, stored: &AuthState) -> Result<String> {
    if let Some(key) = from_env {
        return Ok(key.trim().to_string());
    }
    if let Some(key) = stored.key_for(provider).filter(|k| !k.trim().is_empty()) {
        return Ok(key.trim().to_string());
    }
    bail!(
        "API key not found for {provider}. Set {} in your environment, or run: tally auth paste-api-key --provider {provider}",
        env_vars(provider).join(" / ")
    )
}

fn prompt_secret(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush().ok();
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s.trim().to_string())
}

pub fn paste_api_key(provider: Provider) -> Result<()> {
    let mut auth = load_auth()?;
    let (label, prefix) = match provider {
        Provider::OpenAI => ("Paste OpenAI API key (starts with sk-)", "sk-"),
        Provider::Anthropic => ("Paste Anthropic API key (starts with sk-ant-)", "sk-ant-"),
    };
    let key = prompt_secret(label)?;
    if !key.starts_with(prefix) {
        bail!("key didn't look like a {provider} API key (expected prefix {prefix})");
    }
    match provider {
        Provider::OpenAI => auth.openai_api_key = Some(key),
        Provider::Anthropic => auth.anthropic_api_key = Some(key),
    }
    save_auth(&auth)?;
    println!("Saved {provider} API key to {}", auth_path()?.display());
    Ok(())
}
