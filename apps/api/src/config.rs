use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::protocol::DEFAULT_HISTORY_LIMIT;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// AI providers an external agent can be configured against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    Gemini,
    Mistral,
}

impl AiProvider {
    pub const ALL: [AiProvider; 2] = [AiProvider::Gemini, AiProvider::Mistral];

    pub fn as_str(&self) -> &'static str {
        match self {
            AiProvider::Gemini => "gemini",
            AiProvider::Mistral => "mistral",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

/// Application configuration loaded from environment variables.
/// Missing provider keys do not fail loading; `validate` reports them instead.
#[derive(Clone)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub mistral_api_key: Option<String>,
    /// Provider requested via `AI_PROVIDER`, as given.
    pub ai_provider: Option<String>,
    pub email_sender: Option<String>,
    pub email_password: Option<String>,
    /// Command line for the external controller agent.
    pub agent_command: Option<String>,
    pub agent_timeout_secs: u64,
    /// Largest accepted resume upload, in bytes.
    pub max_upload_bytes: usize,
    /// Messages kept in the bus history before the oldest are dropped.
    pub message_history_limit: usize,
    pub port: u16,
    pub rust_log: String,
}

/// Result of `Config::validate`.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigStatus {
    pub valid: bool,
    pub issues: Vec<String>,
    pub ai_provider: Option<AiProvider>,
    pub features_enabled: usize,
    pub features: BTreeMap<&'static str, bool>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Ok(Config {
            gemini_api_key: var("GEMINI_API_KEY"),
            mistral_api_key: var("MISTRAL_API_KEY"),
            ai_provider: var("AI_PROVIDER"),
            email_sender: var("EMAIL_SENDER"),
            email_password: var("EMAIL_PASSWORD"),
            agent_command: var("AGENT_COMMAND"),
            agent_timeout_secs: var("AGENT_TIMEOUT_SECS")
                .unwrap_or_else(|| "120".to_string())
                .parse::<u64>()
                .context("AGENT_TIMEOUT_SECS must be a whole number of seconds")?,
            max_upload_bytes: var("MAX_UPLOAD_BYTES")
                .map(|v| v.parse::<usize>())
                .transpose()
                .context("MAX_UPLOAD_BYTES must be a whole number of bytes")?
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            message_history_limit: var("MESSAGE_HISTORY_LIMIT")
                .map(|v| v.parse::<usize>())
                .transpose()
                .context("MESSAGE_HISTORY_LIMIT must be a whole number")?
                .unwrap_or(DEFAULT_HISTORY_LIMIT),
            port: var("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn provider_available(&self, provider: AiProvider) -> bool {
        match provider {
            AiProvider::Gemini => self.gemini_api_key.is_some(),
            AiProvider::Mistral => self.mistral_api_key.is_some(),
        }
    }

    pub fn email_available(&self) -> bool {
        self.email_sender.is_some() && self.email_password.is_some()
    }

    /// The provider in effect: the requested one if it has a key, otherwise the
    /// first provider with a key when none was requested.
    pub fn active_provider(&self) -> Option<AiProvider> {
        match self.ai_provider.as_deref() {
            Some(requested) => AiProvider::parse(requested).filter(|p| self.provider_available(*p)),
            None => AiProvider::ALL
                .into_iter()
                .find(|p| self.provider_available(*p)),
        }
    }

    pub fn features(&self) -> BTreeMap<&'static str, bool> {
        BTreeMap::from([
            ("resume_analysis", true),
            ("pdf_upload", true),
            ("ai_analysis", self.active_provider().is_some()),
            ("email_reports", self.email_available()),
            ("external_agent", self.agent_command.is_some()),
        ])
    }

    pub fn validate(&self) -> ConfigStatus {
        let mut issues = Vec::new();

        if !AiProvider::ALL.iter().any(|p| self.provider_available(*p)) {
            issues.push(
                "No AI provider API key configured (set GEMINI_API_KEY or MISTRAL_API_KEY)"
                    .to_string(),
            );
        }

        if let Some(requested) = self.ai_provider.as_deref() {
            match AiProvider::parse(requested) {
                None => issues.push(format!(
                    "AI_PROVIDER '{requested}' is not supported (expected gemini or mistral)"
                )),
                Some(provider) if !self.provider_available(provider) => issues.push(format!(
                    "AI_PROVIDER is '{}' but {}_API_KEY is not set",
                    provider.as_str(),
                    provider.as_str().to_uppercase()
                )),
                Some(_) => {}
            }
        }

        match (&self.email_sender, &self.email_password) {
            (Some(_), None) => issues.push("EMAIL_SENDER is set but EMAIL_PASSWORD is missing".to_string()),
            (None, Some(_)) => issues.push("EMAIL_PASSWORD is set but EMAIL_SENDER is missing".to_string()),
            _ => {}
        }

        let features = self.features();
        ConfigStatus {
            valid: issues.is_empty(),
            issues,
            ai_provider: self.active_provider(),
            features_enabled: features.values().filter(|enabled| **enabled).count(),
            features,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("Config")
            .field("gemini_api_key", &redact(&self.gemini_api_key))
            .field("mistral_api_key", &redact(&self.mistral_api_key))
            .field("ai_provider", &self.ai_provider)
            .field("email_sender", &self.email_sender)
            .field("email_password", &redact(&self.email_password))
            .field("agent_command", &self.agent_command)
            .field("agent_timeout_secs", &self.agent_timeout_secs)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("message_history_limit", &self.message_history_limit)
            .field("port", &self.port)
            .field("rust_log", &self.rust_log)
            .finish()
    }
}
