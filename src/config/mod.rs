mod types;

pub use types::*;

use crate::{Error, Result};
use axum::http::Method;
use std::{env, path::Path};
use tracing::debug;

pub async fn load() -> Result<Config> {
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());
    load_from(&config_path).await
}

pub async fn load_from(config_path: impl AsRef<Path>) -> Result<Config> {
    let config_path = config_path.as_ref();
    debug!("Loading configuration from: {}", config_path.display());

    let config_str = tokio::fs::read_to_string(config_path).await?;
    let mut config: Config = serde_yaml::from_str(&config_str)?;

    apply_overrides(&mut config, |key| env::var(key).ok());
    config.validate()?;

    Ok(config)
}

/// Applies environment overrides, reading variables through `lookup`.
pub fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(base_model) = lookup("BASE_MODEL").filter(|v| !v.trim().is_empty()) {
        config.model.base_model = base_model.trim().to_string();
    }
    if let Some(adapter) = lookup("ADAPTER_PATH").filter(|v| !v.trim().is_empty()) {
        config.model.adapter = Some(adapter.trim().to_string());
    }

    let cors = &mut config.server.cors;
    for (key, target) in [
        ("CORS_ORIGINS", &mut cors.allowed_origins),
        ("CORS_METHODS", &mut cors.allowed_methods),
        ("CORS_HEADERS", &mut cors.allowed_headers),
    ] {
        let items = lookup(key)
            .map(|v| split_comma_list(&v))
            .unwrap_or_default();
        if !items.is_empty() {
            debug!("{} overrides {} configured entries", key, target.len());
            *target = items;
        }
    }
    if let Some(flag) = lookup("CORS_ALLOW_CREDENTIALS") {
        cors.allow_credentials = flag.trim().eq_ignore_ascii_case("true");
    }
}

/// Splits `"a, b,,c"` into `["a", "b", "c"]`.
pub fn split_comma_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.model.base_model.trim().is_empty() {
            return Err(Error::config("model.base_model must not be empty"));
        }

        let generation = &self.generation;
        if generation.max_input_tokens == 0 {
            return Err(Error::config("generation.max_input_tokens must be positive"));
        }
        if generation.max_new_tokens == 0 {
            return Err(Error::config("generation.max_new_tokens must be positive"));
        }
        if generation.max_concurrent_generations == 0 {
            return Err(Error::config(
                "generation.max_concurrent_generations must be positive",
            ));
        }
        if !(generation.top_p > 0.0 && generation.top_p <= 1.0) {
            return Err(Error::config(format!(
                "generation.top_p must be in (0, 1], got {}",
                generation.top_p
            )));
        }
        if generation.do_sample
            && !(generation.temperature.is_finite() && generation.temperature > 0.0)
        {
            return Err(Error::config(format!(
                "generation.temperature must be positive when sampling, got {}",
                generation.temperature
            )));
        }

        for method in &self.server.cors.allowed_methods {
            if method != "*" && method.parse::<Method>().is_err() {
                return Err(Error::config(format!("Invalid CORS method: '{}'", method)));
            }
        }

        Ok(())
    }
}
