// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::constants;
use crate::domain::error::AppError;
use crate::network::confirm::ConfirmPolicy;
use crate::services::keeper::PipelineConfig;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

const MIN_CONFIRM_INTERVAL_MS: u64 = 100;

#[derive(Debug, Deserialize, Clone)]
pub struct KeeperSettings {
    // General
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub log_json: bool,
    pub database_url: Option<String>,
    pub tokenlist_path: Option<String>,

    // Upstreams
    #[serde(default)]
    pub rpc_url: String,
    #[serde(default = "default_swap_api_url")]
    pub swap_api_url: String,
    #[serde(default)]
    pub pool_relayer_url: String,

    // Trigger surface
    pub keeper_token: Option<String>,
    #[serde(default = "default_trigger_bind")]
    pub trigger_bind: String,
    #[serde(default = "default_trigger_port")]
    pub trigger_port: u16,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    // Pipeline
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u16,
    #[serde(default = "default_min_fee_reserve_lamports")]
    pub min_fee_reserve_lamports: u64,
    #[serde(default = "default_withdraw_confirm_attempts")]
    pub withdraw_confirm_attempts: u32,
    #[serde(default = "default_swap_confirm_attempts")]
    pub swap_confirm_attempts: u32,
    #[serde(default = "default_deposit_confirm_attempts")]
    pub deposit_confirm_attempts: u32,
    #[serde(default = "default_confirm_interval_ms")]
    pub confirm_interval_ms: u64,
    #[serde(default = "default_deposit_attempts")]
    pub deposit_attempts: usize,
    #[serde(default = "default_deposit_base_delay_ms")]
    pub deposit_base_delay_ms: u64,
    #[serde(default = "default_priority_fee_max_lamports")]
    pub priority_fee_max_lamports: u64,
    #[serde(default = "default_send_max_retries")]
    pub send_max_retries: usize,
    /// Seconds before an `executing` claim is considered abandoned. `0` disables.
    #[serde(default = "default_stale_claim_secs")]
    pub stale_claim_secs: u64,
}

fn default_swap_api_url() -> String {
    constants::DEFAULT_SWAP_API_URL.to_string()
}
fn default_trigger_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_trigger_port() -> u16 {
    constants::DEFAULT_TRIGGER_PORT
}
fn default_interval_secs() -> u64 {
    constants::DEFAULT_INTERVAL_SECS
}
fn default_slippage_bps() -> u16 {
    constants::DEFAULT_SLIPPAGE_BPS
}
fn default_min_fee_reserve_lamports() -> u64 {
    constants::DEFAULT_MIN_FEE_RESERVE_LAMPORTS
}
fn default_withdraw_confirm_attempts() -> u32 {
    constants::DEFAULT_WITHDRAW_CONFIRM_ATTEMPTS
}
fn default_swap_confirm_attempts() -> u32 {
    constants::DEFAULT_SWAP_CONFIRM_ATTEMPTS
}
fn default_deposit_confirm_attempts() -> u32 {
    constants::DEFAULT_DEPOSIT_CONFIRM_ATTEMPTS
}
fn default_confirm_interval_ms() -> u64 {
    constants::DEFAULT_CONFIRM_INTERVAL_MS
}
fn default_deposit_attempts() -> usize {
    constants::DEFAULT_DEPOSIT_ATTEMPTS
}
fn default_deposit_base_delay_ms() -> u64 {
    constants::DEFAULT_DEPOSIT_BASE_DELAY_MS
}
fn default_priority_fee_max_lamports() -> u64 {
    constants::DEFAULT_PRIORITY_FEE_MAX_LAMPORTS
}
fn default_send_max_retries() -> usize {
    constants::DEFAULT_SEND_MAX_RETRIES
}
fn default_stale_claim_secs() -> u64 {
    constants::DEFAULT_STALE_CLAIM_SECS
}

impl KeeperSettings {
    /// Layer file and environment. Callers apply CLI overrides, then [`Self::validate`].
    pub fn load_with_path(path: Option<&str>) -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let mut builder = Config::builder();
        if let Some(selected_path) = path {
            builder = builder.add_source(File::from(Path::new(selected_path)).required(true));
        } else {
            builder = builder.add_source(File::with_name("config").required(false));
        }
        // CLI flags (applied in main) > env/.env > config file.
        builder = builder.add_source(Environment::default());

        let mut settings: KeeperSettings = builder.build()?.try_deserialize()?;
        settings.normalize();
        Ok(settings)
    }

    pub fn load() -> Result<Self, AppError> {
        let settings = Self::load_with_path(None)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Clamp knobs that would otherwise stall or spin the pipeline.
    fn normalize(&mut self) {
        self.withdraw_confirm_attempts = self.withdraw_confirm_attempts.max(1);
        self.swap_confirm_attempts = self.swap_confirm_attempts.max(1);
        self.deposit_confirm_attempts = self.deposit_confirm_attempts.max(1);
        self.deposit_attempts = self.deposit_attempts.max(1);
        self.confirm_interval_ms = self.confirm_interval_ms.max(MIN_CONFIRM_INTERVAL_MS);
        self.slippage_bps = self.slippage_bps.min(10_000);
    }

    pub fn validate(&self) -> Result<(), AppError> {
        require_url("RPC_URL", &self.rpc_url)?;
        require_url("POOL_RELAYER_URL", &self.pool_relayer_url)?;
        require_url("SWAP_API_URL", &self.swap_api_url)?;
        if self.trigger_port != 0 && self.keeper_token_value().is_none() {
            return Err(AppError::Config(
                "KEEPER_TOKEN is required when the trigger server is enabled".to_string(),
            ));
        }
        if self.stale_claim_after()?.is_some() {
            let budget = self.pipeline_config().sleep_budget();
            if Duration::from_secs(self.stale_claim_secs) <= budget {
                return Err(AppError::Config(format!(
                    "STALE_CLAIM_SECS ({}) must exceed the longest pipeline run ({}s); live claims would be reclaimed",
                    self.stale_claim_secs,
                    budget.as_secs()
                )));
            }
        }
        Ok(())
    }

    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.database_url.clone())
            .unwrap_or_else(|| constants::DEFAULT_DATABASE_URL.to_string())
    }

    pub fn keeper_token_value(&self) -> Option<String> {
        self.keeper_token
            .as_ref()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// `None` when reclaim is disabled (`0`).
    pub fn stale_claim_after(&self) -> Result<Option<chrono::Duration>, AppError> {
        if self.stale_claim_secs == 0 {
            return Ok(None);
        }
        i64::try_from(self.stale_claim_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .map(Some)
            .ok_or_else(|| {
                AppError::Config(format!(
                    "STALE_CLAIM_SECS ({}) is out of range",
                    self.stale_claim_secs
                ))
            })
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        let interval = Duration::from_millis(self.confirm_interval_ms);
        PipelineConfig {
            slippage_bps: self.slippage_bps,
            min_fee_reserve_lamports: self.min_fee_reserve_lamports,
            withdraw_confirm: ConfirmPolicy::new(self.withdraw_confirm_attempts, interval),
            swap_confirm: ConfirmPolicy::new(self.swap_confirm_attempts, interval),
            deposit_confirm: ConfirmPolicy::new(self.deposit_confirm_attempts, interval),
            deposit_attempts: self.deposit_attempts,
            deposit_base_delay: Duration::from_millis(self.deposit_base_delay_ms),
            send_max_retries: self.send_max_retries,
        }
    }
}

fn require_url(key: &str, raw: &str) -> Result<(), AppError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::Config(format!("{key} is missing")));
    }
    Url::parse(trimmed).map_err(|e| AppError::Config(format!("{key} is not a valid URL: {e}")))?;
    Ok(())
}
