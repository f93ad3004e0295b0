// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use std::collections::HashMap;
use std::fs;
use std::str::FromStr;

use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;

use crate::domain::asset::{Asset, AssetKind};
use crate::domain::constants::{MAX_ASSET_DECIMALS, NATIVE_SOL_MINT, USDC_MINT, USDT_MINT};
use crate::domain::error::{AppError, ExecutionError};

/// Mint -> asset descriptor lookup used by the pipeline.
#[derive(Debug, Clone)]
pub struct AssetRegistry {
    assets: HashMap<Pubkey, Asset>,
}

#[derive(Deserialize)]
struct TokenEntry {
    symbol: String,
    mint: String,
    decimals: u8,
    #[serde(default)]
    tags: Vec<String>,
}

impl TokenEntry {
    fn is_native(&self) -> bool {
        self.tags
            .iter()
            .any(|tag| tag.trim().eq_ignore_ascii_case("native"))
    }
}

impl AssetRegistry {
    pub fn empty() -> Self {
        Self {
            assets: HashMap::new(),
        }
    }

    /// SOL, USDC and USDT.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for (mint, symbol, decimals, kind) in [
            (NATIVE_SOL_MINT, "SOL", 9u8, AssetKind::Native),
            (USDC_MINT, "USDC", 6, AssetKind::Token),
            (USDT_MINT, "USDT", 6, AssetKind::Token),
        ] {
            match Pubkey::from_str(mint) {
                Ok(key) => registry.insert(Asset::new(key, symbol, decimals, kind)),
                Err(e) => tracing::warn!(target: "assets", mint, error = %e, "Invalid builtin mint"),
            }
        }
        registry
    }

    /// Builtins extended (and overridden) by a JSON token list.
    pub fn load_from_file(path: &str) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read tokenlist {path}: {e}")))?;
        let mut registry = Self::builtin();
        let added = registry.extend_from_json(&raw)?;
        tracing::info!(target: "assets", path, added, total = registry.len(), "Loaded token list");
        Ok(registry)
    }

    pub fn extend_from_json(&mut self, raw: &str) -> Result<usize, AppError> {
        let entries: Vec<TokenEntry> = serde_json::from_str(raw)
            .map_err(|e| AppError::Config(format!("Invalid tokenlist JSON: {e}")))?;
        let mut added = 0usize;
        for entry in entries {
            let Ok(mint) = Pubkey::from_str(entry.mint.trim()) else {
                tracing::warn!(target: "assets", symbol = %entry.symbol, mint = %entry.mint, "Skipping token with invalid mint");
                continue;
            };
            if entry.decimals > MAX_ASSET_DECIMALS {
                return Err(AppError::Config(format!(
                    "Token {} ({}) has {} decimals; at most {MAX_ASSET_DECIMALS} are supported",
                    entry.symbol, entry.mint, entry.decimals
                )));
            }
            let kind = if entry.is_native() {
                AssetKind::Native
            } else {
                AssetKind::Token
            };
            self.insert(Asset::new(mint, entry.symbol.clone(), entry.decimals, kind));
            added += 1;
        }
        Ok(added)
    }

    pub fn insert(&mut self, asset: Asset) {
        self.assets.insert(asset.mint, asset);
    }

    pub fn get(&self, mint: &Pubkey) -> Option<&Asset> {
        self.assets.get(mint)
    }

    pub fn resolve(&self, mint: &str) -> Result<Asset, ExecutionError> {
        let key = Pubkey::from_str(mint.trim())
            .map_err(|_| ExecutionError::UnknownAsset(mint.to_string()))?;
        self.get(&key)
            .cloned()
            .ok_or_else(|| ExecutionError::UnknownAsset(mint.to_string()))
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl Default for AssetRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_knows_sol_as_native() {
        let registry = AssetRegistry::builtin();
        let sol = registry.resolve(NATIVE_SOL_MINT).expect("sol");
        assert_eq!(sol.kind, AssetKind::Native);
        assert_eq!(sol.decimals, 9);
        let usdc = registry.resolve(USDC_MINT).expect("usdc");
        assert_eq!(usdc.kind, AssetKind::Token);
        assert_eq!(usdc.decimals, 6);
    }

    #[test]
    fn native_tag_is_detected_case_insensitive() {
        let mut registry = AssetRegistry::empty();
        let mint = Pubkey::new_unique();
        let json = format!(
            r#"[{{"symbol":"WRAP","mint":"{mint}","decimals":9,"tags":["Tier1","NATIVE"]}},
                {{"symbol":"BAD","mint":"not-a-key","decimals":6}}]"#
        );
        let added = registry.extend_from_json(&json).expect("parse");
        assert_eq!(added, 1);
        assert_eq!(registry.get(&mint).map(|a| a.kind), Some(AssetKind::Native));
    }

    #[test]
    fn oversized_decimals_reject_the_token_list() {
        let mut registry = AssetRegistry::empty();
        let mint = Pubkey::new_unique();
        let json = format!(r#"[{{"symbol":"HUGE","mint":"{mint}","decimals":40}}]"#);
        let err = registry.extend_from_json(&json).expect_err("decimals");
        assert!(matches!(err, AppError::Config(_)));
        assert!(registry.is_empty());

        let json = format!(r#"[{{"symbol":"EDGE","mint":"{mint}","decimals":19}}]"#);
        assert_eq!(registry.extend_from_json(&json).expect("parse"), 1);
    }

    #[test]
    fn unknown_mint_is_reported() {
        let registry = AssetRegistry::builtin();
        let err = registry
            .resolve(&Pubkey::new_unique().to_string())
            .expect_err("unknown");
        assert!(matches!(err, ExecutionError::UnknownAsset(_)));
    }
}
