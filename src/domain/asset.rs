// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::common::parsing::{format_decimal_units, parse_decimal_units};
use crate::domain::error::ExecutionError;
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;

/// How the privacy pool moves an asset in and out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// Lamports held directly by the pool program.
    Native,
    /// SPL token held in pool-owned token accounts.
    Token,
}

impl AssetKind {
    pub fn withdraw_path(&self) -> &'static str {
        match self {
            AssetKind::Native => "/v1/withdraw",
            AssetKind::Token => "/v1/withdraw/spl",
        }
    }

    pub fn deposit_path(&self) -> &'static str {
        match self {
            AssetKind::Native => "/v1/deposit/prepare",
            AssetKind::Token => "/v1/deposit/spl/prepare",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub mint: Pubkey,
    pub symbol: String,
    pub decimals: u8,
    pub kind: AssetKind,
}

impl Asset {
    pub fn new(mint: Pubkey, symbol: impl Into<String>, decimals: u8, kind: AssetKind) -> Self {
        Self {
            mint,
            symbol: symbol.into(),
            decimals,
            kind,
        }
    }

    pub fn to_base_units(&self, amount: &str) -> Result<u64, ExecutionError> {
        let units =
            parse_decimal_units(amount, self.decimals).map_err(|reason| {
                ExecutionError::InvalidAmount {
                    amount: amount.to_string(),
                    reason,
                }
            })?;
        if units == 0 {
            return Err(ExecutionError::InvalidAmount {
                amount: amount.to_string(),
                reason: "amount must be positive".to_string(),
            });
        }
        Ok(units)
    }

    pub fn format_units(&self, units: u64) -> String {
        format_decimal_units(units, self.decimals)
    }
}
