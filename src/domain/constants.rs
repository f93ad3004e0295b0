// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

// =============================================================================
// ASSETS
// =============================================================================

pub const NATIVE_SOL_MINT: &str = "So11111111111111111111111111111111111111112";
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
pub const USDT_MINT: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";

/// `10^decimals` must fit in u64 base units.
pub const MAX_ASSET_DECIMALS: u8 = 19;

// =============================================================================
// EXECUTION DEFAULTS
// =============================================================================

/// 0.002 SOL, enough for a swap with a capped priority fee.
pub const DEFAULT_MIN_FEE_RESERVE_LAMPORTS: u64 = 2_000_000;
pub const DEFAULT_SLIPPAGE_BPS: u16 = 50;
pub const DEFAULT_PRIORITY_FEE_MAX_LAMPORTS: u64 = 1_000_000;
pub const DEFAULT_SEND_MAX_RETRIES: usize = 3;

pub const DEFAULT_CONFIRM_INTERVAL_MS: u64 = 2_000;
pub const DEFAULT_WITHDRAW_CONFIRM_ATTEMPTS: u32 = 30;
/// Swaps compete for block space; give them twice the withdraw window.
pub const DEFAULT_SWAP_CONFIRM_ATTEMPTS: u32 = 60;
pub const DEFAULT_DEPOSIT_CONFIRM_ATTEMPTS: u32 = 30;

pub const DEFAULT_DEPOSIT_ATTEMPTS: usize = 3;
pub const DEFAULT_DEPOSIT_BASE_DELAY_MS: u64 = 2_000;

pub const DEFAULT_STALE_CLAIM_SECS: u64 = 30 * 60;

// =============================================================================
// SERVICE DEFAULTS
// =============================================================================

pub const DEFAULT_SWAP_API_URL: &str = "https://quote-api.jup.ag/v6";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://veil_keeper.db";
pub const DEFAULT_TRIGGER_PORT: u16 = 8787;
pub const DEFAULT_INTERVAL_SECS: u64 = 60;
pub const HTTP_TIMEOUT_SECS: u64 = 20;

pub const PARTIAL_RESHIELD_NOTE: &str = "swap settled but reshield failed; proceeds remain in session wallet";
