// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use crate::common::retry::retry_linear;
use crate::data::assets::AssetRegistry;
use crate::domain::asset::{Asset, AssetKind};
use crate::domain::constants::{
    DEFAULT_CONFIRM_INTERVAL_MS, DEFAULT_DEPOSIT_ATTEMPTS, DEFAULT_DEPOSIT_BASE_DELAY_MS,
    DEFAULT_DEPOSIT_CONFIRM_ATTEMPTS, DEFAULT_MIN_FEE_RESERVE_LAMPORTS, DEFAULT_SEND_MAX_RETRIES,
    DEFAULT_SLIPPAGE_BPS, DEFAULT_SWAP_CONFIRM_ATTEMPTS, DEFAULT_WITHDRAW_CONFIRM_ATTEMPTS,
};
use crate::domain::error::ExecutionError;
use crate::domain::model::{StrandedFunds, Strategy};
use crate::network::confirm::{ConfirmPolicy, await_confirmation};
use crate::network::pool::{PoolConnector, ShieldedPool};
use crate::network::provider::{SendOptions, SharedChain};
use crate::network::session::SessionKey;
use crate::network::swap::SharedSwap;
use serde::Serialize;
use solana_sdk::signature::Signature;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Pipeline step a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Precondition,
    Withdraw,
    FeeCheck,
    Swap,
    Deposit,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Precondition => "precondition",
            Stage::Withdraw => "withdraw",
            Stage::FeeCheck => "fee_check",
            Stage::Swap => "swap",
            Stage::Deposit => "deposit",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub slippage_bps: u16,
    pub min_fee_reserve_lamports: u64,
    pub withdraw_confirm: ConfirmPolicy,
    pub swap_confirm: ConfirmPolicy,
    pub deposit_confirm: ConfirmPolicy,
    pub deposit_attempts: usize,
    pub deposit_base_delay: Duration,
    pub send_max_retries: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let interval = Duration::from_millis(DEFAULT_CONFIRM_INTERVAL_MS);
        Self {
            slippage_bps: DEFAULT_SLIPPAGE_BPS,
            min_fee_reserve_lamports: DEFAULT_MIN_FEE_RESERVE_LAMPORTS,
            withdraw_confirm: ConfirmPolicy::new(DEFAULT_WITHDRAW_CONFIRM_ATTEMPTS, interval),
            swap_confirm: ConfirmPolicy::new(DEFAULT_SWAP_CONFIRM_ATTEMPTS, interval),
            deposit_confirm: ConfirmPolicy::new(DEFAULT_DEPOSIT_CONFIRM_ATTEMPTS, interval),
            deposit_attempts: DEFAULT_DEPOSIT_ATTEMPTS,
            deposit_base_delay: Duration::from_millis(DEFAULT_DEPOSIT_BASE_DELAY_MS),
            send_max_retries: DEFAULT_SEND_MAX_RETRIES,
        }
    }
}

impl PipelineConfig {
    /// Longest one run can spend sleeping between confirmation polls and
    /// deposit retries. RPC round trips come on top of this.
    pub fn sleep_budget(&self) -> Duration {
        let rounds = u32::try_from(self.deposit_attempts.max(1)).unwrap_or(u32::MAX);
        // Backoff after attempt n is base * n, for n in 1..rounds.
        let k = u64::from(rounds);
        let steps = k.saturating_mul(k - 1) / 2;
        let backoff = self
            .deposit_base_delay
            .saturating_mul(u32::try_from(steps).unwrap_or(u32::MAX));
        self.withdraw_confirm
            .budget()
            .saturating_add(self.swap_confirm.budget())
            .saturating_add(self.deposit_confirm.budget().saturating_mul(rounds))
            .saturating_add(backoff)
    }
}

/// Terminal result of one pipeline run, consumed by settlement.
#[derive(Debug)]
pub enum PipelineOutcome {
    Success {
        output_amount: String,
        swap_signature: Signature,
        deposit_signature: Signature,
    },
    /// Swap landed but the proceeds could not be reshielded.
    Partial {
        output_amount: String,
        swap_signature: Signature,
        reshield_error: ExecutionError,
        stranded: StrandedFunds,
    },
    Failed {
        stage: Stage,
        error: ExecutionError,
        /// Set when the withdraw already landed, leaving input funds in the session wallet.
        stranded: Option<StrandedFunds>,
    },
}

impl PipelineOutcome {
    fn failed(stage: Stage, error: ExecutionError) -> Self {
        PipelineOutcome::Failed {
            stage,
            error,
            stranded: None,
        }
    }

    fn failed_stranded(stage: Stage, error: ExecutionError, asset: &Asset, amount: u64) -> Self {
        let stranded = StrandedFunds {
            mint: asset.mint.to_string(),
            amount,
            reason: format!("{stage} failed after withdraw: {error}"),
        };
        PipelineOutcome::Failed {
            stage,
            error,
            stranded: Some(stranded),
        }
    }
}

/// Everything resolved before any funds move.
struct TradeContext {
    session: SessionKey,
    pool: Arc<dyn ShieldedPool>,
    input: Asset,
    output: Asset,
    amount: u64,
}

/// Withdraw, swap and reshield for one claimed strategy.
pub struct ExecutionPipeline {
    chain: SharedChain,
    swap: SharedSwap,
    pools: Arc<dyn PoolConnector>,
    assets: Arc<AssetRegistry>,
    config: PipelineConfig,
}

impl ExecutionPipeline {
    pub fn new(
        chain: SharedChain,
        swap: SharedSwap,
        pools: Arc<dyn PoolConnector>,
        assets: Arc<AssetRegistry>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            chain,
            swap,
            pools,
            assets,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every phase in order. Errors never escape; they become outcomes.
    pub async fn run(&self, strategy: &Strategy) -> PipelineOutcome {
        let trade_number = strategy.next_trade_number();
        let ctx = match self.prepare(strategy) {
            Ok(ctx) => ctx,
            Err(e) => return PipelineOutcome::failed(Stage::Precondition, e),
        };

        tracing::info!(
            target: "pipeline",
            strategy_id = %strategy.id,
            trade_number,
            input = %ctx.input.symbol,
            output = %ctx.output.symbol,
            amount = %strategy.amount_per_trade,
            session = %ctx.session.pubkey(),
            "Starting trade"
        );

        let withdraw_sig = match self.withdraw(&ctx).await {
            Ok(sig) => sig,
            Err(e) => return PipelineOutcome::failed(Stage::Withdraw, e),
        };
        tracing::info!(target: "pipeline", strategy_id = %strategy.id, trade_number, signature = %withdraw_sig, "Withdraw confirmed");

        if let Err(e) = self.check_fee_reserve(&ctx).await {
            return PipelineOutcome::failed_stranded(Stage::FeeCheck, e, &ctx.input, ctx.amount);
        }

        let (swap_sig, out_amount) = match self.swap(&ctx).await {
            Ok(v) => v,
            Err(e) => {
                return PipelineOutcome::failed_stranded(Stage::Swap, e, &ctx.input, ctx.amount);
            }
        };
        let output_amount = ctx.output.format_units(out_amount);
        tracing::info!(
            target: "pipeline",
            strategy_id = %strategy.id,
            trade_number,
            signature = %swap_sig,
            output_amount = %output_amount,
            "Swap confirmed"
        );

        match self.deposit(&ctx, out_amount).await {
            Ok(deposit_sig) => {
                tracing::info!(target: "pipeline", strategy_id = %strategy.id, trade_number, signature = %deposit_sig, "Reshield confirmed");
                PipelineOutcome::Success {
                    output_amount,
                    swap_signature: swap_sig,
                    deposit_signature: deposit_sig,
                }
            }
            Err(e) => {
                tracing::warn!(
                    target: "pipeline",
                    strategy_id = %strategy.id,
                    trade_number,
                    error = %e,
                    "Reshield exhausted retries; proceeds left in session wallet"
                );
                let stranded = StrandedFunds {
                    mint: ctx.output.mint.to_string(),
                    amount: out_amount,
                    reason: format!("reshield failed: {e}"),
                };
                PipelineOutcome::Partial {
                    output_amount,
                    swap_signature: swap_sig,
                    reshield_error: e,
                    stranded,
                }
            }
        }
    }

    fn prepare(&self, strategy: &Strategy) -> Result<TradeContext, ExecutionError> {
        let credential = strategy
            .session_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(ExecutionError::MissingCredential)?;
        let session = SessionKey::parse(credential)?;
        let input = self.assets.resolve(&strategy.input_mint)?;
        let output = self.assets.resolve(&strategy.output_mint)?;
        let amount = input.to_base_units(&strategy.amount_per_trade)?;
        let pool = self.pools.connect(&session)?;
        Ok(TradeContext {
            session,
            pool,
            input,
            output,
            amount,
        })
    }

    async fn withdraw(&self, ctx: &TradeContext) -> Result<Signature, ExecutionError> {
        let recipient = ctx.session.pubkey();
        let sig = ctx.pool.withdraw(&ctx.input, ctx.amount, &recipient).await?;
        tracing::debug!(target: "pipeline", signature = %sig, "Withdraw submitted");
        await_confirmation(self.chain.as_ref(), &sig, self.config.withdraw_confirm).await?;
        Ok(sig)
    }

    /// The session wallet pays the swap fee itself, so it needs a lamport reserve
    /// on top of any SOL it is about to trade.
    async fn check_fee_reserve(&self, ctx: &TradeContext) -> Result<(), ExecutionError> {
        let available = self.chain.balance(&ctx.session.pubkey()).await?;
        let required = match ctx.input.kind {
            AssetKind::Native => self.config.min_fee_reserve_lamports.saturating_add(ctx.amount),
            AssetKind::Token => self.config.min_fee_reserve_lamports,
        };
        if available < required {
            return Err(ExecutionError::InsufficientFeeReserve {
                required,
                available,
            });
        }
        Ok(())
    }

    async fn swap(&self, ctx: &TradeContext) -> Result<(Signature, u64), ExecutionError> {
        let quote = self
            .swap
            .quote(
                &ctx.input.mint,
                &ctx.output.mint,
                ctx.amount,
                self.config.slippage_bps,
            )
            .await?;
        let unsigned = self
            .swap
            .swap_transaction(&quote, &ctx.session.pubkey())
            .await?;
        let signed = ctx.session.sign_transaction(unsigned)?;
        let opts = SendOptions {
            skip_preflight: true,
            max_retries: Some(self.config.send_max_retries),
        };
        let sig = self.chain.submit_transaction(&signed, opts).await?;
        tracing::debug!(target: "pipeline", signature = %sig, out_amount = quote.out_amount, "Swap submitted");
        await_confirmation(self.chain.as_ref(), &sig, self.config.swap_confirm).await?;
        Ok((sig, quote.out_amount))
    }

    async fn deposit(&self, ctx: &TradeContext, amount: u64) -> Result<Signature, ExecutionError> {
        let chain = self.chain.clone();
        let policy = self.config.deposit_confirm;
        retry_linear(
            "deposit",
            |attempt| {
                let pool = ctx.pool.clone();
                let chain = chain.clone();
                let asset = ctx.output.clone();
                async move {
                    let sig = pool.deposit(&asset, amount).await?;
                    tracing::debug!(target: "pipeline", attempt, signature = %sig, "Deposit submitted");
                    await_confirmation(chain.as_ref(), &sig, policy).await?;
                    Ok::<_, ExecutionError>(sig)
                }
            },
            self.config.deposit_attempts,
            self.config.deposit_base_delay,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::constants::{NATIVE_SOL_MINT, USDC_MINT};
    use crate::domain::model::StrategyStatus;
    use crate::network::provider::{ChainClient, TxStatus};
    use crate::network::swap::{Quote, SwapService};
    use async_trait::async_trait;
    use solana_sdk::hash::Hash;
    use solana_sdk::message::{Message, VersionedMessage};
    use solana_sdk::pubkey::Pubkey;
    use solana_sdk::signature::Keypair;
    use solana_sdk::system_instruction;
    use solana_sdk::transaction::VersionedTransaction;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeChain {
        balance: u64,
        withdraw_status: TxStatus,
        swap_status: TxStatus,
    }

    #[async_trait]
    impl ChainClient for FakeChain {
        async fn transaction_status(&self, sig: &Signature) -> Result<TxStatus, ExecutionError> {
            if *sig == Signature::from([1u8; 64]) {
                return Ok(self.withdraw_status.clone());
            }
            if *sig == Signature::from([9u8; 64]) {
                return Ok(self.swap_status.clone());
            }
            Ok(TxStatus::Finalized)
        }

        async fn balance(&self, _: &Pubkey) -> Result<u64, ExecutionError> {
            Ok(self.balance)
        }

        async fn submit_transaction(
            &self,
            tx: &VersionedTransaction,
            opts: SendOptions,
        ) -> Result<Signature, ExecutionError> {
            assert!(opts.skip_preflight);
            assert_ne!(tx.signatures[0], Signature::default());
            Ok(Signature::from([9u8; 64]))
        }
    }

    struct FakeSwap;

    #[async_trait]
    impl SwapService for FakeSwap {
        async fn quote(
            &self,
            input_mint: &Pubkey,
            output_mint: &Pubkey,
            amount: u64,
            slippage_bps: u16,
        ) -> Result<Quote, ExecutionError> {
            Ok(Quote {
                input_mint: *input_mint,
                output_mint: *output_mint,
                in_amount: amount,
                out_amount: 65_000_000,
                slippage_bps,
                raw: serde_json::json!({}),
            })
        }

        async fn swap_transaction(
            &self,
            _: &Quote,
            signer: &Pubkey,
        ) -> Result<VersionedTransaction, ExecutionError> {
            let ix = system_instruction::transfer(signer, &Pubkey::new_unique(), 1);
            Ok(VersionedTransaction {
                signatures: vec![Signature::default()],
                message: VersionedMessage::Legacy(Message::new_with_blockhash(
                    &[ix],
                    Some(signer),
                    &Hash::default(),
                )),
            })
        }
    }

    #[derive(Default)]
    struct FakePool {
        deposit_failures: usize,
        deposit_calls: AtomicUsize,
        withdrawn: Mutex<Vec<(String, u64)>>,
    }

    #[async_trait]
    impl ShieldedPool for FakePool {
        async fn withdraw(
            &self,
            asset: &Asset,
            amount: u64,
            _: &Pubkey,
        ) -> Result<Signature, ExecutionError> {
            self.withdrawn
                .lock()
                .unwrap()
                .push((asset.symbol.clone(), amount));
            Ok(Signature::from([1u8; 64]))
        }

        async fn deposit(&self, _: &Asset, _: u64) -> Result<Signature, ExecutionError> {
            let n = self.deposit_calls.fetch_add(1, Ordering::SeqCst);
            if n < self.deposit_failures {
                return Err(ExecutionError::Pool("blockhash not found".into()));
            }
            Ok(Signature::from([2u8; 64]))
        }
    }

    struct FakeConnector(Arc<FakePool>);

    impl PoolConnector for FakeConnector {
        fn connect(&self, _: &SessionKey) -> Result<Arc<dyn ShieldedPool>, ExecutionError> {
            Ok(self.0.clone())
        }
    }

    fn strategy(session_key: Option<String>) -> Strategy {
        Strategy {
            id: "s1".into(),
            user_id: "u1".into(),
            input_mint: USDC_MINT.into(),
            output_mint: NATIVE_SOL_MINT.into(),
            amount_per_trade: "10".into(),
            frequency_hours: 24,
            total_trades: 5,
            completed_trades: 4,
            next_due_at: None,
            session_key,
            status: StrategyStatus::Executing,
            claimed_at: None,
        }
    }

    fn credential() -> Option<String> {
        Some(serde_json::to_string(&Keypair::new().to_bytes().to_vec()).unwrap())
    }

    fn pipeline(chain: FakeChain, pool: Arc<FakePool>) -> ExecutionPipeline {
        let fast = ConfirmPolicy::new(3, Duration::from_millis(10));
        ExecutionPipeline::new(
            Arc::new(chain),
            Arc::new(FakeSwap),
            Arc::new(FakeConnector(pool)),
            Arc::new(AssetRegistry::builtin()),
            PipelineConfig {
                withdraw_confirm: fast,
                swap_confirm: fast,
                deposit_confirm: fast,
                deposit_base_delay: Duration::from_millis(10),
                ..PipelineConfig::default()
            },
        )
    }

    fn healthy_chain() -> FakeChain {
        FakeChain {
            balance: 10_000_000,
            withdraw_status: TxStatus::Finalized,
            swap_status: TxStatus::Confirmed,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn full_success_reports_quote_output() {
        let pool = Arc::new(FakePool::default());
        let outcome = pipeline(healthy_chain(), pool.clone())
            .run(&strategy(credential()))
            .await;
        match outcome {
            PipelineOutcome::Success {
                output_amount,
                swap_signature,
                ..
            } => {
                assert_eq!(output_amount, "0.065");
                assert_eq!(swap_signature, Signature::from([9u8; 64]));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(
            *pool.withdrawn.lock().unwrap(),
            vec![("USDC".to_string(), 10_000_000)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn missing_credential_fails_before_withdraw() {
        let pool = Arc::new(FakePool::default());
        let outcome = pipeline(healthy_chain(), pool.clone())
            .run(&strategy(None))
            .await;
        assert!(matches!(
            outcome,
            PipelineOutcome::Failed {
                stage: Stage::Precondition,
                error: ExecutionError::MissingCredential,
                stranded: None
            }
        ));
        assert!(pool.withdrawn.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unconfirmed_withdraw_fails_without_stranding() {
        let chain = FakeChain {
            withdraw_status: TxStatus::Unknown,
            ..healthy_chain()
        };
        let pool = Arc::new(FakePool::default());
        let outcome = pipeline(chain, pool.clone())
            .run(&strategy(credential()))
            .await;
        assert!(matches!(
            outcome,
            PipelineOutcome::Failed {
                stage: Stage::Withdraw,
                error: ExecutionError::ConfirmationTimeout { attempts: 3, .. },
                stranded: None
            }
        ));
        assert_eq!(pool.deposit_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_withdraw_fails_without_stranding() {
        let chain = FakeChain {
            withdraw_status: TxStatus::Errored("InvalidProof".into()),
            ..healthy_chain()
        };
        let outcome = pipeline(chain, Arc::new(FakePool::default()))
            .run(&strategy(credential()))
            .await;
        match outcome {
            PipelineOutcome::Failed {
                stage: Stage::Withdraw,
                error: ExecutionError::OnChainRejected { reason, .. },
                stranded: None,
            } => assert_eq!(reason, "InvalidProof"),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn low_balance_fails_fee_check_and_strands_input() {
        let chain = FakeChain {
            balance: 1_000,
            ..healthy_chain()
        };
        let outcome = pipeline(chain, Arc::new(FakePool::default()))
            .run(&strategy(credential()))
            .await;
        match outcome {
            PipelineOutcome::Failed {
                stage: Stage::FeeCheck,
                error: ExecutionError::InsufficientFeeReserve { available, .. },
                stranded: Some(stranded),
            } => {
                assert_eq!(available, 1_000);
                assert_eq!(stranded.mint, USDC_MINT);
                assert_eq!(stranded.amount, 10_000_000);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn swap_rejection_is_hard_failure() {
        let chain = FakeChain {
            swap_status: TxStatus::Errored("InstructionError(3, Custom(6001))".into()),
            ..healthy_chain()
        };
        let pool = Arc::new(FakePool::default());
        let outcome = pipeline(chain, pool.clone())
            .run(&strategy(credential()))
            .await;
        match outcome {
            PipelineOutcome::Failed {
                stage: Stage::Swap,
                error: ExecutionError::OnChainRejected { reason, .. },
                stranded: Some(_),
            } => assert!(reason.contains("6001")),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(pool.deposit_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_deposit_errors_are_retried() {
        let pool = Arc::new(FakePool {
            deposit_failures: 2,
            ..FakePool::default()
        });
        let outcome = pipeline(healthy_chain(), pool.clone())
            .run(&strategy(credential()))
            .await;
        assert!(matches!(outcome, PipelineOutcome::Success { .. }));
        assert_eq!(pool.deposit_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn deposit_exhaustion_is_partial_success() {
        let pool = Arc::new(FakePool {
            deposit_failures: usize::MAX,
            ..FakePool::default()
        });
        let outcome = pipeline(healthy_chain(), pool.clone())
            .run(&strategy(credential()))
            .await;
        match outcome {
            PipelineOutcome::Partial {
                output_amount,
                stranded,
                ..
            } => {
                assert_eq!(output_amount, "0.065");
                assert_eq!(stranded.mint, NATIVE_SOL_MINT);
                assert_eq!(stranded.amount, 65_000_000);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(
            pool.deposit_calls.load(Ordering::SeqCst),
            DEFAULT_DEPOSIT_ATTEMPTS
        );
    }
}
