// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use crate::domain::error::ExecutionError;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::VersionedTransaction;
use std::fmt;
use std::sync::Arc;

/// Signing key derived for a strategy, used for pool requests and swaps.
///
/// Credentials are stored as the 64-byte keypair JSON array the Solana CLI writes.
#[derive(Clone)]
pub struct SessionKey {
    keypair: Arc<Keypair>,
}

impl SessionKey {
    pub fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    pub fn parse(credential: &str) -> Result<Self, ExecutionError> {
        let bytes: Vec<u8> = serde_json::from_str(credential.trim()).map_err(|_| {
            ExecutionError::InvalidCredential("expected a JSON byte array".to_string())
        })?;
        if bytes.len() != 64 {
            return Err(ExecutionError::InvalidCredential(format!(
                "expected 64 bytes, got {}",
                bytes.len()
            )));
        }
        #[allow(deprecated)]
        let keypair = Keypair::from_bytes(&bytes)
            .map_err(|e| ExecutionError::InvalidCredential(e.to_string()))?;
        Ok(Self::from_keypair(keypair))
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn sign_message(&self, message: &[u8]) -> Signature {
        self.keypair.sign_message(message)
    }

    /// Fill this key's signature slot in a prebuilt transaction.
    pub fn sign_transaction(
        &self,
        mut tx: VersionedTransaction,
    ) -> Result<VersionedTransaction, ExecutionError> {
        let pubkey = self.pubkey();
        let required = tx.message.header().num_required_signatures as usize;
        let slot = tx
            .message
            .static_account_keys()
            .iter()
            .take(required)
            .position(|key| key == &pubkey)
            .ok_or_else(|| {
                ExecutionError::InvalidCredential(format!(
                    "session key {pubkey} is not a required signer of the transaction"
                ))
            })?;

        if tx.signatures.len() != required {
            tx.signatures.resize(required, Signature::default());
        }
        tx.signatures[slot] = self.sign_message(&tx.message.serialize());
        Ok(tx)
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey")
            .field("pubkey", &self.pubkey())
            .finish()
    }
}
