//! Contract gateway: reads pet state by simulation and pushes mutating calls
//! through build, sign, submit and poll.

use crate::{
    ledger::{
        ContractCall,
        ContractFunction,
        GetStatus,
        LedgerError,
        LedgerRpc,
        Pet,
        SendStatus,
        SignedTransaction,
        UnsignedTransaction,
    },
    session::ConnectedWallet,
    wallets::SignerError,
};
use serde_json::Value;
use std::{
    fmt,
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tokio::time;
use tracing::{
    debug,
    info,
    warn,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub contract_id: String,
    pub network_passphrase: String,
    pub poll_interval: Duration,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubmissionStage {
    Building,
    Signing,
    Submitting,
    Pending,
    Polling,
    Success,
    Failed,
}

impl fmt::Display for SubmissionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubmissionStage::Building => "building",
            SubmissionStage::Signing => "signing",
            SubmissionStage::Submitting => "submitting",
            SubmissionStage::Pending => "pending",
            SubmissionStage::Polling => "polling",
            SubmissionStage::Success => "success",
            SubmissionStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SubmissionOutcome {
    Confirmed,
    /// The ledger's response could not be decoded after the transaction left
    /// the client; the operation is assumed to have gone through.
    AssumedConfirmed { reason: String },
}

#[derive(Clone, Debug)]
pub struct Submission {
    pub hash: String,
    pub polls: u32,
    pub outcome: SubmissionOutcome,
    pub trace: Vec<SubmissionStage>,
}

/// A simulated transaction waiting to be signed.
struct Prepared {
    tx: UnsignedTransaction,
    trace: Vec<SubmissionStage>,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to build {function} transaction: {source}")]
    Build {
        function: ContractFunction,
        source: LedgerError,
    },
    #[error("wallet could not sign transaction: {0}")]
    Signing(#[from] SignerError),
    #[error("ledger rejected transaction {hash}: {}", .reason.as_deref().unwrap_or("no reason given"))]
    Rejected {
        hash: String,
        reason: Option<String>,
    },
    #[error("ledger is busy, transaction {hash} was not accepted")]
    Busy { hash: String },
    #[error("transaction {hash} failed")]
    TransactionFailed { hash: String },
    #[error("transaction {hash} succeeded without result metadata")]
    EmptyResultMeta { hash: String },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub struct ContractGateway {
    ledger: Arc<dyn LedgerRpc>,
    config: GatewayConfig,
}

impl ContractGateway {
    pub fn new(ledger: Arc<dyn LedgerRpc>, config: GatewayConfig) -> Self {
        Self { ledger, config }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn call(&self, function: ContractFunction, owner: &str) -> ContractCall {
        ContractCall::new(&self.config.contract_id, function, owner)
    }

    /// `None` when the contract has no pet for `owner`.
    pub async fn fetch_pet(&self, owner: &str) -> Result<Option<Pet>, GatewayError> {
        match self.ledger.simulate(&self.call(ContractFunction::GetPet, owner)).await {
            Ok(value) => Ok(Some(decode_value(ContractFunction::GetPet, value)?)),
            Err(LedgerError::Contract(reason)) => {
                debug!(%owner, %reason, "no pet on record");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn fetch_coins(&self, owner: &str) -> Result<u64, GatewayError> {
        match self
            .ledger
            .simulate(&self.call(ContractFunction::GetCoins, owner))
            .await
        {
            Ok(Value::Null) => Ok(0),
            Ok(value) => Ok(decode_value(ContractFunction::GetCoins, value)?),
            Err(LedgerError::Contract(_)) => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    /// Returns the pet produced by the simulated `create` call.
    pub async fn create_pet(
        &self,
        wallet: &ConnectedWallet,
        name: &str,
    ) -> Result<(Pet, Submission), GatewayError> {
        let call = self
            .call(ContractFunction::Create, wallet.address())
            .with_name(name);
        let (prepared, simulated) = self.prepare(wallet, call).await?;
        let pet = decode_value(ContractFunction::Create, simulated).map_err(|source| {
            GatewayError::Build {
                function: ContractFunction::Create,
                source,
            }
        })?;
        let submission = self.sign_and_send(wallet, prepared).await?;
        Ok((pet, submission))
    }

    pub async fn feed(&self, wallet: &ConnectedWallet) -> Result<Submission, GatewayError> {
        self.invoke(wallet, ContractFunction::Feed).await
    }

    pub async fn play(&self, wallet: &ConnectedWallet) -> Result<Submission, GatewayError> {
        self.invoke(wallet, ContractFunction::Play).await
    }

    pub async fn work(&self, wallet: &ConnectedWallet) -> Result<Submission, GatewayError> {
        self.invoke(wallet, ContractFunction::Work).await
    }

    pub async fn sleep(&self, wallet: &ConnectedWallet) -> Result<Submission, GatewayError> {
        self.invoke(wallet, ContractFunction::Sleep).await
    }

    pub async fn mint_glasses(
        &self,
        wallet: &ConnectedWallet,
    ) -> Result<Submission, GatewayError> {
        self.invoke(wallet, ContractFunction::MintGlasses).await
    }

    pub async fn remove_pet(
        &self,
        wallet: &ConnectedWallet,
    ) -> Result<Submission, GatewayError> {
        self.invoke(wallet, ContractFunction::RemovePet).await
    }

    pub async fn invoke(
        &self,
        wallet: &ConnectedWallet,
        function: ContractFunction,
    ) -> Result<Submission, GatewayError> {
        let call = self.call(function, wallet.address());
        let (prepared, _) = self.prepare(wallet, call).await?;
        self.sign_and_send(wallet, prepared).await
    }

    /// Fetches the sequence and simulates the call. Nothing leaves the
    /// client yet.
    async fn prepare(
        &self,
        wallet: &ConnectedWallet,
        call: ContractCall,
    ) -> Result<(Prepared, Value), GatewayError> {
        let function = call.function;
        debug!(%function, stage = %SubmissionStage::Building);

        let build_err = |source| GatewayError::Build { function, source };
        let sequence = self
            .ledger
            .account_sequence(wallet.address())
            .await
            .map_err(build_err)?;
        let simulated = self.ledger.simulate(&call).await.map_err(build_err)?;
        let prepared = Prepared {
            tx: UnsignedTransaction {
                source: wallet.address().to_string(),
                sequence,
                call,
            },
            trace: vec![SubmissionStage::Building],
        };
        Ok((prepared, simulated))
    }

    async fn sign_and_send(
        &self,
        wallet: &ConnectedWallet,
        prepared: Prepared,
    ) -> Result<Submission, GatewayError> {
        let Prepared { tx, mut trace } = prepared;
        let function = tx.call.function;

        trace.push(SubmissionStage::Signing);
        debug!(%function, stage = %SubmissionStage::Signing);
        let signed = wallet
            .signer()
            .sign(&tx, &self.config.network_passphrase)?;
        let hash = signed.hash();

        trace.push(SubmissionStage::Submitting);
        debug!(%function, %hash, stage = %SubmissionStage::Submitting);
        let mut polls = 0u32;
        let sent = self.send_and_wait(&signed, &mut trace, &mut polls).await;
        match sent {
            Ok(hash) => {
                trace.push(SubmissionStage::Success);
                info!(%function, %hash, polls, "transaction confirmed");
                Ok(Submission {
                    hash,
                    polls,
                    outcome: SubmissionOutcome::Confirmed,
                    trace,
                })
            }
            Err(GatewayError::Ledger(LedgerError::Decode(reason))) => {
                // Left the client already; the ledger's encoding is the suspect.
                warn!(
                    %function,
                    %hash,
                    %reason,
                    polls,
                    "undecodable ledger response after submission, assuming success"
                );
                trace.push(SubmissionStage::Success);
                Ok(Submission {
                    hash,
                    polls,
                    outcome: SubmissionOutcome::AssumedConfirmed { reason },
                    trace,
                })
            }
            Err(err) => {
                trace.push(SubmissionStage::Failed);
                debug!(%function, %hash, polls, ?trace, error = %err, "transaction failed");
                Err(err)
            }
        }
    }

    async fn send_and_wait(
        &self,
        signed: &SignedTransaction,
        trace: &mut Vec<SubmissionStage>,
        polls: &mut u32,
    ) -> Result<String, GatewayError> {
        let sent = self.ledger.send_transaction(signed).await?;
        let hash = sent.hash;
        match sent.status {
            SendStatus::Error => {
                return Err(GatewayError::Rejected {
                    hash,
                    reason: sent.error_result,
                });
            }
            SendStatus::TryAgainLater => return Err(GatewayError::Busy { hash }),
            SendStatus::Pending | SendStatus::Duplicate => {}
        }

        trace.push(SubmissionStage::Pending);
        trace.push(SubmissionStage::Polling);
        loop {
            *polls += 1;
            let status = self.ledger.get_transaction(&hash).await?;
            match status.status {
                GetStatus::NotFound => {
                    debug!(%hash, polls = *polls, stage = %SubmissionStage::Polling);
                    time::sleep(self.config.poll_interval).await;
                }
                GetStatus::Success => {
                    let has_meta = status
                        .result_meta
                        .as_deref()
                        .is_some_and(|meta| !meta.is_empty());
                    if !has_meta {
                        return Err(GatewayError::EmptyResultMeta { hash });
                    }
                    return Ok(hash);
                }
                GetStatus::Failed => return Err(GatewayError::TransactionFailed { hash }),
            }
        }
    }
}

fn decode_value<T: serde::de::DeserializeOwned>(
    function: ContractFunction,
    value: Value,
) -> Result<T, LedgerError> {
    serde_json::from_value(value)
        .map_err(|e| LedgerError::Decode(format!("{function} result: {e}")))
}
