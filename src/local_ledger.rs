//! In-process ledger running the pet contract rules. Backs `--local` play and
//! the test suite.

use crate::ledger::{
    ContractCall,
    ContractFunction,
    GetStatus,
    GetTransactionResponse,
    LedgerError,
    LedgerRpc,
    Pet,
    SendStatus,
    SendTransactionResponse,
    SignedTransaction,
    UnsignedTransaction,
};
use async_trait::async_trait;
use base64::{
    Engine,
    engine::general_purpose::STANDARD as BASE64,
};
use serde_json::{
    Value,
    json,
};
use std::{
    collections::{
        HashMap,
        VecDeque,
    },
    sync::{
        Mutex,
        MutexGuard,
        PoisonError,
    },
    time::Duration,
};
use tracing::debug;

pub const MAX_STAT: u32 = 100;
pub const GENESIS_TIME: u64 = 1_700_000_000;
pub const DECAY_PERIOD_SECS: u64 = 3600;

pub const FEED_HUNGER: u32 = 30;
pub const PLAY_HAPPINESS: u32 = 20;
pub const PLAY_ENERGY_COST: u32 = 15;
pub const SLEEP_ENERGY: u32 = 40;
pub const WORK_ENERGY_COST: u32 = 20;
pub const WORK_HAPPINESS_COST: u32 = 10;
pub const WORK_REWARD: u64 = 25;
pub const GLASSES_PRICE: u64 = 50;

pub const PET_NOT_FOUND: &str = "Pet not found";
pub const PET_GONE: &str = "Your pet is no longer with us.";

/// One-shot failures for the next matching request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Fault {
    /// Next submission comes back with status `ERROR`.
    RejectSubmission,
    /// Next submission is accepted but ends as `FAILED`.
    FailTransaction,
    /// Next submission is applied but its response cannot be decoded.
    GarbledResponse,
    /// Next successful simulation returns a value of the wrong shape.
    MalformedSimulation,
    /// Next poll that would resolve a transaction cannot be decoded.
    GarbledStatus,
    /// Next request of any kind fails at the transport.
    Unreachable,
}

#[derive(Clone, Debug, Default)]
struct ContractState {
    pets: HashMap<String, Pet>,
    coins: HashMap<String, u64>,
}

impl ContractState {
    fn decayed_pet(&self, owner: &str, now: u64) -> Result<Pet, String> {
        let mut pet = self
            .pets
            .get(owner)
            .cloned()
            .ok_or_else(|| PET_NOT_FOUND.to_string())?;
        apply_decay(&mut pet, now);
        Ok(pet)
    }

    fn living_pet(&self, owner: &str, now: u64) -> Result<Pet, String> {
        let pet = self.decayed_pet(owner, now)?;
        if !pet.is_alive {
            return Err(PET_GONE.to_string());
        }
        Ok(pet)
    }

    fn store(&mut self, owner: &str, mut pet: Pet, now: u64) -> Value {
        pet.last_updated = now;
        let value = json!(pet);
        self.pets.insert(owner.to_string(), pet);
        value
    }

    fn execute(&mut self, call: &ContractCall, now: u64) -> Result<Value, String> {
        let owner = call.owner.as_str();
        match call.function {
            ContractFunction::Create => {
                if let Ok(existing) = self.decayed_pet(owner, now) {
                    if existing.is_alive {
                        return Err("Pet already exists for this owner".to_string());
                    }
                }
                let pet = Pet {
                    name: call.name.clone().unwrap_or_default(),
                    birthdate: now,
                    last_updated: now,
                    is_alive: true,
                    hunger: MAX_STAT,
                    happiness: MAX_STAT,
                    energy: MAX_STAT,
                    has_glasses: false,
                };
                self.coins.insert(owner.to_string(), 0);
                Ok(self.store(owner, pet, now))
            }
            ContractFunction::GetPet => Ok(json!(self.decayed_pet(owner, now)?)),
            ContractFunction::GetCoins => {
                Ok(json!(self.coins.get(owner).copied().unwrap_or(0)))
            }
            ContractFunction::Feed => {
                let mut pet = self.living_pet(owner, now)?;
                pet.hunger = (pet.hunger + FEED_HUNGER).min(MAX_STAT);
                Ok(self.store(owner, pet, now))
            }
            ContractFunction::Play => {
                let mut pet = self.living_pet(owner, now)?;
                pet.happiness = (pet.happiness + PLAY_HAPPINESS).min(MAX_STAT);
                pet.energy = pet.energy.saturating_sub(PLAY_ENERGY_COST);
                Ok(self.store(owner, pet, now))
            }
            ContractFunction::Sleep => {
                let mut pet = self.living_pet(owner, now)?;
                pet.energy = (pet.energy + SLEEP_ENERGY).min(MAX_STAT);
                Ok(self.store(owner, pet, now))
            }
            ContractFunction::Work => {
                let mut pet = self.living_pet(owner, now)?;
                if pet.energy < WORK_ENERGY_COST {
                    return Err("Not enough energy to work.".to_string());
                }
                pet.energy -= WORK_ENERGY_COST;
                pet.happiness = pet.happiness.saturating_sub(WORK_HAPPINESS_COST);
                *self.coins.entry(owner.to_string()).or_default() += WORK_REWARD;
                Ok(self.store(owner, pet, now))
            }
            ContractFunction::MintGlasses => {
                let mut pet = self.living_pet(owner, now)?;
                let balance = self.coins.entry(owner.to_string()).or_default();
                if *balance < GLASSES_PRICE {
                    return Err("Not enough coins to mint glasses.".to_string());
                }
                *balance -= GLASSES_PRICE;
                pet.has_glasses = true;
                Ok(self.store(owner, pet, now))
            }
            // Idempotent: removes whichever keys exist.
            ContractFunction::RemovePet => {
                self.pets.remove(owner);
                self.coins.remove(owner);
                Ok(Value::Null)
            }
        }
    }
}

/// Hunger drops one point per elapsed hour, happiness one per two hours.
fn apply_decay(pet: &mut Pet, now: u64) {
    if !pet.is_alive {
        return;
    }
    let periods = now.saturating_sub(pet.last_updated) / DECAY_PERIOD_SECS;
    if periods == 0 {
        return;
    }
    let periods = u32::try_from(periods).unwrap_or(u32::MAX);
    pet.hunger = pet.hunger.saturating_sub(periods);
    pet.happiness = pet.happiness.saturating_sub(periods / 2);
    pet.last_updated = now;
    if pet.hunger == 0 || pet.happiness == 0 {
        pet.is_alive = false;
    }
}

#[derive(Clone, Debug)]
struct TxRecord {
    remaining_polls: u32,
    status: GetStatus,
    result: Value,
}

#[derive(Default)]
struct LedgerState {
    now: u64,
    contract: ContractState,
    sequences: HashMap<String, u64>,
    transactions: HashMap<String, TxRecord>,
    submitted: Vec<ContractCall>,
    faults: VecDeque<Fault>,
    requests: usize,
}

impl LedgerState {
    fn take_fault(&mut self, matches: impl Fn(Fault) -> bool) -> Option<Fault> {
        let index = self.faults.iter().position(|f| matches(*f))?;
        self.faults.remove(index)
    }

    /// Counts the request and trips a pending `Unreachable` fault.
    fn begin_request(&mut self, method: &str) -> Result<(), LedgerError> {
        self.requests += 1;
        if self.take_fault(|f| f == Fault::Unreachable).is_some() {
            return Err(LedgerError::Transport(format!(
                "{method}: local ledger unreachable"
            )));
        }
        Ok(())
    }
}

pub struct LocalLedger {
    state: Mutex<LedgerState>,
    pending_polls: u32,
}

impl Default for LocalLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LedgerState {
                now: GENESIS_TIME,
                ..LedgerState::default()
            }),
            pending_polls: 0,
        }
    }

    /// Number of `NOT_FOUND` polls each transaction reports before resolving.
    pub fn with_pending_polls(mut self, polls: u32) -> Self {
        self.pending_polls = polls;
        self
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ledger time in seconds.
    pub fn now(&self) -> u64 {
        self.state().now
    }

    pub fn advance_time(&self, by: Duration) {
        self.state().now += by.as_secs();
    }

    pub fn inject(&self, fault: Fault) {
        self.state().faults.push_back(fault);
    }

    /// Calls carried by submitted transactions, in submission order.
    pub fn submitted_calls(&self) -> Vec<ContractCall> {
        self.state().submitted.clone()
    }

    /// Every RPC request seen, reads included.
    pub fn request_count(&self) -> usize {
        self.state().requests
    }

    pub fn pet(&self, owner: &str) -> Option<Pet> {
        let state = self.state();
        state.contract.decayed_pet(owner, state.now).ok()
    }

    pub fn coins(&self, owner: &str) -> u64 {
        self.state().contract.coins.get(owner).copied().unwrap_or(0)
    }

    fn accept(
        &self,
        state: &mut LedgerState,
        tx: &SignedTransaction,
    ) -> Result<SendTransactionResponse, LedgerError> {
        let hash = tx.hash();
        if state.transactions.contains_key(&hash) {
            return Ok(SendTransactionResponse {
                status: SendStatus::Duplicate,
                hash,
                error_result: None,
            });
        }
        let rejected = |reason: &str| SendTransactionResponse {
            status: SendStatus::Error,
            hash: hash.clone(),
            error_result: Some(reason.to_string()),
        };
        let unsigned = match UnsignedTransaction::from_envelope(&tx.envelope) {
            Ok(unsigned) => unsigned,
            Err(_) => return Ok(rejected("txMalformed")),
        };
        if tx.signature.is_empty() {
            return Ok(rejected("txBadAuth"));
        }
        let expected = state.sequences.get(&unsigned.source).copied().unwrap_or(0) + 1;
        if unsigned.sequence != expected {
            return Ok(rejected("txBadSeq"));
        }
        if unsigned.call.owner != unsigned.source {
            return Ok(rejected("txBadAuth"));
        }
        if state.take_fault(|f| f == Fault::RejectSubmission).is_some() {
            return Ok(rejected("txInternalError"));
        }

        state.sequences.insert(unsigned.source.clone(), unsigned.sequence);
        state.submitted.push(unsigned.call.clone());

        let forced_failure = state.take_fault(|f| f == Fault::FailTransaction).is_some();
        let now = state.now;
        let (status, result) = if forced_failure {
            (GetStatus::Failed, Value::Null)
        } else {
            match state.contract.execute(&unsigned.call, now) {
                Ok(result) => (GetStatus::Success, result),
                Err(reason) => {
                    debug!(%hash, %reason, "contract call failed on chain");
                    (GetStatus::Failed, Value::Null)
                }
            }
        };
        debug!(%hash, function = %unsigned.call.function, ?status, "transaction applied");
        state.transactions.insert(
            hash.clone(),
            TxRecord {
                remaining_polls: self.pending_polls,
                status,
                result,
            },
        );
        Ok(SendTransactionResponse {
            status: SendStatus::Pending,
            hash,
            error_result: None,
        })
    }
}

#[async_trait]
impl LedgerRpc for LocalLedger {
    async fn account_sequence(&self, address: &str) -> Result<u64, LedgerError> {
        let mut state = self.state();
        state.begin_request("getAccount")?;
        Ok(state.sequences.get(address).copied().unwrap_or(0) + 1)
    }

    async fn simulate(&self, call: &ContractCall) -> Result<Value, LedgerError> {
        let mut state = self.state();
        state.begin_request("simulateTransaction")?;
        let mut scratch = state.contract.clone();
        let result = scratch
            .execute(call, state.now)
            .map_err(LedgerError::Contract)?;
        if state.take_fault(|f| f == Fault::MalformedSimulation).is_some() {
            return Ok(json!("not a contract value"));
        }
        Ok(result)
    }

    async fn send_transaction(
        &self,
        tx: &SignedTransaction,
    ) -> Result<SendTransactionResponse, LedgerError> {
        let mut state = self.state();
        state.begin_request("sendTransaction")?;
        let response = self.accept(&mut state, tx)?;
        let garbled = response.status == SendStatus::Pending
            && state.take_fault(|f| f == Fault::GarbledResponse).is_some();
        if garbled {
            return Err(LedgerError::Decode(
                "sendTransaction: unknown variant in result".to_string(),
            ));
        }
        Ok(response)
    }

    async fn get_transaction(
        &self,
        hash: &str,
    ) -> Result<GetTransactionResponse, LedgerError> {
        let mut state = self.state();
        state.begin_request("getTransaction")?;
        let Some(record) = state.transactions.get_mut(hash) else {
            return Ok(GetTransactionResponse {
                status: GetStatus::NotFound,
                result_meta: None,
            });
        };
        if record.remaining_polls > 0 {
            record.remaining_polls -= 1;
            return Ok(GetTransactionResponse {
                status: GetStatus::NotFound,
                result_meta: None,
            });
        }
        let status = record.status;
        let result_meta = match status {
            GetStatus::Success => Some(BASE64.encode(record.result.to_string())),
            _ => None,
        };
        if state.take_fault(|f| f == Fault::GarbledStatus).is_some() {
            return Err(LedgerError::Decode(
                "getTransaction: unknown variant in status".to_string(),
            ));
        }
        Ok(GetTransactionResponse {
            status,
            result_meta,
        })
    }
}
