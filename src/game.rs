//! Game state holder: the local model of the player's pet, the actions that
//! change it, and reconciliation against the contract.

use crate::{
    gateway::{
        ContractGateway,
        GatewayError,
        Submission,
    },
    ledger::{
        ContractFunction,
        Pet,
    },
    notify::Notifications,
    session::{
        ConnectedWallet,
        WalletSession,
    },
    storage::SnapshotStore,
};
use chrono::Utc;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    sync::Arc,
    time::Duration,
};
use tracing::{
    error,
    info,
    warn,
};

pub const MAX_STAT: u32 = 100;
pub const COOL_GLASSES: &str = "cool-glasses";

pub const RETRY_SYNC_DELAY: Duration = Duration::from_secs(5);
pub const CREATE_SYNC_DELAY: Duration = Duration::from_secs(2);

const CONNECT_FIRST: &str = "Please connect your wallet first";
const CREATE_FIRST: &str = "Please create a pet first";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PetStats {
    pub hunger: u32,
    pub happy: u32,
    pub energy: u32,
}

impl PetStats {
    pub fn from_pet(pet: &Pet) -> Self {
        Self {
            hunger: pet.hunger.min(MAX_STAT),
            happy: pet.happiness.min(MAX_STAT),
            energy: pet.energy.min(MAX_STAT),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PetMood {
    Happy,
    Neutral,
    Sad,
    Sleeping,
}

impl PetMood {
    /// Sleeping wins; otherwise the mean of the three stats decides
    /// (> 60 happy, > 30 neutral).
    pub fn from_stats(stats: &PetStats, is_sleeping: bool) -> Self {
        if is_sleeping {
            return PetMood::Sleeping;
        }
        let total = stats.hunger + stats.happy + stats.energy;
        if total > 180 {
            PetMood::Happy
        } else if total > 90 {
            PetMood::Neutral
        } else {
            PetMood::Sad
        }
    }
}

impl fmt::Display for PetMood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PetMood::Happy => "happy",
            PetMood::Neutral => "neutral",
            PetMood::Sad => "sad",
            PetMood::Sleeping => "sleeping",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub stats: PetStats,
    pub coins: u64,
    pub inventory: Vec<String>,
    pub equipped_items: Vec<String>,
    pub is_sleeping: bool,
    /// Epoch milliseconds.
    pub last_update: i64,
    #[serde(default)]
    pub pet_name: Option<String>,
    pub has_real_pet: bool,
}

impl GameState {
    pub fn initial() -> Self {
        Self {
            last_update: Utc::now().timestamp_millis(),
            ..Self::default()
        }
    }

    pub fn mood(&self) -> PetMood {
        PetMood::from_stats(&self.stats, self.is_sleeping)
    }

    pub fn owns(&self, item: &str) -> bool {
        self.inventory.iter().any(|i| i == item)
    }

    pub fn is_equipped(&self, item: &str) -> bool {
        self.equipped_items.iter().any(|i| i == item)
    }

    /// Drops equipped items that are no longer in the inventory.
    pub fn enforce_equipped_subset(&mut self) {
        let inventory = &self.inventory;
        self.equipped_items.retain(|item| inventory.contains(item));
    }

    /// Merges a contract read into the local model. A missing or dead pet
    /// only clears `has_real_pet` and refreshes coins.
    pub fn reconciled(&self, pet: Option<&Pet>, coins: u64) -> GameState {
        let mut next = self.clone();
        next.coins = coins;
        match pet {
            Some(pet) if pet.is_alive => {
                next.stats = PetStats::from_pet(pet);
                next.pet_name = Some(pet.name.clone());
                next.has_real_pet = true;
                next.is_sleeping = false;
                set_membership(&mut next.inventory, COOL_GLASSES, pet.has_glasses);
                set_membership(&mut next.equipped_items, COOL_GLASSES, pet.has_glasses);
            }
            _ => next.has_real_pet = false,
        }
        next
    }
}

fn set_membership(items: &mut Vec<String>, item: &str, present: bool) {
    items.retain(|i| i != item);
    if present {
        items.push(item.to_string());
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PetAction {
    Feed,
    Play,
    Work,
    Sleep,
    MintGlasses,
}

impl PetAction {
    pub fn function(self) -> ContractFunction {
        match self {
            PetAction::Feed => ContractFunction::Feed,
            PetAction::Play => ContractFunction::Play,
            PetAction::Work => ContractFunction::Work,
            PetAction::Sleep => ContractFunction::Sleep,
            PetAction::MintGlasses => ContractFunction::MintGlasses,
        }
    }

    fn loading_message(self) -> &'static str {
        match self {
            PetAction::Feed => "Feeding pet on-chain...",
            PetAction::Play => "Playing with pet on-chain...",
            PetAction::Work => "Working with pet on-chain...",
            PetAction::Sleep => "Putting pet to sleep on-chain...",
            PetAction::MintGlasses => "🌟 Minting on-chain...",
        }
    }

    fn success_message(self) -> &'static str {
        match self {
            PetAction::Feed => "🍖 Yum! Pet fed on-chain!",
            PetAction::Play => "🎮 Wheee! So fun on-chain!",
            PetAction::Work => "💰 Work completed on-chain!",
            PetAction::Sleep => "💤 Pet is sleeping on-chain!",
            PetAction::MintGlasses => "🕶️ Cool Glasses minted on-chain!",
        }
    }

    fn pending_message(self) -> &'static str {
        match self {
            PetAction::Feed => "Feeding may be processing. Check pet status in a moment.",
            PetAction::Play => "Playing may be processing. Check pet status in a moment.",
            PetAction::Work => "Work may be processing. Check coins in a moment.",
            PetAction::Sleep => {
                "Sleep action may be processing. Check pet status in a moment."
            }
            PetAction::MintGlasses => {
                "Minting may be processing. Check inventory in a moment."
            }
        }
    }
}

impl fmt::Display for PetAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.function().fmt(f)
    }
}

/// Everything that needs a signed transaction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RemoteAction {
    Pet(PetAction),
    Create(String),
    Remove,
}

impl RemoteAction {
    fn loading_message(&self) -> &'static str {
        match self {
            RemoteAction::Pet(action) => action.loading_message(),
            RemoteAction::Create(_) => "Creating pet on-chain...",
            RemoteAction::Remove => "🗑️ Removing pet...",
        }
    }
}

/// A remote action that passed its local checks. The controller stays in
/// the loading state until it is handed back to [`GameController::complete`].
#[must_use]
#[derive(Debug)]
pub struct PendingAction(RemoteAction);

impl PendingAction {
    pub fn action(&self) -> &RemoteAction {
        &self.0
    }

    pub fn status_message(&self) -> &'static str {
        self.0.loading_message()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SyncTimings {
    pub retry_after: Duration,
    pub after_create: Duration,
}

impl Default for SyncTimings {
    fn default() -> Self {
        Self {
            retry_after: RETRY_SYNC_DELAY,
            after_create: CREATE_SYNC_DELAY,
        }
    }
}

pub struct GameController {
    gateway: Arc<ContractGateway>,
    store: SnapshotStore,
    state: GameState,
    loading: bool,
    notifications: Notifications,
    scheduled_syncs: Vec<Duration>,
    timings: SyncTimings,
}

impl GameController {
    /// Restores the last snapshot from `store`, or starts fresh.
    pub fn new(gateway: Arc<ContractGateway>, store: SnapshotStore) -> Self {
        let mut state = match store.load() {
            Ok(Some(saved)) => GameState {
                last_update: Utc::now().timestamp_millis(),
                ..saved
            },
            Ok(None) => GameState::initial(),
            Err(err) => {
                warn!(error = %err, path = %store.path().display(), "discarding unreadable game snapshot");
                GameState::initial()
            }
        };
        state.enforce_equipped_subset();
        Self {
            gateway,
            store,
            state,
            loading: false,
            notifications: Notifications::default(),
            scheduled_syncs: Vec::new(),
            timings: SyncTimings::default(),
        }
    }

    pub fn with_timings(mut self, timings: SyncTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn mood(&self) -> PetMood {
        self.state.mood()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut Notifications {
        &mut self.notifications
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Delayed reconciliations requested since the last call.
    pub fn take_scheduled_syncs(&mut self) -> Vec<Duration> {
        std::mem::take(&mut self.scheduled_syncs)
    }

    fn schedule_sync(&mut self, after: Duration) {
        self.scheduled_syncs.push(after);
    }

    fn commit(&mut self, update: impl FnOnce(&mut GameState)) {
        update(&mut self.state);
        self.state.enforce_equipped_subset();
        if let Err(err) = self.store.save(&self.state) {
            warn!(error = %err, "failed to persist game snapshot");
        }
    }

    fn require_wallet<'a>(&mut self, session: &'a WalletSession) -> Option<&'a ConnectedWallet> {
        let wallet = session.wallet();
        if wallet.is_none() {
            self.notifications.error(CONNECT_FIRST);
        }
        wallet
    }

    fn require_pet<'a>(&mut self, session: &'a WalletSession) -> Option<&'a ConnectedWallet> {
        let wallet = self.require_wallet(session)?;
        if !self.state.has_real_pet {
            self.notifications.error(CREATE_FIRST);
            return None;
        }
        Some(wallet)
    }

    pub async fn on_wallet_connected(&mut self, session: &WalletSession) {
        self.reconcile(session).await;
    }

    /// Back to defaults with nothing left on disk.
    pub fn on_wallet_disconnected(&mut self) {
        self.state = GameState::initial();
        if let Err(err) = self.store.remove() {
            warn!(error = %err, "failed to erase game snapshot");
        }
    }

    /// Refreshes stats, coins and cosmetics from the contract. Returns whether
    /// the refresh went through.
    pub async fn reconcile(&mut self, session: &WalletSession) -> bool {
        let Some(wallet) = session.wallet() else {
            return false;
        };
        self.loading = true;
        let owner = wallet.address();
        let fetched = futures::try_join!(
            self.gateway.fetch_pet(owner),
            self.gateway.fetch_coins(owner)
        );
        self.loading = false;
        match fetched {
            Ok((pet, coins)) => {
                let next = self.state.reconciled(pet.as_ref(), coins);
                self.commit(|state| *state = next);
                true
            }
            Err(err) => {
                warn!(error = %err, "reconciliation failed");
                self.notifications.error("Failed to sync with the ledger");
                false
            }
        }
    }

    pub async fn feed(&mut self, session: &WalletSession) {
        self.perform(session, RemoteAction::Pet(PetAction::Feed)).await;
    }

    pub async fn play(&mut self, session: &WalletSession) {
        self.perform(session, RemoteAction::Pet(PetAction::Play)).await;
    }

    pub async fn work(&mut self, session: &WalletSession) {
        self.perform(session, RemoteAction::Pet(PetAction::Work)).await;
    }

    pub async fn sleep(&mut self, session: &WalletSession) {
        self.perform(session, RemoteAction::Pet(PetAction::Sleep)).await;
    }

    pub async fn mint_glasses(&mut self, session: &WalletSession) {
        self.perform(session, RemoteAction::Pet(PetAction::MintGlasses)).await;
    }

    pub async fn create_pet(&mut self, session: &WalletSession, name: &str) {
        self.perform(session, RemoteAction::Create(name.to_string())).await;
    }

    /// Works on dead pets too, so there is no pet check.
    pub async fn remove_pet(&mut self, session: &WalletSession) {
        self.perform(session, RemoteAction::Remove).await;
    }

    pub async fn perform(&mut self, session: &WalletSession, action: RemoteAction) {
        if let Some(pending) = self.begin(session, action) {
            self.complete(session, pending).await;
        }
    }

    /// Runs the local checks, then raises the loading flag and shows the
    /// loading toast. `None` means the action was refused with an error toast.
    pub fn begin(
        &mut self,
        session: &WalletSession,
        action: RemoteAction,
    ) -> Option<PendingAction> {
        let action = match action {
            RemoteAction::Pet(pet_action) => {
                self.require_pet(session)?;
                RemoteAction::Pet(pet_action)
            }
            RemoteAction::Create(name) => {
                self.require_wallet(session)?;
                let name = name.trim();
                if name.is_empty() {
                    self.notifications.error("Give your pet a name first");
                    return None;
                }
                RemoteAction::Create(name.to_string())
            }
            RemoteAction::Remove => {
                self.require_wallet(session)?;
                RemoteAction::Remove
            }
        };
        self.loading = true;
        self.notifications.loading(action.loading_message());
        Some(PendingAction(action))
    }

    /// Sends the transaction for an action accepted by [`Self::begin`].
    pub async fn complete(&mut self, session: &WalletSession, pending: PendingAction) {
        let Some(wallet) = session.wallet() else {
            self.loading = false;
            self.notifications.error(CONNECT_FIRST);
            return;
        };
        match pending.0 {
            RemoteAction::Pet(action) => self.complete_pet_action(session, wallet, action).await,
            RemoteAction::Create(name) => self.complete_create(wallet, &name).await,
            RemoteAction::Remove => self.complete_remove(wallet).await,
        }
    }

    async fn complete_pet_action(
        &mut self,
        session: &WalletSession,
        wallet: &ConnectedWallet,
        action: PetAction,
    ) {
        let result: Result<Submission, GatewayError> =
            self.gateway.invoke(wallet, action.function()).await;
        self.loading = false;
        match result {
            Ok(_) => {
                self.reconcile(session).await;
                if action == PetAction::Sleep {
                    self.commit(|state| state.is_sleeping = true);
                }
                self.notifications.success(action.success_message());
            }
            Err(err) => {
                error!(%action, error = %err, "pet action failed");
                self.notifications.error(action.pending_message());
                self.schedule_sync(self.timings.retry_after);
            }
        }
    }

    async fn complete_create(&mut self, wallet: &ConnectedWallet, name: &str) {
        let result = self.gateway.create_pet(wallet, name).await;
        self.loading = false;
        match result {
            Ok((pet, _)) => {
                info!(name = %pet.name, "pet created");
                let now = Utc::now().timestamp_millis();
                self.commit(|state| {
                    state.stats = PetStats::from_pet(&pet);
                    state.pet_name = Some(pet.name.clone());
                    state.has_real_pet = true;
                    state.is_sleeping = false;
                    state.last_update = now;
                });
                self.notifications.success(format!("🎉 {name} created on-chain!"));
                self.schedule_sync(self.timings.after_create);
            }
            Err(err) => {
                error!(error = %err, "create pet failed");
                self.notifications.error(
                    "Pet creation may be processing. Please refresh in a moment to check status.",
                );
                self.schedule_sync(self.timings.retry_after);
            }
        }
    }

    async fn complete_remove(&mut self, wallet: &ConnectedWallet) {
        let result = self.gateway.remove_pet(wallet).await;
        self.loading = false;
        match result {
            Ok(_) => {
                self.commit(|state| {
                    state.has_real_pet = false;
                    state.stats = PetStats::default();
                    state.coins = 0;
                    state.pet_name = None;
                    state.is_sleeping = false;
                    state.inventory.retain(|i| i != COOL_GLASSES);
                });
                self.notifications.success("🗑️ Pet removed from the ledger!");
            }
            Err(err) => {
                error!(error = %err, "remove pet failed");
                self.notifications.error(
                    "Pet removal may be processing. Please refresh to check status.",
                );
                self.schedule_sync(self.timings.retry_after);
            }
        }
    }

    pub fn equip(&mut self, session: &WalletSession, item: &str) {
        if self.require_pet(session).is_none() {
            return;
        }
        if !self.state.owns(item) {
            self.notifications.error(format!("You don't own {item} yet"));
            return;
        }
        if self.state.is_equipped(item) {
            self.notifications.info("👔 Already equipped!");
            return;
        }
        self.commit(|state| state.equipped_items.push(item.to_string()));
        self.notifications.success(format!("✨ Equipped {item}!"));
    }

    pub fn unequip(&mut self, session: &WalletSession, item: &str) {
        if self.require_pet(session).is_none() {
            return;
        }
        self.commit(|state| state.equipped_items.retain(|i| i != item));
        self.notifications.info("👔 Item unequipped");
    }

    /// Callers confirm with the player first.
    pub fn reset(&mut self) {
        self.commit(|state| *state = GameState::initial());
        self.notifications.info("🔄 Game reset!");
    }
}
