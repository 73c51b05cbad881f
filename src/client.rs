use crate::{
    config::{
        AppConfig,
        NetworkTarget,
        WalletConfig,
    },
    game::{
        GameController,
        GameState,
        PendingAction,
        PetAction,
        PetMood,
        RemoteAction,
    },
    gateway::{
        ContractGateway,
        GatewayConfig,
    },
    ledger::{
        LedgerRpc,
        RpcLedger,
    },
    local_ledger::LocalLedger,
    notify::NotificationKind,
    session::{
        SELECTION_CLOSED,
        WalletSession,
        truncate_address,
    },
    storage::SnapshotStore,
    ui,
    wallets::{
        DevConnector,
        KeystoreConnector,
        WalletConnector,
        WalletDescriptor,
        prompt_wallet_password,
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use std::{
    sync::Arc,
    time::{
        Duration,
        Instant,
    },
};
use tokio::{
    sync::mpsc,
    time,
};
use tracing::{
    info,
    warn,
};

const TICK_INTERVAL: Duration = Duration::from_millis(250);
const READY: &str = "Ready";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WalletBadge {
    pub name: String,
    pub address: String,
}

/// Everything one frame needs.
#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub network: String,
    pub wallet: Option<WalletBadge>,
    pub connecting: bool,
    pub game: GameState,
    pub mood: PetMood,
    pub loading: bool,
    pub status: String,
    pub toasts: Vec<(NotificationKind, String)>,
    pub wallets: Vec<WalletDescriptor>,
    pub requires_password: bool,
}

pub struct AppController {
    network: String,
    connector: Box<dyn WalletConnector>,
    session: WalletSession,
    game: GameController,
    wallets: Vec<WalletDescriptor>,
    status: String,
}

impl AppController {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let ledger: Arc<dyn LedgerRpc> = match &config.network {
            NetworkTarget::Testnet { url, .. } => {
                info!(%url, "using remote ledger");
                Arc::new(RpcLedger::new(url.clone())?)
            }
            NetworkTarget::Local => {
                info!("using in-process ledger");
                Arc::new(LocalLedger::new())
            }
        };
        let gateway = Arc::new(ContractGateway::new(
            ledger,
            GatewayConfig {
                contract_id: config.network.contract_id().to_string(),
                network_passphrase: config.network.passphrase().to_string(),
                poll_interval: config.poll_interval,
            },
        ));
        let connector: Box<dyn WalletConnector> = match &config.wallets {
            WalletConfig::Keystore { dir } => Box::new(KeystoreConnector::new(dir.clone())),
            WalletConfig::Dev => Box::new(DevConnector::new()),
        };
        let store = SnapshotStore::new(&config.data_dir)?;
        let network = match &config.network {
            NetworkTarget::Testnet { .. } => "testnet",
            NetworkTarget::Local => "local",
        };
        Ok(Self::from_parts(
            network,
            connector,
            GameController::new(gateway, store),
        ))
    }

    pub fn from_parts(
        network: impl Into<String>,
        connector: Box<dyn WalletConnector>,
        game: GameController,
    ) -> Self {
        Self {
            network: network.into(),
            connector,
            session: WalletSession::new(),
            game,
            wallets: Vec::new(),
            status: READY.to_string(),
        }
    }

    pub fn session(&self) -> &WalletSession {
        &self.session
    }

    pub fn game(&self) -> &GameController {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut GameController {
        &mut self.game
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn build_snapshot(&self) -> AppSnapshot {
        let now = Instant::now();
        AppSnapshot {
            network: self.network.clone(),
            wallet: self.session.wallet().map(|w| WalletBadge {
                name: w.descriptor().name.clone(),
                address: truncate_address(w.address()),
            }),
            connecting: self.session.is_connecting(),
            game: self.game.state().clone(),
            mood: self.game.mood(),
            loading: self.game.is_loading(),
            status: self.status.clone(),
            toasts: self
                .game
                .notifications()
                .active(now)
                .map(|n| (n.kind, n.message.clone()))
                .collect(),
            wallets: self.wallets.clone(),
            requires_password: self.connector.requires_password(),
        }
    }

    /// Starts wallet selection. `false` means the picker should not open.
    pub fn open_wallet_select(&mut self) -> bool {
        if !self.session.begin_connect() {
            return false;
        }
        match self.connector.available_wallets() {
            Ok(wallets) if !wallets.is_empty() => {
                self.wallets = wallets;
                true
            }
            Ok(_) => {
                self.session.cancel_connect();
                self.game.notifications_mut().error("No wallets found");
                false
            }
            Err(err) => {
                self.session.cancel_connect();
                warn!(error = %err, "listing wallets failed");
                self.game
                    .notifications_mut()
                    .error(format!("Failed to list wallets: {err}"));
                false
            }
        }
    }

    pub fn cancel_wallet_select(&mut self) {
        self.session.cancel_connect();
        self.game.notifications_mut().info(SELECTION_CLOSED);
    }

    pub async fn connect(&mut self, wallet: &WalletDescriptor, password: &str) -> bool {
        let address = match self.session.connect(self.connector.as_ref(), wallet, password) {
            Ok(connected) => connected.address().to_string(),
            Err(err) => {
                warn!(wallet = %wallet.name, error = %err, "wallet connect failed");
                self.game
                    .notifications_mut()
                    .error(format!("Failed to connect wallet: {err}"));
                return false;
            }
        };
        self.game
            .notifications_mut()
            .success(format!("Connected {}", truncate_address(&address)));
        self.game.on_wallet_connected(&self.session).await;
        true
    }

    /// Connects the wallet named on the command line, prompting for its
    /// password before the terminal UI takes over.
    pub async fn connect_startup_wallet(&mut self, name: &str) -> Result<()> {
        let wallet = self
            .connector
            .available_wallets()?
            .into_iter()
            .find(|w| w.name == name)
            .ok_or_else(|| eyre!("Wallet '{name}' not found"))?;
        let password = if self.connector.requires_password() {
            prompt_wallet_password(&wallet)?
        } else {
            String::new()
        };
        self.session.begin_connect();
        self.session
            .connect(self.connector.as_ref(), &wallet, &password)
            .wrap_err_with(|| format!("Failed to connect wallet '{name}'"))?;
        self.game.on_wallet_connected(&self.session).await;
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.session.disconnect();
        self.game.on_wallet_disconnected();
        self.game.notifications_mut().info("Wallet disconnected");
    }

    pub async fn feed(&mut self) {
        self.game.feed(&self.session).await;
    }

    pub async fn play(&mut self) {
        self.game.play(&self.session).await;
    }

    pub async fn work(&mut self) {
        self.game.work(&self.session).await;
    }

    pub async fn sleep(&mut self) {
        self.game.sleep(&self.session).await;
    }

    pub async fn mint_glasses(&mut self) {
        self.game.mint_glasses(&self.session).await;
    }

    pub async fn create_pet(&mut self, name: &str) {
        self.game.create_pet(&self.session, name).await;
    }

    pub async fn remove_pet(&mut self) {
        self.game.remove_pet(&self.session).await;
    }

    /// First half of a remote action: checks and loading state only.
    pub fn begin_action(&mut self, action: RemoteAction) -> Option<PendingAction> {
        self.game.begin(&self.session, action)
    }

    pub async fn complete_action(&mut self, pending: PendingAction) {
        self.game.complete(&self.session, pending).await;
    }

    pub fn equip(&mut self, item: &str) {
        self.game.equip(&self.session, item);
    }

    pub fn unequip(&mut self, item: &str) {
        self.game.unequip(&self.session, item);
    }

    pub fn reset(&mut self) {
        self.game.reset();
    }

    pub async fn sync(&mut self) {
        if self.session.is_connected() && self.game.reconcile(&self.session).await {
            self.game.notifications_mut().info("Synced with the ledger");
        }
    }

    pub fn prune_notifications(&mut self) {
        self.game.notifications_mut().prune(Instant::now());
    }
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let mut controller = AppController::new(&config)?;
    if let Some(name) = config.startup_wallet.as_deref() {
        controller.connect_startup_wallet(name).await?;
    }
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(controller, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;
    res
}

fn show_processing_status(
    controller: &mut AppController,
    ui_state: &mut ui::UiState,
    message: impl Into<String>,
    context: &'static str,
) -> Result<()> {
    controller.set_status(message);
    ui::draw(ui_state, &controller.build_snapshot()).wrap_err(context)
}

enum LoopCommand {
    Sync,
}

fn schedule_syncs(controller: &mut AppController, tx: &mpsc::UnboundedSender<LoopCommand>) {
    for delay in controller.game_mut().take_scheduled_syncs() {
        let tx = tx.clone();
        tokio::spawn(async move {
            time::sleep(delay).await;
            let _ = tx.send(LoopCommand::Sync);
        });
    }
}

/// Draws the loading frame between the checks and the transaction.
async fn run_remote_action(
    controller: &mut AppController,
    ui_state: &mut ui::UiState,
    action: RemoteAction,
) -> Result<()> {
    let Some(pending) = controller.begin_action(action) else {
        return Ok(());
    };
    show_processing_status(
        controller,
        ui_state,
        pending.status_message(),
        "draw while processing failed",
    )?;
    controller.complete_action(pending).await;
    controller.set_status(READY);
    Ok(())
}

/// Applies one user intent. Returns `false` once the player quits.
async fn dispatch(
    controller: &mut AppController,
    ui_state: &mut ui::UiState,
    event: ui::UserEvent,
) -> Result<bool> {
    use ui::UserEvent;

    let processing = match &event {
        UserEvent::Connect { .. } => Some("Connecting wallet..."),
        UserEvent::Sync => Some("Syncing..."),
        _ => None,
    };
    if let Some(message) = processing {
        show_processing_status(controller, ui_state, message, "draw while processing failed")?;
    }

    match event {
        UserEvent::Quit => return Ok(false),
        UserEvent::Redraw => {}
        UserEvent::OpenWalletSelect => {
            if !controller.open_wallet_select() {
                ui_state.close_modal();
            }
        }
        UserEvent::CancelWalletSelect => controller.cancel_wallet_select(),
        UserEvent::Connect { wallet, password } => {
            controller.connect(&wallet, &password).await;
        }
        UserEvent::Disconnect => controller.disconnect(),
        UserEvent::Feed => {
            run_remote_action(controller, ui_state, RemoteAction::Pet(PetAction::Feed)).await?
        }
        UserEvent::Play => {
            run_remote_action(controller, ui_state, RemoteAction::Pet(PetAction::Play)).await?
        }
        UserEvent::Work => {
            run_remote_action(controller, ui_state, RemoteAction::Pet(PetAction::Work)).await?
        }
        UserEvent::Sleep => {
            run_remote_action(controller, ui_state, RemoteAction::Pet(PetAction::Sleep)).await?
        }
        UserEvent::MintGlasses => {
            run_remote_action(controller, ui_state, RemoteAction::Pet(PetAction::MintGlasses)).await?
        }
        UserEvent::CreatePet(name) => {
            run_remote_action(controller, ui_state, RemoteAction::Create(name)).await?
        }
        UserEvent::RemovePet => {
            run_remote_action(controller, ui_state, RemoteAction::Remove).await?
        }
        UserEvent::Equip(item) => controller.equip(&item),
        UserEvent::Unequip(item) => controller.unequip(&item),
        UserEvent::Reset => controller.reset(),
        UserEvent::Sync => controller.sync().await,
    }
    if processing.is_some() {
        controller.set_status(READY);
    }
    Ok(true)
}

async fn run_loop(
    mut controller: AppController,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    info!("Running app loop");
    let (sync_tx, mut sync_rx) = mpsc::unbounded_channel();
    let mut ticker = time::interval(TICK_INTERVAL);
    ui::draw(ui_state, &controller.build_snapshot()).wrap_err("initial draw failed")?;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                controller.prune_notifications();
                ui::draw(ui_state, &controller.build_snapshot())
                    .wrap_err("draw on tick failed")?;
            }
            Some(cmd) = sync_rx.recv() => {
                match cmd {
                    LoopCommand::Sync => controller.sync().await,
                }
                schedule_syncs(&mut controller, &sync_tx);
                ui::draw(ui_state, &controller.build_snapshot())
                    .wrap_err("draw after delayed sync failed")?;
            }
            _ = tokio::signal::ctrl_c() => break,
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                if !dispatch(&mut controller, ui_state, ev).await? {
                    break;
                }
                schedule_syncs(&mut controller, &sync_tx);
                ui::draw(ui_state, &controller.build_snapshot())
                    .wrap_err("draw after input failed")?;
            }
        }
    }
    info!("Leaving app loop");
    Ok(())
}

