use crate::{
    client::AppController,
    config::{
        LOCAL_CONTRACT_ID,
        LOCAL_PASSPHRASE,
    },
    game::{
        GameController,
        SyncTimings,
    },
    gateway::{
        ContractGateway,
        GatewayConfig,
    },
    local_ledger::LocalLedger,
    session::{
        ConnectedWallet,
        WalletSession,
    },
    storage::SnapshotStore,
    wallets::{
        DevConnector,
        WalletConnector,
        WalletDescriptor,
    },
};
use std::{
    path::Path,
    sync::Arc,
    time::Duration,
};
use tempfile::TempDir;

/// Local ledger, dev wallets and a throwaway data directory.
pub struct TestContext {
    ledger: Arc<LocalLedger>,
    gateway: Arc<ContractGateway>,
    connector: DevConnector,
    data_dir: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_ledger(LocalLedger::new())
    }

    pub fn with_ledger(ledger: LocalLedger) -> Self {
        let ledger = Arc::new(ledger);
        let gateway = Arc::new(ContractGateway::new(
            ledger.clone(),
            GatewayConfig {
                contract_id: LOCAL_CONTRACT_ID.to_string(),
                network_passphrase: LOCAL_PASSPHRASE.to_string(),
                poll_interval: Duration::ZERO,
            },
        ));
        Self {
            ledger,
            gateway,
            connector: DevConnector::new(),
            data_dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn ledger(&self) -> &LocalLedger {
        &self.ledger
    }

    pub fn gateway(&self) -> Arc<ContractGateway> {
        self.gateway.clone()
    }

    pub fn connector(&self) -> &DevConnector {
        &self.connector
    }

    pub fn data_dir(&self) -> &Path {
        self.data_dir.path()
    }

    pub fn store(&self) -> SnapshotStore {
        SnapshotStore::new(self.data_dir()).unwrap()
    }

    pub fn descriptor(&self, name: &str) -> WalletDescriptor {
        self.connector
            .available_wallets()
            .unwrap()
            .into_iter()
            .find(|w| w.name == name)
            .unwrap()
    }

    pub fn wallet(&self, name: &str) -> ConnectedWallet {
        let signer = self.connector.unlock(&self.descriptor(name), "").unwrap();
        ConnectedWallet::new(self.descriptor(name), signer)
    }

    /// Session already connected to the named dev wallet.
    pub fn session(&self, name: &str) -> WalletSession {
        let mut session = WalletSession::new();
        session
            .connect(&self.connector, &self.descriptor(name), "")
            .unwrap();
        session
    }

    pub fn address(&self, name: &str) -> String {
        self.wallet(name).address().to_string()
    }

    /// Game holder whose delayed syncs are due immediately.
    pub fn controller(&self) -> GameController {
        GameController::new(self.gateway(), self.store()).with_timings(SyncTimings {
            retry_after: Duration::ZERO,
            after_create: Duration::ZERO,
        })
    }

    pub fn app(&self) -> AppController {
        AppController::from_parts("local", Box::new(DevConnector::new()), self.controller())
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
