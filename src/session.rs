use crate::wallets::{
    TransactionSigner,
    WalletConnector,
    WalletDescriptor,
};
use color_eyre::eyre::Result;
use std::{
    fmt,
    sync::Arc,
};
use tracing::info;

pub const SELECTION_CLOSED: &str = "User closed wallet selection";

#[derive(Clone)]
pub struct ConnectedWallet {
    descriptor: WalletDescriptor,
    address: String,
    signer: Arc<dyn TransactionSigner>,
}

impl ConnectedWallet {
    pub fn new(descriptor: WalletDescriptor, signer: Arc<dyn TransactionSigner>) -> Self {
        Self {
            descriptor,
            address: signer.address().to_string(),
            signer,
        }
    }

    pub fn descriptor(&self) -> &WalletDescriptor {
        &self.descriptor
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn signer(&self) -> &Arc<dyn TransactionSigner> {
        &self.signer
    }
}

impl fmt::Debug for ConnectedWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectedWallet")
            .field("descriptor", &self.descriptor)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Which wallet, if any, the player is signed in with.
#[derive(Debug, Default)]
pub struct WalletSession {
    connected: Option<ConnectedWallet>,
    connecting: bool,
}

impl WalletSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.is_some()
    }

    pub fn is_connecting(&self) -> bool {
        self.connecting
    }

    pub fn wallet(&self) -> Option<&ConnectedWallet> {
        self.connected.as_ref()
    }

    pub fn address(&self) -> Option<&str> {
        self.connected.as_ref().map(|w| w.address())
    }

    pub fn descriptor(&self) -> Option<&WalletDescriptor> {
        self.connected.as_ref().map(|w| w.descriptor())
    }

    /// Opens the selection flow. Returns `false` if one is already open.
    pub fn begin_connect(&mut self) -> bool {
        if self.connecting {
            return false;
        }
        self.connecting = true;
        true
    }

    pub fn cancel_connect(&mut self) {
        self.connecting = false;
    }

    pub fn connect(
        &mut self,
        connector: &dyn WalletConnector,
        descriptor: &WalletDescriptor,
        password: &str,
    ) -> Result<&ConnectedWallet> {
        self.connecting = false;
        let signer = connector.unlock(descriptor, password)?;
        let wallet = ConnectedWallet::new(descriptor.clone(), signer);
        info!(wallet = %descriptor.name, address = %wallet.address(), "wallet connected");
        Ok(self.connected.insert(wallet))
    }

    pub fn disconnect(&mut self) {
        if let Some(wallet) = self.connected.take() {
            info!(wallet = %wallet.descriptor().name, "wallet disconnected");
        }
        self.connecting = false;
    }
}

/// `GABCDE...WXYZ` style: first six and last four characters.
pub fn truncate_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return address.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::wallets::DevConnector;

    #[test]
    fn truncate_address__keeps_head_and_tail() {
        assert_eq!(
            truncate_address("0x1234567890abcdef"),
            "0x1234...cdef".to_string()
        );
    }

    #[test]
    fn truncate_address__short_addresses_are_untouched() {
        assert_eq!(truncate_address("0xabc"), "0xabc".to_string());
    }

    #[test]
    fn connect__stores_address_and_descriptor() {
        let connector = DevConnector::new();
        let alice = connector.available_wallets().unwrap().remove(0);
        let mut session = WalletSession::new();

        assert!(session.begin_connect());
        let address = session.connect(&connector, &alice, "").unwrap().address().to_string();

        assert!(session.is_connected());
        assert!(!session.is_connecting());
        assert_eq!(session.address(), Some(address.as_str()));
        assert_eq!(session.descriptor(), Some(&alice));
    }

    #[test]
    fn begin_connect__ignores_second_request_while_open() {
        let mut session = WalletSession::new();
        assert!(session.begin_connect());
        assert!(!session.begin_connect());
        session.cancel_connect();
        assert!(!session.is_connecting());
        assert!(session.begin_connect());
    }

    #[test]
    fn disconnect__clears_session() {
        let connector = DevConnector::new();
        let bob = connector
            .available_wallets()
            .unwrap()
            .into_iter()
            .find(|w| w.name == "bob")
            .unwrap();
        let mut session = WalletSession::new();
        session.connect(&connector, &bob, "").unwrap();

        session.disconnect();

        assert!(!session.is_connected());
        assert_eq!(session.address(), None);
        assert_eq!(session.descriptor(), None);
    }
}
