use crate::ledger::{
    SignedTransaction,
    UnsignedTransaction,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use eth_keystore::decrypt_key;
use fuels::{
    crypto::{
        Message,
        PublicKey,
        SecretKey,
        Signature,
    },
    prelude::derivation::DEFAULT_DERIVATION_PATH,
};
use rand::Rng;
use rpassword::prompt_password;
use std::{
    fmt,
    fs,
    path::{
        Path,
        PathBuf,
    },
    sync::Arc,
};
use thiserror::Error;

pub const DEV_WALLET_DIR: &str = "<dev>";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WalletDescriptor {
    pub name: String,
    pub path: PathBuf,
}

impl WalletDescriptor {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }
}

#[derive(Debug, Error)]
pub enum SignerError {
    #[error("transaction source {source_address} does not match wallet {wallet}")]
    WrongSource {
        source_address: String,
        wallet: String,
    },
    #[error("failed to encode transaction for signing: {0}")]
    Encode(String),
}

/// Signs transactions for one unlocked account.
pub trait TransactionSigner: Send + Sync {
    fn address(&self) -> &str;

    fn sign(
        &self,
        tx: &UnsignedTransaction,
        network_passphrase: &str,
    ) -> std::result::Result<SignedTransaction, SignerError>;
}

/// Lists wallets the user may pick from and unlocks the chosen one.
pub trait WalletConnector: Send + Sync {
    fn available_wallets(&self) -> Result<Vec<WalletDescriptor>>;

    /// Whether `unlock` needs a password from the user.
    fn requires_password(&self) -> bool;

    fn unlock(
        &self,
        descriptor: &WalletDescriptor,
        password: &str,
    ) -> Result<Arc<dyn TransactionSigner>>;
}

pub struct KeySigner {
    secret: SecretKey,
    public_key: PublicKey,
    address: String,
}

impl KeySigner {
    pub fn new(secret: SecretKey) -> Self {
        let public_key = PublicKey::from(&secret);
        let address = format!("0x{}", hex::encode(*public_key.hash()));
        Self {
            secret,
            public_key,
            address,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let secret = SecretKey::try_from(bytes)
            .map_err(|e| eyre!("invalid secret key material: {e:?}"))?;
        Ok(Self::new(secret))
    }
}

impl fmt::Debug for KeySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl TransactionSigner for KeySigner {
    fn address(&self) -> &str {
        &self.address
    }

    fn sign(
        &self,
        tx: &UnsignedTransaction,
        network_passphrase: &str,
    ) -> std::result::Result<SignedTransaction, SignerError> {
        if tx.source != self.address {
            return Err(SignerError::WrongSource {
                source_address: tx.source.clone(),
                wallet: self.address.clone(),
            });
        }
        let payload = tx
            .signature_payload(network_passphrase)
            .map_err(|e| SignerError::Encode(e.to_string()))?;
        let envelope = tx
            .envelope()
            .map_err(|e| SignerError::Encode(e.to_string()))?;
        let signature = Signature::sign(&self.secret, &Message::new(payload));
        Ok(SignedTransaction {
            envelope,
            signature: hex::encode(*signature),
            public_key: hex::encode(*self.public_key),
        })
    }
}

pub fn default_wallet_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".pixel-pet").join("wallets"))
}

pub fn resolve_wallet_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_wallet_dir(),
    }
}

pub fn list_wallets(dir: &Path) -> Result<Vec<WalletDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut wallets = Vec::new();
    for entry in fs::read_dir(dir).wrap_err("Failed to read wallet directory")? {
        let entry = entry.wrap_err("Failed to read wallet entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some("wallet") {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| eyre!("Invalid wallet filename {:?}", path))?
            .to_owned();
        wallets.push(WalletDescriptor::new(name, path));
    }
    wallets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(wallets)
}

pub fn find_wallet(dir: &Path, name: &str) -> Result<WalletDescriptor> {
    let wallets = list_wallets(dir)?;
    wallets
        .into_iter()
        .find(|w| w.name == name)
        .ok_or_else(|| eyre!("Wallet '{name}' not found in {}", dir.to_string_lossy()))
}

pub fn prompt_wallet_password(descriptor: &WalletDescriptor) -> Result<String> {
    let prompt = format!("Enter password for wallet '{}': ", descriptor.name);
    prompt_password(prompt).wrap_err("Failed to read wallet password")
}

pub fn unlock_keystore(descriptor: &WalletDescriptor, password: &str) -> Result<KeySigner> {
    let secret = decrypt_key(&descriptor.path, password.as_bytes())
        .map_err(|_| eyre!("Invalid password for wallet '{}'", descriptor.name))?;

    if let Ok(secret_key) = SecretKey::try_from(secret.as_slice()) {
        return Ok(KeySigner::new(secret_key));
    }

    if let Ok(mnemonic) = std::str::from_utf8(&secret) {
        let word_count = mnemonic.split_whitespace().count();
        if word_count >= 12 {
            let private_key = SecretKey::new_from_mnemonic_phrase_with_path(
                mnemonic,
                DEFAULT_DERIVATION_PATH,
            )?;
            return Ok(KeySigner::new(private_key));
        }
    }

    Err(eyre!(
        "Wallet '{}' contained unsupported key material",
        descriptor.name
    ))
}

/// Encrypted keystore files in a wallet directory.
#[derive(Clone, Debug)]
pub struct KeystoreConnector {
    dir: PathBuf,
}

impl KeystoreConnector {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl WalletConnector for KeystoreConnector {
    fn available_wallets(&self) -> Result<Vec<WalletDescriptor>> {
        list_wallets(&self.dir)
    }

    fn requires_password(&self) -> bool {
        true
    }

    fn unlock(
        &self,
        descriptor: &WalletDescriptor,
        password: &str,
    ) -> Result<Arc<dyn TransactionSigner>> {
        let signer = unlock_keystore(descriptor, password)?;
        Ok(Arc::new(signer))
    }
}

/// Unencrypted wallets for the local simulator: two fixed keys plus one
/// generated per run.
pub struct DevConnector {
    wallets: Vec<(String, [u8; 32])>,
}

impl DevConnector {
    pub fn new() -> Self {
        let fresh = rand::rng().random::<[u8; 32]>();
        Self {
            wallets: vec![
                ("alice".to_string(), [0x11; 32]),
                ("bob".to_string(), [0x22; 32]),
                ("fresh".to_string(), fresh),
            ],
        }
    }

    fn secret_for(&self, name: &str) -> Option<&[u8; 32]> {
        self.wallets
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, secret)| secret)
    }

    pub fn signer(&self, name: &str) -> Result<KeySigner> {
        let secret = self
            .secret_for(name)
            .ok_or_else(|| eyre!("Unknown development wallet '{name}'"))?;
        KeySigner::from_bytes(secret)
    }
}

impl Default for DevConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl WalletConnector for DevConnector {
    fn available_wallets(&self) -> Result<Vec<WalletDescriptor>> {
        Ok(self
            .wallets
            .iter()
            .map(|(name, _)| WalletDescriptor::new(name.clone(), PathBuf::from(DEV_WALLET_DIR)))
            .collect())
    }

    fn requires_password(&self) -> bool {
        false
    }

    fn unlock(
        &self,
        descriptor: &WalletDescriptor,
        _password: &str,
    ) -> Result<Arc<dyn TransactionSigner>> {
        Ok(Arc::new(self.signer(&descriptor.name)?))
    }
}
