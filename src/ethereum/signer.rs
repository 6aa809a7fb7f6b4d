use alloy::{network::EthereumWallet, primitives::Address, signers::local::PrivateKeySigner};
use anyhow::{anyhow, Result};
use std::str::FromStr;
use tokio::sync::{Mutex, MutexGuard};

/// The "next nonce" for one signing identity.
///
/// Unset until the first submission seeds it from the node. Whoever holds
/// the guard owns the nonce until it either advances it or drops the guard.
#[derive(Debug, Default)]
pub struct NonceManager {
    next: Mutex<Option<u64>>,
}

impl NonceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self) -> MutexGuard<'_, Option<u64>> {
        self.next.lock().await
    }

    /// Forget the cached nonce so the next submission asks the node again.
    #[allow(dead_code)]
    pub async fn reset(&self) {
        *self.next.lock().await = None;
        tracing::debug!("Nonce cache cleared");
    }

    #[allow(dead_code)]
    pub async fn peek(&self) -> Option<u64> {
        *self.next.lock().await
    }
}

/// Signing identity plus its nonce sequence.
pub struct Signer {
    wallet: EthereumWallet,
    address: Address,
    nonces: NonceManager,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("address", &self.address)
            .field("nonces", &self.nonces)
            .finish_non_exhaustive()
    }
}

impl Signer {
    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let private_key = private_key.trim();
        let private_key = private_key
            .strip_prefix("0x")
            .unwrap_or(private_key);

        if private_key.is_empty() {
            return Err(anyhow!("Private key cannot be empty"));
        }

        let signer = PrivateKeySigner::from_str(private_key)
            .map_err(|e| anyhow!("Invalid private key: {}", e))?;

        Ok(Self::new(signer))
    }

    pub fn new(signer: PrivateKeySigner) -> Self {
        let address = signer.address();
        Self {
            wallet: EthereumWallet::from(signer),
            address,
            nonces: NonceManager::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn wallet(&self) -> &EthereumWallet {
        &self.wallet
    }

    pub fn nonces(&self) -> &NonceManager {
        &self.nonces
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development key (anvil/hardhat account #0)
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_signer_from_private_key() {
        let signer = Signer::from_private_key(DEV_KEY).unwrap();
        assert_eq!(
            signer.address(),
            Address::from_str("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266").unwrap()
        );

        let without_prefix = Signer::from_private_key(&DEV_KEY[2..]).unwrap();
        assert_eq!(without_prefix.address(), signer.address());
    }

    #[test]
    fn test_signer_rejects_bad_keys() {
        assert!(Signer::from_private_key("").is_err());
        assert!(Signer::from_private_key("0x").is_err());
        assert!(Signer::from_private_key("TEST_PRIVATE_KEY").is_err());
    }

    #[tokio::test]
    async fn test_nonce_manager_reset() {
        let nonces = NonceManager::new();
        assert_eq!(nonces.peek().await, None);

        *nonces.lock().await = Some(4);
        assert_eq!(nonces.peek().await, Some(4));

        nonces.reset().await;
        assert_eq!(nonces.peek().await, None);
    }
}
