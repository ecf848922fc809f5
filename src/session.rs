use crate::wallets::{
    self,
    WalletDescriptor,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use fuels::prelude::{
    Provider,
    Wallet,
};
use std::path::Path;
use tracing::{
    debug,
    info,
};

/// Probes the host environment for a usable transaction provider. Absence is
/// a normal, reportable state, never an error.
pub async fn detect(url: &str) -> Option<Provider> {
    match Provider::connect(url).await {
        Ok(provider) => Some(provider),
        Err(err) => {
            debug!(%url, %err, "no wallet provider reachable");
            None
        }
    }
}

/// First-account policy: the head of the sorted keystore listing is the
/// active account. An empty keystore is an expected idle state.
pub fn select_active_account(accounts: &[WalletDescriptor]) -> Option<&WalletDescriptor> {
    match accounts.first() {
        Some(first) => Some(first),
        None => {
            info!("no account found");
            None
        }
    }
}

/// Proof that a session holds both a detected provider and an unlocked
/// signing account. Contract binding requires this by construction.
pub struct ConnectedSession<'a> {
    pub provider: &'a Provider,
    pub wallet: &'a Wallet,
}

/// The client's record of which account is authorized to sign operations.
/// Lives as long as the process; there is no disconnect transition.
#[derive(Default)]
pub struct Session {
    provider: Option<Provider>,
    active_account: Option<Wallet>,
    account_name: Option<String>,
}

impl Session {
    pub fn new(provider: Option<Provider>) -> Self {
        Self {
            provider,
            active_account: None,
            account_name: None,
        }
    }

    pub fn provider(&self) -> Option<&Provider> {
        self.provider.as_ref()
    }

    pub fn active_account(&self) -> Option<&Wallet> {
        self.active_account.as_ref()
    }

    pub fn account_name(&self) -> Option<&str> {
        self.account_name.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.active_account.is_some()
    }

    /// Read-only keystore listing; never prompts the user.
    pub fn accounts(&self, dir: &Path) -> Result<Vec<WalletDescriptor>> {
        wallets::list_wallets(dir)
    }

    /// Connects the session to an account. Suspends on the wallet password
    /// prompt. Returns `false` when the keystore has no matching account
    /// (idle, not a failure); fails when no provider was detected or the
    /// prompt is declined.
    pub fn request_connect(&mut self, dir: &Path, preferred: Option<&str>) -> Result<bool> {
        let Some(provider) = self.provider.as_ref() else {
            return Err(eyre!("no wallet provider detected; cannot connect"));
        };

        let descriptor = match preferred {
            Some(name) => Some(wallets::find_wallet(dir, name)?),
            None => {
                let accounts = self.accounts(dir)?;
                select_active_account(&accounts).cloned()
            }
        };
        let Some(descriptor) = descriptor else {
            return Ok(false);
        };

        let wallet = wallets::unlock_wallet(&descriptor, provider)?;
        info!(account = %descriptor.name, "session connected");
        self.active_account = Some(wallet);
        self.account_name = Some(descriptor.name);
        Ok(true)
    }

    pub fn connected(&self) -> Option<ConnectedSession<'_>> {
        match (&self.provider, &self.active_account) {
            (Some(provider), Some(wallet)) => Some(ConnectedSession { provider, wallet }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;
    use crate::errors::{
        ErrorKind,
        classify,
    };
    use std::path::PathBuf;

    #[tokio::test]
    async fn detect__unreachable_endpoint_reports_absence() {
        // Nothing listens on the discard port; detection must not error out.
        let provider = detect("http://127.0.0.1:9/").await;

        assert!(provider.is_none());
    }

    #[test]
    fn select_active_account__takes_first_of_sorted_listing() {
        let accounts = vec![
            WalletDescriptor::new("alice", PathBuf::from("alice.wallet")),
            WalletDescriptor::new("bob", PathBuf::from("bob.wallet")),
        ];

        let active = select_active_account(&accounts).unwrap();

        assert_eq!(active.name, "alice");
    }

    #[test]
    fn select_active_account__empty_listing_is_idle_not_error() {
        assert!(select_active_account(&[]).is_none());
    }

    #[test]
    fn request_connect__without_provider_classifies_as_unavailable() {
        let mut session = Session::new(None);

        let err = session
            .request_connect(Path::new("/nonexistent"), None)
            .unwrap_err();

        assert_eq!(classify(&err).kind, ErrorKind::ProviderUnavailable);
        assert!(!session.is_connected());
    }

    #[test]
    fn connected__requires_both_provider_and_account() {
        let session = Session::new(None);

        assert!(session.connected().is_none());
    }
}
