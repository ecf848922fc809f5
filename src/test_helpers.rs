use crate::{
    assessment_types::Assessment,
    guessing_types::GuessingGame,
};
use fuels::{
    accounts::wallet::Wallet,
    prelude::{
        Contract,
        ContractId,
        LoadConfiguration,
        TxPolicies,
        WalletsConfig,
        launch_custom_provider_and_get_wallets,
    },
};

const WALLET_COIN_AMOUNT: u64 = 100_000_000_000;

fn assessment_bin_path() -> std::path::PathBuf {
    crate::manifest_path("contracts/assessment.bin")
}

fn guessing_game_bin_path() -> std::path::PathBuf {
    crate::manifest_path("contracts/guessing-game.bin")
}

/// Two funded wallets on a throwaway local chain.
pub struct TestContext {
    alice: Wallet,
    bob: Wallet,
}

impl TestContext {
    pub async fn new() -> Self {
        let mut wallets = launch_custom_provider_and_get_wallets(
            WalletsConfig::new(Some(2), Some(1), Some(WALLET_COIN_AMOUNT)),
            None,
            None,
        )
        .await
        .expect("failed to launch local provider");

        let bob = wallets.pop().expect("missing bob wallet");
        let alice = wallets.pop().expect("missing alice wallet");
        Self { alice, bob }
    }

    pub fn alice(&self) -> Wallet {
        self.alice.clone()
    }

    pub fn bob(&self) -> Wallet {
        self.bob.clone()
    }
}

pub async fn deploy_assessment(wallet: Wallet) -> (Assessment<Wallet>, ContractId) {
    let contract = Contract::load_from(assessment_bin_path(), LoadConfiguration::default())
        .expect("failed to load assessment contract binary");
    let response = contract
        .deploy(&wallet, TxPolicies::default())
        .await
        .expect("failed to deploy assessment contract");
    let contract_id = response.contract_id;

    let instance = Assessment::new(contract_id, wallet);

    (instance, contract_id)
}

pub async fn deploy_guessing_game(wallet: Wallet) -> (GuessingGame<Wallet>, ContractId) {
    let contract =
        Contract::load_from(guessing_game_bin_path(), LoadConfiguration::default())
            .expect("failed to load guessing game contract binary");
    let response = contract
        .deploy(&wallet, TxPolicies::default())
        .await
        .expect("failed to deploy guessing game contract");
    let contract_id = response.contract_id;

    let instance = GuessingGame::new(contract_id, wallet);

    (instance, contract_id)
}

pub fn separate_assessment_instance(
    id: &ContractId,
    wallet: Wallet,
) -> Assessment<Wallet> {
    Assessment::new(*id, wallet)
}
