//! Signed contract surfaces. A surface wraps one bound contract instance and
//! translates its calls and emitted logs into domain terms; the orchestrator
//! never touches the generated bindings directly, which keeps it testable
//! against in-process fakes.

use crate::{
    assessment_types::{
        Assessment,
        DepositEvent,
        TransferEvent,
        WithdrawEvent,
    },
    client::Difficulty,
    guessing_types::{
        self,
        BetSettledEvent,
        DifficultySetEvent,
        GuessingGame,
        NumberRevealedEvent,
    },
    session::ConnectedSession,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use fuels::{
    accounts::ViewOnlyAccount,
    prelude::{
        CallParameters,
        ContractId,
        VariableOutputPolicy,
        Wallet,
    },
    programs::calls::Execution,
    types::{
        Address,
        AssetId,
    },
};

const FORWARD_GAS: u64 = 1_000_000;

/// One emitted result record extracted from a confirmed call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SurfaceEvent {
    Deposited { amount: u64, new_balance: u64 },
    Withdrawn { amount: u64, new_balance: u64 },
    Transferred { amount: u64, new_balance: u64 },
    BetSettled { guess: u64, won: bool, payout: u64 },
    DifficultySet { tier: Difficulty },
    NumberRevealed { number: u64 },
}

/// Confirmation data for one submitted call: the result records the contract
/// emitted, in log order.
#[derive(Clone, Debug, Default)]
pub struct CallRecord {
    pub events: Vec<SurfaceEvent>,
}

/// The ATM contract's callable surface, as the orchestrator sees it. Every
/// state-changing call suspends until the submission is confirmed.
pub trait AtmSurface {
    fn deposit(&self, amount: u64) -> impl Future<Output = Result<CallRecord>>;
    fn withdraw(&self, amount: u64) -> impl Future<Output = Result<CallRecord>>;
    fn transfer_to(
        &self,
        recipient: Address,
        amount: u64,
    ) -> impl Future<Output = Result<CallRecord>>;
    fn balance(&self) -> impl Future<Output = Result<u64>>;
}

/// The guessing-game contract's callable surface.
pub trait WagerSurface {
    fn place_bet(&self, guess: u64, stake: u64)
    -> impl Future<Output = Result<CallRecord>>;
    fn set_difficulty(
        &self,
        tier: Difficulty,
    ) -> impl Future<Output = Result<CallRecord>>;
    fn reveal_number(&self) -> impl Future<Output = Result<CallRecord>>;
    fn current_difficulty(&self) -> impl Future<Output = Result<Difficulty>>;
    fn balance(&self) -> impl Future<Output = Result<u64>>;
}

pub struct AssessmentSurface {
    instance: Assessment<Wallet>,
    base_asset_id: AssetId,
}

pub struct GuessingGameSurface {
    instance: GuessingGame<Wallet>,
    base_asset_id: AssetId,
}

/// Binds the ATM contract to the session's signing identity. Requires a
/// connected session; every call through the returned surface is signed by
/// its active account.
pub async fn bind_assessment(
    session: ConnectedSession<'_>,
    contract_id: ContractId,
) -> Result<AssessmentSurface> {
    let base_asset_id = base_asset_id(&session).await?;
    Ok(AssessmentSurface {
        instance: Assessment::new(contract_id, session.wallet.clone()),
        base_asset_id,
    })
}

pub async fn bind_guessing_game(
    session: ConnectedSession<'_>,
    contract_id: ContractId,
) -> Result<GuessingGameSurface> {
    let base_asset_id = base_asset_id(&session).await?;
    Ok(GuessingGameSurface {
        instance: GuessingGame::new(contract_id, session.wallet.clone()),
        base_asset_id,
    })
}

async fn base_asset_id(session: &ConnectedSession<'_>) -> Result<AssetId> {
    let consensus_parameters = session.provider.consensus_parameters().await?;
    Ok(*consensus_parameters.base_asset_id())
}

impl AtmSurface for AssessmentSurface {
    async fn deposit(&self, amount: u64) -> Result<CallRecord> {
        let call = CallParameters::new(amount, self.base_asset_id, FORWARD_GAS);
        let response = self
            .instance
            .methods()
            .deposit()
            .call_params(call)?
            .call()
            .await?;
        let events = response
            .decode_logs_with_type::<DepositEvent>()?
            .into_iter()
            .map(|ev| SurfaceEvent::Deposited {
                amount: ev.amount,
                new_balance: ev.new_balance,
            })
            .collect();
        Ok(CallRecord { events })
    }

    async fn withdraw(&self, amount: u64) -> Result<CallRecord> {
        let response = self
            .instance
            .methods()
            .withdraw(amount)
            .with_variable_output_policy(VariableOutputPolicy::EstimateMinimum)
            .call()
            .await?;
        let events = response
            .decode_logs_with_type::<WithdrawEvent>()?
            .into_iter()
            .map(|ev| SurfaceEvent::Withdrawn {
                amount: ev.amount,
                new_balance: ev.new_balance,
            })
            .collect();
        Ok(CallRecord { events })
    }

    async fn transfer_to(&self, recipient: Address, amount: u64) -> Result<CallRecord> {
        let response = self
            .instance
            .methods()
            .transfer_to(recipient, amount)
            .call()
            .await?;
        let events = response
            .decode_logs_with_type::<TransferEvent>()?
            .into_iter()
            .map(|ev| SurfaceEvent::Transferred {
                amount: ev.amount,
                new_balance: ev.new_balance,
            })
            .collect();
        Ok(CallRecord { events })
    }

    async fn balance(&self) -> Result<u64> {
        // The vault balance is keyed by the caller, so the read has to run
        // with the session's identity attached.
        let balance = self
            .instance
            .methods()
            .get_balance()
            .simulate(Execution::realistic())
            .await?
            .value;
        Ok(balance)
    }
}

impl WagerSurface for GuessingGameSurface {
    async fn place_bet(&self, guess: u64, stake: u64) -> Result<CallRecord> {
        let call = CallParameters::new(stake, self.base_asset_id, FORWARD_GAS);
        let response = self
            .instance
            .methods()
            .place_bet(guess)
            .with_variable_output_policy(VariableOutputPolicy::EstimateMinimum)
            .call_params(call)?
            .call()
            .await?;
        let events = response
            .decode_logs_with_type::<BetSettledEvent>()?
            .into_iter()
            .map(|ev| SurfaceEvent::BetSettled {
                guess: ev.guess,
                won: ev.won,
                payout: ev.payout,
            })
            .collect();
        Ok(CallRecord { events })
    }

    async fn set_difficulty(&self, tier: Difficulty) -> Result<CallRecord> {
        let response = self
            .instance
            .methods()
            .set_difficulty(tier_to_abi(tier))
            .call()
            .await?;
        let events = response
            .decode_logs_with_type::<DifficultySetEvent>()?
            .into_iter()
            .map(|ev| SurfaceEvent::DifficultySet {
                tier: tier_from_abi(ev.tier),
            })
            .collect();
        Ok(CallRecord { events })
    }

    async fn reveal_number(&self) -> Result<CallRecord> {
        let response = self.instance.methods().reveal_number().call().await?;
        let events = response
            .decode_logs_with_type::<NumberRevealedEvent>()?
            .into_iter()
            .map(|ev| SurfaceEvent::NumberRevealed { number: ev.number })
            .collect();
        Ok(CallRecord { events })
    }

    async fn current_difficulty(&self) -> Result<Difficulty> {
        let tier = self
            .instance
            .methods()
            .get_difficulty()
            .simulate(Execution::state_read_only())
            .await?
            .value;
        Ok(tier_from_abi(tier))
    }

    async fn balance(&self) -> Result<u64> {
        let raw = self
            .instance
            .account()
            .get_asset_balance(&self.base_asset_id)
            .await?;
        u64::try_from(raw).map_err(|_| eyre!("wallet balance exceeds u64 range"))
    }
}

fn tier_to_abi(tier: Difficulty) -> guessing_types::Difficulty {
    match tier {
        Difficulty::Easy => guessing_types::Difficulty::Easy,
        Difficulty::Medium => guessing_types::Difficulty::Medium,
        Difficulty::Hard => guessing_types::Difficulty::Hard,
    }
}

fn tier_from_abi(tier: guessing_types::Difficulty) -> Difficulty {
    match tier {
        guessing_types::Difficulty::Easy => Difficulty::Easy,
        guessing_types::Difficulty::Medium => Difficulty::Medium,
        guessing_types::Difficulty::Hard => Difficulty::Hard,
    }
}
