#![allow(non_snake_case)]

use super::*;
use crate::{
    errors::ErrorKind,
    surface::{
        AtmSurface,
        CallRecord,
        SurfaceEvent,
        WagerSurface,
    },
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use std::sync::{
    Arc,
    Mutex,
};

#[derive(Clone, Default)]
struct FakeAtm {
    balance: Arc<Mutex<u64>>,
    balance_reads: Arc<Mutex<u32>>,
    submitted: Arc<Mutex<Vec<String>>>,
    fail_next_with: Arc<Mutex<Option<String>>>,
    suppress_events: Arc<Mutex<bool>>,
}

impl FakeAtm {
    fn with_balance(balance: u64) -> Self {
        let fake = Self::default();
        *fake.balance.lock().unwrap() = balance;
        fake
    }

    fn fail_next_with(&self, message: &str) {
        *self.fail_next_with.lock().unwrap() = Some(message.to_string());
    }

    fn suppress_events(&self) {
        *self.suppress_events.lock().unwrap() = true;
    }

    fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }

    fn balance_reads(&self) -> u32 {
        *self.balance_reads.lock().unwrap()
    }

    fn take_failure(&self) -> Option<String> {
        self.fail_next_with.lock().unwrap().take()
    }

    fn record(&self, events: Vec<SurfaceEvent>) -> CallRecord {
        if *self.suppress_events.lock().unwrap() {
            CallRecord::default()
        } else {
            CallRecord { events }
        }
    }
}

impl AtmSurface for FakeAtm {
    async fn deposit(&self, amount: u64) -> Result<CallRecord> {
        self.submitted.lock().unwrap().push(format!("deposit {amount}"));
        if let Some(message) = self.take_failure() {
            return Err(eyre!(message));
        }
        let mut balance = self.balance.lock().unwrap();
        *balance += amount;
        let new_balance = *balance;
        Ok(self.record(vec![SurfaceEvent::Deposited { amount, new_balance }]))
    }

    async fn withdraw(&self, amount: u64) -> Result<CallRecord> {
        self.submitted.lock().unwrap().push(format!("withdraw {amount}"));
        if let Some(message) = self.take_failure() {
            return Err(eyre!(message));
        }
        let mut balance = self.balance.lock().unwrap();
        if amount > *balance {
            return Err(eyre!("transaction reverted: InsufficientBalance"));
        }
        *balance -= amount;
        let new_balance = *balance;
        Ok(self.record(vec![SurfaceEvent::Withdrawn { amount, new_balance }]))
    }

    async fn transfer_to(&self, _recipient: Address, amount: u64) -> Result<CallRecord> {
        self.submitted.lock().unwrap().push(format!("transfer {amount}"));
        if let Some(message) = self.take_failure() {
            return Err(eyre!(message));
        }
        let mut balance = self.balance.lock().unwrap();
        if amount > *balance {
            return Err(eyre!("transaction reverted: InsufficientBalance"));
        }
        *balance -= amount;
        let new_balance = *balance;
        Ok(self.record(vec![SurfaceEvent::Transferred { amount, new_balance }]))
    }

    async fn balance(&self) -> Result<u64> {
        *self.balance_reads.lock().unwrap() += 1;
        Ok(*self.balance.lock().unwrap())
    }
}

#[derive(Clone)]
struct FakeWager {
    balance: Arc<Mutex<u64>>,
    balance_reads: Arc<Mutex<u32>>,
    submitted: Arc<Mutex<Vec<String>>>,
    fail_next_with: Arc<Mutex<Option<String>>>,
    suppress_events: Arc<Mutex<bool>>,
    win_next: Arc<Mutex<bool>>,
    contract_tier: Arc<Mutex<Difficulty>>,
    secret: Arc<Mutex<u64>>,
}

impl Default for FakeWager {
    fn default() -> Self {
        Self {
            balance: Arc::new(Mutex::new(20 * 1_000_000_000)),
            balance_reads: Arc::new(Mutex::new(0)),
            submitted: Arc::new(Mutex::new(Vec::new())),
            fail_next_with: Arc::new(Mutex::new(None)),
            suppress_events: Arc::new(Mutex::new(false)),
            win_next: Arc::new(Mutex::new(false)),
            contract_tier: Arc::new(Mutex::new(Difficulty::Easy)),
            secret: Arc::new(Mutex::new(7)),
        }
    }
}

impl FakeWager {
    fn fail_next_with(&self, message: &str) {
        *self.fail_next_with.lock().unwrap() = Some(message.to_string());
    }

    fn suppress_events(&self) {
        *self.suppress_events.lock().unwrap() = true;
    }

    fn win_next(&self) {
        *self.win_next.lock().unwrap() = true;
    }

    fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }

    fn balance_reads(&self) -> u32 {
        *self.balance_reads.lock().unwrap()
    }

    fn take_failure(&self) -> Option<String> {
        self.fail_next_with.lock().unwrap().take()
    }

    fn record(&self, events: Vec<SurfaceEvent>) -> CallRecord {
        if *self.suppress_events.lock().unwrap() {
            CallRecord::default()
        } else {
            CallRecord { events }
        }
    }
}

impl WagerSurface for FakeWager {
    async fn place_bet(&self, guess: u64, stake: u64) -> Result<CallRecord> {
        self.submitted
            .lock()
            .unwrap()
            .push(format!("place_bet {guess} {stake}"));
        if let Some(message) = self.take_failure() {
            return Err(eyre!(message));
        }
        let won = *self.win_next.lock().unwrap();
        let payout = if won { stake * 2 } else { 0 };
        let mut balance = self.balance.lock().unwrap();
        *balance = *balance - stake + payout;
        Ok(self.record(vec![SurfaceEvent::BetSettled { guess, won, payout }]))
    }

    async fn set_difficulty(&self, tier: Difficulty) -> Result<CallRecord> {
        self.submitted
            .lock()
            .unwrap()
            .push(format!("set_difficulty {}", tier.label()));
        if let Some(message) = self.take_failure() {
            return Err(eyre!(message));
        }
        *self.contract_tier.lock().unwrap() = tier;
        Ok(self.record(vec![SurfaceEvent::DifficultySet { tier }]))
    }

    async fn reveal_number(&self) -> Result<CallRecord> {
        self.submitted.lock().unwrap().push(String::from("reveal"));
        if let Some(message) = self.take_failure() {
            return Err(eyre!(message));
        }
        let number = *self.secret.lock().unwrap();
        Ok(self.record(vec![SurfaceEvent::NumberRevealed { number }]))
    }

    async fn current_difficulty(&self) -> Result<Difficulty> {
        Ok(*self.contract_tier.lock().unwrap())
    }

    async fn balance(&self) -> Result<u64> {
        *self.balance_reads.lock().unwrap() += 1;
        Ok(*self.balance.lock().unwrap())
    }
}

fn atm() -> (AtmController<FakeAtm>, FakeAtm) {
    let fake = FakeAtm::with_balance(10 * 1_000_000_000);
    (AtmController::new(fake.clone(), "alice"), fake)
}

fn game() -> (GameController<FakeWager>, FakeWager) {
    let fake = FakeWager::default();
    (GameController::new(fake.clone(), "alice"), fake)
}

const VALID_RECIPIENT: &str =
    "0x0101010101010101010101010101010101010101010101010101010101010101";

#[tokio::test]
async fn deposit__confirmed_deposit_refreshes_balance_exactly_once() {
    let (mut controller, fake) = atm();

    let outcome = controller.deposit("1.5").await;

    assert_eq!(outcome, OperationOutcome::Confirmed);
    assert_eq!(fake.balance_reads(), 1);
    assert_eq!(controller.display().balance, Some(11_500_000_000));
    assert_eq!(controller.display().message, "Deposited 1.5");
}

#[tokio::test]
async fn deposit__garbage_amount_short_circuits_without_remote_call() {
    let (mut controller, fake) = atm();

    let outcome = controller.deposit("a lot").await;

    assert!(matches!(outcome, OperationOutcome::ValidationFailed(_)));
    assert!(fake.submitted().is_empty());
    assert_eq!(fake.balance_reads(), 0);
}

#[tokio::test]
async fn deposit__zero_amount_is_rejected_locally() {
    let (mut controller, fake) = atm();

    let outcome = controller.deposit("0").await;

    assert!(matches!(outcome, OperationOutcome::ValidationFailed(_)));
    assert!(fake.submitted().is_empty());
}

#[tokio::test]
async fn deposit__missing_event_is_degraded_success() {
    let (mut controller, fake) = atm();
    fake.suppress_events();

    let outcome = controller.deposit("1").await;

    assert_eq!(outcome, OperationOutcome::SubmittedNoEvent);
    // Degraded success still reconciles: the deposit may have landed.
    assert_eq!(fake.balance_reads(), 1);
    assert!(controller.display().error.is_none());
}

#[tokio::test]
async fn withdraw__insufficiency_is_classified_and_skips_refresh() {
    let (mut controller, fake) = atm();

    let outcome = controller.withdraw("999").await;

    assert_eq!(outcome, OperationOutcome::Failed(ErrorKind::InsufficientFunds));
    assert_eq!(fake.balance_reads(), 0);
    let error = controller.display().error.clone().unwrap();
    assert_eq!(error.kind, ErrorKind::InsufficientFunds);
    assert_eq!(controller.display().balance, None);
}

#[tokio::test]
async fn withdraw__failure_does_not_tear_down_the_session() {
    let (mut controller, _fake) = atm();

    let _ = controller.withdraw("999").await;
    let outcome = controller.deposit("1").await;

    assert_eq!(outcome, OperationOutcome::Confirmed);
    assert!(controller.display().error.is_none());
}

#[tokio::test]
async fn transfer__malformed_recipient_short_circuits_without_remote_call() {
    let (mut controller, fake) = atm();

    let outcome = controller.transfer("not-an-address", "1").await;

    assert!(matches!(outcome, OperationOutcome::ValidationFailed(_)));
    assert!(fake.submitted().is_empty());
}

#[tokio::test]
async fn transfer__confirmed_transfer_updates_display_balance() {
    let (mut controller, fake) = atm();

    let outcome = controller.transfer(VALID_RECIPIENT, "2").await;

    assert_eq!(outcome, OperationOutcome::Confirmed);
    assert_eq!(fake.balance_reads(), 1);
    assert_eq!(controller.display().balance, Some(8_000_000_000));
}

#[tokio::test]
async fn refresh_balance__is_idempotent_between_operations() {
    let (mut controller, _fake) = atm();

    let first = controller.refresh_balance().await.unwrap();
    let first_display = controller.display().balance;
    let second = controller.refresh_balance().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first_display, controller.display().balance);
}

#[tokio::test]
async fn unclassified_failure__is_preserved_verbatim_for_display() {
    let (mut controller, fake) = atm();
    fake.fail_next_with("gremlins in the mempool");

    let outcome = controller.deposit("1").await;

    assert_eq!(outcome, OperationOutcome::Failed(ErrorKind::TransactionFailed));
    let error = controller.display().error.clone().unwrap();
    assert!(error.message.contains("gremlins in the mempool"));
}

#[tokio::test]
async fn place_bet__out_of_bounds_stake_short_circuits() {
    let (mut controller, fake) = game();

    // Easy is active: bounds are 0.5 to 2.
    let outcome = controller.place_bet("3", 5).await;

    let OperationOutcome::ValidationFailed(reason) = outcome else {
        panic!("expected a validation failure");
    };
    assert!(reason.contains("0.5"));
    assert!(reason.contains("2"));
    assert!(reason.contains("Easy"));
    assert!(fake.submitted().is_empty());
    assert_eq!(fake.balance_reads(), 0);
}

#[tokio::test]
async fn place_bet__bounds_come_from_active_tier_not_requested_one() {
    let (mut controller, fake) = game();
    fake.suppress_events();

    // The set_difficulty call confirms without its event, so Easy stays
    // active and a Medium-sized stake must still be rejected.
    let _ = controller.set_difficulty(Difficulty::Medium).await;
    let outcome = controller.place_bet("4", 5).await;

    assert!(matches!(outcome, OperationOutcome::ValidationFailed(_)));
}

#[tokio::test]
async fn place_bet__winning_bet_sets_message_and_refreshes() {
    let (mut controller, fake) = game();
    fake.win_next();

    let outcome = controller.place_bet("1.0", 5).await;

    assert_eq!(outcome, OperationOutcome::Confirmed);
    assert_eq!(controller.display().message, "You won!");
    assert_eq!(fake.balance_reads(), 1);
}

#[tokio::test]
async fn place_bet__losing_bet_reports_the_loss() {
    let (mut controller, _fake) = game();

    let outcome = controller.place_bet("1", 3).await;

    assert_eq!(outcome, OperationOutcome::Confirmed);
    assert_eq!(controller.display().message, "You lost!");
}

#[tokio::test]
async fn place_bet__guess_is_not_locally_range_checked() {
    let (mut controller, fake) = game();

    // Easy advertises guesses up to 10; the client still submits 9999.
    let outcome = controller.place_bet("1", 9999).await;

    assert_eq!(outcome, OperationOutcome::Confirmed);
    assert_eq!(fake.submitted().len(), 1);
}

#[tokio::test]
async fn place_bet__missing_event_is_degraded_success() {
    let (mut controller, fake) = game();
    fake.suppress_events();

    let outcome = controller.place_bet("1", 5).await;

    assert_eq!(outcome, OperationOutcome::SubmittedNoEvent);
    assert_eq!(fake.balance_reads(), 1);
}

#[tokio::test]
async fn set_difficulty__failure_keeps_previous_bounds() {
    let (mut controller, fake) = game();
    fake.fail_next_with("node fell over");

    let outcome = controller.set_difficulty(Difficulty::Hard).await;

    assert_eq!(outcome, OperationOutcome::Failed(ErrorKind::TransactionFailed));
    assert_eq!(controller.active_tier(), Difficulty::Easy);
}

#[tokio::test]
async fn set_difficulty__bounds_update_only_after_confirmation() {
    let (mut controller, _fake) = game();
    assert_eq!(controller.active_tier(), Difficulty::Easy);

    let outcome = controller.set_difficulty(Difficulty::Medium).await;

    assert_eq!(outcome, OperationOutcome::Confirmed);
    assert_eq!(controller.active_tier(), Difficulty::Medium);
    // A Medium stake is accepted now that the switch is confirmed.
    let outcome = controller.place_bet("4", 5).await;
    assert_eq!(outcome, OperationOutcome::Confirmed);
}

#[tokio::test]
async fn set_difficulty__does_not_refresh_balance() {
    let (mut controller, fake) = game();

    let _ = controller.set_difficulty(Difficulty::Medium).await;

    assert_eq!(fake.balance_reads(), 0);
}

#[tokio::test]
async fn reveal_number__publishes_revealed_value() {
    let (mut controller, _fake) = game();

    let outcome = controller.reveal_number().await;

    assert_eq!(outcome, OperationOutcome::Confirmed);
    assert_eq!(controller.display().revealed_number, Some(7));
    assert_eq!(controller.display().message, "The secret number was 7");
}

#[tokio::test]
async fn sync_difficulty__aligns_tier_cache_with_contract() {
    let (mut controller, fake) = game();
    *fake.contract_tier.lock().unwrap() = Difficulty::Hard;

    let tier = controller.sync_difficulty().await.unwrap();

    assert_eq!(tier, Difficulty::Hard);
    assert_eq!(controller.active_tier(), Difficulty::Hard);
}

#[test]
fn parse_units__accepts_whole_and_fractional_amounts() {
    assert_eq!(parse_units("1"), Some(1_000_000_000));
    assert_eq!(parse_units("0.5"), Some(500_000_000));
    assert_eq!(parse_units("2.25"), Some(2_250_000_000));
    assert_eq!(parse_units(" 10 "), Some(10_000_000_000));
    assert_eq!(parse_units(".5"), Some(500_000_000));
}

#[test]
fn parse_units__rejects_everything_else() {
    for bad in ["", " ", "abc", "-1", "0", "0.0", "1.2.3", "1,5", "1.0000000001", "."] {
        assert_eq!(parse_units(bad), None, "expected rejection of '{bad}'");
    }
}

#[test]
fn format_units__round_trips_parse_units() {
    for text in ["1", "0.5", "2.25", "10"] {
        let units = parse_units(text).unwrap();
        assert_eq!(format_units(units), text);
    }
}

#[test]
fn tier_specs__match_the_published_table() {
    assert_eq!(
        Difficulty::Easy.spec(),
        TierSpec { min_bet: 500_000_000, max_bet: 2_000_000_000, max_guess_range: 10 }
    );
    assert_eq!(
        Difficulty::Medium.spec(),
        TierSpec { min_bet: 2_000_000_000, max_bet: 5_000_000_000, max_guess_range: 50 }
    );
    assert_eq!(
        Difficulty::Hard.spec(),
        TierSpec { min_bet: 5_000_000_000, max_bet: 10_000_000_000, max_guess_range: 100 }
    );
}
