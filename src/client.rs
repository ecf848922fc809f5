use crate::{
    deployment,
    errors::{
        ClassifiedFailure,
        classify,
    },
    session::{
        self,
        Session,
    },
    surface::{
        self,
        AssessmentSurface,
        AtmSurface,
        CallRecord,
        GuessingGameSurface,
        SurfaceEvent,
        WagerSurface,
    },
    ui,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use fuels::{
    prelude::ContractId,
    types::Address,
};
use std::{
    path::PathBuf,
    str::FromStr,
    time::Instant,
};
use tracing::{
    debug,
    error,
    info,
};

#[cfg(test)]
mod tests;

pub const DEFAULT_TESTNET_RPC_URL: &str = "https://testnet.fuel.network";
pub const DEFAULT_DEVNET_RPC_URL: &str = "https://devnet.fuel.network";
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://localhost:4000/";

/// Base-asset fixed point: amounts are entered as decimal strings and held on
/// chain as integer units.
pub const DECIMALS: u32 = 9;
const UNIT: u64 = 10u64.pow(DECIMALS);

/// Parses a user-entered decimal amount into base units. Only strictly
/// positive decimals with at most nine fractional digits are accepted.
pub fn parse_units(text: &str) -> Option<u64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let (whole, frac) = match text.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (text, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if !whole.chars().all(|c| c.is_ascii_digit())
        || !frac.chars().all(|c| c.is_ascii_digit())
        || frac.len() > DECIMALS as usize
    {
        return None;
    }
    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut frac_units: u64 = if frac.is_empty() { 0 } else { frac.parse().ok()? };
    frac_units = frac_units.checked_mul(10u64.pow(DECIMALS - frac.len() as u32))?;
    let units = whole.checked_mul(UNIT)?.checked_add(frac_units)?;
    if units == 0 {
        return None;
    }
    Some(units)
}

/// Renders base units back as a decimal string, trimming trailing zeros.
pub fn format_units(units: u64) -> String {
    let whole = units / UNIT;
    let frac = units % UNIT;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:09}");
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Fixed per-tier constants, mirrored from the game contract.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TierSpec {
    pub min_bet: u64,
    pub max_bet: u64,
    pub max_guess_range: u64,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] =
        [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub const fn spec(self) -> TierSpec {
        match self {
            Difficulty::Easy => TierSpec {
                min_bet: UNIT / 2,
                max_bet: 2 * UNIT,
                max_guess_range: 10,
            },
            Difficulty::Medium => TierSpec {
                min_bet: 2 * UNIT,
                max_bet: 5 * UNIT,
                max_guess_range: 50,
            },
            Difficulty::Hard => TierSpec {
                min_bet: 5 * UNIT,
                max_bet: 10 * UNIT,
                max_guess_range: 100,
            },
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum OperationKind {
    Deposit,
    Withdraw,
    Transfer,
    PlaceBet,
    SetDifficulty,
    RevealNumber,
}

/// Terminal result of one orchestrated call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum OperationOutcome {
    /// Confirmed with the expected result event observed.
    Confirmed,
    /// The submission confirmed but the expected event never surfaced; the
    /// operation may still have taken effect on chain.
    SubmittedNoEvent,
    /// Rejected locally, before any network call.
    ValidationFailed(String),
    /// Submission or confirmation failed, with the classified kind.
    Failed(crate::errors::ErrorKind),
}

/// One in-flight state-changing call. Created at submission, discarded once
/// a terminal outcome is recorded.
#[derive(Clone, Debug)]
struct PendingOperation {
    kind: OperationKind,
    submitted_at: Instant,
}

impl PendingOperation {
    fn begin(kind: OperationKind) -> Self {
        debug!(?kind, "submitting operation");
        Self {
            kind,
            submitted_at: Instant::now(),
        }
    }

    fn settled(self, outcome: &OperationOutcome) {
        debug!(
            kind = ?self.kind,
            elapsed_ms = self.submitted_at.elapsed().as_millis() as u64,
            ?outcome,
            "operation settled"
        );
    }
}

/// Derived, never authoritative: rebuilt wholesale after every terminal
/// operation. The contract remains the source of truth for balances.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DisplayState {
    pub balance: Option<u64>,
    pub message: String,
    pub revealed_number: Option<u64>,
    pub error: Option<ClassifiedFailure>,
}

pub struct AtmController<S> {
    surface: S,
    account: String,
    cached_balance: Option<u64>,
    status: String,
    last_error: Option<ClassifiedFailure>,
    display: DisplayState,
}

impl<S: AtmSurface> AtmController<S> {
    pub fn new(surface: S, account: impl Into<String>) -> Self {
        let mut controller = Self {
            surface,
            account: account.into(),
            cached_balance: None,
            status: String::from("Ready"),
            last_error: None,
            display: DisplayState::default(),
        };
        controller.rebuild_display();
        controller
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    pub fn snapshot(&self) -> AppSnapshot {
        AppSnapshot {
            app: AppKind::Atm,
            account: self.account.clone(),
            balance: self.display.balance.map(format_units),
            message: self.display.message.clone(),
            revealed_number: None,
            error: self.display.error.as_ref().map(|e| e.display_text()),
            tier: None,
        }
    }

    pub async fn deposit(&mut self, amount_text: &str) -> OperationOutcome {
        let Some(amount) = parse_units(amount_text) else {
            return self.reject(
                OperationKind::Deposit,
                format!("amount must be a positive decimal, got '{amount_text}'"),
            );
        };
        let pending = PendingOperation::begin(OperationKind::Deposit);
        let result = self.surface.deposit(amount).await;
        self.settle(pending, result).await
    }

    pub async fn withdraw(&mut self, amount_text: &str) -> OperationOutcome {
        let Some(amount) = parse_units(amount_text) else {
            return self.reject(
                OperationKind::Withdraw,
                format!("amount must be a positive decimal, got '{amount_text}'"),
            );
        };
        let pending = PendingOperation::begin(OperationKind::Withdraw);
        let result = self.surface.withdraw(amount).await;
        self.settle(pending, result).await
    }

    pub async fn transfer(
        &mut self,
        recipient_text: &str,
        amount_text: &str,
    ) -> OperationOutcome {
        let Some(amount) = parse_units(amount_text) else {
            return self.reject(
                OperationKind::Transfer,
                format!("amount must be a positive decimal, got '{amount_text}'"),
            );
        };
        let Ok(recipient) = Address::from_str(recipient_text.trim()) else {
            return self.reject(
                OperationKind::Transfer,
                format!("'{recipient_text}' is not a valid recipient address"),
            );
        };
        let pending = PendingOperation::begin(OperationKind::Transfer);
        let result = self.surface.transfer_to(recipient, amount).await;
        self.settle(pending, result).await
    }

    /// Re-reads the authoritative balance and republishes the display state.
    /// Idempotent between state-changing operations.
    pub async fn refresh_balance(&mut self) -> Result<u64> {
        let balance = self.surface.balance().await?;
        self.cached_balance = Some(balance);
        self.rebuild_display();
        Ok(balance)
    }

    fn reject(&mut self, kind: OperationKind, reason: String) -> OperationOutcome {
        info!(?kind, %reason, "rejected before submission");
        self.status = reason.clone();
        self.rebuild_display();
        OperationOutcome::ValidationFailed(reason)
    }

    async fn settle(
        &mut self,
        pending: PendingOperation,
        result: Result<CallRecord>,
    ) -> OperationOutcome {
        let kind = pending.kind;
        let outcome = match result {
            Err(raw) => {
                let failure = classify(&raw);
                error!(kind = ?failure.kind, message = %failure.message, "operation failed");
                self.last_error = Some(failure.clone());
                self.rebuild_display();
                OperationOutcome::Failed(failure.kind)
            }
            Ok(record) => {
                self.last_error = None;
                let outcome = if self.apply_confirmation(kind, &record.events) {
                    OperationOutcome::Confirmed
                } else {
                    self.status =
                        String::from("Submitted; no confirmation event observed");
                    OperationOutcome::SubmittedNoEvent
                };
                if let Err(err) = self.refresh_balance().await {
                    error!(%err, "balance refresh after confirmed operation failed");
                    self.last_error = Some(classify(&err));
                }
                self.rebuild_display();
                outcome
            }
        };
        pending.settled(&outcome);
        outcome
    }

    fn apply_confirmation(&mut self, kind: OperationKind, events: &[SurfaceEvent]) -> bool {
        let message = events.iter().find_map(|event| match (kind, event) {
            (OperationKind::Deposit, SurfaceEvent::Deposited { amount, .. }) => {
                Some(format!("Deposited {}", format_units(*amount)))
            }
            (OperationKind::Withdraw, SurfaceEvent::Withdrawn { amount, .. }) => {
                Some(format!("Withdrew {}", format_units(*amount)))
            }
            (OperationKind::Transfer, SurfaceEvent::Transferred { amount, .. }) => {
                Some(format!("Transferred {}", format_units(*amount)))
            }
            _ => None,
        });
        match message {
            Some(message) => {
                self.status = message;
                true
            }
            None => false,
        }
    }

    fn rebuild_display(&mut self) {
        self.display = DisplayState {
            balance: self.cached_balance,
            message: self.status.clone(),
            revealed_number: None,
            error: self.last_error.clone(),
        };
    }
}

pub struct GameController<S> {
    surface: S,
    account: String,
    active_tier: Difficulty,
    cached_balance: Option<u64>,
    revealed_number: Option<u64>,
    status: String,
    last_error: Option<ClassifiedFailure>,
    display: DisplayState,
}

impl<S: WagerSurface> GameController<S> {
    pub fn new(surface: S, account: impl Into<String>) -> Self {
        let mut controller = Self {
            surface,
            account: account.into(),
            active_tier: Difficulty::Easy,
            cached_balance: None,
            revealed_number: None,
            status: String::from("Ready"),
            last_error: None,
            display: DisplayState::default(),
        };
        controller.rebuild_display();
        controller
    }

    pub fn display(&self) -> &DisplayState {
        &self.display
    }

    pub fn active_tier(&self) -> Difficulty {
        self.active_tier
    }

    pub fn snapshot(&self) -> AppSnapshot {
        AppSnapshot {
            app: AppKind::Game,
            account: self.account.clone(),
            balance: self.display.balance.map(format_units),
            message: self.display.message.clone(),
            revealed_number: self.display.revealed_number,
            error: self.display.error.as_ref().map(|e| e.display_text()),
            tier: Some((self.active_tier, self.active_tier.spec())),
        }
    }

    pub async fn place_bet(&mut self, stake_text: &str, guess: u64) -> OperationOutcome {
        let Some(stake) = parse_units(stake_text) else {
            return self.reject(
                OperationKind::PlaceBet,
                format!("stake must be a positive decimal, got '{stake_text}'"),
            );
        };
        // Bounds come from the tier that is active now, not one the user may
        // be about to request.
        let spec = self.active_tier.spec();
        if stake < spec.min_bet || stake > spec.max_bet {
            return self.reject(
                OperationKind::PlaceBet,
                format!(
                    "stake must be between {} and {} on {} difficulty",
                    format_units(spec.min_bet),
                    format_units(spec.max_bet),
                    self.active_tier.label()
                ),
            );
        }
        // The guess itself is not range-checked here; the contract is the
        // authority on the guess range.
        let pending = PendingOperation::begin(OperationKind::PlaceBet);
        let result = self.surface.place_bet(guess, stake).await;
        self.settle(pending, result).await
    }

    pub async fn set_difficulty(&mut self, tier: Difficulty) -> OperationOutcome {
        let pending = PendingOperation::begin(OperationKind::SetDifficulty);
        let result = self.surface.set_difficulty(tier).await;
        self.settle(pending, result).await
    }

    pub async fn reveal_number(&mut self) -> OperationOutcome {
        let pending = PendingOperation::begin(OperationKind::RevealNumber);
        let result = self.surface.reveal_number().await;
        self.settle(pending, result).await
    }

    /// Re-reads the wallet balance and republishes the display state.
    /// Idempotent between state-changing operations.
    pub async fn refresh_balance(&mut self) -> Result<u64> {
        let balance = self.surface.balance().await?;
        self.cached_balance = Some(balance);
        self.rebuild_display();
        Ok(balance)
    }

    /// Aligns the tier cache with the contract once, after binding. Later
    /// tier changes flow only through confirmed `set_difficulty` calls.
    pub async fn sync_difficulty(&mut self) -> Result<Difficulty> {
        let tier = self.surface.current_difficulty().await?;
        self.active_tier = tier;
        self.rebuild_display();
        Ok(tier)
    }

    fn reject(&mut self, kind: OperationKind, reason: String) -> OperationOutcome {
        info!(?kind, %reason, "rejected before submission");
        self.status = reason.clone();
        self.rebuild_display();
        OperationOutcome::ValidationFailed(reason)
    }

    async fn settle(
        &mut self,
        pending: PendingOperation,
        result: Result<CallRecord>,
    ) -> OperationOutcome {
        let kind = pending.kind;
        let outcome = match result {
            Err(raw) => {
                let failure = classify(&raw);
                error!(kind = ?failure.kind, message = %failure.message, "operation failed");
                self.last_error = Some(failure.clone());
                self.rebuild_display();
                OperationOutcome::Failed(failure.kind)
            }
            Ok(record) => {
                self.last_error = None;
                let outcome = if self.apply_confirmation(kind, &record.events) {
                    OperationOutcome::Confirmed
                } else {
                    self.status =
                        String::from("Submitted; no confirmation event observed");
                    OperationOutcome::SubmittedNoEvent
                };
                // Only a settled bet moves funds; tier and reveal confirmations
                // are applied above without touching the balance.
                if kind == OperationKind::PlaceBet {
                    if let Err(err) = self.refresh_balance().await {
                        error!(%err, "balance refresh after confirmed bet failed");
                        self.last_error = Some(classify(&err));
                    }
                }
                self.rebuild_display();
                outcome
            }
        };
        pending.settled(&outcome);
        outcome
    }

    fn apply_confirmation(&mut self, kind: OperationKind, events: &[SurfaceEvent]) -> bool {
        for event in events {
            match (kind, event) {
                (OperationKind::PlaceBet, SurfaceEvent::BetSettled { won, .. }) => {
                    self.status = if *won {
                        String::from("You won!")
                    } else {
                        String::from("You lost!")
                    };
                    return true;
                }
                (OperationKind::SetDifficulty, SurfaceEvent::DifficultySet { tier }) => {
                    self.active_tier = *tier;
                    self.status = format!("Difficulty set to {}", tier.label());
                    return true;
                }
                (OperationKind::RevealNumber, SurfaceEvent::NumberRevealed { number }) => {
                    self.revealed_number = Some(*number);
                    self.status = format!("The secret number was {number}");
                    return true;
                }
                _ => {}
            }
        }
        false
    }

    fn rebuild_display(&mut self) {
        self.display = DisplayState {
            balance: self.cached_balance,
            message: self.status.clone(),
            revealed_number: self.revealed_number,
            error: self.last_error.clone(),
        };
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AppKind {
    Atm,
    Game,
}

impl AppKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AppKind::Atm => "atm",
            AppKind::Game => "guessing-game",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            AppKind::Atm => "On-chain ATM",
            AppKind::Game => "Guessing Game",
        }
    }

    fn abi_path(self) -> PathBuf {
        match self {
            AppKind::Atm => crate::manifest_path("contracts/assessment-abi.json"),
            AppKind::Game => crate::manifest_path("contracts/guessing-game-abi.json"),
        }
    }
}

#[derive(Clone, Debug)]
pub enum NetworkTarget {
    Testnet { url: String },
    Devnet { url: String },
    LocalNode { url: String },
}

impl NetworkTarget {
    fn unpack(self) -> (deployment::DeploymentEnv, String) {
        match self {
            NetworkTarget::Devnet { url } => (deployment::DeploymentEnv::Dev, url),
            NetworkTarget::Testnet { url } => (deployment::DeploymentEnv::Test, url),
            NetworkTarget::LocalNode { url } => (deployment::DeploymentEnv::Local, url),
        }
    }
}

#[derive(Clone, Debug)]
pub enum WalletConfig {
    ForcKeystore {
        owner: Option<String>,
        dir: PathBuf,
    },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub app: AppKind,
    pub network: NetworkTarget,
    pub wallets: WalletConfig,
    pub contract: Option<ContractId>,
}

/// What the UI renders each frame.
#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub app: AppKind,
    pub account: String,
    pub balance: Option<String>,
    pub message: String,
    pub revealed_number: Option<u64>,
    pub error: Option<String>,
    pub tier: Option<(Difficulty, TierSpec)>,
}

enum AppInstance {
    Atm(AtmController<AssessmentSurface>),
    Game(GameController<GuessingGameSurface>),
}

impl AppInstance {
    fn snapshot(&self) -> AppSnapshot {
        match self {
            AppInstance::Atm(controller) => controller.snapshot(),
            AppInstance::Game(controller) => controller.snapshot(),
        }
    }
}

/// Resolves which deployed contract this session should bind: an explicit
/// override wins, otherwise the latest recorded deployment whose interface
/// hash matches the artifact this client was compiled against.
fn resolve_contract_id(
    app: AppKind,
    env: deployment::DeploymentEnv,
    overridden: Option<ContractId>,
) -> Result<ContractId> {
    if let Some(contract_id) = overridden {
        return Ok(contract_id);
    }
    let store = deployment::DeploymentStore::new(env)?;
    let record = store
        .latest_for(app.as_str())?
        .ok_or_else(|| {
            eyre!(
                "no {} deployment recorded for {env}; pass --contract or record one in {}",
                app.as_str(),
                store.path().display()
            )
        })?;
    let interface_hash = deployment::compute_interface_hash(app.abi_path())?;
    if !record.is_compatible_with_hash(&interface_hash) {
        return Err(eyre!(
            "recorded {} deployment was built against a different interface (recorded {}, local {})",
            app.as_str(),
            record.interface_hash,
            interface_hash
        ));
    }
    ContractId::from_str(record.contract_id.trim_start_matches("fuel")).map_err(|e| {
        eyre!("deployment record contains an invalid contract id: {e:?}")
    })
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let AppConfig {
        app,
        network,
        wallets,
        contract,
    } = config;
    let (env, url) = network.unpack();
    info!(%url, app = app.as_str(), "connecting");

    let provider = session::detect(&url).await;
    let mut session = Session::new(provider);
    if session.provider().is_none() {
        return Err(eyre!(
            "no wallet provider reachable at {url}; a running node is required to use the {}",
            app.title()
        ));
    }

    let WalletConfig::ForcKeystore { owner, dir } = wallets;
    if !session.request_connect(&dir, owner.as_deref())? {
        println!("No account found in {}", dir.display());
        return Ok(());
    }
    let account = session
        .account_name()
        .unwrap_or("account")
        .to_string();

    let contract_id = resolve_contract_id(app, env, contract)?;
    let connected = session
        .connected()
        .ok_or_else(|| eyre!("session lost its connection before binding"))?;

    let mut instance = match app {
        AppKind::Atm => {
            let surface = surface::bind_assessment(connected, contract_id).await?;
            let mut controller = AtmController::new(surface, account);
            controller
                .refresh_balance()
                .await
                .wrap_err("initial balance refresh failed")?;
            AppInstance::Atm(controller)
        }
        AppKind::Game => {
            let surface = surface::bind_guessing_game(connected, contract_id).await?;
            let mut controller = GameController::new(surface, account);
            controller
                .refresh_balance()
                .await
                .wrap_err("initial balance refresh failed")?;
            controller
                .sync_difficulty()
                .await
                .wrap_err("initial difficulty sync failed")?;
            AppInstance::Game(controller)
        }
    };

    let mut ui_state = ui::UiState::new(app);
    let mut input_events = ui::input_event_stream();
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(&mut instance, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;
    res
}

async fn run_loop(
    instance: &mut AppInstance,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    ui::draw(ui_state, &instance.snapshot())?;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => { break; }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                match (&mut *instance, ev) {
                    (_, ui::UserEvent::Quit) => break,
                    (_, ui::UserEvent::Redraw) => {}
                    (AppInstance::Atm(controller), ui::UserEvent::Deposit(amount)) => {
                        let _ = controller.deposit(&amount).await;
                    }
                    (AppInstance::Atm(controller), ui::UserEvent::Withdraw(amount)) => {
                        let _ = controller.withdraw(&amount).await;
                    }
                    (AppInstance::Atm(controller), ui::UserEvent::Transfer { recipient, amount }) => {
                        let _ = controller.transfer(&recipient, &amount).await;
                    }
                    (AppInstance::Game(controller), ui::UserEvent::PlaceBet { stake, guess }) => {
                        let _ = controller.place_bet(&stake, guess).await;
                    }
                    (AppInstance::Game(controller), ui::UserEvent::SetDifficulty(tier)) => {
                        let _ = controller.set_difficulty(tier).await;
                    }
                    (AppInstance::Game(controller), ui::UserEvent::RevealNumber) => {
                        let _ = controller.reveal_number().await;
                    }
                    _ => continue,
                }
                ui::draw(ui_state, &instance.snapshot())?;
            }
        }
    }
    Ok(())
}
