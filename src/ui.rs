use crate::client::{
    AppKind,
    AppSnapshot,
    Difficulty,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        self,
        Event,
        KeyCode,
        KeyEventKind,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::io::stdout;
use tokio::sync::mpsc;

pub enum UserEvent {
    Quit,
    Redraw,
    Deposit(String),
    Withdraw(String),
    Transfer { recipient: String, amount: String },
    PlaceBet { stake: String, guess: u64 },
    SetDifficulty(Difficulty),
    RevealNumber,
}

pub struct UiState {
    app: AppKind,
    mode: Mode,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

impl UiState {
    pub fn new(app: AppKind) -> Self {
        UiState {
            app,
            mode: Mode::Normal,
            terminal: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
enum Mode {
    #[default]
    Normal,
    AmountModal(AmountState),
    TransferModal(TransferState),
    BetModal(BetState),
    DifficultyModal(usize),
    QuitModal,
}

#[derive(Clone, Debug)]
struct AmountState {
    action: AmountAction,
    input: String,
}

#[derive(Clone, Copy, Debug)]
enum AmountAction {
    Deposit,
    Withdraw,
}

impl AmountAction {
    fn title(self) -> &'static str {
        match self {
            AmountAction::Deposit => "Deposit",
            AmountAction::Withdraw => "Withdraw",
        }
    }
}

#[derive(Clone, Debug, Default)]
struct TransferState {
    recipient: String,
    amount: String,
    editing_amount: bool,
}

#[derive(Clone, Debug)]
struct BetState {
    stake: String,
    guess: u64,
}

impl Default for BetState {
    fn default() -> Self {
        BetState {
            stake: String::new(),
            guess: 1,
        }
    }
}

pub type InputEventReceiver = mpsc::UnboundedReceiver<Event>;

/// Pumps crossterm events from a dedicated thread so the async loop never
/// blocks on the terminal.
pub fn input_event_stream() -> InputEventReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        loop {
            match event::read() {
                Ok(ev) => {
                    if tx.send(ev).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
    rx
}

pub async fn next_raw_event(rx: &mut InputEventReceiver) -> Result<Event> {
    rx.recv()
        .await
        .ok_or_else(|| eyre!("input event channel closed"))
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen
    )?;
    // Single persistent Terminal to preserve buffers across draws
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::LeaveAlternateScreen
    )?;
    Ok(())
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

fn push_amount_char(input: &mut String, c: char) {
    if c.is_ascii_digit() || (c == '.' && !input.contains('.')) {
        input.push(c);
    }
}

/// Translates one raw terminal event into a user intent, driving the modal
/// state machine along the way. `None` means nothing actionable happened.
pub fn interpret_event(state: &mut UiState, raw: Event) -> Option<UserEvent> {
    let key = match raw {
        Event::Resize(_, _) => return Some(UserEvent::Redraw),
        Event::Key(k) if k.kind == KeyEventKind::Press => k,
        _ => return None,
    };

    match &mut state.mode {
        Mode::AmountModal(amount_state) => match key.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => {
                let input = amount_state.input.clone();
                let action = amount_state.action;
                state.mode = Mode::Normal;
                match action {
                    AmountAction::Deposit => Some(UserEvent::Deposit(input)),
                    AmountAction::Withdraw => Some(UserEvent::Withdraw(input)),
                }
            }
            KeyCode::Backspace => {
                amount_state.input.pop();
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c) => {
                push_amount_char(&mut amount_state.input, c);
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::TransferModal(transfer_state) => match key.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Tab => {
                transfer_state.editing_amount = !transfer_state.editing_amount;
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => {
                let recipient = transfer_state.recipient.clone();
                let amount = transfer_state.amount.clone();
                state.mode = Mode::Normal;
                Some(UserEvent::Transfer { recipient, amount })
            }
            KeyCode::Backspace => {
                if transfer_state.editing_amount {
                    transfer_state.amount.pop();
                } else {
                    transfer_state.recipient.pop();
                }
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c) => {
                if transfer_state.editing_amount {
                    push_amount_char(&mut transfer_state.amount, c);
                } else if c.is_ascii_alphanumeric() {
                    transfer_state.recipient.push(c);
                }
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::BetModal(bet_state) => match key.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => {
                let stake = bet_state.stake.clone();
                let guess = bet_state.guess;
                state.mode = Mode::Normal;
                Some(UserEvent::PlaceBet { stake, guess })
            }
            KeyCode::Up | KeyCode::Char('+') => {
                bet_state.guess = bet_state.guess.saturating_add(1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Down | KeyCode::Char('-') => {
                bet_state.guess = bet_state.guess.saturating_sub(1).max(1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Backspace => {
                bet_state.stake.pop();
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c) => {
                push_amount_char(&mut bet_state.stake, c);
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::DifficultyModal(idx) => match key.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Up => {
                *idx = idx.saturating_sub(1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Down => {
                *idx = (*idx + 1).min(Difficulty::ALL.len() - 1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => {
                let tier = Difficulty::ALL[*idx];
                state.mode = Mode::Normal;
                Some(UserEvent::SetDifficulty(tier))
            }
            _ => None,
        },
        Mode::QuitModal => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::Normal => match (state.app, key.code) {
            (_, KeyCode::Char('q') | KeyCode::Esc) => {
                state.mode = Mode::QuitModal;
                Some(UserEvent::Redraw)
            }
            (AppKind::Atm, KeyCode::Char('d')) => {
                state.mode = Mode::AmountModal(AmountState {
                    action: AmountAction::Deposit,
                    input: String::new(),
                });
                Some(UserEvent::Redraw)
            }
            (AppKind::Atm, KeyCode::Char('w')) => {
                state.mode = Mode::AmountModal(AmountState {
                    action: AmountAction::Withdraw,
                    input: String::new(),
                });
                Some(UserEvent::Redraw)
            }
            (AppKind::Atm, KeyCode::Char('t')) => {
                state.mode = Mode::TransferModal(TransferState::default());
                Some(UserEvent::Redraw)
            }
            (AppKind::Game, KeyCode::Char('b')) => {
                state.mode = Mode::BetModal(BetState::default());
                Some(UserEvent::Redraw)
            }
            (AppKind::Game, KeyCode::Char('f')) => {
                state.mode = Mode::DifficultyModal(0);
                Some(UserEvent::Redraw)
            }
            (AppKind::Game, KeyCode::Char('r')) => Some(UserEvent::RevealNumber),
            _ => None,
        },
    }
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // session
            Constraint::Length(3), // message
            Constraint::Length(4), // errors
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_session(f, chunks[0], snap);
    draw_message(f, chunks[1], snap);
    draw_errors(f, chunks[2], snap);
    draw_help(f, state, chunks[3]);
    draw_modals(f, state, snap);
}

fn draw_session(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let balance = snap
        .balance
        .clone()
        .unwrap_or_else(|| String::from("(unknown)"));
    let mut lines = vec![
        Line::from(format!("Account: {}", snap.account)),
        Line::from(format!("Balance: {balance}")),
    ];
    if let Some((tier, spec)) = &snap.tier {
        lines.push(Line::from(format!(
            "Difficulty: {} | bet {} to {} | guess 1 to {}",
            tier.label(),
            crate::client::format_units(spec.min_bet),
            crate::client::format_units(spec.max_bet),
            spec.max_guess_range
        )));
    }
    if let Some(number) = snap.revealed_number {
        lines.push(Line::from(format!("Revealed number: {number}")));
    }
    let session = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(snap.app.title()));
    f.render_widget(session, area);
}

fn draw_message(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let message = Paragraph::new(snap.message.clone())
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(message, area);
}

fn draw_errors(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let (text, color) = match &snap.error {
        Some(error) => (error.clone(), Color::Red),
        None => (String::from("No errors"), Color::Green),
    };
    let errors = Paragraph::new(text)
        .style(Style::default().fg(color))
        .block(Block::default().borders(Borders::ALL).title("Errors"));
    f.render_widget(errors, area);
}

fn draw_help(f: &mut Frame, state: &UiState, area: Rect) {
    let text = match state.app {
        AppKind::Atm => "d deposit | w withdraw | t transfer | q/Esc quit",
        AppKind::Game => "b place bet | f difficulty | r reveal number | q/Esc quit",
    };
    let help =
        Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn draw_modals(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    match &state.mode {
        Mode::AmountModal(amount_state) => {
            let area = centered_rect(40, 30, f.area());
            let block = Block::default()
                .borders(Borders::ALL)
                .title(amount_state.action.title());
            let p = Paragraph::new(format!(
                "Amount: {}\nEnter=confirm Esc=cancel",
                amount_state.input
            ));
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::TransferModal(transfer_state) => {
            let area = centered_rect(60, 35, f.area());
            let block = Block::default().borders(Borders::ALL).title("Transfer");
            let marker = |active: bool| if active { ">" } else { " " };
            let p = Paragraph::new(format!(
                "{} Recipient: {}\n{} Amount: {}\nTab=switch field Enter=confirm Esc=cancel",
                marker(!transfer_state.editing_amount),
                transfer_state.recipient,
                marker(transfer_state.editing_amount),
                transfer_state.amount
            ));
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::BetModal(bet_state) => {
            let area = centered_rect(50, 35, f.area());
            let block = Block::default().borders(Borders::ALL).title("Place Bet");
            let bounds = snap
                .tier
                .map(|(tier, spec)| {
                    format!(
                        "{} bounds: {} to {}",
                        tier.label(),
                        crate::client::format_units(spec.min_bet),
                        crate::client::format_units(spec.max_bet)
                    )
                })
                .unwrap_or_default();
            let p = Paragraph::new(format!(
                "Stake: {}\nGuess: {} (Up/Down to change)\n{}\nEnter=confirm Esc=cancel",
                bet_state.stake, bet_state.guess, bounds
            ));
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::DifficultyModal(idx) => {
            let area = centered_rect(40, 35, f.area());
            let block = Block::default().borders(Borders::ALL).title("Difficulty");
            let mut lines = Vec::new();
            for (i, tier) in Difficulty::ALL.iter().enumerate() {
                let cur = if i == *idx { ">" } else { " " };
                let spec = tier.spec();
                lines.push(Line::from(format!(
                    "{} {} (bet {} to {})",
                    cur,
                    tier.label(),
                    crate::client::format_units(spec.min_bet),
                    crate::client::format_units(spec.max_bet)
                )));
            }
            lines.push(Line::from("Enter=confirm Esc=cancel"));
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(Paragraph::new(lines), block.inner(area));
        }
        Mode::QuitModal => {
            let area = centered_rect(40, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Confirm Quit");
            let p = Paragraph::new("Quit? (Y/N)");
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::Normal => {}
    }
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let vertical = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    vertical[1]
}
