use crate::{
    client::AppSnapshot,
    game::{
        COOL_GLASSES,
        PetMood,
    },
    notify::NotificationKind,
    wallets::WalletDescriptor,
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::event::{
    self,
    Event,
    KeyCode,
    KeyEvent,
    KeyEventKind,
};
use crossterm::terminal::{
    disable_raw_mode,
    enable_raw_mode,
};
use itertools::Itertools;
use ratatui::prelude::*;
use ratatui::widgets::*;
use std::io::stdout;
use tokio::sync::mpsc;
use unicode_width::UnicodeWidthStr;

const MAX_NAME_LEN: usize = 24;

pub type InputEventReceiver = mpsc::UnboundedReceiver<std::io::Result<Event>>;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UserEvent {
    Quit,
    Redraw,
    OpenWalletSelect,
    CancelWalletSelect,
    Connect {
        wallet: WalletDescriptor,
        password: String,
    },
    Disconnect,
    Feed,
    Play,
    Work,
    Sleep,
    MintGlasses,
    CreatePet(String),
    RemovePet,
    Equip(String),
    Unequip(String),
    Reset,
    Sync,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
enum Mode {
    #[default]
    Normal,
    WalletSelect {
        idx: usize,
    },
    Password {
        wallet: WalletDescriptor,
        input: String,
    },
    CreatePet {
        input: String,
    },
    Wardrobe {
        idx: usize,
    },
    ConfirmReset,
    ConfirmRemove,
    ConfirmQuit,
}

#[derive(Default)]
pub struct UiState {
    mode: Mode,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
    wallets: Vec<WalletDescriptor>,
    requires_password: bool,
    connected: bool,
    inventory: Vec<String>,
    equipped: Vec<String>,
}

impl UiState {
    /// Caches what key handling needs from the latest snapshot.
    pub fn observe(&mut self, snap: &AppSnapshot) {
        self.wallets = snap.wallets.clone();
        self.requires_password = snap.requires_password;
        self.connected = snap.wallet.is_some();
        self.inventory = snap.game.inventory.clone();
        self.equipped = snap.game.equipped_items.clone();
    }

    pub fn close_modal(&mut self) {
        self.mode = Mode::Normal;
    }

    pub fn is_modal_open(&self) -> bool {
        self.mode != Mode::Normal
    }
}

pub fn suggest_pet_name() -> String {
    fakeit::animal::pet_name()
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::event::DisableMouseCapture,
        crossterm::terminal::LeaveAlternateScreen
    )?;
    Ok(())
}

/// Reads terminal events on a dedicated thread.
pub fn input_event_stream() -> InputEventReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        loop {
            let read = event::read();
            let failed = read.is_err();
            if tx.send(read).is_err() || failed {
                break;
            }
        }
    });
    rx
}

pub async fn next_raw_event(input_events: &mut InputEventReceiver) -> Result<Event> {
    match input_events.recv().await {
        Some(event) => Ok(event?),
        None => Err(eyre!("terminal input stream closed")),
    }
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    state.observe(snap);
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    match event {
        Event::Key(k) if k.kind == KeyEventKind::Press => interpret_key(state, k),
        Event::Resize(..) => Some(UserEvent::Redraw),
        _ => None,
    }
}

fn interpret_key(state: &mut UiState, k: KeyEvent) -> Option<UserEvent> {
    let confirmed = match state.mode {
        Mode::ConfirmReset => Some(UserEvent::Reset),
        Mode::ConfirmRemove => Some(UserEvent::RemovePet),
        Mode::ConfirmQuit => Some(UserEvent::Quit),
        _ => None,
    };
    if let Some(confirmed) = confirmed {
        return match k.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                state.mode = Mode::Normal;
                Some(confirmed)
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        };
    }
    match &mut state.mode {
        Mode::WalletSelect { idx } => match k.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::CancelWalletSelect)
            }
            KeyCode::Up => {
                *idx = idx.saturating_sub(1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Down => {
                *idx = (*idx + 1).min(state.wallets.len().saturating_sub(1));
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => {
                let wallet = state.wallets.get(*idx).cloned()?;
                if state.requires_password {
                    state.mode = Mode::Password {
                        wallet,
                        input: String::new(),
                    };
                    Some(UserEvent::Redraw)
                } else {
                    state.mode = Mode::Normal;
                    Some(UserEvent::Connect {
                        wallet,
                        password: String::new(),
                    })
                }
            }
            _ => None,
        },
        Mode::Password { wallet, input } => match k.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::CancelWalletSelect)
            }
            KeyCode::Backspace => {
                input.pop();
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c) => {
                input.push(c);
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => {
                let event = UserEvent::Connect {
                    wallet: wallet.clone(),
                    password: std::mem::take(input),
                };
                state.mode = Mode::Normal;
                Some(event)
            }
            _ => None,
        },
        Mode::CreatePet { input } => match k.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Tab => {
                *input = suggest_pet_name();
                Some(UserEvent::Redraw)
            }
            KeyCode::Backspace => {
                input.pop();
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c) if input.chars().count() < MAX_NAME_LEN => {
                input.push(c);
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => {
                let name = std::mem::take(input);
                state.mode = Mode::Normal;
                Some(UserEvent::CreatePet(name))
            }
            _ => None,
        },
        Mode::Wardrobe { idx } => match k.code {
            KeyCode::Esc | KeyCode::Char('e') => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Up => {
                *idx = idx.saturating_sub(1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Down => {
                *idx = (*idx + 1).min(state.inventory.len().saturating_sub(1));
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                let item = state.inventory.get(*idx).cloned()?;
                if state.equipped.contains(&item) {
                    Some(UserEvent::Unequip(item))
                } else {
                    Some(UserEvent::Equip(item))
                }
            }
            _ => None,
        },
        Mode::ConfirmReset | Mode::ConfirmRemove | Mode::ConfirmQuit => None,
        Mode::Normal => match k.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                state.mode = Mode::ConfirmQuit;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('c') if !state.connected => {
                state.mode = Mode::WalletSelect { idx: 0 };
                Some(UserEvent::OpenWalletSelect)
            }
            KeyCode::Char('d') if state.connected => Some(UserEvent::Disconnect),
            KeyCode::Char('f') => Some(UserEvent::Feed),
            KeyCode::Char('p') => Some(UserEvent::Play),
            KeyCode::Char('w') => Some(UserEvent::Work),
            KeyCode::Char('s') => Some(UserEvent::Sleep),
            KeyCode::Char('m') => Some(UserEvent::MintGlasses),
            KeyCode::Char('y') => Some(UserEvent::Sync),
            KeyCode::Char('n') => {
                state.mode = Mode::CreatePet {
                    input: suggest_pet_name(),
                };
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('x') => {
                state.mode = Mode::ConfirmRemove;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('r') => {
                state.mode = Mode::ConfirmReset;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('e') => {
                state.mode = Mode::Wardrobe { idx: 0 };
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
    }
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),  // status
            Constraint::Min(12),    // pet + stats
            Constraint::Length(6),  // toasts
            Constraint::Length(3),  // help
        ])
        .split(f.area());

    draw_top(f, chunks[0], snap);
    draw_pet_area(f, chunks[1], snap);
    draw_toasts(f, chunks[2], snap);
    draw_help(f, chunks[3], snap);
    draw_modals(f, state, snap);
}

fn draw_top(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let wallet = match &snap.wallet {
        Some(badge) => format!("{} ({})", badge.name, badge.address),
        None if snap.connecting => "Connecting...".to_string(),
        None => "Not connected".to_string(),
    };
    let busy = if snap.loading { " ⏳" } else { "" };
    let text = format!(
        "Wallet: {} | Network: {} | Coins: {}{}\n{}",
        wallet, snap.network, snap.game.coins, busy, snap.status
    );
    let status = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Pixel Pet"));
    f.render_widget(status, area);
}

fn draw_pet_area(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let title = match (&snap.game.pet_name, snap.game.has_real_pet) {
        (Some(name), true) => format!("{name} ({})", snap.mood),
        _ => "No pet yet".to_string(),
    };
    let glasses = snap.game.equipped_items.iter().any(|i| i == COOL_GLASSES);
    let mut lines: Vec<Line> = Vec::new();
    if snap.game.has_real_pet {
        lines.extend(pet_art(snap.mood, glasses).into_iter().map(Line::from));
    } else {
        lines.push(Line::from(""));
        lines.push(Line::from("Press n to adopt a pet"));
    }
    let pet = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(pet, halves[0]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(3),
        ])
        .split(halves[1]);
    let stats = &snap.game.stats;
    draw_stat(f, right[0], "Hunger", stats.hunger);
    draw_stat(f, right[1], "Happiness", stats.happy);
    draw_stat(f, right[2], "Energy", stats.energy);

    let items = if snap.game.inventory.is_empty() {
        "empty".to_string()
    } else {
        snap.game
            .inventory
            .iter()
            .map(|item| {
                if snap.game.equipped_items.contains(item) {
                    format!("{item} (equipped)")
                } else {
                    item.clone()
                }
            })
            .join(", ")
    };
    let inventory = Paragraph::new(items)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Inventory"));
    f.render_widget(inventory, right[3]);
}

fn draw_stat(f: &mut Frame, area: Rect, label: &str, value: u32) {
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(label.to_string()))
        .gauge_style(Style::default().fg(stat_color(value)))
        .percent(value.min(100) as u16)
        .label(format!("{value}/100"));
    f.render_widget(gauge, area);
}

fn stat_color(value: u32) -> Color {
    if value > 60 {
        Color::Green
    } else if value > 30 {
        Color::Yellow
    } else {
        Color::Red
    }
}

fn draw_toasts(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut lines: Vec<Line> = Vec::new();
    if snap.toasts.is_empty() {
        lines.push(Line::styled("Nothing new", Style::default().fg(Color::DarkGray)));
    } else {
        for (kind, message) in snap.toasts.iter().rev().take(4) {
            let (prefix, color) = match kind {
                NotificationKind::Loading => ("…", Color::Cyan),
                NotificationKind::Success => ("✔", Color::Green),
                NotificationKind::Error => ("✖", Color::Red),
                NotificationKind::Info => ("•", Color::White),
            };
            lines.push(Line::styled(
                format!("{prefix} {message}"),
                Style::default().fg(color),
            ));
        }
    }
    let toasts =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Messages"));
    f.render_widget(toasts, area);
}

fn draw_help(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let wallet_keys = if snap.wallet.is_some() {
        "d disconnect"
    } else {
        "c connect"
    };
    let help = Paragraph::new(format!(
        "{wallet_keys} | f feed | p play | w work | s sleep | m mint glasses | n new pet | x remove | e wardrobe | y sync | r reset | q quit"
    ))
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn draw_modal(f: &mut Frame, w: u16, h: u16, title: &str, lines: Vec<Line>) {
    let area = centered_rect(w, h, f.area());
    let block = Block::default().borders(Borders::ALL).title(title.to_string());
    f.render_widget(Clear, area);
    f.render_widget(block.clone(), area);
    f.render_widget(Paragraph::new(lines), block.inner(area));
}

fn draw_modals(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    match &state.mode {
        Mode::WalletSelect { idx } => {
            let mut lines = Vec::new();
            if snap.wallets.is_empty() {
                lines.push(Line::from("No wallets found"));
            } else {
                for (i, wallet) in snap.wallets.iter().enumerate() {
                    let cur = if i == *idx { ">" } else { " " };
                    lines.push(Line::from(format!("{cur} {}", wallet.name)));
                }
            }
            lines.push(Line::from(""));
            lines.push(Line::from("Enter=select Esc=cancel ↑/↓ move"));
            draw_modal(f, 50, 40, "Select Wallet", lines);
        }
        Mode::Password { wallet, input } => {
            let masked = "*".repeat(input.chars().count());
            draw_modal(
                f,
                50,
                20,
                "Unlock Wallet",
                vec![
                    Line::from(format!("Password for '{}': {masked}", wallet.name)),
                    Line::from("Enter=unlock Esc=cancel"),
                ],
            );
        }
        Mode::CreatePet { input } => draw_modal(
            f,
            50,
            20,
            "Name Your Pet",
            vec![
                Line::from(format!("Name: {input}_")),
                Line::from("Enter=create Tab=suggest Esc=cancel"),
            ],
        ),
        Mode::Wardrobe { idx } => {
            let mut lines = Vec::new();
            if snap.game.inventory.is_empty() {
                lines.push(Line::from("Nothing to wear yet. Mint glasses with m."));
            } else {
                for (i, item) in snap.game.inventory.iter().enumerate() {
                    let cur = if i == *idx { ">" } else { " " };
                    let on = if snap.game.equipped_items.contains(item) { "x" } else { " " };
                    lines.push(Line::from(format!("{cur} [{on}] {item}")));
                }
            }
            lines.push(Line::from(""));
            lines.push(Line::from("Enter=toggle Esc=close ↑/↓ move"));
            draw_modal(f, 50, 40, "Wardrobe", lines);
        }
        Mode::ConfirmReset => draw_modal(
            f,
            40,
            20,
            "Confirm Reset",
            vec![Line::from("Reset local game data? (Y/N)")],
        ),
        Mode::ConfirmRemove => draw_modal(
            f,
            40,
            20,
            "Confirm Remove",
            vec![Line::from("Remove your pet from the ledger? (Y/N)")],
        ),
        Mode::ConfirmQuit => draw_modal(
            f,
            40,
            20,
            "Confirm Quit",
            vec![Line::from("Quit the game? (Y/N)")],
        ),
        Mode::Normal => {}
    }
}

/// ASCII pet for `mood`, padded to a common width so it centers as a block.
pub fn pet_art(mood: PetMood, glasses: bool) -> Vec<String> {
    let face = match (mood, glasses) {
        (PetMood::Sleeping, _) => "( -.- ) zZ",
        (_, true) => "(⌐■_■)",
        (PetMood::Happy, false) => "( ^.^ )",
        (PetMood::Neutral, false) => "( o.o )",
        (PetMood::Sad, false) => "( T.T )",
    };
    let mouth = match mood {
        PetMood::Happy => " > ‿ <",
        PetMood::Neutral => " >   <",
        PetMood::Sad => " > ︿ <",
        PetMood::Sleeping => " >   <",
    };
    let rows = [" /\\_/\\", face, mouth];
    let width = rows.iter().map(|r| r.width()).max().unwrap_or(0);
    rows.iter()
        .map(|row| format!("{row}{}", " ".repeat(width - row.width())))
        .collect()
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

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1])[1]
}
