use std::fs::OpenOptions;
use std::io::{self, Stdout};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};

use polydash::config::DashConfig;
use polydash::models::TradingCredentials;
use polydash::services::notifier::{Toast, ToastLevel};
use polydash::{metrics, view, DashboardSession};

const MIN_REDRAW_INTERVAL: Duration = Duration::from_millis(250);

type Tui = Terminal<CrosstermBackend<Stdout>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = DashConfig::from_env()?;
    init_tracing(config.log_file.as_deref())?;

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        tracing::debug!("rustls crypto provider already installed");
    }

    if let Some(addr) = &config.metrics_addr {
        let addr: SocketAddr = addr.parse()?;
        metrics::init_metrics(addr)?;
    }

    let auto_select = config.select_wallet.clone();
    let session = Arc::new(DashboardSession::start(config).await?);
    let _ = session.check_health().await;

    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, &session, auto_select).await;
    restore_terminal(&mut terminal)?;

    match Arc::try_unwrap(session) {
        Ok(session) => session.shutdown().await,
        Err(_) => tracing::warn!("Session still shared at exit; dropping"),
    }

    result
}

/// Logs go to `DASH_LOG_FILE` when set. Otherwise they are off, since any
/// write to stdout or stderr would corrupt the alternate screen.
fn init_tracing(log_file: Option<&str>) -> anyhow::Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(file_layer)
        .init();
    Ok(())
}

fn setup_terminal() -> anyhow::Result<Tui> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Tui) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// What a key press did to the command line.
#[derive(Debug, PartialEq)]
enum KeyOutcome {
    Edited,
    Submit(String),
    Quit,
    Ignored,
}

fn handle_key(input: &mut String, key: KeyEvent) -> KeyOutcome {
    if key.kind != KeyEventKind::Press {
        return KeyOutcome::Ignored;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => KeyOutcome::Quit,
        KeyCode::Char(c) => {
            input.push(c);
            KeyOutcome::Edited
        }
        KeyCode::Backspace => {
            input.pop();
            KeyOutcome::Edited
        }
        KeyCode::Esc => {
            input.clear();
            KeyOutcome::Edited
        }
        KeyCode::Enter => KeyOutcome::Submit(std::mem::take(input)),
        _ => KeyOutcome::Ignored,
    }
}

/// Event loop: keys edit the command line, state changes redraw at most once
/// per `MIN_REDRAW_INTERVAL`, toasts show under the panels.
async fn run_app(
    terminal: &mut Tui,
    session: &Arc<DashboardSession>,
    auto_select: Option<String>,
) -> anyhow::Result<()> {
    let mut state_rx = session.subscribe();
    let mut toasts = session.subscribe_toasts();
    let mut keys = EventStream::new();
    let mut commands = JoinSet::new();

    if let Some(address) = auto_select {
        let s = session.clone();
        commands.spawn(async move {
            let _ = s.select_wallet(&address).await;
        });
    }

    let mut input = String::new();
    let mut toast: Option<Toast> = None;
    let mut dirty = true;
    let mut redraw = interval(MIN_REDRAW_INTERVAL);
    redraw.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = redraw.tick(), if dirty => {
                // Render from a copy so the state lock is not held during terminal I/O.
                let snapshot = state_rx.borrow_and_update().clone();
                terminal.draw(|f| view::draw(f, &snapshot, &input, toast.as_ref()))?;
                dirty = false;
            }
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                dirty = true;
            }
            received = toasts.recv() => match received {
                Ok(t) => {
                    toast = Some(t);
                    dirty = true;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Toast view lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            event = keys.next() => match event {
                Some(Ok(Event::Key(key))) => match handle_key(&mut input, key) {
                    KeyOutcome::Quit => break,
                    KeyOutcome::Submit(line) => match Command::parse(&line) {
                        Ok(Command::Quit) => break,
                        Ok(Command::Empty) => {}
                        Ok(cmd) => {
                            let s = session.clone();
                            commands.spawn(async move { cmd.run(&s).await });
                        }
                        Err(usage) => {
                            toast = Some(Toast {
                                level: ToastLevel::Error,
                                message: usage.to_string(),
                                raised_at: Utc::now(),
                            });
                            dirty = true;
                        }
                    },
                    KeyOutcome::Edited => dirty = true,
                    KeyOutcome::Ignored => {}
                },
                Some(Ok(Event::Resize(..))) => dirty = true,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::error!(error = %e, "Failed to read terminal event");
                    break;
                }
                None => break,
            },
            Some(done) = commands.join_next(), if !commands.is_empty() => {
                if let Err(e) = done {
                    tracing::error!(error = %e, "Command task failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl-C received");
                break;
            }
        }
    }

    commands.abort_all();
    while commands.join_next().await.is_some() {}
    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Command {
    Add { address: String, label: String },
    Delete { id: String },
    Select { address: String },
    Generate,
    Refresh,
    Connect { private_key: String, proxy_address: String },
    Disconnect,
    Quit,
    Empty,
}

const USAGE: &str = "commands: add <address> <label...> | delete <id> | select <address> | generate | refresh | connect <private-key> <proxy-address> | disconnect | quit";

impl Command {
    fn parse(line: &str) -> Result<Self, &'static str> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(Command::Empty);
        };
        let cmd = match (verb, words.next()) {
            ("add", Some(address)) => {
                let label = words.collect::<Vec<_>>().join(" ");
                Command::Add {
                    address: address.to_string(),
                    label,
                }
            }
            ("delete", Some(id)) => Command::Delete { id: id.to_string() },
            ("select", Some(address)) => Command::Select {
                address: address.to_string(),
            },
            ("connect", Some(private_key)) => Command::Connect {
                private_key: private_key.to_string(),
                proxy_address: words.next().unwrap_or_default().to_string(),
            },
            ("generate", None) => Command::Generate,
            ("refresh", None) => Command::Refresh,
            ("disconnect", None) => Command::Disconnect,
            ("quit" | "exit", None) => Command::Quit,
            _ => return Err(USAGE),
        };
        Ok(cmd)
    }

    /// Failures are already logged and toasted by the session.
    async fn run(self, session: &DashboardSession) {
        match self {
            Command::Add { address, label } => {
                let _ = session.add_wallet(&address, &label).await;
            }
            Command::Delete { id } => {
                let _ = session.delete_wallet(&id).await;
            }
            Command::Select { address } => {
                let _ = session.select_wallet(&address).await;
            }
            Command::Generate => {
                let _ = session.generate_signal().await;
            }
            Command::Refresh => session.refresh_all().await,
            Command::Connect {
                private_key,
                proxy_address,
            } => {
                let credentials = TradingCredentials::new(private_key, proxy_address);
                let _ = session.connect_trading(credentials).await;
            }
            Command::Disconnect => session.disconnect_trading(),
            Command::Quit | Command::Empty => {}
        }
    }
}
