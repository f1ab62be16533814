//! Terminal rendering of the dashboard with ratatui widgets.
//!
//! [`draw`] lays out one bordered panel per state slice. The `*_line`
//! helpers are plain formatters shared by the panels.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Bar, BarChart, BarGroup, Block, Borders, Paragraph, Wrap},
    Frame,
};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::analytics::{self, ChartBucket, PerformanceMetrics, MAX_BUCKETS};
use crate::models::{ActivityEvent, Order, Position, PriceSnapshot, Side, Signal, Wallet};
use crate::services::notifier::{Toast, ToastLevel};
use crate::state::{ConnectionStatus, DashboardState, DetailPanel, SignalWindow, TradingState, WalletView};

const ACTIVITY_ROWS: usize = 10;
const BAR_LABEL_WIDTH: usize = 24;
/// Bars are scaled in cents; anything larger is drawn at this length.
const BAR_VALUE_CAP: u64 = u32::MAX as u64;

/// Draw the whole dashboard: header, panels, and the command line.
pub fn draw(frame: &mut Frame, state: &DashboardState, input: &str, toast: Option<&Toast>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Panels
            Constraint::Length(4), // Toast + command line
        ])
        .split(frame.area());

    draw_header(frame, state, chunks[0]);
    draw_main(frame, state, chunks[1]);
    draw_footer(frame, input, toast, chunks[2]);
}

fn draw_header(frame: &mut Frame, state: &DashboardState, area: Rect) {
    let color = match state.connection {
        ConnectionStatus::Connected => Color::Green,
        ConnectionStatus::Connecting | ConnectionStatus::Disconnected => Color::Yellow,
        ConnectionStatus::Closed => Color::Red,
    };

    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            format!(" [{}] ", connection_label(state.connection)),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::raw(render_ticker(state.price.as_ref())),
    ]))
    .block(Block::default().borders(Borders::ALL).title(" polydash "));

    frame.render_widget(header, area);
}

fn draw_main(frame: &mut Frame, state: &DashboardState, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(columns[0]);
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(12)])
        .split(columns[1]);

    draw_signals(frame, &state.signals, left[0]);
    draw_wallets(frame, &state.wallets, state.detail.address(), left[1]);
    draw_detail(frame, &state.detail, right[0]);
    draw_trading(frame, &state.trading, right[1]);
}

fn draw_footer(frame: &mut Frame, input: &str, toast: Option<&Toast>, area: Rect) {
    let toast_line = match toast {
        Some(toast) => Line::styled(render_toast(toast), toast_style(toast.level)),
        None => Line::raw(""),
    };
    let prompt = Line::raw(format!("> {input}"));

    let footer = Paragraph::new(vec![toast_line, prompt])
        .block(Block::default().borders(Borders::ALL).title(" Command "));
    frame.render_widget(footer, area);

    // Border, then "> ", then the typed text.
    let x = area.x + 3 + input.chars().count() as u16;
    frame.set_cursor_position((x.min(area.right().saturating_sub(2)), area.y + 2));
}

fn draw_signals(frame: &mut Frame, signals: &SignalWindow, area: Rect) {
    let lines: Vec<Line> = if signals.is_empty() {
        vec![Line::raw("no signals yet")]
    } else {
        signals
            .iter()
            .map(|s| Line::styled(signal_line(s), Style::default().fg(side_color(s.kind))))
            .collect()
    };

    let panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" Signals ({}/{}) ", signals.len(), signals.capacity())),
    );
    frame.render_widget(panel, area);
}

fn draw_wallets(frame: &mut Frame, wallets: &[Wallet], selected: Option<&str>, area: Rect) {
    let lines: Vec<Line> = if wallets.is_empty() {
        vec![Line::raw("none tracked")]
    } else {
        wallets
            .iter()
            .map(|w| {
                let is_selected = selected == Some(w.address.as_str());
                let style = if is_selected {
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };
                Line::styled(wallet_line(w, is_selected), style)
            })
            .collect()
    };

    let panel = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" Wallets ({}) ", wallets.len())),
    );
    frame.render_widget(panel, area);
}

fn draw_detail(frame: &mut Frame, panel: &DetailPanel, area: Rect) {
    let title = match panel.address() {
        Some(address) => format!(" Detail {address} "),
        None => " Detail ".to_string(),
    };
    let block = Block::default().borders(Borders::ALL).title(title);

    let message = match panel {
        DetailPanel::Empty => Line::raw("select a wallet"),
        DetailPanel::Loading { .. } => Line::styled("loading...", Style::default().fg(Color::Yellow)),
        DetailPanel::Failed { error, .. } => {
            Line::styled(format!("unavailable: {error}"), Style::default().fg(Color::Red))
        }
        DetailPanel::Ready(view) => {
            let inner = block.inner(area);
            frame.render_widget(block, area);
            draw_wallet_view(frame, view, inner);
            return;
        }
    };
    frame.render_widget(Paragraph::new(message).wrap(Wrap { trim: true }).block(block), area);
}

fn draw_wallet_view(frame: &mut Frame, view: &WalletView, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),                       // Totals + metrics
            Constraint::Length(MAX_BUCKETS as u16 + 2), // Charts
            Constraint::Min(0),                          // Activity
        ])
        .split(area);

    let detail = &view.detail;
    let summary = Paragraph::new(vec![
        Line::raw(format!(
            "value {}  pnl {}  unrealized {}  realized {}  positions {}",
            usd(detail.total_value),
            signed_usd(detail.total_pnl),
            signed_usd(detail.unrealized_pnl),
            signed_usd(detail.realized_pnl),
            detail.position_count()
        )),
        Line::raw(metrics_line(&analytics::wallet_performance(detail))),
    ]);
    frame.render_widget(summary, rows[0]);

    let charts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(rows[1]);
    draw_chart(
        frame,
        " Top positions ",
        &analytics::value_distribution(detail.all_positions(), MAX_BUCKETS),
        false,
        charts[0],
    );
    draw_chart(
        frame,
        " P&L by position ",
        &analytics::pnl_series(detail.all_positions(), MAX_BUCKETS),
        true,
        charts[1],
    );
    draw_chart(
        frame,
        " Buying vs selling ",
        &analytics::buy_sell_comparison(detail),
        false,
        charts[2],
    );

    let activity: Vec<Line> = view
        .activity
        .iter()
        .take(ACTIVITY_ROWS)
        .map(|a| Line::raw(activity_line(a)))
        .collect();
    let panel = Paragraph::new(activity).block(
        Block::default()
            .borders(Borders::TOP)
            .title(format!(" Activity ({}) ", view.activity.len())),
    );
    frame.render_widget(panel, rows[2]);
}

/// Horizontal bar chart of `buckets`. Signed series color bars by sign.
fn draw_chart(frame: &mut Frame, title: &'static str, buckets: &[ChartBucket], signed: bool, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(title);
    if buckets.is_empty() {
        frame.render_widget(Paragraph::new("(no positions)").block(block), area);
        return;
    }

    let bars: Vec<Bar> = buckets.iter().map(|b| bucket_bar(b, signed)).collect();
    let chart = BarChart::default()
        .block(block)
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
        .data(BarGroup::default().bars(&bars));
    frame.render_widget(chart, area);
}

fn bucket_bar(bucket: &ChartBucket, signed: bool) -> Bar<'static> {
    let (text, color) = if signed {
        let color = if is_negative(bucket.value) { Color::Red } else { Color::Green };
        (signed_usd(bucket.value), color)
    } else {
        (usd(bucket.value), Color::Cyan)
    };
    Bar::default()
        .label(Line::raw(truncate(&bucket.name, BAR_LABEL_WIDTH)))
        .value(bar_value(bucket.value))
        .text_value(text)
        .style(Style::default().fg(color))
}

/// Bar length in cents of magnitude, capped.
fn bar_value(value: Decimal) -> u64 {
    value
        .abs()
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|cents| cents.trunc().to_u64())
        .map_or(BAR_VALUE_CAP, |cents| cents.min(BAR_VALUE_CAP))
}

fn draw_trading(frame: &mut Frame, trading: &TradingState, area: Rect) {
    if !trading.status.connected {
        let panel = Paragraph::new("not connected")
            .block(Block::default().borders(Borders::ALL).title(" Trading "));
        frame.render_widget(panel, area);
        return;
    }

    let positions: Vec<Position> = trading.positions.iter().map(|p| p.for_display()).collect();
    let mut lines = vec![Line::raw(metrics_line(&analytics::account_performance(&positions)))];

    lines.push(section(format!("Positions ({})", positions.len())));
    lines.extend(positions.iter().map(|p| Line::raw(position_line(p))));

    lines.push(section(format!("Open orders ({})", trading.orders.len())));
    lines.extend(trading.orders.iter().map(|o| {
        Line::styled(order_line(o), Style::default().fg(side_color(o.side)))
    }));

    lines.push(section(format!("History ({})", trading.history.len())));
    lines.extend(
        trading
            .history
            .iter()
            .take(ACTIVITY_ROWS)
            .map(|a| Line::raw(activity_line(a))),
    );

    let mut title = format!(
        " Trading {} ",
        trading.status.address.as_deref().unwrap_or("(unknown address)")
    );
    if let Some(at) = trading.last_refreshed {
        title.push_str(&format!("refreshed {} ", at.format("%H:%M:%S")));
    }

    let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(panel, area);
}

fn section(text: String) -> Line<'static> {
    Line::styled(text, Style::default().add_modifier(Modifier::BOLD))
}

// ---------------------------------------------------------------------------
// Line formatters
// ---------------------------------------------------------------------------

pub fn connection_label(connection: ConnectionStatus) -> &'static str {
    match connection {
        ConnectionStatus::Connecting => "connecting",
        ConnectionStatus::Connected => "live",
        ConnectionStatus::Disconnected => "reconnecting",
        ConnectionStatus::Closed => "closed",
    }
}

pub fn render_ticker(price: Option<&PriceSnapshot>) -> String {
    match price {
        Some(p) => format!(
            "BTC {:.2} | Market {:.4} | Delta {:.2}",
            p.reference_price, p.market_price, p.delta
        ),
        None => "BTC -- | Market -- | Delta --".to_string(),
    }
}

pub fn signal_line(s: &Signal) -> String {
    format!(
        "{} {:<4} {:>3}%  {}  {}",
        s.created_at.format("%H:%M:%S"),
        s.kind,
        s.confidence_pct(),
        s.reason,
        s.id
    )
}

pub fn wallet_line(w: &Wallet, selected: bool) -> String {
    let marker = if selected { '>' } else { ' ' };
    format!("{marker} {}  {}  [{}]", w.label, w.address, w.id)
}

pub fn metrics_line(m: &PerformanceMetrics) -> String {
    format!(
        "win rate {:.1}% ({}/{})  avg return {:.2}%  best {}  worst {}",
        m.win_rate,
        m.win_count,
        m.position_count,
        m.avg_return,
        signed_usd(m.best_trade),
        signed_usd(m.worst_trade)
    )
}

pub fn activity_line(a: &ActivityEvent) -> String {
    let when = a
        .timestamp
        .map(|t| t.format("%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "--".to_string());
    format!(
        "{when}  {:<4} {} @ {:.4}  {}{}",
        a.action,
        a.shares.round_dp(2),
        a.price,
        a.market,
        a.outcome.as_deref().map(|o| format!(" ({o})")).unwrap_or_default()
    )
}

pub fn position_line(p: &Position) -> String {
    format!(
        "{} {}  {} @ {:.4}  value {}  pnl {}",
        p.market,
        p.outcome,
        p.size.round_dp(2),
        p.avg_price,
        usd(p.current_value),
        signed_usd(p.unrealized_pnl)
    )
}

pub fn order_line(o: &Order) -> String {
    format!(
        "{:<4} {} @ {:.4}  remaining {}  {}",
        o.side,
        o.original_size.round_dp(2),
        o.price,
        o.remaining().round_dp(2),
        o.status.as_deref().unwrap_or("")
    )
}

pub fn render_toast(toast: &Toast) -> String {
    format!("[{}] {}", toast.level, toast.message)
}

fn toast_style(level: ToastLevel) -> Style {
    match level {
        ToastLevel::Info => Style::default().fg(Color::Cyan),
        ToastLevel::Success => Style::default().fg(Color::Green),
        ToastLevel::Error => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    }
}

fn side_color(side: Side) -> Color {
    match side {
        Side::Buy => Color::Green,
        Side::Sell => Color::Red,
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('~');
    out
}

fn is_negative(value: Decimal) -> bool {
    value.is_sign_negative() && !value.is_zero()
}

fn usd(value: Decimal) -> String {
    format!("${:.2}", value)
}

fn signed_usd(value: Decimal) -> String {
    if is_negative(value) {
        format!("-${:.2}", value.abs())
    } else {
        format!("+${:.2}", value)
    }
}
