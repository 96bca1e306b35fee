mod tui_app;

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use tui_app::{
    format_change, format_latency, format_price, format_stars, format_trend, toggled_stars, truncate, AppState,
    ConnectionStatus,
};

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> io::Result<()> {
    let base_url = std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(io::Error::other)?;

    let mut app = AppState::new(base_url);

    // Initial fetch before rendering
    app.refresh(&client).await;

    // Terminal setup
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut table_state = TableState::default();
    table_state.select(None);

    let result = run_loop(&mut terminal, &mut app, &client, &mut table_state).await;

    // Restore terminal regardless of result
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;

    result
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    client: &reqwest::Client,
    table_state: &mut TableState,
) -> io::Result<()> {
    let refresh_interval = Duration::from_secs(2);
    let mut last_tick = std::time::Instant::now();

    loop {
        terminal.draw(|f| render(f, app, table_state))?;

        let timeout = refresh_interval
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Char('Q') => return Ok(()),
                        KeyCode::Char('r') | KeyCode::Char('R') => {
                            app.refresh(client).await;
                            last_tick = std::time::Instant::now();
                        }
                        KeyCode::Tab => {
                            app.filter = app.filter.next();
                            table_state.select(None);
                        }
                        KeyCode::Down | KeyCode::Char('j') => {
                            let max = app.visible_tickers().len().saturating_sub(1);
                            let next = table_state.selected().map_or(0, |i| (i + 1).min(max));
                            table_state.select(Some(next));
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            let prev = table_state.selected().map_or(0, |i| i.saturating_sub(1));
                            table_state.select(Some(prev));
                        }
                        KeyCode::Char(c @ '1'..='3') => {
                            let selected = table_state
                                .selected()
                                .and_then(|i| app.visible_tickers().get(i).copied())
                                .map(|t| (t.list.clone(), t.symbol.clone(), t.star_rating));
                            if let Some((list, symbol, current)) = selected {
                                let pressed = c as u8 - b'0';
                                app.set_stars(client, &list, &symbol, toggled_stars(current, pressed))
                                    .await;
                                app.refresh(client).await;
                                last_tick = std::time::Instant::now();
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        if last_tick.elapsed() >= refresh_interval {
            app.refresh(client).await;
            last_tick = std::time::Instant::now();
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState, table_state: &mut TableState) {
    let area = f.area();

    // Outer vertical split: header | body | footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Min(0),    // body
            Constraint::Length(1), // footer
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    render_tickers_table(f, app, table_state, chunks[1]);
    render_footer(f, chunks[2]);
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    // API server reachability first, then the server's own exchange status.
    let (status_text, status_color) = match &app.status {
        ConnectionStatus::Error(e) => (format!("✗ {}", truncate(e, 40)), Color::Red),
        ConnectionStatus::Connecting => ("◌ connecting".to_string(), Color::Yellow),
        ConnectionStatus::Connected => {
            let color = match app.health.phase.as_str() {
                "connected" => Color::Green,
                "retrying" | "unchecked" => Color::Yellow,
                _ => Color::Red,
            };
            let text = if app.health.summary.is_empty() {
                app.summary.connection.clone()
            } else {
                app.health.summary.clone()
            };
            (format!("● {}", truncate(&text, 48)), color)
        }
    };

    let counts = &app.summary.watchlist;
    let title_spans = vec![
        Span::styled(
            " Crypto Watchlist  ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw("  │  "),
        Span::styled(
            format!(
                "{} tickers (L {} / S {} / LW {} / SW {})",
                counts.total, counts.long, counts.short, counts.long_wait, counts.short_wait
            ),
            Style::default().fg(Color::White),
        ),
        Span::raw("  │  "),
        Span::styled(
            format!(
                "p50 {} p95 {} p99 {} ({} req)",
                format_latency(app.latency.p50_ms),
                format_latency(app.latency.p95_ms),
                format_latency(app.latency.p99_ms),
                app.latency.sample_count.unwrap_or(0)
            ),
            Style::default().fg(Color::DarkGray),
        ),
    ];

    let paragraph = Paragraph::new(Line::from(title_spans))
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::DarkGray)));

    f.render_widget(paragraph, area);
}

fn render_tickers_table(f: &mut Frame, app: &AppState, state: &mut TableState, area: Rect) {
    let header_cells = ["Symbol", "List", "Market", "Price", "24h", "Trend", "Stars", "Comment"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells).height(1);

    let rows: Vec<Row> = app
        .visible_tickers()
        .into_iter()
        .map(|t| {
            let change_color = if t.percent_change_24h > 0.0 {
                Color::Green
            } else if t.percent_change_24h < 0.0 {
                Color::Red
            } else {
                Color::White
            };
            let trend_color = match t.trend.as_ref().map(|tr| tr.direction.as_str()) {
                Some("up") => Color::Green,
                Some("down") => Color::Red,
                Some(_) => Color::Yellow,
                None => Color::DarkGray,
            };
            let symbol_style = if t.is_exchange_listed {
                Style::default().fg(Color::White)
            } else {
                // Manually quoted
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC)
            };

            Row::new(vec![
                Cell::from(t.symbol.clone()).style(symbol_style),
                Cell::from(t.list.clone()).style(Style::default().fg(Color::Cyan)),
                Cell::from(t.market.clone()).style(Style::default().fg(Color::DarkGray)),
                Cell::from(format_price(t.current_price)),
                Cell::from(format_change(t.percent_change_24h)).style(Style::default().fg(change_color)),
                Cell::from(format_trend(t.trend.as_ref())).style(Style::default().fg(trend_color)),
                Cell::from(format_stars(t.star_rating)).style(Style::default().fg(Color::Yellow)),
                Cell::from(truncate(&t.comment, 40)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(14),
            Constraint::Length(10),
            Constraint::Length(7),
            Constraint::Length(14),
            Constraint::Length(8),
            Constraint::Length(7),
            Constraint::Length(5),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(Span::styled(
                format!(" WATCHLIST: {} ", app.filter.label().to_uppercase()),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
    )
    .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));

    f.render_stateful_widget(table, area, state);
}

fn render_footer(f: &mut Frame, area: Rect) {
    let line = Line::from(vec![
        Span::styled(" [q] ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  "),
        Span::styled("[r] ", Style::default().fg(Color::Yellow)),
        Span::raw("refresh  "),
        Span::styled("[tab] ", Style::default().fg(Color::Yellow)),
        Span::raw("next list  "),
        Span::styled("[↑↓ / j k] ", Style::default().fg(Color::Yellow)),
        Span::raw("select  "),
        Span::styled("[1-3] ", Style::default().fg(Color::Yellow)),
        Span::raw("stars  "),
        Span::styled("auto-refresh: 2s", Style::default().fg(Color::DarkGray)),
    ]);
    let paragraph = Paragraph::new(line).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, area);
}
