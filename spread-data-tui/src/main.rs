use chrono::{DateTime, Utc};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, BorderType, Borders, Chart, Dataset, GraphType, Paragraph},
};
use smol_str::SmolStr;
use spread_data::{
    DataError, DerivedPoint, KlineSource, PaginationController, SpreadConfig, SpreadMode, SpreadPair,
    chart::{ChartAdapter, ChartSnapshot},
    config::ClientConfig,
    feed::{ConnectionStatus, FeedMessage, FeedReceivers, MarketFeed},
    gateway::{
        RestClient, auth::AuthGateway, market::MarketGateway, subscription::SubscriptionGateway,
    },
    rolling::BollingerConfig,
    session::Session,
    timeframe::Timeframe,
};
use std::{io, sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::{info, warn};

const DEFAULT_LEFT: &str = "BTC-USDT-SWAP";
const DEFAULT_RIGHT: &str = "ETH-USDT-SWAP";
const DEFAULT_LOG_FILE: &str = "spread-data-tui.log";

/// Bars visible at once.
const VISIBLE_BARS: i64 = 120;

type Controller = PaginationController<MarketGateway>;

/// Horizontal window over the loaded series, anchored on its right edge.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Viewport {
    width_ms: i64,
    right_ms: Option<i64>,
}

impl Viewport {
    fn new(timeframe: &Timeframe, latest: Option<i64>) -> Self {
        Self {
            width_ms: timeframe.interval_ms() * VISIBLE_BARS,
            right_ms: latest,
        }
    }

    fn bounds(&self) -> Option<(i64, i64)> {
        self.right_ms.map(|right| (right - self.width_ms, right))
    }

    /// Move by `steps` quarter-widths, keeping the right edge inside `[earliest, latest]`.
    fn scroll(&mut self, steps: i64, data: Option<(i64, i64)>) {
        let (Some(right), Some((earliest, latest))) = (self.right_ms, data) else {
            return;
        };

        let step = (self.width_ms / 4).max(1);
        self.right_ms = Some((right + steps * step).max(earliest).min(latest));
    }
}

/// Ratatui implementation of the spread chart surface.
#[derive(Debug, Clone, Default)]
struct TerminalChart {
    snapshot: ChartSnapshot,
    message: Option<String>,
}

impl ChartAdapter for TerminalChart {
    fn render(&mut self, snapshot: &ChartSnapshot) {
        self.snapshot = snapshot.clone();
        self.message = None;
    }

    fn clear(&mut self, message: &str) {
        self.snapshot = ChartSnapshot::default();
        self.message = Some(message.to_string());
    }
}

/// Application state
#[derive(Debug, Clone)]
struct AppState {
    pair: SpreadPair,
    mode: SpreadMode,
    show_bands: bool,
    chart: TerminalChart,
    viewport: Viewport,
    /// Bumped on every full reload so late results of a superseded view are dropped
    view: u64,
    loading: bool,
    exhausted: bool,
    notice: Option<String>,
    username: Option<String>,
    feed_status: ConnectionStatus,
    last_price: Option<f64>,
    depth_spread: Option<String>,
    last_update: DateTime<Utc>,
}

impl AppState {
    fn new(pair: SpreadPair, config: &SpreadConfig, username: Option<String>) -> Self {
        Self {
            viewport: Viewport::new(&pair.timeframe, None),
            pair,
            mode: config.mode,
            show_bands: config.bollinger.is_some(),
            chart: TerminalChart::default(),
            view: 0,
            loading: false,
            exhausted: false,
            notice: None,
            username,
            feed_status: ConnectionStatus::Disconnected,
            last_price: None,
            depth_spread: None,
            last_update: Utc::now(),
        }
    }

    fn handle_error(&mut self, error: &DataError) {
        if error.requires_login() {
            self.username = None;
        }
        self.notice = Some(error.user_message());
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging()?;

    let config = ClientConfig::from_env();
    let session = Arc::new(match &config.session_path {
        Some(path) => Session::load(path.clone())?,
        None => Session::default(),
    });
    let client = RestClient::new(&config, Arc::clone(&session))?;

    let username = match authenticate(&AuthGateway::new(client.clone()), &session).await {
        Ok(username) => {
            info!(%username, "authenticated");
            Some(username)
        }
        Err(error) => {
            warn!(%error, "continuing without a session");
            None
        }
    };

    let pair = select_pair(&SubscriptionGateway::new(client.clone()), username.is_some()).await;
    info!(pair = %pair.title(), "selected spread pair");

    let spread_config = SpreadConfig::default();
    let controller = Arc::new(PaginationController::new(
        MarketGateway::new(client),
        spread_config,
    ));
    let state = Arc::new(Mutex::new(AppState::new(pair.clone(), &spread_config, username)));

    // Live price of the left leg
    let feed = MarketFeed::new(config);
    feed.select(Some(pair.left.clone()));
    tokio::spawn(pump_feed(feed.start(), Arc::clone(&state)));

    tokio::spawn(reload(Arc::clone(&controller), Arc::clone(&state)));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, controller, state).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result?;
    Ok(())
}

/// Log to a file, the terminal belongs to the UI.
fn init_logging() -> io::Result<()> {
    let path = env_var("SPREAD_LOG_FILE").unwrap_or_else(|| DEFAULT_LOG_FILE.to_string());
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();

    Ok(())
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// Log in with `SPREAD_USERNAME`/`SPREAD_PASSWORD` if set, otherwise validate the stored session.
async fn authenticate(auth: &AuthGateway, session: &Session) -> Result<String, DataError> {
    match (env_var("SPREAD_USERNAME"), env_var("SPREAD_PASSWORD")) {
        (Some(username), Some(password)) => auth.login(&username, &password).await?,
        _ => auth.validate().await?,
    }

    session.username().ok_or(DataError::NotAuthenticated)
}

/// `SPREAD_LEFT`/`SPREAD_RIGHT` win, then the first two subscribed instruments, then defaults.
async fn select_pair(subscriptions: &SubscriptionGateway, authenticated: bool) -> SpreadPair {
    let timeframe = env_var("SPREAD_TIMEFRAME")
        .map(|label| Timeframe::from(label.as_str()))
        .unwrap_or_default();

    let subscribed = if authenticated {
        match subscriptions.subscribed_catalog().await {
            Ok(catalog) => catalog
                .all()
                .iter()
                .map(|instrument| instrument.id.clone())
                .collect(),
            Err(error) => {
                warn!(%error, "failed to fetch subscribed instruments");
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    let leg = |key: &str, index: usize, default: &str| {
        env_var(key)
            .map(SmolStr::from)
            .or_else(|| subscribed.get(index).cloned())
            .unwrap_or_else(|| SmolStr::new(default))
    };

    SpreadPair::new(
        leg("SPREAD_LEFT", 0, DEFAULT_LEFT),
        leg("SPREAD_RIGHT", 1, DEFAULT_RIGHT),
        timeframe,
    )
}

async fn pump_feed(receivers: FeedReceivers, state: Arc<Mutex<AppState>>) {
    let FeedReceivers {
        mut messages,
        mut status,
    } = receivers;

    loop {
        tokio::select! {
            message = messages.recv() => {
                let Some(message) = message else {
                    break;
                };

                let mut s = state.lock().await;
                match message {
                    FeedMessage::Realtime(tick) => {
                        if tick.price.is_some() {
                            s.last_price = tick.price;
                        }
                    }
                    FeedMessage::Depth(depth) => {
                        s.depth_spread = depth.bid_ask_spread().map(|spread| spread.to_string());
                    }
                }
                s.last_update = Utc::now();
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                state.lock().await.feed_status = current;
            }
        }
    }
}

/// Fetch a fresh window for the current pair and mode.
async fn reload(controller: Arc<Controller>, state: Arc<Mutex<AppState>>) {
    let (view, pair) = {
        let mut s = state.lock().await;
        s.view += 1;
        s.loading = true;
        s.exhausted = false;
        s.notice = None;
        (s.view, s.pair.clone())
    };

    let result = controller.initialize(pair.clone()).await;

    let mut s = state.lock().await;
    if s.view != view {
        return;
    }
    s.loading = false;

    match result {
        Ok(_) => {
            let snapshot = controller.chart_snapshot();
            if snapshot.is_empty() {
                s.chart.clear("No overlapping data for this pair");
            } else {
                s.viewport = Viewport::new(&pair.timeframe, snapshot.x_bounds().map(|(_, last)| last));
                s.chart.render(&snapshot);
            }
        }
        Err(error) => {
            s.handle_error(&error);
            s.chart.clear(&error.user_message());
        }
    }
}

/// Extend the series backwards, keeping the viewport where it is.
async fn load_older<Source>(
    controller: Arc<PaginationController<Source>>,
    state: Arc<Mutex<AppState>>,
) where
    Source: KlineSource,
{
    let view = {
        let mut s = state.lock().await;
        s.loading = true;
        s.view
    };

    let result = controller.load_older().await;

    let mut s = state.lock().await;
    if s.view != view {
        return;
    }
    // A call rejected as busy returns while the accepted load is still running
    s.loading = controller.is_loading();
    s.exhausted = controller.is_exhausted();

    match result {
        Ok(_) => s.chart.render(&controller.chart_snapshot()),
        Err(error) => s.handle_error(&error),
    }
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    controller: Arc<Controller>,
    state: Arc<Mutex<AppState>>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = std::time::Instant::now();

    loop {
        let state_snapshot = {
            let s = state.lock().await;
            s.clone()
        };

        terminal.draw(|f| ui(f, &state_snapshot))?;

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                    KeyCode::Left | KeyCode::Right => {
                        let steps = if key.code == KeyCode::Left { -1 } else { 1 };
                        let min_visible = {
                            let mut s = state.lock().await;
                            let data = s.chart.snapshot.x_bounds();
                            s.viewport.scroll(steps, data);
                            s.viewport.bounds().map(|(start, _)| start)
                        };

                        if let Some(min_visible) = min_visible {
                            if controller.should_load_older(min_visible) {
                                tokio::spawn(load_older(Arc::clone(&controller), Arc::clone(&state)));
                            }
                        }
                    }
                    KeyCode::Char('b') => {
                        let mut s = state.lock().await;
                        s.show_bands = !s.show_bands;
                        let bollinger = s.show_bands.then(BollingerConfig::default);
                        controller.set_config(controller.config().with_bollinger(bollinger));
                        if !controller.is_loading() && !s.chart.snapshot.is_empty() {
                            s.chart.render(&controller.chart_snapshot());
                        }
                    }
                    KeyCode::Char('m') => {
                        let config = controller.config();
                        let mode = config.mode.next();
                        controller.set_config(config.with_mode(mode));
                        state.lock().await.mode = mode;
                        tokio::spawn(reload(Arc::clone(&controller), Arc::clone(&state)));
                    }
                    KeyCode::Char('t') => {
                        {
                            let mut s = state.lock().await;
                            s.pair.timeframe = s.pair.timeframe.next();
                        }
                        tokio::spawn(reload(Arc::clone(&controller), Arc::clone(&state)));
                    }
                    KeyCode::Char('r') => {
                        tokio::spawn(reload(Arc::clone(&controller), Arc::clone(&state)));
                    }
                    KeyCode::Char('e') => {
                        controller.dismiss_error();
                        state.lock().await.notice = None;
                    }
                    _ => {}
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = std::time::Instant::now();
        }
    }
}

fn ui(f: &mut Frame, state: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    render_status_bar(f, chunks[0], state);
    render_chart(f, chunks[1], state);
    render_help_bar(f, chunks[2], state);
}

fn render_status_bar(f: &mut Frame, area: Rect, state: &AppState) {
    let (status_symbol, status_text, status_color) = match state.feed_status {
        ConnectionStatus::Connected => ("●", "CONNECTED", Color::Rgb(0, 255, 127)),
        ConnectionStatus::Reconnecting => ("◌", "RECONNECTING", Color::Rgb(255, 215, 0)),
        ConnectionStatus::Disconnected => ("○", "DISCONNECTED", Color::Rgb(255, 69, 58)),
    };

    let status = Span::styled(
        format!(" {} {} ", status_symbol, status_text),
        Style::default()
            .fg(status_color)
            .add_modifier(Modifier::BOLD),
    );

    let user = Span::styled(
        match &state.username {
            Some(username) => format!(" {} ", username),
            None => " not logged in ".to_string(),
        },
        Style::default().fg(Color::Rgb(128, 128, 128)),
    );

    let price = Span::styled(
        format!(
            " {} {} ",
            state.pair.left,
            state
                .last_price
                .map_or_else(|| "-".to_string(), |price| format!("{price:.4}"))
        ),
        Style::default().fg(Color::Rgb(100, 149, 237)),
    );

    let depth = Span::styled(
        format!(
            " bid/ask {} ",
            state.depth_spread.as_deref().unwrap_or("-")
        ),
        Style::default().fg(Color::Rgb(100, 149, 237)),
    );

    let time = Span::styled(
        format!(" ⏱  {} ", state.last_update.format("%H:%M:%S")),
        Style::default().fg(Color::Rgb(128, 128, 128)),
    );

    let title = Span::styled(
        " ◆ SPREAD TERMINAL ◆ ",
        Style::default()
            .fg(Color::Rgb(255, 215, 0))
            .add_modifier(Modifier::BOLD),
    );

    let status_line = Line::from(vec![status, user, price, depth, time, title]);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(70, 70, 70)));

    f.render_widget(Paragraph::new(status_line).block(block), area);
}

fn render_chart(f: &mut Frame, area: Rect, state: &AppState) {
    let title = Span::styled(
        format!(" {} · {} ", state.pair.title(), state.mode),
        Style::default()
            .fg(Color::Rgb(255, 215, 0))
            .add_modifier(Modifier::BOLD),
    );
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(title);

    let visible = state
        .viewport
        .bounds()
        .map(|(start, end)| (start, end, state.chart.snapshot.between(start, end)))
        .filter(|(_, _, visible)| !visible.is_empty());

    let Some((start, end, visible)) = visible else {
        let message = match (&state.chart.message, state.loading) {
            (Some(message), _) => message.as_str(),
            (None, true) => "Loading...",
            (None, false) => "No data in view",
        };
        f.render_widget(
            Paragraph::new(message)
                .alignment(Alignment::Center)
                .block(block),
            area,
        );
        return;
    };

    let spread = chart_points(&visible.spread);
    let bands = visible.bands.as_ref().map(|bands| {
        [
            ("upper", chart_points(&bands.upper), Color::Rgb(255, 69, 58)),
            ("mean", chart_points(&bands.middle), Color::Rgb(128, 128, 128)),
            ("lower", chart_points(&bands.lower), Color::Rgb(255, 69, 58)),
        ]
    });

    let mut datasets = vec![
        Dataset::default()
            .name("spread")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Rgb(0, 255, 127)))
            .data(&spread),
    ];
    for (name, points, color) in bands.iter().flatten() {
        datasets.push(
            Dataset::default()
                .name(*name)
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(*color))
                .data(points),
        );
    }

    let (y_min, y_max) = padded(visible.y_bounds().unwrap_or((0.0, 1.0)));
    let x_labels = [start, start + (end - start) / 2, end].map(format_time);
    let y_labels = [y_min, (y_min + y_max) / 2.0, y_max].map(|value| format_value(state.mode, value));

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .labels(x_labels)
                .labels_alignment(Alignment::Left)
                .bounds([start as f64, end as f64]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::Gray))
                .labels(y_labels)
                .bounds([y_min, y_max]),
        );

    f.render_widget(chart, area);
}

fn render_help_bar(f: &mut Frame, area: Rect, state: &AppState) {
    let mut spans = vec![Span::styled(
        " [←/→] Scroll  [B] Bands  [M] Mode  [T] Timeframe  [R] Reload  [E] Dismiss  [Q] Quit ",
        Style::default().fg(Color::Rgb(128, 128, 128)),
    )];

    if state.loading {
        spans.push(Span::styled(
            " loading… ",
            Style::default().fg(Color::Rgb(255, 215, 0)),
        ));
    } else if state.exhausted {
        spans.push(Span::styled(
            " start of history ",
            Style::default().fg(Color::Rgb(128, 128, 128)),
        ));
    }

    if let Some(notice) = &state.notice {
        spans.push(Span::styled(
            format!(" {} ", notice),
            Style::default()
                .fg(Color::Rgb(255, 69, 58))
                .add_modifier(Modifier::BOLD),
        ));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(70, 70, 70)));

    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

/// Warm-up gaps are skipped rather than drawn.
fn chart_points(points: &[DerivedPoint]) -> Vec<(f64, f64)> {
    points
        .iter()
        .filter_map(|point| point.y.map(|y| (point.x as f64, y)))
        .collect()
}

/// Widen `(min, max)` by 5% so lines do not sit on the border. A flat range gets a small
/// non-zero height.
fn padded((min, max): (f64, f64)) -> (f64, f64) {
    let pad = ((max - min) * 0.05).max(max.abs().max(min.abs()) * 1e-3).max(1e-9);
    (min - pad, max + pad)
}

fn format_time(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .map(|time| time.format("%m-%d %H:%M").to_string())
        .unwrap_or_default()
}

fn format_value(mode: SpreadMode, value: f64) -> String {
    match mode {
        SpreadMode::Difference => format!("{value:.4}"),
        SpreadMode::LogRatio => format!("{value:.5}"),
        SpreadMode::Relative => format!("{:.3}%", value * 100.0),
    }
}
