use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::Parser;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use cursor_budget_engine::prelude::*;
use cursor_budget_engine::{CostSummary, DailyCostPoint, ModelBreakdown, PeriodCalculator};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    DefaultTerminal, Frame,
};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod widgets;
use widgets::*;

#[derive(Parser, Debug)]
#[clap(author = "Red", version, about)]
struct Args {
    /// Log at debug level unless RUST_LOG is set
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Usage export (CSV) to load and keep reloading
    #[arg(short = 'f', long = "file")]
    file: Option<String>,

    /// Day of the month the billing period starts on
    #[arg(short = 'b', long = "billing-day", value_parser = clap::value_parser!(u32).range(1..=31))]
    billing_day: Option<u32>,

    /// Monthly cost limit in dollars
    #[arg(short = 'l', long = "limit")]
    limit: Option<f64>,

    /// Remove the saved monthly cost limit
    #[arg(long = "clear-limit", conflicts_with = "limit")]
    clear_limit: bool,

    /// Only show this model
    #[arg(long = "model")]
    model: Option<String>,

    /// Only show this kind of usage (e.g. "On-Demand")
    #[arg(long = "kind")]
    kind: Option<String>,

    /// First day shown (YYYY-MM-DD)
    #[arg(long = "from")]
    from: Option<NaiveDate>,

    /// Last day shown (YYYY-MM-DD)
    #[arg(long = "to")]
    to: Option<NaiveDate>,

    /// Settings store location
    #[arg(long = "store")]
    store: Option<String>,

    /// Seconds between background reloads
    #[arg(long = "refresh", default_value_t = 30)]
    refresh_secs: u64,
}

fn setup_logging(verbose: bool) -> Result<PathBuf> {
    let log_dir = dirs::cache_dir()
        .map(|dir| dir.join("cursor-budget"))
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&log_dir)?;

    let log_path = log_dir.join("cursor-budget.log");
    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // The terminal belongs to the dashboard, so logs go to a file.
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
        .init();

    Ok(log_path)
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Steps through `None` followed by each option, wrapping around.
fn cycle_option(current: Option<&str>, options: &[String]) -> Option<String> {
    let next_index = match current {
        None => 0,
        Some(current) => match options.iter().position(|option| option == current) {
            Some(index) => index + 1,
            None => 0,
        },
    };
    options.get(next_index).cloned()
}

pub struct AppState {
    pub monitor: UsageMonitor<JsonFileStore>,
    pub source: Option<PathBuf>,
    pub filters: Filters,
    pub last_update: DateTime<Utc>,
    pub is_loading: bool,
    pub spinner_state: usize,
    pub data_loaded: bool,
    pub error_message: Option<String>,
    pub show_breakdown: bool,
    periods: PeriodCalculator,
}

impl AppState {
    fn new(monitor: UsageMonitor<JsonFileStore>, source: Option<PathBuf>) -> Self {
        Self {
            monitor,
            source,
            filters: Filters::new(),
            last_update: Utc::now(),
            is_loading: false,
            spinner_state: 0,
            data_loaded: false,
            error_message: None,
            show_breakdown: false,
            periods: PeriodCalculator::new(),
        }
    }

    /// Reads the export again, or the saved snapshot when no export was given.
    ///
    /// A failed load keeps whatever was loaded before.
    fn load_data(&mut self) -> Result<()> {
        self.is_loading = true;

        let result = match &self.source {
            Some(path) => self.monitor.load_file(path).map(|_| ()),
            None => {
                if self.monitor.restore() > 0 {
                    Ok(())
                } else {
                    Err(anyhow::anyhow!(
                        "No usage export given and no saved records found"
                    ))
                }
            }
        };

        match &result {
            Ok(_) => {
                self.error_message = None;
                debug!(records = self.monitor.entry_count(), "Reloaded usage data");
            }
            Err(e) => {
                warn!(error = %format!("{:#}", e), "Failed to load usage data");
                self.error_message = Some(format!("{:#}", e));
            }
        }

        self.data_loaded = !self.monitor.is_empty();
        self.is_loading = false;
        self.last_update = Utc::now();

        result
    }

    /// Only an export file changes behind our back; the snapshot does not.
    fn reloads_in_background(&self) -> bool {
        self.source.is_some()
    }

    fn update_spinner(&mut self) {
        self.spinner_state = (self.spinner_state + 1) % 10;
    }

    pub fn get_spinner_char(&self) -> char {
        match self.spinner_state {
            0 => '⠋',
            1 => '⠙',
            2 => '⠹',
            3 => '⠸',
            4 => '⠼',
            5 => '⠴',
            6 => '⠦',
            7 => '⠧',
            8 => '⠇',
            9 => '⠏',
            _ => '⠋',
        }
    }

    pub fn get_metrics(&self) -> BudgetMetrics {
        self.monitor.budget_metrics(Utc::now())
    }

    pub fn get_settings(&self) -> Settings {
        self.monitor.settings()
    }

    pub fn get_billing_period(&self) -> (NaiveDate, NaiveDate) {
        let anchor = self.monitor.settings().billing_period_day();
        let today = Utc::now().date_naive();
        (
            self.periods.billing_period_start(anchor, today),
            self.periods.billing_period_end(anchor, today),
        )
    }

    pub fn get_cost_summary(&self) -> CostSummary {
        self.monitor.cost_summary(&self.filters)
    }

    pub fn get_daily_series(&self) -> Vec<DailyCostPoint> {
        self.monitor.daily_series(&self.filters)
    }

    pub fn get_model_breakdown(&self) -> Vec<ModelBreakdown> {
        self.monitor.model_breakdown(&self.filters)
    }

    fn reset_filters(&mut self) {
        self.filters = self.monitor.default_filters(Utc::now());
    }

    fn cycle_model_filter(&mut self) {
        let models = self.monitor.unique_models();
        let next = cycle_option(self.filters.model(), &models);
        self.filters.set_model(next);
    }

    fn cycle_category_filter(&mut self) {
        let categories = self.monitor.unique_categories();
        let next = cycle_option(self.filters.category(), &categories);
        self.filters.set_category(next);
    }
}

pub struct App {
    state: Arc<Mutex<AppState>>,
    exit: bool,
}

impl App {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            exit: false,
        }
    }

    pub async fn run(&mut self, terminal: &mut DefaultTerminal, refresh: Duration) -> Result<()> {
        let reloads = self
            .state
            .lock()
            .map(|state| state.reloads_in_background())
            .unwrap_or(false);

        if reloads {
            self.spawn_reload(refresh);
        }

        let mut tick_interval = interval(Duration::from_millis(100));

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    if let Ok(mut state) = self.state.lock() {
                        state.update_spinner();
                    }

                    terminal.draw(|frame| self.draw(frame))?;
                }

                _ = async {
                    if event::poll(Duration::from_millis(0)).unwrap_or(false) {
                        if let Ok(event) = event::read() {
                            self.handle_event(event);
                        }
                    }
                } => {}
            }

            if self.exit {
                break;
            }
        }

        Ok(())
    }

    fn spawn_reload(&self, refresh: Duration) {
        let state_clone = Arc::clone(&self.state);

        tokio::spawn(async move {
            let mut interval = interval(refresh);
            // The first tick fires immediately and the initial load already happened.
            interval.tick().await;
            loop {
                interval.tick().await;

                if let Ok(mut state) = state_clone.lock() {
                    let _ = state.load_data();
                }
            }
        });
    }

    fn draw(&self, frame: &mut Frame) {
        let area = frame.area();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(10),
                Constraint::Length(1),
            ])
            .split(area);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
            .split(chunks[2]);

        if let Ok(state) = self.state.lock() {
            HeaderWidget::render(frame, chunks[0], &state);
            ProgressBarsWidget::render(frame, chunks[1], &state);
            StatisticsWidget::render(frame, body[0], &state);
            DailyChartWidget::render(frame, body[1], &state);
            ShortcutsWidget::render(frame, chunks[3], &state);

            if state.show_breakdown {
                PopupWidget::render(frame, area, &state);
            }
        }
    }

    fn handle_event(&mut self, event: Event) {
        if let Event::Key(key_event) = event {
            if key_event.kind == KeyEventKind::Press {
                match key_event.code {
                    KeyCode::Char('q') => self.exit = true,
                    KeyCode::Char('r') => {
                        if let Ok(mut state) = self.state.lock() {
                            let _ = state.load_data();
                        }
                    }
                    KeyCode::Char('m') => {
                        if let Ok(mut state) = self.state.lock() {
                            state.cycle_model_filter();
                        }
                    }
                    KeyCode::Char('k') => {
                        if let Ok(mut state) = self.state.lock() {
                            state.cycle_category_filter();
                        }
                    }
                    KeyCode::Char('c') => {
                        if let Ok(mut state) = self.state.lock() {
                            state.reset_filters();
                        }
                    }
                    KeyCode::Char('d') => {
                        if let Ok(mut state) = self.state.lock() {
                            state.show_breakdown = !state.show_breakdown;
                        }
                    }
                    KeyCode::Esc => {
                        if let Ok(mut state) = self.state.lock() {
                            state.show_breakdown = false;
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

fn initial_filters(args: &Args, defaults: Filters) -> Filters {
    let range = *defaults.date_range();
    defaults
        .with_date_range(DateRange::new(
            args.from.or(range.start()),
            args.to.or(range.end()),
        ))
        .with_model(args.model.clone())
        .with_category(args.kind.clone())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match setup_logging(args.verbose) {
        Ok(log_path) => info!(path = %log_path.display(), "Logging initialized"),
        Err(e) => eprintln!("Warning: Could not set up logging: {}", e),
    }

    let store_path = args
        .store
        .as_deref()
        .map(expand_path)
        .unwrap_or_else(default_store_path);
    let store = JsonFileStore::open(&store_path)
        .with_context(|| format!("Failed to open settings store {}", store_path.display()))?;
    let mut monitor = UsageMonitor::new(store);

    if let Some(day) = args.billing_day {
        monitor.set_billing_period_day(day)?;
    }
    if args.clear_limit {
        monitor.set_monthly_cost_limit(None)?;
    } else if let Some(limit) = args.limit {
        monitor.set_monthly_cost_limit(Some(limit))?;
    }

    let mut state = AppState::new(monitor, args.file.as_deref().map(expand_path));
    if let Err(e) = state.load_data() {
        state.error_message = Some(format!("Initial load failed: {:#}", e));
    }
    state.filters = initial_filters(&args, state.monitor.default_filters(Utc::now()));

    let mut terminal = ratatui::init();
    let mut app = App::new(state);

    let refresh = Duration::from_secs(args.refresh_secs.max(1));
    let result = app.run(&mut terminal, refresh).await;

    ratatui::restore();

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_option_wraps_through_none() {
        let options = vec!["auto".to_string(), "gpt-5".to_string()];
        assert_eq!(cycle_option(None, &options), Some("auto".to_string()));
        assert_eq!(cycle_option(Some("auto"), &options), Some("gpt-5".to_string()));
        assert_eq!(cycle_option(Some("gpt-5"), &options), None);
        assert_eq!(cycle_option(Some("gone"), &options), Some("auto".to_string()));
        assert_eq!(cycle_option(None, &[]), None);
    }

    #[test]
    fn test_initial_filters_override_defaults() {
        let args = Args::parse_from([
            "cursor-budget",
            "--model",
            "auto",
            "--from",
            "2025-12-01",
        ]);
        let defaults = Filters::new().with_date_range(DateRange::between(
            NaiveDate::from_ymd_opt(2025, 12, 15).unwrap(),
            NaiveDate::from_ymd_opt(2025, 12, 20).unwrap(),
        ));

        let filters = initial_filters(&args, defaults);
        assert_eq!(filters.model(), Some("auto"));
        assert_eq!(filters.category(), None);
        assert_eq!(
            *filters.date_range(),
            DateRange::between(
                NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 12, 20).unwrap(),
            )
        );
    }

    #[test]
    fn test_background_reload_only_with_export_file() {
        let store_path = std::env::temp_dir()
            .join("cursor-budget-missing-store")
            .join("store.json");
        let open = || UsageMonitor::new(JsonFileStore::open(&store_path).unwrap());

        let without_file = AppState::new(open(), None);
        assert!(!without_file.reloads_in_background());

        let with_file = AppState::new(open(), Some(PathBuf::from("usage.csv")));
        assert!(with_file.reloads_in_background());
    }

    #[test]
    fn test_billing_day_out_of_range_is_rejected() {
        assert!(Args::try_parse_from(["cursor-budget", "--billing-day", "32"]).is_err());
        assert!(Args::try_parse_from(["cursor-budget", "--billing-day", "0"]).is_err());
        assert!(Args::try_parse_from(["cursor-budget", "--limit", "5", "--clear-limit"]).is_err());
    }
}
