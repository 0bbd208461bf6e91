use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};
use tracing::{error, info, warn};

use typeflow::{
    app::{App, Control},
    app_dirs::AppDirs,
    clock::SystemClock,
    logging,
    runtime::{AppEvent, CrosstermEventSource, FixedTicker, Runner},
    saver::{self, ResultSaver},
    session::Session,
    settings::{Difficulty, FileSettingsStore, SettingsStore, TestMode, TestSettings},
    store::{ResultStore, SqliteResultStore, StoreError, StoreErrorKind},
    text_gen::RandomWords,
};

const TICK_RATE_MS: u64 = 100;
const SAVE_FLUSH_MS: u64 = 2000;

/// typing speed test with live scoring and wpm history
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A terminal typing speed test: timed or word-count runs, live per-character scoring, a wpm-over-time chart, and a local history of results."
)]
pub struct Cli {
    /// test mode; overrides the saved setting
    #[clap(short = 'm', long, value_enum)]
    mode: Option<TestMode>,

    /// seconds (time mode) or words (words mode); overrides the saved setting
    #[clap(short = 'd', long, value_parser = clap::value_parser!(u32).range(1..))]
    duration: Option<u32>,

    /// word list difficulty; overrides the saved setting
    #[clap(long, value_enum)]
    difficulty: Option<Difficulty>,

    /// results database (defaults to the state directory)
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    /// whose results to save and show
    #[clap(short = 'u', long, global = true, default_value = "local")]
    user: String,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum Command {
    /// run a typing test (default)
    Run,
    /// print aggregate statistics
    Stats,
    /// list recent results, most recent first
    History {
        #[clap(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },
}

impl Cli {
    /// Flags win over persisted settings.
    fn merge_settings(&self, saved: TestSettings) -> TestSettings {
        TestSettings {
            mode: self.mode.unwrap_or(saved.mode),
            duration: self.duration.unwrap_or(saved.duration),
            difficulty: self.difficulty.unwrap_or(saved.difficulty),
        }
    }

    fn db_path(&self) -> Result<PathBuf, StoreError> {
        self.db.clone().or_else(AppDirs::db_path).ok_or_else(|| {
            StoreError::new(
                StoreErrorKind::Unavailable,
                "could not resolve a data directory, pass --db",
            )
        })
    }

    fn open_store(&self) -> Result<SqliteResultStore, StoreError> {
        SqliteResultStore::open(self.db_path()?)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if let Some(log_path) = AppDirs::log_path() {
        logging::init(&log_path);
    }

    match cli.command.clone().unwrap_or(Command::Run) {
        Command::Run => run(&cli),
        Command::Stats => print_stats(&cli),
        Command::History { limit } => print_history(&cli, limit),
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let settings_store = FileSettingsStore::new();
    let saved = settings_store.load();
    let settings = cli.merge_settings(saved);
    if settings != saved {
        if let Err(e) = settings_store.save(&settings) {
            warn!(error = %e, "could not save settings");
        }
    }

    let session = Session::new(settings, SystemClock, RandomWords);
    let mut app = App::new(session).with_settings_store(settings_store);
    match cli.open_store() {
        Ok(store) => {
            let (queue, monitor) = saver::spawn(ResultSaver::new(Box::new(store), cli.user.clone()));
            app = app.with_saves(queue, monitor);
        }
        Err(e) => error!(kind = %e.kind(), error = %e, "results will not be saved"),
    }

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = start_tui(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    app.flush_saves(Duration::from_millis(SAVE_FLUSH_MS));
    res
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    info!("terminal session started");

    loop {
        terminal.draw(|f| f.render_widget(&*app, f.area()))?;

        match runner.step() {
            AppEvent::Tick => app.on_tick(),
            AppEvent::Resize => {}
            AppEvent::Key(key) => {
                if app.handle_key(key) == Control::Quit {
                    break;
                }
            }
        }
    }

    Ok(())
}

fn print_stats(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let store = cli.open_store()?;
    let stats = store.aggregate_stats(&cli.user)?;

    println!("tests          {}", stats.total_tests);
    println!("best wpm       {}", stats.best_wpm);
    println!("average wpm    {}", stats.average_wpm);
    println!("average acc    {}%", stats.average_accuracy);
    println!("time typing    {:.1}s", stats.total_time);
    if let Some(last) = stats.last_test_date {
        println!("last test      {}", last.format("%Y-%m-%d %H:%M"));
    }
    Ok(())
}

fn print_history(cli: &Cli, limit: usize) -> Result<(), Box<dyn Error>> {
    let store = cli.open_store()?;
    let results = store.recent_results(&cli.user, limit)?;

    if results.is_empty() {
        println!("no results yet");
        return Ok(());
    }
    for result in results {
        println!(
            "{}  {:>5} {:<4}  {:>3} wpm  {:>3}% acc  {:.1}s",
            result.timestamp.format("%Y-%m-%d %H:%M"),
            result.settings.mode.to_string(),
            result.settings.duration,
            result.stats.wpm,
            result.stats.accuracy,
            result.stats.total_time,
        );
    }
    Ok(())
}
