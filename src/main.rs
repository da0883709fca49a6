use anky::{
    api::{ApiClient, EnvToken, OfflineNotifier, SessionNotifier},
    app::{App, AppSettings, Control},
    app_dirs::AppDirs,
    config::{Config, ConfigStore, FileConfigStore},
    error::Error as AnkyError,
    game::WritingGame,
    history::HistoryLog,
    keylog,
    logging,
    prompts::PromptBook,
    reporter::{ReportSinks, Reporter},
    runtime::{AppEvent, CrosstermEventSource, FixedTicker, Runner},
    store::{SessionArchive, SqliteStore},
    ui::SessionView,
    util::{format_clock, words_per_minute},
};
use chrono::{DateTime, Local, Utc};
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
    path::{Path, PathBuf},
    time::SystemTime,
};
use time_humanize::HumanTime;
use tracing::{info, warn};

/// stream-of-consciousness writing: keep typing or the session ends
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Write without stopping. A few seconds without a keystroke ends the session; keep going past the target and the session becomes an anky."
)]
pub struct Cli {
    #[clap(subcommand)]
    command: Option<Command>,

    /// prompt to write about instead of a random one
    #[clap(short = 'p', long)]
    prompt: Option<String>,

    /// seconds without a keystroke before the session ends
    #[clap(long, value_parser = parse_secs)]
    inactivity_secs: Option<f64>,

    /// seconds of writing needed for an anky
    #[clap(long, value_parser = parse_secs)]
    target_secs: Option<f64>,

    /// keep everything local, never call the backend
    #[clap(long)]
    offline: bool,

    /// continue writing from a stored draft
    #[clap(long, value_name = "DRAFT_ID")]
    resume: Option<String>,

    /// write a keystroke log for every session into this directory
    #[clap(long)]
    keylog_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// list stored drafts
    Drafts {
        /// remove a draft instead of listing
        #[clap(long, value_name = "DRAFT_ID")]
        discard: Option<String>,
    },
    /// show past sessions
    History,
    /// reconstruct a session from its keystroke log
    Replay { file: PathBuf },
    /// use this prompt for the next session
    QueuePrompt { prompt: String },
}

fn parse_secs(raw: &str) -> Result<f64, String> {
    let secs: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(format!("expected a finite number of seconds, got {raw}"));
    }
    Ok(secs)
}

impl Cli {
    /// Command-line flags take precedence over file and environment values
    fn apply(&self, mut config: Config) -> Config {
        if let Some(secs) = self.inactivity_secs {
            config.inactivity_secs = secs;
        }
        if let Some(secs) = self.target_secs {
            config.target_secs = secs;
        }
        if let Some(dir) = &self.keylog_dir {
            config.keylog_dir = Some(dir.clone());
        }
        if self.offline {
            config.api_url = None;
        }
        config
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = logging::init(&AppDirs::log_dir());

    let config = cli.apply(FileConfigStore::new().load().with_env_overrides());

    match &cli.command {
        Some(Command::Drafts { discard }) => return drafts(discard.as_deref()),
        Some(Command::History) => return history(),
        Some(Command::Replay { file }) => return replay(file),
        Some(Command::QueuePrompt { prompt }) => return queue_prompt(prompt),
        None => {}
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let mut app = build_app(&cli, &config)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app);
    app.quit(SystemTime::now());

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn open_archive() -> Result<SessionArchive<SqliteStore>, AnkyError> {
    Ok(SessionArchive::new(SqliteStore::open(&AppDirs::db_path())?))
}

fn notifier(config: &Config) -> Box<dyn SessionNotifier> {
    let Some(url) = &config.api_url else {
        info!("no backend configured, running offline");
        return Box::new(OfflineNotifier);
    };
    match ApiClient::new(
        url,
        config.api_key.clone(),
        &config.environment,
        Box::new(EnvToken),
    ) {
        Ok(client) => Box::new(client),
        Err(e) => {
            warn!(error = %e, "could not build backend client, running offline");
            Box::new(OfflineNotifier)
        }
    }
}

fn build_app(cli: &Cli, config: &Config) -> Result<App, AnkyError> {
    let archive = open_archive()?;
    let prompts = PromptBook::builtin();
    let settings = AppSettings {
        timing: config.timing(),
        owner_id: config.owner_id.clone(),
        record_keylog: config.keylog_dir.is_some(),
    };

    let game = match &cli.resume {
        Some(id) => {
            let draft = archive
                .draft(id)?
                .ok_or_else(|| AnkyError::DraftNotFound(id.clone()))?;
            WritingGame::resume(&draft, settings.timing).with_keylog(settings.record_keylog)
        }
        None => {
            let prompt = prompts.next(cli.prompt.as_deref(), &archive);
            WritingGame::new(prompt, settings.owner_id.clone(), settings.timing)
                .with_keylog(settings.record_keylog)
        }
    };

    let wrote_today = archive
        .wrote_on(Local::now().date_naive())
        .unwrap_or_else(|e| {
            warn!(error = %e, "could not read last writing day");
            false
        });

    // the worker gets its own connection
    let reporter = Reporter::spawn(ReportSinks {
        archive: open_archive()?,
        history: Some(HistoryLog::new(AppDirs::history_path())),
        keylog_dir: config.keylog_dir.clone(),
        notifier: notifier(config),
    });

    Ok(App::new(game, reporter, prompts, settings, wrote_today))
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let ticker = FixedTicker::new(app.settings().timing.poll_interval);
    let mut runner = Runner::new(CrosstermEventSource::new(), ticker);

    loop {
        terminal.draw(|f| f.render_widget(SessionView::new(app, SystemTime::now()), f.area()))?;

        let control = match runner.step() {
            AppEvent::Key(key) => app.on_key(&key, SystemTime::now()),
            AppEvent::Poll => app.on_poll(SystemTime::now()),
            AppEvent::Resize => Control::Continue,
        };
        if control == Control::Quit {
            break;
        }
    }

    Ok(())
}

fn drafts(discard: Option<&str>) -> Result<(), Box<dyn Error>> {
    let archive = open_archive()?;

    if let Some(id) = discard {
        if !archive.discard_draft(id)? {
            return Err(AnkyError::DraftNotFound(id.to_string()).into());
        }
        println!("discarded {id}");
        return Ok(());
    }

    let drafts = archive.drafts()?;
    if drafts.is_empty() {
        println!("no drafts");
        return Ok(());
    }
    let now = Utc::now();
    for draft in drafts {
        let age = draft
            .ended_at()
            .map(|ended| HumanTime::from_seconds(-(now - ended).num_seconds()).to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {:>5}  {:>5} words  {:<16}  {}",
            draft.session_id(),
            format_clock(draft.active_secs()),
            draft.word_count(),
            age,
            draft.prompt()
        );
    }
    Ok(())
}

fn history() -> Result<(), Box<dyn Error>> {
    let records = HistoryLog::new(AppDirs::history_path()).records()?;
    if records.is_empty() {
        println!("no sessions yet");
        return Ok(());
    }
    for record in records {
        println!(
            "{}  {:<5}  {:>5}  {:>5} words  {:>5.1} wpm",
            record.date.format("%Y-%m-%d %H:%M"),
            record.status,
            format_clock(record.duration_secs),
            record.words,
            record.wpm
        );
    }
    Ok(())
}

fn replay(file: &Path) -> Result<(), Box<dyn Error>> {
    let raw = std::fs::read_to_string(file)?;
    let log = keylog::parse(&raw)?;
    let stats = log.stats();
    let secs = log.total_ms() as f64 / 1000.0;
    let started = DateTime::<Utc>::from_timestamp_millis(log.started_at_ms)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "-".to_string());

    println!("session   {}", log.session_id);
    println!("owner     {}", log.owner_id);
    println!("prompt    {}", log.prompt);
    println!("started   {started}");
    println!("duration  {}", format_clock(secs));
    println!("words     {}", log.word_count());
    println!("wpm       {:.1}", words_per_minute(log.word_count(), secs));
    println!("keys      {} ({} backspaces)", stats.count, stats.backspaces);
    println!();
    println!("{}", log.reconstruct());
    Ok(())
}

fn queue_prompt(prompt: &str) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::InvalidValue, "prompt must not be empty")
            .exit();
    }
    open_archive()?.set_upcoming_prompt(prompt)?;
    println!("next prompt: {prompt}");
    Ok(())
}
