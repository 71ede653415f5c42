use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use speedsplits::{
    app::App,
    app_dirs::AppDirs,
    clock::{format_duration, SystemClock},
    config::Settings,
    error_log,
    runs,
    runtime::{CrosstermEventSource, Runner},
    split::{self, Run},
    storage::SqliteStore,
    timer::SplitTimer,
};
use std::{
    error::Error,
    fs::OpenOptions,
    io::{self, stdin},
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "speedsplits.log";
const HISTORY_FILE: &str = "history.csv";

/// keyboard-driven speedrun split timer
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A keyboard-driven speedrun split timer. Progress is saved on every change, so a closed terminal or a crash never loses a run."
)]
pub struct Cli {
    /// database file to keep runs and timer progress in
    #[clap(long, value_name = "PATH")]
    db: Option<PathBuf>,

    /// milliseconds between display refreshes (overrides the stored setting)
    #[clap(long, value_name = "MS")]
    tick_rate: Option<u64>,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// manage run definitions
    #[clap(subcommand)]
    Runs(RunsCommand),
    /// dispatch one named action, e.g. `split` or `keyPress KeyS`
    Send {
        action: String,
        code: Option<String>,
    },
    /// print the error log
    Errors {
        /// empty the log after printing it
        #[clap(long)]
        clear: bool,
    },
    /// print the active key bindings
    Keys,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum RunsCommand {
    /// list run definitions, marking the selected one
    List,
    /// add a run and select it
    Add {
        name: String,
        #[clap(required = true)]
        splits: Vec<String>,
    },
    /// select the run the timer uses after the next reset
    Select { index: usize },
    /// remove a run
    Remove { index: usize },
    /// rename a run
    Rename { index: usize, name: String },
    /// edit the splits of a run
    Splits {
        run: usize,
        #[clap(subcommand)]
        command: SplitsCommand,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum SplitsCommand {
    /// add a split, at the end unless a position is given
    Add {
        title: String,
        #[clap(long, value_name = "POSITION")]
        at: Option<usize>,
    },
    /// rename a split
    Rename { split: usize, title: String },
    /// remove a split
    Remove { split: usize },
    /// move a split to another position
    Move { from: usize, to: usize },
}

impl Cli {
    fn db_path(&self) -> Option<PathBuf> {
        self.db.clone().or_else(AppDirs::db_path)
    }
}

fn data_dir(db_path: &Path) -> PathBuf {
    db_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// The TUI owns the terminal, so its logs go to a file next to the database
fn init_file_logging(dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(LOG_FILE))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let Some(db_path) = cli.db_path() else {
        let mut cmd = Cli::command();
        cmd.error(
            ErrorKind::MissingRequiredArgument,
            "could not determine a data directory, pass --db",
        )
        .exit();
    };

    match &cli.command {
        Some(command) => {
            init_stderr_logging();
            let mut store = SqliteStore::open(&db_path)?;
            run_command(command, &mut store)
        }
        None => {
            if !stdin().is_tty() {
                let mut cmd = Cli::command();
                cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
            }
            init_file_logging(&data_dir(&db_path))?;
            start_tui(&cli, &db_path)
        }
    }
}

fn start_tui(cli: &Cli, db_path: &Path) -> Result<(), Box<dyn Error>> {
    let store = SqliteStore::open(db_path)?;
    let tick_rate = cli
        .tick_rate
        .unwrap_or_else(|| Settings::load(&store).tick_rate_ms)
        .max(1);

    let timer = SplitTimer::initialize(store, SystemClock)?;
    let history_path = data_dir(db_path).join(HISTORY_FILE);
    let mut app = App::new(timer, Some(history_path));
    tracing::info!(db = %db_path.display(), tick_rate, "starting timer");

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut runner = Runner::new(
        CrosstermEventSource::new(),
        Duration::from_millis(tick_rate),
    );
    let result = app.run(&mut terminal, &mut runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    Ok(result?)
}

fn run_command(command: &Command, store: &mut SqliteStore) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Runs(RunsCommand::List) => {
            let selected = runs::selected_index(store)?;
            for (index, run) in runs::load_runs(store)?.iter().enumerate() {
                let marker = if index == selected { "*" } else { " " };
                println!("{marker} {index}  {}  [{}]", run.name, split_titles(run));
            }
        }
        Command::Runs(RunsCommand::Add { name, splits }) => {
            let index = runs::add_run(store, Run::new(name.as_str(), splits.as_slice()))?;
            println!("added run {index}: {name}");
        }
        Command::Runs(RunsCommand::Select { index }) => {
            runs::select_run(store, *index)?;
            println!("selected run {index}");
        }
        Command::Runs(RunsCommand::Remove { index }) => {
            let removed = runs::remove_run(store, *index)?;
            println!("removed run {index}: {}", removed.name);
        }
        Command::Runs(RunsCommand::Rename { index, name }) => {
            runs::rename_run(store, *index, name)?;
            println!("renamed run {index}: {name}");
        }
        Command::Runs(RunsCommand::Splits { run, command }) => {
            edit_splits(store, *run, command)?;
            print_run(store, *run)?;
        }
        Command::Send { action, code } => {
            let mut timer = SplitTimer::initialize(store, SystemClock)?;
            let state = timer.dispatch_named(action, code.as_deref())?;
            println!(
                "{}  split {}/{}  {}",
                state.status,
                state.current_split,
                state.splits.len(),
                format_duration(state.current_time_ms)
            );
        }
        Command::Errors { clear } => {
            let entries = error_log::load(store)?;
            if entries.is_empty() {
                println!("no errors");
            }
            for entry in &entries {
                println!("[{}] {}", entry.error_kind, entry.message);
            }
            if *clear {
                error_log::clear(store)?;
            }
        }
        Command::Keys => {
            let settings = Settings::load(store);
            for (bind, action) in settings.key_binds.bindings() {
                println!("{:<14} {:<12} {}", bind.display_name, bind.code, action.name());
            }
        }
    }
    Ok(())
}

fn edit_splits(
    store: &mut SqliteStore,
    run: usize,
    command: &SplitsCommand,
) -> Result<(), Box<dyn Error>> {
    match command {
        SplitsCommand::Add { title, at } => {
            runs::add_split(store, run, title, *at)?;
        }
        SplitsCommand::Rename { split, title } => runs::rename_split(store, run, *split, title)?,
        SplitsCommand::Remove { split } => {
            runs::remove_split(store, run, *split)?;
        }
        SplitsCommand::Move { from, to } => runs::move_split(store, run, *from, *to)?,
    }
    Ok(())
}

fn split_titles(run: &Run) -> String {
    split::in_order(&run.splits)
        .iter()
        .map(|s| s.title.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_run(store: &SqliteStore, index: usize) -> Result<(), Box<dyn Error>> {
    if let Some(run) = runs::load_runs(store)?.get(index) {
        println!("{index}  {}  [{}]", run.name, split_titles(run));
    }
    Ok(())
}
