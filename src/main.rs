use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use ratatui::DefaultTerminal;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod columns;
mod controller;
mod debounce;
mod domain;
mod inputter;
mod model;
mod ranking;
mod strategy;
mod table;
mod ui;

use columns::ColumnId;
use controller::Controller;
use domain::{BoardConfig, BoardError};
use model::{Model, Status};
use strategy::EnrichedRow;
use ui::TableUI;

/// Browse a fantasy football draft strategy joined with player statistics.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Player statistics, a JSON array
    #[arg(long, default_value = "data/players.json")]
    players: String,

    /// Strategy picks, a JSON array
    #[arg(long, default_value = "data/strategy.json")]
    strategy: String,

    /// Quiet time before typed search and filter text is applied
    #[arg(long, default_value_t = 500)]
    debounce_ms: u64,

    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    #[arg(long, default_value_t = 30)]
    max_column_width: usize,

    /// Keep the current sorting when filtering by name
    #[arg(long)]
    no_sort_follows_filter: bool,

    #[arg(long, default_value = "draftboard.log")]
    log_file: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Err(e) => {
            error!("Exiting with error: {e:?}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn expand_path(path: &str) -> Result<PathBuf, BoardError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| BoardError::PathExpansion(format!("{path}: {e}")))
}

fn init_logging(log_file: &Path) -> Result<(), BoardError> {
    let file = File::create(log_file)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("draftboard=info"));
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| BoardError::Logging(e.to_string()))
}

fn run(args: &Args) -> Result<(), BoardError> {
    init_logging(&expand_path(&args.log_file)?)?;
    info!("Starting draftboard with {:?}", args);

    let players = strategy::load_players(&expand_path(&args.players)?)?;
    let picks = strategy::load_strategy(&expand_path(&args.strategy)?)?;
    let rows = strategy::join_strategy(&players, &picks);

    let cfg = BoardConfig::default()
        .event_poll_time(args.poll_ms)
        .debounce(Duration::from_millis(args.debounce_ms))
        .max_column_width(args.max_column_width)
        .sort_follows_filter((!args.no_sort_follows_filter).then_some(ColumnId::Name));

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &cfg, rows);
    ratatui::restore();
    info!("Quitting draftboard");
    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    cfg: &BoardConfig,
    rows: Vec<EnrichedRow>,
) -> Result<(), BoardError> {
    let size = terminal.size()?;
    let mut model = Model::init(cfg, rows, size.width.into(), size.height.into());
    let mut ui = TableUI::new();
    let controller = Controller::new(cfg);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message, pending input is applied on timeouts too
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }
    Ok(())
}
