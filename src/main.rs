mod admin;
mod app;
mod backend;
mod browse;
mod catalog;
mod config;
mod constants;
mod display;
mod graphics;
mod input;
mod model;
mod pager;
mod realtime;
mod requests;
mod share;
mod suggest;
mod supabase;
mod theme;
mod ui;
mod youtube;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use ratatui::{
  DefaultTerminal,
  crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
  },
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use app::App;
use config::{Config, Overrides, Settings};
use display::CliDisplayMode;
use pager::AdvanceTrigger;
use supabase::SupabaseClient;

// --- CLI ---

#[derive(Parser, Debug)]
#[command(author, version = env!("CARGO_PKG_VERSION"), about, long_about = None)]
struct Args {
  /// Supabase project URL
  #[arg(long, env = "EDITVAULTS_URL")]
  url: Option<String>,

  /// Supabase anon (public) key
  #[arg(long, env = "EDITVAULTS_ANON_KEY", hide_env_values = true)]
  anon_key: Option<String>,

  /// Thumbnail preview: 'auto', 'direct', 'ascii', or 'off' (default: auto-detect)
  #[arg(short, long, default_value = "auto")]
  display_mode: CliDisplayMode,

  /// Rows revealed per page
  #[arg(long)]
  page_size: Option<usize>,

  /// What reveals the next page
  #[arg(long)]
  advance: Option<AdvanceTrigger>,

  #[command(subcommand)]
  command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print shell completions to stdout
  Completions { shell: clap_complete::Shell },
}

// --- Logging ---

/// Log to a daily file under the data dir; the terminal belongs to the UI.
fn init_logging() -> Option<WorkerGuard> {
  let dir = config::project_dirs()?.data_dir().join("logs");
  std::fs::create_dir_all(&dir).ok()?;
  let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "editvaults.log"));
  let filter = EnvFilter::try_from_env("EDITVAULTS_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
  tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).with_ansi(false).init();
  Some(guard)
}

// --- Main ---

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  if let Some(Command::Completions { shell }) = args.command {
    clap_complete::generate(shell, &mut Args::command(), env!("CARGO_PKG_NAME"), &mut std::io::stdout());
    return Ok(());
  }

  let _guard = init_logging();

  let overrides =
    Overrides { url: args.url, anon_key: args.anon_key, page_size: args.page_size, advance: args.advance };
  let settings = Settings::resolve(overrides, Config::load())?;
  let backend = SupabaseClient::new(&settings.url, &settings.anon_key).context("Failed to set up backend client")?;
  info!(url = %settings.url, page_size = settings.page_size, "editvaults: starting");

  let default_hook = std::panic::take_hook();
  std::panic::set_hook(Box::new(move |info| {
    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();
    default_hook(info);
  }));

  let mut terminal = ratatui::init();
  execute!(std::io::stdout(), EnableMouseCapture).context("Failed to enable mouse capture")?;

  let display_mode = display::resolve_display_mode(args.display_mode);
  let mut app = App::new(Arc::new(backend), &settings, display_mode);
  app.prefs_path = Config::path();

  let result = run(&mut terminal, &mut app).await;
  app.shutdown().await;

  let _ = execute!(std::io::stdout(), DisableMouseCapture);
  ratatui::restore();
  if let Err(e) = &result {
    error!(err = %format!("{:#}", e), "editvaults: exited with error");
  }
  result
}

async fn run(terminal: &mut DefaultTerminal, app: &mut App) -> Result<()> {
  app.start();

  loop {
    app.check_pending();
    app.expire_notices();
    app.refresh_thumbnail();

    terminal.draw(|frame| ui::ui(frame, app))?;

    if event::poll(Duration::from_millis(100))? {
      match event::read()? {
        Event::Key(key) if key.kind == KeyEventKind::Press => input::handle_key_event(app, key),
        Event::Mouse(mouse) => input::handle_mouse_event(app, mouse),
        _ => {}
      }
    }

    if app.should_quit {
      break;
    }
  }

  info!("editvaults: quitting");
  Ok(())
}
