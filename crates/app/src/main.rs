use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context as _;
use catalog::HttpCatalog;
use clap::Parser;
use directories::ProjectDirs;
use shelfview_application::{AppContext, BooksState, ShelvesState, load_once};
use shelfview_core::{AutoSelect, Settings};
use shelfview_settings::{SettingsStore, apply_env};
use shelfview_ui::Ui;
use tracing::info;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "shelfview.log";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Browse the shelves of a book catalog from the terminal.
#[derive(Debug, Parser)]
#[command(name = "shelfview", version)]
struct Args {
    /// Catalog API root, e.g. https://api.glose.com
    #[arg(long)]
    base_url: Option<String>,

    /// User whose shelves are listed.
    #[arg(long)]
    user_id: Option<String>,

    /// When the first shelf is picked automatically: rearm or first-load-only.
    #[arg(long)]
    auto_select: Option<AutoSelect>,

    /// Load once and print the result instead of starting the UI.
    #[arg(long)]
    print: bool,

    /// Shelf to select before loading.
    #[arg(long)]
    shelf: Option<String>,

    /// Initial search query.
    #[arg(long, default_value = "")]
    query: String,

    /// Page to show; clamped to the available pages.
    #[arg(long, default_value_t = 1)]
    page: usize,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let project_dirs =
        ProjectDirs::from("dev", "shelfview", "shelfview").context("resolve project dirs")?;

    let store = SettingsStore::open(project_dirs.config_dir())?;
    let mut settings = store.load()?;
    apply_env(&mut settings, |key| std::env::var(key).ok())?;
    apply_args(&mut settings, &args);

    init_tracing(&settings, args.print, project_dirs.data_dir())?;
    info!(
        base_url = %settings.base_url,
        user_id = %settings.user_id,
        auto_select = %settings.auto_select,
        "starting"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start tokio runtime")?;

    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("shelfview/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("build http client")?;
    let catalog = HttpCatalog::from_settings(&settings).with_client(client);
    let mut ctx = AppContext::new(settings).with_query(args.query.clone());
    if let Some(shelf_id) = &args.shelf {
        ctx.select(shelf_id.clone());
    }

    if args.print {
        runtime.block_on(load_once(&mut ctx, &catalog));
        ctx.go_to_page(args.page);
        print!("{}", render_report(&ctx));
        return Ok(());
    }

    let mut ui = Ui::new(ctx, Arc::new(catalog), runtime.handle().clone());
    ui.run()?;
    let ctx = ui.into_context();
    info!(selected = ?ctx.selected_shelf_id(), "exiting");
    Ok(())
}

fn apply_args(settings: &mut Settings, args: &Args) {
    if let Some(base_url) = &args.base_url {
        settings.base_url = base_url.clone();
    }
    if let Some(user_id) = &args.user_id {
        settings.user_id = user_id.clone();
    }
    if let Some(mode) = args.auto_select {
        settings.auto_select = mode;
    }
    settings.normalize();
}

/// The terminal belongs to the UI, so interactive runs log to a file.
fn init_tracing(settings: &Settings, to_stderr: bool, data_dir: &Path) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&settings.log_filter)
        .with_context(|| format!("invalid log filter {:?}", settings.log_filter))?;

    if to_stderr {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(());
    }

    fs::create_dir_all(data_dir)
        .with_context(|| format!("create data dir {}", data_dir.display()))?;
    let log_path = data_dir.join(LOG_FILE);
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("open log file {}", log_path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn render_report(ctx: &AppContext) -> String {
    let mut out = String::new();

    match ctx.shelves_state() {
        ShelvesState::Failed(err) => {
            let _ = writeln!(out, "Could not load shelves: {err}");
            return out;
        }
        ShelvesState::Ready(shelves) if shelves.is_empty() => {
            let _ = writeln!(out, "No shelves.");
        }
        _ => {
            let _ = writeln!(out, "Shelves:");
            for shelf in ctx.shelves() {
                let marker = if ctx.selection().is_selected(&shelf.id) {
                    '*'
                } else {
                    ' '
                };
                let _ = writeln!(out, " {marker} {} ({})", shelf.title, shelf.id);
            }
        }
    }
    out.push('\n');

    match ctx.books_state() {
        BooksState::Idle | BooksState::Loading { .. } => {
            let _ = writeln!(out, "No shelf selected.");
            return out;
        }
        BooksState::Failed { shelf_id, error } => {
            let _ = writeln!(out, "Could not load shelf {shelf_id}: {error}");
            return out;
        }
        BooksState::Ready { books, .. } if books.is_empty() => {
            let _ = writeln!(out, "No books found in this shelf.");
        }
        BooksState::Ready { .. } if ctx.filtered_books().is_empty() => {
            let _ = writeln!(out, "No matches for {:?}.", ctx.query().trim());
        }
        BooksState::Ready { .. } => {
            for book in ctx.visible_books() {
                let _ = write!(out, "- {}", book.title);
                let authors = book.author_line();
                if !authors.is_empty() {
                    let _ = write!(out, " by {authors}");
                }
                if let Some(price) = &book.price {
                    let _ = write!(out, " [{price}]");
                }
                if let Some(rating) = book.rating_label() {
                    let _ = write!(out, " ★ {rating}");
                }
                out.push('\n');
            }
        }
    }

    let _ = writeln!(
        out,
        "\nPage {} of {}",
        ctx.current_page(),
        ctx.total_pages()
    );
    out
}
