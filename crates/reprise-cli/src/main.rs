//! CLI entry point for the Reprise backend (for dev and testing).

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};

use anyhow::{bail, Context};
use clap::Parser;
use reprise_core::{
    app_data_dir, format_interval, load_config, note_exists, note_id, preview, read_properties, resolve_path,
    retain_matching, scan_notes, set_daily_limit, set_filter_mode, set_notes_root, status, watch_notes,
    ChainMode, Config, Filter, FsGateway, Rating, ReviewItem, ReviewStore, Stage, SystemClock,
};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "reprise")]
#[command(about = "Reprise: spaced review of your notes")]
struct Cli {
    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum OutputFormat {
    Plain,
    Json,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum FilterModeArg {
    /// Fold every entry left to right.
    Fold,
    /// Stop at the first AND entry that leaves the result false.
    ShortCircuit,
}

impl From<FilterModeArg> for ChainMode {
    fn from(mode: FilterModeArg) -> Self {
        match mode {
            FilterModeArg::Fold => ChainMode::Fold,
            FilterModeArg::ShortCircuit => ChainMode::ShortCircuit,
        }
    }
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show backend status (for dev).
    Status,
    /// Show where Reprise stores its config and review data (app data directory).
    DataDir,
    /// Show or change configuration.
    Config {
        /// Notes folder; tracked ids are paths relative to it.
        #[arg(long, value_name = "PATH")]
        root: Option<PathBuf>,
        /// New items per day (-1 for unlimited, otherwise 1-1000).
        #[arg(long, allow_negative_numbers = true)]
        limit: Option<i32>,
        /// How filter chains combine AND/OR entries.
        #[arg(long)]
        filter_mode: Option<FilterModeArg>,
    },
    /// Start reviewing one or more notes. A directory tracks every markdown note under it.
    Track {
        #[arg(value_name = "PATH", required = true)]
        paths: Vec<PathBuf>,
    },
    /// Stop reviewing a note.
    Untrack {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Move a note's review state after it was renamed.
    Rename { old: PathBuf, new: PathBuf },
    /// List every tracked note.
    List,
    /// Show the review queue.
    Due {
        /// Property filter: `prop=value`, `and:prop=value` or `or:prop=value`. Repeatable, in order.
        #[arg(long = "filter", value_name = "EXPR")]
        filters: Vec<Filter>,
    },
    /// Rate a note: again, hard, good, easy (or 1-4).
    Review {
        #[arg(value_name = "PATH")]
        path: PathBuf,
        rating: Rating,
    },
    /// Show the interval each rating would give a note.
    Preview {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    /// Counts of new, learning, review and due notes.
    Stats,
    /// Today's new-item budget.
    Limit,
    /// Forget notes that no longer exist.
    Cleanup,
    /// Watch the notes folder and forget notes as they disappear.
    Watch,
}

struct Session {
    config: Config,
    root: Option<PathBuf>,
    store: ReviewStore,
}

impl Session {
    fn open() -> anyhow::Result<Self> {
        let config = load_config();
        let settings = config.store_settings().context("invalid configuration")?;
        let store = ReviewStore::open(settings, Arc::new(FsGateway), Arc::new(SystemClock))
            .context("failed to open review data")?;
        Ok(Self {
            root: config.notes_root(),
            config,
            store,
        })
    }

    fn id(&self, path: &Path) -> anyhow::Result<String> {
        let cwd = std::env::current_dir().context("failed to read working directory")?;
        Ok(note_id(self.root.as_deref(), &resolve_path(&cwd, path)))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PreviewRow {
    rating: Rating,
    interval: f64,
    label: String,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let format = cli.format;

    match cli.command.unwrap_or(Commands::Status) {
        Commands::Status => {
            println!("Reprise backend");
            println!("  core: {}", status());
        }
        Commands::DataDir => match app_data_dir() {
            Some(p) => println!("{}", p.display()),
            None => eprintln!("Could not determine app data directory."),
        },
        Commands::Config { root, limit, filter_mode } => {
            if let Some(root) = root {
                set_notes_root(&root)?;
            }
            if let Some(limit) = limit {
                set_daily_limit(limit)?;
            }
            if let Some(mode) = filter_mode {
                set_filter_mode(mode.into())?;
            }
            let config = load_config();
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
                OutputFormat::Plain => {
                    println!("notes root:       {}", config.notes_root.as_deref().unwrap_or("(not set)"));
                    println!("new items/day:    {}", config.new_items_per_day_limit);
                    println!("review data:      {}", config.persistence_path()?.display());
                    println!("filter mode:      {:?}", config.filter_mode);
                }
            }
        }
        Commands::Track { paths } => {
            let mut session = Session::open()?;
            for path in paths {
                let files: Vec<PathBuf> = if path.is_dir() {
                    scan_notes(&path)?
                } else {
                    vec![path]
                };
                for file in files {
                    let id = session.id(&file)?;
                    if session.store.track(&id)? {
                        println!("tracking {id}");
                    } else {
                        println!("already tracked: {id}");
                    }
                }
            }
        }
        Commands::Untrack { path } => {
            let mut session = Session::open()?;
            let id = session.id(&path)?;
            if session.store.untrack(&id) {
                println!("untracked {id}");
            } else {
                println!("not tracked: {id}");
            }
        }
        Commands::Rename { old, new } => {
            let mut session = Session::open()?;
            let (old, new) = (session.id(&old)?, session.id(&new)?);
            if session.store.rename(&old, &new)? {
                println!("{old} -> {new}");
            } else {
                println!("not tracked: {old}");
            }
        }
        Commands::List => {
            let session = Session::open()?;
            print_items(format, &session.store.get_all())?;
        }
        Commands::Due { filters } => {
            let session = Session::open()?;
            let root = session.root.clone();
            let due = retain_matching(session.store.get_due(), &filters, session.config.filter_mode, |item| {
                read_properties(root.as_deref(), &item.path)
            });
            print_items(format, &due)?;
        }
        Commands::Review { path, rating } => {
            let mut session = Session::open()?;
            let id = session.id(&path)?;
            let Some(item) = session.store.update_review(&id, rating)? else {
                bail!("not tracked: {id}");
            };
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&item)?),
                OutputFormat::Plain => println!(
                    "{id}: {rating}, next in {} (interval {}d, ease {})",
                    format_interval(item.interval),
                    item.interval,
                    item.ease_factor
                ),
            }
        }
        Commands::Preview { path } => {
            let session = Session::open()?;
            let id = session.id(&path)?;
            let Some(item) = session.store.get(&id) else {
                bail!("not tracked: {id}");
            };
            let rows: Vec<PreviewRow> = Rating::ALL
                .into_iter()
                .zip(preview(item))
                .map(|(rating, interval)| PreviewRow {
                    rating,
                    interval,
                    label: format_interval(interval),
                })
                .collect();
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
                OutputFormat::Plain => {
                    for row in rows {
                        println!("  {:<6} {}", row.rating, row.label);
                    }
                }
            }
        }
        Commands::Stats => {
            let session = Session::open()?;
            let stats = session.store.get_statistics();
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
                OutputFormat::Plain => {
                    println!("total:    {}", stats.total);
                    println!("due:      {}", stats.due);
                    println!("new:      {}", stats.new);
                    println!("learning: {}", stats.learning);
                    println!("review:   {}", stats.review);
                }
            }
        }
        Commands::Limit => {
            let session = Session::open()?;
            let info = session.store.get_daily_limit_info();
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&info)?),
                OutputFormat::Plain if info.limit < 0 => {
                    println!("{} new item(s) started today (no daily limit)", info.used)
                }
                OutputFormat::Plain => {
                    println!("{}/{} new item(s) started today, {} left", info.used, info.limit, info.remaining)
                }
            }
        }
        Commands::Cleanup => {
            let mut session = Session::open()?;
            let root = session.root.clone();
            let removed = session.store.cleanup(|id| note_exists(root.as_deref(), id))?;
            println!("removed {removed} missing note(s)");
        }
        Commands::Watch => {
            let session = Session::open()?;
            let Some(root) = session.root.clone() else {
                bail!("set a notes root first: reprise config --root <PATH>");
            };
            let shared = session.store.into_shared();
            let sweep_root = root.clone();
            println!("Watching {} (Ctrl+C to stop)", root.display());
            watch_notes(&root, move |changed| {
                log::debug!("{} path(s) changed", changed.len());
                let mut store = shared.lock().unwrap_or_else(PoisonError::into_inner);
                match store.cleanup(|id| note_exists(Some(&sweep_root), id)) {
                    Ok(0) => {}
                    Ok(n) => println!("removed {n} missing note(s)"),
                    Err(e) => log::warn!("cleanup failed: {e}"),
                }
            })?;
        }
    }
    Ok(())
}

fn print_items(format: OutputFormat, items: &[ReviewItem]) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(items)?),
        OutputFormat::Plain => {
            println!("{} note(s)", items.len());
            for item in items {
                println!("  {:<8} {:>6}  {}", stage_label(item), format_interval(item.interval), item.path);
            }
        }
    }
    Ok(())
}

fn stage_label(item: &ReviewItem) -> &'static str {
    match item.stage() {
        Stage::New => "new",
        Stage::Learning => "learning",
        Stage::Review => "review",
    }
}
