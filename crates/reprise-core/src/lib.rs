//! All backend logic independent of how the app is run (CLI or a host app).
//!
//! Tracked notes get an SM-2 style schedule ([scheduler]) kept by the [store], which
//! also counts new items started per day ([daily]). [due] builds the review queue and
//! [filter] narrows it by note properties. User notes live in a folder they choose;
//! Reprise stores only config and review state in its own app data directory (see [app_data]).

pub mod app_data;
pub mod clock;
pub mod config;
pub mod daily;
pub mod due;
pub mod filter;
pub mod gateway;
pub mod item;
pub mod notes;
pub mod scheduler;
pub mod snapshot;
pub mod store;
pub mod watcher;

pub use app_data::{app_data_dir, default_persistence_path};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{load_config, save_config, set_daily_limit, set_filter_mode, set_notes_root, Config, ConfigError};
pub use daily::{DailyCounter, DailyLimit, DailyLimitInfo};
pub use due::select_due;
pub use filter::{evaluate, evaluate_with, retain_matching, ChainMode, Connector, Filter, FilterParseError, Properties, PropertyValue};
pub use gateway::{FsGateway, MemoryGateway, StorageGateway};
pub use item::{ReviewItem, ReviewStatistics, Stage};
pub use notes::{note_exists, note_id, read_properties, resolve_path, scan_notes, ScanError};
pub use scheduler::{compute_next, format_interval, preview, Rating, ScheduleOutcome};
pub use store::{ReviewStore, SharedReviewStore, StoreError, StoreSettings};
pub use watcher::{watch_notes, WatchError};

/// Returns a short status string. Used to verify the backend is wired up.
pub fn status() -> &'static str {
    "reprise-core ready"
}
