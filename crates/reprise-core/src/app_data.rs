//! Where Reprise stores its own data (config, review state).
//!
//! User notes stay in the folder they choose. We only store app state here.

use std::path::PathBuf;

const REVIEWS_FILENAME: &str = "reviews.json";

/// Returns the directory where Reprise stores config and review data.
/// On macOS: `~/Library/Application Support/Reprise/`.
/// Creates the directory if it doesn't exist; returns `None` if we can't determine the path.
pub fn app_data_dir() -> Option<PathBuf> {
    let dir = directories::ProjectDirs::from("app", "Reprise", "Reprise")?.data_local_dir().to_path_buf();
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

/// Default location of the review snapshot.
pub fn default_persistence_path() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join(REVIEWS_FILENAME))
}
