use dirs::config_dir;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

const APP_DIR: &str = "kinoweek";

pub fn config_root() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
        .join(APP_DIR)
}

pub fn config_path() -> PathBuf {
    config_root().join("kinoweek.toml")
}

pub fn ensure_dir(path: &Path) -> io::Result<()> {
    if path.as_os_str().is_empty() {
        return Ok(());
    }
    fs::create_dir_all(path)
}
