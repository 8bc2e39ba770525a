// src/config.rs

use std::{
    env,
    path::{Path, PathBuf},
};

use crate::constants::{APP_DIR_NAME, PROFILES_DIR_NAME, STATE_FILE_NAME};

/// Where the engine keeps its files, and which directories the temp purge empties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub state_file: PathBuf,
    pub profiles_dir: PathBuf,
    pub temp_dirs: Vec<PathBuf>,
}

impl EngineConfig {
    /// Defaults under the per-user config directory, each overridable.
    pub fn resolve(state_file: Option<PathBuf>, profiles_dir: Option<PathBuf>) -> Self {
        let app_dir = app_dir();
        Self {
            state_file: state_file.unwrap_or_else(|| app_dir.join(STATE_FILE_NAME)),
            profiles_dir: profiles_dir.unwrap_or_else(|| app_dir.join(PROFILES_DIR_NAME)),
            temp_dirs: default_temp_dirs(),
        }
    }
}

/// `<config_dir>/PerfTool`, or the working directory when the platform has no config dir.
pub fn app_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// `%TEMP%` and `%SystemRoot%\Temp` on Windows, the platform temp dir elsewhere.
pub fn default_temp_dirs() -> Vec<PathBuf> {
    let candidates = if cfg!(windows) {
        let system_root = env::var_os("SystemRoot")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("C:\\Windows"));
        vec![
            env::var_os("TEMP").map(PathBuf::from).unwrap_or_else(env::temp_dir),
            system_root.join("Temp"),
        ]
    } else {
        vec![env::temp_dir()]
    };
    dedup_paths(candidates)
}

fn dedup_paths(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut unique: Vec<PathBuf> = Vec::with_capacity(paths.len());
    for path in paths {
        if !unique.iter().any(|seen| same_path(seen, &path)) {
            unique.push(path);
        }
    }
    unique
}

fn same_path(a: &Path, b: &Path) -> bool {
    if cfg!(windows) {
        a.to_string_lossy().to_lowercase() == b.to_string_lossy().to_lowercase()
    } else {
        a == b
    }
}
