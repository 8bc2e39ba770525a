// src/tweaks/temp_files.rs

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{ModuleId, ModuleOutcome, TweakModule};
use crate::orchestrator::Session;

/// Aggregate result of purging one or more directories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeStats {
    pub entries: usize,
    pub bytes: u64,
    pub skipped: usize,
}

impl PurgeStats {
    fn merge(&mut self, other: PurgeStats) {
        self.entries += other.entries;
        self.bytes += other.bytes;
        self.skipped += other.skipped;
    }
}

/// Empties well-known temporary directories. One-way: nothing is captured.
pub struct TempFilesTweak {
    id: ModuleId,
    dirs: Vec<PathBuf>,
}

impl TempFilesTweak {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            id: ModuleId::TempFiles,
            dirs,
        }
    }
}

fn remove_entry(path: &Path) -> io::Result<()> {
    let file_type = fs::symlink_metadata(path)?.file_type();
    if file_type.is_symlink() {
        // Windows directory symlinks and junctions are removed as directories; the link goes,
        // the target stays.
        #[cfg(windows)]
        {
            use std::os::windows::fs::FileTypeExt;
            if file_type.is_symlink_dir() {
                return fs::remove_dir(path);
            }
        }
        return fs::remove_file(path);
    }
    if file_type.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

/// Total size of the files under `path` (or of `path` itself), without following links.
fn entry_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Cannot size '{}': {}", path.display(), e);
                None
            }
        })
        .filter(|entry| !entry.file_type().is_dir())
        .filter_map(|entry| entry.metadata().ok())
        .map(|metadata| metadata.len())
        .sum()
}

/// Deletes every entry directly inside `dir`, skipping the ones `remove` fails on.
pub fn purge_dir_with<F>(dir: &Path, mut remove: F) -> io::Result<PurgeStats>
where
    F: FnMut(&Path) -> io::Result<()>,
{
    let mut stats = PurgeStats::default();
    for entry in fs::read_dir(dir)? {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                debug!("Unreadable entry in '{}': {}", dir.display(), e);
                stats.skipped += 1;
                continue;
            }
        };

        let size = entry_size(&path);
        match remove(&path) {
            Ok(()) => {
                stats.entries += 1;
                stats.bytes += size;
            }
            Err(e) => {
                debug!("Skipped (in use): '{}': {}", path.display(), e);
                stats.skipped += 1;
            }
        }
    }
    Ok(stats)
}

pub fn purge_dir(dir: &Path) -> io::Result<PurgeStats> {
    purge_dir_with(dir, remove_entry)
}

impl TweakModule for TempFilesTweak {
    fn id(&self) -> ModuleId {
        self.id
    }

    fn optimize(&self, _session: &mut Session<'_>) -> anyhow::Result<ModuleOutcome> {
        info!("{:?} -> Cleaning temporary files.", self.id);
        let mut total = PurgeStats::default();

        for dir in &self.dirs {
            if !dir.is_dir() {
                debug!("{:?} -> '{}' does not exist, skipping.", self.id, dir.display());
                continue;
            }
            info!("{:?} -> Cleaning '{}'.", self.id, dir.display());
            match purge_dir(dir) {
                Ok(stats) => total.merge(stats),
                Err(e) => warn!("{:?} -> Cannot list '{}': {}", self.id, dir.display(), e),
            }
        }

        info!(
            "{:?} -> Removed {} entries ({:.2} MB freed), {} skipped.",
            self.id,
            total.entries,
            total.bytes as f64 / (1024.0 * 1024.0),
            total.skipped
        );
        Ok(ModuleOutcome::Purged {
            entries: total.entries,
            bytes: total.bytes,
            skipped: total.skipped,
        })
    }

    fn restore(&self, _session: &mut Session<'_>) -> anyhow::Result<ModuleOutcome> {
        info!("{:?} -> Temporary file cleanup is permanent, nothing to restore.", self.id);
        Ok(ModuleOutcome::Irreversible)
    }
}
