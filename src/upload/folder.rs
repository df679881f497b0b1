//! Assigns stock files found in a folder to supplier slots by file name.

use super::registry::SlotRegistry;
use super::types::{InputError, PendingFile};
use crate::supplier::Supplier;
use glob::{MatchOptions, Pattern};
use ignore::WalkBuilder;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Failed to walk folder: {0}")]
    Walk(#[from] ignore::Error),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Input(#[from] InputError),
}

#[derive(Debug, Default)]
pub struct FolderScan {
    pub matches: BTreeMap<Supplier, Vec<PathBuf>>,
    pub unmatched: Vec<PathBuf>,
}

fn supplier_for(file_name: &str) -> Option<Supplier> {
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: false,
        require_literal_leading_dot: false,
    };
    Supplier::ALL.into_iter().find(|supplier| {
        Pattern::new(supplier.file_pattern())
            .map(|p| p.matches_with(file_name, options))
            .unwrap_or(false)
    })
}

/// Lists the files directly inside `dir` and groups them by supplier.
/// Ignore files (`.gitignore`, `.ignore`) and hidden files are honoured.
pub fn scan_folder(dir: &Path) -> Result<FolderScan, ScanError> {
    if !dir.is_dir() {
        return Err(ScanError::NotADirectory(dir.to_path_buf()));
    }

    let mut scan = FolderScan::default();
    for entry in WalkBuilder::new(dir).max_depth(Some(1)).build() {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        match supplier_for(name) {
            Some(supplier) => {
                debug!(supplier = %supplier, file = %name, "Matched stock file");
                scan.matches
                    .entry(supplier)
                    .or_default()
                    .push(path.to_path_buf());
            }
            None => scan.unmatched.push(path.to_path_buf()),
        }
    }

    for paths in scan.matches.values_mut() {
        paths.sort();
    }
    scan.unmatched.sort();
    info!(
        folder = %dir.display(),
        matched = scan.matches.len(),
        unmatched = scan.unmatched.len(),
        "Folder scanned"
    );
    Ok(scan)
}

impl FolderScan {
    /// Selects the matched files into `registry`, one selection per supplier.
    /// A supplier with several candidates is offered all of them and is
    /// therefore rejected like any multi-file selection.
    pub fn assign(&self, registry: &mut SlotRegistry) -> Vec<(Supplier, Result<(), ScanError>)> {
        self.matches
            .iter()
            .map(|(supplier, paths)| {
                let result = paths
                    .iter()
                    .map(|path| {
                        PendingFile::from_path(path).map_err(|source| ScanError::Read {
                            path: path.clone(),
                            source,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .and_then(|files| {
                        registry
                            .select_files(*supplier, files)
                            .map_err(ScanError::from)
                    });
                if let Err(e) = &result {
                    warn!(supplier = %supplier, error = %e, "Could not assign file from folder");
                }
                (*supplier, result)
            })
            .collect()
    }
}
