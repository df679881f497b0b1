//! Single "download processed result" action.
//!
//! The negotiator asks the transfer client for the artifact, names it from
//! the server's `Content-Disposition` (or the caller's fallback) and hands it
//! to a [`BlobSink`]. The in-flight flag is held by a guard, so it is released
//! on every exit path.

mod sink;

pub use sink::{BlobSink, DirectorySink, SaveError};

use crate::transfer::{TransferClient, TransferError};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("A download is already in progress")]
    AlreadyInFlight,

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error(transparent)]
    Save(#[from] SaveError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedDownload {
    pub name: String,
    pub path: PathBuf,
    pub size: usize,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct DownloadNegotiator<C, S> {
    client: C,
    sink: S,
    in_flight: Arc<AtomicBool>,
}

impl<C: TransferClient, S: BlobSink> DownloadNegotiator<C, S> {
    pub fn new(client: C, sink: S) -> Self {
        Self::with_flag(client, sink, Arc::new(AtomicBool::new(false)))
    }

    /// Builds a negotiator that reports through an existing flag, so a host
    /// can watch it from another thread.
    pub fn with_flag(client: C, sink: S, in_flight: Arc<AtomicBool>) -> Self {
        Self {
            client,
            sink,
            in_flight,
        }
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub async fn download_named(
        &self,
        resource_path: &str,
        fallback_name: &str,
    ) -> Result<SavedDownload, DownloadError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(DownloadError::AlreadyInFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let blob = self.client.download(resource_path).await.map_err(|e| {
            error!(resource = %resource_path, error = %e, "Download failed");
            e
        })?;

        let name = blob
            .suggested_name
            .clone()
            .unwrap_or_else(|| fallback_name.to_string());
        let path = self.sink.save(&name, &blob.content).map_err(|e| {
            error!(name = %name, error = %e, "Saving download failed");
            e
        })?;

        info!(name = %name, path = %path.display(), size = blob.content.len(), "Download saved");
        Ok(SavedDownload {
            name,
            path,
            size: blob.content.len(),
        })
    }
}
