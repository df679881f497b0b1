use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use stock_uploader::download::SavedDownload;
use stock_uploader::upload::{BatchReport, SlotEvent, SlotOutcome, SlotRegistry};
use stock_uploader::Supplier;
use tokio::sync::mpsc::UnboundedReceiver;

const MAX_NOTICES: usize = 6;

pub type DownloadResult = Result<SavedDownload, String>;

#[derive(Clone, Default)]
pub enum BatchProgress {
    #[default]
    NotStarted,
    Uploading {
        total: usize,
        uploaded: usize,
        failed: usize,
    },
    Completed {
        total: usize,
        uploaded: usize,
        failed: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Warning(String),
    Error(String),
}

#[derive(Default)]
pub struct AppState {
    pub registry: SlotRegistry,
    pub progress: BatchProgress,
    pub slot_errors: BTreeMap<Supplier, String>,
    pub notices: Vec<Notice>,
    pub last_download: Option<SavedDownload>,
    pub show_details: bool,
    pub slot_receiver: Option<UnboundedReceiver<SlotEvent>>,
    pub report_receiver: Option<Receiver<BatchReport>>,
    pub download_receiver: Option<Receiver<DownloadResult>>,
}

impl AppState {
    pub fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
        if self.notices.len() > MAX_NOTICES {
            let excess = self.notices.len() - MAX_NOTICES;
            self.notices.drain(..excess);
        }
    }

    pub fn begin_progress(&mut self, total: usize) {
        self.progress = BatchProgress::Uploading {
            total,
            uploaded: 0,
            failed: 0,
        };
    }

    /// Applies one settled transfer to the registry and the progress counters.
    pub fn record_event(&mut self, event: &SlotEvent) {
        self.registry.apply(event);
        match &event.outcome {
            SlotOutcome::Uploaded => {
                self.slot_errors.remove(&event.supplier);
            }
            SlotOutcome::Failed(reason) => {
                self.slot_errors.insert(event.supplier, reason.clone());
            }
        }

        if let BatchProgress::Uploading {
            uploaded, failed, ..
        } = &mut self.progress
        {
            match event.outcome {
                SlotOutcome::Uploaded => *uploaded += 1,
                SlotOutcome::Failed(_) => *failed += 1,
            }
        }
    }

    pub fn drain_slot_events(&mut self) -> bool {
        let mut events = Vec::new();
        if let Some(receiver) = &mut self.slot_receiver {
            while let Ok(event) = receiver.try_recv() {
                events.push(event);
            }
        }
        for event in &events {
            self.record_event(event);
        }
        !events.is_empty()
    }

    pub fn complete_batch(&mut self, report: &BatchReport) {
        self.registry.finish_batch(report);
        self.progress = BatchProgress::Completed {
            total: report.total(),
            uploaded: report.succeeded().len(),
            failed: report.failed().len(),
        };
        self.slot_receiver = None;
        self.report_receiver = None;

        if report.failed().is_empty() {
            self.push_notice(Notice::Info(report.summary()));
        } else {
            let failed: Vec<String> = report.failed().iter().map(|s| s.to_string()).collect();
            self.push_notice(Notice::Error(format!(
                "Upload completed with failures: {}. Remove and reselect to try again.",
                failed.join(", ")
            )));
        }
    }

    pub fn download_pending(&self) -> bool {
        self.download_receiver.is_some()
    }

    /// Opens the result channel for a new download. Returns `None` while an
    /// earlier download has not reported back yet.
    pub fn begin_download(&mut self) -> Option<Sender<DownloadResult>> {
        if self.download_pending() {
            return None;
        }
        let (sender, receiver) = mpsc::channel();
        self.download_receiver = Some(receiver);
        Some(sender)
    }

    /// Takes the download result once the worker has reported. A worker that
    /// exits without reporting is treated as a failure.
    pub fn poll_download(&mut self) -> Option<DownloadResult> {
        let result = match self.download_receiver.as_ref()?.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => Err("Download worker stopped unexpectedly".to_string()),
        };
        self.download_receiver = None;
        Some(result)
    }

    pub fn clear_slot(&mut self, supplier: Supplier) {
        self.registry.remove_file(supplier);
        self.slot_errors.remove(&supplier);
    }

    pub fn get_progress_percentage(&self) -> f32 {
        match &self.progress {
            BatchProgress::NotStarted => 0.0,
            BatchProgress::Uploading {
                total,
                uploaded,
                failed,
            } => {
                if *total == 0 {
                    0.0
                } else {
                    (*uploaded + *failed) as f32 / *total as f32
                }
            }
            BatchProgress::Completed { total, .. } => {
                if *total == 0 {
                    0.0
                } else {
                    1.0
                }
            }
        }
    }

    pub fn get_status_text(&self) -> String {
        match &self.progress {
            BatchProgress::NotStarted => String::new(),
            BatchProgress::Uploading {
                total,
                uploaded,
                failed,
            } => format!(
                "Progress: {}/{} files | ✅ Uploaded: {} | ❌ Failed: {}",
                uploaded + failed,
                total,
                uploaded,
                failed
            ),
            BatchProgress::Completed {
                total,
                uploaded,
                failed,
            } => format!(
                "Final Status: {}/{} files | ✅ Uploaded: {} | ❌ Failed: {}",
                total, total, uploaded, failed
            ),
        }
    }
}
