use crate::supplier::Supplier;
use bytes::Bytes;
use derivative::Derivative;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Lifecycle of a single upload slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SlotState {
    #[default]
    NotUploaded,
    Uploading,
    Uploaded,
    Failed,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Illegal transition for {supplier}: {from} -> {to}")]
pub struct TransitionError {
    pub supplier: Supplier,
    pub from: SlotState,
    pub to: SlotState,
}

impl SlotState {
    pub fn can_transition_to(self, next: SlotState) -> bool {
        use SlotState::*;
        matches!(
            (self, next),
            (NotUploaded, Uploading)
                | (Uploading, Uploaded)
                | (Uploading, Failed)
                | (Uploaded, NotUploaded)
                | (Failed, NotUploaded)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, SlotState::Uploaded | SlotState::Failed)
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SlotState::NotUploaded => "Not uploaded",
            SlotState::Uploading => "Uploading",
            SlotState::Uploaded => "Uploaded",
            SlotState::Failed => "Failed",
        };
        f.write_str(label)
    }
}

/// A file picked for a supplier but not yet uploaded.
#[derive(Derivative, Clone, PartialEq, Eq)]
#[derivative(Debug)]
pub struct PendingFile {
    pub name: String,
    #[derivative(Debug = "ignore")]
    pub content: Bytes,
}

impl PendingFile {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn from_path(path: &Path) -> io::Result<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Path has no file name"))?;
        let content = fs::read(path)?;
        Ok(Self::new(name, content))
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// Rejected file selection. Never changes slot state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Please select only one file for {supplier} ({count} were selected)")]
    MultipleFiles { supplier: Supplier, count: usize },

    #[error("No file selected for {0}")]
    NoFile(Supplier),

    #[error("File inputs are disabled while an upload is running")]
    BatchInFlight,

    #[error("{0} is still uploading")]
    SlotBusy(Supplier),

    #[error("{0} already finished uploading; remove its file before choosing another")]
    SlotSettled(Supplier),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOutcome {
    Uploaded,
    Failed(String),
}

/// Settlement of one slot's transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotEvent {
    pub supplier: Supplier,
    pub outcome: SlotOutcome,
}

#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub supplier: Supplier,
    pub file: PendingFile,
}

/// Slots dispatched together by one Upload action.
#[derive(Debug, Clone, Default)]
pub struct UploadBatch {
    pub entries: Vec<BatchEntry>,
}

impl UploadBatch {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn suppliers(&self) -> Vec<Supplier> {
        self.entries.iter().map(|e| e.supplier).collect()
    }
}

/// Per-slot outcomes of a settled batch, in dispatch order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub outcomes: Vec<SlotEvent>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> Vec<Supplier> {
        self.outcomes
            .iter()
            .filter(|e| e.outcome == SlotOutcome::Uploaded)
            .map(|e| e.supplier)
            .collect()
    }

    pub fn failed(&self) -> Vec<Supplier> {
        self.outcomes
            .iter()
            .filter(|e| matches!(e.outcome, SlotOutcome::Failed(_)))
            .map(|e| e.supplier)
            .collect()
    }

    pub fn summary(&self) -> String {
        format!(
            "Upload finished: {} files | ✅ Uploaded: {} | ❌ Failed: {}",
            self.total(),
            self.succeeded().len(),
            self.failed().len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SlotState::*;

    #[test]
    fn test_only_lifecycle_edges_are_legal() {
        let all = [NotUploaded, Uploading, Uploaded, Failed];
        let legal = [
            (NotUploaded, Uploading),
            (Uploading, Uploaded),
            (Uploading, Failed),
            (Uploaded, NotUploaded),
            (Failed, NotUploaded),
        ];
        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    legal.contains(&(from, to)),
                    "{:?} -> {:?}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_pending_file_debug_hides_content() {
        let file = PendingFile::new("stock.csv", vec![0xAB; 64]);
        let debug = format!("{:?}", file);
        assert!(debug.contains("stock.csv"));
        assert!(!debug.contains("171"));
    }

    #[test]
    fn test_report_partitions_outcomes() {
        let report = BatchReport {
            outcomes: vec![
                SlotEvent {
                    supplier: Supplier::Apex,
                    outcome: SlotOutcome::Uploaded,
                },
                SlotEvent {
                    supplier: Supplier::Solarpop,
                    outcome: SlotOutcome::Failed("HTTP 500".to_string()),
                },
            ],
        };
        assert_eq!(report.succeeded(), vec![Supplier::Apex]);
        assert_eq!(report.failed(), vec![Supplier::Solarpop]);
        assert_eq!(report.total(), 2);
    }
}
