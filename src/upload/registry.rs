//! Per-supplier upload slots and the flags derived from them.
//!
//! The registry owns one [`UploadSlot`] for every [`Supplier`]. All state
//! changes go through the four-state machine in [`SlotState`]: a slot only
//! moves along `NotUploaded -> Uploading -> {Uploaded, Failed}` and back to
//! `NotUploaded` through an explicit removal.

use super::types::{
    BatchEntry, BatchReport, InputError, PendingFile, SlotEvent, SlotOutcome, SlotState,
    TransitionError, UploadBatch,
};
use crate::supplier::Supplier;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct UploadSlot {
    pub supplier: Supplier,
    pub pending_file: Option<PendingFile>,
    /// What the slot's file input currently shows.
    pub input_label: Option<String>,
    pub state: SlotState,
}

impl UploadSlot {
    fn new(supplier: Supplier) -> Self {
        Self {
            supplier,
            pending_file: None,
            input_label: None,
            state: SlotState::NotUploaded,
        }
    }

    fn clear_file(&mut self) {
        self.pending_file = None;
        self.input_label = None;
    }

    fn is_dispatchable(&self) -> bool {
        self.pending_file.is_some() && self.state == SlotState::NotUploaded
    }
}

/// Read-only view handed to the renderer.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    pub slots: Vec<UploadSlot>,
    pub any_pending_file: bool,
    pub batch_in_flight: bool,
}

#[derive(Debug, Clone)]
pub struct SlotRegistry {
    slots: BTreeMap<Supplier, UploadSlot>,
    batch_in_flight: bool,
}

impl Default for SlotRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotRegistry {
    pub fn new() -> Self {
        let slots = Supplier::ALL
            .into_iter()
            .map(|s| (s, UploadSlot::new(s)))
            .collect();
        Self {
            slots,
            batch_in_flight: false,
        }
    }

    pub fn slot(&self, supplier: Supplier) -> &UploadSlot {
        &self.slots[&supplier]
    }

    fn slot_mut(&mut self, supplier: Supplier) -> &mut UploadSlot {
        self.slots
            .entry(supplier)
            .or_insert_with(|| UploadSlot::new(supplier))
    }

    pub fn state(&self, supplier: Supplier) -> SlotState {
        self.slot(supplier).state
    }

    pub fn any_pending_file(&self) -> bool {
        self.slots.values().any(|s| s.pending_file.is_some())
    }

    pub fn batch_in_flight(&self) -> bool {
        self.batch_in_flight
    }

    /// Whether the Upload action should be enabled.
    pub fn can_upload(&self) -> bool {
        !self.batch_in_flight && self.slots.values().any(UploadSlot::is_dispatchable)
    }

    /// Records the file picked for `supplier`. Offering more than one file in a
    /// single selection is rejected and leaves the slot untouched, as is any
    /// selection on an Uploaded or Failed slot that has not been removed yet.
    pub fn select_files(
        &mut self,
        supplier: Supplier,
        mut files: Vec<PendingFile>,
    ) -> Result<(), InputError> {
        if files.len() > 1 {
            let err = InputError::MultipleFiles {
                supplier,
                count: files.len(),
            };
            warn!(supplier = %supplier, count = files.len(), "Rejected multi-file selection");
            return Err(err);
        }
        let file = files.pop().ok_or(InputError::NoFile(supplier))?;

        if self.batch_in_flight {
            return Err(InputError::BatchInFlight);
        }
        if self.state(supplier) == SlotState::Uploading {
            return Err(InputError::SlotBusy(supplier));
        }

        if self.state(supplier).is_terminal() {
            warn!(supplier = %supplier, state = %self.state(supplier), "Rejected selection on settled slot");
            return Err(InputError::SlotSettled(supplier));
        }

        info!(supplier = %supplier, file = %file.name, size = file.size(), "File selected");
        let slot = self.slot_mut(supplier);
        slot.input_label = Some(file.name.clone());
        slot.pending_file = Some(file);
        Ok(())
    }

    pub fn select_file(&mut self, supplier: Supplier, file: PendingFile) -> Result<(), InputError> {
        self.select_files(supplier, vec![file])
    }

    /// Clears the slot's file and input. A slot that is still uploading keeps
    /// its state; the transfer in flight resolves it.
    pub fn remove_file(&mut self, supplier: Supplier) {
        let slot = self.slot_mut(supplier);
        slot.clear_file();
        match slot.state {
            SlotState::Uploaded | SlotState::Failed => slot.state = SlotState::NotUploaded,
            SlotState::Uploading => {
                debug!(supplier = %supplier, "File removed while upload in flight")
            }
            SlotState::NotUploaded => {}
        }
        info!(supplier = %supplier, "File removed");
    }

    pub fn set_state(&mut self, supplier: Supplier, next: SlotState) -> Result<(), TransitionError> {
        let slot = self.slot_mut(supplier);
        if !slot.state.can_transition_to(next) {
            return Err(TransitionError {
                supplier,
                from: slot.state,
                to: next,
            });
        }
        debug!(supplier = %supplier, from = %slot.state, to = %next, "Slot state changed");
        slot.state = next;
        Ok(())
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            slots: self.slots.values().cloned().collect(),
            any_pending_file: self.any_pending_file(),
            batch_in_flight: self.batch_in_flight,
        }
    }

    /// Collects every dispatchable slot, marks it Uploading and raises the
    /// batch flag. Returns `None` when nothing can be dispatched or a batch is
    /// already running.
    pub fn begin_batch(&mut self) -> Option<UploadBatch> {
        if !self.can_upload() {
            return None;
        }

        let entries: Vec<BatchEntry> = self
            .slots
            .values()
            .filter(|s| s.is_dispatchable())
            .filter_map(|s| {
                s.pending_file.clone().map(|file| BatchEntry {
                    supplier: s.supplier,
                    file,
                })
            })
            .collect();

        for entry in &entries {
            if let Err(e) = self.set_state(entry.supplier, SlotState::Uploading) {
                warn!("{}", e);
            }
        }
        self.batch_in_flight = true;
        info!(count = entries.len(), "Upload batch started");
        Some(UploadBatch { entries })
    }

    /// Applies a settled transfer to its slot.
    pub fn apply(&mut self, event: &SlotEvent) {
        let supplier = event.supplier;
        match &event.outcome {
            SlotOutcome::Uploaded => {
                if let Err(e) = self.set_state(supplier, SlotState::Uploaded) {
                    warn!("{}", e);
                    return;
                }
                self.slot_mut(supplier).clear_file();
                info!(supplier = %supplier, "Upload succeeded");
            }
            SlotOutcome::Failed(reason) => {
                if let Err(e) = self.set_state(supplier, SlotState::Failed) {
                    warn!("{}", e);
                    return;
                }
                warn!(supplier = %supplier, error = %reason, "Upload failed");
            }
        }
    }

    /// Lowers the batch flag once every transfer has settled.
    pub fn finish_batch(&mut self, report: &BatchReport) {
        self.batch_in_flight = false;
        info!(
            total = report.total(),
            uploaded = report.succeeded().len(),
            failed = report.failed().len(),
            "Upload batch settled"
        );
    }
}
