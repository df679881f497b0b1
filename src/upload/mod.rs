pub mod folder;
mod orchestrator;
mod registry;
mod types;

pub use orchestrator::Orchestrator;
pub use registry::{RegistrySnapshot, SlotRegistry, UploadSlot};
pub use types::{
    BatchEntry, BatchReport, InputError, PendingFile, SlotEvent, SlotOutcome, SlotState,
    TransitionError, UploadBatch,
};
