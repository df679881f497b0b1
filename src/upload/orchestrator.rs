//! Concurrent dispatch of an upload batch.
//!
//! Every slot in a batch gets its own transfer future. The futures are
//! multiplexed on the calling task and joined before the batch report is
//! produced, so the busy flag is only lowered once every transfer has
//! settled. A failed transfer is recorded against its own slot and never
//! cancels its siblings.

use super::registry::SlotRegistry;
use super::types::{BatchEntry, BatchReport, SlotEvent, SlotOutcome, UploadBatch};
use crate::transfer::TransferClient;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, error, info};

pub struct Orchestrator<C> {
    client: C,
    max_concurrent: Option<usize>,
}

impl<C: TransferClient> Orchestrator<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            max_concurrent: None,
        }
    }

    /// Caps the number of transfers in flight at once. `None` or `Some(0)`
    /// dispatches the whole batch at once.
    pub fn with_max_concurrent(mut self, limit: Option<usize>) -> Self {
        self.max_concurrent = limit.filter(|l| *l > 0);
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    async fn transfer(&self, entry: BatchEntry, events: &UnboundedSender<SlotEvent>) -> SlotEvent {
        let supplier = entry.supplier;
        debug!(supplier = %supplier, file = %entry.file.name, "Transfer started");

        let outcome = match self.client.upload(supplier, &entry.file).await {
            Ok(()) => SlotOutcome::Uploaded,
            Err(e) => {
                error!(supplier = %supplier, file = %entry.file.name, error = %e, "Transfer failed");
                SlotOutcome::Failed(e.to_string())
            }
        };

        let event = SlotEvent { supplier, outcome };
        if events.send(event.clone()).is_err() {
            debug!(supplier = %supplier, "Event receiver dropped");
        }
        event
    }

    /// Runs every transfer in `batch` and waits for all of them to settle.
    ///
    /// Each settlement is sent on `events` as soon as it happens; the returned
    /// report lists the outcomes in batch order.
    pub async fn dispatch(&self, batch: UploadBatch, events: UnboundedSender<SlotEvent>) -> BatchReport {
        info!(count = batch.len(), limit = ?self.max_concurrent, "Dispatching upload batch");
        let transfers = batch
            .entries
            .into_iter()
            .map(|entry| self.transfer(entry, &events));

        let outcomes: Vec<SlotEvent> = match self.max_concurrent {
            Some(limit) => stream::iter(transfers).buffered(limit).collect().await,
            None => join_all(transfers).await,
        };
        BatchReport { outcomes }
    }

    /// Uploads every dispatchable slot in `registry`, applying each outcome as
    /// it arrives and clearing the batch flag after the join.
    ///
    /// Returns `None` when there is nothing to upload or a batch is already
    /// running.
    pub async fn upload_pending(&self, registry: &mut SlotRegistry) -> Option<BatchReport> {
        let batch = registry.begin_batch()?;
        let (sender, mut receiver) = mpsc::unbounded_channel();

        let apply = async {
            while let Some(event) = receiver.recv().await {
                registry.apply(&event);
            }
        };
        let (report, ()) = tokio::join!(self.dispatch(batch, sender), apply);

        registry.finish_batch(&report);
        Some(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supplier::Supplier;
    use crate::transfer::{NamedBlob, TransferError};
    use crate::upload::{PendingFile, SlotState};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct ScriptedClient {
        failures: Vec<Supplier>,
        delays: HashMap<Supplier, Duration>,
        calls: Mutex<Vec<Supplier>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ScriptedClient {
        fn failing(failures: &[Supplier]) -> Self {
            Self {
                failures: failures.to_vec(),
                ..Default::default()
            }
        }

        fn with_delay(mut self, supplier: Supplier, millis: u64) -> Self {
            self.delays.insert(supplier, Duration::from_millis(millis));
            self
        }
    }

    impl TransferClient for ScriptedClient {
        async fn upload(&self, supplier: Supplier, _file: &PendingFile) -> Result<(), TransferError> {
            self.calls.lock().unwrap().push(supplier);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let delay = self
                .delays
                .get(&supplier)
                .copied()
                .unwrap_or(Duration::from_millis(10));
            tokio::time::sleep(delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failures.contains(&supplier) {
                Err(TransferError::Status {
                    url: "http://localhost:5000/api/file-upload".to_string(),
                    status: 500,
                    message: "Internal Server Error".to_string(),
                })
            } else {
                Ok(())
            }
        }

        async fn download(&self, resource_path: &str) -> Result<NamedBlob, TransferError> {
            Err(TransferError::MalformedResponse {
                url: resource_path.to_string(),
                reason: "not scripted".to_string(),
            })
        }
    }

    fn registry_with(suppliers: &[Supplier]) -> SlotRegistry {
        let mut registry = SlotRegistry::new();
        for supplier in suppliers {
            let name = format!("{}.csv", supplier);
            registry
                .select_file(*supplier, PendingFile::new(name, b"rows".to_vec()))
                .unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn test_all_uploads_succeed() {
        let suppliers = [Supplier::Rectron, Supplier::Syntech, Supplier::Lookup];
        let mut registry = registry_with(&suppliers);
        let orchestrator = Orchestrator::new(ScriptedClient::default());

        let report = orchestrator.upload_pending(&mut registry).await.unwrap();

        assert_eq!(report.total(), 3);
        assert!(report.failed().is_empty());
        for supplier in suppliers {
            assert_eq!(registry.state(supplier), SlotState::Uploaded);
            assert!(registry.slot(supplier).pending_file.is_none());
        }
        assert!(!registry.batch_in_flight());
        assert!(!registry.any_pending_file());
    }

    #[tokio::test]
    async fn test_partial_failure_settles_every_slot() {
        crate::logging::init_test_tracing();
        let suppliers = [
            Supplier::Rectron,
            Supplier::Gammatek,
            Supplier::Booksite,
            Supplier::Brickup,
        ];
        let mut registry = registry_with(&suppliers);
        let client = ScriptedClient::failing(&[Supplier::Gammatek, Supplier::Brickup])
            .with_delay(Supplier::Gammatek, 1)
            .with_delay(Supplier::Rectron, 40);
        let orchestrator = Orchestrator::new(client);

        let report = orchestrator.upload_pending(&mut registry).await.unwrap();

        assert_eq!(report.failed(), vec![Supplier::Gammatek, Supplier::Brickup]);
        assert_eq!(report.succeeded(), vec![Supplier::Rectron, Supplier::Booksite]);
        assert_eq!(registry.state(Supplier::Gammatek), SlotState::Failed);
        assert_eq!(registry.state(Supplier::Brickup), SlotState::Failed);
        assert_eq!(registry.state(Supplier::Rectron), SlotState::Uploaded);
        assert_eq!(registry.state(Supplier::Booksite), SlotState::Uploaded);
        assert!(!registry.batch_in_flight());
        assert_eq!(orchestrator.client().calls.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_apex_succeeds_solarpop_returns_500() {
        let mut registry = registry_with(&[Supplier::Apex, Supplier::Solarpop]);
        let orchestrator = Orchestrator::new(ScriptedClient::failing(&[Supplier::Solarpop]));

        orchestrator.upload_pending(&mut registry).await.unwrap();

        let apex = registry.slot(Supplier::Apex);
        assert_eq!(apex.state, SlotState::Uploaded);
        assert!(apex.pending_file.is_none());

        let solarpop = registry.slot(Supplier::Solarpop);
        assert_eq!(solarpop.state, SlotState::Failed);
        assert!(solarpop.pending_file.is_some());
        assert_eq!(solarpop.input_label.as_deref(), Some("Solarpop.csv"));

        assert!(!registry.batch_in_flight());
        registry
            .select_file(Supplier::Syntech, PendingFile::new("s.csv", b"x".to_vec()))
            .unwrap();
        assert!(registry.can_upload());
    }

    #[tokio::test]
    async fn test_transfers_run_concurrently() {
        let suppliers = [Supplier::Apex, Supplier::Brickup, Supplier::Lookup];
        let mut registry = registry_with(&suppliers);
        let client = ScriptedClient::default()
            .with_delay(Supplier::Apex, 30)
            .with_delay(Supplier::Brickup, 30)
            .with_delay(Supplier::Lookup, 30);
        let orchestrator = Orchestrator::new(client);

        orchestrator.upload_pending(&mut registry).await.unwrap();
        assert_eq!(orchestrator.client().peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_concurrency_cap_is_respected() {
        let suppliers = [Supplier::Apex, Supplier::Brickup, Supplier::Lookup];
        let mut registry = registry_with(&suppliers);
        let orchestrator =
            Orchestrator::new(ScriptedClient::failing(&[Supplier::Brickup])).with_max_concurrent(Some(1));

        let report = orchestrator.upload_pending(&mut registry).await.unwrap();

        assert_eq!(orchestrator.client().peak.load(Ordering::SeqCst), 1);
        assert_eq!(report.failed(), vec![Supplier::Brickup]);
        assert_eq!(registry.state(Supplier::Lookup), SlotState::Uploaded);
    }

    #[tokio::test]
    async fn test_events_arrive_as_transfers_settle() {
        let mut registry = registry_with(&[Supplier::Solarpop, Supplier::Apex]);
        let client = ScriptedClient::default()
            .with_delay(Supplier::Solarpop, 60)
            .with_delay(Supplier::Apex, 1);
        let orchestrator = Orchestrator::new(client);

        let batch = registry.begin_batch().unwrap();
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let report = orchestrator.dispatch(batch, sender).await;

        let mut settled = Vec::new();
        while let Some(event) = receiver.recv().await {
            settled.push(event.supplier);
        }
        assert_eq!(settled, vec![Supplier::Apex, Supplier::Solarpop]);
        assert_eq!(
            report.succeeded(),
            vec![Supplier::Solarpop, Supplier::Apex]
        );
    }

    #[tokio::test]
    async fn test_nothing_pending_dispatches_nothing() {
        let mut registry = SlotRegistry::new();
        let orchestrator = Orchestrator::new(ScriptedClient::default());

        assert!(orchestrator.upload_pending(&mut registry).await.is_none());
        assert!(orchestrator.client().calls.lock().unwrap().is_empty());
        assert!(!registry.batch_in_flight());
    }
}
