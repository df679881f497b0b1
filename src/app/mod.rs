mod state;
mod ui;

use state::{AppState, BatchProgress, Notice};

use eframe::{egui, App};
use rfd::FileDialog;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use stock_uploader::config::Settings;
use stock_uploader::download::{DirectorySink, DownloadNegotiator};
use stock_uploader::transfer::HttpTransferClient;
use stock_uploader::upload::folder::scan_folder;
use stock_uploader::upload::{
    BatchReport, Orchestrator, PendingFile, SlotEvent, SlotOutcome, UploadBatch,
};
use stock_uploader::Supplier;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{error, info, warn};

pub struct StockUploader {
    settings: Settings,
    state: AppState,
    client: HttpTransferClient,
    orchestrator: Arc<Orchestrator<HttpTransferClient>>,
    download_flag: Arc<AtomicBool>,
}

fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

impl StockUploader {
    pub fn new(_cc: &eframe::CreationContext<'_>, settings: Settings) -> Self {
        info!(api = %settings.api.base_url, "Initializing stock uploader");
        let client = HttpTransferClient::new(&settings.api.base_url, &settings.upload.endpoint);
        let orchestrator = Orchestrator::new(client.clone())
            .with_max_concurrent(settings.max_concurrent_uploads());
        Self {
            settings,
            state: AppState::default(),
            client,
            orchestrator: Arc::new(orchestrator),
            download_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn download_in_flight(&self) -> bool {
        self.state.download_pending() || self.download_flag.load(Ordering::SeqCst)
    }

    pub fn pick_file(&mut self, supplier: Supplier) {
        let mut dialog = FileDialog::new().set_title(format!("Select {} stock file", supplier));
        if let Some(name) = supplier.expected_file() {
            dialog = dialog.set_file_name(name);
        }
        let Some(paths) = dialog.pick_files() else {
            return;
        };

        let mut files = Vec::with_capacity(paths.len());
        for path in &paths {
            match PendingFile::from_path(path) {
                Ok(file) => files.push(file),
                Err(e) => {
                    let msg = format!("Failed to read {}: {}", path.display(), e);
                    error!("{}", msg);
                    self.state.push_notice(Notice::Error(msg));
                    return;
                }
            }
        }

        if let Err(e) = self.state.registry.select_files(supplier, files) {
            self.state.push_notice(Notice::Warning(e.to_string()));
        } else {
            self.state.slot_errors.remove(&supplier);
        }
    }

    pub fn remove_file(&mut self, supplier: Supplier) {
        self.state.clear_slot(supplier);
    }

    pub fn assign_from_folder(&mut self) {
        let Some(folder) = FileDialog::new().pick_folder() else {
            return;
        };

        let scan = match scan_folder(&folder) {
            Ok(scan) => scan,
            Err(e) => {
                error!(folder = %folder.display(), error = %e, "Folder scan failed");
                self.state.push_notice(Notice::Error(e.to_string()));
                return;
            }
        };

        if scan.matches.is_empty() {
            self.state.push_notice(Notice::Warning(format!(
                "No supplier files found in {}",
                folder.display()
            )));
            return;
        }

        let results = scan.assign(&mut self.state.registry);
        let assigned: Vec<String> = results
            .iter()
            .filter(|(_, r)| r.is_ok())
            .map(|(s, _)| s.to_string())
            .collect();
        for (_, result) in results {
            if let Err(e) = result {
                self.state.push_notice(Notice::Warning(e.to_string()));
            }
        }
        if !assigned.is_empty() {
            self.state.push_notice(Notice::Info(format!(
                "Assigned files for {}",
                assigned.join(", ")
            )));
        }
    }

    pub fn start_upload(&mut self) {
        let Some(batch) = self.state.registry.begin_batch() else {
            warn!("Upload requested with nothing to dispatch");
            return;
        };
        info!(suppliers = ?batch.suppliers(), "Starting upload");

        let (slot_sender, slot_receiver) = mpsc::unbounded_channel();
        let (report_sender, report_receiver) = std_mpsc::channel();
        self.state.slot_receiver = Some(slot_receiver);
        self.state.report_receiver = Some(report_receiver);
        self.state.begin_progress(batch.len());

        let orchestrator = Arc::clone(&self.orchestrator);
        std::thread::spawn(move || {
            let report = match runtime() {
                Ok(rt) => rt.block_on(orchestrator.dispatch(batch, slot_sender)),
                Err(e) => {
                    error!(error = %e, "Failed to start upload runtime");
                    fail_batch(batch, &slot_sender, &e.to_string())
                }
            };
            let _ = report_sender.send(report);
        });
    }

    pub fn start_download(&mut self) {
        let Some(sender) = self.state.begin_download() else {
            warn!("Download requested while one is already running");
            return;
        };

        let client = self.client.clone();
        let sink = DirectorySink::new(self.settings.download_dir());
        let flag = Arc::clone(&self.download_flag);
        let resource = self.settings.download.resource_path.clone();
        let fallback = self.settings.download.fallback_name.clone();

        std::thread::spawn(move || {
            let result = match runtime() {
                Ok(rt) => {
                    let negotiator = DownloadNegotiator::with_flag(client, sink, flag);
                    rt.block_on(negotiator.download_named(&resource, &fallback))
                        .map_err(|e| e.to_string())
                }
                Err(e) => Err(format!("Failed to start download runtime: {}", e)),
            };
            let _ = sender.send(result);
        });
    }

    pub fn update_state(&mut self, ctx: &egui::Context) {
        let mut had_updates = self.state.drain_slot_events();

        let report = self
            .state
            .report_receiver
            .as_ref()
            .and_then(|receiver| receiver.try_recv().ok());
        if let Some(report) = report {
            // Every slot event is sent before the report.
            self.state.drain_slot_events();
            self.state.complete_batch(&report);
            had_updates = true;
        }

        if let Some(result) = self.state.poll_download() {
            match result {
                Ok(saved) => {
                    self.state.push_notice(Notice::Info(format!(
                        "Saved {} to {}",
                        saved.name,
                        saved.path.display()
                    )));
                    self.state.last_download = Some(saved);
                }
                Err(e) => self
                    .state
                    .push_notice(Notice::Error(format!("Download failed: {}", e))),
            }
            had_updates = true;
        }

        if had_updates || self.state.registry.batch_in_flight() || self.download_in_flight() {
            ctx.request_repaint();
        }
    }
}

/// Settles every slot in `batch` as failed when no transfer could be started.
fn fail_batch(batch: UploadBatch, events: &UnboundedSender<SlotEvent>, reason: &str) -> BatchReport {
    let outcomes = batch
        .entries
        .into_iter()
        .map(|entry| {
            let event = SlotEvent {
                supplier: entry.supplier,
                outcome: SlotOutcome::Failed(reason.to_string()),
            };
            let _ = events.send(event.clone());
            event
        })
        .collect();
    BatchReport { outcomes }
}

impl App for StockUploader {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.update_state(ctx);
        self.render(ctx);
    }
}
