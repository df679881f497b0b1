use super::{BatchProgress, Notice, StockUploader};
use eframe::egui::{self, Align, Color32, RichText};
use stock_uploader::upload::{SlotState, UploadSlot};
use stock_uploader::utils::file_size::format_size;
use stock_uploader::Supplier;

const ACCENT: Color32 = Color32::from_rgb(161, 89, 225);
const SUCCESS: Color32 = Color32::from_rgb(0, 180, 0);
const FAILURE: Color32 = Color32::from_rgb(220, 50, 50);
const MUTED: Color32 = Color32::from_rgb(150, 150, 150);

enum SlotAction {
    Choose(Supplier),
    Remove(Supplier),
}

fn state_badge(state: SlotState) -> (&'static str, Color32) {
    match state {
        SlotState::NotUploaded => ("⏺ Not uploaded", MUTED),
        SlotState::Uploading => ("⏳ Uploading", ACCENT),
        SlotState::Uploaded => ("✅ Uploaded", SUCCESS),
        SlotState::Failed => ("❌ Failed", FAILURE),
    }
}

impl StockUploader {
    pub fn render(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let total_height = ui.available_height();
            let footer_height = 60.0;
            let content_height = total_height - footer_height;

            egui::ScrollArea::vertical()
                .max_height(content_height)
                .show(ui, |ui| {
                    ui.add_space(20.0);
                    ui.vertical_centered(|ui| {
                        ui.heading("Product Stock Updates");
                        ui.add_space(5.0);
                        ui.label(
                            RichText::new("Upload supplier stock files for processing")
                                .color(ui.visuals().text_color().gamma_multiply(0.7)),
                        );
                    });

                    ui.add_space(20.0);
                    self.render_slots(ui);
                    ui.add_space(20.0);
                    self.render_upload_controls(ui);
                    ui.add_space(20.0);
                    self.render_download(ui);
                    ui.add_space(20.0);
                });

            ui.with_layout(egui::Layout::bottom_up(Align::Center), |ui| {
                ui.add_space(10.0);
                self.render_footer(ui);
            });
        });
    }

    fn render_slots(&mut self, ui: &mut egui::Ui) {
        let snapshot = self.state.registry.snapshot();
        let inputs_enabled = !snapshot.batch_in_flight;
        let mut action = None;

        ui.group(|ui| {
            egui::Grid::new("supplier_slots")
                .num_columns(4)
                .spacing([16.0, 10.0])
                .striped(true)
                .show(ui, |ui| {
                    for slot in &snapshot.slots {
                        if let Some(a) = Self::render_slot_row(ui, slot, inputs_enabled) {
                            action = Some(a);
                        }
                        ui.end_row();
                    }
                });

            ui.add_space(8.0);
            ui.add_enabled_ui(inputs_enabled, |ui| {
                if ui.button("📂 Assign From Folder").clicked() {
                    self.assign_from_folder();
                }
            });
        });

        match action {
            Some(SlotAction::Choose(supplier)) => self.pick_file(supplier),
            Some(SlotAction::Remove(supplier)) => self.remove_file(supplier),
            None => {}
        }
    }

    fn render_slot_row(ui: &mut egui::Ui, slot: &UploadSlot, inputs_enabled: bool) -> Option<SlotAction> {
        let mut action = None;

        ui.vertical(|ui| {
            ui.strong(slot.supplier.as_str());
            if let Some(expected) = slot.supplier.expected_file() {
                ui.label(RichText::new(expected).small().weak());
            }
        });

        match (&slot.input_label, &slot.pending_file) {
            (Some(label), Some(file)) => {
                ui.label(format!("{} ({})", label, format_size(file.size())));
            }
            (Some(label), None) => {
                ui.label(label);
            }
            _ => {
                ui.label(RichText::new("No file selected").weak());
            }
        }

        let (text, color) = state_badge(slot.state);
        ui.colored_label(color, text);

        ui.horizontal(|ui| {
            let can_choose = inputs_enabled && slot.state == SlotState::NotUploaded;
            if ui
                .add_enabled(can_choose, egui::Button::new("📁 Choose"))
                .clicked()
            {
                action = Some(SlotAction::Choose(slot.supplier));
            }

            let can_remove = slot.input_label.is_some() || slot.state.is_terminal();
            if ui
                .add_enabled(can_remove, egui::Button::new("✖ Remove"))
                .clicked()
            {
                action = Some(SlotAction::Remove(slot.supplier));
            }
        });

        action
    }

    fn render_upload_controls(&mut self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            let in_flight = self.state.registry.batch_in_flight();
            let label = if in_flight {
                "⏳ Uploading..."
            } else {
                "📤 Upload Files"
            };
            let button = egui::Button::new(label).min_size(egui::vec2(200.0, 40.0));
            if ui
                .add_enabled(self.state.registry.can_upload(), button)
                .clicked()
            {
                self.start_upload();
            }
        });

        if matches!(self.state.progress, BatchProgress::NotStarted) {
            return;
        }

        ui.add_space(10.0);
        ui.group(|ui| {
            let progress_bar = egui::ProgressBar::new(self.state.get_progress_percentage())
                .show_percentage()
                .animate(self.state.registry.batch_in_flight())
                .fill(ACCENT);
            ui.add(progress_bar);
            ui.label(self.state.get_status_text());
        });

        if self.state.slot_errors.is_empty() {
            return;
        }

        ui.add_space(10.0);
        if ui
            .button(if self.state.show_details {
                "Hide Details"
            } else {
                "Show Details"
            })
            .clicked()
        {
            self.state.show_details = !self.state.show_details;
        }

        if self.state.show_details {
            egui::ScrollArea::vertical()
                .max_height(200.0)
                .show(ui, |ui| {
                    egui::Frame::none()
                        .fill(ui.style().visuals.extreme_bg_color)
                        .show(ui, |ui| {
                            ui.add_space(8.0);
                            for (supplier, reason) in &self.state.slot_errors {
                                ui.horizontal(|ui| {
                                    ui.label("❌");
                                    ui.colored_label(FAILURE, format!("{} - {}", supplier, reason));
                                });
                                ui.add_space(4.0);
                            }
                            ui.add_space(8.0);
                        });
                });
        }
    }

    fn render_download(&mut self, ui: &mut egui::Ui) {
        ui.group(|ui| {
            ui.label("Processed Booksite file");
            ui.add_space(5.0);
            ui.horizontal(|ui| {
                if self.download_in_flight() {
                    ui.add_enabled(false, egui::Button::new("Loading..."));
                    ui.spinner();
                } else if ui.button("⬇ Download").clicked() {
                    self.start_download();
                }
            });

            if let Some(saved) = &self.state.last_download {
                ui.add_space(5.0);
                ui.horizontal(|ui| {
                    ui.label(format!("Saved: {}", saved.path.display()));
                    if ui.link("Open folder").clicked() {
                        if let Some(parent) = saved.path.parent() {
                            if let Err(e) = open::that(parent) {
                                tracing::warn!(error = %e, "Failed to open download folder");
                            }
                        }
                    }
                });
            }
        });
    }

    fn render_footer(&self, ui: &mut egui::Ui) {
        for notice in self.state.notices.iter().rev().take(3) {
            ui.vertical_centered(|ui| match notice {
                Notice::Info(text) => {
                    ui.colored_label(SUCCESS, text);
                }
                Notice::Warning(text) => {
                    ui.colored_label(Color32::from_rgb(230, 160, 30), text);
                }
                Notice::Error(text) => {
                    ui.colored_label(FAILURE, text);
                }
            });
        }
        ui.add_space(5.0);
        ui.label(
            RichText::new(format!("API: {}", self.client.base_url()))
                .small()
                .color(MUTED),
        );
    }
}
