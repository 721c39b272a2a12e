use crate::command::Command;
use crate::model::ModelChoice;
use crate::scheduler;
use crate::session::{Session, SessionStatus};
use crate::source::FrameSource;
use crate::surface::Surface;
use eframe::egui;
use std::collections::VecDeque;
use std::time::Instant;

/// Collects button presses and the latest frame between egui updates.
#[derive(Default)]
struct EguiSurface {
    commands: VecDeque<Command>,
    // Frame waiting to be uploaded as a texture.
    pending: Option<egui::ColorImage>,
    cleared: bool,
}

impl Surface for EguiSurface {
    fn render(&mut self, bitmap: image::RgbImage) {
        let size = [bitmap.width() as usize, bitmap.height() as usize];
        self.pending = Some(egui::ColorImage::from_rgb(size, bitmap.as_raw()));
    }

    fn clear(&mut self) {
        self.pending = None;
        self.cleared = true;
    }

    fn next_command(&mut self) -> Option<Command> {
        self.commands.pop_front()
    }
}

pub struct DetectionApp {
    session: Session,
    surface: EguiSurface,
    // Model selected in the dropdown.
    model_choice: ModelChoice,
    // Texture to display on the screen.
    texture: Option<egui::TextureHandle>,
}

impl DetectionApp {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            surface: EguiSurface::default(),
            model_choice: ModelChoice::default(),
            texture: None,
        }
    }

    fn upload_frame(&mut self, ctx: &egui::Context) {
        if std::mem::take(&mut self.surface.cleared) {
            self.texture = None;
        }
        if let Some(color_image) = self.surface.pending.take() {
            match &mut self.texture {
                Some(texture) => texture.set(color_image, egui::TextureOptions::LINEAR),
                None => {
                    self.texture = Some(ctx.load_texture(
                        "video_frame",
                        color_image,
                        egui::TextureOptions::LINEAR,
                    ));
                }
            }
        }
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        egui::ComboBox::from_label("Model")
            .selected_text(self.model_choice.label())
            .show_ui(ui, |ui| {
                for choice in ModelChoice::ALL {
                    ui.selectable_value(&mut self.model_choice, choice, choice.label());
                }
            });

        ui.horizontal(|ui| {
            if ui.button("Load Video").clicked() {
                if let Some(path) = rfd::FileDialog::new()
                    .set_title("Select Video File")
                    .add_filter("Video Files", &["mp4", "avi"])
                    .pick_file()
                {
                    self.surface.commands.push_back(Command::SelectSource(path));
                }
            }
            if ui.button("Start Stream").clicked() {
                self.surface.commands.push_back(Command::SelectStream);
            }
            if ui.button("Start Detection").clicked() {
                self.surface
                    .commands
                    .push_back(Command::Start(self.model_choice));
            }
            if ui.button("Stop Detection").clicked() {
                self.surface.commands.push_back(Command::Stop);
            }
        });
    }

    fn status_line(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let active = self
                .session
                .is_running()
                .then(|| self.session.active_source())
                .flatten();
            ui.label(source_caption(active, self.session.source()));
            ui.separator();
            match self.session.status() {
                SessionStatus::Idle => {
                    ui.label("Idle");
                }
                SessionStatus::Running => {
                    ui.label(format!("Running, {} frames", self.session.frames_rendered()));
                }
                SessionStatus::Finished => {
                    ui.label(format!(
                        "Finished after {} frames",
                        self.session.frames_rendered()
                    ));
                }
                SessionStatus::Failed(msg) => {
                    ui.colored_label(egui::Color32::RED, msg);
                }
            }
        });
    }
}

/// Names the source being played, or the one the next run would open.
fn source_caption(active: Option<&FrameSource>, selected: Option<&FrameSource>) -> String {
    match (active, selected) {
        (Some(playing), Some(next)) if playing != next => {
            format!("Playing: {playing} (next: {next})")
        }
        (Some(playing), _) => format!("Playing: {playing}"),
        (None, Some(next)) => format!("Source: {next}"),
        (None, None) => "Source: none".to_string(),
    }
}

impl eframe::App for DetectionApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Handle queued button presses and a due tick before drawing.
        let next_tick = scheduler::pump(&mut self.session, &mut self.surface, Instant::now());
        self.upload_frame(ctx);

        egui::TopBottomPanel::bottom("controls").show(ctx, |ui| {
            ui.add_space(4.0);
            self.controls(ui);
            ui.separator();
            self.status_line(ui);
            ui.add_space(4.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| match &self.texture {
            Some(texture) => {
                ui.centered_and_justified(|ui| {
                    ui.add(
                        egui::Image::new((texture.id(), texture.size_vec2())).shrink_to_fit(),
                    );
                });
            }
            None => {
                ui.centered_and_justified(|ui| {
                    ui.label("Output");
                });
            }
        });

        if !self.surface.commands.is_empty() {
            ctx.request_repaint();
        } else if let Some(wait) = next_tick {
            ctx.request_repaint_after(wait);
        }
    }
}
