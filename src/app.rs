use std::path::Path;

use eframe::egui;

use crate::state::AppState;
use crate::ui::{panels, plot};

/// Frames to draw before a `--save` screenshot, so layout has settled.
const FRAMES_BEFORE_SCREENSHOT: u32 = 3;

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct ChartViewerApp {
    pub state: AppState,
    frames: u32,
    screenshot_requested: bool,
}

impl ChartViewerApp {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            frames: 0,
            screenshot_requested: false,
        }
    }

    /// Ask for a screenshot after the first frames; save it when it arrives.
    fn handle_screenshot(&mut self, ctx: &egui::Context) {
        let Some(path) = self.state.save_path.clone() else {
            return;
        };
        self.frames += 1;
        if !self.screenshot_requested {
            if self.frames >= FRAMES_BEFORE_SCREENSHOT {
                ctx.send_viewport_cmd(egui::ViewportCommand::Screenshot(Default::default()));
                self.screenshot_requested = true;
            }
            ctx.request_repaint();
            return;
        }

        let image = ctx.input(|i| {
            i.raw.events.iter().find_map(|event| match event {
                egui::Event::Screenshot { image, .. } => Some(image.clone()),
                _ => None,
            })
        });
        match image {
            Some(image) => {
                match save_png(&path, &image) {
                    Ok(()) => log::info!("Chart saved to {}", path.display()),
                    Err(e) => log::error!("Failed to save {}: {e:#}", path.display()),
                }
                self.state.save_path = None;
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
            None => ctx.request_repaint(),
        }
    }
}

fn save_png(path: &Path, image: &egui::ColorImage) -> anyhow::Result<()> {
    let [width, height] = image.size;
    image::save_buffer(
        path,
        image.as_raw(),
        width as u32,
        height as u32,
        image::ExtendedColorType::Rgba8,
    )?;
    Ok(())
}

impl eframe::App for ChartViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: chart settings ----
        egui::SidePanel::left("settings_panel")
            .default_width(220.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Bottom panel: data preview ----
        egui::TopBottomPanel::bottom("preview_panel")
            .resizable(true)
            .show(ctx, |ui| {
                panels::data_preview(ui, &mut self.state);
            });

        // ---- Central panel: chart ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::chart_plot(ui, &self.state);
        });

        self.handle_screenshot(ctx);
    }
}
