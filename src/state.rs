use std::path::{Path, PathBuf};

use eframe::egui::Color32;

use crate::charts::{ChartData, ChartKind, ChartSpec};
use crate::color::parse_color;
use crate::data::model::Table;

// ---------------------------------------------------------------------------
// Viewer state
// ---------------------------------------------------------------------------

/// The full viewer state, independent of rendering.
#[derive(Default)]
pub struct AppState {
    /// Loaded table (None until a file is opened).
    pub table: Option<Table>,

    /// Where the table came from.
    pub source: Option<PathBuf>,

    /// Chart settings; editable from the side panel.
    pub spec: ChartSpec,

    /// Geometry computed from `table` and `spec`.
    pub chart: Option<ChartData>,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,

    /// Whether the data preview is expanded.
    pub show_preview: bool,

    /// Write a screenshot here once the chart has rendered, then exit.
    pub save_path: Option<PathBuf>,
}

impl AppState {
    pub fn new(spec: ChartSpec) -> Self {
        Self {
            spec,
            ..Self::default()
        }
    }

    /// Ingest a newly loaded table and recompute the chart.
    pub fn set_table(&mut self, table: Table, source: &Path) {
        self.table = Some(table);
        self.source = Some(source.to_path_buf());
        self.rebuild_chart();
    }

    /// Recompute `chart` after a table or settings change.
    pub fn rebuild_chart(&mut self) {
        let Some(table) = &self.table else {
            self.chart = None;
            return;
        };
        match self.spec.build(table) {
            Ok(chart) => {
                self.chart = Some(chart);
                self.status_message = None;
            }
            Err(e) => {
                log::error!("Cannot draw {} chart: {e:#}", self.spec.kind);
                self.chart = None;
                self.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }

    /// Colours for `n` categories or series. Explicit colours win for the
    /// two-group chart; anything they leave out comes from the palette.
    pub fn colors(&self, n: usize) -> Vec<Color32> {
        let mut colors = self.spec.palette.colors(n);
        if self.spec.kind == ChartKind::Stacked {
            for (slot, text) in colors.iter_mut().zip(&self.spec.colors) {
                match parse_color(text) {
                    Some(color) => *slot = color,
                    None => log::warn!("Unknown colour '{text}', using the palette"),
                }
            }
        }
        colors
    }

    pub fn columns(&self) -> Vec<String> {
        self.table.as_ref().map(|t| t.columns.clone()).unwrap_or_default()
    }
}
