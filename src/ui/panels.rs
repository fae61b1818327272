use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::{Column, TableBuilder};

use crate::charts::{CHART_KINDS, ChartKind};
use crate::color::PALETTES;
use crate::state::AppState;

/// Rows shown in the data preview.
const PREVIEW_ROWS: usize = 500;

// ---------------------------------------------------------------------------
// Left side panel – chart settings
// ---------------------------------------------------------------------------

/// Column picker bound to one of the chart's optional columns.
fn column_combo(ui: &mut Ui, id: &str, label: &str, columns: &[String], current: &mut Option<String>) -> bool {
    let mut changed = false;
    ui.strong(label);
    egui::ComboBox::from_id_salt(id)
        .selected_text(current.as_deref().unwrap_or("(none)"))
        .show_ui(ui, |ui: &mut Ui| {
            if ui.selectable_label(current.is_none(), "(none)").clicked() {
                *current = None;
                changed = true;
            }
            for col in columns {
                if ui
                    .selectable_label(current.as_deref() == Some(col.as_str()), col)
                    .clicked()
                {
                    *current = Some(col.clone());
                    changed = true;
                }
            }
        });
    changed
}

/// Render the left settings panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Chart");
    ui.separator();

    if state.table.is_none() {
        ui.label("No table loaded.");
        return;
    }
    let columns = state.columns();
    let mut changed = false;

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- Chart kind ----
            ui.strong("Kind");
            let current_kind = state.spec.kind;
            egui::ComboBox::from_id_salt("chart_kind")
                .selected_text(current_kind.name())
                .show_ui(ui, |ui: &mut Ui| {
                    for kind in CHART_KINDS {
                        if ui.selectable_label(current_kind == kind, kind.name()).clicked() {
                            state.spec.kind = kind;
                            changed = true;
                        }
                    }
                });
            ui.separator();

            // ---- Columns ----
            let spec = &mut state.spec;
            let x_label = if spec.kind == ChartKind::StackedMulti { "Category" } else { "X" };
            changed |= column_combo(ui, "x_column", x_label, &columns, &mut spec.x);
            if !matches!(spec.kind, ChartKind::Box | ChartKind::StackedMulti) {
                changed |= column_combo(ui, "y_column", "Y", &columns, &mut spec.y);
            }
            if spec.kind == ChartKind::Stacked {
                changed |= column_combo(ui, "y2_column", "Y (stacked)", &columns, &mut spec.y2);
            }
            if spec.kind == ChartKind::Violin {
                changed |= ui.checkbox(&mut spec.violin_as_box, "Draw as boxes").changed();
            }
            ui.separator();

            // ---- Appearance ----
            ui.strong("Palette");
            egui::ComboBox::from_id_salt("palette")
                .selected_text(spec.palette.name())
                .show_ui(ui, |ui: &mut Ui| {
                    for palette in PALETTES {
                        ui.selectable_value(&mut spec.palette, palette, palette.name());
                    }
                });
            changed |= ui.add(egui::Slider::new(&mut spec.width, 0.1..=1.0).text("Width")).changed();
            ui.strong("Title");
            ui.text_edit_singleline(&mut spec.title);
            ui.strong("X label");
            ui.text_edit_singleline(&mut spec.x_label);
            ui.strong("Y label");
            ui.text_edit_singleline(&mut spec.y_label);

            if spec.kind == ChartKind::StackedMulti {
                if let Some(title) = &spec.legend_title {
                    ui.separator();
                    ui.label(RichText::new(format!("Legend: {title}")).italics());
                }
            }
        });

    if changed {
        state.rebuild_chart();
    }
}

// ---------------------------------------------------------------------------
// Bottom panel – data preview
// ---------------------------------------------------------------------------

/// Collapsible table of the loaded rows.
pub fn data_preview(ui: &mut Ui, state: &mut AppState) {
    let Some(table) = &state.table else {
        ui.label("No table loaded.");
        return;
    };

    let header = format!("Data preview  ({} rows × {} columns)", table.len(), table.columns.len());
    let response = egui::CollapsingHeader::new(RichText::new(header).strong())
        .id_salt("data_preview")
        .open(Some(state.show_preview))
        .show(ui, |ui: &mut Ui| {
            let shown = table.len().min(PREVIEW_ROWS);
            ScrollArea::horizontal().show(ui, |ui: &mut Ui| {
                TableBuilder::new(ui)
                    .striped(true)
                    .resizable(true)
                    .max_scroll_height(240.0)
                    .columns(Column::auto().at_least(60.0), table.columns.len())
                    .header(20.0, |mut header| {
                        for column in &table.columns {
                            header.col(|ui: &mut Ui| {
                                ui.strong(column);
                            });
                        }
                    })
                    .body(|body| {
                        body.rows(18.0, shown, |mut row| {
                            let cells = &table.rows[row.index()];
                            for cell in cells {
                                row.col(|ui: &mut Ui| {
                                    ui.label(cell.to_string());
                                });
                            }
                        });
                    });
            });
            if table.len() > shown {
                ui.label(format!("… {} more rows", table.len() - shown));
            }
        });

    if response.header_response.clicked() {
        state.show_preview = !state.show_preview;
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
        });

        ui.separator();

        if let (Some(table), Some(source)) = (&state.table, &state.source) {
            ui.label(format!(
                "{}: {} rows, {} chart",
                source.display(),
                table.len(),
                state.spec.kind
            ));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open table")
        .add_filter("Supported files", &["csv", "tsv", "json", "parquet", "pq", "xlsx", "xls"])
        .add_filter("CSV / TSV", &["csv", "tsv"])
        .add_filter("JSON", &["json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .add_filter("Excel", &["xlsx", "xls"])
        .pick_file();

    if let Some(path) = file {
        match crate::data::loader::load_table(&path) {
            Ok(table) => {
                log::info!("Loaded {} rows with columns {:?}", table.len(), table.columns);
                state.set_table(table, &path);
            }
            Err(e) => {
                log::error!("Failed to load file: {e:#}");
                state.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }
}
