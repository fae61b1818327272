use eframe::egui::{Align2, Color32, RichText, Stroke, Ui};
use egui_plot::{
    Bar, BarChart, BoxElem, BoxPlot, BoxSpread, GridMark, Legend, Plot, PlotPoint, PlotUi, Points, Polygon, Text,
};

use crate::charts::{BoxStats, ChartData, ChartKind, StackSeries, Violin};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Chart plot (central panel)
// ---------------------------------------------------------------------------

/// Render the chart in the central panel.
pub fn chart_plot(ui: &mut Ui, state: &AppState) {
    let chart = match &state.chart {
        Some(chart) => chart,
        None => {
            ui.centered_and_justified(|ui: &mut Ui| {
                let hint = if state.table.is_some() {
                    "Pick the columns to plot in the side panel"
                } else {
                    "Open a table to plot it  (File → Open…)"
                };
                ui.heading(hint);
            });
            return;
        }
    };

    let spec = &state.spec;
    ui.vertical_centered(|ui: &mut Ui| {
        ui.heading(RichText::new(&spec.title).size(16.0));
    });

    let labels = chart.categories();
    let mut plot = Plot::new("chart_plot")
        .x_axis_label(spec.x_label.clone())
        .y_axis_label(spec.y_label.clone())
        .x_grid_spacer(egui_plot::uniform_grid_spacer(|_| [1.0, 5.0, 10.0]))
        .x_axis_formatter(move |mark: GridMark, _range| category_label(&labels, mark.value))
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true);
    if matches!(chart, ChartData::Stacked { .. }) {
        plot = plot.legend(Legend::default());
    }

    plot.show(ui, |plot_ui| match chart {
        ChartData::Boxes(boxes) => {
            let colors = state.colors(boxes.len());
            let stats = boxes.iter().map(|(label, stats)| (label.as_str(), stats));
            draw_boxes(plot_ui, stats, &colors, spec.width);
        }
        ChartData::Bars(bars) => {
            let colors = state.colors(bars.len());
            draw_bars(plot_ui, bars, &colors, spec.width);
        }
        ChartData::Stacked { series, .. } => {
            let colors = state.colors(series.len());
            let two_group = spec.kind == ChartKind::Stacked;
            draw_stack(plot_ui, series, &colors, spec.width, two_group);
        }
        ChartData::Violins(violins) => {
            let colors = state.colors(violins.len());
            if spec.violin_as_box {
                let stats = violins.iter().map(|v| (v.label.as_str(), &v.stats));
                draw_boxes(plot_ui, stats, &colors, spec.width);
            } else {
                draw_violins(plot_ui, violins, &colors);
            }
        }
    });
}

/// Tick label for whole-number positions inside the category range.
fn category_label(categories: &[String], value: f64) -> String {
    let index = value.round();
    if (value - index).abs() > 1e-6 || index < 0.0 {
        return String::new();
    }
    categories.get(index as usize).cloned().unwrap_or_default()
}

fn annotate(plot_ui: &mut PlotUi, x: f64, y: f64, text: String, color: Color32) {
    plot_ui.text(
        Text::new(PlotPoint::new(x, y), RichText::new(text).color(color))
            .anchor(Align2::CENTER_BOTTOM),
    );
}

fn draw_boxes<'a>(
    plot_ui: &mut PlotUi,
    boxes: impl Iterator<Item = (&'a str, &'a BoxStats)>,
    colors: &[Color32],
    width: f64,
) {
    let mut elems = Vec::new();
    let mut outliers = Vec::new();
    for (i, (label, stats)) in boxes.enumerate() {
        let x = i as f64;
        let color = colors.get(i).copied().unwrap_or(Color32::LIGHT_BLUE);
        let spread = BoxSpread::new(
            stats.lower_whisker,
            stats.q1,
            stats.median,
            stats.q3,
            stats.upper_whisker,
        );
        elems.push(
            BoxElem::new(x, spread)
                .name(label)
                .box_width(width)
                .whisker_width(width / 2.0)
                .fill(color.gamma_multiply(0.8))
                .stroke(Stroke::new(1.5, Color32::DARK_GRAY)),
        );
        outliers.extend(stats.outliers.iter().map(|&y| [x, y]));
    }
    plot_ui.box_plot(BoxPlot::new(elems));
    if !outliers.is_empty() {
        plot_ui.points(Points::new(outliers).radius(2.5).color(Color32::DARK_GRAY));
    }
}

fn draw_bars(plot_ui: &mut PlotUi, bars: &[(String, f64)], colors: &[Color32], width: f64) {
    let chart_bars: Vec<Bar> = bars
        .iter()
        .enumerate()
        .map(|(i, (label, value))| {
            Bar::new(i as f64, *value)
                .name(label)
                .width(width)
                .fill(colors.get(i).copied().unwrap_or(Color32::LIGHT_BLUE))
        })
        .collect();
    plot_ui.bar_chart(BarChart::new(chart_bars));

    for (i, (_, value)) in bars.iter().enumerate() {
        if value.is_finite() {
            annotate(plot_ui, i as f64, *value, format!("{value:.0}"), Color32::GRAY);
        }
    }
}

fn draw_stack(plot_ui: &mut PlotUi, series: &[StackSeries], colors: &[Color32], width: f64, annotated: bool) {
    for (s, stack) in series.iter().enumerate() {
        let color = colors.get(s).copied().unwrap_or(Color32::LIGHT_BLUE);
        let bars: Vec<Bar> = stack
            .values
            .iter()
            .zip(&stack.bottoms)
            .enumerate()
            .filter(|(_, (value, _))| value.is_finite())
            .map(|(i, (&value, &bottom))| Bar::new(i as f64, value).base_offset(bottom).width(width))
            .collect();
        plot_ui.bar_chart(BarChart::new(bars).name(&stack.name).color(color));

        if annotated {
            for (i, (value, bottom)) in stack.values.iter().zip(&stack.bottoms).enumerate() {
                if value.is_finite() {
                    annotate(plot_ui, i as f64, bottom + value, format!("{}", *value as i64), Color32::WHITE);
                }
            }
        }
    }
}

fn draw_violins(plot_ui: &mut PlotUi, violins: &[Violin], colors: &[Color32]) {
    for (i, violin) in violins.iter().enumerate() {
        let x = i as f64;
        let color = colors.get(i).copied().unwrap_or(Color32::LIGHT_BLUE);
        if let Some(shape) = &violin.shape {
            plot_ui.polygon(
                Polygon::new(shape.polygon())
                    .name(&violin.label)
                    .fill_color(color.gamma_multiply(0.7))
                    .stroke(Stroke::new(1.0, Color32::DARK_GRAY)),
            );
        }
        // Inner box: quartile bar and median dot.
        let stats = &violin.stats;
        plot_ui.line(
            egui_plot::Line::new(vec![[x, stats.lower_whisker], [x, stats.upper_whisker]])
                .color(Color32::DARK_GRAY)
                .width(1.0),
        );
        plot_ui.line(
            egui_plot::Line::new(vec![[x, stats.q1], [x, stats.q3]])
                .color(Color32::DARK_GRAY)
                .width(5.0),
        );
        plot_ui.points(Points::new(vec![[x, stats.median]]).radius(3.0).color(Color32::WHITE));
    }
}
