use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};

use crate::color::Palette;
use crate::data::model::Table;

/// Columns of a summary-statistics table drawn as one box per row.
pub const SUMMARY_COLUMNS: [&str; 3] = ["Min", "Median", "Max"];

/// KDE grid resolution per violin.
const VIOLIN_POINTS: usize = 100;

/// The violin density extends this many bandwidths past the data.
const VIOLIN_CUT: f64 = 2.0;

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Quantile of sorted data with linear interpolation between ranks.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (pos - lower as f64)
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub lower_whisker: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

/// Quartiles with whiskers at the most extreme points within 1.5 × IQR.
/// NaN values are ignored; `None` when nothing is left.
pub fn box_stats(values: &[f64]) -> Option<BoxStats> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let q1 = quantile(&sorted, 0.25);
    let median = quantile(&sorted, 0.5);
    let q3 = quantile(&sorted, 0.75);
    let reach = 1.5 * (q3 - q1);
    let (low, high) = (q1 - reach, q3 + reach);

    let inside = || sorted.iter().copied().filter(|v| (low..=high).contains(v));
    Some(BoxStats {
        lower_whisker: inside().fold(f64::INFINITY, f64::min),
        q1,
        median,
        q3,
        upper_whisker: inside().fold(f64::NEG_INFINITY, f64::max),
        outliers: sorted.iter().copied().filter(|v| !(low..=high).contains(v)).collect(),
    })
}

fn sample_std(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
}

/// Scott's rule: `σ · n^(-1/5)`. `None` for fewer than two points or no spread.
pub fn scott_bandwidth(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let bandwidth = sample_std(values) * (values.len() as f64).powf(-0.2);
    (bandwidth.is_finite() && bandwidth > 0.0).then_some(bandwidth)
}

/// Gaussian kernel density of `values` evaluated at every point of `grid`.
pub fn gaussian_kde(values: &[f64], bandwidth: f64, grid: &[f64]) -> Vec<f64> {
    let norm = values.len() as f64 * bandwidth * (2.0 * std::f64::consts::PI).sqrt();
    grid.iter()
        .map(|&x| {
            values
                .iter()
                .map(|&v| (-0.5 * ((x - v) / bandwidth).powi(2)).exp())
                .sum::<f64>()
                / norm
        })
        .collect()
}

/// One violin: half widths along y around a category position.
#[derive(Debug, Clone, PartialEq)]
pub struct ViolinShape {
    pub center: f64,
    /// `(y, half width)` pairs in increasing y.
    pub outline: Vec<(f64, f64)>,
}

impl ViolinShape {
    /// Closed outline: up the right side, down the left.
    pub fn polygon(&self) -> Vec<[f64; 2]> {
        let right = self.outline.iter().map(|&(y, w)| [self.center + w, y]);
        let left = self.outline.iter().rev().map(|&(y, w)| [self.center - w, y]);
        right.chain(left).collect()
    }
}

/// KDE outline scaled so the widest point spans `width`.
pub fn violin_outline(values: &[f64], center: f64, width: f64) -> Option<ViolinShape> {
    let values: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let bandwidth = scott_bandwidth(&values)?;
    let min = values.iter().copied().fold(f64::INFINITY, f64::min) - VIOLIN_CUT * bandwidth;
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max) + VIOLIN_CUT * bandwidth;
    let step = (max - min) / (VIOLIN_POINTS - 1) as f64;
    let grid: Vec<f64> = (0..VIOLIN_POINTS).map(|i| min + i as f64 * step).collect();

    let density = gaussian_kde(&values, bandwidth, &grid);
    let peak = density.iter().copied().fold(0.0, f64::max);
    if peak <= 0.0 {
        return None;
    }
    let scale = width / 2.0 / peak;
    Some(ViolinShape {
        center,
        outline: grid.into_iter().zip(density).map(|(y, d)| (y, d * scale)).collect(),
    })
}

/// Bottom of every bar when `series` are stacked in order. NaN counts as 0.
pub fn stack_offsets(series: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let len = series.iter().map(Vec::len).max().unwrap_or(0);
    let mut running = vec![0.0; len];
    series
        .iter()
        .map(|values| {
            let bottoms = running.clone();
            for (total, v) in running.iter_mut().zip(values) {
                if !v.is_nan() {
                    *total += v;
                }
            }
            bottoms
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Chart description
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChartKind {
    /// One box per x group built from the Min/Median/Max columns.
    #[default]
    Box,
    /// One annotated bar per row.
    Bar,
    /// Two series, the second on top of the first.
    Stacked,
    /// Every numeric column stacked per category.
    StackedMulti,
    /// Raw y values per x group.
    Violin,
}

pub const CHART_KINDS: [ChartKind; 5] = [
    ChartKind::Box,
    ChartKind::Bar,
    ChartKind::Stacked,
    ChartKind::StackedMulti,
    ChartKind::Violin,
];

impl ChartKind {
    pub fn name(self) -> &'static str {
        match self {
            ChartKind::Box => "box",
            ChartKind::Bar => "bar",
            ChartKind::Stacked => "stacked",
            ChartKind::StackedMulti => "stacked-multi",
            ChartKind::Violin => "violin",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChartKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CHART_KINDS
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| format!("unknown chart kind '{s}'"))
    }
}

/// What to draw and how to label it.
#[derive(Debug, Clone)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub x: Option<String>,
    pub y: Option<String>,
    /// Second series of a two-group stacked chart.
    pub y2: Option<String>,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub legend_title: Option<String>,
    /// Box, bar or violin width in category units.
    pub width: f64,
    pub palette: Palette,
    /// Explicit series colours for the two-group chart.
    pub colors: Vec<String>,
    /// Series names for the two-group chart.
    pub labels: Vec<String>,
    /// Draw violin data as boxes.
    pub violin_as_box: bool,
}

impl Default for ChartSpec {
    fn default() -> Self {
        Self {
            kind: ChartKind::default(),
            x: None,
            y: None,
            y2: None,
            title: "Distribution Plot".to_string(),
            x_label: String::new(),
            y_label: String::new(),
            legend_title: None,
            width: 0.8,
            palette: Palette::default(),
            colors: Vec::new(),
            labels: Vec::new(),
            violin_as_box: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StackSeries {
    pub name: String,
    pub values: Vec<f64>,
    pub bottoms: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Violin {
    pub label: String,
    pub stats: BoxStats,
    /// `None` when the group has too little spread for a density.
    pub shape: Option<ViolinShape>,
}

/// Chart geometry, one entry per category in x order.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartData {
    Boxes(Vec<(String, BoxStats)>),
    Bars(Vec<(String, f64)>),
    Stacked {
        categories: Vec<String>,
        series: Vec<StackSeries>,
    },
    Violins(Vec<Violin>),
}

impl ChartData {
    pub fn categories(&self) -> Vec<String> {
        match self {
            ChartData::Boxes(boxes) => boxes.iter().map(|(label, _)| label.clone()).collect(),
            ChartData::Bars(bars) => bars.iter().map(|(label, _)| label.clone()).collect(),
            ChartData::Stacked { categories, .. } => categories.clone(),
            ChartData::Violins(violins) => violins.iter().map(|v| v.label.clone()).collect(),
        }
    }
}

impl ChartSpec {
    fn required<'a>(&'a self, column: &'a Option<String>, flag: &str) -> Result<&'a str> {
        column
            .as_deref()
            .with_context(|| format!("a {} chart needs --{flag}", self.kind))
    }

    /// Compute the chart geometry from `table`.
    pub fn build(&self, table: &Table) -> Result<ChartData> {
        match self.kind {
            ChartKind::Box => self.build_boxes(table),
            ChartKind::Bar => {
                let labels = table.text_column(self.required(&self.x, "x")?)?;
                let values = table.numeric_column(self.required(&self.y, "y")?)?;
                Ok(ChartData::Bars(labels.into_iter().zip(values).collect()))
            }
            ChartKind::Stacked => self.build_stacked(table),
            ChartKind::StackedMulti => self.build_stacked_multi(table),
            ChartKind::Violin => self.build_violins(table),
        }
    }

    fn build_boxes(&self, table: &Table) -> Result<ChartData> {
        let x = self.required(&self.x, "x")?;
        let summary = SUMMARY_COLUMNS
            .iter()
            .map(|c| table.numeric_column(c))
            .collect::<Result<Vec<_>>>()?;

        let mut boxes = Vec::new();
        for (label, rows) in table.group_rows(x)? {
            let values: Vec<f64> = rows
                .iter()
                .flat_map(|&r| summary.iter().map(move |column| column[r]))
                .collect();
            if let Some(stats) = box_stats(&values) {
                boxes.push((label, stats));
            }
        }
        Ok(ChartData::Boxes(boxes))
    }

    fn build_stacked(&self, table: &Table) -> Result<ChartData> {
        let categories = table.text_column(self.required(&self.x, "x")?)?;
        let columns = [self.required(&self.y, "y")?, self.required(&self.y2, "y2")?];
        let values = columns
            .iter()
            .map(|c| table.numeric_column(c))
            .collect::<Result<Vec<_>>>()?;
        let names = columns
            .iter()
            .enumerate()
            .map(|(i, c)| self.labels.get(i).cloned().unwrap_or_else(|| c.to_string()));
        Ok(stacked(categories, names.collect(), values))
    }

    fn build_stacked_multi(&self, table: &Table) -> Result<ChartData> {
        let category = match &self.x {
            Some(x) => x.clone(),
            None => table.columns.first().cloned().context("the table has no columns")?,
        };
        let categories = table.text_column(&category)?;
        let names: Vec<String> = table
            .numeric_columns()
            .into_iter()
            .filter(|c| *c != category)
            .collect();
        if names.is_empty() {
            bail!("no numeric columns to stack besides '{category}'");
        }
        let values = names
            .iter()
            .map(|c| table.numeric_column(c))
            .collect::<Result<Vec<_>>>()?;
        Ok(stacked(categories, names, values))
    }

    fn build_violins(&self, table: &Table) -> Result<ChartData> {
        let x = self.required(&self.x, "x")?;
        let y = table.numeric_column(self.required(&self.y, "y")?)?;
        let mut violins = Vec::new();
        for (label, rows) in table.group_rows(x)? {
            let values: Vec<f64> = rows.iter().map(|&r| y[r]).collect();
            let Some(stats) = box_stats(&values) else { continue };
            let shape = violin_outline(&values, violins.len() as f64, self.width);
            violins.push(Violin { label, stats, shape });
        }
        Ok(ChartData::Violins(violins))
    }
}

fn stacked(categories: Vec<String>, names: Vec<String>, values: Vec<Vec<f64>>) -> ChartData {
    let bottoms = stack_offsets(&values);
    let series = names
        .into_iter()
        .zip(values)
        .zip(bottoms)
        .map(|((name, values), bottoms)| StackSeries { name, values, bottoms })
        .collect();
    ChartData::Stacked { categories, series }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::CellValue;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn quartiles_interpolate_linearly() {
        let stats = box_stats(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert!(close(stats.q1, 1.75));
        assert!(close(stats.median, 2.5));
        assert!(close(stats.q3, 3.25));
        assert!(close(stats.lower_whisker, 1.0));
        assert!(close(stats.upper_whisker, 4.0));
        assert!(stats.outliers.is_empty());
    }

    #[test]
    fn whiskers_stop_at_the_last_point_within_reach() {
        let stats = box_stats(&[1.0, 2.0, 3.0, 4.0, 5.0, 100.0, f64::NAN]).unwrap();
        // q1 = 2.25, q3 = 4.75, reach 3.75 → upper limit 8.5
        assert!(close(stats.upper_whisker, 5.0));
        assert_eq!(stats.outliers, vec![100.0]);
        assert!(box_stats(&[f64::NAN]).is_none());
    }

    #[test]
    fn scott_bandwidth_and_density() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let bw = scott_bandwidth(&values).unwrap();
        assert!(close(bw, 2.5f64.sqrt() * 5f64.powf(-0.2)));
        assert!(scott_bandwidth(&[2.0, 2.0]).is_none());
        assert!(scott_bandwidth(&[2.0]).is_none());

        // A single point's density at its own location is 1 / (bw √2π).
        let density = gaussian_kde(&[0.0], 1.0, &[0.0, 1.0]);
        assert!(close(density[0], 1.0 / (2.0 * std::f64::consts::PI).sqrt()));
        assert!(density[1] < density[0]);
    }

    #[test]
    fn violin_is_half_width_at_its_peak() {
        let shape = violin_outline(&[1.0, 2.0, 2.0, 3.0], 2.0, 0.8).unwrap();
        let widest = shape.outline.iter().map(|&(_, w)| w).fold(0.0, f64::max);
        assert!(close(widest, 0.4));
        assert_eq!(shape.outline.len(), VIOLIN_POINTS);
        let polygon = shape.polygon();
        assert_eq!(polygon.len(), 2 * VIOLIN_POINTS);
        assert!(polygon[0][0] >= 2.0);
        assert!(polygon[VIOLIN_POINTS][0] <= 2.0);
    }

    #[test]
    fn stacking_accumulates_bottoms() {
        let offsets = stack_offsets(&[vec![1.0, 2.0], vec![3.0, f64::NAN], vec![5.0, 6.0]]);
        assert_eq!(offsets, vec![vec![0.0, 0.0], vec![1.0, 2.0], vec![4.0, 2.0]]);
    }

    fn s(v: &str) -> CellValue {
        CellValue::String(v.to_string())
    }

    fn i(v: i64) -> CellValue {
        CellValue::Integer(v)
    }

    #[test]
    fn box_chart_groups_summary_rows() {
        let table = Table::new(
            ["age", "Min", "Median", "Max"].map(String::from).to_vec(),
            vec![
                vec![s("0-4"), i(1), i(2), i(3)],
                vec![s("5-9"), i(5), i(6), i(9)],
                vec![s("0-4"), i(2), i(3), i(4)],
            ],
        )
        .unwrap();
        let spec = ChartSpec {
            x: Some("age".into()),
            ..ChartSpec::default()
        };
        let ChartData::Boxes(boxes) = spec.build(&table).unwrap() else {
            panic!("expected boxes");
        };
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].0, "0-4");
        assert!(close(boxes[0].1.median, 2.5));
        assert!(close(boxes[1].1.upper_whisker, 9.0));
    }

    #[test]
    fn two_group_stack_uses_y2_on_top() {
        let table = Table::new(
            ["subtype", "male", "female"].map(String::from).to_vec(),
            vec![vec![s("A"), i(3), i(4)], vec![s("B"), i(1), i(2)]],
        )
        .unwrap();
        let spec = ChartSpec {
            kind: ChartKind::Stacked,
            x: Some("subtype".into()),
            y: Some("male".into()),
            y2: Some("female".into()),
            labels: vec!["Male".into()],
            ..ChartSpec::default()
        };
        let ChartData::Stacked { categories, series } = spec.build(&table).unwrap() else {
            panic!("expected a stack");
        };
        assert_eq!(categories, vec!["A", "B"]);
        assert_eq!(series[0].name, "Male");
        assert_eq!(series[1].name, "female");
        assert_eq!(series[1].bottoms, vec![3.0, 1.0]);
        assert_eq!(series[1].values, vec![4.0, 2.0]);
    }

    #[test]
    fn multi_stack_takes_every_numeric_column() {
        let table = Table::new(
            ["tumorType", "Brain", "Blood", "note"].map(String::from).to_vec(),
            vec![vec![s("Glioma"), i(2), i(1), s("x")], vec![s("AML"), i(0), i(7), s("y")]],
        )
        .unwrap();
        let spec = ChartSpec {
            kind: ChartKind::StackedMulti,
            ..ChartSpec::default()
        };
        let ChartData::Stacked { categories, series } = spec.build(&table).unwrap() else {
            panic!("expected a stack");
        };
        assert_eq!(categories, vec!["Glioma", "AML"]);
        let names: Vec<&str> = series.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Brain", "Blood"]);
    }

    #[test]
    fn violins_group_raw_values_and_missing_columns_fail() {
        let table = Table::new(
            ["group", "value"].map(String::from).to_vec(),
            vec![
                vec![s("a"), i(1)],
                vec![s("a"), i(3)],
                vec![s("b"), i(5)],
                vec![s("a"), i(2)],
            ],
        )
        .unwrap();
        let spec = ChartSpec {
            kind: ChartKind::Violin,
            x: Some("group".into()),
            y: Some("value".into()),
            ..ChartSpec::default()
        };
        let ChartData::Violins(violins) = spec.build(&table).unwrap() else {
            panic!("expected violins");
        };
        assert_eq!(violins.len(), 2);
        assert!(violins[0].shape.is_some());
        assert!(violins[1].shape.is_none());
        assert!(close(violins[0].stats.median, 2.0));

        let missing = ChartSpec {
            kind: ChartKind::Bar,
            ..ChartSpec::default()
        };
        assert!(missing.build(&table).unwrap_err().to_string().contains("--x"));
    }
}
