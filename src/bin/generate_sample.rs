use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

const TUMOR_TYPES: [&str; 5] = ["Neuroblastoma", "Medulloblastoma", "Osteosarcoma", "Wilms tumor", "Glioma"];
const AGE_GROUPS: [&str; 4] = ["0-4", "5-9", "10-14", "15-19"];
const TISSUES: [&str; 4] = ["Brain", "Blood", "Bone", "Kidney"];

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    fn count(&mut self, low: u64, high: u64) -> u64 {
        low + self.next_u64() % (high - low + 1)
    }
}

fn write_csv(path: &Path, header: &[&str], rows: &[Vec<String>]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    println!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Age summaries per cohort: `box` chart.
fn box_summary(rng: &mut SimpleRng) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for (g, group) in AGE_GROUPS.iter().enumerate() {
        let center = 2.0 + 5.0 * g as f64;
        for _cohort in 0..3 {
            let median = rng.gauss(center, 0.8);
            let min = median - rng.next_f64() * 2.0 - 0.5;
            let max = median + rng.next_f64() * 2.0 + 0.5;
            rows.push(vec![
                group.to_string(),
                format!("{min:.1}"),
                format!("{max:.1}"),
                format!("{:.1}", (min + median + max) / 3.0),
                format!("{median:.1}"),
            ]);
        }
    }
    rows
}

/// Patients per tumour type, descending: `bar` chart.
fn distribution(rng: &mut SimpleRng) -> Vec<Vec<String>> {
    let mut counts: Vec<(&str, u64)> = TUMOR_TYPES.iter().map(|t| (*t, rng.count(5, 120))).collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .map(|(t, n)| vec![t.to_string(), n.to_string()])
        .collect()
}

/// Male and female patients per subtype: `stacked` chart.
fn stacked(rng: &mut SimpleRng) -> Vec<Vec<String>> {
    TUMOR_TYPES
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let male = rng.count(3, 40);
            let female = rng.count(3, 40);
            vec![(i + 1).to_string(), t.to_string(), male.to_string(), female.to_string()]
        })
        .collect()
}

/// Samples per tissue for each tumour type: `stacked-multi` chart.
fn stacked_multi(rng: &mut SimpleRng) -> Vec<Vec<String>> {
    TUMOR_TYPES
        .iter()
        .map(|t| {
            let mut row = vec![t.to_string()];
            row.extend(TISSUES.iter().map(|_| rng.count(0, 25).to_string()));
            row
        })
        .collect()
}

/// Raw patient ages per tumour type: `violin` chart.
fn violin(rng: &mut SimpleRng) -> (Vec<String>, Vec<f64>) {
    let mut types = Vec::new();
    let mut ages = Vec::new();
    for (i, t) in TUMOR_TYPES.iter().enumerate() {
        let mean = 3.0 + 3.0 * i as f64;
        for _ in 0..60 {
            types.push(t.to_string());
            ages.push((rng.gauss(mean, 2.5).clamp(0.0, 19.0) * 10.0).round() / 10.0);
        }
    }
    (types, ages)
}

fn write_violin_parquet(path: &Path, types: &[String], ages: &[f64]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("tumorType", DataType::Utf8, false),
        Field::new("age", DataType::Float64, false),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(types.iter().map(String::as_str).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(ages.to_vec())),
        ],
    )
    .context("building record batch")?;

    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    println!("Wrote {} rows to {}", types.len(), path.display());
    Ok(())
}

fn main() -> Result<()> {
    let out_dir = std::env::args().nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from("demo_data"));
    fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    let mut rng = SimpleRng::new(42);

    write_csv(
        &out_dir.join("box_summary.csv"),
        &["age_group", "Min", "Max", "Mean", "Median"],
        &box_summary(&mut rng),
    )?;
    write_csv(&out_dir.join("distribution.csv"), &["tumorType", "patients"], &distribution(&mut rng))?;
    write_csv(
        &out_dir.join("stacked.csv"),
        &["S.No.", "Subtype", "Male", "Female"],
        &stacked(&mut rng),
    )?;

    let mut header = vec!["tumorType"];
    header.extend(TISSUES);
    write_csv(&out_dir.join("stacked_multi.csv"), &header, &stacked_multi(&mut rng))?;

    let (types, ages) = violin(&mut rng);
    let rows: Vec<Vec<String>> = types
        .iter()
        .zip(&ages)
        .map(|(t, a)| vec![t.clone(), a.to_string()])
        .collect();
    write_csv(&out_dir.join("violin.csv"), &["tumorType", "age"], &rows)?;
    write_violin_parquet(&out_dir.join("violin.parquet"), &types, &ages)?;

    Ok(())
}
