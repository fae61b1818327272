use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{LakeError, Result};

pub const DEFAULT_EXPERIMENT: &str = "default_value";

/// Experiment name of `path`: the last sample line it contains.
pub fn experiment_name(path: &str, samples: &[String]) -> String {
    samples
        .iter()
        .rev()
        .find(|sample| path.contains(sample.as_str()))
        .map(|sample| format!("sample_{sample}"))
        .unwrap_or_else(|| DEFAULT_EXPERIMENT.to_string())
}

fn read_samples(samples_file: &Path) -> Result<Vec<String>> {
    Ok(fs::read_to_string(samples_file)?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

fn matching_files(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob::glob(pattern)
        .map_err(|e| LakeError::InvalidArgument(format!("glob pattern '{pattern}': {e}")))?;
    let mut files = Vec::new();
    for entry in paths {
        match entry {
            Ok(path) => files.push(path),
            Err(e) => log::warn!("Skipping unreadable path: {e}"),
        }
    }
    files.sort();
    Ok(files)
}

/// Write a headerless FragPipe manifest:
/// `path  experiment  <replicate>  <data type>`, one row per matching file.
pub fn create_manifest(pattern: &str, samples_file: &Path, output: &Path, data_type: &str) -> Result<usize> {
    let samples = read_samples(samples_file)?;
    let files = matching_files(pattern)?;
    if files.is_empty() {
        log::warn!("No files match {pattern}");
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(output)?;
    for file in &files {
        let path = file.to_string_lossy();
        let experiment = experiment_name(&path, &samples);
        writer.write_record([path.as_ref(), experiment.as_str(), "", data_type])?;
    }
    writer.flush()?;

    log::info!("Manifest with {} files written to {}", files.len(), output.display());
    Ok(files.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_contained_sample_wins() {
        let samples: Vec<String> = ["Tumor", "Tumor_2", "Normal"].iter().map(|s| s.to_string()).collect();
        assert_eq!(experiment_name("/data/Tumor_2_run.mzML", &samples), "sample_Tumor_2");
        assert_eq!(experiment_name("/data/Normal.mzML", &samples), "sample_Normal");
        assert_eq!(experiment_name("/data/blank.mzML", &samples), DEFAULT_EXPERIMENT);
    }

    #[test]
    fn manifest_rows_are_sorted_and_tab_separated() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b_Normal.mzML", "a_Tumor.mzML", "notes.txt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let samples = dir.path().join("samples.txt");
        fs::write(&samples, "Tumor\n\n  Normal  \n").unwrap();
        let output = dir.path().join("manifest.fp-manifest");
        let pattern = format!("{}/*.mzML", dir.path().display());

        let rows = create_manifest(&pattern, &samples, &output, "DDA").unwrap();

        assert_eq!(rows, 2);
        let a = dir.path().join("a_Tumor.mzML");
        let b = dir.path().join("b_Normal.mzML");
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            format!("{}\tsample_Tumor\t\tDDA\n{}\tsample_Normal\t\tDDA\n", a.display(), b.display())
        );
    }
}
