use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::Result;

static REPLICATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.*?)_Rep\d+").expect("valid regex"));
static NUMBERED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.*?)_\d+").expect("valid regex"));
static TRAILING_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?)\d+[^A-Za-z]*$").expect("valid regex"));
static TRAILING_PUNCT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]+$").expect("valid regex"));
static DATE_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+_(.+)$").expect("valid regex"));

fn strip_date_prefix(name: &str) -> String {
    match DATE_PREFIX.captures(name).and_then(|c| c.get(1)) {
        Some(rest) => rest.as_str().to_string(),
        None => name.to_string(),
    }
}

/// Sample name of a raw file, e.g. `20240101_Tumor_Rep2.raw` → `Tumor`.
///
/// Tried in order on the stem: text before `_Rep<n>`, text before `_<n>`,
/// text before the last digit run, then the whole stem.
pub fn extract_sample_name(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());

    for re in [&*REPLICATE, &*NUMBERED] {
        if let Some(name) = re.captures(&stem).and_then(|c| c.get(1)) {
            return strip_date_prefix(name.as_str());
        }
    }

    if let Some(name) = TRAILING_DIGITS
        .captures(&stem)
        .and_then(|c| c.get(1))
        .filter(|m| !m.as_str().is_empty())
    {
        return strip_date_prefix(&TRAILING_PUNCT.replace(name.as_str(), ""));
    }

    strip_date_prefix(&stem)
}

fn is_raw_file(name: &str) -> bool {
    let upper = name.to_uppercase();
    upper.ends_with(".RAW") || upper.ends_with(".WIFF")
}

fn sorted_entries(dir: &Path) -> Result<Vec<fs::DirEntry>> {
    let mut entries = fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());
    Ok(entries)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleGroup {
    pub dataset: String,
    pub sample: String,
    pub files: Vec<String>,
}

/// Move the raw files of every `PXD*`/`MSV*` folder under `root` into
/// `sample_<name>/` sub-folders.
pub fn organize_samples(root: &Path, dry_run: bool) -> Result<Vec<SampleGroup>> {
    let mut results = Vec::new();

    for entry in sorted_entries(root)? {
        let dataset = entry.file_name().to_string_lossy().into_owned();
        if !entry.file_type()?.is_dir() || !(dataset.starts_with("PXD") || dataset.starts_with("MSV")) {
            continue;
        }
        let dataset_dir = entry.path();
        log::info!("Processing dataset: {dataset}");

        let mut samples: Vec<(String, Vec<String>)> = Vec::new();
        for file in sorted_entries(&dataset_dir)? {
            let name = file.file_name().to_string_lossy().into_owned();
            if !file.file_type()?.is_file() || !is_raw_file(&name) {
                continue;
            }
            let sample = extract_sample_name(&name);
            match samples.iter_mut().find(|(s, _)| *s == sample) {
                Some((_, files)) => files.push(name),
                None => samples.push((sample, vec![name])),
            }
        }

        for (sample, files) in samples {
            let sample_dir_name = format!("sample_{sample}");
            let sample_dir = dataset_dir.join(&sample_dir_name);
            if !dry_run {
                fs::create_dir_all(&sample_dir)?;
            }
            log::info!("  Sample: {sample} - {} files", files.len());

            for file in &files {
                if dry_run {
                    log::info!("    Would move: {file} to {sample_dir_name}/");
                } else {
                    log::info!("    Moving: {file} to {sample_dir_name}/");
                    fs::rename(dataset_dir.join(file), sample_dir.join(file))?;
                }
            }
            results.push(SampleGroup {
                dataset: dataset.clone(),
                sample,
                files,
            });
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_names_follow_the_strategies() {
        assert_eq!(extract_sample_name("Sample_01.raw"), "Sample");
        assert_eq!(extract_sample_name("Tumor_A_Rep2.raw"), "Tumor_A");
        assert_eq!(extract_sample_name("20240101_Tumor_Rep2.raw"), "Tumor");
        assert_eq!(extract_sample_name("20240101_Liver_03.RAW"), "Liver");
        assert_eq!(extract_sample_name("HeLa-12.wiff"), "HeLa");
        assert_eq!(extract_sample_name("Control.raw"), "Control");
        assert_eq!(extract_sample_name("20240101_Blank.raw"), "Blank");
    }

    #[test]
    fn files_move_into_sample_folders() {
        let root = tempfile::tempdir().unwrap();
        let pxd = root.path().join("PXD000001");
        fs::create_dir_all(&pxd).unwrap();
        fs::create_dir_all(root.path().join("other")).unwrap();
        for name in ["Sample_01.raw", "Sample_02.RAW", "Ctrl_01.wiff", "notes.txt"] {
            fs::write(pxd.join(name), b"x").unwrap();
        }
        fs::write(root.path().join("other/Sample_01.raw"), b"x").unwrap();

        let groups = organize_samples(root.path(), false).unwrap();

        assert_eq!(
            groups,
            vec![
                SampleGroup {
                    dataset: "PXD000001".into(),
                    sample: "Ctrl".into(),
                    files: vec!["Ctrl_01.wiff".into()],
                },
                SampleGroup {
                    dataset: "PXD000001".into(),
                    sample: "Sample".into(),
                    files: vec!["Sample_01.raw".into(), "Sample_02.RAW".into()],
                },
            ]
        );
        assert!(pxd.join("sample_Sample/Sample_02.RAW").is_file());
        assert!(pxd.join("notes.txt").is_file());
        assert!(root.path().join("other/Sample_01.raw").is_file());
    }

    #[test]
    fn dry_run_leaves_files_alone() {
        let root = tempfile::tempdir().unwrap();
        let msv = root.path().join("MSV000001");
        fs::create_dir_all(&msv).unwrap();
        fs::write(msv.join("S_1.raw"), b"x").unwrap();

        let groups = organize_samples(root.path(), true).unwrap();
        assert_eq!(groups.len(), 1);
        assert!(msv.join("S_1.raw").is_file());
        assert!(!msv.join("sample_S").exists());
    }
}
