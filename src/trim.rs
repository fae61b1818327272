use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{LakeError, Result};

/// Adapter types trimmed with `ILLUMINACLIP`.
pub const CLIPPED_ADAPTERS: [&str; 2] = ["Illumina Universal Adapter", "TruSeq Adapter"];

const QUALITY_STEPS: [&str; 4] = ["LEADING:3", "TRAILING:3", "SLIDINGWINDOW:4:15", "MINLEN:36"];

/// `S_R1.fastq.gz` → `S`.
pub fn base_name(fastq: &str) -> String {
    let name = Path::new(fastq)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| fastq.to_string());
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    let name = name
        .strip_suffix(".fastq")
        .or_else(|| name.strip_suffix(".fq"))
        .unwrap_or(name);
    name.strip_suffix("_R1")
        .or_else(|| name.strip_suffix("_1"))
        .unwrap_or(name)
        .to_string()
}

/// Mate file of an R1 path.
pub fn mate_path(r1: &str) -> String {
    r1.replace("_R1", "_R2").replace("_1.", "_2.")
}

fn run_checked(command: &mut Command) -> Result<()> {
    let program = command.get_program().to_string_lossy().into_owned();
    let status = command.status()?;
    if status.success() {
        Ok(())
    } else {
        Err(LakeError::Process { program, status })
    }
}

// ---------------------------------------------------------------------------
// One paired-end trimming job
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimJob {
    pub r1: String,
    pub r2: String,
    pub base_name: String,
    pub clip: Option<String>,
    pub jar: PathBuf,
    pub out_dir: PathBuf,
    pub threads: usize,
}

impl TrimJob {
    pub fn new(fastq: &str, adapter_type: &str, adapters_fa: &Path, jar: &Path, out_dir: &Path, threads: usize) -> Self {
        let clip = CLIPPED_ADAPTERS
            .contains(&adapter_type)
            .then(|| format!("ILLUMINACLIP:{}:2:30:10:2:keepboth", adapters_fa.display()));
        if clip.is_none() {
            log::warn!("No adapter clipping for adapter type '{adapter_type}'");
        }
        Self {
            r1: fastq.to_string(),
            r2: mate_path(fastq),
            base_name: base_name(fastq),
            clip,
            jar: jar.to_path_buf(),
            out_dir: out_dir.to_path_buf(),
            threads,
        }
    }

    fn output(&self, read: u8, kind: &str) -> PathBuf {
        self.out_dir.join(format!("{}_R{read}_{kind}.fastq.gz", self.base_name))
    }

    /// R1 paired, R1 unpaired, R2 paired, R2 unpaired.
    pub fn outputs(&self) -> [PathBuf; 4] {
        [
            self.output(1, "paired"),
            self.output(1, "unpaired"),
            self.output(2, "paired"),
            self.output(2, "unpaired"),
        ]
    }

    pub fn paired_outputs(&self) -> [PathBuf; 2] {
        [self.output(1, "paired"), self.output(2, "paired")]
    }

    /// Arguments passed to `java`.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-jar".to_string(),
            self.jar.display().to_string(),
            "PE".to_string(),
            "-threads".to_string(),
            self.threads.to_string(),
            self.r1.clone(),
            self.r2.clone(),
        ];
        args.extend(self.outputs().iter().map(|p| p.display().to_string()));
        args.extend(self.clip.clone());
        args.extend(QUALITY_STEPS.iter().map(|s| s.to_string()));
        args
    }

    /// Run Trimmomatic; returns the paired outputs.
    pub fn run(&self) -> Result<[PathBuf; 2]> {
        fs::create_dir_all(&self.out_dir)?;
        run_checked(Command::new("java").args(self.args()))?;
        Ok(self.paired_outputs())
    }
}

// ---------------------------------------------------------------------------
// Schema runner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TrimOptions {
    pub jar: PathBuf,
    pub schema: PathBuf,
    pub adapters: PathBuf,
    pub out_dir: PathBuf,
    pub qc_dir: PathBuf,
    pub threads: usize,
    pub skip_fastqc: bool,
}

impl Default for TrimOptions {
    fn default() -> Self {
        Self {
            jar: PathBuf::from("trimmomatic.jar"),
            schema: PathBuf::from("schema_trim.tsv"),
            adapters: PathBuf::from("adapters.fa"),
            out_dir: PathBuf::from("trimmed"),
            qc_dir: PathBuf::from("QC"),
            threads: 4,
            skip_fastqc: false,
        }
    }
}

#[derive(Debug, Default)]
pub struct TrimReport {
    pub trimmed: Vec<PathBuf>,
    pub failed: Vec<String>,
}

/// Headerless two-column TSV: FASTQ path and adapter type.
pub fn read_schema(path: &Path) -> Result<Vec<(String, String)>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let fastq = record.get(0).unwrap_or("").trim();
        if fastq.is_empty() {
            continue;
        }
        rows.push((fastq.to_string(), record.get(1).unwrap_or("").trim().to_string()));
    }
    Ok(rows)
}

fn require(path: &Path, what: &str) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(LakeError::InvalidArgument(format!("Cannot find {what} at {}", path.display())))
    }
}

pub fn run_fastqc(file: &Path, qc_dir: &Path) -> Result<()> {
    run_checked(Command::new("fastqc").arg("--outdir").arg(qc_dir).arg(file))
}

/// Trim every schema row, then run FastQC on the paired outputs.
pub fn run_schema(options: &TrimOptions) -> Result<TrimReport> {
    require(&options.jar, "Trimmomatic")?;
    require(&options.schema, "schema file")?;
    require(&options.adapters, "adapters file")?;

    let mut report = TrimReport::default();
    for (fastq, adapter_type) in read_schema(&options.schema)? {
        log::info!("Processing {fastq} with {adapter_type}");
        let job = TrimJob::new(
            &fastq,
            &adapter_type,
            &options.adapters,
            &options.jar,
            &options.out_dir,
            options.threads,
        );
        match job.run() {
            Ok(outputs) => {
                log::info!("Successfully processed {}", job.base_name);
                report.trimmed.extend(outputs);
            }
            Err(e) => {
                log::error!("Error processing {}: {e}", job.base_name);
                report.failed.push(fastq);
            }
        }
    }

    if !options.skip_fastqc && !report.trimmed.is_empty() {
        fs::create_dir_all(&options.qc_dir)?;
        log::info!("Running FastQC on trimmed files...");
        for file in &report.trimmed {
            match run_fastqc(file, &options.qc_dir) {
                Ok(()) => log::info!("Successfully ran FastQC on {}", file.display()),
                Err(e) => log::error!("Error running FastQC on {}: {e}", file.display()),
            }
        }
    }
    Ok(report)
}
