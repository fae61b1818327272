use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::catalog::pride::{SearchQuery, SortDirection};
use crate::charts::{ChartKind, ChartSpec};
use crate::color::Palette;
use crate::lake::filter::{ResultFilter, SortKey};
use crate::manager::DatasetRequest;
use crate::trim::TrimOptions;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search PRIDE, download datasets and write their metadata
    Pride(PrideArgs),

    /// List datasets from a public repository
    Search(SearchArgs),

    /// Tag every object under a prefix with its PRIDE project metadata
    Tag(TagArgs),

    /// Find objects by their tags
    Query(QueryArgs),

    /// Watch ProteomeExchange for new pediatric cancer datasets
    Monitor(MonitorArgs),

    /// Move RAW/WIFF files into per-sample folders
    Organize(OrganizeArgs),

    /// Download every RAW file of the projects matching a keyword file
    Scrape(ScrapeArgs),

    /// Convert text or tables to JSON
    #[command(subcommand)]
    Convert(ConvertCommand),

    /// Append neoORF peptides and their decoys to a FASTA database
    Database(DatabaseArgs),

    /// Write a FragPipe manifest for a set of mzML files
    Manifest(ManifestArgs),

    /// Annotate FragPipe results with mapped proteins and genes
    Annotate(AnnotateArgs),

    /// Trim paired-end reads with Trimmomatic, then run FastQC
    Trim(TrimArgs),

    /// Open a summary chart of a table
    Plot(PlotArgs),
}

/// `KEY=VALUE`
fn parse_key_value(text: &str) -> Result<(String, String), String> {
    text.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{text}'"))
}

// ---------------------------------------------------------------------------
// pride / search
// ---------------------------------------------------------------------------

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum SortDirectionArg {
    #[value(name = "ASC", alias = "asc")]
    Asc,
    #[value(name = "DESC", alias = "desc")]
    Desc,
}

impl From<SortDirectionArg> for SortDirection {
    fn from(arg: SortDirectionArg) -> Self {
        match arg {
            SortDirectionArg::Asc => SortDirection::Asc,
            SortDirectionArg::Desc => SortDirection::Desc,
        }
    }
}

#[derive(Args, Debug)]
pub struct PrideArgs {
    /// Search keyword
    #[arg(long, required_unless_present = "accession")]
    pub keyword: Option<String>,

    /// Process these accessions instead of searching
    #[arg(long, num_args = 1..)]
    pub accession: Vec<String>,

    #[arg(long, default_value = "./pride_data")]
    pub output_dir: PathBuf,

    /// Upload files and metadata to this bucket
    #[arg(long)]
    pub s3_bucket: Option<String>,

    /// Stop after this many search hits (0 = no limit)
    #[arg(long, default_value_t = 5)]
    pub max_datasets: usize,

    #[arg(long)]
    pub max_files_per_dataset: Option<usize>,

    /// Only download files with these extensions, e.g. raw mzML
    #[arg(long, num_args = 1..)]
    pub file_types: Vec<String>,

    #[arg(long, default_value_t = 100)]
    pub page_size: usize,

    /// `field1==value1,field2==value2`
    #[arg(long)]
    pub filter: Option<String>,

    #[arg(long, value_enum, default_value = "DESC")]
    pub sort_direction: SortDirectionArg,

    #[arg(long, default_value = "submissionDate")]
    pub sort_fields: String,

    /// Metadata override, e.g. `--set Disease=Cancer`
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub overrides: Vec<(String, String)>,
}

impl From<&PrideArgs> for SearchQuery {
    fn from(args: &PrideArgs) -> Self {
        SearchQuery {
            page_size: args.page_size,
            filter: args.filter.clone(),
            sort_direction: args.sort_direction.into(),
            sort_fields: args.sort_fields.clone(),
            ..SearchQuery::new(args.keyword.clone().unwrap_or_default())
        }
    }
}

impl From<&PrideArgs> for DatasetRequest {
    fn from(args: &PrideArgs) -> Self {
        DatasetRequest {
            overrides: args.overrides.iter().cloned().collect(),
            max_files: args.max_files_per_dataset,
            file_types: args.file_types.clone(),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Pride,
    Massive,
    #[value(name = "proteomexchange", alias = "px")]
    ProteomeExchange,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    #[arg(long, value_enum, default_value = "pride")]
    pub source: Source,

    #[arg(long)]
    pub keyword: String,

    /// Results per request
    #[arg(long, default_value_t = 100)]
    pub page_size: usize,
}

// ---------------------------------------------------------------------------
// tag / query
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct TagArgs {
    /// Defaults to the configured bucket
    #[arg(long)]
    pub bucket: Option<String>,

    #[arg(long, default_value = "data/")]
    pub prefix: String,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum SortKeyArg {
    Key,
    LastModified,
    Size,
}

impl From<SortKeyArg> for SortKey {
    fn from(arg: SortKeyArg) -> Self {
        match arg {
            SortKeyArg::Key => SortKey::Key,
            SortKeyArg::LastModified => SortKey::LastModified,
            SortKeyArg::Size => SortKey::Size,
        }
    }
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    #[arg(long)]
    pub bucket: Option<String>,

    /// Only scan keys under this prefix
    #[arg(long, default_value = "")]
    pub key_prefix: String,

    /// Tag equals value: `--exact Disease=Cancer`
    #[arg(long, value_name = "KEY=VALUE")]
    pub exact: Vec<String>,

    /// Tag starts with value
    #[arg(long, value_name = "KEY=VALUE")]
    pub prefix: Vec<String>,

    /// Tag contains value
    #[arg(long, value_name = "KEY=VALUE")]
    pub contains: Vec<String>,

    /// Tag matches a regular expression from its start
    #[arg(long, value_name = "KEY=PATTERN")]
    pub regex: Vec<String>,

    /// Tag is a YYYY-MM-DD date in an inclusive range; either end may be empty
    #[arg(long, value_name = "KEY=START..END")]
    pub date_range: Vec<String>,

    /// Require every criterion instead of any one
    #[arg(long)]
    pub all: bool,

    /// Keep keys ending with one of these extensions
    #[arg(long, num_args = 1..)]
    pub extension: Vec<String>,

    #[arg(long)]
    pub min_size: Option<u64>,

    #[arg(long)]
    pub max_size: Option<u64>,

    #[arg(long, value_enum)]
    pub sort_by: Option<SortKeyArg>,

    #[arg(long)]
    pub limit: Option<usize>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,
}

impl From<&QueryArgs> for ResultFilter {
    fn from(args: &QueryArgs) -> Self {
        ResultFilter {
            extensions: args.extension.clone(),
            min_size: args.min_size,
            max_size: args.max_size,
            sort_by: args.sort_by.map(SortKey::from),
            limit: args.limit,
        }
    }
}

// ---------------------------------------------------------------------------
// monitor / organize / scrape
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// Run a single check cycle and exit
    #[arg(long)]
    pub once: bool,

    /// Also download approved PXD datasets through the PRIDE manager
    #[arg(long)]
    pub fetch_approved: bool,
}

#[derive(Args, Debug)]
pub struct OrganizeArgs {
    /// Directory holding PXD*/MSV* dataset folders
    pub root: PathBuf,

    /// Log the moves without touching any file
    #[arg(long)]
    pub dry_run: bool,

    /// Print every filename and its sample
    #[arg(long)]
    pub verbose: bool,

    /// Write the grouping as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ScrapeArgs {
    /// JSON object of search keywords
    pub keywords: PathBuf,

    #[arg(long, default_value = "downloads")]
    pub dest: PathBuf,
}

// ---------------------------------------------------------------------------
// convert
// ---------------------------------------------------------------------------

#[derive(Subcommand, Debug)]
pub enum ConvertCommand {
    /// `key: value` lines to a JSON object
    Text { input: PathBuf, output: PathBuf },

    /// First two columns of a CSV, TSV or XLSX file to a JSON object
    Table {
        input: PathBuf,

        #[arg(long, default_value = "keywords.json")]
        output: PathBuf,
    },
}

// ---------------------------------------------------------------------------
// search-database helpers
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct DatabaseArgs {
    #[arg(long)]
    pub input_db: PathBuf,

    /// TSV with `key` and `peptide.normal.ends` columns
    #[arg(long)]
    pub input_neo_orfs: PathBuf,

    #[arg(long)]
    pub output_db: PathBuf,
}

#[derive(Args, Debug)]
pub struct ManifestArgs {
    /// Glob of mzML files, e.g. 'data/*.mzML'
    #[arg(long)]
    pub mzml_files: String,

    /// One sample name per line
    #[arg(long)]
    pub samples_file: PathBuf,

    #[arg(long)]
    pub output_file: PathBuf,

    #[arg(long, default_value = "DDA")]
    pub data_type: String,
}

#[derive(Args, Debug)]
pub struct AnnotateArgs {
    /// FragPipe sample result directories
    #[arg(long, num_args = 1.., required = true)]
    pub samples_list: Vec<PathBuf>,

    /// FASTA database the search ran against
    #[arg(long)]
    pub database: PathBuf,

    #[arg(long)]
    pub output_path: PathBuf,

    #[arg(long)]
    pub study_id: String,
}

#[derive(Args, Debug)]
pub struct TrimArgs {
    #[arg(long, default_value = "trimmomatic.jar")]
    pub jar: PathBuf,

    /// Headerless TSV: R1 FASTQ path, adapter type
    #[arg(long, default_value = "schema_trim.tsv")]
    pub schema: PathBuf,

    #[arg(long, default_value = "adapters.fa")]
    pub adapters: PathBuf,

    #[arg(long, default_value = "trimmed")]
    pub out_dir: PathBuf,

    #[arg(long, default_value = "QC")]
    pub qc_dir: PathBuf,

    #[arg(long, default_value_t = 4)]
    pub threads: usize,

    #[arg(long)]
    pub skip_fastqc: bool,
}

impl From<TrimArgs> for TrimOptions {
    fn from(args: TrimArgs) -> Self {
        TrimOptions {
            jar: args.jar,
            schema: args.schema,
            adapters: args.adapters,
            out_dir: args.out_dir,
            qc_dir: args.qc_dir,
            threads: args.threads,
            skip_fastqc: args.skip_fastqc,
        }
    }
}

// ---------------------------------------------------------------------------
// plot
// ---------------------------------------------------------------------------

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ChartKindArg {
    Box,
    Bar,
    Stacked,
    StackedMulti,
    Violin,
}

impl From<ChartKindArg> for ChartKind {
    fn from(arg: ChartKindArg) -> Self {
        match arg {
            ChartKindArg::Box => ChartKind::Box,
            ChartKindArg::Bar => ChartKind::Bar,
            ChartKindArg::Stacked => ChartKind::Stacked,
            ChartKindArg::StackedMulti => ChartKind::StackedMulti,
            ChartKindArg::Violin => ChartKind::Violin,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum PaletteArg {
    Viridis,
    Husl,
    Hls,
    Pastel,
}

impl From<PaletteArg> for Palette {
    fn from(arg: PaletteArg) -> Self {
        match arg {
            PaletteArg::Viridis => Palette::Viridis,
            PaletteArg::Husl => Palette::Husl,
            PaletteArg::Hls => Palette::Hls,
            PaletteArg::Pastel => Palette::Pastel,
        }
    }
}

#[derive(Args, Debug)]
pub struct PlotArgs {
    /// CSV, TSV, JSON, Parquet or XLSX table
    pub file: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "box")]
    pub kind: ChartKindArg,

    /// Category column
    #[arg(long)]
    pub x: Option<String>,

    /// Value column
    #[arg(long)]
    pub y: Option<String>,

    /// Second series of the stacked chart
    #[arg(long)]
    pub y2: Option<String>,

    #[arg(long, default_value = "Distribution Plot")]
    pub title: String,

    #[arg(long, default_value = "")]
    pub x_label: String,

    #[arg(long, default_value = "")]
    pub y_label: String,

    #[arg(long)]
    pub legend_title: Option<String>,

    #[arg(long, default_value_t = 0.8)]
    pub width: f64,

    #[arg(long, value_enum, default_value = "viridis")]
    pub palette: PaletteArg,

    /// Series colours of the stacked chart (`#rrggbb` or names)
    #[arg(long, num_args = 1..)]
    pub colors: Vec<String>,

    /// Series names of the stacked chart
    #[arg(long, num_args = 1..)]
    pub labels: Vec<String>,

    /// Draw violin data as boxes
    #[arg(long)]
    pub as_box: bool,

    /// Save a PNG of the chart and exit
    #[arg(long)]
    pub save: Option<PathBuf>,
}

impl From<&PlotArgs> for ChartSpec {
    fn from(args: &PlotArgs) -> Self {
        ChartSpec {
            kind: args.kind.into(),
            x: args.x.clone(),
            y: args.y.clone(),
            y2: args.y2.clone(),
            title: args.title.clone(),
            x_label: args.x_label.clone(),
            y_label: args.y_label.clone(),
            legend_title: args.legend_title.clone(),
            width: args.width,
            palette: args.palette.into(),
            colors: args.colors.clone(),
            labels: args.labels.clone(),
            violin_as_box: args.as_box,
        }
    }
}
