// Command-line surface. Handlers turn parsed arguments into module option
// structs and report outcomes; the work happens in the library modules.

pub mod commands;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::Parser;
use eframe::egui;

use crate::app::ChartViewerApp;
use crate::catalog::massive::MassiveClient;
use crate::catalog::pride::{PrideClient, SearchQuery};
use crate::catalog::proteomexchange::ProteomeCentralClient;
use crate::catalog::{Dataset, DatasetSource};
use crate::charts::ChartSpec;
use crate::config::Config;
use crate::convert::{table_to_json, text_to_json, write_json};
use crate::data::loader::load_table;
use crate::download::{Downloader, batch_download};
use crate::lake::ObjectStore;
use crate::lake::filter::ResultFilter;
use crate::lake::query::{MatchKind, TagCriterion, TagQuery, query_by_tags};
use crate::lake::s3::S3Store;
use crate::lake::tags::tag_pride_datasets;
use crate::manager::{DatasetRequest, ManagerOptions, PrideDatasetManager};
use crate::monitor::mail::EmailChannel;
use crate::monitor::{Monitor, MonitorOptions};
use crate::organizer::organize_samples;
use crate::scraper::{LegacyPrideClient, collect_raw_file_urls, load_keywords, normalize_keywords};
use crate::search::{annotate, database, manifest};
use crate::state::AppState;
use crate::trim::{TrimOptions, run_schema};
use commands::{
    AnnotateArgs, Commands, ConvertCommand, DatabaseArgs, ManifestArgs, MonitorArgs, OrganizeArgs, PlotArgs,
    PrideArgs, QueryArgs, ScrapeArgs, SearchArgs, Source, TagArgs, TrimArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "proteolake",
    version,
    about = "Harvest public proteomics datasets, curate them in S3 and plot summary statistics."
)]
pub struct Cli {
    /// TOML configuration file; `proteolake.toml` is used when present
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// File that should receive a copy of the log, if the command keeps one.
    pub fn log_file(&self, config: &Config) -> Option<PathBuf> {
        match self.command {
            Commands::Monitor(_) => Some(config.monitor.log_file.clone()),
            _ => None,
        }
    }

    pub fn run(self, config: Config) -> Result<()> {
        match self.command {
            Commands::Pride(args) => run_pride(args, &config),
            Commands::Search(args) => run_search(args, &config),
            Commands::Tag(args) => run_tag(args, &config),
            Commands::Query(args) => run_query(args, &config),
            Commands::Monitor(args) => run_monitor(args, &config),
            Commands::Organize(args) => run_organize(args),
            Commands::Scrape(args) => run_scrape(args, &config),
            Commands::Convert(command) => run_convert(command),
            Commands::Database(args) => run_database(args),
            Commands::Manifest(args) => run_manifest(args),
            Commands::Annotate(args) => run_annotate(args),
            Commands::Trim(args) => run_trim(args),
            Commands::Plot(args) => run_plot(args),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared construction
// ---------------------------------------------------------------------------

fn connect_store(bucket: Option<String>, config: &Config) -> Result<Option<Box<dyn ObjectStore>>> {
    let Some(bucket) = bucket.or_else(|| config.storage.bucket.clone()) else {
        return Ok(None);
    };
    let store = S3Store::connect(bucket.as_str(), config.storage.region.as_deref())
        .with_context(|| format!("connecting to bucket {bucket}"))?;
    Ok(Some(Box::new(store)))
}

fn require_store(bucket: Option<String>, config: &Config) -> Result<Box<dyn ObjectStore>> {
    connect_store(bucket, config)?
        .context("no bucket given: pass --bucket or set PROTEOLAKE_S3_BUCKET")
}

fn pride_manager(output_dir: &Path, store: Option<Box<dyn ObjectStore>>, config: &Config) -> Result<PrideDatasetManager<PrideClient>> {
    let options = ManagerOptions {
        output_dir: output_dir.to_path_buf(),
        data_prefix: config.storage.data_prefix.clone(),
        metadata_prefix: config.storage.metadata_prefix.clone(),
        request_delay: Duration::from_secs(config.pride.request_delay_secs),
    };
    let catalog = PrideClient::new(config.pride.base_url.as_str())?;
    Ok(PrideDatasetManager::new(catalog, Downloader::new(true)?, store, options)?)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

fn run_pride(args: PrideArgs, config: &Config) -> Result<()> {
    let store = connect_store(args.s3_bucket.clone(), config)?;
    let manager = pride_manager(&args.output_dir, store, config)?;
    let request = DatasetRequest::from(&args);

    let processed = if args.accession.is_empty() {
        let query = SearchQuery::from(&args);
        log::info!("Searching PRIDE for '{}'", query.keyword);
        manager.run(&query, args.max_datasets, &request)?
    } else {
        manager.process_all(args.accession.iter().map(String::as_str), &request)
    };

    log::info!("Successfully processed {processed} datasets");
    println!("Processed {processed} datasets into {}", args.output_dir.display());
    Ok(())
}

fn print_datasets(datasets: &[Dataset]) {
    for dataset in datasets {
        println!("{}\t{}", dataset.accession, dataset.title);
    }
}

fn run_search(args: SearchArgs, config: &Config) -> Result<()> {
    match args.source {
        Source::Pride => {
            let client = PrideClient::new(config.pride.base_url.as_str())?;
            let query = SearchQuery {
                page_size: args.page_size,
                ..SearchQuery::new(args.keyword.as_str())
            };
            for project in client.search_projects(&query)? {
                if let Some(accession) = project.accession {
                    println!("{accession}\t{}", project.title);
                }
            }
        }
        Source::Massive => {
            let client = MassiveClient::new(config.massive.base_url.as_str(), args.page_size)?;
            print_datasets(&client.search(&args.keyword)?);
        }
        Source::ProteomeExchange => {
            let client = ProteomeCentralClient::new(config.monitor.endpoint.as_str(), args.page_size)?;
            print_datasets(&client.search(&args.keyword)?);
        }
    }
    Ok(())
}

fn run_tag(args: TagArgs, config: &Config) -> Result<()> {
    let store = require_store(args.bucket, config)?;
    let catalog = PrideClient::new(config.pride.base_url.as_str())?;
    let report = tag_pride_datasets(store.as_ref(), &catalog, &args.prefix)?;
    println!(
        "Tagged {} objects across {} datasets ({} failed)",
        report.tagged, report.datasets, report.failed
    );
    Ok(())
}

fn run_query(args: QueryArgs, config: &Config) -> Result<()> {
    let groups = [
        (MatchKind::Exact, &args.exact),
        (MatchKind::Prefix, &args.prefix),
        (MatchKind::Contains, &args.contains),
        (MatchKind::Regex, &args.regex),
        (MatchKind::DateRange, &args.date_range),
    ];
    let mut criteria = Vec::new();
    for (kind, texts) in groups {
        for text in texts {
            criteria.push(TagCriterion::parse(kind, text)?);
        }
    }
    if criteria.is_empty() {
        bail!("give at least one of --exact, --prefix, --contains, --regex or --date-range");
    }
    let query = TagQuery {
        criteria,
        match_all: args.all,
    };

    let store = require_store(args.bucket.clone(), config)?;
    let results = query_by_tags(store.as_ref(), &query, &args.key_prefix)?;
    let results = ResultFilter::from(&args).apply(results);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    for object in &results {
        let modified = object
            .last_modified
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        let tags: Vec<String> = object.tags.iter().map(|(k, v)| format!("{k}={v}")).collect();
        println!("{}\t{}\t{}\t{}", object.key, object.size, modified, tags.join("; "));
    }
    println!("{} matching objects", results.len());
    Ok(())
}

fn run_monitor(args: MonitorArgs, config: &Config) -> Result<()> {
    let source = ProteomeCentralClient::new(config.monitor.endpoint.as_str(), config.monitor.max_hits)?;
    let channel = EmailChannel::new(config.email.clone())?;
    let options = MonitorOptions {
        search_terms: config.monitor.search_terms.clone(),
        time_window_hours: config.monitor.time_window_hours,
        check_interval: Duration::from_secs(config.monitor.check_interval_hours * 3600),
        download_dir: config.monitor.download_dir.clone(),
    };
    let mut monitor = Monitor::new(source, channel, options)?;

    if args.fetch_approved {
        let store = connect_store(None, config)?;
        let manager = pride_manager(&config.monitor.download_dir, store, config)?;
        let request = DatasetRequest::default();
        monitor = monitor.on_approved(Box::new(move |dataset: &Dataset| {
            if !dataset.accession.starts_with("PXD") {
                log::info!("{} is not a PRIDE dataset, files not fetched", dataset.accession);
                return;
            }
            if !manager.process_dataset(&dataset.accession, &request) {
                log::error!("Fetching files of {} failed", dataset.accession);
            }
        }));
    }

    if !args.once {
        monitor.run();
    }
    let report = monitor.check_cycle(Local::now().naive_local());
    log::info!(
        "Cycle done: {} found, {} notified, {} approved, {} declined",
        report.found,
        report.notified,
        report.approved,
        report.declined
    );
    Ok(())
}

fn run_organize(args: OrganizeArgs) -> Result<()> {
    if !args.root.is_dir() {
        bail!("{} is not a directory", args.root.display());
    }
    let groups = organize_samples(&args.root, args.dry_run)?;
    if args.verbose {
        for group in &groups {
            for file in &group.files {
                println!("{}/{file} -> sample_{}", group.dataset, group.sample);
            }
        }
    }
    if let Some(report) = &args.report {
        write_json(&groups, report)?;
        log::info!("Wrote grouping to {}", report.display());
    }
    let files: usize = groups.iter().map(|g| g.files.len()).sum();
    println!("{files} files in {} sample groups", groups.len());
    Ok(())
}

fn run_scrape(args: ScrapeArgs, config: &Config) -> Result<()> {
    let keywords = normalize_keywords(load_keywords(&args.keywords)?);
    let client = LegacyPrideClient::new(&config.pride.legacy_base_url)?;
    let projects = client.fetch_projects(&keywords)?;
    log::info!("Found {} projects", projects.len());

    let urls = collect_raw_file_urls(&client, &projects)?;
    log::info!("Found {} RAW files", urls.len());
    if urls.is_empty() {
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    let report = runtime.block_on(batch_download(urls, &args.dest))?;
    println!(
        "Downloaded {} files to {} ({} failed)",
        report.downloaded.len(),
        args.dest.display(),
        report.failed.len()
    );
    Ok(())
}

fn run_convert(command: ConvertCommand) -> Result<()> {
    match command {
        ConvertCommand::Text { input, output } => {
            let text = fs::read_to_string(&input).with_context(|| format!("reading {}", input.display()))?;
            let (map, skipped) = text_to_json(&text);
            for line in &skipped {
                log::warn!("Skipping invalid line: {line}");
            }
            write_json(&map, &output)?;
            println!("Wrote {} entries to {}", map.len(), output.display());
        }
        ConvertCommand::Table { input, output } => {
            let map = table_to_json(&input)?;
            write_json(&map, &output)?;
            println!("Wrote {} entries to {}", map.len(), output.display());
        }
    }
    Ok(())
}

fn run_database(args: DatabaseArgs) -> Result<()> {
    let added = database::prepare_database(&args.input_db, &args.input_neo_orfs, &args.output_db)?;
    println!("Added {added} neoORF peptides and decoys to {}", args.output_db.display());
    Ok(())
}

fn run_manifest(args: ManifestArgs) -> Result<()> {
    let rows = manifest::create_manifest(&args.mzml_files, &args.samples_file, &args.output_file, &args.data_type)?;
    println!("Wrote {rows} manifest rows to {}", args.output_file.display());
    Ok(())
}

fn run_annotate(args: AnnotateArgs) -> Result<()> {
    let written = annotate::process_files(&args.samples_list, &args.database, &args.output_path, &args.study_id)?;
    for path in &written {
        println!("{}", path.display());
    }
    Ok(())
}

fn run_trim(args: TrimArgs) -> Result<()> {
    let options = TrimOptions::from(args);
    let report = run_schema(&options)?;
    println!("Trimmed {} pairs into {}", report.trimmed.len() / 2, options.out_dir.display());
    if !report.failed.is_empty() {
        bail!("{} samples failed: {}", report.failed.len(), report.failed.join(", "));
    }
    Ok(())
}

fn run_plot(args: PlotArgs) -> Result<()> {
    let mut state = AppState::new(ChartSpec::from(&args));
    if let Some(file) = &args.file {
        let table = load_table(file)?;
        log::info!("Loaded {} rows with columns {:?}", table.len(), table.columns);
        state.set_table(table, file);
    }
    if args.save.is_some() && state.table.is_none() {
        bail!("--save needs a table to plot");
    }
    state.save_path = args.save;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Proteolake chart viewer",
        options,
        Box::new(|_cc| Ok(Box::new(ChartViewerApp::new(state)))),
    )
    .map_err(|e| anyhow::anyhow!("chart viewer failed: {e}"))
}
