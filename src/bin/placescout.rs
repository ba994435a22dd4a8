use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use ps_places::{
    cleaner::{CleanerConfig, HoursFormat},
    client::{Client, SearchQuery},
    config::{ClientConfigBuilder, EndpointConfig},
    constants::{DEFAULT_KEYWORD, DEFAULT_MAX_PAGES, DEFAULT_REGION},
    etl::{self, EtlOptions, DEFAULT_ENVELOPE_VERSION},
    export,
    geo::{BoundingBox, Coordinates, AARGAU_BOUNDS, AARGAU_CENTER},
    pipeline::{Pipeline, PipelineOptions, Progress},
    region::Region,
    verify, ApiKey,
};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "placescout", about = "Collect farm shop listings from Google Places")]
struct CliArgs {
    #[command(subcommand)]
    pub subcommand: Command,

    #[command(flatten)]
    pub global_opts: GlobalOpts,
}

#[derive(Args, Debug)]
struct GlobalOpts {
    #[arg(short = 'k', long, env = "GOOGLE_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    #[arg(long, global = true, help = "Text search endpoint")]
    pub text_search_endpoint: Option<String>,

    #[arg(long, global = true, help = "Nearby search endpoint")]
    pub nearby_search_endpoint: Option<String>,

    #[arg(long, global = true, help = "Place details endpoint")]
    pub details_endpoint: Option<String>,

    #[arg(long, global = true, help = "Preferred result language, e.g. de")]
    pub language: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[clap(name = "search", about = "Search the provider and export the results")]
    Search(SearchArgs),

    #[clap(name = "etl", about = "Rebuild a validated dataset from saved files")]
    Etl(EtlArgs),

    #[clap(name = "verify", about = "Check that the API key works")]
    Verify {
        #[arg(long, help = "Print the report as JSON")]
        json: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Text,
    Nearby,
}

#[derive(Args, Debug)]
struct SearchArgs {
    #[arg(short = 'r', long, default_value = DEFAULT_REGION)]
    pub region: String,

    #[arg(short = 'q', long, default_value = DEFAULT_KEYWORD)]
    pub keyword: String,

    #[arg(short = 'm', long, value_enum, default_value_t = Mode::Text)]
    pub mode: Mode,

    #[arg(long, required_if_eq("mode", "nearby"), help = "Search radius in metres")]
    pub radius: Option<u32>,

    #[arg(long, requires = "lng", allow_negative_numbers = true)]
    pub lat: Option<f64>,

    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    pub lng: Option<f64>,

    #[arg(long, conflicts_with_all = ["lat", "lng"], help = "Cover the bounds with an N x N grid of nearby searches")]
    pub grid: Option<usize>,

    #[arg(long, default_value_t = DEFAULT_MAX_PAGES)]
    pub max_pages: u32,

    #[arg(long, default_value = "data/aargau_raw.json")]
    pub output_json: PathBuf,

    #[arg(long, default_value = "data/aargau_raw.csv")]
    pub output_csv: PathBuf,

    #[arg(long, help = "Also write canonical records")]
    pub clean: bool,

    #[arg(long, default_value = "data/aargau_cleaned.json")]
    pub cleaned_output: PathBuf,

    #[arg(long)]
    pub cleaned_csv: Option<PathBuf>,

    #[arg(long, default_value_t = HoursFormat::Weekly)]
    pub hours_format: HoursFormat,

    #[arg(long, help = "Drop results outside the bounding box")]
    pub within_bounds: bool,

    #[arg(long, help = "south,west,north,east; defaults to Aargau")]
    pub bounds: Option<BoundingBox>,
}

#[derive(Args, Debug)]
struct EtlArgs {
    #[arg(short = 'i', long)]
    pub input_dir: PathBuf,

    #[arg(short = 's', long, help = "Sample file defining the output shape")]
    pub schema_file: PathBuf,

    #[arg(short = 'o', long)]
    pub output_file: PathBuf,

    #[arg(long)]
    pub canton_folders: bool,

    #[arg(long)]
    pub metadata_envelope: bool,

    #[arg(long, default_value_t = HoursFormat::Weekly)]
    pub hours_format: HoursFormat,

    #[arg(long, default_value = DEFAULT_ENVELOPE_VERSION)]
    pub envelope_version: String,
}

impl SearchArgs {
    fn queries(&self) -> Result<Vec<SearchQuery>> {
        match self.mode {
            Mode::Text => {
                if self.radius.is_some() || self.grid.is_some() {
                    bail!("--radius and --grid only apply to --mode nearby");
                }
                Ok(vec![SearchQuery::text(&self.keyword, &self.region)])
            }
            Mode::Nearby => {
                let radius = self.radius.context("--mode nearby needs --radius")?;
                let centers = match (self.grid, self.lat.zip(self.lng)) {
                    (Some(size), _) => self.bounds.unwrap_or(AARGAU_BOUNDS).grid(size),
                    (None, Some((lat, lng))) => vec![Coordinates::new(lat, lng)],
                    (None, None) => vec![AARGAU_CENTER],
                };
                if centers.is_empty() {
                    bail!("--grid must be at least 1");
                }
                Ok(centers
                    .into_iter()
                    .map(|center| SearchQuery::nearby(&self.keyword, center, radius))
                    .collect())
            }
        }
    }
}

fn build_client(opts: &GlobalOpts, max_pages: u32) -> Result<Client> {
    let api_key = ApiKey::from_raw(opts.api_key.as_deref().unwrap_or_default())
        .context("set GOOGLE_API_KEY or pass --api-key")?;
    let http = reqwest::Client::builder().gzip(true).brotli(true).build()?;
    let mut config = ClientConfigBuilder::default();
    config
        .endpoints(EndpointConfig {
            text_search: opts.text_search_endpoint.clone(),
            nearby_search: opts.nearby_search_endpoint.clone(),
            details: opts.details_endpoint.clone(),
        })
        .max_pages(max_pages);
    if let Some(language) = &opts.language {
        config.language(language.clone());
    }
    Ok(Client::new(http, api_key, config.build()?)?)
}

async fn search(opts: &GlobalOpts, args: SearchArgs) -> Result<()> {
    let queries = args.queries()?;
    let client = build_client(opts, args.max_pages)?;

    let mut options = PipelineOptions::new(Region::new(&args.region));
    options.clean = args.clean || args.cleaned_csv.is_some();
    options.cleaner = CleanerConfig {
        hours_format: args.hours_format,
    };
    options.bounds = args
        .within_bounds
        .then(|| args.bounds.unwrap_or(AARGAU_BOUNDS));

    let progress = ProgressBar::new(0);
    progress.set_style(ProgressStyle::with_template(
        "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    )?);
    let bar = progress.clone();
    let outcome = Pipeline::new(&client, options)
        .on_progress(move |event| match event {
            Progress::QueryStarted { index, total, query } => {
                bar.set_message(format!("query {}/{total}: {query}", index + 1));
            }
            Progress::EnrichStarted { total } => {
                bar.set_length(total as u64);
                bar.set_message("fetching details");
            }
            Progress::Enriched { done, .. } => bar.set_position(done as u64),
        })
        .run(&queries)
        .await;
    progress.finish_and_clear();

    for failure in &outcome.failures {
        warn!(query = %failure.query, error = %failure.error, "query failed");
    }
    if outcome.failures.len() == queries.len() {
        bail!("all {} queries failed", queries.len());
    }

    export::write_raw_json(&args.output_json, &outcome.raw).await?;
    export::write_raw_csv(&args.output_csv, &outcome.raw).await?;
    if args.clean {
        export::write_json(&args.cleaned_output, &outcome.cleaned).await?;
    }
    if let Some(path) = &args.cleaned_csv {
        export::write_csv(path, &outcome.cleaned).await?;
    }

    println!(
        "{} place(s) in {}, {} outside, {} cleaned, {} skipped, {} failed query(s)",
        outcome.raw.len(),
        args.region,
        outcome.outside_region,
        outcome.cleaned.len(),
        outcome.skipped,
        outcome.failures.len()
    );
    Ok(())
}

async fn run_etl(args: EtlArgs) -> Result<()> {
    let mut options = EtlOptions::new(args.input_dir, args.schema_file, args.output_file);
    options.canton_folders = args.canton_folders;
    options.metadata_envelope = args.metadata_envelope;
    options.hours_format = args.hours_format;
    options.version = args.envelope_version;

    let report = etl::run(&options).await?;
    info!(output = %options.output_file.display(), "etl output written");
    println!(
        "{} file(s), {} record(s), {} duplicate(s), {} written to {}",
        report.files,
        report.records,
        report.duplicates,
        report.written,
        options.output_file.display()
    );
    for path in &report.canton_files {
        println!("  {}", path.display());
    }
    Ok(())
}

async fn run_verify(opts: &GlobalOpts, as_json: bool) -> Result<()> {
    let client = build_client(opts, 1)?;
    let report = verify::check(&client).await;

    if as_json {
        let status = report.status.as_ref().map(ToString::to_string);
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "ok": report.ok,
                "api_key": report.masked_key,
                "status": status,
                "message": report.message,
                "recommendations": report.recommendations,
            }))?
        );
    } else {
        println!("API key: {}", report.masked_key);
        println!("Request: {} {}", if report.ok { "✓" } else { "✗" }, report.message);
        for (i, advice) in report.recommendations.iter().enumerate() {
            println!("  {}. {advice}", i + 1);
        }
    }

    if !report.ok {
        bail!("API verification failed");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = CliArgs::parse();

    match args.subcommand {
        Command::Search(search_args) => search(&args.global_opts, search_args).await,
        Command::Etl(etl_args) => run_etl(etl_args).await,
        Command::Verify { json } => run_verify(&args.global_opts, json).await,
    }
}
