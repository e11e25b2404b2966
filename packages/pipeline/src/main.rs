#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the geofence latency pipeline.
//!
//! Uses `indicatif-log-bridge` (via [`latency_map_cli_utils::init_logger`])
//! so log lines and progress bars never fight for the terminal. Without a
//! subcommand an interactive menu is shown.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use latency_map_cli_utils::{IndicatifProgress, MultiProgress};
use latency_map_models::{LatLon, PolygonAxisOrder, YearMonth};
use latency_map_pipeline::interactive::{self, Action};
use latency_map_pipeline::{
    BatchProgress, FileSources, IndexMode, PipelineConfig, Stage, build_index, run_batch,
    verify_axis_order,
};

#[derive(Parser)]
#[command(name = "latency_map", about = "Geofence latency classification pipeline")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Customer whose geofences and reports are processed
    #[arg(long, global = true)]
    customer: Option<String>,
    /// Root of the raw/processed/land data directories
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Month to work on (YYYY-MM); defaults to the previous month during
    /// the first ten days, the current month otherwise
    #[arg(long, global = true)]
    month: Option<YearMonth>,
    /// Prompt for the month interactively
    #[arg(long, global = true, conflicts_with = "month")]
    manual: bool,
    /// Reports at least this many hours late count as latent
    #[arg(long, global = true)]
    latency_threshold_hours: Option<u32>,
    /// Coastline buffer in degrees
    #[arg(long, global = true)]
    land_buffer: Option<f64>,
    /// Pairing of numbers in geofence polygon strings (`lat_lon` or `lon_lat`)
    #[arg(long, global = true)]
    axis_order: Option<PolygonAxisOrder>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a month of reports and persist the results
    Process {
        /// Build the geofence index from the definition table even if a
        /// snapshot exists
        #[arg(long)]
        rebuild_index: bool,
    },
    /// Build and persist the geofence index only
    BuildIndex,
    /// Classify ad-hoc points against the persisted geofence index
    Classify {
        /// Points as `LAT,LON`
        #[arg(required = true, allow_hyphen_values = true)]
        points: Vec<String>,
    },
    /// Classify a month's reports under every polygon axis order and
    /// report which one places the most reports inside a geofence
    VerifyAxisOrder {
        /// Only use the first N reports of the month
        #[arg(long)]
        sample: Option<usize>,
    },
    /// Print the batch summary of a processed month
    Summary {
        /// Number of geofences to list, by descending severity
        #[arg(long, default_value = "10")]
        top: usize,
    },
}

impl Cli {
    fn resolve_config(&self) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
        let mut config = PipelineConfig::load(self.config.as_deref())?;
        if let Some(customer) = &self.customer {
            config.customer.clone_from(customer);
        }
        if let Some(data_dir) = &self.data_dir {
            config.data_dir.clone_from(data_dir);
        }
        if let Some(hours) = self.latency_threshold_hours {
            config.latency_threshold_hours = hours;
        }
        if let Some(buffer) = self.land_buffer {
            config.land_buffer_degrees = buffer;
        }
        if let Some(order) = self.axis_order {
            config.polygon_axis_order = order;
        }
        Ok(config)
    }

    fn resolve_month(&self) -> Result<YearMonth, Box<dyn std::error::Error>> {
        let today = chrono::Local::now().date_naive();
        if let Some(month) = self.month {
            return Ok(month);
        }
        if self.manual {
            return Ok(interactive::prompt_month(today)?);
        }
        Ok(YearMonth::default_for(today))
    }
}

fn parse_point(text: &str) -> Result<LatLon, String> {
    let (lat, lon) = text
        .split_once(',')
        .ok_or_else(|| format!("expected LAT,LON, got {text:?}"))?;
    let lat: f64 = lat.trim().parse().map_err(|_| format!("invalid latitude in {text:?}"))?;
    let lon: f64 = lon.trim().parse().map_err(|_| format!("invalid longitude in {text:?}"))?;
    Ok(LatLon::new(lat, lon))
}

async fn process(
    config: &PipelineConfig,
    month: YearMonth,
    index_mode: IndexMode,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let files = FileSources::new(config);
    let progress = BatchProgress {
        stages: IndicatifProgress::stages_bar(multi, Stage::ALL.len() as u64),
        reports: IndicatifProgress::reports_bar(multi, "Classifying reports"),
    };

    let output = run_batch(config, month, files.sources(), index_mode, &progress).await?;
    print_summary(&output.summary, &output.stats, 10);
    for path in &output.written {
        println!("  wrote {}", path.display());
    }
    Ok(())
}

async fn build_index_only(config: &PipelineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let files = FileSources::new(config);
    let index = build_index(config, files.sources().geofences, &config.retry.policy()).await?;
    let path = latency_map_database::save_index(&config.data_dir, &config.customer, &index)?;
    println!("Indexed {} geofences into {}", index.len(), path.display());
    Ok(())
}

fn classify(config: &PipelineConfig, points: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let index = latency_map_database::load_index(&config.data_dir, &config.customer)?;
    for text in points {
        let point = parse_point(text)?;
        println!("{text}\t{}", index.lookup(point).unwrap_or("-"));
    }
    Ok(())
}

async fn check_axis_order(
    config: &PipelineConfig,
    month: YearMonth,
    sample: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let files = FileSources::new(config);
    let sources = files.sources();
    let check =
        verify_axis_order(config, month, sources.reports, sources.geofences, sample).await?;

    println!("{} {month}: {} reports", config.customer, check.positions);
    for result in &check.results {
        let marker = if result.order == config.polygon_axis_order {
            " (configured)"
        } else {
            ""
        };
        println!(
            "  {:<8} {:>8} inside a geofence{marker}",
            result.order.as_ref(),
            result.matched
        );
    }
    match check.best() {
        Some(order) if order == config.polygon_axis_order => {
            println!("The configured axis order {order} matches best.");
        }
        Some(order) => {
            println!("Recommended: polygon_axis_order = \"{order}\" (or --axis-order {order}).");
        }
        None => println!("No report fell inside any geofence under either axis order."),
    }
    Ok(())
}

fn summary(
    config: &PipelineConfig,
    month: YearMonth,
    top: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let artifacts = latency_map_database::load_month(&config.data_dir, &config.customer, month)?;
    let summary = latency_map_analytics::summarize(
        &artifacts.reports,
        artifacts.stats.len(),
        config.latency_threshold(),
    );
    println!("{} {} ({})", config.customer, month, month.month_name());
    print_summary(&summary, &artifacts.stats, top);
    Ok(())
}

fn print_summary(
    summary: &latency_map_models::BatchSummary,
    stats: &[latency_map_models::GeofenceStat],
    top: usize,
) {
    println!();
    println!("Reports:            {}", summary.total_reports);
    println!("Devices:            {}", summary.unique_devices);
    println!("Geofences:          {}", summary.total_geofences);
    println!(
        "On land:            {} ({:.1}%)",
        summary.land_reports, summary.land_pct
    );
    println!(
        "Late on land:       {} ({:.1}%)",
        summary.land_latency_reports, summary.land_latency_pct
    );
    if summary.geofence_at_sea_conflicts > 0 {
        println!(
            "Geofenced at sea:   {} (check land geometry / axis order)",
            summary.geofence_at_sea_conflicts
        );
    }

    let mut ranked: Vec<_> = stats.iter().filter(|s| s.total_messages > 0).collect();
    ranked.sort_by(|a, b| b.severity.total_cmp(&a.severity).then_with(|| a.name.cmp(&b.name)));
    if ranked.is_empty() || top == 0 {
        return;
    }

    println!();
    println!(
        "{:<32} {:>8} {:>8} {:>9} {:>9} {:>8}",
        "GEOFENCE", "MSGS", "DEVICES", "LATE MSG%", "LATE DEV%", "SEVERITY"
    );
    println!("{}", "-".repeat(79));
    for stat in ranked.into_iter().take(top) {
        println!(
            "{:<32} {:>8} {:>8} {:>9.1} {:>9.1} {:>8.1}",
            stat.name,
            stat.total_messages,
            stat.total_devices,
            stat.latency_message_ratio,
            stat.latency_device_ratio,
            stat.severity
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = latency_map_cli_utils::init_logger();
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    let Some(command) = &cli.command else {
        println!("Latency Map ({})", config.customer);
        println!();
        let action = interactive::select_action()?;
        let today = chrono::Local::now().date_naive();
        let month = interactive::month_for(action, cli.month, today)?;
        match action {
            Action::Process => process(&config, month, IndexMode::Reuse, &multi).await?,
            Action::RebuildAndProcess => {
                process(&config, month, IndexMode::Rebuild, &multi).await?;
            }
            Action::BuildIndex => build_index_only(&config).await?,
            Action::VerifyAxisOrder => check_axis_order(&config, month, None).await?,
            Action::Summary => summary(&config, month, 10)?,
        }
        return Ok(());
    };

    match command {
        Commands::Process { rebuild_index } => {
            let mode = if *rebuild_index {
                IndexMode::Rebuild
            } else {
                IndexMode::Reuse
            };
            process(&config, cli.resolve_month()?, mode, &multi).await?;
        }
        Commands::BuildIndex => build_index_only(&config).await?,
        Commands::Classify { points } => classify(&config, points)?,
        Commands::VerifyAxisOrder { sample } => {
            check_axis_order(&config, cli.resolve_month()?, *sample).await?;
        }
        Commands::Summary { top } => summary(&config, cli.resolve_month()?, *top)?,
    }

    Ok(())
}
