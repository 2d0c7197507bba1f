//! Cropniche CLI - thermal-niche reconstruction of crop cultivars.
//!
//! Fits per-cultivar niche models from station temperatures, projects them
//! through a paleotemperature proxy record and aggregates them by crop.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Instant;

use cropniche::pipeline::{
    cultivar_states, AggregateStage, ExportStage, FitStage, InputPaths, Pipeline, ProjectStage,
    RunConfig, RunInputs, RunState,
};
use cropniche::cultivar::load_cultivars;
use cropniche::projection::ProxyUnits;
use cropniche::store::ArtifactStore;
use cropniche::synth::{generate, write_dataset, SynthConfig};

/// Thermal-niche reconstruction of crop cultivars.
#[derive(Parser)]
#[command(name = "cropniche")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit, project and aggregate every cultivar (and export if --output is set).
    Run {
        #[command(flatten)]
        common: CommonArgs,

        /// Output directory for PNG layers and the summary table.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Fit niche models for cultivars that have none.
    Fit {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Project fitted models through the proxy record.
    Project {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Average reconstructions of cultivars sharing a crop.
    Aggregate {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Export PNG layers and summary statistics.
    Export {
        #[command(flatten)]
        common: CommonArgs,

        /// Output directory.
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,
    },
    /// Show the state of every cultivar in the store.
    Status {
        /// Cultivar definitions (JSON array).
        #[arg(long)]
        cultivars: PathBuf,

        /// Artifact store directory.
        #[arg(long, default_value = "./artifacts")]
        store: PathBuf,
    },
    /// Write a seeded synthetic study area.
    Synth {
        /// Output directory for the generated inputs.
        #[arg(short, long, default_value = "./synthetic")]
        output: PathBuf,

        /// Random seed for reproducible generation.
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Generate a small area for quick runs.
        #[arg(long)]
        small: bool,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Station metadata CSV (id,lon,lat,elevation_m).
    #[arg(long)]
    stations: Option<PathBuf>,

    /// Daily temperature CSV (station_id,date,tmin_c,tmax_c).
    #[arg(long)]
    daily: Option<PathBuf>,

    /// Elevation grid header (JSON sidecar of a RAW f32 body).
    #[arg(long)]
    elevation: Option<PathBuf>,

    /// Proxy record CSV (years_bp,lower,central,upper).
    #[arg(long)]
    proxy: Option<PathBuf>,

    /// Cultivar definitions (JSON array).
    #[arg(long)]
    cultivars: PathBuf,

    /// Run configuration (JSON); missing fields take defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Artifact store directory.
    #[arg(long, default_value = "./artifacts")]
    store: PathBuf,

    /// Discard the artifacts this command produces (and those derived from them) and recompute.
    #[arg(long)]
    force: bool,

    /// Worker threads for model fitting (0 = one per core).
    #[arg(long)]
    fit_workers: Option<usize>,

    /// Worker threads for projection and aggregation.
    #[arg(long)]
    project_workers: Option<usize>,

    /// Degrees per SD unit of the proxy record.
    #[arg(long)]
    sd_scale: Option<f64>,

    /// Units of the proxy record.
    #[arg(long)]
    proxy_units: Option<ProxyUnitsArg>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProxyUnitsArg {
    /// Anomalies already in standard-deviation units.
    Standardized,
    /// Anomalies in °C.
    Celsius,
}

impl From<ProxyUnitsArg> for ProxyUnits {
    fn from(arg: ProxyUnitsArg) -> Self {
        match arg {
            ProxyUnitsArg::Standardized => ProxyUnits::Standardized,
            ProxyUnitsArg::Celsius => ProxyUnits::Celsius,
        }
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { common, output } => {
            let config = build_config(&common);
            run_pipeline("run", &common, Pipeline::full(config, output));
        }
        Commands::Fit { common } => {
            let mut pipeline = Pipeline::new(build_config(&common));
            pipeline.add_stage(FitStage);
            run_pipeline("fit", &common, pipeline);
        }
        Commands::Project { common } => {
            let mut pipeline = Pipeline::new(build_config(&common));
            pipeline.add_stage(ProjectStage);
            run_pipeline("project", &common, pipeline);
        }
        Commands::Aggregate { common } => {
            let mut pipeline = Pipeline::new(build_config(&common));
            pipeline.add_stage(AggregateStage);
            run_pipeline("aggregate", &common, pipeline);
        }
        Commands::Export { common, output } => {
            let mut pipeline = Pipeline::new(build_config(&common));
            pipeline.add_stage(ExportStage::new(output));
            run_pipeline("export", &common, pipeline);
        }
        Commands::Status { cultivars, store } => {
            run_status(cultivars, store);
        }
        Commands::Synth { output, seed, small } => {
            run_synth(output, seed, small);
        }
    }
}

/// Loads the configuration file (if any) and applies command-line overrides.
fn build_config(common: &CommonArgs) -> RunConfig {
    let mut config = match &common.config {
        Some(path) => RunConfig::load(path).unwrap_or_else(|e| {
            eprintln!("Error loading config {}: {}", path.display(), e);
            std::process::exit(1);
        }),
        None => RunConfig::default(),
    };

    if common.force {
        config.force = true;
    }
    if let Some(n) = common.fit_workers {
        config.fit_workers = n;
    }
    if let Some(n) = common.project_workers {
        config.project_workers = n;
    }
    if let Some(scale) = common.sd_scale {
        config.sd_scale_c = Some(scale);
    }
    if let Some(units) = common.proxy_units {
        config.proxy_units = units.into();
    }

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    config
}

fn run_pipeline(command: &str, common: &CommonArgs, pipeline: Pipeline) {
    println!("Cropniche - Thermal Niche Reconstruction");
    println!("========================================");
    println!("Command: {}", command);
    println!("Store: {}", common.store.display());
    println!(
        "Perturbation levels: {}..={} SD",
        pipeline.config().perturbation_min,
        pipeline.config().perturbation_max
    );

    let start = Instant::now();

    let paths = InputPaths {
        stations: common.stations.clone(),
        daily: common.daily.clone(),
        elevation: common.elevation.clone(),
        proxy: common.proxy.clone(),
        cultivars: Some(common.cultivars.clone()),
    };

    println!("\nLoading inputs...");
    let inputs = RunInputs::load(&paths, pipeline.config()).unwrap_or_else(|e| {
        eprintln!("Error loading inputs: {}", e);
        std::process::exit(1);
    });
    println!("  Cultivars: {}", inputs.cultivars.len());
    if let Some(stations) = &inputs.stations {
        println!("  Stations: {}", stations.len());
    }
    if let Some(proxy) = &inputs.proxy {
        println!("  Proxy time steps: {}", proxy.len());
    }

    let store = ArtifactStore::open(&common.store).unwrap_or_else(|e| {
        eprintln!("Error opening artifact store: {}", e);
        std::process::exit(1);
    });
    let mut run = RunState::new(store, inputs);

    println!("\nRunning pipeline...");
    pipeline
        .run_with_callbacks(
            &mut run,
            |name, i, total| {
                println!("  [{}/{}] Starting: {}", i + 1, total, name);
            },
            |name, i, total| {
                println!("  [{}/{}] Completed: {}", i + 1, total, name);
            },
        )
        .unwrap_or_else(|e| {
            eprintln!("Error during {}: {}", command, e);
            std::process::exit(1);
        });

    if !run.exported.is_empty() {
        println!("\nExported {} files", run.exported.len());
    }
    println!("Completed in {:.2?}", start.elapsed());
}

fn run_status(cultivars: PathBuf, store: PathBuf) {
    let cultivars = load_cultivars(&cultivars).unwrap_or_else(|e| {
        eprintln!("Error loading cultivars: {}", e);
        std::process::exit(1);
    });
    let store = ArtifactStore::open(&store).unwrap_or_else(|e| {
        eprintln!("Error opening artifact store: {}", e);
        std::process::exit(1);
    });

    println!("Cultivar status ({})", store.root().display());
    println!("{:<24} {:<16} state", "cultivar", "crop");
    for (cultivar, (id, state)) in cultivars.iter().zip(cultivar_states(&store, &cultivars)) {
        println!("{:<24} {:<16} {}", id, cultivar.crop, state);
    }
}

fn run_synth(output: PathBuf, seed: u64, small: bool) {
    let config = if small {
        SynthConfig::small(seed)
    } else {
        SynthConfig {
            seed,
            ..SynthConfig::default()
        }
    };

    println!("Cropniche - Synthetic Study Area");
    println!("================================");
    println!(
        "Grid: {}x{} cells of {}°",
        config.grid.ncols, config.grid.nrows, config.grid.cell_size
    );
    println!("Stations: {}", config.station_count);
    println!("Seed: {}", seed);

    let dataset = generate(&config).unwrap_or_else(|e| {
        eprintln!("Error generating dataset: {}", e);
        std::process::exit(1);
    });
    let paths = write_dataset(&dataset, &output).unwrap_or_else(|e| {
        eprintln!("Error writing dataset: {}", e);
        std::process::exit(1);
    });

    println!("\nWrote:");
    for path in [&paths.elevation, &paths.stations, &paths.daily, &paths.proxy, &paths.cultivars] {
        println!("  {}", path.display());
    }
    println!("Daily records: {}..={}", config.first_year, config.last_year);
}
