//! Taxalens - stable taxon identification from hierarchical classifiers.
//!
//! This crate turns raw taxonomic classifier output into answers a user can
//! act on: frame results are stabilized over a short history, predictions
//! are rolled up to the most specific confident taxon, still images can be
//! reduced to a common ancestor, and locations are snapped to a grid cell
//! before they reach the geomodel.

#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod geo;
pub mod inference;
pub mod output;
pub mod pipeline;
pub mod stabilize;
pub mod taxonomy;

use clap::Parser;
use cli::{CellArgs, Cli, Command, ImageArgs, ImageModeArgs, ReplayArgs, RequestArgs, ScoresArgs};
use config::{
    Config, config_file_path, load_default_config, save_default_config, validate_config,
};
use geo::{CellResolver, ElevationTable, H3Grid, Location};
use inference::{
    Frame, ImageOptions, ImageSource, LocationOptions, RecordedClassifier, RecordedScores,
    RequestOptions, TaxonomyClassifier,
};
use output::{CellPayload, EventType, FramePayload, JsonWriter, ReplaySummary, ResultType};
use pipeline::VisionEngine;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use taxonomy::Taxonomy;
use tracing::{debug, info};

pub use error::{Error, Result};

/// Main entry point for the taxalens CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.log.verbose, cli.log.quiet);

    if let Command::Config { action } = cli.command {
        return handle_config_command(action);
    }

    let config = load_default_config()?;
    validate_config(&config)?;

    handle_command(cli.command, &config)
}

/// Initialize logging based on verbosity.
///
/// Logs go to stderr so stdout carries only JSON output.
fn init_logging(verbose: u8, quiet: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter_str = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn,taxalens=info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn handle_command(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Config { action } => handle_config_command(action),
        Command::Image(args) => handle_image_command(&args, config),
        Command::Scores(args) => handle_scores_command(&args, config),
        Command::Replay(args) => handle_replay_command(&args, config),
        Command::Cell(args) => handle_cell_command(&args, config),
    }
}

fn handle_config_command(action: cli::ConfigAction) -> Result<()> {
    use cli::ConfigAction;

    match action {
        ConfigAction::Init => {
            let path = config_file_path()?;
            if path.exists() {
                println!("Configuration file already exists: {}", path.display());
            } else {
                let saved_path = save_default_config(&Config::default())?;
                println!("Created configuration file: {}", saved_path.display());
            }
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_default_config()?;
            JsonWriter::stdout().emit_result(ResultType::Config, &config)
        }
        ConfigAction::Path => {
            let path = config_file_path()?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn handle_image_command(args: &ImageArgs, config: &Config) -> Result<()> {
    let classifier = RecordedClassifier::from_path(&args.input)?;
    let engine = VisionEngine::new(Arc::new(classifier)).with_resolver(build_resolver(None, config)?);

    let options = image_options(&args.input, &args.image, &args.request, None, config);
    let result = block_on(engine.predictions_for_image(options))?;
    JsonWriter::stdout().emit_result(ResultType::Image, &result)
}

fn handle_scores_command(args: &ScoresArgs, config: &Config) -> Result<()> {
    let taxonomy_path = args
        .taxonomy
        .as_ref()
        .or(config.taxonomy.path.as_ref())
        .ok_or_else(|| Error::ConfigValidation {
            message: "no taxonomy specified (use --taxonomy or set taxonomy.path in config)"
                .to_string(),
        })?;
    let taxonomy = Arc::new(Taxonomy::from_path(taxonomy_path)?);

    let (vision, geo) = RecordedScores::from_path(&args.input)?.into_scorers();
    let mut classifier = TaxonomyClassifier::new(taxonomy, vision);
    if let Some(geo) = geo {
        classifier = classifier.with_geomodel(geo);
    }
    let classifier = Arc::new(classifier);

    let engine = VisionEngine::new(Arc::clone(&classifier) as Arc<dyn inference::Classifier>)
        .with_geomodel(classifier)
        .with_resolver(build_resolver(args.elevation_table.as_deref(), config)?);

    let location = args.lat.zip(args.lon).map(|(lat, lon)| Location::new(lat, lon));

    if args.location_only {
        let location = location.ok_or(Error::MissingLocation)?;
        let mut options = LocationOptions::new(location);
        if let Some(version) = &args.request.model_version {
            options.version.clone_from(version);
        }
        let result = block_on(engine.predictions_for_location(options))?;
        return JsonWriter::stdout().emit_result(ResultType::Geomodel, &result);
    }

    let options = image_options(&args.input, &args.image, &args.request, location, config);
    let result = block_on(engine.predictions_for_image(options))?;
    JsonWriter::stdout().emit_result(ResultType::Image, &result)
}

fn handle_replay_command(args: &ReplayArgs, config: &Config) -> Result<()> {
    let classifier = RecordedClassifier::from_path(&args.input)?;
    let frames = classifier.len();

    let buffer_size = args
        .buffer_size
        .map_or(config.defaults.buffer_size, |size| {
            usize::try_from(size).unwrap_or(usize::MAX)
        });

    let engine = VisionEngine::new(Arc::new(classifier)).with_resolver(build_resolver(None, config)?);
    let session = engine.frame_session(buffer_size)?;
    let options = request_options(&args.request, None, config);

    info!(
        "Replaying {frames} frames from {} (buffer size {buffer_size})",
        args.input.display()
    );

    let mut writer = JsonWriter::stdout();
    let frame = Frame::default();
    let mut stabilized = 0;
    for index in 0..frames {
        let result = session.process_frame(&frame, &options)?;
        if result.is_some() {
            stabilized += 1;
        }
        writer.emit(EventType::Frame, &FramePayload { index, result })?;
    }

    writer.emit_result(ResultType::Replay, &ReplaySummary { frames, stabilized })
}

fn handle_cell_command(args: &CellArgs, config: &Config) -> Result<()> {
    let resolver = build_resolver(args.elevation_table.as_deref(), config)?;
    let location = resolver.resolve(&Location::new(args.lat, args.lon))?;
    let features = args.features.then(|| location.features());
    JsonWriter::stdout().emit_result(ResultType::Cell, &CellPayload { location, features })
}

/// Cell resolver from the elevation table override or the configured one.
fn build_resolver(elevation_table: Option<&Path>, config: &Config) -> Result<CellResolver> {
    let table = match elevation_table.or(config.geo.elevation_table.as_deref()) {
        Some(path) => ElevationTable::from_path(path)?,
        None => {
            debug!("No elevation table configured, elevations will be unknown");
            ElevationTable::default()
        }
    };
    Ok(CellResolver::new(Arc::new(H3Grid), Arc::new(table)))
}

/// Request options: command-line values over configured defaults.
fn request_options(args: &RequestArgs, location: Option<Location>, config: &Config) -> RequestOptions {
    let mut options = config.defaults.request_options();
    if let Some(version) = &args.model_version {
        options.version.clone_from(version);
    }
    if let Some(confidence) = args.confidence {
        options.confidence_threshold = confidence;
    }
    options.filter_by_taxon_id = args.taxon;
    options.negative_filter = args.exclude_taxon;
    options.use_geomodel = location.is_some();
    options.location = location;
    options
}

fn image_options(
    input: &Path,
    mode: &ImageModeArgs,
    request: &RequestArgs,
    location: Option<Location>,
    config: &Config,
) -> ImageOptions {
    let mut options = ImageOptions::new(ImageSource::Path(PathBuf::from(input)));
    options.request = request_options(request, location, config);
    options.mode = mode.mode.unwrap_or(config.defaults.mode);
    options.rank_type = mode.rank_type.unwrap_or(config.defaults.rank_type);
    options
}

fn block_on<T>(future: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    let runtime = tokio::runtime::Runtime::new().map_err(|e| Error::Internal {
        message: format!("Failed to create async runtime: {e}"),
    })?;
    runtime.block_on(future)
}
