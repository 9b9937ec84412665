//! CLI argument definitions.

use crate::cli::validators::{parse_latitude, parse_longitude, parse_threshold};
use crate::inference::Mode;
use crate::taxonomy::RankType;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Stable taxon identification from hierarchical classifier output.
#[derive(Debug, Parser)]
#[command(name = "taxalens")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Logging options.
    #[command(flatten)]
    pub log: LogArgs,
}

/// Verbosity flags shared by every subcommand.
#[derive(Debug, Args)]
pub struct LogArgs {
    /// Only log errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase verbosity (-v: debug, -vv: trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage configuration.
    Config {
        /// Configuration action to perform.
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Run the still-image path on a recorded raw classifier result.
    Image(ImageArgs),
    /// Run the still-image path on recorded leaf scores through a taxonomy.
    Scores(ScoresArgs),
    /// Stabilize a recording of per-frame raw results.
    Replay(ReplayArgs),
    /// Print the canonical grid location for a coordinate.
    Cell(CellArgs),
}

/// Config subcommand actions.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigAction {
    /// Create default configuration file.
    Init,
    /// Display current configuration.
    Show,
    /// Print configuration file path.
    Path,
}

/// Options shared by commands that produce predictions.
#[derive(Debug, Args)]
pub struct RequestArgs {
    /// Model version (1.0, 2.3, 2.4, 2.13, small_2).
    #[arg(long, env = "TAXALENS_VERSION")]
    pub model_version: Option<String>,

    /// Confidence threshold (0-100, or 0-1 for version 1.0).
    #[arg(short = 'c', long, value_parser = parse_threshold, env = "TAXALENS_CONFIDENCE")]
    pub confidence: Option<f64>,

    /// Restrict predictions to this taxon's subtree.
    #[arg(long)]
    pub taxon: Option<u32>,

    /// Exclude the --taxon subtree instead of restricting to it.
    #[arg(long, requires = "taxon")]
    pub exclude_taxon: bool,
}

/// Options for still-image commands.
#[derive(Debug, Args)]
pub struct ImageModeArgs {
    /// Best branch or common ancestor.
    #[arg(short, long, value_enum)]
    pub mode: Option<Mode>,

    /// Ranks eligible as common ancestor.
    #[arg(long, value_enum)]
    pub rank_type: Option<RankType>,
}

/// Arguments for the image command.
#[derive(Debug, Args)]
pub struct ImageArgs {
    /// Raw classifier result (JSON).
    pub input: PathBuf,

    /// Mode options.
    #[command(flatten)]
    pub image: ImageModeArgs,

    /// Request options.
    #[command(flatten)]
    pub request: RequestArgs,
}

/// Arguments for the scores command.
#[derive(Debug, Args)]
pub struct ScoresArgs {
    /// Recorded leaf scores (`{"vision": [...], "geo": [...]}`).
    pub input: PathBuf,

    /// Taxonomy CSV (overrides config).
    #[arg(short, long, env = "TAXALENS_TAXONOMY")]
    pub taxonomy: Option<PathBuf>,

    /// Latitude; combines the recorded geomodel scores.
    #[arg(long, value_parser = parse_latitude, requires = "lon", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Longitude; combines the recorded geomodel scores.
    #[arg(long, value_parser = parse_longitude, requires = "lat", allow_hyphen_values = true)]
    pub lon: Option<f64>,

    /// Elevation table JSON (overrides config).
    #[arg(long)]
    pub elevation_table: Option<PathBuf>,

    /// Score the location with the geomodel alone, ignoring vision scores.
    #[arg(long, requires = "lat")]
    pub location_only: bool,

    /// Mode options.
    #[command(flatten)]
    pub image: ImageModeArgs,

    /// Request options.
    #[command(flatten)]
    pub request: RequestArgs,
}

/// Arguments for the replay command.
#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// Per-frame raw results, one JSON object per line.
    pub input: PathBuf,

    /// Frames kept for stabilization.
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    pub buffer_size: Option<u64>,

    /// Request options.
    #[command(flatten)]
    pub request: RequestArgs,
}

/// Arguments for the cell command.
#[derive(Debug, Args)]
pub struct CellArgs {
    /// Latitude (-90.0 to 90.0).
    #[arg(long, value_parser = parse_latitude, allow_hyphen_values = true)]
    pub lat: f64,

    /// Longitude (-180.0 to 180.0).
    #[arg(long, value_parser = parse_longitude, allow_hyphen_values = true)]
    pub lon: f64,

    /// Elevation table JSON (overrides config).
    #[arg(long)]
    pub elevation_table: Option<PathBuf>,

    /// Also print the geomodel input features.
    #[arg(long)]
    pub features: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_image_command() {
        let cli = Cli::try_parse_from([
            "taxalens",
            "image",
            "raw.json",
            "--mode",
            "common-ancestor",
            "--rank-type",
            "major",
            "-c",
            "60",
        ])
        .unwrap();
        let Command::Image(args) = cli.command else {
            panic!("expected image command");
        };
        assert_eq!(args.input, PathBuf::from("raw.json"));
        assert_eq!(args.image.mode, Some(Mode::CommonAncestor));
        assert_eq!(args.image.rank_type, Some(RankType::Major));
        assert_eq!(args.request.confidence, Some(60.0));
    }

    #[test]
    fn test_parse_replay_rejects_zero_buffer() {
        let result = Cli::try_parse_from(["taxalens", "replay", "f.jsonl", "--buffer-size", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_cell_negative_coordinates() {
        let cli =
            Cli::try_parse_from(["taxalens", "cell", "--lat", "-33.9", "--lon", "151.2"]).unwrap();
        let Command::Cell(args) = cli.command else {
            panic!("expected cell command");
        };
        assert!((args.lat + 33.9).abs() < 1e-9);
    }

    #[test]
    fn test_exclude_taxon_requires_taxon() {
        let result = Cli::try_parse_from(["taxalens", "image", "raw.json", "--exclude-taxon"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_scores_location_only_requires_coordinates() {
        let result = Cli::try_parse_from(["taxalens", "scores", "s.json", "--location-only"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from([
            "taxalens",
            "scores",
            "s.json",
            "--lat",
            "45.5",
            "--lon",
            "-122.6",
            "--location-only",
        ])
        .unwrap();
        let Command::Scores(args) = cli.command else {
            panic!("expected scores command");
        };
        assert!(args.location_only);
        assert_eq!(args.lon, Some(-122.6));
    }

    #[test]
    fn test_global_verbosity() {
        let cli = Cli::try_parse_from(["taxalens", "config", "path", "-vv"]).unwrap();
        assert_eq!(cli.log.verbose, 2);
    }
}
