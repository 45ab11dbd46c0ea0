mod backend;
mod volume_io;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use burn::{config::Config, tensor::backend::Backend};
use clap::{Parser, Subcommand, ValueEnum};
use lesion_metric::{evaluate, mask_union, Connectivity, LesionReport, ScoringConfig};
use tracing_subscriber::EnvFilter;

use crate::{
    backend::{create_device, SelectedBackend, BACKEND_NAME},
    volume_io::{ensure_compatible, VolumeDocument},
};

#[derive(Parser)]
#[command(name = "lesion-score")]
#[command(about = "Scores predicted lesion masks against ground truth")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a prediction against the truth and print JSON reports
    Score {
        /// Ground-truth volume (JSON)
        #[arg(short, long)]
        truth: PathBuf,

        /// Predicted volume (JSON)
        #[arg(short, long)]
        prediction: PathBuf,

        /// Scoring configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Score each entry of the leading axis separately (`--batchwise=false`
        /// overrides a config file)
        #[arg(short, long, num_args = 0..=1, default_missing_value = "true")]
        batchwise: Option<bool>,

        /// Neighbourhood used to separate lesions
        #[arg(long, value_enum)]
        connectivity: Option<ConnectivityArg>,
    },

    /// Merge two masks into their voxel-wise union
    Union {
        #[arg(long)]
        a: PathBuf,

        #[arg(long)]
        b: PathBuf,

        /// Output volume (JSON)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show backend information
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ConnectivityArg {
    Face,
    Edge,
    Full,
}

impl From<ConnectivityArg> for Connectivity {
    fn from(arg: ConnectivityArg) -> Self {
        match arg {
            ConnectivityArg::Face => Self::Face,
            ConnectivityArg::Edge => Self::Edge,
            ConnectivityArg::Full => Self::Full,
        }
    }
}

/// Calls `$run::<B, D>` with the rank of `$volume` as `D`.
macro_rules! with_rank {
    ($volume:expr, $run:ident::<$backend:ty>($($arg:expr),*)) => {
        match $volume.rank() {
            1 => $run::<$backend, 1>($($arg),*),
            2 => $run::<$backend, 2>($($arg),*),
            3 => $run::<$backend, 3>($($arg),*),
            4 => $run::<$backend, 4>($($arg),*),
            5 => $run::<$backend, 5>($($arg),*),
            rank => Err(anyhow!("rank {rank} is not supported")),
        }
    };
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let device = create_device();

    match cli.command {
        Commands::Score {
            truth,
            prediction,
            config,
            batchwise,
            connectivity,
        } => {
            let config = scoring_config(config.as_deref(), batchwise, connectivity)?;
            let truth = VolumeDocument::load(&truth)?;
            let prediction = VolumeDocument::load(&prediction)?;
            ensure_compatible(&truth, &prediction)?;

            tracing::info!(
                backend = BACKEND_NAME,
                shape = ?truth.shape,
                batchwise = config.batchwise,
                connectivity = ?config.connectivity,
                "scoring volumes"
            );
            let reports = with_rank!(
                truth,
                score::<SelectedBackend>(&truth, &prediction, &config, &device)
            )?;
            println!("{}", serde_json::to_string_pretty(&reports)?);
            Ok(())
        }

        Commands::Union { a, b, output } => {
            let a = VolumeDocument::load(&a)?;
            let b = VolumeDocument::load(&b)?;
            ensure_compatible(&a, &b)?;

            let merged = with_rank!(a, union_masks::<SelectedBackend>(&a, &b, &device))?;
            merged.save(&output)?;
            tracing::info!(output = %output.display(), "wrote union mask");
            Ok(())
        }

        Commands::Info => {
            println!("Lesion scorer information:");
            println!("  Backend: {BACKEND_NAME}");
            println!("  Device: {device:?}");
            Ok(())
        }
    }
}

/// Loads the configuration file, if any, and applies command-line overrides.
fn scoring_config(
    path: Option<&Path>,
    batchwise: Option<bool>,
    connectivity: Option<ConnectivityArg>,
) -> Result<ScoringConfig> {
    let mut config = match path {
        Some(path) => ScoringConfig::load(path)
            .map_err(|err| anyhow!("failed to load config {}: {err:?}", path.display()))?,
        None => ScoringConfig::new(),
    };
    if let Some(batchwise) = batchwise {
        config.batchwise = batchwise;
    }
    if let Some(connectivity) = connectivity {
        config.connectivity = connectivity.into();
    }
    Ok(config)
}

fn score<B: Backend, const D: usize>(
    truth: &VolumeDocument,
    prediction: &VolumeDocument,
    config: &ScoringConfig,
    device: &B::Device,
) -> Result<Vec<LesionReport>> {
    let truth = truth.to_tensor::<B, D>(device)?;
    let prediction = prediction.to_tensor::<B, D>(device)?;
    Ok(evaluate(truth, prediction, config)?)
}

fn union_masks<B: Backend, const D: usize>(
    a: &VolumeDocument,
    b: &VolumeDocument,
    device: &B::Device,
) -> Result<VolumeDocument> {
    let a = a.to_tensor::<B, D>(device)?;
    let b = b.to_tensor::<B, D>(device)?;
    VolumeDocument::from_tensor(mask_union(a, b)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn cli_parses_score_command() {
        let cli = Cli::try_parse_from([
            "lesion-score",
            "score",
            "--truth",
            "truth.json",
            "--prediction",
            "pred.json",
            "--batchwise",
            "--connectivity",
            "full",
        ])
        .unwrap();

        match cli.command {
            Commands::Score {
                truth,
                batchwise,
                connectivity,
                config,
                ..
            } => {
                assert_eq!(truth, PathBuf::from("truth.json"));
                assert_eq!(batchwise, Some(true));
                assert_eq!(connectivity, Some(ConnectivityArg::Full));
                assert!(config.is_none());
            }
            _ => panic!("expected score command"),
        }
    }

    #[test]
    fn cli_parses_explicit_batchwise_false() {
        let cli = Cli::try_parse_from([
            "lesion-score",
            "score",
            "-t",
            "truth.json",
            "-p",
            "pred.json",
            "--batchwise=false",
        ])
        .unwrap();

        match cli.command {
            Commands::Score { batchwise, .. } => assert_eq!(batchwise, Some(false)),
            _ => panic!("expected score command"),
        }
    }

    #[test]
    fn scoring_config_applies_overrides() {
        let config = scoring_config(None, Some(true), Some(ConnectivityArg::Edge)).unwrap();
        assert!(config.batchwise);
        assert_eq!(config.connectivity, Connectivity::Edge);

        let config = scoring_config(None, None, None).unwrap();
        assert!(!config.batchwise);
        assert_eq!(config.connectivity, Connectivity::Face);
    }

    #[test]
    fn scoring_config_file_is_loaded_then_overridden() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scoring.json");
        ScoringConfig::new()
            .with_batchwise(true)
            .with_connectivity(Connectivity::Full)
            .save(&path)
            .unwrap();

        let config = scoring_config(Some(path.as_path()), None, None).unwrap();
        assert!(config.batchwise);
        assert_eq!(config.connectivity, Connectivity::Full);

        let config = scoring_config(Some(path.as_path()), Some(false), Some(ConnectivityArg::Face)).unwrap();
        assert!(!config.batchwise);
        assert_eq!(config.connectivity, Connectivity::Face);
    }

    #[test]
    fn scoring_config_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scoring_config(Some(dir.path().join("absent.json").as_path()), None, None).is_err());
    }

    #[test]
    fn score_dispatches_on_rank() {
        let truth = VolumeDocument {
            shape: vec![1, 5],
            data: vec![1.0, 0.0, 1.0, 0.0, 0.0],
        };
        let prediction = VolumeDocument {
            shape: vec![1, 5],
            data: vec![1.0, 0.0, 0.0, 0.0, 0.0],
        };
        let config = ScoringConfig::new();
        let device = Default::default();

        let reports: Result<Vec<LesionReport>> =
            with_rank!(truth, score::<NdArray>(&truth, &prediction, &config, &device));
        let reports = reports.unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].true_lesions, 2);
        assert_eq!(reports[0].predicted_lesions, 1);
        assert_eq!(reports[0].weighted_assignment, 0.5);
    }

    #[test]
    fn union_merges_masks() {
        let a = VolumeDocument {
            shape: vec![4],
            data: vec![1.0, 0.0, 0.0, 0.0],
        };
        let b = VolumeDocument {
            shape: vec![4],
            data: vec![0.0, 0.0, 3.0, 0.0],
        };

        let merged = union_masks::<NdArray, 1>(&a, &b, &Default::default()).unwrap();
        assert_eq!(merged.shape, vec![4]);
        assert_eq!(merged.data, vec![1.0, 0.0, 1.0, 0.0]);
    }
}
