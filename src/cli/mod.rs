// ============================================================
// Layer 1: CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and routes to the use cases in
// Layer 2. Printing happens here and nowhere else.

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, InspectArgs};

use crate::data::folder::FolderConfig;

#[derive(Parser, Debug)]
#[command(
    name = "anomaly-kit",
    version = "0.1.0",
    about = "Assemble folder datasets for anomaly detection and inspect their splits."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Inspect(args) => run_inspect(args),
        }
    }
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    use crate::application::inspect_use_case::InspectUseCase;

    let manifest_dir = args.manifest_dir.clone();
    let config = match &args.config {
        Some(path) => FolderConfig::from_json_file(path)?,
        None => FolderConfig::from(args),
    };

    let report = InspectUseCase::new(config, manifest_dir).execute()?;

    println!("{:<6} {:>8} {:>8} {:>8}", "split", "normal", "abnormal", "total");
    for s in &report.splits {
        println!(
            "{:<6} {:>8} {:>8} {:>8}",
            s.split.as_str(),
            s.counts.normal,
            s.counts.abnormal,
            s.counts.total()
        );
    }
    for path in &report.manifests {
        println!("manifest: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::labels::{TaskType, TestSplitMode};

    #[test]
    fn test_flags_become_folder_config() {
        let cli = Cli::try_parse_from([
            "anomaly-kit", "inspect",
            "--normal-dir", "good",
            "--abnormal-dir", "bad",
            "--task", "detection",
            "--image-size", "128", "96",
            "--center-crop", "112", "80",
            "--test-split-mode", "synthetic",
            "--extensions", ".png,.jpg",
            "--seed", "5",
        ])
        .unwrap();

        let Commands::Inspect(args) = cli.command;
        let config = FolderConfig::from(args);
        assert_eq!(config.task, TaskType::Detection);
        assert_eq!(config.train_transform.image_size, (128, 96));
        assert_eq!(config.train_transform.center_crop, Some((112, 80)));
        assert_eq!(config.eval_transform, config.train_transform);
        assert_eq!(config.datamodule.test_split_mode, TestSplitMode::Synthetic);
        assert_eq!(config.datamodule.seed, Some(5));
        assert_eq!(config.layout.extensions, Some(vec![".png".to_string(), ".jpg".to_string()]));
    }

    #[test]
    fn test_unknown_split_mode_is_rejected() {
        let parsed = Cli::try_parse_from(["anomaly-kit", "inspect", "--val-split-mode", "sideways"]);
        assert!(parsed.is_err());
    }
}
