use crate::commands::command::Command;
use anyhow::{Result, bail};
use clap::Parser;
use log::info;
use srhelper_lib::config::PipelineConfig;
use std::path::PathBuf;

/// Writes an example pipeline configuration to edit.
///
/// The configuration is a JSON object with the keys below.  Directories may start with `~`.
///
/// - `pipeline name`: free text naming the pipeline
/// - `sratoolkit activation`: shell command making `fasterq-dump` available on the cluster
/// - `space ranger directory`: where Space Ranger was extracted
/// - `genome directory`: where the reference genomes were extracted
/// - `reference`: `human` or `mouse`
/// - `raw data directory`: receives one FASTQ directory per sample under `fastq/`; relative image
///   paths are read from its `images/` directory
/// - `script directory`: receives the generated Slurm scripts
/// - `result directory`: receives the Space Ranger outputs
/// - `version`: slide version given to `--unknown-slide` when a sample has no slide or area
/// - `samples`: objects with `name`, `FASTQ` (SRA accession), `image`, and optionally `slide`
///   and `area`, which must be given together
///
/// ## Example Command Line
///
/// ```
/// sr-helper create-config config.json
/// ```
///
#[derive(Parser, Debug)]
#[command(version)]
#[clap(verbatim_doc_comment)]
pub(crate) struct CreateConfig {
    /// Configuration file to write, must end in `.json`.
    output: PathBuf,
}

impl Command for CreateConfig {
    fn execute(&self) -> Result<()> {
        if !self.output.to_string_lossy().ends_with(".json") {
            bail!("The file name {:#?} is not a valid JSON name.", self.output);
        }
        PipelineConfig::example().to_file(&self.output)?;
        info!("Created the example configuration file {:#?}.", self.output);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use srhelper_lib::config::Reference;
    use tempfile::TempDir;

    #[test]
    fn test_create_config_writes_parseable_json() {
        let tmpdir = TempDir::new().unwrap();
        let output = tmpdir.path().join("out.json");

        CreateConfig { output: output.clone() }.execute().unwrap();

        let config = PipelineConfig::from_file(&output).unwrap();
        assert_eq!(config.reference, Reference::Human);
        assert_eq!(config.samples.len(), 2);
        assert!(config.samples.iter().all(|s| !s.name.is_empty()));
    }

    #[test]
    fn test_create_config_overwrites_existing_file() {
        let tmpdir = TempDir::new().unwrap();
        let output = tmpdir.path().join("out.json");
        std::fs::write(&output, "not json").unwrap();

        CreateConfig { output: output.clone() }.execute().unwrap();

        assert!(PipelineConfig::from_file(&output).is_ok());
    }

    #[rstest]
    #[case("out.txt")]
    #[case("out")]
    #[case("out.json.bak")]
    fn test_create_config_rejects_non_json_names(#[case] name: &str) {
        let tmpdir = TempDir::new().unwrap();
        let output = tmpdir.path().join(name);

        let err = CreateConfig { output: output.clone() }.execute().unwrap_err();

        assert!(err.to_string().contains("is not a valid JSON name"));
        assert!(!output.exists());
        assert_eq!(std::fs::read_dir(tmpdir.path()).unwrap().count(), 0);
    }
}
