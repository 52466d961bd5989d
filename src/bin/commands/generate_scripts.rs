use crate::commands::command::Command;
use anyhow::Result;
use clap::Parser;
use srhelper_lib::config::PipelineConfig;
use srhelper_lib::scripts::generate_scripts;
use std::path::PathBuf;

/// Writes the Slurm scripts that download and process every sample of a configuration.
///
/// For the sample at position `i` in the configuration, `download_i.sh` fetches the reads with
/// `fasterq-dump`, renames them to the `_R1_001`/`_R2_001` convention and copies the tissue image
/// next to them, and `process_i.sh` runs `spaceranger count` on them.  The raw data, result and
/// script directories are created if needed.  Nothing is written when the configuration is
/// invalid.
///
/// ## Example Command Line
///
/// ```
/// sr-helper generate-scripts config.json def-mylab
/// ```
///
#[derive(Parser, Debug)]
#[command(version)]
pub(crate) struct GenerateScripts {
    /// Pipeline configuration file (see `create-config`).
    configuration: PathBuf,

    /// Slurm account the jobs are charged to.
    account: String,
}

impl Command for GenerateScripts {
    fn execute(&self) -> Result<()> {
        let config = PipelineConfig::from_file(&self.configuration)?;
        generate_scripts(&config, &self.account)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fgoxide::io::Io;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_config(dir: &Path, samples: &str) -> PathBuf {
        let root = dir.display();
        let lines = vec![
            "{".to_owned(),
            r#""pipeline name": "test","#.to_owned(),
            r#""sratoolkit activation": "module load sra-toolkit","#.to_owned(),
            format!(r#""space ranger directory": "{root}/spaceranger-3.0.0","#),
            format!(r#""genome directory": "{root}/references","#),
            r#""reference": "mouse","#.to_owned(),
            format!(r#""raw data directory": "{root}/raw","#),
            format!(r#""script directory": "{root}/scripts","#),
            format!(r#""result directory": "{root}/results","#),
            r#""version": "visium-1","#.to_owned(),
            format!(r#""samples": {samples}"#),
            "}".to_owned(),
        ];
        let path = dir.join("config.json");
        Io::default().write_lines(&path, lines).unwrap();
        path
    }

    #[test]
    fn test_generate_scripts_from_file() {
        let tmpdir = TempDir::new().unwrap();
        let configuration = write_config(
            tmpdir.path(),
            r#"[{"name": "A", "FASTQ": "SRR1", "image": "a.tiff"},
                {"name": "B", "FASTQ": "SRR2", "image": "b.tiff", "slide": "V1", "area": "D1"}]"#,
        );

        GenerateScripts { configuration, account: "def-lab".to_owned() }.execute().unwrap();

        let io = Io::default();
        let scripts = tmpdir.path().join("scripts");
        for name in ["download_0.sh", "process_0.sh", "download_1.sh", "process_1.sh"] {
            assert!(scripts.join(name).is_file(), "{name} missing");
        }
        let process_0 = io.read_lines(&scripts.join("process_0.sh")).unwrap().join("\n");
        let process_1 = io.read_lines(&scripts.join("process_1.sh")).unwrap().join("\n");
        assert!(process_0.contains("refdata-gex-mm10-2020-A"));
        assert!(process_0.contains("--unknown-slide=visium-1"));
        assert!(process_1.contains("--slide=V1 --area=D1"));
    }

    #[test]
    fn test_invalid_json_writes_nothing() {
        let tmpdir = TempDir::new().unwrap();
        let configuration = tmpdir.path().join("config.json");
        Io::default().write_lines(&configuration, ["{ \"pipeline name\": "]).unwrap();

        let result =
            GenerateScripts { configuration, account: "def-lab".to_owned() }.execute();

        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(tmpdir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_half_addressed_sample_writes_nothing() {
        let tmpdir = TempDir::new().unwrap();
        let configuration = write_config(
            tmpdir.path(),
            r#"[{"name": "A", "FASTQ": "SRR1", "image": "a.tiff"},
                {"name": "B", "FASTQ": "SRR2", "image": "b.tiff", "area": "D1"}]"#,
        );

        let err = GenerateScripts { configuration, account: "def-lab".to_owned() }
            .execute()
            .unwrap_err();

        assert!(err.to_string().contains("must set both `slide` and `area`"));
        assert!(!tmpdir.path().join("scripts").exists());
        assert!(!tmpdir.path().join("raw").exists());
        assert!(!tmpdir.path().join("results").exists());
    }
}
