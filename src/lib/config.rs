use crate::paths::expand_tilde;
use chrono::Utc;
use fgoxide::io::Io;
use itertools::Itertools;
use serde::{Deserialize, Deserializer, Serialize};
use serde_aux::field_attributes::deserialize_string_from_number;
use std::fmt::{self, Display};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the sub-directory of the raw data directory holding one FASTQ directory per sample.
pub const FASTQ_SUBDIR: &str = "fastq";
/// Name of the sub-directory of the raw data directory holding the tissue images.
pub const IMAGES_SUBDIR: &str = "images";

/// Errors raised while loading or validating a [`PipelineConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not open the configuration file: {0}")]
    Open(#[from] fgoxide::FgError),
    #[error("The configuration is not valid JSON or is missing a key: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Could not write the configuration file: {0}")]
    Write(#[from] std::io::Error),
    #[error("The following errors with the configuration were detected:\n{0}")]
    Invalid(String),
}

/// The reference genome a pipeline aligns against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Reference {
    Human,
    Mouse,
}

impl Reference {
    /// The directory name of the extracted reference, relative to the genome directory.
    #[must_use]
    pub fn version(self) -> &'static str {
        match self {
            Reference::Human => "refdata-gex-GRCh38-2020-A",
            Reference::Mouse => "refdata-gex-mm10-2020-A",
        }
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Human => write!(f, "human"),
            Reference::Mouse => write!(f, "mouse"),
        }
    }
}

/// How the capture area of a sample is identified to Space Ranger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlideAddress<'a> {
    Known { slide: &'a str, area: &'a str },
    Unknown,
}

/// Treats `null`, a missing key, and an empty or blank string all as "not set".
fn deserialize_blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// A single Visium sample: where to fetch its reads from and how to describe it to Space Ranger.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Sample {
    /// name of the sample, also used as the name of its FASTQ directory
    pub name: String,
    /// SRA accession of the sequencing run
    #[serde(rename = "FASTQ")]
    pub fastq: String,
    /// tissue image, relative paths are resolved against the raw data `images` directory
    pub image: PathBuf,
    /// slide serial number, if known
    #[serde(default, deserialize_with = "deserialize_blank_as_none")]
    pub slide: Option<String>,
    /// capture area on the slide, if known
    #[serde(default, deserialize_with = "deserialize_blank_as_none")]
    pub area: Option<String>,
}

impl Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sample {{ name: {}\tFASTQ: {} }}", self.name, self.fastq)
    }
}

impl Sample {
    /// Returns the slide and area when both are set, [`SlideAddress::Unknown`] otherwise.
    #[must_use]
    pub fn slide_address(&self) -> SlideAddress<'_> {
        match (&self.slide, &self.area) {
            (Some(slide), Some(area)) => SlideAddress::Known { slide, area },
            _ => SlideAddress::Unknown,
        }
    }
}

/// Notes written at the top of generated configurations.  Ignored by the pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConfigMetadata {
    #[serde(rename = "File generation date")]
    pub generation_date: String,
    #[serde(rename = "Information")]
    pub information: String,
}

/// Everything needed to generate the download and processing scripts of a pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ConfigMetadata>,
    #[serde(rename = "pipeline name")]
    pub pipeline_name: String,
    /// Shell command making the SRA toolkit available, e.g. `module load sra-toolkit`.
    #[serde(rename = "sratoolkit activation")]
    pub sratoolkit_activation: String,
    #[serde(rename = "space ranger directory")]
    pub space_ranger_directory: PathBuf,
    #[serde(rename = "genome directory")]
    pub genome_directory: PathBuf,
    pub reference: Reference,
    #[serde(rename = "raw data directory")]
    pub raw_data_directory: PathBuf,
    #[serde(rename = "script directory")]
    pub script_directory: PathBuf,
    #[serde(rename = "result directory")]
    pub result_directory: PathBuf,
    /// Slide version passed to `--unknown-slide` for samples without slide and area.
    #[serde(deserialize_with = "deserialize_string_from_number")]
    pub version: String,
    pub samples: Vec<Sample>,
}

impl PipelineConfig {
    /// Parses a configuration from JSON text, expands `~` in its directories and validates it.
    /// # Errors
    ///   - If the text is not JSON, or is missing a required key.
    ///   - If the samples fail validation (see [`Self::validate`]).
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.resolve()
    }

    /// Loads a configuration from a JSON file.  See [`Self::from_json_str`].
    /// # Errors
    ///   - If the file cannot be opened or fails to parse or validate.
    pub fn from_file<P: AsRef<Path>>(path: &P) -> Result<Self, ConfigError> {
        let reader = Io::default().new_reader(path)?;
        let config: Self = serde_json::from_reader(reader)?;
        config.resolve()
    }

    /// Writes the configuration as pretty-printed JSON.
    /// # Errors
    ///   - If the file cannot be created or written.
    pub fn to_file<P: AsRef<Path>>(&self, path: &P) -> Result<(), ConfigError> {
        let mut writer = Io::default().new_writer(path)?;
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }

    /// An example configuration with one sample whose slide is known and one whose isn't.
    #[must_use]
    pub fn example() -> Self {
        Self {
            metadata: Some(ConfigMetadata {
                generation_date: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
                information: "Edit this file to add references to the 10X Visium data to \
                              process. Run `sr-helper help create-config` to see how to edit it."
                    .to_owned(),
            }),
            pipeline_name: "TEST PIPELINE".to_owned(),
            sratoolkit_activation: "module load StdEnv/2023 gcc/12.3 sra-toolkit/3.0.9".to_owned(),
            space_ranger_directory: PathBuf::from("~/visium/spaceranger-3.0.0"),
            genome_directory: PathBuf::from("~/visium/references"),
            reference: Reference::Human,
            raw_data_directory: PathBuf::from("~/visium/raw"),
            script_directory: PathBuf::from("~/visium/scripts"),
            result_directory: PathBuf::from("~/visium/results"),
            version: "visium-2".to_owned(),
            samples: vec![
                Sample {
                    name: "A1".to_owned(),
                    fastq: "SRR00000001".to_owned(),
                    image: PathBuf::from("A1_high_res.tiff"),
                    slide: Some("V19L29-096".to_owned()),
                    area: Some("A1".to_owned()),
                },
                Sample {
                    name: "B1".to_owned(),
                    fastq: "SRR00000002".to_owned(),
                    image: PathBuf::from("B1_high_res.tiff"),
                    slide: None,
                    area: None,
                },
            ],
        }
    }

    fn resolve(mut self) -> Result<Self, ConfigError> {
        for dir in [
            &mut self.space_ranger_directory,
            &mut self.genome_directory,
            &mut self.raw_data_directory,
            &mut self.script_directory,
            &mut self.result_directory,
        ] {
            *dir = expand_tilde(dir);
        }
        for sample in &mut self.samples {
            sample.image = expand_tilde(&sample.image);
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks that:
    ///     - There is at least one sample
    ///     - Sample names are unique and no name or accession is blank
    ///     - Every sample has either both a slide and an area, or neither
    /// # Errors
    ///   - [`ConfigError::Invalid`] listing every problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut constraint_errors = vec![];

        if !self.samples.iter().map(|s| &s.name).all_unique() {
            constraint_errors
                .push("Each sample name must be unique, duplicate identified".to_owned());
        }
        for (index, sample) in self.samples.iter().enumerate() {
            if sample.name.trim().is_empty() {
                constraint_errors.push(format!("Sample {index} has an empty name"));
            }
            if sample.fastq.trim().is_empty() {
                constraint_errors.push(format!("Sample {index} has an empty FASTQ accession"));
            }
            if sample.slide.is_some() != sample.area.is_some() {
                constraint_errors.push(format!(
                    "Sample {index} ({}) must set both `slide` and `area`, or neither",
                    sample.name
                ));
            }
        }

        if constraint_errors.is_empty() {
            return Ok(());
        }
        let details =
            constraint_errors.iter().map(|reason| format!("    - {reason}")).join("\n");
        Err(ConfigError::Invalid(details))
    }

    /// Directory holding one FASTQ directory per sample.
    #[must_use]
    pub fn fastq_directory(&self) -> PathBuf {
        self.raw_data_directory.join(FASTQ_SUBDIR)
    }

    /// Directory against which relative image paths are resolved.
    #[must_use]
    pub fn images_directory(&self) -> PathBuf {
        self.raw_data_directory.join(IMAGES_SUBDIR)
    }

    /// Directory the reads of `sample` are downloaded into.
    #[must_use]
    pub fn sample_directory(&self, sample: &Sample) -> PathBuf {
        self.fastq_directory().join(&sample.name)
    }

    #[must_use]
    pub fn source_image(&self, sample: &Sample) -> PathBuf {
        if sample.image.is_absolute() {
            sample.image.clone()
        } else {
            self.images_directory().join(&sample.image)
        }
    }

    /// Path of the extracted reference transcriptome selected by [`Self::reference`].
    #[must_use]
    pub fn transcriptome(&self) -> PathBuf {
        self.genome_directory.join(self.reference.version())
    }
}
