use crate::config::{PipelineConfig, Sample, SlideAddress};
use anyhow::{Context, Result, ensure};
use fgoxide::io::Io;
use log::info;
use shell_escape::unix::escape;
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

/// Name given to the tissue image once copied next to the sample's reads.
pub const IMAGE_NAME: &str = "image.tiff";

/// Resources requested from the scheduler for one job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JobResources {
    /// wall time limit, `HH:MM:SS`
    pub time: &'static str,
    pub memory_gb: usize,
    pub cpus: usize,
}

pub const DOWNLOAD_RESOURCES: JobResources =
    JobResources { time: "00:30:00", memory_gb: 16, cpus: 1 };
pub const PROCESS_RESOURCES: JobResources =
    JobResources { time: "00:55:00", memory_gb: 64, cpus: 8 };

/// The two scripts generated for every sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptKind {
    Download,
    Process,
}

impl ScriptKind {
    /// The marker in a script's file name identifying its kind.
    #[must_use]
    pub fn marker(self) -> &'static str {
        match self {
            ScriptKind::Download => "download",
            ScriptKind::Process => "process",
        }
    }

    /// The file name of the script of this kind for the sample at `index`.
    #[must_use]
    pub fn file_name(self, index: usize) -> String {
        format!("{}_{index}.sh", self.marker())
    }

    #[must_use]
    pub fn resources(self) -> JobResources {
        match self {
            ScriptKind::Download => DOWNLOAD_RESOURCES,
            ScriptKind::Process => PROCESS_RESOURCES,
        }
    }
}

/// Quotes `value` for the shell, leaving it untouched when it has no special characters.
fn shell_quote(value: &str) -> String {
    escape(Cow::from(value)).into_owned()
}

fn quote_path(path: &Path) -> String {
    escape(path.to_string_lossy()).into_owned()
}

/// The shebang and `#SBATCH` directives shared by every script.
fn header(account: &str, resources: JobResources) -> Vec<String> {
    vec![
        "#!/bin/bash".to_owned(),
        format!("#SBATCH --account={}", shell_quote(account)),
        format!("#SBATCH --time={}", resources.time),
        format!("#SBATCH --mem={}G", resources.memory_gb),
        format!("#SBATCH --cpus-per-task={}", resources.cpus),
    ]
}

fn into_script(lines: Vec<String>) -> String {
    let mut script = lines.join("\n");
    script.push('\n');
    script
}

/// Shell loop renaming the `.fastq` files of `sample_dir` (already quoted) to the
/// `_R1_001`/`_R2_001` convention.  An unpaired `X.fastq` is left alone when `X_1.fastq` or
/// `X_R1_001.fastq` exists, so no reads are overwritten.
fn rename_reads(sample_dir: &str) -> Vec<String> {
    vec![
        format!("for f in {sample_dir}/*.fastq; do"),
        r#"    [ -e "$f" ] || continue"#.to_owned(),
        r#"    case "$f" in"#.to_owned(),
        "        *_R1_001.fastq|*_R2_001.fastq) ;;".to_owned(),
        r#"        *_1.fastq) mv "$f" "${f%_1.fastq}_R1_001.fastq" ;;"#.to_owned(),
        r#"        *_2.fastq) mv "$f" "${f%_2.fastq}_R2_001.fastq" ;;"#.to_owned(),
        r#"        *) if [ -e "${f%.fastq}_1.fastq" ] || [ -e "${f%.fastq}_R1_001.fastq" ]; then"#
            .to_owned(),
        r#"               echo "Not renaming $f, ${f%.fastq} already has R1 reads" >&2"#.to_owned(),
        "           else".to_owned(),
        r#"               mv "$f" "${f%.fastq}_R1_001.fastq""#.to_owned(),
        "           fi ;;".to_owned(),
        "    esac".to_owned(),
        "done".to_owned(),
    ]
}

/// Renders the script that fetches the reads of `sample` from the SRA, renames them to the
/// `_R1_001`/`_R2_001` convention Space Ranger expects and copies the tissue image next to them.
#[must_use]
pub fn render_download_script(config: &PipelineConfig, sample: &Sample, account: &str) -> String {
    let sample_dir = quote_path(&config.sample_directory(sample));
    let mut lines = header(account, DOWNLOAD_RESOURCES);
    lines.extend([
        String::new(),
        config.sratoolkit_activation.clone(),
        String::new(),
        format!("mkdir -p {sample_dir}"),
        format!("fasterq-dump --split-files {} --outdir {sample_dir}", shell_quote(&sample.fastq)),
        String::new(),
    ]);
    lines.extend(rename_reads(&sample_dir));
    lines.extend([
        String::new(),
        format!(
            "cp {} {}",
            quote_path(&config.source_image(sample)),
            quote_path(&config.sample_directory(sample).join(IMAGE_NAME))
        ),
    ]);
    into_script(lines)
}

/// Renders the script that runs `spaceranger count` on the reads fetched by the download script.
#[must_use]
pub fn render_process_script(config: &PipelineConfig, sample: &Sample, account: &str) -> String {
    let sample_dir = config.sample_directory(sample);
    let slide_clause = match sample.slide_address() {
        SlideAddress::Known { slide, area } => {
            format!("--slide={} --area={}", shell_quote(slide), shell_quote(area))
        }
        SlideAddress::Unknown => format!("--unknown-slide={}", shell_quote(&config.version)),
    };
    let args = [
        format!("--id={}", shell_quote(&sample.name)),
        format!("--output-dir={}", quote_path(&config.result_directory.join(&sample.name))),
        format!("--transcriptome={}", quote_path(&config.transcriptome())),
        format!("--fastqs={}", quote_path(&sample_dir)),
        format!("--sample={}", shell_quote(&sample.name)),
        format!("--image={}", quote_path(&sample_dir.join(IMAGE_NAME))),
        format!("--localcores={}", PROCESS_RESOURCES.cpus),
        format!("--localmem={}", PROCESS_RESOURCES.memory_gb),
        "--create-bam=false".to_owned(),
        slide_clause,
    ];

    let mut lines = header(account, PROCESS_RESOURCES);
    lines.push(String::new());
    lines.push(format!(
        "source {}",
        quote_path(&config.space_ranger_directory.join("sourceme.bash"))
    ));
    lines.push(String::new());
    lines.push("spaceranger count \\".to_owned());
    let last = args.len() - 1;
    lines.extend(args.into_iter().enumerate().map(|(i, arg)| {
        if i == last { format!("    {arg}") } else { format!("    {arg} \\") }
    }));
    into_script(lines)
}

/// Creates `dir` and its parents if it doesn't exist yet.
fn ensure_directory(dir: &Path) -> Result<()> {
    if !dir.exists() {
        info!("Directory {:#?} didn't exist, creating it.", dir);
        fs::create_dir_all(dir).with_context(|| format!("Could not create {}", dir.display()))?;
    }
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Creates the pipeline's directories and writes `download_<i>.sh` and `process_<i>.sh` into the
/// script directory for every sample, overwriting existing scripts.  Returns the paths written,
/// download and process script of each sample in turn.
/// # Errors
///   - If `account` is blank.
///   - If a directory cannot be created or a script cannot be written.
pub fn generate_scripts(config: &PipelineConfig, account: &str) -> Result<Vec<PathBuf>> {
    ensure!(!account.trim().is_empty(), "The scheduler account cannot be empty");

    for dir in [
        config.raw_data_directory.clone(),
        config.fastq_directory(),
        config.images_directory(),
        config.result_directory.clone(),
        config.script_directory.clone(),
    ] {
        ensure_directory(&dir)?;
    }

    let io = Io::default();
    let mut written = Vec::with_capacity(config.samples.len() * 2);
    for (index, sample) in config.samples.iter().enumerate() {
        for kind in [ScriptKind::Download, ScriptKind::Process] {
            let script = match kind {
                ScriptKind::Download => render_download_script(config, sample, account),
                ScriptKind::Process => render_process_script(config, sample, account),
            };
            let path = config.script_directory.join(kind.file_name(index));
            io.write_lines(&path, script.lines())
                .with_context(|| format!("Could not write {}", path.display()))?;
            make_executable(&path)?;
            written.push(path);
        }
        info!("Wrote the scripts of {sample}.");
    }
    info!(
        "Generated {} scripts for pipeline '{}' ({} reference) in {:#?}.",
        written.len(),
        config.pipeline_name,
        config.reference,
        config.script_directory
    );
    Ok(written)
}
