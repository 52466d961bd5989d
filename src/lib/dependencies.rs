use crate::config::Reference;
use anyhow::{Context, Result, ensure};
use log::{info, warn};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const SPACE_RANGER_VERSION: &str = "3.0.0";

/// Signed download link for Space Ranger.  These expire; a fresh one can be obtained from the
/// 10x Genomics download page.
pub const SPACE_RANGER_URL: &str = "https://cf.10xgenomics.com/releases/spatial-exp/spaceranger-3.0.0.tar.gz?Expires=1711892573&Key-Pair-Id=APKAI7S6A5RYOXBWRPDA&Signature=aFYZ9LHh705yiMvx9Qhs4fo~9wvcN0OKbnMKM2pM8UnzCbxaqAJEDZ-mbwm3Azr-Ary9KKMvzSC1fDy2wXI5jv-OySeSIuCh~odZ-1BqQh1xsjzJbVcOSqclzZRQZW5k2e-voXHRCO15uOGYWCEYyooVUwkWFBE5f8bG3UGVe6WDZprs1xp51-7iLD9mxo3KAcbNhDGBMBfTOaHnEK3JHVx7btEdtLZKR1q8FboYv1vEovyFH2Fx0fDRxV5rS9XzIS4GQo5-cicCkGaEPiXdMrpTLYvyKY4mt3h33SrVHujF5v9NOR5lw0~S2UcV7tDG~zRskLvmFwFyCJKaLAUcIw__";
pub const HUMAN_REFERENCE_URL: &str =
    "https://cf.10xgenomics.com/supp/spatial-exp/refdata-gex-GRCh38-2020-A.tar.gz";
pub const MOUSE_REFERENCE_URL: &str =
    "https://cf.10xgenomics.com/supp/spatial-exp/refdata-gex-mm10-2020-A.tar.gz";

/// The archives `get-dependencies` knows how to fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Artifact {
    SpaceRanger,
    HumanReference,
    MouseReference,
}

impl Artifact {
    /// Name of the directory the archive extracts to.
    #[must_use]
    pub fn name(self) -> String {
        match self {
            Artifact::SpaceRanger => format!("spaceranger-{SPACE_RANGER_VERSION}"),
            Artifact::HumanReference => Reference::Human.version().to_owned(),
            Artifact::MouseReference => Reference::Mouse.version().to_owned(),
        }
    }

    #[must_use]
    pub fn archive_name(self) -> String {
        format!("{}.tar.gz", self.name())
    }

    #[must_use]
    pub fn default_url(self) -> &'static str {
        match self {
            Artifact::SpaceRanger => SPACE_RANGER_URL,
            Artifact::HumanReference => HUMAN_REFERENCE_URL,
            Artifact::MouseReference => MOUSE_REFERENCE_URL,
        }
    }
}

/// An artifact together with the URL to fetch it from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Download {
    pub artifact: Artifact,
    pub url: String,
}

impl From<Artifact> for Download {
    fn from(artifact: Artifact) -> Self {
        Self { artifact, url: artifact.default_url().to_owned() }
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Whether `tool` can be run: either a path to an executable file, or the name of one found on
/// the `PATH`.
#[must_use]
pub fn is_tool_installed(tool: &Path) -> bool {
    if tool.components().count() > 1 {
        return is_executable(tool);
    }
    env::var_os("PATH")
        .is_some_and(|paths| env::split_paths(&paths).any(|dir| is_executable(&dir.join(tool))))
}

/// The external programs used to fetch and unpack archives.
#[derive(Clone, Debug)]
pub struct Fetcher {
    pub curl: PathBuf,
    pub tar: PathBuf,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self { curl: PathBuf::from("curl"), tar: PathBuf::from("tar") }
    }
}

impl Fetcher {
    /// Downloads `url` to `output`.  Returns `false` without doing anything when `curl` is
    /// missing.
    /// # Errors
    ///   - If `curl` fails.
    pub fn download(&self, url: &str, output: &Path) -> Result<bool> {
        if !is_tool_installed(&self.curl) {
            warn!("The program {:?} is not installed. Cannot download {url}.", self.curl);
            return Ok(false);
        }
        info!("Downloading {} ...", output.display());
        let status = Command::new(&self.curl)
            .args(["--fail", "--location", "--silent", "--show-error", "--output"])
            .arg(output)
            .arg(url)
            .status()
            .with_context(|| format!("Running {:?}", self.curl))?;
        ensure!(status.success(), "Downloading {} failed ({status})", output.display());
        Ok(true)
    }

    /// Extracts the gzipped tarball `archive` into `dir`.  Returns `false` without doing
    /// anything when `tar` is missing.
    /// # Errors
    ///   - If `tar` fails.
    pub fn extract(&self, archive: &Path, dir: &Path) -> Result<bool> {
        if !is_tool_installed(&self.tar) {
            warn!(
                "The program {:?} is not installed. Cannot extract {}.",
                self.tar,
                archive.display()
            );
            return Ok(false);
        }
        info!("Extracting {} ...", archive.display());
        let status = Command::new(&self.tar)
            .arg("-xzf")
            .arg(archive)
            .arg("-C")
            .arg(dir)
            .status()
            .with_context(|| format!("Running {:?}", self.tar))?;
        ensure!(status.success(), "Extracting {} failed ({status})", archive.display());
        Ok(true)
    }

    /// Downloads every one of `downloads` into `dir` and extracts it there.  Creates `dir` if
    /// needed.  Returns the directories extracted.
    /// # Errors
    ///   - If `dir` cannot be created, or a download or extraction fails.
    pub fn install(&self, dir: &Path, downloads: &[Download]) -> Result<Vec<PathBuf>> {
        if !dir.exists() {
            info!("Installation directory {:#?} didn't exist, creating it.", dir);
            fs::create_dir_all(dir)?;
        }
        let mut installed = vec![];
        for download in downloads {
            let archive = dir.join(download.artifact.archive_name());
            if self.download(&download.url, &archive)? && self.extract(&archive, dir)? {
                installed.push(dir.join(download.artifact.name()));
            }
        }
        Ok(installed)
    }
}
