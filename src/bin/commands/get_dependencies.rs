use crate::commands::command::Command;
use anyhow::Result;
use clap::Parser;
use log::info;
use srhelper_lib::dependencies::{Artifact, Download, Fetcher, SPACE_RANGER_URL};
use std::path::PathBuf;

/// Downloads Space Ranger and the reference genomes, and extracts them.
///
/// Each archive is saved in the installation directory and extracted there.  Downloads are
/// skipped, with a warning, if `curl` is not installed; extraction is skipped if `tar` is not.
///
/// ## Example Command Line
///
/// ```
/// sr-helper get-dependencies ~/visium --skip-mouse-reference
/// ```
///
#[derive(Parser, Debug)]
#[command(version)]
pub(crate) struct GetDependencies {
    /// Installation directory, created if needed.
    dir: PathBuf,

    /// Don't download Space Ranger.
    #[clap(long)]
    skip_space_ranger: bool,

    /// Don't download the human (GRCh38) reference.
    #[clap(long)]
    skip_human_reference: bool,

    /// Don't download the mouse (mm10) reference.
    #[clap(long)]
    skip_mouse_reference: bool,

    /// Download link for Space Ranger.  The default signed link expires; get a current one from
    /// the 10x Genomics download page.
    #[clap(long, default_value = SPACE_RANGER_URL, hide_default_value = true)]
    space_ranger_url: String,
}

impl GetDependencies {
    /// The archives selected by the `--skip-*` options.
    fn selected_downloads(&self) -> Vec<Download> {
        let mut downloads = vec![];
        if !self.skip_space_ranger {
            let url = self.space_ranger_url.clone();
            downloads.push(Download { artifact: Artifact::SpaceRanger, url });
        }
        if !self.skip_human_reference {
            downloads.push(Download::from(Artifact::HumanReference));
        }
        if !self.skip_mouse_reference {
            downloads.push(Download::from(Artifact::MouseReference));
        }
        downloads
    }
}

impl Command for GetDependencies {
    fn execute(&self) -> Result<()> {
        let downloads = self.selected_downloads();
        if downloads.is_empty() {
            info!("Every download was skipped, nothing to do.");
            return Ok(());
        }
        let installed = Fetcher::default().install(&self.dir, &downloads)?;
        for dir in &installed {
            info!("Installed {:#?}.", dir);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn get_dependencies(dir: PathBuf, skip: [bool; 3]) -> GetDependencies {
        GetDependencies {
            dir,
            skip_space_ranger: skip[0],
            skip_human_reference: skip[1],
            skip_mouse_reference: skip[2],
            space_ranger_url: SPACE_RANGER_URL.to_owned(),
        }
    }

    #[rstest]
    #[case(
        [false, false, false],
        vec![Artifact::SpaceRanger, Artifact::HumanReference, Artifact::MouseReference]
    )]
    #[case([true, false, false], vec![Artifact::HumanReference, Artifact::MouseReference])]
    #[case([false, true, true], vec![Artifact::SpaceRanger])]
    #[case([true, true, false], vec![Artifact::MouseReference])]
    #[case([true, true, true], vec![])]
    fn test_selected_downloads(#[case] skip: [bool; 3], #[case] expected: Vec<Artifact>) {
        let command = get_dependencies(PathBuf::from("deps"), skip);
        let artifacts =
            command.selected_downloads().iter().map(|d| d.artifact).collect::<Vec<_>>();
        assert_eq!(artifacts, expected);
    }

    #[test]
    fn test_space_ranger_url_override() {
        let mut command = get_dependencies(PathBuf::from("deps"), [false, true, true]);
        command.space_ranger_url = "https://example.org/spaceranger.tar.gz".to_owned();
        assert_eq!(command.selected_downloads()[0].url, "https://example.org/spaceranger.tar.gz");
    }

    #[test]
    fn test_skipping_everything_touches_nothing() {
        let tmpdir = TempDir::new().unwrap();
        let dir = tmpdir.path().join("deps");
        get_dependencies(dir.clone(), [true, true, true]).execute().unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn test_parses_skip_flags() {
        let command = GetDependencies::try_parse_from([
            "get-dependencies",
            "deps",
            "--skip-space-ranger",
            "--skip-mouse-reference",
        ])
        .unwrap();
        let artifacts =
            command.selected_downloads().iter().map(|d| d.artifact).collect::<Vec<_>>();
        assert_eq!(artifacts, vec![Artifact::HumanReference]);
    }
}
