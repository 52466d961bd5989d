use crate::commands::command::Command;
use anyhow::Result;
use clap::Parser;
use log::info;
use srhelper_lib::scheduler::{RunSummary, Slurm, WaitOutcome, WaitPolicy, run_scripts};
use std::path::PathBuf;
use std::time::Duration;

/// Submits the scripts written by `generate-scripts` to Slurm.
///
/// Every file of the directory whose name contains `download` is submitted with `sbatch`.  The
/// user's queue is then checked with `squeue` every `--poll-interval` seconds until it is empty,
/// or until it has been checked `--max-polls` times, after which every file whose name contains
/// `process` is submitted.  The queue is waited on even when there are no download scripts.
/// Other files are ignored.
///
/// ## Example Command Line
///
/// ```
/// sr-helper run-scripts ~/visium/scripts --poll-interval 120
/// ```
///
#[derive(Parser, Debug)]
#[command(version)]
pub(crate) struct RunScripts {
    /// Directory holding the generated scripts.
    dir: PathBuf,

    /// User whose queue is watched.
    #[clap(long, short = 'u', env = "USER")]
    user: String,

    /// Seconds to wait before each check of the queue.
    #[clap(long, default_value = "60")]
    poll_interval: u64,

    /// Number of queue checks after which processing jobs are submitted anyway.
    #[clap(long, default_value = "60")]
    max_polls: usize,

    /// The `sbatch` executable.
    #[clap(long, default_value = "sbatch")]
    sbatch: PathBuf,

    /// The `squeue` executable.
    #[clap(long, default_value = "squeue")]
    squeue: PathBuf,
}

impl RunScripts {
    fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            poll_interval: Duration::from_secs(self.poll_interval),
            max_polls: self.max_polls,
        }
    }

    fn scheduler(&self) -> Slurm {
        Slurm { sbatch: self.sbatch.clone(), squeue: self.squeue.clone(), user: self.user.clone() }
    }
}

impl Command for RunScripts {
    fn execute(&self) -> Result<()> {
        let RunSummary { downloads, processes, wait } =
            run_scripts(&self.dir, &mut self.scheduler(), &self.wait_policy())?;
        match wait {
            WaitOutcome::Drained { polls } => {
                info!("The queue was empty after {polls} check(s).");
            }
            WaitOutcome::TimedOut => {
                info!("Stopped waiting for the queue after {} checks.", self.max_polls);
            }
        }
        info!("Submitted {} download and {} processing job(s).", downloads.len(), processes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fgoxide::io::Io;
    use std::path::Path;
    use tempfile::TempDir;

    fn run_scripts_command(dir: PathBuf, sbatch: PathBuf, squeue: PathBuf) -> RunScripts {
        RunScripts { dir, user: "me".to_owned(), poll_interval: 0, max_polls: 1, sbatch, squeue }
    }

    /// Writes an executable `squeue` into `dir` that lists no jobs.
    #[cfg(unix)]
    fn empty_squeue(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("squeue");
        let lines = ["#!/bin/sh", "echo 'JOBID PARTITION NAME USER'"];
        Io::default().write_lines(&path, lines).unwrap();
        let mut permissions = std::fs::metadata(&path).unwrap().permissions();
        permissions.set_mode(0o755);
        std::fs::set_permissions(&path, permissions).unwrap();
        path
    }

    #[test]
    fn test_options_map_to_wait_policy() {
        let command = RunScripts::try_parse_from([
            "run-scripts",
            "scripts",
            "--user",
            "me",
            "--poll-interval",
            "5",
            "--max-polls",
            "3",
        ])
        .unwrap();
        assert_eq!(
            command.wait_policy(),
            WaitPolicy { poll_interval: Duration::from_secs(5), max_polls: 3 }
        );
        let slurm = command.scheduler();
        assert_eq!(slurm.user, "me");
        assert_eq!(slurm.sbatch, PathBuf::from("sbatch"));
        assert_eq!(slurm.squeue, PathBuf::from("squeue"));
    }

    #[test]
    fn test_defaults_wait_an_hour() {
        let command =
            RunScripts::try_parse_from(["run-scripts", "scripts", "--user", "me"]).unwrap();
        assert_eq!(command.wait_policy(), WaitPolicy::default());
    }

    #[test]
    #[should_panic(expected = "no-such-sbatch")]
    fn test_missing_scheduler_fails() {
        let tmpdir = TempDir::new().unwrap();
        Io::default().write_lines(&tmpdir.path().join("download_0.sh"), ["#!/bin/bash"]).unwrap();
        let command = run_scripts_command(
            tmpdir.path().to_path_buf(),
            tmpdir.path().join("no-such-sbatch"),
            PathBuf::from("squeue"),
        );
        command.execute().unwrap();
    }

    #[test]
    #[should_panic(expected = "no-such-squeue")]
    fn test_missing_squeue_fails_even_without_downloads() {
        let tmpdir = TempDir::new().unwrap();
        let command = run_scripts_command(
            tmpdir.path().to_path_buf(),
            tmpdir.path().join("no-such-sbatch"),
            tmpdir.path().join("no-such-squeue"),
        );
        command.execute().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_empty_directory_submits_nothing() {
        let tmpdir = TempDir::new().unwrap();
        let squeue = empty_squeue(tmpdir.path());
        let command = run_scripts_command(
            tmpdir.path().to_path_buf(),
            tmpdir.path().join("no-such-sbatch"),
            squeue,
        );
        command.execute().unwrap();
    }
}
