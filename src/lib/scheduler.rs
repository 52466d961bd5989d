use crate::scripts::ScriptKind;
use anyhow::{Context, Result, bail, ensure};
use itertools::Itertools;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::Duration;

/// A batch scheduler scripts can be submitted to.
pub trait Scheduler {
    /// Submits `script` as a batch job.
    /// # Errors
    ///   - If the scheduler cannot be reached or rejects the job.
    fn submit(&mut self, script: &Path) -> Result<()>;

    /// Returns the number of jobs the current user still has queued or running.
    /// # Errors
    ///   - If the queue status cannot be obtained.
    fn queued_jobs(&mut self) -> Result<usize>;
}

/// Counts the jobs listed in the output of a queue status command: every non-empty line except
/// the header.
#[must_use]
pub fn count_queued_jobs(status_output: &str) -> usize {
    status_output.lines().filter(|l| !l.trim().is_empty()).count().saturating_sub(1)
}

/// Submits jobs with `sbatch` and watches the queue of one user with `squeue`.
#[derive(Clone, Debug)]
pub struct Slurm {
    pub sbatch: PathBuf,
    pub squeue: PathBuf,
    pub user: String,
}

impl Slurm {
    /// Uses the `sbatch` and `squeue` found on the `PATH`.
    #[must_use]
    pub fn new(user: String) -> Self {
        Self { sbatch: PathBuf::from("sbatch"), squeue: PathBuf::from("squeue"), user }
    }
}

impl Scheduler for Slurm {
    fn submit(&mut self, script: &Path) -> Result<()> {
        let output = Command::new(&self.sbatch)
            .arg(script)
            .output()
            .with_context(|| format!("Running {:?} on {}", self.sbatch, script.display()))?;
        if !output.status.success() {
            bail!(
                "{:?} rejected {} ({}): {}",
                self.sbatch,
                script.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        info!("{}: {}", script.display(), String::from_utf8_lossy(&output.stdout).trim());
        Ok(())
    }

    fn queued_jobs(&mut self) -> Result<usize> {
        let output = Command::new(&self.squeue)
            .arg("-u")
            .arg(&self.user)
            .output()
            .with_context(|| format!("Running {:?}", self.squeue))?;
        if !output.status.success() {
            bail!(
                "{:?} failed ({}): {}",
                self.squeue,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(count_queued_jobs(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// How long to wait for the queue to drain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitPolicy {
    /// pause before each look at the queue
    pub poll_interval: Duration,
    /// number of looks after which waiting is abandoned
    pub max_polls: usize,
}

impl Default for WaitPolicy {
    /// Checks once a minute for up to an hour.
    fn default() -> Self {
        Self { poll_interval: Duration::from_secs(60), max_polls: 60 }
    }
}

/// How a wait for the queue ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The queue was empty on the `polls`-th look.
    Drained { polls: usize },
    /// The queue still held jobs after the last allowed look.
    TimedOut,
}

/// Blocks until `scheduler` reports no queued jobs, or until `policy.max_polls` looks have been
/// taken.  Running out of looks is not an error.
/// # Errors
///   - If the queue status cannot be obtained.
pub fn wait_for_empty_queue<S: Scheduler + ?Sized>(
    scheduler: &mut S,
    policy: &WaitPolicy,
) -> Result<WaitOutcome> {
    for poll in 1..=policy.max_polls {
        thread::sleep(policy.poll_interval);
        let queued = scheduler.queued_jobs()?;
        info!("{queued} job(s) remaining in the queue.");
        if queued < 1 {
            return Ok(WaitOutcome::Drained { polls: poll });
        }
    }
    warn!("Queue still not empty after {} checks, continuing anyway.", policy.max_polls);
    Ok(WaitOutcome::TimedOut)
}

/// The index a generated script name ends with, e.g. 12 for `download_12.sh`.
fn script_index(path: &Path) -> Option<usize> {
    let stem = path.file_stem()?.to_str()?;
    stem.rsplit('_').next()?.parse().ok()
}

/// Lists the files of `dir` whose name contains the marker of `kind`, in sample index order.
/// # Errors
///   - If `dir` cannot be read.
pub fn find_scripts(dir: &Path, kind: ScriptKind) -> Result<Vec<PathBuf>> {
    let mut scripts = vec![];
    for entry in fs::read_dir(dir).with_context(|| format!("Could not list {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && entry.file_name().to_string_lossy().contains(kind.marker()) {
            scripts.push(path);
        }
    }
    Ok(scripts
        .into_iter()
        .sorted_by(|a, b| {
            script_index(a)
                .unwrap_or(usize::MAX)
                .cmp(&script_index(b).unwrap_or(usize::MAX))
                .then_with(|| a.cmp(b))
        })
        .collect())
}

/// What [`run_scripts`] submitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub downloads: Vec<PathBuf>,
    pub processes: Vec<PathBuf>,
    pub wait: WaitOutcome,
}

/// Submits every download script of `dir`, waits for the queue to empty, then submits every
/// process script.  Other files are ignored.  The queue is waited on even without download
/// scripts, so jobs the user submitted earlier finish before processing starts.
/// # Errors
///   - If `dir` is not a readable directory.
///   - If any submission or queue status check fails; nothing is retried.
pub fn run_scripts<S: Scheduler + ?Sized>(
    dir: &Path,
    scheduler: &mut S,
    policy: &WaitPolicy,
) -> Result<RunSummary> {
    ensure!(dir.is_dir(), "Script directory {:#?} doesn't exist", dir);
    let downloads = find_scripts(dir, ScriptKind::Download)?;
    let processes = find_scripts(dir, ScriptKind::Process)?;

    for script in &downloads {
        scheduler.submit(script)?;
    }
    info!("Submitted {} download job(s).", downloads.len());

    let wait = wait_for_empty_queue(scheduler, policy)?;

    for script in &processes {
        scheduler.submit(script)?;
    }
    info!("Submitted {} processing job(s).", processes.len());

    Ok(RunSummary { downloads, processes, wait })
}
