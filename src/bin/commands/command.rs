use anyhow::Result;
use enum_dispatch::enum_dispatch;

/// A `sr-helper` subcommand, run once per invocation.
#[enum_dispatch]
pub trait Command {
    /// Runs the subcommand to completion.  Failures of external programs are not retried.
    #[allow(clippy::missing_errors_doc)]
    fn execute(&self) -> Result<()>;
}
