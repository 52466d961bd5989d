pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::command::Command;
use commands::create_config::CreateConfig;
use commands::generate_scripts::GenerateScripts;
use commands::get_dependencies::GetDependencies;
use commands::run_scripts::RunScripts;
use enum_dispatch::enum_dispatch;
use env_logger::Env;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Downloads Space Ranger and its references, then writes and submits the Slurm jobs that fetch
/// and process 10x Visium samples.
#[derive(Parser, Debug)]
#[command(version, arg_required_else_help = true)]
struct Args {
    #[clap(subcommand)]
    subcommand: Subcommand,
}

#[enum_dispatch(Command)]
#[derive(Parser, Debug)]
#[command(version)]
enum Subcommand {
    GetDependencies(GetDependencies),
    CreateConfig(CreateConfig),
    GenerateScripts(GenerateScripts),
    RunScripts(RunScripts),
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args: Args = Args::parse();
    args.subcommand.execute()
}
