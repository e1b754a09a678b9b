use clap::Parser;
use yaf::cli::{run_cli, Cli};

fn main() -> anyhow::Result<()> {
    run_cli(Cli::parse())
}
