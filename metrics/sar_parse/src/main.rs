#[macro_use]
extern crate log;

use clap::Parser as _;

mod cli;

const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init()?;

    let args = cli::CliArgs::parse();
    debug!("{CRATE_NAME} {CRATE_VERSION}");

    if !args.input_file.exists() {
        anyhow::bail!("Input file '{}' does not exist", args.input_file.display());
    }

    let output = args.output_path();
    dnsfw_sar_parse::convert_file(&args.input_file, &output)?;

    Ok(())
}
