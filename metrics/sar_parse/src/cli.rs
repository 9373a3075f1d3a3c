use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(about = "Parse a sar log file and convert it to CSV", long_about = None)]
pub struct CliArgs {
    /// Path to the input sar log file.
    pub input_file: PathBuf,

    /// Path to the output CSV file. Defaults to the input path with a `.csv` extension.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl CliArgs {
    /// The CSV path to write to.
    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| self.input_file.with_extension("csv"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_default_output_to_csv_extension() {
        let args = CliArgs::parse_from(["sar-parse", "results/sar_output_dnsfw_no_10.txt"]);
        assert_eq!(
            args.output_path(),
            PathBuf::from("results/sar_output_dnsfw_no_10.csv")
        );
    }

    #[test]
    fn test_should_use_explicit_output() {
        let args = CliArgs::parse_from(["sar-parse", "in.txt", "-o", "out/records.csv"]);
        assert_eq!(args.output_path(), PathBuf::from("out/records.csv"));
    }
}
