use std::env;
use std::path::PathBuf;

use anyhow::bail;
use anyhow::Context;

use crate::types::BenchResult;

/// The environment variable that overrides the path to `tool`.
///
/// For example `DNSFW_DNSPYRE_PATH` for `dnspyre` and `DNSFW_RESPERF_REPORT_PATH` for
/// `resperf-report`.
pub fn tool_path_env(tool: &str) -> String {
    let name = tool
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect::<String>();
    format!("DNSFW_{name}_PATH")
}

/// Get the path to a load generation tool.
///
/// If the variable named by [`tool_path_env`] is set, its value is used as the path. Otherwise
/// the tool is looked up in the user's `PATH`.
pub fn tool_path(tool: &str) -> BenchResult<PathBuf> {
    let env_name = tool_path_env(tool);
    match env::var(&env_name).ok().as_deref() {
        Some("") => {
            bail!("'{env_name}' set to empty string");
        }
        Some(path) if path != tool => {
            let path = PathBuf::from(path);
            if !path.exists() {
                bail!(
                    "Path to '{tool}' overwritten with '{env_name}={path}' but that path doesn't exist",
                    path = path.display()
                );
            }
            Ok(path)
        }
        _ => which::which(tool).with_context(|| {
            format!("'{tool}' not found in PATH. Please install it or set '{env_name}' to the correct path.")
        }),
    }
}
