//! `meshport config`: print the effective configuration.

use std::process::ExitCode;

use meshport_core::config::AppConfig;
use meshport_core::error::AppError;

/// Print the merged, validated configuration as JSON.
///
/// Credentials never live in the configuration (they come from the AWS
/// provider chain), so nothing needs masking.
pub fn execute(config: &AppConfig) -> Result<ExitCode, AppError> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(ExitCode::SUCCESS)
}
