//! Config validation CLI tool
//!
//! Validates a nudge configuration file and reports any errors.

use nudge_config::MotivationalPlacement;
use nudge_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a nudge configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match nudge_config::load_config(&config_path) {
        Ok(config) => {
            let defaults = &config.defaults;
            let placement = match config.reminders.motivational_placement {
                MotivationalPlacement::Midpoint => "midpoint".to_string(),
                MotivationalPlacement::Fixed(time) => time.to_string(),
            };

            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", nudge_config::CURRENT_CONFIG_VERSION);
            println!("  Data dir: {}", config.service.data_dir.display());
            println!("  Habits file: {}", config.service.habits_file.display());
            println!("  Tick interval: {}s", config.service.tick_interval.as_secs());
            println!(
                "  Default reminders: morning {}, evening {}",
                defaults.morning_time, defaults.evening_time
            );
            println!(
                "  Default quiet hours: {} - {}",
                defaults.quiet_hours_start, defaults.quiet_hours_end
            );
            println!("  Motivational placement: {}", placement);
            println!(
                "  Motivational messages: {}",
                config.reminders.messages.motivational.len()
            );

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                nudge_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                nudge_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                nudge_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                nudge_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        nudge_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}
