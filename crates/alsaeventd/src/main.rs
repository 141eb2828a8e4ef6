//! alsaeventd binary

use std::path::PathBuf;
use std::process::ExitCode;

use alsaeventd::{daemon, telemetry};
use clap::error::ErrorKind;
use clap::Parser;
use eventdconf::EventdConfig;
use tracing::error;

/// Play themed sound cues for session, hotplug and mixer events
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Sound theme
    #[arg(short, long, value_name = "NAME")]
    theme: Option<String>,

    /// Screenshot directory to watch (default: $GRIM_DEFAULT_DIR)
    #[arg(short, long, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// libcanberra output driver
    #[arg(short, long, value_name = "NAME")]
    backend: Option<String>,

    /// Hang up the parent process group once the logout cue has played
    #[arg(short, long)]
    kill_group: bool,

    /// Configuration file (replaces ./alsaeventd.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn apply(&self, config: &mut EventdConfig) {
        if let Some(theme) = &self.theme {
            config.sound.theme = theme.clone();
        }
        if let Some(dir) = &self.dir {
            config.watch.screenshot_dir = Some(dir.clone());
        }
        if let Some(backend) = &self.backend {
            config.sound.driver = backend.clone();
        }
        if self.kill_group {
            config.shutdown.propagate_kill = true;
        }
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = e.print();
                return ExitCode::SUCCESS;
            }
            _ => return ExitCode::FAILURE,
        },
    };

    // Logging is configured by the file, so it can't report its own errors
    let (mut config, sources) = match EventdConfig::load_with_sources_from(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("alsaeventd: {}", e);
            return ExitCode::FAILURE;
        }
    };
    cli.apply(&mut config);

    if cli.print_config {
        print!("{}{}", sources.describe(), config.to_toml());
        return ExitCode::SUCCESS;
    }

    telemetry::init(&config.telemetry.log_level);

    match daemon::run(&config) {
        Ok(exit) => exit.into(),
        Err(e) => {
            let e = anyhow::Error::from(e).context("failed to start the event loop");
            error!(error = ?e, "alsaeventd exiting");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_flags() {
        let cli = Cli::try_parse_from(["alsaeventd", "-t", "Foo", "-d", "/tmp/shots", "-b", "pulse", "-k"])
            .unwrap();
        let mut config = EventdConfig::default();
        cli.apply(&mut config);

        assert_eq!(config.sound.theme, "Foo");
        assert_eq!(config.sound.driver, "pulse");
        assert_eq!(config.watch.screenshot_dir, Some(PathBuf::from("/tmp/shots")));
        assert!(config.shutdown.propagate_kill);
    }

    #[test]
    fn test_flags_absent_keep_config() {
        let cli = Cli::try_parse_from(["alsaeventd"]).unwrap();
        let mut config = EventdConfig::default();
        config.sound.theme = "FromFile".to_string();
        cli.apply(&mut config);

        assert_eq!(config.sound.theme, "FromFile");
        assert!(!config.shutdown.propagate_kill);
    }

    #[test]
    fn test_parse_errors() {
        let unknown = Cli::try_parse_from(["alsaeventd", "--bogus"]).unwrap_err();
        assert_eq!(unknown.kind(), ErrorKind::UnknownArgument);

        assert!(Cli::try_parse_from(["alsaeventd", "-t"]).is_err());

        let help = Cli::try_parse_from(["alsaeventd", "-h"]).unwrap_err();
        assert_eq!(help.kind(), ErrorKind::DisplayHelp);

        let version = Cli::try_parse_from(["alsaeventd", "-V"]).unwrap_err();
        assert_eq!(version.kind(), ErrorKind::DisplayVersion);
    }
}
