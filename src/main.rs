pub mod models {
    pub mod compass;
}

pub mod client;
pub mod config;
pub mod config_flow;
pub mod sensor;
pub mod services {
    pub mod poll;
}

use crate::client::CompassClient;
use crate::config::Config;
use crate::config_flow::{ConfigFlow, FlowResult, UserInput};
use crate::services::poll;
use log::{error, info};
use std::path::PathBuf;

#[derive(Debug)]
struct LoadedEnvFile {
    path: PathBuf,
    explicit: bool,
}

#[derive(Debug, Default)]
struct CliOptions {
    env_file: Option<PathBuf>,
    once: bool,
}

pub fn run(once: bool) -> Result<(), String> {
    // 1) Load config
    let cfg = Config::from_env()?;
    info!(
        "Config loaded (user={}, poll_interval={}s)",
        cfg.username,
        cfg.poll_interval.as_secs()
    );

    // 2) Validate credentials the way the setup form does
    let flow = ConfigFlow::new();
    let entry = match flow.step_user(Some(UserInput {
        username: cfg.username.clone(),
        password: cfg.password.clone(),
    })) {
        FlowResult::CreateEntry(entry) => entry,
        FlowResult::ShowForm { errors, .. } => {
            let codes = errors.values().map(|e| e.code()).collect::<Vec<_>>().join(", ");
            return Err(format!("Setup rejected: {}", codes));
        }
    };
    info!("Credentials accepted, entry '{}' created", entry.title);

    // 3) Set up sensors, each refreshed once
    let mut platform = sensor::setup_entry(CompassClient::new(), &entry)
        .map_err(|e| format!("Setting up sensors failed: {}", e))?;
    info!("Authenticated to Compass API, {} sensor(s) registered", platform.sensors.len());

    if once {
        return poll::run_once(&platform.client);
    }

    // 4) Refresh loop (steady cadence)
    info!(
        "Starting refresh loop: sensors={}, interval={}s",
        platform.sensors.len(),
        cfg.poll_interval.as_secs()
    );
    poll::run_loop(&mut platform, cfg.poll_interval)
}

fn parse_cli(args: impl Iterator<Item = std::ffi::OsString>) -> Result<CliOptions, String> {
    fn set_env_file(opts: &mut CliOptions, path: PathBuf) -> Result<(), String> {
        if opts.env_file.is_some() {
            return Err("`--env-file` provided more than once".to_string());
        }
        opts.env_file = Some(path);
        Ok(())
    }

    let mut opts = CliOptions::default();
    let mut args = args;

    while let Some(arg) = args.next() {
        match arg.to_str() {
            Some("--env-file") => {
                let value = args
                    .next()
                    .ok_or_else(|| "`--env-file` requires a path argument".to_string())?;
                set_env_file(&mut opts, PathBuf::from(value))?;
            }
            Some(s) if s.starts_with("--env-file=") => {
                let path_str = &s["--env-file=".len()..];
                if path_str.is_empty() {
                    return Err("`--env-file` requires a path argument".to_string());
                }
                set_env_file(&mut opts, PathBuf::from(path_str))?;
            }
            Some("--once") => opts.once = true,
            Some("--") => break,
            Some(other) => return Err(format!("unrecognised argument: {}", other)),
            None => return Err("argument contains invalid UTF-8".to_string()),
        }
    }

    Ok(opts)
}

fn configure_env(opts: &CliOptions) -> Result<Option<LoadedEnvFile>, String> {
    if let Some(path) = opts.env_file.clone() {
        if !path.is_file() {
            return Err(format!("env file not found: {}", path.display()));
        }
        config::load_env_file(&path)?;
        return Ok(Some(LoadedEnvFile { path, explicit: true }));
    }

    let cwd = std::env::current_dir().map_err(|e| format!("unable to read current directory: {}", e))?;
    let default_path = cwd.join(".env");
    if default_path.is_file() {
        config::load_env_file(&default_path)?;
        Ok(Some(LoadedEnvFile {
            path: default_path,
            explicit: false,
        }))
    } else {
        Ok(None)
    }
}

fn main() {
    let opts = match parse_cli(std::env::args_os().skip(1)) {
        Ok(opts) => opts,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };
    let loaded_env = match configure_env(&opts) {
        Ok(info) => info,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(1);
        }
    };

    // Init logging after environment so RUST_LOG from .env is respected.
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    if let Some(info) = loaded_env.as_ref() {
        let origin = if info.explicit { "CLI-specified" } else { "default" };
        info!("Environment loaded from {} .env file: {}", origin, info.path.display());
    }

    info!(
        "compass-pool-heater {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run(opts.once) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    fn args(list: &[&str]) -> impl Iterator<Item = OsString> {
        list.iter().map(|s| OsString::from(*s)).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn cli_flags() {
        let opts = parse_cli(args(&["--once", "--env-file", "pool.env"])).unwrap();
        assert!(opts.once);
        assert_eq!(opts.env_file, Some(PathBuf::from("pool.env")));

        let opts = parse_cli(args(&["--env-file=other.env"])).unwrap();
        assert!(!opts.once);
        assert_eq!(opts.env_file, Some(PathBuf::from("other.env")));
    }

    #[test]
    fn cli_rejects_bad_arguments() {
        assert!(parse_cli(args(&["--env-file"])).is_err());
        assert!(parse_cli(args(&["--env-file="])).is_err());
        assert!(parse_cli(args(&["--env-file", "a", "--env-file", "b"])).is_err());
        assert!(parse_cli(args(&["--verbose"])).is_err());
    }
}
