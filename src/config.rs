//! Minimal runtime configuration helpers.
//! Credentials come from the environment, optionally seeded from a `.env` file.

use std::fmt;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_POLL_SECS: u64 = 30;

#[derive(Clone)]
pub struct Config {
    pub username: String,
    pub password: String,
    /// Sensor refresh cadence.
    pub poll_interval: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let required = |key: &str| match lookup(key) {
            Some(v) if !v.trim().is_empty() => Ok(v),
            _ => Err(format!("Missing credentials: set {key}")),
        };

        let username = required("COMPASS_USERNAME")?;
        let password = required("COMPASS_PASSWORD")?;

        let poll_secs = match lookup("POLL_INTERVAL_SECS") {
            Some(s) if !s.trim().is_empty() => match s.trim().parse::<u64>() {
                Ok(0) | Err(_) => return Err("POLL_INTERVAL_SECS must be a positive integer".to_string()),
                Ok(v) => v,
            },
            _ => DEFAULT_POLL_SECS,
        };

        Ok(Config {
            username: username.trim().to_string(),
            password,
            poll_interval: Duration::from_secs(poll_secs),
        })
    }
}

/// Load `KEY=VALUE` lines into the process environment. Variables that are
/// already set win over the file.
pub fn load_env_file(path: &Path) -> Result<(), String> {
    let contents = std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;

    for (index, line) in contents.lines().enumerate() {
        let parsed = parse_env_assignment(line).map_err(|e| format!("{}:{}: {}", path.display(), index + 1, e))?;
        if let Some((key, value)) = parsed
            && std::env::var_os(&key).is_none()
        {
            // Only called from main before any other thread exists.
            unsafe {
                std::env::set_var(key, value);
            }
        }
    }

    Ok(())
}

pub fn parse_env_assignment(line: &str) -> Result<Option<(String, String)>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let assignment = trimmed.strip_prefix("export ").map(str::trim_start).unwrap_or(trimmed);
    let (key, raw) = assignment
        .split_once('=')
        .ok_or_else(|| "missing '=' in assignment".to_string())?;
    let key = key.trim();

    if key.is_empty() {
        return Err("environment variable name cannot be empty".to_string());
    }
    if key.chars().any(char::is_whitespace) {
        return Err(format!("environment variable name contains whitespace: {}", key));
    }

    Ok(Some((key.to_string(), parse_env_value(raw)?)))
}

fn parse_env_value(raw: &str) -> Result<String, String> {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix('"') {
        return parse_double_quoted(rest);
    }
    if let Some(rest) = raw.strip_prefix('\'') {
        // Single quotes are literal: no escapes.
        let (value, tail) = rest
            .split_once('\'')
            .ok_or_else(|| "unterminated single-quoted value".to_string())?;
        check_tail(tail, "single quote")?;
        return Ok(value.to_string());
    }

    // Unquoted: an inline comment ends the value.
    let value = raw.split_once(" #").map(|(v, _)| v).unwrap_or(raw);
    Ok(value.trim_end().to_string())
}

fn parse_double_quoted(input: &str) -> Result<String, String> {
    let mut result = String::new();
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| "unterminated escape sequence in double-quoted value".to_string())?;
                result.push(match escaped {
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    other => other,
                });
            }
            '"' => {
                check_tail(chars.as_str(), "double quote")?;
                return Ok(result);
            }
            other => result.push(other),
        }
    }

    Err("unterminated double-quoted value".to_string())
}

fn check_tail(tail: &str, quote: &str) -> Result<(), String> {
    let tail = tail.trim();
    if tail.is_empty() || tail.starts_with('#') {
        Ok(())
    } else {
        Err(format!("unexpected characters after closing {quote}"))
    }
}
