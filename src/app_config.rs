//! Configuration loading: config file defaults merged with command-line overrides.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use changelog_mirror::{
    Credentials, DEFAULT_CONCURRENCY, DEFAULT_REFRESH_INTERVAL, DEFAULT_SUMMARY_INTERVAL,
    HttpTimeouts, MAX_CONCURRENCY, MirrorSettings,
};
use changelog_mirror::source::DEFAULT_LIST_TITLE;
use url::Url;

use crate::cli::Args;

/// Application directory name under the user config directory.
const APP_DIR: &str = "changelog-mirror";

/// Values read from the config file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Site hosting the change log list.
    pub site: Option<String>,
    /// Title of the change log list.
    pub list: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub domain: Option<String>,
    /// Number of download workers (0..=100).
    pub concurrent_downloads: Option<u64>,
    /// Milliseconds between poll cycles.
    pub refresh_interval_ms: Option<u64>,
    /// Log every query and download individually.
    pub debug_mode: Option<bool>,
    /// Seconds per download summary.
    pub summary_interval_secs: Option<u64>,
    /// Directory for temporary download files.
    pub temp_dir: Option<PathBuf>,
    pub connect_timeout_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Validates config values against runtime constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrent_downloads
            && usize::try_from(concurrency).map_or(true, |value| value > MAX_CONCURRENCY)
        {
            bail!(
                "Invalid config value for `concurrent_downloads`: {concurrency}. Expected range: 0..={MAX_CONCURRENCY}"
            );
        }
        if self.refresh_interval_ms == Some(0) {
            bail!("Invalid config value for `refresh_interval_ms`: 0. Expected a positive value");
        }
        if self.summary_interval_secs == Some(0) {
            bail!("Invalid config value for `summary_interval_secs`: 0. Expected a positive value");
        }
        if let Some(site) = &self.site {
            parse_site(site).context("Invalid config value for `site`")?;
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    pub site: Url,
    pub list: String,
    pub credentials: Option<Credentials>,
    pub timeouts: HttpTimeouts,
    pub settings: MirrorSettings,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/changelog-mirror/config.toml`
/// 2. `$HOME/.config/changelog-mirror/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join(APP_DIR).join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file.
///
/// An explicit path must exist; the default path is optional.
pub fn load_file_config(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    if let Some(path) = explicit {
        return read_file_config(path).map(Some);
    }
    match resolve_default_config_path() {
        Some(path) if path.exists() => read_file_config(&path).map(Some),
        _ => Ok(None),
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

/// Merges command-line values over file values over built-in defaults.
pub fn resolve_config(args: &Args, file: Option<&FileConfig>) -> Result<MirrorConfig> {
    let file = file.cloned().unwrap_or_default();

    let Some(site) = args.site.clone().or(file.site) else {
        bail!("No change log site configured. Pass --site or set `site` in the config file");
    };
    let site = parse_site(&site).context("Invalid --site value")?;

    let list = args
        .list
        .clone()
        .or(file.list)
        .unwrap_or_else(|| DEFAULT_LIST_TITLE.to_string());

    let username = args.username.clone().or(file.username).unwrap_or_default();
    let password = args.password.clone().or(file.password).unwrap_or_default();
    let domain = args.domain.clone().or(file.domain).unwrap_or_default();
    let credentials = Credentials::from_parts(&username, &password, &domain);

    let concurrency = match args.concurrency {
        Some(value) => usize::from(value),
        None => match file.concurrent_downloads {
            Some(value) => usize::try_from(value)
                .context("`concurrent_downloads` out of range for this platform")?,
            None => DEFAULT_CONCURRENCY,
        },
    };

    let refresh_interval = args
        .interval_ms
        .or(file.refresh_interval_ms)
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_REFRESH_INTERVAL);

    let summary_interval = args
        .summary_interval
        .or(file.summary_interval_secs)
        .map_or(DEFAULT_SUMMARY_INTERVAL, Duration::from_secs);

    let defaults = HttpTimeouts::default();
    let timeouts = HttpTimeouts {
        connect_secs: args
            .connect_timeout
            .or(file.connect_timeout_secs)
            .unwrap_or(defaults.connect_secs),
        read_secs: args
            .read_timeout
            .or(file.read_timeout_secs)
            .unwrap_or(defaults.read_secs),
    };

    let settings = MirrorSettings {
        concurrency,
        refresh_interval,
        summary_interval,
        temp_dir: args.temp_dir.clone().or(file.temp_dir),
        debug_mode: args.debug || file.debug_mode.unwrap_or(false),
    };
    settings.validate()?;

    Ok(MirrorConfig {
        site,
        list,
        credentials,
        timeouts,
        settings,
    })
}

fn parse_site(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).with_context(|| format!("'{raw}' is not an absolute URL"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("'{raw}' must use http or https");
    }
    Ok(url)
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = || format!("Invalid `{key}` value on line {}", line_index + 1);

        match key {
            "site" => cfg.site = Some(parse_string_literal(value).with_context(invalid)?),
            "list" => cfg.list = Some(parse_string_literal(value).with_context(invalid)?),
            "username" => cfg.username = Some(parse_string_literal(value).with_context(invalid)?),
            "password" => cfg.password = Some(parse_string_literal(value).with_context(invalid)?),
            "domain" => cfg.domain = Some(parse_string_literal(value).with_context(invalid)?),
            "concurrent_downloads" => {
                cfg.concurrent_downloads = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "refresh_interval_ms" => {
                cfg.refresh_interval_ms = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "debug_mode" => cfg.debug_mode = Some(parse_boolean(value).with_context(invalid)?),
            "summary_interval_secs" => {
                cfg.summary_interval_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "temp_dir" => {
                cfg.temp_dir = Some(PathBuf::from(
                    parse_string_literal(value).with_context(invalid)?,
                ));
            }
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "read_timeout_secs" => {
                cfg.read_timeout_secs = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            unknown => {
                bail!(
                    "Unknown configuration key: '{}' on line {}",
                    unknown,
                    line_index + 1
                );
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_boolean(raw_value: &str) -> Result<bool> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => bail!("Expected 'true' or 'false'"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use clap::Parser;
    use tempfile::TempDir;

    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["changelog-mirror"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_config_full() {
        let cfg = parse_config_str(
            r#"
site = "https://intranet.example.com/sites/docs"
list = "ChangeLog"
username = "svc-mirror"
password = "hunter2" # not a comment # inside
domain = "CORP"
concurrent_downloads = 4
refresh_interval_ms = 30000
debug_mode = true
summary_interval_secs = 600
temp_dir = "/var/tmp/mirror"
connect_timeout_secs = 10
read_timeout_secs = 120
"#,
        )
        .expect("full config should parse");
        assert_eq!(
            cfg.site.as_deref(),
            Some("https://intranet.example.com/sites/docs")
        );
        assert_eq!(cfg.list.as_deref(), Some("ChangeLog"));
        assert_eq!(cfg.password.as_deref(), Some("hunter2"));
        assert_eq!(cfg.concurrent_downloads, Some(4));
        assert_eq!(cfg.refresh_interval_ms, Some(30_000));
        assert_eq!(cfg.debug_mode, Some(true));
        assert_eq!(cfg.summary_interval_secs, Some(600));
        assert_eq!(cfg.temp_dir, Some(PathBuf::from("/var/tmp/mirror")));
        assert_eq!(cfg.connect_timeout_secs, Some(10));
        assert_eq!(cfg.read_timeout_secs, Some(120));
    }

    #[test]
    fn test_parse_config_keeps_hash_inside_strings() {
        let cfg = parse_config_str(r#"password = "a#b" # trailing"#).unwrap();
        assert_eq!(cfg.password.as_deref(), Some("a#b"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_keys() {
        let err = parse_config_str("output_dir = \"x\"").expect_err("unknown key error expected");
        assert!(err.to_string().contains("Unknown configuration key"));
        assert!(err.to_string().contains("output_dir"));
    }

    #[test]
    fn test_parse_config_rejects_missing_equals() {
        let err = parse_config_str("site").expect_err("syntax error expected");
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_parse_config_rejects_out_of_range_concurrency() {
        let err = parse_config_str("concurrent_downloads = 101").expect_err("range error expected");
        assert!(err.to_string().contains("concurrent_downloads"));
    }

    #[test]
    fn test_parse_config_accepts_zero_workers() {
        let cfg = parse_config_str("concurrent_downloads = 0").unwrap();
        assert_eq!(cfg.concurrent_downloads, Some(0));
    }

    #[test]
    fn test_parse_config_rejects_zero_interval() {
        let err = parse_config_str("refresh_interval_ms = 0").expect_err("zero interval");
        assert!(err.to_string().contains("refresh_interval_ms"));
    }

    #[test]
    fn test_parse_config_rejects_unquoted_string_and_bad_bool() {
        let err = parse_config_str("site = https://example.com").expect_err("unquoted");
        assert!(format!("{err:#}").contains("double-quoted"));

        let err = parse_config_str("debug_mode = yes").expect_err("bad bool");
        assert!(err.to_string().contains("debug_mode"));
    }

    #[test]
    fn test_parse_config_rejects_relative_site() {
        let err = parse_config_str(r#"site = "intranet/sites/docs""#).expect_err("relative site");
        assert!(err.to_string().contains("site"));
    }

    #[test]
    fn test_parse_config_rejects_invalid_timeout() {
        let err = parse_config_str("read_timeout_secs = 0").expect_err("invalid timeout");
        assert!(err.to_string().contains("read_timeout_secs"));
    }

    #[test]
    fn test_resolve_config_defaults() {
        let config = resolve_config(&args(&["--site", "https://example.com/sites/docs"]), None)
            .unwrap();
        assert_eq!(config.list, "FileChangedLog");
        assert!(config.credentials.is_none());
        assert_eq!(config.settings.concurrency, 2);
        assert_eq!(config.settings.refresh_interval, Duration::from_secs(60));
        assert_eq!(config.settings.summary_interval, Duration::from_secs(3600));
        assert!(!config.settings.debug_mode);
        assert_eq!(config.timeouts, HttpTimeouts::default());
    }

    #[test]
    fn test_resolve_config_requires_site() {
        let err = resolve_config(&args(&[]), None).expect_err("site is required");
        assert!(err.to_string().contains("--site"));
    }

    #[test]
    fn test_resolve_config_cli_overrides_file() {
        let file = FileConfig {
            site: Some("https://file.example.com/".to_string()),
            concurrent_downloads: Some(8),
            refresh_interval_ms: Some(5_000),
            username: Some("file-user".to_string()),
            password: Some("secret".to_string()),
            domain: Some("CORP".to_string()),
            ..FileConfig::default()
        };
        let config = resolve_config(
            &args(&["--site", "https://cli.example.com/", "-c", "3", "--username", "cli-user"]),
            Some(&file),
        )
        .unwrap();

        assert_eq!(config.site.as_str(), "https://cli.example.com/");
        assert_eq!(config.settings.concurrency, 3);
        assert_eq!(config.settings.refresh_interval, Duration::from_millis(5_000));
        assert_eq!(config.credentials.unwrap().login(), "CORP\\cli-user");
    }

    #[test]
    fn test_resolve_config_interval_uses_milliseconds_in_both_layers() {
        let file = FileConfig {
            site: Some("https://file.example.com/".to_string()),
            refresh_interval_ms: Some(5_000),
            ..FileConfig::default()
        };
        let config = resolve_config(&args(&["--interval-ms", "750"]), Some(&file)).unwrap();
        assert_eq!(config.settings.refresh_interval, Duration::from_millis(750));
    }

    #[test]
    fn test_resolve_config_partial_credentials_are_ignored() {
        let config = resolve_config(
            &args(&[
                "--site",
                "https://example.com/",
                "--username",
                "svc",
                "--password",
                "pw",
            ]),
            None,
        )
        .unwrap();
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_load_file_config_explicit_path_must_exist() {
        let temp = TempDir::new().unwrap();
        let err = load_file_config(Some(&temp.path().join("missing.toml")))
            .expect_err("missing explicit config");
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_file_config_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        fs::write(&path, "concurrent_downloads = 5\n").unwrap();
        let cfg = load_file_config(Some(&path)).unwrap().unwrap();
        assert_eq!(cfg.concurrent_downloads, Some(5));
    }
}
