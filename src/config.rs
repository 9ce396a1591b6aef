//! Configuration of a test run.
//!
//! Built once at startup and passed by reference. Nothing below the binary
//! reads the environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Root of the app under test. Sources live in `<app_path>/src`.
    pub app_path: PathBuf,
    /// Element whose inner HTML html steps compare against.
    pub app_root_selector: String,
    /// Markup the app always renders first; stripped before comparison.
    pub app_html_prefix: String,
    /// 0: one test per spec, 1: one per update, 2: one per step.
    pub detail: u8,
    /// Keep the build server and page open after the run.
    pub keep_running: bool,
    /// Run the end-to-end suites.
    pub e2e: bool,
    /// Remote-control the build server over HTTP instead of in-process.
    pub rc_over_http: bool,
    /// Reuse one build server and reset its sources between tests.
    pub fast_reset: bool,
    pub hmr_ready_message: String,
    pub hmr_done_message: String,
    pub hmr_nothing_changed_message: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_path: PathBuf::from("app"),
            app_root_selector: "body".to_string(),
            app_html_prefix: "<script src=\"bundle.js\"></script>".to_string(),
            detail: 1,
            keep_running: false,
            e2e: true,
            rc_over_http: false,
            fast_reset: true,
            hmr_ready_message: "[HMR] Enabled".to_string(),
            hmr_done_message: "[HMR] Up to date".to_string(),
            hmr_nothing_changed_message: "[HMR] Nothing changed".to_string(),
        }
    }
}

impl Config {
    /// Read `APP`, `DETAIL`, `WATCH`, `E2E` and `RC_HTTP` from the process
    /// environment.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Same as [`Config::from_env`] over an arbitrary lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let mut config = Config {
            app_path: cwd.join("app"),
            ..Config::default()
        };

        if let Some(app) = lookup("APP") {
            config.app_path = resolve_app_path(&cwd, &app);
        }
        if let Some(detail) = lookup("DETAIL") {
            match detail.trim().parse::<u8>() {
                Ok(detail) => config.detail = detail,
                Err(_) => warn!(value = %detail, "ignoring invalid DETAIL"),
            }
        }
        if let Some(watch) = lookup("WATCH") {
            config.keep_running = is_set(&watch);
        }
        if let Some(e2e) = lookup("E2E") {
            config.e2e = !matches!(e2e.trim(), "0" | "skip" | "false" | "");
        }
        if let Some(rc) = lookup("RC_HTTP") {
            config.rc_over_http = is_set(&rc);
        }
        config
    }

    pub fn src_dir(&self) -> PathBuf {
        self.app_path.join("src")
    }

    /// A spec becomes a group of tests rather than a single one.
    pub fn run_tag_as_describe(&self) -> bool {
        self.detail > 0
    }

    /// Every step gets its own test.
    pub fn describe_by_step(&self) -> bool {
        self.detail > 1
    }
}

fn is_set(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && value != "0"
}

fn resolve_app_path(cwd: &Path, app: &str) -> PathBuf {
    let path = Path::new(app);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_follow_the_reference_app() {
        let config = from(&[]);
        assert!(config.app_path.ends_with("app"));
        assert_eq!(config.app_root_selector, "body");
        assert_eq!(config.detail, 1);
        assert!(config.e2e);
        assert!(!config.keep_running);
        assert!(config.run_tag_as_describe());
        assert!(!config.describe_by_step());
    }

    #[test]
    fn reads_flags() {
        let config = from(&[("APP", "/srv/app"), ("DETAIL", "2"), ("WATCH", "1"), ("E2E", "skip")]);
        assert_eq!(config.app_path, PathBuf::from("/srv/app"));
        assert_eq!(config.src_dir(), PathBuf::from("/srv/app/src"));
        assert!(config.describe_by_step());
        assert!(config.keep_running);
        assert!(!config.e2e);
    }

    #[test]
    fn zero_means_off() {
        let config = from(&[("WATCH", "0"), ("RC_HTTP", "0"), ("DETAIL", "0")]);
        assert!(!config.keep_running);
        assert!(!config.rc_over_http);
        assert!(!config.run_tag_as_describe());
    }

    #[test]
    fn invalid_detail_keeps_default() {
        assert_eq!(from(&[("DETAIL", "lots")]).detail, 1);
    }
}
