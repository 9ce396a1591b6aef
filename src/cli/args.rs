//! Command-line arguments and subcommands.
//!
//! Global flags mirror the environment variables the test runner reads, so
//! either can be used to configure a run.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "hmr-spec",
    version,
    about = "Parse, compile and check hot-reload update specs."
)]
pub struct HmrArgs {
    #[command(flatten)]
    pub run: RunFlags,

    #[command(subcommand)]
    pub command: Command,
}

/// Run configuration. Each flag falls back to its environment variable.
#[derive(Debug, Clone, Default, Args)]
pub struct RunFlags {
    /// Root of the app under test.
    #[arg(long, env = "APP", global = true)]
    pub app: Option<String>,
    /// Test naming detail: 0 per spec, 1 per update, 2 per step.
    #[arg(long, env = "DETAIL", global = true)]
    pub detail: Option<String>,
    /// Keep the build server and page open after the run.
    #[arg(long, env = "WATCH", global = true, num_args = 0..=1, default_missing_value = "1")]
    pub watch: Option<String>,
    /// Remote-control the build server over HTTP.
    #[arg(long = "rc-http", env = "RC_HTTP", global = true, num_args = 0..=1, default_missing_value = "1")]
    pub rc_http: Option<String>,
    /// Run end-to-end suites (`0`, `false` or `skip` to disable).
    #[arg(long, env = "E2E", global = true)]
    pub e2e: Option<String>,
}

impl RunFlags {
    /// Look a flag up by the name of its environment variable.
    pub fn lookup(&self, name: &str) -> Option<String> {
        match name {
            "APP" => self.app.clone(),
            "DETAIL" => self.detail.clone(),
            "WATCH" => self.watch.clone(),
            "RC_HTTP" => self.rc_http.clone(),
            "E2E" => self.e2e.clone(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Yaml,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the parsed document of a spec file.
    Parse {
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Compile a spec file and print its files and expectations.
    Compile {
        #[arg(required = true)]
        file: PathBuf,
        #[arg(long, value_enum, default_value = "json")]
        format: Format,
    },
    /// Print the normalized form of an html file.
    Normalize {
        #[arg(required = true)]
        file: PathBuf,
        /// Show a line diff against the normalized form of this file.
        #[arg(long)]
        against: Option<PathBuf>,
    },
    /// Print the test names a spec file reports under the current detail.
    Outline {
        #[arg(required = true)]
        file: PathBuf,
    },
    /// Parse and compile every `.hmr` spec under a directory.
    Check {
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}
