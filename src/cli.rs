//! The hmr-spec command-line interface.
//!
//! Every subcommand works on spec files alone. Running specs against a live
//! app needs a host-provided launcher and happens through
//! [`crate::runtime::run_spec_test`].

use std::{fs, path::Path, process};

use clap::Parser;
use tracing::debug;

use crate::{
    cli::args::{Command, Format, HmrArgs},
    cli::output::{print_check, print_diff, print_summary, stdout},
    compile::normalize_html,
    config::Config,
    discovery::SpecDiscoverer,
    errors::{print_error, SpecError},
    outline::outline,
};

pub mod args;
pub mod output;

// ============================================================================
// MAIN ENTRY POINT
// ============================================================================

/// The main entry point for the CLI.
pub fn run() {
    let args = HmrArgs::parse();
    let config = Config::from_vars(|name| args.run.lookup(name));
    debug!(?config, "configuration");

    match args.command {
        Command::Parse { file } => {
            let loaded = SpecDiscoverer::load(&file).unwrap_or_else(|e| exit_with(e));
            println!("{:#?}", loaded.document);
        }

        Command::Compile { file, format } => {
            let loaded = SpecDiscoverer::load(&file).unwrap_or_else(|e| exit_with(e));
            let view = loaded.compiled.view();
            let rendered = match format {
                Format::Json => serde_json::to_string_pretty(&view).map_err(|e| e.to_string()),
                Format::Yaml => serde_yaml::to_string(&view).map_err(|e| e.to_string()),
            };
            match rendered {
                Ok(text) => println!("{}", text.trim_end()),
                Err(e) => {
                    eprintln!("Error: failed to serialize {}: {}", file.display(), e);
                    process::exit(1);
                }
            }
        }

        Command::Normalize { file, against } => {
            let html = normalize_html(&read_file_or_exit(&file));
            match against {
                None => println!("{}", html),
                Some(other) => {
                    let other = normalize_html(&read_file_or_exit(&other));
                    let mut out = stdout();
                    print_diff(&mut out, &html, &other);
                    if html != other {
                        process::exit(1);
                    }
                }
            }
        }

        Command::Outline { file } => {
            let loaded = SpecDiscoverer::load(&file).unwrap_or_else(|e| exit_with(e));
            let title = loaded
                .compiled
                .title
                .clone()
                .unwrap_or_else(|| file.display().to_string());
            print!("{}", outline(&title, &loaded.compiled.expects, &config));
        }

        Command::Check { path } => {
            if !run_check(&path) {
                process::exit(1);
            }
        }
    }
}

// ============================================================================
// CHECK RUNNER
// ============================================================================

/// Parse and compile every spec under `path`. Returns whether all passed.
fn run_check(path: &Path) -> bool {
    let files = SpecDiscoverer::discover_spec_files(path).unwrap_or_else(|e| exit_with(e));
    let mut out = stdout();
    let mut passed = 0;
    let mut failed = 0;

    for file in &files {
        let name = file.strip_prefix(path).unwrap_or(file).display().to_string();
        match SpecDiscoverer::load(file) {
            Ok(loaded) => {
                passed += 1;
                print_check(&mut out, &name, loaded.compiled.title.as_deref(), true);
            }
            Err(e) => {
                failed += 1;
                print_check(&mut out, &name, None, false);
                print_error(e);
            }
        }
    }

    print_summary(&mut out, passed, failed);
    failed == 0
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn read_file_or_exit(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading file '{}': {}", path.display(), e);
        process::exit(1);
    })
}

fn exit_with(error: SpecError) -> ! {
    print_error(error);
    process::exit(1);
}
