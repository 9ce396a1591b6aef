//! In-process build collaborator.
//!
//! [`MemoryBuild`] keeps the app's sources in a [`MemoryFs`] and runs a
//! rebuild hook after every reset and every batch of writes, the way a
//! watching bundler would. Built output is served from the `public` dir.
//!
//! Each successful rebuild appends the configured HMR status line to the
//! build's console, the way the dev client in the page reports it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use url::Url;

use crate::collab::{BuildServer, ChangeSet, FileChange};
use crate::config::Config;
use crate::errors::{unsourced, ErrorKind, SpecError};
use crate::vfs::{FileSystem, MemoryFs, Reset, VfsError};

type RebuildHook = Box<dyn FnMut(&mut MemoryFs) -> Result<(), String>>;

/// A static file as served to the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub path: PathBuf,
    pub mime: Option<&'static str>,
    pub body: String,
}

pub struct MemoryBuild {
    fs: MemoryFs,
    base_url: Url,
    rebuild: RebuildHook,
    builds: usize,
    closed: bool,
    /// Keep built output across resets.
    fast_reset: bool,
    messages: HmrMessages,
    console: Vec<String>,
}

#[derive(Debug, Clone)]
struct HmrMessages {
    ready: String,
    done: String,
    nothing_changed: String,
}

impl MemoryBuild {
    /// An in-process build for `config`. Fails when the config asks for a
    /// build server remote-controlled over HTTP.
    pub fn new(config: &Config) -> Result<Self, SpecError> {
        if config.rc_over_http {
            return Err(unsourced(
                "build",
                ErrorKind::Build {
                    message: "RC_HTTP is set but the build runs in process".to_string(),
                },
            ));
        }
        let base_url = Url::parse("http://localhost:8080/").map_err(|e| {
            unsourced(
                "build",
                ErrorKind::Io {
                    message: e.to_string(),
                },
            )
        })?;
        Ok(Self {
            fs: MemoryFs::new(config.app_path.clone()),
            base_url,
            rebuild: Box::new(|_| Ok(())),
            builds: 0,
            closed: false,
            fast_reset: config.fast_reset,
            messages: HmrMessages {
                ready: config.hmr_ready_message.clone(),
                done: config.hmr_done_message.clone(),
                nothing_changed: config.hmr_nothing_changed_message.clone(),
            },
            console: Vec::new(),
        })
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    /// Hook run on every rebuild. An `Err` is reported as a build error.
    pub fn on_rebuild<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut MemoryFs) -> Result<(), String> + 'static,
    {
        self.rebuild = Box::new(hook);
        self
    }

    pub fn fs(&self) -> &MemoryFs {
        &self.fs
    }

    /// Number of rebuilds so far.
    pub fn builds(&self) -> usize {
        self.builds
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// HMR status lines, oldest first.
    pub fn console(&self) -> &[String] {
        &self.console
    }

    /// Resolve a request path against `public/`. Directories serve their
    /// `index.html`.
    pub fn fetch(&self, url_path: &str) -> Result<Asset, VfsError> {
        let mut path = Path::new("public").join(url_path.trim_start_matches('/'));
        if self.fs.stat(&path)?.is_dir() {
            path = path.join("index.html");
        }
        let body = self.fs.read(&path)?;
        Ok(Asset {
            mime: mime_type(&path),
            path,
            body,
        })
    }

    fn src(path: &str) -> PathBuf {
        Path::new("src").join(path)
    }

    fn run_rebuild(&mut self, changed: bool) -> Result<(), SpecError> {
        self.builds += 1;
        debug!(build = self.builds, changed, "rebuilding");
        (self.rebuild)(&mut self.fs).map_err(|message| unsourced("build", ErrorKind::Build { message }))?;
        if self.console.is_empty() {
            self.console.push(self.messages.ready.clone());
        }
        let status = if changed {
            &self.messages.done
        } else {
            &self.messages.nothing_changed
        };
        self.console.push(status.clone());
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), SpecError> {
        if self.closed {
            return Err(unsourced(
                "build",
                ErrorKind::Build {
                    message: "build server is closed".to_string(),
                },
            ));
        }
        Ok(())
    }
}

impl BuildServer for MemoryBuild {
    fn reset(&mut self, files: &BTreeMap<String, String>) -> Result<Vec<String>, SpecError> {
        self.ensure_open()?;
        let public: Vec<(PathBuf, String)> = if self.fast_reset {
            self.fs
                .files()
                .filter(|(path, _)| path.starts_with(self.fs.root().join("public")))
                .map(|(path, contents)| (path.to_path_buf(), contents.to_string()))
                .collect()
        } else {
            Vec::new()
        };
        let sources: BTreeMap<String, String> = files
            .iter()
            .map(|(path, contents)| (Self::src(path).to_string_lossy().into_owned(), contents.clone()))
            .collect();
        let changed = self.fs.reset(&sources)?;
        for (path, contents) in public {
            self.fs.write(&path, &contents)?;
        }
        let public_root = self.fs.root().join("public");
        let changed: Vec<String> = changed
            .into_iter()
            .filter(|path| !path.starts_with(&public_root))
            .map(|path| path.to_string_lossy().into_owned())
            .collect();
        info!(files = files.len(), changed = changed.len(), "sources reset");
        self.run_rebuild(!changed.is_empty())?;
        Ok(changed)
    }

    fn write_files(&mut self, changes: &ChangeSet) -> Result<(), SpecError> {
        self.ensure_open()?;
        let changed = changes
            .iter()
            .any(|(path, change)| self.fs.read(&Self::src(path)).ok().as_deref() != change.as_text());
        for (path, change) in changes {
            match change {
                FileChange::Write(contents) => self.fs.write(&Self::src(path), contents)?,
                FileChange::Remove => match self.fs.remove(&Self::src(path)) {
                    Ok(()) | Err(VfsError::NotFound(_)) => {}
                    Err(error) => return Err(error.into()),
                },
            }
        }
        self.run_rebuild(changed)
    }

    fn wait(&mut self, what: &str) -> Result<(), SpecError> {
        self.ensure_open()?;
        match what {
            "rebuild" => self.run_rebuild(false),
            "idle" => Ok(()),
            other => Err(unsourced(
                "build",
                ErrorKind::Build {
                    message: format!("unknown wait condition '{}'", other),
                },
            )),
        }
    }

    fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn close(&mut self) -> Result<(), SpecError> {
        if !self.closed {
            info!("build server closed");
            self.closed = true;
        }
        Ok(())
    }
}

fn mime_type(path: &Path) -> Option<&'static str> {
    match path.extension()?.to_str()? {
        "html" => Some("text/html"),
        "js" => Some("text/javascript"),
        "css" => Some("text/css"),
        "json" => Some("application/json"),
        _ => None,
    }
}
