//! Discovery and loading of spec files on disk.
//!
//! Spec files carry the `.hmr` extension. Sub markers inside them refer to
//! procedures supplied by the host test, so a spec checked on its own is
//! compiled against no-op placeholders.

use std::{
    fs,
    path::{Path, PathBuf},
};

use walkdir::WalkDir;

use crate::compile::{compile_document, CompiledSpec};
use crate::errors::{unsourced, ErrorKind, ReportContext, SourceContext, SpecError};
use crate::runtime::{sub, SubProcedure};
use crate::syntax::parser::parse;
use crate::syntax::Document;

pub const SPEC_EXTENSION: &str = "hmr";

/// A spec file, parsed and compiled.
#[derive(Debug)]
pub struct LoadedSpec {
    pub path: PathBuf,
    pub document: Document,
    pub compiled: CompiledSpec,
}

#[derive(Debug)]
pub struct SpecDiscoverer;

impl SpecDiscoverer {
    /// Recursively scans a directory for spec files, sorted by path.
    pub fn discover_spec_files<P: AsRef<Path>>(root: P) -> Result<Vec<PathBuf>, SpecError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(root) {
            let entry = entry.map_err(|e| {
                unsourced(
                    "discover",
                    ErrorKind::Io {
                        message: format!("failed to walk directory: {}", e),
                    },
                )
            })?;
            if entry.file_type().is_file() && Self::is_spec_file(entry.path()) {
                files.push(entry.path().to_path_buf());
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn is_spec_file(path: &Path) -> bool {
        path.extension().and_then(|ext| ext.to_str()) == Some(SPEC_EXTENSION)
    }

    pub fn read_source(path: &Path) -> Result<String, SpecError> {
        fs::read_to_string(path).map_err(|e| {
            unsourced(
                "discover",
                ErrorKind::Io {
                    message: format!("{}: {}", path.display(), e),
                },
            )
        })
    }

    /// Parse and compile a spec file against placeholder procedures.
    pub fn load(path: &Path) -> Result<LoadedSpec, SpecError> {
        let text = Self::read_source(path)?;
        let context = SourceContext::from_file(path.display().to_string(), text.as_str());
        let document = parse(&text, &context)?;
        let subs = placeholder_subs(&document);
        let compiled = compile_document(&document, &subs, &ReportContext::new(context, "compile"))?;
        Ok(LoadedSpec {
            path: path.to_path_buf(),
            document,
            compiled,
        })
    }
}

/// One no-op procedure per sub slot the document's expectations mention.
pub fn placeholder_subs(document: &Document) -> Vec<SubProcedure> {
    let slots = document
        .expectations
        .iter()
        .flat_map(|expectations| expectations.parts.iter())
        .flat_map(|part| part.subs.iter())
        .map(|marker| marker.slot + 1)
        .max()
        .unwrap_or(0);
    (0..slots).map(|_| sub(|_| Ok(()))).collect()
}
