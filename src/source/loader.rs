use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

use super::{Inference, Language, SourceUnit};
use crate::error::LoadError;

const SKIPPED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "target",
    "vendor",
    "venv",
    ".venv",
    "__pycache__",
    "build",
    "dist",
];

/// A unit as handed over by the ingestion layer, before it is read.
#[derive(Debug, Clone)]
pub enum UnitInput {
    Path {
        path: PathBuf,
        language: Option<Language>,
    },
    Buffer {
        name: String,
        bytes: Vec<u8>,
        language: Option<Language>,
    },
}

impl UnitInput {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path {
            path: path.into(),
            language: None,
        }
    }

    pub fn buffer(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::Buffer {
            name: name.into(),
            bytes: bytes.into(),
            language: None,
        }
    }

    pub fn with_language(self, hint: Language) -> Self {
        match self {
            Self::Path { path, .. } => Self::Path {
                path,
                language: Some(hint),
            },
            Self::Buffer { name, bytes, .. } => Self::Buffer {
                name,
                bytes,
                language: Some(hint),
            },
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::Path { path, .. } => path.display().to_string(),
            Self::Buffer { name, .. } => name.clone(),
        }
    }

    pub fn load(&self) -> Result<SourceUnit, LoadError> {
        match self {
            Self::Path { path, language } => load_path(path, *language),
            Self::Buffer {
                name,
                bytes,
                language,
            } => load_buffer(name, bytes, *language),
        }
    }
}

/// Picks the language from the hint, falling back to the file extension.
pub fn resolve_language(path: &Path, hint: Option<Language>) -> Result<Language, LoadError> {
    if let Some(language) = hint {
        return Ok(language);
    }
    match Language::infer(path) {
        Inference::Known(language) => Ok(language),
        Inference::Ambiguous(ext) => Err(LoadError::unsupported_language(
            path,
            format!("ambiguous extension '{ext}'"),
        )),
        Inference::Unknown(Some(ext)) => Err(LoadError::unsupported_language(
            path,
            format!("no model builder for extension '{ext}'"),
        )),
        Inference::Unknown(None) => Err(LoadError::unsupported_language(
            path,
            "no extension and no language hint",
        )),
    }
}

pub fn load_path(path: &Path, hint: Option<Language>) -> Result<SourceUnit, LoadError> {
    let language = resolve_language(path, hint)?;
    trace!(path = %path.display(), %language, "reading unit");
    let bytes = std::fs::read(path).map_err(|e| LoadError::from_io(path, e))?;
    decode(path.display().to_string(), bytes, language)
}

pub fn load_buffer(
    name: &str,
    bytes: &[u8],
    hint: Option<Language>,
) -> Result<SourceUnit, LoadError> {
    let language = resolve_language(Path::new(name), hint)?;
    decode(name.to_string(), bytes.to_vec(), language)
}

fn decode(name: String, bytes: Vec<u8>, language: Language) -> Result<SourceUnit, LoadError> {
    match String::from_utf8(bytes) {
        Ok(text) => Ok(SourceUnit::new(name, language, text)),
        Err(e) => Err(LoadError::invalid_encoding(
            name,
            e.utf8_error().valid_up_to(),
        )),
    }
}

/// Walks `root` and returns every file with a recognised extension, sorted.
/// A file path is returned as-is so an explicit single file is always scanned.
pub fn collect_sources(root: &Path) -> Result<Vec<PathBuf>, LoadError> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        entry.depth() == 0
            || !entry.file_type().is_dir()
            || entry
                .file_name()
                .to_str()
                .map(|name| !SKIPPED_DIRS.contains(&name))
                .unwrap_or(true)
    });

    for entry in walker {
        let entry = entry.map_err(|source| LoadError::DirectoryScanError {
            path: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if matches!(Language::infer(entry.path()), Inference::Known(_)) {
            files.push(entry.into_path());
        }
    }

    files.sort();
    debug!(root = %root.display(), count = files.len(), "collected source files");
    Ok(files)
}

/// Collects `root` as scan inputs. A language hint applies to an explicit
/// single file only; files found by walking a directory keep the language
/// their extension names.
pub fn collect_inputs(root: &Path, hint: Option<Language>) -> Result<Vec<UnitInput>, LoadError> {
    let hint = hint.filter(|_| root.is_file());
    let inputs = collect_sources(root)?
        .into_iter()
        .map(|path| match hint {
            Some(language) => UnitInput::path(path).with_language(language),
            None => UnitInput::path(path),
        })
        .collect();
    Ok(inputs)
}
