use clap::ValueEnum;
use serde::Serialize;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Java,
    Python,
    #[value(name = "javascript")]
    JavaScript,
    #[value(name = "typescript")]
    TypeScript,
    Tsx,
    Go,
    Rust,
}

/// Outcome of extension-based inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inference {
    Known(Language),
    /// The extension maps to several languages and none is preferred.
    Ambiguous(String),
    Unknown(Option<String>),
}

const AMBIGUOUS_EXTENSIONS: &[&str] = &["h", "inc", "m"];

impl Language {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "java" => Some(Self::Java),
            "python" | "py" => Some(Self::Python),
            "javascript" | "js" => Some(Self::JavaScript),
            "typescript" | "ts" => Some(Self::TypeScript),
            "tsx" => Some(Self::Tsx),
            "go" | "golang" => Some(Self::Go),
            "rust" | "rs" => Some(Self::Rust),
            _ => None,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "java" => Some(Self::Java),
            "py" | "pyi" => Some(Self::Python),
            "js" | "jsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "ts" | "mts" | "cts" => Some(Self::TypeScript),
            "tsx" => Some(Self::Tsx),
            "go" => Some(Self::Go),
            "rs" => Some(Self::Rust),
            _ => None,
        }
    }

    pub fn infer(path: &Path) -> Inference {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return Inference::Unknown(None);
        };
        let ext = ext.to_lowercase();
        if AMBIGUOUS_EXTENSIONS.contains(&ext.as_str()) {
            return Inference::Ambiguous(ext);
        }
        match Self::from_extension(&ext) {
            Some(language) => Inference::Known(language),
            None => Inference::Unknown(Some(ext)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Java => "java",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::Go => "go",
            Self::Rust => "rust",
        }
    }

    pub fn grammar(&self) -> tree_sitter::Language {
        match self {
            Self::Java => tree_sitter_java::LANGUAGE.into(),
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Self::Go => tree_sitter_go::LANGUAGE.into(),
            Self::Rust => tree_sitter_rust::LANGUAGE.into(),
        }
    }

    /// Whether the JavaScript family of node-kind tables applies.
    pub fn is_ecmascript(&self) -> bool {
        matches!(self, Self::JavaScript | Self::TypeScript | Self::Tsx)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parse() {
        assert_eq!(Language::parse("java"), Some(Language::Java));
        assert_eq!(Language::parse("Py"), Some(Language::Python));
        assert_eq!(Language::parse("js"), Some(Language::JavaScript));
        assert_eq!(Language::parse("golang"), Some(Language::Go));
        assert_eq!(Language::parse("cobol"), None);
    }

    #[test]
    fn test_infer_known_extensions() {
        assert_eq!(
            Language::infer(Path::new("BadCode.java")),
            Inference::Known(Language::Java)
        );
        assert_eq!(
            Language::infer(Path::new("app/main.PY")),
            Inference::Known(Language::Python)
        );
        assert_eq!(
            Language::infer(Path::new("view.tsx")),
            Inference::Known(Language::Tsx)
        );
    }

    #[test]
    fn test_infer_ambiguous_extension() {
        assert_eq!(
            Language::infer(Path::new("include/util.h")),
            Inference::Ambiguous("h".to_string())
        );
    }

    #[test]
    fn test_infer_unknown_extension() {
        assert_eq!(
            Language::infer(Path::new("notes.txt")),
            Inference::Unknown(Some("txt".to_string()))
        );
        assert_eq!(Language::infer(Path::new("Makefile")), Inference::Unknown(None));
    }

    #[test]
    fn test_language_display() {
        assert_eq!(Language::JavaScript.to_string(), "javascript");
        assert_eq!(Language::Rust.as_str(), "rust");
    }
}
