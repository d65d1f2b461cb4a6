use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Where learner progress and code snapshots are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// One file per storage key under `storage_dir`.
    #[default]
    File,
    /// Kept in memory only (lost on restart).
    Memory,
}

impl FromStr for StorageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(StorageMode::File),
            "memory" => Ok(StorageMode::Memory),
            other => Err(format!(
                "invalid storage mode: {other} (expected \"file\" or \"memory\")"
            )),
        }
    }
}

/// Editor language tag of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Html,
    Css,
    Javascript,
    Typescript,
    Php,
    Python,
    Markdown,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Language::Html => "html",
            Language::Css => "css",
            Language::Javascript => "javascript",
            Language::Typescript => "typescript",
            Language::Php => "php",
            Language::Python => "python",
            Language::Markdown => "markdown",
        };
        f.write_str(s)
    }
}

/// Course grouping shown in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseCategory {
    Frontend,
    Backend,
    Fullstack,
}
