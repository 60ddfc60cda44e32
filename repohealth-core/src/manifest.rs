//! Package manifest (`package.json`) reading.

use std::collections::BTreeSet;
use std::path::Path;

use serde_json::{Map, Value};

use crate::domain::ScriptMap;
use crate::error::Result;
use crate::fs::FileSystem;

/// File name of the manifest inside a repository.
pub const MANIFEST_FILE: &str = "package.json";

/// The parts of a package manifest the analyzer cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    scripts: ScriptMap,
    dependencies: BTreeSet<String>,
}

impl Manifest {
    /// Parse manifest JSON. Only invalid JSON is an error; missing or
    /// mistyped sections are treated as empty.
    pub fn parse(contents: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(contents)?;

        let scripts = section(&value, "scripts")
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|(name, command)| {
                        command.as_str().map(|command| (name.clone(), command.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let dependencies = ["dependencies", "devDependencies"]
            .into_iter()
            .filter_map(|key| section(&value, key))
            .flat_map(|entries| entries.iter())
            .filter(|(_, version)| is_truthy(version))
            .map(|(name, _)| name.clone())
            .collect();

        Ok(Self {
            scripts,
            dependencies,
        })
    }

    /// Load the manifest from a repository directory, falling back to an
    /// empty manifest when it is missing or malformed.
    pub fn load<F: FileSystem>(fs: &F, dir: &Path) -> Self {
        let path = dir.join(MANIFEST_FILE);
        match fs.read_to_string(&path).and_then(|contents| Self::parse(&contents)) {
            Ok(manifest) => manifest,
            Err(err) => {
                log::debug!("no usable manifest at {}: {err}", path.display());
                Self::default()
            }
        }
    }

    /// Script entries with string commands.
    pub fn scripts(&self) -> &ScriptMap {
        &self.scripts
    }

    /// Whether a script is declared with a non-empty command.
    pub fn declares(&self, name: &str) -> bool {
        self.scripts
            .get(name)
            .is_some_and(|command| !command.is_empty())
    }

    /// Whether the package is listed in `dependencies` or `devDependencies`.
    pub fn depends_on(&self, package: &str) -> bool {
        self.dependencies.contains(package)
    }
}

fn section<'a>(value: &'a Value, key: &str) -> Option<&'a Map<String, Value>> {
    value.get(key).and_then(Value::as_object)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(text) => !text.is_empty(),
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}
