//! Compiled contract artifacts and the registry that resolves them by name.
//!
//! Artifacts are produced by an external compiler toolchain. Both layouts in
//! common use are understood: Truffle writes `build/contracts/<Name>.json` with
//! the bytecode as a hex string, Foundry writes `out/<File>.sol/<Name>.json`
//! with the bytecode under `bytecode.object`.

use alloy_json_abi::{
    JsonAbi,
    Param,
};
use alloy_primitives::{
    Bytes,
    hex,
};
use migrate_common::ArtifactId;
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fs,
    path::{
        Path,
        PathBuf,
    },
    sync::Arc,
};
use tracing::{
    debug,
    trace,
    warn,
};

use crate::error::{
    ArtifactError,
    DeployError,
};

/// Directories inside a Foundry `out/` tree that never hold contract artifacts.
const SKIPPED_DIRS: &[&str] = &["build-info"];

/// A compiled contract: interface description plus creation bytecode.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub id: ArtifactId,
    pub abi: JsonAbi,
    pub bytecode: Bytes,
}

impl Artifact {
    /// Parses a compiled artifact from its JSON text.
    ///
    /// `fallback_name` is used when the artifact carries no `contractName`
    /// (Foundry artifacts), typically the file stem.
    pub fn from_json(
        json: &str,
        fallback_name: &str,
        location: &str,
    ) -> Result<Self, ArtifactError> {
        let raw: RawArtifact =
            serde_json::from_str(json).map_err(|source| ArtifactError::Parse {
                location: location.to_string(),
                source,
            })?;

        let name = raw.contract_name.as_deref().unwrap_or(fallback_name);
        let id = ArtifactId::new(name).map_err(|source| ArtifactError::InvalidName {
            location: location.to_string(),
            source,
        })?;

        let bytecode = raw.bytecode.decode().map_err(|reason| {
            ArtifactError::InvalidBytecode {
                location: location.to_string(),
                reason,
            }
        })?;

        Ok(Self {
            id,
            abi: raw.abi,
            bytecode,
        })
    }

    /// Constructor inputs, empty when the contract declares no constructor.
    pub fn constructor_inputs(&self) -> &[Param] {
        self.abi
            .constructor()
            .map(|constructor| constructor.inputs.as_slice())
            .unwrap_or_default()
    }

    /// Canonical constructor signature, e.g. `constructor(address,uint256)`.
    pub fn constructor_signature(&self) -> String {
        let joined = self
            .constructor_inputs()
            .iter()
            .map(|input| input.selector_type().into_owned())
            .collect::<Vec<_>>()
            .join(",");
        format!("constructor({joined})")
    }

    pub fn is_deployable(&self) -> bool {
        !self.bytecode.is_empty()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    contract_name: Option<String>,
    abi: JsonAbi,
    bytecode: RawBytecode,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Hex(String),
    Object { object: String },
}

impl RawBytecode {
    fn decode(&self) -> Result<Bytes, String> {
        let encoded = match self {
            Self::Hex(encoded) | Self::Object { object: encoded } => encoded.trim(),
        };

        // Library placeholders look like `__$<hash>$__` and must be linked first.
        if encoded.contains("__") {
            return Err("bytecode contains unlinked library placeholders".to_string());
        }

        hex::decode(encoded)
            .map(Bytes::from)
            .map_err(|e| e.to_string())
    }
}

/// Explicit mapping from artifact name to compiled artifact.
///
/// Every directive is resolved against the registry before the first
/// transaction is sent, so a missing artifact never leaves a run half done.
#[derive(Debug, Clone, Default)]
pub struct ArtifactRegistry {
    artifacts: BTreeMap<ArtifactId, Arc<Artifact>>,
    sources: BTreeMap<ArtifactId, String>,
    /// Names defined by more than one file in a loaded tree, with every location.
    ambiguous: BTreeMap<ArtifactId, Vec<String>>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from artifacts embedded at compile time, e.g.
    /// `&[("User", include_str!("../build/contracts/User.json"))]`.
    pub fn from_embedded(artifacts: &[(&str, &str)]) -> Result<Self, ArtifactError> {
        let mut registry = Self::new();
        for (name, json) in artifacts {
            let location = format!("<embedded {name}>");
            let artifact = Artifact::from_json(json, name, &location)?;
            registry.insert(artifact, location)?;
        }
        Ok(registry)
    }

    /// Loads every compiled artifact below `dir`.
    ///
    /// JSON files without both an `abi` and a `bytecode` entry (build info,
    /// metadata) are skipped. Artifacts that cannot be used (malformed JSON,
    /// names that are not identifiers such as `Lib.0.8.20.json`, unlinked
    /// bytecode) are skipped with a warning. A name defined in several files is
    /// kept as ambiguous and only fails when a directive asks for it.
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let dir = dir.as_ref();
        let mut registry = Self::new();
        let mut files = Vec::new();
        collect_json_files(dir, &mut files)?;
        files.sort();

        for path in files {
            let location = path.display().to_string();
            let contents = fs::read_to_string(&path).map_err(|source| {
                ArtifactError::Io {
                    path: path.clone(),
                    source,
                }
            })?;

            let value: serde_json::Value = match serde_json::from_str(&contents) {
                Ok(value) => value,
                Err(err) => {
                    warn!(path = %location, %err, "skipping malformed JSON file");
                    continue;
                }
            };
            if value.get("abi").is_none() || value.get("bytecode").is_none() {
                trace!(path = %location, "skipping non-artifact JSON file");
                continue;
            }

            let stem = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or_default();
            match Artifact::from_json(&contents, stem, &location) {
                Ok(artifact) => registry.insert_or_mark_ambiguous(artifact, location),
                Err(err) => warn!(%err, "skipping unusable artifact"),
            }
        }

        if !registry.ambiguous.is_empty() {
            warn!(
                names = ?registry.ambiguous.keys().map(ArtifactId::as_str).collect::<Vec<_>>(),
                "artifact names defined more than once; directives using them will fail"
            );
        }
        debug!(
            dir = %dir.display(),
            count = registry.len(),
            "loaded compiled artifacts"
        );
        Ok(registry)
    }

    /// Adds an artifact, refusing a second definition under the same name.
    pub fn insert(&mut self, artifact: Artifact, source: String) -> Result<(), ArtifactError> {
        if let Some(first) = self.sources.get(&artifact.id) {
            return Err(ArtifactError::Duplicate {
                id: artifact.id,
                first: first.clone(),
                second: source,
            });
        }
        self.sources.insert(artifact.id.clone(), source);
        self.artifacts
            .insert(artifact.id.clone(), Arc::new(artifact));
        Ok(())
    }

    fn insert_or_mark_ambiguous(&mut self, artifact: Artifact, source: String) {
        if let Some(locations) = self.ambiguous.get_mut(&artifact.id) {
            locations.push(source);
            return;
        }
        if let Some(first) = self.sources.remove(&artifact.id) {
            self.artifacts.remove(&artifact.id);
            self.ambiguous.insert(artifact.id, vec![first, source]);
            return;
        }
        self.sources.insert(artifact.id.clone(), source);
        self.artifacts
            .insert(artifact.id.clone(), Arc::new(artifact));
    }

    pub fn get(&self, id: &ArtifactId) -> Result<&Arc<Artifact>, DeployError> {
        if let Some(locations) = self.ambiguous.get(id) {
            return Err(DeployError::AmbiguousArtifact {
                artifact: id.clone(),
                locations: locations.join(", "),
            });
        }
        self.artifacts
            .get(id)
            .ok_or_else(|| DeployError::ArtifactNotFound(id.clone()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &ArtifactId> {
        self.artifacts.keys()
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

fn collect_json_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), ArtifactError> {
    let io_err = |source: std::io::Error| {
        ArtifactError::Io {
            path: dir.to_path_buf(),
            source,
        }
    };

    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_dir() {
            let skipped = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| SKIPPED_DIRS.contains(&name));
            if !skipped {
                collect_json_files(&path, files)?;
            }
        } else if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    Ok(())
}
