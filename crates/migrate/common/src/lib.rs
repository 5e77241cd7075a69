#![allow(clippy::must_use_candidate)]

pub mod args;

use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    str::FromStr,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidArtifactId {
    #[error("artifact name is empty")]
    Empty,
    #[error("artifact name `{0}` must not start with a digit")]
    LeadingDigit(String),
    #[error("artifact name `{name}` contains invalid character `{character}`")]
    InvalidCharacter { name: String, character: char },
}

/// Name of a compiled contract artifact, e.g. `User`.
///
/// Artifact names follow Solidity identifier rules so they can be matched
/// against the `contractName` the compiler writes into each artifact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactId(String);

impl ArtifactId {
    const SUPPORTED_EXTENSIONS: &'static [&'static str] = &[".sol", ".json"];

    /// Creates an identifier, rejecting anything that is not a valid contract name.
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidArtifactId> {
        let name = name.into();
        let mut chars = name.chars();
        match chars.next() {
            None => return Err(InvalidArtifactId::Empty),
            Some(first) if first.is_ascii_digit() => {
                return Err(InvalidArtifactId::LeadingDigit(name));
            }
            Some(_) => {}
        }

        if let Some(character) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '$'))
        {
            return Err(InvalidArtifactId::InvalidCharacter { name, character });
        }

        Ok(Self(name))
    }

    /// Accepts source-style references such as `./User.sol` as well as bare names.
    pub fn from_source_path(path: &str) -> Result<Self, InvalidArtifactId> {
        let file = path.trim().rsplit(['/', '\\']).next().unwrap_or_default();
        let stem = Self::SUPPORTED_EXTENSIONS
            .iter()
            .find_map(|ext| file.strip_suffix(ext))
            .unwrap_or(file);
        Self::new(stem)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ArtifactId {
    type Err = InvalidArtifactId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_source_path(s)
    }
}

impl TryFrom<String> for ArtifactId {
    type Error = InvalidArtifactId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ArtifactId> for String {
    fn from(value: ArtifactId) -> Self {
        value.0
    }
}

impl AsRef<str> for ArtifactId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
