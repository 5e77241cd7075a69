use alloy_primitives::{
    Address,
    TxHash,
};
use migrate_common::{
    ArtifactId,
    InvalidArtifactId,
};
use serde::{
    Deserialize,
    Deserializer,
    Serialize,
};
use std::{
    fmt,
    str::FromStr,
};

/// Prefix marking a constructor argument as the address of an earlier deployment.
pub const DEPLOYED_REF_PREFIX: char = '@';

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectiveParseError {
    #[error(transparent)]
    InvalidArtifact(#[from] InvalidArtifactId),
    #[error("directive `{0}` has unbalanced parentheses")]
    Unbalanced(String),
    #[error("directive `{0}` has trailing characters after the argument list")]
    TrailingInput(String),
}

/// A single constructor argument as written in a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ConstructorArg {
    /// Textual value coerced against the constructor's ABI type.
    Literal(String),
    /// Address of an artifact deployed earlier in the same run (`@Name`).
    Deployed(ArtifactId),
}

impl FromStr for ConstructorArg {
    type Err = InvalidArtifactId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.strip_prefix(DEPLOYED_REF_PREFIX) {
            Some(name) => Ok(Self::Deployed(ArtifactId::new(name)?)),
            None => Ok(Self::Literal(trimmed.to_string())),
        }
    }
}

impl TryFrom<String> for ConstructorArg {
    type Error = InvalidArtifactId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ConstructorArg> for String {
    fn from(value: ConstructorArg) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ConstructorArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.write_str(value),
            Self::Deployed(id) => write!(f, "{DEPLOYED_REF_PREFIX}{id}"),
        }
    }
}

/// Instruction to deploy one artifact with the given constructor arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentDirective {
    #[serde(deserialize_with = "deserialize_artifact")]
    pub artifact: ArtifactId,
    #[serde(rename = "args", default, skip_serializing_if = "Vec::is_empty")]
    pub constructor_args: Vec<ConstructorArg>,
}

/// Plan entries name artifacts the same way `--directive` does, so
/// `"./User.sol"` and `"User"` both mean `User`.
fn deserialize_artifact<'de, D>(deserializer: D) -> Result<ArtifactId, D::Error>
where
    D: Deserializer<'de>,
{
    let reference = String::deserialize(deserializer)?;
    ArtifactId::from_source_path(&reference).map_err(serde::de::Error::custom)
}

impl DeploymentDirective {
    pub fn new(artifact: ArtifactId, constructor_args: Vec<ConstructorArg>) -> Self {
        Self {
            artifact,
            constructor_args,
        }
    }

    /// Directive without constructor arguments.
    pub fn bare(artifact: ArtifactId) -> Self {
        Self::new(artifact, vec![])
    }

    /// Artifacts this directive needs deployed before it.
    pub fn dependencies(&self) -> impl Iterator<Item = &ArtifactId> {
        self.constructor_args.iter().filter_map(|arg| {
            match arg {
                ConstructorArg::Deployed(id) => Some(id),
                ConstructorArg::Literal(_) => None,
            }
        })
    }
}

/// Parses `Name` or `Name(arg1,arg2)`.
///
/// Commas nested inside brackets or quotes do not split arguments, so array
/// and string literals can be passed as written: `Fleet([1,2],"a,b")`.
impl FromStr for DeploymentDirective {
    type Err = DirectiveParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let Some(open) = s.find('(') else {
            return Ok(Self::bare(s.parse()?));
        };

        let artifact: ArtifactId = s[..open].parse()?;
        let rest = &s[open + 1..];
        let close = rest
            .rfind(')')
            .ok_or_else(|| DirectiveParseError::Unbalanced(s.to_string()))?;
        if !rest[close + 1..].trim().is_empty() {
            return Err(DirectiveParseError::TrailingInput(s.to_string()));
        }

        let constructor_args = split_args(&rest[..close])
            .ok_or_else(|| DirectiveParseError::Unbalanced(s.to_string()))?
            .into_iter()
            .map(str::parse)
            .collect::<Result<Vec<ConstructorArg>, _>>()?;

        Ok(Self::new(artifact, constructor_args))
    }
}

impl fmt::Display for DeploymentDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.artifact)?;
        if !self.constructor_args.is_empty() {
            let args = self
                .constructor_args
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            write!(f, "({args})")?;
        }
        Ok(())
    }
}

/// Splits a top-level comma separated list. Returns `None` on unbalanced brackets.
fn split_args(input: &str) -> Option<Vec<&str>> {
    if input.trim().is_empty() {
        return Some(vec![]);
    }

    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in input.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(' | '[') => depth += 1,
            (None, ')' | ']') => depth = depth.checked_sub(1)?,
            (None, ',') if depth == 0 => {
                args.push(input[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }

    if depth != 0 || quote.is_some() {
        return None;
    }
    args.push(input[start..].trim());
    Some(args)
}

/// Record of a confirmed deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedContract {
    pub artifact: ArtifactId,
    pub address: Address,
    pub transaction_hash: TxHash,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
}

impl fmt::Display for DeployedContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Contract: {}", self.artifact)?;
        writeln!(f, "Address: {}", self.address)?;
        write!(f, "Transaction: {}", self.transaction_hash)?;
        if let Some(block) = self.block_number {
            write!(f, "\nBlock: {block}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> ArtifactId {
        ArtifactId::new(name).unwrap()
    }

    #[test]
    fn parses_bare_names() {
        let directive: DeploymentDirective = "User".parse().unwrap();
        assert_eq!(directive, DeploymentDirective::bare(id("User")));

        let directive: DeploymentDirective = "Car()".parse().unwrap();
        assert_eq!(directive, DeploymentDirective::bare(id("Car")));
    }

    #[test]
    fn parses_arguments_and_references() {
        let directive: DeploymentDirective = "Garage(@User, 10)".parse().unwrap();
        assert_eq!(directive.artifact, id("Garage"));
        assert_eq!(
            directive.constructor_args,
            vec![
                ConstructorArg::Deployed(id("User")),
                ConstructorArg::Literal("10".to_string()),
            ]
        );
        assert_eq!(directive.dependencies().collect::<Vec<_>>(), vec![&id("User")]);
    }

    #[test]
    fn nested_commas_stay_in_one_argument() {
        let directive: DeploymentDirective = r#"Fleet([1,2,3],"a,b",(1,true))"#.parse().unwrap();
        assert_eq!(
            directive.constructor_args,
            vec![
                ConstructorArg::Literal("[1,2,3]".to_string()),
                ConstructorArg::Literal("\"a,b\"".to_string()),
                ConstructorArg::Literal("(1,true)".to_string()),
            ]
        );
    }

    #[test]
    fn rejects_malformed_directives() {
        assert!(matches!(
            "Garage(1,2".parse::<DeploymentDirective>(),
            Err(DirectiveParseError::Unbalanced(_))
        ));
        assert!(matches!(
            "Garage([1,2)".parse::<DeploymentDirective>(),
            Err(DirectiveParseError::Unbalanced(_))
        ));
        assert!(matches!(
            "Garage(1) extra".parse::<DeploymentDirective>(),
            Err(DirectiveParseError::TrailingInput(_))
        ));
        assert!(matches!(
            "Garage(@1User)".parse::<DeploymentDirective>(),
            Err(DirectiveParseError::InvalidArtifact(_))
        ));
    }

    #[test]
    fn display_matches_directive_syntax() {
        let directive: DeploymentDirective = "Garage( @User , 10 )".parse().unwrap();
        assert_eq!(directive.to_string(), "Garage(@User,10)");
        assert_eq!(
            DeploymentDirective::bare(id("User")).to_string(),
            "User"
        );
    }

    #[test]
    fn deserializes_from_plan_entries() {
        let directive: DeploymentDirective =
            serde_json::from_value(serde_json::json!({ "artifact": "Garage", "args": ["@User", "5"] }))
                .unwrap();
        assert_eq!(directive.to_string(), "Garage(@User,5)");

        let bare: DeploymentDirective =
            serde_json::from_value(serde_json::json!({ "artifact": "User" })).unwrap();
        assert!(bare.constructor_args.is_empty());
    }

    #[test]
    fn plan_entries_accept_source_references() {
        let from_plan: DeploymentDirective =
            toml::from_str(r#"artifact = "./contracts/User.sol""#).unwrap();
        let from_flag: DeploymentDirective = "./contracts/User.sol".parse().unwrap();
        assert_eq!(from_plan, from_flag);
        assert_eq!(from_plan.artifact, id("User"));

        let err = toml::from_str::<DeploymentDirective>(r#"artifact = "./1User.sol""#).unwrap_err();
        assert!(err.to_string().contains("1User"), "{err}");
    }
}
