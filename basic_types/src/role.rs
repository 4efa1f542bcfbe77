use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Role a node process assumes within the cluster. Exactly one role is
/// selected per process via configuration.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeRole {
    Index,
    Query,
    Cache,
    Manager,
    Recovery,
    Preprocessor,
}

impl FromStr for NodeRole {
    type Err = String;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        Ok(match string.to_ascii_uppercase().as_str() {
            "INDEX" => Self::Index,
            "QUERY" => Self::Query,
            "CACHE" => Self::Cache,
            "MANAGER" => Self::Manager,
            "RECOVERY" => Self::Recovery,
            "PREPROCESSOR" => Self::Preprocessor,
            other => return Err(other.to_owned()),
        })
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index => write!(f, "INDEX"),
            Self::Query => write!(f, "QUERY"),
            Self::Cache => write!(f, "CACHE"),
            Self::Manager => write!(f, "MANAGER"),
            Self::Recovery => write!(f, "RECOVERY"),
            Self::Preprocessor => write!(f, "PREPROCESSOR"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::NodeRole;

    #[test]
    fn parses_role_names_case_insensitively() {
        assert_eq!("RECOVERY".parse::<NodeRole>(), Ok(NodeRole::Recovery));
        assert_eq!("manager".parse::<NodeRole>(), Ok(NodeRole::Manager));
        assert!("SEARCH".parse::<NodeRole>().is_err());
    }

    #[test]
    fn role_display_round_trips() {
        for role in [
            NodeRole::Index,
            NodeRole::Query,
            NodeRole::Cache,
            NodeRole::Manager,
            NodeRole::Recovery,
            NodeRole::Preprocessor,
        ] {
            assert_eq!(role.to_string().parse::<NodeRole>(), Ok(role));
        }
    }
}
