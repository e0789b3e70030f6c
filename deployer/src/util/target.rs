use crate::constants::{
    GOERLI_EXPLORER_URL, GOERLI_RPC_URL, LOCAL_RPC_URL, MAINNET_EXPLORER_URL, MAINNET_RPC_URL,
    SEPOLIA_EXPLORER_URL, SEPOLIA_RPC_URL,
};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
/// Networks with a well-known RPC endpoint.
pub enum Target {
    #[default]
    Local,
    Goerli,
    Sepolia,
    Mainnet,
}

impl Target {
    pub fn target_url(&self) -> &'static str {
        match self {
            Target::Local => LOCAL_RPC_URL,
            Target::Goerli => GOERLI_RPC_URL,
            Target::Sepolia => SEPOLIA_RPC_URL,
            Target::Mainnet => MAINNET_RPC_URL,
        }
    }

    pub fn from_target_url(target_url: &str) -> Option<Self> {
        match target_url {
            LOCAL_RPC_URL => Some(Target::Local),
            GOERLI_RPC_URL => Some(Target::Goerli),
            SEPOLIA_RPC_URL => Some(Target::Sepolia),
            MAINNET_RPC_URL => Some(Target::Mainnet),
            _ => None,
        }
    }

    /// Where a transaction can be looked up by hand. A local devnet has no explorer.
    pub fn explorer_url(&self) -> Option<&'static str> {
        match self {
            Target::Local => None,
            Target::Goerli => Some(GOERLI_EXPLORER_URL),
            Target::Sepolia => Some(SEPOLIA_EXPLORER_URL),
            Target::Mainnet => Some(MAINNET_EXPLORER_URL),
        }
    }
}

impl FromStr for Target {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Target::Local),
            "goerli" => Ok(Target::Goerli),
            "sepolia" => Ok(Target::Sepolia),
            "mainnet" => Ok(Target::Mainnet),
            _ => bail!(
                "'{s}' is not a valid target name. Possible values: '{}', '{}', '{}', '{}'",
                Target::Local,
                Target::Goerli,
                Target::Sepolia,
                Target::Mainnet
            ),
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Target::Local => "local",
            Target::Goerli => "goerli",
            Target::Sepolia => "sepolia",
            Target::Mainnet => "mainnet",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for target in [
            Target::Local,
            Target::Goerli,
            Target::Sepolia,
            Target::Mainnet,
        ] {
            assert_eq!(target.to_string().parse::<Target>().unwrap(), target);
            assert_eq!(Target::from_target_url(target.target_url()), Some(target));
        }
        assert!("beta-5"
            .parse::<Target>()
            .unwrap_err()
            .to_string()
            .contains("Possible values"));
    }

    #[test]
    fn local_has_no_explorer() {
        assert_eq!(Target::Local.explorer_url(), None);
        assert_eq!(Target::default(), Target::Local);
        assert!(Target::Mainnet.explorer_url().is_some());
    }
}
