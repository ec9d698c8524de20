//! Lit network identifiers and their RPC endpoints

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Chronicle Yellowstone, the rollup that hosts the Datil contracts.
pub const CHRONICLE_YELLOWSTONE_RPC: &str = "https://yellowstone-rpc.litprotocol.com";

/// Lit networks a client can connect to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LitNetwork {
    #[default]
    DatilDev,
    DatilTest,
    Datil,
}

impl LitNetwork {
    pub fn name(&self) -> &'static str {
        match self {
            LitNetwork::DatilDev => "datil-dev",
            LitNetwork::DatilTest => "datil-test",
            LitNetwork::Datil => "datil",
        }
    }

    /// Default RPC endpoint for the chain the network's contracts live on
    pub fn rpc_url(&self) -> &'static str {
        match self {
            LitNetwork::DatilDev | LitNetwork::DatilTest | LitNetwork::Datil => {
                CHRONICLE_YELLOWSTONE_RPC
            }
        }
    }

    /// Whether minting and signing on this network cost capacity credits
    pub fn is_paid(&self) -> bool {
        !matches!(self, LitNetwork::DatilDev)
    }
}

impl fmt::Display for LitNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LitNetwork {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "datil-dev" | "datildev" => Ok(LitNetwork::DatilDev),
            "datil-test" | "datiltest" => Ok(LitNetwork::DatilTest),
            "datil" => Ok(LitNetwork::Datil),
            other => Err(Error::Config(format!("Unknown Lit network: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_network_names() {
        assert_eq!("datil-dev".parse::<LitNetwork>().unwrap(), LitNetwork::DatilDev);
        assert_eq!("DatilTest".parse::<LitNetwork>().unwrap(), LitNetwork::DatilTest);
        assert_eq!(" datil ".parse::<LitNetwork>().unwrap(), LitNetwork::Datil);
        assert!("habanero".parse::<LitNetwork>().is_err());
    }

    #[test]
    fn serde_uses_kebab_names() {
        let json = serde_json::to_string(&LitNetwork::DatilTest).unwrap();
        assert_eq!(json, "\"datil-test\"");
        assert_eq!(LitNetwork::default(), LitNetwork::DatilDev);
        assert!(!LitNetwork::DatilDev.is_paid());
    }
}
