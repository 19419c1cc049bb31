//! Engine configuration.

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Configuration of the tBTC operator engine.
///
/// None of these values are consensus-critical; operators may tune them
/// independently without halting the network, although diverging timeouts
/// delay recovery coordination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Deposit monitor timeouts.
    pub monitor: MonitorConfig,

    /// Bitcoin-side configuration.
    pub bitcoin: BitcoinConfig,

    /// Liquidation recovery configuration.
    pub liquidation: LiquidationConfig,
}

/// Action timeouts of the deposit monitors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// How long a deposit may await its signer public key before the
    /// engine retrieves it on the signer group's behalf. Budgeted for key
    /// generation plus submission.
    pub retrieve_pubkey_timeout: Duration,

    /// How long a redemption request may await its signature before the
    /// engine publishes it.
    pub provide_redemption_signature_timeout: Duration,

    /// How long a provided redemption signature may await its proof
    /// before the engine bumps the redemption fee.
    pub provide_redemption_proof_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            retrieve_pubkey_timeout: Duration::from_secs(48 * 60 * 60),
            provide_redemption_signature_timeout: Duration::from_secs(2 * 60 * 60),
            provide_redemption_proof_timeout: Duration::from_secs(6 * 60 * 60),
        }
    }
}

/// Bitcoin-side settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BitcoinConfig {
    /// Base URL of the Electrs HTTP API. An empty URL disables Bitcoin
    /// broadcast; liquidation recovery then runs without publishing.
    pub electrs_url: String,

    /// The Bitcoin network liquidation payouts are made on.
    pub network: bitcoin::Network,
}

impl Default for BitcoinConfig {
    fn default() -> Self {
        Self {
            electrs_url: String::new(),
            network: bitcoin::Network::Bitcoin,
        }
    }
}

/// Liquidation recovery settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiquidationConfig {
    /// This operator's extended public key
    /// (`xpub`/`ypub`/`zpub`/`tpub`/`upub`/`vpub`) used to derive
    /// liquidation payout addresses. Without one the operator contributes
    /// no payout output.
    pub extended_public_key: Option<String>,

    /// Directory of the derivation-index store.
    pub storage_dir: PathBuf,

    /// Window within which all members must announce readiness for a
    /// liquidation recovery attempt. Must exceed the 1-minute Electrs
    /// retry budget so members converge on the same fee estimate.
    pub recovery_protocol_ready_timeout: Duration,
}

impl Default for LiquidationConfig {
    fn default() -> Self {
        Self {
            extended_public_key: None,
            storage_dir: PathBuf::from("liquidation-recovery"),
            recovery_protocol_ready_timeout: Duration::from_secs(15 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips_through_toml() {
        let config = r#"
            [monitor]
            retrieve_pubkey_timeout = { secs = 172800, nanos = 0 }
            provide_redemption_signature_timeout = { secs = 7200, nanos = 0 }
            provide_redemption_proof_timeout = { secs = 21600, nanos = 0 }

            [bitcoin]
            electrs_url = "http://localhost:3002"
            network = "bitcoin"

            [liquidation]
            extended_public_key = "zpub6rePDVHfRP14VpYiejwepBhzu45UbvqvzE3ZMdDnNykG47mZYyGTjsuq6uzQYRakSrHyix1YTXKohag4GDZLcHcLvhSAs2MQNF8VDaZuQT9"
            storage_dir = "/var/lib/keep-tbtc/liquidation"
            recovery_protocol_ready_timeout = { secs = 900, nanos = 0 }
        "#;

        let parsed = toml::from_str::<Config>(config).expect("config must deserialize");
        let serialized = toml::to_string(&parsed).expect("config must serialize");
        let round_tripped = toml::from_str::<Config>(&serialized).unwrap();
        assert_eq!(round_tripped, parsed);

        assert_eq!(
            parsed.monitor.retrieve_pubkey_timeout,
            Duration::from_secs(48 * 60 * 60)
        );
        assert_eq!(parsed.bitcoin.network, bitcoin::Network::Bitcoin);
        assert!(parsed.liquidation.extended_public_key.is_some());
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let parsed = toml::from_str::<Config>("").unwrap();
        assert_eq!(parsed, Config::default());
        assert!(parsed.bitcoin.electrs_url.is_empty());
        assert_eq!(
            parsed.monitor.provide_redemption_proof_timeout,
            Duration::from_secs(6 * 60 * 60)
        );
    }
}
