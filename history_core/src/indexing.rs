use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::events::{Address, ChainId};

/// Named category of on-chain activity independently tracked by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IndexerUnit {
    Dca,
    Earn,
    AggSwaps,
    ChainlinkRegistry,
    Erc20Approvals,
    Erc20Transfers,
    NativeTransfers,
}

impl IndexerUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexerUnit::Dca => "dca",
            IndexerUnit::Earn => "earn",
            IndexerUnit::AggSwaps => "aggSwaps",
            IndexerUnit::ChainlinkRegistry => "chainlinkRegistry",
            IndexerUnit::Erc20Approvals => "erc20Approvals",
            IndexerUnit::Erc20Transfers => "erc20Transfers",
            IndexerUnit::NativeTransfers => "nativeTransfers",
        }
    }

    /// Parse a wire unit name. Unknown units (e.g. added server-side after
    /// this client shipped) return `None` and are skipped as "no update".
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "dca" => Some(IndexerUnit::Dca),
            "earn" => Some(IndexerUnit::Earn),
            "aggSwaps" => Some(IndexerUnit::AggSwaps),
            "chainlinkRegistry" => Some(IndexerUnit::ChainlinkRegistry),
            "erc20Approvals" => Some(IndexerUnit::Erc20Approvals),
            "erc20Transfers" => Some(IndexerUnit::Erc20Transfers),
            "nativeTransfers" => Some(IndexerUnit::NativeTransfers),
            _ => None,
        }
    }
}

/// Server-reported watermarks for one `(wallet, unit, chain)` triple.
///
/// `processed_up_to <= detected_up_to <= target` is expected but not
/// guaranteed (server races); each component only ever moves forward once
/// stored. Numbers are decimal strings on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingData {
    #[serde(with = "u64_string")]
    pub processed_up_to: u64,
    #[serde(with = "u64_string")]
    pub detected_up_to: u64,
    #[serde(with = "u64_string")]
    pub target: u64,
}

impl IndexingData {
    /// Fold another observation in, keeping the component-wise maximum.
    fn advance(&mut self, incoming: &IndexingData) {
        self.processed_up_to = self.processed_up_to.max(incoming.processed_up_to);
        self.detected_up_to = self.detected_up_to.max(incoming.detected_up_to);
        self.target = self.target.max(incoming.target);
    }
}

mod u64_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Per-unit indexing payload as reported by the server for one wallet:
/// either per-chain watermarks or an error marker for a currently
/// unavailable unit. Anything else is tolerated and ignored.
///
/// Chain ids stay strings here because that is what JSON object keys are;
/// they are parsed (and malformed ones skipped) when folded into the
/// tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UnitIndexing {
    Degraded { error: String },
    PerChain(HashMap<String, IndexingData>),
    Unrecognized(serde_json::Value),
}

/// Monotonic record of how far the server indexer has processed each
/// `(wallet, unit, chain)` triple.
///
/// Progress never regresses and is never deleted for the lifetime of the
/// store. A degraded unit keeps its last-known-good watermarks; the error
/// message is surfaced out-of-band via [`IndexingTracker::unit_error`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexingTracker {
    progress: HashMap<Address, HashMap<IndexerUnit, HashMap<ChainId, IndexingData>>>,
    errors: HashMap<Address, HashMap<IndexerUnit, String>>,
}

impl IndexingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one wallet's indexing payload into the tracker.
    ///
    /// Missing or malformed units are "no update"; they never reset stored
    /// progress.
    pub fn apply(&mut self, wallet: &str, units: &HashMap<String, UnitIndexing>) {
        for (unit_name, payload) in units {
            let Some(unit) = IndexerUnit::from_wire(unit_name) else {
                debug!("Ignoring unknown indexer unit '{}' for wallet {}", unit_name, wallet);
                continue;
            };

            match payload {
                UnitIndexing::PerChain(chains) => {
                    let unit_progress = self
                        .progress
                        .entry(wallet.to_string())
                        .or_default()
                        .entry(unit)
                        .or_default();
                    for (chain_raw, incoming) in chains {
                        let Ok(chain_id) = chain_raw.parse::<ChainId>() else {
                            debug!(
                                "Ignoring malformed chain id '{}' for wallet {} unit {}",
                                chain_raw,
                                wallet,
                                unit.as_str()
                            );
                            continue;
                        };
                        unit_progress.entry(chain_id).or_default().advance(incoming);
                    }
                    // A good payload clears any previously recorded degradation
                    if let Some(wallet_errors) = self.errors.get_mut(wallet) {
                        wallet_errors.remove(&unit);
                    }
                }
                UnitIndexing::Degraded { error } => {
                    warn!(
                        "Indexer unit {} degraded for wallet {}: {}",
                        unit.as_str(),
                        wallet,
                        error
                    );
                    self.errors
                        .entry(wallet.to_string())
                        .or_default()
                        .insert(unit, error.clone());
                }
                UnitIndexing::Unrecognized(value) => {
                    debug!(
                        "Unrecognized indexing payload for wallet {} unit {}: {}",
                        wallet,
                        unit.as_str(),
                        value
                    );
                }
            }
        }
    }

    /// Watermarks for one triple, `None` if never observed.
    pub fn progress(
        &self,
        wallet: &str,
        unit: IndexerUnit,
        chain_id: ChainId,
    ) -> Option<&IndexingData> {
        self.progress.get(wallet)?.get(&unit)?.get(&chain_id)
    }

    /// Everything observed for one wallet, by unit and chain.
    pub fn wallet_progress(
        &self,
        wallet: &str,
    ) -> Option<&HashMap<IndexerUnit, HashMap<ChainId, IndexingData>>> {
        self.progress.get(wallet)
    }

    /// Last reported error for a unit, if it is currently degraded.
    pub fn unit_error(&self, wallet: &str, unit: IndexerUnit) -> Option<&str> {
        self.errors.get(wallet)?.get(&unit).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.progress.is_empty()
    }

    /// Wallets with at least one observed unit.
    pub fn wallets(&self) -> impl Iterator<Item = &Address> {
        self.progress.keys()
    }
}
