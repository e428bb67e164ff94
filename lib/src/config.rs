//! Host-supplied configuration for a `ChainStore`.
//!
//! Grounded on the Python client's module-level `config`/`blockchains`
//! singletons in `original_source/lib/blockchain.py`, replaced here by an
//! explicit value a caller constructs and passes in, per the
//! no-global-mutable-state redesign note. `serde`-derived so a host
//! application can load it from disk alongside the checkpoint table.

use crate::checkpoints::CheckpointTable;
use crate::params::Network;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainStoreConfig {
    pub network: Network,
    pub datadir: PathBuf,
    pub checkpoints: CheckpointTable,
}

impl ChainStoreConfig {
    pub fn new(network: Network, datadir: PathBuf, checkpoints: CheckpointTable) -> Self {
        ChainStoreConfig {
            network,
            datadir,
            checkpoints,
        }
    }
}
