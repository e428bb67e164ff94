//! Per-network consensus constants.
//!
//! The original Electrum-ZClassic client kept these on a mutable global
//! `constants.net` that callers swapped with `set_mainnet()`/`set_testnet()`.
//! Per the redesign notes this crate threads a `Network` value explicitly
//! through every constructor instead of relying on a process-wide singleton.

/// Which ZClassic network a `ChainStore`/`ChunkVerifier` instance is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    pub fn is_testnet(&self) -> bool {
        !matches!(self, Network::Mainnet)
    }

    /// WIF private-key version byte.
    pub fn wif_prefix(&self) -> u8 {
        match self {
            Network::Mainnet => 0x80,
            Network::Testnet | Network::Regtest => 0xEF,
        }
    }

    /// Base58Check P2PKH address version byte(s).
    pub fn addr_p2pkh(&self) -> [u8; 2] {
        match self {
            Network::Mainnet => [0x1C, 0xB8],
            Network::Testnet | Network::Regtest => [0x1D, 0x25],
        }
    }

    /// Base58Check P2SH address version byte(s).
    pub fn addr_p2sh(&self) -> [u8; 2] {
        match self {
            Network::Mainnet => [0x1C, 0xBD],
            Network::Testnet | Network::Regtest => [0x1C, 0xBA],
        }
    }

    /// Display-order genesis block hash.
    pub fn genesis_hash(&self) -> &'static str {
        match self {
            Network::Mainnet => "00040fe8ec8471911baa1db1266ea15dd06b4a8a5c453883c000b031973dce08",
            Network::Testnet => "05a60a92d99d85997cce3b87616c089f6124d7342af37106edc76126334a2c38",
            Network::Regtest => "029f11d80ef9765602235e1bc9727e3eb6ba20839319f761fee920d63401e327",
        }
    }
}

/// Height at which the Equihash parameters (and thus on-disk header size)
/// change. Below this height headers are 1487 bytes; at and above, 543.
pub const BUBBLES_ACTIVATION_HEIGHT: i64 = 585_318;

/// Height at which the hard-coded difficulty-adjustment ramp table
/// overrides the computed retarget, for `POW_AVERAGING_WINDOW` blocks.
pub const DIFFADJ_ACTIVATION_HEIGHT: i64 = 585_322;

pub const HDR_LEN: usize = 1487;
pub const HDR_POST_FORK_LEN: usize = 543;
pub const CHUNK_LEN: i64 = 100;

pub const MAX_TARGET_HEX: &str =
    "0007ffffffffffffffffffffffffffffffffffffffffffffffffffffffffff";

pub const POW_AVERAGING_WINDOW: i64 = 17;
pub const POW_MEDIAN_BLOCK_SPAN: i64 = 11;
pub const POW_MAX_ADJUST_DOWN: i64 = 32;
pub const POW_MAX_ADJUST_UP: i64 = 16;
pub const POW_DAMPING_FACTOR: i64 = 4;
pub const POW_TARGET_SPACING: i64 = 150;

pub const TARGET_CALC_BLOCKS: i64 = POW_AVERAGING_WINDOW + POW_MEDIAN_BLOCK_SPAN;
pub const AVERAGING_WINDOW_TIMESPAN: i64 = POW_AVERAGING_WINDOW * POW_TARGET_SPACING;
pub const MIN_ACTUAL_TIMESPAN: i64 = AVERAGING_WINDOW_TIMESPAN * (100 - POW_MAX_ADJUST_UP) / 100;
pub const MAX_ACTUAL_TIMESPAN: i64 = AVERAGING_WINDOW_TIMESPAN * (100 + POW_MAX_ADJUST_DOWN) / 100;

/// Consensus branch ids (ZIP-243 personalization salt, little-endian).
pub const OVERWINTER_BRANCH_ID: u32 = 0x5BA8_1B19;
pub const SAPLING_BRANCH_ID: u32 = 0x76B8_09BB;
pub const BUBBLES_BRANCH_ID: u32 = 0x930B_540D;

/// Transaction version-group ids.
pub const OVERWINTER_VERSION_GROUP_ID: u32 = 0x03C4_8270;
pub const SAPLING_VERSION_GROUP_ID: u32 = 0x892F_2085;

/// The 17 hard-coded `bits` values covering
/// `[DIFFADJ_ACTIVATION_HEIGHT, DIFFADJ_ACTIVATION_HEIGHT + POW_AVERAGING_WINDOW)`.
pub const DIFFADJ_RAMP: [u32; 17] = [
    0x1f07ffff, 0x1e0ffffe, 0x1e0ffffe, 0x1f07ffff, 0x1f014087, 0x1f01596b, 0x1f01743d,
    0x1f019124, 0x1f01b049, 0x1f01d1da, 0x1f01f606, 0x1f021d01, 0x1f024703, 0x1f027448,
    0x1f02a510, 0x1f02d9a3, 0x1f03124a,
];

/// Total on-disk size of the header at `height`: 1487 bytes pre-fork,
/// 543 bytes at and after `BUBBLES_ACTIVATION_HEIGHT`.
pub fn header_size(height: i64) -> usize {
    if height >= BUBBLES_ACTIVATION_HEIGHT {
        HDR_POST_FORK_LEN
    } else {
        HDR_LEN
    }
}
