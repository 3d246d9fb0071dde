//! indexvest-state
//!
//! Persistent ledger state and the engines that mutate it.
//!
//! `StateDb` owns the term map, the wallet-change map and the meta tree.
//! `FixedVestingEngine` runs per-beneficiary fixed grants that are staked
//! on issuance; `SupplyVestingEngine` runs percent-of-supply shares that
//! are exercised by paying into the treasury. Both share the wallet
//! migration handshake in `migration`.

pub mod assets;
pub mod db;
pub mod fixed;
pub mod memory;
pub mod migration;
pub mod supply;

pub use assets::{FixedAssets, FungibleAsset, IndexSource, MintTransform, SupplyAssets, YieldTransform};
pub use db::{StagedMutations, StateDb};
pub use fixed::FixedVestingEngine;
pub use memory::{AssetBook, MemoryAssets, MemoryStaking, MemoryToken, MemoryTreasury, RebasingToken};
pub use supply::SupplyVestingEngine;
