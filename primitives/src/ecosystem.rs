//! Ecosystem Constants for the Gated Vault
//!
//! This module centralizes system-level constants shared by the vault pallet and
//! any runtime wiring it: pallet IDs, balance type, and the numeric bounds that
//! the configuration-change executor and swap executor enforce.

/// Balance type alias for consistency across the workspace
pub type Balance = u128;

/// Pallet identifiers for deriving pallet-owned accounts.
///
/// Vault accounts are sub-accounts of the vault pallet ID keyed by the principal,
/// derived with `PalletId::into_sub_account_truncating(principal)`.
pub mod pallet_ids {
  /// Gated Vault pallet ID (per-principal custodial vaults)
  pub const GATED_VAULT_PALLET_ID: &[u8; 8] = b"gtdvault";
}

/// Parameters shared between the pallet and the runtime configuration.
pub mod params {
  /// Smallest value a 24-bit signed custodian setting accepts.
  pub const INT24_MIN: i128 = -(1 << 23);

  /// Largest value a 24-bit signed custodian setting accepts.
  pub const INT24_MAX: i128 = (1 << 23) - 1;

  /// Upper bound on the raw payload of a single external call (selector included).
  pub const MAX_CALL_DATA_LEN: u32 = 256;

  /// Maximum number of external calls in a single swap batch.
  pub const MAX_BATCH_CALLS: u32 = 8;

  /// First retry delay, in blocks, after an automated execution attempt fails (~30s).
  ///
  /// Doubles on each consecutive failure up to `MAX_BACKOFF_BLOCKS`.
  pub const BASE_BACKOFF_BLOCKS: u32 = 5;

  /// Ceiling for the automated execution backoff (~8 minutes at 6s/block).
  pub const MAX_BACKOFF_BLOCKS: u32 = 80;

  /// Blocks after which an unexecuted deposit is refunded by the controller hook (~1 day).
  pub const DEPOSIT_TIMEOUT_BLOCKS: u32 = 14_400;

  /// Upper bound on vaults tracked by the controller queue.
  pub const MAX_QUEUED_VAULTS: u32 = 256;

  /// Automated controller executions attempted per block in `on_idle`.
  pub const MAX_AUTO_EXECUTIONS_PER_BLOCK: u32 = 4;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pallet_ids_are_correct_length() {
    assert_eq!(pallet_ids::GATED_VAULT_PALLET_ID.len(), 8);
  }

  #[test]
  fn int24_bounds_match_two_complement_range() {
    assert_eq!(params::INT24_MIN, -8_388_608);
    assert_eq!(params::INT24_MAX, 8_388_607);
  }

  #[test]
  fn backoff_ceiling_exceeds_base() {
    assert!(params::MAX_BACKOFF_BLOCKS > params::BASE_BACKOFF_BLOCKS);
  }
}
