use crate::registry::PendingOps;
use frame::prelude::*;

/// Per-principal vault record stored in `Vaults`.
#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct VaultInfo<AccountId, Balance, BlockNumber> {
  /// Sub-account of the pallet holding idle settlement currency and the A/B buffer
  pub account: AccountId,
  pub pending: PendingOps<AccountId, Balance, BlockNumber>,
  /// Settlement amount backing the custodian position; withdrawals exit pro rata to it
  pub deployed_basis: Balance,
  pub created_at: BlockNumber,
}

/// The three places a vault's value can sit.
///
/// Idle settlement and the buffer are the vault account's own balances; the
/// custodian figures are whatever the custodian reports for the vault.
#[derive(
  Clone,
  Copy,
  Debug,
  Default,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub struct BalanceBuckets<Balance> {
  pub idle_settlement: Balance,
  pub buffer_a: Balance,
  pub buffer_b: Balance,
  pub custodian_a: Balance,
  pub custodian_b: Balance,
}

/// Read-only view returned by `Pallet::snapshot`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VaultSnapshot<AccountId, Balance, BlockNumber> {
  pub info: VaultInfo<AccountId, Balance, BlockNumber>,
  pub buckets: BalanceBuckets<Balance>,
}

/// Backoff bookkeeping for automated controller execution.
#[derive(
  Clone,
  Copy,
  Debug,
  Default,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub struct RetryInfo<BlockNumber> {
  pub attempts: u32,
  pub next_attempt: BlockNumber,
}

/// Work the `on_idle` hook performs on the controller's behalf.
///
/// Variant order is execution priority.
#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  Ord,
  PartialEq,
  PartialOrd,
  TypeInfo,
  MaxEncodedLen,
)]
pub enum ControllerAction {
  ExecuteWithdrawal,
  RefundDeposit,
  ExecuteConfigChange,
  ExecuteDeploy,
}
