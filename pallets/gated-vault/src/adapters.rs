//! Adapter traits for the Gated Vault pallet
//!
//! The custodian, the gate oracle and the exchange router are external
//! collaborators reached only through the traits below.

use frame::prelude::*;

/// External yield position holding a vault's deployed assets.
///
/// `before_action` must be called before any `balances` read that feeds an
/// accounting decision, so accrued yield is settled first.
pub trait Custodian<AccountId, Balance> {
  fn before_action(vault: &AccountId) -> DispatchResult;

  /// Amounts of asset A and asset B currently held for `vault`.
  fn balances(vault: &AccountId) -> (Balance, Balance);

  /// Pull `amount_a`/`amount_b` from the vault account into the position.
  fn deposit(vault: &AccountId, amount_a: Balance, amount_b: Balance) -> DispatchResult;

  /// Return up to the requested amounts to the vault account.
  ///
  /// May fail, and the reported amounts are not trusted by the pallet; the
  /// vault measures its own balance change instead.
  fn withdraw(
    vault: &AccountId,
    amount_a: Balance,
    amount_b: Balance,
  ) -> Result<(Balance, Balance), DispatchError>;

  fn set_width(vault: &AccountId, width: i32) -> DispatchResult;

  fn set_deviation(vault: &AccountId, deviation: i32) -> DispatchResult;

  fn set_interval(vault: &AccountId, interval: u32) -> DispatchResult;
}

/// "May I act now" signal. Read on every attempt, never cached.
pub trait GateOracle<AccountId> {
  fn is_calm(vault: &AccountId) -> bool;
}

/// Gate that never opens. Every gated path fails with `NotCalm`.
impl<AccountId> GateOracle<AccountId> for () {
  fn is_calm(_: &AccountId) -> bool {
    false
  }
}

/// The single approved exchange router.
///
/// Calls reach this trait only after the swap policy has validated them, so
/// every swap pays the calling vault.
pub trait ExchangeRouter<AccountId, AssetId, Balance> {
  /// Account of the router; the only permitted call target and approval spender.
  fn account() -> AccountId;

  fn approve(owner: &AccountId, asset: AssetId, amount: Balance) -> DispatchResult;

  fn swap_exact_in(
    who: &AccountId,
    asset_in: AssetId,
    asset_out: AssetId,
    amount_in: Balance,
    min_out: Balance,
    value: Balance,
  ) -> Result<Balance, DispatchError>;

  fn swap_exact_out(
    who: &AccountId,
    asset_in: AssetId,
    asset_out: AssetId,
    amount_out: Balance,
    max_in: Balance,
    value: Balance,
  ) -> Result<Balance, DispatchError>;
}
