//! Pending Operation Registry
//!
//! One `PendingOps` record per vault holds up to five independent pending
//! operations. Each kind owns an optional slot; a slot being `Some` is what
//! "active" means, so there is no separate flag set to keep in sync.

use frame::prelude::*;
use primitives::{ConfigKind, OperationKind};

/// Settlement currency escrowed in the vault, awaiting swap-and-deploy.
#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub struct PendingDeposit<Balance, BlockNumber> {
  pub amount: Balance,
  pub registered_at: BlockNumber,
}

/// Exit request. No funds move until the controller executes it.
#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct PendingWithdrawal<AccountId, Balance> {
  pub amount: Balance,
  pub recipient: AccountId,
}

/// Withdrawn assets awaiting conversion into settlement currency.
#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct PendingSwap<AccountId, Balance> {
  pub asset_a: Balance,
  pub asset_b: Balance,
  pub recipient: AccountId,
}

/// Converted assets held in the vault until the gate opens.
///
/// `basis` is the settlement amount the assets were bought with.
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
pub struct PendingDeploy<Balance> {
  pub asset_a: Balance,
  pub asset_b: Balance,
  pub basis: Balance,
}

/// Custodian setting change awaiting a calm gate.
#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub struct PendingConfig {
  pub kind: ConfigKind,
  pub value: i128,
}

#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct PendingOps<AccountId, Balance, BlockNumber> {
  pub deposit: Option<PendingDeposit<Balance, BlockNumber>>,
  pub withdrawal: Option<PendingWithdrawal<AccountId, Balance>>,
  pub swap_settlement: Option<PendingSwap<AccountId, Balance>>,
  pub config_change: Option<PendingConfig>,
  pub deploy: Option<PendingDeploy<Balance>>,
}

impl<AccountId, Balance, BlockNumber> Default for PendingOps<AccountId, Balance, BlockNumber> {
  fn default() -> Self {
    Self {
      deposit: None,
      withdrawal: None,
      swap_settlement: None,
      config_change: None,
      deploy: None,
    }
  }
}

/// Registry rule violations, mapped onto the pallet's `Error` by the caller.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RegistryError {
  AlreadyPending,
  NotPending,
  DepositInProgress,
  WithdrawalInProgress,
  DeployInProgress,
  SettlementInProgress,
}

impl<AccountId, Balance, BlockNumber> PendingOps<AccountId, Balance, BlockNumber> {
  pub fn is_active(&self, kind: OperationKind) -> bool {
    match kind {
      OperationKind::Deposit => self.deposit.is_some(),
      OperationKind::Withdrawal => self.withdrawal.is_some(),
      OperationKind::SwapSettlement => self.swap_settlement.is_some(),
      OperationKind::ConfigChange => self.config_change.is_some(),
      OperationKind::Deploy => self.deploy.is_some(),
    }
  }

  pub fn is_idle(&self) -> bool {
    OperationKind::ALL.iter().all(|kind| !self.is_active(*kind))
  }

  /// Single-slot and mutual-exclusion check for a new registration of `kind`.
  ///
  /// - Deposits wait for any exit in flight, since settlement pays out every
  ///   unit of settlement currency the vault holds.
  /// - Withdrawals wait for deposits, deploys and unsettled swaps so assets are
  ///   never moved by two flows at once.
  pub fn ensure_can_register(&self, kind: OperationKind) -> Result<(), RegistryError> {
    if self.is_active(kind) {
      return Err(RegistryError::AlreadyPending);
    }
    match kind {
      OperationKind::Deposit => {
        if self.withdrawal.is_some() || self.swap_settlement.is_some() {
          return Err(RegistryError::WithdrawalInProgress);
        }
      }
      OperationKind::Withdrawal => {
        if self.deposit.is_some() {
          return Err(RegistryError::DepositInProgress);
        }
        if self.deploy.is_some() {
          return Err(RegistryError::DeployInProgress);
        }
        if self.swap_settlement.is_some() {
          return Err(RegistryError::SettlementInProgress);
        }
      }
      OperationKind::SwapSettlement | OperationKind::ConfigChange | OperationKind::Deploy => {}
    }
    Ok(())
  }

  /// Direct conversion spends the whole buffer and idle settlement balance, so
  /// no slot that has a claim on either may be active.
  pub fn ensure_buffer_unclaimed(&self) -> Result<(), RegistryError> {
    if self.deposit.is_some() {
      return Err(RegistryError::DepositInProgress);
    }
    if self.withdrawal.is_some() {
      return Err(RegistryError::WithdrawalInProgress);
    }
    if self.swap_settlement.is_some() {
      return Err(RegistryError::SettlementInProgress);
    }
    if self.deploy.is_some() {
      return Err(RegistryError::DeployInProgress);
    }
    Ok(())
  }

  /// Work the controller hook can perform without an off-chain swap batch.
  pub fn has_automatable_work(&self) -> bool {
    self.withdrawal.is_some()
      || self.deposit.is_some()
      || self.config_change.is_some()
      || self.deploy.is_some()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  type Ops = PendingOps<u64, u128, u64>;

  fn with_deposit() -> Ops {
    Ops {
      deposit: Some(PendingDeposit {
        amount: 10,
        registered_at: 1,
      }),
      ..Default::default()
    }
  }

  #[test]
  fn empty_registry_is_idle() {
    let ops = Ops::default();
    assert!(ops.is_idle());
    assert!(!ops.has_automatable_work());
  }

  #[test]
  fn active_kind_cannot_register_twice() {
    let ops = with_deposit();
    assert_eq!(
      ops.ensure_can_register(OperationKind::Deposit),
      Err(RegistryError::AlreadyPending)
    );
    assert!(ops.is_active(OperationKind::Deposit));
  }

  #[test]
  fn withdrawal_blocked_by_deposit_deploy_and_settlement() {
    assert_eq!(
      with_deposit().ensure_can_register(OperationKind::Withdrawal),
      Err(RegistryError::DepositInProgress)
    );

    let deploying = Ops {
      deploy: Some(PendingDeploy {
        asset_a: 1,
        asset_b: 1,
        basis: 2,
      }),
      ..Default::default()
    };
    assert_eq!(
      deploying.ensure_can_register(OperationKind::Withdrawal),
      Err(RegistryError::DeployInProgress)
    );

    let settling = Ops {
      swap_settlement: Some(PendingSwap {
        asset_a: 1,
        asset_b: 0,
        recipient: 7,
      }),
      ..Default::default()
    };
    assert_eq!(
      settling.ensure_can_register(OperationKind::Withdrawal),
      Err(RegistryError::SettlementInProgress)
    );
    assert_eq!(
      settling.ensure_can_register(OperationKind::Deposit),
      Err(RegistryError::WithdrawalInProgress)
    );
  }

  #[test]
  fn config_change_is_independent_of_fund_flows() {
    let ops = with_deposit();
    assert_eq!(ops.ensure_can_register(OperationKind::ConfigChange), Ok(()));
  }

  #[test]
  fn buffer_claims_block_direct_conversion() {
    assert_eq!(Ops::default().ensure_buffer_unclaimed(), Ok(()));
    assert_eq!(
      with_deposit().ensure_buffer_unclaimed(),
      Err(RegistryError::DepositInProgress)
    );
  }
}
