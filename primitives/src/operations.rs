//! Operation and configuration discriminants shared by the vault pallet,
//! its controller, and off-chain indexers.

use codec::{Decode, DecodeWithMemTracking, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use serde::{Deserialize, Serialize};

/// The five independent pending-operation slots a vault can hold.
///
/// - `Deposit`: settlement currency escrowed, awaiting swap-and-deploy.
/// - `Withdrawal`: exit requested, awaiting custodian removal.
/// - `SwapSettlement`: withdrawn assets awaiting conversion and payout.
/// - `ConfigChange`: custodian setting awaiting a calm gate.
/// - `Deploy`: converted assets awaiting a calm gate to enter the custodian.
#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  MaxEncodedLen,
  Ord,
  PartialEq,
  PartialOrd,
  TypeInfo,
  Serialize,
  Deserialize,
)]
pub enum OperationKind {
  Deposit,
  Withdrawal,
  SwapSettlement,
  ConfigChange,
  Deploy,
}

impl OperationKind {
  pub const ALL: [OperationKind; 5] = [
    OperationKind::Deposit,
    OperationKind::Withdrawal,
    OperationKind::SwapSettlement,
    OperationKind::ConfigChange,
    OperationKind::Deploy,
  ];
}

/// Custodian setting addressed by a configuration change.
///
/// `None` exists so that an unset discriminant is representable on the wire;
/// the vault rejects it at registration.
#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Default,
  Encode,
  Eq,
  MaxEncodedLen,
  Ord,
  PartialEq,
  PartialOrd,
  TypeInfo,
  Serialize,
  Deserialize,
)]
pub enum ConfigKind {
  #[default]
  None,
  /// Position range width (signed 24-bit)
  Width,
  /// Allowed price deviation (signed 24-bit)
  Deviation,
  /// Rebalance interval (unsigned 32-bit)
  Interval,
}
