//! Config Change Executor
//!
//! Pending config changes are stored as a `(ConfigKind, i128)` pair. They are
//! narrowed to the custodian setter's native width once at registration and
//! again at execution, so an out-of-range value can never reach the custodian.

use crate::adapters::Custodian;
use frame::prelude::*;
use primitives::{
  ConfigKind,
  params::{INT24_MAX, INT24_MIN},
};

/// A custodian setting in its native width.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigSetting {
  Width(i32),
  Deviation(i32),
  Interval(u32),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigChangeError {
  InvalidKind,
  ValueOutOfRange,
}

fn int24(value: i128) -> Result<i32, ConfigChangeError> {
  if !(INT24_MIN..=INT24_MAX).contains(&value) {
    return Err(ConfigChangeError::ValueOutOfRange);
  }
  i32::try_from(value).map_err(|_| ConfigChangeError::ValueOutOfRange)
}

impl ConfigSetting {
  pub fn try_from_raw(kind: ConfigKind, value: i128) -> Result<Self, ConfigChangeError> {
    match kind {
      ConfigKind::None => Err(ConfigChangeError::InvalidKind),
      ConfigKind::Width => int24(value).map(Self::Width),
      ConfigKind::Deviation => int24(value).map(Self::Deviation),
      ConfigKind::Interval => u32::try_from(value)
        .map(Self::Interval)
        .map_err(|_| ConfigChangeError::ValueOutOfRange),
    }
  }

  pub fn kind(&self) -> ConfigKind {
    match self {
      Self::Width(_) => ConfigKind::Width,
      Self::Deviation(_) => ConfigKind::Deviation,
      Self::Interval(_) => ConfigKind::Interval,
    }
  }

  /// Invoke the matching custodian setter for `vault`.
  pub fn apply<C, AccountId, Balance>(self, vault: &AccountId) -> DispatchResult
  where
    C: Custodian<AccountId, Balance>,
  {
    match self {
      Self::Width(width) => C::set_width(vault, width),
      Self::Deviation(deviation) => C::set_deviation(vault, deviation),
      Self::Interval(interval) => C::set_interval(vault, interval),
    }
  }
}
