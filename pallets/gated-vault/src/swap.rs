//! Swap Executor
//!
//! Controller-supplied batches are raw external calls: a target, a 4-byte
//! selector followed by a SCALE payload, and an attached value. Nothing in a
//! batch is executed as-is. Every call is first decoded by a [`SwapPolicy`] into
//! a typed [`SwapCommand`], and only commands reach the exchange router.
//!
//! The default policy, [`RouterAllowList`], accepts:
//! - router calls whose selector is allow-listed and whose embedded receiver is
//!   absent or the vault itself;
//! - token `APPROVE` calls whose spender is the router and which carry no value.
//!
//! Everything else, token transfers and recipient-bearing router variants
//! included, is rejected before the first call of the batch runs.

use crate::adapters::ExchangeRouter;
use alloc::vec::Vec;
use codec::DecodeAll;
use frame::deps::frame_support::traits::ConstU32;
use frame::prelude::*;
use primitives::{
  Selector,
  params::MAX_CALL_DATA_LEN,
  selectors::{self, APPROVE, SWAP_EXACT_IN, SWAP_EXACT_OUT, UNOSWAP},
};

/// Selector plus SCALE payload of a single external call.
pub type CallData = BoundedVec<u8, ConstU32<MAX_CALL_DATA_LEN>>;

#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub enum CallTarget<AccountId> {
  /// Plain account; only the exchange router is accepted
  Account(AccountId),
  /// Fungible asset contract addressed by id
  Token(u32),
}

#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub struct ExternalCall<AccountId, Balance> {
  pub target: CallTarget<AccountId>,
  pub data: CallData,
  pub value: Balance,
}

impl<AccountId, Balance> ExternalCall<AccountId, Balance> {
  /// Encode `selector ++ payload`. `None` if the result exceeds the call data bound.
  pub fn new<P: Encode>(
    target: CallTarget<AccountId>,
    selector: Selector,
    payload: &P,
    value: Balance,
  ) -> Option<Self> {
    let mut raw = selector.to_vec();
    payload.encode_to(&mut raw);
    let data = CallData::try_from(raw).ok()?;
    Some(Self {
      target,
      data,
      value,
    })
  }

  pub fn selector(&self) -> Option<Selector> {
    self.data.get(..4)?.try_into().ok()
  }

  fn payload(&self) -> &[u8] {
    self.data.get(4..).unwrap_or_default()
  }
}

/// Payload of `SWAP_EXACT_IN`.
#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq)]
pub struct SwapExactInPayload<AccountId, Balance> {
  pub asset_in: u32,
  pub asset_out: u32,
  pub amount_in: Balance,
  pub min_out: Balance,
  pub receiver: Option<AccountId>,
}

/// Payload of `SWAP_EXACT_OUT`.
#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq)]
pub struct SwapExactOutPayload<AccountId, Balance> {
  pub asset_in: u32,
  pub asset_out: u32,
  pub amount_out: Balance,
  pub max_in: Balance,
  pub receiver: Option<AccountId>,
}

/// Payload of `UNOSWAP`. The output always goes to the caller.
#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq)]
pub struct UnoswapPayload<Balance> {
  pub asset_in: u32,
  pub asset_out: u32,
  pub amount_in: Balance,
  pub min_out: Balance,
}

/// Payload of token `APPROVE`.
#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq)]
pub struct ApprovePayload<AccountId, Balance> {
  pub spender: AccountId,
  pub amount: Balance,
}

/// A validated call, ready for the router.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SwapCommand<Balance> {
  Approve {
    asset: u32,
    amount: Balance,
  },
  SwapExactIn {
    asset_in: u32,
    asset_out: u32,
    amount_in: Balance,
    min_out: Balance,
    value: Balance,
  },
  SwapExactOut {
    asset_in: u32,
    asset_out: u32,
    amount_out: Balance,
    max_in: Balance,
    value: Balance,
  },
}

/// Why a call was refused. Every variant names the offending selector.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SwapViolation {
  /// Call data shorter than a selector
  MissingSelector,
  CallTargetNotAllowed { selector: Selector },
  SelectorNotAllowed { selector: Selector },
  ThirdPartyReceiver { selector: Selector },
  ApprovalSpenderNotRouter { selector: Selector },
  MalformedCall { selector: Selector },
}

/// Decides which external calls a vault may make and what they mean.
pub trait SwapPolicy<AccountId, Balance> {
  fn validate(
    call: &ExternalCall<AccountId, Balance>,
    router: &AccountId,
    vault: &AccountId,
  ) -> Result<SwapCommand<Balance>, SwapViolation>;
}

/// Router selector allow-list with receiver and approval-spender checks.
pub struct RouterAllowList;

impl<AccountId, Balance> SwapPolicy<AccountId, Balance> for RouterAllowList
where
  AccountId: Decode + PartialEq,
  Balance: Decode + Zero + Copy,
{
  fn validate(
    call: &ExternalCall<AccountId, Balance>,
    router: &AccountId,
    vault: &AccountId,
  ) -> Result<SwapCommand<Balance>, SwapViolation> {
    let selector = call.selector().ok_or(SwapViolation::MissingSelector)?;
    let mut payload = call.payload();
    let malformed = |_| SwapViolation::MalformedCall { selector };

    match &call.target {
      CallTarget::Account(target) if target == router => {
        if !selectors::is_router_allowed(&selector) {
          return Err(SwapViolation::SelectorNotAllowed { selector });
        }
        let pays_vault =
          |receiver: &Option<AccountId>| receiver.as_ref().map_or(true, |r| r == vault);

        match selector {
          SWAP_EXACT_IN => {
            let p = SwapExactInPayload::<AccountId, Balance>::decode_all(&mut payload)
              .map_err(malformed)?;
            if !pays_vault(&p.receiver) {
              return Err(SwapViolation::ThirdPartyReceiver { selector });
            }
            Ok(SwapCommand::SwapExactIn {
              asset_in: p.asset_in,
              asset_out: p.asset_out,
              amount_in: p.amount_in,
              min_out: p.min_out,
              value: call.value,
            })
          }
          SWAP_EXACT_OUT => {
            let p = SwapExactOutPayload::<AccountId, Balance>::decode_all(&mut payload)
              .map_err(malformed)?;
            if !pays_vault(&p.receiver) {
              return Err(SwapViolation::ThirdPartyReceiver { selector });
            }
            Ok(SwapCommand::SwapExactOut {
              asset_in: p.asset_in,
              asset_out: p.asset_out,
              amount_out: p.amount_out,
              max_in: p.max_in,
              value: call.value,
            })
          }
          UNOSWAP => {
            let p = UnoswapPayload::<Balance>::decode_all(&mut payload).map_err(malformed)?;
            Ok(SwapCommand::SwapExactIn {
              asset_in: p.asset_in,
              asset_out: p.asset_out,
              amount_in: p.amount_in,
              min_out: p.min_out,
              value: call.value,
            })
          }
          _ => Err(SwapViolation::SelectorNotAllowed { selector }),
        }
      }
      CallTarget::Account(_) => Err(SwapViolation::CallTargetNotAllowed { selector }),
      CallTarget::Token(asset) => {
        if selector != APPROVE {
          return Err(SwapViolation::CallTargetNotAllowed { selector });
        }
        if !call.value.is_zero() {
          return Err(SwapViolation::MalformedCall { selector });
        }
        let p = ApprovePayload::<AccountId, Balance>::decode_all(&mut payload).map_err(malformed)?;
        if &p.spender != router {
          return Err(SwapViolation::ApprovalSpenderNotRouter { selector });
        }
        Ok(SwapCommand::Approve {
          asset: *asset,
          amount: p.amount,
        })
      }
    }
  }
}

/// First refused call of a batch and its position in it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RejectedCall {
  pub index: u8,
  pub violation: SwapViolation,
}

/// Validate a whole batch up front. The first violation aborts it.
pub fn validate_batch<P, AccountId, Balance>(
  calls: &[ExternalCall<AccountId, Balance>],
  router: &AccountId,
  vault: &AccountId,
) -> Result<Vec<SwapCommand<Balance>>, RejectedCall>
where
  P: SwapPolicy<AccountId, Balance>,
{
  calls
    .iter()
    .enumerate()
    .map(|(index, call)| {
      P::validate(call, router, vault).map_err(|violation| RejectedCall {
        index: u8::try_from(index).unwrap_or(u8::MAX),
        violation,
      })
    })
    .collect()
}

/// Forward one validated command to the router on behalf of `vault`.
pub fn dispatch<R, AccountId, Balance>(
  vault: &AccountId,
  command: SwapCommand<Balance>,
) -> DispatchResult
where
  R: ExchangeRouter<AccountId, u32, Balance>,
{
  match command {
    SwapCommand::Approve { asset, amount } => R::approve(vault, asset, amount),
    SwapCommand::SwapExactIn {
      asset_in,
      asset_out,
      amount_in,
      min_out,
      value,
    } => R::swap_exact_in(vault, asset_in, asset_out, amount_in, min_out, value).map(|_| ()),
    SwapCommand::SwapExactOut {
      asset_in,
      asset_out,
      amount_out,
      max_in,
      value,
    } => R::swap_exact_out(vault, asset_in, asset_out, amount_out, max_in, value).map(|_| ()),
  }
}
