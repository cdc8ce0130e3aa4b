//! Function selectors understood by the vault's swap executor.
//!
//! External calls carry a 4-byte selector followed by a SCALE-encoded payload.
//! Router selectors are split into the allow-listed entry points and the
//! recipient-bearing "to" variants, which are never allowed even though they
//! target the router.

use hex_literal::hex;

/// Leading four bytes of an external call identifying the entry point.
pub type Selector = [u8; 4];

/// Router: swap an exact input for at least `min_out`, receiver embedded in the payload.
pub const SWAP_EXACT_IN: Selector = hex!("38ed1739");

/// Router: swap at most `max_in` for an exact output, receiver embedded in the payload.
pub const SWAP_EXACT_OUT: Selector = hex!("8803dbee");

/// Router: single-pool swap that always pays the caller.
pub const UNOSWAP: Selector = hex!("0502b1c5");

/// Router: exact-input swap paying an explicit third-party recipient.
pub const SWAP_EXACT_IN_TO: Selector = hex!("472b43f3");

/// Token: grant the spender an allowance.
pub const APPROVE: Selector = hex!("095ea7b3");

/// Token: move balance to an arbitrary account.
pub const TRANSFER: Selector = hex!("a9059cbb");

/// Router entry points a vault batch may invoke.
pub const ROUTER_ALLOW_LIST: [Selector; 3] = [SWAP_EXACT_IN, SWAP_EXACT_OUT, UNOSWAP];

/// Whether `selector` is a router entry point a vault batch may invoke.
pub fn is_router_allowed(selector: &Selector) -> bool {
  ROUTER_ALLOW_LIST.contains(selector)
}
