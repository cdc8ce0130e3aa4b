extern crate alloc;

use crate as pallet_gated_vault;
use crate::swap::{
  ApprovePayload, CallTarget, RouterAllowList, SwapExactInPayload, SwapExactOutPayload,
};
use crate::{BatchOf, ExternalCallOf};
use polkadot_sdk::frame_support::traits::fungibles::{Inspect, Mutate};
use polkadot_sdk::frame_support::traits::tokens::{Fortitude, Precision, Preservation};
use polkadot_sdk::frame_support::{
  Blake2_128Concat, PalletId, construct_runtime, derive_impl,
  pallet_prelude::{OptionQuery, ValueQuery},
  parameter_types, storage_alias,
  traits::{ConstU32, ConstU64, ConstU128},
};
use polkadot_sdk::frame_system;
use polkadot_sdk::sp_runtime::{
  BuildStorage, DispatchError, DispatchResult,
  testing::H256,
  traits::{BlakeTwo256, IdentityLookup},
};
use primitives::{
  ecosystem::{pallet_ids::GATED_VAULT_PALLET_ID, params},
  selectors::{APPROVE, SWAP_EXACT_IN, SWAP_EXACT_OUT},
};

pub const ALICE: u64 = 1;
pub const BOB: u64 = 2;
pub const CONTROLLER: u64 = 10;
pub const ATTACKER: u64 = 66;
pub const ROUTER: u64 = 100;
pub const CUSTODIAN: u64 = 200;

pub const SETTLEMENT: u32 = 1;
pub const ASSET_A: u32 = 2;
pub const ASSET_B: u32 = 3;

pub const INITIAL_SETTLEMENT: u128 = 10_000;
pub const DEPOSIT_TIMEOUT: u64 = 100;

pub const CUSTODIAN_OK: u8 = 0;
pub const CUSTODIAN_WITHDRAW_FAILS: u8 = 1;
pub const CUSTODIAN_PARTIAL_THEN_FAILS: u8 = 2;
pub const CUSTODIAN_MISREPORTS: u8 = 3;
pub const CUSTODIAN_RELEASES_ALL: u8 = 4;

type Block = frame_system::mocking::MockBlock<Test>;

construct_runtime!(
  pub struct Test {
    System: frame_system,
    Balances: polkadot_sdk::pallet_balances,
    Assets: polkadot_sdk::pallet_assets,
    GatedVault: pallet_gated_vault,
  }
);

#[derive_impl(frame_system::config_preludes::TestDefaultConfig)]
impl frame_system::Config for Test {
  type Block = Block;
  type AccountId = u64;
  type Lookup = IdentityLookup<Self::AccountId>;
  type Hash = H256;
  type Hashing = BlakeTwo256;
  type AccountData = polkadot_sdk::pallet_balances::AccountData<u128>;
}

impl polkadot_sdk::pallet_balances::Config for Test {
  type MaxLocks = ();
  type MaxReserves = ();
  type ReserveIdentifier = [u8; 8];
  type Balance = u128;
  type DustRemoval = ();
  type RuntimeEvent = RuntimeEvent;
  type ExistentialDeposit = ConstU128<1>;
  type AccountStore = System;
  type WeightInfo = ();
  type FreezeIdentifier = ();
  type MaxFreezes = ();
  type RuntimeHoldReason = ();
  type RuntimeFreezeReason = ();
  type DoneSlashHandler = ();
}

impl polkadot_sdk::pallet_assets::Config for Test {
  type RuntimeEvent = RuntimeEvent;
  type Balance = u128;
  type AssetId = u32;
  type AssetIdParameter = u32;
  type Currency = Balances;
  type CreateOrigin = polkadot_sdk::frame_support::traits::AsEnsureOriginWithArg<
    frame_system::EnsureSigned<Self::AccountId>,
  >;
  type ForceOrigin = frame_system::EnsureRoot<Self::AccountId>;
  type AssetDeposit = ConstU128<1>;
  type AssetAccountDeposit = ConstU128<1>;
  type MetadataDepositBase = ConstU128<1>;
  type MetadataDepositPerByte = ConstU128<1>;
  type ApprovalDeposit = ConstU128<1>;
  type StringLimit = ConstU32<50>;
  type Freezer = ();
  type Extra = ();
  type CallbackHandle = ();
  type WeightInfo = ();
  type RemoveItemsLimit = ConstU32<5>;
  type Holder = ();
  type ReserveData = ();
  #[cfg(feature = "runtime-benchmarks")]
  type BenchmarkHelper = ();
}

// Mock collaborators keep their state in storage so that a rolled-back
// extrinsic or storage layer also rolls back their side effects.
parameter_types! {
  pub const GatedVaultPalletId: PalletId = PalletId(*GATED_VAULT_PALLET_ID);
  pub storage GateCalm: bool = true;
  pub storage CustodianMode: u8 = CUSTODIAN_OK;
  pub storage BeforeActionFails: bool = false;
  /// Router output as a percentage of input
  pub storage SwapRatePercent: u128 = 100;
}

/// Deployed (asset A, asset B) per vault
#[storage_alias]
pub type Positions = StorageMap<MockCustodian, Blake2_128Concat, u64, (u128, u128), ValueQuery>;

/// Yield realized into the position on the next `before_action`
#[storage_alias]
pub type PendingYield = StorageMap<MockCustodian, Blake2_128Concat, u64, (u128, u128), ValueQuery>;

#[storage_alias]
pub type Widths = StorageMap<MockCustodian, Blake2_128Concat, u64, i32, OptionQuery>;

#[storage_alias]
pub type Deviations = StorageMap<MockCustodian, Blake2_128Concat, u64, i32, OptionQuery>;

#[storage_alias]
pub type Intervals = StorageMap<MockCustodian, Blake2_128Concat, u64, u32, OptionQuery>;

/// Router allowance per (owner, asset)
#[storage_alias]
pub type Allowances =
  StorageMap<MockRouter, Blake2_128Concat, (u64, u32), u128, ValueQuery>;

/// Zero-amount transfers into empty accounts are refused by `pallet_assets`
fn move_asset(asset: u32, from: &u64, to: &u64, amount: u128) -> DispatchResult {
  if amount > 0 {
    <Assets as Mutate<u64>>::transfer(asset, from, to, amount, Preservation::Expendable)?;
  }
  Ok(())
}

pub struct MockGate;
impl crate::GateOracle<u64> for MockGate {
  fn is_calm(_vault: &u64) -> bool {
    GateCalm::get()
  }
}

/// Custodian holding deployed assets on the `CUSTODIAN` account
pub struct MockCustodian;

impl MockCustodian {
  fn release(vault: &u64, amount_a: u128, amount_b: u128) -> DispatchResult {
    move_asset(ASSET_A, &CUSTODIAN, vault, amount_a)?;
    move_asset(ASSET_B, &CUSTODIAN, vault, amount_b)?;
    Positions::mutate(vault, |(a, b)| {
      *a -= amount_a;
      *b -= amount_b;
    });
    Ok(())
  }
}

impl crate::Custodian<u64, u128> for MockCustodian {
  fn before_action(vault: &u64) -> DispatchResult {
    if BeforeActionFails::get() {
      return Err(DispatchError::Other("custodian unavailable"));
    }
    let (yield_a, yield_b) = PendingYield::take(vault);
    if yield_a > 0 {
      <Assets as Mutate<u64>>::mint_into(ASSET_A, &CUSTODIAN, yield_a)?;
    }
    if yield_b > 0 {
      <Assets as Mutate<u64>>::mint_into(ASSET_B, &CUSTODIAN, yield_b)?;
    }
    Positions::mutate(vault, |(a, b)| {
      *a += yield_a;
      *b += yield_b;
    });
    Ok(())
  }

  fn balances(vault: &u64) -> (u128, u128) {
    Positions::get(vault)
  }

  fn deposit(vault: &u64, amount_a: u128, amount_b: u128) -> DispatchResult {
    move_asset(ASSET_A, vault, &CUSTODIAN, amount_a)?;
    move_asset(ASSET_B, vault, &CUSTODIAN, amount_b)?;
    Positions::mutate(vault, |(a, b)| {
      *a += amount_a;
      *b += amount_b;
    });
    Ok(())
  }

  fn withdraw(vault: &u64, amount_a: u128, amount_b: u128) -> Result<(u128, u128), DispatchError> {
    let (held_a, held_b) = Positions::get(vault);
    let (amount_a, amount_b) = (amount_a.min(held_a), amount_b.min(held_b));
    match CustodianMode::get() {
      CUSTODIAN_WITHDRAW_FAILS => Err(DispatchError::Other("custodian paused")),
      CUSTODIAN_PARTIAL_THEN_FAILS => {
        Self::release(vault, amount_a / 2, amount_b / 2)?;
        Err(DispatchError::Other("custodian ran out of gas"))
      }
      CUSTODIAN_RELEASES_ALL => {
        Self::release(vault, held_a, held_b)?;
        Ok((held_a, held_b))
      }
      CUSTODIAN_MISREPORTS => {
        Self::release(vault, amount_a, amount_b)?;
        Ok((amount_a.saturating_mul(10), amount_b.saturating_mul(10)))
      }
      _ => {
        Self::release(vault, amount_a, amount_b)?;
        Ok((amount_a, amount_b))
      }
    }
  }

  fn set_width(vault: &u64, width: i32) -> DispatchResult {
    Widths::insert(vault, width);
    Ok(())
  }

  fn set_deviation(vault: &u64, deviation: i32) -> DispatchResult {
    Deviations::insert(vault, deviation);
    Ok(())
  }

  fn set_interval(vault: &u64, interval: u32) -> DispatchResult {
    Intervals::insert(vault, interval);
    Ok(())
  }
}

/// Fixed-rate router: burns the input, mints `SwapRatePercent` of it as output
pub struct MockRouter;

impl MockRouter {
  fn spend_allowance(owner: &u64, asset: u32, amount: u128) -> DispatchResult {
    Allowances::try_mutate((*owner, asset), |allowance| {
      *allowance = allowance
        .checked_sub(amount)
        .ok_or(DispatchError::Other("allowance exceeded"))?;
      Ok(())
    })
  }

  fn settle(
    who: &u64,
    asset_in: u32,
    asset_out: u32,
    amount_in: u128,
    amount_out: u128,
  ) -> DispatchResult {
    Self::spend_allowance(who, asset_in, amount_in)?;
    <Assets as Mutate<u64>>::burn_from(
      asset_in,
      who,
      amount_in,
      Preservation::Expendable,
      Precision::Exact,
      Fortitude::Polite,
    )?;
    if amount_out > 0 {
      <Assets as Mutate<u64>>::mint_into(asset_out, who, amount_out)?;
    }
    Ok(())
  }
}

impl crate::ExchangeRouter<u64, u32, u128> for MockRouter {
  fn account() -> u64 {
    ROUTER
  }

  fn approve(owner: &u64, asset: u32, amount: u128) -> DispatchResult {
    Allowances::insert((*owner, asset), amount);
    Ok(())
  }

  fn swap_exact_in(
    who: &u64,
    asset_in: u32,
    asset_out: u32,
    amount_in: u128,
    min_out: u128,
    _value: u128,
  ) -> Result<u128, DispatchError> {
    let amount_out = amount_in.saturating_mul(SwapRatePercent::get()) / 100;
    if amount_out < min_out {
      return Err(DispatchError::Other("slippage"));
    }
    Self::settle(who, asset_in, asset_out, amount_in, amount_out)?;
    Ok(amount_out)
  }

  fn swap_exact_out(
    who: &u64,
    asset_in: u32,
    asset_out: u32,
    amount_out: u128,
    max_in: u128,
    _value: u128,
  ) -> Result<u128, DispatchError> {
    let rate = SwapRatePercent::get().max(1);
    let amount_in = amount_out.saturating_mul(100).div_ceil(rate);
    if amount_in > max_in {
      return Err(DispatchError::Other("slippage"));
    }
    Self::settle(who, asset_in, asset_out, amount_in, amount_out)?;
    Ok(amount_in)
  }
}

impl pallet_gated_vault::Config for Test {
  type Assets = Assets;
  type Custodian = MockCustodian;
  type Gate = MockGate;
  type Exchange = MockRouter;
  type SwapPolicy = RouterAllowList;
  type PalletId = GatedVaultPalletId;
  type SettlementAsset = ConstU32<SETTLEMENT>;
  type AssetA = ConstU32<ASSET_A>;
  type AssetB = ConstU32<ASSET_B>;
  type MaxBatchCalls = ConstU32<{ params::MAX_BATCH_CALLS }>;
  type MaxQueuedVaults = ConstU32<{ params::MAX_QUEUED_VAULTS }>;
  type MaxAutoExecutionsPerBlock = ConstU32<{ params::MAX_AUTO_EXECUTIONS_PER_BLOCK }>;
  type BaseBackoff = ConstU64<{ params::BASE_BACKOFF_BLOCKS as u64 }>;
  type MaxBackoff = ConstU64<{ params::MAX_BACKOFF_BLOCKS as u64 }>;
  type DepositTimeout = ConstU64<DEPOSIT_TIMEOUT>;
  type AdminOrigin = frame_system::EnsureRoot<Self::AccountId>;
  type WeightInfo = ();
}

pub fn vault_of(principal: u64) -> u64 {
  GatedVault::vault_account(&principal)
}

pub fn balance(asset: u32, who: u64) -> u128 {
  <Assets as Inspect<u64>>::balance(asset, &who)
}

pub fn mint(asset: u32, who: u64, amount: u128) {
  <Assets as Mutate<u64>>::mint_into(asset, &who, amount).unwrap();
}

pub fn approve_call(asset: u32, spender: u64, amount: u128) -> ExternalCallOf<Test> {
  ExternalCallOf::<Test>::new(
    CallTarget::Token(asset),
    APPROVE,
    &ApprovePayload { spender, amount },
    0,
  )
  .unwrap()
}

pub fn swap_in_call(
  asset_in: u32,
  asset_out: u32,
  amount_in: u128,
  min_out: u128,
  receiver: Option<u64>,
) -> ExternalCallOf<Test> {
  ExternalCallOf::<Test>::new(
    CallTarget::Account(ROUTER),
    SWAP_EXACT_IN,
    &SwapExactInPayload {
      asset_in,
      asset_out,
      amount_in,
      min_out,
      receiver,
    },
    0,
  )
  .unwrap()
}

pub fn swap_out_call(
  asset_in: u32,
  asset_out: u32,
  amount_out: u128,
  max_in: u128,
  receiver: Option<u64>,
) -> ExternalCallOf<Test> {
  ExternalCallOf::<Test>::new(
    CallTarget::Account(ROUTER),
    SWAP_EXACT_OUT,
    &SwapExactOutPayload {
      asset_in,
      asset_out,
      amount_out,
      max_in,
      receiver,
    },
    0,
  )
  .unwrap()
}

pub fn batch(calls: alloc::vec::Vec<ExternalCallOf<Test>>) -> BatchOf<Test> {
  BatchOf::<Test>::try_from(calls).unwrap()
}

/// Approve and sell `amount` of settlement currency, half into A and half into B
pub fn buy_pair_batch(amount: u128) -> BatchOf<Test> {
  let half = amount / 2;
  batch(alloc::vec![
    approve_call(SETTLEMENT, ROUTER, amount),
    swap_in_call(SETTLEMENT, ASSET_A, half, 0, None),
    swap_in_call(SETTLEMENT, ASSET_B, amount - half, 0, None),
  ])
}

/// Approve and sell `amount_a` of A and `amount_b` of B for settlement currency
pub fn sell_pair_batch(amount_a: u128, amount_b: u128) -> BatchOf<Test> {
  batch(alloc::vec![
    approve_call(ASSET_A, ROUTER, amount_a),
    approve_call(ASSET_B, ROUTER, amount_b),
    swap_in_call(ASSET_A, SETTLEMENT, amount_a, 0, None),
    swap_in_call(ASSET_B, SETTLEMENT, amount_b, 0, None),
  ])
}

pub fn new_test_ext() -> polkadot_sdk::sp_io::TestExternalities {
  let mut t = frame_system::GenesisConfig::<Test>::default()
    .build_storage()
    .unwrap();

  polkadot_sdk::pallet_assets::GenesisConfig::<Test> {
    assets: alloc::vec![
      (SETTLEMENT, CUSTODIAN, true, 1),
      (ASSET_A, CUSTODIAN, true, 1),
      (ASSET_B, CUSTODIAN, true, 1),
    ],
    metadata: alloc::vec![],
    accounts: alloc::vec![
      (SETTLEMENT, ALICE, INITIAL_SETTLEMENT),
      (SETTLEMENT, BOB, INITIAL_SETTLEMENT),
    ],
    reserves: alloc::vec![],
    next_asset_id: None,
  }
  .assimilate_storage(&mut t)
  .unwrap();

  pallet_gated_vault::GenesisConfig::<Test> {
    controller: Some(CONTROLLER),
  }
  .assimilate_storage(&mut t)
  .unwrap();

  let mut ext: polkadot_sdk::sp_io::TestExternalities = t.into();
  ext.execute_with(|| System::set_block_number(1));
  ext
}
