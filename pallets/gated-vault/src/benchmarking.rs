use crate::registry::{PendingDeploy, PendingSwap};
use crate::swap::{ApprovePayload, CallTarget, ExternalCall};
use crate::*;
use frame::deps::frame_benchmarking::{account, v2::*};
use frame::deps::frame_support::traits::{EnsureOrigin, Get, Hooks, fungibles::Mutate};
use frame::deps::frame_support::weights::Weight;
use frame::deps::frame_system::RawOrigin;
use primitives::{Balance, ConfigKind, OperationKind, selectors::APPROVE};

const SEED: u32 = 0;
const AMOUNT: Balance = 1_000_000;

fn principal_with_vault<T: Config>(name: &'static str) -> T::AccountId {
  let principal: T::AccountId = account(name, 0, SEED);
  Pallet::<T>::create_vault(RawOrigin::Signed(principal.clone()).into())
    .expect("vault creation must succeed for a fresh principal");
  principal
}

fn installed_controller<T: Config>() -> T::AccountId {
  let controller: T::AccountId = account("controller", 0, SEED);
  Controller::<T>::put(&controller);
  controller
}

fn fund<T: Config>(asset: u32, who: &T::AccountId, amount: Balance) {
  // We assume the asset exists in the benchmarking environment
  let _ = T::Assets::mint_into(asset, who, amount);
}

/// `n` router approvals, each validated and dispatched like a swap leg
fn approval_batch<T: Config>(n: u32) -> BatchOf<T> {
  let call: ExternalCallOf<T> = ExternalCall::new(
    CallTarget::Token(T::AssetA::get()),
    APPROVE,
    &ApprovePayload {
      spender: T::Exchange::account(),
      amount: AMOUNT,
    },
    0,
  )
  .expect("approval fits the call data bound");
  BatchOf::<T>::try_from(alloc::vec![call; n as usize]).expect("n is within MaxBatchCalls")
}

/// Deploy `AMOUNT` worth of A/B and register a withdrawal of all of it
fn deployed_with_withdrawal<T: Config>(principal: &T::AccountId) {
  let vault = Pallet::<T>::vault_account(principal);
  fund::<T>(T::AssetA::get(), &vault, AMOUNT / 2);
  fund::<T>(T::AssetB::get(), &vault, AMOUNT / 2);
  T::Custodian::deposit(&vault, AMOUNT / 2, AMOUNT / 2)
    .expect("custodian must accept the deployment");
  Vaults::<T>::mutate(principal, |info| {
    if let Some(info) = info {
      info.deployed_basis = AMOUNT;
    }
  });
  Pallet::<T>::register_withdrawal(RawOrigin::Signed(principal.clone()).into(), AMOUNT)
    .expect("withdrawal registration must succeed");
}

#[benchmarks]
mod benches {
  use super::*;

  #[benchmark]
  fn create_vault() {
    let principal: T::AccountId = account("principal", 0, SEED);

    #[extrinsic_call]
    create_vault(RawOrigin::Signed(principal.clone()));

    assert!(Vaults::<T>::contains_key(&principal));
  }

  #[benchmark]
  fn register_deposit() {
    let principal = principal_with_vault::<T>("principal");
    fund::<T>(T::SettlementAsset::get(), &principal, AMOUNT * 2);

    #[extrinsic_call]
    register_deposit(RawOrigin::Signed(principal.clone()), AMOUNT);

    let info = Vaults::<T>::get(&principal).expect("vault exists");
    assert!(info.pending.deposit.is_some());
  }

  #[benchmark]
  fn register_withdrawal() {
    let principal = principal_with_vault::<T>("principal");

    #[extrinsic_call]
    register_withdrawal(RawOrigin::Signed(principal.clone()), 1_000);

    let info = Vaults::<T>::get(&principal).expect("vault exists");
    assert!(info.pending.withdrawal.is_some());
  }

  #[benchmark]
  fn register_config_change() {
    let principal = principal_with_vault::<T>("principal");

    #[extrinsic_call]
    register_config_change(RawOrigin::Signed(principal.clone()), ConfigKind::Width, 60);

    let info = Vaults::<T>::get(&principal).expect("vault exists");
    assert!(info.pending.config_change.is_some());
  }

  #[benchmark]
  fn cancel() {
    let principal = principal_with_vault::<T>("principal");
    fund::<T>(T::SettlementAsset::get(), &principal, AMOUNT * 2);
    Pallet::<T>::register_deposit(RawOrigin::Signed(principal.clone()).into(), AMOUNT)
      .expect("deposit registration must succeed");

    #[extrinsic_call]
    cancel(RawOrigin::Signed(principal.clone()), OperationKind::Deposit);

    let info = Vaults::<T>::get(&principal).expect("vault exists");
    assert!(info.pending.is_idle());
  }

  #[benchmark]
  fn execute_swap_and_deploy(n: Linear<0, { T::MaxBatchCalls::get() }>) {
    let principal = principal_with_vault::<T>("principal");
    let controller = installed_controller::<T>();
    fund::<T>(T::SettlementAsset::get(), &principal, AMOUNT * 2);
    Pallet::<T>::register_deposit(RawOrigin::Signed(principal.clone()).into(), AMOUNT)
      .expect("deposit registration must succeed");
    let vault = Pallet::<T>::vault_account(&principal);
    fund::<T>(T::AssetA::get(), &vault, AMOUNT / 2);
    fund::<T>(T::AssetB::get(), &vault, AMOUNT / 2);
    let batch = approval_batch::<T>(n);

    #[extrinsic_call]
    execute_swap_and_deploy(RawOrigin::Signed(controller), principal.clone(), batch, None, None);

    let info = Vaults::<T>::get(&principal).expect("vault exists");
    assert!(info.pending.deposit.is_none());
  }

  #[benchmark]
  fn execute_deploy() {
    let principal = principal_with_vault::<T>("principal");
    let controller = installed_controller::<T>();
    let vault = Pallet::<T>::vault_account(&principal);
    fund::<T>(T::AssetA::get(), &vault, AMOUNT / 2);
    fund::<T>(T::AssetB::get(), &vault, AMOUNT / 2);
    Vaults::<T>::mutate(&principal, |info| {
      if let Some(info) = info {
        info.pending.deploy = Some(PendingDeploy {
          asset_a: AMOUNT / 2,
          asset_b: AMOUNT / 2,
          basis: AMOUNT,
        });
      }
    });

    // We assume the gate reports calm in the benchmarking environment
    #[extrinsic_call]
    execute_deploy(RawOrigin::Signed(controller), principal.clone());

    let info = Vaults::<T>::get(&principal).expect("vault exists");
    assert!(info.pending.deploy.is_none());
    assert_eq!(info.deployed_basis, AMOUNT);
  }

  #[benchmark]
  fn execute_withdrawal() {
    let principal = principal_with_vault::<T>("principal");
    let controller = installed_controller::<T>();
    deployed_with_withdrawal::<T>(&principal);

    #[extrinsic_call]
    execute_withdrawal(RawOrigin::Signed(controller), principal.clone());

    let info = Vaults::<T>::get(&principal).expect("vault exists");
    assert!(info.pending.withdrawal.is_none());
  }

  #[benchmark]
  fn execute_swap_settlement(n: Linear<0, { T::MaxBatchCalls::get() }>) {
    let principal = principal_with_vault::<T>("principal");
    let controller = installed_controller::<T>();
    let vault = Pallet::<T>::vault_account(&principal);
    fund::<T>(T::SettlementAsset::get(), &vault, AMOUNT);
    Vaults::<T>::mutate(&principal, |info| {
      if let Some(info) = info {
        info.pending.swap_settlement = Some(PendingSwap {
          asset_a: 0,
          asset_b: 0,
          recipient: principal.clone(),
        });
      }
    });
    let batch = approval_batch::<T>(n);

    #[extrinsic_call]
    execute_swap_settlement(RawOrigin::Signed(controller), principal.clone(), batch, AMOUNT);

    let info = Vaults::<T>::get(&principal).expect("vault exists");
    assert!(info.pending.swap_settlement.is_none());
    assert_eq!(Pallet::<T>::buckets(&vault).idle_settlement, 0);
  }

  #[benchmark]
  fn execute_config_change() {
    let principal = principal_with_vault::<T>("principal");
    let controller = installed_controller::<T>();
    Pallet::<T>::register_config_change(
      RawOrigin::Signed(principal.clone()).into(),
      ConfigKind::Width,
      60,
    )
    .expect("config change registration must succeed");

    #[extrinsic_call]
    execute_config_change(RawOrigin::Signed(controller), principal.clone());

    let info = Vaults::<T>::get(&principal).expect("vault exists");
    assert!(info.pending.config_change.is_none());
  }

  #[benchmark]
  fn convert_held_assets_to_settlement(n: Linear<0, { T::MaxBatchCalls::get() }>) {
    let principal = principal_with_vault::<T>("principal");
    let controller = installed_controller::<T>();
    let vault = Pallet::<T>::vault_account(&principal);
    fund::<T>(T::SettlementAsset::get(), &vault, AMOUNT);
    fund::<T>(T::AssetA::get(), &vault, AMOUNT / 2);
    fund::<T>(T::AssetB::get(), &vault, AMOUNT / 2);
    let batch = approval_batch::<T>(n);

    #[extrinsic_call]
    convert_held_assets_to_settlement(
      RawOrigin::Signed(controller),
      principal.clone(),
      batch,
      None,
      None,
    );

    assert_eq!(Pallet::<T>::buckets(&vault).idle_settlement, 0);
  }

  #[benchmark]
  fn set_controller() {
    let controller: T::AccountId = account("controller", 0, SEED);
    let origin =
      T::AdminOrigin::try_successful_origin().expect("AdminOrigin must have a successful origin");

    #[extrinsic_call]
    set_controller(origin, controller.clone());

    assert_eq!(Controller::<T>::get(), Some(controller));
  }

  #[benchmark]
  fn refund_deposit() {
    let principal = principal_with_vault::<T>("principal");
    let controller = installed_controller::<T>();
    fund::<T>(T::SettlementAsset::get(), &principal, AMOUNT * 2);
    Pallet::<T>::register_deposit(RawOrigin::Signed(principal.clone()).into(), AMOUNT)
      .expect("deposit registration must succeed");

    #[extrinsic_call]
    refund_deposit(RawOrigin::Signed(controller), principal.clone());

    let info = Vaults::<T>::get(&principal).expect("vault exists");
    assert!(info.pending.deposit.is_none());
  }

  /// One withdrawal, the heaviest batch-free action, picked up by `on_idle`
  #[benchmark]
  fn auto_execute() {
    let principal = principal_with_vault::<T>("principal");
    deployed_with_withdrawal::<T>(&principal);
    let now = frame::deps::frame_system::Pallet::<T>::block_number();

    #[block]
    {
      Pallet::<T>::on_idle(now, Weight::from_parts(u64::MAX, u64::MAX));
    }

    let info = Vaults::<T>::get(&principal).expect("vault exists");
    assert!(info.pending.withdrawal.is_none());
  }

  #[cfg(test)]
  use crate::mock::{Test, new_test_ext};
  #[cfg(test)]
  impl_benchmark_test_suite!(Pallet, new_test_ext(), Test);
}
