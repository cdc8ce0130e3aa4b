#![cfg_attr(rustfmt, rustfmt_skip)]
#![allow(unused_parens)]
#![allow(unused_imports)]
#![allow(missing_docs)]

use core::marker::PhantomData;
use polkadot_sdk::frame_support::{
  traits::Get,
  weights::{constants::RocksDbWeight, Weight},
};

pub trait WeightInfo {
  fn create_vault() -> Weight;
  fn register_deposit() -> Weight;
  fn register_withdrawal() -> Weight;
  fn register_config_change() -> Weight;
  fn cancel() -> Weight;
  fn execute_swap_and_deploy(n: u32) -> Weight;
  fn execute_deploy() -> Weight;
  fn execute_withdrawal() -> Weight;
  fn execute_swap_settlement(n: u32) -> Weight;
  fn execute_config_change() -> Weight;
  fn convert_held_assets_to_settlement(n: u32) -> Weight;
  fn set_controller() -> Weight;
  fn refund_deposit() -> Weight;
  fn auto_execute() -> Weight;
}

pub struct SubstrateWeight<T>(PhantomData<T>);
impl<T: polkadot_sdk::frame_system::Config> WeightInfo for SubstrateWeight<T> {
  fn create_vault() -> Weight {
    Weight::from_parts(18_000_000, 1500)
      .saturating_add(T::DbWeight::get().reads(1))
      .saturating_add(T::DbWeight::get().writes(2))
  }

  fn register_deposit() -> Weight {
    Weight::from_parts(30_000_000, 2500)
      .saturating_add(T::DbWeight::get().reads(5))
      .saturating_add(T::DbWeight::get().writes(5))
  }

  fn register_withdrawal() -> Weight {
    Weight::from_parts(16_000_000, 1500)
      .saturating_add(T::DbWeight::get().reads(3))
      .saturating_add(T::DbWeight::get().writes(2))
  }

  fn register_config_change() -> Weight {
    Weight::from_parts(16_000_000, 1500)
      .saturating_add(T::DbWeight::get().reads(3))
      .saturating_add(T::DbWeight::get().writes(2))
  }

  fn cancel() -> Weight {
    Weight::from_parts(45_000_000, 3500)
      .saturating_add(T::DbWeight::get().reads(8))
      .saturating_add(T::DbWeight::get().writes(8))
  }

  fn execute_swap_and_deploy(n: u32) -> Weight {
    Weight::from_parts(60_000_000, 5000)
      .saturating_add(Weight::from_parts(25_000_000, 1500).saturating_mul(n.into()))
      .saturating_add(T::DbWeight::get().reads(10))
      .saturating_add(T::DbWeight::get().reads((4_u64).saturating_mul(n.into())))
      .saturating_add(T::DbWeight::get().writes(8))
      .saturating_add(T::DbWeight::get().writes((4_u64).saturating_mul(n.into())))
  }

  fn execute_deploy() -> Weight {
    Weight::from_parts(40_000_000, 3500)
      .saturating_add(T::DbWeight::get().reads(8))
      .saturating_add(T::DbWeight::get().writes(7))
  }

  fn execute_withdrawal() -> Weight {
    Weight::from_parts(70_000_000, 5000)
      .saturating_add(T::DbWeight::get().reads(12))
      .saturating_add(T::DbWeight::get().writes(10))
  }

  fn execute_swap_settlement(n: u32) -> Weight {
    Weight::from_parts(55_000_000, 4500)
      .saturating_add(Weight::from_parts(25_000_000, 1500).saturating_mul(n.into()))
      .saturating_add(T::DbWeight::get().reads(8))
      .saturating_add(T::DbWeight::get().reads((4_u64).saturating_mul(n.into())))
      .saturating_add(T::DbWeight::get().writes(6))
      .saturating_add(T::DbWeight::get().writes((4_u64).saturating_mul(n.into())))
  }

  fn execute_config_change() -> Weight {
    Weight::from_parts(20_000_000, 1800)
      .saturating_add(T::DbWeight::get().reads(4))
      .saturating_add(T::DbWeight::get().writes(4))
  }

  fn convert_held_assets_to_settlement(n: u32) -> Weight {
    Weight::from_parts(55_000_000, 4500)
      .saturating_add(Weight::from_parts(25_000_000, 1500).saturating_mul(n.into()))
      .saturating_add(T::DbWeight::get().reads(9))
      .saturating_add(T::DbWeight::get().reads((4_u64).saturating_mul(n.into())))
      .saturating_add(T::DbWeight::get().writes(6))
      .saturating_add(T::DbWeight::get().writes((4_u64).saturating_mul(n.into())))
  }

  fn set_controller() -> Weight {
    Weight::from_parts(8_000_000, 600)
      .saturating_add(T::DbWeight::get().writes(1))
  }

  fn refund_deposit() -> Weight {
    Weight::from_parts(35_000_000, 3000)
      .saturating_add(T::DbWeight::get().reads(7))
      .saturating_add(T::DbWeight::get().writes(6))
  }

  fn auto_execute() -> Weight {
    Weight::from_parts(75_000_000, 5500)
      .saturating_add(T::DbWeight::get().reads(14))
      .saturating_add(T::DbWeight::get().writes(12))
  }
}

impl WeightInfo for () {
  fn create_vault() -> Weight { Weight::from_parts(18_000_000, 1500) }
  fn register_deposit() -> Weight { Weight::from_parts(30_000_000, 2500) }
  fn register_withdrawal() -> Weight { Weight::from_parts(16_000_000, 1500) }
  fn register_config_change() -> Weight { Weight::from_parts(16_000_000, 1500) }
  fn cancel() -> Weight { Weight::from_parts(45_000_000, 3500) }
  fn execute_swap_and_deploy(n: u32) -> Weight {
    Weight::from_parts(60_000_000, 5000)
      .saturating_add(Weight::from_parts(25_000_000, 1500).saturating_mul(n.into()))
  }
  fn execute_deploy() -> Weight { Weight::from_parts(40_000_000, 3500) }
  fn execute_withdrawal() -> Weight { Weight::from_parts(70_000_000, 5000) }
  fn execute_swap_settlement(n: u32) -> Weight {
    Weight::from_parts(55_000_000, 4500)
      .saturating_add(Weight::from_parts(25_000_000, 1500).saturating_mul(n.into()))
  }
  fn execute_config_change() -> Weight { Weight::from_parts(20_000_000, 1800) }
  fn convert_held_assets_to_settlement(n: u32) -> Weight {
    Weight::from_parts(55_000_000, 4500)
      .saturating_add(Weight::from_parts(25_000_000, 1500).saturating_mul(n.into()))
  }
  fn set_controller() -> Weight { Weight::from_parts(8_000_000, 600) }
  fn refund_deposit() -> Weight { Weight::from_parts(35_000_000, 3000) }
  fn auto_execute() -> Weight { Weight::from_parts(75_000_000, 5500) }
}
