//! Gated Vault Pallet
//!
//! Per-principal custodial vaults that turn a settlement currency into a pair of
//! yield-bearing assets held by an external custodian.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub use pallet::*;

pub mod adapters;
pub use adapters::{Custodian, ExchangeRouter, GateOracle};

pub mod config_change;
pub mod registry;
pub mod swap;
pub mod types;

pub mod weights;
pub use weights::WeightInfo;

#[cfg(test)]
mod mock;

#[cfg(feature = "runtime-benchmarks")]
mod benchmarking;

const LOG_TARGET: &str = "runtime::gated-vault";

#[frame::pallet]
pub mod pallet {
  use super::{Custodian, ExchangeRouter, GateOracle, LOG_TARGET, WeightInfo};
  use crate::config_change::{ConfigChangeError, ConfigSetting};
  use crate::registry::{
    PendingConfig, PendingDeposit, PendingOps, PendingSwap, PendingWithdrawal, RegistryError,
  };
  use crate::swap::{self, ExternalCall, RejectedCall, SwapPolicy, SwapViolation};
  use crate::types::{BalanceBuckets, ControllerAction, RetryInfo, VaultInfo, VaultSnapshot};
  use alloc::vec::Vec;
  use frame::prelude::*;
  use polkadot_sdk::{
    frame_support::{
      PalletId,
      storage::with_storage_layer,
      traits::{
        EnsureOrigin,
        fungibles::{Inspect, Mutate},
        tokens::Preservation,
      },
    },
    sp_runtime::{
      DispatchError, Perquintill,
      traits::{AccountIdConversion, Saturating, Zero},
    },
  };
  use primitives::{Balance, ConfigKind, OperationKind};

  pub type VaultInfoOf<T> =
    VaultInfo<<T as frame_system::Config>::AccountId, Balance, BlockNumberFor<T>>;
  pub type PendingOpsOf<T> =
    PendingOps<<T as frame_system::Config>::AccountId, Balance, BlockNumberFor<T>>;
  pub type VaultSnapshotOf<T> =
    VaultSnapshot<<T as frame_system::Config>::AccountId, Balance, BlockNumberFor<T>>;
  pub type ExternalCallOf<T> = ExternalCall<<T as frame_system::Config>::AccountId, Balance>;
  pub type BatchOf<T> = BoundedVec<ExternalCallOf<T>, <T as Config>::MaxBatchCalls>;

  #[pallet::config]
  pub trait Config: frame_system::Config {
    /// Fungible assets backing settlement currency and the A/B pair
    type Assets: Inspect<Self::AccountId, AssetId = u32, Balance = Balance>
      + Mutate<Self::AccountId, AssetId = u32, Balance = Balance>;
    /// External yield position holding deployed A/B
    type Custodian: Custodian<Self::AccountId, Balance>;
    /// "Market is calm" signal consulted before every gated action
    type Gate: GateOracle<Self::AccountId>;
    /// The single approved exchange router
    type Exchange: ExchangeRouter<Self::AccountId, u32, Balance>;
    /// Decodes and vets controller-supplied swap batches
    type SwapPolicy: SwapPolicy<Self::AccountId, Balance>;
    /// Pallet ID for vault sub-account derivation
    #[pallet::constant]
    type PalletId: Get<PalletId>;
    /// Unit of account principals deposit and withdraw
    #[pallet::constant]
    type SettlementAsset: Get<u32>;
    #[pallet::constant]
    type AssetA: Get<u32>;
    #[pallet::constant]
    type AssetB: Get<u32>;
    /// Maximum external calls in one swap batch
    #[pallet::constant]
    type MaxBatchCalls: Get<u32>;
    /// Maximum vaults tracked for automated controller work
    #[pallet::constant]
    type MaxQueuedVaults: Get<u32>;
    /// Automated executions attempted per block in `on_idle`
    #[pallet::constant]
    type MaxAutoExecutionsPerBlock: Get<u32>;
    /// First retry delay after a failed automated execution
    #[pallet::constant]
    type BaseBackoff: Get<BlockNumberFor<Self>>;
    /// Ceiling for the retry delay
    #[pallet::constant]
    type MaxBackoff: Get<BlockNumberFor<Self>>;
    /// Age at which an unexecuted deposit is refunded automatically
    #[pallet::constant]
    type DepositTimeout: Get<BlockNumberFor<Self>>;
    /// Origin allowed to rotate the controller
    type AdminOrigin: EnsureOrigin<Self::RuntimeOrigin>;
    /// Weight information for extrinsics
    type WeightInfo: WeightInfo;
  }

  /// ## Gated execution
  /// Principals only register intents. Anything that moves assets in or out of
  /// the custodian, or trades them, is executed later by the controller once the
  /// gate reports calm. Each vault carries five independent pending slots
  /// (deposit, withdrawal, swap-settlement, config change, deploy) with mutual
  /// exclusion between fund flows.
  ///
  /// ## Balance buckets
  /// A vault's value sits in three places: idle settlement currency and the A/B
  /// buffer on the vault account, and the custodian position. Execution moves
  /// value between buckets and settles the principal out of idle settlement.
  ///
  /// ## Safety
  /// - **Swap policy**: controller batches are decoded into typed commands; only
  ///   allow-listed router entry points paying the vault and router approvals run.
  /// - **Atomicity**: every execute path is all-or-nothing. A failing custodian
  ///   withdrawal is isolated in its own storage layer and surfaced as an event.
  /// - **Locks**: `ExecutionLocks` rejects re-entry into a vault mid-execution.
  #[pallet::pallet]
  pub struct Pallet<T>(PhantomData<T>);

  /// Vault record per principal
  #[pallet::storage]
  pub type Vaults<T: Config> =
    StorageMap<_, Blake2_128Concat, T::AccountId, VaultInfoOf<T>, OptionQuery>;

  /// Account authorized to execute gated operations
  #[pallet::storage]
  pub type Controller<T: Config> = StorageValue<_, T::AccountId, OptionQuery>;

  /// Vaults currently inside an execute path
  #[pallet::storage]
  pub type ExecutionLocks<T: Config> =
    StorageMap<_, Blake2_128Concat, T::AccountId, (), OptionQuery>;

  /// Principals with work `on_idle` can perform without a swap batch
  #[pallet::storage]
  pub type ControllerQueue<T: Config> =
    StorageValue<_, BoundedVec<T::AccountId, T::MaxQueuedVaults>, ValueQuery>;

  /// Backoff state for principals whose automated execution failed
  #[pallet::storage]
  pub type RetryState<T: Config> =
    StorageMap<_, Blake2_128Concat, T::AccountId, RetryInfo<BlockNumberFor<T>>, OptionQuery>;

  #[pallet::event]
  #[pallet::generate_deposit(pub(super) fn deposit_event)]
  pub enum Event<T: Config> {
    VaultCreated {
      principal: T::AccountId,
      vault: T::AccountId,
    },
    /// Settlement currency escrowed for swap-and-deploy
    DepositRegistered {
      principal: T::AccountId,
      amount: Balance,
    },
    WithdrawalRegistered {
      principal: T::AccountId,
      amount: Balance,
      recipient: T::AccountId,
    },
    ConfigChangeRegistered {
      principal: T::AccountId,
      kind: ConfigKind,
      value: i128,
    },
    /// Withdrawn assets now await conversion for `recipient`
    SwapSettlementRegistered {
      principal: T::AccountId,
      recipient: T::AccountId,
      asset_a: Balance,
      asset_b: Balance,
    },
    /// Converted assets held until the gate opens
    DeployQueued {
      principal: T::AccountId,
      asset_a: Balance,
      asset_b: Balance,
    },
    DepositExecuted {
      principal: T::AccountId,
      amount: Balance,
    },
    Deployed {
      principal: T::AccountId,
      asset_a: Balance,
      asset_b: Balance,
    },
    /// Custodian exit completed; amounts are the measured delta
    WithdrawalExecuted {
      principal: T::AccountId,
      recipient: T::AccountId,
      asset_a: Balance,
      asset_b: Balance,
    },
    /// Custodian refused the withdrawal; its effects were discarded
    CustodianWithdrawFailed {
      principal: T::AccountId,
      error: DispatchError,
    },
    RemainderRedeployed {
      principal: T::AccountId,
      asset_a: Balance,
      asset_b: Balance,
    },
    SwapSettled {
      principal: T::AccountId,
      recipient: T::AccountId,
      amount: Balance,
    },
    ConfigChangeExecuted {
      principal: T::AccountId,
      kind: ConfigKind,
      value: i128,
    },
    HeldAssetsConverted {
      principal: T::AccountId,
      idle_returned: Balance,
      converted: Balance,
    },
    /// Pending operation cleared by its principal; escrow went to `recipient`
    OperationCancelled {
      principal: T::AccountId,
      kind: OperationKind,
      recipient: T::AccountId,
      settlement: Balance,
      asset_a: Balance,
      asset_b: Balance,
    },
    DepositRefunded {
      principal: T::AccountId,
      amount: Balance,
    },
    ControllerSet {
      controller: T::AccountId,
    },
    /// Automated execution failed and will be retried at `retry_at`
    AutoExecutionDeferred {
      principal: T::AccountId,
      action: ControllerAction,
      attempts: u32,
      retry_at: BlockNumberFor<T>,
      error: DispatchError,
    },
  }

  #[pallet::error]
  pub enum Error<T> {
    /// No vault exists for the principal
    VaultNotFound,
    /// The principal already owns a vault
    VaultExists,
    /// Caller is not the configured controller
    NotController,
    /// Amount must be non-zero
    ZeroAmount,
    /// An operation of this kind is already pending
    AlreadyPending,
    /// No operation of this kind is pending
    NotPending,
    NoDeposit,
    NoWithdraw,
    NoSwap,
    NoDeploy,
    NoConfig,
    /// Gate condition is not calm
    NotCalm,
    DepositInProgress,
    WithdrawalInProgress,
    DeployInProgress,
    SettlementInProgress,
    /// Settlement produced by the batch is below the requested minimum
    InsufficientOutput,
    /// Hint exceeds the free intermediate buffer
    InsufficientBuffer,
    /// Swap-and-deploy left no asset A or B to deploy
    NothingToDeploy,
    InvalidConfigKind,
    /// Config value does not fit the custodian setter's native width
    ConfigValueOutOfRange,
    /// External call targets something other than the router or an approval.
    /// `index` is the call's position in the batch.
    CallTargetNotAllowed { index: u8 },
    /// Router selector outside the allow-list
    SelectorNotAllowed { index: u8 },
    /// Swap output would go to an account other than the vault
    ThirdPartyReceiver { index: u8 },
    /// Approval grants allowance to an account other than the router
    ApprovalSpenderNotRouter { index: u8 },
    /// Call data could not be decoded
    MalformedCall { index: u8 },
    /// Router rejected a validated call
    SwapCallFailed { index: u8 },
    /// Vault is mid-execution
    VaultLocked,
  }

  impl<T: Config> From<RegistryError> for Error<T> {
    fn from(error: RegistryError) -> Self {
      match error {
        RegistryError::AlreadyPending => Error::<T>::AlreadyPending,
        RegistryError::NotPending => Error::<T>::NotPending,
        RegistryError::DepositInProgress => Error::<T>::DepositInProgress,
        RegistryError::WithdrawalInProgress => Error::<T>::WithdrawalInProgress,
        RegistryError::DeployInProgress => Error::<T>::DeployInProgress,
        RegistryError::SettlementInProgress => Error::<T>::SettlementInProgress,
      }
    }
  }

  impl<T: Config> From<RejectedCall> for Error<T> {
    fn from(rejected: RejectedCall) -> Self {
      let index = rejected.index;
      match rejected.violation {
        SwapViolation::MissingSelector | SwapViolation::MalformedCall { .. } => {
          Error::<T>::MalformedCall { index }
        }
        SwapViolation::CallTargetNotAllowed { .. } => Error::<T>::CallTargetNotAllowed { index },
        SwapViolation::SelectorNotAllowed { .. } => Error::<T>::SelectorNotAllowed { index },
        SwapViolation::ThirdPartyReceiver { .. } => Error::<T>::ThirdPartyReceiver { index },
        SwapViolation::ApprovalSpenderNotRouter { .. } => {
          Error::<T>::ApprovalSpenderNotRouter { index }
        }
      }
    }
  }

  impl<T: Config> From<ConfigChangeError> for Error<T> {
    fn from(error: ConfigChangeError) -> Self {
      match error {
        ConfigChangeError::InvalidKind => Error::<T>::InvalidConfigKind,
        ConfigChangeError::ValueOutOfRange => Error::<T>::ConfigValueOutOfRange,
      }
    }
  }

  #[pallet::call]
  impl<T: Config> Pallet<T> {
    /// Create the caller's vault
    ///
    /// The vault account is a sub-account of `PalletId` keyed by the principal and
    /// is kept alive by a provider reference regardless of its balances.
    #[pallet::call_index(0)]
    #[pallet::weight(T::WeightInfo::create_vault())]
    pub fn create_vault(origin: OriginFor<T>) -> DispatchResult {
      let who = ensure_signed(origin)?;
      ensure!(!Vaults::<T>::contains_key(&who), Error::<T>::VaultExists);

      let account = Self::vault_account(&who);
      frame_system::Pallet::<T>::inc_providers(&account);
      Vaults::<T>::insert(
        &who,
        VaultInfo {
          account: account.clone(),
          pending: PendingOps::default(),
          deployed_basis: Zero::zero(),
          created_at: frame_system::Pallet::<T>::block_number(),
        },
      );

      Self::deposit_event(Event::VaultCreated {
        principal: who,
        vault: account,
      });
      Ok(())
    }

    /// Escrow `amount` of settlement currency for the controller to swap and deploy
    #[pallet::call_index(1)]
    #[pallet::weight(T::WeightInfo::register_deposit())]
    pub fn register_deposit(origin: OriginFor<T>, amount: Balance) -> DispatchResult {
      let who = ensure_signed(origin)?;
      ensure!(!amount.is_zero(), Error::<T>::ZeroAmount);
      let mut info = Self::vault_for_registration(&who)?;
      info
        .pending
        .ensure_can_register(OperationKind::Deposit)
        .map_err(Error::<T>::from)?;

      Self::transfer_asset(T::SettlementAsset::get(), &who, &info.account, amount)?;
      info.pending.deposit = Some(PendingDeposit {
        amount,
        registered_at: frame_system::Pallet::<T>::block_number(),
      });
      Self::put_vault(&who, info);

      Self::deposit_event(Event::DepositRegistered {
        principal: who,
        amount,
      });
      Ok(())
    }

    /// Request an exit. Nothing moves until the controller executes it.
    #[pallet::call_index(2)]
    #[pallet::weight(T::WeightInfo::register_withdrawal())]
    pub fn register_withdrawal(origin: OriginFor<T>, amount: Balance) -> DispatchResult {
      let who = ensure_signed(origin)?;
      ensure!(!amount.is_zero(), Error::<T>::ZeroAmount);
      let mut info = Self::vault_for_registration(&who)?;
      info
        .pending
        .ensure_can_register(OperationKind::Withdrawal)
        .map_err(Error::<T>::from)?;

      info.pending.withdrawal = Some(PendingWithdrawal {
        amount,
        recipient: who.clone(),
      });
      Self::put_vault(&who, info);

      Self::deposit_event(Event::WithdrawalRegistered {
        principal: who.clone(),
        amount,
        recipient: who,
      });
      Ok(())
    }

    /// Queue a custodian setting change for the next calm window
    #[pallet::call_index(3)]
    #[pallet::weight(T::WeightInfo::register_config_change())]
    pub fn register_config_change(
      origin: OriginFor<T>,
      kind: ConfigKind,
      value: i128,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;
      let mut info = Self::vault_for_registration(&who)?;
      info
        .pending
        .ensure_can_register(OperationKind::ConfigChange)
        .map_err(Error::<T>::from)?;
      ConfigSetting::try_from_raw(kind, value).map_err(Error::<T>::from)?;

      info.pending.config_change = Some(PendingConfig { kind, value });
      Self::put_vault(&who, info);

      Self::deposit_event(Event::ConfigChangeRegistered {
        principal: who,
        kind,
        value,
      });
      Ok(())
    }

    /// Clear a pending operation and return whatever it escrowed
    ///
    /// - Deposit: settlement currency back to the principal.
    /// - Deploy: queued A/B back to the principal.
    /// - SwapSettlement: the withdrawn A/B, in kind, to the recorded recipient.
    /// - Withdrawal, ConfigChange: nothing moves.
    #[pallet::call_index(4)]
    #[pallet::weight(T::WeightInfo::cancel())]
    pub fn cancel(origin: OriginFor<T>, kind: OperationKind) -> DispatchResult {
      let who = ensure_signed(origin)?;
      let mut info = Self::vault_for_registration(&who)?;
      let vault = info.account.clone();
      let not_pending = || DispatchError::from(Error::<T>::NotPending);

      let (recipient, settlement, asset_a, asset_b) = match kind {
        OperationKind::Deposit => {
          let deposit = info.pending.deposit.take().ok_or_else(not_pending)?;
          Self::transfer_asset(T::SettlementAsset::get(), &vault, &who, deposit.amount)?;
          (who.clone(), deposit.amount, Zero::zero(), Zero::zero())
        }
        OperationKind::Deploy => {
          let deploy = info.pending.deploy.take().ok_or_else(not_pending)?;
          Self::transfer_asset(T::AssetA::get(), &vault, &who, deploy.asset_a)?;
          Self::transfer_asset(T::AssetB::get(), &vault, &who, deploy.asset_b)?;
          (who.clone(), Zero::zero(), deploy.asset_a, deploy.asset_b)
        }
        OperationKind::SwapSettlement => {
          let swap = info.pending.swap_settlement.take().ok_or_else(not_pending)?;
          Self::transfer_asset(T::AssetA::get(), &vault, &swap.recipient, swap.asset_a)?;
          Self::transfer_asset(T::AssetB::get(), &vault, &swap.recipient, swap.asset_b)?;
          (swap.recipient, Zero::zero(), swap.asset_a, swap.asset_b)
        }
        OperationKind::Withdrawal => {
          info.pending.withdrawal.take().ok_or_else(not_pending)?;
          (who.clone(), Zero::zero(), Zero::zero(), Zero::zero())
        }
        OperationKind::ConfigChange => {
          info.pending.config_change.take().ok_or_else(not_pending)?;
          (who.clone(), Zero::zero(), Zero::zero(), Zero::zero())
        }
      };
      Self::put_vault(&who, info);

      Self::deposit_event(Event::OperationCancelled {
        principal: who,
        kind,
        recipient,
        settlement,
        asset_a,
        asset_b,
      });
      Ok(())
    }

    /// Convert an escrowed deposit into A/B and deploy it
    ///
    /// The deposit slot is cleared and persisted before the batch runs. Amounts
    /// come from the hints, or the free buffer when a hint is `None`; both being
    /// zero fails with `NothingToDeploy` and keeps the deposit. A closed gate
    /// queues the amounts in the deploy slot instead of failing.
    #[pallet::call_index(5)]
    #[pallet::weight(T::WeightInfo::execute_swap_and_deploy(batch.len() as u32))]
    pub fn execute_swap_and_deploy(
      origin: OriginFor<T>,
      principal: T::AccountId,
      batch: BatchOf<T>,
      hint_a: Option<Balance>,
      hint_b: Option<Balance>,
    ) -> DispatchResult {
      Self::ensure_controller(origin)?;
      Self::with_vault_lock(&principal, || {
        Self::do_swap_and_deploy(&principal, &batch, hint_a, hint_b)
      })
    }

    /// Move queued A/B into the custodian
    #[pallet::call_index(6)]
    #[pallet::weight(T::WeightInfo::execute_deploy())]
    pub fn execute_deploy(origin: OriginFor<T>, principal: T::AccountId) -> DispatchResult {
      Self::ensure_controller(origin)?;
      Self::with_vault_lock(&principal, || Self::do_execute_deploy(&principal))
    }

    /// Pull the requested share of the custodian position back into the vault
    ///
    /// The share is the registered amount over the vault's deployed basis.
    /// Custodian failure is tolerated here: the attempt runs in its own storage
    /// layer, and only the vault's measured balance change is settled.
    #[pallet::call_index(7)]
    #[pallet::weight(T::WeightInfo::execute_withdrawal())]
    pub fn execute_withdrawal(origin: OriginFor<T>, principal: T::AccountId) -> DispatchResult {
      Self::ensure_controller(origin)?;
      Self::with_vault_lock(&principal, || Self::do_execute_withdrawal(&principal))
    }

    /// Convert withdrawn assets and pay the whole settlement balance to the recipient
    #[pallet::call_index(8)]
    #[pallet::weight(T::WeightInfo::execute_swap_settlement(batch.len() as u32))]
    pub fn execute_swap_settlement(
      origin: OriginFor<T>,
      principal: T::AccountId,
      batch: BatchOf<T>,
      min_settlement_out: Balance,
    ) -> DispatchResult {
      Self::ensure_controller(origin)?;
      Self::with_vault_lock(&principal, || {
        Self::do_swap_settlement(&principal, &batch, min_settlement_out)
      })
    }

    #[pallet::call_index(9)]
    #[pallet::weight(T::WeightInfo::execute_config_change())]
    pub fn execute_config_change(origin: OriginFor<T>, principal: T::AccountId) -> DispatchResult {
      Self::ensure_controller(origin)?;
      Self::with_vault_lock(&principal, || Self::do_execute_config_change(&principal))
    }

    /// Sell stray buffer assets for settlement currency and pay the principal
    ///
    /// Only runs when nothing else has a claim on the buffer.
    #[pallet::call_index(10)]
    #[pallet::weight(T::WeightInfo::convert_held_assets_to_settlement(batch.len() as u32))]
    pub fn convert_held_assets_to_settlement(
      origin: OriginFor<T>,
      principal: T::AccountId,
      batch: BatchOf<T>,
      hint_a: Option<Balance>,
      hint_b: Option<Balance>,
    ) -> DispatchResult {
      Self::ensure_controller(origin)?;
      Self::with_vault_lock(&principal, || {
        Self::do_convert_held_assets(&principal, &batch, hint_a, hint_b)
      })
    }

    #[pallet::call_index(11)]
    #[pallet::weight(T::WeightInfo::set_controller())]
    pub fn set_controller(origin: OriginFor<T>, controller: T::AccountId) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;

      Controller::<T>::put(&controller);

      Self::deposit_event(Event::ControllerSet { controller });
      Ok(())
    }

    /// Return an escrowed deposit the controller cannot route
    #[pallet::call_index(12)]
    #[pallet::weight(T::WeightInfo::refund_deposit())]
    pub fn refund_deposit(origin: OriginFor<T>, principal: T::AccountId) -> DispatchResult {
      Self::ensure_controller(origin)?;
      Self::with_vault_lock(&principal, || Self::do_refund_deposit(&principal))
    }
  }

  #[pallet::hooks]
  impl<T: Config> Hooks<BlockNumberFor<T>> for Pallet<T> {
    /// Perform batch-free controller work with the leftover block weight
    ///
    /// Each queued principal contributes its highest-priority ready action.
    /// Actions run in priority order, each in its own storage layer; failures
    /// back off exponentially per principal.
    fn on_idle(n: BlockNumberFor<T>, remaining_weight: Weight) -> Weight {
      let scan_weight = T::DbWeight::get().reads(2);
      let action_weight = T::WeightInfo::auto_execute();
      let mut consumed = T::DbWeight::get().reads(1);
      if !remaining_weight.all_gte(consumed) {
        return Weight::zero();
      }

      let queue = ControllerQueue::<T>::get();
      let mut ready: Vec<(ControllerAction, T::AccountId)> = Vec::new();
      for principal in queue.into_iter() {
        if !remaining_weight.all_gte(consumed.saturating_add(scan_weight)) {
          break;
        }
        consumed = consumed.saturating_add(scan_weight);

        if let Some(retry) = RetryState::<T>::get(&principal) {
          if n < retry.next_attempt {
            continue;
          }
        }
        let Some(info) = Vaults::<T>::get(&principal) else {
          continue;
        };
        if let Some(action) = Self::next_action(&info.pending, n) {
          ready.push((action, principal));
        }
      }

      ready.sort_by_key(|(action, _)| *action);

      let limit = T::MaxAutoExecutionsPerBlock::get() as usize;
      for (action, principal) in ready.into_iter().take(limit) {
        if !remaining_weight.all_gte(consumed.saturating_add(action_weight)) {
          break;
        }
        consumed = consumed.saturating_add(action_weight);

        match with_storage_layer(|| Self::auto_execute(&principal, action)) {
          Ok(()) => RetryState::<T>::remove(&principal),
          Err(error) => Self::defer(&principal, action, n, error),
        }
      }

      consumed
    }
  }

  impl<T: Config> Pallet<T> {
    /// Vault account of `principal`
    pub fn vault_account(principal: &T::AccountId) -> T::AccountId {
      T::PalletId::get().into_sub_account_truncating(principal)
    }

    /// Pending record plus balance buckets, read-only
    pub fn snapshot(principal: &T::AccountId) -> Option<VaultSnapshotOf<T>> {
      let info = Vaults::<T>::get(principal)?;
      let buckets = Self::buckets(&info.account);
      Some(VaultSnapshot { info, buckets })
    }

    pub fn buckets(vault: &T::AccountId) -> BalanceBuckets<Balance> {
      let (custodian_a, custodian_b) = T::Custodian::balances(vault);
      BalanceBuckets {
        idle_settlement: Self::balance_of(T::SettlementAsset::get(), vault),
        buffer_a: Self::balance_of(T::AssetA::get(), vault),
        buffer_b: Self::balance_of(T::AssetB::get(), vault),
        custodian_a,
        custodian_b,
      }
    }

    /// Highest-priority action `on_idle` may take for this record at block `now`
    pub fn next_action(
      pending: &PendingOpsOf<T>,
      now: BlockNumberFor<T>,
    ) -> Option<ControllerAction> {
      if pending.withdrawal.is_some() {
        return Some(ControllerAction::ExecuteWithdrawal);
      }
      if let Some(deposit) = &pending.deposit {
        if now >= deposit.registered_at.saturating_add(T::DepositTimeout::get()) {
          return Some(ControllerAction::RefundDeposit);
        }
      }
      if pending.config_change.is_some() {
        return Some(ControllerAction::ExecuteConfigChange);
      }
      if pending.deploy.is_some() {
        return Some(ControllerAction::ExecuteDeploy);
      }
      None
    }

    /// `BaseBackoff * 2^attempts`, capped at `MaxBackoff`
    pub fn backoff_delay(attempts: u32) -> BlockNumberFor<T> {
      let factor: BlockNumberFor<T> = 2u32.saturating_pow(attempts).into();
      T::BaseBackoff::get()
        .saturating_mul(factor)
        .min(T::MaxBackoff::get())
    }

    fn auto_execute(principal: &T::AccountId, action: ControllerAction) -> DispatchResult {
      Self::with_vault_lock(principal, || match action {
        ControllerAction::ExecuteWithdrawal => Self::do_execute_withdrawal(principal),
        ControllerAction::RefundDeposit => Self::do_refund_deposit(principal),
        ControllerAction::ExecuteConfigChange => Self::do_execute_config_change(principal),
        ControllerAction::ExecuteDeploy => Self::do_execute_deploy(principal),
      })
    }

    fn defer(
      principal: &T::AccountId,
      action: ControllerAction,
      now: BlockNumberFor<T>,
      error: DispatchError,
    ) {
      let attempts = RetryState::<T>::get(principal)
        .map(|retry| retry.attempts)
        .unwrap_or(0);
      let retry_at = now.saturating_add(Self::backoff_delay(attempts));
      let attempts = attempts.saturating_add(1);
      RetryState::<T>::insert(
        principal,
        RetryInfo {
          attempts,
          next_attempt: retry_at,
        },
      );

      log::debug!(
        target: LOG_TARGET,
        "deferred {:?} for {:?} until {:?} (attempt {}): {:?}",
        action,
        principal,
        retry_at,
        attempts,
        error,
      );
      Self::deposit_event(Event::AutoExecutionDeferred {
        principal: principal.clone(),
        action,
        attempts,
        retry_at,
        error,
      });
    }

    fn do_swap_and_deploy(
      principal: &T::AccountId,
      batch: &[ExternalCallOf<T>],
      hint_a: Option<Balance>,
      hint_b: Option<Balance>,
    ) -> DispatchResult {
      let mut info = Self::vault_of(principal)?;
      let deposit = info.pending.deposit.take().ok_or(Error::<T>::NoDeposit)?;
      Self::put_vault(principal, info.clone());

      let vault = info.account.clone();
      Self::run_batch(principal, &vault, batch)?;

      let queued = info.pending.deploy.unwrap_or_default();
      let amount_a = Self::resolve_amount(T::AssetA::get(), &vault, queued.asset_a, hint_a)?;
      let amount_b = Self::resolve_amount(T::AssetB::get(), &vault, queued.asset_b, hint_b)?;

      ensure!(
        !amount_a.is_zero() || !amount_b.is_zero(),
        Error::<T>::NothingToDeploy
      );

      if T::Gate::is_calm(&vault) {
        Self::deploy_to_custodian(&vault, amount_a, amount_b)?;
        info.deployed_basis = info.deployed_basis.saturating_add(deposit.amount);
        Self::put_vault(principal, info);
        Self::deposit_event(Event::Deployed {
          principal: principal.clone(),
          asset_a: amount_a,
          asset_b: amount_b,
        });
      } else {
        let deploy = info.pending.deploy.get_or_insert_with(Default::default);
        deploy.asset_a = deploy.asset_a.saturating_add(amount_a);
        deploy.asset_b = deploy.asset_b.saturating_add(amount_b);
        deploy.basis = deploy.basis.saturating_add(deposit.amount);
        Self::put_vault(principal, info);
        Self::deposit_event(Event::DeployQueued {
          principal: principal.clone(),
          asset_a: amount_a,
          asset_b: amount_b,
        });
      }

      Self::deposit_event(Event::DepositExecuted {
        principal: principal.clone(),
        amount: deposit.amount,
      });
      Ok(())
    }

    fn do_execute_deploy(principal: &T::AccountId) -> DispatchResult {
      let mut info = Self::vault_of(principal)?;
      let deploy = info.pending.deploy.ok_or(Error::<T>::NoDeploy)?;
      ensure!(T::Gate::is_calm(&info.account), Error::<T>::NotCalm);

      info.pending.deploy = None;
      Self::deploy_to_custodian(&info.account, deploy.asset_a, deploy.asset_b)?;
      info.deployed_basis = info.deployed_basis.saturating_add(deploy.basis);
      Self::put_vault(principal, info);

      Self::deposit_event(Event::Deployed {
        principal: principal.clone(),
        asset_a: deploy.asset_a,
        asset_b: deploy.asset_b,
      });
      Ok(())
    }

    fn do_execute_withdrawal(principal: &T::AccountId) -> DispatchResult {
      let mut info = Self::vault_of(principal)?;
      let withdrawal = info
        .pending
        .withdrawal
        .take()
        .ok_or(Error::<T>::NoWithdraw)?;
      let vault = info.account.clone();
      let (asset_a, asset_b) = (T::AssetA::get(), T::AssetB::get());

      T::Custodian::before_action(&vault)?;
      let (held_a, held_b) = T::Custodian::balances(&vault);
      let basis = info.deployed_basis;
      let requested = withdrawal.amount.min(basis);
      // A request covering the whole basis, or a vault without one, exits in full
      let share = if requested == basis {
        Perquintill::one()
      } else {
        Perquintill::from_rational(requested, basis)
      };
      let (target_a, target_b) = (share.mul_floor(held_a), share.mul_floor(held_b));
      let before_a = Self::balance_of(asset_a, &vault);
      let before_b = Self::balance_of(asset_b, &vault);

      let attempt = with_storage_layer(|| T::Custodian::withdraw(&vault, target_a, target_b));
      if let Err(error) = attempt {
        log::warn!(
          target: LOG_TARGET,
          "custodian withdraw failed for {:?}: {:?}",
          principal,
          error,
        );
        Self::deposit_event(Event::CustodianWithdrawFailed {
          principal: principal.clone(),
          error,
        });
      }

      let received_a = Self::balance_of(asset_a, &vault).saturating_sub(before_a);
      let received_b = Self::balance_of(asset_b, &vault).saturating_sub(before_b);
      let (delta_a, delta_b) = (received_a.min(target_a), received_b.min(target_b));
      if !delta_a.is_zero() || !delta_b.is_zero() {
        info.pending.swap_settlement = Some(PendingSwap {
          asset_a: delta_a,
          asset_b: delta_b,
          recipient: withdrawal.recipient.clone(),
        });
        info.deployed_basis = basis.saturating_sub(requested);
        Self::deposit_event(Event::SwapSettlementRegistered {
          principal: principal.clone(),
          recipient: withdrawal.recipient.clone(),
          asset_a: delta_a,
          asset_b: delta_b,
        });
      }

      // Prior buffer plus anything the custodian released beyond the request
      let remainder_a = before_a.saturating_add(received_a.saturating_sub(delta_a));
      let remainder_b = before_b.saturating_add(received_b.saturating_sub(delta_b));
      let has_remainder = !remainder_a.is_zero() || !remainder_b.is_zero();
      if has_remainder && T::Gate::is_calm(&vault) {
        Self::deploy_to_custodian(&vault, remainder_a, remainder_b)?;
        Self::deposit_event(Event::RemainderRedeployed {
          principal: principal.clone(),
          asset_a: remainder_a,
          asset_b: remainder_b,
        });
      }

      Self::put_vault(principal, info);
      Self::deposit_event(Event::WithdrawalExecuted {
        principal: principal.clone(),
        recipient: withdrawal.recipient,
        asset_a: delta_a,
        asset_b: delta_b,
      });
      Ok(())
    }

    fn do_swap_settlement(
      principal: &T::AccountId,
      batch: &[ExternalCallOf<T>],
      min_settlement_out: Balance,
    ) -> DispatchResult {
      let mut info = Self::vault_of(principal)?;
      let swap = info
        .pending
        .swap_settlement
        .take()
        .ok_or(Error::<T>::NoSwap)?;
      let recipient = swap.recipient;
      let vault = info.account.clone();
      Self::put_vault(principal, info);

      Self::run_batch(principal, &vault, batch)?;

      let settlement_asset = T::SettlementAsset::get();
      let amount = Self::balance_of(settlement_asset, &vault);
      ensure!(amount >= min_settlement_out, Error::<T>::InsufficientOutput);
      Self::transfer_asset(settlement_asset, &vault, &recipient, amount)?;

      Self::deposit_event(Event::SwapSettled {
        principal: principal.clone(),
        recipient,
        amount,
      });
      Ok(())
    }

    fn do_execute_config_change(principal: &T::AccountId) -> DispatchResult {
      let mut info = Self::vault_of(principal)?;
      let config = info.pending.config_change.ok_or(Error::<T>::NoConfig)?;
      ensure!(T::Gate::is_calm(&info.account), Error::<T>::NotCalm);

      let setting =
        ConfigSetting::try_from_raw(config.kind, config.value).map_err(Error::<T>::from)?;
      info.pending.config_change = None;
      setting.apply::<T::Custodian, _, _>(&info.account)?;
      Self::put_vault(principal, info);

      Self::deposit_event(Event::ConfigChangeExecuted {
        principal: principal.clone(),
        kind: setting.kind(),
        value: config.value,
      });
      Ok(())
    }

    fn do_convert_held_assets(
      principal: &T::AccountId,
      batch: &[ExternalCallOf<T>],
      hint_a: Option<Balance>,
      hint_b: Option<Balance>,
    ) -> DispatchResult {
      let info = Self::vault_of(principal)?;
      info
        .pending
        .ensure_buffer_unclaimed()
        .map_err(Error::<T>::from)?;
      let vault = info.account;
      let settlement_asset = T::SettlementAsset::get();

      let idle_returned = Self::balance_of(settlement_asset, &vault);
      Self::transfer_asset(settlement_asset, &vault, principal, idle_returned)?;

      Self::resolve_amount(T::AssetA::get(), &vault, Zero::zero(), hint_a)?;
      Self::resolve_amount(T::AssetB::get(), &vault, Zero::zero(), hint_b)?;

      Self::run_batch(principal, &vault, batch)?;

      let converted = Self::balance_of(settlement_asset, &vault);
      Self::transfer_asset(settlement_asset, &vault, principal, converted)?;

      Self::deposit_event(Event::HeldAssetsConverted {
        principal: principal.clone(),
        idle_returned,
        converted,
      });
      Ok(())
    }

    fn do_refund_deposit(principal: &T::AccountId) -> DispatchResult {
      let mut info = Self::vault_of(principal)?;
      let deposit = info.pending.deposit.take().ok_or(Error::<T>::NoDeposit)?;

      Self::transfer_asset(
        T::SettlementAsset::get(),
        &info.account,
        principal,
        deposit.amount,
      )?;
      Self::put_vault(principal, info);

      Self::deposit_event(Event::DepositRefunded {
        principal: principal.clone(),
        amount: deposit.amount,
      });
      Ok(())
    }

    /// Validate the whole batch, then forward each command to the router
    fn run_batch(
      principal: &T::AccountId,
      vault: &T::AccountId,
      batch: &[ExternalCallOf<T>],
    ) -> DispatchResult {
      let router = T::Exchange::account();
      let commands = swap::validate_batch::<T::SwapPolicy, _, _>(batch, &router, vault)
        .map_err(|rejected| {
          log::warn!(
            target: LOG_TARGET,
            "rejected swap batch for {:?} at call {}: {:?}",
            principal,
            rejected.index,
            rejected.violation,
          );
          Error::<T>::from(rejected)
        })?;

      for (index, command) in commands.into_iter().enumerate() {
        let index = u8::try_from(index).unwrap_or(u8::MAX);
        swap::dispatch::<T::Exchange, _, _>(vault, command).map_err(|error| {
          log::warn!(
            target: LOG_TARGET,
            "router call {} failed for {:?}: {:?}",
            index,
            principal,
            error,
          );
          Error::<T>::SwapCallFailed { index }
        })?;
      }
      Ok(())
    }

    /// Free buffer of `asset` net of `queued`, or the hint if it fits within it
    fn resolve_amount(
      asset: u32,
      vault: &T::AccountId,
      queued: Balance,
      hint: Option<Balance>,
    ) -> Result<Balance, DispatchError> {
      let free = Self::balance_of(asset, vault).saturating_sub(queued);
      match hint {
        Some(amount) => {
          ensure!(amount <= free, Error::<T>::InsufficientBuffer);
          Ok(amount)
        }
        None => Ok(free),
      }
    }

    fn deploy_to_custodian(
      vault: &T::AccountId,
      amount_a: Balance,
      amount_b: Balance,
    ) -> DispatchResult {
      if amount_a.is_zero() && amount_b.is_zero() {
        return Ok(());
      }
      T::Custodian::before_action(vault)?;
      T::Custodian::deposit(vault, amount_a, amount_b)
    }

    fn balance_of(asset: u32, who: &T::AccountId) -> Balance {
      T::Assets::balance(asset, who)
    }

    fn transfer_asset(
      asset: u32,
      from: &T::AccountId,
      to: &T::AccountId,
      amount: Balance,
    ) -> DispatchResult {
      if amount.is_zero() {
        return Ok(());
      }
      T::Assets::transfer(asset, from, to, amount, Preservation::Expendable)?;
      Ok(())
    }

    fn ensure_controller(origin: OriginFor<T>) -> Result<T::AccountId, DispatchError> {
      let who = ensure_signed(origin)?;
      ensure!(
        Controller::<T>::get().as_ref() == Some(&who),
        Error::<T>::NotController
      );
      Ok(who)
    }

    fn vault_of(principal: &T::AccountId) -> Result<VaultInfoOf<T>, DispatchError> {
      Vaults::<T>::get(principal).ok_or_else(|| Error::<T>::VaultNotFound.into())
    }

    /// Vault record for a principal-side call; refused while an execution holds the lock
    fn vault_for_registration(
      principal: &T::AccountId,
    ) -> Result<VaultInfoOf<T>, DispatchError> {
      let info = Self::vault_of(principal)?;
      ensure!(
        !ExecutionLocks::<T>::contains_key(principal),
        Error::<T>::VaultLocked
      );
      Ok(info)
    }

    fn with_vault_lock<R>(
      principal: &T::AccountId,
      f: impl FnOnce() -> Result<R, DispatchError>,
    ) -> Result<R, DispatchError> {
      ensure!(
        !ExecutionLocks::<T>::contains_key(principal),
        Error::<T>::VaultLocked
      );
      ExecutionLocks::<T>::insert(principal, ());
      let result = f();
      ExecutionLocks::<T>::remove(principal);
      result
    }

    /// Persist the record and keep `ControllerQueue` in step with it
    fn put_vault(principal: &T::AccountId, info: VaultInfoOf<T>) {
      let automatable = info.pending.has_automatable_work();
      Vaults::<T>::insert(principal, info);

      ControllerQueue::<T>::mutate(|queue| {
        let position = queue.iter().position(|p| p == principal);
        match (automatable, position) {
          (true, None) => {
            if queue.try_push(principal.clone()).is_err() {
              log::debug!(
                target: LOG_TARGET,
                "controller queue full, {:?} left to the off-chain controller",
                principal,
              );
            }
          }
          (false, Some(index)) => {
            queue.remove(index);
          }
          _ => {}
        }
      });
      if !automatable {
        RetryState::<T>::remove(principal);
      }
    }
  }

  /// Seeds the controller account
  #[pallet::genesis_config]
  #[derive(frame::prelude::DefaultNoBound)]
  pub struct GenesisConfig<T: Config> {
    pub controller: Option<T::AccountId>,
  }

  #[pallet::genesis_build]
  impl<T: Config> BuildGenesisConfig for GenesisConfig<T> {
    fn build(&self) {
      if let Some(controller) = &self.controller {
        Controller::<T>::put(controller);
      }
    }
  }
}
