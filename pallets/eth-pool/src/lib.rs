//! # ETH Pool Pallet
//!
//! Shared reward pool: depositors pool value, team members inject rewards, and
//! each depositor withdraws their principal plus the rewards paid while their
//! funds were in the pool.
//!
//! ## How it works:
//! 1. Anyone deposits into the pool account
//! 2. A team member rewards the pool; the reward is split over everyone
//!    already in it, proportionally to their principal
//! 3. Anyone withdraws everything they are owed in one go
//!
//! ## Accounting:
//! - `DividendsPerShare` accumulates reward per deposited unit, scaled by
//!   [`ethpool_primitives::MAGNITUDE`]
//! - A deposit made after earlier rewards books a correction equal to what the
//!   accumulator already credits it, so late joiners cannot claim old rewards
//! - Deposit and reward are O(1): no loop over depositors, ever
//!
//! ## Safety:
//! - Every call runs in its own storage layer: any error rolls back all of it
//! - Withdrawals zero the position before paying out, so a payout that calls
//!   back into the pallet finds nothing left to withdraw
//! - Payouts are capped at the pool total, so truncation can never underflow it

#![cfg_attr(not(feature = "std"), no_std)]

pub use ethpool_primitives::Role;
pub use pallet::*;
pub use payout::{CurrencyPayout, PayoutTransfer};

mod access;
mod payout;

pub(crate) const LOG_TARGET: &str = "runtime::eth-pool";

#[frame_support::pallet]
pub mod pallet {
    use frame_support::{
        pallet_prelude::*,
        storage::with_storage_layer,
        traits::{Currency, ExistenceRequirement},
        PalletId,
    };
    use frame_system::pallet_prelude::*;
    use sp_core::U256;
    use sp_runtime::traits::{AccountIdConversion, CheckedAdd, CheckedSub, SaturatedConversion, Zero};
    use sp_std::vec::Vec;

    use ethpool_primitives::{correction_for, dividends_increment, withdrawable, Role, MAGNITUDE};

    use crate::{payout::PayoutTransfer, LOG_TARGET};

    pub type BalanceOf<T> =
        <<T as Config>::Currency as Currency<<T as frame_system::Config>::AccountId>>::Balance;

    /// Principal of one depositor and the dividends it never earned
    #[derive(Encode, Decode, Clone, PartialEq, Eq, Default, RuntimeDebug, TypeInfo, MaxEncodedLen)]
    pub struct Funding<Balance> {
        /// Deposited and not yet withdrawn
        pub amount_funded: Balance,
        /// Subtracted from the accrued dividends of `amount_funded`.
        /// Same width as `DividendsPerShare`: it can exceed any balance.
        pub correction: U256,
    }

    #[pallet::config]
    pub trait Config: frame_system::Config {
        /// The overarching event type
        type RuntimeEvent: From<Event<Self>> + IsType<<Self as frame_system::Config>::RuntimeEvent>;

        /// Currency deposits and rewards are paid in
        type Currency: Currency<Self::AccountId>;

        /// Derives the account that holds the pooled value
        #[pallet::constant]
        type PalletId: Get<PalletId>;

        /// Moves withdrawn value out of the pool account
        type Payout: PayoutTransfer<Self::AccountId, BalanceOf<Self>>;
    }

    #[pallet::pallet]
    pub struct Pallet<T>(_);

    /// Principal plus rewards currently owed to depositors
    #[pallet::storage]
    #[pallet::getter(fn total_amount)]
    pub type TotalAmount<T: Config> = StorageValue<_, BalanceOf<T>, ValueQuery>;

    /// Cumulative reward per deposited unit, scaled by `MAGNITUDE`. Never decreases.
    #[pallet::storage]
    #[pallet::getter(fn dividends_per_share)]
    pub type DividendsPerShare<T: Config> = StorageValue<_, U256, ValueQuery>;

    /// Position of each depositor. Zeroed, never shrunk, by a withdrawal.
    #[pallet::storage]
    #[pallet::getter(fn funding)]
    pub type Fundings<T: Config> =
        StorageMap<_, Blake2_128Concat, T::AccountId, Funding<BalanceOf<T>>, ValueQuery>;

    /// Role memberships
    #[pallet::storage]
    pub type Members<T: Config> =
        StorageDoubleMap<_, Twox64Concat, Role, Blake2_128Concat, T::AccountId, (), OptionQuery>;

    #[pallet::extra_constants]
    impl<T: Config> Pallet<T> {
        /// Fixed-point scale of `DividendsPerShare` (2^128)
        #[pallet::constant_name(Magnitude)]
        pub fn magnitude() -> U256 {
            MAGNITUDE
        }
    }

    #[pallet::genesis_config]
    #[derive(frame_support::DefaultNoBound)]
    pub struct GenesisConfig<T: Config> {
        /// Deploying account: admin and team member
        pub owner: Option<T::AccountId>,
        /// Additional team members
        pub team_members: Vec<T::AccountId>,
    }

    #[pallet::genesis_build]
    impl<T: Config> BuildGenesisConfig for GenesisConfig<T> {
        fn build(&self) {
            // Keep the pool account alive no matter how much is withdrawn
            let pool = Pallet::<T>::account_id();
            let min = T::Currency::minimum_balance();
            if T::Currency::free_balance(&pool) < min {
                let _ = T::Currency::make_free_balance_be(&pool, min);
            }

            if let Some(owner) = &self.owner {
                Members::<T>::insert(Role::Admin, owner, ());
                Members::<T>::insert(Role::TeamMember, owner, ());
                log::info!(target: LOG_TARGET, "Pool owner {:?} granted admin and team member", owner);
            }
            for who in &self.team_members {
                Members::<T>::insert(Role::TeamMember, who, ());
            }
            log::info!(
                target: LOG_TARGET,
                "Pool initialized with {} extra team member(s)",
                self.team_members.len()
            );
        }
    }

    #[pallet::event]
    #[pallet::generate_deposit(pub(super) fn deposit_event)]
    pub enum Event<T: Config> {
        /// Value entered the pool as principal of `who`
        Deposited { who: T::AccountId, amount: BalanceOf<T> },
        /// A team member split `amount` over the current depositors
        Rewarded { who: T::AccountId, amount: BalanceOf<T> },
        /// `who` withdrew principal plus rewards
        Withdrawn { who: T::AccountId, amount: BalanceOf<T> },
        /// `who` now holds `role`
        RoleGranted { role: Role, who: T::AccountId },
        /// `who` no longer holds `role`
        RoleRevoked { role: Role, who: T::AccountId },
    }

    #[pallet::error]
    pub enum Error<T> {
        /// Reward sent while nobody is in the pool
        EmptyPoolReward,
        /// Caller lacks the role the call requires
        Unauthorized,
        /// Paying out a withdrawal failed
        TransferFailure,
        /// Arithmetic overflow
        ArithmeticOverflow,
    }

    #[pallet::call]
    impl<T: Config> Pallet<T> {
        /// Deposit `amount` into the pool.
        ///
        /// If rewards were paid before, the deposit books a correction so it
        /// only earns rewards paid from now on.
        #[pallet::call_index(0)]
        #[pallet::weight(Weight::from_parts(50_000_000, 0))]
        pub fn deposit(origin: OriginFor<T>, amount: BalanceOf<T>) -> DispatchResult {
            let who = ensure_signed(origin)?;
            with_storage_layer(|| Self::do_deposit(&who, amount))
        }

        /// Split `amount` over everyone currently in the pool.
        ///
        /// Team members only. Fails on an empty pool.
        #[pallet::call_index(1)]
        #[pallet::weight(Weight::from_parts(50_000_000, 0))]
        pub fn reward(origin: OriginFor<T>, amount: BalanceOf<T>) -> DispatchResult {
            let who = Self::ensure_role(origin, Role::TeamMember)?;
            with_storage_layer(|| Self::do_reward(&who, amount))
        }

        /// Withdraw principal plus accrued rewards, all of it.
        #[pallet::call_index(2)]
        #[pallet::weight(Weight::from_parts(75_000_000, 0))]
        pub fn withdraw(origin: OriginFor<T>) -> DispatchResult {
            let who = ensure_signed(origin)?;
            with_storage_layer(|| Self::do_withdraw(&who))
        }

        /// Allow `who` to reward the pool. Admins only.
        #[pallet::call_index(3)]
        #[pallet::weight(Weight::from_parts(10_000_000, 0))]
        pub fn add_team_member(origin: OriginFor<T>, who: T::AccountId) -> DispatchResult {
            Self::ensure_role(origin, Role::Admin)?;
            Self::grant(Role::TeamMember, &who);
            Ok(())
        }

        /// Stop `who` from rewarding the pool. Admins only.
        #[pallet::call_index(4)]
        #[pallet::weight(Weight::from_parts(10_000_000, 0))]
        pub fn remove_team_member(origin: OriginFor<T>, who: T::AccountId) -> DispatchResult {
            Self::ensure_role(origin, Role::Admin)?;
            Self::revoke(Role::TeamMember, &who);
            Ok(())
        }
    }

    impl<T: Config> Pallet<T> {
        /// Account holding every deposited and rewarded unit
        pub fn account_id() -> T::AccountId {
            T::PalletId::get().into_account_truncating()
        }

        /// Free balance of the pool account.
        ///
        /// At least `total_amount()`: it also holds the existential deposit and
        /// any rounding dust left behind by withdrawals.
        pub fn pool_balance() -> BalanceOf<T> {
            T::Currency::free_balance(&Self::account_id())
        }

        pub fn amount_funded(who: &T::AccountId) -> BalanceOf<T> {
            Fundings::<T>::get(who).amount_funded
        }

        pub fn correction(who: &T::AccountId) -> U256 {
            Fundings::<T>::get(who).correction
        }

        /// What `who` is owed right now: principal plus corrected dividends.
        pub fn withdrawable_amount(who: &T::AccountId) -> Result<BalanceOf<T>, DispatchError> {
            let funding = Fundings::<T>::get(who);
            let amount = withdrawable(
                DividendsPerShare::<T>::get(),
                funding.amount_funded.saturated_into(),
                funding.correction,
            )
            .ok_or(Error::<T>::ArithmeticOverflow)?;
            Self::to_balance(amount)
        }

        fn do_deposit(who: &T::AccountId, amount: BalanceOf<T>) -> DispatchResult {
            T::Currency::transfer(who, &Self::account_id(), amount, ExistenceRequirement::KeepAlive)?;

            let correction = correction_for(amount.saturated_into(), DividendsPerShare::<T>::get())
                .ok_or(Error::<T>::ArithmeticOverflow)?;
            let total = TotalAmount::<T>::get()
                .checked_add(&amount)
                .ok_or(Error::<T>::ArithmeticOverflow)?;

            Fundings::<T>::try_mutate(who, |funding| -> DispatchResult {
                funding.amount_funded = funding
                    .amount_funded
                    .checked_add(&amount)
                    .ok_or(Error::<T>::ArithmeticOverflow)?;
                funding.correction = funding
                    .correction
                    .checked_add(correction)
                    .ok_or(Error::<T>::ArithmeticOverflow)?;
                Ok(())
            })?;
            TotalAmount::<T>::put(total);

            log::debug!(
                target: LOG_TARGET,
                "Deposit of {:?} by {:?} (correction {:?}), pool total {:?}",
                amount,
                who,
                correction,
                total
            );
            Self::deposit_event(Event::Deposited { who: who.clone(), amount });
            Ok(())
        }

        fn do_reward(who: &T::AccountId, amount: BalanceOf<T>) -> DispatchResult {
            // Split over the total *before* the reward joins it
            let total = TotalAmount::<T>::get();
            ensure!(!total.is_zero(), Error::<T>::EmptyPoolReward);

            let increment = dividends_increment(amount.saturated_into(), total.saturated_into())
                .ok_or(Error::<T>::ArithmeticOverflow)?;
            let dividends_per_share = DividendsPerShare::<T>::get()
                .checked_add(increment)
                .ok_or(Error::<T>::ArithmeticOverflow)?;
            let new_total = total.checked_add(&amount).ok_or(Error::<T>::ArithmeticOverflow)?;

            T::Currency::transfer(who, &Self::account_id(), amount, ExistenceRequirement::KeepAlive)?;

            DividendsPerShare::<T>::put(dividends_per_share);
            TotalAmount::<T>::put(new_total);

            log::debug!(
                target: LOG_TARGET,
                "Reward of {:?} by {:?}, pool total {:?}",
                amount,
                who,
                new_total
            );
            Self::deposit_event(Event::Rewarded { who: who.clone(), amount });
            Ok(())
        }

        fn do_withdraw(who: &T::AccountId) -> DispatchResult {
            let total = TotalAmount::<T>::get();
            // Truncated corrections can owe the last depositors a few units more
            // than the pool tracks; the pool total is all there is to pay.
            let amount = Self::withdrawable_amount(who)?.min(total);

            // Zero before paying: a reentrant withdrawal must find nothing
            Fundings::<T>::remove(who);
            let remaining = total.checked_sub(&amount).ok_or(Error::<T>::ArithmeticOverflow)?;
            TotalAmount::<T>::put(remaining);

            if !amount.is_zero() {
                T::Payout::transfer_out(&Self::account_id(), who, amount).map_err(|e| {
                    log::warn!(
                        target: LOG_TARGET,
                        "Payout of {:?} to {:?} failed: {:?}",
                        amount,
                        who,
                        e
                    );
                    Error::<T>::TransferFailure
                })?;
            }

            log::debug!(
                target: LOG_TARGET,
                "Withdrawal of {:?} by {:?}, pool total {:?}",
                amount,
                who,
                remaining
            );
            Self::deposit_event(Event::Withdrawn { who: who.clone(), amount });
            Ok(())
        }

        fn to_balance(value: u128) -> Result<BalanceOf<T>, DispatchError> {
            value.try_into().map_err(|_| Error::<T>::ArithmeticOverflow.into())
        }
    }
}
