//! Outbound value transfer for withdrawals.

use core::marker::PhantomData;
use frame_support::{
    pallet_prelude::DispatchResult,
    traits::{Currency, ExistenceRequirement},
};

/// Moves withdrawn value from the pool account to a depositor.
///
/// Runs after the depositor's position is already zeroed. An implementation
/// may call back into the pallet; a nested withdrawal then pays nothing.
pub trait PayoutTransfer<AccountId, Balance> {
    fn transfer_out(pool: &AccountId, to: &AccountId, amount: Balance) -> DispatchResult;
}

/// Pays out with a plain [`Currency`] transfer.
pub struct CurrencyPayout<C>(PhantomData<C>);

impl<AccountId, C> PayoutTransfer<AccountId, <C as Currency<AccountId>>::Balance> for CurrencyPayout<C>
where
    C: Currency<AccountId>,
{
    fn transfer_out(
        pool: &AccountId,
        to: &AccountId,
        amount: <C as Currency<AccountId>>::Balance,
    ) -> DispatchResult {
        // The pool keeps its existential deposit from genesis, so it is never reaped here
        C::transfer(pool, to, amount, ExistenceRequirement::AllowDeath)
    }
}
