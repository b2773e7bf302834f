//! ETH Pool Core Primitives
//!
//! Fixed-point dividend arithmetic shared by the pool pallet and its clients.
//! Rewards are tracked as a cumulative per-unit rate scaled by [`MAGNITUDE`],
//! so depositing and rewarding stay O(1) no matter how many accounts exist.

#![cfg_attr(not(feature = "std"), no_std)]

use codec::{Decode, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use sp_core::{RuntimeDebug, U256};

/// Balance of an account or of the pool itself (smallest units)
pub type Balance = u128;

/// Scale applied to `dividends_per_share`: 2^128.
///
/// A `u128` reward times the scale always fits in 256 bits, so
/// [`dividends_increment`] cannot overflow.
pub const MAGNITUDE: U256 = U256([0, 0, 1, 0]);

/// Roles recognised by the pool's access control
#[derive(Encode, Decode, Clone, Copy, PartialEq, Eq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
pub enum Role {
    /// May grant and revoke `TeamMember`
    Admin,
    /// May inject rewards into the pool
    TeamMember,
}

/// Increase of the scaled per-unit rate when `reward` is split over `total`.
///
/// `total` must be the pool total *before* the reward is added.
/// Returns `None` for an empty pool.
pub fn dividends_increment(reward: Balance, total: Balance) -> Option<U256> {
    if total == 0 {
        return None;
    }
    U256::from(reward)
        .checked_mul(MAGNITUDE)?
        .checked_div(U256::from(total))
}

/// Dividends the rate has already accrued for `amount`, truncated.
///
/// Kept in 256 bits: it is only ever compared against a correction, and the
/// difference is what ends up in a balance.
pub fn accrued_dividends(dividends_per_share: U256, amount: Balance) -> Option<U256> {
    Some(dividends_per_share.checked_mul(U256::from(amount))? / MAGNITUDE)
}

/// Correction booked for a deposit of `amount` at the current rate.
///
/// Same truncation as [`accrued_dividends`]; kept separate because callers add
/// it to a running correction rather than compare it against one. A reward on
/// a near-empty pool makes this exceed any balance, hence `U256`.
pub fn correction_for(amount: Balance, dividends_per_share: U256) -> Option<U256> {
    if dividends_per_share.is_zero() {
        return Some(U256::zero());
    }
    accrued_dividends(dividends_per_share, amount)
}

/// Principal plus the dividends earned while `funded` was in the pool.
///
/// `None` if the correction exceeds the accrued dividends (broken accounting)
/// or the result does not fit a balance.
pub fn withdrawable(dividends_per_share: U256, funded: Balance, correction: U256) -> Option<Balance> {
    let earned = accrued_dividends(dividends_per_share, funded)?.checked_sub(correction)?;
    to_balance(earned.checked_add(U256::from(funded))?)
}

fn to_balance(value: U256) -> Option<Balance> {
    if value > U256::from(Balance::MAX) {
        None
    } else {
        Some(value.low_u128())
    }
}
