//! Role-based access control.
//!
//! Two roles: `Admin` grants and revokes `TeamMember`, and only team members
//! may reward the pool. The caller's identity always comes from the dispatch
//! origin of the call being checked.

use frame_support::pallet_prelude::*;
use frame_system::pallet_prelude::*;

use crate::{Config, Error, Event, Members, Pallet, Role, LOG_TARGET};

impl<T: Config> Pallet<T> {
    /// Whether `who` currently holds `role`
    pub fn has_role(role: Role, who: &T::AccountId) -> bool {
        Members::<T>::contains_key(role, who)
    }

    /// Signed caller of `origin`, if it holds `role`
    pub(crate) fn ensure_role(origin: OriginFor<T>, role: Role) -> Result<T::AccountId, DispatchError> {
        let who = ensure_signed(origin)?;
        ensure!(Self::has_role(role, &who), Error::<T>::Unauthorized);
        Ok(who)
    }

    /// Grant `role` to `who`. No-op if already held.
    pub(crate) fn grant(role: Role, who: &T::AccountId) {
        if Self::has_role(role, who) {
            return;
        }
        Members::<T>::insert(role, who, ());
        log::info!(target: LOG_TARGET, "{:?} granted to {:?}", role, who);
        Self::deposit_event(Event::RoleGranted { role, who: who.clone() });
    }

    /// Revoke `role` from `who`. No-op if not held.
    pub(crate) fn revoke(role: Role, who: &T::AccountId) {
        if Members::<T>::take(role, who).is_none() {
            return;
        }
        log::info!(target: LOG_TARGET, "{:?} revoked from {:?}", role, who);
        Self::deposit_event(Event::RoleRevoked { role, who: who.clone() });
    }
}
