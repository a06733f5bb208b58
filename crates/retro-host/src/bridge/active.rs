//! Routing of stateless plugin callbacks to the bridge that made the call.
//!
//! The callbacks carry no user data, so every call into a plugin installs
//! its bridge state in a thread-local slot for the duration of the call. The
//! guard restores whatever was there before, which keeps nested calls and
//! several bridges on one thread apart.

use std::cell::{Cell, RefCell};
use std::ptr;

use super::state::BridgeState;

thread_local! {
    static ACTIVE: Cell<*const RefCell<BridgeState>> = const { Cell::new(ptr::null()) };
}

/// Keeps one bridge active until dropped.
pub(crate) struct ActiveScope {
    previous: *const RefCell<BridgeState>,
}

impl ActiveScope {
    /// `state` must outlive the scope; the bridge keeps it boxed.
    pub(crate) fn enter(state: &RefCell<BridgeState>) -> Self {
        let previous = ACTIVE.with(|slot| slot.replace(state));
        Self { previous }
    }
}

impl Drop for ActiveScope {
    fn drop(&mut self) {
        ACTIVE.with(|slot| slot.set(self.previous));
    }
}

/// Runs `f` against the active bridge, or returns `neutral` when no bridge is
/// active or the active one is already borrowed further up the stack.
pub(crate) fn with_active<R>(neutral: R, f: impl FnOnce(&mut BridgeState) -> R) -> R {
    let active = ACTIVE.with(Cell::get);
    if active.is_null() { return neutral; }

    // SAFETY: the pointer was installed by a live `ActiveScope`, whose owner
    // keeps the state alive until the scope is dropped.
    let cell = unsafe { &*active };
    match cell.try_borrow_mut() {
        Ok(mut state) => f(&mut state),
        Err(_) => {
            tracing::error!("plugin callback re-entered a busy bridge; answering with a neutral value");
            neutral
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Components;
    use crate::settings::HostSettings;

    fn state() -> RefCell<BridgeState> {
        RefCell::new(BridgeState::new(Components::headless(HostSettings::default()).0))
    }

    #[test]
    fn nothing_active_yields_neutral() {
        assert_eq!(with_active(7, |_| 1), 7);
    }

    #[test]
    fn nested_scopes_restore_the_outer_bridge() {
        let (outer, inner) = (state(), state());
        outer.borrow_mut().performance_level = 1;
        inner.borrow_mut().performance_level = 2;

        let _a = ActiveScope::enter(&outer);
        assert_eq!(with_active(0, |s| s.performance_level), 1);
        {
            let _b = ActiveScope::enter(&inner);
            assert_eq!(with_active(0, |s| s.performance_level), 2);
        }
        assert_eq!(with_active(0, |s| s.performance_level), 1);
    }

    #[test]
    fn busy_bridge_is_not_reborrowed() {
        let bridge = state();
        let _scope = ActiveScope::enter(&bridge);
        let held = bridge.borrow_mut();
        assert_eq!(with_active(false, |_| true), false);
        drop(held);
        assert!(with_active(false, |_| true));
    }
}
