//! Post-resume hooks for objects stored in reattached regions.
//!
//! When a pool is resumed from a region written earlier, every live object
//! gets one [`ResumeHook::on_resume`] call in chain order before the pool is
//! handed back. Objects use it to rebuild process-local state (caches,
//! derived fields). A failing hook is handled according to [`ResumePolicy`].
//!
//! | Policy    | Failing object | `resume` result                |
//! |-----------|----------------|--------------------------------|
//! | `Ignore`  | kept           | `Ok`                           |
//! | `Log`     | kept           | `Ok`, one `warn!` per failure  |
//! | `Discard` | removed        | `Ok`                           |
//! | `Abort`   | kept           | `Err(ResumeError::HookFailed)` |

use tracing::{debug, warn};

use crate::ds::FreeList;
use crate::error::ResumeError;
use crate::store::traits::SlotStorage;

/// Callback run on every live object after its region is resumed.
pub trait ResumeHook {
    /// Called once per object; `Err(code)` reports a failure status.
    fn on_resume(&mut self) -> Result<(), i32> {
        Ok(())
    }
}

macro_rules! impl_noop_hook {
    ($($ty:ty),* $(,)?) => {
        $(impl ResumeHook for $ty {})*
    };
}

impl_noop_hook!(
    (),
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    f32,
    f64,
);

impl<T, const N: usize> ResumeHook for [T; N] {}

/// What to do when a [`ResumeHook`] fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResumePolicy {
    /// Keep the object and carry on silently.
    Ignore,
    /// Keep the object and emit a warning.
    #[default]
    Log,
    /// Remove the object from the pool.
    Discard,
    /// Stop and return [`ResumeError::HookFailed`].
    Abort,
}

/// Counts gathered while replaying hooks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ResumeStats {
    pub(crate) resumed: usize,
    pub(crate) failed: usize,
    pub(crate) discarded: usize,
}

/// Runs `hook` over every live entry of `list` in chain order.
///
/// `keep` is called for every entry that stays in the list (after its hook
/// ran); an error from it stops the replay.
pub(crate) fn replay<E, S>(
    list: &mut FreeList<E, S>,
    policy: ResumePolicy,
    mut hook: impl FnMut(&mut E) -> Result<(), i32>,
    mut keep: impl FnMut(usize, &E) -> Result<(), ResumeError>,
) -> Result<ResumeStats, ResumeError>
where
    S: SlotStorage<E>,
{
    let ids: Vec<usize> = list.indices().collect();
    let mut stats = ResumeStats::default();

    for id in ids {
        let Some(entry) = list.get_mut(id) else {
            continue;
        };
        stats.resumed += 1;
        if let Err(code) = hook(entry) {
            stats.failed += 1;
            match policy {
                ResumePolicy::Ignore => {}
                ResumePolicy::Log => warn!(id, code, "resume hook failed"),
                ResumePolicy::Discard => {
                    warn!(id, code, "resume hook failed; discarding object");
                    list.remove(id);
                    stats.discarded += 1;
                    continue;
                }
                ResumePolicy::Abort => return Err(ResumeError::HookFailed { id, code }),
            }
        }
        if let Some(entry) = list.get(id) {
            keep(id, entry)?;
        }
    }

    debug!(
        resumed = stats.resumed,
        failed = stats.failed,
        discarded = stats.discarded,
        ?policy,
        "replayed resume hooks"
    );
    Ok(stats)
}
