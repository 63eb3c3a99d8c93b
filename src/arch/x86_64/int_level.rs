/*
 * Interrupt Level Control
 *
 * Raising the interrupt level masks the periodic timer (and every other
 * maskable interrupt), which on a uniprocessor is all the mutual exclusion
 * the scheduler needs: no preempt can land while the level is elevated.
 *
 * Elevations stack. N elevations followed by N recoveries in reverse order
 * restore the original level, because each `SavedLevel` records only the
 * state found at its own elevation.
 */

use x86_64::instructions::interrupts;

/// Prior interrupt-masking state returned by [`elevate`].
#[derive(Debug, Clone, Copy)]
pub struct SavedLevel {
    enabled: bool,
}

/// Mask maskable interrupts and report the level that was in force.
///
/// # Returns
///
/// The prior level, to be handed back to [`recover`].
pub fn elevate() -> SavedLevel {
    let enabled = interrupts::are_enabled();
    if enabled {
        interrupts::disable();
    }
    SavedLevel { enabled }
}

/// Restore the level returned by the matching [`elevate`].
///
/// # Arguments
///
/// * `level` - The saved level from the matching elevation.
pub fn recover(level: SavedLevel) {
    if level.enabled {
        interrupts::enable();
    }
}

/// RAII elevation: the level is raised on creation and recovered on drop,
/// even if the critical section panics.
///
/// # Example
/// ```
/// let _guard = IntLevelGuard::new();
/// // Critical section - the timer cannot preempt here
/// // The prior level is recovered when _guard is dropped
/// ```
pub struct IntLevelGuard {
    saved: SavedLevel,
}

impl IntLevelGuard {
    pub fn new() -> Self {
        Self { saved: elevate() }
    }
}

impl Default for IntLevelGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IntLevelGuard {
    fn drop(&mut self) {
        recover(self.saved);
    }
}
