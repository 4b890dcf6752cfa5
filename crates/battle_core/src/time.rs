//! Simulated time.
//!
//! The battle advances in fixed time steps. Durations are authored in
//! milliseconds and converted to whole time steps where the tick driver
//! needs them.

/// Time steps per simulated second.
pub const TIME_STEPS_PER_SECOND: i32 = 10;

/// Milliseconds covered by one time step.
pub const MS_PER_TIME_STEP: i32 = 1000 / TIME_STEPS_PER_SECOND;

/// Marker for a duration that never expires.
pub const TIME_INFINITE: i32 = -1;

/// Whole time steps in `ms`, rounded down. [`TIME_INFINITE`] passes through.
#[must_use]
pub const fn ms_to_time_steps(ms: i32) -> i32 {
    if ms == TIME_INFINITE {
        return TIME_INFINITE;
    }
    ms / MS_PER_TIME_STEP
}

/// Milliseconds in `time_steps`. [`TIME_INFINITE`] passes through.
#[must_use]
pub const fn time_steps_to_ms(time_steps: i32) -> i32 {
    if time_steps == TIME_INFINITE {
        return TIME_INFINITE;
    }
    time_steps * MS_PER_TIME_STEP
}

/// Round `ms` down to a multiple of [`MS_PER_TIME_STEP`]. [`TIME_INFINITE`] passes through.
#[must_use]
pub const fn truncate_to_time_step(ms: i32) -> i32 {
    if ms == TIME_INFINITE {
        return TIME_INFINITE;
    }
    time_steps_to_ms(ms_to_time_steps(ms))
}
