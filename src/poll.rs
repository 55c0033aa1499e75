//! Busy-wait primitive with an injectable bound.

/// How long a status poll may spin before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PollBound {
    /// Spin until the condition holds, however long that takes. This matches
    /// the hardware, which has no timeout of its own.
    #[default]
    Unbounded,
    /// Evaluate the condition at most this many times.
    Iterations(u32),
}

/// A bounded poll ran out of iterations before its condition held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timeout;

impl core::fmt::Display for Timeout {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("peripheral did not become ready")
    }
}

impl core::error::Error for Timeout {}

/// Spin on `ready` until it returns `true` or `bound` is exhausted.
///
/// There is no yield point; this is meant for single-core bring-up code
/// without a scheduler.
///
/// # Errors
/// Returns [`Timeout`] if `bound` is [`PollBound::Iterations`] and the
/// condition was still false after that many evaluations.
pub fn poll_until<F>(bound: PollBound, mut ready: F) -> Result<(), Timeout>
where
    F: FnMut() -> bool,
{
    match bound {
        PollBound::Unbounded => loop {
            if ready() {
                return Ok(());
            }
            core::hint::spin_loop();
        },
        PollBound::Iterations(limit) => {
            for _ in 0..limit {
                if ready() {
                    return Ok(());
                }
                core::hint::spin_loop();
            }
            Err(Timeout)
        }
    }
}
