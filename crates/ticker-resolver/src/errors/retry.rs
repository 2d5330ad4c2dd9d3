/// Classification for retry policy.
///
/// Used to determine how the directory router should respond to errors from
/// directory sources.
///
/// # Behavior Summary
///
/// | Class | Try Next Source? | Pause First? |
/// |-------|------------------|--------------|
/// | `Never` | No | No |
/// | `FailoverWithPause` | Yes | Yes (configured failover pause) |
/// | `NextSource` | Yes | No |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Never retry - the failure is terminal.
    /// No other source can answer the request either.
    Never,

    /// Failover to the next source after the configured pause.
    ///
    /// Used for transient errors like rate limiting (429) or timeout where
    /// hammering the next endpoint immediately tends to trip the same
    /// throttling. The router sleeps for its failover pause before moving on.
    FailoverWithPause,

    /// Try the next source immediately.
    ///
    /// Used when this source can't serve the request (bad payload, missing
    /// file, implausibly small snapshot) but another source might succeed.
    NextSource,
}
