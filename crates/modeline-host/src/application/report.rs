//! Operator-facing reporting of repeating anomalies.
//!
//! Some conditions recur on every call once they happen (a headless server
//! that lists no sizes, a second output appearing).  The operator should hear
//! about each of them once; afterwards they only belong in debug logs.
//!
//! Remembering which keys were already surfaced is the reporter's job, not
//! the resize subsystem's: the subsystem just calls
//! [`Reporter::report_once`] every time.  `TracingReporter` in the
//! infrastructure layer is the production implementation.

/// Well-known keys passed to [`Reporter::report_once`].
pub mod keys {
    /// RandR missing, too old, or listing no sizes.
    pub const RANDR_UNUSABLE: &str = "randr-unusable";
    /// The static size list is empty; root dimensions are used instead.
    pub const NO_STATIC_SIZES: &str = "no-static-sizes";
    /// More than one output; synthesized modes stay unattached.
    pub const MULTIPLE_OUTPUTS: &str = "multiple-outputs";
    /// No output at all; synthesized modes stay unattached.
    pub const NO_OUTPUT: &str = "no-output";
}

/// Surfaces a message to the operator the first time `key` is seen.
#[cfg_attr(test, mockall::automock)]
pub trait Reporter {
    /// Reports `message` prominently if `key` has not been reported before,
    /// and at low severity otherwise.
    fn report_once(&self, key: &str, message: &str);
}
