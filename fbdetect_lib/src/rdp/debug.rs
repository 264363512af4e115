//! Debugging helpers

/// A macro that expands to a call to `log::debug!` when the feature "fb_verbose" is enabled,
/// otherwise does nothing.
#[macro_export]
macro_rules! fb_debug {
  ($($arg:tt)+) => (if cfg!(feature = "fb_verbose") { ::log::debug!($($arg)+)})
}
