//! Cross-platform console symbols

#[cfg(windows)]
pub const CHECK: &str = "[OK]";
#[cfg(not(windows))]
pub const CHECK: &str = "\u{2713}";

#[cfg(windows)]
pub const WARN: &str = "[!]";
#[cfg(not(windows))]
pub const WARN: &str = "!";

#[cfg(windows)]
pub const LOCK: &str = "[L]";
#[cfg(not(windows))]
pub const LOCK: &str = "\u{1F512}";
