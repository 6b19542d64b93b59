use std::fmt::Write;

/// The current version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Version string with build metadata when available.
#[must_use]
pub fn version_string() -> String {
    describe(option_env!("ESM_REWRITE_GIT_HASH"))
}

fn describe(git_hash: Option<&str>) -> String {
    let mut s = format!("esm-rewrite {VERSION}");
    if let Some(hash) = git_hash.map(str::trim).filter(|h| !h.is_empty()) {
        let _ = write!(s, " ({hash})");
    }
    s
}
