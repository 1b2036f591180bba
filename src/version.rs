//! Build identity of the running freshcache, logged by `freshd` at startup.
//!
//! Git fields come from `build.rs`; builds outside a checkout report
//! `unknown`.

pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const GIT_BRANCH: &str = match option_env!("VERGEN_GIT_BRANCH") {
    Some(branch) => branch,
    None => "unknown",
};

pub const GIT_SHA: &str = match option_env!("VERGEN_GIT_SHA") {
    Some(sha) => sha,
    None => "unknown",
};

/// Uncommitted changes at build time.
pub fn git_dirty() -> bool {
    matches!(option_env!("VERGEN_GIT_DIRTY"), Some("true"))
}

fn short_sha() -> &'static str {
    GIT_SHA.get(..7).unwrap_or(GIT_SHA)
}

/// `0.1.0+main.abc1234`, with `.dirty` appended for dirty trees.
pub fn version_string() -> String {
    let mut version = format!("{PKG_VERSION}+{GIT_BRANCH}.{}", short_sha());
    if git_dirty() {
        version.push_str(".dirty");
    }
    version
}
