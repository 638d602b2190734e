//! Version information for Metapod binaries

/// Current version, baked in by build.rs
pub const VERSION: &str = env!("METAPOD_VERSION");

/// Build timestamp (set at compile time)
pub const BUILD_TIME: Option<&str> = option_env!("BUILD_TIME");

/// Git commit hash (set at compile time)
pub const GIT_COMMIT: Option<&str> = option_env!("GIT_COMMIT");

/// Version line printed by `--version`
pub fn full_version() -> String {
    describe(VERSION, GIT_COMMIT, BUILD_TIME)
}

fn describe(version: &str, commit: Option<&str>, built: Option<&str>) -> String {
    let mut line = version.to_string();
    if let Some(commit) = commit {
        line.push_str(&format!(" ({})", commit.get(..8).unwrap_or(commit)));
    }
    if let Some(time) = built {
        line.push_str(&format!(" built {time}"));
    }
    line
}
