use tokio::process::Command;

/// Environment variables every agent process receives.
const BASE_ENV_VARS: &[&str] = &[
    "PATH",
    "HOME",
    "USER",
    "LANG",
    "LC_ALL",
    "TZ",
    "TERM",
    "TMPDIR",
    "XDG_RUNTIME_DIR",
];

/// Create a `Command` for an agent process with a scrubbed environment.
///
/// Only the base variables plus the names in `passthrough` are copied from
/// the current process, so backend tokens (Slack, Google) never reach the
/// agent. Agents that need their own API key list it in `passthrough`.
pub fn agent_command(program: &str, passthrough: &[String]) -> Command {
    let mut cmd = Command::new(program);
    cmd.env_clear();
    let names = BASE_ENV_VARS
        .iter()
        .copied()
        .chain(passthrough.iter().map(String::as_str));
    for var in names {
        if let Ok(val) = std::env::var(var) {
            cmd.env(var, val);
        }
    }
    cmd.kill_on_drop(true);
    cmd
}
