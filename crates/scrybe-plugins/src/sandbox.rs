//! Subprocess sandboxing for plugin processes (§4.4 "launched under a
//! restricted execution environment: sanitized env, pinned caches, no
//! ambient network"). Grounded on the teacher's `exec::sandbox`
//! platform hardening, scaled to what a plugin child actually needs:
//! `no_new_privs` on Linux plus a minimal, explicit environment.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Stdio;

use scrybe_types::ScrybeError;
use tokio::process::Command;

/// Build a `Command` for a plugin artifact with a sanitized environment:
/// no inherited variables except an explicit allow-list, stdio wired for
/// the length-prefixed RPC protocol, and a pinned working directory.
pub fn sandboxed_command(artifact_path: &Path, cache_dir: &Path, extra_env: &BTreeMap<String, String>) -> Command {
    let mut cmd = Command::new(artifact_path);
    cmd.env_clear();
    cmd.env("HOME", cache_dir);
    cmd.env("TMPDIR", cache_dir);
    cmd.env("PATH", "/usr/bin:/bin");
    for (k, v) in extra_env {
        cmd.env(k, v);
    }
    cmd.current_dir(cache_dir);
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    #[cfg(target_os = "linux")]
    {
        // SAFETY: pre_exec runs in the forked child between fork and
        // exec; prctl is async-signal-safe (matches `exec::sandbox`'s
        // `apply_linux`, scoped here to no-new-privs only).
        unsafe {
            cmd.pre_exec(|| {
                const PR_SET_NO_NEW_PRIVS: libc::c_int = 38;
                if libc::prctl(PR_SET_NO_NEW_PRIVS, 1, 0, 0, 0) != 0 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
    }

    cmd
}

/// Ensure the plugin's pinned cache directory exists before spawn.
pub fn prepare_cache_dir(cache_dir: &Path) -> Result<(), ScrybeError> {
    std::fs::create_dir_all(cache_dir)
        .map_err(|e| ScrybeError::DependencyUnavailable(format!("creating plugin cache dir: {e}")))
}

#[cfg(target_os = "linux")]
use std::os::unix::process::CommandExt;
