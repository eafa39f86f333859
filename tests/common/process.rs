//! Process inspection through /proc

use std::fs;
use std::thread;
use std::time::{Duration, Instant};

/// Whether `pid` is still running. Zombies count as gone.
pub fn process_alive(pid: u32) -> bool {
    let Ok(stat) = fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return false;
    };
    // The state follows the parenthesised command name
    let state = stat.rsplit_once(')').map(|(_, rest)| rest.trim_start());
    !matches!(state, Some(rest) if rest.starts_with('Z') || rest.starts_with('X'))
}

/// Waits up to `limit` for `pid` to exit.
pub fn wait_for_exit(pid: u32, limit: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < limit {
        if !process_alive(pid) {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    !process_alive(pid)
}
