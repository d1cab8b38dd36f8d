//! Lifecycle management for the external commands the pipeline spawns.
//!
//! A SIGTERM/SIGHUP aimed at us (a CI runner cancelling the job, a closed
//! SSH session) never reaches `aws` or `flutter` on its own. Without
//! forwarding, an `aws s3 sync --delete` keeps deleting objects after the
//! deploy was cancelled, and whatever it forked keeps running as an orphan.
//!
//! # Solution
//! - Every child runs as the leader of its own process group, so one
//!   signal reaches everything it forks
//! - Track every running group in a global registry
//! - On SIGINT/SIGTERM/SIGHUP, record the signal, SIGTERM every group, wait
//!   up to a grace period, then SIGKILL whatever is left
//! - The main thread sees the recorded signal, unwinds (dropping the policy
//!   file) and exits with `128 + signo`; the signal thread only exits itself
//!   if the main thread is stuck or a second signal arrives
//! - On Linux, children also get `PR_SET_PDEATHSIG` so they die with us even
//!   if we are SIGKILLed
//!
//! Children in their own group no longer receive the terminal's Ctrl+C
//! directly; the handler forwards it instead. Their stdin is closed, so a
//! background group never blocks on a terminal read.

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

static CHILD_REGISTRY: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

/// First termination signal received, 0 if none.
static RECEIVED_SIGNAL: AtomicI32 = AtomicI32::new(0);

/// How long children get between SIGTERM and SIGKILL.
const GRACE_PERIOD: Duration = Duration::from_secs(3);

/// How long the main thread gets to unwind before the signal thread exits.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Registry tracking running child process groups (PGID == leader PID)
#[derive(Debug, Default)]
pub struct ChildRegistry {
    pids: HashSet<u32>,
    /// Set once termination starts; later children are refused
    cleanup_initiated: bool,
}

impl ChildRegistry {
    /// Get or create the global child registry
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        CHILD_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    /// Track a freshly spawned group leader.
    ///
    /// Returns false once termination has started. The caller must then kill
    /// the child itself, since `terminate_all` has already run.
    #[must_use]
    pub fn register(&mut self, pid: u32) -> bool {
        if self.cleanup_initiated {
            tracing::debug!("Refusing to register PID {} during shutdown", pid);
            return false;
        }
        self.pids.insert(pid);
        tracing::debug!("Registered child process group {}", pid);
        true
    }

    pub fn unregister(&mut self, pid: u32) {
        self.pids.remove(&pid);
        tracing::debug!("Unregistered child process group {}", pid);
    }

    pub fn count(&self) -> usize {
        self.pids.len()
    }

    /// Terminate every tracked process group.
    /// Sends SIGTERM first, waits up to `grace_period` for the leaders, then
    /// SIGKILLs any group that still has members.
    pub fn terminate_all(&mut self, grace_period: Duration) {
        if self.cleanup_initiated {
            tracing::debug!("Cleanup already initiated, skipping");
            return;
        }
        self.cleanup_initiated = true;

        if self.pids.is_empty() {
            tracing::debug!("No child processes to terminate");
            return;
        }

        tracing::info!("Terminating {} child process group(s)...", self.pids.len());

        let groups: Vec<u32> = self.pids.iter().copied().collect();
        for &pgid in &groups {
            terminate_group(pgid, Signal::SIGTERM);
        }

        let start = Instant::now();
        while start.elapsed() < grace_period {
            if !groups.iter().any(|&pid| is_process_alive(pid)) {
                break;
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        // Leaders are gone or out of time; nothing in their groups may outlive them
        for &pgid in &groups {
            if group_exists(pgid) {
                tracing::warn!("Process group {} still has members, sending SIGKILL", pgid);
                terminate_group(pgid, Signal::SIGKILL);
            }
        }

        self.pids.clear();
        tracing::info!("Child process cleanup complete");
    }
}

/// Signal a whole process group, falling back to the leader alone.
pub fn terminate_group(pgid: u32, signal: Signal) {
    if let Err(e) = send_signal_to_group(pgid, signal) {
        tracing::debug!("Failed to send {} to process group {}: {}", signal, pgid, e);
        if let Err(e) = send_signal(pgid, signal) {
            tracing::debug!("Failed to send {} to PID {}: {}", signal, pgid, e);
        }
    }
}

fn send_signal(pid: u32, signal: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(pid as i32), signal)
}

/// Negative PID addresses every process in the group
fn send_signal_to_group(pgid: u32, signal: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(-(pgid as i32)), signal)
}

fn group_exists(pgid: u32) -> bool {
    signal::kill(Pid::from_raw(-(pgid as i32)), None).is_ok()
}

/// True if the process exists and is neither a zombie nor dead
fn is_process_alive(pid: u32) -> bool {
    if signal::kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }

    // Field 3 of /proc/<pid>/stat is the state
    if let Ok(stat) = std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        let fields: Vec<&str> = stat.split_whitespace().collect();
        if fields.len() > 2 {
            return !matches!(fields[2], "Z" | "X");
        }
    }

    // No /proc (macOS): kill(0) succeeded, assume alive
    true
}

/// Termination signal received so far, if any.
pub fn received_signal() -> Option<i32> {
    match RECEIVED_SIGNAL.load(Ordering::SeqCst) {
        0 => None,
        sig => Some(sig),
    }
}

/// Process exit status for a run ended by `sig`.
pub fn exit_status(sig: i32) -> u8 {
    u8::try_from(128 + sig).unwrap_or(u8::MAX)
}

pub fn signal_name(sig: i32) -> &'static str {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};

    match sig {
        SIGINT => "SIGINT",
        SIGTERM => "SIGTERM",
        SIGHUP => "SIGHUP",
        _ => "UNKNOWN",
    }
}

/// Install handlers for SIGINT, SIGTERM and SIGHUP.
/// Call once at program start.
pub fn init_signal_handlers() -> Result<(), std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    std::thread::spawn(move || {
        let Some(sig) = signals.forever().next() else {
            return;
        };

        tracing::warn!("Received {}, stopping deployment...", signal_name(sig));
        RECEIVED_SIGNAL.store(sig, Ordering::SeqCst);

        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.terminate_all(GRACE_PERIOD);
        }

        // The main thread normally exits first; a second signal or a stuck
        // main thread ends the process from here
        let start = Instant::now();
        while start.elapsed() < SHUTDOWN_TIMEOUT {
            if let Some(again) = signals.pending().next() {
                tracing::warn!("Received {} again, exiting now", signal_name(again));
                break;
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        std::process::exit(i32::from(exit_status(sig)));
    });

    Ok(())
}

/// Extension trait for std::process::Command to set up process groups
pub trait CommandProcessGroup {
    /// Make the child the leader of a new process group and, on Linux, ask
    /// the kernel to SIGTERM it when this process dies
    fn in_new_process_group(&mut self) -> &mut Self;
}

impl CommandProcessGroup for std::process::Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;

        // SAFETY: setpgid and prctl are async-signal-safe and touch no parent state
        unsafe {
            self.pre_exec(|| {
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))
                    .map_err(std::io::Error::from)?;

                #[cfg(target_os = "linux")]
                {
                    use nix::libc;
                    if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) == -1 {
                        return Err(std::io::Error::last_os_error());
                    }
                }

                Ok(())
            });
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::process::{Command, Stdio};

    /// Reap `pid` if it is our child, then report whether it is gone
    fn wait_for_process_death(pid: u32, timeout: Duration) -> bool {
        use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};

        let start = Instant::now();
        let nix_pid = Pid::from_raw(pid as i32);

        while start.elapsed() < timeout {
            match waitpid(nix_pid, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(_, _)) | Ok(WaitStatus::Signaled(_, _, _)) => return true,
                Ok(WaitStatus::StillAlive) => {}
                Err(nix::errno::Errno::ECHILD) => {
                    if !is_process_alive(pid) {
                        return true;
                    }
                }
                _ => {}
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_registry_register_unregister() {
        let mut registry = ChildRegistry::default();

        assert!(registry.register(1234));
        assert!(registry.register(5678));
        assert_eq!(registry.count(), 2);

        registry.unregister(1234);
        assert_eq!(registry.count(), 1);

        registry.unregister(5678);
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_register_refused_after_cleanup() {
        let mut registry = ChildRegistry::default();
        registry.terminate_all(Duration::from_millis(10));

        assert!(!registry.register(4321));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_terminate_all_kills_real_process() {
        let child = Command::new("sleep")
            .arg("60")
            .in_new_process_group()
            .spawn()
            .expect("Failed to spawn sleep");
        let pid = child.id();

        let mut registry = ChildRegistry::default();
        assert!(registry.register(pid));
        assert!(is_process_alive(pid));

        registry.terminate_all(Duration::from_millis(500));

        assert!(
            wait_for_process_death(pid, Duration::from_secs(2)),
            "Process should be dead after terminate_all"
        );
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn test_terminate_all_reaches_grandchildren() {
        let mut child = Command::new("sh")
            .args(["-c", "sleep 60 & echo $!; wait"])
            .stdout(Stdio::piped())
            .in_new_process_group()
            .spawn()
            .expect("Failed to spawn sh");

        let mut line = String::new();
        let stdout = child.stdout.take().expect("piped stdout");
        BufReader::new(stdout)
            .read_line(&mut line)
            .expect("read grandchild PID");
        let grandchild: u32 = line.trim().parse().expect("numeric PID");
        assert!(is_process_alive(grandchild));

        let mut registry = ChildRegistry::default();
        assert!(registry.register(child.id()));
        registry.terminate_all(Duration::from_millis(500));
        let _ = child.wait();

        assert!(
            wait_for_process_death(grandchild, Duration::from_secs(2)),
            "sleep forked by the child must not outlive it"
        );
    }

    #[test]
    fn test_child_leads_its_own_group() {
        let mut child = Command::new("sleep")
            .arg("60")
            .in_new_process_group()
            .spawn()
            .expect("Failed to spawn sleep");
        let pid = Pid::from_raw(child.id() as i32);

        let pgid = nix::unistd::getpgid(Some(pid)).expect("getpgid");
        assert_eq!(pgid, pid);
        assert_ne!(pgid, nix::unistd::getpgrp());

        terminate_group(child.id(), Signal::SIGKILL);
        let _ = child.wait();
    }

    #[test]
    fn test_terminate_all_handles_already_dead_process() {
        let mut child = Command::new("true").spawn().expect("Failed to spawn true");
        let pid = child.id();
        let _ = child.wait();

        let mut registry = ChildRegistry::default();
        assert!(registry.register(pid));

        // No panic = success
        registry.terminate_all(Duration::from_millis(100));
    }

    #[test]
    fn test_cleanup_initiated_flag_prevents_double_cleanup() {
        let mut registry = ChildRegistry::default();
        assert!(registry.register(999_999));

        registry.terminate_all(Duration::from_millis(10));
        assert!(registry.cleanup_initiated);

        registry.terminate_all(Duration::from_millis(10));
        assert!(registry.cleanup_initiated);
    }

    #[test]
    fn test_exit_status_is_128_plus_signal() {
        assert_eq!(exit_status(Signal::SIGINT as i32), 130);
        assert_eq!(exit_status(Signal::SIGTERM as i32), 143);
        assert_eq!(exit_status(Signal::SIGHUP as i32), 129);
        assert_eq!(signal_name(Signal::SIGTERM as i32), "SIGTERM");
    }

    #[test]
    fn test_is_process_alive_nonexistent() {
        assert!(!is_process_alive(999_999));
    }
}
