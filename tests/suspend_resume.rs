// OS-level pause/resume against a real child process (unix only)

#![cfg(unix)]

use ffremux::engine::os::{resume_process, suspend_process};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

#[cfg(target_os = "linux")]
fn process_state(pid: u32) -> char {
    // Third field of /proc/<pid>/stat, after the parenthesized comm.
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).unwrap();
    let after_comm = stat.rsplit(')').next().unwrap();
    after_comm
        .split_whitespace()
        .next()
        .unwrap()
        .chars()
        .next()
        .unwrap()
}

#[cfg(target_os = "linux")]
#[test]
fn resume_reverses_stacked_pauses() {
    let mut child = Command::new("sleep")
        .arg("30")
        .stdout(Stdio::null())
        .spawn()
        .expect("spawn sleep");
    let pid = child.id();

    // Stacked suspensions; SIGSTOP is idempotent at the process level.
    suspend_process(pid).unwrap();
    suspend_process(pid).unwrap();
    suspend_process(pid).unwrap();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(process_state(pid), 'T', "process should be stopped");

    // A single resume must bring the process back to runnable.
    resume_process(pid).unwrap();
    thread::sleep(Duration::from_millis(50));
    assert_ne!(process_state(pid), 'T', "process should be running again");

    child.kill().unwrap();
    child.wait().unwrap();
}

#[test]
fn resume_without_pause_is_harmless() {
    let mut child = Command::new("sleep")
        .arg("5")
        .stdout(Stdio::null())
        .spawn()
        .expect("spawn sleep");

    resume_process(child.id()).unwrap();

    child.kill().unwrap();
    child.wait().unwrap();
}
