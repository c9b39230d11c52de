// OS-level process suspension and scheduling priority
//
// Pausing is not cooperative: the engine is stopped from the outside. On unix
// that is a process-wide SIGSTOP/SIGCONT pair; on Windows it is a per-thread
// suspend over a Toolhelp snapshot. Both are best-effort and inherently racy:
// threads the child spawns after the snapshot are unaffected, and a thread
// that cannot be opened is silently skipped. Callers get no stronger contract.

use anyhow::Result;

/// OS scheduling priority classes for the engine process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PriorityClass {
    Idle,
    BelowNormal,
    #[default]
    Normal,
    AboveNormal,
    High,
    RealTime,
}

impl PriorityClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::BelowNormal => "below-normal",
            Self::Normal => "normal",
            Self::AboveNormal => "above-normal",
            Self::High => "high",
            Self::RealTime => "real-time",
        }
    }

    /// Unix nice value for this class. Raising priority (negative nice)
    /// requires privileges; failures are treated as best-effort by callers.
    #[cfg(unix)]
    fn nice_value(&self) -> i32 {
        match self {
            Self::Idle => 19,
            Self::BelowNormal => 10,
            Self::Normal => 0,
            Self::AboveNormal => -5,
            Self::High => -10,
            Self::RealTime => -15,
        }
    }

    #[cfg(windows)]
    fn windows_class(&self) -> u32 {
        use windows_sys::Win32::System::Threading::{
            ABOVE_NORMAL_PRIORITY_CLASS, BELOW_NORMAL_PRIORITY_CLASS, HIGH_PRIORITY_CLASS,
            IDLE_PRIORITY_CLASS, NORMAL_PRIORITY_CLASS, REALTIME_PRIORITY_CLASS,
        };
        match self {
            Self::Idle => IDLE_PRIORITY_CLASS,
            Self::BelowNormal => BELOW_NORMAL_PRIORITY_CLASS,
            Self::Normal => NORMAL_PRIORITY_CLASS,
            Self::AboveNormal => ABOVE_NORMAL_PRIORITY_CLASS,
            Self::High => HIGH_PRIORITY_CLASS,
            Self::RealTime => REALTIME_PRIORITY_CLASS,
        }
    }
}

#[cfg(unix)]
mod imp {
    use super::PriorityClass;
    use anyhow::{Result, bail};

    fn send_signal(pid: u32, signal: libc::c_int) -> Result<()> {
        // SAFETY: kill with a valid signal number; the pid came from a child
        // we spawned.
        let rc = unsafe { libc::kill(pid as libc::pid_t, signal) };
        if rc != 0 {
            bail!(
                "signal {signal} to pid {pid} failed: {}",
                std::io::Error::last_os_error()
            );
        }
        Ok(())
    }

    /// SIGSTOP halts every thread of the process at once. Stacked calls are
    /// idempotent; a single SIGCONT reverses any number of them.
    pub fn suspend_process(pid: u32) -> Result<()> {
        send_signal(pid, libc::SIGSTOP)
    }

    pub fn resume_process(pid: u32) -> Result<()> {
        send_signal(pid, libc::SIGCONT)
    }

    pub fn set_priority(pid: u32, class: PriorityClass) -> Result<()> {
        // SAFETY: setpriority on a process id we own.
        let rc = unsafe {
            libc::setpriority(libc::PRIO_PROCESS as _, pid as libc::id_t, class.nice_value())
        };
        if rc != 0 {
            bail!(
                "setpriority({pid}, {}) failed: {}",
                class.as_str(),
                std::io::Error::last_os_error()
            );
        }
        Ok(())
    }
}

#[cfg(windows)]
mod imp {
    use super::PriorityClass;
    use anyhow::{Result, bail};
    use windows_sys::Win32::Foundation::{CloseHandle, INVALID_HANDLE_VALUE};
    use windows_sys::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, TH32CS_SNAPTHREAD, THREADENTRY32, Thread32First, Thread32Next,
    };
    use windows_sys::Win32::System::Threading::{
        OpenProcess, OpenThread, PROCESS_SET_INFORMATION, ResumeThread, SetPriorityClass,
        SuspendThread, THREAD_SUSPEND_RESUME,
    };

    enum ThreadOp {
        Suspend,
        Resume,
    }

    /// Walk a snapshot of the process's threads and suspend or resume each.
    /// Threads we cannot open are skipped; threads created after the snapshot
    /// are not covered.
    fn for_each_thread(pid: u32, op: ThreadOp) -> Result<()> {
        // SAFETY: Toolhelp snapshot API with a properly sized THREADENTRY32.
        unsafe {
            let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPTHREAD, 0);
            if snapshot == INVALID_HANDLE_VALUE {
                bail!("thread snapshot failed: {}", std::io::Error::last_os_error());
            }

            let mut entry: THREADENTRY32 = std::mem::zeroed();
            entry.dwSize = std::mem::size_of::<THREADENTRY32>() as u32;

            let mut ok = Thread32First(snapshot, &mut entry);
            while ok != 0 {
                if entry.th32OwnerProcessID == pid {
                    let thread = OpenThread(THREAD_SUSPEND_RESUME, 0, entry.th32ThreadID);
                    if !thread.is_null() {
                        match op {
                            ThreadOp::Suspend => {
                                SuspendThread(thread);
                            }
                            ThreadOp::Resume => {
                                // ResumeThread returns the previous suspend
                                // count; counts can stack past one, so drain
                                // until the thread is actually runnable.
                                loop {
                                    let previous = ResumeThread(thread);
                                    if previous == u32::MAX || previous <= 1 {
                                        break;
                                    }
                                }
                            }
                        }
                        CloseHandle(thread);
                    }
                }
                ok = Thread32Next(snapshot, &mut entry);
            }

            CloseHandle(snapshot);
        }
        Ok(())
    }

    pub fn suspend_process(pid: u32) -> Result<()> {
        for_each_thread(pid, ThreadOp::Suspend)
    }

    pub fn resume_process(pid: u32) -> Result<()> {
        for_each_thread(pid, ThreadOp::Resume)
    }

    pub fn set_priority(pid: u32, class: PriorityClass) -> Result<()> {
        // SAFETY: open our own child for priority change only.
        unsafe {
            let process = OpenProcess(PROCESS_SET_INFORMATION, 0, pid);
            if process.is_null() {
                bail!("OpenProcess({pid}) failed: {}", std::io::Error::last_os_error());
            }
            let rc = SetPriorityClass(process, class.windows_class());
            CloseHandle(process);
            if rc == 0 {
                bail!(
                    "SetPriorityClass({pid}, {}) failed: {}",
                    class.as_str(),
                    std::io::Error::last_os_error()
                );
            }
        }
        Ok(())
    }
}

/// Suspend every thread of the child process. Best-effort.
pub fn suspend_process(pid: u32) -> Result<()> {
    imp::suspend_process(pid)
}

/// Resume the child process, draining any stacked suspend counts.
pub fn resume_process(pid: u32) -> Result<()> {
    imp::resume_process(pid)
}

/// Change the child's scheduling priority class. Best-effort.
pub fn set_priority(pid: u32, class: PriorityClass) -> Result<()> {
    imp::set_priority(pid, class)
}
