use crate::panel::platform::HostOs;
use crate::panel::procs::ProcessDescriptor;

/// Kernel and OS-critical process names on Linux/macOS hosts.
pub const POSIX_DENYLIST: &[&str] = &[
    "systemd",
    "kthreadd",
    "rcu_gp",
    "rcu_par_gp",
    "kworker",
    "ksoftirqd",
    "migration",
    "watchdog",
    "cpuhp",
    "init",
    "launchd",
    "kernel_task",
    "WindowServer",
    "loginwindow",
];

/// Kernel threads show up as `kworker/0:1H` etc.
pub const POSIX_KERNEL_WORKER_PREFIX: &str = "kworker";

/// Pids at or below this are never offered (pid 1 is init).
pub const POSIX_PID_FLOOR: i64 = 1;

pub const WINDOWS_DENYLIST: &[&str] = &[
    "system idle process",
    "system",
    "registry",
    "smss.exe",
    "csrss.exe",
    "wininit.exe",
    "services.exe",
    "lsass.exe",
    "svchost.exe",
    "dwm.exe",
    "fontdrvhost.exe",
    "winlogon.exe",
    "lsaiso.exe",
    "sgrmbroker.exe",
    "memory compression",
    "ntoskrnl.exe",
    "secure system",
    "spoolsv.exe",
    "searchindexer.exe",
    "msdtc.exe",
    "dllhost.exe",
    "wudfhost.exe",
    "dashost.exe",
    "sihost.exe",
    "ctfmon.exe",
    "conhost.exe",
    "runtimebroker.exe",
    "systemidleprocess",
];

/// Pids 0 (idle) and 4 (System) are kernel-owned on Windows.
pub const WINDOWS_PID_FLOOR: i64 = 4;

fn denied(list: &[&str], name: &str) -> bool {
    list.iter().any(|d| d.eq_ignore_ascii_case(name))
}

pub fn keep_posix(proc: &ProcessDescriptor) -> bool {
    let name = proc.name.to_ascii_lowercase();
    proc.pid > POSIX_PID_FLOOR
        && !denied(POSIX_DENYLIST, &name)
        && !name.starts_with(POSIX_KERNEL_WORKER_PREFIX)
}

pub fn keep_windows(proc: &ProcessDescriptor) -> bool {
    proc.pid > WINDOWS_PID_FLOOR && !denied(WINDOWS_DENYLIST, &proc.name)
}

/// Whether `proc` may be offered to operators for management on `os`.
pub fn keep(os: HostOs, proc: &ProcessDescriptor) -> bool {
    if os.is_windows() {
        keep_windows(proc)
    } else {
        keep_posix(proc)
    }
}
