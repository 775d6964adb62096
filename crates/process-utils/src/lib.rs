//! Small process-related helpers shared across the workspace.
//!
//! Besides the Windows console-window suppression, this crate owns the
//! platform-specific part of supervising a transcoder: spawning a child at the
//! head of its own process group and signalling that whole group later.

use std::io;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

#[cfg(windows)]
const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;

/// Apply the Windows `CREATE_NO_WINDOW` flag to child processes.
///
/// On non-Windows targets this is a no-op.
pub trait NoWindowExt {
    fn no_window(&mut self);
}

/// Start the child as the leader of a fresh process group.
///
/// The group id equals the child's pid, which is what [`signal_group`]
/// expects. On Windows the child gets `CREATE_NEW_PROCESS_GROUP` (plus
/// `CREATE_NO_WINDOW`, since the flags are set in one call).
pub trait ProcessGroupExt {
    fn new_process_group(&mut self) -> &mut Self;
}

impl ProcessGroupExt for std::process::Command {
    fn new_process_group(&mut self) -> &mut Self {
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            self.process_group(0);
        }
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.creation_flags(CREATE_NO_WINDOW | CREATE_NEW_PROCESS_GROUP);
        }
        self
    }
}

#[cfg(feature = "tokio")]
impl NoWindowExt for tokio::process::Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }
    }
}

#[cfg(feature = "tokio")]
impl ProcessGroupExt for tokio::process::Command {
    fn new_process_group(&mut self) -> &mut Self {
        self.as_std_mut().new_process_group();
        self
    }
}

/// Create a `tokio::process::Command` with `CREATE_NO_WINDOW` applied on Windows.
#[cfg(feature = "tokio")]
pub fn tokio_command(program: impl AsRef<std::ffi::OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    cmd.no_window();
    cmd
}

/// Signals that can be delivered to a whole process group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSignal {
    /// Ask every member to exit (`SIGTERM`).
    Terminate,
    /// Unconditionally kill every member (`SIGKILL`).
    Kill,
}

impl std::fmt::Display for GroupSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Terminate => f.write_str("SIGTERM"),
            Self::Kill => f.write_str("SIGKILL"),
        }
    }
}

/// Deliver `signal` to every process in the group led by `pgid`.
///
/// A `pgid` of 0 is rejected: `killpg(0, ..)` would target the caller's own
/// group. Platforms without process groups return [`io::ErrorKind::Unsupported`]
/// so callers can fall back to killing the child directly.
pub fn signal_group(pgid: u32, signal: GroupSignal) -> io::Result<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::Signal;

        let sig = match signal {
            GroupSignal::Terminate => Signal::SIGTERM,
            GroupSignal::Kill => Signal::SIGKILL,
        };
        send_to_group(pgid, Some(sig))
    }

    #[cfg(not(unix))]
    {
        let _ = (pgid, signal);
        Err(unsupported())
    }
}

/// Whether the group led by `pgid` still has at least one member.
///
/// Uses the null signal, so nothing is delivered. Once the leader has been
/// reaped this is the only way to notice children that outlived it.
pub fn group_exists(pgid: u32) -> io::Result<bool> {
    #[cfg(unix)]
    {
        match send_to_group(pgid, None) {
            Ok(()) => Ok(true),
            Err(e) if is_group_gone(&e) => Ok(false),
            Err(e) if e.raw_os_error() == Some(nix::errno::Errno::EPERM as i32) => Ok(true),
            Err(e) => Err(e),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = pgid;
        Err(unsupported())
    }
}

#[cfg(unix)]
fn send_to_group(pgid: u32, signal: Option<nix::sys::signal::Signal>) -> io::Result<()> {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    if pgid == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "refusing to signal process group 0",
        ));
    }
    let pgid = i32::try_from(pgid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pgid out of range"))?;
    killpg(Pid::from_raw(pgid), signal).map_err(io::Error::from)
}

#[cfg(not(unix))]
fn unsupported() -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        "process group signals are not supported on this platform",
    )
}

/// Send `SIGTERM` to the group.
pub fn terminate_group(pgid: u32) -> io::Result<()> {
    signal_group(pgid, GroupSignal::Terminate)
}

/// Send `SIGKILL` to the group.
pub fn kill_group(pgid: u32) -> io::Result<()> {
    signal_group(pgid, GroupSignal::Kill)
}

/// Whether `err` means the group no longer has any members.
pub fn is_group_gone(err: &io::Error) -> bool {
    #[cfg(unix)]
    {
        err.raw_os_error() == Some(nix::errno::Errno::ESRCH as i32)
    }
    #[cfg(not(unix))]
    {
        let _ = err;
        false
    }
}

#[cfg(all(test, unix, feature = "tokio"))]
mod tests {
    use super::*;
    use std::process::Stdio;
    use std::time::Duration;

    #[test]
    fn test_group_zero_is_rejected() {
        let err = signal_group(0, GroupSignal::Kill).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_signal_display() {
        assert_eq!(GroupSignal::Terminate.to_string(), "SIGTERM");
        assert_eq!(GroupSignal::Kill.to_string(), "SIGKILL");
    }

    #[tokio::test]
    async fn test_terminate_group_stops_child() {
        let mut child = tokio_command("sleep")
            .arg("30")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .new_process_group()
            .spawn()
            .unwrap();
        let pgid = child.id().unwrap();

        terminate_group(pgid).unwrap();

        let status = tokio::time::timeout(Duration::from_secs(5), child.wait())
            .await
            .expect("child did not exit after SIGTERM")
            .unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn test_group_exists_tracks_members() {
        let mut child = tokio_command("sleep")
            .arg("30")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .new_process_group()
            .spawn()
            .unwrap();
        let pgid = child.id().unwrap();
        assert!(group_exists(pgid).unwrap());

        kill_group(pgid).unwrap();
        tokio::time::timeout(Duration::from_secs(5), child.wait())
            .await
            .expect("child did not exit after SIGKILL")
            .unwrap();

        assert!(!group_exists(pgid).unwrap());
        assert!(is_group_gone(&kill_group(pgid).unwrap_err()));
    }
}
