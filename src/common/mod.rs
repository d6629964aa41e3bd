pub mod io;

/// Reset SIGPIPE to default behavior (SIG_DFL) for GNU-style pipe semantics.
/// Rust sets SIGPIPE to SIG_IGN by default, but command-line tools are
/// expected to die on SIGPIPE (exit code 141 = 128 + 13). Call at the
/// start of main().
#[inline]
pub fn reset_sigpipe() {
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}

/// Format an IO error message without the "(os error N)" suffix.
/// GNU tools print e.g. "No such file or directory" while Rust's Display
/// impl adds " (os error 2)". This strips the suffix for compat.
pub fn io_error_msg(e: &std::io::Error) -> String {
    if let Some(raw) = e.raw_os_error() {
        let os_err = std::io::Error::from_raw_os_error(raw);
        let msg = format!("{}", os_err);
        msg.replace(&format!(" (os error {})", raw), "")
    } else {
        format!("{}", e)
    }
}
