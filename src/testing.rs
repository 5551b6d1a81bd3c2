//! Helpers for tests that change process wide signal state.
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::cutils::cerr;

/// Seconds a forked test may run before `SIGALRM` kills it.
const CHILD_DEADLINE: libc::c_uint = 10;

/// Run `test` in a forked child and assert that it passed.
///
/// Signal actions, routes and the signal mask of the child are its own, so tests can't observe
/// each other. The child has a single thread: the one that called `fork`.
pub(crate) fn in_child(test: impl FnOnce()) {
    let pid = cerr(unsafe { libc::fork() }).unwrap();

    if pid == 0 {
        // a hung test dies from the default SIGALRM action instead of blocking the suite
        unsafe { libc::alarm(CHILD_DEADLINE) };
        let code = match catch_unwind(AssertUnwindSafe(test)) {
            Ok(()) => 0,
            Err(_) => 1,
        };
        // skip atexit handlers and destructors inherited from the test harness
        unsafe { libc::_exit(code) };
    }

    let mut status = 0;
    cerr(unsafe { libc::waitpid(pid, &mut status, 0) }).unwrap();

    assert!(
        libc::WIFEXITED(status),
        "test process was killed by signal {}",
        libc::WTERMSIG(status)
    );
    assert_eq!(libc::WEXITSTATUS(status), 0, "test process failed");
}
