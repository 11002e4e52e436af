//! Quantum signal plumbing: masking, the preemption handler, and the
//! virtual interval timer.
//!
//! `ITIMER_VIRTUAL` counts process CPU time and delivers `SIGVTALRM` at each
//! quantum boundary. The handler is the involuntary entry into the
//! scheduler; public operations block the signal around their bodies so the
//! handler never observes the library mid-update.

use core::marker::PhantomData;
use core::mem;
use core::ptr;

fn quantum_set() -> libc::sigset_t {
    unsafe {
        let mut set = mem::zeroed();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, libc::SIGVTALRM);
        set
    }
}

fn change_mask(how: libc::c_int) {
    let set = quantum_set();
    if unsafe { libc::sigprocmask(how, &set, ptr::null_mut()) } == -1 {
        sys_fail("system error: unable to change the signal mask");
    }
}

pub(crate) fn unblock_quantum() {
    change_mask(libc::SIG_UNBLOCK);
}

/// Blocks the quantum signal for the lifetime of the guard. Every public
/// operation holds one for its whole body.
///
/// A context that switches away while holding a guard resumes with the
/// signal still blocked and unblocks on the guard's drop, so the critical
/// section spans the suspension.
pub(crate) struct QuantumGuard {
    _single_thread: PhantomData<*const ()>,
}

impl QuantumGuard {
    pub(crate) fn new() -> Self {
        change_mask(libc::SIG_BLOCK);
        QuantumGuard {
            _single_thread: PhantomData,
        }
    }
}

impl Drop for QuantumGuard {
    fn drop(&mut self) {
        unblock_quantum();
    }
}

extern "C" fn on_quantum(_sig: libc::c_int) {
    // Delivered with SIGVTALRM blocked by the kernel; when the preempted
    // context is eventually resumed, returning from the handler restores its
    // mask through sigreturn.
    if crate::runtime::get().is_some() {
        crate::runtime::schedule();
    }
}

pub(crate) fn install_quantum_handler() {
    unsafe {
        let mut sa: libc::sigaction = mem::zeroed();
        sa.sa_sigaction = on_quantum as extern "C" fn(libc::c_int) as libc::sighandler_t;
        libc::sigemptyset(&mut sa.sa_mask);
        if libc::sigaction(libc::SIGVTALRM, &sa, ptr::null_mut()) == -1 {
            sys_fail("system error: unable to install the quantum handler");
        }
    }
}

/// Arms (or re-arms) the periodic quantum timer. Voluntary yields reset the
/// clock so the incoming thread gets a full quantum.
pub(crate) fn arm_quantum_timer(quantum_usecs: i64) {
    let interval = libc::timeval {
        tv_sec: quantum_usecs / 1_000_000,
        tv_usec: quantum_usecs % 1_000_000,
    };
    let timer = libc::itimerval {
        it_interval: interval,
        it_value: interval,
    };
    if unsafe { libc::setitimer(libc::ITIMER_VIRTUAL, &timer, ptr::null_mut()) } == -1 {
        sys_fail("system error: unable to arm the virtual timer");
    }
}

/// Unrecoverable OS failure: report on stderr and abort with exit code 1.
fn sys_fail(msg: &str) -> ! {
    eprintln!("{msg}");
    std::process::exit(1);
}
