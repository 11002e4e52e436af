//! # UThreads: preemptive user-level threads on a single OS thread.
//!
//! A user-level thread is an execution context that lives entirely inside one
//! process: its own stack, its own saved register state, and nothing else. The
//! kernel sees a single thread; this library multiplexes many logical threads
//! onto it by switching stacks in userspace.
//!
//! ## The scheduling model
//!
//! Scheduling is round-robin with a fixed time slice (a **quantum**). A
//! virtual interval timer delivers `SIGVTALRM` once per quantum; the signal
//! handler is the preemption point. A thread can also give up the CPU
//! voluntarily by blocking itself, going to sleep, or terminating itself. In
//! every case the scheduler picks the head of the ready FIFO, switches to its
//! stack, and charges it one quantum.
//!
//! Threads are identified by a small integer id. Id 0 is the main thread: it
//! is created by [`init`], can never be blocked or put to sleep, and
//! terminating it tears the whole library down.
//!
//! Blocking and sleeping are independent conditions. A thread that is both
//! sleeping and blocked returns to the ready FIFO only after its sleep timer
//! expired *and* it was resumed.
//!
//! ## Critical sections
//!
//! Every public operation blocks the quantum signal for its whole body, so
//! library state is never observed mid-update by the preemption handler. The
//! context switch itself runs with the signal blocked; whichever context the
//! switch lands on is responsible for unblocking it again.
//!
//! ## Example
//!
//! ```no_run
//! uthreads::init(100_000).unwrap();
//! let tid = uthreads::spawn(|| {
//!     uthreads::sleep(2).unwrap();
//! }).unwrap();
//! while uthreads::quanta_of(tid).is_ok() {
//!     std::hint::spin_loop();
//! }
//! ```

#![allow(static_mut_refs)]

#[cfg(not(all(target_arch = "x86_64", unix)))]
compile_error!("uthreads requires x86_64 and a POSIX host: the stack switch is x86_64 assembly and preemption uses SIGVTALRM/ITIMER_VIRTUAL");

mod runtime;
mod signal;
mod switch;
mod thread;

use runtime::Runtime;
pub use thread::{MAX_THREADS, STACK_SIZE, State, ThreadId};

/// Errors reported by the thread library.
///
/// These are user errors in the sense of the library contract: the call is
/// rejected, nothing changes, and the caller may retry. Failures of the host
/// OS (installing the signal handler, arming the timer, manipulating the
/// signal mask) are not represented here; they abort the process with exit
/// code 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// `init` was called with a non-positive quantum length.
    NonPositiveQuantum,
    /// `init` was called a second time.
    AlreadyInitialized,
    /// A library call was made before `init`.
    NotInitialized,
    /// Every slot in the thread table is occupied.
    TooManyThreads,
    /// No live thread carries this id.
    UnknownThread(ThreadId),
    /// The main thread cannot be blocked or put to sleep.
    MainThread,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::NonPositiveQuantum => {
                write!(f, "thread library error: quantum_usecs must be a positive integer")
            }
            Error::AlreadyInitialized => {
                write!(f, "thread library error: the library is already initialized")
            }
            Error::NotInitialized => {
                write!(f, "thread library error: the library is not initialized")
            }
            Error::TooManyThreads => {
                write!(f, "thread library error: exceeded the max number of allowed threads")
            }
            Error::UnknownThread(tid) => {
                write!(f, "thread library error: no thread with id {}", tid.0)
            }
            Error::MainThread => {
                write!(f, "thread library error: the main thread cannot be blocked or put to sleep")
            }
        }
    }
}

impl std::error::Error for Error {}

/// Shorthand for results of library operations.
pub type Result<T> = core::result::Result<T, Error>;

fn reject<T>(e: Error) -> Result<T> {
    log::error!("{e}");
    Err(e)
}

/// Initializes the thread library.
///
/// Must be called once before any other library function. `quantum_usecs` is
/// the length of a quantum in microseconds and must be positive.
///
/// On success the calling context becomes thread 0 in the `Running` state,
/// the preemption handler is installed, the periodic quantum timer is armed,
/// and both the total quantum counter and thread 0's own counter start at 1.
///
/// # Errors
///
/// [`Error::NonPositiveQuantum`] if `quantum_usecs <= 0`,
/// [`Error::AlreadyInitialized`] on a second call.
pub fn init(quantum_usecs: i64) -> Result<()> {
    let _quantum = signal::QuantumGuard::new();
    if quantum_usecs <= 0 {
        return reject(Error::NonPositiveQuantum);
    }
    if runtime::get().is_some() {
        return reject(Error::AlreadyInitialized);
    }
    runtime::install(Runtime::new(quantum_usecs));
    signal::install_quantum_handler();
    signal::arm_quantum_timer(quantum_usecs);
    log::debug!("uthreads initialized, quantum = {quantum_usecs}us");
    Ok(())
}

/// Creates a new thread that runs `f` and appends it to the ready FIFO.
///
/// The new thread gets the smallest free id >= 1 and a private stack of
/// [`STACK_SIZE`] bytes. It starts running only when the scheduler dispatches
/// it. If `f` returns, the thread terminates itself.
///
/// # Errors
///
/// [`Error::TooManyThreads`] when all [`MAX_THREADS`] slots are taken,
/// [`Error::NotInitialized`] before [`init`].
pub fn spawn<F>(f: F) -> Result<ThreadId>
where
    F: FnOnce() + 'static,
{
    let _quantum = signal::QuantumGuard::new();
    let Some(rt) = runtime::get() else {
        return reject(Error::NotInitialized);
    };
    let Some(tid) = rt.lowest_free_id() else {
        return reject(Error::TooManyThreads);
    };
    rt.admit(thread::Thread::new(tid, f));
    Ok(tid)
}

/// Terminates the thread with id `tid` and releases its resources.
///
/// Terminating the main thread (`tid` 0) tears down the entire library and
/// exits the process with status 0. If a thread terminates itself, the call
/// does not return: a fresh quantum is started and the scheduler dispatches
/// the next ready thread.
///
/// # Errors
///
/// [`Error::UnknownThread`] if no live thread carries `tid`.
pub fn terminate(tid: ThreadId) -> Result<()> {
    let _quantum = signal::QuantumGuard::new();
    let Some(rt) = runtime::get() else {
        return reject(Error::NotInitialized);
    };
    if tid == ThreadId::MAIN {
        std::process::exit(0);
    }
    if !rt.is_live(tid) {
        return reject(Error::UnknownThread(tid));
    }
    if rt.running == Some(tid) {
        // Move the record to the graveyard so the stack we are standing on
        // stays alive across the switch; whoever lands next reaps it.
        rt.bury(tid);
        signal::arm_quantum_timer(rt.quantum_usecs);
        runtime::schedule();
        unreachable!("resumed a terminated thread");
    }
    rt.remove(tid);
    Ok(())
}

/// Moves the thread with id `tid` to the `Blocked` state.
///
/// Blocking an already blocked thread has no effect. If a thread blocks
/// itself, the quantum timer is reset and control transfers to the next ready
/// thread; the call returns after somebody resumes it.
///
/// # Errors
///
/// [`Error::MainThread`] for `tid` 0, [`Error::UnknownThread`] otherwise for
/// a dead id.
pub fn block(tid: ThreadId) -> Result<()> {
    let _quantum = signal::QuantumGuard::new();
    let Some(rt) = runtime::get() else {
        return reject(Error::NotInitialized);
    };
    if tid == ThreadId::MAIN {
        return reject(Error::MainThread);
    }
    if !rt.is_live(tid) {
        return reject(Error::UnknownThread(tid));
    }
    rt.thread_mut(tid).state = State::Blocked;
    rt.remove_from_ready(tid);
    if rt.running == Some(tid) {
        signal::arm_quantum_timer(rt.quantum_usecs);
        runtime::schedule();
    }
    Ok(())
}

/// Moves a blocked thread back to the ready FIFO.
///
/// Resuming a `Ready` or `Running` thread is a no-op, not an error. A thread
/// whose sleep timer has not expired yet stays off the ready FIFO even when
/// resumed; it needs the expiry *and* another resume.
///
/// # Errors
///
/// [`Error::UnknownThread`] if no live thread carries `tid`.
pub fn resume(tid: ThreadId) -> Result<()> {
    let _quantum = signal::QuantumGuard::new();
    let Some(rt) = runtime::get() else {
        return reject(Error::NotInitialized);
    };
    if !rt.is_live(tid) {
        return reject(Error::UnknownThread(tid));
    }
    let th = rt.thread_mut(tid);
    if !th.sleeping && matches!(th.state, State::Blocked | State::Sleeping) {
        th.state = State::Ready;
        rt.ready.push_back(tid);
    }
    Ok(())
}

/// Puts the calling thread to sleep for `num_quanta` quanta.
///
/// The current quantum does not count towards the sleep, so the thread is
/// eligible to wake only after `num_quanta` further quantum boundaries. The
/// quantum timer is reset and a scheduling decision is made immediately; the
/// call returns once the thread is dispatched again.
///
/// # Errors
///
/// [`Error::MainThread`] when called from thread 0.
pub fn sleep(num_quanta: u64) -> Result<()> {
    let _quantum = signal::QuantumGuard::new();
    let Some(rt) = runtime::get() else {
        return reject(Error::NotInitialized);
    };
    let cur = rt.running_id();
    if cur == ThreadId::MAIN {
        return reject(Error::MainThread);
    }
    let th = rt.thread_mut(cur);
    th.state = State::Sleeping;
    th.sleeping = true;
    // The quantum being given up right now is not part of the sleep.
    th.sleep_quanta = num_quanta + 1;
    signal::arm_quantum_timer(rt.quantum_usecs);
    runtime::schedule();
    Ok(())
}

/// Returns the id of the calling thread.
///
/// # Panics
///
/// Panics if the library has not been initialized.
pub fn current() -> ThreadId {
    runtime::expect().running_id()
}

/// Returns the total number of quanta since [`init`], including the current
/// one. Right after [`init`] the value is 1; it grows by one at every quantum
/// boundary regardless of the reason the quantum started.
///
/// # Panics
///
/// Panics if the library has not been initialized.
pub fn total_quanta() -> u64 {
    runtime::expect().total_quanta
}

/// Returns the number of quanta the thread with id `tid` was in the `Running`
/// state, including the current quantum if it is running now.
///
/// # Errors
///
/// [`Error::UnknownThread`] if no live thread carries `tid`.
pub fn quanta_of(tid: ThreadId) -> Result<u64> {
    let Some(rt) = runtime::get() else {
        return reject(Error::NotInitialized);
    };
    if !rt.is_live(tid) {
        return reject(Error::UnknownThread(tid));
    }
    Ok(rt.thread_mut(tid).quanta)
}
