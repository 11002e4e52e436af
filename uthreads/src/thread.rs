//! Thread records.

use crate::switch;

/// Upper bound on concurrently live threads, the main thread included.
pub const MAX_THREADS: usize = 100;

/// Size of each spawned thread's private stack, in bytes.
pub const STACK_SIZE: usize = 64 * 1024;

/// Identifies a thread. Id 0 is the main thread; spawned threads get the
/// smallest id that is free at spawn time, so ids are reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ThreadId(pub usize);

impl ThreadId {
    /// The main thread, recorded by `init` and never spawned.
    pub const MAIN: ThreadId = ThreadId(0);
}

impl core::fmt::Display for ThreadId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A possible state of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// In the ready FIFO, waiting to be dispatched.
    Ready,
    /// Currently on the CPU.
    Running,
    /// Off the ready FIFO until resumed.
    Blocked,
    /// Off the ready FIFO until its sleep timer expires.
    Sleeping,
}

/// Per-thread record: identity, scheduling state, quantum accounting, and
/// the saved execution context.
pub(crate) struct Thread {
    pub id: ThreadId,
    pub state: State,
    /// Sleep timer armed. Independent of `state`: a sleeping thread that is
    /// blocked keeps counting down but wakes into `Blocked`.
    pub sleeping: bool,
    /// Remaining quantum boundaries until wakeup.
    pub sleep_quanta: u64,
    /// Quanta this thread spent in the `Running` state.
    pub quanta: u64,
    /// Saved stack pointer while the thread is off the CPU.
    pub sp: usize,
    /// The private stack. `None` for the main thread, which runs on the
    /// process stack.
    _stack: Option<Box<[u8]>>,
}

impl Thread {
    /// The record for the context that called `init`: already running, one
    /// quantum on the clock.
    pub(crate) fn main_record() -> Box<Thread> {
        Box::new(Thread {
            id: ThreadId::MAIN,
            state: State::Running,
            sleeping: false,
            sleep_quanta: 0,
            quanta: 1,
            sp: 0,
            _stack: None,
        })
    }

    /// Allocates a stack for a fresh thread and lays down the switch frame
    /// that makes its first dispatch enter `thread_fn`.
    pub(crate) fn new<F>(id: ThreadId, thread_fn: F) -> Box<Thread>
    where
        F: FnOnce() + 'static,
    {
        let mut stack = vec![0u8; STACK_SIZE].into_boxed_slice();
        let sp = switch::prepare_stack(&mut stack, thread_fn);
        Box::new(Thread {
            id,
            state: State::Ready,
            sleeping: false,
            sleep_quanta: 0,
            quanta: 0,
            sp,
            _stack: Some(stack),
        })
    }
}
