//! The thread table, the ready FIFO, and the dispatch step.

use std::collections::VecDeque;

use crate::switch;
use crate::thread::{MAX_THREADS, State, Thread, ThreadId};

pub(crate) struct Runtime {
    /// Thread records indexed by id. A slot is `None` iff the id is free.
    table: [Option<Box<Thread>>; MAX_THREADS],
    /// Free-id map; `true` means the id may be handed out.
    free: [bool; MAX_THREADS],
    /// Ready FIFO of thread ids. A thread is in here iff its state is
    /// `Ready`.
    pub ready: VecDeque<ThreadId>,
    /// Thread currently on the CPU. `None` only while a self-terminated
    /// thread is being switched away from.
    pub running: Option<ThreadId>,
    /// Quanta since `init`, the current one included.
    pub total_quanta: u64,
    pub quantum_usecs: i64,
    /// Record of a self-terminated thread, kept alive until the switch away
    /// from its stack has landed somewhere else.
    graveyard: Option<Box<Thread>>,
    /// Discard target for the stack pointer of a dying context.
    scratch_sp: usize,
}

// The library runs on one OS thread; the quantum signal is blocked whenever
// this is mutated, so the preemption handler never sees it mid-update.
static mut RUNTIME: Option<Runtime> = None;

pub(crate) fn install(rt: Runtime) {
    unsafe { RUNTIME = Some(rt) }
}

pub(crate) fn get() -> Option<&'static mut Runtime> {
    unsafe { RUNTIME.as_mut() }
}

pub(crate) fn expect() -> &'static mut Runtime {
    match get() {
        Some(rt) => rt,
        None => panic!("the thread library is not initialized"),
    }
}

impl Runtime {
    pub(crate) fn new(quantum_usecs: i64) -> Runtime {
        let mut free = [true; MAX_THREADS];
        free[0] = false;
        let mut table = [const { None }; MAX_THREADS];
        table[0] = Some(Thread::main_record());
        Runtime {
            table,
            free,
            ready: VecDeque::new(),
            running: Some(ThreadId::MAIN),
            total_quanta: 1,
            quantum_usecs,
            graveyard: None,
            scratch_sp: 0,
        }
    }

    pub(crate) fn is_live(&self, tid: ThreadId) -> bool {
        tid.0 < MAX_THREADS && !self.free[tid.0]
    }

    pub(crate) fn lowest_free_id(&self) -> Option<ThreadId> {
        (1..MAX_THREADS).find(|&i| self.free[i]).map(ThreadId)
    }

    pub(crate) fn thread_mut(&mut self, tid: ThreadId) -> &mut Thread {
        match self.table[tid.0].as_deref_mut() {
            Some(th) => th,
            None => unreachable!("no record for live thread {tid}"),
        }
    }

    pub(crate) fn running_id(&self) -> ThreadId {
        match self.running {
            Some(tid) => tid,
            None => unreachable!("no running thread outside the scheduler"),
        }
    }

    pub(crate) fn admit(&mut self, th: Box<Thread>) {
        let tid = th.id;
        self.free[tid.0] = false;
        self.table[tid.0] = Some(th);
        self.ready.push_back(tid);
    }

    pub(crate) fn remove(&mut self, tid: ThreadId) {
        self.remove_from_ready(tid);
        self.table[tid.0] = None;
        self.free[tid.0] = true;
    }

    pub(crate) fn remove_from_ready(&mut self, tid: ThreadId) {
        self.ready.retain(|&t| t != tid);
    }

    /// Self-termination: frees the id immediately but parks the record, and
    /// with it the stack currently in use, until the switch has landed.
    pub(crate) fn bury(&mut self, tid: ThreadId) {
        self.remove_from_ready(tid);
        let th = self.table[tid.0].take();
        self.free[tid.0] = true;
        self.graveyard = th;
        self.running = None;
    }

    /// Drops a buried record. Only called from a context that no longer
    /// stands on the buried stack.
    pub(crate) fn reap(&mut self) {
        self.graveyard = None;
    }

    /// Advances every armed sleep timer by one quantum boundary. A timer
    /// that hits zero wakes the thread into the ready FIFO unless it was
    /// also blocked, in which case it stays put until resumed.
    fn wake_sleepers(&mut self) {
        for i in 0..MAX_THREADS {
            let woke = match self.table[i].as_deref_mut() {
                Some(th) if th.sleeping => {
                    th.sleep_quanta -= 1;
                    if th.sleep_quanta == 0 {
                        th.sleeping = false;
                        if th.state != State::Blocked {
                            th.state = State::Ready;
                            true
                        } else {
                            false
                        }
                    } else {
                        false
                    }
                }
                _ => false,
            };
            if woke {
                self.ready.push_back(ThreadId(i));
            }
        }
    }
}

/// One scheduling step: starts a new quantum, advances sleep timers,
/// requeues the outgoing thread if it is still runnable, and dispatches the
/// head of the ready FIFO.
///
/// Entered with the quantum signal blocked, either from the preemption
/// handler or from a public operation that gave up the CPU. For contexts
/// that get saved, the call returns when the thread is dispatched again.
pub(crate) fn schedule() {
    let rt = expect();
    rt.total_quanta += 1;
    rt.wake_sleepers();

    let outgoing = rt.running;
    let save_sp: *mut usize = match outgoing {
        Some(cur) => {
            let (sp, requeue) = {
                let th = rt.thread_mut(cur);
                let requeue = th.state == State::Running;
                if requeue {
                    th.state = State::Ready;
                }
                (&mut th.sp as *mut usize, requeue)
            };
            if requeue {
                rt.ready.push_back(cur);
            }
            sp
        }
        None => &mut rt.scratch_sp as *mut usize,
    };

    let next = match rt.ready.pop_front() {
        Some(tid) => tid,
        None => unreachable!("ready FIFO is empty: the main thread is gone"),
    };
    let next_sp = {
        let th = rt.thread_mut(next);
        th.state = State::Running;
        th.quanta += 1;
        th.sp
    };
    rt.running = Some(next);

    if outgoing == Some(next) {
        // Sole runnable thread; its context is already live.
        return;
    }
    unsafe { switch::switch_stacks(save_sp, next_sp) };
    // Back on this stack after some later switch. A thread may have died
    // handing control to us; its record is safe to drop now.
    expect().reap();
}
