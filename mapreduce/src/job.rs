//! The job context, the worker protocol, and the shuffle.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::Client;
use crate::progress::{Progress, Stage};
use crate::sync::{Barrier, Semaphore};

/// Appends intermediate pairs to the calling worker's private buffer.
/// No locking: the buffer has exactly one owner.
pub struct MapEmitter<'a, K2, V2> {
    sink: &'a mut Vec<(K2, V2)>,
}

impl<K2, V2> MapEmitter<'_, K2, V2> {
    /// Emits one intermediate pair.
    pub fn emit(&mut self, key: K2, value: V2) {
        self.sink.push((key, value));
    }
}

/// Appends output pairs to the shared output vector. The reduce call that
/// receives this already runs under the output lock, so the append itself
/// is plain.
pub struct ReduceEmitter<'a, K3, V3> {
    sink: &'a mut Vec<(K3, V3)>,
}

impl<K3, V3> ReduceEmitter<'_, K3, V3> {
    /// Emits one output pair.
    pub fn emit(&mut self, key: K3, value: V3) {
        self.sink.push((key, value));
    }
}

/// What [`Job::state`] reports: the stage and how far into it the job is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobState {
    /// Current stage; never regresses.
    pub stage: Stage,
    /// `100 * processed / total` for the current stage, 0 when the total
    /// is 0.
    pub percentage: f32,
}

/// Sorted per-worker runs awaiting the shuffle, plus the output vector.
/// One lock for both: reducers run under it, which is what serializes
/// their output appends.
struct SharedState<C: Client> {
    runs: Vec<Vec<(C::K2, C::V2)>>,
    output: Vec<(C::K3, C::V3)>,
}

/// Everything the workers share.
struct JobInner<C: Client> {
    client: C,
    input: Vec<(C::K1, C::V1)>,
    progress: Progress,
    shared: Mutex<SharedState<C>>,
    /// Key groups produced by the shuffle, consumed by reducers. Its lock
    /// is never held while taking `shared`.
    groups: Mutex<VecDeque<Vec<(C::K2, C::V2)>>>,
    /// Map-to-shuffle rendezvous for all workers.
    barrier: Barrier,
    /// Parks non-leader workers until the shuffle is done; the leader
    /// posts once per worker.
    reduce_gate: Semaphore,
    workers: usize,
}

impl<C: Client> JobInner<C> {
    fn lock_shared(&self) -> MutexGuard<'_, SharedState<C>> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_groups(&self) -> MutexGuard<'_, VecDeque<Vec<(C::K2, C::V2)>>> {
        self.groups.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Leader only. Carves the sorted runs into key groups, largest key
    /// first: every run is sorted ascending, so the largest remaining key
    /// sits at some run's back, and every pair equivalent to it is at the
    /// back of its own run.
    fn shuffle(&self) {
        let mut shared = self.lock_shared();
        let total: usize = shared.runs.iter().map(Vec::len).sum();
        if total == 0 {
            return;
        }
        self.progress.enter_stage(Stage::Shuffle, total as u64);

        loop {
            let anchor = shared
                .runs
                .iter()
                .enumerate()
                .filter_map(|(i, run)| run.last().map(|(key, _)| (i, key)))
                .max_by(|(_, a), (_, b)| a.cmp(b))
                .map(|(i, _)| i);
            let Some(anchor) = anchor else { break };
            let Some((anchor_key, anchor_value)) = shared.runs[anchor].pop() else {
                break;
            };

            let mut group = Vec::new();
            for run in shared.runs.iter_mut() {
                while run
                    .last()
                    .is_some_and(|(key, _)| !(key < &anchor_key) && !(&anchor_key < key))
                {
                    if let Some(pair) = run.pop() {
                        group.push(pair);
                    }
                }
            }
            group.push((anchor_key, anchor_value));

            self.progress.add_processed(group.len() as u64);
            self.lock_groups().push_back(group);
        }
    }

    /// Pops key groups and reduces them until the queue runs dry. The
    /// queue lock is released before the output lock is taken.
    fn reduce_loop(&self) {
        loop {
            let group = self.lock_groups().pop_front();
            let Some(group) = group else { break };
            {
                let mut shared = self.lock_shared();
                let mut out = ReduceEmitter {
                    sink: &mut shared.output,
                };
                self.client.reduce(group, &mut out);
            }
            self.progress.add_processed(1);
        }
    }
}

fn worker<C: Client>(inner: &JobInner<C>, index: usize) {
    // Map: claim input indices until the stage total is exhausted.
    let mut run = Vec::new();
    while let Some(claimed) = inner.progress.claim() {
        let (key, value) = &inner.input[claimed as usize];
        let mut out = MapEmitter { sink: &mut run };
        inner.client.map(key, value, &mut out);
    }

    // Sort the private run by key and publish it for the shuffle.
    if !run.is_empty() {
        run.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        inner.lock_shared().runs.push(run);
    }

    inner.barrier.wait();

    if index == 0 {
        inner.shuffle();
        let groups = inner.lock_groups().len() as u64;
        log::debug!("shuffle done, {groups} key groups");
        inner.progress.enter_stage(Stage::Reduce, groups);
        for _ in 0..inner.workers {
            inner.reduce_gate.post();
        }
    } else {
        inner.reduce_gate.wait();
    }

    inner.reduce_loop();
}

fn spawn_worker(index: usize, body: impl FnOnce() + Send + 'static) -> JoinHandle<()> {
    let builder = thread::Builder::new().name(format!("mr-worker-{index}"));
    match builder.spawn(body) {
        Ok(handle) => handle,
        Err(_) => {
            eprintln!("system error: unable to create a worker thread");
            std::process::exit(1);
        }
    }
}

/// A running job.
///
/// Worker 0, the leader, shuffles between the phases and joins the other
/// workers on its way out; [`Job::wait`] joins the leader. Dropping an
/// unwaited job waits for it.
pub struct Job<C: Client> {
    inner: Arc<JobInner<C>>,
    leader: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Client> Job<C> {
    /// Starts `worker_count` workers over `input` and returns immediately.
    ///
    /// # Panics
    ///
    /// Panics if `worker_count` is zero.
    pub fn start(client: C, input: Vec<(C::K1, C::V1)>, worker_count: usize) -> Job<C> {
        assert!(worker_count >= 1, "a job needs at least one worker");
        let total = input.len() as u64;
        let inner = Arc::new(JobInner {
            client,
            input,
            progress: Progress::new(),
            shared: Mutex::new(SharedState {
                runs: Vec::new(),
                output: Vec::new(),
            }),
            groups: Mutex::new(VecDeque::new()),
            barrier: Barrier::new(worker_count),
            reduce_gate: Semaphore::new(0),
            workers: worker_count,
        });
        inner.progress.enter_stage(Stage::Map, total);

        let followers: Vec<JoinHandle<()>> = (1..worker_count)
            .map(|index| {
                let inner = Arc::clone(&inner);
                spawn_worker(index, move || worker(&inner, index))
            })
            .collect();
        let leader = {
            let inner = Arc::clone(&inner);
            spawn_worker(0, move || {
                worker(&inner, 0);
                for follower in followers {
                    if let Err(panic) = follower.join() {
                        std::panic::resume_unwind(panic);
                    }
                }
            })
        };

        Job {
            inner,
            leader: Mutex::new(Some(leader)),
        }
    }

    /// Blocks until every worker has exited. Safe to call any number of
    /// times; only the first does anything.
    pub fn wait(&self) {
        let handle = self
            .leader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(panic) = handle.join() {
                std::panic::resume_unwind(panic);
            }
        }
    }

    /// A consistent snapshot of the job's stage and progress percentage,
    /// from one atomic load.
    pub fn state(&self) -> JobState {
        let snapshot = self.inner.progress.snapshot();
        JobState {
            stage: snapshot.stage,
            percentage: snapshot.percentage(),
        }
    }

    /// Waits for the job and hands back the output vector.
    pub fn close(self) -> Vec<(C::K3, C::V3)> {
        self.wait();
        let mut shared = self.inner.lock_shared();
        std::mem::take(&mut shared.output)
    }
}

impl<C: Client> Drop for Job<C> {
    fn drop(&mut self) {
        // Joining re-raises worker panics; skip that while already
        // unwinding.
        if !thread::panicking() {
            self.wait();
        }
    }
}
