//! Worker coordination primitives built from a mutex and a condition
//! variable: a counting semaphore and a reusable barrier.

use std::sync::{Condvar, Mutex, PoisonError};

/// A counting semaphore.
///
/// The job uses one initialized to zero as an event gate: non-leader
/// workers park on [`wait`] after their map phase, and the leader [`post`]s
/// once per worker when the shuffle output is ready.
///
/// [`wait`]: Semaphore::wait
/// [`post`]: Semaphore::post
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    /// Creates a semaphore holding `permits` permits.
    pub fn new(permits: usize) -> Self {
        Semaphore {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Releases one permit and wakes one waiter, if any.
    pub fn post(&self) {
        let mut permits = self.permits.lock().unwrap_or_else(PoisonError::into_inner);
        *permits += 1;
        self.available.notify_one();
    }

    /// Blocks until a permit is available, then takes it.
    pub fn wait(&self) {
        let mut permits = self.permits.lock().unwrap_or_else(PoisonError::into_inner);
        while *permits == 0 {
            permits = self
                .available
                .wait(permits)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *permits -= 1;
    }
}

/// A reusable all-hands rendezvous: nobody passes [`wait`] until all
/// `parties` threads arrived. The generation counter is what makes reuse
/// safe; a stale waiter from round n cannot slip through round n+1.
///
/// [`wait`]: Barrier::wait
pub struct Barrier {
    state: Mutex<BarrierState>,
    all_here: Condvar,
    parties: usize,
}

struct BarrierState {
    arrived: usize,
    generation: u64,
}

impl Barrier {
    /// Creates a barrier for `parties` threads.
    pub fn new(parties: usize) -> Self {
        Barrier {
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
            }),
            all_here: Condvar::new(),
            parties,
        }
    }

    /// Blocks until all parties have called `wait` for the current round.
    pub fn wait(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.parties {
            state.arrived = 0;
            state.generation += 1;
            self.all_here.notify_all();
        } else {
            while state.generation == generation {
                state = self
                    .all_here
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn semaphore_counts_permits() {
        let sem = Semaphore::new(0);
        sem.post();
        sem.post();
        sem.wait();
        sem.wait();
    }

    #[test]
    fn semaphore_releases_a_parked_thread() {
        let sem = Arc::new(Semaphore::new(0));
        let passed = Arc::new(AtomicUsize::new(0));

        let handle = {
            let sem = Arc::clone(&sem);
            let passed = Arc::clone(&passed);
            thread::spawn(move || {
                sem.wait();
                passed.store(1, Ordering::SeqCst);
            })
        };

        sem.post();
        handle.join().expect("waiter");
        assert_eq!(passed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn barrier_holds_everyone_until_the_last_arrival() {
        const PARTIES: usize = 4;
        let barrier = Arc::new(Barrier::new(PARTIES));
        let arrived = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..PARTIES)
            .map(|_| {
                let barrier = Arc::clone(&barrier);
                let arrived = Arc::clone(&arrived);
                thread::spawn(move || {
                    arrived.fetch_add(1, Ordering::SeqCst);
                    barrier.wait();
                    // Everybody incremented before anybody got past.
                    assert_eq!(arrived.load(Ordering::SeqCst), PARTIES);
                    // The barrier is reusable: a second round works too.
                    barrier.wait();
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("party");
        }
    }

    #[test]
    fn single_party_barrier_never_blocks() {
        let barrier = Barrier::new(1);
        barrier.wait();
        barrier.wait();
    }
}
