//! # MapReduce: a multi-worker map/shuffle/reduce runtime.
//!
//! A job runs `worker_count` OS threads over an input vector of `(K1, V1)`
//! pairs and produces an output vector of `(K3, V3)` pairs:
//!
//! 1. **Map.** Workers claim input indices from a shared atomic counter and
//!    feed each pair to [`Client::map`], which emits intermediate `(K2,
//!    V2)` pairs into the worker's private buffer.
//! 2. **Sort.** Each worker sorts its buffer by `K2` and publishes it.
//! 3. **Shuffle.** After an all-hands barrier, worker 0 (the **leader**)
//!    repeatedly carves off the group of pairs sharing the largest
//!    remaining key. All buffers are sorted, so the largest key is always
//!    at some buffer's back. Other workers park on a semaphore meanwhile.
//! 4. **Reduce.** Workers pop key groups from the shuffle queue and fold
//!    each through [`Client::reduce`], which emits output pairs.
//!
//! Observability is a single packed atomic word ([`Stage`], processed
//! count, stage total), so [`Job::state`] is one load and never blocks the
//! workers.
//!
//! ## Example
//!
//! ```
//! use mapreduce::{Client, Job, MapEmitter, ReduceEmitter};
//!
//! struct CharCount;
//!
//! impl Client for CharCount {
//!     type K1 = ();
//!     type V1 = String;
//!     type K2 = char;
//!     type V2 = ();
//!     type K3 = char;
//!     type V3 = usize;
//!
//!     fn map(&self, _: &(), text: &String, out: &mut MapEmitter<'_, char, ()>) {
//!         for c in text.chars() {
//!             out.emit(c, ());
//!         }
//!     }
//!
//!     fn reduce(&self, group: Vec<(char, ())>, out: &mut ReduceEmitter<'_, char, usize>) {
//!         out.emit(group[0].0, group.len());
//!     }
//! }
//!
//! let job = Job::start(CharCount, vec![((), "abracadabra".into())], 2);
//! let mut counts = job.close();
//! counts.sort();
//! assert_eq!(counts, vec![('a', 5), ('b', 2), ('c', 1), ('d', 1), ('r', 2)]);
//! ```

mod job;
mod progress;
pub mod sync;

pub use job::{Job, JobState, MapEmitter, ReduceEmitter};
pub use progress::Stage;

/// The client side of a job: the map and reduce functions and the key and
/// value types they speak.
///
/// The ordering of `K2` drives the whole middle of the job: per-worker
/// sorting, the shuffle's largest-key selection, and grouping under the
/// equivalence "neither key is less than the other". An ordering that is
/// not total can therefore split what the client considers one group.
pub trait Client: Send + Sync + 'static {
    /// Input key.
    type K1: Send + Sync + 'static;
    /// Input value.
    type V1: Send + Sync + 'static;
    /// Intermediate key.
    type K2: Ord + Send + 'static;
    /// Intermediate value.
    type V2: Send + 'static;
    /// Output key.
    type K3: Send + 'static;
    /// Output value.
    type V3: Send + 'static;

    /// Turns one input pair into any number of intermediate pairs through
    /// [`MapEmitter::emit`]. Runs concurrently on several workers; the
    /// emitter writes the calling worker's private buffer, so no
    /// synchronization is involved.
    fn map(&self, key: &Self::K1, value: &Self::V1, out: &mut MapEmitter<'_, Self::K2, Self::V2>);

    /// Folds one group of intermediate pairs with equivalent keys into
    /// output pairs through [`ReduceEmitter::emit`]. Calls are serialized
    /// under the output lock, one group at a time.
    fn reduce(
        &self,
        group: Vec<(Self::K2, Self::V2)>,
        out: &mut ReduceEmitter<'_, Self::K3, Self::V3>,
    );
}
