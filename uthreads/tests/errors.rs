//! The user-error surface: every rejected call leaves the library untouched.

use uthreads::{Error, ThreadId};

fn main() {
    // Everything fails before init.
    assert_eq!(uthreads::spawn(|| {}).unwrap_err(), Error::NotInitialized);
    assert_eq!(uthreads::block(ThreadId(1)), Err(Error::NotInitialized));
    assert_eq!(uthreads::resume(ThreadId(1)), Err(Error::NotInitialized));
    assert_eq!(uthreads::sleep(1), Err(Error::NotInitialized));
    assert_eq!(uthreads::terminate(ThreadId(1)), Err(Error::NotInitialized));
    assert_eq!(uthreads::quanta_of(ThreadId(1)), Err(Error::NotInitialized));

    // The quantum must be positive, and init happens once.
    assert_eq!(uthreads::init(0), Err(Error::NonPositiveQuantum));
    assert_eq!(uthreads::init(-7), Err(Error::NonPositiveQuantum));
    uthreads::init(10_000).expect("init");
    assert_eq!(uthreads::init(10_000), Err(Error::AlreadyInitialized));

    assert_eq!(uthreads::current(), ThreadId(0));
    assert!(uthreads::total_quanta() >= 1);
    assert!(uthreads::quanta_of(ThreadId(0)).expect("quanta of main") >= 1);

    // The main thread is off limits for block and sleep.
    assert_eq!(uthreads::block(ThreadId(0)), Err(Error::MainThread));
    assert_eq!(uthreads::sleep(3), Err(Error::MainThread));

    // Dead and out-of-range ids.
    assert_eq!(uthreads::block(ThreadId(42)), Err(Error::UnknownThread(ThreadId(42))));
    assert_eq!(uthreads::resume(ThreadId(42)), Err(Error::UnknownThread(ThreadId(42))));
    assert_eq!(uthreads::terminate(ThreadId(42)), Err(Error::UnknownThread(ThreadId(42))));
    assert_eq!(uthreads::quanta_of(ThreadId(99)), Err(Error::UnknownThread(ThreadId(99))));
    assert_eq!(uthreads::resume(ThreadId(500)), Err(Error::UnknownThread(ThreadId(500))));

    // Fill the table. The workers block themselves at once so the round
    // robin cycles through them quickly.
    let mut spawned = Vec::new();
    for _ in 1..uthreads::MAX_THREADS {
        spawned.push(
            uthreads::spawn(|| {
                uthreads::block(uthreads::current()).expect("block self");
            })
            .expect("spawn"),
        );
    }
    assert_eq!(uthreads::spawn(|| {}).unwrap_err(), Error::TooManyThreads);

    // Killing one frees exactly one slot, and it is reused lowest-first.
    uthreads::terminate(spawned[0]).expect("terminate");
    let replacement = uthreads::spawn(|| {}).expect("respawn");
    assert_eq!(replacement, spawned[0]);

    uthreads::terminate(ThreadId(0)).unwrap();
}
