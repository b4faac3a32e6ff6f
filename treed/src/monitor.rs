//! # Monitor
//!
//! In several scenarios, `std`'s or other crates' reader/writer locks don't
//! give us the exact hand-off behavior a deadlock-free, starvation-free tree
//! descent protocol needs: a released lock must *reserve* the next admission
//! slot for a specific waiting set rather than let every woken thread race to
//! re-check the predicate. This is the primitive we build that behavior on.
//!
//! Every [`Node`](crate::node::Node) owns exactly one `Monitor`, which governs
//! access to that node's children map and nothing else.

use parking_lot::{Condvar, Mutex};

/// Internal counters and hand-off flags, all protected by one mutex.
struct State {
    read_count: usize,
    write_count: usize,
    read_wait: usize,
    write_wait: usize,
    /// set by a releasing writer to reserve the next admission for exactly
    /// one waiting writer
    woke_write: bool,
    /// set by a releasing writer/reader to the number of readers the current
    /// hand-off batch still owes an admission
    woke_read: usize,
}

impl State {
    const fn new() -> Self {
        Self {
            read_count: 0,
            write_count: 0,
            read_wait: 0,
            write_wait: 0,
            woke_write: false,
            woke_read: 0,
        }
    }
}

/// A per-node reader/writer monitor with explicit wake hand-off.
///
/// Multiple readers may hold the monitor at once; a writer holds it
/// exclusively. A thread that cannot be admitted immediately queues on one of
/// two condition variables and is woken only when the releasing thread has
/// reserved it a slot — so a wake-up never has to re-race the admission
/// predicate against fresher arrivals.
pub(crate) struct Monitor {
    state: Mutex<State>,
    read_cond: Condvar,
    write_cond: Condvar,
}

impl Monitor {
    pub(crate) const fn new() -> Self {
        Self {
            state: Mutex::new(State::new()),
            read_cond: Condvar::new(),
            write_cond: Condvar::new(),
        }
    }

    /// Block until admitted as a reader.
    pub(crate) fn begin_read(&self) {
        let mut state = self.state.lock();
        while state.write_wait > 0 || state.write_count > 0 {
            state.read_wait += 1;
            self.read_cond.wait(&mut state);
            state.read_wait -= 1;
            if state.woke_read > 0 {
                state.woke_read -= 1;
                break;
            }
        }
        state.read_count += 1;
        log::trace!("monitor: admitted reader (read_count={})", state.read_count);
    }

    /// Release a previously-acquired reader slot.
    pub(crate) fn end_read(&self) {
        let mut state = self.state.lock();
        state.read_count -= 1;
        if state.read_count == 0
            && state.write_count == 0
            && state.write_wait > 0
            && state.woke_read == 0
        {
            // prefer a waiting writer once the readers have drained, unless a
            // reader hand-off batch is already in flight
            state.woke_write = true;
            self.write_cond.notify_one();
        } else if state.write_count == 0 && state.read_count == 0 {
            state.woke_read = state.read_wait;
            self.read_cond.notify_all();
        }
    }

    /// Block until admitted as the sole writer.
    pub(crate) fn begin_write(&self) {
        let mut state = self.state.lock();
        while state.write_count > 0
            || state.read_count > 0
            || state.write_wait > 0
            || state.read_wait > 0
        {
            state.write_wait += 1;
            self.write_cond.wait(&mut state);
            state.write_wait -= 1;
            if state.woke_write {
                state.woke_write = false;
                break;
            }
        }
        state.write_count += 1;
        log::trace!("monitor: admitted writer");
    }

    /// Release the writer slot.
    pub(crate) fn end_write(&self) {
        let mut state = self.state.lock();
        state.write_count -= 1;
        if state.read_wait > 0 {
            // reader-priority after a write: hand the whole waiting batch off
            // at once rather than trickling writers through one at a time
            state.woke_read = state.read_wait;
            self.read_cond.notify_all();
        } else if state.write_wait > 0 {
            state.woke_write = true;
            self.write_cond.notify_one();
        }
        log::trace!("monitor: writer released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc};
    use std::thread;
    use std::time::Duration;

    fn panic_timeout<T, F>(dur: Duration, f: F) -> T
    where
        T: Send + 'static,
        F: (FnOnce() -> T) + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            let val = f();
            let _ = tx.send(());
            val
        });
        match rx.recv_timeout(dur) {
            Ok(_) => handle.join().expect("thread panicked"),
            Err(_) => panic!("operation timed out, probable deadlock"),
        }
    }

    #[test]
    fn test_multiple_readers_concurrent() {
        let m = Arc::new(Monitor::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];
        for _ in 0..8 {
            let m = m.clone();
            let active = active.clone();
            let max_seen = max_seen.clone();
            handles.push(thread::spawn(move || {
                m.begin_read();
                let cur = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(cur, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(20));
                active.fetch_sub(1, Ordering::SeqCst);
                m.end_read();
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert!(max_seen.load(Ordering::SeqCst) > 1);
    }

    #[test]
    fn test_writer_is_exclusive() {
        let m = Arc::new(Monitor::new());
        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];
        for _ in 0..8 {
            let m = m.clone();
            let active = active.clone();
            let max_seen = max_seen.clone();
            handles.push(thread::spawn(move || {
                m.begin_write();
                let cur = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(cur, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                active.fetch_sub(1, Ordering::SeqCst);
                m.end_write();
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_writer_excludes_readers() {
        let m = Arc::new(Monitor::new());
        m.begin_write();
        let m2 = m.clone();
        panic_timeout(Duration::from_millis(200), move || {
            // just confirm this doesn't deadlock the test harness itself by
            // spawning a reader that will block until we release below
            let t = thread::spawn(move || {
                m2.begin_read();
                m2.end_read();
            });
            thread::sleep(Duration::from_millis(30));
            t
        });
        m.end_write();
    }

    #[test]
    fn test_no_starvation_under_reader_pressure() {
        // a writer waiting behind a steady stream of readers must eventually
        // be admitted
        let m = Arc::new(Monitor::new());
        let writer_done = Arc::new(AtomicUsize::new(0));
        m.begin_read();
        let m2 = m.clone();
        let writer_done2 = writer_done.clone();
        let writer = thread::spawn(move || {
            m2.begin_write();
            writer_done2.store(1, Ordering::SeqCst);
            m2.end_write();
        });
        thread::sleep(Duration::from_millis(20));
        assert_eq!(writer_done.load(Ordering::SeqCst), 0);
        m.end_read();
        writer.join().unwrap();
        assert_eq!(writer_done.load(Ordering::SeqCst), 1);
    }
}
