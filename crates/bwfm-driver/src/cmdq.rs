//! Deferred host commands
//!
//! State-machine callbacks (key install, key removal, state changes) must
//! not issue firmware transactions from the caller's context. They are
//! queued here and run one at a time by the device's worker.
//!
//! The ring has a fixed capacity; a full ring rejects the command instead of
//! overwriting a pending one.

use crate::error::{BwfmError, Result};
use crate::net80211::{KeyInfo, StationState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use tracing::{debug, trace};

/// A deferred command and its owned arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCmd {
    /// Install a key.
    SetKey(KeyInfo),
    /// Remove a key.
    DeleteKey(KeyInfo),
    /// Move the station to a new state.
    NewState {
        /// Target state.
        state: StationState,
        /// Engine-specific argument.
        arg: i32,
    },
}

#[derive(Debug)]
struct Ring {
    slots: Box<[Option<HostCmd>]>,
    cur: usize,
    next: usize,
    queued: usize,
    shutdown: bool,
}

/// Fixed-capacity command ring shared by producers and one worker.
#[derive(Debug)]
pub struct CommandQueue {
    ring: Mutex<Ring>,
    wake: Condvar,
    draining: AtomicBool,
}

impl CommandQueue {
    /// Empty ring with `capacity` slots (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: Mutex::new(Ring {
                slots: (0..capacity).map(|_| None).collect(),
                cur: 0,
                next: 0,
                queued: 0,
                shutdown: false,
            }),
            wake: Condvar::new(),
            draining: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ring> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.lock().slots.len()
    }

    /// Commands waiting to run.
    pub fn len(&self) -> usize {
        self.lock().queued
    }

    /// True when nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue `cmd` and wake the worker. Never blocks.
    ///
    /// # Errors
    ///
    /// Returns [`BwfmError::QueueFull`] when every slot is taken.
    pub fn enqueue(&self, cmd: HostCmd) -> Result<()> {
        let mut ring = self.lock();
        let capacity = ring.slots.len();
        if ring.queued == capacity {
            return Err(BwfmError::QueueFull { capacity });
        }
        trace!(?cmd, slot = ring.cur, "queueing host command");
        let slot = ring.cur;
        ring.slots[slot] = Some(cmd);
        ring.cur = (slot + 1) % capacity;
        ring.queued += 1;
        drop(ring);
        self.wake.notify_one();
        Ok(())
    }

    /// Take the oldest command.
    pub fn pop(&self) -> Option<HostCmd> {
        let mut ring = self.lock();
        if ring.queued == 0 {
            return None;
        }
        let slot = ring.next;
        let cmd = ring.slots[slot].take();
        ring.next = (slot + 1) % ring.slots.len();
        ring.queued -= 1;
        cmd
    }

    /// Run every queued command through `run`, oldest first.
    ///
    /// The ring lock is not held while `run` executes, so `run` may queue
    /// more commands; those run in the same pass. A nested call while a
    /// drain is in progress returns 0 immediately.
    pub fn drain<F: FnMut(HostCmd)>(&self, mut run: F) -> usize {
        if self.draining.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let _guard = DrainGuard(&self.draining);

        let mut ran = 0;
        while let Some(cmd) = self.pop() {
            run(cmd);
            ran += 1;
        }
        ran
    }

    /// Block until work is queued. Returns `false` once shut down.
    pub fn wait_for_work(&self) -> bool {
        let mut ring = self.lock();
        while ring.queued == 0 && !ring.shutdown {
            ring = self.wake.wait(ring).unwrap_or_else(PoisonError::into_inner);
        }
        !ring.shutdown
    }

    /// Wake and stop the worker.
    pub fn shutdown(&self) {
        self.lock().shutdown = true;
        self.wake.notify_all();
    }
}

struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Dedicated thread draining a [`CommandQueue`].
///
/// Dropping a `Worker` shuts the queue down and detaches the thread; a run
/// already in progress finishes on its own. Use [`Worker::join`] to wait for
/// the thread, but never while holding a lock its `run` closure takes.
#[derive(Debug)]
pub struct Worker {
    queue: Arc<CommandQueue>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Start a thread that calls `run` each time work is queued.
    ///
    /// # Errors
    ///
    /// Returns error if the thread cannot be spawned.
    pub fn spawn<F>(name: &str, queue: Arc<CommandQueue>, mut run: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let q = Arc::clone(&queue);
        let handle = std::thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                debug!("worker started");
                while q.wait_for_work() {
                    run();
                }
                debug!("worker stopped");
            })?;
        Ok(Self {
            queue,
            handle: Some(handle),
        })
    }

    /// Queue the worker serves.
    pub fn queue(&self) -> &Arc<CommandQueue> {
        &self.queue
    }

    /// Shut the queue down and wait for the thread to exit.
    ///
    /// # Errors
    ///
    /// Returns error if the thread panicked.
    pub fn join(mut self) -> Result<()> {
        self.queue.shutdown();
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| BwfmError::invalid_state("worker thread panicked")),
            None => Ok(()),
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.queue.shutdown();
        if self.handle.take().is_some() {
            trace!("worker detached");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net80211::Cipher;

    fn key(id: u8) -> KeyInfo {
        KeyInfo {
            id,
            cipher: Cipher::Ccmp,
            key: vec![id; 16],
            group: false,
            peer: [id; 6],
        }
    }

    #[test]
    fn fifo_with_exact_payloads() {
        let q = CommandQueue::new(8);
        let sent: Vec<HostCmd> = (0..5).map(|i| HostCmd::SetKey(key(i))).collect();
        for cmd in &sent {
            q.enqueue(cmd.clone()).unwrap();
        }
        let mut seen = Vec::new();
        assert_eq!(q.drain(|cmd| seen.push(cmd)), 5);
        assert_eq!(seen, sent);
        assert!(q.is_empty());
    }

    #[test]
    fn overflow_is_an_error() {
        let q = CommandQueue::new(2);
        q.enqueue(HostCmd::DeleteKey(key(0))).unwrap();
        q.enqueue(HostCmd::DeleteKey(key(1))).unwrap();
        let err = q.enqueue(HostCmd::DeleteKey(key(2))).unwrap_err();
        assert!(matches!(err, BwfmError::QueueFull { capacity: 2 }));
        assert_eq!(q.pop(), Some(HostCmd::DeleteKey(key(0))));
        q.enqueue(HostCmd::DeleteKey(key(2))).unwrap();
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn wraps_around() {
        let q = CommandQueue::new(3);
        for round in 0..4u8 {
            for i in 0..3 {
                q.enqueue(HostCmd::SetKey(key(round * 3 + i))).unwrap();
            }
            let mut ids = Vec::new();
            q.drain(|cmd| {
                if let HostCmd::SetKey(k) = cmd {
                    ids.push(k.id);
                }
            });
            assert_eq!(ids, vec![round * 3, round * 3 + 1, round * 3 + 2]);
        }
    }

    #[test]
    fn callbacks_may_enqueue() {
        let q = CommandQueue::new(4);
        q.enqueue(HostCmd::NewState {
            state: StationState::Auth,
            arg: -1,
        })
        .unwrap();
        let mut order = Vec::new();
        q.drain(|cmd| {
            if let HostCmd::NewState { state, .. } = cmd {
                order.push(state);
                if state == StationState::Auth {
                    q.enqueue(HostCmd::NewState {
                        state: StationState::Run,
                        arg: -1,
                    })
                    .unwrap();
                }
            }
        });
        assert_eq!(order, vec![StationState::Auth, StationState::Run]);
    }

    #[test]
    fn nested_drain_is_refused() {
        let q = CommandQueue::new(4);
        q.enqueue(HostCmd::DeleteKey(key(1))).unwrap();
        q.enqueue(HostCmd::DeleteKey(key(2))).unwrap();
        let mut inner = usize::MAX;
        let outer = q.drain(|_| {
            if inner == usize::MAX {
                inner = q.drain(|_| {});
            }
        });
        assert_eq!(inner, 0);
        assert_eq!(outer, 2);
    }

    #[test]
    fn worker_runs_and_stops() {
        use std::sync::mpsc;

        let q = Arc::new(CommandQueue::new(4));
        let (tx, rx) = mpsc::channel();
        let wq = Arc::clone(&q);
        let worker = Worker::spawn("bwfm-test", Arc::clone(&q), move || {
            wq.drain(|cmd| {
                let _ = tx.send(cmd);
            });
        })
        .unwrap();

        q.enqueue(HostCmd::DeleteKey(key(7))).unwrap();
        let got = rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap();
        assert_eq!(got, HostCmd::DeleteKey(key(7)));
        worker.join().unwrap();
        assert!(!q.wait_for_work());
    }

    #[test]
    fn dropped_worker_does_not_wait_for_a_blocked_run() {
        use std::sync::mpsc;

        let gate = Arc::new(Mutex::new(()));
        let q = Arc::new(CommandQueue::new(4));
        let (entered_tx, entered_rx) = mpsc::channel();
        let (wq, wgate) = (Arc::clone(&q), Arc::clone(&gate));
        let worker = Worker::spawn("bwfm-test", Arc::clone(&q), move || {
            let _ = entered_tx.send(());
            let _held = wgate.lock().unwrap();
            wq.drain(|_| {});
        })
        .unwrap();

        let held = gate.lock().unwrap();
        q.enqueue(HostCmd::DeleteKey(key(1))).unwrap();
        entered_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        std::thread::spawn(move || {
            drop(worker);
            let _ = done_tx.send(());
        });
        assert!(done_rx
            .recv_timeout(std::time::Duration::from_secs(5))
            .is_ok());
        drop(held);
    }
}
