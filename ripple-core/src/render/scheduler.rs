//! Update Scheduler
//!
//! Component render effects do not re-run the moment their state changes.
//! Their scheduler queues a [`Job`] instead, and the queue is flushed later
//! in one go, so a burst of writes produces a single re-render per component.
//!
//! # How Flushing Works
//!
//! 1. `queue_job` appends the job unless a job with the same id is already
//!    waiting, then makes sure a flush is owed.
//!
//! 2. Owing a flush signals a [`Notify`]. [`run_local`] keeps a flush task
//!    on its `LocalSet` waiting for that signal, and tokio runs it after the
//!    current task yields. This is the deferred, once-per-burst flush.
//!    Queueing never spawns, so it is safe from any task on the thread.
//!    Without a [`run_local`] the caller flushes with [`flush_jobs`] (or
//!    awaits [`next_tick`]).
//!
//! 3. `flush_jobs` runs jobs in FIFO order. Jobs queued while flushing are
//!    run by the same flush.
//!
//! The queue is thread-local, like the reactive graph it serves.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use tokio::sync::Notify;
use tokio::task::{spawn_local, LocalSet};
use tracing::trace;

use crate::reactive::SubscriberId;

/// A queued unit of work, deduplicated by id.
#[derive(Clone)]
pub struct Job {
    id: SubscriberId,
    run: Rc<dyn Fn()>,
}

impl Job {
    pub fn new<F>(id: SubscriberId, run: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self {
            id,
            run: Rc::new(run),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("id", &self.id).finish()
    }
}

thread_local! {
    static QUEUE: RefCell<VecDeque<Job>> = RefCell::new(VecDeque::new());
    static FLUSH_PENDING: Cell<bool> = const { Cell::new(false) };
    static AUTO_FLUSH: Cell<usize> = const { Cell::new(0) };
    static FLUSH_REQUESTED: Rc<Notify> = Rc::new(Notify::new());
    static FLUSHED: Rc<Notify> = Rc::new(Notify::new());
}

/// Queue a job for the next flush.
pub fn queue_job(job: Job) {
    let queued = QUEUE.with(|queue| {
        let mut queue = queue.borrow_mut();
        if queue.iter().any(|j| j.id == job.id) {
            return false;
        }
        queue.push_back(job);
        true
    });
    if queued {
        queue_flush();
    }
}

/// Drop a waiting job, e.g. because its component already updated or went
/// away.
pub fn invalidate_job(id: SubscriberId) {
    QUEUE.with(|queue| queue.borrow_mut().retain(|j| j.id != id));
}

fn queue_flush() {
    if FLUSH_PENDING.with(|p| p.replace(true)) {
        return;
    }
    // Stores a permit when no flush task is waiting yet.
    FLUSH_REQUESTED.with(|n| n.notify_one());
}

async fn flush_loop() {
    let requested = FLUSH_REQUESTED.with(Rc::clone);
    loop {
        requested.notified().await;
        flush_jobs();
    }
}

/// Run every queued job, returning how many ran.
pub fn flush_jobs() -> usize {
    let mut ran = 0;
    loop {
        let next = QUEUE.with(|queue| queue.borrow_mut().pop_front());
        let Some(job) = next else { break };
        (job.run)();
        ran += 1;
    }
    FLUSH_PENDING.with(|p| p.set(false));
    if ran > 0 {
        trace!(jobs = ran, "flushed update queue");
    }
    FLUSHED.with(|n| n.notify_waiters());
    ran
}

/// Number of jobs waiting for a flush.
pub fn pending_jobs() -> usize {
    QUEUE.with(|queue| queue.borrow().len())
}

/// Wait until queued updates have been applied.
///
/// Inside [`run_local`] this waits for the spawned flush. Elsewhere it
/// flushes immediately.
pub async fn next_tick() {
    if !FLUSH_PENDING.with(Cell::get) {
        return;
    }
    if AUTO_FLUSH.with(Cell::get) > 0 {
        let flushed = FLUSHED.with(Rc::clone);
        let notified = flushed.notified();
        if FLUSH_PENDING.with(Cell::get) {
            notified.await;
        }
    } else {
        flush_jobs();
    }
}

struct AutoFlushGuard;

impl AutoFlushGuard {
    fn enter() -> Self {
        AUTO_FLUSH.with(|depth| depth.set(depth.get() + 1));
        Self
    }
}

impl Drop for AutoFlushGuard {
    fn drop(&mut self) {
        AUTO_FLUSH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Drive `fut` on a [`LocalSet`] with deferred flushing enabled.
///
/// Writes made inside `fut` schedule their component updates as local
/// tasks; `next_tick().await` waits for them.
pub async fn run_local<F: Future>(fut: F) -> F::Output {
    let local = LocalSet::new();
    local
        .run_until(async move {
            let _auto = AutoFlushGuard::enter();
            let flusher = spawn_local(flush_loop());
            let output = fut.await;
            flusher.abort();
            output
        })
        .await
}
