//! Per-thread hook exclusion.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;
use tracing::trace;

/// Callback receiving the full excluded set whenever it changes.
pub type ExclusionListener = Box<dyn Fn(&[ThreadId]) + Send + Sync>;

/// Reference-counted set of threads that bypass installed hooks.
///
/// A thread stays excluded while at least one of its [`ExclusionGuard`]s is
/// alive, so nested exclusions on one thread are fine.
#[derive(Default)]
pub struct ExclusionList {
    threads: Mutex<HashMap<ThreadId, usize>>,
    listener: Option<ExclusionListener>,
}

impl ExclusionList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a list that reports every change of the excluded set.
    ///
    /// The interception mechanism uses this to keep its own thread filter
    /// in sync. The listener runs under the list's lock.
    pub fn with_listener(listener: impl Fn(&[ThreadId]) + Send + Sync + 'static) -> Self {
        Self {
            threads: Mutex::new(HashMap::new()),
            listener: Some(Box::new(listener)),
        }
    }

    /// Exclude the calling thread until the returned guard is dropped.
    pub fn exclude_current_thread(&self) -> ExclusionGuard<'_> {
        let thread = thread::current().id();
        let mut threads = self.threads.lock();
        let count = threads.entry(thread).or_insert(0);
        *count += 1;
        if *count == 1 {
            trace!(?thread, "thread excluded from hooks");
            self.notify(&threads);
        }
        ExclusionGuard {
            list: self,
            thread,
            _not_send: PhantomData,
        }
    }

    /// Check if `thread` currently bypasses the hooks.
    pub fn is_excluded(&self, thread: ThreadId) -> bool {
        self.threads.lock().contains_key(&thread)
    }

    /// Check if the calling thread currently bypasses the hooks.
    pub fn is_current_thread_excluded(&self) -> bool {
        self.is_excluded(thread::current().id())
    }

    /// Every excluded thread.
    pub fn excluded_threads(&self) -> Vec<ThreadId> {
        self.threads.lock().keys().copied().collect()
    }

    fn release(&self, thread: ThreadId) {
        let mut threads = self.threads.lock();
        let Some(count) = threads.get_mut(&thread) else {
            return;
        };
        *count -= 1;
        if *count == 0 {
            threads.remove(&thread);
            trace!(?thread, "thread exclusion ended");
            self.notify(&threads);
        }
    }

    fn notify(&self, threads: &HashMap<ThreadId, usize>) {
        if let Some(listener) = &self.listener {
            let excluded: Vec<ThreadId> = threads.keys().copied().collect();
            listener(&excluded);
        }
    }
}

/// Keeps its thread excluded while alive.
///
/// Bound to the thread that created it.
#[must_use = "the exclusion ends when the guard is dropped"]
pub struct ExclusionGuard<'a> {
    list: &'a ExclusionList,
    thread: ThreadId,
    _not_send: PhantomData<*const ()>,
}

impl ExclusionGuard<'_> {
    /// The excluded thread
    pub fn thread(&self) -> ThreadId {
        self.thread
    }
}

impl Drop for ExclusionGuard<'_> {
    fn drop(&mut self) {
        self.list.release(self.thread);
    }
}
