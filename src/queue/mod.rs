//! Task Queue: the bounded in-flight set of pending work.
//!
//! Priority ordering uses four `VecDeque<Task>` buckets rather than a heap —
//! the bounded number of priority classes makes an O(n) scan across buckets
//! acceptable, and a deque gives O(1) front-insertion for a page continuation's
//! "front of its priority class" placement without the reshuffle a binary
//! heap would need for FIFO-within-class.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::SystemTime;


/// Priority class; ordering is low < normal < high < critical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl Priority {
    /// One step up, clamped at `Critical`.
    pub fn raised(self) -> Self {
        match self {
            Priority::Low => Priority::Normal,
            Priority::Normal => Priority::High,
            Priority::High | Priority::Critical => Priority::Critical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: u64,
    pub dork: String,
    pub page: u32,
    pub status: TaskStatus,
    pub priority: Priority,
    pub retry_count: u32,
    pub retry_limit: u32,
    pub created_at: SystemTime,
    pub started_at: Option<SystemTime>,
    pub completed_at: Option<SystemTime>,
    pub error: Option<String>,
    pub urls: Vec<String>,
}

impl Task {
    fn new(id: u64, dork: String, page: u32, priority: Priority, retry_limit: u32) -> Self {
        Self {
            id,
            dork,
            page,
            status: TaskStatus::Pending,
            priority,
            retry_count: 0,
            retry_limit,
            created_at: SystemTime::now(),
            started_at: None,
            completed_at: None,
            error: None,
            urls: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    pub max_retries: u32,
    pub pages_per_dork: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            pages_per_dork: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QueueStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
}

impl QueueStats {
    pub fn total_ingested(&self) -> usize {
        self.pending + self.running + self.completed + self.failed
    }

    /// No pending work and nothing in flight.
    pub fn is_drained(&self) -> bool {
        self.pending == 0 && self.running == 0
    }
}

struct Inner {
    buckets: [VecDeque<u64>; 4],
    tasks: std::collections::HashMap<u64, Task>,
    inflight: HashSet<u64>,
    processed: HashSet<(String, u32)>,
    next_id: u64,
    completed: usize,
    failed: usize,
    paused: bool,
}

impl Inner {
    fn bucket_mut(&mut self, priority: Priority) -> &mut VecDeque<u64> {
        &mut self.buckets[priority as usize]
    }
}

/// Priority-ordered FIFO of pending work with a bounded in-flight set.
pub struct TaskQueue {
    config: QueueConfig,
    inner: Mutex<Inner>,
}

impl TaskQueue {
    pub fn new(config: QueueConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                buckets: [
                    VecDeque::new(),
                    VecDeque::new(),
                    VecDeque::new(),
                    VecDeque::new(),
                ],
                tasks: Default::default(),
                inflight: HashSet::new(),
                processed: HashSet::new(),
                next_id: 1,
                completed: 0,
                failed: 0,
                paused: false,
            }),
        }
    }

    /// Push a new page-0 task. A no-op if `(dork, 0)` has already completed
    /// or is already pending — dedup is on the processed key, not the
    /// enqueued one.
    pub fn add_dork(&self, dork: &str, priority: Priority) -> Option<u64> {
        self.enqueue(dork, 0, priority, false)
    }

    /// Enqueue a pagination task, conventionally at the front of its
    /// priority class.
    pub fn add_page(&self, dork: &str, page: u32, priority: Priority) -> Option<u64> {
        self.enqueue(dork, page, priority, true)
    }

    fn enqueue(&self, dork: &str, page: u32, priority: Priority, front: bool) -> Option<u64> {
        let mut inner = self.inner.lock().unwrap();
        if inner.processed.contains(&(dork.to_string(), page)) {
            return None;
        }
        let id = inner.next_id;
        inner.next_id += 1;
        let task = Task::new(id, dork.to_string(), page, priority, self.config.max_retries);
        inner.tasks.insert(id, task);
        let bucket = inner.bucket_mut(priority);
        if front {
            bucket.push_front(id);
        } else {
            bucket.push_back(id);
        }
        Some(id)
    }

    /// Pop up to `n` highest-priority tasks into the in-flight set, unless
    /// paused or already at the concurrency cap the caller enforces by
    /// choice of `n` (the queue itself has no notion of max-concurrency; the
    /// scheduler passes `available_slots` as `n`).
    pub fn next_batch(&self, n: usize) -> Vec<Task> {
        let mut inner = self.inner.lock().unwrap();
        if inner.paused || n == 0 {
            return Vec::new();
        }
        let mut out = Vec::with_capacity(n);
        'outer: while out.len() < n {
            for priority in [Priority::Critical, Priority::High, Priority::Normal, Priority::Low] {
                if let Some(id) = inner.bucket_mut(priority).pop_front() {
                    inner.inflight.insert(id);
                    if let Some(task) = inner.tasks.get_mut(&id) {
                        task.status = TaskStatus::Running;
                        task.started_at = Some(SystemTime::now());
                        out.push(task.clone());
                    }
                    continue 'outer;
                }
            }
            break;
        }
        out
    }

    /// Mark a task successful. If `has_next_page` and there is budget left
    /// in `pagesPerDork`, spawn a page+1 task at raised priority.
    pub fn complete(&self, id: u64, urls: Vec<String>, has_next_page: bool) {
        let spawn = {
            let mut inner = self.inner.lock().unwrap();
            inner.inflight.remove(&id);
            let Some(task) = inner.tasks.get_mut(&id) else {
                return;
            };
            task.status = TaskStatus::Completed;
            task.completed_at = Some(SystemTime::now());
            task.urls = urls;
            inner.completed += 1;
            inner.processed.insert((task.dork.clone(), task.page));

            if has_next_page && task.page + 1 < self.config.pages_per_dork {
                Some((task.dork.clone(), task.page + 1, task.priority.raised()))
            } else {
                None
            }
        };
        if let Some((dork, page, priority)) = spawn {
            self.add_page(&dork, page, priority);
        }
    }

    /// Retry or finalize a failed task.
    pub fn fail(&self, id: u64, error: impl Into<String>, retry: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.inflight.remove(&id);
        let error = error.into();
        let Some(task) = inner.tasks.get_mut(&id) else {
            return;
        };

        if retry && task.retry_count < task.retry_limit {
            task.retry_count += 1;
            task.priority = task.priority.raised();
            task.status = TaskStatus::Pending;
            task.error = Some(error);
            let priority = task.priority;
            drop(task);
            inner.bucket_mut(priority).push_back(id);
        } else {
            task.status = TaskStatus::Failed;
            task.completed_at = Some(SystemTime::now());
            task.error = Some(error);
            let dork = task.dork.clone();
            let page = task.page;
            inner.failed += 1;
            inner.processed.insert((dork, page));
        }
    }

    /// Equivalent to `Fail(id, reason, retry=true)`: the proxy path, not the
    /// queue, is where a blocked/captcha outcome is penalized.
    pub fn block(&self, id: u64, reason: impl Into<String>) {
        self.fail(id, reason, true);
    }

    pub fn pause(&self) {
        self.inner.lock().unwrap().paused = true;
    }

    pub fn resume(&self) {
        self.inner.lock().unwrap().paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.inner.lock().unwrap().paused
    }

    pub fn stats(&self) -> QueueStats {
        let inner = self.inner.lock().unwrap();
        let pending: usize = inner.buckets.iter().map(|b| b.len()).sum();
        QueueStats {
            pending,
            running: inner.inflight.len(),
            completed: inner.completed,
            failed: inner.failed,
        }
    }

    pub fn get(&self, id: u64) -> Option<Task> {
        self.inner.lock().unwrap().tasks.get(&id).cloned()
    }
}
