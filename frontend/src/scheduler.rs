use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use gloo_timers::callback::Timeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

/// Delayed one-shot tasks that can be superseded before they run.
pub trait Scheduler {
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TaskId;

    /// No-op for tasks that already ran or were cancelled.
    fn cancel(&self, id: TaskId);
}

impl<T: Scheduler + ?Sized> Scheduler for Rc<T> {
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TaskId {
        (**self).schedule(delay, task)
    }

    fn cancel(&self, id: TaskId) {
        (**self).cancel(id)
    }
}

/// Browser timers via `setTimeout`.
#[derive(Default)]
pub struct TimerScheduler {
    next: Cell<u64>,
    live: RefCell<HashMap<TaskId, Timeout>>,
    // A timeout cannot be dropped from inside its own callback, so fired
    // tasks are swept on the next schedule or cancel.
    fired: Rc<RefCell<Vec<TaskId>>>,
}

impl TimerScheduler {
    fn sweep(&self) {
        let fired: Vec<TaskId> = self.fired.borrow_mut().drain(..).collect();
        if fired.is_empty() {
            return;
        }
        let mut live = self.live.borrow_mut();
        for id in fired {
            live.remove(&id);
        }
    }
}

impl Scheduler for TimerScheduler {
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TaskId {
        self.sweep();
        let id = TaskId(self.next.get());
        self.next.set(id.0 + 1);

        let fired = self.fired.clone();
        let millis = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
        let timeout = Timeout::new(millis, move || {
            task();
            fired.borrow_mut().push(id);
        });
        self.live.borrow_mut().insert(id, timeout);
        id
    }

    fn cancel(&self, id: TaskId) {
        self.sweep();
        // Dropping a pending timeout clears it.
        drop(self.live.borrow_mut().remove(&id));
    }
}

/// Deterministic scheduler driven by explicit clock advances.
#[cfg(test)]
#[derive(Default)]
pub struct ManualScheduler {
    now: Cell<Duration>,
    next: Cell<u64>,
    queue: RefCell<Vec<(Duration, TaskId, Box<dyn FnOnce()>)>>,
}

#[cfg(test)]
impl ManualScheduler {
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Runs every task due within `by`, in due order, including tasks
    /// scheduled by other tasks along the way.
    pub fn advance(&self, by: Duration) {
        let target = self.now.get() + by;
        loop {
            let due = {
                let mut queue = self.queue.borrow_mut();
                let next = queue
                    .iter()
                    .enumerate()
                    .filter(|(_, (at, _, _))| *at <= target)
                    .min_by_key(|(_, (at, id, _))| (*at, id.0))
                    .map(|(i, _)| i);
                next.map(|i| queue.remove(i))
            };
            match due {
                Some((at, _, task)) => {
                    self.now.set(at);
                    task();
                }
                None => break,
            }
        }
        self.now.set(target);
    }
}

#[cfg(test)]
impl Scheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: Box<dyn FnOnce()>) -> TaskId {
        let id = TaskId(self.next.get());
        self.next.set(id.0 + 1);
        self.queue
            .borrow_mut()
            .push((self.now.get() + delay, id, task));
        id
    }

    fn cancel(&self, id: TaskId) {
        self.queue.borrow_mut().retain(|(_, queued, _)| *queued != id);
    }
}
