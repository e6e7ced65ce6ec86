use crate::clock::VirtualClock;
use crate::rng::Lcg;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

pub type TaskId = u64;

type Callback = Box<dyn FnOnce(&mut Scheduler)>;

struct Task {
    time: u64,
    priority: u64,
    seq: u64,
    id: TaskId,
    callback: Callback,
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        (self.time, self.priority, self.seq) == (other.time, other.priority, other.seq)
    }
}
impl Eq for Task {}

// `BinaryHeap` is a max-heap; reversing the natural (time, priority, seq)
// order turns it into the min-heap the scheduler's ordering contract
// requires: earliest time first, then lowest priority, then insertion order.
impl Ord for Task {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.time, self.priority, self.seq)
            .cmp(&(other.time, other.priority, other.seq))
            .reverse()
    }
}
impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A seeded, single-threaded discrete-event scheduler. Owns the PRNG so
/// that every random decision made by the network and disk simulations
/// draws from the same reproducible stream.
pub struct Scheduler {
    clock: VirtualClock,
    rng: Lcg,
    queue: BinaryHeap<Task>,
    next_id: TaskId,
    next_seq: u64,
}

impl Scheduler {
    pub fn new(seed: u64) -> Self {
        Self {
            clock: VirtualClock::new(),
            rng: Lcg::new(seed),
            queue: BinaryHeap::new(),
            next_id: 1,
            next_seq: 0,
        }
    }

    pub fn with_drift_factor(seed: u64, drift_factor: f64) -> Self {
        Self {
            clock: VirtualClock::with_drift_factor(drift_factor),
            ..Self::new(seed)
        }
    }

    pub fn rng_mut(&mut self) -> &mut Lcg {
        &mut self.rng
    }

    pub fn clock(&self) -> &VirtualClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut VirtualClock {
        &mut self.clock
    }

    /// Queues `callback` to run at `time`, breaking ties by `priority`
    /// (lower first) then by insertion order. Returns the task's id.
    pub fn schedule(
        &mut self,
        time: u64,
        priority: u64,
        callback: impl FnOnce(&mut Scheduler) + 'static,
    ) -> TaskId {
        let id = self.next_id;
        self.next_id += 1;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Task {
            time,
            priority,
            seq,
            id,
            callback: Box::new(callback),
        });
        id
    }

    /// Runs exactly one task: the earliest by the queue's ordering.
    /// Returns its id, or `None` if the queue is empty.
    pub fn step(&mut self) -> Option<TaskId> {
        let task = self.queue.pop()?;
        self.clock.advance_to(task.time);
        let id = task.id;
        (task.callback)(self);
        Some(id)
    }

    /// Repeatedly pops the earliest task and runs it. If a popped task's
    /// time exceeds `max_time`, it is pushed back and the loop exits
    /// (`max_time = None` runs until the queue is drained). Returns the
    /// number of tasks executed.
    pub fn run(&mut self, max_time: Option<u64>) -> u64 {
        let mut executed = 0;
        loop {
            let Some(task) = self.queue.pop() else {
                break;
            };
            if let Some(max) = max_time {
                if task.time > max {
                    self.queue.push(task);
                    break;
                }
            }
            self.clock.advance_to(task.time);
            (task.callback)(self);
            executed += 1;
        }
        executed
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn tasks_run_in_time_then_priority_then_insertion_order() {
        let mut sched = Scheduler::new(1);
        let order = Rc::new(RefCell::new(Vec::new()));

        let o1 = Rc::clone(&order);
        sched.schedule(5, 0, move |_| o1.borrow_mut().push("t5"));
        let o2 = Rc::clone(&order);
        sched.schedule(1, 1, move |_| o2.borrow_mut().push("t1-p1"));
        let o3 = Rc::clone(&order);
        sched.schedule(1, 0, move |_| o3.borrow_mut().push("t1-p0"));

        sched.run(None);
        assert_eq!(*order.borrow(), vec!["t1-p0", "t1-p1", "t5"]);
    }

    #[test]
    fn run_stops_before_a_task_past_max_time_and_keeps_it_queued() {
        let mut sched = Scheduler::new(1);
        let ran = Rc::new(RefCell::new(false));
        let flag = Rc::clone(&ran);
        sched.schedule(100, 0, move |_| *flag.borrow_mut() = true);

        let executed = sched.run(Some(50));
        assert_eq!(executed, 0);
        assert!(!*ran.borrow());
        assert_eq!(sched.pending_count(), 1);

        sched.run(Some(100));
        assert!(*ran.borrow());
    }

    #[test]
    fn step_runs_exactly_one_task() {
        let mut sched = Scheduler::new(1);
        let count = Rc::new(RefCell::new(0));
        for _ in 0..3 {
            let c = Rc::clone(&count);
            sched.schedule(0, 0, move |_| *c.borrow_mut() += 1);
        }

        sched.step();
        assert_eq!(*count.borrow(), 1);
        assert_eq!(sched.pending_count(), 2);
    }

    #[test]
    fn callbacks_can_schedule_further_tasks() {
        let mut sched = Scheduler::new(1);
        let order = Rc::new(RefCell::new(Vec::new()));
        let o1 = Rc::clone(&order);
        sched.schedule(0, 0, move |sched| {
            o1.borrow_mut().push("first");
            let o2 = Rc::clone(&o1);
            sched.schedule(1, 0, move |_| o2.borrow_mut().push("second"));
        });

        sched.run(None);
        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn same_seed_drives_identical_rng_draws_regardless_of_scheduling() {
        let mut a = Scheduler::new(42);
        let mut b = Scheduler::new(42);
        for _ in 0..20 {
            assert_eq!(a.rng_mut().next_u64(), b.rng_mut().next_u64());
        }
    }
}
