use crate::scheduler::Scheduler;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub type NodeId = u64;

/// A simulated network: per-node message handlers, a set of partitions
/// (node groups that can only reach each other), and a uniform delay
/// range plus loss probability applied to every send. Messages across a
/// partition boundary, or lost by probability, are silently dropped;
/// otherwise they are scheduled for delivery after a random delay drawn
/// from the owning scheduler's PRNG.
///
/// Shared via `Rc<RefCell<_>>` because a scheduled delivery callback
/// needs to reach back into the network to invoke the destination's
/// handler once its delay elapses.
pub struct SimulatedNetwork {
    handlers: HashMap<NodeId, Box<dyn FnMut(NodeId, Vec<u8>)>>,
    partitions: Vec<HashSet<NodeId>>,
    delay_min: u64,
    delay_max: u64,
    loss_probability: f64,
}

impl SimulatedNetwork {
    pub fn new(delay_min: u64, delay_max: u64, loss_probability: f64) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            handlers: HashMap::new(),
            partitions: Vec::new(),
            delay_min,
            delay_max,
            loss_probability,
        }))
    }

    pub fn register_handler(&mut self, node: NodeId, handler: impl FnMut(NodeId, Vec<u8>) + 'static) {
        self.handlers.insert(node, Box::new(handler));
    }

    /// Separates `nodes` from the rest of the network: no node inside the
    /// set can reach a node outside it (or vice versa) until healed.
    pub fn partition(&mut self, nodes: impl IntoIterator<Item = NodeId>) {
        self.partitions.push(nodes.into_iter().collect());
    }

    pub fn heal_partitions(&mut self) {
        self.partitions.clear();
    }

    fn are_partitioned(&self, a: NodeId, b: NodeId) -> bool {
        self.partitions
            .iter()
            .any(|group| group.contains(&a) != group.contains(&b))
    }

    /// Attempts to deliver `payload` from `from` to `to`. Drops silently
    /// if the pair is partitioned or the send is lost by probability;
    /// otherwise schedules invocation of `to`'s handler after a random
    /// delay in `[delay_min, delay_max]`.
    pub fn send_message(
        network: &Rc<RefCell<Self>>,
        scheduler: &mut Scheduler,
        from: NodeId,
        to: NodeId,
        payload: Vec<u8>,
    ) {
        let (partitioned, loss_probability, delay_min, delay_max) = {
            let net = network.borrow();
            (
                net.are_partitioned(from, to),
                net.loss_probability,
                net.delay_min,
                net.delay_max,
            )
        };
        if partitioned {
            return;
        }
        if scheduler.rng_mut().next_bool(loss_probability) {
            return;
        }

        let delay = scheduler.rng_mut().next_range(delay_min, delay_max);
        let deliver_at = scheduler.clock().raw_now() + delay;

        let net = Rc::clone(network);
        scheduler.schedule(deliver_at, 0, move |_sched| {
            let mut net = net.borrow_mut();
            if let Some(handler) = net.handlers.get_mut(&to) {
                handler(from, payload);
            }
        });
    }
}
