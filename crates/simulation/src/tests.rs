use super::*;
use std::cell::RefCell;
use std::rc::Rc;

// §8 scenario 6: two nodes A and B, partitioned. sendMessage(A,B,"hi")
// followed by run(None) leaves B's handler un-invoked. healPartitions()
// and re-send leaves B's handler invoked exactly once, at a scheduler
// time in [now+delay_min, now+delay_max].
#[test]
fn partitioned_send_then_heal_delivers_exactly_once_within_delay_window() {
    const A: NodeId = 1;
    const B: NodeId = 2;
    const DELAY_MIN: u64 = 3;
    const DELAY_MAX: u64 = 7;

    let net = SimulatedNetwork::new(DELAY_MIN, DELAY_MAX, 0.0);
    let mut sched = Scheduler::new(2024);
    let deliveries: Rc<RefCell<Vec<u64>>> = Rc::new(RefCell::new(Vec::new()));

    // Record the scheduler's raw time at the moment the handler runs by
    // stashing a clone of the clock's raw_now via a side channel: the
    // handler closure can't see `sched` directly, so the test instead
    // checks the task's delivery window by bracketing run() calls.
    let d = Rc::clone(&deliveries);
    net.borrow_mut().register_handler(B, move |_from, _payload| {
        d.borrow_mut().push(1);
    });

    net.borrow_mut().partition([A]);
    let now_before_partitioned_send = sched.clock().raw_now();
    SimulatedNetwork::send_message(&net, &mut sched, A, B, b"hi".to_vec());
    sched.run(None);
    assert!(deliveries.borrow().is_empty(), "B must not be invoked across a partition");

    net.borrow_mut().heal_partitions();
    let now_before_resend = sched.clock().raw_now();
    SimulatedNetwork::send_message(&net, &mut sched, A, B, b"hi".to_vec());
    sched.run(None);

    assert_eq!(deliveries.borrow().len(), 1, "B's handler must be invoked exactly once");
    let delivered_at = sched.clock().raw_now();
    assert!(delivered_at >= now_before_resend + DELAY_MIN);
    assert!(delivered_at <= now_before_resend + DELAY_MAX);
    assert_eq!(now_before_partitioned_send, 0);
}

#[test]
fn drift_factor_is_visible_through_the_scheduler_clock() {
    let mut sched = Scheduler::with_drift_factor(1, 3.0);
    sched.schedule(10, 0, |_| {});
    sched.run(None);
    assert_eq!(sched.clock().raw_now(), 10);
    assert_eq!(sched.clock().observed_now(), 30);
}

#[test]
fn disk_and_network_draw_from_the_same_scheduler_rng_stream() {
    let mut sched_a = Scheduler::new(55);
    let mut sched_b = Scheduler::new(55);
    let mut disk_a = SimulatedDisk::new((1, 4), (1, 4), 0.1, 0.1, 0.01);
    let mut disk_b = SimulatedDisk::new((1, 4), (1, 4), 0.1, 0.1, 0.01);

    for i in 0..5u8 {
        let path = format!("f{i}");
        let r1 = disk_a.write(&mut sched_a, path.clone(), vec![i; 4]);
        let r2 = disk_b.write(&mut sched_b, path, vec![i; 4]);
        assert_eq!(r1.is_ok(), r2.is_ok());
    }
}
