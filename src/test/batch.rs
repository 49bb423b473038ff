use super::{COMPUTE, SLEEP, procs};
use crate::protocol::RequestBatch;
use crate::sim::{Request, RequestBody, SimTime};

fn set_state(at: u64, resources: &str, state: crate::platform::PowerStateId) -> Request {
    Request::new(
        SimTime(at),
        RequestBody::SetResourceState {
            resources: procs(resources),
            state,
        },
    )
}

fn call_me_later(at: u64, wake: f64) -> Request {
    Request::new(SimTime(at), RequestBody::CallMeLater { at: wake })
}

#[test]
fn power_requests_for_same_step_and_state_are_merged() {
    let mut batch = RequestBatch::new();
    assert!(batch.push(set_state(3, "0-1", SLEEP)));
    assert!(!batch.push(set_state(3, "4", SLEEP)));
    assert!(batch.push(set_state(3, "2", COMPUTE)));
    assert!(batch.push(set_state(4, "5", SLEEP)));

    assert_eq!(batch.len(), 3);
    match &batch.requests()[0].body {
        RequestBody::SetResourceState { resources, state } => {
            assert_eq!(resources.to_string(), "0-1 4");
            assert_eq!(*state, SLEEP);
        }
        other => panic!("unexpected request {other:?}"),
    }
}

#[test]
fn duplicate_wakeups_collapse() {
    let mut batch = RequestBatch::new();
    assert!(batch.push(call_me_later(0, 10.0009)));
    assert!(!batch.push(call_me_later(0, 10.0009)));
    assert!(batch.push(call_me_later(0, 20.0009)));
    assert_eq!(batch.len(), 2);
}

#[test]
fn drain_orders_by_timestamp_and_resets_merging() {
    let mut batch = RequestBatch::new();
    batch.push(Request::new(
        SimTime(5),
        RequestBody::RejectJob {
            job_id: "late".to_string(),
        },
    ));
    batch.push(set_state(2, "0", SLEEP));
    batch.push(Request::new(
        SimTime(2),
        RequestBody::RejectJob {
            job_id: "early".to_string(),
        },
    ));

    let drained = batch.drain();
    assert!(batch.is_empty());
    let order: Vec<_> = drained.iter().map(|r| (r.timestamp, r.body.name())).collect();
    assert_eq!(
        order,
        vec![
            (SimTime(2), "SET_RESOURCE_STATE"),
            (SimTime(2), "REJECT_JOB"),
            (SimTime(5), "REJECT_JOB"),
        ]
    );

    // 发送后同一步的请求不再并入旧请求
    assert!(batch.push(set_state(2, "1", SLEEP)));
}
