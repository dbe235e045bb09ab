mod common;

use std::sync::Arc;
use std::time::Duration;

use common::strategies::*;
use dashflow_core::scheduler::{Job, JobExecutor};
use dashflow_core::state_machine::{RetryManager, RetryStatus, StateEvent};
use parking_lot::Mutex;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Property: an executor drains lower priority values first, FIFO among ties
    #[test]
    fn executor_drains_by_priority_then_arrival(priorities in priorities_strategy()) {
        // The tick is long enough that only the explicit run_next calls drain the queue
        let executor = Arc::new(JobExecutor::new("prop", 0, priorities.len(), Duration::from_secs(3600)));
        executor.start().unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        for (arrival, priority) in priorities.iter().copied().enumerate() {
            let order = Arc::clone(&order);
            let job = Job::builder(format!("job-{arrival}"))
                .priority(priority)
                .task(move || {
                    order.lock().push((priority, arrival));
                    Ok(())
                })
                .build()
                .unwrap();
            executor.enqueue(job).unwrap();
        }

        while executor.run_next() {}
        executor.stop();

        let observed = order.lock().clone();
        let mut expected: Vec<(i32, usize)> = priorities.iter().copied().zip(0..).collect();
        expected.sort();
        prop_assert_eq!(observed, expected);
    }

    /// Property: a retry ceiling of L yields L retries, then one terminal firing
    #[test]
    fn retry_ceiling_bounds_retries(limit in 1u32..20) {
        let retries = RetryManager::new();
        prop_assert!(retries.add_retry_unit("unit:WAITING:key", limit));

        for _ in 0..limit {
            prop_assert_eq!(retries.check_retry("unit:WAITING:key"), RetryStatus::Ongoing);
        }
        prop_assert_eq!(retries.check_retry("unit:WAITING:key"), RetryStatus::Idle);
        prop_assert_eq!(retries.check_retry("unit:WAITING:key"), RetryStatus::None);
        prop_assert!(retries.is_empty());
    }

    /// Property: walking a declared chain of events visits every state in order
    #[test]
    fn declared_chain_is_walked_in_order(states in state_chain_strategy()) {
        let manager = common::state_manager("prop-chain");
        let handler = manager.add_state_handler("Chain");
        for pair in states.windows(2) {
            let event = StateEvent::builder(format!("TO_{}", pair[1]))
                .from_state(pair[0].as_str())
                .to_state(pair[1].as_str())
                .build()
                .unwrap();
            handler.add_state(event).unwrap();
        }

        let unit = manager.add_state_unit("walker", "Chain", &states[0], None).unwrap();
        for state in &states[1..] {
            let reached = handler.fire(&format!("TO_{state}"), &unit);
            prop_assert_eq!(reached.as_deref(), Some(state.as_str()));
        }
        prop_assert_eq!(unit.cur_state(), states[states.len() - 1].clone());
    }

    /// Property: an event never accepts the state it leads to
    #[test]
    fn to_state_outside_from_states(from in state_name_strategy(), to in state_name_strategy()) {
        let built = StateEvent::builder("EVENT").from_state(from.as_str()).to_state(to.as_str()).build();
        prop_assert_eq!(built.is_ok(), from != to);
        if let Ok(event) = built {
            prop_assert!(!event.accepts(event.to_state()));
        }
    }
}
