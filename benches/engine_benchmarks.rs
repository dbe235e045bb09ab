use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use std::time::Duration;

use dashflow_core::scheduler::{Job, JobExecutor, TimerService};
use dashflow_core::state_machine::{StateEvent, StateManager};

fn benchmark_explicit_transition(c: &mut Criterion) {
    let manager = StateManager::new(TimerService::new("bench-fsm", 1, 1).unwrap());
    let handler = manager.add_state_handler("Bench");
    handler
        .add_state(StateEvent::builder("PING").from_state("A").to_state("B").build().unwrap())
        .unwrap();
    handler
        .add_state(StateEvent::builder("PONG").from_state("B").to_state("A").build().unwrap())
        .unwrap();
    let unit = manager.add_state_unit("unit", "Bench", "A", None).unwrap();

    c.bench_function("explicit_transition_round_trip", |b| {
        b.iter(|| {
            black_box(handler.fire("PING", &unit));
            black_box(handler.fire("PONG", &unit));
        })
    });
}

fn benchmark_escalation_arm_and_cancel(c: &mut Criterion) {
    let manager = StateManager::new(TimerService::new("bench-escalation", 1, 1).unwrap());
    let handler = manager.add_state_handler("Bench");
    handler
        .add_state(
            StateEvent::builder("REQUEST")
                .from_state("IDLE")
                .to_state("WAITING")
                .escalate_to("TIMEOUT", Duration::from_secs(60), 3)
                .build()
                .unwrap(),
        )
        .unwrap();
    handler
        .add_state(StateEvent::builder("RESPONSE").from_state("WAITING").to_state("IDLE").build().unwrap())
        .unwrap();
    let unit = manager.add_state_unit("unit", "Bench", "IDLE", None).unwrap();

    c.bench_function("escalation_arm_and_supersede", |b| {
        b.iter(|| {
            black_box(handler.fire("REQUEST", &unit));
            black_box(handler.fire("RESPONSE", &unit));
        })
    });
}

fn benchmark_executor_priority_queue(c: &mut Criterion) {
    let executor = Arc::new(JobExecutor::new("bench", 0, 64, Duration::from_secs(3600)));
    executor.start().unwrap();
    let jobs: Vec<Arc<Job>> = (0..64)
        .map(|i| {
            Job::builder(format!("job-{i}"))
                .priority(i % 7)
                .task(|| Ok(()))
                .build()
                .unwrap()
        })
        .collect();

    c.bench_function("executor_enqueue_and_drain_64", |b| {
        b.iter(|| {
            for job in &jobs {
                executor.enqueue(Arc::clone(job)).unwrap();
            }
            while executor.run_next() {}
        })
    });
    executor.stop();
}

criterion_group!(
    benches,
    benchmark_explicit_transition,
    benchmark_escalation_arm_and_cancel,
    benchmark_executor_priority_queue
);
criterion_main!(benches);
