mod common;

use std::thread;
use std::time::Duration;

use common::{state_manager, wait_until, Counter};
use dashflow_core::state_machine::StateUnit;
use dashflow_core::streaming::{
    register_dash_client_fsm, DashClientEvent, DashClientFsmOptions, DashClientState,
    DASH_CLIENT_HANDLER,
};

fn fire(
    manager: &dashflow_core::StateManager,
    event: DashClientEvent,
    unit: &std::sync::Arc<StateUnit>,
) -> Option<DashClientState> {
    manager
        .fire(event.as_str(), unit)
        .and_then(|state| state.parse().ok())
}

#[test]
fn test_missing_media_segment_falls_back_to_idle() {
    let manager = state_manager("dash-timeout");
    let resends = Counter::new();
    let timeouts = Counter::new();

    let resend_counter = resends.clone();
    let timeout_counter = timeouts.clone();
    let options = DashClientFsmOptions::new()
        .media_segment_timeout(Duration::from_millis(80), 1)
        .on_media_segment_retry(move |_unit: &StateUnit| {
            resend_counter.incr();
            None
        })
        .on_success(DashClientEvent::MediaSegTimeout, move |_unit: &StateUnit| {
            timeout_counter.incr();
            None
        });
    register_dash_client_fsm(&manager, options).unwrap();

    let session = manager
        .add_state_unit("session-1", DASH_CLIENT_HANDLER, DashClientState::Idle.as_str(), None)
        .unwrap();

    assert_eq!(
        fire(&manager, DashClientEvent::GetMpdVideo, &session),
        Some(DashClientState::MpdDone)
    );
    assert_eq!(
        fire(&manager, DashClientEvent::GetVideoInitSeg, &session),
        Some(DashClientState::VideoInitSegDone)
    );

    assert!(wait_until(Duration::from_secs(1), || {
        session.cur_state() == DashClientState::Idle.as_str()
    }));
    assert_eq!(resends.get(), 1);
    assert_eq!(timeouts.get(), 0);
    assert_eq!(session.prev_state().as_deref(), Some("VIDEO_INIT_SEG_DONE"));
}

#[test]
fn test_media_segment_in_time_keeps_session_progressing() {
    let manager = state_manager("dash-in-time");
    let resends = Counter::new();
    let resend_counter = resends.clone();
    let options = DashClientFsmOptions::new()
        .media_segment_timeout(Duration::from_millis(100), 2)
        .on_media_segment_retry(move |_unit: &StateUnit| {
            resend_counter.incr();
            None
        });
    let handler = register_dash_client_fsm(&manager, options).unwrap();

    let session = manager
        .add_state_unit("session-1", DASH_CLIENT_HANDLER, "IDLE", None)
        .unwrap();
    fire(&manager, DashClientEvent::GetMpdAudio, &session);
    fire(&manager, DashClientEvent::GetAudioInitSeg, &session);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(
        fire(&manager, DashClientEvent::GetAudioMediaSeg, &session),
        Some(DashClientState::AudioMediaSegDone)
    );
    assert_eq!(handler.task_manager().task_count(), 0);

    thread::sleep(Duration::from_millis(300));
    assert_eq!(resends.get(), 0);
    assert_eq!(session.cur_state(), "AUDIO_MEDIA_SEG_DONE");

    assert_eq!(
        fire(&manager, DashClientEvent::Idle, &session),
        Some(DashClientState::Idle)
    );
}

#[test]
fn test_wrong_track_media_segment_is_rejected() {
    let manager = state_manager("dash-mismatch");
    let rejected = Counter::new();
    let rejected_counter = rejected.clone();
    let options = DashClientFsmOptions::new().on_fail(
        DashClientEvent::GetVideoMediaSeg,
        move |_unit: &StateUnit| {
            rejected_counter.incr();
            None
        },
    );
    register_dash_client_fsm(&manager, options).unwrap();

    let session = manager
        .add_state_unit("session-1", DASH_CLIENT_HANDLER, "IDLE", None)
        .unwrap();
    fire(&manager, DashClientEvent::GetMpdAudio, &session);
    fire(&manager, DashClientEvent::GetAudioInitSeg, &session);

    assert_eq!(
        fire(&manager, DashClientEvent::GetVideoMediaSeg, &session),
        Some(DashClientState::AudioInitSegDone)
    );
    assert_eq!(rejected.get(), 1);
}
