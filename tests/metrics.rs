#![cfg(feature = "metrics")]
//! Tests for `rsframe` metrics helpers.
//!
//! These tests verify that counters and gauges update as expected using
//! `metrics_util::debugging::DebuggingRecorder`.
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use rsframe::metrics::{self as rs_metrics, Direction, ErrorKind};
use rstest::rstest;

fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

#[rstest]
#[case(Direction::Inbound)]
#[case(Direction::Outbound)]
fn frame_metric_is_labelled_by_direction(#[case] direction: Direction) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || rs_metrics::inc_frames(direction));

    let metrics = snapshotter.snapshot().into_vec();
    let found = metrics.iter().any(|(k, _, _, v)| {
        k.key().name() == rs_metrics::FRAMES_PROCESSED
            && k.key()
                .labels()
                .any(|l| l.key() == "direction" && l.value() == direction.as_str())
            && matches!(v, DebugValue::Counter(c) if *c == 1)
    });
    assert!(found, "{direction:?} frames metric not recorded");
}

#[test]
fn error_metric_is_labelled_by_kind() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        rs_metrics::inc_errors(ErrorKind::Stream);
        rs_metrics::inc_errors(ErrorKind::Stream);
    });

    let metrics = snapshotter.snapshot().into_vec();
    let found = metrics.iter().any(|(k, _, _, v)| {
        k.key().name() == rs_metrics::ERRORS_TOTAL
            && k.key().labels().any(|l| l.key() == "kind" && l.value() == "stream")
            && matches!(v, DebugValue::Counter(c) if *c == 2)
    });
    assert!(found, "error metric not recorded");
}

#[test]
fn stream_gauge_tracks_open_and_close() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        rs_metrics::inc_streams();
        rs_metrics::inc_streams();
        rs_metrics::dec_streams();
    });

    let metrics = snapshotter.snapshot().into_vec();
    let found = metrics.iter().any(|(k, _, _, v)| {
        k.key().name() == rs_metrics::STREAMS_ACTIVE
            && matches!(v, DebugValue::Gauge(g) if (g.into_inner() - 1.0).abs() < f64::EPSILON)
    });
    assert!(found, "stream gauge not recorded: {metrics:#?}");
}
