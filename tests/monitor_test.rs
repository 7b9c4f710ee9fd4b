//! End-to-end behaviour of the monitoring engine.

use chrono::{DateTime, Duration, Utc};
use std::io::Cursor;
use stress_sense_agent::collector::{parse_line, Collector, CollectorConfig};
use stress_sense_agent::core::{RecorderState, SkipReason};
use stress_sense_agent::{
    EmotionLabel, EmotionVector, FeedbackError, FrameEvent, FrameOutcome, Monitor,
    MonitorSettings,
};

fn frame(at: DateTime<Utc>, entries: &[(EmotionLabel, f64)]) -> FrameEvent {
    FrameEvent::Frame {
        timestamp: at,
        vector: EmotionVector::new(entries.iter().copied()),
    }
}

#[test]
fn test_angry_frame_triggers_alert() {
    let mut monitor = Monitor::default();
    let t0 = Utc::now();
    monitor.start_at(t0);

    let outcome = monitor.process_frame(frame(
        t0,
        &[
            (EmotionLabel::Angry, 0.6),
            (EmotionLabel::Sad, 0.1),
            (EmotionLabel::Fear, 0.1),
            (EmotionLabel::Happy, 0.1),
            (EmotionLabel::Disgust, 0.05),
            (EmotionLabel::Surprise, 0.03),
            (EmotionLabel::Neutral, 0.02),
        ],
    ));

    let FrameOutcome::Recorded(update) = outcome else {
        panic!("frame should be recorded");
    };
    assert_eq!(update.dominant, EmotionLabel::Angry);
    assert!((update.stress - 26.67).abs() < 1e-9);
    assert!(update.alert);
}

#[test]
fn test_session_summary_from_three_frames() {
    let mut monitor = Monitor::default();
    let t0 = Utc::now();
    monitor.start_at(t0);

    for (i, label) in [EmotionLabel::Angry, EmotionLabel::Angry, EmotionLabel::Happy]
        .into_iter()
        .enumerate()
    {
        monitor.process_frame(frame(t0 + Duration::seconds(i as i64), &[(label, 0.8)]));
    }

    let summary = monitor.stop_at(t0 + Duration::seconds(3)).unwrap();
    assert_eq!(summary.dominant_emotion, Some(EmotionLabel::Angry));
    let shares: Vec<(EmotionLabel, f64)> = summary
        .emotion_distribution
        .iter()
        .map(|s| (s.label, s.percent))
        .collect();
    assert_eq!(
        shares,
        vec![(EmotionLabel::Angry, 66.67), (EmotionLabel::Happy, 33.33)]
    );
}

#[test]
fn test_start_then_stop_without_frames() {
    let mut monitor = Monitor::default();
    let t0 = Utc::now();
    monitor.start_at(t0);

    let summary = monitor.stop_at(t0 + Duration::milliseconds(1500)).unwrap();
    assert_eq!(summary.duration_secs, 1.5);
    assert_eq!(summary.average_stress, None);
    assert!(summary.emotion_distribution.is_empty());
    assert!(summary.to_string().contains("no data"));
}

#[test]
fn test_window_horizon_over_long_session() {
    let mut monitor = Monitor::new(MonitorSettings::default());
    let t0 = Utc::now();
    monitor.start_at(t0);

    // One frame every 700ms for two minutes.
    let mut last = None;
    for i in 0..172 {
        let at = t0 + Duration::milliseconds(i * 700);
        if let FrameOutcome::Recorded(update) =
            monitor.process_frame(frame(at, &[(EmotionLabel::Fear, 0.3)]))
        {
            last = Some(update);
        }
    }

    // 30s / 0.7s = 42.86, so 43 samples fit (including both ends).
    let update = last.unwrap();
    assert_eq!(update.window.len(), 43);
    let summary = monitor.stop_at(t0 + Duration::seconds(121)).unwrap();
    assert_eq!(summary.sample_count, 172);
    assert_eq!(summary.average_stress, Some(10.0));
}

#[test]
fn test_restart_discards_previous_session() {
    let mut monitor = Monitor::default();
    let t0 = Utc::now();
    let first = monitor.start_at(t0).session_id();
    monitor.process_frame(frame(t0, &[(EmotionLabel::Sad, 0.9)]));
    monitor.stop_at(t0 + Duration::seconds(1)).unwrap();

    let second = monitor.start_at(t0 + Duration::seconds(2)).session_id();
    assert_ne!(first, second);
    assert_eq!(monitor.state(), RecorderState::Active);
    assert!(monitor.live().window.is_empty());
    assert!(monitor.last_summary().is_none());

    assert_eq!(
        monitor.submit_feedback(first, [EmotionLabel::Sad]).unwrap_err(),
        FeedbackError::UnknownSession(first)
    );
}

#[test]
fn test_second_feedback_always_rejected() {
    let mut monitor = Monitor::default();
    let t0 = Utc::now();
    let id = monitor.start_at(t0).session_id();
    monitor.stop_at(t0).unwrap();

    monitor.submit_feedback(id, [EmotionLabel::Happy]).unwrap();
    for label in EmotionLabel::ALL {
        assert_eq!(
            monitor.submit_feedback(id, [label]).unwrap_err(),
            FeedbackError::AlreadySubmitted(id)
        );
    }
}

#[test]
fn test_collector_feeds_monitor() {
    let input = [
        r#"{"timestamp":"2024-01-22T10:00:00Z","emotions":{"Angry":0.9,"Happy":0.1}}"#,
        r#"{"timestamp":"2024-01-22T10:00:01Z","emotions":null}"#,
        r#"{"timestamp":"2024-01-22T10:00:02Z","emotions":{"happy":0.7,"sad":0.3}}"#,
    ]
    .join("\n");

    let mut collector = Collector::new(CollectorConfig::default(), Cursor::new(input));
    collector.start().unwrap();

    let mut monitor = Monitor::default();
    let t0: DateTime<Utc> = "2024-01-22T10:00:00Z".parse().unwrap();
    monitor.start_at(t0);

    let mut skipped = Vec::new();
    for event in collector.receiver().iter() {
        if let FrameOutcome::Skipped(reason) = monitor.process_frame(event) {
            skipped.push(reason);
        }
    }

    assert_eq!(skipped, vec![SkipReason::FrameUnavailable]);
    let summary = monitor.stop_at(t0 + Duration::seconds(3)).unwrap();
    assert_eq!(summary.sample_count, 2);
    assert_eq!(summary.duration_secs, 3.0);
    // (30 + 10) / 2
    assert_eq!(summary.average_stress, Some(20.0));
    assert_eq!(monitor.transparency().stats().frames_skipped, 1);
}

#[test]
fn test_malformed_entry_still_scores_frame() {
    let mut monitor = Monitor::default();
    monitor.start();

    let event = parse_line(r#"{"emotions":{"angry":null,"sad":0.9,"fear":0.6}}"#).unwrap();
    let FrameOutcome::Recorded(update) = monitor.process_frame(event) else {
        panic!("malformed entry should not drop the frame");
    };
    assert_eq!(update.stress, 50.0);
    assert_eq!(update.dominant, EmotionLabel::Sad);
    assert!(update.alert);

    assert!(matches!(
        parse_line("not json at all"),
        Some(FrameEvent::Unavailable { .. })
    ));
}

#[test]
fn test_frames_before_start_stay_inside_session() {
    let mut monitor = Monitor::default();
    let t0 = Utc::now();
    monitor.start_at(t0);
    monitor.process_frame(frame(t0 - Duration::seconds(600), &[(EmotionLabel::Sad, 0.6)]));
    monitor.process_frame(frame(t0 + Duration::milliseconds(500), &[(EmotionLabel::Sad, 0.6)]));
    monitor.stop_at(t0 + Duration::seconds(1)).unwrap();

    let report = monitor.last_report().unwrap();
    assert_eq!(report.summary.duration_secs, 1.0);
    assert_eq!(report.stress_timeline[0].timestamp, report.started_at);
    assert!(report
        .stress_timeline
        .iter()
        .all(|p| p.timestamp >= report.started_at));
}
