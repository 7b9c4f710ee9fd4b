//! Line-oriented frame collector.
//!
//! The emotion classifier runs out of process and writes one JSON object per
//! processed frame (see [`FrameInput`]). This collector reads those lines on a
//! background thread and forwards them as [`FrameEvent`]s over a bounded
//! channel, so the processing loop only ever waits at the frame boundary.

use crate::collector::types::{FrameEvent, FrameInput};
use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Configuration for the frame collector.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Capacity of the frame channel
    pub channel_capacity: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 10_000,
        }
    }
}

/// Errors that can occur during frame collection.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Collector is already running")]
    AlreadyRunning,
    #[error("Collector input was already consumed")]
    InputConsumed,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

type FrameReader = Box<dyn BufRead + Send>;

/// Reads classifier output line by line on a background thread.
pub struct ReplayCollector {
    config: CollectorConfig,
    reader: Option<FrameReader>,
    sender: Option<Sender<FrameEvent>>,
    receiver: Receiver<FrameEvent>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReplayCollector {
    /// Create a collector over any buffered reader (file, stdin, pipe).
    pub fn new<R>(config: CollectorConfig, reader: R) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (sender, receiver) = bounded(config.channel_capacity);
        Self {
            config,
            reader: Some(Box::new(reader)),
            sender: Some(sender),
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Create a collector over a file of JSON lines.
    pub fn from_path(
        config: CollectorConfig,
        path: &std::path::Path,
    ) -> Result<Self, CollectorError> {
        let file = std::fs::File::open(path)?;
        Ok(Self::new(config, std::io::BufReader::new(file)))
    }

    /// Start reading frames.
    ///
    /// The reader thread owns the only sender, so the channel disconnects once
    /// the input is exhausted or [`stop`](Self::stop) is called.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }
        let (reader, sender) = match (self.reader.take(), self.sender.take()) {
            (Some(reader), Some(sender)) => (reader, sender),
            _ => return Err(CollectorError::InputConsumed),
        };

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        tracing::debug!(capacity = self.config.channel_capacity, "frame collector started");

        self.handle = Some(thread::spawn(move || {
            read_frames(reader, &sender, &running);
            running.store(false, Ordering::SeqCst);
        }));
        Ok(())
    }

    /// Stop forwarding frames. Lines already queued stay in the channel.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the reader thread is still forwarding frames.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for frame events.
    pub fn receiver(&self) -> &Receiver<FrameEvent> {
        &self.receiver
    }

    /// Try to receive a frame without blocking.
    pub fn try_recv(&self) -> Option<FrameEvent> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for ReplayCollector {
    fn drop(&mut self) {
        self.stop();
        // A reader blocked on stdin cannot be interrupted; detach instead of joining.
        if let Some(handle) = self.handle.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }
}

fn read_frames(reader: FrameReader, sender: &Sender<FrameEvent>, running: &AtomicBool) {
    for line in reader.lines() {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("frame input read failed: {e}");
                break;
            }
        };
        let Some(event) = parse_line(&line) else {
            continue;
        };
        if sender.send(event).is_err() {
            break;
        }
    }
}

/// Parse one line of classifier output.
///
/// Blank lines yield nothing; a line that is not a valid frame object becomes
/// [`FrameEvent::Unavailable`] so the gap is still accounted for.
pub fn parse_line(line: &str) -> Option<FrameEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    let now = Utc::now();
    match serde_json::from_str::<FrameInput>(trimmed) {
        Ok(input) => Some(input.into_event(now)),
        Err(e) => {
            tracing::debug!("unparseable frame line: {e}");
            Some(FrameEvent::Unavailable { timestamp: now })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::EmotionLabel;
    use std::io::Cursor;
    use std::time::Duration;

    #[test]
    fn test_parse_line_variants() {
        assert!(parse_line("   ").is_none());
        assert!(matches!(
            parse_line("not json"),
            Some(FrameEvent::Unavailable { .. })
        ));
        match parse_line(r#"{"timestamp":"2024-01-22T10:00:01Z","emotions":{"sad":0.4}}"#) {
            Some(FrameEvent::Frame { timestamp, vector }) => {
                assert_eq!(timestamp.to_rfc3339(), "2024-01-22T10:00:01+00:00");
                assert_eq!(vector.get(EmotionLabel::Sad), 0.4);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_collector_forwards_all_lines_then_disconnects() {
        let input = concat!(
            r#"{"emotions":{"angry":0.6,"sad":0.1,"fear":0.1}}"#,
            "\n\n",
            r#"{"emotions":null}"#,
            "\n",
            "garbage\n",
        );
        let mut collector = ReplayCollector::new(CollectorConfig::default(), Cursor::new(input));
        collector.start().unwrap();

        let receiver = collector.receiver().clone();
        let mut events = Vec::new();
        while let Ok(event) = receiver.recv_timeout(Duration::from_secs(2)) {
            events.push(event);
        }

        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], FrameEvent::Frame { .. }));
        assert!(matches!(events[1], FrameEvent::Unavailable { .. }));
        assert!(matches!(events[2], FrameEvent::Unavailable { .. }));
    }

    #[test]
    fn test_collector_cannot_start_twice() {
        let mut collector =
            ReplayCollector::new(CollectorConfig::default(), Cursor::new(String::new()));
        collector.start().unwrap();
        assert!(collector.start().is_err());
    }
}
