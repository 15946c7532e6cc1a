// THEORY:
// The tracker is strictly sequential: one frame must finish before the next one
// starts, and nothing else may touch its store in between. A host that watches
// many cameras still wants to work on all of them at once.
//
// The `StreamHub` squares the two with one actor task per stream. Each actor owns
// its `TrackingPipeline` outright and drains a message queue one message at a time,
// so frames of the same stream are serialized by construction while different
// streams make progress concurrently. Callers talk to an actor through a cheap,
// cloneable `StreamHandle`; every request carries a oneshot channel for the reply.

use crate::config::{DetectorConfig, TrackerConfig};
use crate::core_modules::detection::Detection;
use crate::core_modules::geometry::Point2;
use crate::error::{Result, TrackingError};
use crate::pipeline::{FrameReport, ObjectId, TrackedObject, TrackingPipeline};
use futures::future::join_all;
use image::GrayImage;
use log::{info, warn};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};

const STREAM_QUEUE_DEPTH: usize = 16;

/// Message type for stream actors.
enum StreamMessage {
    Detections(Vec<Detection>, oneshot::Sender<Result<FrameReport>>),
    Mask(GrayImage, oneshot::Sender<Result<FrameReport>>),
    Snapshot(oneshot::Sender<StreamSnapshot>),
    Reset(oneshot::Sender<()>),
    Shutdown,
}

/// An owned copy of one confirmed object, safe to send across tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSnapshot {
    pub id: ObjectId,
    pub position: Point2,
    pub trajectory: Vec<Point2>,
    pub frames_since_detection: u32,
    pub confirmed_detection_count: u32,
}

impl From<&TrackedObject> for ObjectSnapshot {
    fn from(object: &TrackedObject) -> Self {
        Self {
            id: object.id,
            position: object.latest_position(),
            trajectory: object.position_history.iter().copied().collect(),
            frames_since_detection: object.frames_since_detection,
            confirmed_detection_count: object.confirmed_detection_count,
        }
    }
}

/// The confirmed state of one stream at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSnapshot {
    pub frame_count: u64,
    pub confirmed: Vec<ObjectSnapshot>,
}

/// A handle to one stream's actor.
#[derive(Clone)]
pub struct StreamHandle {
    name: String,
    sender: mpsc::Sender<StreamMessage>,
}

impl StreamHandle {
    /// Validates the configuration and starts the stream's actor on the current
    /// tokio runtime.
    pub fn spawn(
        name: impl Into<String>,
        tracker_config: TrackerConfig,
        detector_config: DetectorConfig,
    ) -> Result<Self> {
        let name = name.into();
        let mut pipeline = TrackingPipeline::new(tracker_config, detector_config)?;
        let (sender, mut receiver) = mpsc::channel::<StreamMessage>(STREAM_QUEUE_DEPTH);

        let actor_name = name.clone();
        tokio::spawn(async move {
            info!("Stream '{}' started", actor_name);
            while let Some(message) = receiver.recv().await {
                match message {
                    StreamMessage::Detections(detections, reply) => {
                        let _ = reply.send(pipeline.process_detections(&detections));
                    }
                    StreamMessage::Mask(mask, reply) => {
                        let _ = reply.send(pipeline.process_mask(&mask));
                    }
                    StreamMessage::Snapshot(reply) => {
                        let _ = reply.send(StreamSnapshot {
                            frame_count: pipeline.frame_count(),
                            confirmed: pipeline
                                .tracked_objects(false)
                                .into_iter()
                                .map(ObjectSnapshot::from)
                                .collect(),
                        });
                    }
                    StreamMessage::Reset(reply) => {
                        pipeline.reset();
                        let _ = reply.send(());
                    }
                    StreamMessage::Shutdown => break,
                }
            }
            info!("Stream '{}' stopped", actor_name);
        });

        Ok(Self { name, sender })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> StreamMessage) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(build(reply))
            .await
            .map_err(|_| TrackingError::StreamClosed(self.name.clone()))?;
        response
            .await
            .map_err(|_| TrackingError::StreamClosed(self.name.clone()))
    }

    pub async fn submit_detections(&self, detections: Vec<Detection>) -> Result<FrameReport> {
        self.request(|reply| StreamMessage::Detections(detections, reply))
            .await?
    }

    pub async fn submit_mask(&self, mask: GrayImage) -> Result<FrameReport> {
        self.request(|reply| StreamMessage::Mask(mask, reply)).await?
    }

    pub async fn snapshot(&self) -> Result<StreamSnapshot> {
        self.request(StreamMessage::Snapshot).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.request(StreamMessage::Reset).await
    }

    /// Asks the actor to stop after the messages already queued.
    pub async fn shutdown(&self) {
        if self.sender.send(StreamMessage::Shutdown).await.is_err() {
            warn!("Stream '{}' was already stopped", self.name);
        }
    }
}

/// Owns one tracking actor per named stream.
pub struct StreamHub {
    tracker_config: TrackerConfig,
    detector_config: DetectorConfig,
    streams: HashMap<String, StreamHandle>,
}

impl StreamHub {
    pub fn new(tracker_config: TrackerConfig, detector_config: DetectorConfig) -> Result<Self> {
        tracker_config.validate()?;
        detector_config.validate()?;
        Ok(Self {
            tracker_config,
            detector_config,
            streams: HashMap::new(),
        })
    }

    /// Returns the stream's handle, starting its actor on first use.
    pub fn open_stream(&mut self, name: &str) -> Result<StreamHandle> {
        if let Some(handle) = self.streams.get(name) {
            return Ok(handle.clone());
        }
        let handle = StreamHandle::spawn(
            name,
            self.tracker_config.clone(),
            self.detector_config.clone(),
        )?;
        self.streams.insert(name.to_string(), handle.clone());
        Ok(handle)
    }

    pub fn stream(&self, name: &str) -> Result<&StreamHandle> {
        self.streams
            .get(name)
            .ok_or_else(|| TrackingError::UnknownStream(name.to_string()))
    }

    pub fn stream_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.streams.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Submits one frame to each named stream and waits for all of them. Results
    /// come back in submission order. Submitting two frames for the same stream in
    /// one batch is allowed; they are processed in the order given.
    pub async fn submit_frames(
        &self,
        frames: Vec<(String, Vec<Detection>)>,
    ) -> Vec<(String, Result<FrameReport>)> {
        let pending = frames.into_iter().map(|(name, detections)| async move {
            let result = match self.stream(&name) {
                Ok(handle) => handle.submit_detections(detections).await,
                Err(err) => Err(err),
            };
            (name, result)
        });
        join_all(pending).await
    }

    pub async fn close_stream(&mut self, name: &str) -> Result<()> {
        let handle = self
            .streams
            .remove(name)
            .ok_or_else(|| TrackingError::UnknownStream(name.to_string()))?;
        handle.shutdown().await;
        Ok(())
    }

    pub async fn shutdown(mut self) {
        for (_, handle) in self.streams.drain() {
            handle.shutdown().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::geometry::RotatedRect;

    fn square(cx: f64, cy: f64) -> Detection {
        Detection::new(
            Point2::new(cx, cy),
            RotatedRect::new(Point2::new(cx, cy), 10.0, 10.0, 0.0),
            100.0,
        )
    }

    fn hub() -> StreamHub {
        StreamHub::new(
            TrackerConfig {
                confirmation_threshold: 0,
                ..TrackerConfig::default()
            },
            DetectorConfig::default(),
        )
        .expect("valid config")
    }

    #[tokio::test]
    async fn streams_track_independently() {
        let mut hub = hub();
        hub.open_stream("north").expect("stream");
        hub.open_stream("south").expect("stream");
        assert_eq!(hub.stream_names(), vec!["north", "south"]);

        let results = hub
            .submit_frames(vec![
                ("north".to_string(), vec![square(0.0, 0.0)]),
                ("south".to_string(), vec![square(50.0, 50.0), square(0.0, 0.0)]),
            ])
            .await;
        assert_eq!(results[0].0, "north");
        let north = results[0].1.as_ref().expect("north report");
        let south = results[1].1.as_ref().expect("south report");
        assert_eq!(north.summary.spawned, vec![(0, ObjectId(0))]);
        assert_eq!(south.summary.spawned, vec![(0, ObjectId(0)), (1, ObjectId(1))]);

        hub.shutdown().await;
    }

    #[tokio::test]
    async fn frames_for_one_stream_are_processed_in_order() {
        let mut hub = hub();
        hub.open_stream("gate").expect("stream");
        let results = hub
            .submit_frames(vec![
                ("gate".to_string(), vec![square(0.0, 0.0)]),
                ("gate".to_string(), vec![square(1.0, 0.0)]),
            ])
            .await;
        let first = results[0].1.as_ref().expect("first");
        let second = results[1].1.as_ref().expect("second");
        assert_eq!(first.frame_index, 0);
        assert_eq!(second.frame_index, 1);
        assert_eq!(second.summary.matched, vec![(0, ObjectId(0))]);
    }

    #[tokio::test]
    async fn snapshot_and_reset_round_trip_through_actor() {
        let mut hub = hub();
        let handle = hub.open_stream("lobby").expect("stream");
        handle.submit_detections(vec![square(5.0, 5.0)]).await.expect("frame");

        let snapshot = handle.snapshot().await.expect("snapshot");
        assert_eq!(snapshot.frame_count, 1);
        assert_eq!(snapshot.confirmed.len(), 1);
        assert_eq!(snapshot.confirmed[0].position, Point2::new(5.0, 5.0));

        handle.reset().await.expect("reset");
        let snapshot = handle.snapshot().await.expect("snapshot");
        assert_eq!(snapshot.frame_count, 0);
        assert!(snapshot.confirmed.is_empty());
    }

    #[tokio::test]
    async fn unknown_and_closed_streams_report_errors() {
        let mut hub = hub();
        let results = hub
            .submit_frames(vec![("nowhere".to_string(), vec![])])
            .await;
        assert!(matches!(results[0].1, Err(TrackingError::UnknownStream(_))));

        let handle = hub.open_stream("dock").expect("stream");
        hub.close_stream("dock").await.expect("close");
        let err = handle.submit_detections(vec![]).await.unwrap_err();
        assert!(matches!(err, TrackingError::StreamClosed(_)));
    }

    #[tokio::test]
    async fn invalid_detection_is_reported_by_the_actor() {
        let mut hub = hub();
        let handle = hub.open_stream("yard").expect("stream");
        let mut bad = square(0.0, 0.0);
        bad.area = 0.0;
        let err = handle.submit_detections(vec![bad]).await.unwrap_err();
        assert!(matches!(err, TrackingError::InvalidDetection { index: 0, .. }));
        // The actor survives a rejected frame.
        let report = handle.submit_detections(vec![square(0.0, 0.0)]).await.expect("frame");
        assert_eq!(report.frame_index, 0);
    }
}
