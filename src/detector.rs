//! Face detection: the detector seam, the HTTP client for the inference
//! server, and the worker thread that feeds results to the control loop.

use crate::camera::{Frame, FrameBuffer};
use crate::constants::{
    DEFAULT_DETECTOR_TIMEOUT_MS, DEFAULT_DETECTOR_URL, JPEG_QUALITY, MAX_PIXEL_COORDINATE,
};
use crate::geometry::FaceBox;
use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use crossbeam_channel::{Sender, TrySendError};
use image::codecs::jpeg::JpegEncoder;
use log::{debug, info, warn};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Server model selected by the request path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMode {
    #[default]
    Face,
    Both,
}

impl DetectionMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Face => "face",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "face" => Ok(Self::Face),
            "both" => Ok(Self::Both),
            other => Err(Error::InvalidInput(format!("Unknown detection mode: {other}"))),
        }
    }
}

/// Face detection service.
///
/// `Err` means the call failed; `Ok` with an empty list means no face was found.
pub trait Detector: Send {
    fn detect(&self, frame: &Frame, mode: DetectionMode) -> Result<Vec<FaceBox>>;
}

/// HTTP connection settings for [`HttpDetector`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    /// Endpoint prefix; the mode is appended as the last path segment
    pub url: String,
    pub timeout_ms: u64,
    pub mode: DetectionMode,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_DETECTOR_URL.to_string(),
            timeout_ms: DEFAULT_DETECTOR_TIMEOUT_MS,
            mode: DetectionMode::Face,
        }
    }
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    image: &'a str,
}

#[derive(Deserialize)]
struct PredictResponse {
    face_locations: Option<Vec<Vec<f64>>>,
    error: Option<String>,
}

/// Client for the inference server's `/predict/{mode}` endpoints
pub struct HttpDetector {
    http: Client,
    base_url: String,
}

impl HttpDetector {
    /// # Errors
    ///
    /// Returns `Error::Http` if the client cannot be built
    pub fn new(settings: &DetectorSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()?;
        Ok(Self {
            http,
            base_url: settings.url.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self, mode: DetectionMode) -> String {
        format!("{}/{}", self.base_url, mode)
    }
}

/// JPEG-encode a frame and wrap it in base64
///
/// # Errors
///
/// Returns `Error::Image` if encoding fails
pub fn encode_frame(frame: &Frame) -> Result<String> {
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).encode_image(frame)?;
    Ok(STANDARD.encode(&jpeg))
}

fn to_face_box(location: &[f64]) -> Option<FaceBox> {
    if location.len() != 4
        || location
            .iter()
            .any(|v| !v.is_finite() || v.abs() > MAX_PIXEL_COORDINATE)
    {
        return None;
    }
    // Pixel coordinates; fractional values from the server are truncated
    let coords = [
        location[0] as i32,
        location[1] as i32,
        location[2] as i32,
        location[3] as i32,
    ];
    FaceBox::from_locations(coords).ok()
}

/// Parse a `face_locations` response body, skipping malformed boxes
///
/// # Errors
///
/// Returns `Error::Json` for malformed JSON and `Error::Detector` when the
/// body carries an error or no `face_locations` field
pub fn parse_face_locations(body: &str) -> Result<Vec<FaceBox>> {
    let response: PredictResponse = serde_json::from_str(body)?;
    if let Some(message) = response.error {
        return Err(Error::Detector(format!("Server error: {message}")));
    }
    let locations = response
        .face_locations
        .ok_or_else(|| Error::Detector("Response has no face_locations".to_string()))?;

    let mut faces = Vec::with_capacity(locations.len());
    for location in &locations {
        match to_face_box(location) {
            Some(face) => faces.push(face),
            None => warn!("Skipping malformed face location {:?}", location),
        }
    }
    Ok(faces)
}

impl Detector for HttpDetector {
    fn detect(&self, frame: &Frame, mode: DetectionMode) -> Result<Vec<FaceBox>> {
        let encoded = encode_frame(frame)?;
        let url = self.endpoint(mode);
        debug!("Posting {}x{} frame to {}", frame.width(), frame.height(), url);

        let response = self
            .http
            .post(&url)
            .json(&PredictRequest { image: &encoded })
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Error::Detector(format!("Server returned {status}: {body}")));
        }
        parse_face_locations(&response.text()?)
    }
}

/// One detector outcome together with the size of the frame it came from
#[derive(Debug)]
pub struct DetectionEvent {
    pub frame_id: u64,
    pub frame_width: u32,
    pub frame_height: u32,
    pub outcome: Result<Vec<FaceBox>>,
}

/// Runs the detector on the newest buffered frame and posts results
pub struct DetectionWorker {
    detector: Box<dyn Detector>,
    mode: DetectionMode,
    buffer: Arc<FrameBuffer>,
    events: Sender<DetectionEvent>,
    interval: Duration,
    shutdown: Arc<AtomicBool>,
}

impl DetectionWorker {
    pub fn new(
        detector: Box<dyn Detector>,
        mode: DetectionMode,
        buffer: Arc<FrameBuffer>,
        events: Sender<DetectionEvent>,
        interval: Duration,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            detector,
            mode,
            buffer,
            events,
            interval,
            shutdown,
        }
    }

    /// Detect until shut down or until the receiver goes away.
    /// Returns the number of events delivered.
    pub fn run(self) -> u64 {
        let mut last_seen = None;
        let mut delivered = 0u64;
        let mut dropped = 0u64;

        while !self.shutdown.load(Ordering::SeqCst) {
            let Some(buffered) = self.buffer.latest_after(last_seen) else {
                thread::sleep(self.interval);
                continue;
            };
            last_seen = Some(buffered.id);

            let event = DetectionEvent {
                frame_id: buffered.id,
                frame_width: buffered.frame.width(),
                frame_height: buffered.frame.height(),
                outcome: self.detector.detect(&buffered.frame, self.mode),
            };

            match self.events.try_send(event) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    dropped += 1;
                    debug!("Control loop busy, dropped detection for frame {}", buffered.id);
                }
                Err(TrySendError::Disconnected(_)) => {
                    debug!("Detection receiver gone, stopping");
                    break;
                }
            }
            thread::sleep(self.interval);
        }
        info!(
            "Detection stopped: {} delivered, {} dropped",
            delivered, dropped
        );
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_response() {
        let faces =
            parse_face_locations(r#"{"face_locations": [[50, 200, 150, 100], [0, 10, 10, 0]]}"#)
                .unwrap();
        assert_eq!(faces.len(), 2);
        assert_eq!(faces[0], FaceBox::new(50, 200, 150, 100).unwrap());
    }

    #[test]
    fn test_parse_empty_is_no_face() {
        assert!(parse_face_locations(r#"{"face_locations": []}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_skips_malformed_boxes() {
        let faces =
            parse_face_locations(r#"{"face_locations": [[1, 2, 3], [150, 200, 50, 100], [10, 20, 30, 5]]}"#)
                .unwrap();
        assert_eq!(faces, vec![FaceBox::new(10, 20, 30, 5).unwrap()]);
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(parse_face_locations("not json"), Err(Error::Json(_))));
        assert!(matches!(parse_face_locations("{}"), Err(Error::Detector(_))));
        assert!(matches!(
            parse_face_locations(r#"{"error": "no model"}"#),
            Err(Error::Detector(msg)) if msg.contains("no model")
        ));
        assert!(parse_face_locations(r#"{"face_locations": [["a", "b", "c", "d"]]}"#).is_err());
    }

    #[test]
    fn test_mode_round_trip() {
        assert_eq!("FACE".parse::<DetectionMode>().unwrap(), DetectionMode::Face);
        assert_eq!(DetectionMode::Both.to_string(), "both");
        assert!("yolo".parse::<DetectionMode>().is_err());
    }

    #[test]
    fn test_endpoint_joins_mode() {
        let settings = DetectorSettings {
            url: "http://localhost:5000/predict/".to_string(),
            ..DetectorSettings::default()
        };
        let detector = HttpDetector::new(&settings).unwrap();
        assert_eq!(detector.endpoint(DetectionMode::Face), "http://localhost:5000/predict/face");
    }

    #[test]
    fn test_encode_frame_is_base64_jpeg() {
        let frame = Frame::from_pixel(8, 8, image::Rgb([200, 10, 10]));
        let encoded = encode_frame(&frame).unwrap();
        let bytes = STANDARD.decode(encoded).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}
