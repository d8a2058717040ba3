//! MJPEG over HTTP.
//!
//! Each JPEG is sent as one part of a `multipart/x-mixed-replace` response, so a
//! browser pointed at `/mjpeg` (or an `<img>` tag) shows the live output with no
//! client code.

use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, trace};

/// Part separator; must not occur in JPEG data.
const MJPEG_BOUNDARY: &str = "ptz_frame_boundary_5c1a";

/// One encoded output frame, numbered in publish order.
#[derive(Clone, Debug)]
pub struct EncodedFrame {
    pub sequence: u64,
    pub jpeg: Bytes,
}

/// Fan-out of encoded frames to every connected client.
///
/// Clients that fall behind skip frames rather than buffer them.
pub struct MjpegBroadcaster {
    tx: broadcast::Sender<EncodedFrame>,
    next_sequence: AtomicU64,
}

impl MjpegBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            next_sequence: AtomicU64::new(0),
        }
    }

    /// Number `jpeg` and send it to all subscribers; returns how many received it.
    pub fn publish(&self, jpeg: Bytes) -> usize {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let receivers = self.tx.send(EncodedFrame { sequence, jpeg }).unwrap_or(0);
        trace!("Published frame {sequence} to {receivers} clients");
        receivers
    }

    /// Sequence number the next published frame gets.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence.load(Ordering::Relaxed)
    }

    pub fn subscribe(&self) -> MjpegSubscriber {
        MjpegSubscriber {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for MjpegBroadcaster {
    fn default() -> Self {
        Self::new(4)
    }
}

/// Receiving end for one HTTP client; responds with the multipart stream.
pub struct MjpegSubscriber {
    rx: broadcast::Receiver<EncodedFrame>,
}

fn multipart_chunk(frame: &EncodedFrame) -> Bytes {
    let head = format!(
        concat!(
            "--{boundary}\r\n",
            "Content-Type: image/jpeg\r\n",
            "Content-Length: {len}\r\n",
            "X-Frame-Sequence: {sequence}\r\n\r\n",
        ),
        boundary = MJPEG_BOUNDARY,
        len = frame.jpeg.len(),
        sequence = frame.sequence,
    );
    let mut bytes = Vec::with_capacity(head.len() + frame.jpeg.len() + 2);
    bytes.extend_from_slice(head.as_bytes());
    bytes.extend_from_slice(&frame.jpeg);
    bytes.extend_from_slice(b"\r\n");
    Bytes::from(bytes)
}

impl IntoResponse for MjpegSubscriber {
    fn into_response(self) -> Response {
        let stream = BroadcastStream::new(self.rx).filter_map(|result| match result {
            Ok(frame) => Some(Ok::<_, Infallible>(multipart_chunk(&frame))),
            Err(e) => {
                debug!("MJPEG client skipped frames: {e}");
                None
            }
        });

        Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/x-mixed-replace; boundary={MJPEG_BOUNDARY}"),
            )
            .header(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")
            .header(header::PRAGMA, "no-cache")
            .body(Body::from_stream(stream))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

async fn stream_handler(State(broadcaster): State<Arc<MjpegBroadcaster>>) -> MjpegSubscriber {
    broadcaster.subscribe()
}

/// Routes serving the stream at `/` and `/mjpeg`.
pub fn router(broadcaster: Arc<MjpegBroadcaster>) -> Router {
    Router::new()
        .route("/", get(stream_handler))
        .route("/mjpeg", get(stream_handler))
        .with_state(broadcaster)
}

/// Encode an RGB frame as JPEG.
pub fn encode_rgb_jpeg(image: &RgbImage, quality: u8) -> Option<Bytes> {
    let mut jpeg_bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg_bytes, quality);
    encoder.encode_image(image).ok()?;
    Some(Bytes::from(jpeg_bytes))
}
