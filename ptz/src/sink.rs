//! Output video sinks
//!
//! The pipeline starts its sink lazily on the first rendered frame, once the output
//! dimensions are known, then pushes every frame fire-and-forget.

use std::future::IntoFuture;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use image::RgbImage;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::mjpeg::{encode_rgb_jpeg, router, MjpegBroadcaster};

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame encoding failed")]
    Encode,

    #[error("Sink not started")]
    NotStarted,
}

/// Where and what to stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTarget {
    pub host: String,
    pub port: u16,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl StreamTarget {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// External video sink.
pub trait VideoSink {
    /// Start streaming. Calling again once started is a no-op.
    fn start(&mut self, target: &StreamTarget) -> Result<(), SinkError>;

    fn is_started(&self) -> bool;

    /// Queue one frame for output.
    fn push(&mut self, frame: &RgbImage) -> Result<(), SinkError>;

    fn stop(&mut self);
}

/// Sink that accepts and discards frames.
#[derive(Debug, Default)]
pub struct NullSink {
    target: Option<StreamTarget>,
    frames: u64,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn target(&self) -> Option<&StreamTarget> {
        self.target.as_ref()
    }
}

impl VideoSink for NullSink {
    fn start(&mut self, target: &StreamTarget) -> Result<(), SinkError> {
        if self.target.is_none() {
            self.target = Some(target.clone());
        }
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.target.is_some()
    }

    fn push(&mut self, _frame: &RgbImage) -> Result<(), SinkError> {
        if self.target.is_none() {
            return Err(SinkError::NotStarted);
        }
        self.frames += 1;
        Ok(())
    }

    fn stop(&mut self) {
        self.target = None;
    }
}

struct ServerHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

/// HTTP MJPEG server sink.
///
/// `start` binds the listener synchronously, so address errors surface to the
/// caller, then serves from a dedicated tokio runtime thread. Frames are JPEG
/// encoded only when a client is connected, at most `fps` times per second.
pub struct MjpegSink {
    quality: u8,
    broadcaster: Arc<MjpegBroadcaster>,
    server: Option<ServerHandle>,
    min_interval: Duration,
    last_publish: Option<Instant>,
}

impl MjpegSink {
    pub fn new(quality: u8) -> Self {
        Self {
            quality,
            broadcaster: Arc::new(MjpegBroadcaster::default()),
            server: None,
            min_interval: Duration::ZERO,
            last_publish: None,
        }
    }

    /// Bound address once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(|s| s.addr)
    }

    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.subscriber_count()
    }
}

fn serve(
    listener: TcpListener,
    broadcaster: Arc<MjpegBroadcaster>,
    shutdown: oneshot::Receiver<()>,
) {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("Failed to build MJPEG server runtime: {e}");
            return;
        }
    };

    runtime.block_on(async move {
        let listener = match tokio::net::TcpListener::from_std(listener) {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to adopt MJPEG listener: {e}");
                return;
            }
        };
        // Open streams never finish on their own, so shutdown drops the server
        // (and its connection tasks with the runtime) instead of draining it.
        let server = axum::serve(listener, router(broadcaster)).into_future();
        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("MJPEG server error: {e}");
                }
            }
            _ = shutdown => debug!("MJPEG server shutdown requested"),
        }
    });
    debug!("MJPEG server stopped");
}

impl VideoSink for MjpegSink {
    fn start(&mut self, target: &StreamTarget) -> Result<(), SinkError> {
        if self.server.is_some() {
            return Ok(());
        }

        let addr = target.address();
        let listener = TcpListener::bind(&addr).map_err(|source| SinkError::Bind {
            addr: addr.clone(),
            source,
        })?;
        listener.set_nonblocking(true)?;
        let local = listener.local_addr()?;

        let (tx, rx) = oneshot::channel();
        let broadcaster = self.broadcaster.clone();
        let thread = thread::Builder::new()
            .name("mjpeg-server".to_string())
            .spawn(move || serve(listener, broadcaster, rx))?;

        self.min_interval = Duration::from_secs_f64(1.0 / target.fps.max(1) as f64);
        self.server = Some(ServerHandle {
            addr: local,
            shutdown: Some(tx),
            thread: Some(thread),
        });

        info!(
            "Streaming {}x{} @ {} fps MJPEG at http://{local}/mjpeg",
            target.width, target.height, target.fps
        );
        Ok(())
    }

    fn is_started(&self) -> bool {
        self.server.is_some()
    }

    fn push(&mut self, frame: &RgbImage) -> Result<(), SinkError> {
        if self.server.is_none() {
            return Err(SinkError::NotStarted);
        }
        if self.broadcaster.subscriber_count() == 0 {
            return Ok(());
        }
        let now = Instant::now();
        if let Some(last) = self.last_publish {
            if now.duration_since(last) < self.min_interval {
                return Ok(());
            }
        }

        let jpeg = encode_rgb_jpeg(frame, self.quality).ok_or(SinkError::Encode)?;
        self.broadcaster.publish(jpeg);
        self.last_publish = Some(now);
        Ok(())
    }

    fn stop(&mut self) {
        let Some(mut server) = self.server.take() else {
            return;
        };
        if let Some(tx) = server.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = server.thread.take() {
            if thread.join().is_err() {
                warn!("MJPEG server thread panicked");
            }
        }
        info!("MJPEG stream on {} stopped", server.addr);
    }
}

impl Drop for MjpegSink {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::io::{Read, Write};
    use std::net::TcpStream;

    fn target(port: u16) -> StreamTarget {
        StreamTarget {
            host: "127.0.0.1".to_string(),
            port,
            width: 32,
            height: 24,
            fps: 100,
        }
    }

    #[test]
    fn test_null_sink_contract() {
        let mut sink = NullSink::new();
        let frame = RgbImage::new(2, 2);
        assert!(matches!(sink.push(&frame), Err(SinkError::NotStarted)));

        sink.start(&target(5000)).unwrap();
        sink.start(&target(6000)).unwrap();
        assert_eq!(sink.target().unwrap().port, 5000);
        sink.push(&frame).unwrap();
        assert_eq!(sink.frames(), 1);

        sink.stop();
        assert!(!sink.is_started());
    }

    #[test]
    fn test_mjpeg_sink_serves_frames() {
        let mut sink = MjpegSink::new(80);
        sink.start(&target(0)).unwrap();
        let addr = sink.local_addr().unwrap();
        // Second start keeps the first server
        sink.start(&target(0)).unwrap();
        assert_eq!(sink.local_addr(), Some(addr));

        let mut stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        stream
            .write_all(b"GET /mjpeg HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .unwrap();

        let reader = thread::spawn(move || {
            let mut received = Vec::new();
            let mut chunk = [0u8; 4096];
            while !received.windows(2).any(|w| w == [0xFF, 0xD8]) {
                let n = stream.read(&mut chunk).unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&chunk[..n]);
            }
            received
        });

        let frame = RgbImage::from_pixel(32, 24, Rgb([0, 128, 255]));
        for _ in 0..200 {
            sink.push(&frame).unwrap();
            if reader.is_finished() {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        let received = reader.join().unwrap();
        let text = String::from_utf8_lossy(&received);
        assert!(text.contains("multipart/x-mixed-replace"));
        assert!(received.windows(2).any(|w| w == [0xFF, 0xD8]));

        sink.stop();
        assert!(!sink.is_started());
        assert!(matches!(sink.push(&frame), Err(SinkError::NotStarted)));
    }

    #[test]
    fn test_mjpeg_sink_bind_error() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        let mut sink = MjpegSink::new(80);
        assert!(matches!(
            sink.start(&target(port)),
            Err(SinkError::Bind { .. })
        ));
        assert!(!sink.is_started());
    }
}
