use crate::capture::{CaptureConfig, CaptureSession, RasterBitmap, SurfaceCapturer, SurfaceMetrics};
use crate::surface::NormalizedSurface;
use crate::{Error, Result};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;

enum Command {
    Layout(oneshot::Sender<Result<SurfaceMetrics>>),
    Rasterize(CaptureConfig, oneshot::Sender<Result<RasterBitmap>>),
    Close(oneshot::Sender<()>),
}

/// An async handle on a capture session running on a dedicated worker thread.
///
/// The worker thread opens the session and owns it (together with the
/// normalized clone inside it) until the handle is closed or dropped, so
/// backends need not be `Send` and every await on the async side is bounded
/// by the capture timeout.
pub struct CaptureWorker {
    cmd_tx: Sender<Command>,
    timeout: Duration,
}

impl CaptureWorker {
    /// Spawn the worker and open `surface` on `capturer`.
    pub async fn start(
        capturer: Arc<dyn SurfaceCapturer>,
        surface: NormalizedSurface,
        timeout: Duration,
    ) -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();
        let (init_tx, init_rx) = oneshot::channel::<Result<()>>();

        thread::spawn(move || {
            let mut session: Box<dyn CaptureSession> = match capturer.open(surface) {
                Ok(s) => s,
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                    return;
                }
            };
            let _ = init_tx.send(Ok(()));

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::Layout(resp) => {
                        let _ = resp.send(session.layout());
                    }
                    Command::Rasterize(config, resp) => {
                        let _ = resp.send(session.rasterize(&config));
                    }
                    Command::Close(resp) => {
                        drop(session);
                        let _ = resp.send(());
                        return;
                    }
                }
            }
            // handle dropped without Close: the session goes out of scope here
        });

        bounded(timeout, init_rx, "Open").await??;
        Ok(Self { cmd_tx, timeout })
    }

    /// Measure the laid-out surface.
    pub async fn layout(&self) -> Result<SurfaceMetrics> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Layout(tx));
        bounded(self.timeout, rx, "Layout").await?
    }

    /// Rasterize the surface; resolves only once the full bitmap is available.
    pub async fn rasterize(&self, config: CaptureConfig) -> Result<RasterBitmap> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Rasterize(config, tx));
        bounded(self.timeout, rx, "Rasterize").await?
    }

    /// Release the session and wait until the worker has dropped it.
    pub async fn close(self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        let _ = self.cmd_tx.send(Command::Close(tx));
        bounded(self.timeout, rx, "Close").await
    }
}

async fn bounded<T>(timeout: Duration, rx: oneshot::Receiver<T>, what: &str) -> Result<T> {
    match tokio::time::timeout(timeout, rx).await {
        Err(_) => Err(Error::CaptureTimeout(timeout.as_millis() as u64)),
        Ok(Err(e)) => Err(Error::Other(format!("{} canceled: {}", what, e))),
        Ok(Ok(value)) => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::surface::{StyleNormalizer, Surface, SurfaceStyle};
    use image::RgbImage;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FakeCapturer {
        released: Arc<AtomicBool>,
        delay: Duration,
    }

    struct FakeSession {
        released: Arc<AtomicBool>,
        delay: Duration,
    }

    impl SurfaceCapturer for FakeCapturer {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn open(&self, _surface: NormalizedSurface) -> Result<Box<dyn CaptureSession>> {
            Ok(Box::new(FakeSession {
                released: self.released.clone(),
                delay: self.delay,
            }))
        }
    }

    impl CaptureSession for FakeSession {
        fn layout(&mut self) -> Result<SurfaceMetrics> {
            thread::sleep(self.delay);
            Ok(SurfaceMetrics { width_px: 10, height_px: 20 })
        }

        fn rasterize(&mut self, config: &CaptureConfig) -> Result<RasterBitmap> {
            let (w, h) = config.bitmap_size();
            Ok(RasterBitmap::new(RgbImage::new(w, h), config.scale))
        }
    }

    impl Drop for FakeSession {
        fn drop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    fn clone() -> NormalizedSurface {
        StyleNormalizer::default().normalize(&Surface::from_html("<p>x</p>", SurfaceStyle::default()))
    }

    #[tokio::test]
    async fn runs_layout_then_rasterize_and_releases_on_close() {
        let released = Arc::new(AtomicBool::new(false));
        let capturer = Arc::new(FakeCapturer { released: released.clone(), delay: Duration::ZERO });
        let worker = CaptureWorker::start(capturer, clone(), Duration::from_secs(5)).await.unwrap();
        let metrics = worker.layout().await.unwrap();
        let cfg = CaptureConfig::new(2.0, Rgb::WHITE, metrics).unwrap();
        let bmp = worker.rasterize(cfg).await.unwrap();
        assert_eq!((bmp.width(), bmp.height()), (20, 40));
        assert!(!released.load(Ordering::SeqCst));
        worker.close().await.unwrap();
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn slow_layout_times_out() {
        let released = Arc::new(AtomicBool::new(false));
        let capturer = Arc::new(FakeCapturer { released, delay: Duration::from_millis(500) });
        let worker = CaptureWorker::start(capturer, clone(), Duration::from_millis(50)).await.unwrap();
        let err = worker.layout().await.unwrap_err();
        assert!(matches!(err, Error::CaptureTimeout(50)));
    }
}
