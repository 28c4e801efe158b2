//! Chrome DevTools Protocol capture backend (uses the `headless_chrome` crate)
//!
//! The normalized clone is served from a disposable local HTTP server, opened
//! in a fresh headless tab and screenshotted in one piece at the capture
//! scale. The tab and the server live exactly as long as the session.

use crate::capture::{CaptureConfig, CaptureSession, RasterBitmap, SurfaceCapturer, SurfaceMetrics};
use crate::surface::{NormalizedSurface, SURFACE_ROOT_ID};
use crate::{Error, Result};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, warn};
use serde::Deserialize;
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use tiny_http::{Header, Response, Server};

/// Window height used while loading; the screenshot clip covers the full surface.
const LOAD_WINDOW_HEIGHT: u32 = 1200;

#[derive(Debug, Default)]
pub struct CdpCapturer;

impl CdpCapturer {
    pub fn new() -> Self {
        CdpCapturer
    }
}

impl SurfaceCapturer for CdpCapturer {
    fn name(&self) -> &'static str {
        "cdp"
    }

    fn open(&self, surface: NormalizedSurface) -> Result<Box<dyn CaptureSession>> {
        let server = DisposableServer::start(surface.document_html())?;

        let browser = Browser::new(LaunchOptions {
            headless: true,
            window_size: Some((surface.width_px(), LOAD_WINDOW_HEIGHT)),
            ..Default::default()
        })
        .map_err(|e| Error::CaptureUnavailable(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::CaptureUnavailable(format!("Failed to create tab: {}", e)))?;

        tab.navigate_to(&server.url())
            .map_err(|e| Error::RenderError(format!("Navigation failed: {}", e)))?;
        tab.wait_until_navigated()
            .map_err(|e| Error::RenderError(format!("Wait for navigation failed: {}", e)))?;

        // Fonts decide line breaks, so layout is only final once they are loaded
        tab.evaluate("document.fonts.ready.then(() => true)", true)
            .map_err(|e| Error::RenderError(format!("Font settle failed: {}", e)))?;

        Ok(Box::new(CdpSession {
            _browser: browser,
            tab,
            _server: server,
            _surface: surface,
        }))
    }
}

struct CdpSession {
    // Field order is drop order: tab first, then browser, server and clone
    tab: Arc<Tab>,
    _browser: Browser,
    _server: DisposableServer,
    _surface: NormalizedSurface,
}

#[derive(Deserialize)]
struct Dimensions {
    w: f64,
    h: f64,
}

impl CaptureSession for CdpSession {
    fn layout(&mut self) -> Result<SurfaceMetrics> {
        let script = format!(
            r#"(function() {{
                const root = document.getElementById('{}');
                return JSON.stringify({{ w: root.scrollWidth, h: root.scrollHeight }});
            }})()"#,
            SURFACE_ROOT_ID
        );
        let value = self
            .tab
            .evaluate(&script, false)
            .map_err(|e| Error::RenderError(format!("Layout measurement failed: {}", e)))?
            .value
            .ok_or_else(|| Error::RenderError("No value returned from layout measurement".into()))?;
        let raw = value
            .as_str()
            .ok_or_else(|| Error::RenderError("Layout measurement returned a non-string".into()))?;
        let dims: Dimensions = serde_json::from_str(raw)
            .map_err(|e| Error::RenderError(format!("Invalid layout measurement: {}", e)))?;
        let metrics = SurfaceMetrics {
            width_px: dims.w.ceil() as u32,
            height_px: dims.h.ceil() as u32,
        };
        debug!("cdp layout: {}x{}px", metrics.width_px, metrics.height_px);
        Ok(metrics)
    }

    fn rasterize(&mut self, config: &CaptureConfig) -> Result<RasterBitmap> {
        self.tab
            .set_bounds(headless_chrome::types::Bounds::Normal {
                left: Some(0),
                top: Some(0),
                width: Some(config.width_px as f64),
                height: Some(config.height_px as f64),
            })
            .map_err(|e| Error::RenderError(format!("Failed to resize window: {}", e)))?;

        let png = self
            .tab
            .capture_screenshot(
                Page::CaptureScreenshotFormatOption::Png,
                None,
                Some(Page::Viewport {
                    x: 0.0,
                    y: 0.0,
                    width: config.width_px as f64,
                    height: config.height_px as f64,
                    scale: config.scale,
                }),
                true,
            )
            .map_err(|e| Error::RenderError(format!("Screenshot failed: {}", e)))?;

        let image = image::load_from_memory(&png)?.to_rgb8();
        let expected = config.bitmap_size();
        if image.dimensions() != expected {
            warn!(
                "screenshot is {}x{}, expected {}x{}",
                image.width(),
                image.height(),
                expected.0,
                expected.1
            );
        }
        Ok(RasterBitmap::new(image, config.scale))
    }
}

impl Drop for CdpSession {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(true) {
            warn!("Failed to close capture tab: {}", e);
        }
    }
}

/// Serves one HTML document on a random local port until dropped.
struct DisposableServer {
    server: Arc<Server>,
    port: u16,
    handle: Option<thread::JoinHandle<()>>,
}

impl DisposableServer {
    fn start(html: String) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .map_err(|e| Error::CaptureUnavailable(format!("Failed to bind capture server: {}", e)))?;
        let port = listener
            .local_addr()
            .map_err(|e| Error::CaptureUnavailable(format!("Failed to read capture server address: {}", e)))?
            .port();
        let server = Arc::new(
            Server::from_listener(listener, None)
                .map_err(|e| Error::CaptureUnavailable(format!("Failed to start capture server: {}", e)))?,
        );

        let worker = server.clone();
        let handle = thread::spawn(move || {
            for request in worker.incoming_requests() {
                let mut response = Response::from_string(html.clone());
                if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..]) {
                    response = response.with_header(header);
                }
                let _ = request.respond(response);
            }
        });

        Ok(Self {
            server,
            port,
            handle: Some(handle),
        })
    }

    fn url(&self) -> String {
        format!("http://127.0.0.1:{}/", self.port)
    }
}

impl Drop for DisposableServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::surface::{StyleNormalizer, Surface, SurfaceStyle};

    #[test]
    fn test_cdp_capture() {
        // This test requires Chrome to be installed, so we skip it in CI
        if std::env::var("CI").is_ok() {
            return;
        }
        let surface = Surface::from_html("<h1>Hello</h1><p>World</p>", SurfaceStyle::default());
        let clone = StyleNormalizer::default().normalize(&surface);
        let mut session = match CdpCapturer::new().open(clone) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Skipping CDP capture test because Chrome is not available: {}", e);
                return;
            }
        };
        let metrics = session.layout().expect("layout");
        assert_eq!(metrics.width_px, 794);
        let cfg = CaptureConfig::new(1.0, Rgb::WHITE, metrics).expect("config");
        let bmp = session.rasterize(&cfg).expect("rasterize");
        assert!(!bmp.is_empty());
    }
}
