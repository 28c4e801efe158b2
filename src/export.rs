//! The export driver: surface in, persisted PDF out.
//!
//! Steps run strictly in order and each one starts only after the previous
//! one has resolved:
//!
//! 1. normalize a clone of the surface
//! 2. open the clone in a capture session and wait for it to settle
//! 3. measure and rasterize it, release the session
//! 4. paginate the bitmap
//! 5. composite the pages and encode the PDF
//! 6. hand the bytes to the sink as `<base>.pdf`
//!
//! Composition, encoding and persistence are blocking work and run on
//! tokio's blocking pool.
//!
//! The first failure ends the export. It is returned unchanged to the caller
//! and reported once through the notice handler; nothing is persisted.

use crate::async_api::CaptureWorker;
use crate::capture::{CaptureConfig, RasterBitmap, SurfaceCapturer};
use crate::compose::Compositor;
use crate::config::ExportConfig;
use crate::markdown::{CommonMarkRenderer, MarkdownRenderer};
use crate::paginate::Paginator;
use crate::pdf::write_pdf;
use crate::sink::{artifact_name, Artifact, ArtifactSink};
use crate::surface::{NormalizedSurface, StyleNormalizer, Surface};
use crate::units::UnitConverter;
use crate::{Error, Result};
use log::{debug, error, info, warn};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A message meant for the person who asked for the export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    /// The error notice shown for `err`.
    pub fn from_error(err: &Error) -> Self {
        Self::error(err.user_message())
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

type NoticeHandler = Arc<dyn Fn(&Notice) + Send + Sync>;

pub struct Exporter {
    config: ExportConfig,
    capturer: Arc<dyn SurfaceCapturer>,
    sink: Arc<dyn ArtifactSink>,
    renderer: Arc<dyn MarkdownRenderer>,
    on_notice: Option<NoticeHandler>,
}

impl Exporter {
    pub fn new(
        config: ExportConfig,
        capturer: Arc<dyn SurfaceCapturer>,
        sink: Arc<dyn ArtifactSink>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            capturer,
            sink,
            renderer: Arc::new(CommonMarkRenderer::new()),
            on_notice: None,
        })
    }

    /// Replace the markdown renderer used by [`Exporter::export_markdown`].
    pub fn with_renderer(mut self, renderer: Arc<dyn MarkdownRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Receive progress and failure notices.
    pub fn on_notice(mut self, handler: impl Fn(&Notice) + Send + Sync + 'static) -> Self {
        self.on_notice = Some(Arc::new(handler));
        self
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Render `markdown` onto a surface and export it.
    pub async fn export_markdown(&self, markdown: &str, filename_base: &str) -> Result<Artifact> {
        let surface = Surface::from_markdown(self.renderer.as_ref(), markdown, self.config.surface.clone());
        self.export(&surface, filename_base).await
    }

    /// Export `surface` as `<filename_base>.pdf`.
    pub async fn export(&self, surface: &Surface, filename_base: &str) -> Result<Artifact> {
        let name = artifact_name(filename_base);
        self.notify(Notice::info("Generating PDF..."));
        info!("exporting {} with the {} backend", name, self.capturer.name());

        match self.run(surface, &name).await {
            Ok(artifact) => {
                info!("exported {} ({} bytes)", artifact.name, artifact.size);
                self.notify(Notice::info(format!("Saved {}", artifact.name)));
                Ok(artifact)
            }
            Err(err) => {
                error!("export of {} failed: {}", name, err);
                self.notify(Notice::from_error(&err));
                Err(err)
            }
        }
    }

    async fn run(&self, surface: &Surface, name: &str) -> Result<Artifact> {
        let geometry = self.config.page.geometry()?;
        let settings = &self.config.capture;

        let clone = StyleNormalizer::new(self.config.code.clone()).normalize(surface);
        let bitmap = self.capture(clone).await?;
        if bitmap.is_empty() {
            return Err(Error::EmptySurface);
        }
        debug!(
            "captured {}x{}px at {}x, digest {}",
            bitmap.width(),
            bitmap.height(),
            bitmap.scale(),
            bitmap.digest()
        );

        let converter = UnitConverter::for_capture(geometry.content_width_mm(), bitmap.width(), bitmap.scale())?;
        let inset_mm = self
            .config
            .first_page_inset
            .inset_mm(surface.top_inset_px(), &converter);
        let segments = Paginator::new(&geometry, &converter)?
            .with_first_page_inset(inset_mm)
            .paginate(bitmap.height(), &converter)?;
        debug!(
            "{} segment(s), first page top margin {:.2}mm",
            segments.len(),
            segments.first().map(|s| s.top_margin_mm).unwrap_or_default()
        );

        let compositor = Compositor::new(geometry, converter, settings.background);
        let encoding = self.config.image;
        let sink = self.sink.clone();
        let name = name.to_string();
        tokio::task::spawn_blocking(move || {
            let document = compositor.compose(&bitmap, &segments)?;
            let bytes = write_pdf(&document, encoding)?;
            debug!("encoded {} page(s) into {} bytes", document.page_count(), bytes.len());
            sink.persist(&name, &bytes)
        })
        .await
        .map_err(|e| Error::Other(format!("page composition task failed: {}", e)))?
    }

    /// Run one capture session to completion and release it.
    async fn capture(&self, clone: NormalizedSurface) -> Result<RasterBitmap> {
        let settings = &self.config.capture;
        let worker = CaptureWorker::start(self.capturer.clone(), clone, settings.timeout()).await?;
        // the clone is live in the backend now; let fonts and layout settle
        tokio::time::sleep(settings.settle_delay()).await;

        let captured: Result<RasterBitmap> = async {
            let metrics = worker.layout().await?;
            debug!("surface laid out at {}x{}px", metrics.width_px, metrics.height_px);
            let config = CaptureConfig::new(settings.scale, settings.background, metrics)?;
            worker.rasterize(config).await
        }
        .await;

        // On failure the handle is dropped on return and the worker releases
        // the session once whatever it is still running comes back.
        let bitmap = captured?;
        if let Err(e) = worker.close().await {
            warn!("capture session did not close cleanly: {}", e);
        }
        Ok(bitmap)
    }

    fn notify(&self, notice: Notice) {
        if let Some(handler) = &self.on_notice {
            handler(&notice);
        }
    }
}
