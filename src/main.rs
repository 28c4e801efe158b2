//! mdslice CLI
//!
//! Thin glue over the library: read a markdown file, export it as a
//! paginated PDF, print its HTML or write the sample document.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use log::{error, info};
use mdslice::{
    new_capturer, Backend, CommonMarkRenderer, Document, ExportConfig, Exporter, FileSink, Margins, MarkdownRenderer,
    Notice, NoticeLevel, Orientation, PageFormat, Rgb, SurfaceCapturer,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "mdslice")]
#[command(about = "Export markdown as a paginated, image-backed PDF", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a markdown file as PDF
    Export {
        /// Input .md, .markdown or .txt file
        input: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Base name of the PDF (defaults to the input file name)
        #[arg(short, long)]
        name: Option<String>,

        /// JSON export config
        #[arg(long)]
        config: Option<PathBuf>,

        /// Page format: a3, a4, a5, letter, legal or WIDTHxHEIGHT in mm
        #[arg(long)]
        format: Option<PageFormat>,

        /// Landscape pages
        #[arg(long)]
        landscape: bool,

        /// Uniform page margin in mm
        #[arg(long)]
        margin: Option<f64>,

        /// Capture scale (bitmap pixels per CSS pixel)
        #[arg(long)]
        scale: Option<f64>,

        /// Page background, #rrggbb
        #[arg(long)]
        background: Option<Rgb>,

        /// Capture backend
        #[arg(long, value_enum, default_value = "software")]
        backend: BackendArg,
    },

    /// Print the HTML rendered from a markdown file
    Html {
        input: PathBuf,
    },

    /// Write the sample document as document.md
    Sample {
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Software,
    Cdp,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Software => Backend::Software,
            BackendArg::Cdp => Backend::Cdp,
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Export {
            input,
            output,
            name,
            config,
            format,
            landscape,
            margin,
            scale,
            background,
            backend,
        } => {
            let overrides = Overrides {
                format,
                landscape,
                margin,
                scale,
                background,
            };
            run_export(input, output, name, config, overrides, backend.into()).await
        }
        Commands::Html { input } => run_html(input),
        Commands::Sample { output } => run_sample(output),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

struct Overrides {
    format: Option<PageFormat>,
    landscape: bool,
    margin: Option<f64>,
    scale: Option<f64>,
    background: Option<Rgb>,
}

impl Overrides {
    fn apply(self, config: &mut ExportConfig) {
        if let Some(format) = self.format {
            config.page.format = format;
        }
        if self.landscape {
            config.page.orientation = Orientation::Landscape;
        }
        if let Some(mm) = self.margin {
            config.page.margins = Margins::uniform(mm);
        }
        if let Some(scale) = self.scale {
            config.capture.scale = scale;
        }
        if let Some(background) = self.background {
            config.capture.background = background;
            config.surface.background = background;
        }
    }
}

async fn run_export(
    input: PathBuf,
    output: PathBuf,
    name: Option<String>,
    config_path: Option<PathBuf>,
    overrides: Overrides,
    backend: Backend,
) -> anyhow::Result<()> {
    let mut config = match config_path {
        Some(path) => ExportConfig::from_json_file(&path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ExportConfig::default(),
    };
    overrides.apply(&mut config);

    let mut document = Document::open(&input).with_context(|| format!("reading {}", input.display()))?;
    if let Some(name) = name {
        document.filename = name;
    }

    let capturer = open_backend(backend)?;
    let exporter = Exporter::new(config, capturer, Arc::new(FileSink::new(&output)))?.on_notice(report);

    let artifact = exporter
        .export_markdown(&document.markdown, document.base_name())
        .await?;
    match artifact.location {
        Some(path) => info!("✅ Wrote {}", path.display()),
        None => info!("✅ Wrote {}", artifact.name),
    }
    Ok(())
}

fn report(notice: &Notice) {
    if notice.level == NoticeLevel::Error {
        eprintln!("{}", notice);
    }
}

/// The capture backend, with a failure to start reported like any export failure.
fn open_backend(backend: Backend) -> anyhow::Result<Arc<dyn SurfaceCapturer>> {
    new_capturer(backend).map_err(|err| {
        report(&Notice::from_error(&err));
        anyhow::Error::new(err)
    })
}

fn run_html(input: PathBuf) -> anyhow::Result<()> {
    let document = Document::open(&input).with_context(|| format!("reading {}", input.display()))?;
    println!("{}", CommonMarkRenderer::new().render(&document.markdown));
    Ok(())
}

fn run_sample(output: PathBuf) -> anyhow::Result<()> {
    let path = Document::default().save_markdown(&output)?;
    info!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "cdp"))]
    #[test]
    fn unavailable_backend_keeps_its_error() {
        let err = open_backend(Backend::Cdp).err().unwrap();
        assert!(matches!(
            err.downcast::<mdslice::Error>().unwrap(),
            mdslice::Error::CaptureUnavailable(_)
        ));
    }

    #[test]
    fn overrides_layer_over_the_config() {
        let mut config = ExportConfig::default();
        Overrides {
            format: Some(PageFormat::Letter),
            landscape: true,
            margin: Some(10.0),
            scale: None,
            background: Some(Rgb::WHITE),
        }
        .apply(&mut config);
        assert_eq!(config.page.format, PageFormat::Letter);
        assert_eq!(config.page.orientation, Orientation::Landscape);
        assert_eq!(config.page.margins, Margins::uniform(10.0));
        assert_eq!(config.capture.scale, ExportConfig::default().capture.scale);
        assert_eq!(config.surface.background, Rgb::WHITE);
    }
}
