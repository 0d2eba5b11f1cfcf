//! docforge Server
//!
//! Accepts office documents, PDFs and images over multipart uploads, runs
//! them through converters or in-process PDF tools, and serves the result
//! from `/download/{filename}` for a limited time.
//!
//! ## Architecture
//!
//! Handlers are thin: each one collects its form and calls the matching
//! `JobService` operation from convert-core. The binary adds:
//!
//! - Rate limiting via tower-governor
//! - Static frontend files as the fallback route
//! - Flushing of pending artifact deletions on shutdown

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use convert_core::config::MIB;
use convert_core::{CommandSpec, ConverterConfig, JobService, ServiceConfig};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod error;
mod form;

use api::{build_router, AppState};

/// Command-line arguments for the docforge server
#[derive(Parser, Debug)]
#[command(name = "convert-api")]
#[command(about = "docforge file conversion server")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Directory for staged uploads
    #[arg(long, env = "UPLOAD_FOLDER", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Directory for conversion outputs and final artifacts
    #[arg(long, env = "CONVERTED_FOLDER", default_value = "converted")]
    converted_dir: PathBuf,

    /// Frontend files served for unknown paths
    #[arg(long, env = "STATIC_DIR", default_value = "static")]
    static_dir: PathBuf,

    /// Per-file upload ceiling in MiB
    #[arg(long, env = "MAX_FILE_SIZE_MB", default_value = "20")]
    max_file_size_mb: u64,

    /// Upload ceiling for /compress in MiB
    #[arg(long, env = "MAX_COMPRESS_SIZE_MB", default_value = "100")]
    max_compress_size_mb: u64,

    /// Largest accepted request body in MiB (several files per request)
    #[arg(long, env = "MAX_REQUEST_SIZE_MB", default_value = "200")]
    max_request_size_mb: u64,

    /// Seconds a finished artifact stays downloadable
    #[arg(long, env = "RETENTION_SECS", default_value = "600")]
    retention_secs: u64,

    /// Seconds one converter call may run
    #[arg(long, env = "CONVERSION_TIMEOUT_SECS", default_value = "300")]
    conversion_timeout_secs: u64,

    /// Word/text to PDF command, e.g. "soffice --headless --convert-to pdf --outdir {output_dir} {input}"
    #[arg(long, env = "DOCUMENT_TO_PDF_CMD")]
    document_to_pdf_cmd: Option<CommandSpec>,

    /// PowerPoint to PDF command
    #[arg(long, env = "SLIDES_TO_PDF_CMD")]
    slides_to_pdf_cmd: Option<CommandSpec>,

    /// PDF to PowerPoint command
    #[arg(long, env = "PDF_TO_SLIDES_CMD")]
    pdf_to_slides_cmd: Option<CommandSpec>,

    /// PDF to Word command
    #[arg(long, env = "PDF_TO_DOCUMENT_CMD")]
    pdf_to_document_cmd: Option<CommandSpec>,

    /// PDF to Excel command
    #[arg(long, env = "PDF_TO_SPREADSHEET_CMD")]
    pdf_to_spreadsheet_cmd: Option<CommandSpec>,

    /// PDF to page JPEGs command (default: pdftoppm)
    #[arg(long, env = "PDF_TO_JPG_CMD")]
    pdf_to_jpg_cmd: Option<CommandSpec>,

    /// First-page thumbnail command (default: pdftoppm)
    #[arg(long, env = "PDF_THUMBNAIL_CMD")]
    pdf_thumbnail_cmd: Option<CommandSpec>,

    /// Rate limit: requests per second per IP
    #[arg(long, env = "RATE_LIMIT", default_value = "10")]
    rate_limit: u32,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn service_config(&self) -> ServiceConfig {
        let defaults = ConverterConfig::default();
        let converters = ConverterConfig {
            document_to_pdf: self.document_to_pdf_cmd.clone(),
            slides_to_pdf: self.slides_to_pdf_cmd.clone(),
            pdf_to_slides: self.pdf_to_slides_cmd.clone(),
            pdf_to_document: self.pdf_to_document_cmd.clone(),
            pdf_to_spreadsheet: self.pdf_to_spreadsheet_cmd.clone(),
            pdf_to_jpg: self.pdf_to_jpg_cmd.clone().or(defaults.pdf_to_jpg),
            pdf_thumbnail: self.pdf_thumbnail_cmd.clone().or(defaults.pdf_thumbnail),
        };

        ServiceConfig {
            upload_root: self.upload_dir.clone(),
            converted_root: self.converted_dir.clone(),
            max_file_size: self.max_file_size_mb * MIB,
            max_compress_size: self.max_compress_size_mb * MIB,
            retention: Duration::from_secs(self.retention_secs),
            conversion_timeout: Duration::from_secs(self.conversion_timeout_secs),
            converters,
        }
    }

    /// Request body ceiling, never below the largest per-file ceiling
    fn body_limit(&self, config: &ServiceConfig) -> usize {
        let limit = (self.max_request_size_mb * MIB).max(config.largest_ceiling() + MIB);
        usize::try_from(limit).unwrap_or(usize::MAX)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting docforge server on {}:{}", args.host, args.port);

    let config = args.service_config();
    let body_limit = args.body_limit(&config);
    let service = Arc::new(JobService::new(config));
    service
        .prepare()
        .await
        .context("Failed to create upload and converted directories")?;

    // Create rate limiter configuration
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(args.rate_limit.into())
            .burst_size(args.rate_limit * 2)
            .finish()
            .context("Failed to create rate limiter config")?,
    );

    let state = AppState {
        service: service.clone(),
    };
    let static_dir = args.static_dir.is_dir().then(|| args.static_dir.clone());
    let app = build_router(state, static_dir, body_limit).layer(GovernorLayer {
        config: governor_conf,
    });

    // Start server
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Rate limit: {} requests/second per IP", args.rate_limit);
    info!(
        "Retention: {}s, conversion timeout: {}s",
        args.retention_secs, args.conversion_timeout_secs
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    service.retention().shutdown().await;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
