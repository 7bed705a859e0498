//! Subcommand implementations.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use fivecut_coordinator::{CoordinatorClient, StorageClient};
use fivecut_uploader::{UploadEvent, UploadFile, UploadOptions, UploadSession};
use tracing::{info, warn};

use crate::display::{format_bytes, progress_line};

/// Uploads one file, printing progress until it finishes.
///
/// Ctrl-C cancels the session; the server-side upload is then left for
/// the coordinator to expire.
pub async fn upload(
    client: CoordinatorClient,
    path: &Path,
    options: UploadOptions,
    content_type: Option<String>,
) -> anyhow::Result<()> {
    let mut file = UploadFile::open(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    if let Some(content_type) = content_type {
        file = file.with_content_type(content_type);
    }

    info!(
        file = %file.filename,
        size = %format_bytes(file.len()),
        content_type = %file.content_type,
        "uploading"
    );

    let storage = StorageClient::new().context("failed to build HTTP client")?;
    let mut session = UploadSession::new(Arc::new(client), Arc::new(storage), options);
    let events = session.take_events();
    let session = Arc::new(session);

    let printer = events.map(|mut rx| {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    UploadEvent::Progress {
                        uploaded_bytes,
                        total_bytes,
                        fraction,
                    } => eprintln!(
                        "{}",
                        progress_line(
                            fraction,
                            uploaded_bytes,
                            total_bytes,
                            session.bytes_per_second(),
                            session.eta(),
                        )
                    ),
                    UploadEvent::StateChanged { state } => eprintln!("[{state}]"),
                    UploadEvent::Succeeded { .. }
                    | UploadEvent::Failed { .. }
                    | UploadEvent::Canceled => break,
                    UploadEvent::PartCompleted { .. } => {}
                }
            }
        })
    });

    let interrupt = {
        let session = Arc::clone(&session);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, canceling upload");
                session.cancel();
            }
        })
    };

    let result = session.start(file).await;
    interrupt.abort();
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    let outcome = result?;
    println!("key: {}", outcome.object_key);
    println!("url: {}", outcome.url);
    Ok(())
}

pub async fn recent(client: &CoordinatorClient, limit: u32) -> anyhow::Result<()> {
    let items = client.recent_uploads(limit).await?;
    if items.is_empty() {
        println!("no uploads");
        return Ok(());
    }
    for item in items {
        println!(
            "{:>12}  {}  {}",
            format_bytes(item.size),
            item.last_modified.as_deref().unwrap_or("-"),
            item.key
        );
    }
    Ok(())
}

pub async fn delete(client: &CoordinatorClient, key: &str) -> anyhow::Result<()> {
    client.delete_upload(key).await?;
    println!("deleted {key}");
    Ok(())
}

pub async fn health(client: &CoordinatorClient) -> anyhow::Result<()> {
    let ok = client
        .health()
        .await
        .with_context(|| format!("{} is unreachable", client.base_url()))?;
    if !ok {
        anyhow::bail!("{} reports unhealthy", client.base_url());
    }
    println!("ok");
    Ok(())
}
