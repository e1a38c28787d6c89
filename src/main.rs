use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use s3_upload_service::{
    config::{AppSettings, Config},
    inactivity::InactivityMonitor,
    mailer::Mailer,
    observer::UploadObserver,
    s3::{S3Uploader, StoreCache, Uploader},
    series::SeriesUploader,
    watcher::FolderWatcher,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = Config::from_env();
    // Missing or unreadable settings are fatal; the service never starts on
    // a partial configuration.
    let settings = AppSettings::load(&cfg.settings_file)?;
    if settings.entries.is_empty() {
        tracing::warn!("settings file has no folder entries; nothing will be watched");
    }
    if settings.smtp_server.is_empty() {
        tracing::warn!("smtp_server is empty; the inactivity monitor is disabled");
    }
    if settings.monitoring_url.is_empty() {
        tracing::warn!("monitoring_url is empty; metric reporting is disabled");
    }

    let observer = Arc::new(UploadObserver::new());
    let token = CancellationToken::new();
    let mut stores = StoreCache::new(&cfg.local_store_dir);
    let mut tasks = Vec::new();

    for entry in settings.entries.clone() {
        let store = stores.store_for(&entry)?;
        let base: Arc<dyn Uploader> = Arc::new(S3Uploader::new(store, observer.clone()));
        let uploader: Arc<dyn Uploader> = if entry.has_series_policy() {
            Arc::new(SeriesUploader::new(base))
        } else {
            base
        };

        tracing::info!(
            folder = %entry.name,
            watch = %entry.watch_folder,
            "starting folder watcher"
        );
        let watcher = FolderWatcher::new(entry, uploader);
        tasks.push(tokio::spawn(watcher.run(token.clone())));
    }

    if let Some(mailer) = Mailer::from_settings(&settings)? {
        let monitor = InactivityMonitor::new(settings, observer, mailer);
        tasks.push(tokio::spawn(monitor.run(token.clone())));
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    token.cancel();
    for task in tasks {
        let _ = task.await;
    }
    Ok(())
}
