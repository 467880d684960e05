use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::AppError;
use crate::models::Record;
use crate::services::excel::{ExcelAnalyzer, ExcelProcessor, Sheet};
use crate::services::notify::NotificationCenter;

pub const ACCEPTED_EXTENSIONS: [&str; 2] = ["xlsx", "xls"];

const PROGRESS_STEP: u8 = 10;
const PROGRESS_CAP: u8 = 90;
pub const PROGRESS_TICK: Duration = Duration::from_millis(200);

/// A decoded file together with the records of its first sheet.
#[derive(Debug, Clone)]
pub struct ImportedFile {
    pub file_name: String,
    pub sheets: Vec<Sheet>,
    pub records: Vec<Record>,
}

/// Checks the extension only; the content is checked by decoding.
pub fn validate_file_name(file_name: &str) -> Result<(), AppError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    match extension {
        Some(ext) if ACCEPTED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(AppError::InvalidInput(
            "Seuls les fichiers .xlsx et .xls sont acceptés".to_string(),
        )),
    }
}

fn validate_size(len: usize, max_file_size: usize) -> Result<(), AppError> {
    if len > max_file_size {
        return Err(AppError::InvalidInput(format!(
            "Fichier trop volumineux ({} Ko, maximum {} Ko)",
            len / 1024,
            max_file_size / 1024
        )));
    }
    Ok(())
}

/// Buffer in, decoded file out. Touches no shared state.
pub fn decode(file_data: Bytes, file_name: &str) -> Result<ImportedFile, AppError> {
    let sheets = ExcelAnalyzer.analyze_from_bytes(file_data)?;
    let records = ExcelProcessor.normalize_first(&sheets)?;
    Ok(ImportedFile {
        file_name: file_name.to_string(),
        sheets,
        records,
    })
}

/// Holds the current import. A failed import leaves the previous one in
/// place and reports through the notification queue.
#[derive(Debug)]
pub struct ImportSession {
    max_file_size: usize,
    current: Option<ImportedFile>,
    notifications: NotificationCenter,
    progress: Arc<watch::Sender<u8>>,
}

impl ImportSession {
    pub fn new(max_file_size: usize) -> Self {
        let (progress, _) = watch::channel(0);
        ImportSession {
            max_file_size,
            current: None,
            notifications: NotificationCenter::new(),
            progress: Arc::new(progress),
        }
    }

    /// Percentage of the last [`import_path`](Self::import_path) call.
    pub fn progress(&self) -> u8 {
        *self.progress.borrow()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<u8> {
        self.progress.subscribe()
    }

    pub fn current(&self) -> Option<&ImportedFile> {
        self.current.as_ref()
    }

    pub fn into_current(self) -> Option<ImportedFile> {
        self.current
    }

    pub fn records(&self) -> &[Record] {
        self.current
            .as_ref()
            .map(|f| f.records.as_slice())
            .unwrap_or_default()
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut NotificationCenter {
        &mut self.notifications
    }

    pub fn import_bytes(&mut self, file_data: Bytes, file_name: &str) -> Result<&ImportedFile, AppError> {
        let result = validate_file_name(file_name)
            .and_then(|_| validate_size(file_data.len(), self.max_file_size))
            .and_then(|_| decode(file_data, file_name));
        self.commit(result)
    }

    /// Reads the file asynchronously and decodes it on the blocking pool
    /// while a progress ticker runs.
    pub async fn import_path(&mut self, path: &Path) -> Result<&ImportedFile, AppError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let ticker = ProgressTicker::start(PROGRESS_TICK, Arc::clone(&self.progress));
        let result = self.read_and_decode(path, &file_name).await;
        match &result {
            Ok(_) => ticker.finish().await,
            Err(_) => ticker.fail().await,
        }
        self.commit(result)
    }

    async fn read_and_decode(&self, path: &Path, file_name: &str) -> Result<ImportedFile, AppError> {
        validate_file_name(file_name)?;
        let file_data = Bytes::from(tokio::fs::read(path).await?);
        validate_size(file_data.len(), self.max_file_size)?;

        let name = file_name.to_string();
        tokio::task::spawn_blocking(move || decode(file_data, &name))
            .await
            .map_err(|e| AppError::Decode(format!("Decoding task failed: {}", e)))?
    }

    fn commit(&mut self, result: Result<ImportedFile, AppError>) -> Result<&ImportedFile, AppError> {
        match result {
            Ok(file) => {
                tracing::info!("Imported {} records from {}", file.records.len(), file.file_name);
                self.notifications.success(
                    "Import réussi",
                    format!("{} rendez-vous ont été importés avec succès.", file.records.len()),
                );
                Ok(self.current.insert(file))
            }
            Err(err) => {
                tracing::error!("Import failed: {}", err);
                self.notifications.error("Erreur d'import", err.user_message());
                Err(err)
            }
        }
    }
}

/// Simulated import progress: climbs by 10 every tick until 90, then waits
/// for [`finish`](Self::finish) or [`fail`](Self::fail). The value is
/// published on a watch channel; the timer task stops when the ticker is
/// dropped.
#[derive(Debug)]
pub struct ProgressTicker {
    progress: Arc<watch::Sender<u8>>,
    handle: JoinHandle<()>,
}

impl ProgressTicker {
    pub fn start(tick: Duration, progress: Arc<watch::Sender<u8>>) -> Self {
        progress.send_replace(0);
        let shared = Arc::clone(&progress);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                interval.tick().await;
                let advanced = shared.send_if_modified(|value| {
                    if *value >= PROGRESS_CAP {
                        return false;
                    }
                    *value += PROGRESS_STEP;
                    true
                });
                if !advanced {
                    break;
                }
            }
        });
        ProgressTicker { progress, handle }
    }

    pub fn value(&self) -> u8 {
        *self.progress.borrow()
    }

    /// Stops the timer task before publishing the final value.
    async fn stop(&mut self, value: u8) {
        self.handle.abort();
        let _ = (&mut self.handle).await;
        self.progress.send_replace(value);
    }

    pub async fn finish(mut self) {
        self.stop(100).await;
    }

    pub async fn fail(mut self) {
        self.stop(0).await;
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_only_spreadsheet_extensions() {
        assert!(validate_file_name("planning.xlsx").is_ok());
        assert!(validate_file_name("PLANNING.XLS").is_ok());
        assert!(validate_file_name("planning.csv").is_err());
        assert!(validate_file_name("planning").is_err());
    }

    #[test]
    fn failed_import_keeps_previous_state_and_notifies() {
        let mut session = ImportSession::new(1024);

        let err = session
            .import_bytes(Bytes::from_static(b"not a workbook"), "planning.xlsx")
            .unwrap_err();

        assert!(matches!(err, AppError::Decode(_)));
        assert!(session.current().is_none());
        assert!(session.records().is_empty());
        let note = session.notifications().latest().unwrap();
        assert_eq!(note.title, "Erreur d'import");
    }

    #[test]
    fn oversized_file_is_rejected_before_decoding() {
        let mut session = ImportSession::new(4);
        let err = session
            .import_bytes(Bytes::from_static(b"0123456789"), "planning.xlsx")
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    fn channel() -> Arc<watch::Sender<u8>> {
        Arc::new(watch::channel(0).0)
    }

    #[tokio::test(start_paused = true)]
    async fn progress_stops_at_cap() {
        let ticker = ProgressTicker::start(PROGRESS_TICK, channel());
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(ticker.value(), 90);
    }

    #[tokio::test(start_paused = true)]
    async fn progress_advances_with_time() {
        let ticker = ProgressTicker::start(PROGRESS_TICK, channel());
        tokio::time::sleep(Duration::from_millis(500)).await;
        let value = ticker.value();
        assert!(value > 0 && value < 90, "unexpected progress {}", value);
    }

    #[tokio::test(start_paused = true)]
    async fn finish_and_fail_publish_final_values() {
        let progress = channel();
        let mut rx = progress.subscribe();

        let ticker = ProgressTicker::start(PROGRESS_TICK, Arc::clone(&progress));
        tokio::time::sleep(Duration::from_millis(300)).await;
        ticker.finish().await;
        assert_eq!(*rx.borrow_and_update(), 100);

        let ticker = ProgressTicker::start(PROGRESS_TICK, Arc::clone(&progress));
        tokio::time::sleep(Duration::from_secs(1)).await;
        ticker.fail().await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(*rx.borrow_and_update(), 0);
    }

    #[tokio::test]
    async fn failed_import_path_resets_progress() {
        let mut session = ImportSession::new(1024);
        let mut rx = session.subscribe_progress();

        assert!(session.import_path(Path::new("/nonexistent/planning.xlsx")).await.is_err());

        assert_eq!(session.progress(), 0);
        assert_eq!(*rx.borrow_and_update(), 0);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let mut session = ImportSession::new(1024);
        let result = tokio_test::block_on(session.import_path(Path::new("/nonexistent/planning.xlsx")));
        assert!(matches!(result, Err(AppError::Io(_))));
    }
}
