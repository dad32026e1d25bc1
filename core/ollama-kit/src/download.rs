//! Streaming archive downloads with progress reporting.
//!
//! The response body is never buffered whole. It is either appended to a
//! staging file (ZIP) or forwarded chunk by chunk into a bounded channel
//! (tarballs), and progress is reported as bytes arrive.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// One progress notification: a percentage in `0..=100` and a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Completion percentage.
    pub percent: u8,
    /// Human-readable step description.
    pub message: String,
}

/// Callback receiving installation progress.
///
/// Wrapped in `Arc` so it can be shared across async boundaries.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Minimum interval between byte-progress updates.
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Percentage reported when the download begins.
pub(crate) const DOWNLOAD_START_PERCENT: u8 = 10;

/// Percentage reported once every byte has arrived.
pub(crate) const DOWNLOAD_END_PERCENT: u8 = 90;

/// Sends progress events to an optional callback.
#[derive(Clone, Copy)]
pub(crate) struct Reporter<'a> {
    callback: Option<&'a ProgressCallback>,
}

impl<'a> Reporter<'a> {
    pub(crate) fn new(callback: Option<&'a ProgressCallback>) -> Self {
        Self { callback }
    }

    pub(crate) fn report(self, percent: u8, message: impl Into<String>) {
        if let Some(callback) = self.callback {
            callback(ProgressEvent {
                percent,
                message: message.into(),
            });
        }
    }
}

/// Maps received bytes onto the 10..=90 band, emitting at most one update
/// per [`PROGRESS_INTERVAL`].
pub(crate) struct ByteProgress<'a> {
    reporter: Reporter<'a>,
    file_name: &'a str,
    total: u64,
    received: u64,
    last_update: Instant,
}

impl<'a> ByteProgress<'a> {
    pub(crate) fn new(reporter: Reporter<'a>, file_name: &'a str, total: u64) -> Self {
        Self {
            reporter,
            file_name,
            total,
            received: 0,
            last_update: Instant::now(),
        }
    }

    fn advance(&mut self, bytes: usize) {
        self.received += bytes as u64;
        let now = Instant::now();
        if now.duration_since(self.last_update) >= PROGRESS_INTERVAL {
            self.last_update = now;
            self.emit();
        }
    }

    fn finish(&self) {
        self.emit();
    }

    fn emit(&self) {
        self.reporter.report(
            band_percent(self.received, self.total),
            format!(
                "Downloading {} ({}/{}MB)",
                self.file_name,
                megabytes(self.received),
                megabytes(self.total)
            ),
        );
    }
}

/// Scales `received / total` onto the download band.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn band_percent(received: u64, total: u64) -> u8 {
    let span = u64::from(DOWNLOAD_END_PERCENT - DOWNLOAD_START_PERCENT);
    if total == 0 {
        return DOWNLOAD_START_PERCENT;
    }
    let scaled = received.min(total).saturating_mul(span) / total;
    DOWNLOAD_START_PERCENT + scaled as u8
}

#[allow(clippy::cast_precision_loss)]
fn megabytes(bytes: u64) -> String {
    format!("{:.1}", bytes as f64 / (1024.0 * 1024.0))
}

/// Issues the archive GET and checks the status.
///
/// # Errors
///
/// Returns [`Error::Download`] if the request fails or the status is not a
/// success.
pub(crate) async fn open(http: &reqwest::Client, url: &str) -> Result<reqwest::Response> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| Error::download(url, format!("failed to connect: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::download(url, format!("HTTP error {status}")));
    }

    Ok(response)
}

/// Streams a response body into `dest`.
///
/// # Errors
///
/// Returns [`Error::Download`] if the body stream fails and [`Error::Io`] if
/// the file cannot be written.
pub(crate) async fn to_file(
    response: reqwest::Response,
    dest: &Path,
    progress: &mut ByteProgress<'_>,
) -> Result<()> {
    let url = response.url().to_string();
    let mut file = tokio::fs::File::create(dest)
        .await
        .map_err(|e| Error::io(format!("failed to create file {}", dest.display()), e))?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Error::download(&url, format!("failed to read body: {e}")))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| Error::io(format!("failed to write {}", dest.display()), e))?;
        progress.advance(chunk.len());
    }

    file.flush()
        .await
        .map_err(|e| Error::io(format!("failed to flush {}", dest.display()), e))?;
    file.sync_all()
        .await
        .map_err(|e| Error::io(format!("failed to sync {}", dest.display()), e))?;

    progress.finish();
    Ok(())
}

/// Forwards a response body into a chunk channel.
///
/// A body error is sent down the channel so the reader fails too. If the
/// reader hangs up early the pump stops without error; the reader's own
/// result then decides the outcome.
///
/// # Errors
///
/// Returns [`Error::Download`] if the body stream fails.
pub(crate) async fn to_channel(
    response: reqwest::Response,
    tx: mpsc::Sender<io::Result<Vec<u8>>>,
    progress: &mut ByteProgress<'_>,
) -> Result<()> {
    let url = response.url().to_string();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => {
                let len = chunk.len();
                if tx.send(Ok(chunk.to_vec())).await.is_err() {
                    tracing::debug!(%url, "extractor closed the stream early");
                    return Ok(());
                }
                progress.advance(len);
            }
            Err(e) => {
                let message = format!("failed to read body: {e}");
                // The reader may already be gone.
                let _ = tx.send(Err(io::Error::other(message.clone()))).await;
                return Err(Error::download(&url, message));
            }
        }
    }

    progress.finish();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn recorder() -> (ProgressCallback, Arc<Mutex<Vec<ProgressEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let callback: ProgressCallback = Arc::new(move |event| sink.lock().unwrap().push(event));
        (callback, events)
    }

    #[test]
    fn band_percent_spans_ten_to_ninety() {
        assert_eq!(band_percent(0, 100), 10);
        assert_eq!(band_percent(50, 100), 50);
        assert_eq!(band_percent(100, 100), 90);
        assert_eq!(band_percent(500, 100), 90);
    }

    #[test]
    fn band_percent_without_size_stays_at_start() {
        assert_eq!(band_percent(12_345, 0), 10);
    }

    #[test]
    fn reporter_without_callback_is_silent() {
        Reporter::new(None).report(42, "nothing happens");
    }

    #[tokio::test]
    async fn open_rejects_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let url = format!("{}/archive.tgz", server.uri());
        let err = open(&reqwest::Client::new(), &url).await.unwrap_err();

        assert!(matches!(&err, Error::Download { url: u, .. } if *u == url));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn to_file_writes_body_and_ends_at_ninety() {
        let server = MockServer::start().await;
        let body = vec![7u8; 4096];
        Mock::given(method("GET"))
            .and(path("/a.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let temp = assert_fs::TempDir::new().unwrap();
        let dest = temp.path().join("a.zip");
        let (callback, events) = recorder();
        let reporter = Reporter::new(Some(&callback));
        let mut progress = ByteProgress::new(reporter, "a.zip", body.len() as u64);

        let response = open(&reqwest::Client::new(), &format!("{}/a.zip", server.uri()))
            .await
            .unwrap();
        to_file(response, &dest, &mut progress).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), body);
        let events = events.lock().unwrap();
        let last = events.last().unwrap();
        assert_eq!(last.percent, 90);
        assert!(last.message.starts_with("Downloading a.zip"));
    }

    #[tokio::test]
    async fn to_channel_forwards_every_byte() {
        let server = MockServer::start().await;
        let body: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let (tx, mut rx) = mpsc::channel::<io::Result<Vec<u8>>>(4);
        let collect = tokio::spawn(async move {
            let mut received = Vec::new();
            while let Some(chunk) = rx.recv().await {
                received.extend(chunk.unwrap());
            }
            received
        });

        let mut progress = ByteProgress::new(Reporter::new(None), "b.tgz", 0);
        let response = open(&reqwest::Client::new(), &server.uri()).await.unwrap();
        to_channel(response, tx, &mut progress).await.unwrap();

        assert_eq!(collect.await.unwrap(), body);
    }

    #[tokio::test]
    async fn to_channel_stops_when_reader_hangs_up() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 1024]))
            .mount(&server)
            .await;

        let (tx, rx) = mpsc::channel::<io::Result<Vec<u8>>>(1);
        drop(rx);

        let mut progress = ByteProgress::new(Reporter::new(None), "c.tgz", 1024);
        let response = open(&reqwest::Client::new(), &server.uri()).await.unwrap();
        assert!(to_channel(response, tx, &mut progress).await.is_ok());
    }
}
