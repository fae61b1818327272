use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use percent_encoding::percent_decode_str;
use reqwest::Url;
use reqwest::blocking::Client;
use suppaftp::FtpStream;
use suppaftp::types::FileType;
use tokio::io::AsyncWriteExt;

use crate::error::{LakeError, Result};

// ---------------------------------------------------------------------------
// Skip-if-present
// ---------------------------------------------------------------------------

/// A non-empty file at `path` counts as already downloaded.
pub fn already_present(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Last path segment of a URL, used as the local file name.
pub fn file_name_from_url(url: &str) -> &str {
    match url.trim_end_matches('/').rsplit('/').next() {
        Some(name) if !name.is_empty() => name,
        _ => "download",
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Remove a failed transfer's `.part` file. A removal failure is only
/// logged so the transfer error is what the caller sees.
fn discard_part(part: &Path) {
    match fs::remove_file(part) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove {}: {e}", part.display()),
    }
}

/// A body shorter than the announced `Content-Length` is an error even if
/// the connection closed cleanly.
fn check_length(url: &str, expected: Option<u64>, written: u64) -> Result<()> {
    match expected {
        Some(expected) if expected != written => Err(LakeError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("{url}: received {written} of {expected} bytes"),
        ))),
        _ => Ok(()),
    }
}

/// Server-side path of an FTP URL, percent-decoded.
fn ftp_path(url: &Url) -> String {
    percent_decode_str(url.path()).decode_utf8_lossy().into_owned()
}

// ---------------------------------------------------------------------------
// Single-file downloader
// ---------------------------------------------------------------------------

/// Streams HTTP(S) and anonymous-FTP files to disk with a progress bar.
pub struct Downloader {
    client: Client,
    show_progress: bool,
}

impl Downloader {
    pub fn new(show_progress: bool) -> Result<Self> {
        // Raw files run to several GB: no overall request timeout.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(None)
            .user_agent(format!("proteolake/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LakeError::http("<client>", e))?;
        Ok(Self {
            client,
            show_progress,
        })
    }

    /// Download `url` to `dest`, returning the number of bytes written.
    ///
    /// Data lands in `<dest>.part` first and is renamed on success, so an
    /// interrupted transfer never looks like a finished file.
    pub fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        let parsed = Url::parse(url).map_err(|_| LakeError::UnsupportedScheme(url.to_string()))?;
        let part = part_path(dest);
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let result = match parsed.scheme() {
            "http" | "https" => self.fetch_http(url, &part, &name),
            "ftp" => self.fetch_ftp(&parsed, &part, &name),
            _ => Err(LakeError::UnsupportedScheme(url.to_string())),
        };

        match result {
            Ok(bytes) => {
                fs::rename(&part, dest)?;
                Ok(bytes)
            }
            Err(e) => {
                discard_part(&part);
                Err(e)
            }
        }
    }

    fn fetch_http(&self, url: &str, part: &Path, name: &str) -> Result<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| LakeError::http(url, e))?;
        if !response.status().is_success() {
            return Err(LakeError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let expected = response.content_length();
        let bar = self.progress_bar(expected, name);
        let mut writer = BufWriter::new(File::create(part)?);
        let written = io::copy(&mut bar.wrap_read(response), &mut writer)?;
        writer.flush()?;
        bar.finish_and_clear();
        check_length(url, expected, written)?;
        Ok(written)
    }

    fn fetch_ftp(&self, url: &Url, part: &Path, name: &str) -> Result<u64> {
        let ftp_err = |source| LakeError::Ftp {
            url: url.to_string(),
            source,
        };
        let host = url
            .host_str()
            .ok_or_else(|| LakeError::UnsupportedScheme(url.to_string()))?;
        let port = url.port().unwrap_or(21);

        let mut ftp = FtpStream::connect((host, port)).map_err(ftp_err)?;
        ftp.login("anonymous", "anonymous").map_err(ftp_err)?;
        ftp.transfer_type(FileType::Binary).map_err(ftp_err)?;
        let path = ftp_path(url);
        let total = ftp.size(&path).ok().map(|s| s as u64);

        let bar = self.progress_bar(total, name);
        let mut writer = BufWriter::new(File::create(part)?);
        let mut stream = ftp.retr_as_stream(&path).map_err(ftp_err)?;
        let written = io::copy(&mut bar.wrap_read(&mut stream), &mut writer)?;
        ftp.finalize_retr_stream(stream).map_err(ftp_err)?;
        writer.flush()?;
        bar.finish_and_clear();

        if let Err(e) = ftp.quit() {
            log::debug!("FTP quit for {url}: {e}");
        }
        Ok(written)
    }

    fn progress_bar(&self, total: Option<u64>, name: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = match total {
            Some(len) => {
                let bar = ProgressBar::new(len);
                if let Ok(style) = ProgressStyle::with_template(
                    "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
                ) {
                    bar.set_style(style.progress_chars("#>-"));
                }
                bar
            }
            None => ProgressBar::new_spinner(),
        };
        bar.set_message(name.to_string());
        bar
    }
}

// ---------------------------------------------------------------------------
// Batch download
// ---------------------------------------------------------------------------

/// Outcome of an unbounded batch download.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub downloaded: Vec<PathBuf>,
    pub failed: Vec<(String, String)>,
}

/// Fetch every URL into `dest_dir`, one task per URL; failures are
/// reported, not raised. Report order follows `urls`.
pub async fn batch_download(urls: Vec<String>, dest_dir: &Path) -> Result<BatchReport> {
    tokio::fs::create_dir_all(dest_dir).await?;
    let client = reqwest::Client::new();

    let mut targets = Vec::with_capacity(urls.len());
    let mut tasks = Vec::with_capacity(urls.len());
    for url in urls {
        let dest = dest_dir.join(file_name_from_url(&url));
        let (client, task_url, task_dest) = (client.clone(), url.clone(), dest.clone());
        tasks.push(tokio::spawn(async move { fetch_async(&client, &task_url, &task_dest).await }));
        targets.push((url, dest));
    }

    let mut report = BatchReport::default();
    let outcomes = futures::future::join_all(tasks).await;
    for ((url, dest), joined) in targets.into_iter().zip(outcomes) {
        let outcome = joined.map_err(|e| LakeError::Io(io::Error::other(e))).and_then(|r| r);
        match outcome {
            Ok(_) => {
                log::info!("Downloaded: {}", dest.display());
                report.downloaded.push(dest);
            }
            Err(e) => {
                log::error!("Error downloading {url}: {e}");
                report.failed.push((url, e.to_string()));
            }
        }
    }
    Ok(report)
}

/// Same `.part` then rename discipline as [`Downloader::fetch`].
async fn fetch_async(client: &reqwest::Client, url: &str, dest: &Path) -> Result<u64> {
    let part = part_path(dest);
    match stream_async(client, url, &part).await {
        Ok(written) => {
            tokio::fs::rename(&part, dest).await?;
            Ok(written)
        }
        Err(e) => {
            discard_part(&part);
            Err(e)
        }
    }
}

async fn stream_async(client: &reqwest::Client, url: &str, part: &Path) -> Result<u64> {
    let mut response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| LakeError::http(url, e))?;
    let expected = response.content_length();

    let mut file = tokio::fs::File::create(part).await?;
    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await.map_err(|e| LakeError::http(url, e))? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    check_length(url, expected, written)?;
    Ok(written)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    /// Serve `body` to `connections` sequential requests on a local port.
    pub(crate) fn serve(body: &'static [u8], connections: usize) -> String {
        serve_claiming(body, body.len(), connections)
    }

    /// Like [`serve`], but announce `length` bytes whatever `body` holds.
    fn serve_claiming(body: &'static [u8], length: usize, connections: usize) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            for stream in listener.incoming().take(connections) {
                let mut stream = stream.unwrap();
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf);
                let header = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {length}\r\nConnection: close\r\n\r\n"
                );
                stream.write_all(header.as_bytes()).unwrap();
                stream.write_all(body).unwrap();
            }
        });
        format!("http://{addr}")
    }

    #[test]
    fn names_come_from_the_last_segment() {
        assert_eq!(
            file_name_from_url("https://ftp.pride.ebi.ac.uk/pride/data/archive/2025/01/PXD1/S1.raw"),
            "S1.raw"
        );
        assert_eq!(file_name_from_url("https://host/"), "host");
        assert_eq!(file_name_from_url(""), "download");
    }

    #[test]
    fn empty_files_are_not_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("S1.raw");
        assert!(!already_present(&path));
        fs::write(&path, b"").unwrap();
        assert!(!already_present(&path));
        fs::write(&path, b"raw").unwrap();
        assert!(already_present(&path));
    }

    #[test]
    fn http_download_is_renamed_into_place() {
        let base = serve(b"spectra", 1);
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("S1.raw");

        let bytes = Downloader::new(false)
            .unwrap()
            .fetch(&format!("{base}/S1.raw"), &dest)
            .unwrap();

        assert_eq!(bytes, 7);
        assert_eq!(fs::read(&dest).unwrap(), b"spectra");
        assert!(!part_path(&dest).exists());
    }

    #[test]
    fn unsupported_scheme_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("S1.raw");
        let err = Downloader::new(false)
            .unwrap()
            .fetch("prd_ascp@fasp.ebi.ac.uk:S1.raw", &dest)
            .unwrap_err();
        assert!(matches!(err, LakeError::UnsupportedScheme(_)));
        assert!(!dest.exists());
    }

    #[test]
    fn truncated_http_body_leaves_no_file() {
        let base = serve_claiming(b"partial raw", 1000, 1);
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("S1.raw");

        assert!(Downloader::new(false).unwrap().fetch(&format!("{base}/S1.raw"), &dest).is_err());
        assert!(!already_present(&dest));
        assert!(!part_path(&dest).exists());
    }

    #[test]
    fn short_bodies_fail_the_length_check() {
        assert!(check_length("u", Some(1000), 11).is_err());
        assert!(check_length("u", Some(11), 11).is_ok());
        assert!(check_length("u", None, 11).is_ok());
    }

    #[test]
    fn ftp_paths_are_percent_decoded() {
        let url = Url::parse("ftp://ftp.pride.ebi.ac.uk/pride/data/PXD1/Sample%201%2Bb.raw").unwrap();
        assert_eq!(ftp_path(&url), "/pride/data/PXD1/Sample 1+b.raw");
    }

    #[test]
    fn discarding_a_missing_part_is_quiet() {
        let dir = tempfile::tempdir().unwrap();
        let part = dir.path().join("S1.raw.part");
        discard_part(&part);
        fs::write(&part, b"x").unwrap();
        discard_part(&part);
        assert!(!part.exists());
    }

    #[tokio::test]
    async fn truncated_batch_transfer_is_a_failure_not_a_file() {
        let base = serve_claiming(b"partial raw", 1000, 1);
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("S1.raw");

        let report = batch_download(vec![format!("{base}/S1.raw")], dir.path()).await.unwrap();

        assert!(report.downloaded.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert!(!already_present(&dest));
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn batch_reports_failures_without_aborting() {
        let base = serve(b"RAW", 1);
        let dir = tempfile::tempdir().unwrap();

        let report = batch_download(
            vec![format!("{base}/a.raw"), "http://127.0.0.1:9/b.raw".to_string()],
            dir.path(),
        )
        .await
        .unwrap();

        assert_eq!(report.downloaded, vec![dir.path().join("a.raw")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "http://127.0.0.1:9/b.raw");
    }
}
