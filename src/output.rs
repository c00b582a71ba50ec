//! Delivery of the finished feed to stdout or a file.
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write feed to stdout: {0}")]
    Stdout(#[source] std::io::Error),

    #[error("Failed to write feed to '{path}': {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Writes `xml` to `path`, or to stdout when no path is given.
///
/// File output goes through a sibling temp file that is synced and renamed
/// over the destination, so a failed run never leaves a truncated feed behind.
pub fn write_output(xml: &str, path: Option<&Path>) -> Result<(), OutputError> {
    match path {
        Some(path) => write_atomic(xml.as_bytes(), path).map_err(|source| OutputError::File {
            path: path.display().to_string(),
            source,
        }),
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            lock.write_all(xml.as_bytes())
                .and_then(|()| lock.write_all(b"\n"))
                .and_then(|()| lock.flush())
                .map_err(OutputError::Stdout)
        }
    }
}

fn write_atomic(content: &[u8], dst: &Path) -> std::io::Result<()> {
    // Unpredictable temp name; create_new refuses to follow a planted symlink
    use std::time::{SystemTime, UNIX_EPOCH};
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dst.with_extension(format!("tmp.{:016x}", suffix));

    let result = (|| {
        let mut temp_file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)?;
        temp_file.write_all(content)?;
        temp_file.write_all(b"\n")?;
        temp_file.sync_all()?;
        drop(temp_file);

        #[cfg(windows)]
        if dst.exists() {
            std::fs::remove_file(dst)?;
        }

        std::fs::rename(&temp_path, dst)
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    if result.is_ok() {
        tracing::debug!(path = %dst.display(), bytes = content.len(), "Wrote feed file");
    }
    result
}
