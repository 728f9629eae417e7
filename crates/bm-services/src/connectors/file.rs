//! Append-only history files.
//!
//! Each publish writes `"<epoch_ms>,<record line>\n"` and flushes. The file
//! is truncated when the sink opens.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use bm_core::{
    MeshError, Result,
    codec::ToLine,
    soa::{Connector, lock},
    time_util::now_ms,
};
use tracing::info;

pub struct FileSink<V> {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
    format: fn(&V) -> String,
}

impl<V: ToLine> FileSink<V> {
    /// Sink writing each record's wire line.
    pub fn create(path: &Path) -> Result<Self> {
        Self::with_format(path, V::to_line)
    }
}

impl<V> FileSink<V> {
    /// Sink writing `format(record)` instead of the wire line.
    pub fn with_format(path: &Path, format: fn(&V) -> String) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let file = File::create(path)
            .map_err(|e| MeshError::Transport(format!("open {}: {e}", path.display())))?;
        info!("[history] writing {}", path.display());
        Ok(Self { path: path.to_path_buf(), writer: Mutex::new(BufWriter::new(file)), format })
    }
}

impl<V: Send + Sync> Connector<V> for FileSink<V> {
    fn publish(&self, data: &V) -> Result<()> {
        let line = (self.format)(data);
        let mut w = lock(&self.writer);
        writeln!(w, "{},{}", now_ms(), line)
            .and_then(|()| w.flush())
            .map_err(|e| MeshError::Transport(format!("write {}: {e}", self.path.display())))
    }
}

#[cfg(test)]
mod tests {
    use bm_core::{BucketedPosition, Price, ProductRepository, codec::gui_price_line, config::default_products};

    use super::*;

    #[test]
    fn lines_are_timestamped_and_flushed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/bucket_positions.txt");
        let sink = FileSink::<BucketedPosition>::create(&path).unwrap();

        sink.publish(&BucketedPosition { sector: "Belly".into(), quantity: 5 }).unwrap();
        sink.publish(&BucketedPosition { sector: "Belly".into(), quantity: -3 }).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let (ts, rest) = lines[1].split_once(',').unwrap();
        assert!(ts.parse::<u64>().unwrap() > 0);
        assert_eq!(rest, "Belly,-3");
    }

    #[test]
    fn reopening_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gui.txt");
        let repo = ProductRepository::from_config(&default_products()).unwrap();
        let price = Price::new(repo.get("2Y").unwrap(), 99.5, 0.0078125);

        let sink = FileSink::with_format(&path, gui_price_line).unwrap();
        sink.publish(&price).unwrap();
        drop(sink);
        let sink = FileSink::with_format(&path, gui_price_line).unwrap();
        sink.publish(&price).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.trim_end().ends_with(",2Y,99.5,0.0078125"));
    }
}
