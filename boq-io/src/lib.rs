use std::fs;
use std::path::{Path, PathBuf};

use boq_core::document::Drawing;
use boq_engine::emit::OutputRecord;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum IoError {
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid drawing snapshot: {0}")]
    InvalidDocument(String),
    #[error("failed to encode records: {0}")]
    Encode(#[source] serde_json::Error),
}

/// 读取图纸快照（实体列表、单位、文字标签）。
pub trait SnapshotLoader {
    fn load(&self, path: &Path) -> Result<Drawing, IoError>;
}

/// 把输出记录写到目标文件。
pub trait RecordWriter {
    fn write(&self, records: &[OutputRecord], path: &Path) -> Result<(), IoError>;
}

/// JSON 格式的图纸快照，结构与 `boq_core::document::Drawing` 的 serde 表示一致。
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSnapshot;

impl JsonSnapshot {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, source: &str) -> Result<Drawing, IoError> {
        serde_json::from_str(source).map_err(|err| {
            IoError::InvalidDocument(format!(
                "line {} column {}: {err}",
                err.line(),
                err.column()
            ))
        })
    }
}

impl SnapshotLoader for JsonSnapshot {
    fn load(&self, path: &Path) -> Result<Drawing, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let drawing = self.parse(&data)?;
        debug!(
            path = %path.display(),
            entities = drawing.entities().count(),
            labels = drawing.labels().len(),
            "已加载图纸快照"
        );
        Ok(drawing)
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    items: &'a [OutputRecord],
}

/// 以 `{"items": [...]}` 包装输出记录，供表格上传端直接消费。
#[derive(Debug, Clone, Copy)]
pub struct JsonRecords {
    pretty: bool,
}

impl JsonRecords {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    pub fn render(&self, records: &[OutputRecord]) -> Result<String, IoError> {
        let envelope = Envelope { items: records };
        let encoded = if self.pretty {
            serde_json::to_string_pretty(&envelope)
        } else {
            serde_json::to_string(&envelope)
        };
        encoded.map_err(IoError::Encode)
    }
}

impl Default for JsonRecords {
    fn default() -> Self {
        Self::new(true)
    }
}

impl RecordWriter for JsonRecords {
    fn write(&self, records: &[OutputRecord], path: &Path) -> Result<(), IoError> {
        let mut body = self.render(records)?;
        body.push('\n');
        fs::write(path, body).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), records = records.len(), "已写出记录");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boq_core::document::LinearUnit;

    #[test]
    fn parse_reports_position_of_bad_json() {
        let err = JsonSnapshot::new()
            .parse("{\"unit\": \"feet\", \"entities\": [")
            .expect_err("truncated snapshot");
        match err {
            IoError::InvalidDocument(message) => assert!(message.starts_with("line 1")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn parse_accepts_minimal_snapshot() {
        let drawing = JsonSnapshot::new()
            .parse(r#"{"unit": "feet", "entities": []}"#)
            .expect("parse");
        assert_eq!(drawing.unit(), Some(LinearUnit::Feet));
        assert_eq!(drawing.entity_list().map(<[_]>::len), Some(0));
    }

    #[test]
    fn empty_record_set_renders_envelope() {
        let compact = JsonRecords::new(false).render(&[]).expect("render");
        assert_eq!(compact, r#"{"items":[]}"#);
    }
}
