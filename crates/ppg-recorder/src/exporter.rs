//! Session export: flat text record and the storage it is written to

use chrono::{DateTime, Local};
use ppg_core::{PpgError, PpgResult, Session};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::ExportConfig;

const METHOD_LABEL: &str = "recording_method";
const REFERENCE_LABEL: &str = "blood_sugar_value";
const DATA_LABEL: &str = "ppg_data";

/// Serializes finalized sessions
pub struct SessionExporter;

impl SessionExporter {
    /// Render the record: method tag, reference value, then one sample per line
    pub fn render(session: &Session) -> PpgResult<String> {
        session.validate_for_export()?;
        let reference = session.reference_value.as_deref().unwrap_or_default();

        let mut out = String::with_capacity(64 + session.sample_count() * 12);
        out.push_str(METHOD_LABEL);
        out.push('\n');
        out.push_str(session.method.tag());
        out.push('\n');
        out.push_str(REFERENCE_LABEL);
        out.push('\n');
        out.push_str(reference);
        out.push('\n');
        out.push_str(DATA_LABEL);
        out.push('\n');
        for sample in session.samples() {
            // Writing into a String cannot fail
            let _ = writeln!(out, "{:?}", sample);
        }
        Ok(out)
    }

    /// `PPG_Signal_<YYYYMMDD_HHMMSS>.csv`
    pub fn file_name(at: DateTime<Local>) -> String {
        format!("PPG_Signal_{}.csv", at.format("%Y%m%d_%H%M%S"))
    }
}

/// Durable destination for rendered records
pub trait SessionStore: Send + Sync {
    /// Write `contents` under `file_name`, returning the full path
    fn write(&self, file_name: &str, contents: &str) -> PpgResult<PathBuf>;
}

/// Stores records as files in one folder, created on first write
#[derive(Debug, Clone)]
pub struct FsSessionStore {
    folder: PathBuf,
}

impl FsSessionStore {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        FsSessionStore {
            folder: folder.into(),
        }
    }

    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(config.folder())
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }
}

impl SessionStore for FsSessionStore {
    fn write(&self, file_name: &str, contents: &str) -> PpgResult<PathBuf> {
        if !self.folder.exists() {
            debug!("Creating export folder {}", self.folder.display());
            fs::create_dir_all(&self.folder).map_err(|e| PpgError::storage(&self.folder, &e))?;
        }

        let path = self.folder.join(file_name);
        fs::write(&path, contents).map_err(|e| PpgError::storage(&path, &e))?;
        info!("Wrote {} bytes to {}", contents.len(), path.display());
        Ok(path)
    }
}

/// Render and store one session; blocking
pub fn export_session(
    store: &dyn SessionStore,
    session: &Session,
    at: DateTime<Local>,
) -> PpgResult<PathBuf> {
    let contents = SessionExporter::render(session)?;
    store.write(&SessionExporter::file_name(at), &contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ppg_core::{SampleVector, SamplingStrategy};

    fn center_box_session(values: &[f32], reference: &str) -> Session {
        let mut session = Session::new(SamplingStrategy::CenterBoxRaw);
        for v in values {
            session
                .append(&SampleVector::new(SamplingStrategy::CenterBoxRaw, vec![*v]).unwrap())
                .unwrap();
        }
        session.reference_value = Some(reference.to_string());
        session.finalize();
        session
    }

    #[test]
    fn test_render_center_box_record() {
        let session = center_box_session(&[1.0, 2.0], "104");
        let record = SessionExporter::render(&session).unwrap();
        assert_eq!(
            record,
            "recording_method\nCENTER_BOX_RAW\nblood_sugar_value\n104\nppg_data\n1.0\n2.0\n"
        );
    }

    #[test]
    fn test_render_four_zone_record() {
        let mut session = Session::new(SamplingStrategy::FourZoneFiltered);
        let v = SampleVector::new(SamplingStrategy::FourZoneFiltered, vec![0.25, -0.5, 0.125, 0.0])
            .unwrap();
        session.append(&v).unwrap();
        session.reference_value = Some("87".to_string());

        let record = SessionExporter::render(&session).unwrap();
        let lines: Vec<&str> = record.lines().collect();
        assert_eq!(lines[1], "FOUR_ZONES_FILTERED");
        assert_eq!(&lines[5..], &["0.25", "-0.5", "0.125", "0.0"]);
    }

    #[test]
    fn test_render_rejects_incomplete_sessions() {
        let session = center_box_session(&[1.0], "");
        assert_eq!(SessionExporter::render(&session), Err(PpgError::EmptyReferenceValue));

        let session = center_box_session(&[], "100");
        assert_eq!(SessionExporter::render(&session), Err(PpgError::EmptySession));
    }

    #[test]
    fn test_file_name_format() {
        let at = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap();
        assert_eq!(SessionExporter::file_name(at), "PPG_Signal_20240307_090502.csv");
    }

    #[test]
    fn test_fs_store_creates_folder() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSessionStore::new(dir.path().join("PPG_Signals"));

        let path = store.write("a.csv", "hello\n").unwrap();
        assert_eq!(path, dir.path().join("PPG_Signals").join("a.csv"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello\n");
    }

    #[test]
    fn test_export_session_writes_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSessionStore::from_config(&ExportConfig {
            base_dir: dir.path().to_path_buf(),
            folder_name: "PPG_Signals".to_string(),
        });
        let at = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        let path = export_session(&store, &center_box_session(&[1.0, 2.0], "99"), at).unwrap();
        assert!(path.ends_with("PPG_Signals/PPG_Signal_20240102_030405.csv"));
        assert!(fs::read_to_string(path).unwrap().starts_with("recording_method\nCENTER_BOX_RAW\n"));
    }

    #[test]
    fn test_storage_failure_carries_path() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the folder should be
        let blocker = dir.path().join("PPG_Signals");
        fs::write(&blocker, "").unwrap();

        let store = FsSessionStore::new(&blocker);
        let err = store.write("a.csv", "x").unwrap_err();
        match err {
            PpgError::Storage { path, .. } => assert!(path.starts_with(&blocker)),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
