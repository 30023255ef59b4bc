// src/session.rs
use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;

use crate::error::{PipelineError, Result};

/// Directory name format of one recording session.
pub const SESSION_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Which session directory of a subject to use.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionRef {
    /// Most recent session found on disk.
    Latest,
    Named(String),
    At(NaiveDateTime),
}

impl SessionRef {
    pub fn resolve(&self, subject_dir: &Path) -> Result<String> {
        match self {
            SessionRef::Latest => find_nearest_time(subject_dir),
            SessionRef::Named(name) => Ok(name.clone()),
            SessionRef::At(time) => Ok(format_session(time)),
        }
    }
}

pub fn format_session(time: &NaiveDateTime) -> String {
    time.format(SESSION_FORMAT).to_string()
}

pub fn parse_session(name: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(name, SESSION_FORMAT).ok()
}

/// Name of the latest timestamped session directory under `subject_dir`.
pub fn find_nearest_time(subject_dir: &Path) -> Result<String> {
    let mut latest: Option<(NaiveDateTime, String)> = None;
    for entry in fs::read_dir(subject_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let Some(time) = parse_session(&name) else {
            log::debug!("skipping non-session directory {name}");
            continue;
        };
        if latest.as_ref().map_or(true, |(best, _)| time > *best) {
            latest = Some((time, name));
        }
    }
    latest
        .map(|(_, name)| name)
        .ok_or_else(|| PipelineError::NoSession(subject_dir.display().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn picks_most_recent_session() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "2024-03-01-09-00-00",
            "2024-11-20-14-30-05",
            "2024-06-15-10-10-10",
            "notes",
        ] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("2030-01-01-00-00-00"), b"a file, not a session").unwrap();
        assert_eq!(find_nearest_time(dir.path()).unwrap(), "2024-11-20-14-30-05");
    }
    #[test]
    fn empty_subject_has_no_session() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            find_nearest_time(dir.path()),
            Err(PipelineError::NoSession(_))
        ));
    }
    #[test]
    fn datetime_sessions_use_directory_format() {
        let time = parse_session("2023-05-04-03-02-01").unwrap();
        let name = SessionRef::At(time).resolve(Path::new("unused")).unwrap();
        assert_eq!(name, "2023-05-04-03-02-01");
    }
}
