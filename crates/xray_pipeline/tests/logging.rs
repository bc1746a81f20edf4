//! Global subscriber setup. Kept in its own test binary: the subscriber can
//! be installed once per process.

use anyhow::Result;
use chrono::NaiveDateTime;
use std::fs;
use std::thread;
use tracing::error;
use xray_pipeline::logging::{self, LOG_FILE_FORMAT};

#[test]
fn test_init_once_and_write_to_timestamped_file() -> Result<()> {
    let first_dir = tempfile::tempdir()?;
    let second_dir = tempfile::tempdir()?;

    // Racing callers all get the file of whichever call won.
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let dir = first_dir.path().to_path_buf();
            thread::spawn(move || logging::init(dir))
        })
        .collect();
    let paths = handles
        .into_iter()
        .map(|handle| handle.join().expect("init thread panicked"))
        .collect::<Result<Vec<_>>>()?;
    let path = paths[0].clone();
    assert!(paths.iter().all(|p| *p == path));

    assert_eq!(logging::init(second_dir.path())?, path);
    assert_eq!(fs::read_dir(first_dir.path())?.count(), 1);
    assert_eq!(fs::read_dir(second_dir.path())?.count(), 0);

    assert_eq!(path.parent(), Some(first_dir.path()));
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("log"));
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    assert!(NaiveDateTime::parse_from_str(stem, LOG_FILE_FORMAT).is_ok(), "{}", stem);

    error!("X-ray log line for the file layer");
    let contents = fs::read_to_string(&path)?;
    assert!(contents.contains("X-ray log line for the file layer"));
    Ok(())
}
