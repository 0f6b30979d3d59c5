use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::path::PathBuf;

use tempfile::TempDir;
use tidytree_core::{BatchReport, TidyError};
use tidytree_ops::{
    ActionExecutor, MAX_RENAME_ATTEMPTS, OperationRecorder, ProcessProvider, ProcessReaper,
    SysinfoProvider, free_destination_name_excluding,
};

#[test]
fn test_two_same_names_into_one_directory() {
    let temp = TempDir::new().unwrap();
    let src1 = temp.path().join("one");
    let src2 = temp.path().join("two");
    let dest = temp.path().join("dest");
    fs::create_dir_all(&src1).unwrap();
    fs::create_dir_all(&src2).unwrap();
    fs::write(src1.join("a.txt"), "first").unwrap();
    fs::write(src2.join("a.txt"), "second").unwrap();

    let executor = ActionExecutor::new();
    let first = executor.move_to(&src1.join("a.txt"), &dest).unwrap();
    let second = executor.move_to(&src2.join("a.txt"), &dest).unwrap();

    assert_eq!(first, dest.join("a.txt"));
    assert_eq!(second, dest.join("a_1.txt"));
    assert_eq!(fs::read_to_string(&first).unwrap(), "first");
    assert_eq!(fs::read_to_string(&second).unwrap(), "second");
}

#[test]
fn test_name_search_gives_up_after_max_attempts() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("dest");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("report.pdf"), "").unwrap();
    let taken: HashSet<PathBuf> = (1..=MAX_RENAME_ATTEMPTS)
        .map(|i| dir.join(format!("report_{i}.pdf")))
        .collect();

    let err = free_destination_name_excluding(&dir, OsStr::new("report.pdf"), &taken).unwrap_err();
    assert!(matches!(
        err,
        TidyError::ConflictResolutionExhausted { attempts, .. } if attempts == MAX_RENAME_ATTEMPTS
    ));
}

#[test]
fn test_move_directory() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("project");
    fs::create_dir_all(dir.join("src")).unwrap();
    fs::write(dir.join("src/main.rs"), "fn main() {}").unwrap();

    let target = ActionExecutor::new()
        .move_to(&dir, &temp.path().join("archive"))
        .unwrap();
    assert!(target.join("src/main.rs").exists());
    assert!(!dir.exists());
}

#[test]
fn test_recorder_bounded_history() {
    let mut recorder = OperationRecorder::default();
    for i in 0..1005 {
        recorder.record(format!("op{i}"), BatchReport::new(false));
    }
    assert_eq!(recorder.len(), 1000);
    let ids: Vec<u64> = recorder.iter().map(|e| e.id).collect();
    assert_eq!(ids.first(), Some(&5));
    assert_eq!(ids.last(), Some(&1004));
}

#[test]
fn test_sysinfo_sees_current_process() {
    let provider = SysinfoProvider::new();
    assert!(provider.exists(std::process::id()));
    assert!(!provider.exists(u32::MAX - 1));
}

#[test]
fn test_system_reaper_reaps_unknown_pid() {
    let reaper = ProcessReaper::system();
    reaper.register(u32::MAX - 1, "never existed");
    assert_eq!(reaper.reap_vanished(), vec![u32::MAX - 1]);
}
