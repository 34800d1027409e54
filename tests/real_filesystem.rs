use std::ffi::CString;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use permwatch::config::ScheduleConfig;
use permwatch::engine::{RuntimeEvent, Watcher};
use permwatch::fs::RealFileSystem;
use permwatch::watch::NotifyBackend;
use permwatch_test_utils::fake_backend::RecordingBackend;
use permwatch_test_utils::{init_tracing, with_timeout};
use tokio::sync::mpsc;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn mode(path: &Path) -> u32 {
    fs::symlink_metadata(path).unwrap().permissions().mode() & 0o7777
}

fn write_with_mode(path: &Path, mode: u32) {
    fs::write(path, b"data").unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
}

fn mkdir_with_mode(path: &Path, mode: u32) {
    fs::create_dir(path).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
}

fn watcher_on(root: &Path, backend: RecordingBackend) -> Watcher {
    let (tx, _rx) = mpsc::unbounded_channel();
    Watcher::new(
        root,
        Arc::new(RealFileSystem),
        Box::new(backend),
        ScheduleConfig::default(),
        tx,
    )
}

#[tokio::test]
async fn full_scan_widens_modes_on_disk() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let root = tmp.path();
    write_with_mode(&root.join("notes.txt"), 0o644);
    write_with_mode(&root.join("run.sh"), 0o740);
    mkdir_with_mode(&root.join("sub"), 0o755);
    write_with_mode(&root.join("sub/inner"), 0o600);

    let backend = RecordingBackend::new();
    let mut watcher = watcher_on(root, backend.clone());
    let report = watcher.start()?;

    assert_eq!(mode(&root.join("notes.txt")), 0o666);
    assert_eq!(mode(&root.join("run.sh")), 0o777);
    assert_eq!(mode(&root.join("sub")), 0o777);
    assert_eq!(mode(&root.join("sub/inner")), 0o666);
    assert_eq!(report.failures, 0);
    assert!(backend.is_active(root));
    assert!(backend.is_active(root.join("sub")));

    watcher.stop();
    assert!(backend.active().is_empty());
    Ok(())
}

#[tokio::test]
async fn symlinked_directory_is_not_descended() -> TestResult {
    let outside = tempfile::tempdir()?;
    write_with_mode(&outside.path().join("private"), 0o600);

    let tmp = tempfile::tempdir()?;
    std::os::unix::fs::symlink(outside.path(), tmp.path().join("link"))?;

    let backend = RecordingBackend::new();
    let mut watcher = watcher_on(tmp.path(), backend.clone());
    watcher.start()?;

    assert_eq!(mode(&outside.path().join("private")), 0o600);
    assert!(!backend.is_active(tmp.path().join("link")));
    Ok(())
}

#[tokio::test]
async fn fifo_without_writer_does_not_block_the_scan() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let fifo = tmp.path().join("pipe");
    let c_path = CString::new(fifo.as_os_str().as_bytes())?;
    // SAFETY: `c_path` is a valid NUL-terminated path.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
    assert_eq!(rc, 0, "mkfifo failed");

    let mut watcher = watcher_on(tmp.path(), RecordingBackend::new());
    let report = watcher.start()?;

    assert_eq!(report.failures, 0);
    assert_eq!(mode(&fifo), 0o666);
    Ok(())
}

#[tokio::test]
async fn notified_file_is_fixed_on_flush() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let root = tmp.path().canonicalize()?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let backend = NotifyBackend::new(tx.clone())?;
    let mut watcher = Watcher::new(
        root.clone(),
        Arc::new(RealFileSystem),
        Box::new(backend),
        ScheduleConfig {
            flush_interval: Duration::from_secs(3600),
            ..ScheduleConfig::default()
        },
        tx,
    );
    watcher.start()?;

    let created = root.join("created.txt");
    write_with_mode(&created, 0o600);

    with_timeout(async {
        while let Some(event) = rx.recv().await {
            let seen = matches!(&event, RuntimeEvent::PathChanged { path } if *path == created);
            watcher.handle(event);
            if seen {
                break;
            }
        }
    })
    .await;

    assert!(watcher.queue().contains(&created));
    watcher.handle(RuntimeEvent::FlushDue);
    assert_eq!(mode(&created), 0o666);

    watcher.stop();
    Ok(())
}
