//! Filesystem-backed tests for the sandbox resolver.

use lifeline_sandbox::{INBOX_DIR, Sandbox, SandboxErrorKind};
use tempfile::TempDir;

fn sandbox() -> (TempDir, Sandbox) {
    let dir = TempDir::new().unwrap();
    let sandbox = Sandbox::new(dir.path()).unwrap();
    (dir, sandbox)
}

#[tokio::test]
async fn test_resolved_paths_stay_under_root() {
    let (dir, sandbox) = sandbox();

    for input in ["a", "a/b/c", "./a", "a/../b", "inbox/x.conf", ""] {
        let resolved = sandbox.resolve(input).unwrap();
        assert!(resolved.starts_with(dir.path()), "{input} -> {}", resolved.display());
    }

    for input in ["..", "../x", "/etc/passwd", "a/../../x"] {
        let err = sandbox.resolve(input).unwrap_err();
        assert!(matches!(err.kind(), SandboxErrorKind::PathEscape(_)), "{input}");
    }
}

#[tokio::test]
async fn test_ensure_dir_is_idempotent() {
    let (_dir, sandbox) = sandbox();

    let first = sandbox.ensure_dir(INBOX_DIR).await.unwrap();
    let second = sandbox.ensure_dir(INBOX_DIR).await.unwrap();
    assert_eq!(first, second);
    assert!(first.is_dir());
}

#[tokio::test]
async fn test_write_within_limit() {
    let (_dir, sandbox) = sandbox();
    let data = b"server { listen 80; }".to_vec();

    let (path, written) = sandbox
        .write_file("inbox/site.conf", data.as_slice(), 1024)
        .await
        .unwrap();

    assert_eq!(written, data.len() as u64);
    assert_eq!(std::fs::read(&path).unwrap(), data);
    assert!(sandbox.exists("inbox/site.conf").await);
}

#[tokio::test]
async fn test_write_at_exact_limit_succeeds() {
    let (_dir, sandbox) = sandbox();
    let data = vec![7u8; 64];

    let (_, written) = sandbox
        .write_file("exact.bin", data.as_slice(), 64)
        .await
        .unwrap();
    assert_eq!(written, 64);
}

#[tokio::test]
async fn test_oversized_write_is_removed() {
    let (_dir, sandbox) = sandbox();
    let data = vec![0u8; 100 * 1024];

    let err = sandbox
        .write_file("inbox/big.bin", data.as_slice(), 40 * 1024)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), &SandboxErrorKind::SizeExceeded(40 * 1024));
    assert!(!sandbox.exists("inbox/big.bin").await);
}

#[tokio::test]
async fn test_write_outside_root_rejected() {
    let (dir, sandbox) = sandbox();

    let err = sandbox
        .write_file("../escape.txt", &b"x"[..], 10)
        .await
        .unwrap_err();
    assert!(matches!(err.kind(), SandboxErrorKind::PathEscape(_)));
    assert!(!dir.path().parent().unwrap().join("escape.txt").exists());
}

#[tokio::test]
async fn test_list_dir_is_sorted() {
    let (dir, sandbox) = sandbox();
    for name in ["zeta.txt", "alpha.txt", "mid.txt"] {
        std::fs::write(dir.path().join(name), b"x").unwrap();
    }

    let names = sandbox.list_dir("").await.unwrap();
    assert_eq!(names, vec!["alpha.txt", "mid.txt", "zeta.txt"]);
}

#[tokio::test]
async fn test_regular_file_checks() {
    let (dir, sandbox) = sandbox();
    std::fs::create_dir(dir.path().join("folder")).unwrap();
    std::fs::write(dir.path().join("small.txt"), b"hello").unwrap();

    let (_, size) = sandbox.regular_file("small.txt", 10).await.unwrap();
    assert_eq!(size, 5);

    let err = sandbox.regular_file("folder", 10).await.unwrap_err();
    assert!(matches!(err.kind(), SandboxErrorKind::NotAFile(_)));

    let err = sandbox.regular_file("missing.txt", 10).await.unwrap_err();
    assert!(matches!(err.kind(), SandboxErrorKind::NotFound(_)));

    let err = sandbox.regular_file("small.txt", 4).await.unwrap_err();
    assert_eq!(err.kind(), &SandboxErrorKind::SizeExceeded(4));
}

#[tokio::test]
async fn test_rename_moves_within_sandbox() {
    let (_dir, sandbox) = sandbox();
    sandbox
        .write_file("inbox/app.conf", &b"v2"[..], 10)
        .await
        .unwrap();

    let target = sandbox.rename("inbox/app.conf", "app.conf").await.unwrap();
    assert_eq!(std::fs::read(target).unwrap(), b"v2");
    assert!(!sandbox.exists("inbox/app.conf").await);

    let err = sandbox.rename("app.conf", "../app.conf").await.unwrap_err();
    assert!(matches!(err.kind(), SandboxErrorKind::PathEscape(_)));
}

#[tokio::test]
async fn test_exists_false_for_escape() {
    let (_dir, sandbox) = sandbox();
    assert!(!sandbox.exists("../").await);
    assert!(!sandbox.exists("nothing-here").await);
}
