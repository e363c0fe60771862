//! Console transport and full wiring against a temporary sandbox.

use lifeline::{ConsoleResponder, ConsoleSource, build_executor, build_server};
use lifeline_bot::{CommandSource, LifelineConfig, MessageId, Reply, Responder};
use lifeline_security::Principal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tokio::sync::watch;

#[tokio::test]
async fn test_source_skips_noise_and_reads_uploads() {
    let dir = TempDir::new().unwrap();
    let local = dir.path().join("notes.txt");
    std::fs::write(&local, b"remember").unwrap();

    let input = format!(
        "hello\n\n/status\n/Restart@lifeline_bot docker\n/upload {}\n/upload {}\n/mode\n",
        local.display(),
        dir.path().join("missing.txt").display()
    );
    let mut source = ConsoleSource::new(Principal(5), input.as_bytes());

    let status = source.next_event().await.unwrap();
    assert_eq!(status.command, "status");
    assert_eq!(status.principal, Principal(5));

    let restart = source.next_event().await.unwrap();
    assert_eq!(restart.command, "restart");
    assert_eq!(restart.args, vec!["docker".to_string()]);

    let upload = source.next_event().await.unwrap();
    let file = upload.upload.unwrap();
    assert_eq!(file.file_name, "notes.txt");
    assert_eq!(file.size, Some(8));
    let mut body = Vec::new();
    file.open().await.unwrap().read_to_end(&mut body).await.unwrap();
    assert_eq!(body, b"remember".to_vec());

    // Unreadable upload is skipped
    assert_eq!(source.next_event().await.unwrap().command, "mode");
    assert!(source.next_event().await.is_none());
}

#[tokio::test]
async fn test_responder_formats_replies() {
    let responder = ConsoleResponder::new(Vec::new());

    let first = responder
        .send(Principal(1), Reply::text("hello"))
        .await
        .unwrap();
    let second = responder
        .send(
            Principal(1),
            Reply::text("Sending a.txt (3 bytes)")
                .with_attachment(Some(PathBuf::from("/srv/a.txt")))
                .delete_after(Duration::from_secs(60)),
        )
        .await
        .unwrap();
    responder.delete(Principal(1), second).await.unwrap();

    assert_eq!(first, MessageId(1));
    assert_eq!(second, MessageId(2));

    let out = String::from_utf8(responder.into_inner()).unwrap();
    assert_eq!(
        out,
        "[1] hello\n\
         [2] Sending a.txt (3 bytes)\n\
         [2] attachment: /srv/a.txt\n\
         [2] expires in 60s\n\
         [2] expired\n"
    );
}

#[tokio::test]
async fn test_console_session_against_sandbox() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("files");
    let config = LifelineConfig::from_toml_str(&format!(
        "[security]\nallowed_principals = [5]\n\n[sandbox]\nroot = {:?}\n",
        root.display().to_string()
    ))
    .unwrap();

    let local = dir.path().join("site.conf");
    std::fs::write(&local, b"listen 80;").unwrap();

    let executor = Arc::new(build_executor(&config).await.unwrap());
    assert!(root.join("inbox").is_dir());
    assert!(root.join("snapshots").is_dir());

    let responder = Arc::new(ConsoleResponder::new(Vec::new()));
    let server = build_server(&config, executor, responder.clone()).unwrap();

    let input = format!(
        "/ls\n/upload {}\n/ls inbox\n/restart docker\n",
        local.display()
    );
    let (_tx, rx) = watch::channel(false);
    let handled = server
        .run(ConsoleSource::new(Principal(5), input.as_bytes()), rx)
        .await;
    assert_eq!(handled, 4);
    drop(server);

    let out = String::from_utf8(Arc::try_unwrap(responder).unwrap().into_inner()).unwrap();
    assert!(out.contains("[1] inbox\nsnapshots\n"), "{out}");
    assert!(out.contains("[2] File stored in inbox:"), "{out}");
    assert!(out.contains("[3] site.conf\n"), "{out}");
    assert!(out.contains("[4] Command requires emergency mode\n"), "{out}");

    assert_eq!(std::fs::read(root.join("inbox/site.conf")).unwrap(), b"listen 80;");
    let audit = std::fs::read_to_string(root.join("audit.log")).unwrap();
    assert_eq!(audit.lines().count(), 4);
    assert!(audit.contains("cmd=/upload status=ok file=site.conf"));
    assert!(audit.contains("cmd=/restart status=deny mode=readonly"));
}
