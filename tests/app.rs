use mailsink::{
    app::{AppState, Config},
    db, http, smtp,
};
use serde_json::Value;
use std::net::SocketAddr;
use tempfile::TempDir;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
};

struct TestServer {
    base: String,
    smtp: SocketAddr,
    state: AppState,
    dir: TempDir,
}

async fn start_server() -> TestServer {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().to_path_buf();
    let config = Config::from_lookup(|key| match key {
        "MAILSINK_DB_FILE" => Some(root.join("emails.db").display().to_string()),
        "MAILSINK_ATTACHMENT_DIR" => Some(root.join("attachments").display().to_string()),
        "MAILSINK_LOG_DIR" => Some(root.join("logs").display().to_string()),
        "MAILSINK_SENDER" => Some("noreply@sink.test".to_string()),
        _ => None,
    })
    .expect("config");
    let state = AppState::open(config).await.expect("open state");

    let http_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let http_addr = http_listener.local_addr().unwrap();
    let app = http::build_router(state.clone());
    tokio::spawn(async move {
        axum::serve(http_listener, app).await.unwrap();
    });

    let smtp_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let smtp_addr = smtp_listener.local_addr().unwrap();
    let smtp_state = state.clone();
    tokio::spawn(async move {
        smtp::serve(smtp_state, smtp_listener).await.unwrap();
    });

    TestServer {
        base: format!("http://{}", http_addr),
        smtp: smtp_addr,
        state,
        dir,
    }
}

async fn read_reply<R: AsyncBufReadExt + Unpin>(reader: &mut R) -> String {
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await.unwrap();
        assert!(n > 0, "server closed the connection");
        if line.len() < 4 || line.as_bytes()[3] == b' ' {
            return line.trim_end().to_string();
        }
    }
}

/// Run one SMTP transaction and return the reply to the end of DATA.
async fn smtp_send(addr: SocketAddr, from: &str, to: &[&str], data: &[u8]) -> String {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    assert!(read_reply(&mut reader).await.starts_with("220 sink.test"));
    writer.write_all(b"EHLO client.test\r\n").await.unwrap();
    assert!(read_reply(&mut reader).await.starts_with("250"));
    writer
        .write_all(format!("MAIL FROM:<{from}>\r\n").as_bytes())
        .await
        .unwrap();
    assert!(read_reply(&mut reader).await.starts_with("250"));
    for rcpt in to {
        writer
            .write_all(format!("RCPT TO:<{rcpt}>\r\n").as_bytes())
            .await
            .unwrap();
        assert!(read_reply(&mut reader).await.starts_with("250"));
    }
    writer.write_all(b"DATA\r\n").await.unwrap();
    assert!(read_reply(&mut reader).await.starts_with("354"));
    writer.write_all(data).await.unwrap();
    if !data.ends_with(b"\r\n") {
        writer.write_all(b"\r\n").await.unwrap();
    }
    writer.write_all(b".\r\n").await.unwrap();
    let reply = read_reply(&mut reader).await;
    writer.write_all(b"QUIT\r\n").await.unwrap();
    assert!(read_reply(&mut reader).await.starts_with("221"));
    reply
}

async fn list(base: &str) -> Vec<Value> {
    let res = reqwest::get(format!("{}/messages", base)).await.unwrap();
    assert!(res.status().is_success());
    let v: Value = res.json().await.unwrap();
    v.as_array().unwrap().clone()
}

fn attachment_path(state: &AppState, stored_name: &str) -> std::path::PathBuf {
    state.store.attachments().path(stored_name).unwrap()
}

const MULTIPART: &str = concat!(
    "From: a@x.com\r\n",
    "To: b@y.com\r\n",
    "Subject: Full\r\n",
    "X-Mailer: TestMailer 1.0\r\n",
    "MIME-Version: 1.0\r\n",
    "Content-Type: multipart/mixed; boundary=BOUND\r\n",
    "\r\n",
    "--BOUND\r\n",
    "Content-Type: text/plain\r\n\r\n",
    "\r\n",
    "Hi text   \r\n",
    "\r\n",
    "\r\n",
    "\r\n",
    "bye\r\n",
    "--BOUND\r\n",
    "Content-Type: text/html\r\n\r\n",
    "<p>Hi html</p>\r\n",
    "--BOUND\r\n",
    "Content-Type: application/octet-stream\r\n",
    "Content-Disposition: attachment; filename=\"a.txt\"\r\n\r\n",
    "ABC123\r\n",
    "--BOUND--\r\n",
);

#[tokio::test]
async fn smtp_submission_is_captured_and_linkified() {
    let srv = start_server().await;
    let data = b"Subject: Hi\r\n\r\nHello http://test.com\r\n";
    let reply = smtp_send(srv.smtp, "a@x.com", &["b@y.com"], data).await;
    assert!(reply.starts_with("250"), "unexpected reply: {reply}");

    let msgs = list(&srv.base).await;
    assert_eq!(msgs.len(), 1);
    let m = &msgs[0];
    assert_eq!(m["sender"], "a@x.com");
    assert_eq!(m["recipients"], serde_json::json!(["b@y.com"]));
    assert_eq!(m["subject"], "Hi");
    assert_eq!(m["client_ip"], "127.0.0.1");
    assert_eq!(
        m["plain_body"],
        r#"Hello <a href="http://test.com" target="_blank">http://test.com</a>"#
    );
    assert_eq!(m["html_body"], "");
}

#[tokio::test]
async fn multipart_message_with_attachment_round_trip() {
    let srv = start_server().await;
    let reply = smtp_send(srv.smtp, "a@x.com", &["b@y.com", "c@z.com"], MULTIPART.as_bytes()).await;
    assert!(reply.starts_with("250"));

    let msgs = list(&srv.base).await;
    let m = &msgs[0];
    assert_eq!(m["recipients"], serde_json::json!(["b@y.com", "c@z.com"]));
    assert_eq!(m["client_app"], "TestMailer 1.0");
    assert_eq!(m["plain_body"], "Hi text\n\nbye");
    assert!(m["html_body"].as_str().unwrap().contains("<p>Hi html</p>"));
    let atts = m["attachments"].as_array().unwrap();
    assert_eq!(atts.len(), 1);
    assert_eq!(atts[0]["filename"], "a.txt");
    let stored = atts[0]["stored_name"].as_str().unwrap().to_string();
    assert!(stored.ends_with("_a.txt"));
    assert!(attachment_path(&srv.state, &stored).exists());

    // HTML preview
    let id = m["id"].as_str().unwrap().to_string();
    let res = reqwest::get(format!("{}/messages/{}/html", srv.base, id))
        .await
        .unwrap();
    assert!(res.status().is_success());
    assert!(res.text().await.unwrap().contains("Hi html"));

    // Download attachment
    let res = reqwest::get(format!("{}/attachments/{}", srv.base, stored))
        .await
        .unwrap();
    assert!(res.status().is_success());
    let disposition = res.headers()[reqwest::header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("filename=\"a.txt\""));
    let body = res.bytes().await.unwrap();
    assert_eq!(&body[..], b"ABC123");
}

#[tokio::test]
async fn delete_by_id_removes_row_and_files() {
    let srv = start_server().await;
    smtp_send(srv.smtp, "a@x.com", &["b@y.com"], MULTIPART.as_bytes()).await;
    let msgs = list(&srv.base).await;
    let id = msgs[0]["id"].as_str().unwrap().to_string();
    let stored = msgs[0]["attachments"][0]["stored_name"]
        .as_str()
        .unwrap()
        .to_string();

    let client = reqwest::Client::new();
    let res = client
        .delete(format!("{}/messages/{}", srv.base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::NO_CONTENT);

    assert!(!attachment_path(&srv.state, &stored).exists());
    let res = reqwest::get(format!("{}/messages/{}", srv.base, id))
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);
    let res = reqwest::get(format!("{}/attachments/{}", srv.base, stored))
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::NOT_FOUND);
    assert!(list(&srv.base).await.is_empty());

    // unknown ids are a harmless no-op
    let res = client
        .delete(format!("{}/messages/{}", srv.base, "does-not-exist"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn clear_all_removes_rows_and_files() {
    let srv = start_server().await;
    for _ in 0..2 {
        smtp_send(srv.smtp, "a@x.com", &["b@y.com"], MULTIPART.as_bytes()).await;
    }
    let stored: Vec<String> = list(&srv.base)
        .await
        .iter()
        .map(|m| m["attachments"][0]["stored_name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(stored.len(), 2);

    let res = reqwest::Client::new()
        .delete(format!("{}/messages", srv.base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::NO_CONTENT);

    assert!(list(&srv.base).await.is_empty());
    for name in stored {
        assert!(!attachment_path(&srv.state, &name).exists());
    }
}

#[tokio::test]
async fn undecodable_bytes_are_still_accepted() {
    let srv = start_server().await;
    let data = b"Subject: bytes\r\n\r\nbad \xff\xfe bytes\r\n";
    let reply = smtp_send(srv.smtp, "a@x.com", &["b@y.com"], data).await;
    assert!(reply.starts_with("250"));

    let msgs = list(&srv.base).await;
    assert_eq!(msgs[0]["subject"], "bytes");
    let body = msgs[0]["plain_body"].as_str().unwrap();
    assert!(body.starts_with("bad "));
    assert!(body.contains('\u{FFFD}'));
}

#[tokio::test]
async fn data_requires_sender_and_recipient() {
    let srv = start_server().await;
    let stream = TcpStream::connect(srv.smtp).await.unwrap();
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    read_reply(&mut reader).await;

    writer.write_all(b"DATA\r\n").await.unwrap();
    assert!(read_reply(&mut reader).await.starts_with("503"));
    writer.write_all(b"RCPT TO:<b@y.com>\r\n").await.unwrap();
    assert!(read_reply(&mut reader).await.starts_with("503"));
    writer.write_all(b"AUTH PLAIN\r\n").await.unwrap();
    assert!(read_reply(&mut reader).await.starts_with("502"));
    writer.write_all(b"QUIT\r\n").await.unwrap();
    assert!(read_reply(&mut reader).await.starts_with("221"));
}

#[tokio::test]
async fn newest_message_is_listed_first_and_dashboard_renders() {
    let srv = start_server().await;
    for subject in ["first", "second"] {
        let data = format!("Subject: {subject}\r\n\r\nbody\r\n");
        smtp_send(srv.smtp, "a@x.com", &["b@y.com"], data.as_bytes()).await;
    }
    let msgs = list(&srv.base).await;
    let subjects: Vec<&str> = msgs.iter().map(|m| m["subject"].as_str().unwrap()).collect();
    assert_eq!(subjects, ["second", "first"]);

    let res = reqwest::get(format!("{}/", srv.base)).await.unwrap();
    assert!(res.status().is_success());
    let page = res.text().await.unwrap();
    assert!(page.contains("second"));
    assert!(page.contains("2 message(s)"));
}

#[tokio::test]
async fn refresh_picks_up_rows_written_behind_the_cache() {
    let srv = start_server().await;
    smtp_send(srv.smtp, "a@x.com", &["b@y.com"], b"Subject: one\r\n\r\nx").await;

    // delete behind the cache's back; the snapshot is stale until a reload
    srv.state.store.delete_all().await.unwrap();
    assert_eq!(list(&srv.base).await.len(), 1);

    let res = reqwest::Client::new()
        .post(format!("{}/refresh", srv.base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::NO_CONTENT);
    assert!(list(&srv.base).await.is_empty());
}

#[tokio::test]
async fn unwritable_attachment_is_dropped_but_message_accepted() {
    let srv = start_server().await;
    // a plain file where the attachment directory should be
    let att_dir = srv.dir.path().join("attachments");
    std::fs::remove_dir_all(&att_dir).unwrap();
    std::fs::write(&att_dir, b"not a directory").unwrap();

    let reply = smtp_send(srv.smtp, "a@x.com", &["b@y.com"], MULTIPART.as_bytes()).await;
    assert!(reply.starts_with("250"), "unexpected reply: {reply}");

    let msgs = list(&srv.base).await;
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0]["subject"], "Full");
    assert_eq!(msgs[0]["plain_body"], "Hi text\n\nbye");
    assert_eq!(msgs[0]["attachments"], serde_json::json!([]));
}

#[tokio::test]
async fn failed_insert_answers_451_and_removes_saved_files() {
    let srv = start_server().await;
    let side = db::connect(&srv.dir.path().join("emails.db")).await.unwrap();
    sqlx::query(
        "CREATE TRIGGER reject_inserts BEFORE INSERT ON emails BEGIN SELECT RAISE(ABORT, 'read-only'); END",
    )
    .execute(&side)
    .await
    .unwrap();

    let reply = smtp_send(srv.smtp, "a@x.com", &["b@y.com"], MULTIPART.as_bytes()).await;
    assert!(reply.starts_with("451"), "unexpected reply: {reply}");

    assert!(list(&srv.base).await.is_empty());
    let leftovers = std::fs::read_dir(srv.dir.path().join("attachments"))
        .unwrap()
        .count();
    assert_eq!(leftovers, 0);
}
