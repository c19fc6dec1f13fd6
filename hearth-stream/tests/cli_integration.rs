//! CLI integration tests for hearth-stream

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread;
use tempfile::TempDir;

const PAGE: &str = r#"[
  {"id": 2, "author": {"id": 1, "uuid": "9b1deb4d-3b7d-4bad-9bdd-2b0d7b3dcb6d", "handle": "alice@social.example", "name": "Alice"},
   "rendered": "<p>second</p>", "text": "second post", "timestamp": "2024-05-01T12:00:00Z"},
  {"id": 1, "author": {"id": 1, "uuid": "9b1deb4d-3b7d-4bad-9bdd-2b0d7b3dcb6d", "handle": "alice@social.example", "name": "Alice"},
   "rendered": "<p>first</p>", "text": "first post", "timestamp": "2024-05-01T11:00:00Z", "reply_count": 2}
]"#;

/// Serve `body` to every request, recording request lines
fn serve_json(body: &'static str) -> (String, thread::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let handle = thread::spawn(move || {
        let mut requests = Vec::new();
        // The CLI issues a single request per run
        if let Ok((mut stream, _)) = listener.accept() {
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            requests.push(line.trim_end().to_string());
            loop {
                let mut header = String::new();
                if reader.read_line(&mut header).unwrap() == 0 || header == "\r\n" {
                    break;
                }
                requests.push(header.trim_end().to_string());
            }

            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
        }
        requests
    });

    (url, handle)
}

fn write_config(dir: &TempDir, server_url: &str) -> String {
    let session_path = dir.path().join("session");
    fs::write(&session_path, "sessionid=abc; csrftoken=tok").unwrap();

    let config_path = dir.path().join("config.toml");
    fs::write(
        &config_path,
        format!(
            "[server]\nurl = \"{}\"\nsession_file = \"{}\"\n",
            server_url,
            session_path.to_string_lossy().replace('\\', "/")
        ),
    )
    .unwrap();
    config_path.to_string_lossy().to_string()
}

fn hearth_stream(config_path: &str) -> Command {
    let mut cmd = Command::cargo_bin("hearth-stream").unwrap();
    cmd.env("HEARTH_CONFIG", config_path)
        .env_remove("HTTP_PROXY")
        .env_remove("http_proxy")
        .env_remove("ALL_PROXY")
        .env_remove("all_proxy")
        .env("NO_PROXY", "127.0.0.1,localhost");
    cmd
}

#[test]
fn test_help_flag_output() {
    let mut cmd = Command::cargo_bin("hearth-stream").unwrap();

    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Read, page through and follow"))
        .stdout(predicate::str::contains("--follow"))
        .stdout(predicate::str::contains("--pages"))
        .stdout(predicate::str::contains("--format"));
}

#[test]
fn test_tag_stream_without_tag_is_invalid_input() {
    let mut cmd = Command::cargo_bin("hearth-stream").unwrap();

    cmd.arg("tag")
        .env("HEARTH_CONFIG", "/nonexistent/hearth.toml")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("needs a scope"));
}

#[test]
fn test_unknown_stream_is_invalid_input() {
    let mut cmd = Command::cargo_bin("hearth-stream").unwrap();

    cmd.arg("everything")
        .env("HEARTH_CONFIG", "/nonexistent/hearth.toml")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Invalid stream"));
}

#[test]
fn test_invalid_output_format() {
    let mut cmd = Command::cargo_bin("hearth-stream").unwrap();

    cmd.args(["public", "--format", "xml"])
        .env("HEARTH_CONFIG", "/nonexistent/hearth.toml")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Invalid format"));
}

#[test]
fn test_missing_config_fails() {
    let mut cmd = Command::cargo_bin("hearth-stream").unwrap();

    cmd.arg("public")
        .env("HEARTH_CONFIG", "/nonexistent/hearth.toml")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_reads_stream_as_jsonl() {
    let dir = TempDir::new().unwrap();
    let (url, server) = serve_json(PAGE);
    let config_path = write_config(&dir, &url);

    let output = hearth_stream(&config_path)
        .args(["tag", "--tag", "rust", "--format", "jsonl"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{:?}", output);

    let stdout = String::from_utf8(output.stdout).unwrap();
    let ids: Vec<String> = stdout
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            value["id"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(ids, ["2", "1"]);

    let requests = server.join().unwrap();
    assert!(requests[0].starts_with("GET /api/streams/tag/rust/ "));
    assert!(requests
        .iter()
        .any(|h| h.eq_ignore_ascii_case("cookie: sessionid=abc; csrftoken=tok")));
    assert!(requests
        .iter()
        .any(|h| h.eq_ignore_ascii_case("x-csrftoken: tok")));
}

#[test]
fn test_reads_stream_as_text() {
    let dir = TempDir::new().unwrap();
    let (url, server) = serve_json(PAGE);
    let config_path = write_config(&dir, &url);

    hearth_stream(&config_path)
        .arg("public")
        .assert()
        .success()
        .stdout(predicate::str::contains("| 2 | Alice | second post"))
        .stdout(predicate::str::contains("2 replies, 0 shares"));

    server.join().unwrap();
}
