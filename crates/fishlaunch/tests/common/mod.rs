#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use fishlaunch::{AppSettings, FileSettingsStore, LauncherService, SettingsStore};
use fishlaunch_platform::AppPaths;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub enum Reply {
    Json(String),
    Bytes(Vec<u8>),
    Status(u16),
    /// Announces `declared` bytes, sends `body`, then hangs up.
    CutOff { declared: usize, body: Vec<u8> },
}

pub struct UpdateServer {
    pub base_url: String,
    handle: JoinHandle<()>,
}

impl Drop for UpdateServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub async fn update_server(routes: Vec<(&str, Reply)>) -> UpdateServer {
    let routes: Arc<HashMap<String, Reply>> = Arc::new(
        routes
            .into_iter()
            .map(|(path, reply)| (format!("/{path}"), reply))
            .collect(),
    );
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("listener should have an address");

    let handle = tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let routes = Arc::clone(&routes);
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buffer = [0_u8; 1024];
                while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                    match stream.read(&mut buffer).await {
                        Ok(0) | Err(_) => return,
                        Ok(read) => request.extend_from_slice(&buffer[..read]),
                    }
                }
                let path = String::from_utf8_lossy(&request)
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("/")
                    .to_string();

                let response = match routes.get(&path) {
                    Some(Reply::Json(body)) => respond(200, Some(body.len()), body.as_bytes()),
                    Some(Reply::Bytes(body)) => respond(200, Some(body.len()), body),
                    Some(Reply::Status(status)) => respond(*status, Some(0), &[]),
                    Some(Reply::CutOff { declared, body }) => respond(200, Some(*declared), body),
                    None => respond(404, Some(0), &[]),
                };
                let _ = stream.write_all(&response).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    UpdateServer {
        base_url: format!("http://{addr}"),
        handle,
    }
}

fn respond(status: u16, length: Option<usize>, body: &[u8]) -> Vec<u8> {
    let mut head = format!("HTTP/1.1 {status} X\r\nConnection: close\r\n");
    if let Some(length) = length {
        head.push_str(&format!("Content-Length: {length}\r\n"));
    }
    head.push_str("\r\n");
    let mut response = head.into_bytes();
    response.extend_from_slice(body);
    response
}

/// A base URL on a port that refuses connections.
pub async fn offline_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("throwaway listener should bind");
    let addr = listener.local_addr().expect("listener should have an address");
    drop(listener);
    format!("http://{addr}")
}

pub fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, content) in entries {
        writer.start_file(*name, options).expect("entry should start");
        writer.write_all(content).expect("entry should be written");
    }
    writer
        .finish()
        .expect("archive should be finalized")
        .into_inner()
}

pub fn install_dir_at(version: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("install dir should be created");
    std::fs::write(
        dir.path().join("version.json"),
        format!(r#"{{"version":"{version}"}}"#),
    )
    .expect("manifest should be written");
    dir
}

/// Snapshot of every file under `dir`, relative path and contents.
pub fn tree(dir: &Path) -> Vec<(String, Vec<u8>)> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<(String, Vec<u8>)>) {
        for entry in std::fs::read_dir(dir).expect("dir should be readable") {
            let path = entry.expect("entry should be readable").path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let relative = path
                    .strip_prefix(root)
                    .expect("entry is under root")
                    .to_string_lossy()
                    .into_owned();
                out.push((relative, std::fs::read(&path).expect("file should be readable")));
            }
        }
    }
    let mut out = Vec::new();
    walk(dir, dir, &mut out);
    out.sort();
    out
}

/// Launcher wired the way the binary wires it, rooted in `app_root`.
pub struct Harness {
    pub service: LauncherService,
    pub paths: AppPaths,
    pub fallback: tempfile::TempDir,
}

pub fn launcher(app_root: &Path, server_url: &str, game_directory: Option<&Path>) -> Harness {
    let paths = AppPaths::rooted_at(app_root);
    paths.ensure_dirs().expect("app dirs should be created");
    let fallback = tempfile::tempdir().expect("fallback dir should be created");

    let store = Arc::new(FileSettingsStore::from_paths(&paths));
    store
        .save(&AppSettings {
            game_directory: game_directory.map(Path::to_path_buf),
            server_url: server_url.to_string(),
            dev_fallback_dir: Some(fallback.path().to_path_buf()),
            http_timeout_secs: 5,
            connect_timeout_secs: 2,
            ..AppSettings::default()
        })
        .expect("settings should be saved");

    let service = LauncherService::new(store, &paths).expect("service should start");
    Harness {
        service,
        paths,
        fallback,
    }
}
