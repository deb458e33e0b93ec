use anyhow::{Context, Result};
use common::ObjectId;
use sha2::{Digest, Sha256};
use std::fs;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tokio::time::sleep;

/// A local file together with its LFS object id
pub struct TestObject {
    pub path: PathBuf,
    pub id: ObjectId,
    pub content: Vec<u8>,
}

pub fn create_test_files(dir: &Path, count: usize) -> Result<Vec<TestObject>> {
    let mut objects = Vec::with_capacity(count);
    for i in 0..count {
        let filename = format!("file{}.bin", i);
        // Large enough to span several body chunks
        let content: Vec<u8> = format!("Test file {} content\n", i)
            .into_bytes()
            .into_iter()
            .cycle()
            .take(256 * 1024 + i)
            .collect();
        let file_path = dir.join(&filename);
        fs::write(&file_path, &content)
            .with_context(|| format!("Failed to create test file: {:?}", file_path))?;

        let hash = hex::encode(Sha256::digest(&content));
        objects.push(TestObject {
            path: file_path,
            id: ObjectId::new(hash, content.len() as i64),
            content,
        });
    }
    Ok(objects)
}

/// Write a hosts file registering `upstream_url` as host 1
pub fn write_hosts_file(path: &Path, upstream_url: &str) -> Result<()> {
    let hosts = serde_json::json!([{
        "id": 1,
        "href": upstream_url,
        "user_name": "e2e",
        "token": "e2e-token"
    }]);
    fs::write(path, serde_json::to_vec_pretty(&hosts)?)
        .with_context(|| format!("Failed to write hosts file: {:?}", path))
}

pub fn free_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("Failed to bind a local port")?;
    Ok(listener.local_addr()?.port())
}

/// Proxy server child process, killed on drop
pub struct ServerProcess {
    child: Child,
}

impl ServerProcess {
    pub fn spawn(
        server_binary: &Path,
        data_dir: &Path,
        hosts_file: &Path,
        port: u16,
    ) -> Result<Self> {
        let child = Command::new(server_binary)
            .arg("--data-dir")
            .arg(data_dir)
            .arg("--registry")
            .arg("fs")
            .arg("--hosts-file")
            .arg(hosts_file)
            .arg("--host")
            .arg("127.0.0.1")
            .arg("--port")
            .arg(port.to_string())
            .arg("--workers")
            .arg("2")
            .stdout(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to start server binary: {:?}", server_binary))?;
        Ok(Self { child })
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub async fn wait_for_server(url: &str) -> Result<()> {
    let client = reqwest::Client::new();
    let health_url = format!("{}/health", url);

    println!("Waiting for server to be ready...");
    for i in 0..30 {
        match client.get(&health_url).send().await {
            Ok(response) => {
                if response.status().is_success() {
                    println!("Server is ready!");
                    return Ok(());
                }
            }
            Err(_) => {
                if i < 29 {
                    sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    anyhow::bail!("Server did not become ready within 30 seconds");
}

fn run_client(client_binary: &Path, server_url: &str, repo: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(client_binary)
        .arg("--server")
        .arg(server_url)
        .arg("--host-id")
        .arg("1")
        .arg("--repo")
        .arg(repo)
        .args(args)
        .output()
        .with_context(|| format!("Failed to run client binary: {:?}", client_binary))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        anyhow::bail!(
            "Client {:?} failed:\nSTDOUT: {}\nSTDERR: {}",
            args,
            stdout,
            stderr
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

pub fn download_file(
    client_binary: &Path,
    server_url: &str,
    repo: &str,
    id: &ObjectId,
    output: &Path,
) -> Result<()> {
    let size = id.size().to_string();
    let output = output.to_string_lossy();
    run_client(
        client_binary,
        server_url,
        repo,
        &["download", "--oid", id.hash(), "--size", &size, "--output", &output],
    )?;
    println!("Download completed successfully");
    Ok(())
}

pub fn upload_file(client_binary: &Path, server_url: &str, repo: &str, file: &Path) -> Result<()> {
    let file = file.to_string_lossy();
    run_client(client_binary, server_url, repo, &["upload", &file])?;
    println!("Upload completed successfully");
    Ok(())
}
