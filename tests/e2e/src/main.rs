mod filesystem_validator;
mod test_utils;

use anyhow::{Context, Result};
use common::LFS_CONTENT_TYPE;
use httpmock::prelude::*;
use serde_json::json;
use std::path::{Path, PathBuf};
use test_utils::*;

const TEST_FILES_COUNT: usize = 2;
const REPO: &str = "group/project.git";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("e2e_tests=debug,info")
        .init();

    println!("📁 Running E2E tests against a mock upstream...");
    run_proxy_tests().await?;

    println!("\n✅ All E2E tests passed!");

    Ok(())
}

async fn run_proxy_tests() -> Result<()> {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let workspace_root = manifest_dir
        .parent()
        .and_then(Path::parent)
        .context("Failed to locate workspace root")?
        .to_path_buf();
    let release_dir = workspace_root.join("target").join("release");
    let server_binary = release_dir.join("server");
    let client_binary = release_dir.join("client");

    let test_data_dir = manifest_dir.join("test_data");
    let proxy_data_dir = test_data_dir.join("proxy_data");
    let test_files_dir = test_data_dir.join("test_files");
    let downloads_dir = test_data_dir.join("downloads");
    let hosts_file = test_data_dir.join("hosts.json");

    std::fs::create_dir_all(&proxy_data_dir)?;
    std::fs::create_dir_all(&test_files_dir)?;
    std::fs::create_dir_all(&downloads_dir)?;

    let upstream = MockServer::start_async().await;
    write_hosts_file(&hosts_file, &upstream.base_url())?;
    let objects = create_test_files(&test_files_dir, TEST_FILES_COUNT)?;

    let port = free_port()?;
    let server_url = format!("http://127.0.0.1:{}", port);
    println!("Upstream URL: {}", upstream.base_url());
    println!("Server URL: {}", server_url);
    println!("Server binary: {:?}", server_binary);
    println!("Client binary: {:?}", client_binary);

    let test_result = async {
        let _server = ServerProcess::spawn(&server_binary, &proxy_data_dir, &hosts_file, port)?;
        wait_for_server(&server_url).await?;

        // Download through the cache
        let object = &objects[0];
        let oid = object.id.hash();
        let object_href = upstream.url(format!("/objects/{}", oid));
        let download_batch = upstream
            .mock_async(|when, then| {
                when.method(POST)
                    .path(format!("/{}/info/lfs/objects/batch", REPO))
                    .header("authorization", "token e2e-token")
                    .json_body_partial(r#"{"operation": "download"}"#);
                then.status(200)
                    .header("content-type", LFS_CONTENT_TYPE)
                    .json_body(json!({
                        "transfer": "basic",
                        "objects": [{
                            "oid": oid,
                            "size": object.id.size(),
                            "actions": {
                                "download": {
                                    "href": object_href,
                                    "header": {"Authorization": "RemoteAuth e2e"},
                                    "expires_in": 3600
                                }
                            }
                        }]
                    }));
            })
            .await;
        let object_get = upstream
            .mock_async(|when, then| {
                when.method(GET)
                    .path(format!("/objects/{}", oid))
                    .header("authorization", "RemoteAuth e2e");
                then.status(200)
                    .header("content-type", "application/octet-stream")
                    .body(object.content.clone());
            })
            .await;

        println!("\n📥 Testing download...");
        let first = downloads_dir.join("first.bin");
        download_file(&client_binary, &server_url, REPO, &object.id, &first)?;
        filesystem_validator::validate_downloaded_file(&first, &object.content)?;

        println!("\n🔍 Validating proxy cache...");
        filesystem_validator::validate_cached_object(&proxy_data_dir, REPO, &object.id, &object.content)?;
        filesystem_validator::validate_no_leftovers(&proxy_data_dir, REPO, &object.id)?;
        println!("✅ Proxy cache validation passed");

        println!("\n📥 Testing cached download...");
        let second = downloads_dir.join("second.bin");
        download_file(&client_binary, &server_url, REPO, &object.id, &second)?;
        filesystem_validator::validate_downloaded_file(&second, &object.content)?;
        anyhow::ensure!(
            download_batch.hits_async().await == 1,
            "Cached object was batched upstream again"
        );
        anyhow::ensure!(
            object_get.hits_async().await == 1,
            "Cached object was fetched upstream again"
        );
        println!("✅ Second download served from cache");

        // Upload actions are handed to the client unchanged
        let object = &objects[1];
        let oid = object.id.hash();
        let upload_href = upstream.url(format!("/upload/{}", oid));
        let verify_href = upstream.url(format!("/verify/{}", oid));
        let upload_batch = upstream
            .mock_async(|when, then| {
                when.method(POST)
                    .path(format!("/{}/info/lfs/objects/batch", REPO))
                    .json_body_partial(r#"{"operation": "upload"}"#);
                then.status(200)
                    .header("content-type", LFS_CONTENT_TYPE)
                    .json_body(json!({
                        "transfer": "basic",
                        "objects": [{
                            "oid": oid,
                            "size": object.id.size(),
                            "actions": {
                                "upload": {"href": upload_href},
                                "verify": {"href": verify_href}
                            }
                        }]
                    }));
            })
            .await;
        let object_put = upstream
            .mock_async(|when, then| {
                when.method(PUT)
                    .path(format!("/upload/{}", oid))
                    .header("content-length", object.id.size().to_string());
                then.status(200);
            })
            .await;
        let object_verify = upstream
            .mock_async(|when, then| {
                when.method(POST)
                    .path(format!("/verify/{}", oid))
                    .json_body(json!({"oid": oid, "size": object.id.size()}));
                then.status(200);
            })
            .await;

        println!("\n📤 Testing upload...");
        upload_file(&client_binary, &server_url, REPO, &object.path)?;
        upload_batch.assert_async().await;
        object_put.assert_async().await;
        object_verify.assert_async().await;
        println!("✅ Upload and verify reached upstream");

        println!("\n🔀 Testing Git passthrough...");
        let refs = upstream
            .mock_async(|when, then| {
                when.method(GET)
                    .path(format!("/{}/info/refs", REPO))
                    .query_param("service", "git-upload-pack");
                then.status(200)
                    .header("content-type", "application/x-git-upload-pack-advertisement")
                    .body("001e# service=git-upload-pack\n0000");
            })
            .await;
        let response = reqwest::get(format!(
            "{}/api/1/{}/info/refs?service=git-upload-pack",
            server_url, REPO
        ))
        .await?;
        anyhow::ensure!(
            response.status().is_success(),
            "Passthrough returned {}",
            response.status()
        );
        let body = response.text().await?;
        anyhow::ensure!(body.starts_with("001e# service"), "Unexpected passthrough body: {}", body);
        refs.assert_async().await;
        println!("✅ Git passthrough forwarded to upstream");

        Ok::<(), anyhow::Error>(())
    };

    let result = test_result.await;

    // Always cleanup, even on error
    if let Err(e) = cleanup_test_data(&test_data_dir) {
        eprintln!("Warning: Failed to cleanup test data: {}", e);
    }

    result
}

fn cleanup_test_data(test_data_dir: &Path) -> Result<()> {
    let keep_data = std::env::var("KEEP_TEST_DATA").unwrap_or_else(|_| "false".to_string());
    if keep_data == "true" {
        println!(
            "\n⚠️  Keeping test data (KEEP_TEST_DATA=true): {:?}",
            test_data_dir
        );
        return Ok(());
    }

    println!("\n🧹 Cleaning up test data: {:?}", test_data_dir);
    if test_data_dir.exists() {
        std::fs::remove_dir_all(test_data_dir).with_context(|| {
            format!("Failed to remove test data directory: {:?}", test_data_dir)
        })?;
        println!("✅ Test data cleaned up");
    }
    Ok(())
}
