//! End-to-end dispatch tests: override config file on disk, extension
//! executables, and the metadata service wired together.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

use linkvault_fetch::{MetadataService, OverrideConfigStore, SnapshotService};

fn write_executable(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn write_overrides(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("website_overrides.json");
    std::fs::write(&path, contents).unwrap();
    path
}

#[tokio::test]
async fn extension_loader_receives_url_and_config() {
    let dir = TempDir::new().unwrap();
    // The loader proves it got the url (argument) and the config (stdin):
    // the title reports whether the marker key arrived and whether the
    // loader path was rewritten to an absolute path.
    write_executable(
        &dir,
        "loader.sh",
        concat!(
            "#!/bin/sh\n",
            "[ \"$1\" = \"load-website-metadata\" ] || exit 2\n",
            "config=$(cat)\n",
            "case \"$config\" in *m1*) m=marker;; *) m=nomarker;; esac\n",
            "case \"$config\" in *'\"loader\":\"/'*) a=abs;; *) a=rel;; esac\n",
            "printf '{\"url\":\"%s\",\"title\":\"%s-%s\",\"description\":null,\"preview_image\":null}' \"$2\" \"$m\" \"$a\"\n",
        ),
    );
    let overrides = write_overrides(
        &dir,
        r#"{"example.com": {"loader": "./loader.sh", "marker": "m1"}}"#,
    );

    let service = MetadataService::new(Arc::new(OverrideConfigStore::new(overrides)));
    let metadata = service
        .load_website_metadata("https://example.com/page", false)
        .await
        .unwrap();

    assert_eq!(metadata.url, "https://example.com/page");
    assert_eq!(metadata.title.as_deref(), Some("marker-abs"));
}

#[tokio::test]
async fn extension_failure_propagates_to_caller() {
    let dir = TempDir::new().unwrap();
    write_executable(&dir, "loader.sh", "#!/bin/sh\ncat > /dev/null\nexit 3\n");
    let overrides = write_overrides(&dir, r#"{"example.com": {"loader": "./loader.sh"}}"#);

    let service = MetadataService::new(Arc::new(OverrideConfigStore::new(overrides)));
    let result = service
        .load_website_metadata("https://example.com/page", false)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn builtin_loader_degrades_to_empty_record_on_fetch_failure() {
    let dir = TempDir::new().unwrap();
    // Config without a loader entry: built-in runs with config applied.
    // Port 1 refuses connections, so the fetch fails and metadata is empty.
    let overrides = write_overrides(&dir, r#"{"127.0.0.1": {"timeout": 1}}"#);

    let service = MetadataService::new(Arc::new(OverrideConfigStore::new(overrides)));
    let metadata = service
        .load_website_metadata("http://127.0.0.1:1/page", false)
        .await
        .unwrap();
    assert_eq!(metadata.url, "http://127.0.0.1:1/page");
    assert_eq!(metadata.title, None);
    assert_eq!(metadata.description, None);
    assert_eq!(metadata.preview_image, None);
}

#[tokio::test]
async fn missing_overrides_file_falls_back_to_builtin() {
    let service = MetadataService::new(Arc::new(OverrideConfigStore::new(
        "/nonexistent/overrides.json",
    )));
    let metadata = service
        .load_website_metadata("http://127.0.0.1:1/page", false)
        .await
        .unwrap();
    assert_eq!(metadata.title, None);
}

#[tokio::test]
async fn snapshot_dispatches_to_processor_extension() {
    let dir = TempDir::new().unwrap();
    // The processor writes a marker file at the requested path.
    write_executable(
        &dir,
        "snap.sh",
        concat!(
            "#!/bin/sh\n",
            "[ \"$1\" = \"create-snapshot\" ] || exit 2\n",
            "cat > /dev/null\n",
            "printf 'snapshot of %s' \"$2\" > \"$3\"\n",
        ),
    );
    let overrides = write_overrides(&dir, r#"{"example.com": {"processor": "./snap.sh"}}"#);

    let service = SnapshotService::new(Arc::new(OverrideConfigStore::new(overrides)));
    let out = dir.path().join("snapshot.html");
    service
        .create_snapshot("https://example.com/page", &out)
        .await
        .unwrap();

    let written = std::fs::read_to_string(&out).unwrap();
    assert_eq!(written, "snapshot of https://example.com/page");
}

#[tokio::test]
async fn replacing_extension_takes_effect_without_restart() {
    let dir = TempDir::new().unwrap();
    let loader = write_executable(
        &dir,
        "loader.sh",
        "#!/bin/sh\ncat > /dev/null\nprintf '{\"url\":\"u\",\"title\":\"v1\",\"description\":null,\"preview_image\":null}'\n",
    );
    let overrides = write_overrides(&dir, r#"{"example.com": {"loader": "./loader.sh"}}"#);
    let service = MetadataService::new(Arc::new(OverrideConfigStore::new(overrides)));

    let first = service
        .load_website_metadata("https://example.com", false)
        .await
        .unwrap();
    assert_eq!(first.title.as_deref(), Some("v1"));

    std::fs::write(
        &loader,
        "#!/bin/sh\ncat > /dev/null\nprintf '{\"url\":\"u\",\"title\":\"v2\",\"description\":null,\"preview_image\":null}'\n",
    )
    .unwrap();
    let file = std::fs::File::options().write(true).open(&loader).unwrap();
    file.set_modified(std::time::SystemTime::now() + std::time::Duration::from_secs(5))
        .unwrap();
    // Close the write handle before spawning, or exec fails with ETXTBSY.
    drop(file);

    let second = service
        .load_website_metadata("https://example.com", false)
        .await
        .unwrap();
    assert_eq!(second.title.as_deref(), Some("v2"));
}
