use std::collections::BTreeMap;
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use sitedrop_archive::{MIB, Strictness};
use sitedrop_deploy::{
    Config, DeploymentRecord, DeploymentSink, DeploymentStatus, JsonlSink, LimitKind, Pipeline,
    PipelineError, UploadRequest, UploadResponse,
};
use sitedrop_fs::DirOps;
use sitedrop_rate::{MemoryCounterStore, RateLimiter};
use tempfile::{TempDir, tempdir};
use zip::write::SimpleFileOptions;

fn build_zip(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, data) in files {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Incompressible bytes from a xorshift generator.
fn noise(len: usize) -> Vec<u8> {
    let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 24) as u8
        })
        .collect()
}

fn config(root: &Path) -> Config {
    Config {
        publish_root: root.to_path_buf(),
        ..Config::default()
    }
}

fn pipeline() -> (TempDir, Pipeline) {
    let dir = tempdir().unwrap();
    let pipeline = Pipeline::new(config(dir.path()))
        .with_limiter(RateLimiter::new(Arc::new(MemoryCounterStore::new())));
    (dir, pipeline)
}

/// Relative path -> content for every file under `root`.
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    fn walk(base: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(base, &path, out);
            } else {
                let rel = path.strip_prefix(base).unwrap().to_path_buf();
                out.insert(rel, std::fs::read(&path).unwrap());
            }
        }
    }
    let mut out = BTreeMap::new();
    if root.exists() {
        walk(root, root, &mut out);
    }
    out
}

fn names_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .map(|e| e.unwrap().file_name().into_string().unwrap())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

fn upload(pipeline: &Pipeline, files: &[(&str, &[u8])]) -> Result<UploadResponse, PipelineError> {
    pipeline.upload(UploadRequest::new("alice", "site.zip", build_zip(files)))
}

#[test]
fn sequential_production_publishes_leave_only_latest_tree() {
    let (_dir, pipeline) = pipeline();
    let layout = pipeline.layout().clone();

    upload(
        &pipeline,
        &[("index.html", b"<h1>v1</h1>"), ("old/page.html", b"stale")],
    )
    .unwrap();
    let second = upload(
        &pipeline,
        &[("index.html", b"<h1>v2</h1>"), ("css/site.css", b"body{}")],
    )
    .unwrap();

    assert_eq!(second.resulting_path, "/alice");
    assert_eq!(second.file_count, 2);
    assert_eq!(second.total_size, 17);
    assert!(second.warnings.is_empty());

    assert_eq!(names_in(&layout.sites_dir()), vec!["alice"]);
    let expected: BTreeMap<PathBuf, Vec<u8>> = [
        (PathBuf::from("index.html"), b"<h1>v2</h1>".to_vec()),
        (PathBuf::from("css/site.css"), b"body{}".to_vec()),
    ]
    .into_iter()
    .collect();
    assert_eq!(snapshot(&layout.site("alice")), expected);
    assert!(names_in(&layout.staging_dir()).is_empty());
}

#[test]
fn zip_slip_upload_writes_nothing() {
    let (dir, pipeline) = pipeline();
    let layout = pipeline.layout().clone();

    let index = vec![b'a'; 50];
    let passwd = vec![b'x'; 10];
    let err = upload(
        &pipeline,
        &[("index.html", &index), ("../../etc/passwd", &passwd)],
    )
    .unwrap_err();

    assert_eq!(err.status_code(), 400);
    assert!(matches!(err, PipelineError::Validation { .. }));
    assert!(!layout.site("alice").exists());
    assert!(names_in(&layout.staging_dir()).is_empty());
    assert!(!dir.path().join("etc").exists());
}

#[test]
fn skip_member_strictness_publishes_remaining_files() {
    let dir = tempdir().unwrap();
    let mut config = config(dir.path());
    config.strictness = Strictness::SkipMember;
    let pipeline = Pipeline::new(config);

    let index = vec![b'a'; 50];
    let passwd = vec![b'x'; 10];
    let response = upload(
        &pipeline,
        &[("index.html", &index), ("../../etc/passwd", &passwd)],
    )
    .unwrap();

    assert_eq!(response.file_count, 1);
    assert_eq!(response.total_size, 50);
    assert_eq!(response.warnings, vec!["Skipped unsafe path: ../../etc/passwd"]);
    assert_eq!(
        names_in(&pipeline.layout().site("alice")),
        vec!["index.html"]
    );
}

#[test]
fn skip_member_never_publishes_an_empty_tree() {
    let dir = tempdir().unwrap();
    let mut config = config(dir.path());
    config.strictness = Strictness::SkipMember;
    let pipeline = Pipeline::new(config);
    let layout = pipeline.layout().clone();

    upload(&pipeline, &[("index.html", b"<h1>live</h1>")]).unwrap();
    let before = snapshot(&layout.site("alice"));

    // Rejected by the validator.
    let err = upload(&pipeline, &[("../evil.html", b"x")]).unwrap_err();
    assert_eq!(err.details(), vec!["archive is empty"]);
    assert_eq!(err.status_code(), 400);

    // Rejected by the sanitizer during extraction.
    let err = upload(&pipeline, &[("/abs/evil.html", b"x")]).unwrap_err();
    assert_eq!(err.details(), vec!["archive is empty"]);

    assert_eq!(snapshot(&layout.site("alice")), before);
    assert_eq!(names_in(&layout.sites_dir()), vec!["alice"]);
    assert!(names_in(&layout.staging_dir()).is_empty());
}

#[test]
fn file_and_directory_collision_is_a_validation_error() {
    let (_dir, pipeline) = pipeline();
    let err = upload(
        &pipeline,
        &[
            ("index.html", b"ok"),
            ("docs", b"plain"),
            ("docs/a.html", b"nested"),
        ],
    )
    .unwrap_err();

    assert_eq!(err.status_code(), 400);
    assert_eq!(
        err.details(),
        vec!["Conflicting paths: docs is both a file and a directory"]
    );
    assert!(!pipeline.layout().site("alice").exists());
}

/// Fails the first rename that moves a staging tree into place.
struct FailStagingRename {
    staging_dir: PathBuf,
}

impl DirOps for FailStagingRename {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if from.starts_with(&self.staging_dir) {
            return Err(io::Error::other("injected failure"));
        }
        std::fs::rename(from, to)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir_all(path)
    }
}

#[test]
fn failed_swap_leaves_live_site_byte_identical() {
    let (_dir, pipeline) = pipeline();
    let layout = pipeline.layout().clone();
    upload(
        &pipeline,
        &[("index.html", b"<h1>live</h1>"), ("img/a.png", b"\x89PNG")],
    )
    .unwrap();
    let before = snapshot(&layout.site("alice"));

    let failing = pipeline.with_dir_ops(FailStagingRename {
        staging_dir: layout.staging_dir(),
    });
    let err = failing
        .upload(UploadRequest::new(
            "alice",
            "site.zip",
            build_zip(&[("index.html", b"<h1>broken</h1>")]),
        ))
        .unwrap_err();

    assert!(matches!(err, PipelineError::Publish { .. }));
    assert_eq!(err.status_code(), 500);
    assert_eq!(snapshot(&layout.site("alice")), before);
    assert_eq!(names_in(&layout.sites_dir()), vec!["alice"]);
    assert!(names_in(&layout.staging_dir()).is_empty());
}

#[test]
fn rate_limit_denies_without_side_effects() {
    let (_dir, pipeline) = pipeline();
    let layout = pipeline.layout().clone();
    let archive = build_zip(&[("index.html", b"hi")]);

    for _ in 0..2 {
        pipeline
            .upload(UploadRequest::new("alice", "s.zip", archive.clone()).daily_limit(2))
            .unwrap();
    }
    let before = snapshot(&layout.site("alice"));

    let err = pipeline
        .upload(
            UploadRequest::new("alice", "s.zip", build_zip(&[("index.html", b"new")]))
                .daily_limit(2),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        PipelineError::ResourceLimit {
            kind: LimitKind::DailyRate,
            ..
        }
    ));
    assert_eq!(err.status_code(), 429);
    assert_eq!(snapshot(&layout.site("alice")), before);
    assert_eq!(pipeline.limiter().usage("alice").unwrap()[0].count, 2);
}

#[test]
fn request_pre_checks() {
    let (_dir, pipeline) = pipeline();
    let archive = build_zip(&[("index.html", b"hi")]);

    let err = pipeline
        .upload(UploadRequest::new("alice", "site.tar", archive.clone()))
        .unwrap_err();
    assert_eq!(err.to_string(), "Only ZIP files are allowed");

    let err = pipeline
        .upload(UploadRequest::new("alice", "site.zip", Vec::new()))
        .unwrap_err();
    assert_eq!(err.to_string(), "No file uploaded");

    let big = build_zip(&[("index.html", &noise(2 * MIB as usize)[..])]);
    let err = pipeline
        .upload(UploadRequest::new("alice", "site.zip", big).max_upload_mb(1))
        .unwrap_err();
    assert_eq!(err.to_string(), "File size exceeds 1MB limit");
    assert_eq!(err.status_code(), 400);

    let err = pipeline
        .upload(UploadRequest::new("alice", "site.zip", b"definitely not a zip".to_vec()))
        .unwrap_err();
    assert!(matches!(err, PipelineError::Input { .. }));

    let err = pipeline
        .upload(UploadRequest::new("../bob", "site.zip", archive))
        .unwrap_err();
    assert!(matches!(err, PipelineError::Input { .. }));
}

#[test]
fn decompression_bomb_is_a_resource_limit() {
    let dir = tempdir().unwrap();
    let mut config = config(dir.path());
    config.limits.max_file_size = MIB;
    config.limits.max_extracted_size = 2 * MIB;
    let pipeline = Pipeline::new(config);

    let zeros = vec![0u8; 3 * MIB as usize];
    let err = upload(&pipeline, &[("index.html", b"hi"), ("zeros.txt", &zeros)]).unwrap_err();
    assert_eq!(err.status_code(), 413);
    assert!(!pipeline.layout().site("alice").exists());
    assert!(names_in(&pipeline.layout().staging_dir()).is_empty());
}

#[test]
fn dangerous_content_rejected() {
    let (_dir, pipeline) = pipeline();
    let err = upload(
        &pipeline,
        &[("index.html", b"<h1>ok</h1>"), ("img/cat.png", b"<?php system($_GET['c']);")],
    )
    .unwrap_err();
    assert_eq!(
        err.details(),
        vec!["Potentially dangerous content detected in img/cat.png"]
    );
}

#[test]
fn missing_index_is_reported_as_warning() {
    let (_dir, pipeline) = pipeline();
    let response = upload(&pipeline, &[("about.html", b"about")]).unwrap();
    assert_eq!(
        response.warnings,
        vec!["No index.html found - users will see a directory listing or 404"]
    );
}

#[derive(Default)]
struct MemorySink(Mutex<Vec<DeploymentRecord>>);

impl DeploymentSink for MemorySink {
    fn record(&self, record: &DeploymentRecord) -> io::Result<()> {
        self.0.lock().unwrap().push(record.clone());
        Ok(())
    }
}

#[test]
fn preview_then_promote() {
    let (_dir, pipeline) = pipeline();
    let sink = Arc::new(MemorySink::default());
    let pipeline = pipeline.with_sink(sink.clone());
    let layout = pipeline.layout().clone();

    let preview = pipeline
        .upload(
            UploadRequest::new("alice", "site.zip", build_zip(&[("index.html", b"preview")]))
                .preview(true)
                .site_name("My Site!"),
        )
        .unwrap();
    let preview_id = preview.preview_id.clone().unwrap();
    assert_eq!(preview.resulting_path, format!("/preview/{preview_id}"));
    assert!(layout.preview(&preview_id).join("index.html").is_file());
    assert!(!layout.site("alice").exists());

    let promoted = pipeline.promote_preview("alice", &preview_id).unwrap();
    assert_eq!(promoted.live_path, "/alice");
    assert_eq!(
        std::fs::read(layout.site("alice").join("index.html")).unwrap(),
        b"preview"
    );
    assert!(!layout.preview(&preview_id).exists());

    let records = sink.0.lock().unwrap();
    assert_eq!(records.len(), 2);
    assert!(records[0].is_preview);
    assert_eq!(records[0].site_name, "My-Site-");
    assert_eq!(records[0].preview_id.as_deref(), Some(preview_id.as_str()));
    assert_eq!(records[1].status, DeploymentStatus::Promoted);
}

#[test]
fn jsonl_sink_receives_records() {
    let (dir, pipeline) = pipeline();
    let sink = Arc::new(JsonlSink::new(dir.path().join("deployments.jsonl")));
    let pipeline = pipeline.with_sink(sink.clone());
    let response = upload(&pipeline, &[("index.html", b"hi")]).unwrap();

    let records = sink.read_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, response.deployment_id);
    assert_eq!(records[0].file_count, 1);
}

#[test]
fn concurrent_publishes_for_one_subject_never_mix() {
    let (_dir, pipeline) = pipeline();
    let pipeline = Arc::new(pipeline);
    let done = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let pipeline = pipeline.clone();
            let done = done.clone();
            thread::spawn(move || {
                let body = format!("version {i}");
                let files: Vec<(String, Vec<u8>)> = (0..5)
                    .map(|n| (format!("page{n}.html"), body.clone().into_bytes()))
                    .chain([("index.html".to_owned(), body.clone().into_bytes())])
                    .collect();
                let borrowed: Vec<(&str, &[u8])> = files
                    .iter()
                    .map(|(n, d)| (n.as_str(), d.as_slice()))
                    .collect();
                upload(&pipeline, &borrowed).unwrap();
                done.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(done.load(Ordering::SeqCst), 4);

    let layout = pipeline.layout();
    assert_eq!(names_in(&layout.sites_dir()), vec!["alice"]);
    let tree = snapshot(&layout.site("alice"));
    assert_eq!(tree.len(), 6);
    let first = tree.values().next().unwrap().clone();
    assert!(tree.values().all(|content| *content == first));
}
