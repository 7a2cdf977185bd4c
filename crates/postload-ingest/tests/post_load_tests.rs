//! End-to-end post-load runs over VEP fixtures

mod helpers;

use flate2::write::GzEncoder;
use flate2::Compression;
use helpers::*;
use postload_ingest::params::Assembly;
use postload_ingest::progress::LogReporter;
use postload_ingest::source::VepReader;
use postload_ingest::store::MemoryClinicalStore;
use postload_ingest::{run_post_load, BatchIngestor, PostLoadError, PostLoadOptions};
use serial_test::serial;
use std::io::Write;

#[tokio::test]
async fn test_unknown_assembly_rejected_before_reading_input() {
    // Not a VEP file: opening it would fail on the header
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "#not a vep header").unwrap();

    let options = PostLoadOptions {
        input: Some(file.path().to_path_buf()),
        assembly: Some("hg19".to_string()),
        dry_run: true,
        ..Default::default()
    };

    let err = run_post_load(&options, &mut LogReporter).await.unwrap_err();
    assert!(err.is_configuration());
    assert!(err
        .to_string()
        .contains("Available assemblies: GRCh37, GRCh38"));
}

#[tokio::test]
async fn test_dry_run_reads_every_variant() {
    let fixture = write_vep_fixture(2500);
    let options = PostLoadOptions {
        input: Some(fixture.path().to_path_buf()),
        assembly: Some("GRCh38".to_string()),
        dry_run: true,
        ..Default::default()
    };

    let mut reporter = RecordingReporter::default();
    let summary = run_post_load(&options, &mut reporter).await.unwrap();

    assert_eq!(summary.total_records, 2500);
    assert_eq!(summary.batches, 3);
    assert_eq!(summary.assembly, Assembly::GRCh38);
    assert_eq!(reporter.reports, vec![1000, 2000, 2500]);
    assert_eq!(summary.source, fixture.path().display().to_string());
}

#[tokio::test]
async fn test_gzip_input() {
    let mut file = tempfile::Builder::new().suffix(".vep.gz").tempfile().unwrap();
    let plain = std::fs::read_to_string(write_vep_fixture(42).path()).unwrap();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(plain.as_bytes()).unwrap();
    file.write_all(&encoder.finish().unwrap()).unwrap();

    let options = PostLoadOptions {
        input: Some(file.path().to_path_buf()),
        assembly: Some("GRCh37".to_string()),
        batch_size: 10,
        dry_run: true,
        ..Default::default()
    };

    let summary = run_post_load(&options, &mut LogReporter).await.unwrap();
    assert_eq!(summary.total_records, 42);
    assert_eq!(summary.batches, 5);
}

#[tokio::test]
async fn test_rerun_leaves_store_unchanged() {
    let fixture = write_vep_fixture(120);
    let params = validated(fixture.path(), 50);
    let store = MemoryClinicalStore::new();

    let mut reader = VepReader::new(fixture.path());
    BatchIngestor::new(&store, "hsapiens", &params)
        .ingest(&mut reader, &mut LogReporter)
        .await
        .unwrap();
    let first = store.snapshot();

    let mut reader = VepReader::new(fixture.path());
    BatchIngestor::new(&store, "hsapiens", &params)
        .ingest(&mut reader, &mut LogReporter)
        .await
        .unwrap();

    assert_eq!(store.snapshot(), first);
    assert_eq!(store.len(), 120);
    assert_eq!(store.merge_count(), 6);

    let (_, stored) = first.iter().next().unwrap();
    assert_eq!(stored.consequence_types.len(), 2);
}

#[tokio::test]
async fn test_malformed_file_surfaces_ingestion_error_with_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{}1_5_A/G\t1:5", VEP_HEADER).unwrap();

    let options = PostLoadOptions {
        input: Some(file.path().to_path_buf()),
        assembly: Some("GRCh37".to_string()),
        dry_run: true,
        ..Default::default()
    };

    let err = run_post_load(&options, &mut LogReporter).await.unwrap_err();
    match err {
        PostLoadError::Ingestion { path, .. } => assert_eq!(path, file.path()),
        other => panic!("expected ingestion error, got {:?}", other),
    }
}

#[tokio::test]
#[serial]
async fn test_missing_credentials_fail_before_ingestion() {
    const VARS: [&str; 5] = [
        "CELLBASE_DB_HOST",
        "CELLBASE_DB_PORT",
        "CELLBASE_DB_USER",
        "CELLBASE_DB_PASSWORD",
        "CELLBASE_VERSION",
    ];
    // Set-but-empty values are never replaced by a `.env` file
    for var in VARS {
        std::env::set_var(var, "");
    }

    let fixture = write_vep_fixture(3);
    let options = PostLoadOptions {
        input: Some(fixture.path().to_path_buf()),
        assembly: Some("GRCh37".to_string()),
        ..Default::default()
    };

    let result = run_post_load(&options, &mut LogReporter).await;
    for var in VARS {
        std::env::remove_var(var);
    }

    let err = result.unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("Missing database host"));
}
