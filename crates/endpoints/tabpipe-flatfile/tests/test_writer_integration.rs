//! Reader/writer integration: a file read batch-by-batch and written back
//! through the sink reproduces the original rows.

use std::io::Write as _;

use tabpipe_core_common::io::{BatchSink, BatchSource};
use tabpipe_core_common::mapper;
use tabpipe_core_common::types::{Cell, RowBatch};
use tabpipe_flatfile::schema::FileFormatOptions;
use tabpipe_flatfile::writer::FileWriteOptions;
use tabpipe_flatfile::{FileSink, FileSource, resolve_file_schema};

fn write_fixture(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[tokio::test]
async fn test_read_decode_write_round_trip() {
    let input = write_fixture(
        "id,name,score,joined\n\
         1,alice,9.5,2024-01-01\n\
         2,\"last, first\",8,2024-01-02\n\
         3,carol,,2024-01-03\n",
    );
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.csv");

    let format = FileFormatOptions::default();
    let resolved = resolve_file_schema(input.path(), &format).await.unwrap();
    let selected: Vec<String> = resolved.iter().map(|s| s.name.clone()).collect();

    let mut source = FileSource::open(input.path(), &format, &resolved, &selected, 0, 2)
        .await
        .unwrap();
    let mut sink = FileSink::create(&out, FileWriteOptions::default(), &resolved, false)
        .await
        .unwrap();

    // Decode each text cell against the resolved schema, the way the
    // coordinator's mapping step does, then commit.
    while let Some(batch) = source.next_batch(2).await.unwrap() {
        let rows: Vec<Vec<Cell>> = batch
            .rows
            .iter()
            .enumerate()
            .map(|(offset, row)| {
                row.iter()
                    .zip(&resolved)
                    .map(|(cell, spec)| {
                        mapper::decode_cell(
                            &spec.name,
                            batch.batch_index * 2 + offset as u64,
                            cell,
                            spec.logical_type,
                            spec.nullable,
                        )
                        .unwrap()
                    })
                    .collect()
            })
            .collect();
        sink.commit_batch(&RowBatch::new(rows, batch.batch_index))
            .await
            .unwrap();
    }
    sink.finalize().await.unwrap();

    let content = std::fs::read_to_string(&out).unwrap();
    assert_eq!(
        content,
        "id,name,score,joined\n\
         1,alice,9.5,2024-01-01\n\
         2,\"last, first\",8,2024-01-02\n\
         3,carol,,2024-01-03\n"
    );
}

#[tokio::test]
async fn test_round_trip_preserves_row_and_column_order() {
    let input = write_fixture("b,a\n2,1\n4,3\n6,5\n8,7\n");
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.csv");

    let format = FileFormatOptions::default();
    let resolved = resolve_file_schema(input.path(), &format).await.unwrap();
    let selected: Vec<String> = resolved.iter().map(|s| s.name.clone()).collect();

    let mut source = FileSource::open(input.path(), &format, &resolved, &selected, 0, 3)
        .await
        .unwrap();
    let mut sink = FileSink::create(&out, FileWriteOptions::default(), &resolved, false)
        .await
        .unwrap();
    while let Some(batch) = source.next_batch(3).await.unwrap() {
        sink.commit_batch(&batch).await.unwrap();
    }
    sink.finalize().await.unwrap();

    assert_eq!(
        std::fs::read_to_string(&out).unwrap(),
        "b,a\n2,1\n4,3\n6,5\n8,7\n"
    );
}
