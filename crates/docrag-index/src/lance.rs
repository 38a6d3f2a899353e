//! Lance table holding one row per indexed vector.
//!
//! Rows carry their index position so a scan can be put back in order
//! regardless of fragment layout. The table name embeds the dimension, so a
//! model with a different width never shares a table with the previous one.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use arrow_schema::{DataType, Field, Schema};
use lancedb::query::ExecutableQuery;
use lancedb::{connect, Connection};
use tracing::debug;

const TABLE_PREFIX: &str = "vectors";
const WRITE_BATCH_ROWS: usize = 1000;

/// One stored vector and the document it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRow {
    pub position: usize,
    pub filename: String,
    pub vector: Vec<f32>,
}

pub fn table_name(dim: usize) -> String {
    format!("{}_d{}", TABLE_PREFIX, dim)
}

pub fn vectors_schema(dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("position", DataType::Int32, false),
        Field::new("filename", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32),
            true,
        ),
    ]))
}

pub async fn open_db(dir: &Path) -> Result<Connection> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating index dir {}", dir.display()))?;
    Ok(connect(dir.to_string_lossy().as_ref()).execute().await?)
}

async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

/// Number of stored vectors; zero when the table does not exist yet.
pub async fn count_vectors(conn: &Connection, dim: usize) -> Result<usize> {
    let name = table_name(dim);
    if !table_exists(conn, &name).await? {
        return Ok(0);
    }
    let table = conn.open_table(&name).execute().await?;
    Ok(table.count_rows(None).await?)
}

fn rows_to_batch(rows: &[VectorRow], dim: usize) -> Result<RecordBatch> {
    let positions: Vec<i32> = rows
        .iter()
        .map(|r| i32::try_from(r.position).context("vector position exceeds i32"))
        .collect::<Result<_>>()?;
    let filenames: Vec<&str> = rows.iter().map(|r| r.filename.as_str()).collect();
    let vectors = rows.iter().map(|r| Some(r.vector.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
    let batch = RecordBatch::try_new(
        vectors_schema(dim),
        vec![
            Arc::new(Int32Array::from(positions)),
            Arc::new(StringArray::from(filenames)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim as i32)),
        ],
    )?;
    Ok(batch)
}

/// Write rows. With `overwrite`, existing rows are removed first.
pub async fn write_vectors(conn: &Connection, dim: usize, rows: &[VectorRow], overwrite: bool) -> Result<()> {
    let name = table_name(dim);
    let schema = vectors_schema(dim);
    if !table_exists(conn, &name).await? {
        let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
        conn.create_table(&name, Box::new(iter)).execute().await?;
    }
    let table = conn.open_table(&name).execute().await?;
    if overwrite {
        table.delete("true").await?;
    }
    for batch_rows in rows.chunks(WRITE_BATCH_ROWS) {
        let batch = rows_to_batch(batch_rows, dim)?;
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema.clone()));
        table.add(reader).execute().await?;
    }
    debug!(table = %name, rows = rows.len(), overwrite, "wrote vectors");
    Ok(())
}

/// All stored rows, sorted by position.
pub async fn read_vectors(conn: &Connection, dim: usize) -> Result<Vec<VectorRow>> {
    let name = table_name(dim);
    if !table_exists(conn, &name).await? {
        return Ok(Vec::new());
    }
    let table = conn.open_table(&name).execute().await?;
    let mut stream = table.query().execute().await?;
    let mut rows = Vec::new();
    while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await? {
        let positions = batch
            .column_by_name("position")
            .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
            .ok_or_else(|| anyhow::anyhow!("vectors.position column missing"))?;
        let filenames = batch
            .column_by_name("filename")
            .and_then(|c| c.as_any().downcast_ref::<StringArray>())
            .ok_or_else(|| anyhow::anyhow!("vectors.filename column missing"))?;
        let vectors = batch
            .column_by_name("vector")
            .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
            .ok_or_else(|| anyhow::anyhow!("vectors.vector column missing"))?;
        for i in 0..batch.num_rows() {
            let list = vectors.value(i);
            let vector = list.as_primitive::<Float32Type>().values().to_vec();
            rows.push(VectorRow {
                position: usize::try_from(positions.value(i)).context("negative vector position")?,
                filename: filenames.value(i).to_string(),
                vector,
            });
        }
    }
    rows.sort_by_key(|r| r.position);
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(position: usize, filename: &str, v: [f32; 3]) -> VectorRow {
        VectorRow { position, filename: filename.into(), vector: v.to_vec() }
    }

    #[tokio::test]
    async fn append_then_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_db(dir.path()).await.unwrap();
        assert_eq!(count_vectors(&conn, 3).await.unwrap(), 0);

        write_vectors(&conn, 3, &[row(0, "a", [1.0, 0.0, 0.0]), row(1, "a", [0.0, 1.0, 0.0])], false).await.unwrap();
        write_vectors(&conn, 3, &[row(2, "b", [0.0, 0.0, 1.0])], false).await.unwrap();
        assert_eq!(count_vectors(&conn, 3).await.unwrap(), 3);
        let rows = read_vectors(&conn, 3).await.unwrap();
        assert_eq!(rows.iter().map(|r| r.position).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(rows[2].filename, "b");

        write_vectors(&conn, 3, &[row(0, "b", [0.0, 0.0, 1.0])], true).await.unwrap();
        let rows = read_vectors(&conn, 3).await.unwrap();
        assert_eq!(rows, vec![row(0, "b", [0.0, 0.0, 1.0])]);
    }

    #[tokio::test]
    async fn dimensions_use_separate_tables() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_db(dir.path()).await.unwrap();
        write_vectors(&conn, 3, &[row(0, "a", [1.0, 0.0, 0.0])], false).await.unwrap();
        assert_eq!(count_vectors(&conn, 4).await.unwrap(), 0);
        assert!(read_vectors(&conn, 4).await.unwrap().is_empty());
    }
}
