//! Reading extraction output and writing comparison reports.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use crosswalk_core::{Comparison, DocumentItems, Mapping, crosswalk};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

/// Load the items of one document from an extraction JSON file.
pub fn read_document(path: &Path) -> anyhow::Result<DocumentItems> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let doc: DocumentItems = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing document items from {}", path.display()))?;
    Ok(doc)
}

pub fn read_comparison(path: &Path) -> anyhow::Result<Comparison> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing comparison from {}", path.display()))
}

pub fn write_comparison_json(path: &Path, comparison: &Comparison) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, comparison).context("serializing comparison")?;
    writer.flush()?;
    Ok(())
}

/// Write selected mappings as a flat Parquet table. Returns the row count.
pub fn write_mappings_parquet(path: &Path, mappings: &[Mapping]) -> anyhow::Result<usize> {
    let batch = crosswalk::mappings_to_batch(mappings).context("building mapping batch")?;
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, Arc::new(crosswalk::mapping_schema()), Some(props))
        .context("opening parquet writer")?;
    writer.write(&batch).context("writing mapping rows")?;
    writer.close().context("finalizing parquet file")?;
    Ok(batch.num_rows())
}
