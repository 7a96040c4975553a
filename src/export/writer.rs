//! CSV line writer
//!
//! Writes the header and data rows of one export to any async sink. Each
//! line is sanitised and quoted by the injection guard, then handed to a
//! buffered async writer as soon as it is encoded.

use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::error::Result;
use crate::model::FlatRow;

use super::columns::ColumnPlan;
use super::sanitize::InjectionGuard;

/// Row terminator (RFC 4180).
pub const LINE_TERMINATOR: &str = "\r\n";

const BUFFER_CAPACITY: usize = 64 * 1024;

/// Writer for CSV output
pub struct CsvWriter<W: AsyncWrite + Unpin + Send> {
    /// Buffered sink
    writer: BufWriter<W>,
    /// Cell sanitisation policy
    guard: InjectionGuard,
    /// Whether the header line has been written
    header_written: bool,
    /// Number of data rows written
    rows_written: u64,
    /// Number of bytes handed to the sink
    bytes_written: u64,
}

impl<W: AsyncWrite + Unpin + Send> CsvWriter<W> {
    pub fn new(inner: W, guard: InjectionGuard) -> Self {
        Self {
            writer: BufWriter::with_capacity(BUFFER_CAPACITY, inner),
            guard,
            header_written: false,
            rows_written: 0,
            bytes_written: 0,
        }
    }

    /// Write the header line for `plan`.
    pub async fn write_header(&mut self, plan: &ColumnPlan) -> Result<()> {
        let line = self.guard.encode_record(plan.columns().iter().map(String::as_str))?;
        self.write_encoded(&line).await?;
        self.header_written = true;
        debug!("Wrote CSV header: {} columns", plan.len());
        Ok(())
    }

    /// Write one data row in plan order; missing cells are empty.
    pub async fn write_row(&mut self, plan: &ColumnPlan, row: &FlatRow) -> Result<()> {
        let line = self.guard.encode_record(plan.project(row))?;
        self.write_encoded(&line).await?;
        self.rows_written += 1;
        Ok(())
    }

    /// Write a raw line followed by the row terminator.
    pub async fn write_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(LINE_TERMINATOR.as_bytes()).await?;
        self.bytes_written += (line.len() + LINE_TERMINATOR.len()) as u64;
        Ok(())
    }

    /// Write an already terminated record.
    async fn write_encoded(&mut self, record: &[u8]) -> Result<()> {
        self.writer.write_all(record).await?;
        self.bytes_written += record.len() as u64;
        Ok(())
    }

    /// Flush buffered bytes to the sink.
    pub async fn finalize(&mut self) -> Result<()> {
        self.writer.flush().await?;
        debug!(
            "Finalized CSV output: {} rows, {} bytes",
            self.rows_written, self.bytes_written
        );
        Ok(())
    }

    pub fn header_written(&self) -> bool {
        self.header_written
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Whether any byte has been produced yet.
    pub fn has_output(&self) -> bool {
        self.bytes_written > 0
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}
