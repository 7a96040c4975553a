//! Export pipeline
//!
//! Drives one export run: page through the store, flatten every record,
//! plan the header and write CSV to the sink. A run ends when the store is
//! exhausted, a cap is hit (rows, pages, wall clock), the caller cancels, or
//! the store fails.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWrite;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};
use uuid::Uuid;

use crate::config::{Config, ExportConfig, HeaderPolicy};
use crate::error::{ExportError, Result};
use crate::flatten::{FlattenOptions, Flattener};
use crate::model::{FlatRow, ShapeKind};
use crate::store::{ContinuationToken, RecordStore};

use super::columns::{ColumnPlan, ColumnTracker};
use super::progress::ProgressTracker;
use super::request::ExportRequest;
use super::sanitize::InjectionGuard;
use super::writer::CsvWriter;

/// Why a run stopped before the store ran dry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapReason {
    RowLimit,
    PageLimit,
    Timeout,
}

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportOutcome {
    /// The store reported no further pages.
    Exhausted,
    /// A limit stopped the run; the output is valid but partial.
    Capped(CapReason),
    /// The caller cancelled; buffered rows were dropped.
    Cancelled,
}

impl ExportOutcome {
    pub fn is_capped(&self) -> bool {
        matches!(self, ExportOutcome::Capped(_))
    }
}

impl fmt::Display for ExportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportOutcome::Exhausted => write!(f, "complete"),
            ExportOutcome::Capped(CapReason::RowLimit) => write!(f, "capped at row limit"),
            ExportOutcome::Capped(CapReason::PageLimit) => write!(f, "capped at page limit"),
            ExportOutcome::Capped(CapReason::Timeout) => write!(f, "capped by timeout"),
            ExportOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Result of an export run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub session_id: Uuid,
    pub shape: ShapeKind,
    pub filename: String,
    pub outcome: ExportOutcome,
    /// Data rows written (header and notice lines excluded)
    pub rows_emitted: u64,
    pub pages_fetched: u32,
    pub bytes_written: u64,
    /// Fields that fell back to plain text or collided
    pub malformed_fields: u64,
    /// Distinct keys dropped because the header was already fixed
    pub unplanned_columns: u64,
    pub elapsed_ms: u64,
}

impl fmt::Display for ExportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} rows from {} pages, {} bytes, {} ms ({})",
            self.filename,
            self.rows_emitted,
            self.pages_fetched,
            self.bytes_written,
            self.elapsed_ms,
            self.outcome
        )?;
        if self.malformed_fields > 0 {
            write!(f, ", {} malformed fields", self.malformed_fields)?;
        }
        if self.unplanned_columns > 0 {
            write!(f, ", {} unplanned columns dropped", self.unplanned_columns)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Idle,
    Fetching,
    Flattening,
    Planning,
    Emitting,
    Exhausted,
    Capped,
    Failed,
    Cancelled,
}

/// Per-run mutable state. Never shared between runs.
struct ExportSession {
    id: Uuid,
    state: RunState,
    columns: ColumnTracker,
    buffered: Vec<FlatRow>,
    rows_accepted: u64,
    pages_fetched: u32,
    token: Option<ContinuationToken>,
    malformed_fields: u64,
    unplanned: BTreeSet<String>,
}

impl ExportSession {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: RunState::Idle,
            columns: ColumnTracker::new(),
            buffered: Vec::new(),
            rows_accepted: 0,
            pages_fetched: 0,
            token: None,
            malformed_fields: 0,
            unplanned: BTreeSet::new(),
        }
    }

    fn transition(&mut self, next: RunState) {
        if self.state != next {
            trace!("{:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    fn note_unplanned(&mut self, plan: &ColumnPlan, row: &FlatRow) {
        for key in row.keys() {
            if !plan.contains(key) && self.unplanned.insert(key.clone()) {
                warn!("Column '{}' appeared after the header was written; dropped", key);
            }
        }
    }
}

/// Export engine bound to one record store.
///
/// Immutable once built; clone it freely to run exports concurrently.
#[derive(Clone)]
pub struct ExportPipeline {
    store: Arc<dyn RecordStore>,
    export: ExportConfig,
    timeout: Duration,
    priority: Vec<String>,
    guard: InjectionGuard,
    flatten: FlattenOptions,
}

impl ExportPipeline {
    pub fn new(store: Arc<dyn RecordStore>, config: &Config) -> Self {
        Self {
            store,
            export: config.export.clone(),
            timeout: config.export_timeout(),
            priority: config.columns.priority.clone(),
            guard: config.injection_guard(),
            flatten: config.flatten_options(),
        }
    }

    /// Run one export, writing CSV to `sink`.
    ///
    /// # Arguments
    /// * `request` - Validated request
    /// * `sink` - Output; flushed before returning
    /// * `cancel` - Cancels the run between or during fetches
    /// * `progress` - Receives the running row count
    ///
    /// # Returns
    /// * `Result<ExportSummary>` - Statistics, or the error that ended the run
    pub async fn run<W>(
        &self,
        request: &ExportRequest,
        sink: W,
        cancel: CancellationToken,
        progress: &ProgressTracker,
    ) -> Result<ExportSummary>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let session = ExportSession::new();
        let span = info_span!("export", session = %session.id, table = %request.shape);
        self.execute(request, sink, cancel, progress, session)
            .instrument(span)
            .await
    }

    async fn execute<W>(
        &self,
        request: &ExportRequest,
        sink: W,
        cancel: CancellationToken,
        progress: &ProgressTracker,
        mut session: ExportSession,
    ) -> Result<ExportSummary>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let started = Instant::now();
        // A budget too large to represent is no deadline at all.
        let deadline = started.checked_add(self.timeout);
        let flattener = Flattener::new(request.shape, self.flatten);
        let priority: &[String] = request.column_override.as_deref().unwrap_or(&self.priority);
        let mut writer = CsvWriter::new(sink, self.guard);
        let mut streaming_plan: Option<ColumnPlan> = None;

        info!(
            "Starting export of {} (limit {}, {:?} header)",
            request.shape, request.limit, self.export.header_policy
        );

        let outcome = loop {
            if cancel.is_cancelled() {
                break ExportOutcome::Cancelled;
            }
            if session.pages_fetched >= self.export.max_pages {
                warn!("Stopped after {} pages", session.pages_fetched);
                break ExportOutcome::Capped(CapReason::PageLimit);
            }
            let remaining = deadline.map_or(Duration::MAX, |deadline| {
                deadline.saturating_duration_since(Instant::now())
            });
            if remaining.is_zero() {
                break ExportOutcome::Capped(CapReason::Timeout);
            }

            session.transition(RunState::Fetching);
            let fetch = self.store.fetch_page(
                request.shape,
                &request.filters,
                session.token.as_ref(),
                self.export.page_size,
            );
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = tokio::time::timeout(remaining, fetch) => Some(result),
            };

            let page = match fetched {
                None => break ExportOutcome::Cancelled,
                Some(Err(_)) => {
                    warn!("Export timed out after {} pages", session.pages_fetched);
                    break ExportOutcome::Capped(CapReason::Timeout);
                }
                Some(Ok(Err(source))) => {
                    session.transition(RunState::Failed);
                    let _ = writer.finalize().await;
                    progress.finish();
                    return Err(if writer.has_output() {
                        error!(
                            "Store failed after {} rows were written: {}",
                            writer.rows_written(),
                            source
                        );
                        ExportError::Truncated {
                            rows_emitted: writer.rows_written(),
                            source,
                        }
                    } else {
                        error!("Store failed: {}", source);
                        ExportError::Store(source)
                    });
                }
                Some(Ok(Ok(page))) => page,
            };

            session.pages_fetched += 1;
            progress.page_fetched(session.pages_fetched);
            let more = page.has_more();
            debug!(
                "Page {}: {} records, more: {}",
                session.pages_fetched,
                page.records.len(),
                more
            );

            session.transition(RunState::Flattening);
            let mut rows = Vec::with_capacity(page.records.len());
            let mut cut_short = false;
            for record in &page.records {
                if session.rows_accepted >= request.limit {
                    cut_short = true;
                    break;
                }
                let flattened = flattener.flatten_with_diagnostics(record);
                if flattened.malformed > 0 {
                    debug!("Record had {} malformed fields", flattened.malformed);
                }
                session.malformed_fields += u64::from(flattened.malformed);
                session.columns.observe(&flattened.row);
                rows.push(flattened.row);
                session.rows_accepted += 1;
            }

            match self.export.header_policy {
                HeaderPolicy::Buffered => session.buffered.extend(rows),
                HeaderPolicy::Streaming => {
                    if streaming_plan.is_none() && !rows.is_empty() {
                        session.transition(RunState::Planning);
                        let mut first_page = ColumnTracker::with_columns(
                            request.shape.declared_columns().iter().copied(),
                        );
                        for row in &rows {
                            first_page.observe(row);
                        }
                        let plan = first_page.plan(priority);
                        writer.write_header(&plan).await?;
                        streaming_plan = Some(plan);
                    }
                    if let Some(plan) = &streaming_plan {
                        session.transition(RunState::Emitting);
                        for row in &rows {
                            session.note_unplanned(plan, row);
                            writer.write_row(plan, row).await?;
                        }
                    }
                }
            }
            progress.update(session.rows_accepted);

            if cut_short || (session.rows_accepted >= request.limit && more) {
                info!("Row limit {} reached", request.limit);
                break ExportOutcome::Capped(CapReason::RowLimit);
            }
            if !more {
                break ExportOutcome::Exhausted;
            }
            session.token = page.next_token;
        };

        if outcome == ExportOutcome::Cancelled {
            session.transition(RunState::Cancelled);
            info!(
                "Export cancelled after {} pages; {} buffered rows dropped",
                session.pages_fetched,
                session.buffered.len()
            );
            session.buffered.clear();
        } else {
            if !session.buffered.is_empty() {
                session.transition(RunState::Planning);
                let plan = session.columns.plan(priority);
                debug!("Planned {} columns", plan.len());

                session.transition(RunState::Emitting);
                writer.write_header(&plan).await?;
                for row in &session.buffered {
                    writer.write_row(&plan, row).await?;
                }
            }

            if !writer.header_written() && self.export.empty_notice {
                let (start, end) = request.range_label();
                writer
                    .write_line(&format!(
                        "No data found for {} between {} and {}",
                        request.shape, start, end
                    ))
                    .await?;
            }

            session.transition(match outcome {
                ExportOutcome::Exhausted => RunState::Exhausted,
                _ => RunState::Capped,
            });
        }

        writer.finalize().await?;
        progress.finish();

        let summary = ExportSummary {
            session_id: session.id,
            shape: request.shape,
            filename: request.filename.clone(),
            outcome,
            rows_emitted: writer.rows_written(),
            pages_fetched: session.pages_fetched,
            bytes_written: writer.bytes_written(),
            malformed_fields: session.malformed_fields,
            unplanned_columns: session.unplanned.len() as u64,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            "Export finished: {} rows, {} bytes, {} ms ({})",
            summary.rows_emitted, summary.bytes_written, summary.elapsed_ms, summary.outcome
        );

        Ok(summary)
    }
}
