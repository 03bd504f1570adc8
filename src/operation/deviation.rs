//! Size distribution report: how unevenly each collection, and the cluster
//! as a whole, is spread over the shards.

use std::fmt::Write as _;
use std::sync::Arc;

use crate::config::{CorrectionMode, Interval};
use crate::error::{EqualizerError, Result};
use crate::source::ClusterSource;
use crate::util::size::ByteSize;

/// One line of the report.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviationRow {
    pub name: String,
    /// Correction configured for the collection, if any.
    pub correction: Option<CorrectionMode>,
    pub total_size: i64,
    /// Size per shard, in [`DeviationReport::shards`] order.
    pub sizes: Vec<i64>,
    /// `max - min` over `sizes`.
    pub deviation: i64,
}

impl DeviationRow {
    fn new(name: String, correction: Option<CorrectionMode>, sizes: Vec<i64>) -> Self {
        let max = sizes.iter().copied().max().unwrap_or(0);
        let min = sizes.iter().copied().min().unwrap_or(0);
        Self {
            name,
            correction,
            total_size: sizes.iter().sum(),
            sizes,
            deviation: max - min,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviationReport {
    pub shards: Vec<String>,
    /// Sharded collections, by name.
    pub rows: Vec<DeviationRow>,
    /// All data per shard, un-sharded collections included.
    pub total: DeviationRow,
}

impl DeviationReport {
    fn header(&self) -> Vec<String> {
        let mut header = vec!["collection".to_string(), "correction".to_string()];
        header.extend(self.shards.iter().cloned());
        header.push("total".to_string());
        header.push("deviation".to_string());
        header
    }

    fn all_rows(&self) -> impl Iterator<Item = &DeviationRow> {
        self.rows.iter().chain(std::iter::once(&self.total))
    }

    /// Cells of every row with human-readable sizes, header first.
    pub fn table(&self) -> Vec<Vec<String>> {
        let mut table = vec![self.header()];
        for row in self.all_rows() {
            let mut cells = vec![
                row.name.clone(),
                row.correction.map(|c| c.to_string()).unwrap_or_default(),
            ];
            cells.extend(row.sizes.iter().map(|s| s.byte_size()));
            cells.push(row.total_size.byte_size());
            cells.push(row.deviation.byte_size());
            table.push(cells);
        }
        table
    }

    pub fn to_markdown(&self) -> String {
        let table = self.table();
        let mut out = String::new();
        for (index, cells) in table.iter().enumerate() {
            let _ = writeln!(out, "| {} |", cells.join(" | "));
            if index == 0 {
                let _ = writeln!(out, "|{}", "---|".repeat(cells.len()));
            }
        }
        out
    }

    /// CSV with raw byte counts.
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(self.header())?;
        for row in self.all_rows() {
            let mut record = vec![
                row.name.clone(),
                row.correction.map(|c| c.to_string()).unwrap_or_default(),
            ];
            record.extend(row.sizes.iter().map(i64::to_string));
            record.push(row.total_size.to_string());
            record.push(row.deviation.to_string());
            writer.write_record(&record)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| EqualizerError::internal(format!("csv flush failed: {e}")))?;
        String::from_utf8(bytes).map_err(|e| EqualizerError::internal(e.to_string()))
    }
}

pub struct DeviationOperation {
    source: Arc<dyn ClusterSource>,
    intervals: Vec<Interval>,
}

impl DeviationOperation {
    pub fn new(source: Arc<dyn ClusterSource>, intervals: Vec<Interval>) -> Self {
        Self { source, intervals }
    }

    pub async fn run(&self) -> Result<DeviationReport> {
        let shards = self.source.shards().await?;
        let statistics = self.source.collection_statistics().await?;

        let mut totals = vec![0i64; shards.len()];
        let mut rows = Vec::new();
        for stats in statistics.values() {
            if !stats.sharded {
                if let Some(index) = stats
                    .primary
                    .as_ref()
                    .and_then(|p| shards.iter().position(|s| &s.id == p))
                {
                    totals[index] += stats.total_size;
                }
                continue;
            }
            let sizes: Vec<i64> = shards.iter().map(|s| stats.size_on(&s.id)).collect();
            for (total, size) in totals.iter_mut().zip(&sizes) {
                *total += size;
            }
            let correction = self
                .intervals
                .iter()
                .find(|i| i.namespace == stats.namespace)
                .map(|i| i.correction);
            rows.push(DeviationRow::new(
                stats.namespace.full_name(),
                correction,
                sizes,
            ));
        }

        Ok(DeviationReport {
            shards: shards.iter().map(|s| s.id.to_string()).collect(),
            rows,
            total: DeviationRow::new("total".to_string(), None, totals),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> DeviationReport {
        DeviationReport {
            shards: vec!["a".into(), "b".into()],
            rows: vec![DeviationRow::new(
                "db.c".into(),
                Some(CorrectionMode::Keep),
                vec![300, 100],
            )],
            total: DeviationRow::new("total".into(), None, vec![350, 100]),
        }
    }

    #[test]
    fn test_row_deviation() {
        let report = report();
        assert_eq!(report.rows[0].total_size, 400);
        assert_eq!(report.rows[0].deviation, 200);
        assert_eq!(report.total.deviation, 250);
    }

    #[test]
    fn test_markdown() {
        let markdown = report().to_markdown();
        let lines: Vec<&str> = markdown.lines().collect();
        assert_eq!(lines[0], "| collection | correction | a | b | total | deviation |");
        assert_eq!(lines[1], "|---|---|---|---|---|---|");
        assert_eq!(lines[2], "| db.c | keep | 300 B | 100 B | 400 B | 200 B |");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_csv_raw_bytes() {
        let csv = report().to_csv().unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "collection,correction,a,b,total,deviation");
        assert_eq!(lines[1], "db.c,keep,300,100,400,200");
        assert_eq!(lines[2], "total,,350,100,450,250");
    }
}
