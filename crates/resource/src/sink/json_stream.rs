//! NDJSON (newline-delimited JSON) stream sink.
//!
//! ```ignore
//! let mut sink = JsonStreamSink::stdout();
//! sink.write_plan(&summary)?;
//! sink.write_operations(&ops)?;
//! sink.finish()?;
//! ```

use super::{OperationRow, PlanRow};
use serde::Serialize;
use std::io::{self, BufWriter, Write};

/// Buffered NDJSON writer. Each row is serialized straight into the buffer.
pub struct JsonStreamSink<W: Write> {
    writer: BufWriter<W>,
    rows_written: usize,
}

impl JsonStreamSink<io::Stdout> {
    /// Convenience constructor writing to stdout.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonStreamSink<W> {
    /// Wrap an arbitrary writer.
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            rows_written: 0,
        }
    }

    /// Write the plan summary row.
    pub fn write_plan(&mut self, row: &PlanRow) -> io::Result<()> {
        self.write_row(row)
    }

    /// Write one row per planned controller call.
    pub fn write_operations(&mut self, rows: &[OperationRow]) -> io::Result<()> {
        for row in rows {
            self.write_row(row)?;
        }
        Ok(())
    }

    fn write_row<T: Serialize>(&mut self, row: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, row).map_err(io::Error::other)?;
        self.writer.write_all(b"\n")?;
        self.rows_written += 1;
        Ok(())
    }

    /// Flush and return how many rows were written.
    pub fn finish(mut self) -> io::Result<usize> {
        self.writer.flush()?;
        Ok(self.rows_written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use juju_access_core::AccessLevel;

    #[test]
    fn writes_one_line_per_row() {
        let mut buf = Vec::new();
        let mut sink = JsonStreamSink::new(&mut buf);

        let summary = PlanRow {
            resource: "juju_access_model.test".into(),
            id: "testing1:write:tfuser-1".into(),
            action: "create",
            grants: 1,
            revokes: 0,
        };
        let ops = vec![OperationRow {
            resource: "juju_access_model.test".into(),
            op: "grant",
            model: "testing1".into(),
            user: "tfuser-1".into(),
            access: AccessLevel::Write,
        }];

        sink.write_plan(&summary).unwrap();
        sink.write_operations(&ops).unwrap();
        assert_eq!(sink.finish().unwrap(), 2);

        let output = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = output.trim().split('\n').collect();
        assert_eq!(lines.len(), 2);

        let op: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(op["access"], "write");
        assert_eq!(op["op"], "grant");
    }
}
