//! CSV session writer.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use dq_core::TickFrame;

use crate::SessionResult;
use crate::types::SessionColumns;

/// Appends one CSV row per recorded tick.
///
/// The column layout is fixed when the session opens and the header is
/// written up front. Every row carries exactly the header's column count:
/// cells whose source is missing this tick (a failure tick's empty
/// thermocouple vector, a loop absent after a reload) are left empty, and
/// values beyond the layout are dropped. Loop telemetry is matched to its
/// columns by name, so a reload never shifts data under the wrong header.
/// Tolerates being called at any write stride.
pub struct SessionWriter {
    out: BufWriter<File>,
    columns: SessionColumns,
}

impl SessionWriter {
    pub(crate) fn create(path: &Path, columns: SessionColumns) -> SessionResult<Self> {
        let file = File::create(path)?;
        let mut writer = Self {
            out: BufWriter::new(file),
            columns,
        };
        writer.write_header()?;
        Ok(writer)
    }

    fn write_header(&mut self) -> SessionResult<()> {
        let mut header = String::from("t");
        for i in 0..self.columns.ai {
            header.push_str(&format!(",ai{i}"));
        }
        for i in 0..self.columns.tc {
            header.push_str(&format!(",tc{i}"));
        }
        for i in 0..self.columns.dout {
            header.push_str(&format!(",do{i}"));
        }
        for i in 0..self.columns.ao {
            header.push_str(&format!(",ao{i}"));
        }
        for name in &self.columns.loop_names {
            header.push_str(&format!(",{name}_err,{name}_out"));
        }
        header.push('\n');
        self.out.write_all(header.as_bytes())?;
        Ok(())
    }

    /// Append one frame, padded or pruned to the session's column layout.
    pub fn write(&mut self, frame: &TickFrame) -> SessionResult<()> {
        let mut row = format!("{:.6}", frame.t);
        for i in 0..self.columns.ai {
            match frame.ai.get(i) {
                Some(v) => row.push_str(&format!(",{v}")),
                None => row.push(','),
            }
        }
        for i in 0..self.columns.tc {
            match frame.tc.get(i).copied().flatten() {
                Some(v) => row.push_str(&format!(",{v}")),
                None => row.push(','),
            }
        }
        for i in 0..self.columns.dout {
            match frame.dout.get(i) {
                Some(true) => row.push_str(",1"),
                Some(false) => row.push_str(",0"),
                None => row.push(','),
            }
        }
        for i in 0..self.columns.ao {
            match frame.ao.get(i) {
                Some(v) => row.push_str(&format!(",{v}")),
                None => row.push(','),
            }
        }
        for name in &self.columns.loop_names {
            match frame.pid.iter().find(|l| &l.name == name) {
                Some(l) => row.push_str(&format!(",{},{}", l.error, l.output)),
                None => row.push_str(",,"),
            }
        }
        row.push('\n');
        self.out.write_all(row.as_bytes())?;
        Ok(())
    }

    /// Flush buffered rows to disk. Must run on every cycle exit path.
    pub fn close(mut self) -> SessionResult<()> {
        self.out.flush()?;
        Ok(())
    }
}
