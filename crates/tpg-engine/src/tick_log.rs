//! Tick callback that writes one JSON line per tick.
//!
//! Each line carries the end-of-tick snapshot of every ship, the storage
//! base and active typhoons, together with the tick's ledger flows. The
//! file is meant for external plotting; the simulation itself never reads
//! it back.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use tpg_core::runner::TickCallback;
use tpg_core::tick::{SimulationState, TickSummary};
use tpg_ledger::FlowTotals;
use tpg_types::TickSnapshot;

use crate::error::EngineError;

/// Ledger flows of one tick as written to the log.
#[derive(Debug, Serialize)]
struct FlowRecord {
    generation_wh: Decimal,
    spill_wh: Decimal,
    propulsion_wh: Decimal,
    transfer_wh: Decimal,
    delivery_wh: Decimal,
}

impl From<FlowTotals> for FlowRecord {
    fn from(flows: FlowTotals) -> Self {
        Self {
            generation_wh: flows.generation_wh,
            spill_wh: flows.spill_wh,
            propulsion_wh: flows.propulsion_wh,
            transfer_wh: flows.transfer_wh,
            delivery_wh: flows.delivery_wh,
        }
    }
}

/// One line of the tick log.
#[derive(Debug, Serialize)]
struct TickRecord<'a> {
    trackable_typhoons: usize,
    flows: FlowRecord,
    missed_rendezvous: u32,
    anomaly: Option<&'a str>,
    #[serde(flatten)]
    snapshot: &'a TickSnapshot,
}

/// Callback that appends every tick summary to a JSON-lines sink.
///
/// The callback interface cannot fail, so the first write error is kept
/// and later ticks are skipped; [`TickLog::finish`] reports it.
pub struct TickLog<W: Write> {
    path: PathBuf,
    writer: W,
    lines: u64,
    error: Option<io::Error>,
}

impl TickLog<BufWriter<File>> {
    /// Create (or truncate) the tick log at `path`, creating its parent
    /// directory when needed.
    pub fn create(path: &Path) -> Result<Self, EngineError> {
        let io_error = |source| EngineError::TickLog {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let file = File::create(path).map_err(io_error)?;
        Ok(Self::new(path.to_path_buf(), BufWriter::new(file)))
    }
}

impl<W: Write> TickLog<W> {
    /// Wrap an arbitrary writer; `path` is only used in error messages.
    pub const fn new(path: PathBuf, writer: W) -> Self {
        Self {
            path,
            writer,
            lines: 0,
            error: None,
        }
    }

    /// Number of lines written so far.
    pub const fn lines(&self) -> u64 {
        self.lines
    }

    /// Flush the sink and return it, or the first error met while writing.
    pub fn finish(mut self) -> Result<W, EngineError> {
        if let Some(source) = self.error.take() {
            return Err(EngineError::TickLog {
                path: self.path,
                source,
            });
        }
        match self.writer.flush() {
            Ok(()) => Ok(self.writer),
            Err(source) => Err(EngineError::TickLog {
                path: self.path,
                source,
            }),
        }
    }

    fn write_line(&mut self, summary: &TickSummary) -> io::Result<()> {
        let record = TickRecord {
            trackable_typhoons: summary.trackable_typhoons,
            flows: summary.flows.into(),
            missed_rendezvous: summary.logistics.missed_rendezvous,
            anomaly: summary.anomaly.as_ref().map(|a| a.message.as_str()),
            snapshot: &summary.snapshot,
        };
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")
    }
}

impl<W: Write> TickCallback for TickLog<W> {
    fn on_tick(&mut self, summary: &TickSummary, _state: &SimulationState) {
        if self.error.is_some() {
            return;
        }
        match self.write_line(summary) {
            Ok(()) => {
                self.lines = self.lines.saturating_add(1);
                debug!(tick = summary.tick, "Tick logged");
            }
            Err(e) => {
                warn!(
                    tick = summary.tick,
                    path = %self.path.display(),
                    error = %e,
                    "Tick log write failed, further ticks will not be logged"
                );
                self.error = Some(e);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use tpg_core::config::SimulationConfig;
    use tpg_core::runner::run_simulation;
    use tpg_fleet::TpgShipParams;
    use tpg_types::GeoPosition;
    use tpg_weather::TyphoonTrackStore;

    use super::*;

    fn state() -> SimulationState {
        let mut config = SimulationConfig::default();
        config.simulation.start_time = Some("2019-09-01 00:00:00".to_owned());
        config.simulation.end_time = Some("2019-09-02 00:00:00".to_owned());
        config.tpg_ships.push(TpgShipParams::new(
            GeoPosition::new(24.0, 153.0).unwrap(),
            1.0e9,
            1.0e7,
            20.0,
            10.0,
        ));
        SimulationState::new(&config, TyphoonTrackStore::default()).unwrap()
    }

    /// A sink that refuses every write.
    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn writes_one_json_line_per_tick() {
        let mut state = state();
        let mut log = TickLog::new(PathBuf::from("ticks.jsonl"), Vec::new());
        let result = run_simulation(&mut state, &mut log).unwrap();
        assert_eq!(log.lines(), result.total_ticks);

        let bytes = log.finish().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["tick"], 1);
        assert_eq!(first["trackable_typhoons"], 0);
        assert!(first["anomaly"].is_null());
        assert_eq!(first["ships"].as_array().unwrap().len(), 1);
        assert!(first["storage_base"].is_object());
        assert!(first["flows"]["generation_wh"].is_string());

        let last: serde_json::Value = serde_json::from_str(lines[3]).unwrap();
        assert_eq!(last["tick"], 4);
        assert_eq!(last["time"], "2019-09-02T00:00:00Z");
    }

    #[test]
    fn first_write_error_is_reported_on_finish() {
        let mut state = state();
        let mut log = TickLog::new(PathBuf::from("ticks.jsonl"), Broken);
        let result = run_simulation(&mut state, &mut log).unwrap();
        assert_eq!(result.total_ticks, 4);
        assert_eq!(log.lines(), 0);
        assert!(matches!(log.finish(), Err(EngineError::TickLog { .. })));
    }
}
