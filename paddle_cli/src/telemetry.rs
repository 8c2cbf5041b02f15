//! CSV telemetry recording off the control thread.
//!
//! `CsvTelemetry` is the loop-side sink: `send()` hands the frame to a
//! bounded channel with `try_send` and never blocks. A writer thread owns the
//! `csv::Writer` and drains the channel until every sender is gone.

use std::path::Path;
use std::thread::JoinHandle;

use crossbeam_channel::{Sender, TrySendError, bounded};
use eyre::WrapErr;
use paddle_core::TELEMETRY_CHANNELS;
use paddle_traits::{DeviceError, Telemetry};

/// About two seconds of frames at 500 Hz.
const QUEUE_DEPTH: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct Frame {
    seq: u64,
    values: [f32; TELEMETRY_CHANNELS.len()],
}

pub struct CsvTelemetry {
    tx: Sender<Frame>,
    current: Frame,
    dropped: u64,
}

impl Telemetry for CsvTelemetry {
    fn channels(&self) -> usize {
        TELEMETRY_CHANNELS.len()
    }

    fn set(&mut self, channel: usize, value: f32) {
        if let Some(slot) = self.current.values.get_mut(channel) {
            *slot = value;
        }
    }

    fn send(&mut self) -> Result<(), DeviceError> {
        match self.tx.try_send(self.current) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                if self.dropped.is_power_of_two() {
                    tracing::warn!(dropped = self.dropped, "telemetry writer behind; frames dropped");
                }
            }
            Err(TrySendError::Disconnected(_)) => {
                return Err("telemetry writer stopped".into());
            }
        }
        self.current.seq += 1;
        Ok(())
    }
}

pub struct CsvRecorder {
    handle: JoinHandle<eyre::Result<u64>>,
}

impl CsvRecorder {
    /// Create the file, write the header and start the writer thread.
    pub fn spawn(path: &Path) -> eyre::Result<(CsvTelemetry, CsvRecorder)> {
        let mut writer = csv::Writer::from_path(path)
            .wrap_err_with(|| format!("create telemetry csv {}", path.display()))?;
        let mut header = vec!["seq"];
        header.extend(TELEMETRY_CHANNELS);
        writer.write_record(&header)?;

        let (tx, rx) = bounded::<Frame>(QUEUE_DEPTH);
        let handle = std::thread::Builder::new()
            .name("paddle-telemetry".into())
            .spawn(move || -> eyre::Result<u64> {
                let mut rows = 0u64;
                for frame in rx {
                    let mut record = Vec::with_capacity(1 + frame.values.len());
                    record.push(frame.seq.to_string());
                    record.extend(frame.values.iter().map(|v| v.to_string()));
                    writer.write_record(&record)?;
                    rows += 1;
                }
                writer.flush()?;
                Ok(rows)
            })
            .wrap_err("spawn telemetry writer")?;

        let sink = CsvTelemetry {
            tx,
            current: Frame {
                seq: 0,
                values: [0.0; TELEMETRY_CHANNELS.len()],
            },
            dropped: 0,
        };
        Ok((sink, CsvRecorder { handle }))
    }

    /// Wait for the writer to drain; call after the sink has been dropped.
    pub fn finish(self) -> eyre::Result<u64> {
        self.handle
            .join()
            .map_err(|_| eyre::eyre!("telemetry writer panicked"))?
    }
}
