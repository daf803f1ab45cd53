//! Blocking report pump.
//!
//! hidapi reads are blocking, so raw input reports are drained on a
//! dedicated OS thread and handed to the async side over a bounded tokio
//! channel. The channel preserves arrival order; the consumer sees one
//! strictly ordered stream.

use huedeck_hid_via_protocol::ViaTransport;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Poll interval for the blocking read loop, so the stop flag is observed
/// promptly even while the knobs are idle.
const POLL_INTERVAL_MS: u64 = 250;

/// Pumps raw reports from an input interface into a tokio channel until
/// stopped or the receiver goes away.
#[derive(Debug)]
pub struct ReportReader {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReportReader {
    /// Spawn the reader thread over an opened transport.
    pub fn spawn<T>(transport: T, tx: mpsc::Sender<Vec<u8>>) -> Self
    where
        T: ViaTransport + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = std::thread::spawn(move || read_loop(transport, tx, flag));
        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Signal the thread to stop and wait for it to exit. Idempotent.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("report reader thread panicked");
            }
        }
    }
}

impl Drop for ReportReader {
    fn drop(&mut self) {
        self.stop();
    }
}

fn read_loop<T: ViaTransport>(mut transport: T, tx: mpsc::Sender<Vec<u8>>, stop: Arc<AtomicBool>) {
    while !stop.load(Ordering::SeqCst) {
        match transport.read_timeout(POLL_INTERVAL_MS) {
            Ok(Some(report)) => {
                if tx.blocking_send(report).is_err() {
                    debug!("report receiver dropped, stopping reader");
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => {
                warn!("input read failed: {e}");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huedeck_hid_via_protocol::ViaProtocolError;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Transport that yields queued reports, then idles.
    struct QueueTransport {
        reports: VecDeque<Vec<u8>>,
    }

    impl ViaTransport for QueueTransport {
        fn write_report(&mut self, _data: &[u8]) -> Result<(), ViaProtocolError> {
            Ok(())
        }

        fn read_timeout(&mut self, _timeout_ms: u64) -> Result<Option<Vec<u8>>, ViaProtocolError> {
            match self.reports.pop_front() {
                Some(report) => Ok(Some(report)),
                None => {
                    // Simulate the hardware timeout instead of spinning hot.
                    std::thread::sleep(Duration::from_millis(2));
                    Ok(None)
                }
            }
        }
    }

    #[tokio::test]
    async fn test_reader_delivers_reports_in_order() {
        let transport = QueueTransport {
            reports: VecDeque::from([vec![0x04, 0xE9], vec![0x06, 0x03, 0, 0, 0, 0, 0, 0x20]]),
        };
        let (tx, mut rx) = mpsc::channel(8);
        let mut reader = ReportReader::spawn(transport, tx);

        assert_eq!(rx.recv().await, Some(vec![0x04, 0xE9]));
        assert_eq!(
            rx.recv().await,
            Some(vec![0x06, 0x03, 0, 0, 0, 0, 0, 0x20])
        );
        reader.stop();
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_reader_stops_when_receiver_dropped() {
        let transport = QueueTransport {
            reports: VecDeque::from([vec![1u8], vec![2u8], vec![3u8]]),
        };
        let (tx, rx) = mpsc::channel(1);
        let mut reader = ReportReader::spawn(transport, tx);
        drop(rx);
        // Join must come back on its own once the send fails.
        reader.stop();
    }
}
