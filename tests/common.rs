//! Test utilities & fixtures.
//! Provides a scripted keyer port so bridge scenarios run without hardware.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use winkeyd::keyer::{KeyerError, KeyerPort};

/// Everything the mock port records/feeds, shared with the test body.
#[derive(Default)]
pub struct PortLog {
    /// One entry per `write_unit` call, in order.
    pub writes: Vec<Vec<u8>>,
    /// Status bytes handed out one per `read_status` call.
    pub pending_status: VecDeque<u8>,
}

/// Scripted in-memory keyer transport. Writes are recorded; reads drain the
/// scripted status queue.
pub struct MockPort {
    log: Arc<Mutex<PortLog>>,
}

impl MockPort {
    pub fn new() -> (Self, Arc<Mutex<PortLog>>) {
        let log = Arc::new(Mutex::new(PortLog::default()));
        (MockPort { log: log.clone() }, log)
    }
}

impl KeyerPort for MockPort {
    fn write_unit(&mut self, bytes: &[u8]) -> Result<(), KeyerError> {
        self.log.lock().unwrap().writes.push(bytes.to_vec());
        Ok(())
    }

    fn read_status(&mut self) -> Result<Option<u8>, KeyerError> {
        Ok(self.log.lock().unwrap().pending_status.pop_front())
    }
}

/// Drain and return all writes recorded so far.
#[allow(dead_code)] // Not every test binary exercises every helper.
pub fn take_writes(log: &Arc<Mutex<PortLog>>) -> Vec<Vec<u8>> {
    std::mem::take(&mut log.lock().unwrap().writes)
}

/// Queue a status byte for the next poll.
#[allow(dead_code)]
pub fn push_status(log: &Arc<Mutex<PortLog>>, byte: u8) {
    log.lock().unwrap().pending_status.push_back(byte);
}
