//! Test utilities for netmd
//!
//! Scripted doubles for the control pipe and backoff, so the exchange
//! handshake and session lifecycle can be tested without hardware.
//!
//! # Example
//!
//! ```
//! use netmd::test_utils::{CountingBackoff, ScriptedPipe, idle, ready};
//! use netmd::{ExchangeSettings, NetmdHandle};
//!
//! let pipe = ScriptedPipe::new()
//!     .with_poll(idle())
//!     .with_poll(ready(0x81, 2))
//!     .with_response(vec![0x09, 0x00]);
//!
//! let mut handle = NetmdHandle::claim_with_backoff(
//!     pipe,
//!     ExchangeSettings::default(),
//!     CountingBackoff::default(),
//! )
//! .unwrap();
//! assert_eq!(handle.exchange(&[0x00, 0x18]).unwrap(), vec![0x09, 0x00]);
//! ```

use crate::usb::exchange::Backoff;
use crate::usb::pipe::ControlPipe;
use protocol::{POLL_REPLY_LEN, POLL_REQUEST, REQUEST_TYPE_IN, REQUEST_TYPE_OUT, SEND_REQUEST};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Poll reply: ready to send `length` bytes with `request`
pub fn ready(request: u8, length: u8) -> [u8; POLL_REPLY_LEN] {
    [0x01, request, length, 0x00]
}

/// Poll reply: ready, nothing pending
pub fn idle() -> [u8; POLL_REPLY_LEN] {
    ready(0x00, 0)
}

/// Poll reply: device busy
pub fn not_ready() -> [u8; POLL_REPLY_LEN] {
    [0x00; POLL_REPLY_LEN]
}

/// Transfer or lifecycle call observed by a [`ScriptedPipe`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipeEvent {
    Poll,
    Send(Vec<u8>),
    Receive { request: u8, length: usize },
    StringDescriptor(u8),
    Claim(u8),
    Release(u8),
    Close,
}

/// Shared, ordered record of pipe events
///
/// Survives the pipe itself, so tests can inspect what happened after a
/// handle has been closed.
pub type Journal = Arc<Mutex<Vec<PipeEvent>>>;

/// Control pipe answering from scripted replies
///
/// Polls are answered from the poll queue; once it runs dry every poll
/// reports "not ready". Any other IN request is a response read, answered
/// from the response queue; once that runs dry reads fail with
/// `rusb::Error::Io`. Response request codes must therefore differ from
/// the poll request (0x01).
#[derive(Debug, Default)]
pub struct ScriptedPipe {
    polls: VecDeque<rusb::Result<Vec<u8>>>,
    responses: VecDeque<rusb::Result<Vec<u8>>>,
    send_error: Option<rusb::Error>,
    claim_error: Option<rusb::Error>,
    product: Option<String>,
    journal: Journal,
}

impl ScriptedPipe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_poll(mut self, reply: [u8; POLL_REPLY_LEN]) -> Self {
        self.polls.push_back(Ok(reply.to_vec()));
        self
    }

    /// Poll reply of arbitrary length, e.g. a truncated one
    pub fn with_short_poll(mut self, reply: &[u8]) -> Self {
        self.polls.push_back(Ok(reply.to_vec()));
        self
    }

    pub fn with_polls(mut self, count: usize, reply: [u8; POLL_REPLY_LEN]) -> Self {
        for _ in 0..count {
            self.polls.push_back(Ok(reply.to_vec()));
        }
        self
    }

    pub fn with_poll_error(mut self, error: rusb::Error) -> Self {
        self.polls.push_back(Err(error));
        self
    }

    pub fn with_response(mut self, response: Vec<u8>) -> Self {
        self.responses.push_back(Ok(response));
        self
    }

    pub fn with_response_error(mut self, error: rusb::Error) -> Self {
        self.responses.push_back(Err(error));
        self
    }

    /// Fail the command write
    pub fn with_send_error(mut self, error: rusb::Error) -> Self {
        self.send_error = Some(error);
        self
    }

    /// Fail the interface claim
    pub fn with_claim_error(mut self, error: rusb::Error) -> Self {
        self.claim_error = Some(error);
        self
    }

    /// Product string descriptor; without one the fetch fails
    pub fn with_product(mut self, product: &str) -> Self {
        self.product = Some(product.to_string());
        self
    }

    /// Shared handle on the event journal
    pub fn journal(&self) -> Journal {
        Arc::clone(&self.journal)
    }

    /// Snapshot of events so far
    pub fn events(&self) -> Vec<PipeEvent> {
        journal_events(&self.journal)
    }

    pub fn poll_count(&self) -> usize {
        self.count(|event| matches!(event, PipeEvent::Poll))
    }

    pub fn receive_count(&self) -> usize {
        self.count(|event| matches!(event, PipeEvent::Receive { .. }))
    }

    fn count(&self, predicate: impl Fn(&PipeEvent) -> bool) -> usize {
        self.events().iter().filter(|event| predicate(event)).count()
    }

    fn record(&self, event: PipeEvent) {
        if let Ok(mut events) = self.journal.lock() {
            events.push(event);
        }
    }
}

/// Snapshot of a journal's events
pub fn journal_events(journal: &Journal) -> Vec<PipeEvent> {
    journal.lock().map(|events| events.clone()).unwrap_or_default()
}

fn copy_into(buf: &mut [u8], data: &[u8]) -> usize {
    let len = buf.len().min(data.len());
    buf[..len].copy_from_slice(&data[..len]);
    len
}

impl ControlPipe for ScriptedPipe {
    fn read_control(
        &mut self,
        request_type: u8,
        request: u8,
        _value: u16,
        _index: u16,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> rusb::Result<usize> {
        if request_type != REQUEST_TYPE_IN {
            return Err(rusb::Error::InvalidParam);
        }

        if request == POLL_REQUEST {
            self.record(PipeEvent::Poll);
            let reply = self
                .polls
                .pop_front()
                .unwrap_or_else(|| Ok(not_ready().to_vec()))?;
            return Ok(copy_into(buf, &reply));
        }

        self.record(PipeEvent::Receive {
            request,
            length: buf.len(),
        });
        let response = self.responses.pop_front().unwrap_or(Err(rusb::Error::Io))?;
        Ok(copy_into(buf, &response))
    }

    fn write_control(
        &mut self,
        request_type: u8,
        request: u8,
        _value: u16,
        _index: u16,
        buf: &[u8],
        _timeout: Duration,
    ) -> rusb::Result<usize> {
        if request_type != REQUEST_TYPE_OUT || request != SEND_REQUEST {
            return Err(rusb::Error::InvalidParam);
        }

        self.record(PipeEvent::Send(buf.to_vec()));
        match self.send_error.take() {
            Some(error) => Err(error),
            None => Ok(buf.len()),
        }
    }

    fn read_string_descriptor(&self, index: u8) -> rusb::Result<String> {
        self.record(PipeEvent::StringDescriptor(index));
        self.product.clone().ok_or(rusb::Error::Pipe)
    }

    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()> {
        self.record(PipeEvent::Claim(interface));
        match self.claim_error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn release_interface(&mut self, interface: u8) -> rusb::Result<()> {
        self.record(PipeEvent::Release(interface));
        Ok(())
    }
}

impl Drop for ScriptedPipe {
    fn drop(&mut self) {
        self.record(PipeEvent::Close);
    }
}

/// Backoff that records waits instead of sleeping
///
/// Its clock only advances by the intervals waited, so deadlines are
/// reached exactly when the recorded waits add up to them.
#[derive(Debug, Clone)]
pub struct CountingBackoff {
    started: Instant,
    waits: Vec<Duration>,
}

impl Default for CountingBackoff {
    fn default() -> Self {
        Self {
            started: Instant::now(),
            waits: Vec::new(),
        }
    }
}

impl CountingBackoff {
    pub fn count(&self) -> usize {
        self.waits.len()
    }

    pub fn waits(&self) -> &[Duration] {
        &self.waits
    }
}

impl Backoff for CountingBackoff {
    fn wait(&mut self, interval: Duration) {
        self.waits.push(interval);
    }

    fn now(&self) -> Instant {
        self.started + self.waits.iter().sum::<Duration>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_replies() {
        assert_eq!(ready(0x42, 5), [0x01, 0x42, 0x05, 0x00]);
        assert_eq!(idle()[0], 0x01);
        assert_eq!(idle()[2], 0x00);
        assert_eq!(not_ready(), [0x00; 4]);
    }

    #[test]
    fn test_drop_records_close() {
        let pipe = ScriptedPipe::new();
        let journal = pipe.journal();
        drop(pipe);
        assert_eq!(journal_events(&journal), vec![PipeEvent::Close]);
    }

    #[test]
    fn test_empty_poll_queue_reports_not_ready() {
        let mut pipe = ScriptedPipe::new();
        let mut reply = [0xffu8; 4];
        let read = pipe
            .read_control(
                REQUEST_TYPE_IN,
                POLL_REQUEST,
                0,
                0,
                &mut reply,
                Duration::from_secs(1),
            )
            .unwrap();
        assert_eq!(read, 4);
        assert_eq!(reply, not_ready());
    }

    #[test]
    fn test_counting_backoff_clock_advances_by_waits() {
        let mut backoff = CountingBackoff::default();
        let start = backoff.now();

        backoff.wait(Duration::from_secs(1));
        backoff.wait(Duration::from_millis(500));

        assert_eq!(backoff.now() - start, Duration::from_millis(1500));
    }
}
