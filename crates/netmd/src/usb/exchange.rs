//! NetMD message exchange
//!
//! A message exchange is a two-phase handshake layered on control transfers:
//!
//! 1. poll once to make sure the device has nothing queued, then send the
//!    whole command in a single vendor OUT transfer;
//! 2. poll (with a much larger budget) until the device says it has data,
//!    then read exactly the polled length with the polled request code.
//!    A response starting with the busy sentinel (0x0f) is discarded and the
//!    second phase starts over.
//!
//! The device has no asynchronous notification, so readiness can only be
//! polled. Unsuccessful polls back off for [`ExchangeSettings::backoff`].
//! Busy rounds are capped by [`ExchangeSettings::busy_rounds`], and the whole
//! exchange by [`ExchangeSettings::exchange_timeout`]: no backoff is started
//! that would end past the deadline.

use crate::config::ExchangeSettings;
use crate::error::{DeviceError, Result};
use crate::usb::pipe::ControlPipe;
use common::hex_dump;
use protocol::{
    POLL_REPLY_LEN, POLL_REQUEST, PollStatus, REQUEST_TYPE_IN, REQUEST_TYPE_OUT, SEND_REQUEST,
    is_busy_response,
};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Delay between unsuccessful polls
///
/// This is a real blocking wait: the exchange model is synchronous and the
/// calling thread does nothing else while the device works. The exchange
/// deadline is measured against [`Backoff::now`].
pub trait Backoff {
    fn wait(&mut self, interval: Duration);

    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Backoff that blocks the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl Backoff for ThreadSleep {
    fn wait(&mut self, interval: Duration) {
        std::thread::sleep(interval);
    }
}

/// Poll the device until it is ready or `max_attempts` polls have been made
///
/// A transport failure aborts immediately, as does a reply shorter than four
/// bytes. Exhausting the budget is not an error: the returned status has
/// `ready == false` and a zero `length`, with `pending` carrying whatever
/// length byte the last reply held. A `max_attempts` of zero is treated as one.
pub fn poll<P, B>(
    pipe: &mut P,
    backoff: &mut B,
    settings: &ExchangeSettings,
    max_attempts: u32,
) -> Result<PollStatus>
where
    P: ControlPipe + ?Sized,
    B: Backoff + ?Sized,
{
    poll_until(pipe, backoff, settings, max_attempts, None)
}

fn poll_until<P, B>(
    pipe: &mut P,
    backoff: &mut B,
    settings: &ExchangeSettings,
    max_attempts: u32,
    deadline: Option<Instant>,
) -> Result<PollStatus>
where
    P: ControlPipe + ?Sized,
    B: Backoff + ?Sized,
{
    let attempts = max_attempts.max(1);
    let mut reply = [0u8; POLL_REPLY_LEN];
    let mut status = PollStatus::not_ready();

    for attempt in 1..=attempts {
        reply.fill(0);
        let read = pipe
            .read_control(
                REQUEST_TYPE_IN,
                POLL_REQUEST,
                0,
                0,
                &mut reply,
                settings.poll_timeout(),
            )
            .map_err(|e| {
                warn!("Poll transfer failed: {}", e);
                DeviceError::Usb(e)
            })?;

        status = PollStatus::decode(&reply[..read.min(POLL_REPLY_LEN)]).map_err(|e| {
            warn!("Bad poll reply: {}", e);
            DeviceError::Protocol(e)
        })?;
        trace!(
            "Poll {}/{}: ready={}, request={:#04x}, pending={}",
            attempt, attempts, status.ready, status.request, status.pending
        );

        if status.ready {
            return Ok(status);
        }

        if attempt == attempts {
            break;
        }

        let interval = settings.backoff();
        if let Some(deadline) = deadline {
            let past = backoff
                .now()
                .checked_add(interval)
                .is_none_or(|wake| wake > deadline);
            if past {
                debug!("Exchange deadline reached after {} poll attempts", attempt);
                return Ok(status);
            }
        }
        backoff.wait(interval);
    }

    debug!("Device not ready after {} poll attempts", attempts);
    Ok(status)
}

/// Exchange one command/response message with the device
///
/// Returns the response bytes. Fails with [`DeviceError::NotReady`] when the
/// device already has data queued, [`DeviceError::Timeout`] when it never
/// produces a response within the busy-round and deadline budgets, and
/// [`DeviceError::Usb`] on any transfer failure.
pub fn exchange<P, B>(
    pipe: &mut P,
    backoff: &mut B,
    settings: &ExchangeSettings,
    command: &[u8],
) -> Result<Vec<u8>>
where
    P: ControlPipe + ?Sized,
    B: Backoff + ?Sized,
{
    let deadline = backoff.now().checked_add(settings.exchange_timeout());

    // The length byte counts even when the ready flag is clear
    let status = poll_until(pipe, backoff, settings, settings.send_poll_attempts, deadline)?;
    if !status.is_idle() {
        warn!(
            "Device has {} bytes pending, refusing to send command",
            status.pending
        );
        return Err(DeviceError::NotReady {
            pending: status.pending,
        });
    }

    debug!("Command:\n{}", hex_dump(command));
    pipe.write_control(
        REQUEST_TYPE_OUT,
        SEND_REQUEST,
        0,
        0,
        command,
        settings.send_timeout(),
    )
    .map_err(|e| {
        warn!("Command transfer failed: {}", e);
        DeviceError::Usb(e)
    })?;

    for round in 1..=settings.busy_rounds.max(1) {
        if deadline.is_some_and(|deadline| backoff.now() >= deadline) {
            warn!(
                "Exchange timed out after {:?} and {} busy rounds",
                settings.exchange_timeout(),
                round - 1
            );
            return Err(DeviceError::Timeout {
                attempts: round - 1,
            });
        }

        let status = poll_until(pipe, backoff, settings, settings.recv_poll_attempts, deadline)?;
        if status.length == 0 {
            warn!("No response after {} poll attempts", settings.recv_poll_attempts);
            return Err(DeviceError::Timeout {
                attempts: settings.recv_poll_attempts,
            });
        }

        let mut response = vec![0u8; usize::from(status.length)];
        let read = pipe
            .read_control(
                REQUEST_TYPE_IN,
                status.request,
                0,
                0,
                &mut response,
                settings.recv_timeout(),
            )
            .map_err(|e| {
                warn!("Response transfer failed: {}", e);
                DeviceError::Usb(e)
            })?;
        response.truncate(read);

        debug!("Response:\n{}", hex_dump(&response));

        if !is_busy_response(&response) {
            return Ok(response);
        }

        debug!("Device busy (round {}), polling again", round);
    }

    warn!(
        "Device still busy after {} response rounds",
        settings.busy_rounds
    );
    Err(DeviceError::Timeout {
        attempts: settings.busy_rounds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{CountingBackoff, PipeEvent, ScriptedPipe, idle, not_ready, ready};
    use protocol::ProtocolError;

    fn settings() -> ExchangeSettings {
        ExchangeSettings::default()
    }

    #[test]
    fn test_poll_ready_first_attempt() {
        let mut pipe = ScriptedPipe::new().with_poll(ready(0x42, 5));
        let mut backoff = CountingBackoff::default();

        let status = poll(&mut pipe, &mut backoff, &settings(), 1).unwrap();

        assert!(status.ready);
        assert_eq!(status.length, 5);
        assert_eq!(status.request, 0x42);
        assert_eq!(backoff.count(), 0);
    }

    #[test]
    fn test_poll_sleeps_between_attempts() {
        let mut pipe = ScriptedPipe::new()
            .with_poll(not_ready())
            .with_poll(not_ready())
            .with_poll(ready(0x81, 8));
        let mut backoff = CountingBackoff::default();

        let status = poll(&mut pipe, &mut backoff, &settings(), 3).unwrap();

        assert!(status.ready);
        assert_eq!(status.length, 8);
        assert_eq!(backoff.count(), 2);
        assert!(backoff.waits().iter().all(|d| *d == Duration::from_secs(1)));
        assert_eq!(pipe.poll_count(), 3);
    }

    #[test]
    fn test_poll_exhausted_is_not_an_error() {
        let mut pipe = ScriptedPipe::new().with_polls(4, not_ready());
        let mut backoff = CountingBackoff::default();

        let status = poll(&mut pipe, &mut backoff, &settings(), 4).unwrap();

        assert!(!status.ready);
        assert_eq!(status.length, 0);
        assert_eq!(backoff.count(), 3);
    }

    #[test]
    fn test_poll_exhausted_keeps_pending_byte() {
        let mut pipe = ScriptedPipe::new().with_poll([0x00, 0x81, 0x10, 0x00]);
        let mut backoff = CountingBackoff::default();

        let status = poll(&mut pipe, &mut backoff, &settings(), 1).unwrap();

        assert!(!status.ready);
        assert_eq!(status.length, 0);
        assert_eq!(status.pending, 0x10);
    }

    #[test]
    fn test_poll_short_reply_is_protocol_error() {
        let mut pipe = ScriptedPipe::new().with_short_poll(&[0x01, 0x81]);
        let mut backoff = CountingBackoff::default();

        let err = poll(&mut pipe, &mut backoff, &settings(), 3).unwrap_err();

        assert!(matches!(
            err,
            DeviceError::Protocol(ProtocolError::ShortPollReply {
                expected: 4,
                actual: 2
            })
        ));
        assert_eq!(pipe.poll_count(), 1);
        assert_eq!(backoff.count(), 0);
    }

    #[test]
    fn test_poll_zero_attempts_polls_once() {
        let mut pipe = ScriptedPipe::new();
        let mut backoff = CountingBackoff::default();

        poll(&mut pipe, &mut backoff, &settings(), 0).unwrap();
        assert_eq!(pipe.poll_count(), 1);
        assert_eq!(backoff.count(), 0);
    }

    #[test]
    fn test_poll_transport_failure_not_retried() {
        let mut pipe = ScriptedPipe::new()
            .with_poll_error(rusb::Error::NoDevice)
            .with_poll(ready(0x81, 1));
        let mut backoff = CountingBackoff::default();

        let err = poll(&mut pipe, &mut backoff, &settings(), 5).unwrap_err();

        assert!(matches!(err, DeviceError::Usb(rusb::Error::NoDevice)));
        assert_eq!(pipe.poll_count(), 1);
        assert_eq!(backoff.count(), 0);
    }

    #[test]
    fn test_exchange_returns_response() {
        let mut pipe = ScriptedPipe::new()
            .with_poll(idle())
            .with_poll(ready(0x81, 4))
            .with_response(vec![0x09, 0x18, 0x00, 0x01]);
        let mut backoff = CountingBackoff::default();

        let response = exchange(&mut pipe, &mut backoff, &settings(), &[0x00, 0x18, 0x00]).unwrap();

        assert_eq!(response, vec![0x09, 0x18, 0x00, 0x01]);
        assert_eq!(
            pipe.events(),
            vec![
                PipeEvent::Poll,
                PipeEvent::Send(vec![0x00, 0x18, 0x00]),
                PipeEvent::Poll,
                PipeEvent::Receive {
                    request: 0x81,
                    length: 4
                },
            ]
        );
    }

    #[test]
    fn test_exchange_short_response_is_truncated() {
        let mut pipe = ScriptedPipe::new()
            .with_poll(idle())
            .with_poll(ready(0x81, 10))
            .with_response(vec![0x09, 0x01]);
        let mut backoff = CountingBackoff::default();

        let response = exchange(&mut pipe, &mut backoff, &settings(), &[0x00]).unwrap();
        assert_eq!(response, vec![0x09, 0x01]);
    }

    #[test]
    fn test_exchange_pending_data_is_not_ready() {
        let mut pipe = ScriptedPipe::new().with_poll(ready(0x81, 7));
        let mut backoff = CountingBackoff::default();

        let err = exchange(&mut pipe, &mut backoff, &settings(), &[0x00]).unwrap_err();

        assert!(matches!(err, DeviceError::NotReady { pending: 7 }));
        assert_eq!(pipe.events(), vec![PipeEvent::Poll]);
    }

    #[test]
    fn test_exchange_not_ready_with_pending_data_refuses_send() {
        let mut pipe = ScriptedPipe::new()
            .with_poll([0x00, 0x81, 0x10, 0x00])
            .with_poll(ready(0x81, 1))
            .with_response(vec![0x09]);
        let mut backoff = CountingBackoff::default();

        let err = exchange(&mut pipe, &mut backoff, &settings(), &[0x00]).unwrap_err();

        assert!(matches!(err, DeviceError::NotReady { pending: 16 }));
        assert_eq!(pipe.events(), vec![PipeEvent::Poll]);
    }

    #[test]
    fn test_exchange_not_ready_and_empty_still_sends() {
        let mut pipe = ScriptedPipe::new()
            .with_poll(not_ready())
            .with_poll(ready(0x81, 1))
            .with_response(vec![0x09]);
        let mut backoff = CountingBackoff::default();

        let response = exchange(&mut pipe, &mut backoff, &settings(), &[0x00]).unwrap();

        assert_eq!(response, vec![0x09]);
        assert_eq!(pipe.events()[1], PipeEvent::Send(vec![0x00]));
    }

    #[test]
    fn test_exchange_busy_rounds_are_capped() {
        let settings = ExchangeSettings {
            busy_rounds: 3,
            ..ExchangeSettings::default()
        };
        let mut pipe = ScriptedPipe::new().with_poll(idle());
        for _ in 0..5 {
            pipe = pipe
                .with_poll(ready(0x81, 1))
                .with_response(vec![0x0f]);
        }
        let mut backoff = CountingBackoff::default();

        let err = exchange(&mut pipe, &mut backoff, &settings, &[0x00]).unwrap_err();

        assert!(matches!(err, DeviceError::Timeout { attempts: 3 }));
        assert_eq!(pipe.receive_count(), 3);
    }

    #[test]
    fn test_exchange_endless_busy_stream_hits_deadline() {
        // Every round: 29 not-ready polls, then a busy response
        let mut pipe = ScriptedPipe::new().with_poll(idle());
        for _ in 0..5 {
            pipe = pipe
                .with_polls(29, not_ready())
                .with_poll(ready(0x81, 1))
                .with_response(vec![0x0f]);
        }
        let mut backoff = CountingBackoff::default();

        let err = exchange(&mut pipe, &mut backoff, &settings(), &[0x00]).unwrap_err();

        assert!(matches!(err, DeviceError::Timeout { .. }));
        let slept: Duration = backoff.waits().iter().sum();
        assert!(slept <= settings().exchange_timeout());
        assert_eq!(slept, Duration::from_secs(30));
        assert_eq!(pipe.receive_count(), 1);
    }

    #[test]
    fn test_exchange_deadline_checked_between_busy_rounds() {
        let settings = ExchangeSettings {
            exchange_timeout_ms: 2000,
            ..ExchangeSettings::default()
        };
        let mut pipe = ScriptedPipe::new()
            .with_poll(idle())
            .with_poll(not_ready())
            .with_poll(not_ready())
            .with_poll(ready(0x81, 1))
            .with_response(vec![0x0f])
            .with_poll(ready(0x81, 1))
            .with_response(vec![0x09]);
        let mut backoff = CountingBackoff::default();

        let err = exchange(&mut pipe, &mut backoff, &settings, &[0x00]).unwrap_err();

        assert!(matches!(err, DeviceError::Timeout { attempts: 1 }));
        assert_eq!(backoff.count(), 2);
        assert_eq!(pipe.receive_count(), 1);
    }

    #[test]
    fn test_exchange_ready_without_data_is_timeout() {
        let mut pipe = ScriptedPipe::new()
            .with_poll(idle())
            .with_poll(ready(0x81, 0));
        let mut backoff = CountingBackoff::default();

        let err = exchange(&mut pipe, &mut backoff, &settings(), &[0x00]).unwrap_err();
        assert!(matches!(err, DeviceError::Timeout { .. }));
        assert_eq!(pipe.receive_count(), 0);
    }

    #[test]
    fn test_exchange_receive_failure_is_fatal() {
        let mut pipe = ScriptedPipe::new()
            .with_poll(idle())
            .with_poll(ready(0x81, 3))
            .with_response_error(rusb::Error::Pipe)
            .with_poll(ready(0x81, 3))
            .with_response(vec![0x09, 0x00, 0x00]);
        let mut backoff = CountingBackoff::default();

        let err = exchange(&mut pipe, &mut backoff, &settings(), &[0x00]).unwrap_err();

        assert!(matches!(err, DeviceError::Usb(rusb::Error::Pipe)));
        assert_eq!(pipe.receive_count(), 1);
    }
}
