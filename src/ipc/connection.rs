use parking_lot::Mutex;
use serde_json::Value;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::ipc::protocol::{Event, Request, Response};
use crate::ipc::shared_resource::{DiagnosticLog, ExchangeOutcome, SettingsBuffer};
use crate::metrics::TimingMetrics;

struct Stream {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
}

enum ReadFailure {
    Timeout,
    Closed,
    Malformed(String),
}

impl Stream {
    fn read_response(&mut self) -> std::result::Result<Response, ReadFailure> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => Err(ReadFailure::Closed),
            Ok(_) => Response::decode(&line).map_err(|e| ReadFailure::Malformed(e.to_string())),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Err(ReadFailure::Timeout)
            }
            Err(e) => Err(ReadFailure::Malformed(e.to_string())),
        }
    }

    /// Discards replies that arrived after their exchange gave up on them.
    /// Returns the number of lines dropped.
    fn drain_stale(&mut self) -> std::io::Result<usize> {
        self.reader.get_ref().set_nonblocking(true)?;
        let mut dropped = 0;
        let mut line = String::new();
        let drained = loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                // EOF is reported by the next read
                Ok(0) => break Ok(()),
                Ok(_) => dropped += 1,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break Ok(()),
                Err(e) => break Err(e),
            }
        };
        self.reader.get_ref().set_nonblocking(false)?;
        drained.map(|()| dropped)
    }
}

/// Socket shared by the session and all of its device handles. One
/// request/response exchange holds the lock at a time.
#[derive(Clone)]
pub struct Connection {
    stream: Arc<Mutex<Stream>>,
    user_id: Arc<str>,
    settings: SettingsBuffer,
    log: DiagnosticLog,
    metrics: TimingMetrics,
}

impl Connection {
    pub fn connect(
        addr: impl ToSocketAddrs,
        user_id: &str,
        settings: SettingsBuffer,
        log: DiagnosticLog,
    ) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        Self::from_stream(stream, user_id, settings, log)
    }

    pub fn from_stream(
        stream: TcpStream,
        user_id: &str,
        settings: SettingsBuffer,
        log: DiagnosticLog,
    ) -> Result<Self> {
        stream.set_nodelay(true)?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self {
            stream: Arc::new(Mutex::new(Stream {
                writer: stream,
                reader,
            })),
            user_id: Arc::from(user_id),
            settings,
            log,
            metrics: TimingMetrics::new(),
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn settings(&self) -> &SettingsBuffer {
        &self.settings
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.log
    }

    pub fn metrics(&self) -> &TimingMetrics {
        &self.metrics
    }

    /// Exchanges `event` paced by the session-wide command delay (if any).
    pub fn send_and_wait(&self, event: Event, payload: Value) -> Result<Value> {
        let delay = self.settings.get().command_delay.unwrap_or(Duration::ZERO);
        self.send_and_wait_paced(event, payload, delay)
    }

    /// Sends the request and waits for a response carrying the same event.
    /// `delay` is slept after the exchange, outside the lock.
    pub fn send_and_wait_paced(&self, event: Event, payload: Value, delay: Duration) -> Result<Value> {
        self.send_and_wait_for(event, event, payload, delay)
    }

    /// Sends `event` and waits for a response carrying `reply`, re-sending on
    /// timeouts, malformed lines and foreign events. Replies left over from
    /// earlier attempts are discarded before every send.
    pub fn send_and_wait_for(&self, event: Event, reply: Event, payload: Value, delay: Duration) -> Result<Value> {
        let settings = self.settings.get();
        let line = Request::new(event, payload).encode()?;

        let started = Instant::now();
        let response = {
            let mut stream = self.stream.lock();
            stream.reader.get_ref().set_read_timeout(Some(settings.read_timeout))?;

            let mut answer = None;
            for attempt in 1..=settings.socket_attempts {
                let stale = stream.drain_stale()?;
                if stale > 0 {
                    tracing::debug!(%event, stale, "dropped late replies");
                }
                stream.writer.write_all(&line)?;
                stream.writer.flush()?;

                let reason = match stream.read_response() {
                    Ok(resp) if resp.0 == reply => {
                        answer = Some(resp);
                        break;
                    }
                    Ok(resp) => format!("unexpected `{}` response", resp.0),
                    Err(ReadFailure::Timeout) => "timed out".to_string(),
                    Err(ReadFailure::Malformed(e)) => e,
                    Err(ReadFailure::Closed) => {
                        self.log.write(event, ExchangeOutcome::Failed);
                        self.metrics.record_failure();
                        return Err(Error::Io(ErrorKind::ConnectionAborted.into()));
                    }
                };

                tracing::debug!(%event, attempt, %reason, "retrying exchange");
                self.metrics.record_retry();
                self.log.write(event, ExchangeOutcome::Retried { attempt, reason });
            }
            answer
        };

        let Some(response) = response else {
            tracing::warn!(%event, attempts = settings.socket_attempts, "no response");
            self.log.write(event, ExchangeOutcome::Failed);
            self.metrics.record_failure();
            return Err(Error::NoResponse {
                event: event.to_string(),
                attempts: settings.socket_attempts,
            });
        };

        self.metrics.record_round_trip(started.elapsed());
        self.log.write(event, ExchangeOutcome::Answered);
        tracing::trace!(%event, elapsed = ?started.elapsed(), "exchange complete");

        if !delay.is_zero() {
            thread::sleep(delay);
        }
        response.into_payload()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("user_id", &self.user_id)
            .finish_non_exhaustive()
    }
}

/// Connected pair for unit tests that never exchange frames. The server
/// end must be kept alive by the caller.
#[cfg(test)]
pub(crate) fn loopback() -> (Connection, TcpStream) {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind loopback");
    let addr = listener.local_addr().expect("loopback addr");
    let client = TcpStream::connect(addr).expect("connect loopback");
    let (server, _) = listener.accept().expect("accept loopback");
    let conn = Connection::from_stream(client, "test_user", SettingsBuffer::default(), DiagnosticLog::new(8))
        .expect("wrap loopback");
    (conn, server)
}
