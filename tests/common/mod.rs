//! In-process stand-in for the Aqueduct application.

#![allow(dead_code)]

use crossbeam::channel::{unbounded, Receiver};
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use aqueduct::ipc::{Event, Request, Response};
use aqueduct::{Aqueduct, RecipeSettings};

/// Requests seen by the fake application, in order.
pub struct FakeAqueduct {
    pub requests: Receiver<(String, Value)>,
    handle: thread::JoinHandle<()>,
}

impl FakeAqueduct {
    /// Next request, failing the test after a second of silence.
    pub fn next(&self) -> (String, Value) {
        self.requests
            .recv_timeout(Duration::from_secs(1))
            .expect("no request reached the fake application")
    }

    /// Skips requests until one for `event` arrives.
    pub fn next_of(&self, event: &str) -> Value {
        loop {
            let (e, payload) = self.next();
            if e == event {
                return payload;
            }
        }
    }

    pub fn join(self) {
        self.handle.join().expect("fake application panicked");
    }
}

/// Starts the fake application and a session connected to it. `handler`
/// returns the response payload for each request, or `None` to stay
/// silent. `clear_device_recordable` is acknowledged as `device_action`.
pub fn start<F>(register_process: bool, handler: F) -> (Aqueduct, FakeAqueduct)
where
    F: FnMut(&str, &Value) -> Option<Value> + Send + 'static,
{
    let settings = RecipeSettings {
        read_timeout_ms: 100,
        poll_interval_ms: 10,
        ..RecipeSettings::default()
    };
    start_with(register_process, &settings, handler)
}

pub fn start_with<F>(register_process: bool, settings: &RecipeSettings, mut handler: F) -> (Aqueduct, FakeAqueduct)
where
    F: FnMut(&str, &Value) -> Option<Value> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = unbounded();

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut writer = stream.try_clone().unwrap();
        let reader = BufReader::new(stream);

        for line in reader.lines() {
            let Ok(line) = line else { break };
            let request = Request::decode(&line).unwrap();
            let event = request.event();
            let payload = request.payload().clone();
            let reply = handler(event.as_str(), &payload);
            let _ = tx.send((event.as_str().to_string(), payload));
            if let Some(reply) = reply {
                // payloads go out as JSON text, the way the application sends them
                let reply_event = match event {
                    Event::ClearDeviceRecordable => Event::DeviceAction,
                    other => other,
                };
                let frame = Response(reply_event, Value::String(reply.to_string())).encode().unwrap();
                if writer.write_all(&frame).is_err() {
                    break;
                }
            }
        }
    });

    let stream = TcpStream::connect(addr).unwrap();
    let aq = Aqueduct::from_stream(stream, "test_user", register_process, settings).unwrap();
    (
        aq,
        FakeAqueduct {
            requests: rx,
            handle,
        },
    )
}

pub fn device(id: u64, kind: &str, name: &str, interface: u8, live: Vec<Value>) -> Value {
    json!({
        "base": {
            "device_id": id,
            "user_id": "test_user",
            "type": kind,
            "name": name,
            "interface": interface,
        },
        "live": live,
    })
}

/// Live payload for device `id`.
pub fn live(id: u64, entries: Vec<Value>) -> Value {
    json!({ "user_id": "test_user", "device_id": id, "live": entries })
}
