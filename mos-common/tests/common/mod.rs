// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! In-memory device and pacing fakes shared by the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use embedded_hal::delay::DelayNs;
use serde_json::{json, Value};

use mos_common::error::{Error, Result};
use mos_common::{
    CancelToken, ChannelFactory, Command, ConnectOptions, DeviceSession, Response, RpcChannel,
};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub dest: String,
    pub method: String,
    pub args: Option<Value>,
}

#[derive(Default)]
pub struct SimState {
    pub files: BTreeMap<String, Vec<u8>>,
    pub config: Value,
    pub calls: Vec<RecordedCall>,
    /// Canned replies consumed before normal handling.
    pub scripted: VecDeque<Response>,
    pub fail_disconnect: bool,
    pub disconnects: usize,
}

impl SimState {
    pub fn calls_to(&self, method: &str) -> Vec<RecordedCall> {
        self.calls
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    fn handle(&mut self, method: &str, args: &Value) -> Response {
        let filename = args["filename"].as_str().unwrap_or_default().to_string();
        match method {
            "FS.List" => Response::ok(Some(json!(self.files.keys().collect::<Vec<_>>()))),
            "FS.Get" => {
                let Some(data) = self.files.get(&filename) else {
                    return Response::error(404, format!("{} not found", filename));
                };
                let offset = args["offset"].as_u64().unwrap_or(0) as usize;
                let len = args["len"].as_u64().unwrap_or(0) as usize;
                let start = offset.min(data.len());
                let end = (start + len).min(data.len());
                Response::ok(Some(json!({
                    "data": STANDARD.encode(&data[start..end]),
                    "left": data.len() - end,
                })))
            }
            "FS.Put" => {
                let chunk = STANDARD
                    .decode(args["data"].as_str().unwrap_or_default())
                    .unwrap_or_default();
                let file = self.files.entry(filename).or_default();
                if !args["append"].as_bool().unwrap_or(false) {
                    file.clear();
                }
                file.extend_from_slice(&chunk);
                Response::ok(None)
            }
            "FS.Remove" => match self.files.remove(&filename) {
                Some(_) => Response::ok(None),
                None => Response::error(404, format!("{} not found", filename)),
            },
            "Config.Get" => Response::ok(Some(self.config.clone())),
            "Config.Set" => {
                self.config = args["config"].clone();
                Response::ok(None)
            }
            "Vars.Get" => Response::ok(Some(json!({"uptime": 12}))),
            "Sys.Reboot" => Response::ok(None),
            _ => Response::ok(Some(json!({"method": method, "args": args}))),
        }
    }
}

pub type Shared = Arc<Mutex<SimState>>;

pub struct SimChannel {
    state: Shared,
}

impl RpcChannel for SimChannel {
    fn call(&mut self, dest: &str, cmd: &Command<'_>, cancel: &CancelToken) -> Result<Response> {
        cancel.check(cmd.cmd)?;
        let args: Option<Value> = cmd
            .args
            .map(|raw| serde_json::from_str(raw.get()).expect("args are valid JSON"));
        let mut state = self.state.lock().unwrap();
        state.calls.push(RecordedCall {
            dest: dest.to_string(),
            method: cmd.cmd.to_string(),
            args: args.clone(),
        });
        if let Some(resp) = state.scripted.pop_front() {
            return Ok(resp);
        }
        Ok(state.handle(cmd.cmd, &args.unwrap_or(Value::Null)))
    }

    fn disconnect(&mut self, _cancel: &CancelToken) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.disconnects += 1;
        if state.fail_disconnect {
            return Err(Error::transport("disconnect", "port vanished"));
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct SimFactory {
    pub state: Shared,
    pub opens: Arc<AtomicUsize>,
    pub last_options: Arc<Mutex<Option<ConnectOptions>>>,
    pub refuse: bool,
}

impl SimFactory {
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl ChannelFactory for SimFactory {
    fn open(
        &self,
        address: &str,
        opts: &ConnectOptions,
        _cancel: &CancelToken,
    ) -> Result<Box<dyn RpcChannel>> {
        if self.refuse {
            return Err(Error::transport(
                format!("connect to {}", address),
                "connection refused",
            ));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().unwrap() = Some(opts.clone());
        Ok(Box::new(SimChannel {
            state: Arc::clone(&self.state),
        }))
    }
}

/// Records requested pauses instead of sleeping.
#[derive(Clone, Default)]
pub struct RecordingDelay {
    pub pauses_ms: Arc<Mutex<Vec<u32>>>,
}

impl RecordingDelay {
    pub fn recorded(&self) -> Vec<u32> {
        self.pauses_ms.lock().unwrap().clone()
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.pauses_ms.lock().unwrap().push(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.pauses_ms.lock().unwrap().push(ms);
    }
}

/// A connected session on a fresh simulated device.
pub fn connected_session() -> (DeviceSession, SimFactory, RecordingDelay) {
    let factory = SimFactory::default();
    let delay = RecordingDelay::default();
    let mut session = DeviceSession::new("sim://device", Box::new(factory.clone()))
        .with_delay(delay.clone());
    session
        .connect(false, &CancelToken::new())
        .expect("simulated connect");
    (session, factory, delay)
}
