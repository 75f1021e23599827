// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Serial and TCP transport for device RPC.
//!
//! Every frame is a JSON object, COBS-encoded and terminated by 0x00:
//!
//! ```text
//! -> {"v":2,"id":7,"src":"mos","dst":"","cmd":"FS.List","args":{}}
//! <- {"v":2,"id":7,"src":"esp8266_0A1B2C","dst":"mos","status":0,"response":[...]}
//! ```
//!
//! Devices start each frame with a delimiter, so console output printed
//! between frames lands in a frame of its own and goes to the junk handler.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serialport::SerialPort;

use mos_common::cobs::{self, FrameSplitter, DELIMITER};
use mos_common::{
    CancelToken, ChannelFactory, Command, ConnectOptions, Error, Response, Result, RpcChannel,
};

/// Baud rate of the device console / RPC UART.
pub const SERIAL_BAUD: u32 = 115_200;

/// Envelope version.
const FRAME_VERSION: u32 = 2;

/// Read timeout per poll; cancellation is checked between polls.
const READ_POLL: Duration = Duration::from_millis(100);

/// TCP connect timeout when the token has no deadline.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where a device is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Serial(String),
    Tcp(String),
}

impl Endpoint {
    /// `serial://PATH`, `tcp://HOST:PORT` or a bare serial device path.
    pub fn parse(address: &str) -> Result<Self> {
        if let Some(path) = address.strip_prefix("serial://") {
            if path.is_empty() {
                return Err(Error::InvalidArgument(format!("no serial port in {:?}", address)));
            }
            return Ok(Endpoint::Serial(path.to_string()));
        }
        if let Some(hostport) = address.strip_prefix("tcp://") {
            let port_ok = hostport
                .rsplit_once(':')
                .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
            if !port_ok {
                return Err(Error::InvalidArgument(format!(
                    "{:?}: expected tcp://HOST:PORT",
                    address
                )));
            }
            return Ok(Endpoint::Tcp(hostport.to_string()));
        }
        if address.contains("://") {
            return Err(Error::InvalidArgument(format!(
                "unsupported address scheme in {:?}",
                address
            )));
        }
        if address.is_empty() {
            return Err(Error::InvalidArgument("empty device address".to_string()));
        }
        Ok(Endpoint::Serial(address.to_string()))
    }

    fn open(&self, cancel: &CancelToken) -> Result<Box<dyn Link>> {
        match self {
            Endpoint::Serial(path) => {
                let port = serialport::new(path, SERIAL_BAUD)
                    .timeout(READ_POLL)
                    .open()
                    .map_err(|e| Error::transport(format!("open serial port {}", path), e))?;
                log::debug!("Opened {} at {} baud", path, SERIAL_BAUD);
                Ok(Box::new(port))
            }
            Endpoint::Tcp(hostport) => {
                let op = || format!("connect to {}", hostport);
                let addr = hostport
                    .to_socket_addrs()
                    .map_err(|e| Error::transport(op(), e))?
                    .next()
                    .ok_or_else(|| Error::transport(op(), "no address resolved"))?;
                let timeout = cancel
                    .remaining()
                    .unwrap_or(CONNECT_TIMEOUT)
                    .max(Duration::from_millis(1));
                let stream = TcpStream::connect_timeout(&addr, timeout)
                    .map_err(|e| Error::transport(op(), e))?;
                stream
                    .set_read_timeout(Some(READ_POLL))
                    .map_err(|e| Error::transport(op(), e))?;
                stream.set_nodelay(true).map_err(|e| Error::transport(op(), e))?;
                log::debug!("Connected to {}", addr);
                Ok(Box::new(stream))
            }
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Endpoint::Serial(path) => write!(f, "serial://{}", path),
            Endpoint::Tcp(hostport) => write!(f, "tcp://{}", hostport),
        }
    }
}

/// Byte stream under a channel. Reads time out after [`READ_POLL`].
trait Link: Read + Write + Send {}

impl Link for Box<dyn SerialPort> {}
impl Link for TcpStream {}

#[derive(Serialize)]
struct RequestFrame<'a> {
    v: u32,
    id: u64,
    src: &'a str,
    dst: &'a str,
    cmd: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<&'a RawValue>,
}

#[derive(Deserialize)]
struct ReplyFrame {
    id: u64,
    #[serde(flatten)]
    response: Response,
}

/// What one received frame turned out to be.
enum Incoming {
    Reply(u64, Response),
    Junk(Vec<u8>),
}

/// Leading delimiter plus the COBS body, which carries its own terminator.
fn wire_frame(frame: &[u8]) -> Vec<u8> {
    let mut wire = vec![DELIMITER];
    wire.extend(cobs::encode(frame));
    wire
}

fn classify(frame: Vec<u8>) -> Incoming {
    let Some(decoded) = cobs::decode(&frame) else {
        return Incoming::Junk(frame);
    };
    match serde_json::from_slice::<ReplyFrame>(&decoded) {
        Ok(reply) => Incoming::Reply(reply.id, reply.response),
        Err(_) => Incoming::Junk(frame),
    }
}

/// RPC channel over a serial port or TCP stream.
pub struct FramedChannel {
    endpoint: Endpoint,
    opts: ConnectOptions,
    link: Option<Box<dyn Link>>,
    splitter: FrameSplitter,
    next_id: u64,
    closed: bool,
}

impl FramedChannel {
    pub fn open(endpoint: Endpoint, opts: ConnectOptions, cancel: &CancelToken) -> Result<Self> {
        let link = endpoint.open(cancel)?;
        Ok(Self {
            endpoint,
            opts,
            link: Some(link),
            splitter: FrameSplitter::new(),
            next_id: 1,
            closed: false,
        })
    }

    fn drop_link(&mut self, why: &dyn std::fmt::Display) {
        if self.link.take().is_some() {
            log::warn!("Link to {} dropped: {}", self.endpoint, why);
        }
        self.splitter.clear();
    }

    /// The live link, reopening a dropped one when reconnect is on.
    fn ensure_link(&mut self, cancel: &CancelToken) -> Result<&mut Box<dyn Link>> {
        if self.closed {
            return Err(Error::transport(
                "call",
                format!("channel to {} is closed", self.endpoint),
            ));
        }
        if self.link.is_none() {
            if !self.opts.reconnect {
                return Err(Error::transport(
                    "call",
                    format!("link to {} dropped", self.endpoint),
                ));
            }
            log::info!("Reconnecting to {}", self.endpoint);
            self.link = Some(self.endpoint.open(cancel)?);
        }
        self.link
            .as_mut()
            .ok_or_else(|| Error::transport("call", "no link"))
    }

    fn send(&mut self, frame: &[u8], cancel: &CancelToken) -> Result<()> {
        let wire = wire_frame(frame);
        let link = self.ensure_link(cancel)?;
        let written = link.write_all(&wire).and_then(|()| link.flush());
        if let Err(e) = written {
            self.drop_link(&e);
            return Err(Error::transport("send", e));
        }
        log::trace!("-> {} bytes: {:02x?}", wire.len(), &wire[..wire.len().min(64)]);
        Ok(())
    }

    fn receive(&mut self, id: u64, cancel: &CancelToken) -> Result<Response> {
        let mut buf = [0u8; 512];
        loop {
            while let Some(frame) = self.splitter.next_frame() {
                match classify(frame) {
                    Incoming::Reply(got, response) if got == id => return Ok(response),
                    Incoming::Reply(got, _) => {
                        log::debug!("Skipping reply to request {} (waiting for {})", got, id);
                    }
                    Incoming::Junk(bytes) => {
                        log::trace!("junk: {:02x?}", &bytes[..bytes.len().min(64)]);
                        (self.opts.junk_handler)(&bytes);
                    }
                }
            }

            cancel.check("waiting for reply")?;
            let Some(link) = self.link.as_mut() else {
                return Err(Error::transport("receive", "link dropped"));
            };
            match link.read(&mut buf) {
                Ok(0) => {
                    let e = io::Error::from(io::ErrorKind::UnexpectedEof);
                    self.drop_link(&"connection closed by peer");
                    return Err(Error::transport("receive", e));
                }
                Ok(n) => self.splitter.push(&buf[..n]),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                    ) => {}
                Err(e) => {
                    self.drop_link(&e);
                    return Err(Error::transport("receive", e));
                }
            }
        }
    }
}

impl RpcChannel for FramedChannel {
    fn call(&mut self, dest: &str, cmd: &Command<'_>, cancel: &CancelToken) -> Result<Response> {
        cancel.check("call")?;
        let id = self.next_id;
        self.next_id += 1;

        let frame = serde_json::to_vec(&RequestFrame {
            v: FRAME_VERSION,
            id,
            src: &self.opts.local_id,
            dst: dest,
            cmd: cmd.cmd,
            args: cmd.args,
        })
        .map_err(|e| Error::Protocol(format!("encoding {} request: {}", cmd.cmd, e)))?;

        log::debug!("{} #{} -> {:?}", cmd.cmd, id, dest);
        self.send(&frame, cancel)?;
        let response = self.receive(id, cancel)?;
        log::debug!("{} #{} <- status {}", cmd.cmd, id, response.status);
        Ok(response)
    }

    fn disconnect(&mut self, _cancel: &CancelToken) -> Result<()> {
        self.closed = true;
        self.splitter.clear();
        if let Some(mut link) = self.link.take() {
            link.flush()
                .map_err(|e| Error::transport(format!("close {}", self.endpoint), e))?;
        }
        Ok(())
    }
}

/// Opens [`FramedChannel`]s for `serial://` and `tcp://` addresses.
#[derive(Debug, Default, Clone, Copy)]
pub struct FramedChannelFactory;

impl ChannelFactory for FramedChannelFactory {
    fn open(
        &self,
        address: &str,
        opts: &ConnectOptions,
        cancel: &CancelToken,
    ) -> Result<Box<dyn RpcChannel>> {
        cancel.check("connect")?;
        let endpoint = Endpoint::parse(address)?;
        let channel = FramedChannel::open(endpoint, opts.clone(), cancel)?;
        Ok(Box::new(channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Instant;

    use mos_common::ErrorKind;
    use serde_json::{json, Value};

    fn options(reconnect: bool, junk: Arc<Mutex<Vec<u8>>>) -> ConnectOptions {
        ConnectOptions {
            local_id: "mos".to_string(),
            reconnect,
            junk_handler: Arc::new(move |bytes: &[u8]| junk.lock().unwrap().extend_from_slice(bytes)),
        }
    }

    /// Read one request frame from the device side of the socket.
    fn read_request(stream: &mut TcpStream, splitter: &mut FrameSplitter) -> Value {
        let mut buf = [0u8; 256];
        loop {
            if let Some(frame) = splitter.next_frame() {
                return serde_json::from_slice(&cobs::decode(&frame).unwrap()).unwrap();
            }
            let n = stream.read(&mut buf).unwrap();
            assert!(n > 0, "client hung up");
            splitter.push(&buf[..n]);
        }
    }

    fn write_frame(stream: &mut TcpStream, value: &Value) {
        stream
            .write_all(&wire_frame(&serde_json::to_vec(value).unwrap()))
            .unwrap();
    }

    #[test]
    fn test_endpoint_parse() {
        assert_eq!(
            Endpoint::parse("serial:///dev/ttyUSB0").unwrap(),
            Endpoint::Serial("/dev/ttyUSB0".into())
        );
        assert_eq!(Endpoint::parse("serial://COM7").unwrap(), Endpoint::Serial("COM7".into()));
        assert_eq!(Endpoint::parse("/dev/ttyACM0").unwrap(), Endpoint::Serial("/dev/ttyACM0".into()));
        assert_eq!(
            Endpoint::parse("tcp://192.168.4.1:2323").unwrap(),
            Endpoint::Tcp("192.168.4.1:2323".into())
        );
    }

    #[test]
    fn test_endpoint_parse_rejects() {
        for bad in ["tcp://device", "tcp://:80", "tcp://host:http", "ws://host:80", "", "serial://"] {
            let err = Endpoint::parse(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{:?}", bad);
        }
    }

    #[test]
    fn test_wire_frame_is_delimited_once() {
        let body = br#"{"id":1}"#;
        let wire = wire_frame(body);
        assert_eq!(wire.first(), Some(&DELIMITER));
        assert_eq!(wire.last(), Some(&DELIMITER));
        assert_eq!(wire.iter().filter(|&&b| b == DELIMITER).count(), 2);

        let mut splitter = FrameSplitter::new();
        splitter.push(&wire);
        let frame = splitter.next_frame().unwrap();
        assert_eq!(cobs::decode(&frame).unwrap(), body);
        assert!(splitter.next_frame().is_none());
    }

    #[test]
    fn test_call_skips_junk_and_stale_replies() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let device = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut splitter = FrameSplitter::new();
            let req = read_request(&mut stream, &mut splitter);

            stream.write_all(b"\0boot: heap 40960\r\n\0").unwrap();
            write_frame(&mut stream, &json!({"id": 999, "status": 0}));
            write_frame(
                &mut stream,
                &json!({"v": 2, "id": req["id"], "src": "dev", "dst": "mos", "status": 0, "response": ["a.txt"]}),
            );
            req
        });

        let junk = Arc::new(Mutex::new(Vec::new()));
        let cancel = CancelToken::with_timeout(Duration::from_secs(5));
        let mut channel = FramedChannelFactory
            .open(&format!("tcp://{}", addr), &options(false, Arc::clone(&junk)), &cancel)
            .unwrap();

        let args = RawValue::from_string("{}".to_string()).unwrap();
        let resp = channel
            .call("", &Command::with_args("FS.List", &args), &cancel)
            .unwrap();
        assert!(resp.is_ok());
        assert_eq!(resp.response, Some(json!(["a.txt"])));

        let req = device.join().unwrap();
        assert_eq!(req["v"], 2);
        assert_eq!(req["src"], "mos");
        assert_eq!(req["dst"], "");
        assert_eq!(req["cmd"], "FS.List");
        assert_eq!(req["args"], json!({}));

        assert_eq!(junk.lock().unwrap().as_slice(), b"boot: heap 40960\r\n");
    }

    #[test]
    fn test_dropped_link_without_reconnect_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let device = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let cancel = CancelToken::with_timeout(Duration::from_secs(5));
        let junk = Arc::new(Mutex::new(Vec::new()));
        let mut channel = FramedChannelFactory
            .open(&format!("tcp://{}", addr), &options(false, junk), &cancel)
            .unwrap();
        device.join().unwrap();

        let first = channel.call("", &Command::new("Sys.GetInfo"), &cancel);
        assert_eq!(first.unwrap_err().kind(), ErrorKind::Transport);
        let second = channel.call("", &Command::new("Sys.GetInfo"), &cancel);
        assert_eq!(second.unwrap_err().kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_reconnect_reopens_dropped_link() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let device = thread::spawn(move || {
            let (first, _) = listener.accept().unwrap();
            drop(first);
            let (mut stream, _) = listener.accept().unwrap();
            let mut splitter = FrameSplitter::new();
            let req = read_request(&mut stream, &mut splitter);
            write_frame(&mut stream, &json!({"id": req["id"], "status": 0, "response": true}));
        });

        let cancel = CancelToken::with_timeout(Duration::from_secs(5));
        let junk = Arc::new(Mutex::new(Vec::new()));
        let mut channel = FramedChannelFactory
            .open(&format!("tcp://{}", addr), &options(true, junk), &cancel)
            .unwrap();

        // The first call notices the drop; the next one reconnects.
        let mut resp = channel.call("", &Command::new("Sys.GetInfo"), &cancel);
        if resp.is_err() {
            resp = channel.call("", &Command::new("Sys.GetInfo"), &cancel);
        }
        assert_eq!(resp.unwrap().response, Some(json!(true)));
        device.join().unwrap();
    }

    #[test]
    fn test_disconnect_is_final() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let device = thread::spawn(move || {
            let _ = listener.accept().unwrap();
        });

        let cancel = CancelToken::with_timeout(Duration::from_secs(5));
        let junk = Arc::new(Mutex::new(Vec::new()));
        let mut channel = FramedChannelFactory
            .open(&format!("tcp://{}", addr), &options(true, junk), &cancel)
            .unwrap();
        device.join().unwrap();

        channel.disconnect(&cancel).unwrap();
        let err = channel.call("", &Command::new("Sys.GetInfo"), &cancel).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_cancel_while_waiting_for_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let device = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut splitter = FrameSplitter::new();
            read_request(&mut stream, &mut splitter);
            // Keep the link up without answering.
            thread::sleep(Duration::from_secs(2));
        });

        let junk = Arc::new(Mutex::new(Vec::new()));
        let open = CancelToken::with_timeout(Duration::from_secs(5));
        let mut channel = FramedChannelFactory
            .open(&format!("tcp://{}", addr), &options(false, junk), &open)
            .unwrap();

        let started = Instant::now();
        let cancel = CancelToken::with_timeout(Duration::from_millis(300));
        let err = channel.call("", &Command::new("Sys.GetInfo"), &cancel).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(started.elapsed() < Duration::from_millis(1500));
        device.join().unwrap();
    }
}
