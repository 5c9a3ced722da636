//! In-process GlobalKV server for integration tests.
//!
//! Speaks the framed protocol on a loopback port, one thread per connection,
//! and keeps counters the tests assert on.

#![allow(dead_code)]

use globalkv::codec::{self, Codec};
use globalkv::frame::encode_frame;
use globalkv::protocol::{Command, Request, CAS_OK};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// How the server answers requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Answer every request normally
    Normal,
    /// Answer normally, one byte per write with a pause in between
    Trickle,
    /// Read the request, then close the connection without answering
    HangUp,
}

#[derive(Debug, Default)]
pub struct Stats {
    pub connections: AtomicUsize,
    pub requests: AtomicUsize,
    pub pings: AtomicUsize,
}

pub struct TestServer {
    addr: String,
    stats: Arc<Stats>,
    store: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl TestServer {
    pub fn start(codec: Codec) -> Self {
        Self::start_with(codec, Behavior::Normal)
    }

    pub fn start_with(codec: Codec, behavior: Behavior) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let stats = Arc::new(Stats::default());
        let store = Arc::new(Mutex::new(HashMap::new()));

        let accept_stats = stats.clone();
        let accept_store = store.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                accept_stats.connections.fetch_add(1, Ordering::SeqCst);
                let stats = accept_stats.clone();
                let store = accept_store.clone();
                thread::spawn(move || {
                    let _ = serve(stream, codec, behavior, stats, store);
                });
            }
        });

        TestServer { addr, stats, store }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn connections(&self) -> usize {
        self.stats.connections.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.stats.requests.load(Ordering::SeqCst)
    }

    pub fn pings(&self) -> usize {
        self.stats.pings.load(Ordering::SeqCst)
    }

    /// Raw bytes stored under `key`.
    pub fn stored(&self, key: &str) -> Option<Vec<u8>> {
        self.store.lock().unwrap().get(key).cloned()
    }
}

fn serve(
    mut stream: TcpStream,
    codec: Codec,
    behavior: Behavior,
    stats: Arc<Stats>,
    store: Arc<Mutex<HashMap<String, Vec<u8>>>>,
) -> io::Result<()> {
    stream.set_nodelay(true)?;
    loop {
        let payload = next_frame(&mut stream)?;
        if payload == b"ping" {
            stats.pings.fetch_add(1, Ordering::SeqCst);
            continue;
        }
        stats.requests.fetch_add(1, Ordering::SeqCst);

        if behavior == Behavior::HangUp {
            return Ok(());
        }

        let request = Request::from_bytes(codec, &payload)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
        let response = apply(&request, &store);
        let frame = encode_frame(&response)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;

        match behavior {
            Behavior::Trickle => {
                for byte in frame {
                    stream.write_all(&[byte])?;
                    stream.flush()?;
                    thread::sleep(Duration::from_millis(2));
                }
            }
            _ => stream.write_all(&frame)?,
        }
    }
}

fn apply(request: &Request, store: &Mutex<HashMap<String, Vec<u8>>>) -> Vec<u8> {
    let mut store = store.lock().unwrap();
    match request.cmd {
        Command::Get => store.get(&request.key).cloned().unwrap_or_default(),
        Command::Set => {
            store.insert(request.key.clone(), request.value.clone().unwrap_or_default());
            CAS_OK.to_vec()
        }
        Command::Delete => {
            store.remove(&request.key);
            CAS_OK.to_vec()
        }
        Command::Cas => {
            let matches = match (store.get(&request.key), &request.digest) {
                (Some(current), Some(expected)) => codec::digest(current) == *expected,
                _ => false,
            };
            if matches {
                store.insert(request.key.clone(), request.value.clone().unwrap_or_default());
                CAS_OK.to_vec()
            } else {
                b"fail".to_vec()
            }
        }
    }
}

fn next_frame(stream: &mut TcpStream) -> io::Result<Vec<u8>> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header)?;
    let len = u32::from_be_bytes(header) as usize;
    if len < 4 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad frame length"));
    }
    let mut payload = vec![0u8; len - 4];
    stream.read_exact(&mut payload)?;
    Ok(payload)
}

/// Find a key that routes to `shard` on `client`.
pub fn key_on_shard(client: &globalkv::Client, shard: usize, prefix: &str) -> String {
    (0..10_000)
        .map(|i| format!("{}{}", prefix, i))
        .find(|k| client.shard_for(k) == shard)
        .expect("no key for shard")
}
