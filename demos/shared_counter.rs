use anyhow::{Context, Result};
use globalkv::config::{parse_server_list, SERVERS_ENV};
use globalkv::{Client, ClientConfig};
use std::env;
use std::path::Path;

/// Shared counter example
///
/// Increments a counter that every process pointed at the same servers
/// sees, using compare-and-swap so concurrent increments are not lost.
///
/// Servers come from a config file given as the first argument, or from
/// `GLOBALKV_SERVERS`, or default to two local servers.

fn main() -> Result<()> {
    env_logger::init();

    let config = match env::args().nth(1) {
        Some(path) => ClientConfig::load(Path::new(&path))
            .with_context(|| format!("loading {}", path))?,
        None => {
            let raw = env::var(SERVERS_ENV)
                .unwrap_or_else(|_| "127.0.0.1:7901,127.0.0.1:7902".to_string());
            ClientConfig::new(parse_server_list(&raw))
        }
    };

    println!("GlobalKV Shared Counter Example");
    println!("===============================");
    println!("Servers: {}", config.servers.join(", "));

    let mut client = Client::from_config(config)?;
    let key = "demo:counter";
    println!("Key {:?} lives on {}", key, client.server_for(key));

    let mut attempts = 0;
    let value = loop {
        attempts += 1;
        let current: Option<u64> = client.read(key)?;
        let swapped = match current {
            Some(n) => client.compare_and_swap(key, &n, &(n + 1))?,
            None => {
                client.write(key, &1u64)?;
                true
            }
        };
        if swapped {
            break current.unwrap_or(0) + 1;
        }
    };

    println!("Counter is now {} ({} attempt(s))", value, attempts);
    Ok(())
}
