//! Basic usage of the engine and the shared handle.
//!
//! Run with `RUST_LOG=debug` to see membership changes.

use doublejump::DoubleJump;
use doublejump_shared::{Config, SharedDoubleJump};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    example_engine();
    example_shared();
}

fn example_engine() {
    println!("=== DoubleJump ===\n");

    let mut dj = DoubleJump::new();
    for i in 0..10 {
        dj.add(&format!("node-{i}"));
    }

    let key = "foo";
    println!("Key {key:?} maps to node: {:?}", dj.get(key));
    println!("All nodes: {:?}", dj.all());
    println!("Random node: {:?}", dj.random());

    dj.remove("node-5");
    println!("After removing node-5, all nodes: {:?}", dj.all());
    println!("Key {key:?} now maps to node: {:?}", dj.get(key));
    println!("len = {}, loose_len = {}", dj.len(), dj.loose_len());

    let reclaimed = dj.shrink();
    println!(
        "Shrink reclaimed {reclaimed} slot(s): len = {}, loose_len = {}\n",
        dj.len(),
        dj.loose_len()
    );
}

fn example_shared() {
    println!("=== SharedDoubleJump (auto-shrink) ===\n");

    let config = Config {
        auto_shrink: true,
        shrink_ratio: 0.3,
        shrink_min_tombstones: 2,
        ..Config::default()
    };
    let ring = match SharedDoubleJump::with_config(config) {
        Ok(ring) => ring,
        Err(err) => {
            eprintln!("invalid config: {err}");
            return;
        }
    };

    for i in 0..6 {
        ring.add(&format!("cache-{i}"));
    }
    for i in 0..3 {
        ring.remove(&format!("cache-{i}"));
        println!("after removing cache-{i}: {:?}", ring.stats());
    }
    println!("user:1001 -> {:?}", ring.get("user:1001"));
}
