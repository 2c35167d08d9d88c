#![allow(dead_code)]

use burrow_crypto::{ChaChaExtension, ExtensionCatalog, KdfParams};
use burrow_storage::{Connection, StorageResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub const URI: &str = "table:test_encrypt04";

/// Installs a test subscriber once; filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Built-in catalog with cheap key derivation for chacha20.
pub fn catalog() -> ExtensionCatalog {
    ExtensionCatalog::builtin().with(
        "chacha20",
        Arc::new(ChaChaExtension::with_params(KdfParams {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        })),
    )
}

/// Connection configuration naming the encryptor's extension library twice,
/// the way a build tree would list it.
pub fn conn_config(name: &str, keyid: &str, secretkey: &str) -> String {
    let mut config = format!(
        r#"create,error_prefix="test: ",encryption=(name={name},keyid={keyid},secretkey={secretkey})"#
    );
    if name != "none" {
        let lib = format!("ext/encryptors/{name}/.libs/libburrow_{name}.so");
        config.push_str(&format!(r#",extensions=["{lib}","{lib}"]"#));
    }
    config
}

pub fn table_config(name: &str, keyid: &str) -> String {
    format!("key_format=S,value_format=S,encryption=(name={name},keyid={keyid})")
}

/// Deterministic records: `n - 1` pairs whose keys are up to 100 bytes and
/// whose values are up to 10,000 bytes, every one suffixed with its index.
pub fn records(n: usize) -> Vec<(String, String)> {
    let big = "abcdefghij".repeat(1001);
    let mut rng = StdRng::seed_from_u64(0);
    (1..n)
        .map(|idx| {
            let start = rng.gen_range(0..=9);
            let key = format!("{}{idx}", slice(&big, start, rng.gen_range(0..=100)));
            let value = format!("{}{idx}", slice(&big, start, rng.gen_range(0..=10_000)));
            (key, value)
        })
        .collect()
}

pub fn write_records(conn: &Connection, records: &[(String, String)]) -> StorageResult<()> {
    let table = conn.open_table(URI)?;
    for (key, value) in records {
        table.insert_str(key, value)?;
    }
    Ok(())
}

/// Number of records that read back identical.
pub fn matching_records(conn: &Connection, records: &[(String, String)]) -> StorageResult<usize> {
    let table = conn.open_table(URI)?;
    let mut matching = 0;
    for (key, value) in records {
        if table.get(key.as_bytes())?.as_deref() == Some(value.as_bytes()) {
            matching += 1;
        }
    }
    Ok(matching)
}

/// `s[start..end]`, or empty when `end <= start`.
fn slice(s: &str, start: usize, end: usize) -> &str {
    if end > start { &s[start..end] } else { "" }
}
