mod common;

use burrow_storage::{Connection, StorageError, METADATA_FILE};
use burrow_types::{EncryptionConfig, EncryptionDescriptor};
use common::{
    catalog, conn_config, init_tracing, matching_records, records, table_config, write_records,
    URI,
};
use pretty_assertions::assert_eq;

fn open(home: &std::path::Path, config: &str) -> Result<Connection, StorageError> {
    Connection::open(home, config, &catalog())
}

// ── open ─────────────────────────────────────────────────────────

#[test]
fn open_requires_create_for_missing_home() {
    let dir = tempfile::tempdir().unwrap();
    let home = dir.path().join("missing");
    assert!(matches!(
        open(&home, ""),
        Err(StorageError::HomeNotFound(_))
    ));
    assert!(!home.exists());

    open(&home, "create").unwrap();
    assert!(home.is_dir());
}

#[test]
fn open_rejects_unknown_options() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        open(dir.path(), "create,cache_size=1G"),
        Err(StorageError::InvalidConfig(_))
    ));
    assert!(matches!(
        open(dir.path(), "create,encryption=(name=rotn,keyid=11,salt=x)"),
        Err(StorageError::InvalidConfig(_))
    ));
}

#[test]
fn open_does_not_write_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open(dir.path(), &conn_config("rotn", "11", "")).unwrap();
    assert!(conn.list_tables().unwrap().is_empty());
    assert!(!dir.path().join(METADATA_FILE).exists());
}

#[test]
fn missing_extension_fails_at_open() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();

    let err = open(dir.path(), "create,encryption=(name=rotn,keyid=11)").unwrap_err();
    assert!(matches!(err, StorageError::ExtensionLoad { .. }), "{err}");

    let err = open(
        dir.path(),
        r#"create,encryption=(name=aes,keyid=1),extensions=["ext/encryptors/aes/libburrow_aes.so"]"#,
    )
    .unwrap_err();
    assert!(matches!(err, StorageError::ExtensionLoad { .. }), "{err}");

    let err = open(
        dir.path(),
        r#"create,encryption=(name=chacha20,keyid=1),extensions=[rotn]"#,
    )
    .unwrap_err();
    assert!(matches!(err, StorageError::ExtensionLoad { .. }), "{err}");
}

#[test]
fn invalid_keyid_fails_at_open() {
    let dir = tempfile::tempdir().unwrap();
    let err = open(dir.path(), &conn_config("rotn", "eleven", "")).unwrap_err();
    assert!(matches!(err, StorageError::InvalidConfig(_)), "{err}");
}

#[test]
fn each_connection_has_its_own_registry() {
    let dir = tempfile::tempdir().unwrap();
    let plain = open(&dir.path().join("a"), "create").unwrap();
    let rotn = open(&dir.path().join("b"), &conn_config("rotn", "11", "")).unwrap();
    assert!(plain.registry().names().is_empty());
    assert_eq!(rotn.registry().names(), vec!["rotn".to_string()]);
    assert_ne!(plain.id(), rotn.id());
}

#[test]
fn secret_is_not_exposed_by_debug() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open(dir.path(), &conn_config("rotn", "11", "TOPSECRET")).unwrap();
    assert_eq!(conn.encryption(), &EncryptionConfig::named("rotn", "11", "TOPSECRET"));
    assert!(!format!("{conn:?}").contains("TOPSECRET"));
    assert_eq!(conn.error_prefix(), "test: ");
}

// ── tables ───────────────────────────────────────────────────────

#[test]
fn tables_inherit_connection_encryption() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open(dir.path(), &conn_config("rotn", "11", "")).unwrap();
    conn.create_table(URI, "key_format=S,value_format=S").unwrap();
    assert_eq!(
        conn.table_descriptor(URI).unwrap(),
        EncryptionDescriptor::named("rotn", "11")
    );
}

#[test]
fn create_table_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open(dir.path(), "create").unwrap();
    conn.create_table(URI, "key_format=S,value_format=S").unwrap();
    conn.open_table(URI).unwrap().insert_str("k", "v").unwrap();

    conn.create_table(URI, "key_format=S,value_format=S").unwrap();
    assert_eq!(conn.open_table(URI).unwrap().get_str("k").unwrap().as_deref(), Some("v"));

    assert!(matches!(
        conn.create_table(URI, "key_format=u,value_format=S"),
        Err(StorageError::TableExists { .. })
    ));
}

#[test]
fn table_level_encryption_overrides_connection() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open(dir.path(), &conn_config("rotn", "11", "")).unwrap();
    conn.create_table("table:plain", &table_config("none", "")).unwrap();
    conn.create_table("table:other", &table_config("rotn", "17")).unwrap();
    assert_eq!(
        conn.table_descriptor("table:plain").unwrap(),
        EncryptionDescriptor::None
    );
    assert_eq!(
        conn.table_descriptor("table:other").unwrap(),
        EncryptionDescriptor::named("rotn", "17")
    );

    let other = conn.open_table("table:other").unwrap();
    other.insert_str("k", "value").unwrap();
    conn.checkpoint().unwrap();
    assert_eq!(other.get_str("k").unwrap().as_deref(), Some("value"));
}

#[test]
fn table_with_unknown_encryptor_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open(dir.path(), "create").unwrap();
    assert!(matches!(
        conn.create_table(URI, &table_config("aes", "1")),
        Err(StorageError::UnknownEncryptor(name)) if name == "aes"
    ));
    assert!(conn.list_tables().unwrap().is_empty());
}

#[test]
fn table_secretkey_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open(dir.path(), &conn_config("rotn", "11", "")).unwrap();
    assert!(matches!(
        conn.create_table(URI, "encryption=(name=rotn,keyid=11,secretkey=ABC)"),
        Err(StorageError::InvalidConfig(_))
    ));
}

#[test]
fn open_missing_table() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open(dir.path(), "create").unwrap();
    assert!(matches!(
        conn.open_table("table:nope"),
        Err(StorageError::TableNotFound(_))
    ));
    assert!(matches!(
        conn.open_table("file:nope"),
        Err(StorageError::InvalidConfig(_))
    ));
}

#[test]
fn drop_table_removes_file_and_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open(dir.path(), &conn_config("rotn", "11", "")).unwrap();
    conn.create_table(URI, "key_format=S,value_format=S").unwrap();
    let table = conn.open_table(URI).unwrap();
    table.insert_str("k", "v").unwrap();
    conn.checkpoint().unwrap();
    assert!(dir.path().join("test_encrypt04.bdb").exists());

    conn.drop_table(URI).unwrap();
    assert!(conn.list_tables().unwrap().is_empty());
    assert!(!dir.path().join("test_encrypt04.bdb").exists());
    assert!(matches!(table.get(b"k"), Err(StorageError::Closed(_))));
    assert!(matches!(
        conn.drop_table(URI),
        Err(StorageError::TableNotFound(_))
    ));

    conn.create_table(URI, "key_format=S,value_format=S").unwrap();
    assert!(conn.open_table(URI).unwrap().is_empty());
}

#[test]
fn drop_during_checkpoint_stays_dropped() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let data = records(4000);
    let conn = open(dir.path(), &conn_config("rotn", "11", "")).unwrap();
    conn.create_table(URI, "key_format=S,value_format=S").unwrap();
    write_records(&conn, &data).unwrap();
    let table = conn.open_table(URI).unwrap();

    let (checkpoint, dropped) = std::thread::scope(|s| {
        let checkpoint = s.spawn(|| conn.checkpoint());
        std::thread::sleep(std::time::Duration::from_millis(5));
        let dropped = conn.drop_table(URI);
        (checkpoint.join().unwrap(), dropped)
    });
    checkpoint.unwrap();
    dropped.unwrap();

    assert!(table.is_closed());
    assert!(conn.list_tables().unwrap().is_empty());
    assert!(!dir.path().join("test_encrypt04.bdb").exists());

    conn.close().unwrap();
    let conn = open(dir.path(), &conn_config("rotn", "11", "")).unwrap();
    assert!(conn.list_tables().unwrap().is_empty());
    assert!(matches!(
        conn.open_table(URI),
        Err(StorageError::TableNotFound(_))
    ));
}

#[test]
fn checkpoint_after_drop_skips_the_table() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open(dir.path(), "create").unwrap();
    conn.create_table(URI, "").unwrap();
    conn.create_table("table:kept", "").unwrap();
    let dropped = conn.open_table(URI).unwrap();
    let kept = conn.open_table("table:kept").unwrap();
    dropped.insert_str("k", "v").unwrap();
    kept.insert_str("k", "v").unwrap();

    conn.drop_table(URI).unwrap();
    conn.checkpoint().unwrap();
    conn.close().unwrap();

    let conn = open(dir.path(), "").unwrap();
    let names: Vec<String> = conn
        .list_tables()
        .unwrap()
        .iter()
        .map(|uri| uri.to_string())
        .collect();
    assert_eq!(names, vec!["table:kept"]);
    assert_eq!(
        conn.open_table("table:kept").unwrap().get_str("k").unwrap().as_deref(),
        Some("v")
    );
}

#[test]
fn dropped_table_does_not_constrain_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let mut conn = open(dir.path(), &conn_config("rotn", "11", "")).unwrap();
    conn.create_table(URI, "").unwrap();
    conn.drop_table(URI).unwrap();
    conn.reopen(&conn_config("rotn", "17", "")).unwrap();
}

#[test]
fn list_tables_is_sorted() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open(dir.path(), "create").unwrap();
    for name in ["table:b", "table:a", "table:c"] {
        conn.create_table(name, "").unwrap();
    }
    let names: Vec<String> = conn
        .list_tables()
        .unwrap()
        .iter()
        .map(|uri| uri.to_string())
        .collect();
    assert_eq!(names, vec!["table:a", "table:b", "table:c"]);
}

// ── lifecycle ────────────────────────────────────────────────────

#[test]
fn close_invalidates_handles_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let data = records(40);
    let conn = open(dir.path(), &conn_config("rotn", "11", "ABC")).unwrap();
    conn.create_table(URI, "key_format=S,value_format=S").unwrap();
    write_records(&conn, &data).unwrap();
    let table = conn.open_table(URI).unwrap();
    conn.close().unwrap();
    assert!(table.is_closed());
    assert!(matches!(table.insert_str("x", "y"), Err(StorageError::Closed(_))));

    let conn = open(dir.path(), &conn_config("rotn", "11", "ABC")).unwrap();
    assert_eq!(matching_records(&conn, &data).unwrap(), data.len());
}

#[test]
fn reopen_replaces_the_connection() {
    let dir = tempfile::tempdir().unwrap();
    let mut conn = open(dir.path(), "create").unwrap();
    conn.create_table(URI, "").unwrap();
    let old = conn.open_table(URI).unwrap();
    old.insert_str("k", "v").unwrap();
    let old_id = conn.id();

    conn.reopen("create").unwrap();
    assert_ne!(conn.id(), old_id);
    assert!(old.is_closed());
    assert_eq!(conn.open_table(URI).unwrap().get_str("k").unwrap().as_deref(), Some("v"));
}

#[test]
fn chacha20_wrong_secret_fails_on_read() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let data = records(60);
    let config = |secret| conn_config("chacha20", "k1", secret);

    let conn = open(dir.path(), &config("ABC")).unwrap();
    conn.create_table(URI, "key_format=S,value_format=S").unwrap();
    write_records(&conn, &data).unwrap();
    conn.close().unwrap();

    // Validation never sees the secret, so the open succeeds.
    let conn = open(dir.path(), &config("XYZ")).unwrap();
    let err = matching_records(&conn, &data).unwrap_err();
    assert!(matches!(err, StorageError::Decryption { .. }), "{err}");
    assert!(!err.to_string().contains("XYZ"));
    conn.close().unwrap();

    let conn = open(dir.path(), &config("ABC")).unwrap();
    assert_eq!(matching_records(&conn, &data).unwrap(), data.len());
}

#[test]
fn chacha20_keyid_change_is_a_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let conn = open(dir.path(), &conn_config("chacha20", "k1", "ABC")).unwrap();
    conn.create_table(URI, "").unwrap();
    conn.close().unwrap();

    assert!(matches!(
        open(dir.path(), &conn_config("chacha20", "k2", "ABC")),
        Err(StorageError::EncryptionMismatch { .. })
    ));
    assert!(matches!(
        open(dir.path(), &conn_config("rotn", "11", "")),
        Err(StorageError::EncryptionMismatch { .. })
    ));
}
