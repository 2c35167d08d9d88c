use burrow_storage::{check_compatibility, MismatchField, OpenOutcome, StorageError};
use burrow_types::{EncryptionConfig, EncryptionDescriptor, TableUri};
use proptest::prelude::*;

fn uri() -> TableUri {
    TableUri::parse("table:t").unwrap()
}

fn named(name: &str, keyid: &str) -> EncryptionDescriptor {
    EncryptionDescriptor::named(name, keyid)
}

fn mismatch_field(result: Result<OpenOutcome, StorageError>) -> Option<MismatchField> {
    match result {
        Err(StorageError::EncryptionMismatch { field, .. }) => Some(field),
        _ => None,
    }
}

#[test]
fn decision_table() {
    use EncryptionDescriptor::None as Plain;
    let u = uri();

    assert_eq!(check_compatibility(&u, &Plain, &Plain).unwrap(), OpenOutcome::Unchanged);
    assert_eq!(
        check_compatibility(&u, &Plain, &named("rotn", "11")).unwrap(),
        OpenOutcome::Upgrade
    );
    assert_eq!(
        mismatch_field(check_compatibility(&u, &named("rotn", "11"), &Plain)),
        Some(MismatchField::Name)
    );
    assert_eq!(
        check_compatibility(&u, &named("rotn", "11"), &named("rotn", "11")).unwrap(),
        OpenOutcome::Unchanged
    );
    assert_eq!(
        mismatch_field(check_compatibility(&u, &named("rotn", "11"), &named("rotn", "17"))),
        Some(MismatchField::Keyid)
    );
    assert_eq!(
        mismatch_field(check_compatibility(&u, &named("rotn", "11"), &named("chacha20", "11"))),
        Some(MismatchField::Name)
    );
}

#[test]
fn mismatch_message_names_both_values() {
    let err = check_compatibility(&uri(), &named("rotn", "11"), &named("rotn", "17")).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("table:t"), "{msg}");
    assert!(msg.contains("keyid"), "{msg}");
    assert!(msg.contains("'11'") && msg.contains("'17'"), "{msg}");
}

#[test]
fn secret_never_reaches_the_validator() {
    let with = EncryptionConfig::named("rotn", "11", "ABC");
    let without = EncryptionConfig::named("rotn", "11", "");
    assert_eq!(with.descriptor(), without.descriptor());
    assert_eq!(
        check_compatibility(&uri(), &named("rotn", "11"), &with.descriptor()).unwrap(),
        OpenOutcome::Unchanged
    );
}

fn descriptor_strategy() -> impl Strategy<Value = EncryptionDescriptor> {
    prop_oneof![
        Just(EncryptionDescriptor::None),
        (
            prop::sample::select(vec!["rotn", "chacha20", "aes"]),
            prop::sample::select(vec!["", "11", "17"]),
        )
            .prop_map(|(name, keyid)| EncryptionDescriptor::named(name, keyid)),
    ]
}

proptest! {
    #[test]
    fn outcome_follows_rule(
        persisted in descriptor_strategy(),
        requested in descriptor_strategy(),
        secret in "[A-Z]{0,8}",
    ) {
        let config = EncryptionConfig::named(requested.name(), requested.keyid(), secret);
        let result = check_compatibility(&uri(), &persisted, &config.descriptor());

        match (&persisted, &requested) {
            (EncryptionDescriptor::None, EncryptionDescriptor::None) => {
                prop_assert_eq!(result.unwrap(), OpenOutcome::Unchanged);
            }
            (EncryptionDescriptor::None, _) => {
                prop_assert_eq!(result.unwrap(), OpenOutcome::Upgrade);
            }
            _ if persisted == requested => {
                prop_assert_eq!(result.unwrap(), OpenOutcome::Unchanged);
            }
            _ => {
                let is_mismatch = matches!(result, Err(StorageError::EncryptionMismatch { .. }));
                prop_assert!(is_mismatch);
            }
        }
    }

    #[test]
    fn outcome_is_deterministic(
        persisted in descriptor_strategy(),
        requested in descriptor_strategy(),
    ) {
        let first = check_compatibility(&uri(), &persisted, &requested);
        let second = check_compatibility(&uri(), &persisted, &requested);
        prop_assert_eq!(first.as_ref().ok(), second.as_ref().ok());
        prop_assert_eq!(mismatch_field(first), mismatch_field(second));
    }
}
