mod common;

use common::{DatabaseBuilder, EntrySpec, FieldSpec, GroupSpec, PASSWORD};
use proptest::prelude::*;

#[derive(Clone, Debug)]
struct GeneratedEntry {
    values: Vec<(String, bool)>,
    old_password: Option<String>,
    recycled: bool,
}

fn generated_entry() -> impl Strategy<Value = GeneratedEntry> {
    (
        prop::collection::vec(("[a-zA-Z0-9 ]{0,12}|\\PC{0,4}", any::<bool>()), 0..4),
        proptest::option::of("[a-z]{1,8}"),
        any::<bool>(),
    )
        .prop_map(|(values, old_password, recycled)| GeneratedEntry {
            values,
            old_password,
            recycled,
        })
}

fn entry_spec(entry: &GeneratedEntry) -> EntrySpec {
    let fields = entry
        .values
        .iter()
        .enumerate()
        .map(|(idx, (value, protected))| {
            let key = format!("Field{}", idx);
            if *protected {
                FieldSpec::protected(&key, value)
            } else {
                FieldSpec::plain(&key, value)
            }
        })
        .collect();
    let history = entry
        .old_password
        .iter()
        .map(|old| EntrySpec {
            fields: vec![FieldSpec::protected("Password", old)],
            history: Vec::new(),
        })
        .collect();
    EntrySpec { fields, history }
}

fn database(entries: &[GeneratedEntry]) -> DatabaseBuilder {
    let mut builder = DatabaseBuilder::new();
    builder.rounds = Some((1, 0));
    builder.root = GroupSpec {
        name: Some("Root".into()),
        entries: Vec::new(),
        groups: entries
            .iter()
            .map(|entry| GroupSpec {
                name: Some(if entry.recycled { "Recycle Bin" } else { "Live" }.into()),
                entries: vec![entry_spec(entry)],
                groups: Vec::new(),
            })
            .collect(),
    };
    builder
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn offsets_follow_every_protected_value(entries in prop::collection::vec(generated_entry(), 0..6)) {
        let builder = database(&entries);
        let decoded = kdbx3_rs::decode(&builder.build(), PASSWORD, None).unwrap();

        let live: Vec<&GeneratedEntry> = entries.iter().filter(|e| !e.recycled).collect();
        prop_assert_eq!(decoded.entries.len(), live.len());

        let mut position = 0u64;
        let mut decoded_entries = decoded.entries.iter();
        for entry in &entries {
            let found = if entry.recycled { None } else { decoded_entries.next() };
            for (idx, (value, protected)) in entry.values.iter().enumerate() {
                let key = format!("Field{}", idx);
                if *protected {
                    if let Some(found) = found {
                        let field = found.protected_field(&key).unwrap();
                        prop_assert_eq!(field.position(), position);
                        prop_assert_eq!(&decoded.decrypt_field(field).unwrap(), value);
                        prop_assert_eq!(found.field(&key), None);
                    }
                    position += value.len() as u64;
                } else if let Some(found) = found {
                    prop_assert_eq!(found.field(&key), Some(value.as_str()));
                }
            }
            if let Some(old) = &entry.old_password {
                position += old.len() as u64;
            }
        }
    }
}
