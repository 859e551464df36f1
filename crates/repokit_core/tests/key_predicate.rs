mod support;

use repokit_core::{
    key_predicate, CoercionError, Entity, KeyType, KeyValue, Predicate, QueryOptions, RepoError,
    SchemaError, SchemaRegistry,
};
use support::{open_repo, Customer, Order, OrderLine, OrderTotal, Sensor, Tag};
use uuid::Uuid;

#[test]
fn integer_key_predicate_matches_only_the_identified_instance() {
    let (repo, _clock) = open_repo();
    let ids = [i64::MIN, -1, 0, 1, 42, 43, i64::MAX];

    for id in ids {
        let predicate = repo.key_predicate::<Order>(id).unwrap();
        for other in ids {
            let candidate = Order::new(other, "ada", 100);
            assert_eq!(
                predicate.matches_entity(&candidate),
                other == id,
                "key {id} against instance {other}"
            );
        }
    }
}

#[test]
fn predicate_is_a_plain_equality_on_the_key_field() {
    let (repo, _clock) = open_repo();
    assert_eq!(
        repo.key_predicate::<Order>(42).unwrap(),
        Predicate::eq("id", 42)
    );
    assert_eq!(
        repo.key_predicate::<Customer>("ACME").unwrap(),
        Predicate::eq("code", "ACME".to_string())
    );
}

#[test]
fn numeric_text_is_coerced_to_integer_keys() {
    let (repo, _clock) = open_repo();
    assert_eq!(
        repo.key_predicate::<Order>("42").unwrap(),
        repo.key_predicate::<Order>(42).unwrap()
    );
    assert_eq!(
        repo.key_predicate::<Order>(" 42 ").unwrap(),
        Predicate::eq("id", 42)
    );
}

#[test]
fn non_numeric_identifier_for_integer_key_is_coercion_error() {
    let (repo, _clock) = open_repo();

    let err = repo.key_predicate::<Order>("abc").unwrap_err();
    match err {
        RepoError::Coercion(CoercionError::Incompatible {
            field, expected, ..
        }) => {
            assert_eq!(field, "id");
            assert_eq!(expected, KeyType::Integer);
        }
        other => panic!("unexpected error: {other}"),
    }

    for raw in ["", "4.2", "42abc", "0x2a"] {
        assert!(
            matches!(
                repo.key_predicate::<Order>(raw),
                Err(RepoError::Coercion(_))
            ),
            "`{raw}` should not coerce"
        );
    }
}

#[test]
fn uuid_keys_accept_any_parseable_text_form() {
    let (repo, _clock) = open_repo();
    let uuid = Uuid::parse_str("6f1c2b7e-1d2a-4c3b-9e8f-0a1b2c3d4e5f").unwrap();
    let tag = Tag {
        uuid,
        label: "urgent".to_string(),
    };

    for form in [
        "6f1c2b7e-1d2a-4c3b-9e8f-0a1b2c3d4e5f",
        "6F1C2B7E-1D2A-4C3B-9E8F-0A1B2C3D4E5F",
        "6f1c2b7e1d2a4c3b9e8f0a1b2c3d4e5f",
        "{6f1c2b7e-1d2a-4c3b-9e8f-0a1b2c3d4e5f}",
    ] {
        assert!(repo.key_predicate::<Tag>(form).unwrap().matches_entity(&tag));
    }
    assert!(repo.key_predicate::<Tag>(uuid).unwrap().matches_entity(&tag));
    assert!(matches!(
        repo.key_predicate::<Tag>("not-a-uuid"),
        Err(RepoError::Coercion(_))
    ));
    assert!(matches!(
        repo.key_predicate::<Tag>(7),
        Err(RepoError::Coercion(_))
    ));
}

#[test]
fn composite_keys_need_one_component_per_field() {
    let (repo, _clock) = open_repo();
    let line = OrderLine::new(7, 2, "SKU-1", 3);

    let predicate = repo.key_predicate::<OrderLine>((7, 2)).unwrap();
    assert!(predicate.matches_entity(&line));
    assert!(!predicate.matches_entity(&OrderLine::new(7, 3, "SKU-1", 3)));
    assert!(!predicate.matches_entity(&OrderLine::new(8, 2, "SKU-1", 3)));

    assert!(matches!(
        repo.key_predicate::<OrderLine>(7),
        Err(RepoError::Coercion(CoercionError::Arity {
            expected: 2,
            actual: 1
        }))
    ));
    assert!(matches!(
        repo.key_predicate::<OrderLine>((7, 2, 1)),
        Err(RepoError::Coercion(CoercionError::Arity {
            expected: 2,
            actual: 3
        }))
    ));
}

#[test]
fn null_identifier_depends_on_key_nullability() {
    let (repo, _clock) = open_repo();

    assert!(matches!(
        repo.key_predicate::<Order>(KeyValue::Null),
        Err(RepoError::Coercion(CoercionError::NullKey { .. }))
    ));

    let predicate = repo.key_predicate::<Sensor>(None::<String>).unwrap();
    assert_eq!(predicate, Predicate::is_null("serial"));
    assert!(predicate.matches_entity(&Sensor {
        serial: None,
        reading: 1
    }));
    assert!(!predicate.matches_entity(&Sensor {
        serial: Some("S-1".to_string()),
        reading: 1
    }));
}

#[test]
fn keyless_and_unregistered_types_are_schema_errors() {
    let (repo, _clock) = open_repo();

    assert!(matches!(
        repo.key_predicate::<OrderTotal>(1),
        Err(RepoError::Schema(SchemaError::MissingPrimaryKey { .. }))
    ));

    let empty = SchemaRegistry::new();
    assert!(matches!(
        empty.descriptor::<Order>(),
        Err(SchemaError::NotRegistered { .. })
    ));
}

#[test]
fn registration_rejects_missing_key_at_startup() {
    struct Unkeyed;

    impl Entity for Unkeyed {
        fn descriptor() -> repokit_core::EntityDescriptor {
            repokit_core::EntityDescriptor::new("unkeyed").column("payload")
        }

        fn to_fields(&self) -> Vec<(&'static str, repokit_core::Value)> {
            Vec::new()
        }

        fn from_row(_row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
            Ok(Self)
        }
    }

    let mut registry = SchemaRegistry::new();
    assert!(matches!(
        registry.register::<Unkeyed>(),
        Err(SchemaError::MissingPrimaryKey { .. })
    ));
    registry.register::<Order>().unwrap();
    assert!(matches!(
        registry.register::<Order>(),
        Err(SchemaError::AlreadyRegistered { .. })
    ));
}

#[test]
fn free_function_builds_from_descriptor_alone() {
    let predicate = key_predicate(&Order::descriptor(), &"42".into()).unwrap();
    assert!(predicate.matches_entity(&Order::new(42, "ada", 0)));
}

#[test]
fn key_predicate_filters_server_side() {
    let (mut repo, _clock) = open_repo();
    let mut orders = vec![Order::new(41, "ada", 100), Order::new(42, "bob", 200)];
    repo.add_range(&mut orders).unwrap();

    let predicate = repo.key_predicate::<Order>("42").unwrap();
    let found: Vec<Order> = repo
        .query(&QueryOptions::new().filter(predicate))
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].customer, "bob");
}
