use hashrecord_core::{
    default_registry, AttributeDefault, BatchQuery, HashStore, InMemoryHashStore, ModelRepository,
    Record, RepoError, Schema, Value,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn person_schema() -> Schema {
    let mut builder = Schema::builder("person", default_registry()).unwrap();
    builder
        .string_attribute("first")
        .unwrap()
        .string_attribute("last")
        .unwrap()
        .attribute("age", "integer")
        .unwrap()
        .attribute("born_at", "time")
        .unwrap()
        .declare_attribute("nickname", "string", Some(AttributeDefault::value("Runt")))
        .unwrap()
        .declare_attribute("zero", "integer", Some(AttributeDefault::value(0)))
        .unwrap()
        .declare_attribute("hundred", "integer", Some(AttributeDefault::stored("100")))
        .unwrap();
    builder.validate_with(|record: &Record| {
        if record.get("first").and_then(Value::as_str) == Some("RJ") {
            vec!["first name RJ is not allowed".to_string()]
        } else {
            Vec::new()
        }
    });
    builder.build()
}

fn create_person(repo: &ModelRepository<'_, InMemoryHashStore>, first: &str, last: &str) -> Record {
    let record = repo.create([("first", first), ("last", last)]).unwrap();
    assert!(record.is_persisted(), "{first} {last} should save");
    record
}

#[test]
fn create_assigns_id_and_find_returns_same_attributes() {
    let store = InMemoryHashStore::new();
    let schema = person_schema();
    let repo = ModelRepository::new(&store, &schema);

    let record = repo
        .create(vec![
            ("first", Value::from("Ada")),
            ("last", Value::from("Lovelace")),
            ("age", Value::from(36)),
        ])
        .unwrap();
    assert!(record.is_persisted());
    assert!(!record.is_new_record());
    let id = record.id().unwrap();

    let found = repo.find_by_id(id).unwrap().unwrap();
    assert_eq!(found.id(), Some(id));
    assert_eq!(found.get("first"), Some(&Value::from("Ada")));
    assert_eq!(found.get("last"), Some(&Value::from("Lovelace")));
    assert_eq!(found.get("age"), Some(&Value::Integer(36)));
    assert!(!found.is_deleted());
}

#[test]
fn invalid_record_is_not_saved_and_reports_errors() {
    let store = InMemoryHashStore::new();
    let schema = person_schema();
    let repo = ModelRepository::new(&store, &schema);

    let mut record = repo.new_record([("first", "RJ"), ("last", "Smith")]).unwrap();
    assert!(record.is_new_record());
    assert!(!repo.valid(&mut record));
    assert_eq!(record.errors().len(), 1);

    assert!(!repo.save(&mut record).unwrap());
    assert_eq!(record.id(), None);
    assert!(record.is_new_record());
    assert!(!record.errors().is_empty());
    assert_eq!(repo.count().unwrap(), 0);

    record.set("first", "Rebecca");
    assert!(repo.save(&mut record).unwrap());
    assert!(record.errors().is_empty());
    assert!(repo.find_by_id(record.id().unwrap()).unwrap().is_some());
}

#[test]
fn create_returns_unsaved_record_when_validation_fails() {
    let store = InMemoryHashStore::new();
    let schema = person_schema();
    let repo = ModelRepository::new(&store, &schema);

    let record = repo.create([("first", "RJ")]).unwrap();
    assert!(record.is_new_record());
    assert_eq!(record.errors(), ["first name RJ is not allowed".to_string()]);
    assert_eq!(store.cardinality("person:ids").unwrap(), 0);
}

#[test]
fn find_by_id_for_unknown_id_returns_none() {
    let store = InMemoryHashStore::new();
    let schema = person_schema();
    let repo = ModelRepository::new(&store, &schema);
    create_person(&repo, "Grace", "Hopper");

    assert!(repo.find_by_id("fakeid").unwrap().is_none());
    assert!(repo.find("fakeid", true).unwrap().is_none());
    assert!(!repo.exists("fakeid").unwrap());
}

#[test]
fn find_by_ids_returns_existing_records_only() {
    let store = InMemoryHashStore::new();
    let schema = person_schema();
    let repo = ModelRepository::new(&store, &schema);
    let a = create_person(&repo, "Alan", "Turing");
    let b = create_person(&repo, "Edsger", "Dijkstra");

    let found = repo
        .find_by_ids([a.id().unwrap(), b.id().unwrap()])
        .unwrap();
    assert_eq!(found.len(), 2);

    let ids: HashSet<&str> = found.iter().filter_map(Record::id).collect();
    assert!(ids.contains(a.id().unwrap()));
    assert!(ids.contains(b.id().unwrap()));

    assert!(repo.find_by_ids(["nonexistent"]).unwrap().is_empty());
    let mixed = repo
        .find_by_ids(["nonexistent", a.id().unwrap()])
        .unwrap();
    assert_eq!(mixed.len(), 1);
}

#[test]
fn find_in_batches_yields_bounded_chunks_covering_every_record() {
    let store = InMemoryHashStore::new();
    let schema = person_schema();
    let repo = ModelRepository::new(&store, &schema);
    let mut expected = HashSet::new();
    for n in 0..5 {
        let record = create_person(&repo, &format!("first-{n}"), "Batch");
        expected.insert(record.id().unwrap().to_string());
    }

    let mut seen = HashSet::new();
    let mut batches = 0;
    for batch in repo.find_in_batches(1).unwrap() {
        let batch = batch.unwrap();
        assert_eq!(batch.len(), 1);
        batches += 1;
        for record in batch {
            assert!(seen.insert(record.id().unwrap().to_string()));
        }
    }
    assert_eq!(batches, 5);
    assert_eq!(seen, expected);

    let sizes: Vec<usize> = repo
        .find_in_batches(2)
        .unwrap()
        .map(|batch| batch.unwrap().len())
        .collect();
    assert_eq!(sizes.iter().sum::<usize>(), 5);
    assert!(sizes.iter().all(|size| (1..=2).contains(size)));
}

#[test]
fn find_in_batches_on_empty_model_yields_nothing() {
    let store = InMemoryHashStore::new();
    let schema = person_schema();
    let repo = ModelRepository::new(&store, &schema);

    assert_eq!(repo.find_in_batches(10).unwrap().count(), 0);
    assert!(repo.all().unwrap().is_empty());
    assert_eq!(repo.count().unwrap(), 0);
}

#[test]
fn all_length_matches_count_after_saves() {
    let store = InMemoryHashStore::new();
    let schema = person_schema();
    let repo = ModelRepository::new(&store, &schema);
    for n in 0..4 {
        create_person(&repo, &format!("p{n}"), "Count");
    }

    assert_eq!(repo.all().unwrap().len() as u64, repo.count().unwrap());
    assert_eq!(repo.count().unwrap(), 4);
}

#[test]
fn exists_reports_stored_records() {
    let store = InMemoryHashStore::new();
    let schema = person_schema();
    let repo = ModelRepository::new(&store, &schema);
    let record = create_person(&repo, "Barbara", "Liskov");

    assert!(repo.exists(record.id().unwrap()).unwrap());
}

#[test]
fn saving_a_persisted_record_updates_in_place() {
    let store = InMemoryHashStore::new();
    let schema = person_schema();
    let repo = ModelRepository::new(&store, &schema);
    let mut record = create_person(&repo, "Ken", "Thompson");
    let id = record.id().unwrap().to_string();

    record.set("last", "T.");
    assert!(repo.save(&mut record).unwrap());
    assert_eq!(record.id(), Some(id.as_str()));

    let found = repo.find_by_id(&id).unwrap().unwrap();
    assert_eq!(found.get("last"), Some(&Value::from("T.")));
    assert_eq!(repo.count().unwrap(), 1);
}

#[test]
fn update_merges_fields_and_leaves_others_untouched() {
    let store = InMemoryHashStore::new();
    let schema = person_schema();
    let repo = ModelRepository::new(&store, &schema);
    let record = create_person(&repo, "Dennis", "Ritchie");
    let id = record.id().unwrap();
    let born_at = chrono::Utc::now();

    let updated = repo
        .update(
            id,
            vec![("age", Value::from(70)), ("born_at", Value::from(born_at))],
        )
        .unwrap();
    assert!(updated);

    let found = repo.find_by_id(id).unwrap().unwrap();
    assert_eq!(found.get("age"), Some(&Value::Integer(70)));
    assert_eq!(found.get("born_at").and_then(Value::as_time), Some(born_at));
    assert_eq!(found.get("first"), Some(&Value::from("Dennis")));
    assert_eq!(found.get("last"), Some(&Value::from("Ritchie")));
}

#[test]
fn update_skips_validation() {
    let store = InMemoryHashStore::new();
    let schema = person_schema();
    let repo = ModelRepository::new(&store, &schema);
    let record = create_person(&repo, "Robert", "Pike");
    let id = record.id().unwrap();

    assert!(repo.update(id, [("first", "RJ")]).unwrap());
    let found = repo.find_by_id(id).unwrap().unwrap();
    assert_eq!(found.get("first"), Some(&Value::from("RJ")));
}

#[test]
fn update_columns_keeps_full_precision_and_unnamed_fields() {
    let store = InMemoryHashStore::new();
    let schema = person_schema();
    let repo = ModelRepository::new(&store, &schema);
    let record = create_person(&repo, "Niklaus", "Wirth");
    let id = record.id().unwrap();
    let born_at = chrono::Utc::now();

    assert!(repo
        .update_columns(id, [("born_at", Value::from(born_at))])
        .unwrap());

    let found = repo.find_by_id(id).unwrap().unwrap();
    let stored = found.get("born_at").and_then(Value::as_time).unwrap();
    assert_eq!(stored, born_at);
    assert_eq!(
        stored.timestamp_nanos_opt(),
        born_at.timestamp_nanos_opt()
    );
    assert_eq!(found.get("first"), Some(&Value::from("Niklaus")));
    assert_eq!(found.get("last"), Some(&Value::from("Wirth")));
}

#[test]
fn update_on_missing_id_returns_false_and_writes_nothing() {
    let store = InMemoryHashStore::new();
    let schema = person_schema();
    let repo = ModelRepository::new(&store, &schema);

    assert!(!repo.update("missing", [("first", "Nobody")]).unwrap());
    assert!(!repo.update_columns("missing", [("first", "Nobody")]).unwrap());
    assert!(!repo.exists("missing").unwrap());
}

#[test]
fn unknown_attribute_is_rejected() {
    let store = InMemoryHashStore::new();
    let schema = person_schema();
    let repo = ModelRepository::new(&store, &schema);
    let record = create_person(&repo, "John", "Backus");

    let err = repo.new_record([("middle", "W")]).unwrap_err();
    assert!(matches!(err, RepoError::UnknownAttribute(ref name) if name == "middle"));

    let err = repo
        .update(record.id().unwrap(), [("middle", "W")])
        .unwrap_err();
    assert!(matches!(err, RepoError::UnknownAttribute(_)));
}

#[test]
fn defaults_apply_when_attributes_are_not_given() {
    let store = InMemoryHashStore::new();
    let schema = person_schema();
    let repo = ModelRepository::new(&store, &schema);

    let fresh = repo.new_record([("first", "Tiny")]).unwrap();
    assert_eq!(fresh.get("nickname"), Some(&Value::from("Runt")));
    assert_eq!(fresh.get("zero"), Some(&Value::Integer(0)));
    assert_eq!(fresh.get("hundred"), Some(&Value::Integer(100)));
    assert_eq!(fresh.get("age"), Some(&Value::Null));

    let record = create_person(&repo, "Tiny", "Tim");
    let found = repo.find_by_id(record.id().unwrap()).unwrap().unwrap();
    assert_eq!(found.get("nickname"), Some(&Value::from("Runt")));
    assert_eq!(found.get("zero"), Some(&Value::Integer(0)));
    assert_eq!(found.get("hundred"), Some(&Value::Integer(100)));
    assert_eq!(found.get("age"), Some(&Value::Null));
}

#[test]
fn explicit_values_override_defaults() {
    let store = InMemoryHashStore::new();
    let schema = person_schema();
    let repo = ModelRepository::new(&store, &schema);

    let record = repo
        .create(vec![
            ("first", Value::from("Big")),
            ("nickname", Value::from("Giant")),
            ("zero", Value::from(7)),
        ])
        .unwrap();
    let found = repo.find_by_id(record.id().unwrap()).unwrap().unwrap();
    assert_eq!(found.get("nickname"), Some(&Value::from("Giant")));
    assert_eq!(found.get("zero"), Some(&Value::Integer(7)));
}

#[test]
fn delete_hides_record_and_undelete_restores_it() {
    let store = InMemoryHashStore::new();
    let schema = person_schema();
    let repo = ModelRepository::new(&store, &schema);
    let mut record = create_person(&repo, "Margaret", "Hamilton");
    let id = record.id().unwrap().to_string();

    repo.delete(&mut record).unwrap();
    assert!(record.is_deleted());
    assert!(repo.find_by_id(&id).unwrap().is_none());

    let hidden = repo.find(&id, true).unwrap().unwrap();
    assert_eq!(hidden.id(), Some(id.as_str()));
    assert!(hidden.is_deleted());
    assert_eq!(hidden.get("first"), Some(&Value::from("Margaret")));
    assert!(repo.exists(&id).unwrap());

    repo.undelete(&mut record).unwrap();
    assert!(!record.is_deleted());
    let restored = repo.find_by_id(&id).unwrap().unwrap();
    assert!(!restored.is_deleted());
}

#[test]
fn count_and_batches_exclude_deleted_records_by_default() {
    let store = InMemoryHashStore::new();
    let schema = person_schema();
    let repo = ModelRepository::new(&store, &schema);
    let keep = create_person(&repo, "Keep", "Me");
    let mut gone = create_person(&repo, "Gone", "Soon");
    repo.delete(&mut gone).unwrap();

    assert_eq!(repo.count().unwrap(), 1);
    assert_eq!(repo.count_with_deleted().unwrap(), 2);

    let all = repo.all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].id(), keep.id());
    assert_eq!(all.len() as u64, repo.count().unwrap());

    let with_deleted: usize = repo
        .batches(&BatchQuery {
            batch_size: 10,
            include_deleted: true,
        })
        .unwrap()
        .map(|batch| batch.unwrap().len())
        .sum();
    assert_eq!(with_deleted, 2);

    let ids = [keep.id().unwrap(), gone.id().unwrap()];
    assert_eq!(repo.find_by_ids(ids).unwrap().len(), 1);
}

#[test]
fn delete_requires_a_saved_record() {
    let store = InMemoryHashStore::new();
    let schema = person_schema();
    let repo = ModelRepository::new(&store, &schema);

    let mut unsaved = repo.new_record([("first", "Draft")]).unwrap();
    assert!(matches!(
        repo.delete(&mut unsaved),
        Err(RepoError::NotPersisted)
    ));
    assert!(matches!(
        repo.undelete(&mut unsaved),
        Err(RepoError::NotPersisted)
    ));
}

#[test]
fn models_with_different_namespaces_do_not_share_records() {
    let store = InMemoryHashStore::new();
    let people = person_schema();
    let mut builder = Schema::builder("pet", default_registry()).unwrap();
    builder.attribute("name", "string").unwrap();
    let pets = builder.build();

    let person_repo = ModelRepository::new(&store, &people);
    let pet_repo = ModelRepository::new(&store, &pets);
    let person = create_person(&person_repo, "Owner", "One");
    pet_repo.create([("name", "Rex")]).unwrap();

    assert_eq!(person_repo.count().unwrap(), 1);
    assert_eq!(pet_repo.count().unwrap(), 1);
    assert!(pet_repo.find_by_id(person.id().unwrap()).unwrap().is_none());
}

#[test]
fn timestamps_are_maintained_by_save_and_update_only() {
    let store = InMemoryHashStore::new();
    let mut builder = Schema::builder("event", default_registry()).unwrap();
    builder
        .attribute("title", "string")
        .unwrap()
        .timestamps()
        .unwrap();
    let schema = builder.build();
    let repo = ModelRepository::new(&store, &schema);

    let mut record = repo.create([("title", "launch")]).unwrap();
    let id = record.id().unwrap().to_string();
    let created_at = record.get("created_at").and_then(Value::as_time).unwrap();
    let first_updated_at = record.get("updated_at").and_then(Value::as_time).unwrap();

    record.set("title", "relaunch");
    assert!(repo.save(&mut record).unwrap());
    let saved = repo.find_by_id(&id).unwrap().unwrap();
    assert_eq!(saved.get("created_at").and_then(Value::as_time), Some(created_at));
    let second_updated_at = saved.get("updated_at").and_then(Value::as_time).unwrap();
    assert!(second_updated_at >= first_updated_at);

    assert!(repo.update_columns(&id, [("title", "quiet")]).unwrap());
    let quiet = repo.find_by_id(&id).unwrap().unwrap();
    assert_eq!(
        quiet.get("updated_at").and_then(Value::as_time),
        Some(second_updated_at)
    );

    assert!(repo.update(&id, [("title", "loud")]).unwrap());
    let loud = repo.find_by_id(&id).unwrap().unwrap();
    assert!(loud.get("updated_at").and_then(Value::as_time).unwrap() >= second_updated_at);
    assert_eq!(loud.get("created_at").and_then(Value::as_time), Some(created_at));
}

#[test]
fn mismatched_defaults_load_in_the_declared_type() {
    let store = InMemoryHashStore::new();
    let mut builder = Schema::builder("gauge", default_registry()).unwrap();
    builder
        .declare_attribute("count", "integer", Some(AttributeDefault::value("5")))
        .unwrap()
        .declare_attribute("ratio", "float", Some(AttributeDefault::value(1)))
        .unwrap();
    let schema = builder.build();
    let repo = ModelRepository::new(&store, &schema);

    let record = repo.create(Vec::<(&str, Value)>::new()).unwrap();
    assert_eq!(record.get("count"), Some(&Value::Integer(5)));
    assert_eq!(record.get("ratio"), Some(&Value::Float(1.0)));
    let id = record.id().unwrap();

    assert!(repo
        .update_columns(id, [("count", Value::Null), ("ratio", Value::Null)])
        .unwrap());
    let found = repo.find_by_id(id).unwrap().unwrap();
    assert_eq!(found.get("count"), Some(&Value::Integer(5)));
    assert_eq!(found.get("ratio"), Some(&Value::Float(1.0)));
}

#[test]
fn producer_default_is_called_for_each_record_needing_it() {
    let store = InMemoryHashStore::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut builder = Schema::builder("ticket", default_registry()).unwrap();
    builder
        .string_attribute("title")
        .unwrap()
        .declare_attribute(
            "seq",
            "integer",
            Some(AttributeDefault::producer(move || {
                Value::Integer(counter.fetch_add(1, Ordering::SeqCst) as i64 + 1)
            })),
        )
        .unwrap();
    let schema = builder.build();
    let repo = ModelRepository::new(&store, &schema);

    let first = repo.create([("title", "a")]).unwrap();
    let second = repo.create([("title", "b")]).unwrap();
    assert_eq!(first.get("seq"), Some(&Value::Integer(1)));
    assert_eq!(second.get("seq"), Some(&Value::Integer(2)));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let given = repo
        .create(vec![("title", Value::from("c")), ("seq", Value::from(10))])
        .unwrap();
    assert_eq!(given.get("seq"), Some(&Value::Integer(10)));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    assert!(repo
        .update_columns(first.id().unwrap(), [("seq", Value::Null)])
        .unwrap());
    let reloaded = repo.find_by_id(first.id().unwrap()).unwrap().unwrap();
    assert_eq!(reloaded.get("seq"), Some(&Value::Integer(3)));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}
