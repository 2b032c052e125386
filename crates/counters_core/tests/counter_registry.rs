use counters_core::db::open_db_in_memory;
use counters_core::{
    CounterError, CounterValidationError, Counters, CountersConfig, NewCounter,
    SqliteCounterRepository,
};

#[test]
fn create_then_get_starts_at_initial_value() {
    let conn = open_db_in_memory().unwrap();
    let counters = Counters::new(SqliteCounterRepository::new(&conn));

    let created = counters
        .create(
            NewCounter::new("downloads", "Downloads")
                .initial_value(3)
                .step(5)
                .notes("release artifacts"),
        )
        .unwrap();
    assert_eq!(created.value, 3);

    let loaded = counters.get("downloads").unwrap();
    assert_eq!(loaded, created);
    assert_eq!(loaded.initial_value, 3);
    assert_eq!(loaded.step, 5);
    assert_eq!(loaded.notes.as_deref(), Some("release artifacts"));
}

#[test]
fn create_with_existing_key_fails_and_keeps_row() {
    let conn = open_db_in_memory().unwrap();
    let counters = Counters::new(SqliteCounterRepository::new(&conn));
    counters
        .create(NewCounter::new("visits", "Visits").initial_value(10))
        .unwrap();

    let err = counters
        .create(NewCounter::new("visits", "Other").initial_value(99))
        .unwrap_err();
    assert!(matches!(err, CounterError::AlreadyExists(ref key) if key == "visits"));

    let kept = counters.get("visits").unwrap();
    assert_eq!(kept.name, "Visits");
    assert_eq!(kept.value, 10);
}

#[test]
fn create_rejects_invalid_definitions() {
    let conn = open_db_in_memory().unwrap();
    let counters = Counters::new(SqliteCounterRepository::new(&conn));

    let err = counters.create(NewCounter::new("", "Nameless")).unwrap_err();
    assert!(matches!(
        err,
        CounterError::Validation(CounterValidationError::EmptyKey)
    ));
    let err = counters.create(NewCounter::new("views", "")).unwrap_err();
    assert!(matches!(
        err,
        CounterError::Validation(CounterValidationError::EmptyName)
    ));
}

#[test]
fn default_step_then_explicit_steps_then_reset() {
    let conn = open_db_in_memory().unwrap();
    let counters = Counters::new(SqliteCounterRepository::new(&conn));
    counters
        .create(NewCounter::new("downloads", "Downloads").initial_value(3).step(5))
        .unwrap();

    assert!(counters.increment("downloads", None).unwrap());
    assert_eq!(counters.get_value("downloads", None).unwrap(), 8);

    assert!(counters.decrement("downloads", Some(2)).unwrap());
    assert_eq!(counters.get_value("downloads", None).unwrap(), 6);

    assert!(counters.reset("downloads").unwrap());
    assert_eq!(counters.get_value("downloads", None).unwrap(), 3);
}

#[test]
fn increment_then_decrement_restores_value() {
    let conn = open_db_in_memory().unwrap();
    let counters = Counters::new(SqliteCounterRepository::new(&conn));
    counters
        .create(NewCounter::new("balance", "Balance").initial_value(-7))
        .unwrap();

    for step in [0, 1, 13, -4, 1_000_000] {
        let before = counters.get_value("balance", None).unwrap();
        counters.increment("balance", Some(step)).unwrap();
        counters.decrement("balance", Some(step)).unwrap();
        assert_eq!(counters.get_value("balance", None).unwrap(), before);
    }
}

#[test]
fn overflowing_step_fails_and_leaves_value_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let counters = Counters::new(SqliteCounterRepository::new(&conn));
    counters
        .create(NewCounter::new("big", "Big").initial_value(i64::MAX - 1))
        .unwrap();
    counters.create(NewCounter::new("small", "Small")).unwrap();

    let err = counters.increment("big", Some(5)).unwrap_err();
    assert!(matches!(err, CounterError::Overflow(ref key) if key == "big"));
    assert!(!err.is_missing_counter());
    assert_eq!(counters.get("big").unwrap().value, i64::MAX - 1);

    counters.increment("big", Some(1)).unwrap();
    assert_eq!(counters.get_value("big", None).unwrap(), i64::MAX);

    let err = counters.decrement("small", Some(i64::MIN)).unwrap_err();
    assert!(matches!(err, CounterError::Overflow(ref key) if key == "small"));
    assert_eq!(counters.get("small").unwrap().value, 0);

    let err = counters.increment("missing", Some(1)).unwrap_err();
    assert!(matches!(err, CounterError::DoesNotExist(_)));
}

#[test]
fn bulk_increment_propagates_overflow() {
    let conn = open_db_in_memory().unwrap();
    let counters = Counters::new(SqliteCounterRepository::new(&conn));
    counters
        .create(NewCounter::new("big", "Big").initial_value(i64::MAX))
        .unwrap();

    let err = counters.bulk_increment(["big"], None).unwrap_err();
    assert!(matches!(err, CounterError::Overflow(_)));
    assert_eq!(counters.get("big").unwrap().value, i64::MAX);
}

#[test]
fn reset_returns_to_initial_value_after_any_mutation() {
    let conn = open_db_in_memory().unwrap();
    let counters = Counters::new(SqliteCounterRepository::new(&conn));
    counters
        .create(NewCounter::new("likes", "Likes").initial_value(4))
        .unwrap();

    counters.set_value("likes", 1_000).unwrap();
    counters.set_step("likes", 9).unwrap();
    counters.increment("likes", None).unwrap();
    assert_eq!(counters.get_value("likes", None).unwrap(), 1_009);

    counters.reset("likes").unwrap();
    assert_eq!(counters.get_value("likes", None).unwrap(), 4);
}

#[test]
fn set_step_changes_default_increment() {
    let conn = open_db_in_memory().unwrap();
    let counters = Counters::new(SqliteCounterRepository::new(&conn));
    counters.create(NewCounter::new("points", "Points")).unwrap();

    assert!(counters.set_step("points", 10).unwrap());
    counters.increment("points", None).unwrap();
    counters.decrement("points", Some(3)).unwrap();

    let points = counters.get("points").unwrap();
    assert_eq!(points.step, 10);
    assert_eq!(points.value, 7);
}

#[test]
fn get_value_uses_default_only_for_missing_counters() {
    let conn = open_db_in_memory().unwrap();
    let counters = Counters::new(SqliteCounterRepository::new(&conn));

    assert_eq!(counters.get_value("missing", Some(7)).unwrap(), 7);
    let err = counters.get_value("missing", None).unwrap_err();
    assert!(matches!(err, CounterError::DoesNotExist(ref key) if key == "missing"));
}

#[test]
fn mutators_on_missing_counter_fail_with_does_not_exist() {
    let conn = open_db_in_memory().unwrap();
    let counters = Counters::new(SqliteCounterRepository::new(&conn));

    let results = [
        counters.increment("ghost", None),
        counters.decrement("ghost", Some(1)),
        counters.reset("ghost"),
        counters.set_value("ghost", 1),
        counters.set_step("ghost", 1),
        counters.delete("ghost"),
    ];
    for result in results {
        assert!(matches!(result, Err(CounterError::DoesNotExist(_))));
    }

    // Strict registry: nothing was created on the way.
    assert!(counters.get_all(None, 50).unwrap().is_empty());
}

#[test]
fn bulk_increment_records_missing_keys_as_false() {
    let conn = open_db_in_memory().unwrap();
    let counters = Counters::new(SqliteCounterRepository::new(&conn));
    counters
        .create(NewCounter::new("present", "Present").initial_value(2))
        .unwrap();

    let results = counters
        .bulk_increment(["present", "absent"], Some(1))
        .unwrap();
    assert_eq!(results.get("present"), Some(&true));
    assert_eq!(results.get("absent"), Some(&false));
    assert_eq!(counters.get_value("present", None).unwrap(), 3);

    let results = counters
        .bulk_decrement(vec!["present".to_string(), "absent".to_string()], None)
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(results["present"]);
    assert!(!results["absent"]);
    assert_eq!(counters.get_value("present", None).unwrap(), 2);
}

#[test]
fn get_all_filters_case_insensitively_and_caps_results() {
    let conn = open_db_in_memory().unwrap();
    let counters = Counters::new(SqliteCounterRepository::new(&conn));
    counters.create(NewCounter::new("post:views", "Post views")).unwrap();
    counters.create(NewCounter::new("post:likes", "Post likes")).unwrap();
    counters.create(NewCounter::new("signups", "Daily VIEWS")).unwrap();
    counters.create(NewCounter::new("100%_done", "Completion")).unwrap();

    let all = counters.get_all(None, 50).unwrap();
    let keys: Vec<&str> = all.iter().map(|counter| counter.key.as_str()).collect();
    assert_eq!(keys, ["post:views", "post:likes", "signups", "100%_done"]);

    let views = counters.get_all(Some("Views"), 50).unwrap();
    let keys: Vec<&str> = views.iter().map(|counter| counter.key.as_str()).collect();
    assert_eq!(keys, ["post:views", "signups"]);

    assert_eq!(counters.get_all(Some("post"), 1).unwrap().len(), 1);
    assert_eq!(counters.get_all(Some("%_"), 50).unwrap().len(), 1);
}

#[test]
fn get_all_folds_case_for_ascii_letters_only() {
    let conn = open_db_in_memory().unwrap();
    let counters = Counters::new(SqliteCounterRepository::new(&conn));
    counters.create(NewCounter::new("cafe", "Café visits")).unwrap();

    assert_eq!(counters.get_all(Some("café"), 50).unwrap().len(), 1);
    assert_eq!(counters.get_all(Some("CAFé"), 50).unwrap().len(), 1);
    assert!(counters.get_all(Some("CAFÉ"), 50).unwrap().is_empty());
}

#[test]
fn value_scopes_partition_counters() {
    let conn = open_db_in_memory().unwrap();
    let counters = Counters::new(SqliteCounterRepository::new(&conn));
    counters.create(NewCounter::new("zero", "Zero")).unwrap();
    counters
        .create(NewCounter::new("five", "Five").initial_value(5))
        .unwrap();
    counters
        .create(NewCounter::new("negative", "Negative").initial_value(-2))
        .unwrap();

    let keys = |list: Vec<counters_core::Counter>| -> Vec<String> {
        list.into_iter().map(|counter| counter.key).collect()
    };
    assert_eq!(keys(counters.get_active().unwrap()), ["five"]);
    assert_eq!(keys(counters.get_inactive().unwrap()), ["zero"]);
    assert_eq!(keys(counters.get_with_value_greater_than(-1).unwrap()), ["zero", "five"]);
    assert_eq!(keys(counters.get_with_value_less_than(0).unwrap()), ["negative"]);
}

#[test]
fn stats_aggregate_over_all_counters() {
    let conn = open_db_in_memory().unwrap();
    let counters = Counters::new(SqliteCounterRepository::new(&conn));

    let empty = counters.get_stats().unwrap();
    assert_eq!(empty.total_counters, 0);
    assert_eq!(empty.total_value, 0);
    assert_eq!(empty.average_value, None);
    assert_eq!(empty.max_value, None);

    counters
        .create(NewCounter::new("a", "A").initial_value(2))
        .unwrap();
    counters
        .create(NewCounter::new("b", "B").initial_value(10))
        .unwrap();
    counters
        .create(NewCounter::new("c", "C").initial_value(-3))
        .unwrap();

    let stats = counters.get_stats().unwrap();
    assert_eq!(stats.total_counters, 3);
    assert_eq!(stats.total_value, 9);
    assert_eq!(stats.average_value, Some(3.0));
    assert_eq!(stats.max_value, Some(10));
    assert_eq!(stats.min_value, Some(-3));
}

#[test]
fn delete_removes_counter() {
    let conn = open_db_in_memory().unwrap();
    let counters = Counters::new(SqliteCounterRepository::new(&conn));
    counters.create(NewCounter::new("temp", "Temp")).unwrap();

    assert!(counters.delete("temp").unwrap());
    assert!(matches!(
        counters.get("temp"),
        Err(CounterError::DoesNotExist(_))
    ));
    assert!(matches!(
        counters.delete("temp"),
        Err(CounterError::DoesNotExist(_))
    ));
}

#[test]
fn create_with_defaults_uses_configured_values() {
    let conn = open_db_in_memory().unwrap();
    let mut config = CountersConfig::default();
    config.defaults.initial_value = 100;
    config.defaults.step = 25;
    let counters = Counters::with_config(SqliteCounterRepository::new(&conn), config);

    let created = counters.create_with_defaults("quota", "Quota").unwrap();
    assert_eq!(created.initial_value, 100);
    assert_eq!(created.value, 100);
    assert_eq!(created.step, 25);

    counters.decrement("quota", None).unwrap();
    assert_eq!(counters.get_value("quota", None).unwrap(), 75);
}
