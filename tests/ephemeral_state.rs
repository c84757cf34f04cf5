use std::sync::Arc;
use std::time::Duration;

use chrono::TimeDelta;
use futures_util::future::join_all;
use storefront_backend::cache::{CacheAside, TtlCache};
use storefront_backend::clock::ManualClock;
use storefront_backend::credentials::issuer::generate_token;
use storefront_backend::credentials::{
    CredentialStore, InMemoryBackend, Purpose, RejectReason, is_valid_format,
};

struct Harness {
    clock: Arc<ManualClock>,
    backend: Arc<InMemoryBackend>,
    store: Arc<CredentialStore>,
}

fn harness() -> Harness {
    let clock = Arc::new(ManualClock::starting_now());
    let backend = Arc::new(InMemoryBackend::new());
    let store = Arc::new(CredentialStore::new(backend.clone(), clock.clone()));
    Harness {
        clock,
        backend,
        store,
    }
}

#[test]
fn cache_entries_expire_after_their_ttl() {
    let clock = Arc::new(ManualClock::starting_now());
    let cache: TtlCache = TtlCache::new(clock.clone());

    cache.set("post:id:1", serde_json::json!({"title": "hello"}), Duration::from_secs(30));
    assert_eq!(
        cache.get("post:id:1"),
        Some(serde_json::json!({"title": "hello"}))
    );

    clock.advance(TimeDelta::seconds(29));
    assert!(cache.get("post:id:1").is_some());

    clock.advance(TimeDelta::seconds(1));
    assert!(cache.get("post:id:1").is_none());
}

#[test]
fn pattern_invalidation_only_touches_its_family() {
    let cache: TtlCache = TtlCache::with_system_clock();
    let ttl = Duration::from_secs(60);
    cache.set("a:1", serde_json::json!(1), ttl);
    cache.set("a:2", serde_json::json!(2), ttl);
    cache.set("b:1", serde_json::json!(3), ttl);
    cache.set("ab:1", serde_json::json!(4), ttl);

    assert_eq!(cache.invalidate_pattern("a:.*"), 2);
    assert!(cache.get("a:1").is_none());
    assert!(cache.get("a:2").is_none());
    assert_eq!(cache.get("b:1"), Some(serde_json::json!(3)));
    assert_eq!(cache.get("ab:1"), Some(serde_json::json!(4)));
}

#[tokio::test]
async fn failing_loader_does_not_poison_the_cache() {
    let aside = CacheAside::new(TtlCache::with_system_clock(), Duration::from_secs(60));

    let failed = aside
        .get_or_load_default::<Vec<String>, _, _, _>("product:category:books", || async {
            Err("connection reset")
        })
        .await;
    assert_eq!(failed.unwrap_err(), "connection reset");
    assert!(aside.stats().keys.is_empty());

    let loaded = aside
        .get_or_load_default("product:category:books", || async {
            Ok::<_, &str>(vec!["Rust 编程".to_string()])
        })
        .await
        .unwrap();
    assert_eq!(loaded, vec!["Rust 编程".to_string()]);
    assert_eq!(aside.stats().keys, vec!["product:category:books".to_string()]);
}

#[tokio::test]
async fn generated_tokens_are_distinct_and_well_formed() {
    let mut seen = std::collections::HashSet::new();
    for _ in 0..10_000 {
        let token = generate_token();
        assert!(is_valid_format(&token));
        assert!(seen.insert(token));
    }

    let h = harness();
    let almost = "a".repeat(63);
    let upper = "A".repeat(64);
    for malformed in [almost.as_str(), upper.as_str(), ""] {
        let validation = h
            .store
            .validate(malformed, Purpose::PasswordReset)
            .await
            .unwrap();
        assert!(!validation.valid);
        assert_eq!(validation.reason, Some(RejectReason::NotFound));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_consumers_see_exactly_one_success() {
    const RACERS: usize = 32;

    let h = harness();
    let issued = h
        .store
        .issue("user-1", Purpose::PasswordReset, TimeDelta::hours(1))
        .await
        .unwrap();

    let attempts = (0..RACERS).map(|_| {
        let store = h.store.clone();
        let value = issued.value.clone();
        tokio::spawn(async move {
            store
                .validate_and_consume(&value, Purpose::PasswordReset)
                .await
        })
    });
    let outcomes: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let winners: Vec<_> = outcomes.iter().filter(|o| o.success).collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].subject.as_deref(), Some("user-1"));
    assert!(
        outcomes
            .iter()
            .filter(|o| !o.success)
            .all(|o| o.reason == Some(RejectReason::AlreadyUsed))
    );
}

#[tokio::test]
async fn unconsumed_token_past_deadline_reports_expired() {
    let h = harness();
    let issued = h
        .store
        .issue("user-1", Purpose::PasswordReset, TimeDelta::hours(1))
        .await
        .unwrap();

    h.clock.advance(TimeDelta::hours(1) + TimeDelta::seconds(1));

    let validation = h
        .store
        .validate(&issued.value, Purpose::PasswordReset)
        .await
        .unwrap();
    assert!(!validation.valid);
    assert_eq!(validation.reason, Some(RejectReason::Expired));

    let consumption = h
        .store
        .validate_and_consume(&issued.value, Purpose::PasswordReset)
        .await
        .unwrap();
    assert!(!consumption.success);
    assert_eq!(consumption.reason, Some(RejectReason::Expired));
}

#[tokio::test]
async fn cleanup_removes_only_expired_tokens() {
    let h = harness();
    let short = h
        .store
        .issue("user-1", Purpose::PasswordReset, TimeDelta::minutes(10))
        .await
        .unwrap();
    let long = h
        .store
        .issue("user-2", Purpose::PasswordReset, TimeDelta::hours(2))
        .await
        .unwrap();

    h.clock.advance(TimeDelta::minutes(11));
    assert_eq!(h.store.cleanup_expired().await.unwrap(), 1);
    assert_eq!(h.store.cleanup_expired().await.unwrap(), 0);
    assert_eq!(h.backend.len(), 1);

    let gone = h
        .store
        .validate(&short.value, Purpose::PasswordReset)
        .await
        .unwrap();
    assert_eq!(gone.reason, Some(RejectReason::NotFound));
    assert!(
        h.store
            .validate(&long.value, Purpose::PasswordReset)
            .await
            .unwrap()
            .valid
    );
}

#[tokio::test]
async fn reset_token_lifecycle() {
    let h = harness();
    let issued = h
        .store
        .issue("user-42", Purpose::PasswordReset, TimeDelta::hours(1))
        .await
        .unwrap();

    h.clock.advance(TimeDelta::minutes(30));
    let first = h
        .store
        .validate_and_consume(&issued.value, Purpose::PasswordReset)
        .await
        .unwrap();
    assert!(first.success);
    assert_eq!(first.subject.as_deref(), Some("user-42"));

    h.clock.advance(TimeDelta::minutes(1));
    let replay = h
        .store
        .validate_and_consume(&issued.value, Purpose::PasswordReset)
        .await
        .unwrap();
    assert!(!replay.success);
    assert_eq!(replay.reason, Some(RejectReason::AlreadyUsed));

    h.clock.advance(TimeDelta::minutes(89));
    assert_eq!(h.store.cleanup_expired().await.unwrap(), 1);
    assert!(h.backend.is_empty());
}

#[tokio::test]
async fn verification_code_locks_after_too_many_guesses() {
    let h = harness();
    let store = CredentialStore::new(h.backend.clone(), h.clock.clone()).with_max_code_attempts(3);
    let issued = store
        .issue_code("someone@example.com", Purpose::EmailVerify, TimeDelta::minutes(15))
        .await
        .unwrap();
    let wrong = if issued.value == "000000" {
        "000001"
    } else {
        "000000"
    };

    for _ in 0..3 {
        let outcome = store
            .verify_code("someone@example.com", Purpose::EmailVerify, wrong)
            .await
            .unwrap();
        assert_eq!(outcome.reason, Some(RejectReason::NotFound));
    }

    let locked = store
        .verify_code("someone@example.com", Purpose::EmailVerify, &issued.value)
        .await
        .unwrap();
    assert!(!locked.success);
    assert_eq!(locked.reason, Some(RejectReason::TooManyAttempts));
}
