mod common;

use std::sync::atomic::Ordering;

use time::{Duration, OffsetDateTime};

use keygate_common::PermissionSet;
use keygate_core::{
    ApiKeyError, BcryptHasher, CredentialHasher, ExpiryPolicy, KeyPatch, prefix_of,
};
use keygate_storage::{KeyStore, NewApiKey, Pagination};

#[tokio::test]
async fn issue_validate_list_round_trip() {
    let (service, _store) = common::service().await;
    let issued = service
        .issue(
            1,
            "ci",
            ExpiryPolicy::Never,
            PermissionSet::from_csv("read,write"),
        )
        .await
        .unwrap();

    assert_eq!(issued.secret.len(), 64);
    assert_eq!(issued.record.prefix, issued.secret[..8]);
    assert_ne!(issued.record.secret_hash, issued.secret);
    assert_eq!(issued.record.expires_at, None);

    let validated = service.validate(&issued.secret).await.unwrap();
    assert_eq!(validated.id, issued.record.id);
    assert_eq!(validated.user_id, 1);
    assert!(validated.last_used_at.is_some());

    let stored = service.get(issued.record.id).await.unwrap();
    assert!(stored.last_used_at.is_some());

    let (keys, total) = service.list(1, Pagination::default()).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(keys[0].id, issued.record.id);
}

#[tokio::test]
async fn default_expiry_is_about_a_year_out() {
    let (service, _store) = common::service().await;
    let before = OffsetDateTime::now_utc();
    let issued = service
        .issue(1, "default", ExpiryPolicy::Default, PermissionSet::new())
        .await
        .unwrap();
    let expires_at = issued.record.expires_at.expect("default expiry");
    assert!(expires_at >= before + Duration::days(365));
    assert!(expires_at <= before + Duration::days(367));
}

#[tokio::test]
async fn expired_key_is_rejected_before_hash_check() {
    let (service, _store) = common::service().await;
    let issued = service
        .issue(
            1,
            "old",
            ExpiryPolicy::At(OffsetDateTime::now_utc() - Duration::minutes(1)),
            PermissionSet::from_csv("read"),
        )
        .await
        .unwrap();

    let err = service.validate(&issued.secret).await.unwrap_err();
    assert!(matches!(err, ApiKeyError::Expired));
}

#[tokio::test]
async fn key_expiring_now_is_already_expired() {
    let (service, _store) = common::service().await;
    let issued = service
        .issue(
            1,
            "edge",
            ExpiryPolicy::At(OffsetDateTime::now_utc()),
            PermissionSet::new(),
        )
        .await
        .unwrap();
    assert!(matches!(
        service.validate(&issued.secret).await,
        Err(ApiKeyError::Expired)
    ));
}

#[tokio::test]
async fn short_secret_fails_without_lookup() {
    let (service, store) = common::service().await;
    let err = service.validate("abc1234").await.unwrap_err();
    assert!(matches!(err, ApiKeyError::InvalidFormat));
    assert_eq!(store.lookups(), 0);
}

#[tokio::test]
async fn unknown_prefix_and_wrong_secret() {
    let (service, _store) = common::service().await;
    let issued = service
        .issue(1, "k", ExpiryPolicy::Never, PermissionSet::new())
        .await
        .unwrap();

    let err = service.validate(&"0".repeat(64)).await.unwrap_err();
    if prefix_of(&issued.secret) != Some("00000000") {
        assert!(matches!(err, ApiKeyError::NotFound));
    }

    let mut tampered = issued.secret.clone();
    let last = if tampered.ends_with('a') { "b" } else { "a" };
    tampered.replace_range(63.., last);
    assert!(matches!(
        service.validate(&tampered).await,
        Err(ApiKeyError::Invalid)
    ));
}

#[tokio::test]
async fn touch_failure_does_not_fail_validation() {
    let (service, store) = common::service().await;
    let issued = service
        .issue(1, "k", ExpiryPolicy::Never, PermissionSet::new())
        .await
        .unwrap();
    store.fail_touch.store(true, Ordering::SeqCst);

    let row = service.validate(&issued.secret).await.unwrap();
    assert_eq!(row.id, issued.record.id);
    assert_eq!(row.last_used_at, None);
}

#[tokio::test]
async fn only_the_owner_can_update_or_revoke() {
    let (service, _store) = common::service().await;
    let issued = service
        .issue(1, "mine", ExpiryPolicy::Never, PermissionSet::from_csv("read"))
        .await
        .unwrap();

    let patch = KeyPatch {
        name: Some("stolen".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        service.update(issued.record.id, 2, patch.clone()).await,
        Err(ApiKeyError::Unauthorized(_))
    ));
    assert!(matches!(
        service.revoke(issued.record.id, 2).await,
        Err(ApiKeyError::Unauthorized(_))
    ));
    assert!(matches!(
        service.update(issued.record.id + 1000, 1, patch).await,
        Err(ApiKeyError::Unauthorized(_))
    ));

    service.revoke(issued.record.id, 1).await.unwrap();
    assert!(matches!(
        service.validate(&issued.secret).await,
        Err(ApiKeyError::NotFound)
    ));
    assert!(matches!(
        service.get(issued.record.id).await,
        Err(ApiKeyError::NotFound)
    ));
    assert!(matches!(
        service.revoke(issued.record.id, 1).await,
        Err(ApiKeyError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn update_keeps_absent_fields() {
    let (service, _store) = common::service().await;
    let issued = service
        .issue(
            1,
            "orig",
            ExpiryPolicy::Default,
            PermissionSet::from_csv("read"),
        )
        .await
        .unwrap();

    let renamed = service
        .update(
            issued.record.id,
            1,
            KeyPatch {
                name: Some("renamed".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "renamed");
    assert_eq!(renamed.permissions, PermissionSet::from_csv("read"));
    assert!(renamed.expires_at.is_some());

    let cleared = service
        .update(
            issued.record.id,
            1,
            KeyPatch {
                permissions: Some(PermissionSet::from_csv("*")),
                expires_at: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.name, "renamed");
    assert!(cleared.permissions.is_wildcard());
    assert_eq!(cleared.expires_at, None);
    assert_eq!(cleared.prefix, issued.record.prefix);
}

#[tokio::test]
async fn repeated_validation_is_stable() {
    let (service, store) = common::service().await;
    let issued = service
        .issue(3, "k", ExpiryPolicy::Never, PermissionSet::from_csv("a,b"))
        .await
        .unwrap();

    let first = service.validate(&issued.secret).await.unwrap();
    let second = service.validate(&issued.secret).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(first.permissions, second.permissions);
    assert_eq!(first.name, second.name);
    assert_eq!(store.lookups(), 2);

    let stored = store.find_api_key(first.id).await.unwrap().unwrap();
    assert!(stored.last_used_at >= first.last_used_at);
}

const SHARED_PREFIX: &str = "c0ffee00";

fn colliding_secret(tail: char) -> String {
    format!("{SHARED_PREFIX}{}", tail.to_string().repeat(56))
}

fn colliding_key(user_id: i64, secret: &str, expires_at: Option<OffsetDateTime>) -> NewApiKey {
    NewApiKey {
        user_id,
        name: format!("collide-{user_id}"),
        secret_hash: BcryptHasher::new(4).hash(secret).unwrap(),
        prefix: SHARED_PREFIX.to_string(),
        permissions: PermissionSet::new(),
        expires_at,
    }
}

#[tokio::test]
async fn shared_prefix_matches_the_right_candidate() {
    let (service, store) = common::service().await;
    let first = colliding_secret('1');
    let second = colliding_secret('2');
    store
        .insert_api_key(colliding_key(1, &first, None))
        .await
        .unwrap();
    let wanted = store
        .insert_api_key(colliding_key(2, &second, None))
        .await
        .unwrap();

    let row = service.validate(&second).await.unwrap();
    assert_eq!(row.id, wanted.id);
    assert_eq!(row.user_id, 2);

    let stranger = colliding_secret('3');
    assert!(matches!(
        service.validate(&stranger).await,
        Err(ApiKeyError::Invalid)
    ));
}

#[tokio::test]
async fn expired_candidates_are_skipped_when_a_live_one_matches() {
    let (service, store) = common::service().await;
    let past = OffsetDateTime::now_utc() - Duration::hours(1);
    let stale = colliding_secret('a');
    let live = colliding_secret('b');
    store
        .insert_api_key(colliding_key(1, &stale, Some(past)))
        .await
        .unwrap();
    let wanted = store
        .insert_api_key(colliding_key(2, &live, None))
        .await
        .unwrap();

    let row = service.validate(&live).await.unwrap();
    assert_eq!(row.id, wanted.id);

    assert!(matches!(
        service.validate(&stale).await,
        Err(ApiKeyError::Invalid)
    ));
}

#[tokio::test]
async fn every_candidate_expired_is_reported_as_expired() {
    let (service, store) = common::service().await;
    let past = OffsetDateTime::now_utc() - Duration::minutes(5);
    let first = colliding_secret('d');
    let second = colliding_secret('e');
    for (user_id, secret) in [(1, &first), (2, &second)] {
        store
            .insert_api_key(colliding_key(user_id, secret, Some(past)))
            .await
            .unwrap();
    }

    assert!(matches!(
        service.validate(&second).await,
        Err(ApiKeyError::Expired)
    ));
    assert!(matches!(
        service.validate(&colliding_secret('f')).await,
        Err(ApiKeyError::Expired)
    ));
}
