//! Ownership checks on delete and per-identity upload throttling.

use std::sync::Arc;
use std::time::Duration;

use agv_core::FileObject;
use agv_crypto::{KdfParams, PackageCipher};
use agv_storage::{memory_operator, BlobStore, MemoryMetadataStore};
use agv_vault::{
    FileValidator, ManualClock, RateLimitConfig, RateLimiter, ValidationError, Vault, VaultError,
};
use opendal::Operator;
use secrecy::SecretString;

const FAST_KDF: KdfParams = KdfParams::Pbkdf2Sha256 { iterations: 1_000 };

fn vault_with_clock(
    max_uploads: usize,
    window: Duration,
) -> (Vault<Operator, MemoryMetadataStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let vault = Vault::from_parts(
        memory_operator().expect("memory operator"),
        MemoryMetadataStore::new(),
        PackageCipher::new(FAST_KDF),
        FileValidator::default(),
        RateLimiter::with_clock(
            RateLimitConfig {
                max_uploads,
                window,
            },
            clock.clone(),
        ),
    );
    (vault, clock)
}

fn pw() -> SecretString {
    SecretString::from("pw".to_string())
}

fn jpeg() -> FileObject {
    FileObject::new(
        "harvest.jpg",
        "image/jpeg",
        vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'],
    )
}

#[tokio::test]
async fn owner_can_delete() {
    let (vault, _) = vault_with_clock(5, Duration::from_secs(60));
    let receipt = vault.upload_file(&jpeg(), "alice", "kyc", &pw()).await.unwrap();

    vault.delete_file(&receipt.file_id, "alice").await.unwrap();

    assert!(vault.metadata().is_empty().await);
    assert!(matches!(
        vault.blobs().get(&receipt.storage_path).await,
        Err(agv_core::StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn non_owner_delete_is_refused_and_changes_nothing() {
    let (vault, _) = vault_with_clock(5, Duration::from_secs(60));
    let receipt = vault.upload_file(&jpeg(), "alice", "kyc", &pw()).await.unwrap();

    let err = vault.delete_file(&receipt.file_id, "mallory").await.unwrap_err();
    match err {
        VaultError::Unauthorized { file_id } => assert_eq!(file_id, receipt.file_id),
        other => panic!("expected Unauthorized, got {other:?}"),
    }

    assert_eq!(vault.metadata().len().await, 1);
    assert!(vault.blobs().get(&receipt.storage_path).await.is_ok());
}

#[tokio::test]
async fn delete_of_unknown_id_is_not_found() {
    let (vault, _) = vault_with_clock(5, Duration::from_secs(60));
    let err = vault.delete_file("missing", "alice").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn sixth_upload_in_a_minute_is_rate_limited() {
    let (vault, clock) = vault_with_clock(5, Duration::from_secs(60));

    for _ in 0..5 {
        vault.upload_file(&jpeg(), "alice", "kyc", &pw()).await.unwrap();
        clock.advance(Duration::from_secs(2));
    }

    let err = vault.upload_file(&jpeg(), "alice", "kyc", &pw()).await.unwrap_err();
    match err {
        VaultError::RateLimited { retry_after } => {
            assert_eq!(retry_after, Duration::from_secs(50));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
    assert_eq!(vault.metadata().len().await, 5);

    // another identity is unaffected
    vault.upload_file(&jpeg(), "bob", "kyc", &pw()).await.unwrap();

    clock.advance(Duration::from_secs(50));
    vault.upload_file(&jpeg(), "alice", "kyc", &pw()).await.unwrap();
}

#[tokio::test]
async fn rejected_validation_does_not_consume_quota() {
    let (vault, _) = vault_with_clock(1, Duration::from_secs(60));
    let bad = FileObject::new("notes.txt", "text/plain", b"hello".to_vec());

    for _ in 0..3 {
        let err = vault.upload_file(&bad, "alice", "kyc", &pw()).await.unwrap_err();
        assert!(matches!(
            err,
            VaultError::Validation(ValidationError::UnsupportedType(_))
        ));
    }

    vault.upload_file(&jpeg(), "alice", "kyc", &pw()).await.unwrap();
}

#[tokio::test]
async fn rate_limit_is_checked_before_validation() {
    let (vault, _) = vault_with_clock(1, Duration::from_secs(60));
    vault.upload_file(&jpeg(), "alice", "kyc", &pw()).await.unwrap();

    let bad = FileObject::new("notes.txt", "text/plain", b"hello".to_vec());
    let err = vault.upload_file(&bad, "alice", "kyc", &pw()).await.unwrap_err();
    assert!(matches!(err, VaultError::RateLimited { .. }));
}

#[tokio::test]
async fn concurrent_uploads_cannot_exceed_limit() {
    let (vault, _) = vault_with_clock(3, Duration::from_secs(60));
    let vault = Arc::new(vault);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let vault = vault.clone();
        tasks.push(tokio::spawn(async move {
            vault.upload_file(&jpeg(), "alice", "kyc", &pw()).await
        }));
    }

    let mut ok = 0;
    let mut limited = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => ok += 1,
            Err(VaultError::RateLimited { .. }) => limited += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(ok, 3);
    assert_eq!(limited, 5);
    assert_eq!(BlobStore::list(vault.blobs(), "alice").await.unwrap().len(), 3);
}
