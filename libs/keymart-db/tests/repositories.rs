use keymart_db::MIGRATOR;
use keymart_db::crypto::FieldCipher;
use keymart_db::flows::{self, AddOutcome, ApproveOutcome, CodeOutcome, EditOutcome, RejectOutcome};
use keymart_db::models::{ConversationState, EditableField, Product};
use keymart_db::repositories::{
    DialogRepository, LanguageRepository, PendingRepository, ProductRepository,
};
use keymart_db::sqlx::sqlite::SqlitePoolOptions;
use keymart_db::sqlx::{Row, SqlitePool};

// A single connection keeps every query on the same in-memory database.
async fn setup() -> (SqlitePool, FieldCipher) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    MIGRATOR.run(&pool).await.unwrap();
    let cipher = FieldCipher::from_base64(&FieldCipher::generate_key().unwrap()).unwrap();
    (pool, cipher)
}

fn sample_product() -> Product {
    Product {
        price: "15 USD".to_string(),
        username: "alice@example.com".to_string(),
        password: "hunter2".to_string(),
        secret: "GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ".to_string(),
        name: Some("Prime Account".to_string()),
        buyers: vec![],
    }
}

#[tokio::test]
async fn product_roundtrip_and_encryption_at_rest() {
    let (pool, cipher) = setup().await;
    let repo = ProductRepository::new(pool.clone(), cipher);

    repo.upsert("p1", &sample_product()).await.unwrap();

    let fetched = repo.get("p1").await.unwrap().unwrap();
    assert_eq!(fetched.username, "alice@example.com");
    assert_eq!(fetched.password, "hunter2");
    assert_eq!(fetched.name.as_deref(), Some("Prime Account"));

    // Raw columns must not contain the plaintext.
    let row = keymart_db::sqlx::query("SELECT username, password, secret FROM products WHERE id = 'p1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    let raw_username: String = row.try_get("username").unwrap();
    let raw_password: String = row.try_get("password").unwrap();
    assert_ne!(raw_username, "alice@example.com");
    assert_ne!(raw_password, "hunter2");
}

#[tokio::test]
async fn list_is_ordered_and_missing_get_is_none() {
    let (pool, cipher) = setup().await;
    let repo = ProductRepository::new(pool, cipher);

    repo.upsert("zz", &sample_product()).await.unwrap();
    repo.upsert("aa", &sample_product()).await.unwrap();

    let all = repo.list().await.unwrap();
    let ids: Vec<&str> = all.keys().map(String::as_str).collect();
    assert_eq!(ids, vec!["aa", "zz"]);
    assert!(repo.get("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn update_field_encrypts_credentials_but_not_price() {
    let (pool, cipher) = setup().await;
    let repo = ProductRepository::new(pool.clone(), cipher);
    repo.upsert("p1", &sample_product()).await.unwrap();

    repo.update_field("p1", EditableField::Price, "20 USD")
        .await
        .unwrap();
    repo.update_field("p1", EditableField::Password, "correct horse")
        .await
        .unwrap();

    let row = keymart_db::sqlx::query("SELECT price, password FROM products WHERE id = 'p1'")
        .fetch_one(&pool)
        .await
        .unwrap();
    let raw_price: String = row.try_get("price").unwrap();
    let raw_password: String = row.try_get("password").unwrap();
    assert_eq!(raw_price, "20 USD");
    assert_ne!(raw_password, "correct horse");

    let fetched = repo.get("p1").await.unwrap().unwrap();
    assert_eq!(fetched.price, "20 USD");
    assert_eq!(fetched.password, "correct horse");
}

#[tokio::test]
async fn clearing_name_with_empty_value() {
    let (pool, cipher) = setup().await;
    let repo = ProductRepository::new(pool, cipher);
    repo.upsert("p1", &sample_product()).await.unwrap();

    repo.update_field("p1", EditableField::Name, "")
        .await
        .unwrap();
    let fetched = repo.get("p1").await.unwrap().unwrap();
    assert_eq!(fetched.name, None);
}

#[tokio::test]
async fn buyers_are_idempotent_and_survive_updates() {
    let (pool, cipher) = setup().await;
    let repo = ProductRepository::new(pool, cipher);
    repo.upsert("p1", &sample_product()).await.unwrap();

    repo.add_buyer("p1", 42).await.unwrap();
    repo.add_buyer("p1", 42).await.unwrap();
    repo.add_buyer("p1", 7).await.unwrap();
    assert_eq!(repo.get("p1").await.unwrap().unwrap().buyers, vec![42, 7]);

    repo.remove_buyer("p1", 42).await.unwrap();
    assert_eq!(repo.get("p1").await.unwrap().unwrap().buyers, vec![7]);

    repo.clear_buyers("p1").await.unwrap();
    assert!(repo.get("p1").await.unwrap().unwrap().buyers.is_empty());

    // Adding a buyer to a missing product is a no-op, not an error.
    repo.add_buyer("ghost", 1).await.unwrap();
    assert!(repo.get("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn tolerant_decrypt_empties_undecryptable_fields() {
    let (pool, _) = setup().await;
    let writer = ProductRepository::new(
        pool.clone(),
        FieldCipher::from_base64(&FieldCipher::generate_key().unwrap()).unwrap(),
    );
    writer.upsert("p1", &sample_product()).await.unwrap();

    // A repository holding a different key cannot decrypt those rows.
    let reader = ProductRepository::new(
        pool,
        FieldCipher::from_base64(&FieldCipher::generate_key().unwrap()).unwrap(),
    );
    let fetched = reader.get("p1").await.unwrap().unwrap();
    assert_eq!(fetched.username, "");
    assert_eq!(fetched.password, "");
    assert_eq!(fetched.secret, "");
    assert_eq!(fetched.price, "15 USD");
}

#[tokio::test]
async fn pending_replaces_and_removes_by_exact_pair() {
    let (pool, _) = setup().await;
    let repo = PendingRepository::new(pool);

    repo.add(100, "p1").await.unwrap();
    repo.add(100, "p2").await.unwrap();
    let all = repo.list().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].product_id, "p2");

    // Removing with the wrong product id must leave the row alone.
    repo.remove(100, "p1").await.unwrap();
    assert!(repo.find_by_user(100).await.unwrap().is_some());

    repo.remove(100, "p2").await.unwrap();
    assert!(repo.find_by_user(100).await.unwrap().is_none());
}

#[tokio::test]
async fn approve_removes_ledger_row_and_records_buyer() {
    let (pool, cipher) = setup().await;
    let products = ProductRepository::new(pool.clone(), cipher);
    let pending = PendingRepository::new(pool);
    products.upsert("p1", &sample_product()).await.unwrap();
    pending.add(42, "p1").await.unwrap();

    match flows::approve_purchase(&pending, &products, 42, "p1")
        .await
        .unwrap()
    {
        ApproveOutcome::Approved(product) => assert_eq!(product.username, "alice@example.com"),
        other => panic!("expected approval, got {other:?}"),
    }
    assert!(pending.find_by_user(42).await.unwrap().is_none());
    assert_eq!(products.get("p1").await.unwrap().unwrap().buyers, vec![42]);

    // The row is gone, so a second approval is a mismatch.
    assert_eq!(
        flows::approve_purchase(&pending, &products, 42, "p1")
            .await
            .unwrap(),
        ApproveOutcome::Mismatch
    );
}

#[tokio::test]
async fn approve_with_mismatched_product_changes_nothing() {
    let (pool, cipher) = setup().await;
    let products = ProductRepository::new(pool.clone(), cipher);
    let pending = PendingRepository::new(pool);
    products.upsert("p1", &sample_product()).await.unwrap();
    products.upsert("p2", &sample_product()).await.unwrap();
    pending.add(42, "p1").await.unwrap();

    assert_eq!(
        flows::approve_purchase(&pending, &products, 42, "p2")
            .await
            .unwrap(),
        ApproveOutcome::Mismatch
    );

    // Ledger row and buyer sets are untouched.
    let row = pending.find_by_user(42).await.unwrap().unwrap();
    assert_eq!(row.product_id, "p1");
    assert!(products.get("p1").await.unwrap().unwrap().buyers.is_empty());
    assert!(products.get("p2").await.unwrap().unwrap().buyers.is_empty());
}

#[tokio::test]
async fn reject_removes_the_row_without_recording_a_buyer() {
    let (pool, cipher) = setup().await;
    let products = ProductRepository::new(pool.clone(), cipher);
    let pending = PendingRepository::new(pool);
    products.upsert("p1", &sample_product()).await.unwrap();
    pending.add(7, "p1").await.unwrap();

    assert_eq!(
        flows::reject_purchase(&pending, 7, "other").await.unwrap(),
        RejectOutcome::Mismatch
    );
    assert!(pending.find_by_user(7).await.unwrap().is_some());

    assert_eq!(
        flows::reject_purchase(&pending, 7, "p1").await.unwrap(),
        RejectOutcome::Rejected
    );
    assert!(pending.find_by_user(7).await.unwrap().is_none());
    assert!(products.get("p1").await.unwrap().unwrap().buyers.is_empty());
}

#[tokio::test]
async fn code_generation_denial_cases() {
    let (pool, cipher) = setup().await;
    let products = ProductRepository::new(pool, cipher);
    products.upsert("p1", &sample_product()).await.unwrap();
    products.add_buyer("p1", 42).await.unwrap();

    // Buyers get a six digit code; strangers are turned away.
    match flows::request_code(&products, 42, "p1", false).await.unwrap() {
        CodeOutcome::Code(code) => {
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
        other => panic!("expected a code, got {other:?}"),
    }
    assert_eq!(
        flows::request_code(&products, 99, "p1", false).await.unwrap(),
        CodeOutcome::NotBuyer
    );
    // The admin path bypasses the buyer check.
    assert!(matches!(
        flows::request_code(&products, 99, "p1", true).await.unwrap(),
        CodeOutcome::Code(_)
    ));

    let no_secret = Product {
        secret: String::new(),
        ..sample_product()
    };
    products.upsert("bare", &no_secret).await.unwrap();
    products.add_buyer("bare", 42).await.unwrap();
    assert_eq!(
        flows::request_code(&products, 42, "bare", false).await.unwrap(),
        CodeOutcome::EmptySecret
    );

    let bad_secret = Product {
        secret: "not!base32".to_string(),
        ..sample_product()
    };
    products.upsert("bad", &bad_secret).await.unwrap();
    products.add_buyer("bad", 42).await.unwrap();
    assert_eq!(
        flows::request_code(&products, 42, "bad", false).await.unwrap(),
        CodeOutcome::InvalidSecret
    );

    assert_eq!(
        flows::request_code(&products, 42, "ghost", false).await.unwrap(),
        CodeOutcome::ProductNotFound("ghost".to_string())
    );
}

#[tokio::test]
async fn add_flow_walks_every_step_and_commits() {
    let (pool, cipher) = setup().await;
    let products = ProductRepository::new(pool.clone(), cipher);
    let dialogs = DialogRepository::new(pool);

    assert_eq!(
        flows::advance_add(&dialogs, &products, 5, "anything")
            .await
            .unwrap(),
        AddOutcome::NotActive
    );

    dialogs.start_add(5).await.unwrap();
    for input in ["p9", "30 USD", "bob", "pw", "SECRET234"] {
        let outcome = flows::advance_add(&dialogs, &products, 5, input)
            .await
            .unwrap();
        assert!(matches!(outcome, AddOutcome::Prompt(_)), "{outcome:?}");
    }
    assert_eq!(
        flows::advance_add(&dialogs, &products, 5, "-").await.unwrap(),
        AddOutcome::Committed("p9".to_string())
    );

    let product = products.get("p9").await.unwrap().unwrap();
    assert_eq!(product.price, "30 USD");
    assert_eq!(product.username, "bob");
    assert_eq!(product.name, None);
    assert!(dialogs.state(5).await.unwrap().is_none());
}

#[tokio::test]
async fn add_flow_dash_secret_stores_no_secret() {
    let (pool, cipher) = setup().await;
    let products = ProductRepository::new(pool.clone(), cipher);
    let dialogs = DialogRepository::new(pool);

    dialogs.start_add(6).await.unwrap();
    for input in ["plain", "5 USD", "carol", "pw", "-"] {
        flows::advance_add(&dialogs, &products, 6, input)
            .await
            .unwrap();
    }
    flows::advance_add(&dialogs, &products, 6, "-").await.unwrap();

    let product = products.get("plain").await.unwrap().unwrap();
    assert_eq!(product.secret, "");
    assert_eq!(product.name, None);
    assert_eq!(
        flows::request_code(&products, 6, "plain", true).await.unwrap(),
        CodeOutcome::EmptySecret
    );
}

#[tokio::test]
async fn add_flow_duplicate_id_writes_nothing_and_clears() {
    let (pool, cipher) = setup().await;
    let products = ProductRepository::new(pool.clone(), cipher);
    let dialogs = DialogRepository::new(pool);
    products.upsert("taken", &sample_product()).await.unwrap();

    dialogs.start_add(9).await.unwrap();
    for input in ["taken", "1 USD", "x", "y", "z"] {
        flows::advance_add(&dialogs, &products, 9, input)
            .await
            .unwrap();
    }
    assert_eq!(
        flows::advance_add(&dialogs, &products, 9, "New Name")
            .await
            .unwrap(),
        AddOutcome::Duplicate("taken".to_string())
    );

    // Original row untouched, flow gone.
    let kept = products.get("taken").await.unwrap().unwrap();
    assert_eq!(kept.username, "alice@example.com");
    assert!(dialogs.state(9).await.unwrap().is_none());
}

#[tokio::test]
async fn starting_a_new_flow_replaces_the_old_one() {
    let (pool, _) = setup().await;
    let dialogs = DialogRepository::new(pool);

    dialogs.start_add(3).await.unwrap();
    dialogs.start_edit(3, "p1", "price").await.unwrap();
    match dialogs.state(3).await.unwrap() {
        Some(ConversationState::EditingField(flow)) => {
            assert_eq!(flow.product_id, "p1");
            assert_eq!(flow.field, "price");
        }
        other => panic!("expected edit flow, got {other:?}"),
    }
}

#[tokio::test]
async fn edit_flow_clears_state_on_every_outcome() {
    let (pool, cipher) = setup().await;
    let products = ProductRepository::new(pool.clone(), cipher);
    let dialogs = DialogRepository::new(pool);
    products.upsert("p1", &sample_product()).await.unwrap();

    dialogs.start_edit(8, "p1", "price").await.unwrap();
    assert_eq!(
        flows::apply_edit(&dialogs, &products, 8, "99 USD")
            .await
            .unwrap(),
        EditOutcome::Updated {
            product_id: "p1".to_string(),
            field: EditableField::Price,
        }
    );
    assert!(dialogs.state(8).await.unwrap().is_none());
    assert_eq!(products.get("p1").await.unwrap().unwrap().price, "99 USD");

    dialogs.start_edit(8, "p1", "buyers").await.unwrap();
    assert_eq!(
        flows::apply_edit(&dialogs, &products, 8, "whatever")
            .await
            .unwrap(),
        EditOutcome::InvalidField("buyers".to_string())
    );
    assert!(dialogs.state(8).await.unwrap().is_none());

    dialogs.start_edit(8, "ghost", "price").await.unwrap();
    assert_eq!(
        flows::apply_edit(&dialogs, &products, 8, "1 USD")
            .await
            .unwrap(),
        EditOutcome::ProductNotFound("ghost".to_string())
    );
    assert!(dialogs.state(8).await.unwrap().is_none());
}

#[tokio::test]
async fn language_defaults_and_overrides() {
    let (pool, _) = setup().await;
    let repo = LanguageRepository::new(pool);

    assert_eq!(repo.get(1).await.unwrap(), "en");
    repo.set(1, "fa").await.unwrap();
    repo.set(1, "en").await.unwrap();
    assert_eq!(repo.get(1).await.unwrap(), "en");
    repo.set(2, "fa").await.unwrap();
    assert_eq!(repo.list().await.unwrap().len(), 2);
}
