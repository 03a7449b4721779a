#![allow(clippy::unwrap_used)]
// Tests for `FirebaseClient` against a mocked REST surface.

use chrono::{Duration, Utc};
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{
    bearer_token, body_partial_json, body_string_contains, header, method, path, query_param,
    query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bangun_rumah_app::backend::{
    AuthService, AuthSession, AuthUser, BackendError, FileStore, ProductStore, StoredFile, Token,
    UserStore,
};
use bangun_rumah_app::config::FirebaseConfig;
use bangun_rumah_app::firebase::{Endpoints, FirebaseClient};
use bangun_rumah_core::{ProductId, ProductRecord, UserId, UserRecord};

const BUCKET: &str = "bangunrumah.appspot.com";
const DOCUMENTS: &str = "/projects/bangunrumah/databases/(default)/documents";

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, FirebaseClient) {
    let server = MockServer::start().await;
    let config = FirebaseConfig {
        api_key: SecretString::from("test-key"),
        project_id: "bangunrumah".to_string(),
        storage_bucket: BUCKET.to_string(),
    };
    let endpoints = Endpoints {
        identity_toolkit: server.uri(),
        secure_token: server.uri(),
        firestore: server.uri(),
        storage: server.uri(),
    };
    let client = FirebaseClient::with_endpoints(&config, endpoints).unwrap();
    (server, client)
}

fn token() -> Token {
    Token::new("id-1")
}

fn document(collection: &str, id: &str, name: &str) -> serde_json::Value {
    json!({
        "name": format!("projects/bangunrumah/databases/(default)/documents/{collection}/{id}"),
        "fields": {
            "name": { "stringValue": name },
            "price": { "stringValue": "68000" },
            "unit": { "stringValue": "sak" }
        }
    })
}

fn google_error(code: u16, message: &str) -> serde_json::Value {
    json!({ "error": { "code": code, "message": message, "errors": [] } })
}

// ── Authentication ──────────────────────────────────────────────────

#[tokio::test]
async fn test_sign_in_returns_session() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/accounts:signInWithPassword"))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "email": "admin@toko.id",
            "password": "rahasia1",
            "returnSecureToken": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "localId": "uid-1",
            "email": "admin@toko.id",
            "idToken": "id-1",
            "refreshToken": "refresh-1",
            "expiresIn": "3600"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = client
        .sign_in("admin@toko.id", &SecretString::from("rahasia1"))
        .await
        .unwrap();

    assert_eq!(session.user.uid, UserId::new("uid-1"));
    assert_eq!(session.id_token.expose(), "id-1");
    assert_eq!(session.refresh_token.expose(), "refresh-1");
    assert!(session.expires_at > Utc::now() + Duration::minutes(59));
}

#[tokio::test]
async fn test_sign_in_error_message_is_kept_verbatim() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/accounts:signInWithPassword"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(google_error(400, "INVALID_LOGIN_CREDENTIALS")),
        )
        .mount(&server)
        .await;

    let result = client
        .sign_in("admin@toko.id", &SecretString::from("salah"))
        .await;

    assert!(
        matches!(&result, Err(BackendError::Auth(m)) if m == "INVALID_LOGIN_CREDENTIALS"),
        "expected Auth error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_sign_up_reports_existing_email() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/accounts:signUp"))
        .respond_with(ResponseTemplate::new(400).set_body_json(google_error(400, "EMAIL_EXISTS")))
        .mount(&server)
        .await;

    let result = client
        .sign_up("admin@toko.id", &SecretString::from("rahasia1"))
        .await;

    assert!(matches!(&result, Err(BackendError::Auth(m)) if m == "EMAIL_EXISTS"));
}

#[tokio::test]
async fn test_refresh_exchanges_refresh_token() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(query_param("key", "test-key"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "expires_in": "3600",
            "token_type": "Bearer",
            "refresh_token": "refresh-1",
            "id_token": "id-2",
            "user_id": "uid-1",
            "project_id": "1234"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = AuthSession {
        user: AuthUser {
            uid: UserId::new("uid-1"),
            email: "admin@toko.id".to_string(),
        },
        id_token: Token::new("id-1"),
        refresh_token: Token::new("refresh-1"),
        expires_at: Utc::now() + Duration::minutes(2),
    };
    let refreshed = client.refresh(&session).await.unwrap();

    assert_eq!(refreshed.id_token.expose(), "id-2");
    assert_eq!(refreshed.user.email, "admin@toko.id");
    assert!(refreshed.expires_at > session.expires_at);
}

// ── Products ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_follows_page_tokens() {
    let (server, client) = setup().await;
    let products = format!("{DOCUMENTS}/products");

    Mock::given(method("GET"))
        .and(path(products.as_str()))
        .and(bearer_token("id-1"))
        .and(query_param("pageSize", "300"))
        .and(query_param_is_missing("pageToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [document("products", "p1", "Semen Tiga Roda 50kg")],
            "nextPageToken": "page-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(products.as_str()))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "documents": [document("products", "p2", "Pasir Beton")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let listed = client.list(&token()).await.unwrap();

    let ids: Vec<&str> = listed.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["p1", "p2"]);
    assert_eq!(listed[1].record.name, "Pasir Beton");
    assert_eq!(listed[0].record.category, "");
}

#[tokio::test]
async fn test_list_without_permission_is_denied() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("{DOCUMENTS}/products").as_str()))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(google_error(403, "Missing or insufficient permissions.")),
        )
        .mount(&server)
        .await;

    let result = client.list(&token()).await;
    assert!(matches!(result, Err(BackendError::PermissionDenied(_))));
}

#[tokio::test]
async fn test_create_returns_assigned_id() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(format!("{DOCUMENTS}/products").as_str()))
        .and(bearer_token("id-1"))
        .and(body_partial_json(json!({
            "fields": {
                "name": { "stringValue": "Semen Gresik 40kg" },
                "imageUrl": { "stringValue": "" }
            }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(document("products", "Xy7", "Semen Gresik 40kg")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let record = ProductRecord {
        name: "Semen Gresik 40kg".to_string(),
        price: "59000".to_string(),
        ..ProductRecord::default()
    };
    let id = client.create(&token(), &record).await.unwrap();
    assert_eq!(id, ProductId::new("Xy7"));
}

#[tokio::test]
async fn test_update_masks_fields_and_requires_existing_document() {
    let (server, client) = setup().await;

    let mut mock = Mock::given(method("PATCH"))
        .and(path(format!("{DOCUMENTS}/products/p1").as_str()))
        .and(bearer_token("id-1"))
        .and(query_param("currentDocument.exists", "true"));
    for field in ["name", "price", "category", "stock", "unit", "imageUrl"] {
        mock = mock.and(query_param("updateMask.fieldPaths", field));
    }
    mock.and(body_partial_json(json!({
        "fields": { "price": { "stringValue": "61000" } }
    })))
    .respond_with(ResponseTemplate::new(200).set_body_json(document("products", "p1", "Semen")))
    .expect(1)
    .mount(&server)
    .await;

    let record = ProductRecord {
        name: "Semen".to_string(),
        price: "61000".to_string(),
        ..ProductRecord::default()
    };
    client
        .update(&token(), &ProductId::new("p1"), &record)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_update_of_missing_document_is_not_found() {
    let (server, client) = setup().await;

    Mock::given(method("PATCH"))
        .and(path(format!("{DOCUMENTS}/products/gone").as_str()))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(google_error(404, "No document to update")),
        )
        .mount(&server)
        .await;

    let result = client
        .update(&token(), &ProductId::new("gone"), &ProductRecord::default())
        .await;
    assert!(matches!(&result, Err(BackendError::NotFound(m)) if m == "No document to update"));
}

#[tokio::test]
async fn test_delete_document() {
    let (server, client) = setup().await;

    Mock::given(method("DELETE"))
        .and(path(format!("{DOCUMENTS}/products/p1").as_str()))
        .and(bearer_token("id-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client.delete(&token(), &ProductId::new("p1")).await.unwrap();
}

// ── Users ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_user_record_is_none() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("{DOCUMENTS}/users/uid-1").as_str()))
        .respond_with(ResponseTemplate::new(404).set_body_json(google_error(
            404,
            "Document \"projects/bangunrumah/databases/(default)/documents/users/uid-1\" not found.",
        )))
        .mount(&server)
        .await;

    let record = client.get(&token(), &UserId::new("uid-1")).await.unwrap();
    assert!(record.is_none());
}

#[tokio::test]
async fn test_user_record_role_is_read() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("{DOCUMENTS}/users/uid-1").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/bangunrumah/databases/(default)/documents/users/uid-1",
            "fields": {
                "email": { "stringValue": "admin@toko.id" },
                "role": { "stringValue": "admin" }
            }
        })))
        .mount(&server)
        .await;

    let record = client
        .get(&token(), &UserId::new("uid-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.role.as_deref(), Some("admin"));
}

#[tokio::test]
async fn test_put_user_overwrites_without_mask() {
    let (server, client) = setup().await;

    Mock::given(method("PATCH"))
        .and(path(format!("{DOCUMENTS}/users/uid-1").as_str()))
        .and(query_param_is_missing("currentDocument.exists"))
        .and(query_param_is_missing("updateMask.fieldPaths"))
        .and(body_partial_json(json!({
            "fields": { "role": { "stringValue": "admin" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "projects/bangunrumah/databases/(default)/documents/users/uid-1",
            "fields": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    client
        .put(
            &token(),
            &UserId::new("uid-1"),
            &UserRecord::admin("admin@toko.id"),
        )
        .await
        .unwrap();
}

// ── Storage ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_upload_resolves_download_url_from_token() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(format!("/b/{BUCKET}/o").as_str()))
        .and(query_param("uploadType", "media"))
        .and(query_param("name", "product-images/semen.jpg-1700000000000"))
        .and(header("content-type", "image/jpeg"))
        .and(bearer_token("id-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "product-images/semen.jpg-1700000000000",
            "bucket": BUCKET,
            "contentType": "image/jpeg",
            "downloadTokens": "tok-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let file = client
        .upload(
            &token(),
            "product-images/semen.jpg-1700000000000",
            vec![0xFF, 0xD8, 0xFF],
            "image/jpeg",
        )
        .await
        .unwrap();
    assert_eq!(file.download_token.as_deref(), Some("tok-1"));

    let url = client.public_url(&token(), &file).await.unwrap();
    assert_eq!(
        url,
        format!(
            "{}/b/{BUCKET}/o/product-images%2Fsemen.jpg-1700000000000?alt=media&token=tok-1",
            server.uri()
        )
    );
}

#[tokio::test]
async fn test_public_url_reads_metadata_when_token_is_unknown() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(format!("/b/{BUCKET}/o/product-images%2Fbata.png-1").as_str()))
        .and(bearer_token("id-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "product-images/bata.png-1",
            "downloadTokens": "tok-a,tok-b"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let file = StoredFile {
        path: "product-images/bata.png-1".to_string(),
        download_token: None,
    };
    let url = client.public_url(&token(), &file).await.unwrap();
    assert!(url.ends_with("/o/product-images%2Fbata.png-1?alt=media&token=tok-a"));
}
