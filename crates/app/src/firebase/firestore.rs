//! Firestore documents API.
//!
//! Documents are untyped field maps on the wire. The generic calls in this
//! module work on [`Fields`]; the `ProductStore` and `UserStore`
//! implementations convert to and from the typed records.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use bangun_rumah_core::{Product, ProductId, ProductRecord, UserId, UserRecord};

use super::{FirebaseClient, check};
use crate::backend::{BackendError, ProductStore, Token, UserStore};

/// Untyped document fields, keyed by field name, in Firestore's value encoding.
type Fields = BTreeMap<String, Value>;

const PRODUCTS: &str = "products";
const USERS: &str = "users";

/// Page size for collection reads.
const PAGE_SIZE: &str = "300";

/// Stored field names of a product document.
const PRODUCT_FIELDS: [&str; 6] = ["name", "price", "category", "stock", "unit", "imageUrl"];

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: Fields,
}

impl Document {
    /// Last path segment of the resource name.
    fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    documents: Vec<Document>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Encode a string as a Firestore value.
fn string_value(value: &str) -> Value {
    json!({ "stringValue": value })
}

/// Read a field as text, accepting string, integer, double and boolean values.
fn text_field(fields: &Fields, key: &str) -> Option<String> {
    let value = fields.get(key)?.as_object()?;
    if let Some(s) = value.get("stringValue").and_then(Value::as_str) {
        return Some(s.to_string());
    }
    if let Some(s) = value.get("integerValue").and_then(Value::as_str) {
        return Some(s.to_string());
    }
    if let Some(n) = value.get("doubleValue").and_then(Value::as_f64) {
        return Some(n.to_string());
    }
    value
        .get("booleanValue")
        .and_then(Value::as_bool)
        .map(|b| b.to_string())
}

fn product_to_fields(record: &ProductRecord) -> Fields {
    let values = [
        &record.name,
        &record.price,
        &record.category,
        &record.stock,
        &record.unit,
        &record.image_url,
    ];
    PRODUCT_FIELDS
        .iter()
        .zip(values)
        .map(|(key, value)| ((*key).to_string(), string_value(value)))
        .collect()
}

fn product_from_fields(fields: &Fields) -> ProductRecord {
    let text = |key| text_field(fields, key).unwrap_or_default();
    ProductRecord {
        name: text("name"),
        price: text("price"),
        category: text("category"),
        stock: text("stock"),
        unit: text("unit"),
        image_url: text("imageUrl"),
    }
}

fn user_to_fields(record: &UserRecord) -> Fields {
    let mut fields = Fields::new();
    fields.insert("email".to_string(), string_value(&record.email));
    if let Some(role) = &record.role {
        fields.insert("role".to_string(), string_value(role));
    }
    fields
}

fn user_from_fields(fields: &Fields) -> UserRecord {
    UserRecord {
        email: text_field(fields, "email").unwrap_or_default(),
        role: text_field(fields, "role"),
    }
}

impl FirebaseClient {
    fn collection_url(&self, collection: &str) -> Result<url::Url, BackendError> {
        Self::parse_url(&format!("{}/{collection}", self.documents_root()))
    }

    fn document_url(&self, collection: &str, id: &str) -> Result<url::Url, BackendError> {
        Self::parse_url(&format!(
            "{}/{collection}/{}",
            self.documents_root(),
            urlencoding::encode(id)
        ))
    }

    /// Read every document of a collection, following page tokens.
    #[instrument(skip(self, token))]
    async fn list_documents(
        &self,
        token: &Token,
        collection: &str,
    ) -> Result<Vec<(String, Fields)>, BackendError> {
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = self.collection_url(collection)?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("pageSize", PAGE_SIZE);
                if let Some(page) = &page_token {
                    query.append_pair("pageToken", page);
                }
            }

            let response = self
                .client
                .get(url)
                .bearer_auth(token.expose())
                .send()
                .await?;
            let page: ListResponse = check(response)
                .await?
                .json()
                .await
                .map_err(|e| BackendError::Malformed(e.to_string()))?;

            documents.extend(
                page.documents
                    .into_iter()
                    .map(|doc| (doc.id().to_string(), doc.fields)),
            );

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        tracing::debug!(count = documents.len(), "Listed documents");
        Ok(documents)
    }

    /// Create a document with a backend-assigned id.
    #[instrument(skip(self, token, fields))]
    async fn create_document(
        &self,
        token: &Token,
        collection: &str,
        fields: &Fields,
    ) -> Result<String, BackendError> {
        let response = self
            .client
            .post(self.collection_url(collection)?)
            .bearer_auth(token.expose())
            .json(&json!({ "fields": fields }))
            .send()
            .await?;
        let document: Document = check(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Malformed(e.to_string()))?;
        Ok(document.id().to_string())
    }

    /// Read one document; `None` if it does not exist.
    #[instrument(skip(self, token))]
    async fn get_document(
        &self,
        token: &Token,
        collection: &str,
        id: &str,
    ) -> Result<Option<Fields>, BackendError> {
        let response = self
            .client
            .get(self.document_url(collection, id)?)
            .bearer_auth(token.expose())
            .send()
            .await?;
        match check(response).await {
            Ok(response) => {
                let document: Document = response
                    .json()
                    .await
                    .map_err(|e| BackendError::Malformed(e.to_string()))?;
                Ok(Some(document.fields))
            }
            Err(BackendError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write fields to a document.
    ///
    /// With `mask`, only the listed fields are replaced and the document must
    /// already exist. Without it, the whole document is overwritten or
    /// created.
    #[instrument(skip(self, token, fields))]
    async fn write_document(
        &self,
        token: &Token,
        collection: &str,
        id: &str,
        fields: &Fields,
        mask: Option<&[&str]>,
    ) -> Result<(), BackendError> {
        let mut url = self.document_url(collection, id)?;
        if let Some(paths) = mask {
            let mut query = url.query_pairs_mut();
            for path in paths {
                query.append_pair("updateMask.fieldPaths", path);
            }
            query.append_pair("currentDocument.exists", "true");
        }

        let response = self
            .client
            .patch(url)
            .bearer_auth(token.expose())
            .json(&json!({ "fields": fields }))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Delete a document.
    #[instrument(skip(self, token))]
    async fn delete_document(
        &self,
        token: &Token,
        collection: &str,
        id: &str,
    ) -> Result<(), BackendError> {
        let response = self
            .client
            .delete(self.document_url(collection, id)?)
            .bearer_auth(token.expose())
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

#[async_trait]
impl ProductStore for FirebaseClient {
    async fn list(&self, token: &Token) -> Result<Vec<Product>, BackendError> {
        let documents = self.list_documents(token, PRODUCTS).await?;
        Ok(documents
            .into_iter()
            .map(|(id, fields)| Product::new(ProductId::new(id), product_from_fields(&fields)))
            .collect())
    }

    async fn create(
        &self,
        token: &Token,
        record: &ProductRecord,
    ) -> Result<ProductId, BackendError> {
        let id = self
            .create_document(token, PRODUCTS, &product_to_fields(record))
            .await?;
        Ok(ProductId::new(id))
    }

    async fn update(
        &self,
        token: &Token,
        id: &ProductId,
        record: &ProductRecord,
    ) -> Result<(), BackendError> {
        self.write_document(
            token,
            PRODUCTS,
            id.as_str(),
            &product_to_fields(record),
            Some(&PRODUCT_FIELDS[..]),
        )
        .await
    }

    async fn delete(&self, token: &Token, id: &ProductId) -> Result<(), BackendError> {
        self.delete_document(token, PRODUCTS, id.as_str()).await
    }
}

#[async_trait]
impl UserStore for FirebaseClient {
    async fn get(&self, token: &Token, uid: &UserId) -> Result<Option<UserRecord>, BackendError> {
        let fields = self.get_document(token, USERS, uid.as_str()).await?;
        Ok(fields.as_ref().map(user_from_fields))
    }

    async fn put(
        &self,
        token: &Token,
        uid: &UserId,
        record: &UserRecord,
    ) -> Result<(), BackendError> {
        self.write_document(token, USERS, uid.as_str(), &user_to_fields(record), None)
            .await
    }
}
