use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method, StatusCode,
};
use serde_json::{json, Map, Value};
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::store::{matches, Document, DocumentStore, Predicate, StoreError};

/// Firestore REST implementation of the document store contract.
/// `guarded_update` maps onto Firestore's `updateTime` precondition: the
/// guard is evaluated against a snapshot read, and the patch only lands if
/// the document has not changed since that read.
pub struct FirestoreClient {
    client: Client,
    base_url: String,
    project_id: String,
    auth_token: Option<String>,
}

impl FirestoreClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.firestore_base_url.clone(),
            project_id: config.firestore_project_id.clone(),
            auth_token: config.firestore_auth_token.clone(),
        }
    }

    fn documents_root(&self) -> String {
        format!(
            "{}/projects/{}/databases/(default)/documents",
            self.base_url, self.project_id
        )
    }

    fn doc_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.documents_root(), collection, id)
    }

    fn doc_name(&self, collection: &str, id: &str) -> String {
        format!(
            "projects/{}/databases/(default)/documents/{}/{}",
            self.project_id, collection, id
        )
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &self.auth_token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers
    }

    async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value), StoreError> {
        debug!("Firestore request {} {}", method, url);
        let mut req = self.client.request(method, url).headers(self.headers());
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let status = response.status();
        let payload = response.json::<Value>().await.unwrap_or(Value::Null);
        Ok((status, payload))
    }

    fn update_mask(patch: &Value) -> String {
        patch
            .as_object()
            .map(|fields| {
                fields
                    .keys()
                    .map(|k| format!("updateMask.fieldPaths={}", k))
                    .collect::<Vec<_>>()
                    .join("&")
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let (status, payload) = self
            .request(Method::GET, &self.doc_url(collection, id), None)
            .await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            error!("Firestore get failed ({}): {}", status, payload);
            return Err(StoreError::Backend(format!("get returned {}", status)));
        }
        Ok(Some(Document {
            id: id.to_string(),
            data: decode_fields(&payload),
        }))
    }

    async fn query(
        &self,
        collection: &str,
        predicates: &[Predicate],
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError> {
        let mut structured = json!({
            "from": [{ "collectionId": collection }],
        });
        if !predicates.is_empty() {
            let filters: Vec<Value> = predicates.iter().map(encode_predicate).collect();
            structured["where"] = json!({
                "compositeFilter": { "op": "AND", "filters": filters }
            });
        }
        if let Some(limit) = limit {
            structured["limit"] = json!(limit);
        }

        let url = format!("{}:runQuery", self.documents_root());
        let (status, payload) = self
            .request(Method::POST, &url, Some(json!({ "structuredQuery": structured })))
            .await?;
        if !status.is_success() {
            error!("Firestore query failed ({}): {}", status, payload);
            return Err(StoreError::Backend(format!("runQuery returned {}", status)));
        }

        let mut results = Vec::new();
        if let Some(rows) = payload.as_array() {
            for row in rows {
                if let Some(doc) = row.get("document") {
                    results.push(Document {
                        id: id_from_name(doc),
                        data: decode_fields(doc),
                    });
                }
            }
        }
        Ok(results)
    }

    async fn add(&self, collection: &str, data: Value) -> Result<String, StoreError> {
        let url = format!("{}/{}", self.documents_root(), collection);
        let body = json!({ "fields": encode_fields(&data) });
        let (status, payload) = self.request(Method::POST, &url, Some(body)).await?;
        if !status.is_success() {
            error!("Firestore add failed ({}): {}", status, payload);
            return Err(StoreError::Backend(format!("add returned {}", status)));
        }
        Ok(id_from_name(&payload))
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<(), StoreError> {
        // Patch without an existence precondition upserts.
        let url = format!("{}?{}", self.doc_url(collection, id), Self::update_mask(&data));
        let body = json!({ "fields": encode_fields(&data) });
        let (status, payload) = self.request(Method::PATCH, &url, Some(body)).await?;
        if !status.is_success() {
            error!("Firestore set failed ({}): {}", status, payload);
            return Err(StoreError::Backend(format!("set returned {}", status)));
        }
        Ok(())
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<(), StoreError> {
        let url = format!(
            "{}?currentDocument.exists=true&{}",
            self.doc_url(collection, id),
            Self::update_mask(&patch)
        );
        let body = json!({ "fields": encode_fields(&patch) });
        let (status, payload) = self.request(Method::PATCH, &url, Some(body)).await?;
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(collection.to_string(), id.to_string()));
        }
        if !status.is_success() {
            error!("Firestore update failed ({}): {}", status, payload);
            return Err(StoreError::Backend(format!("update returned {}", status)));
        }
        Ok(())
    }

    async fn guarded_update(
        &self,
        collection: &str,
        id: &str,
        guard: &[Predicate],
        patch: Value,
    ) -> Result<bool, StoreError> {
        let (status, snapshot) = self
            .request(Method::GET, &self.doc_url(collection, id), None)
            .await?;
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            return Err(StoreError::Backend(format!("get returned {}", status)));
        }

        if !matches(&decode_fields(&snapshot), guard) {
            return Ok(false);
        }
        let update_time = match snapshot.get("updateTime").and_then(Value::as_str) {
            Some(t) => t.to_string(),
            None => return Err(StoreError::Backend("document snapshot missing updateTime".into())),
        };

        let url = format!(
            "{}?currentDocument.updateTime={}&{}",
            self.doc_url(collection, id),
            update_time,
            Self::update_mask(&patch)
        );
        let body = json!({ "fields": encode_fields(&patch) });
        let (status, payload) = self.request(Method::PATCH, &url, Some(body)).await?;
        // FAILED_PRECONDITION means someone else wrote first: the claim is lost, not an error.
        if status == StatusCode::CONFLICT || status == StatusCode::BAD_REQUEST || status == StatusCode::PRECONDITION_FAILED {
            debug!("Firestore guarded update lost the race for {}/{}", collection, id);
            return Ok(false);
        }
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            error!("Firestore guarded update failed ({}): {}", status, payload);
            return Err(StoreError::Backend(format!("guarded update returned {}", status)));
        }
        Ok(true)
    }

    async fn batch_update(&self, updates: Vec<(String, String, Value)>) -> Result<(), StoreError> {
        if updates.is_empty() {
            return Ok(());
        }
        let writes: Vec<Value> = updates
            .iter()
            .map(|(collection, id, patch)| {
                let field_paths: Vec<&String> = patch
                    .as_object()
                    .map(|fields| fields.keys().collect())
                    .unwrap_or_default();
                json!({
                    "update": {
                        "name": self.doc_name(collection, id),
                        "fields": encode_fields(patch),
                    },
                    "updateMask": { "fieldPaths": field_paths },
                    "currentDocument": { "exists": true },
                })
            })
            .collect();

        let url = format!("{}:commit", self.documents_root());
        let (status, payload) = self
            .request(Method::POST, &url, Some(json!({ "writes": writes })))
            .await?;
        if !status.is_success() {
            error!("Firestore commit failed ({}): {}", status, payload);
            return Err(StoreError::Backend(format!("commit returned {}", status)));
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let (status, payload) = self
            .request(Method::DELETE, &self.doc_url(collection, id), None)
            .await?;
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            error!("Firestore delete failed ({}): {}", status, payload);
            return Err(StoreError::Backend(format!("delete returned {}", status)));
        }
        Ok(())
    }
}

fn id_from_name(doc: &Value) -> String {
    doc.get("name")
        .and_then(Value::as_str)
        .and_then(|name| name.rsplit('/').next())
        .unwrap_or_default()
        .to_string()
}

fn decode_fields(doc: &Value) -> Value {
    let fields = doc.get("fields").and_then(Value::as_object);
    let mut out = Map::new();
    if let Some(fields) = fields {
        for (key, value) in fields {
            out.insert(key.clone(), decode_value(value));
        }
    }
    Value::Object(out)
}

fn decode_value(value: &Value) -> Value {
    if let Some(obj) = value.as_object() {
        if let Some(s) = obj.get("stringValue") {
            return s.clone();
        }
        if let Some(b) = obj.get("booleanValue") {
            return b.clone();
        }
        if let Some(i) = obj.get("integerValue").and_then(Value::as_str) {
            if let Ok(n) = i.parse::<i64>() {
                return json!(n);
            }
        }
        if let Some(d) = obj.get("doubleValue") {
            return d.clone();
        }
        if obj.contains_key("nullValue") {
            return Value::Null;
        }
        if let Some(ts) = obj.get("timestampValue") {
            return ts.clone();
        }
        if let Some(arr) = obj.get("arrayValue") {
            let values = arr
                .get("values")
                .and_then(Value::as_array)
                .map(|vs| vs.iter().map(decode_value).collect())
                .unwrap_or_default();
            return Value::Array(values);
        }
        if let Some(map) = obj.get("mapValue") {
            return decode_fields(map);
        }
    }
    Value::Null
}

fn encode_fields(data: &Value) -> Value {
    let mut out = Map::new();
    if let Some(fields) = data.as_object() {
        for (key, value) in fields {
            out.insert(key.clone(), encode_value(value));
        }
    }
    Value::Object(out)
}

fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                json!({ "integerValue": i.to_string() })
            } else {
                json!({ "doubleValue": n.as_f64() })
            }
        }
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(_) => json!({ "mapValue": { "fields": encode_fields(value) } }),
    }
}

fn encode_predicate(predicate: &Predicate) -> Value {
    let (field, op, value) = match predicate {
        Predicate::Eq(f, v) => (f, "EQUAL", encode_value(v)),
        Predicate::Lte(f, v) => (f, "LESS_THAN_OR_EQUAL", encode_value(v)),
        Predicate::Gte(f, v) => (f, "GREATER_THAN_OR_EQUAL", encode_value(v)),
        Predicate::In(f, vs) => {
            let values: Vec<Value> = vs.iter().map(encode_value).collect();
            (f, "IN", json!({ "arrayValue": { "values": values } }))
        }
    };
    json!({
        "fieldFilter": {
            "field": { "fieldPath": field },
            "op": op,
            "value": value,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_codec_roundtrip() {
        let original = json!({
            "name": "a",
            "count": 3,
            "ratio": 0.5,
            "active": true,
            "missing": null,
            "tags": ["x", "y"],
            "payload": { "messageText": "hello" },
        });
        let decoded = decode_fields(&json!({ "fields": encode_fields(&original) }));
        assert_eq!(decoded, original);
    }

    #[test]
    fn id_extraction_takes_last_path_segment() {
        let doc = json!({
            "name": "projects/p/databases/(default)/documents/appointments/abc123"
        });
        assert_eq!(id_from_name(&doc), "abc123");
    }
}
