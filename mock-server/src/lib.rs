//! In-memory CouchDB-compatible server for exercising the FieldDB client.
//!
//! Implements the subset of the CouchDB HTTP API the client touches: the
//! greeting, `_all_dbs`, database create/delete, `_replicate`, document
//! create/get/update (including `_design/` documents) and `_all_docs`.
//! Failures use the CouchDB `{"error": .., "reason": ..}` envelope.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const VERSION: &str = "3.3.3";

#[derive(Clone, Debug)]
struct StoredDoc {
    rev: String,
    body: Map<String, Value>,
}

impl StoredDoc {
    fn to_value(&self, id: &str) -> Value {
        let mut doc = Map::new();
        doc.insert("_id".to_string(), Value::String(id.to_string()));
        doc.insert("_rev".to_string(), Value::String(self.rev.clone()));
        doc.extend(self.body.clone());
        Value::Object(doc)
    }
}

/// Error answers, rendered as CouchDB error envelopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CouchError {
    NotFound(&'static str),
    FileExists,
    Conflict,
    Unauthorized,
    BadRequest(String),
}

impl CouchError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            CouchError::NotFound(reason) => (StatusCode::NOT_FOUND, "not_found", reason.to_string()),
            CouchError::FileExists => (
                StatusCode::PRECONDITION_FAILED,
                "file_exists",
                "The database could not be created, the file already exists.".to_string(),
            ),
            CouchError::Conflict => (
                StatusCode::CONFLICT,
                "conflict",
                "Document update conflict.".to_string(),
            ),
            CouchError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Name or password is incorrect.".to_string(),
            ),
            CouchError::BadRequest(reason) => (StatusCode::BAD_REQUEST, "bad_request", reason.clone()),
        }
    }
}

impl IntoResponse for CouchError {
    fn into_response(self) -> Response {
        let (status, error, reason) = self.parts();
        (status, Json(json!({ "error": error, "reason": reason }))).into_response()
    }
}

/// All databases, keyed by name; documents keyed by id.
#[derive(Debug, Default)]
pub struct Couch {
    databases: BTreeMap<String, BTreeMap<String, StoredDoc>>,
}

impl Couch {
    pub fn database_names(&self) -> Vec<String> {
        self.databases.keys().cloned().collect()
    }

    pub fn create_database(&mut self, name: &str) -> Result<(), CouchError> {
        if name.is_empty() {
            return Err(CouchError::BadRequest("Name must not be empty.".to_string()));
        }
        if self.databases.contains_key(name) {
            return Err(CouchError::FileExists);
        }
        self.databases.insert(name.to_string(), BTreeMap::new());
        Ok(())
    }

    pub fn delete_database(&mut self, name: &str) -> Result<(), CouchError> {
        self.databases
            .remove(name)
            .map(|_| ())
            .ok_or(CouchError::NotFound("Database does not exist."))
    }

    pub fn doc_count(&self, database: &str) -> Result<usize, CouchError> {
        Ok(self.database(database)?.len())
    }

    /// `POST /{db}`: store a new document, returning `(id, rev)`.
    pub fn insert_document(
        &mut self,
        database: &str,
        body: Value,
    ) -> Result<(String, String), CouchError> {
        let mut body = into_object(body)?;
        let id = match body.remove("_id") {
            Some(Value::String(id)) => id,
            Some(_) => return Err(CouchError::BadRequest("Document id must be a string".to_string())),
            None => Uuid::new_v4().simple().to_string(),
        };
        body.remove("_rev");
        let docs = self.database_mut(database)?;
        if docs.contains_key(&id) {
            return Err(CouchError::Conflict);
        }
        let rev = next_rev(1);
        docs.insert(id.clone(), StoredDoc { rev: rev.clone(), body });
        Ok((id, rev))
    }

    /// `PUT /{db}/{id}`: create, or update when `_rev` matches the stored
    /// revision. Returns the new revision.
    pub fn put_document(&mut self, database: &str, id: &str, body: Value) -> Result<String, CouchError> {
        let mut body = into_object(body)?;
        body.remove("_id");
        let supplied_rev = match body.remove("_rev") {
            Some(Value::String(rev)) => Some(rev),
            Some(_) => return Err(CouchError::BadRequest("Invalid rev format".to_string())),
            None => None,
        };
        let docs = self.database_mut(database)?;
        let generation = match (docs.get(id), supplied_rev) {
            (None, None) => 1,
            (Some(stored), Some(rev)) if stored.rev == rev => generation_of(&stored.rev) + 1,
            _ => return Err(CouchError::Conflict),
        };
        let rev = next_rev(generation);
        docs.insert(id.to_string(), StoredDoc { rev: rev.clone(), body });
        Ok(rev)
    }

    pub fn get_document(&self, database: &str, id: &str) -> Result<Value, CouchError> {
        self.database(database)?
            .get(id)
            .map(|doc| doc.to_value(id))
            .ok_or(CouchError::NotFound("missing"))
    }

    pub fn all_docs(&self, database: &str, include_docs: bool) -> Result<Value, CouchError> {
        let docs = self.database(database)?;
        let rows: Vec<Value> = docs
            .iter()
            .map(|(id, doc)| {
                let mut row = json!({ "id": id, "key": id, "value": { "rev": doc.rev } });
                if include_docs {
                    row["doc"] = doc.to_value(id);
                }
                row
            })
            .collect();
        Ok(json!({ "total_rows": rows.len(), "offset": 0, "rows": rows }))
    }

    /// Copy every document of `source` into `target`, returning how many
    /// were written.
    pub fn replicate(&mut self, source: &str, target: &str, create_target: bool) -> Result<usize, CouchError> {
        let docs = self.database(source)?.clone();
        if !self.databases.contains_key(target) {
            if !create_target {
                return Err(CouchError::NotFound("Database does not exist."));
            }
            self.create_database(target)?;
        }
        let written = docs.len();
        self.database_mut(target)?.extend(docs);
        Ok(written)
    }

    fn database(&self, name: &str) -> Result<&BTreeMap<String, StoredDoc>, CouchError> {
        self.databases
            .get(name)
            .ok_or(CouchError::NotFound("Database does not exist."))
    }

    fn database_mut(&mut self, name: &str) -> Result<&mut BTreeMap<String, StoredDoc>, CouchError> {
        self.databases
            .get_mut(name)
            .ok_or(CouchError::NotFound("Database does not exist."))
    }
}

fn into_object(body: Value) -> Result<Map<String, Value>, CouchError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(CouchError::BadRequest("Document must be a JSON object".to_string())),
    }
}

fn next_rev(generation: u64) -> String {
    format!("{generation}-{}", Uuid::new_v4().simple())
}

fn generation_of(rev: &str) -> u64 {
    rev.split('-').next().and_then(|g| g.parse().ok()).unwrap_or(0)
}

#[derive(Clone)]
struct AppState {
    couch: Arc<RwLock<Couch>>,
    admin: Option<String>,
}

impl AppState {
    /// Mutations require the admin's Basic credentials when an admin is set.
    fn authorize(&self, headers: &HeaderMap) -> Result<(), CouchError> {
        let Some(expected) = &self.admin else {
            return Ok(());
        };
        let supplied = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Basic "))
            .and_then(|encoded| STANDARD.decode(encoded).ok())
            .and_then(|decoded| String::from_utf8(decoded).ok());
        match supplied {
            Some(pair) if &pair == expected => Ok(()),
            _ => Err(CouchError::Unauthorized),
        }
    }
}

type Reply = Result<(StatusCode, Json<Value>), CouchError>;

/// A server that accepts every request.
pub fn app() -> Router {
    router(None)
}

/// A server whose mutating routes require `username:password`.
pub fn app_with_admin(username: &str, password: &str) -> Router {
    router(Some(format!("{username}:{password}")))
}

fn router(admin: Option<String>) -> Router {
    let state = AppState {
        couch: Arc::new(RwLock::new(Couch::default())),
        admin,
    };
    Router::new()
        .route("/", get(greeting))
        .route("/_all_dbs", get(all_dbs))
        .route("/_replicate", post(replicate))
        .route(
            "/{db}",
            get(database_info)
                .put(create_database)
                .delete(delete_database)
                .post(create_document),
        )
        .route("/{db}/_all_docs", get(all_docs))
        .route("/{db}/{id}", get(get_document).put(put_document))
        .route(
            "/{db}/_design/{name}",
            get(get_design_document).put(put_design_document),
        )
        .with_state(state)
}

pub async fn serve(listener: TcpListener, router: Router) -> Result<(), std::io::Error> {
    axum::serve(listener, router).await
}

async fn greeting() -> Json<Value> {
    Json(json!({ "couchdb": "Welcome", "version": VERSION }))
}

async fn all_dbs(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.couch.read().await.database_names())
}

async fn database_info(State(state): State<AppState>, Path(db): Path<String>) -> Reply {
    let count = state.couch.read().await.doc_count(&db)?;
    Ok((StatusCode::OK, Json(json!({ "db_name": db, "doc_count": count }))))
}

async fn create_database(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(db): Path<String>,
) -> Reply {
    state.authorize(&headers)?;
    state.couch.write().await.create_database(&db)?;
    Ok((StatusCode::CREATED, Json(json!({ "ok": true }))))
}

async fn delete_database(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(db): Path<String>,
) -> Reply {
    state.authorize(&headers)?;
    state.couch.write().await.delete_database(&db)?;
    Ok((StatusCode::OK, Json(json!({ "ok": true }))))
}

async fn create_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(db): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    state.authorize(&headers)?;
    let (id, rev) = state.couch.write().await.insert_document(&db, body)?;
    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "id": id, "rev": rev }))))
}

async fn get_document(
    State(state): State<AppState>,
    Path((db, id)): Path<(String, String)>,
) -> Reply {
    let doc = state.couch.read().await.get_document(&db, &id)?;
    Ok((StatusCode::OK, Json(doc)))
}

async fn put_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((db, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Reply {
    state.authorize(&headers)?;
    let rev = state.couch.write().await.put_document(&db, &id, body)?;
    Ok((StatusCode::CREATED, Json(json!({ "ok": true, "id": id, "rev": rev }))))
}

async fn get_design_document(
    State(state): State<AppState>,
    Path((db, name)): Path<(String, String)>,
) -> Reply {
    get_document(State(state), Path((db, format!("_design/{name}")))).await
}

async fn put_design_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((db, name)): Path<(String, String)>,
    body: Json<Value>,
) -> Reply {
    put_document(State(state), headers, Path((db, format!("_design/{name}"))), body).await
}

#[derive(Deserialize)]
struct AllDocsParams {
    #[serde(default)]
    include_docs: Option<String>,
}

async fn all_docs(
    State(state): State<AppState>,
    Path(db): Path<String>,
    Query(params): Query<AllDocsParams>,
) -> Reply {
    let include_docs = params.include_docs.as_deref() == Some("true");
    let listing = state.couch.read().await.all_docs(&db, include_docs)?;
    Ok((StatusCode::OK, Json(listing)))
}

#[derive(Deserialize)]
struct ReplicateBody {
    source: String,
    target: String,
    #[serde(default)]
    create_target: bool,
}

async fn replicate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ReplicateBody>,
) -> Reply {
    state.authorize(&headers)?;
    let written = state
        .couch
        .write()
        .await
        .replicate(&body.source, &body.target, body.create_target)?;
    Ok((
        StatusCode::OK,
        Json(json!({
            "ok": true,
            "session_id": Uuid::new_v4().simple().to_string(),
            "history": [{ "docs_written": written }],
        })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn couch_with(db: &str) -> Couch {
        let mut couch = Couch::default();
        couch.create_database(db).unwrap();
        couch
    }

    #[test]
    fn create_database_twice_is_file_exists() {
        let mut couch = couch_with("fruits");
        assert_eq!(couch.create_database("fruits"), Err(CouchError::FileExists));
    }

    #[test]
    fn inserted_documents_get_hex_ids_and_first_revision() {
        let mut couch = couch_with("fruits");
        let (id, rev) = couch.insert_document("fruits", json!({"item": "apple"})).unwrap();
        assert_eq!(id.len(), 32);
        assert!(rev.starts_with("1-"));
        let doc = couch.get_document("fruits", &id).unwrap();
        assert_eq!(doc["_id"], id.as_str());
        assert_eq!(doc["item"], "apple");
    }

    #[test]
    fn insert_honours_supplied_id() {
        let mut couch = couch_with("fruits");
        let (id, _) = couch
            .insert_document("fruits", json!({"_id": "_design/example", "views": {}}))
            .unwrap();
        assert_eq!(id, "_design/example");
        assert_eq!(
            couch.insert_document("fruits", json!({"_id": "_design/example"})),
            Err(CouchError::Conflict)
        );
    }

    #[test]
    fn update_requires_current_revision() {
        let mut couch = couch_with("fruits");
        let (id, rev1) = couch.insert_document("fruits", json!({"item": "banana"})).unwrap();
        let rev2 = couch
            .put_document("fruits", &id, json!({"item": "waaaaanana", "_rev": rev1}))
            .unwrap();
        assert!(rev2.starts_with("2-"));
        assert_eq!(
            couch.put_document("fruits", &id, json!({"item": "stale", "_rev": rev1})),
            Err(CouchError::Conflict)
        );
        assert_eq!(couch.get_document("fruits", &id).unwrap()["item"], "waaaaanana");
    }

    #[test]
    fn put_without_revision_on_existing_doc_conflicts() {
        let mut couch = couch_with("fruits");
        let (id, _) = couch.insert_document("fruits", json!({})).unwrap();
        assert_eq!(couch.put_document("fruits", &id, json!({})), Err(CouchError::Conflict));
    }

    #[test]
    fn replicate_creates_target_and_copies_documents() {
        let mut couch = couch_with("fruits");
        couch.insert_document("fruits", json!({"item": "orange"})).unwrap();
        couch.insert_document("fruits", json!({"item": "apple"})).unwrap();
        assert_eq!(couch.replicate("fruits", "fruits_clone", true), Ok(2));
        assert_eq!(couch.doc_count("fruits_clone"), Ok(2));
        assert_eq!(
            couch.replicate("fruits", "elsewhere", false),
            Err(CouchError::NotFound("Database does not exist."))
        );
    }

    #[test]
    fn all_docs_lists_rows_sorted_by_id() {
        let mut couch = couch_with("fruits");
        couch.insert_document("fruits", json!({"_id": "b"})).unwrap();
        couch.insert_document("fruits", json!({"_id": "a"})).unwrap();
        let listing = couch.all_docs("fruits", false).unwrap();
        assert_eq!(listing["total_rows"], 2);
        assert_eq!(listing["rows"][0]["id"], "a");
        assert!(listing["rows"][0].get("doc").is_none());
        let listing = couch.all_docs("fruits", true).unwrap();
        assert_eq!(listing["rows"][1]["doc"]["_id"], "b");
    }

    #[test]
    fn error_envelope_shape() {
        let (status, error, reason) = CouchError::Conflict.parts();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error, "conflict");
        assert_eq!(reason, "Document update conflict.");
    }
}
