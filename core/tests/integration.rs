//! Client operations against the live mock CouchDB server.
//!
//! Each test starts a fresh mock server on a random port, then drives it over
//! real HTTP through `FieldDbClient`.

use std::time::{Duration, Instant};

use axum::{routing::get, Router};
use fielddb_core::{
    AllDocs, AuthMode, ClientError, ConnectionConfig, Document, DocumentResponse, FieldDbClient,
    Greeting, OkResponse, ReplicationResponse, ResponseBody, Scheme, SessionOptions,
};
use serde_json::{json, Value};

/// Serve `router` on a random local port from a background thread.
fn spawn(router: Router) -> std::net::SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_couch::serve(listener, router).await
        })
        .unwrap();
    });

    addr
}

fn client_for(addr: std::net::SocketAddr, config: ConnectionConfig) -> FieldDbClient {
    let config = ConnectionConfig {
        scheme: Scheme::Http,
        host: addr.ip().to_string(),
        port: addr.port().to_string(),
        ..config
    };
    FieldDbClient::new(config, SessionOptions::default()).unwrap()
}

fn start() -> FieldDbClient {
    client_for(spawn(mock_couch::app()), ConnectionConfig::default())
}

fn database_list(client: &FieldDbClient) -> Vec<String> {
    client.get_database_list().unwrap().decode().unwrap()
}

#[test]
fn greeting_is_json() {
    let client = start();
    let greeting: Greeting = client.get_greeting().unwrap().decode().unwrap();
    assert_eq!(greeting.couchdb, "Welcome");
}

#[test]
fn create_and_delete_toggle_database_existence() {
    let client = start();
    assert!(database_list(&client).is_empty());

    let created: OkResponse = client.create_database("fruits").unwrap().decode().unwrap();
    assert!(created.ok);
    assert_eq!(database_list(&client), vec!["fruits"]);

    let deleted: OkResponse = client.delete_database("fruits").unwrap().decode().unwrap();
    assert!(deleted.ok);
    assert!(database_list(&client).is_empty());

    let err = client
        .delete_database("fruits")
        .unwrap()
        .decode::<OkResponse>()
        .unwrap_err();
    assert_eq!(err.server_error(), Some("not_found"));
}

#[test]
fn fruits_scenario() {
    let client = start();
    client.create_database("fruits").unwrap();

    // create
    let apple = json!({"item": "apple", "prices": {"Fresh Mart": 1.59}});
    let created: DocumentResponse = client
        .create_document("fruits", &apple)
        .unwrap()
        .decode()
        .unwrap();
    assert!(created.ok);
    assert_eq!(created.id.len(), 32);
    assert!(created.id.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(created.generation(), Some(1));

    // get: non-server fields round-trip
    let mut fetched: Document = client
        .get_document("fruits", &created.id)
        .unwrap()
        .decode()
        .unwrap();
    assert_eq!(fetched.remove("_id"), Some(Value::String(created.id.clone())));
    assert_eq!(fetched.remove("_rev"), Some(Value::String(created.rev.clone())));
    assert_eq!(Value::Object(fetched), apple);

    // update
    let mut new_apple = apple.clone();
    new_apple["item"] = json!("waaaaanana");
    let updated: DocumentResponse = client
        .update_document("fruits", &created.id, &created.rev, &new_apple)
        .unwrap()
        .decode()
        .unwrap();
    assert!(updated.ok);
    assert_eq!(updated.id, created.id);
    assert_eq!(updated.generation(), Some(2));

    // re-fetch
    let fetched: Document = client
        .get_document("fruits", &created.id)
        .unwrap()
        .decode()
        .unwrap();
    assert_eq!(fetched["item"], "waaaaanana");
    assert_eq!(fetched["_rev"], updated.rev.as_str());
}

#[test]
fn stale_revision_is_rejected_and_leaves_document_unchanged() {
    let client = start();
    client.create_database("fruits").unwrap();
    let created: DocumentResponse = client
        .create_document("fruits", &json!({"item": "banana"}))
        .unwrap()
        .decode()
        .unwrap();
    client
        .update_document("fruits", &created.id, &created.rev, &json!({"item": "first"}))
        .unwrap();

    let err = client
        .update_document("fruits", &created.id, &created.rev, &json!({"item": "second"}))
        .unwrap()
        .decode::<DocumentResponse>()
        .unwrap_err();
    assert!(matches!(err, ClientError::Server { ref error, .. } if error == "conflict"));

    let fetched: Document = client
        .get_document("fruits", &created.id)
        .unwrap()
        .decode()
        .unwrap();
    assert_eq!(fetched["item"], "first");
}

#[test]
fn replication_creates_target_with_same_documents() {
    let client = start();
    client.create_database("fruits").unwrap();
    for item in ["orange", "apple", "banana"] {
        client.create_document("fruits", &json!({ "item": item })).unwrap();
    }

    let replicated: ReplicationResponse = client
        .replicate_database("fruits", "fruits_clone")
        .unwrap()
        .decode()
        .unwrap();
    assert!(replicated.ok);
    assert_eq!(database_list(&client), vec!["fruits", "fruits_clone"]);

    let source: AllDocs = client.get_all_docs_list("fruits").unwrap().decode().unwrap();
    let clone: AllDocs = client.get_all_docs_list("fruits_clone").unwrap().decode().unwrap();
    assert_eq!(clone.total_rows, 3);
    assert_eq!(source.rows, clone.rows);
    assert!(clone.rows.iter().all(|row| row.doc.is_some()));
}

#[test]
fn design_document_and_reserved_characters_round_trip() {
    let client = start();
    client.create_database("my db").unwrap();

    let design = json!({
        "_id": "_design/example",
        "views": {"foo": {"map": "function(doc){emit(doc._id, doc._rev)}"}}
    });
    let created: DocumentResponse = client
        .create_document("my db", &design)
        .unwrap()
        .decode()
        .unwrap();
    assert_eq!(created.id, "_design/example");
    let fetched: Document = client
        .get_document("my db", "_design/example")
        .unwrap()
        .decode()
        .unwrap();
    assert_eq!(fetched["views"]["foo"]["map"], "function(doc){emit(doc._id, doc._rev)}");

    client
        .create_document("my db", &json!({"_id": "a b/c?d", "item": "odd"}))
        .unwrap();
    let fetched: Document = client.get_document("my db", "a b/c?d").unwrap().decode().unwrap();
    assert_eq!(fetched["item"], "odd");
}

#[test]
fn plain_text_body_is_returned_raw() {
    let router = Router::new().route("/", get(|| async { "hello" }));
    let client = client_for(spawn(router), ConnectionConfig::default());
    let body = client.get_greeting().unwrap();
    assert_eq!(body, ResponseBody::Raw("hello".to_string()));
}

#[test]
fn non_utf8_body_is_returned_raw_lossily() {
    let router = Router::new().route("/", get(|| async { vec![0xffu8, 0xfe, b'h', b'i'] }));
    let client = client_for(spawn(router), ConnectionConfig::default());
    let body = client.get_greeting().unwrap();
    assert_eq!(body, ResponseBody::Raw("\u{fffd}\u{fffd}hi".to_string()));
}

#[test]
fn bodies_over_ten_mebibytes_are_read_in_full() {
    let names: Vec<String> = (0..120_000).map(|i| format!("database_{i:0>90}")).collect();
    let expected = names.len();
    let router = Router::new().route(
        "/_all_dbs",
        get(move || {
            let names = names.clone();
            async move { axum::Json(names) }
        }),
    );
    let client = client_for(spawn(router), ConnectionConfig::default());

    let listed = database_list(&client);
    assert_eq!(listed.len(), expected);
    assert!(listed.iter().map(|name| name.len() + 3).sum::<usize>() > 10 * 1024 * 1024);
}

#[test]
fn slow_server_hits_the_session_timeout() {
    let router = Router::new().route(
        "/",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            "too late"
        }),
    );
    let addr = spawn(router);
    let config = ConnectionConfig {
        scheme: Scheme::Http,
        host: addr.ip().to_string(),
        port: addr.port().to_string(),
        ..ConnectionConfig::default()
    };
    let options = SessionOptions {
        timeout: Some(Duration::from_millis(300)),
        ..SessionOptions::default()
    };
    let client = FieldDbClient::new(config, options).unwrap();

    let started = Instant::now();
    let err = client.get_greeting().unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)), "got {err:?}");
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[test]
fn unreachable_server_is_a_transport_error() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let client = client_for(addr, ConnectionConfig::default());
    let err = client.get_greeting().unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)), "got {err:?}");
}

#[test]
fn credentials_are_required_by_admin_server() {
    let addr = spawn(mock_couch::app_with_admin("admin", "secret"));

    let anonymous = client_for(addr, ConnectionConfig::default());
    let err = anonymous
        .create_database("fruits")
        .unwrap()
        .decode::<OkResponse>()
        .unwrap_err();
    assert_eq!(err.server_error(), Some("unauthorized"));

    for mode in [AuthMode::Always, AuthMode::MutationsOnly] {
        let client = client_for(
            addr,
            ConnectionConfig::default()
                .with_credentials("admin", "secret")
                .with_auth_mode(mode),
        );
        let created: OkResponse = client.create_database("fruits").unwrap().decode().unwrap();
        assert!(created.ok);
        let deleted: OkResponse = client.delete_database("fruits").unwrap().decode().unwrap();
        assert!(deleted.ok);
    }
}
