//! Scripted smoke test of a live FieldDB/CouchDB service.
//!
//! `Tester::run` walks a fixed sequence (greeting, database list, create,
//! documents, update, replicate, all-docs, design document, clean-up) where
//! each step relies on the previous one. The first failed check aborts the
//! run; databases created so far are left behind.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, ensure, Context, Result};
use fielddb_core::{
    revision_generation, AllDocs, ClientError, Document, DocumentResponse, FieldDbClient,
    OkResponse, ReplicationResponse, ResponseBody,
};
use serde_json::{json, Value};
use tracing::debug;

use crate::fixtures::{design_document, fruit, DESIGN_ID, FRUITS};

pub struct Tester<'a> {
    client: &'a FieldDbClient,
    database_name: String,
    clone_name: String,
    map_file: PathBuf,
}

impl<'a> Tester<'a> {
    pub fn new(client: &'a FieldDbClient) -> Self {
        Self {
            client,
            database_name: "fruits".to_string(),
            clone_name: "fruits_clone".to_string(),
            map_file: PathBuf::from("map1.js"),
        }
    }

    pub fn with_databases(mut self, database_name: &str, clone_name: &str) -> Self {
        self.database_name = database_name.to_string();
        self.clone_name = clone_name.to_string();
        self
    }

    pub fn with_map_file(mut self, map_file: impl Into<PathBuf>) -> Self {
        self.map_file = map_file.into();
        self
    }

    /// Delete the test database and its clone if they exist.
    pub fn clean_up(&self) -> Result<()> {
        let database_list = self.database_list()?;
        for name in [&self.database_name, &self.clone_name] {
            if database_list.contains(name) {
                debug!(database = %name, "deleting");
                let deleted: OkResponse = self
                    .client
                    .delete_database(name)?
                    .decode()
                    .with_context(|| format!("deleting database {name:?}"))?;
                ensure!(deleted.ok, "deleting database {name:?} was not acknowledged");
            }
        }
        Ok(())
    }

    pub fn run(&self) -> Result<()> {
        println!("\nTesting the FieldDB client.");
        let db = self.database_name.as_str();

        self.clean_up().context("initial clean-up")?;

        // Greeting.
        let greeting = self.client.get_greeting().context("fetching greeting")?;
        let has_couchdb = greeting
            .as_json()
            .and_then(Value::as_object)
            .is_some_and(|object| object.contains_key("couchdb"));
        ensure!(has_couchdb, "greeting has no \"couchdb\" key: {greeting:?}");
        println!("... Got CouchDB greeting.");

        // Database list.
        let body = self.client.get_database_list().context("fetching database list")?;
        ensure!(
            body.as_json().is_some_and(Value::is_array),
            "database list is not an array: {body:?}"
        );
        let database_list: Vec<String> = body.decode().context("decoding database list")?;
        println!("... Got database list.");

        // Create the database.
        if !database_list.iter().any(|name| name == db) {
            let created: OkResponse = self
                .client
                .create_database(db)?
                .decode()
                .with_context(|| format!("creating database {db:?}"))?;
            ensure!(created.ok, "creating database {db:?} was not acknowledged");
            println!("... Created database \"{db}\".");
        } else {
            println!("... Database \"{db}\" already exists.");
        }

        // Create documents.
        let mut ids = BTreeMap::new();
        for name in FRUITS {
            let created = self.create_fruit(name)?;
            ensure!(created.ok, "creating {name} was not acknowledged");
            ensure!(
                created.id.len() == 32,
                "{name} id {:?} is not a 32-character uuid",
                created.id
            );
            ids.insert(name, created.id);
        }
        println!("... Created apple, orange, and banana documents.");

        // Get a document; banana is the one fetched and updated.
        let banana_id = ids["banana"].as_str();
        let banana = self.get(banana_id)?;
        ensure!(
            string_field(&banana, "_id") == Some(banana_id),
            "fetched banana has the wrong _id: {banana:?}"
        );
        let rev = string_field(&banana, "_rev")
            .context("fetched banana has no _rev")?
            .to_string();
        ensure!(revision_generation(&rev) == Some(1), "banana revision {rev} is not generation 1");
        ensure!(banana.contains_key("item"), "fetched banana has no item");
        ensure!(
            banana.get("prices").is_some_and(Value::is_object),
            "fetched banana prices are not an object"
        );
        println!("... Retrieved the banana document.");

        // Update a document.
        let mut new_banana = fruit("banana").context("banana fixture")?;
        new_banana["foo"] = json!("bar");
        new_banana["item"] = json!("waaaaanana");
        let updated: DocumentResponse = self
            .client
            .update_document(db, banana_id, &rev, &new_banana)?
            .decode()
            .context("updating banana")?;
        ensure!(
            updated.generation() == Some(2),
            "updated revision {} is not generation 2",
            updated.rev
        );
        ensure!(updated.ok, "banana update was not acknowledged");
        ensure!(updated.id == banana_id, "update answered for id {}", updated.id);
        println!("... Updated the banana document.");

        // The revision we just used is stale now.
        let stale = self
            .client
            .update_document(db, banana_id, &rev, &new_banana)?
            .decode::<DocumentResponse>();
        match stale {
            Err(ClientError::Server { error, .. }) if error == "conflict" => {}
            other => bail!("update with stale revision {rev} was not rejected: {other:?}"),
        }
        println!("... Rejected an update with a stale revision.");

        // Get the updated document.
        let new_banana = self.get(banana_id)?;
        ensure!(
            string_field(&new_banana, "_id") == Some(banana_id),
            "re-fetched banana has the wrong _id"
        );
        ensure!(
            string_field(&new_banana, "item") == Some("waaaaanana"),
            "banana update did not round-trip: {new_banana:?}"
        );
        ensure!(
            string_field(&new_banana, "_rev").and_then(revision_generation) == Some(2),
            "re-fetched banana is not at generation 2"
        );
        println!("... Retrieved the updated banana.");

        // Replicate the database.
        let replicated: ReplicationResponse = self
            .client
            .replicate_database(db, &self.clone_name)?
            .decode()
            .with_context(|| format!("replicating {db:?} to {:?}", self.clone_name))?;
        ensure!(replicated.ok, "replication was not acknowledged");
        let new_database_list = self.database_list()?;
        ensure!(
            new_database_list.len() == database_list.len() + 2,
            "expected {} databases after replication, found {:?}",
            database_list.len() + 2,
            new_database_list
        );
        println!("... Replicated database \"{db}\".");

        // All documents.
        let all_docs: AllDocs = self
            .client
            .get_all_docs_list(db)?
            .decode()
            .context("listing all documents")?;
        ensure!(
            all_docs.rows.len() == 3 && all_docs.total_rows == 3,
            "expected 3 documents, found {} rows (total_rows {})",
            all_docs.rows.len(),
            all_docs.total_rows
        );
        println!("... Got the three fruit documents in the database.");

        // Design document.
        let map_source = fs::read_to_string(&self.map_file)
            .with_context(|| format!("reading map file {}", self.map_file.display()))?;
        let created: DocumentResponse = self
            .client
            .create_document(db, &design_document(&map_source))?
            .decode()
            .context("creating design document")?;
        ensure!(created.id == DESIGN_ID, "design document got id {}", created.id);
        ensure!(
            created.generation() == Some(1),
            "design document revision {} is not generation 1",
            created.rev
        );
        println!("... Created a design document.");

        self.clean_up().context("final clean-up")?;
        println!();
        Ok(())
    }

    fn create_fruit(&self, name: &str) -> Result<DocumentResponse> {
        let doc = fruit(name).with_context(|| format!("no fixture named {name}"))?;
        self.client
            .create_document(&self.database_name, &doc)?
            .decode()
            .with_context(|| format!("creating {name}"))
    }

    fn get(&self, id: &str) -> Result<Document> {
        self.client
            .get_document(&self.database_name, id)?
            .decode()
            .with_context(|| format!("fetching document {id}"))
    }

    fn database_list(&self) -> Result<Vec<String>> {
        let body: ResponseBody = self.client.get_database_list().context("fetching database list")?;
        body.decode().context("decoding database list")
    }
}

fn string_field<'d>(doc: &'d Document, key: &str) -> Option<&'d str> {
    doc.get(key).and_then(Value::as_str)
}
