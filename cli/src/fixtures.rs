//! Sample documents used by the smoke test (straight out of the CouchDB guide).

use serde_json::{json, Value};

/// Fixture names in creation order.
pub const FRUITS: [&str; 3] = ["apple", "orange", "banana"];

/// The fixture document for `name`, or `None` for an unknown fruit.
pub fn fruit(name: &str) -> Option<Value> {
    let doc = match name {
        "orange" => json!({
            "item": "orange",
            "prices": {
                "Fresh Mart": 1.99,
                "Price Max": 3.19,
                "Citrus Circus": 1.09
            }
        }),
        "apple" => json!({
            "item": "apple",
            "prices": {
                "Fresh Mart": 1.59,
                "Price Max": 5.99,
                "Apples Express": 0.79
            }
        }),
        "banana" => json!({
            "item": "banana",
            "prices": {
                "Fresh Mart": 1.99,
                "Price Max": 0.79,
                "Banana Montana": 4.22
            }
        }),
        _ => return None,
    };
    Some(doc)
}

/// The design document created at the end of the run. `map_source` is the
/// contents of the map file.
pub fn design_document(map_source: &str) -> Value {
    json!({
        "_id": DESIGN_ID,
        "views": {
            "foo": {
                "map": "function(doc){emit(doc._id, doc._rev)}"
            },
            "add_syntactic_category": {
                "map": map_source
            }
        }
    })
}

pub const DESIGN_ID: &str = "_design/example";
