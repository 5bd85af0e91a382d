// Test fixtures and envelope builders for integration tests

use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Map, Value};

/// Builds Debezium envelopes as raw message bodies
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    op: String,
    before: Value,
    after: Value,
    source: Map<String, Value>,
    ts_ms: Option<i64>,
    transaction: Option<Value>,
    schema: Value,
}

impl EnvelopeBuilder {
    pub fn new(op: &str) -> Self {
        Self {
            op: op.to_string(),
            before: Value::Null,
            after: Value::Null,
            source: Map::new(),
            ts_ms: Some(1_700_000_000_000),
            transaction: None,
            schema: Value::Null,
        }
    }

    pub fn create(after: Value) -> Self {
        Self::new("c").after(after)
    }

    pub fn update(before: Value, after: Value) -> Self {
        Self::new("u").before(before).after(after)
    }

    pub fn delete(before: Value) -> Self {
        Self::new("d").before(before)
    }

    pub fn before(mut self, before: Value) -> Self {
        self.before = before;
        self
    }

    pub fn after(mut self, after: Value) -> Self {
        self.after = after;
        self
    }

    pub fn source(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.source.insert(key.to_string(), value.into());
        self
    }

    pub fn database(self, db: &str) -> Self {
        self.source("db", db)
    }

    pub fn binlog(self, file: &str, pos: u64) -> Self {
        self.source("file", file).source("pos", pos)
    }

    pub fn ts_ms(mut self, ts_ms: i64) -> Self {
        self.ts_ms = Some(ts_ms);
        self
    }

    pub fn without_ts(mut self) -> Self {
        self.ts_ms = None;
        self
    }

    pub fn transaction(mut self, id: &str) -> Self {
        self.transaction = Some(json!({ "id": id, "total_order": 1 }));
        self
    }

    /// Attaches a (non-empty) schema block, which the decoder ignores
    pub fn with_schema(mut self) -> Self {
        self.schema = json!({
            "type": "struct",
            "name": "dbserver1.inventory.customers.Envelope",
            "fields": [{ "field": "before", "type": "struct", "optional": true }]
        });
        self
    }

    pub fn payload(&self) -> Value {
        let mut payload = Map::new();
        payload.insert("before".to_string(), self.before.clone());
        payload.insert("after".to_string(), self.after.clone());
        payload.insert("source".to_string(), Value::Object(self.source.clone()));
        payload.insert("op".to_string(), Value::String(self.op.clone()));
        if let Some(ts_ms) = self.ts_ms {
            payload.insert("ts_ms".to_string(), json!(ts_ms));
        }
        if let Some(transaction) = &self.transaction {
            payload.insert("transaction".to_string(), transaction.clone());
        }
        Value::Object(payload)
    }

    pub fn build(&self) -> Vec<u8> {
        serde_json::to_vec(&json!({ "schema": self.schema, "payload": self.payload() }))
            .expect("envelope serializes")
    }
}

/// The envelope of the reference update scenario
pub fn customer_update() -> EnvelopeBuilder {
    EnvelopeBuilder::update(
        json!({ "id": 1, "email": "old@x" }),
        json!({ "id": 1, "email": "new@x" }),
    )
    .database("inventory")
}

/// Malformed message bodies the decoder must reject
pub fn malformed_bodies() -> Vec<Vec<u8>> {
    vec![
        b"".to_vec(),
        b"not json".to_vec(),
        b"{\"payload\": {\"op\": \"c\"".to_vec(),
        b"{\"schema\": null}".to_vec(),
        b"{\"payload\": [1, 2, 3]}".to_vec(),
        b"{\"payload\": {\"op\": 42}}".to_vec(),
        b"[]".to_vec(),
        br#"[null, {"op": "c", "ts_ms": 1, "after": {"id": 1}}]"#.to_vec(),
    ]
}

/// Deterministic random row generator for reproducible tests
pub struct RowGenerator {
    rng: StdRng,
    next_id: u64,
}

impl RowGenerator {
    /// Creates a new generator with a fixed seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            next_id: 1,
        }
    }

    /// Generates a random string of specified length
    pub fn random_string(&mut self, len: usize) -> String {
        (&mut self.rng)
            .sample_iter(&Alphanumeric)
            .take(len)
            .map(char::from)
            .collect()
    }

    /// Generates a customer row with a fresh id
    pub fn customer(&mut self) -> Value {
        let id = self.next_id;
        self.next_id += 1;
        json!({
            "id": id,
            "first_name": self.random_string(8),
            "email": format!("{}@example.com", self.random_string(10).to_lowercase()),
            "balance": self.rng.gen_range(0..100_000),
            "active": self.rng.gen_bool(0.5),
        })
    }

    /// Generates a random envelope for one of the four operations
    pub fn envelope(&mut self) -> EnvelopeBuilder {
        let row = self.customer();
        let ts_ms = 1_700_000_000_000 + self.rng.gen_range(0..86_400_000);
        let builder = match self.rng.gen_range(0..4) {
            0 => EnvelopeBuilder::create(row),
            1 => {
                let mut after = row.clone();
                after["email"] = json!("changed@example.com");
                EnvelopeBuilder::update(row, after)
            }
            2 => EnvelopeBuilder::delete(row),
            _ => EnvelopeBuilder::new("r").after(row),
        };
        builder.database("inventory").ts_ms(ts_ms)
    }
}

impl Default for RowGenerator {
    fn default() -> Self {
        Self::new(42)
    }
}
