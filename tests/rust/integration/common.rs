use std::sync::Arc;

use fedquery::federation::{ExecutorOptions, FederationExecutor, Record};
use fedquery::schema_mapping::{SchemaCompiler, SchemaMappingModel};
use fedquery::stores::{InMemoryDocumentStore, InMemoryGraphStore, StoreFixture};
use serde_json::{json, Value};

/// Mapping in the layout the generator writes: a document section, then one
/// graph element per label with an optional `path:` annotation.
pub const MAPPING: &str = r#"<?xml version='1.0' encoding='utf-8'?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
  <xs:element name="MongoDBUser">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="account_id" type="xs:string" />
        <xs:element name="name" type="xs:string" />
        <xs:element name="balance" type="xs:string" />
      </xs:sequence>
    </xs:complexType>
  </xs:element>
  <xs:element name="Neo4jNodes">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="Account">
          <xs:complexType>
            <xs:sequence>
              <xs:element name="account_id" type="xs:string" />
              <xs:element name="risk_score" type="xs:string" />
            </xs:sequence>
          </xs:complexType>
        </xs:element>
        <xs:element name="Payment">
          <xs:annotation>
            <xs:appinfo>path: (a:Account)-[:MADE_PAYMENT]-&gt;(p:Payment)</xs:appinfo>
          </xs:annotation>
          <xs:complexType>
            <xs:sequence>
              <xs:element name="payment_amount" type="xs:string" />
              <xs:element name="id" type="xs:string" />
            </xs:sequence>
          </xs:complexType>
        </xs:element>
        <xs:element name="Device">
          <xs:annotation>
            <xs:appinfo>path: (a:Account)-[:USES]-&gt;(d:Device)</xs:appinfo>
          </xs:annotation>
          <xs:complexType>
            <xs:sequence>
              <xs:element name="device_type" type="xs:string" />
            </xs:sequence>
          </xs:complexType>
        </xs:element>
        <xs:element name="Merchant">
          <xs:complexType>
            <xs:sequence>
              <xs:element name="merchant_name" type="xs:string" />
            </xs:sequence>
          </xs:complexType>
        </xs:element>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

/// A1 and A2 live in both stores, A3 only in the graph. A1 made two
/// payments, A3 one; A2 uses a device.
pub fn fixture() -> Value {
    json!({
        "documents": [
            {"account_id": "A2", "name": "Bob", "balance": 50},
            {"account_id": "A1", "name": "Alice", "balance": 100}
        ],
        "graph": {
            "nodes": [
                {"id": "a1", "labels": ["Account"], "properties": {"account_id": "A1", "risk_score": 7}},
                {"id": "a2", "labels": ["Account"], "properties": {"account_id": "A2", "risk_score": 2}},
                {"id": "a3", "labels": ["Account"], "properties": {"account_id": "A3", "risk_score": 9}},
                {"id": "p1", "labels": ["Payment"], "properties": {"id": "P1", "payment_amount": 10}},
                {"id": "p2", "labels": ["Payment"], "properties": {"id": "P2", "payment_amount": 20}},
                {"id": "p3", "labels": ["Payment"], "properties": {"id": "P3", "payment_amount": 5}},
                {"id": "d1", "labels": ["Device"], "properties": {"device_type": "mobile"}}
            ],
            "relationships": [
                {"from": "a1", "type": "MADE_PAYMENT", "to": "p1"},
                {"from": "a1", "type": "MADE_PAYMENT", "to": "p2"},
                {"from": "a3", "type": "MADE_PAYMENT", "to": "p3"},
                {"from": "a2", "type": "USES", "to": "d1"}
            ]
        }
    })
}

pub fn model() -> SchemaMappingModel {
    SchemaCompiler::default().compile_str(MAPPING).unwrap()
}

pub fn stores() -> (Arc<InMemoryDocumentStore>, Arc<InMemoryGraphStore>) {
    let fixture: StoreFixture = serde_json::from_value(fixture()).unwrap();
    let (documents, graph) = fixture.into_stores("Account", "account_id").unwrap();
    (Arc::new(documents), Arc::new(graph))
}

pub struct Harness {
    pub executor: FederationExecutor,
    pub documents: Arc<InMemoryDocumentStore>,
    pub graph: Arc<InMemoryGraphStore>,
}

pub fn harness() -> Harness {
    let (documents, graph) = stores();
    let executor = FederationExecutor::new(
        Arc::new(model()),
        documents.clone(),
        graph.clone(),
        ExecutorOptions::default(),
    );
    Harness {
        executor,
        documents,
        graph,
    }
}

pub fn row(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}
