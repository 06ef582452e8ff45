//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::config::AppConfig;
use crate::orchestrator::Orchestrator;
use corral_core::{
    Corral, CorralError, Encoded, Record, RelationFilter, RelationRow, RelationType, ResourceId,
    ResourceType,
};
use std::sync::Arc;

// =============================================================================
// HELPERS
// =============================================================================

/// Open the configured stores and load every enabled resource.
fn load_context(config: &AppConfig) -> Result<Corral, CorralError> {
    let corral = Corral::open(&config.store)?;
    corral.load_all_from_disk()?;
    Ok(corral)
}

fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

/// Convert an encoded value to JSON. Bytes become arrays of integers,
/// sets become arrays in their canonical order.
pub fn encoded_to_json(value: &Encoded) -> serde_json::Value {
    use serde_json::Value;
    match value {
        Encoded::Null => Value::Null,
        Encoded::Bool(b) => Value::Bool(*b),
        Encoded::Int(i) => Value::from(*i),
        Encoded::Text(s) => Value::String(s.clone()),
        Encoded::Bytes(bytes) => Value::from(bytes.clone()),
        Encoded::List(items) => items.iter().map(encoded_to_json).collect(),
        Encoded::Set(items) => items.iter().map(encoded_to_json).collect(),
        Encoded::Map(map) => record_to_json(map),
    }
}

/// Convert a field record to a JSON object.
pub fn record_to_json(record: &Record) -> serde_json::Value {
    serde_json::Value::Object(
        record
            .iter()
            .map(|(key, value)| (key.clone(), encoded_to_json(value)))
            .collect(),
    )
}

fn relation_to_json(row: &RelationRow) -> serde_json::Value {
    serde_json::json!({
        "id": row.id.as_str(),
        "origin_type": row.origin_type.as_str(),
        "origin": row.origin.as_str(),
        "relation": row.relation.as_str(),
        "destination_type": row.destination_type.as_str(),
        "destination": row.destination.as_str(),
        "date": corral_core::types::format_timestamp(&row.date),
        "value": record_to_json(&row.value),
    })
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Create every configured store and apply the schema.
pub fn cmd_init(config: &AppConfig, json_mode: bool) -> Result<(), CorralError> {
    let corral = Corral::open(&config.store)?;
    corral.persistency().open_all()?;

    let mut stores = Vec::new();
    for name in corral.persistency().names() {
        let database = corral.persistency().database(name)?;
        stores.push((name.to_string(), database.location().to_string()));
    }

    if json_mode {
        let stores: serde_json::Map<String, serde_json::Value> = stores
            .into_iter()
            .map(|(name, location)| (name, serde_json::Value::String(location)))
            .collect();
        print_json(&serde_json::json!({ "initialized": true, "stores": stores }));
    } else {
        println!("Stores initialized:");
        for (name, location) in &stores {
            println!("  {:<10} {}", name, location);
        }
    }
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show resource counts per kind and the relation count.
pub fn cmd_status(config: &AppConfig, json_mode: bool) -> Result<(), CorralError> {
    let corral = Corral::open(&config.store)?;
    let report = corral.load_all_from_disk()?;
    let relations = corral.relations().count(&RelationFilter::any())?;
    let events = corral.events().len()?;

    if json_mode {
        let per_kind: serde_json::Map<String, serde_json::Value> = report
            .per_kind
            .iter()
            .map(|(kind, count)| (kind.as_str().to_string(), serde_json::Value::from(*count)))
            .collect();
        print_json(&serde_json::json!({
            "resources": report.total,
            "skipped": report.skipped,
            "per_kind": per_kind,
            "relations": relations,
            "events": events,
        }));
    } else {
        println!("Corral Status");
        println!("=============");
        for (kind, count) in &report.per_kind {
            println!("  {:<12} {}", kind.as_str(), count);
        }
        println!("  {:<12} {}", "total", report.total);
        if report.skipped > 0 {
            println!("  {:<12} {}", "disabled", report.skipped);
        }
        println!("Relations: {}", relations);
        println!("Events:    {}", events);
    }
    Ok(())
}

// =============================================================================
// SHOW COMMAND
// =============================================================================

/// Print a loaded resource, its outgoing relations and its status history.
///
/// Always prints JSON.
pub fn cmd_show(config: &AppConfig, raw_id: &str) -> Result<(), CorralError> {
    let id = ResourceId::parse(raw_id)?;
    let corral = load_context(config)?;
    let resource = corral.lookup(&id)?;

    let outgoing: Vec<serde_json::Value> = corral
        .relations()
        .get(&RelationFilter::any().origin(id.clone()))?
        .iter()
        .map(relation_to_json)
        .collect();
    let history: Vec<serde_json::Value> = corral
        .events()
        .history(&id)?
        .iter()
        .map(|event| {
            serde_json::json!({
                "seq": event.seq,
                "key": event.status.key,
                "value": event.status.value.as_str(),
            })
        })
        .collect();

    print_json(&serde_json::json!({
        "id": id.as_str(),
        "kind": resource.kind().as_str(),
        "name": resource.name(),
        "record": record_to_json(&resource.record()),
        "relations": outgoing,
        "events": history,
    }));
    Ok(())
}

// =============================================================================
// RELATIONS COMMAND
// =============================================================================

/// List relation rows matching the given filter.
pub fn cmd_relations(
    config: &AppConfig,
    json_mode: bool,
    origin: Option<&str>,
    destination: Option<&str>,
    relation: Option<RelationType>,
    origin_type: Option<ResourceType>,
    destination_type: Option<ResourceType>,
) -> Result<(), CorralError> {
    let mut filter = RelationFilter::any();
    if let Some(origin) = origin {
        filter = filter.origin(ResourceId::parse(origin)?);
    }
    if let Some(destination) = destination {
        filter = filter.destination(ResourceId::parse(destination)?);
    }
    if let Some(relation) = relation {
        filter = filter.relation(relation);
    }
    if let Some(kind) = origin_type {
        filter = filter.origin_type(kind);
    }
    if let Some(kind) = destination_type {
        filter = filter.destination_type(kind);
    }

    let corral = Corral::open(&config.store)?;
    let rows = corral.relations().get(&filter)?;

    if json_mode {
        let rows: Vec<serde_json::Value> = rows.iter().map(relation_to_json).collect();
        print_json(&serde_json::Value::Array(rows));
    } else {
        for row in &rows {
            println!("{} --{}--> {}", row.origin, row.relation, row.destination);
        }
        println!("{} relation(s)", rows.len());
    }
    Ok(())
}

// =============================================================================
// RUN COMMAND
// =============================================================================

/// Load the stores and run the orchestrator until interrupted.
pub async fn cmd_run(config: &AppConfig, json_mode: bool) -> Result<(), CorralError> {
    let corral = Arc::new(load_context(config)?);
    if !json_mode {
        println!(
            "Corral running with {} resource(s). Press Ctrl-C to stop.",
            corral.knowledge().len()
        );
    }

    let orchestrator = Orchestrator::new(Arc::clone(&corral), &config.orchestrator);
    orchestrator.forward_ctrl_c();
    let report = orchestrator.run().await?;

    if json_mode {
        print_json(&serde_json::json!({
            "ticks": report.ticks,
            "flushed": report.flushed,
        }));
    } else {
        println!("Stopped after {} tick(s).", report.ticks);
    }
    Ok(())
}
