//! Canned API responses used as offline fallbacks and in tests

use serde_json::Value;
use std::collections::HashMap;

// Include the auto-generated fixture table
include!(concat!(env!("OUT_DIR"), "/fixtures.rs"));

/// Get a fixture by area and name
pub fn get_fixture(area: &str, name: &str) -> Option<&'static str> {
    FIXTURES
        .iter()
        .find(|(a, n, _)| a == &area && n == &name)
        .map(|(_, _, content)| *content)
}

/// Get a fixture as parsed JSON
pub fn get_fixture_json(area: &str, name: &str) -> Option<Value> {
    get_fixture(area, name).and_then(|content| serde_json::from_str(content).ok())
}

/// List all fixtures for a given area
pub fn list_fixtures(area: &str) -> Vec<&'static str> {
    FIXTURES
        .iter()
        .filter(|(a, _, _)| a == &area)
        .map(|(_, name, _)| *name)
        .collect()
}

/// List all available fixtures grouped by area
pub fn list_all_fixtures() -> HashMap<&'static str, Vec<&'static str>> {
    let mut result = HashMap::new();

    for (area, name, _) in FIXTURES {
        result.entry(*area).or_insert_with(Vec::new).push(*name);
    }

    result
}
