//! Decoding of the parser service's JSON output
//!
//! The service answers with `{"beads": [{"type": "...", ...}, ...]}`, or with
//! `{"error": "..."}` when the request failed. Kinds the engine does not model
//! (dates, timestamps) are skipped.

use serde_json::Value;
use tracing::{debug, warn};
use zobot_domain::{Bead, BeadParser, Entity, ParseError};

/// Decode a parser service response into beads
///
/// `entlist` items expand into one entity bead per listed entity. Items that
/// fail to decode are logged and dropped; the rest of the utterance is kept.
pub fn beads_from_json(response: &Value) -> Result<Vec<Bead>, ParseError> {
    if let Some(error) = response.get("error") {
        return Err(ParseError::new(error.to_string()));
    }

    let items = match response.get("beads") {
        Some(Value::Array(items)) => items,
        Some(_) => return Err(ParseError::new("`beads` is not an array")),
        None => return Ok(Vec::new()),
    };

    let mut beads = Vec::with_capacity(items.len());
    for item in items {
        match item.get("type").and_then(Value::as_str) {
            Some("entlist") => {
                let listed = item.get("data").and_then(Value::as_array);
                for ent in listed.into_iter().flatten() {
                    match serde_json::from_value::<Entity>(ent.clone()) {
                        Ok(ent) => beads.push(Bead::Entity(ent)),
                        Err(e) => warn!("Skipping malformed entlist entity: {}", e),
                    }
                }
            }
            Some(kind) => match serde_json::from_value::<Bead>(item.clone()) {
                Ok(bead) => beads.push(bead),
                Err(e) => debug!("Skipping bead of kind '{}': {}", kind, e),
            },
            None => warn!("Skipping bead without a type tag"),
        }
    }

    Ok(beads)
}

/// Parser backed by a function returning the service's JSON response
///
/// The transport (HTTP, cache, ...) stays outside the workspace; this adapter
/// only owns the decoding.
pub struct JsonBeadParser<F> {
    fetch: F,
}

impl<F> JsonBeadParser<F>
where
    F: Fn(&str) -> Result<Value, ParseError>,
{
    /// Create a parser around a fetch function
    pub fn new(fetch: F) -> Self {
        Self { fetch }
    }
}

impl<F> BeadParser for JsonBeadParser<F>
where
    F: Fn(&str) -> Result<Value, ParseError>,
{
    fn parse(&self, text: &str) -> Result<Vec<Bead>, ParseError> {
        let response = (self.fetch)(text)?;
        beads_from_json(&response)
    }
}
