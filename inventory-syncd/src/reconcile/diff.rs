//! Field-level comparison of two translations of the same named object.
//!
//! Reports are informational. Nothing here writes to storage or to the
//! inventory system.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use serde::Serialize;
use serde_json::{Map, Value};
use crate::netbox::types::{NetboxDevice, NetboxInterface, NetboxInventoryItem, NetboxVlan};

/// Objects compared by display name
pub trait Named {
    fn name(&self) -> &str;
}

impl Named for NetboxDevice {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for NetboxInterface {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for NetboxInventoryItem {
    fn name(&self) -> &str {
        &self.name
    }
}

impl Named for NetboxVlan {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDiff {
    /// Dotted path of the field, e.g. `device_type.model`
    pub field: String,
    pub observed: Value,
    pub known: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiffReport {
    Equal,
    EmptyObservation,
    Changed(Vec<FieldDiff>),
}

impl fmt::Display for DiffReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffReport::Equal => f.write_str("equal"),
            DiffReport::EmptyObservation => f.write_str("empty observation"),
            DiffReport::Changed(fields) => {
                for (i, d) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {} -> {}", d.field, d.known, d.observed)?;
                }
                Ok(())
            }
        }
    }
}

/// Compare an observed translation against a known one.
///
/// Returns `None` when the two objects do not share a name.
pub fn diff<T>(observed: &T, known: &T) -> Option<DiffReport>
where
    T: Named + Serialize + Default + PartialEq,
{
    if *observed == T::default() {
        return Some(DiffReport::EmptyObservation);
    }
    if observed.name() != known.name() {
        return None;
    }
    if observed == known {
        return Some(DiffReport::Equal);
    }

    let observed = flatten(observed);
    let known = flatten(known);

    let fields: BTreeSet<&String> = observed.keys().chain(known.keys()).collect();

    let diffs = fields
        .into_iter()
        .filter_map(|field| {
            let o = observed.get(field).cloned().unwrap_or(Value::Null);
            let k = known.get(field).cloned().unwrap_or(Value::Null);
            (o != k).then(|| FieldDiff { field: field.clone(), observed: o, known: k })
        })
        .collect();

    Some(DiffReport::Changed(diffs))
}

fn flatten<T: Serialize>(value: &T) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => flatten_into(&mut out, "", map),
        Ok(other) => {
            out.insert(String::new(), other);
        }
        Err(e) => tracing::debug!(error = %e, "Unserializable diff operand"),
    }
    out
}

fn flatten_into(out: &mut BTreeMap<String, Value>, prefix: &str, map: Map<String, Value>) {
    for (key, value) in map {
        let path = if prefix.is_empty() { key } else { format!("{}.{}", prefix, key) };
        match value {
            Value::Object(inner) => flatten_into(out, &path, inner),
            other => {
                out.insert(path, other);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::netbox::types::{DeviceTypeRef, NamedObject};

    fn sw(serial: &str) -> NetboxDevice {
        NetboxDevice {
            name: "sw1".to_string(),
            status: "alive".to_string(),
            serial: serial.to_string(),
            device_type: Some(DeviceTypeRef {
                model: "vEOS".to_string(),
                manufacturer: NamedObject::named("Arista"),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_serial_only_diff() {
        let report = diff(&sw("B"), &sw("A")).unwrap();
        assert_eq!(
            report,
            DiffReport::Changed(vec![FieldDiff {
                field: "serial".to_string(),
                observed: json!("B"),
                known: json!("A"),
            }])
        );
        assert_eq!(report.to_string(), "serial: \"A\" -> \"B\"");
    }

    #[test]
    fn test_equal_marker() {
        assert_eq!(diff(&sw("A"), &sw("A")), Some(DiffReport::Equal));
    }

    #[test]
    fn test_empty_observation_marker() {
        assert_eq!(diff(&NetboxDevice::default(), &sw("A")), Some(DiffReport::EmptyObservation));
    }

    #[test]
    fn test_name_mismatch_has_no_report() {
        let mut other = sw("A");
        other.name = "sw2".to_string();
        assert_eq!(diff(&sw("A"), &other), None);
    }

    #[test]
    fn test_nested_field_diff() {
        let mut known = sw("A");
        known.device_type = Some(DeviceTypeRef {
            model: "DCS-7050".to_string(),
            manufacturer: NamedObject::named("Arista"),
        });

        let Some(DiffReport::Changed(fields)) = diff(&sw("A"), &known) else {
            panic!("expected a diff");
        };
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field, "device_type.model");
    }
}
