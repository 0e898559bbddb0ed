use serde::Serialize;
use serde_json::{Map, Value};

/// Inferred scalar type of a legacy parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Text,
    Number,
    Bool,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::Text => "text",
            ParamType::Number => "number",
            ParamType::Bool => "bool",
        }
    }
}

/// A parameter value as found in the store, classified once at the boundary.
///
/// Downstream code matches on this union instead of re-inspecting JSON types.
/// `Canonical` holds the original object verbatim so an already-migrated
/// descriptor passes through byte-identical, extra fields included.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    RawString(String),
    RawNumber(serde_json::Number),
    RawBool(bool),
    Canonical(Map<String, Value>),
    /// null, an array, or an object without a `value` key. Not a legacy
    /// scalar and not a descriptor; kept untouched by the normalizer.
    Unsupported(Value),
}

impl ParamValue {
    pub fn classify(value: &Value) -> ParamValue {
        match value {
            Value::String(s) => ParamValue::RawString(s.clone()),
            Value::Number(n) => ParamValue::RawNumber(n.clone()),
            Value::Bool(b) => ParamValue::RawBool(*b),
            Value::Object(map) if map.contains_key("value") => ParamValue::Canonical(map.clone()),
            other => ParamValue::Unsupported(other.clone()),
        }
    }

    fn scalar_type(&self) -> Option<ParamType> {
        match self {
            ParamValue::RawBool(_) => Some(ParamType::Bool),
            ParamValue::RawNumber(_) => Some(ParamType::Number),
            ParamValue::RawString(_) => Some(ParamType::Text),
            ParamValue::Canonical(_) | ParamValue::Unsupported(_) => None,
        }
    }
}

/// Derive a display label from a parameter name: underscores become spaces,
/// then the first letter of each word is uppercased. Other characters are
/// left as-is.
///
/// `raum_groesse` -> `Raum Groesse`
pub fn derive_label(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut out = String::with_capacity(spaced.len());
    let mut at_word_start = true;
    for ch in spaced.chars() {
        if at_word_start && ch.is_alphabetic() {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        at_word_start = !ch.is_alphanumeric();
    }
    out
}

/// A parameter the normalizer refused to rewrite, with the reason.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SkippedParam {
    pub category: String,
    pub param: String,
    pub reason: String,
}

/// Result of normalizing one record's `categories` map.
#[derive(Debug, Clone)]
pub struct NormalizeOutcome {
    pub categories: Map<String, Value>,
    pub changed: bool,
    pub params_rewritten: usize,
    pub skipped: Vec<SkippedParam>,
}

/// Rebuild a `categories` map so every parameter value is a canonical
/// `{value, label, type}` descriptor.
///
/// Pure input-to-output transform: insertion order is preserved, canonical
/// values are copied unchanged, and unsupported shapes are kept verbatim and
/// reported in `skipped` rather than guessed at. `changed` is true only when
/// at least one legacy scalar was rewritten, so running this twice over the
/// same data reports no change on the second pass.
pub fn normalize_categories(categories: &Map<String, Value>) -> NormalizeOutcome {
    let mut out = Map::new();
    let mut changed = false;
    let mut params_rewritten = 0usize;
    let mut skipped = Vec::new();

    for (cat_name, cat_value) in categories {
        let Some(params) = cat_value.as_object() else {
            skipped.push(SkippedParam {
                category: cat_name.clone(),
                param: String::new(),
                reason: format!("category payload is {}, expected a parameter map", value_kind(cat_value)),
            });
            out.insert(cat_name.clone(), cat_value.clone());
            continue;
        };

        let mut new_params = Map::new();
        for (param_name, param_value) in params {
            match ParamValue::classify(param_value) {
                ParamValue::Canonical(obj) => {
                    new_params.insert(param_name.clone(), Value::Object(obj));
                }
                ParamValue::Unsupported(original) => {
                    skipped.push(SkippedParam {
                        category: cat_name.clone(),
                        param: param_name.clone(),
                        reason: format!("unsupported value shape ({})", value_kind(&original)),
                    });
                    new_params.insert(param_name.clone(), original);
                }
                raw => {
                    // scalar_type is always Some for the raw variants
                    let ty = raw.scalar_type().unwrap_or(ParamType::Text);
                    let mut descriptor = Map::new();
                    descriptor.insert("value".to_string(), param_value.clone());
                    descriptor.insert("label".to_string(), Value::String(derive_label(param_name)));
                    descriptor.insert("type".to_string(), Value::String(ty.as_str().to_string()));
                    new_params.insert(param_name.clone(), Value::Object(descriptor));
                    changed = true;
                    params_rewritten += 1;
                }
            }
        }
        out.insert(cat_name.clone(), Value::Object(new_params));
    }

    NormalizeOutcome {
        categories: out,
        changed,
        params_rewritten,
        skipped,
    }
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn label_capitalizes_each_word() {
        assert_eq!(derive_label("raum_groesse"), "Raum Groesse");
        assert_eq!(derive_label("deckenhoehe"), "Deckenhoehe");
        assert_eq!(derive_label("hat_fenster"), "Hat Fenster");
        assert_eq!(derive_label("strom_230v"), "Strom 230v");
        assert_eq!(derive_label(""), "");
    }

    #[test]
    fn number_param_becomes_number_descriptor() {
        let cats = as_map(json!({ "bau": { "deckenhoehe": 2.5 } }));
        let outcome = normalize_categories(&cats);
        assert!(outcome.changed);
        assert_eq!(outcome.params_rewritten, 1);
        assert_eq!(
            Value::Object(outcome.categories),
            json!({ "bau": { "deckenhoehe": { "value": 2.5, "label": "Deckenhoehe", "type": "number" } } })
        );
    }

    #[test]
    fn bool_param_becomes_bool_descriptor() {
        let cats = as_map(json!({ "bau": { "hat_fenster": true } }));
        let outcome = normalize_categories(&cats);
        assert_eq!(
            Value::Object(outcome.categories),
            json!({ "bau": { "hat_fenster": { "value": true, "label": "Hat Fenster", "type": "bool" } } })
        );
    }

    #[test]
    fn string_param_becomes_text_descriptor() {
        let cats = as_map(json!({ "bau": { "bodenbelag": "Linoleum" } }));
        let outcome = normalize_categories(&cats);
        assert_eq!(
            Value::Object(outcome.categories),
            json!({ "bau": { "bodenbelag": { "value": "Linoleum", "label": "Bodenbelag", "type": "text" } } })
        );
    }

    #[test]
    fn canonical_descriptor_passes_through_unchanged() {
        let cats = as_map(json!({
            "bau": { "material": { "value": "Holz", "label": "Material", "type": "text" } }
        }));
        let outcome = normalize_categories(&cats);
        assert!(!outcome.changed);
        assert_eq!(outcome.params_rewritten, 0);
        assert_eq!(Value::Object(outcome.categories), Value::Object(cats));
    }

    #[test]
    fn canonical_descriptor_keeps_extra_fields() {
        let cats = as_map(json!({
            "bau": { "material": { "value": "Holz", "label": "Material", "type": "text", "unit": "m" } }
        }));
        let outcome = normalize_categories(&cats);
        assert!(!outcome.changed);
        assert_eq!(Value::Object(outcome.categories), Value::Object(cats));
    }

    #[test]
    fn empty_categories_map_is_unchanged() {
        let outcome = normalize_categories(&Map::new());
        assert!(!outcome.changed);
        assert!(outcome.categories.is_empty());
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn mixed_categories_report_change_once() {
        let cats = as_map(json!({
            "elektro": { "steckdosen": 4 },
            "bau": { "material": { "value": "Holz", "label": "Material", "type": "text" } }
        }));
        let outcome = normalize_categories(&cats);
        assert!(outcome.changed);
        assert_eq!(outcome.params_rewritten, 1);
        assert_eq!(
            outcome.categories.get("bau"),
            cats.get("bau"),
            "canonical category must be untouched"
        );
    }

    #[test]
    fn unsupported_shapes_are_kept_verbatim_and_reported() {
        let cats = as_map(json!({
            "bau": {
                "leer": null,
                "liste": [1, 2, 3],
                "ohne_value": { "label": "X" }
            }
        }));
        let outcome = normalize_categories(&cats);
        assert!(!outcome.changed);
        assert_eq!(outcome.skipped.len(), 3);
        assert_eq!(Value::Object(outcome.categories), Value::Object(cats));
        assert_eq!(outcome.skipped[0].reason, "unsupported value shape (null)");
        assert_eq!(outcome.skipped[1].reason, "unsupported value shape (array)");
        assert_eq!(outcome.skipped[2].reason, "unsupported value shape (object)");
    }

    #[test]
    fn non_map_category_payload_is_kept_and_reported() {
        let cats = as_map(json!({ "bau": "kaputt" }));
        let outcome = normalize_categories(&cats);
        assert!(!outcome.changed);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].category, "bau");
        assert_eq!(Value::Object(outcome.categories), Value::Object(cats));
    }

    #[test]
    fn normalization_is_idempotent() {
        let cats = as_map(json!({
            "elektro": { "steckdosen": 4, "hat_starkstrom": false },
            "bau": { "bodenbelag": "Linoleum" }
        }));
        let first = normalize_categories(&cats);
        assert!(first.changed);
        let second = normalize_categories(&first.categories);
        assert!(!second.changed);
        assert_eq!(second.params_rewritten, 0);
        assert_eq!(first.categories, second.categories);
    }

    #[test]
    fn insertion_order_is_preserved() {
        let cats = as_map(json!({
            "wasser": { "zulauf": true, "ablauf": false },
            "elektro": { "steckdosen": 4 }
        }));
        let outcome = normalize_categories(&cats);
        let cat_names: Vec<&String> = outcome.categories.keys().collect();
        assert_eq!(cat_names, vec!["wasser", "elektro"]);
        let params: Vec<&String> = outcome.categories["wasser"]
            .as_object()
            .unwrap()
            .keys()
            .collect();
        assert_eq!(params, vec!["zulauf", "ablauf"]);
    }
}
