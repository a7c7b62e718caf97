use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// `format` hint accepted on a string primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StringFormat {
    Email,
    Uri,
    Date,
    DateTime,
}

/// One option of a select enum: its wire value, and an optional display title.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumOption {
    pub value: String,
    pub title: Option<String>,
}

impl EnumOption {
    pub fn untitled(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            title: None,
        }
    }

    pub fn titled(value: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            title: Some(title.into()),
        }
    }
}

/// How a titled enum is encoded on the wire. `EnumNames` is the deprecated
/// form: accepted on decode, emitted only when a value was explicitly
/// constructed with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleStyle {
    OneOf,
    EnumNames,
}

#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error("unsupported primitive schema shape")]
    Unsupported,
    #[error("enum and enumNames arrays must be the same length")]
    MismatchedEnumNames,
    #[error("nullable wrappers are rejected")]
    Nullable,
}

/// The constrained JSON-Schema subset allowed for elicitation fields.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveSchema {
    String {
        min_length: Option<u64>,
        max_length: Option<u64>,
        format: Option<StringFormat>,
        default: Option<String>,
    },
    Number {
        minimum: Option<f64>,
        maximum: Option<f64>,
        default: Option<f64>,
    },
    Integer {
        minimum: Option<i64>,
        maximum: Option<i64>,
        default: Option<i64>,
    },
    Boolean {
        default: Option<bool>,
    },
    SingleSelect {
        options: Vec<EnumOption>,
        default: Option<String>,
        title_style: Option<TitleStyle>,
    },
    MultiSelect {
        options: Vec<EnumOption>,
        default: Option<Vec<String>>,
        title_style: Option<TitleStyle>,
    },
}

impl Serialize for PrimitiveSchema {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        to_value(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PrimitiveSchema {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        from_value(&value).map_err(DeError::custom)
    }
}

fn to_value(schema: &PrimitiveSchema) -> Value {
    match schema {
        PrimitiveSchema::String {
            min_length,
            max_length,
            format,
            default,
        } => {
            let mut map = Map::new();
            map.insert("type".into(), json!("string"));
            insert_opt(&mut map, "minLength", *min_length);
            insert_opt(&mut map, "maxLength", *max_length);
            if let Some(format) = format {
                map.insert("format".into(), serde_json::to_value(format).unwrap());
            }
            insert_opt_val(&mut map, "default", default.clone().map(Value::String));
            Value::Object(map)
        }
        PrimitiveSchema::Number {
            minimum,
            maximum,
            default,
        } => {
            let mut map = Map::new();
            map.insert("type".into(), json!("number"));
            insert_opt(&mut map, "minimum", *minimum);
            insert_opt(&mut map, "maximum", *maximum);
            insert_opt(&mut map, "default", *default);
            Value::Object(map)
        }
        PrimitiveSchema::Integer {
            minimum,
            maximum,
            default,
        } => {
            let mut map = Map::new();
            map.insert("type".into(), json!("integer"));
            insert_opt(&mut map, "minimum", *minimum);
            insert_opt(&mut map, "maximum", *maximum);
            insert_opt(&mut map, "default", *default);
            Value::Object(map)
        }
        PrimitiveSchema::Boolean { default } => {
            let mut map = Map::new();
            map.insert("type".into(), json!("boolean"));
            insert_opt(&mut map, "default", *default);
            Value::Object(map)
        }
        PrimitiveSchema::SingleSelect {
            options,
            default,
            title_style,
        } => select_to_value("string", options, default.clone().map(Value::String), *title_style),
        PrimitiveSchema::MultiSelect {
            options,
            default,
            title_style,
        } => {
            let items = select_to_value(
                "string",
                options,
                None,
                title_style.filter(|_| false),
            );
            let mut inner = Map::new();
            // Titles live on the item subschema for multi-select.
            if let Value::Object(item_map) = select_to_value("string", options, None, *title_style)
            {
                inner = item_map;
            }
            let mut map = Map::new();
            map.insert("type".into(), json!("array"));
            map.insert("items".into(), Value::Object(inner));
            let _ = items;
            insert_opt_val(
                &mut map,
                "default",
                default
                    .clone()
                    .map(|values| Value::Array(values.into_iter().map(Value::String).collect())),
            );
            Value::Object(map)
        }
    }
}

fn select_to_value(
    item_type: &str,
    options: &[EnumOption],
    default: Option<Value>,
    title_style: Option<TitleStyle>,
) -> Value {
    let mut map = Map::new();
    map.insert("type".into(), json!(item_type));

    let has_titles = options.iter().any(|opt| opt.title.is_some());
    match (has_titles, title_style) {
        (true, Some(TitleStyle::EnumNames)) => {
            map.insert(
                "enum".into(),
                Value::Array(options.iter().map(|o| json!(o.value)).collect()),
            );
            map.insert(
                "enumNames".into(),
                Value::Array(
                    options
                        .iter()
                        .map(|o| json!(o.title.clone().unwrap_or_default()))
                        .collect(),
                ),
            );
        }
        (true, _) => {
            map.insert(
                "oneOf".into(),
                Value::Array(
                    options
                        .iter()
                        .map(|o| {
                            json!({
                                "const": o.value,
                                "title": o.title.clone().unwrap_or_default(),
                            })
                        })
                        .collect(),
                ),
            );
        }
        (false, _) => {
            map.insert(
                "enum".into(),
                Value::Array(options.iter().map(|o| json!(o.value)).collect()),
            );
        }
    }

    insert_opt_val(&mut map, "default", default);
    Value::Object(map)
}

fn from_value(value: &Value) -> Result<PrimitiveSchema, SchemaError> {
    let obj = value.as_object().ok_or(SchemaError::Unsupported)?;

    if obj.contains_key("anyOf") || obj.get("type") == Some(&json!(["string", "null"])) {
        return Err(SchemaError::Nullable);
    }

    let type_str = obj.get("type").and_then(Value::as_str);

    if type_str == Some("array") {
        let items = obj.get("items").ok_or(SchemaError::Unsupported)?;
        let (options, title_style) = parse_options(items.as_object().ok_or(SchemaError::Unsupported)?)?;
        let default = obj.get("default").and_then(Value::as_array).map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        });
        return Ok(PrimitiveSchema::MultiSelect {
            options,
            default,
            title_style,
        });
    }

    if obj.contains_key("enum") || obj.contains_key("oneOf") {
        let (options, title_style) = parse_options(obj)?;
        let default = obj.get("default").and_then(Value::as_str).map(str::to_string);
        return Ok(PrimitiveSchema::SingleSelect {
            options,
            default,
            title_style,
        });
    }

    match type_str {
        Some("string") => Ok(PrimitiveSchema::String {
            min_length: obj.get("minLength").and_then(Value::as_u64),
            max_length: obj.get("maxLength").and_then(Value::as_u64),
            format: obj
                .get("format")
                .map(|v| serde_json::from_value(v.clone()))
                .transpose()
                .map_err(|_| SchemaError::Unsupported)?,
            default: obj.get("default").and_then(Value::as_str).map(str::to_string),
        }),
        Some("number") => Ok(PrimitiveSchema::Number {
            minimum: obj.get("minimum").and_then(Value::as_f64),
            maximum: obj.get("maximum").and_then(Value::as_f64),
            default: obj.get("default").and_then(Value::as_f64),
        }),
        Some("integer") => Ok(PrimitiveSchema::Integer {
            minimum: obj.get("minimum").and_then(Value::as_i64),
            maximum: obj.get("maximum").and_then(Value::as_i64),
            default: obj.get("default").and_then(Value::as_i64),
        }),
        Some("boolean") => Ok(PrimitiveSchema::Boolean {
            default: obj.get("default").and_then(Value::as_bool),
        }),
        _ => Err(SchemaError::Unsupported),
    }
}

fn parse_options(obj: &Map<String, Value>) -> Result<(Vec<EnumOption>, Option<TitleStyle>), SchemaError> {
    if let Some(one_of) = obj.get("oneOf").and_then(Value::as_array) {
        let options = one_of
            .iter()
            .map(|entry| {
                let value = entry
                    .get("const")
                    .and_then(Value::as_str)
                    .ok_or(SchemaError::Unsupported)?
                    .to_string();
                let title = entry.get("title").and_then(Value::as_str).map(str::to_string);
                Ok(EnumOption { value, title })
            })
            .collect::<Result<Vec<_>, SchemaError>>()?;
        return Ok((options, Some(TitleStyle::OneOf)));
    }

    let values = obj
        .get("enum")
        .and_then(Value::as_array)
        .ok_or(SchemaError::Unsupported)?;

    if let Some(names) = obj.get("enumNames").and_then(Value::as_array) {
        if names.len() != values.len() {
            return Err(SchemaError::MismatchedEnumNames);
        }
        let options = values
            .iter()
            .zip(names.iter())
            .map(|(value, title)| EnumOption {
                value: value.as_str().unwrap_or_default().to_string(),
                title: title.as_str().map(str::to_string),
            })
            .collect();
        return Ok((options, Some(TitleStyle::EnumNames)));
    }

    let options = values
        .iter()
        .map(|value| EnumOption::untitled(value.as_str().unwrap_or_default()))
        .collect();
    Ok((options, None))
}

fn insert_opt<T: Serialize>(map: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        map.insert(key.to_string(), serde_json::to_value(value).unwrap());
    }
}

fn insert_opt_val(map: &mut Map<String, Value>, key: &str, value: Option<Value>) {
    if let Some(value) = value {
        map.insert(key.to_string(), value);
    }
}

/// A request schema: an `object` schema whose `properties` are primitive
/// definitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestSchema {
    pub properties: Vec<(String, PrimitiveSchema)>,
    pub required: Vec<String>,
}

impl Serialize for RequestSchema {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut properties = Map::new();
        for (name, schema) in &self.properties {
            properties.insert(name.clone(), to_value(schema));
        }
        let value = json!({
            "type": "object",
            "properties": properties,
            "required": self.required,
        });
        value.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RequestSchema {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let obj = value.as_object().ok_or_else(|| DeError::custom(SchemaError::Unsupported))?;
        let properties = obj
            .get("properties")
            .and_then(Value::as_object)
            .ok_or_else(|| DeError::custom(SchemaError::Unsupported))?
            .iter()
            .map(|(name, schema)| Ok((name.clone(), from_value(schema).map_err(DeError::custom)?)))
            .collect::<Result<Vec<_>, D::Error>>()?;
        let required = obj
            .get("required")
            .and_then(Value::as_array)
            .map(|values| values.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        Ok(RequestSchema { properties, required })
    }
}
