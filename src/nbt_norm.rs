use crate::error::{ParseError, Result};
use crate::nbt::{NbtCompound, NbtValue};
use serde_json::{Map, Number, Value};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Parse a BetterQuesting document into its typed tree.
///
/// Keys carry NBT type suffixes (`"name:8"`, `"tasks:9"`); the suffix picks
/// the decoding and is stripped from the resulting key. Keys without a
/// suffix are decoded from the JSON shape of their value.
pub fn parse_document(text: &str) -> Result<NbtCompound> {
    let v: Value = serde_json::from_str(text)?;
    match v {
        Value::Object(map) => decode_compound(map),
        _ => Err(ParseError::InvalidFormat("root not an object".into())),
    }
}

pub fn parse_document_reader<R: Read>(mut r: R) -> Result<NbtCompound> {
    let mut s = String::new();
    r.read_to_string(&mut s)?;
    parse_document(&s)
}

pub fn parse_document_file(path: &Path) -> Result<NbtCompound> {
    let s = fs::read_to_string(path)?;
    parse_document(&s)
}

/// Splits `"name:10"` into `("name", 10)`. Keys without a numeric suffix, or
/// with nothing before the colon, yield `None`.
fn split_type_suffix(key: &str) -> Option<(&str, u32)> {
    let (name, code) = key.rsplit_once(':')?;
    if name.is_empty() || code.is_empty() || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((name, code.parse().ok()?))
}

fn decode_compound(m: Map<String, Value>) -> Result<NbtCompound> {
    let mut out = NbtCompound::new();
    for (k, v) in m {
        match split_type_suffix(&k) {
            Some((name, code)) => {
                let val = decode_typed(v, code)?;
                out.insert(name, val);
            }
            None => {
                let val = infer_value(v)?;
                out.insert(k, val);
            }
        }
    }
    Ok(out)
}

fn decode_typed(v: Value, code: u32) -> Result<NbtValue> {
    if v.is_null() {
        return Ok(NbtValue::Null);
    }
    let decoded = match code {
        1 => match &v {
            Value::Bool(b) => NbtValue::Bool(*b),
            _ => NbtValue::Bool(int_of(&v, code)? != 0),
        },
        2 | 3 => NbtValue::Int(int32_of(&v, code)?),
        4 => NbtValue::Long(int_of(&v, code)?),
        5 => NbtValue::Float(float_of(&v, code)? as f32),
        6 => NbtValue::Double(float_of(&v, code)?),
        8 => NbtValue::String(match v {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            other => return Err(mismatch(&other, code)),
        }),
        9 => match v {
            Value::Object(map) => NbtValue::List(decode_list(map)?),
            other => return Err(mismatch(&other, code)),
        },
        10 => match v {
            Value::Object(map) => NbtValue::Compound(decode_compound(map)?),
            other => return Err(mismatch(&other, code)),
        },
        11 => match &v {
            Value::Array(arr) => NbtValue::List(
                arr.iter()
                    .map(|e| int32_of(e, code).map(NbtValue::Int))
                    .collect::<Result<Vec<_>>>()?,
            ),
            _ => NbtValue::List(Vec::new()),
        },
        _ => NbtValue::String(v.to_string()),
    };
    Ok(decoded)
}

/// Lists are stored as objects keyed `"<index>:<type>"`. Keys whose index is
/// not a number are skipped; the rest are emitted in index order.
fn decode_list(m: Map<String, Value>) -> Result<Vec<NbtValue>> {
    let mut items: Vec<(u64, NbtValue)> = Vec::with_capacity(m.len());
    for (k, v) in m {
        let (index, code) = match split_type_suffix(&k) {
            Some((idx, code)) => (idx, Some(code)),
            None => (k.as_str(), None),
        };
        let Ok(index) = index.parse::<u64>() else {
            continue;
        };
        let val = match code {
            Some(code) => decode_typed(v, code)?,
            None => infer_value(v)?,
        };
        items.push((index, val));
    }
    items.sort_by_key(|(idx, _)| *idx);
    Ok(items.into_iter().map(|(_, v)| v).collect())
}

fn infer_value(v: Value) -> Result<NbtValue> {
    Ok(match v {
        Value::Null => NbtValue::Null,
        Value::Bool(b) => NbtValue::Bool(b),
        Value::Number(n) => infer_number(&n),
        Value::String(s) => NbtValue::String(s),
        Value::Object(map) => NbtValue::Compound(decode_compound(map)?),
        Value::Array(arr) => NbtValue::List(
            arr.into_iter()
                .map(infer_value)
                .collect::<Result<Vec<_>>>()?,
        ),
    })
}

fn infer_number(n: &Number) -> NbtValue {
    if let Some(i) = n.as_i64() {
        return NbtValue::Long(i);
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => {
            NbtValue::Long(f as i64)
        }
        Some(f) => NbtValue::Double(f),
        None => NbtValue::String(n.to_string()),
    }
}

fn int_of(v: &Value, code: u32) -> Result<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .ok_or_else(|| mismatch(v, code)),
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| mismatch(v, code)),
        _ => Err(mismatch(v, code)),
    }
}

fn int32_of(v: &Value, code: u32) -> Result<i32> {
    let n = int_of(v, code)?;
    i32::try_from(n).map_err(|_| mismatch(v, code))
}

fn float_of(v: &Value, code: u32) -> Result<f64> {
    match v {
        Value::Number(n) => n.as_f64().ok_or_else(|| mismatch(v, code)),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| mismatch(v, code)),
        _ => Err(mismatch(v, code)),
    }
}

fn mismatch(v: &Value, code: u32) -> ParseError {
    ParseError::InvalidFormat(format!("value {v} does not match type code {code}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &NbtValue) -> Vec<&str> {
        match v {
            NbtValue::List(items) => items.iter().filter_map(NbtValue::as_str).collect(),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn list_is_ordered_by_numeric_index() {
        let root = parse_document(r#"{"l:9": {"2:8": "c", "0:8": "a", "1:8": "b"}}"#).unwrap();
        assert_eq!(strings(root.get("l").unwrap()), vec!["a", "b", "c"]);
    }

    #[test]
    fn list_index_sorts_numerically_not_lexically() {
        let doc = r#"{"l:9": {"10:8": "k", "2:8": "c", "1:8": "b", "0:8": "a"}}"#;
        let root = parse_document(doc).unwrap();
        assert_eq!(strings(root.get("l").unwrap()), vec!["a", "b", "c", "k"]);
    }

    #[test]
    fn list_skips_keys_without_numeric_index() {
        let root = parse_document(r#"{"l:9": {"x:8": "bad", "1:8": "b", "0:8": "a", ":8": "no"}}"#)
            .unwrap();
        assert_eq!(strings(root.get("l").unwrap()), vec!["a", "b"]);
    }

    #[test]
    fn type_codes_decode_to_matching_variants() {
        let root = parse_document(
            r#"{
                "flag:1": 1,
                "off:1": 0,
                "short:2": 12,
                "int:3": -5,
                "long:4": 9007199254740993,
                "float:5": 1.5,
                "double:6": 2.25,
                "text:8": "hello",
                "nested:10": {"id:8": "minecraft:stone"},
                "ints:11": [1, 2, 3],
                "odd:7": [1, 2]
            }"#,
        )
        .unwrap();

        assert_eq!(root.get("flag"), Some(&NbtValue::Bool(true)));
        assert_eq!(root.get("off"), Some(&NbtValue::Bool(false)));
        assert_eq!(root.get("short"), Some(&NbtValue::Int(12)));
        assert_eq!(root.get("int"), Some(&NbtValue::Int(-5)));
        assert_eq!(root.get("long"), Some(&NbtValue::Long(9007199254740993)));
        assert_eq!(root.get("float"), Some(&NbtValue::Float(1.5)));
        assert_eq!(root.get("double"), Some(&NbtValue::Double(2.25)));
        assert_eq!(root.get_str("text"), Some("hello"));
        assert_eq!(
            root.get_compound("nested").and_then(|c| c.get_str("id")),
            Some("minecraft:stone")
        );
        assert_eq!(
            root.get("ints"),
            Some(&NbtValue::List(vec![
                NbtValue::Int(1),
                NbtValue::Int(2),
                NbtValue::Int(3)
            ]))
        );
        // unknown codes keep the raw text
        assert_eq!(root.get_str("odd"), Some("[1,2]"));
    }

    #[test]
    fn unsuffixed_keys_are_inferred() {
        let doc = r#"{"a": 3, "b": 0.5, "c": "s", "d": true, "e": {"f": [1, "x"]}, "g": null}"#;
        let root = parse_document(doc).unwrap();
        assert_eq!(root.get("a"), Some(&NbtValue::Long(3)));
        assert_eq!(root.get("b"), Some(&NbtValue::Double(0.5)));
        assert_eq!(root.get_str("c"), Some("s"));
        assert_eq!(root.get("d"), Some(&NbtValue::Bool(true)));
        assert_eq!(root.get("g"), Some(&NbtValue::Null));
        let e = root.get_compound("e").unwrap();
        assert_eq!(
            e.get_list("f").unwrap(),
            &[NbtValue::Long(1), NbtValue::String("x".into())]
        );
    }

    #[test]
    fn null_wins_over_declared_type() {
        let root = parse_document(r#"{"x:10": null, "y:3": null}"#).unwrap();
        assert_eq!(root.get("x"), Some(&NbtValue::Null));
        assert_eq!(root.get("y"), Some(&NbtValue::Null));
    }

    #[test]
    fn string_code_accepts_numbers_and_int_code_accepts_numeric_strings() {
        let root = parse_document(r#"{"s:8": 42, "n:3": "17"}"#).unwrap();
        assert_eq!(root.get_str("s"), Some("42"));
        assert_eq!(root.get_i32("n"), Some(17));
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        assert!(matches!(
            parse_document(r#"{"x:3": "abc"}"#),
            Err(ParseError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_document(r#"{"l:9": 5}"#),
            Err(ParseError::InvalidFormat(_))
        ));
        assert!(matches!(
            parse_document(r#"{"i:3": 4294967296}"#),
            Err(ParseError::InvalidFormat(_))
        ));
    }

    #[test]
    fn root_must_be_an_object() {
        assert!(matches!(
            parse_document("[1, 2]"),
            Err(ParseError::InvalidFormat(_))
        ));
        assert!(matches!(parse_document("{not json"), Err(ParseError::Json(_))));
    }

    #[test]
    fn suffix_split() {
        assert_eq!(split_type_suffix("name:8"), Some(("name", 8)));
        assert_eq!(split_type_suffix("minecraft:stone:10"), Some(("minecraft:stone", 10)));
        assert_eq!(split_type_suffix("plain"), None);
        assert_eq!(split_type_suffix("a:b"), None);
        assert_eq!(split_type_suffix(":3"), None);
    }
}
