//! Serde support for cell payloads
//!
//! A cell is either a bare JSON scalar (`42`, `"=A1*2"`, `true`, `null`) or an
//! object carrying a format code: `{ "v": 1234.5, "f": "$#,##0.00" }`.

use super::value::{CellValue, SpreadsheetCell};
use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Empty => serializer.serialize_unit(),
            CellValue::Number(n) => serializer.serialize_f64(*n),
            CellValue::Text(s) => serializer.serialize_str(s),
            CellValue::Boolean(b) => serializer.serialize_bool(*b),
        }
    }
}

struct CellValueVisitor;

impl<'de> Visitor<'de> for CellValueVisitor {
    type Value = CellValue;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number, string, boolean or null")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<CellValue, E> {
        Ok(CellValue::Boolean(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<CellValue, E> {
        Ok(CellValue::Number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<CellValue, E> {
        Ok(CellValue::Number(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<CellValue, E> {
        Ok(CellValue::Number(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<CellValue, E> {
        Ok(CellValue::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<CellValue, E> {
        Ok(CellValue::Text(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<CellValue, E> {
        Ok(CellValue::Empty)
    }

    fn visit_none<E: de::Error>(self) -> Result<CellValue, E> {
        Ok(CellValue::Empty)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<CellValue, D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(CellValueVisitor)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum CellRepr {
    Formatted {
        #[serde(default, alias = "value")]
        v: CellValue,
        #[serde(default, alias = "format", skip_serializing_if = "Option::is_none")]
        f: Option<String>,
    },
    Plain(CellValue),
}

impl Serialize for SpreadsheetCell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let repr = match &self.format {
            None => CellRepr::Plain(self.value.clone()),
            Some(format) => CellRepr::Formatted {
                v: self.value.clone(),
                f: Some(format.clone()),
            },
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SpreadsheetCell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match CellRepr::deserialize(deserializer)? {
            CellRepr::Formatted { v, f } => SpreadsheetCell {
                value: v,
                format: f,
            },
            CellRepr::Plain(value) => SpreadsheetCell::new(value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_deserialize_scalars_and_objects() {
        let cells: Vec<SpreadsheetCell> =
            serde_json::from_str(r#"[42, "=A1*2", true, null, {"v": 1234.5, "f": "$#,##0.00"}]"#)
                .unwrap();
        assert_eq!(
            cells,
            vec![
                SpreadsheetCell::new(42.0),
                SpreadsheetCell::formula("=A1*2"),
                SpreadsheetCell::new(true),
                SpreadsheetCell::empty(),
                SpreadsheetCell::with_format(1234.5, "$#,##0.00"),
            ]
        );
    }

    #[test]
    fn test_serialize_keeps_plain_cells_plain() {
        let json = serde_json::to_string(&vec![
            SpreadsheetCell::new("x"),
            SpreadsheetCell::with_format(0.5, "0%"),
        ])
        .unwrap();
        assert_eq!(json, r#"["x",{"v":0.5,"f":"0%"}]"#);
    }
}
