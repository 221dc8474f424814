//! Turns raw view results into rows.
//!
//! The node does not promise one response layout. A result may be wrapped
//! in `{ "result": .. }`, nested one array too deep, laid out as parallel
//! column vectors, as a list of keyed objects, or as a bare list of values
//! for single-column queries. [`parse_rows`] recognises each layout and
//! always produces keyed [`Row`]s, so mappers only ever see one shape.

use crate::{
    address::AccountAddress,
    error::{
        NormalizationError,
        Result,
    },
};
use serde_json::{
    Map,
    Value,
};
use tracing::{
    debug,
    warn,
};

/// Column layout of one query, in the order the ledger returns them.
#[derive(Debug)]
pub struct Schema {
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    /// N parallel arrays, one per column.
    Columns,
    /// An array of keyed objects.
    Records,
    /// One record as a flat tuple of values.
    Tuple,
    /// A flat list of values for a single-column query.
    Scalars,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Parsed {
    pub shape: Shape,
    pub rows: Vec<Row>,
}

/// One record, keyed by raw field name.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Row(Map<String, Value>);

pub fn parse_rows(
    raw: &Value,
    schema: &Schema,
) -> std::result::Result<Parsed, NormalizationError> {
    let raw = strip_envelope(raw);
    let items = match raw {
        Value::Null => {
            return Ok(Parsed {
                shape: Shape::Records,
                rows: Vec::new(),
            });
        }
        Value::Object(fields) => {
            return Ok(Parsed {
                shape: Shape::Records,
                rows: vec![Row(fields.clone())],
            });
        }
        Value::Array(items) => unwrap_single_nested(items),
        other => return Err(NormalizationError::NotAnArray(kind_of(other))),
    };

    let Some(first) = items.first() else {
        return Ok(Parsed {
            shape: Shape::Records,
            rows: Vec::new(),
        });
    };
    let width = schema.columns.len();
    let parsed = match first {
        Value::Object(_) => Parsed {
            shape: Shape::Records,
            rows: records(items)?,
        },
        Value::Array(column) if !column.iter().any(Value::is_object) => {
            if items.len() != width {
                return Err(NormalizationError::ColumnCount {
                    expected: width,
                    found: items.len(),
                });
            }
            Parsed {
                shape: Shape::Columns,
                rows: columns(items, schema)?,
            }
        }
        Value::Array(_) => return Err(NormalizationError::UnkeyedRow { index: 0 }),
        _ if width == 1 => Parsed {
            shape: Shape::Scalars,
            rows: items
                .iter()
                .map(|value| Row::from_pairs(schema.columns, std::slice::from_ref(value)))
                .collect(),
        },
        _ if items.len() == width => Parsed {
            shape: Shape::Tuple,
            rows: vec![Row::from_pairs(schema.columns, items)],
        },
        _ => {
            return Err(NormalizationError::ColumnCount {
                expected: width,
                found: items.len(),
            });
        }
    };
    debug!(
        schema = schema.name,
        shape = ?parsed.shape,
        rows = parsed.rows.len(),
        "normalized view result"
    );
    Ok(parsed)
}

fn strip_envelope(raw: &Value) -> &Value {
    match raw {
        Value::Object(fields) if fields.len() == 1 && fields.contains_key("result") => {
            &fields["result"]
        }
        other => other,
    }
}

fn unwrap_single_nested(items: &[Value]) -> &[Value] {
    match items {
        [Value::Array(inner)] => inner.as_slice(),
        other => other,
    }
}

fn records(items: &[Value]) -> std::result::Result<Vec<Row>, NormalizationError> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(fields) => Ok(Row(fields.clone())),
            _ => Err(NormalizationError::UnkeyedRow { index }),
        })
        .collect()
}

fn columns(
    items: &[Value],
    schema: &Schema,
) -> std::result::Result<Vec<Row>, NormalizationError> {
    let mut cols = Vec::with_capacity(items.len());
    for (column, item) in items.iter().enumerate() {
        match item {
            Value::Array(values) => cols.push(values),
            _ => return Err(NormalizationError::NotAColumn { column }),
        }
    }
    let expected = cols[0].len();
    if let Some((column, found)) = cols
        .iter()
        .map(|values| values.len())
        .enumerate()
        .find(|(_, len)| *len != expected)
    {
        return Err(NormalizationError::RaggedColumns {
            column,
            expected,
            found,
        });
    }
    Ok((0..expected)
        .map(|i| {
            let values: Vec<Value> = cols.iter().map(|values| values[i].clone()).collect();
            Row::from_pairs(schema.columns, &values)
        })
        .collect())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// The parsed rows as an array of keyed objects. Parsing this again yields
/// the same rows.
pub fn canonical_rows(parsed: &Parsed) -> Value {
    Value::Array(
        parsed
            .rows
            .iter()
            .map(|row| Value::Object(row.0.clone()))
            .collect(),
    )
}

/// Parse and map every row.
pub fn map_rows<T>(
    raw: &Value,
    schema: &Schema,
    mapper: impl Fn(&Row) -> T,
) -> Result<Vec<T>> {
    let parsed = parse_rows(raw, schema)?;
    Ok(parsed.rows.iter().map(mapper).collect())
}

/// Parse and map the first row, if any.
pub fn map_first<T>(
    raw: &Value,
    schema: &Schema,
    mapper: impl Fn(&Row) -> T,
) -> Result<Option<T>> {
    let parsed = parse_rows(raw, schema)?;
    Ok(parsed.rows.first().map(mapper))
}

/// The single value of a one-value result: `true`, `[true]`, `[[true]]` and
/// `{ "result": [true] }` all yield `true`.
pub fn first_scalar(raw: &Value) -> Option<&Value> {
    let mut current = strip_envelope(raw);
    while let Value::Array(items) = current {
        current = items.first()?;
    }
    (!current.is_null()).then_some(current)
}

/// Read failures become the empty value of the domain. Callers must treat
/// the result as unknown rather than proven empty.
pub fn or_empty<T: Default>(operation: &str, result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!(operation, "read failed, treating as unknown: {e}");
            T::default()
        }
    }
}

/// Numbers, decimal strings, `0x` hex strings and booleans. Floats are
/// truncated. Anything else has no numeric value.
pub fn cast_number(value: &Value) -> Option<i128> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(i128::from)
            .or_else(|| n.as_u64().map(i128::from))
            .or_else(|| n.as_f64().map(|f| f.trunc() as i128)),
        Value::String(s) => {
            let s = s.trim();
            if let Some(digits) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                return i128::from_str_radix(digits, 16).ok();
            }
            s.parse::<i128>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite())
                    .map(|f| f.trunc() as i128)
            })
        }
        Value::Bool(b) => Some(i128::from(*b)),
        _ => None,
    }
}

/// `0x` followed by hex that decodes to UTF-8 is decoded; anything else is
/// returned as is.
pub fn decode_text(raw: &str) -> String {
    raw.strip_prefix("0x")
        .and_then(|digits| hex::decode(digits).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| raw.to_string())
}

pub fn clamp_quality(raw: i128) -> u8 {
    raw.clamp(1, 5) as u8
}

fn saturate<T: TryFrom<i128> + Default>(raw: i128, max: T) -> T {
    if raw <= 0 {
        return T::default();
    }
    T::try_from(raw).unwrap_or(max)
}

impl Row {
    pub fn from_pairs(columns: &[&str], values: &[Value]) -> Self {
        Self(
            columns
                .iter()
                .zip(values)
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        )
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// First present, non-null field among `names`. Move options
    /// (`{"vec": [x]}`) are unwrapped; an empty option counts as absent.
    pub fn get(&self, names: &[&str]) -> Option<&Value> {
        names
            .iter()
            .filter_map(|name| self.0.get(*name))
            .filter_map(unwrap_move_option)
            .find(|value| !value.is_null())
    }

    pub fn has(&self, names: &[&str]) -> bool {
        self.get(names).is_some()
    }

    pub fn number(&self, names: &[&str]) -> i128 {
        self.get(names).and_then(cast_number).unwrap_or(0)
    }

    pub fn u64(&self, names: &[&str]) -> u64 {
        saturate(self.number(names), u64::MAX)
    }

    pub fn u32(&self, names: &[&str]) -> u32 {
        saturate(self.number(names), u32::MAX)
    }

    pub fn u8(&self, names: &[&str]) -> u8 {
        saturate(self.number(names), u8::MAX)
    }

    pub fn quality(&self, names: &[&str]) -> u8 {
        clamp_quality(self.number(names))
    }

    pub fn bool(&self, names: &[&str]) -> bool {
        match self.get(names) {
            Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => true,
            Some(value) => cast_number(value).is_some_and(|n| n != 0),
            None => false,
        }
    }

    /// A positive id, or `None` for absent and zero.
    pub fn id(&self, names: &[&str]) -> Option<u64> {
        Some(self.u64(names)).filter(|id| *id > 0)
    }

    pub fn require_u64(
        &self,
        names: &[&str],
        field: &'static str,
    ) -> std::result::Result<u64, NormalizationError> {
        self.get(names)
            .and_then(cast_number)
            .map(|n| saturate(n, u64::MAX))
            .ok_or(NormalizationError::MissingField(field))
    }

    pub fn text(&self, names: &[&str]) -> String {
        match self.get(names) {
            Some(Value::String(s)) => decode_text(s),
            Some(Value::Array(items)) => {
                let bytes: Vec<u8> = items
                    .iter()
                    .filter_map(cast_number)
                    .map(|n| n.clamp(0, 255) as u8)
                    .collect();
                String::from_utf8_lossy(&bytes).into_owned()
            }
            Some(Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    }

    pub fn address(&self, names: &[&str]) -> AccountAddress {
        self.get(names)
            .and_then(Value::as_str)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(AccountAddress::ZERO)
    }

    /// `None` for absent, unparsable and zero addresses.
    pub fn opt_address(&self, names: &[&str]) -> Option<AccountAddress> {
        Some(self.address(names)).filter(|address| !address.is_zero())
    }

    pub fn nested(&self, names: &[&str]) -> Option<Row> {
        match self.get(names)? {
            Value::Object(fields) => Some(Row(fields.clone())),
            _ => None,
        }
    }

    pub fn list(&self, names: &[&str]) -> Vec<Value> {
        match self.get(names) {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    /// Hex string or array of byte values.
    pub fn bytes(&self, names: &[&str]) -> Vec<u8> {
        match self.get(names) {
            Some(Value::String(s)) => {
                let digits = s.strip_prefix("0x").unwrap_or(s);
                hex::decode(digits).unwrap_or_default()
            }
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(cast_number)
                .map(|n| n.clamp(0, 255) as u8)
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn unwrap_move_option(value: &Value) -> Option<&Value> {
    match value {
        Value::Object(fields) if fields.len() == 1 => match fields.get("vec") {
            Some(Value::Array(inner)) => inner.first(),
            _ => Some(value),
        },
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    static ITEMS: Schema = Schema {
        name: "items",
        columns: &["id", "quantity", "quality"],
    };

    static IDS: Schema = Schema {
        name: "ids",
        columns: &["id"],
    };

    fn records_shape() -> Value {
        json!([
            { "id": 1, "quantity": 5, "quality": 2 },
            { "id": 2, "quantity": 0, "quality": 4 },
        ])
    }

    fn columns_shape() -> Value {
        json!([[1, 2], [5, 0], [2, 4]])
    }

    #[test]
    fn parse_rows__three_shapes_agree() {
        // given
        let nested = json!([records_shape()]);
        let enveloped = json!({ "result": columns_shape() });

        // when
        let from_records = parse_rows(&records_shape(), &ITEMS).unwrap();
        let from_columns = parse_rows(&columns_shape(), &ITEMS).unwrap();
        let from_nested = parse_rows(&nested, &ITEMS).unwrap();
        let from_envelope = parse_rows(&enveloped, &ITEMS).unwrap();

        // then
        assert_eq!(from_records.shape, Shape::Records);
        assert_eq!(from_columns.shape, Shape::Columns);
        assert_eq!(from_records.rows, from_columns.rows);
        assert_eq!(from_records.rows, from_nested.rows);
        assert_eq!(from_records.rows, from_envelope.rows);
    }

    #[test]
    fn parse_rows__single_object_is_one_record() {
        let parsed = parse_rows(&json!({ "id": 3, "quantity": 1 }), &ITEMS).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].u64(&["id"]), 3);
    }

    #[test]
    fn parse_rows__flat_values_for_single_column_query() {
        // when
        let parsed = parse_rows(&json!([["4", "9"]]), &IDS).unwrap();

        // then
        let ids: Vec<u64> = parsed.rows.iter().map(|r| r.u64(&["id"])).collect();
        assert_eq!(ids, vec![4, 9]);
    }

    #[test]
    fn parse_rows__flat_tuple_is_one_positional_record() {
        let parsed = parse_rows(&json!([7, "3", true]), &ITEMS).unwrap();
        assert_eq!(parsed.shape, Shape::Tuple);
        assert_eq!(parsed.rows[0].u64(&["quantity"]), 3);
    }

    #[test]
    fn parse_rows__empty_and_null_are_no_rows() {
        assert!(parse_rows(&json!([]), &ITEMS).unwrap().rows.is_empty());
        assert!(parse_rows(&json!(null), &ITEMS).unwrap().rows.is_empty());
        assert!(parse_rows(&json!([[]]), &ITEMS).unwrap().rows.is_empty());
    }

    #[test]
    fn parse_rows__rejects_ragged_columns() {
        let result = parse_rows(&json!([[1, 2], [5], [2, 4]]), &ITEMS);
        assert_eq!(
            result,
            Err(NormalizationError::RaggedColumns {
                column: 1,
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn parse_rows__rejects_wrong_column_count() {
        let result = parse_rows(&json!([[1, 2], [5, 0]]), &ITEMS);
        assert_eq!(
            result,
            Err(NormalizationError::ColumnCount {
                expected: 3,
                found: 2
            })
        );
    }

    #[test]
    fn parse_rows__rejects_mixed_records() {
        let result = parse_rows(&json!([{ "id": 1 }, 2]), &ITEMS);
        assert_eq!(result, Err(NormalizationError::UnkeyedRow { index: 1 }));
    }

    #[test]
    fn parse_rows__rejects_scalar_payload() {
        assert_eq!(
            parse_rows(&json!("oops"), &ITEMS),
            Err(NormalizationError::NotAnArray("a string"))
        );
    }

    #[test]
    fn cast_number__handles_every_raw_form() {
        assert_eq!(cast_number(&json!(12)), Some(12));
        assert_eq!(cast_number(&json!(-3)), Some(-3));
        assert_eq!(cast_number(&json!("150")), Some(150));
        assert_eq!(cast_number(&json!("0x1f")), Some(31));
        assert_eq!(cast_number(&json!(2.9)), Some(2));
        assert_eq!(cast_number(&json!(true)), Some(1));
        assert_eq!(cast_number(&json!("18446744073709551615")), Some(u64::MAX as i128));
        assert_eq!(cast_number(&json!("abc")), None);
        assert_eq!(cast_number(&json!(null)), None);
        assert_eq!(cast_number(&json!({})), None);
    }

    #[test]
    fn decode_text__decodes_hex_and_keeps_the_rest() {
        assert_eq!(decode_text("0x48656c6c6f"), "Hello");
        assert_eq!(decode_text("Hello"), "Hello");
        assert_eq!(decode_text("0xzz"), "0xzz");
        // valid hex, invalid utf-8
        assert_eq!(decode_text("0xff"), "0xff");
    }

    #[test]
    fn clamp_quality__stays_in_range() {
        assert_eq!(clamp_quality(-40), 1);
        assert_eq!(clamp_quality(0), 1);
        assert_eq!(clamp_quality(3), 3);
        assert_eq!(clamp_quality(5), 5);
        assert_eq!(clamp_quality(1_000_000), 5);
    }

    #[test]
    fn row__getters_fall_back_across_name_variants() {
        // given
        let row = Row(
            json!({
                "qty": "4",
                "owner": "0xabc",
                "name": "0x4f6c6976",
                "employer": { "vec": [] },
                "region": { "vec": ["12"] },
            })
            .as_object()
            .unwrap()
            .clone(),
        );

        // then
        assert_eq!(row.u64(&["quantity", "qty"]), 4);
        assert_eq!(row.u64(&["missing"]), 0);
        assert_eq!(row.text(&["name"]), "Oliv");
        assert_eq!(row.address(&["owner"]).to_string().len(), 66);
        assert_eq!(row.id(&["employer"]), None);
        assert_eq!(row.id(&["region"]), Some(12));
        assert_eq!(row.u8(&["qty"]), 4);
        assert_eq!(row.require_u64(&["id"], "id"), Err(NormalizationError::MissingField("id")));
    }

    #[test]
    fn row__numeric_getters_saturate() {
        let row = Row::from_pairs(&["a", "b"], &[json!(-5), json!(300)]);
        assert_eq!(row.u64(&["a"]), 0);
        assert_eq!(row.u8(&["b"]), 255);
    }

    #[test]
    fn first_scalar__digs_through_wrappers() {
        assert_eq!(first_scalar(&json!(true)), Some(&json!(true)));
        assert_eq!(first_scalar(&json!([["7"]])), Some(&json!("7")));
        assert_eq!(first_scalar(&json!({ "result": [false] })), Some(&json!(false)));
        assert_eq!(first_scalar(&json!([])), None);
        assert_eq!(first_scalar(&json!([null])), None);
    }

    #[test]
    fn or_empty__turns_errors_into_default() {
        let failed: Result<Vec<u64>> = Err(NormalizationError::NotAnArray("a string").into());
        assert!(or_empty("test", failed).is_empty());
        assert_eq!(or_empty("test", Ok(vec![1u64])), vec![1]);
    }

    proptest! {
        #[test]
        fn parse_rows__records_and_columns_agree(
            rows in proptest::collection::vec((any::<u64>(), any::<u32>(), -10i64..10), 1..20)
        ) {
            let records: Vec<Value> = rows
                .iter()
                .map(|(id, qty, quality)| json!({ "id": id.to_string(), "quantity": qty, "quality": quality }))
                .collect();
            let columns = json!([
                rows.iter().map(|(id, _, _)| json!(id.to_string())).collect::<Vec<_>>(),
                rows.iter().map(|(_, qty, _)| json!(qty)).collect::<Vec<_>>(),
                rows.iter().map(|(_, _, quality)| json!(quality)).collect::<Vec<_>>(),
            ]);

            let a = parse_rows(&Value::Array(records), &ITEMS).unwrap();
            let b = parse_rows(&columns, &ITEMS).unwrap();
            prop_assert_eq!(&a.rows, &b.rows);
            prop_assert_eq!(a.rows.len(), rows.len());
        }

        #[test]
        fn canonical_rows__parse_back_unchanged(
            rows in proptest::collection::vec((any::<u32>(), any::<u32>(), any::<u8>()), 0..20)
        ) {
            let columns = json!([
                rows.iter().map(|(id, _, _)| json!(id)).collect::<Vec<_>>(),
                rows.iter().map(|(_, qty, _)| json!(qty)).collect::<Vec<_>>(),
                rows.iter().map(|(_, _, quality)| json!(quality)).collect::<Vec<_>>(),
            ]);
            let first = parse_rows(&columns, &ITEMS).unwrap();
            let again = parse_rows(&canonical_rows(&first), &ITEMS).unwrap();
            prop_assert_eq!(first.rows, again.rows);
        }
    }
}
