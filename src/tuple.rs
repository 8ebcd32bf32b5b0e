//! Schema (`TupleDesc`), row (`Tuple`) and physical row identity
//! (`RecordId`). Field slots may be unset until populated.

use std::fmt;

use crate::{
    error::SmallError,
    field::{Field, Type},
    page_id::HeapPageId,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordId {
    pub page_id: HeapPageId,
    pub slot_index: usize,
}

impl RecordId {
    pub fn new(page_id: HeapPageId, slot_index: usize) -> Self {
        Self {
            page_id,
            slot_index,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TupleDesc {
    fields: Vec<(Type, Option<String>)>,
}

impl TupleDesc {
    pub fn new(fields: Vec<(Type, Option<String>)>) -> Self {
        assert!(!fields.is_empty(), "a TupleDesc must have at least one field");
        Self { fields }
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn field_type(&self, i: usize) -> Type {
        self.fields[i].0
    }

    pub fn field_name(&self, i: usize) -> Option<&str> {
        self.fields[i].1.as_deref()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|(_, n)| n.as_deref() == Some(name))
    }

    /// Total byte width of a tuple matching this schema.
    pub fn size(&self) -> usize {
        self.fields.iter().map(|(t, _)| t.len()).sum()
    }

    /// Concatenate two schemas.
    pub fn combine(a: &TupleDesc, b: &TupleDesc) -> TupleDesc {
        let mut fields = a.fields.clone();
        fields.extend(b.fields.clone());
        TupleDesc { fields }
    }
}

impl PartialEq for TupleDesc {
    /// Equality compares the type sequence only; names are advisory.
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(other.fields.iter())
                .all(|((t1, _), (t2, _))| t1 == t2)
    }
}

#[derive(Clone, Debug)]
pub struct Tuple {
    schema: TupleDesc,
    fields: Vec<Option<Field>>,
    record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(schema: TupleDesc) -> Self {
        let n = schema.num_fields();
        Self {
            schema,
            fields: vec![None; n],
            record_id: None,
        }
    }

    pub fn from_fields(schema: TupleDesc, fields: Vec<Field>) -> Result<Self, SmallError> {
        if fields.len() != schema.num_fields() {
            return Err(SmallError::schema_mismatch(format!(
                "expected {} fields, got {}",
                schema.num_fields(),
                fields.len()
            )));
        }
        Ok(Self {
            schema,
            fields: fields.into_iter().map(Some).collect(),
            record_id: None,
        })
    }

    pub fn schema(&self) -> &TupleDesc {
        &self.schema
    }

    pub fn get_field(&self, i: usize) -> Option<&Field> {
        self.fields[i].as_ref()
    }

    pub fn set_field(&mut self, i: usize, field: Field) {
        self.fields[i] = Some(field);
    }

    pub fn record_id(&self) -> Option<&RecordId> {
        self.record_id.as_ref()
    }

    pub fn set_record_id(&mut self, rid: Option<RecordId>) {
        self.record_id = rid;
    }

    /// Concatenates `left`'s fields followed by `right`'s, with the
    /// combined schema. Used by the join operator.
    pub fn combine(left: &Tuple, right: &Tuple) -> Tuple {
        let schema = TupleDesc::combine(&left.schema, &right.schema);
        let mut fields = left.fields.clone();
        fields.extend(right.fields.clone());
        Tuple {
            schema,
            fields,
            record_id: None,
        }
    }
}

impl fmt::Display for Tuple {
    /// Tab-separated field values terminated by a newline.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, "\t")?;
            }
            match field {
                Some(v) => write!(f, "{}", v)?,
                None => write!(f, "")?,
            }
        }
        writeln!(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_schema(names: &[&str]) -> TupleDesc {
        TupleDesc::new(
            names
                .iter()
                .map(|n| (Type::Int, Some(n.to_string())))
                .collect(),
        )
    }

    #[test]
    fn schema_equality_ignores_names() {
        let a = TupleDesc::new(vec![(Type::Int, Some("a".into()))]);
        let b = TupleDesc::new(vec![(Type::Int, Some("b".into()))]);
        assert_eq!(a, b);
    }

    #[test]
    fn combine_concatenates_fields_and_schema() {
        let left = Tuple::from_fields(int_schema(&["a"]), vec![Field::Int(1)]).unwrap();
        let right = Tuple::from_fields(int_schema(&["b"]), vec![Field::Int(2)]).unwrap();
        let combined = Tuple::combine(&left, &right);
        assert_eq!(combined.schema().num_fields(), 2);
        assert_eq!(combined.get_field(0), Some(&Field::Int(1)));
        assert_eq!(combined.get_field(1), Some(&Field::Int(2)));
    }

    #[test]
    fn display_is_tab_separated_with_trailing_newline() {
        let t = Tuple::from_fields(int_schema(&["a", "b"]), vec![Field::Int(1), Field::Int(2)])
            .unwrap();
        assert_eq!(t.to_string(), "1\t2\n");
    }
}
