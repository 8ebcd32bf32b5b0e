//! Hash-based grouped aggregation: one `Aggregator` handles every
//! supported operator and both field types, keyed by a string-rendered
//! group value, so callers don't need to match on the group field's
//! type at every `merge` call.

use std::collections::HashMap;

use crate::{
    error::SmallError,
    field::{Field, Type},
    tuple::{Tuple, TupleDesc},
};

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl AggregateOp {
    /// String-valued fields only support COUNT.
    pub fn supports(&self, field_type: Type) -> bool {
        matches!(field_type, Type::Int) || *self == AggregateOp::Count
    }
}

#[derive(Clone)]
struct GroupState {
    count: i64,
    sum: i64,
    min: i32,
    max: i32,
}

impl GroupState {
    fn seed(v: i32) -> Self {
        Self {
            count: 1,
            sum: v as i64,
            min: v,
            max: v,
        }
    }

    fn merge(&mut self, v: i32) {
        self.count += 1;
        self.sum += v as i64;
        self.min = self.min.min(v);
        self.max = self.max.max(v);
    }

    fn result(&self, op: AggregateOp) -> i32 {
        match op {
            AggregateOp::Min => self.min,
            AggregateOp::Max => self.max,
            AggregateOp::Sum => self.sum as i32,
            AggregateOp::Avg => (self.sum / self.count) as i32,
            AggregateOp::Count => self.count as i32,
        }
    }
}

const NO_GROUPING: &str = "";

/// Accumulates per-group aggregate state one tuple at a time, then
/// yields one output tuple per group (or a single tuple, if there is
/// no group-by field).
pub struct Aggregator {
    group_field: Option<usize>,
    group_type: Option<Type>,
    agg_field: usize,
    agg_field_type: Type,
    op: AggregateOp,
    groups: HashMap<String, GroupState>,
    // Key insertion order, so iteration is deterministic for tests.
    order: Vec<String>,
    group_values: HashMap<String, Option<Field>>,
}

impl Aggregator {
    pub fn new(
        group_field: Option<usize>,
        group_type: Option<Type>,
        agg_field: usize,
        agg_field_type: Type,
        op: AggregateOp,
    ) -> Result<Self, SmallError> {
        if !op.supports(agg_field_type) {
            return Err(SmallError::illegal_argument(format!(
                "{:?} is not supported over string fields",
                op
            )));
        }
        Ok(Self {
            group_field,
            group_type,
            agg_field,
            agg_field_type,
            op,
            groups: HashMap::new(),
            order: Vec::new(),
            group_values: HashMap::new(),
        })
    }

    pub fn merge_tuple_into_group(&mut self, t: &Tuple) -> Result<(), SmallError> {
        let agg_field = t
            .get_field(self.agg_field)
            .ok_or_else(|| SmallError::illegal_argument("aggregate field is unset"))?;
        let v = match agg_field {
            Field::Int(v) => *v,
            Field::Str(_) => 0, // COUNT never reads the value.
        };

        let (key, group_value) = match self.group_field {
            Some(idx) => {
                let f = t.get_field(idx).cloned();
                (f.as_ref().map(|v| v.to_string()).unwrap_or_default(), f)
            }
            None => (NO_GROUPING.to_string(), None),
        };

        if let Some(state) = self.groups.get_mut(&key) {
            state.merge(v);
        } else {
            self.groups.insert(key.clone(), GroupState::seed(v));
            self.order.push(key.clone());
            self.group_values.insert(key, group_value);
        }
        Ok(())
    }

    /// Output schema: `(groupField?, aggregateValue)`.
    pub fn output_schema(&self) -> TupleDesc {
        match self.group_type {
            Some(t) => TupleDesc::new(vec![(t, Some("groupVal".into())), (Type::Int, Some("aggVal".into()))]),
            None => TupleDesc::new(vec![(Type::Int, Some("aggVal".into()))]),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Tuple> + '_ {
        let schema = self.output_schema();
        self.order.iter().map(move |key| {
            let state = &self.groups[key];
            let mut t = Tuple::new(schema.clone());
            match self.group_field {
                Some(_) => {
                    let gv = self.group_values[key].clone().unwrap_or(Field::Int(0));
                    t.set_field(0, gv);
                    t.set_field(1, Field::Int(state.result(self.op)));
                }
                None => {
                    t.set_field(0, Field::Int(state.result(self.op)));
                }
            }
            t
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tuple::TupleDesc;

    fn schema() -> TupleDesc {
        TupleDesc::new(vec![
            (Type::Str, Some("name".into())),
            (Type::Int, Some("score".into())),
        ])
    }

    fn row(name: &str, score: i32) -> Tuple {
        let mut t = Tuple::new(schema());
        t.set_field(0, Field::Str(name.to_string()));
        t.set_field(1, Field::Int(score));
        t
    }

    #[test]
    fn sum_groups_by_string_field() {
        let mut agg = Aggregator::new(Some(0), Some(Type::Str), 1, Type::Int, AggregateOp::Sum).unwrap();
        agg.merge_tuple_into_group(&row("a", 1)).unwrap();
        agg.merge_tuple_into_group(&row("a", 2)).unwrap();
        agg.merge_tuple_into_group(&row("b", 10)).unwrap();

        let results: Vec<_> = agg.iter().collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].get_field(0), Some(&Field::Str("a".to_string())));
        assert_eq!(results[0].get_field(1), Some(&Field::Int(3)));
        assert_eq!(results[1].get_field(1), Some(&Field::Int(10)));
    }

    #[test]
    fn avg_truncates_like_integer_division() {
        let mut agg = Aggregator::new(None, None, 1, Type::Int, AggregateOp::Avg).unwrap();
        agg.merge_tuple_into_group(&row("a", 1)).unwrap();
        agg.merge_tuple_into_group(&row("a", 2)).unwrap();
        let results: Vec<_> = agg.iter().collect();
        assert_eq!(results[0].get_field(0), Some(&Field::Int(1)));
    }

    #[test]
    fn sum_over_string_field_is_rejected() {
        let err = Aggregator::new(None, None, 0, Type::Str, AggregateOp::Sum).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::IllegalArgument);
    }

    #[test]
    fn count_over_string_field_is_allowed() {
        let mut agg = Aggregator::new(None, None, 0, Type::Str, AggregateOp::Count).unwrap();
        agg.merge_tuple_into_group(&row("a", 1)).unwrap();
        agg.merge_tuple_into_group(&row("b", 1)).unwrap();
        let results: Vec<_> = agg.iter().collect();
        assert_eq!(results[0].get_field(0), Some(&Field::Int(2)));
    }
}
