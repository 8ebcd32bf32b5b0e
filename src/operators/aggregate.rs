//! Wraps a child operator with grouped aggregation, draining it fully
//! on the first `open` (pumping every child tuple through an
//! `Aggregator`) and then iterating the accumulated per-group results.

use crate::{
    aggregator::{AggregateOp, Aggregator},
    error::SmallError,
    field::Type,
    tuple::{Tuple, TupleDesc},
};

use super::DbIterator;

pub struct Aggregate {
    child: Box<dyn DbIterator>,
    agg_field: usize,
    agg_field_type: Type,
    group_field: Option<usize>,
    group_type: Option<Type>,
    op: AggregateOp,
    rows: Option<Vec<Tuple>>,
    results: Option<std::vec::IntoIter<Tuple>>,
    peeked: Option<Tuple>,
    schema: TupleDesc,
}

impl Aggregate {
    pub fn new(
        child: Box<dyn DbIterator>,
        agg_field: usize,
        group_field: Option<usize>,
        op: AggregateOp,
    ) -> Result<Self, SmallError> {
        let child_schema = child.schema();
        let agg_field_type = child_schema.field_type(agg_field);
        let group_type = group_field.map(|i| child_schema.field_type(i));

        let schema = match group_type {
            Some(t) => TupleDesc::new(vec![
                (t, Some("groupVal".into())),
                (Type::Int, Some("aggVal".into())),
            ]),
            None => TupleDesc::new(vec![(Type::Int, Some("aggVal".into()))]),
        };

        Ok(Self {
            child,
            agg_field,
            agg_field_type,
            group_field,
            group_type,
            op,
            rows: None,
            results: None,
            peeked: None,
            schema,
        })
    }
}

impl DbIterator for Aggregate {
    fn open(&mut self) -> Result<(), SmallError> {
        self.child.open()?;
        let mut aggregator = Aggregator::new(
            self.group_field,
            self.group_type,
            self.agg_field,
            self.agg_field_type,
            self.op,
        )?;
        while self.child.has_next()? {
            let t = self.child.next()?;
            aggregator.merge_tuple_into_group(&t)?;
        }
        let rows: Vec<Tuple> = aggregator.iter().collect();
        self.results = Some(rows.clone().into_iter());
        self.rows = Some(rows);
        self.peeked = None;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, SmallError> {
        if self.peeked.is_some() {
            return Ok(true);
        }
        match self.results.as_mut() {
            Some(iter) => {
                self.peeked = iter.next();
                Ok(self.peeked.is_some())
            }
            None => Err(SmallError::illegal_argument("iterator used before open")),
        }
    }

    fn next(&mut self) -> Result<Tuple, SmallError> {
        if self.peeked.is_none() {
            self.has_next()?;
        }
        self.peeked
            .take()
            .ok_or_else(|| SmallError::no_such_element("next called with no tuple available"))
    }

    /// Resets the result iterator to the start without re-draining the
    /// child or re-running the aggregation.
    fn rewind(&mut self) -> Result<(), SmallError> {
        let rows = self
            .rows
            .clone()
            .ok_or_else(|| SmallError::illegal_argument("rewind called before open"))?;
        self.results = Some(rows.into_iter());
        self.peeked = None;
        Ok(())
    }

    fn close(&mut self) {
        self.child.close();
        self.rows = None;
        self.results = None;
        self.peeked = None;
    }

    fn schema(&self) -> TupleDesc {
        self.schema.clone()
    }
}
