//! Multi-key sorting of a node-set.
use core::cmp::Ordering;
use core::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::model::XPathNavigator;
use crate::query::{Eval, Query, QueryOps, QueryProps};
use crate::runtime::{Binding, Error, Focus};
use crate::value::ResultType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    fn apply(self, ord: Ordering) -> Ordering {
        match self {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    }
}

/// How letters differing only in case are ordered by [`TextComparer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseOrder {
    UpperFirst,
    LowerFirst,
    /// Plain ordinal comparison.
    #[default]
    None,
}

/// What a sort key is converted to before it reaches the comparer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDataType {
    #[default]
    Text,
    Number,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    Text(String),
    Number(f64),
}

impl SortValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SortValue::Text(s) => Some(s),
            SortValue::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            SortValue::Number(n) => Some(*n),
            SortValue::Text(_) => None,
        }
    }
}

/// Orders two evaluated keys. Implementations may be shared between threads.
pub trait KeyComparer: Send + Sync {
    fn data_type(&self) -> SortDataType {
        SortDataType::Text
    }

    fn compare(&self, a: &SortValue, b: &SortValue) -> Ordering;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TextComparer {
    pub order: SortOrder,
    pub case_order: CaseOrder,
}

impl TextComparer {
    pub fn new(order: SortOrder, case_order: CaseOrder) -> Self {
        Self { order, case_order }
    }

    fn compare_text(&self, a: &str, b: &str) -> Ordering {
        let upper_first = match self.case_order {
            CaseOrder::None => return a.cmp(b),
            CaseOrder::UpperFirst => true,
            CaseOrder::LowerFirst => false,
        };
        let folded = a.chars().flat_map(char::to_lowercase).cmp(b.chars().flat_map(char::to_lowercase));
        if folded != Ordering::Equal {
            return folded;
        }
        for (x, y) in a.chars().zip(b.chars()) {
            if x != y {
                return match (x.is_uppercase(), upper_first) {
                    (true, true) | (false, false) => Ordering::Less,
                    _ => Ordering::Greater,
                };
            }
        }
        a.len().cmp(&b.len())
    }
}

impl KeyComparer for TextComparer {
    fn compare(&self, a: &SortValue, b: &SortValue) -> Ordering {
        let ord = self.compare_text(a.as_text().unwrap_or_default(), b.as_text().unwrap_or_default());
        self.order.apply(ord)
    }
}

/// Numeric keys; NaN sorts before every number when ascending.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberComparer {
    pub order: SortOrder,
}

impl NumberComparer {
    pub fn new(order: SortOrder) -> Self {
        Self { order }
    }
}

impl KeyComparer for NumberComparer {
    fn data_type(&self) -> SortDataType {
        SortDataType::Number
    }

    fn compare(&self, a: &SortValue, b: &SortValue) -> Ordering {
        let a = a.as_number().unwrap_or(f64::NAN);
        let b = b.as_number().unwrap_or(f64::NAN);
        let ord = match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        };
        self.order.apply(ord)
    }
}

#[derive(Clone)]
struct SortKey<N: XPathNavigator> {
    expr: Query<N>,
    comparer: Arc<dyn KeyComparer>,
}

impl<N: XPathNavigator> fmt::Debug for SortKey<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortKey")
            .field("expr", &self.expr)
            .field("data_type", &self.comparer.data_type())
            .finish()
    }
}

#[derive(Debug, Clone)]
struct SortRecord<N> {
    node: N,
    values: SmallVec<[SortValue; 2]>,
    index: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct SortQuery<N: XPathNavigator> {
    input: Box<Query<N>>,
    keys: Vec<SortKey<N>>,
    records: Vec<SortRecord<N>>,
    cursor: usize,
}

impl<N: XPathNavigator> SortQuery<N> {
    pub(crate) fn new(input: Query<N>) -> Self {
        Self {
            input: Box::new(input),
            keys: Vec::new(),
            records: Vec::new(),
            cursor: 0,
        }
    }

    pub(crate) fn push_key(&mut self, expr: Query<N>, comparer: Arc<dyn KeyComparer>) {
        self.keys.push(SortKey { expr, comparer });
    }

    fn compare_records(keys: &[SortKey<N>], a: &SortRecord<N>, b: &SortRecord<N>) -> Ordering {
        for (i, key) in keys.iter().enumerate() {
            let ord = key.comparer.compare(&a.values[i], &b.values[i]);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.index.cmp(&b.index)
    }
}

impl<N: XPathNavigator> QueryOps<N> for SortQuery<N> {
    fn evaluate(&mut self, focus: &Focus<N>) -> Result<Eval, Error> {
        self.input.evaluate_nodes(focus)?;
        let nodes = self.input.collect_nodes()?;
        let size = nodes.len();
        self.records.clear();
        self.cursor = 0;
        for (index, node) in nodes.into_iter().enumerate() {
            let key_focus = Focus {
                node,
                position: index + 1,
                size,
            };
            let mut values = SmallVec::new();
            for key in &mut self.keys {
                values.push(match key.comparer.data_type() {
                    SortDataType::Text => SortValue::Text(key.expr.evaluate_string(&key_focus)?),
                    SortDataType::Number => SortValue::Number(key.expr.evaluate_number(&key_focus)?),
                });
            }
            self.records.push(SortRecord {
                node: key_focus.node,
                values,
                index,
            });
        }
        let keys = &self.keys;
        self.records.sort_unstable_by(|a, b| Self::compare_records(keys, a, b));
        tracing::trace!(records = self.records.len(), keys = self.keys.len(), "sorted node-set");
        Ok(Eval::NodeSet)
    }

    fn advance(&mut self) -> Result<Option<N>, Error> {
        let n = self.records.get(self.cursor).map(|r| r.node.clone());
        if n.is_some() {
            self.cursor += 1;
        }
        Ok(n)
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }

    fn current_position(&self) -> usize {
        self.cursor
    }

    fn context_size(&mut self) -> Result<usize, Error> {
        Ok(self.records.len())
    }

    fn static_type(&self) -> ResultType {
        ResultType::NodeSet
    }

    fn props(&self) -> QueryProps {
        QueryProps::NO_DUPS | QueryProps::NON_FLAT
    }

    fn match_node(&mut self, node: &N) -> Result<Option<N>, Error> {
        self.input.match_node(node)
    }

    fn bind(&mut self, binding: &Binding<N>) -> Result<(), Error> {
        self.input.bind(binding)?;
        for key in &mut self.keys {
            key.expr.bind(binding)?;
        }
        Ok(())
    }
}
