use std::fmt;
use std::sync::Arc;

use crate::model::XPathNavigator;
use crate::query::scalar::load_value;
use crate::query::{Eval, MergeBuffer, Query, QueryOps, QueryProps};
use crate::runtime::{Binding, Error, ErrorCode, ExtensionFunction, Focus, display_qname};
use crate::value::{ResultType, Value};

/// A call to a host function, resolved when the query is bound to a resolver.
#[derive(Clone)]
pub(crate) struct ExtensionQuery<N: XPathNavigator> {
    prefix: String,
    local: String,
    args: Vec<Query<N>>,
    function: Option<Arc<dyn ExtensionFunction<N>>>,
    binding: Binding<N>,
    nodes: MergeBuffer<N>,
}

impl<N: XPathNavigator> fmt::Debug for ExtensionQuery<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionQuery")
            .field("name", &display_qname(&self.prefix, &self.local))
            .field("args", &self.args)
            .field("resolved", &self.function.is_some())
            .finish()
    }
}

impl<N: XPathNavigator> ExtensionQuery<N> {
    pub(crate) fn new(prefix: impl Into<String>, local: impl Into<String>, args: Vec<Query<N>>) -> Self {
        Self {
            prefix: prefix.into(),
            local: local.into(),
            args,
            function: None,
            binding: Binding::unbound(),
            nodes: MergeBuffer::new(),
        }
    }

    fn name(&self) -> String {
        display_qname(&self.prefix, &self.local)
    }

    fn collect_args(&mut self, focus: &Focus<N>) -> Result<Vec<Value<N>>, Error> {
        let mut values = Vec::with_capacity(self.args.len());
        for arg in &mut self.args {
            values.push(match arg.evaluate(focus)? {
                Eval::NodeSet => Value::NodeSet(arg.collect_nodes()?),
                Eval::String(s) => Value::String(s),
                Eval::Number(n) => Value::Number(n),
                Eval::Boolean(b) => Value::Boolean(b),
            });
        }
        Ok(values)
    }
}

impl<N: XPathNavigator> QueryOps<N> for ExtensionQuery<N> {
    fn evaluate(&mut self, focus: &Focus<N>) -> Result<Eval, Error> {
        let name = self.name();
        let function = match &self.function {
            Some(f) => Arc::clone(f),
            None => {
                self.binding.require(&format!("function {name}()"))?;
                return Err(Error::new(
                    ErrorCode::UnknownFunction,
                    format!("function {name}() is not defined"),
                ));
            }
        };
        let args = self.collect_args(focus)?;
        let value = function.invoke(focus, args).map_err(|e| {
            Error::new(
                ErrorCode::ExtensionFailed,
                format!("extension function {name}() failed: {}", e.message),
            )
            .with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
        })?;
        Ok(load_value(value, &mut self.nodes))
    }

    fn advance(&mut self) -> Result<Option<N>, Error> {
        Ok(self.nodes.next())
    }

    fn reset(&mut self) {
        self.nodes.rewind();
    }

    fn current_position(&self) -> usize {
        self.nodes.position()
    }

    fn context_size(&mut self) -> Result<usize, Error> {
        Ok(self.nodes.len())
    }

    fn static_type(&self) -> ResultType {
        self.function.as_ref().map_or(ResultType::Any, |f| f.return_type())
    }

    fn props(&self) -> QueryProps {
        self.args
            .iter()
            .fold(QueryProps::ORDERED | QueryProps::NON_FLAT, |acc, a| acc | a.context_props())
    }

    /// Lets a host function such as `key()` root a pattern.
    fn match_node(&mut self, node: &N) -> Result<Option<N>, Error> {
        match self.evaluate(&Focus::new(node.clone()))? {
            Eval::NodeSet => Ok(self.nodes.contains(node).then(|| node.clone())),
            _ => Ok(None),
        }
    }

    fn bind(&mut self, binding: &Binding<N>) -> Result<(), Error> {
        for arg in &mut self.args {
            arg.bind(binding)?;
        }
        self.binding = binding.clone();
        self.function = None;
        if let Some(resolver) = binding.resolver() {
            let function = resolver
                .resolve_function(&self.prefix, &self.local, self.args.len())
                .ok_or_else(|| {
                    Error::new(
                        ErrorCode::UnknownFunction,
                        format!("function {}() with {} argument(s) is not defined", self.name(), self.args.len()),
                    )
                })?;
            self.function = Some(function);
        }
        Ok(())
    }
}
