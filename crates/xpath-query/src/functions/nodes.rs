use super::CallCtx;
use crate::model::{NodeKind, XPathNavigator};
use crate::query::{Eval, MergeBuffer};
use crate::runtime::Error;
use crate::value::is_xml_whitespace;

#[allow(clippy::cast_precision_loss)]
pub(super) fn last_fn<N: XPathNavigator>(ctx: &mut CallCtx<'_, N>) -> Result<Eval, Error> {
    Ok(Eval::Number(ctx.focus.size as f64))
}

#[allow(clippy::cast_precision_loss)]
pub(super) fn position_fn<N: XPathNavigator>(ctx: &mut CallCtx<'_, N>) -> Result<Eval, Error> {
    Ok(Eval::Number(ctx.focus.position as f64))
}

/// Whitespace-only text nodes count only when the resolver preserves them.
pub(super) fn count_fn<N: XPathNavigator>(ctx: &mut CallCtx<'_, N>) -> Result<Eval, Error> {
    let resolver = ctx.binding.resolver().cloned();
    let nodes = ctx.nodes(0)?;
    let mut n = 0usize;
    while let Some(node) = nodes.advance()? {
        let stripped = node.node_kind() == NodeKind::Whitespace
            && resolver.as_ref().is_some_and(|r| !r.preserve_whitespace(&node));
        if !stripped {
            n += 1;
        }
    }
    #[allow(clippy::cast_precision_loss)]
    Ok(Eval::Number(n as f64))
}

/// `id(object)`: a node-set argument contributes the whitespace-separated
/// tokens of every node's string value.
pub(super) fn id_fn<N: XPathNavigator>(ctx: &mut CallCtx<'_, N>, out: &mut MergeBuffer<N>) -> Result<Eval, Error> {
    out.clear();
    let mut tokens = String::new();
    match ctx.args[0].evaluate(ctx.focus)? {
        Eval::NodeSet => {
            while let Some(n) = ctx.args[0].advance()? {
                tokens.push_str(&n.string_value());
                tokens.push(' ');
            }
        }
        other => tokens = ctx.args[0].to_string_value(other)?,
    }
    for token in tokens.split(is_xml_whitespace).filter(|t| !t.is_empty()) {
        let mut nav = ctx.focus.node.clone();
        if nav.move_to_id(token) {
            out.insert(nav);
        }
    }
    Ok(Eval::NodeSet)
}

pub(super) fn local_name_fn<N: XPathNavigator>(ctx: &mut CallCtx<'_, N>) -> Result<Eval, Error> {
    let node = ctx.first_node_or_context(0)?;
    Ok(Eval::String(node.map(|n| n.local_name().to_string()).unwrap_or_default()))
}

pub(super) fn namespace_uri_fn<N: XPathNavigator>(ctx: &mut CallCtx<'_, N>) -> Result<Eval, Error> {
    let node = ctx.first_node_or_context(0)?;
    Ok(Eval::String(node.map(|n| n.namespace_uri().to_string()).unwrap_or_default()))
}

pub(super) fn name_fn<N: XPathNavigator>(ctx: &mut CallCtx<'_, N>) -> Result<Eval, Error> {
    let node = ctx.first_node_or_context(0)?;
    Ok(Eval::String(node.map(|n| n.qualified_name()).unwrap_or_default()))
}
