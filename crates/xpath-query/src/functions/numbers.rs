use super::CallCtx;
use crate::model::XPathNavigator;
use crate::query::Eval;
use crate::runtime::Error;
use crate::value::{round_half_up, string_to_number};

pub(super) fn number_fn<N: XPathNavigator>(ctx: &mut CallCtx<'_, N>) -> Result<Eval, Error> {
    if ctx.has_arg(0) {
        ctx.number(0).map(Eval::Number)
    } else {
        Ok(Eval::Number(string_to_number(&ctx.focus.node.string_value())))
    }
}

pub(super) fn sum_fn<N: XPathNavigator>(ctx: &mut CallCtx<'_, N>) -> Result<Eval, Error> {
    let nodes = ctx.nodes(0)?;
    let mut total = 0.0;
    while let Some(n) = nodes.advance()? {
        total += string_to_number(&n.string_value());
    }
    Ok(Eval::Number(total))
}

pub(super) fn floor_fn<N: XPathNavigator>(ctx: &mut CallCtx<'_, N>) -> Result<Eval, Error> {
    ctx.number(0).map(|n| Eval::Number(n.floor()))
}

pub(super) fn ceiling_fn<N: XPathNavigator>(ctx: &mut CallCtx<'_, N>) -> Result<Eval, Error> {
    ctx.number(0).map(|n| Eval::Number(n.ceil()))
}

pub(super) fn round_fn<N: XPathNavigator>(ctx: &mut CallCtx<'_, N>) -> Result<Eval, Error> {
    ctx.number(0).map(|n| Eval::Number(round_half_up(n)))
}
