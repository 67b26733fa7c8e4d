//! Sub-entity inlining: `#`-referenced pseudo-tables become parenthesized,
//! aliased sub-queries.
//!
//! The transform consumes the tree and rebuilds it, so no node is ever
//! shared between the pre- and post-inlining statement. Referenced entities
//! load through the engine with the caller's guard set, which is how cycles
//! across any number of levels surface as [EntityError::CyclicReference].

use crate::engine::EntityEngine;
use crate::error::EntityError;
use rustc_hash::{FxHashMap, FxHashSet};
use sqlet_sql::{
    Expr, FromSource, Join, OrderItem, PlainSelect, Select, SelectBody, SelectItem, Statement,
    TableRef,
};

pub(crate) struct InlineContext<'a> {
    pub engine: &'a EntityEngine,
    /// Name of the referencing entity, for diagnostics.
    pub entity: &'a str,
    /// Directory of the referencing entity, root-relative ("" at the root).
    pub base: String,
    /// alias (lower) → sub-parameter (lower) → outer parameter name.
    pub binds: FxHashMap<String, FxHashMap<String, String>>,
    pub guards: &'a mut FxHashSet<String>,
}

pub(crate) fn inline_select(
    select: Select,
    ctx: &mut InlineContext<'_>,
) -> Result<Select, EntityError> {
    Ok(Select {
        body: inline_body(select.body, ctx)?,
    })
}

fn inline_body(body: SelectBody, ctx: &mut InlineContext<'_>) -> Result<SelectBody, EntityError> {
    Ok(match body {
        SelectBody::Plain(plain) => SelectBody::Plain(Box::new(inline_plain(*plain, ctx)?)),
        SelectBody::Union { left, right, all } => SelectBody::Union {
            left: Box::new(inline_body(*left, ctx)?),
            right: Box::new(inline_body(*right, ctx)?),
            all,
        },
    })
}

fn inline_plain(
    plain: PlainSelect,
    ctx: &mut InlineContext<'_>,
) -> Result<PlainSelect, EntityError> {
    Ok(PlainSelect {
        distinct: plain.distinct,
        items: plain
            .items
            .into_iter()
            .map(|item| match item {
                SelectItem::Expr { expr, alias } => Ok(SelectItem::Expr {
                    expr: inline_expr(expr, ctx)?,
                    alias,
                }),
                other => Ok(other),
            })
            .collect::<Result<_, EntityError>>()?,
        from: inline_source(plain.from, ctx)?,
        joins: plain
            .joins
            .into_iter()
            .map(|join| {
                Ok(Join {
                    kind: join.kind,
                    natural: join.natural,
                    source: inline_source(join.source, ctx)?,
                    constraint: match join.constraint {
                        Some(sqlet_sql::JoinConstraint::On(expr)) => {
                            Some(sqlet_sql::JoinConstraint::On(inline_expr(expr, ctx)?))
                        }
                        other => other,
                    },
                })
            })
            .collect::<Result<_, EntityError>>()?,
        where_clause: plain
            .where_clause
            .map(|expr| inline_expr(expr, ctx))
            .transpose()?,
        group_by: plain
            .group_by
            .into_iter()
            .map(|expr| inline_expr(expr, ctx))
            .collect::<Result<_, EntityError>>()?,
        having: plain.having.map(|expr| inline_expr(expr, ctx)).transpose()?,
        order_by: plain
            .order_by
            .into_iter()
            .map(|item| {
                Ok(OrderItem {
                    expr: inline_expr(item.expr, ctx)?,
                    direction: item.direction,
                    nulls_first: item.nulls_first,
                })
            })
            .collect::<Result<_, EntityError>>()?,
        limit: plain.limit.map(|expr| inline_expr(expr, ctx)).transpose()?,
        offset: plain.offset.map(|expr| inline_expr(expr, ctx)).transpose()?,
    })
}

fn inline_source(
    source: FromSource,
    ctx: &mut InlineContext<'_>,
) -> Result<FromSource, EntityError> {
    match source {
        FromSource::Table(table) if table.is_entity_reference() => splice(table, ctx),
        FromSource::Table(table) => Ok(FromSource::Table(table)),
        FromSource::SubSelect { select, alias } => Ok(FromSource::SubSelect {
            select: Box::new(inline_select(*select, ctx)?),
            alias,
        }),
    }
}

/// Replaces one `#reference` table with the referenced entity's select body.
fn splice(table: TableRef, ctx: &mut InlineContext<'_>) -> Result<FromSource, EntityError> {
    let reference = &table.name[1..];
    let Some(name) = resolve_reference(&ctx.base, reference) else {
        return Err(EntityError::InvalidReference {
            entity: ctx.entity.to_string(),
            reference: table.name.clone(),
        });
    };

    let entity = ctx.engine.load_guarded(&name, ctx.guards)?;
    if entity.command {
        return Err(EntityError::NotInlinable(name));
    }
    // The entity's stored SQL is already inlined; re-parse it to splice.
    let statement = sqlet_sql::parse(&entity.sql).map_err(|source| EntityError::Parse {
        name: name.clone(),
        source,
    })?;
    let Statement::Select(sub_select) = statement else {
        return Err(EntityError::NotInlinable(name));
    };

    let alias = table.alias.clone().unwrap_or_else(|| sanitize_alias(&name));
    let prefix = sanitize_alias(&alias);
    let empty = FxHashMap::default();
    let bound = ctx
        .binds
        .get(&alias.to_lowercase())
        .unwrap_or(&empty);

    let renamed = rename_parameters(sub_select, &|parameter: &str| {
        match bound.get(&parameter.to_lowercase()) {
            Some(outer) => outer.clone(),
            None => format!("{prefix}_{parameter}"),
        }
    });

    Ok(FromSource::SubSelect {
        select: Box::new(renamed),
        alias: Some(alias),
    })
}

/// Normalizes a reference against the referencing entity's directory into a
/// root-relative entity name. `None` when the reference is malformed or
/// escapes the root.
fn resolve_reference(base: &str, reference: &str) -> Option<String> {
    let mut segments: Vec<&str> = if reference.starts_with("./") || reference.starts_with("../") {
        base.split('/').filter(|s| !s.is_empty()).collect()
    } else {
        Vec::new()
    };
    for part in reference.split('/') {
        match part {
            "" => return None,
            "." => {}
            ".." => {
                segments.pop()?;
            }
            part => segments.push(part),
        }
    }
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

/// A valid identifier derived from an entity name or alias: path separators
/// and punctuation become underscores.
fn sanitize_alias(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

fn inline_expr(expr: Expr, ctx: &mut InlineContext<'_>) -> Result<Expr, EntityError> {
    Ok(match expr {
        Expr::Column(_) | Expr::Parameter(_) | Expr::Literal(_) => expr,
        Expr::Unary { op, expr } => Expr::Unary {
            op,
            expr: Box::new(inline_expr(*expr, ctx)?),
        },
        Expr::Binary { left, op, right } => Expr::Binary {
            left: Box::new(inline_expr(*left, ctx)?),
            op,
            right: Box::new(inline_expr(*right, ctx)?),
        },
        Expr::Function {
            name,
            distinct,
            wildcard,
            args,
        } => Expr::Function {
            name,
            distinct,
            wildcard,
            args: args
                .into_iter()
                .map(|arg| inline_expr(arg, ctx))
                .collect::<Result<_, EntityError>>()?,
        },
        Expr::IsNull { expr, negated } => Expr::IsNull {
            expr: Box::new(inline_expr(*expr, ctx)?),
            negated,
        },
        Expr::Like {
            expr,
            pattern,
            negated,
        } => Expr::Like {
            expr: Box::new(inline_expr(*expr, ctx)?),
            pattern: Box::new(inline_expr(*pattern, ctx)?),
            negated,
        },
        Expr::InList {
            expr,
            list,
            negated,
        } => Expr::InList {
            expr: Box::new(inline_expr(*expr, ctx)?),
            list: list
                .into_iter()
                .map(|item| inline_expr(item, ctx))
                .collect::<Result<_, EntityError>>()?,
            negated,
        },
        Expr::InSelect {
            expr,
            select,
            negated,
        } => Expr::InSelect {
            expr: Box::new(inline_expr(*expr, ctx)?),
            select: Box::new(inline_select(*select, ctx)?),
            negated,
        },
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => Expr::Between {
            expr: Box::new(inline_expr(*expr, ctx)?),
            low: Box::new(inline_expr(*low, ctx)?),
            high: Box::new(inline_expr(*high, ctx)?),
            negated,
        },
        Expr::Case {
            operand,
            branches,
            else_branch,
        } => Expr::Case {
            operand: operand
                .map(|operand| inline_expr(*operand, ctx).map(Box::new))
                .transpose()?,
            branches: branches
                .into_iter()
                .map(|(condition, result)| {
                    Ok((inline_expr(condition, ctx)?, inline_expr(result, ctx)?))
                })
                .collect::<Result<_, EntityError>>()?,
            else_branch: else_branch
                .map(|expr| inline_expr(*expr, ctx).map(Box::new))
                .transpose()?,
        },
        Expr::Cast { expr, type_name } => Expr::Cast {
            expr: Box::new(inline_expr(*expr, ctx)?),
            type_name,
        },
        Expr::Exists(select) => Expr::Exists(Box::new(inline_select(*select, ctx)?)),
        Expr::ScalarSubquery(select) => {
            Expr::ScalarSubquery(Box::new(inline_select(*select, ctx)?))
        }
        Expr::Nested(expr) => Expr::Nested(Box::new(inline_expr(*expr, ctx)?)),
    })
}

/// Rewrites every named parameter in a (sub-entity) select through `rename`.
fn rename_parameters(select: Select, rename: &impl Fn(&str) -> String) -> Select {
    Select {
        body: rename_body(select.body, rename),
    }
}

fn rename_body(body: SelectBody, rename: &impl Fn(&str) -> String) -> SelectBody {
    match body {
        SelectBody::Plain(plain) => SelectBody::Plain(Box::new(rename_plain(*plain, rename))),
        SelectBody::Union { left, right, all } => SelectBody::Union {
            left: Box::new(rename_body(*left, rename)),
            right: Box::new(rename_body(*right, rename)),
            all,
        },
    }
}

fn rename_plain(plain: PlainSelect, rename: &impl Fn(&str) -> String) -> PlainSelect {
    PlainSelect {
        distinct: plain.distinct,
        items: plain
            .items
            .into_iter()
            .map(|item| match item {
                SelectItem::Expr { expr, alias } => SelectItem::Expr {
                    expr: rename_expr(expr, rename),
                    alias,
                },
                other => other,
            })
            .collect(),
        from: rename_source(plain.from, rename),
        joins: plain
            .joins
            .into_iter()
            .map(|join| Join {
                kind: join.kind,
                natural: join.natural,
                source: rename_source(join.source, rename),
                constraint: match join.constraint {
                    Some(sqlet_sql::JoinConstraint::On(expr)) => {
                        Some(sqlet_sql::JoinConstraint::On(rename_expr(expr, rename)))
                    }
                    other => other,
                },
            })
            .collect(),
        where_clause: plain.where_clause.map(|expr| rename_expr(expr, rename)),
        group_by: plain
            .group_by
            .into_iter()
            .map(|expr| rename_expr(expr, rename))
            .collect(),
        having: plain.having.map(|expr| rename_expr(expr, rename)),
        order_by: plain
            .order_by
            .into_iter()
            .map(|item| OrderItem {
                expr: rename_expr(item.expr, rename),
                direction: item.direction,
                nulls_first: item.nulls_first,
            })
            .collect(),
        limit: plain.limit.map(|expr| rename_expr(expr, rename)),
        offset: plain.offset.map(|expr| rename_expr(expr, rename)),
    }
}

fn rename_source(source: FromSource, rename: &impl Fn(&str) -> String) -> FromSource {
    match source {
        FromSource::Table(table) => FromSource::Table(table),
        FromSource::SubSelect { select, alias } => FromSource::SubSelect {
            select: Box::new(rename_parameters(*select, rename)),
            alias,
        },
    }
}

fn rename_expr(expr: Expr, rename: &impl Fn(&str) -> String) -> Expr {
    match expr {
        Expr::Parameter(name) => Expr::Parameter(rename(&name)),
        Expr::Column(_) | Expr::Literal(_) => expr,
        Expr::Unary { op, expr } => Expr::Unary {
            op,
            expr: Box::new(rename_expr(*expr, rename)),
        },
        Expr::Binary { left, op, right } => Expr::Binary {
            left: Box::new(rename_expr(*left, rename)),
            op,
            right: Box::new(rename_expr(*right, rename)),
        },
        Expr::Function {
            name,
            distinct,
            wildcard,
            args,
        } => Expr::Function {
            name,
            distinct,
            wildcard,
            args: args.into_iter().map(|arg| rename_expr(arg, rename)).collect(),
        },
        Expr::IsNull { expr, negated } => Expr::IsNull {
            expr: Box::new(rename_expr(*expr, rename)),
            negated,
        },
        Expr::Like {
            expr,
            pattern,
            negated,
        } => Expr::Like {
            expr: Box::new(rename_expr(*expr, rename)),
            pattern: Box::new(rename_expr(*pattern, rename)),
            negated,
        },
        Expr::InList {
            expr,
            list,
            negated,
        } => Expr::InList {
            expr: Box::new(rename_expr(*expr, rename)),
            list: list.into_iter().map(|item| rename_expr(item, rename)).collect(),
            negated,
        },
        Expr::InSelect {
            expr,
            select,
            negated,
        } => Expr::InSelect {
            expr: Box::new(rename_expr(*expr, rename)),
            select: Box::new(rename_parameters(*select, rename)),
            negated,
        },
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => Expr::Between {
            expr: Box::new(rename_expr(*expr, rename)),
            low: Box::new(rename_expr(*low, rename)),
            high: Box::new(rename_expr(*high, rename)),
            negated,
        },
        Expr::Case {
            operand,
            branches,
            else_branch,
        } => Expr::Case {
            operand: operand.map(|operand| Box::new(rename_expr(*operand, rename))),
            branches: branches
                .into_iter()
                .map(|(condition, result)| {
                    (rename_expr(condition, rename), rename_expr(result, rename))
                })
                .collect(),
            else_branch: else_branch.map(|expr| Box::new(rename_expr(*expr, rename))),
        },
        Expr::Cast { expr, type_name } => Expr::Cast {
            expr: Box::new(rename_expr(*expr, rename)),
            type_name,
        },
        Expr::Exists(select) => Expr::Exists(Box::new(rename_parameters(*select, rename))),
        Expr::ScalarSubquery(select) => {
            Expr::ScalarSubquery(Box::new(rename_parameters(*select, rename)))
        }
        Expr::Nested(expr) => Expr::Nested(Box::new(rename_expr(*expr, rename))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_resolve_against_the_referencing_directory() {
        assert_eq!(
            resolve_reference("orders", "./details"),
            Some("orders/details".to_string())
        );
        assert_eq!(
            resolve_reference("orders/reports", "../shared/lookup"),
            Some("orders/shared/lookup".to_string())
        );
        assert_eq!(
            resolve_reference("orders", "customers/all"),
            Some("customers/all".to_string())
        );
        assert_eq!(resolve_reference("", "../escape"), None);
        assert_eq!(resolve_reference("a", "../../escape"), None);
        assert_eq!(resolve_reference("a", "b//c"), None);
    }

    #[test]
    fn aliases_sanitize_to_identifiers() {
        assert_eq!(sanitize_alias("orders/summary"), "orders_summary");
        assert_eq!(sanitize_alias("shared/look-up"), "shared_look_up");
    }
}
