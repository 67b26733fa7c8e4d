//! Deparsing: every AST node renders back to valid SQL.
//!
//! Whitespace is canonical rather than preserved; clause order,
//! parenthesization and identifiers survive exactly, which is what matters
//! because deparsed text is re-parsed and handed to the driver.

use crate::ast::*;
use itertools::Itertools;
use std::fmt;

/// Writes an identifier, quoting it when it does not lex as a bare word.
///
/// Entity references (`#...`) always print raw; they exist only between
/// parsing and inlining.
fn write_ident(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    let bare = name.starts_with('#')
        || (!name.is_empty()
            && !name.as_bytes()[0].is_ascii_digit()
            && name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'$'));
    if bare {
        f.write_str(name)
    } else {
        write!(f, "\"{name}\"")
    }
}

struct Ident<'a>(&'a str);

impl fmt::Display for Ident<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_ident(f, self.0)
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Select(select) => select.fmt(f),
            Statement::Command(command) => f.write_str(&command.text),
        }
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.body.fmt(f)
    }
}

impl fmt::Display for SelectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectBody::Plain(plain) => plain.fmt(f),
            SelectBody::Union { left, right, all } => {
                write!(f, "{left} UNION ")?;
                if *all {
                    f.write_str("ALL ")?;
                }
                right.fmt(f)
            }
        }
    }
}

impl fmt::Display for PlainSelect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        write!(f, "{}", self.items.iter().join(", "))?;
        write!(f, " FROM {}", self.from)?;
        for join in &self.joins {
            join.fmt(f)?;
        }
        if let Some(where_clause) = &self.where_clause {
            write!(f, " WHERE {where_clause}")?;
        }
        if !self.group_by.is_empty() {
            write!(f, " GROUP BY {}", self.group_by.iter().join(", "))?;
        }
        if let Some(having) = &self.having {
            write!(f, " HAVING {having}")?;
        }
        if !self.order_by.is_empty() {
            write!(f, " ORDER BY {}", self.order_by.iter().join(", "))?;
        }
        if let Some(limit) = &self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        if let Some(offset) = &self.offset {
            write!(f, " OFFSET {offset}")?;
        }
        Ok(())
    }
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectItem::Wildcard => f.write_str("*"),
            SelectItem::TableWildcard(qualifier) => write!(f, "{}.*", Ident(qualifier)),
            SelectItem::Expr { expr, alias } => {
                expr.fmt(f)?;
                if let Some(alias) = alias {
                    write!(f, " AS {}", Ident(alias))?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(schema) = &self.schema {
            write!(f, "{}.", Ident(schema))?;
        }
        write_ident(f, &self.name)?;
        if let Some(alias) = &self.alias {
            write!(f, " {}", Ident(alias))?;
        }
        Ok(())
    }
}

impl fmt::Display for FromSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FromSource::Table(table) => table.fmt(f),
            FromSource::SubSelect { select, alias } => {
                write!(f, "({select})")?;
                if let Some(alias) = alias {
                    write!(f, " {}", Ident(alias))?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Join {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            JoinKind::Comma => return write!(f, ", {}", self.source),
            JoinKind::Inner => "JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
            JoinKind::Cross => "CROSS JOIN",
        };
        f.write_str(" ")?;
        if self.natural {
            f.write_str("NATURAL ")?;
        }
        write!(f, "{kind} {}", self.source)?;
        match &self.constraint {
            Some(JoinConstraint::On(expr)) => write!(f, " ON {expr}"),
            Some(JoinConstraint::Using(columns)) => {
                write!(f, " USING ({})", columns.iter().map(|c| Ident(c)).join(", "))
            }
            None => Ok(()),
        }
    }
}

impl fmt::Display for OrderItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.expr.fmt(f)?;
        match self.direction {
            Some(OrderDirection::Asc) => f.write_str(" ASC")?,
            Some(OrderDirection::Desc) => f.write_str(" DESC")?,
            None => {}
        }
        match self.nulls_first {
            Some(true) => f.write_str(" NULLS FIRST"),
            Some(false) => f.write_str(" NULLS LAST"),
            None => Ok(()),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(table) = &self.table {
            write!(f, "{}.", Ident(table))?;
        }
        write_ident(f, &self.name)
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("NULL"),
            Literal::Boolean(true) => f.write_str("TRUE"),
            Literal::Boolean(false) => f.write_str("FALSE"),
            Literal::Number(text) => f.write_str(text),
            Literal::String(text) => write!(f, "'{}'", text.replace('\'', "''")),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOp::Or => "OR",
            BinaryOp::And => "AND",
            BinaryOp::Eq => "=",
            BinaryOp::NotEq => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Concat => "||",
        })
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(column) => column.fmt(f),
            Expr::Parameter(name) => write!(f, ":{name}"),
            Expr::Literal(literal) => literal.fmt(f),
            Expr::Unary { op, expr } => match op {
                UnaryOp::Not => write!(f, "NOT {expr}"),
                UnaryOp::Minus => write!(f, "-{expr}"),
                UnaryOp::Plus => write!(f, "+{expr}"),
            },
            Expr::Binary { left, op, right } => write!(f, "{left} {op} {right}"),
            Expr::Function {
                name,
                distinct,
                wildcard,
                args,
            } => {
                write_ident(f, name)?;
                f.write_str("(")?;
                if *distinct {
                    f.write_str("DISTINCT ")?;
                }
                if *wildcard {
                    f.write_str("*")?;
                } else {
                    write!(f, "{}", args.iter().join(", "))?;
                }
                f.write_str(")")
            }
            Expr::IsNull { expr, negated } => {
                write!(f, "{expr} IS {}NULL", if *negated { "NOT " } else { "" })
            }
            Expr::Like {
                expr,
                pattern,
                negated,
            } => write!(
                f,
                "{expr} {}LIKE {pattern}",
                if *negated { "NOT " } else { "" }
            ),
            Expr::InList {
                expr,
                list,
                negated,
            } => write!(
                f,
                "{expr} {}IN ({})",
                if *negated { "NOT " } else { "" },
                list.iter().join(", ")
            ),
            Expr::InSelect {
                expr,
                select,
                negated,
            } => write!(
                f,
                "{expr} {}IN ({select})",
                if *negated { "NOT " } else { "" }
            ),
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => write!(
                f,
                "{expr} {}BETWEEN {low} AND {high}",
                if *negated { "NOT " } else { "" }
            ),
            Expr::Case {
                operand,
                branches,
                else_branch,
            } => {
                f.write_str("CASE")?;
                if let Some(operand) = operand {
                    write!(f, " {operand}")?;
                }
                for (condition, result) in branches {
                    write!(f, " WHEN {condition} THEN {result}")?;
                }
                if let Some(else_branch) = else_branch {
                    write!(f, " ELSE {else_branch}")?;
                }
                f.write_str(" END")
            }
            Expr::Cast { expr, type_name } => write!(f, "{expr}::{type_name}"),
            Expr::Exists(select) => write!(f, "EXISTS ({select})"),
            Expr::ScalarSubquery(select) => write!(f, "({select})"),
            Expr::Nested(expr) => write!(f, "({expr})"),
        }
    }
}
