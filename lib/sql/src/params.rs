use crate::ast::*;
use crate::scan::scan_named_parameters;

/// Collects the distinct named parameters of a statement in first-occurrence
/// order.
///
/// Names are deduplicated case-insensitively; the first spelling wins and
/// later occurrences never move an entry. Selects are walked structurally
/// (including nested sub-selects, join conditions and function arguments);
/// opaque commands fall back to the textual scanner, which honors the same
/// comment/string rules.
pub fn named_parameters(statement: &Statement) -> Vec<String> {
    let mut collector = Collector::default();
    match statement {
        Statement::Select(select) => collector.select(select),
        Statement::Command(command) => {
            for occurrence in scan_named_parameters(&command.text) {
                collector.found(&occurrence.name);
            }
        }
    }
    collector.names
}

#[derive(Default)]
struct Collector {
    names: Vec<String>,
}

impl Collector {
    fn found(&mut self, name: &str) {
        if !self.names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
            self.names.push(name.to_string());
        }
    }

    fn select(&mut self, select: &Select) {
        self.body(&select.body);
    }

    fn body(&mut self, body: &SelectBody) {
        match body {
            SelectBody::Plain(plain) => self.plain(plain),
            SelectBody::Union { left, right, .. } => {
                self.body(left);
                self.body(right);
            }
        }
    }

    fn plain(&mut self, plain: &PlainSelect) {
        for item in &plain.items {
            if let SelectItem::Expr { expr, .. } = item {
                self.expr(expr);
            }
        }
        self.source(&plain.from);
        for join in &plain.joins {
            self.source(&join.source);
            if let Some(JoinConstraint::On(expr)) = &join.constraint {
                self.expr(expr);
            }
        }
        for expr in plain
            .where_clause
            .iter()
            .chain(&plain.group_by)
            .chain(&plain.having)
        {
            self.expr(expr);
        }
        for item in &plain.order_by {
            self.expr(&item.expr);
        }
        for expr in plain.limit.iter().chain(&plain.offset) {
            self.expr(expr);
        }
    }

    fn source(&mut self, source: &FromSource) {
        match source {
            FromSource::Table(_) => {}
            FromSource::SubSelect { select, .. } => self.select(select),
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Parameter(name) => self.found(name),
            Expr::Column(_) | Expr::Literal(_) => {}
            Expr::Unary { expr, .. } | Expr::Cast { expr, .. } | Expr::Nested(expr) => {
                self.expr(expr);
            }
            Expr::Binary { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            Expr::Function { args, .. } => {
                for arg in args {
                    self.expr(arg);
                }
            }
            Expr::IsNull { expr, .. } => self.expr(expr),
            Expr::Like { expr, pattern, .. } => {
                self.expr(expr);
                self.expr(pattern);
            }
            Expr::InList { expr, list, .. } => {
                self.expr(expr);
                for item in list {
                    self.expr(item);
                }
            }
            Expr::InSelect { expr, select, .. } => {
                self.expr(expr);
                self.select(select);
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                self.expr(expr);
                self.expr(low);
                self.expr(high);
            }
            Expr::Case {
                operand,
                branches,
                else_branch,
            } => {
                if let Some(operand) = operand {
                    self.expr(operand);
                }
                for (condition, result) in branches {
                    self.expr(condition);
                    self.expr(result);
                }
                if let Some(else_branch) = else_branch {
                    self.expr(else_branch);
                }
            }
            Expr::Exists(select) | Expr::ScalarSubquery(select) => self.select(select),
        }
    }
}
