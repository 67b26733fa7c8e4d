use crate::ast::*;
use crate::error::ParseError;
use crate::lexer::{tokenize, SpannedToken, Token};

/// Statement starters that are passed through as opaque commands.
const COMMAND_STARTERS: &[&str] = &[
    "insert", "update", "delete", "call", "execute", "merge", "create", "alter", "drop",
    "truncate", "set",
];

/// Words that never serve as an implicit alias.
const RESERVED: &[&str] = &[
    "all", "and", "as", "asc", "between", "by", "case", "cross", "desc", "distinct", "else",
    "end", "exists", "from", "full", "group", "having", "in", "inner", "is", "join", "left",
    "like", "limit", "natural", "not", "null", "nulls", "offset", "on", "or", "order", "right",
    "select", "set", "then", "union", "using", "when", "where",
];

/// Parses `sql` into a [Statement].
///
/// `SELECT` statements get a full tree; statements opening with a known
/// command keyword are kept verbatim as [Command]s, classified before any
/// tokenization so that dialect constructs the lexer does not know cannot
/// reject them. Anything else is a [ParseError] — the caller decides whether
/// an entity may bypass parsing, the parser never guesses.
pub fn parse(sql: &str) -> Result<Statement, ParseError> {
    let Some((word, offset)) = leading_word(sql) else {
        return Err(ParseError::at_offset(sql, sql.len(), "empty statement"));
    };

    if word.eq_ignore_ascii_case("select") {
        let tokens = tokenize(sql)?;
        let mut parser = Parser {
            src: sql,
            tokens,
            pos: 0,
        };
        let select = parser.parse_select()?;
        parser.take(&Token::Semicolon);
        parser.expect_eof()?;
        return Ok(Statement::Select(select));
    }

    if COMMAND_STARTERS.iter().any(|k| word.eq_ignore_ascii_case(k)) {
        return Ok(Statement::Command(Command {
            text: sql.to_string(),
        }));
    }

    Err(ParseError::at_offset(
        sql,
        offset,
        "expected SELECT or a command statement",
    ))
}

/// The first word of the statement, skipping whitespace and comments
/// without tokenizing anything else.
fn leading_word(sql: &str) -> Option<(&str, usize)> {
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
        } else if c == b'-' && bytes.get(i + 1) == Some(&b'-') {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
        } else if c == b'/' && bytes.get(i + 1) == Some(&b'*') {
            i += 2;
            while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                i += 1;
            }
            i = (i + 2).min(bytes.len());
        } else {
            break;
        }
    }
    let start = i;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    (i > start).then(|| (&sql[start..i], start))
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Parser<'_> {
    fn current(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn nth(&self, n: usize) -> &Token {
        self.tokens
            .get(self.pos + n)
            .map_or(&Token::Eof, |t| &t.token)
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].token.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn take(&mut self, token: &Token) -> bool {
        if self.current() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<(), ParseError> {
        if self.take(token) {
            Ok(())
        } else {
            Err(self.error_here(format!("expected {what}")))
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        self.nth_is_keyword(0, keyword)
    }

    fn nth_is_keyword(&self, n: usize, keyword: &str) -> bool {
        matches!(
            self.nth(n),
            Token::Word { value, quoted: false } if value.eq_ignore_ascii_case(keyword)
        )
    }

    fn take_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<(), ParseError> {
        if self.take_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error_here(format!("expected {}", keyword.to_uppercase())))
        }
    }

    fn expect_eof(&mut self) -> Result<(), ParseError> {
        if matches!(self.current(), Token::Eof) {
            Ok(())
        } else {
            Err(self.error_here("unexpected trailing input"))
        }
    }

    fn expect_word(&mut self, what: &str) -> Result<String, ParseError> {
        match self.current().clone() {
            Token::Word { value, .. } => {
                self.advance();
                Ok(value)
            }
            _ => Err(self.error_here(format!("expected {what}"))),
        }
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        ParseError::at_offset(self.src, self.tokens[self.pos].start, message)
    }

    //
    // Select
    //

    fn parse_select(&mut self) -> Result<Select, ParseError> {
        Ok(Select {
            body: self.parse_select_body()?,
        })
    }

    fn parse_select_body(&mut self) -> Result<SelectBody, ParseError> {
        let mut left = self.parse_union_operand()?;
        while self.take_keyword("union") {
            let all = self.take_keyword("all");
            let right = self.parse_union_operand()?;
            left = SelectBody::Union {
                left: Box::new(left),
                right: Box::new(right),
                all,
            };
        }
        Ok(left)
    }

    fn parse_union_operand(&mut self) -> Result<SelectBody, ParseError> {
        if self.take(&Token::LParen) {
            let body = self.parse_select_body()?;
            self.expect(&Token::RParen, "')'")?;
            return Ok(body);
        }
        Ok(SelectBody::Plain(Box::new(self.parse_plain_select()?)))
    }

    fn parse_plain_select(&mut self) -> Result<PlainSelect, ParseError> {
        self.expect_keyword("select")?;
        let distinct = self.take_keyword("distinct");
        if !distinct {
            self.take_keyword("all");
        }

        let mut items = vec![self.parse_select_item()?];
        while self.take(&Token::Comma) {
            items.push(self.parse_select_item()?);
        }

        self.expect_keyword("from")?;
        let from = self.parse_from_source()?;

        let mut joins = Vec::new();
        while let Some(join) = self.parse_join()? {
            joins.push(join);
        }

        let where_clause = if self.take_keyword("where") {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let mut group_by = Vec::new();
        if self.take_keyword("group") {
            self.expect_keyword("by")?;
            group_by.push(self.parse_expr()?);
            while self.take(&Token::Comma) {
                group_by.push(self.parse_expr()?);
            }
        }

        let having = if self.take_keyword("having") {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let mut order_by = Vec::new();
        if self.take_keyword("order") {
            self.expect_keyword("by")?;
            order_by.push(self.parse_order_item()?);
            while self.take(&Token::Comma) {
                order_by.push(self.parse_order_item()?);
            }
        }

        let mut limit = None;
        let mut offset = None;
        if self.take_keyword("limit") {
            limit = Some(self.parse_expr()?);
        }
        if self.take_keyword("offset") {
            offset = Some(self.parse_expr()?);
        }

        Ok(PlainSelect {
            distinct,
            items,
            from,
            joins,
            where_clause,
            group_by,
            having,
            order_by,
            limit,
            offset,
        })
    }

    fn parse_select_item(&mut self) -> Result<SelectItem, ParseError> {
        if self.take(&Token::Star) {
            return Ok(SelectItem::Wildcard);
        }
        // `qualifier.*`
        if matches!(self.current(), Token::Word { .. })
            && *self.nth(1) == Token::Dot
            && *self.nth(2) == Token::Star
        {
            let qualifier = self.expect_word("qualifier")?;
            self.advance();
            self.advance();
            return Ok(SelectItem::TableWildcard(qualifier));
        }
        let expr = self.parse_expr()?;
        let alias = self.parse_optional_alias()?;
        Ok(SelectItem::Expr { expr, alias })
    }

    fn parse_optional_alias(&mut self) -> Result<Option<String>, ParseError> {
        if self.take_keyword("as") {
            return Ok(Some(self.expect_word("alias")?));
        }
        if let Token::Word { value, quoted } = self.current() {
            let reserved =
                !*quoted && RESERVED.iter().any(|k| value.eq_ignore_ascii_case(k));
            if !reserved {
                let alias = value.clone();
                self.advance();
                return Ok(Some(alias));
            }
        }
        Ok(None)
    }

    //
    // From clause
    //

    fn parse_from_source(&mut self) -> Result<FromSource, ParseError> {
        if self.take(&Token::LParen) {
            let body = self.parse_select_body()?;
            self.expect(&Token::RParen, "')'")?;
            let alias = self.parse_optional_alias()?;
            return Ok(FromSource::SubSelect {
                select: Box::new(Select { body }),
                alias,
            });
        }

        let first = self.expect_word("table name")?;
        let (schema, name) = if self.take(&Token::Dot) {
            (Some(first), self.expect_word("table name")?)
        } else {
            (None, first)
        };
        let alias = self.parse_optional_alias()?;
        Ok(FromSource::Table(TableRef { schema, name, alias }))
    }

    fn parse_join(&mut self) -> Result<Option<Join>, ParseError> {
        if self.take(&Token::Comma) {
            let source = self.parse_from_source()?;
            return Ok(Some(Join {
                kind: JoinKind::Comma,
                natural: false,
                source,
                constraint: None,
            }));
        }

        let natural = self.take_keyword("natural");
        let kind = if self.take_keyword("join") {
            JoinKind::Inner
        } else if self.take_keyword("inner") {
            self.expect_keyword("join")?;
            JoinKind::Inner
        } else if self.take_keyword("left") {
            self.take_keyword("outer");
            self.expect_keyword("join")?;
            JoinKind::Left
        } else if self.take_keyword("right") {
            self.take_keyword("outer");
            self.expect_keyword("join")?;
            JoinKind::Right
        } else if self.take_keyword("full") {
            self.take_keyword("outer");
            self.expect_keyword("join")?;
            JoinKind::Full
        } else if self.take_keyword("cross") {
            self.expect_keyword("join")?;
            JoinKind::Cross
        } else if natural {
            return Err(self.error_here("expected a join after NATURAL"));
        } else {
            return Ok(None);
        };

        let source = self.parse_from_source()?;

        let constraint = if self.take_keyword("on") {
            Some(JoinConstraint::On(self.parse_expr()?))
        } else if self.take_keyword("using") {
            self.expect(&Token::LParen, "'('")?;
            let mut columns = vec![self.expect_word("column name")?];
            while self.take(&Token::Comma) {
                columns.push(self.expect_word("column name")?);
            }
            self.expect(&Token::RParen, "')'")?;
            Some(JoinConstraint::Using(columns))
        } else {
            None
        };

        Ok(Some(Join {
            kind,
            natural,
            source,
            constraint,
        }))
    }

    fn parse_order_item(&mut self) -> Result<OrderItem, ParseError> {
        let expr = self.parse_expr()?;
        let direction = if self.take_keyword("asc") {
            Some(OrderDirection::Asc)
        } else if self.take_keyword("desc") {
            Some(OrderDirection::Desc)
        } else {
            None
        };
        let nulls_first = if self.take_keyword("nulls") {
            if self.take_keyword("first") {
                Some(true)
            } else {
                self.expect_keyword("last")?;
                Some(false)
            }
        } else {
            None
        };
        Ok(OrderItem {
            expr,
            direction,
            nulls_first,
        })
    }

    //
    // Expressions, precedence climbing
    //

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.take_keyword("or") {
            let right = self.parse_and()?;
            left = Expr::Binary {
                left: Box::new(left),
                op: BinaryOp::Or,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_not()?;
        while self.take_keyword("and") {
            let right = self.parse_not()?;
            left = Expr::Binary {
                left: Box::new(left),
                op: BinaryOp::And,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, ParseError> {
        if self.take_keyword("not") {
            let expr = self.parse_not()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                expr: Box::new(expr),
            });
        }
        self.parse_predicate()
    }

    fn parse_predicate(&mut self) -> Result<Expr, ParseError> {
        let left = self.parse_additive()?;

        if self.take_keyword("is") {
            let negated = self.take_keyword("not");
            self.expect_keyword("null")?;
            return Ok(Expr::IsNull {
                expr: Box::new(left),
                negated,
            });
        }

        let negated = self.take_keyword("not");
        if self.take_keyword("like") {
            let pattern = self.parse_additive()?;
            return Ok(Expr::Like {
                expr: Box::new(left),
                pattern: Box::new(pattern),
                negated,
            });
        }
        if self.take_keyword("between") {
            let low = self.parse_additive()?;
            self.expect_keyword("and")?;
            let high = self.parse_additive()?;
            return Ok(Expr::Between {
                expr: Box::new(left),
                low: Box::new(low),
                high: Box::new(high),
                negated,
            });
        }
        if self.take_keyword("in") {
            self.expect(&Token::LParen, "'('")?;
            if self.peek_keyword("select") || *self.current() == Token::LParen {
                let body = self.parse_select_body()?;
                self.expect(&Token::RParen, "')'")?;
                return Ok(Expr::InSelect {
                    expr: Box::new(left),
                    select: Box::new(Select { body }),
                    negated,
                });
            }
            let mut list = vec![self.parse_expr()?];
            while self.take(&Token::Comma) {
                list.push(self.parse_expr()?);
            }
            self.expect(&Token::RParen, "')'")?;
            return Ok(Expr::InList {
                expr: Box::new(left),
                list,
                negated,
            });
        }
        if negated {
            return Err(self.error_here("expected LIKE, BETWEEN or IN after NOT"));
        }

        let op = match self.current() {
            Token::Eq => Some(BinaryOp::Eq),
            Token::Neq => Some(BinaryOp::NotEq),
            Token::Lt => Some(BinaryOp::Lt),
            Token::LtEq => Some(BinaryOp::LtEq),
            Token::Gt => Some(BinaryOp::Gt),
            Token::GtEq => Some(BinaryOp::GtEq),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let right = self.parse_additive()?;
            return Ok(Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            });
        }

        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current() {
                Token::Plus => BinaryOp::Plus,
                Token::Minus => BinaryOp::Minus,
                Token::Concat => BinaryOp::Concat,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current() {
                Token::Star => BinaryOp::Multiply,
                Token::Slash => BinaryOp::Divide,
                Token::Percent => BinaryOp::Modulo,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary {
                left: Box::new(left),
                op,
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let op = match self.current() {
            Token::Minus => Some(UnaryOp::Minus),
            Token::Plus => Some(UnaryOp::Plus),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                expr: Box::new(expr),
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        while self.take(&Token::DoubleColon) {
            let type_name = self.expect_word("type name")?;
            expr = Expr::Cast {
                expr: Box::new(expr),
                type_name,
            };
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.current().clone() {
            Token::Number(value) => {
                self.advance();
                Ok(Expr::Literal(Literal::Number(value)))
            }
            Token::String(value) => {
                self.advance();
                Ok(Expr::Literal(Literal::String(value)))
            }
            Token::Param(name) => {
                self.advance();
                Ok(Expr::Parameter(name))
            }
            Token::LParen => {
                self.advance();
                if self.peek_keyword("select") {
                    let body = self.parse_select_body()?;
                    self.expect(&Token::RParen, "')'")?;
                    return Ok(Expr::ScalarSubquery(Box::new(Select { body })));
                }
                let expr = self.parse_expr()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(Expr::Nested(Box::new(expr)))
            }
            Token::Word { value, quoted } => {
                if !quoted {
                    if value.eq_ignore_ascii_case("null") {
                        self.advance();
                        return Ok(Expr::Literal(Literal::Null));
                    }
                    if value.eq_ignore_ascii_case("true") {
                        self.advance();
                        return Ok(Expr::Literal(Literal::Boolean(true)));
                    }
                    if value.eq_ignore_ascii_case("false") {
                        self.advance();
                        return Ok(Expr::Literal(Literal::Boolean(false)));
                    }
                    if value.eq_ignore_ascii_case("case") {
                        return self.parse_case();
                    }
                    if value.eq_ignore_ascii_case("exists") {
                        self.advance();
                        self.expect(&Token::LParen, "'('")?;
                        let body = self.parse_select_body()?;
                        self.expect(&Token::RParen, "')'")?;
                        return Ok(Expr::Exists(Box::new(Select { body })));
                    }
                }

                self.advance();

                // Function call.
                if *self.current() == Token::LParen && !quoted {
                    self.advance();
                    let distinct = self.take_keyword("distinct");
                    if self.take(&Token::Star) {
                        self.expect(&Token::RParen, "')'")?;
                        return Ok(Expr::Function {
                            name: value,
                            distinct,
                            wildcard: true,
                            args: Vec::new(),
                        });
                    }
                    let mut args = Vec::new();
                    if *self.current() != Token::RParen {
                        args.push(self.parse_expr()?);
                        while self.take(&Token::Comma) {
                            args.push(self.parse_expr()?);
                        }
                    }
                    self.expect(&Token::RParen, "')'")?;
                    return Ok(Expr::Function {
                        name: value,
                        distinct,
                        wildcard: false,
                        args,
                    });
                }

                // Qualified column.
                if self.take(&Token::Dot) {
                    let name = self.expect_word("column name")?;
                    return Ok(Expr::Column(ColumnRef {
                        table: Some(value),
                        name,
                    }));
                }

                Ok(Expr::Column(ColumnRef {
                    table: None,
                    name: value,
                }))
            }
            _ => Err(self.error_here("expected an expression")),
        }
    }

    fn parse_case(&mut self) -> Result<Expr, ParseError> {
        self.expect_keyword("case")?;
        let operand = if self.peek_keyword("when") {
            None
        } else {
            Some(Box::new(self.parse_expr()?))
        };
        let mut branches = Vec::new();
        while self.take_keyword("when") {
            let condition = self.parse_expr()?;
            self.expect_keyword("then")?;
            let result = self.parse_expr()?;
            branches.push((condition, result));
        }
        if branches.is_empty() {
            return Err(self.error_here("expected WHEN inside CASE"));
        }
        let else_branch = if self.take_keyword("else") {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        self.expect_keyword("end")?;
        Ok(Expr::Case {
            operand,
            branches,
            else_branch,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_select(sql: &str) -> Select {
        match parse(sql).unwrap() {
            Statement::Select(select) => select,
            Statement::Command(_) => panic!("expected a select"),
        }
    }

    fn plain(select: &Select) -> &PlainSelect {
        match &select.body {
            SelectBody::Plain(plain) => plain,
            SelectBody::Union { .. } => panic!("expected a plain select"),
        }
    }

    #[test]
    fn parses_items_sources_and_clauses() {
        let select = parse_select(
            "select t.a, b as total, * from s.orders t \
             left join lines l on l.order_id = t.id \
             where t.amount > :min and l.qty between 1 and :max \
             group by t.a having count(*) > 1 \
             order by t.a desc nulls last limit 10 offset 5",
        );
        let plain = plain(&select);
        assert_eq!(plain.items.len(), 3);
        assert!(matches!(plain.items[2], SelectItem::Wildcard));
        assert_eq!(plain.joins.len(), 1);
        assert_eq!(plain.joins[0].kind, JoinKind::Left);
        assert!(plain.where_clause.is_some());
        assert_eq!(plain.group_by.len(), 1);
        assert!(plain.having.is_some());
        assert_eq!(plain.order_by.len(), 1);
        assert_eq!(plain.order_by[0].nulls_first, Some(false));
        assert!(plain.limit.is_some() && plain.offset.is_some());

        let FromSource::Table(table) = &plain.from else {
            panic!("expected a table source");
        };
        assert_eq!(table.schema.as_deref(), Some("s"));
        assert_eq!(table.name, "orders");
        assert_eq!(table.alias.as_deref(), Some("t"));
    }

    #[test]
    fn parses_comma_joins_and_table_wildcards() {
        let select = parse_select("select table1.*, table2.colB from table1, table2");
        let plain = plain(&select);
        assert_eq!(
            plain.items[0],
            SelectItem::TableWildcard("table1".to_string())
        );
        assert_eq!(plain.joins.len(), 1);
        assert_eq!(plain.joins[0].kind, JoinKind::Comma);
    }

    #[test]
    fn parses_subselect_sources_and_unions() {
        let select =
            parse_select("select x from (select a x from t) s union all select y from u");
        let SelectBody::Union { left, all, .. } = &select.body else {
            panic!("expected a union");
        };
        assert!(*all);
        let SelectBody::Plain(plain) = left.as_ref() else {
            panic!("expected a plain left arm");
        };
        assert!(matches!(plain.from, FromSource::SubSelect { .. }));
    }

    #[test]
    fn parses_entity_references_in_from() {
        let select = parse_select("select o.total from #orders/summary o");
        let plain = plain(&select);
        let FromSource::Table(table) = &plain.from else {
            panic!("expected a table source");
        };
        assert!(table.is_entity_reference());
        assert_eq!(table.name, "#orders/summary");
        assert_eq!(table.alias.as_deref(), Some("o"));
    }

    #[test]
    fn commands_pass_through_verbatim() {
        let sql = "delete from orders where id = :id";
        match parse(sql).unwrap() {
            Statement::Command(command) => assert_eq!(command.text, sql),
            Statement::Select(_) => panic!("expected a command"),
        }
    }

    #[test]
    fn unknown_statements_are_rejected() {
        let error = parse("frobnicate the database").unwrap_err();
        assert!(error.message.contains("expected SELECT"));
        assert_eq!(error.line, 1);
    }

    #[test]
    fn incomplete_selects_are_rejected() {
        assert!(parse("select a from").is_err());
        assert!(parse("select from t").is_err());
        assert!(parse("select a t.").is_err());
    }

    #[test]
    fn not_requires_a_predicate_tail() {
        assert!(parse("select a from t where x not 5").is_err());
        assert!(parse("select a from t where not x = 5").is_ok());
        assert!(parse("select a from t where x not in (1, 2)").is_ok());
    }
}
