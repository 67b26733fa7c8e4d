/// A parsed statement: either a `SELECT` tree or an opaque command.
///
/// Commands keep their raw text; the engine scans it for named parameters
/// but never restructures it.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(Select),
    Command(Command),
}

/// A non-`SELECT` statement kept verbatim (DML, DDL, procedure calls).
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub text: String,
}

/// A `SELECT` statement: a plain select or a `UNION` tree over them.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub body: SelectBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectBody {
    Plain(Box<PlainSelect>),
    Union {
        left: Box<SelectBody>,
        right: Box<SelectBody>,
        all: bool,
    },
}

impl SelectBody {
    /// The leftmost plain select, which determines the output schema of a
    /// union tree.
    pub fn leftmost(&self) -> &PlainSelect {
        match self {
            SelectBody::Plain(plain) => plain,
            SelectBody::Union { left, .. } => left.leftmost(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlainSelect {
    pub distinct: bool,
    pub items: Vec<SelectItem>,
    pub from: FromSource,
    pub joins: Vec<Join>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<Expr>,
    pub offset: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// `*`
    Wildcard,
    /// `qualifier.*`
    TableWildcard(String),
    /// An expression, optionally aliased.
    Expr { expr: Expr, alias: Option<String> },
}

/// A table reference in `FROM`/`JOIN`, possibly schema-qualified.
///
/// Names beginning with `#` are entity references that the inliner replaces
/// before the statement leaves the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub schema: Option<String>,
    pub name: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        TableRef {
            schema: None,
            name: name.into(),
            alias: None,
        }
    }

    /// The name a source is addressed by inside the statement: its alias if
    /// present, else its bare table name.
    pub fn effective_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn is_entity_reference(&self) -> bool {
        self.schema.is_none() && self.name.starts_with('#')
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FromSource {
    Table(TableRef),
    SubSelect {
        select: Box<Select>,
        alias: Option<String>,
    },
}

impl FromSource {
    pub fn alias(&self) -> Option<&str> {
        match self {
            FromSource::Table(table) => table.alias.as_deref(),
            FromSource::SubSelect { alias, .. } => alias.as_deref(),
        }
    }

    /// The name this source contributes to the resolver's source map.
    pub fn effective_name(&self) -> Option<&str> {
        match self {
            FromSource::Table(table) => Some(table.effective_name()),
            FromSource::SubSelect { alias, .. } => alias.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// The `FROM a, b` form.
    Comma,
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinConstraint {
    On(Expr),
    Using(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub natural: bool,
    pub source: FromSource,
    pub constraint: Option<JoinConstraint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: Expr,
    pub direction: Option<OrderDirection>,
    pub nulls_first: Option<bool>,
}

/// A column reference, optionally qualified by a source name.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRef {
    pub table: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    /// Numbers keep their textual form so deparsing cannot change them.
    Number(String),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Minus,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Concat,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(ColumnRef),
    /// A named parameter `:name`.
    Parameter(String),
    Literal(Literal),
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Function {
        name: String,
        distinct: bool,
        /// `count(*)` and friends.
        wildcard: bool,
        args: Vec<Expr>,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    InSelect {
        expr: Box<Expr>,
        select: Box<Select>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    Case {
        operand: Option<Box<Expr>>,
        branches: Vec<(Expr, Expr)>,
        else_branch: Option<Box<Expr>>,
    },
    /// Postfix `::type` cast.
    Cast {
        expr: Box<Expr>,
        type_name: String,
    },
    Exists(Box<Select>),
    ScalarSubquery(Box<Select>),
    /// Explicit parentheses, preserved for deparsing.
    Nested(Box<Expr>),
}
