use strata_types::{TypeTag, Value};

/// A procedure as supplied by the upstream front end: a name, optional ordered parameter names,
/// and a statement-list body.
#[derive(Clone, Debug, PartialEq)]
pub struct Procedure {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

impl Procedure {
    pub fn new(name: impl Into<String>, params: &[&str], body: Vec<Stmt>) -> Self {
        Self {
            name: name.into(),
            params: params.iter().map(|p| p.to_string()).collect(),
            body,
        }
    }
}

/// The closed statement sum. `If` and `While` carry site ids assigned at install time; branch
/// and loop profiling key on them.
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Let {
        name: String,
        value: Expr,
    },
    Assign {
        name: String,
        value: Expr,
    },
    Expr(Expr),
    If {
        id: u32,
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
    },
    While {
        id: u32,
        cond: Expr,
        body: Vec<Stmt>,
    },
    Return(Option<Expr>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

/// The closed expression sum. `SpecializedBinary` never comes from the front end; the tier-2/3
/// optimizer introduces it, and its tag guard is what a deopt checks at runtime.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Value),
    Var(String),
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    SpecializedBinary {
        op: BinOp,
        tag: TypeTag,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        callee: String,
        args: Vec<Expr>,
    },
    Field {
        object: Box<Expr>,
        field: String,
    },
    ArrayLit(Vec<Expr>),
    ObjectLit {
        class: Option<String>,
        fields: Vec<(String, Expr)>,
    },
}

impl Expr {
    pub fn literal(value: impl Into<Value>) -> Expr {
        Expr::Literal(value.into())
    }

    pub fn var(name: impl Into<String>) -> Expr {
        Expr::Var(name.into())
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn call(callee: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Call {
            callee: callee.into(),
            args,
        }
    }
}

/// Number every branch and loop site, depth first. Runs once at install; the ids feed the
/// profiler's branch and loop records.
pub fn annotate_sites(proc: &mut Procedure) {
    let mut next = 0u32;
    annotate_block(&mut proc.body, &mut next);
}

fn annotate_block(stmts: &mut [Stmt], next: &mut u32) {
    for stmt in stmts {
        match stmt {
            Stmt::If {
                id,
                then_body,
                else_body,
                ..
            } => {
                *id = *next;
                *next += 1;
                annotate_block(then_body, next);
                annotate_block(else_body, next);
            }
            Stmt::While { id, body, .. } => {
                *id = *next;
                *next += 1;
                annotate_block(body, next);
            }
            _ => {}
        }
    }
}

/// Total AST node count, used as the plan-size limit during tier generation.
pub fn count_nodes(proc: &Procedure) -> usize {
    proc.body.iter().map(count_stmt).sum()
}

fn count_stmt(stmt: &Stmt) -> usize {
    match stmt {
        Stmt::Let { value, .. } | Stmt::Assign { value, .. } | Stmt::Expr(value) => {
            1 + count_expr(value)
        }
        Stmt::If {
            cond,
            then_body,
            else_body,
            ..
        } => {
            1 + count_expr(cond)
                + then_body.iter().map(count_stmt).sum::<usize>()
                + else_body.iter().map(count_stmt).sum::<usize>()
        }
        Stmt::While { cond, body, .. } => {
            1 + count_expr(cond) + body.iter().map(count_stmt).sum::<usize>()
        }
        Stmt::Return(value) => 1 + value.as_ref().map_or(0, count_expr),
    }
}

fn count_expr(expr: &Expr) -> usize {
    match expr {
        Expr::Literal(_) | Expr::Var(_) => 1,
        Expr::Unary { operand, .. } => 1 + count_expr(operand),
        Expr::Binary { lhs, rhs, .. } | Expr::SpecializedBinary { lhs, rhs, .. } => {
            1 + count_expr(lhs) + count_expr(rhs)
        }
        Expr::Call { args, .. } => 1 + args.iter().map(count_expr).sum::<usize>(),
        Expr::Field { object, .. } => 1 + count_expr(object),
        Expr::ArrayLit(items) => 1 + items.iter().map(count_expr).sum::<usize>(),
        Expr::ObjectLit { fields, .. } => {
            1 + fields.iter().map(|(_, e)| count_expr(e)).sum::<usize>()
        }
    }
}
