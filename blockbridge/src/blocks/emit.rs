use std::str::FromStr;

use crate::syntax::*;
use crate::utils::{EmitError, ToSource};

use super::{BlockKind, BlockNode, Field};

type EmitResult<T> = Result<T, EmitError>;

impl ToSource for BlockNode {
    fn to_source(&self) -> EmitResult<Program> {
        match self.kind {
            BlockKind::Program => Ok(Program {
                items: Emitter::default().stmts(&self.children)?,
            }),
            other => Err(EmitError::UnexpectedBlock(other)),
        }
    }
}

/// Turns blocks back into syntax trees; the printer in `syntax` produces the text.
#[derive(Default)]
struct Emitter {
    position: usize,
}

fn stmt(kind: StmtKind) -> Stmt {
    Stmt::new(kind, Span::default())
}

fn expr(kind: ExprKind) -> Expr {
    Expr::new(kind, Span::default())
}

fn boxed(kind: ExprKind) -> Box<Expr> {
    Box::new(expr(kind))
}

fn braced(body: Vec<Stmt>) -> Box<Stmt> {
    Box::new(stmt(StmtKind::Block(body)))
}

fn missing(block: &BlockNode, slot: &str) -> EmitError {
    EmitError::MissingField {
        block: block.kind,
        slot: slot.to_owned(),
    }
}

fn operator<T: FromStr>(block: &BlockNode, slot: &str) -> EmitResult<T> {
    let op = literal(block, slot)?;
    op.parse().map_err(|_| missing(block, slot))
}

fn literal<'b>(block: &'b BlockNode, slot: &str) -> EmitResult<&'b str> {
    block.literal_of(slot).ok_or_else(|| missing(block, slot))
}

fn type_of(block: &BlockNode, slot: &str) -> EmitResult<Option<TypeRef>> {
    match block.literal_of(slot) {
        Some(text) => Ok(Some(parse_type_str(text)?)),
        None => Ok(None),
    }
}

fn params(block: &BlockNode, prefix: &str) -> EmitResult<Vec<Param>> {
    let mut params = vec![];
    for i in 0.. {
        let Some(name) = block.literal_of(&format!("{}PARAM{}", prefix, i)) else {
            break;
        };
        params.push(Param {
            name: name.to_owned(),
            ty: type_of(block, &format!("{}TYPE{}", prefix, i))?,
            optional: block.literal_of(&format!("{}OPTIONAL{}", prefix, i)) == Some("true"),
            default: None,
            span: Span::default(),
        });
    }
    Ok(params)
}

impl Emitter {
    fn stmts(&mut self, blocks: &[BlockNode]) -> EmitResult<Vec<Stmt>> {
        let mut out = vec![];
        for block in blocks {
            out.extend(self.stmt(block)?);
        }
        Ok(out)
    }

    fn body(&mut self, block: &BlockNode) -> EmitResult<Box<Stmt>> {
        Ok(braced(self.stmts(&block.children)?))
    }

    /// A statement block expands to zero or more statements: embedded source may hold several.
    fn stmt(&mut self, block: &BlockNode) -> EmitResult<Vec<Stmt>> {
        use BlockKind::*;
        self.position += 1;
        let kind = match block.kind {
            Namespace => StmtKind::Namespace(crate::syntax::Namespace {
                name: literal(block, "NAME")?.to_owned(),
                body: self.stmts(&block.children)?,
            }),
            SourceDeclaration => {
                return Ok(parse_program(literal(block, "SOURCE")?)?.items);
            }
            Unrepresentable => {
                let source = block
                    .literal_of("SOURCE")
                    .ok_or(EmitError::MissingSource(self.position))?;
                return Ok(parse_program(source)?.items);
            }
            FunctionDefinition => StmtKind::Function(FunctionDecl {
                name: literal(block, "NAME")?.to_owned(),
                declare: false,
                params: params(block, "")?,
                ret: type_of(block, "RETURNS")?,
                body: Some(self.stmts(&block.children)?),
            }),
            FunctionReturn => StmtKind::Return(self.optional(block, "VALUE")?),
            VariablesSet => {
                let value = self.optional(block, "VALUE")?;
                let name = literal(block, "VAR")?.to_owned();
                match block.literal_of("DECL") {
                    Some(decl) => StmtKind::VarDecl(VarDecl {
                        kind: decl.parse().map_err(|_| missing(block, "DECL"))?,
                        declarators: vec![Declarator {
                            name,
                            ty: type_of(block, "TYPE")?,
                            init: value,
                            span: Span::default(),
                        }],
                    }),
                    None => {
                        let value = value.ok_or_else(|| missing(block, "VALUE"))?;
                        StmtKind::Expr(expr(ExprKind::Assign(Assign {
                            op: AssignOp::Assign,
                            target: boxed(ExprKind::Ident(name)),
                            value: Box::new(value),
                        })))
                    }
                }
            }
            VariablesChange => {
                let target = expr(ExprKind::Ident(literal(block, "VAR")?.to_owned()));
                StmtKind::Expr(self.change(block, target)?)
            }
            PropertySet => {
                let target = expr(ExprKind::Member(Member {
                    object: Box::new(self.required(block, "OBJECT")?),
                    property: literal(block, "PROPERTY")?.to_owned(),
                }));
                StmtKind::Expr(self.change(block, target)?)
            }
            ListsSetIndex => {
                let target = expr(ExprKind::Index(Index {
                    object: Box::new(self.required(block, "LIST")?),
                    index: Box::new(self.required(block, "INDEX")?),
                }));
                StmtKind::Expr(self.change(block, target)?)
            }
            CallStatement => {
                let mut call = self.call(block)?;
                if let Some(style) = block.literal_of("HANDLER") {
                    let lambda = Lambda {
                        style: style.parse().map_err(|_| missing(block, "HANDLER"))?,
                        params: params(block, "HANDLER_")?,
                        ret: None,
                        body: self.stmts(&block.children)?,
                    };
                    call.args.push(expr(ExprKind::Lambda(lambda)));
                }
                StmtKind::Expr(expr(ExprKind::Call(call)))
            }
            ControlsIf => return Ok(vec![stmt(self.if_chain(block)?)]),
            ControlsWhile => StmtKind::While(While {
                cond: self.required(block, "COND")?,
                body: self.body(block)?,
            }),
            ControlsFor => self.for_loop(block)?,
            ControlsRepeat => {
                let var = literal(block, "VAR")?.to_owned();
                StmtKind::For(For {
                    init: Some(ForInit::Decl(VarDecl {
                        kind: DeclKind::Let,
                        declarators: vec![Declarator {
                            name: var.clone(),
                            ty: None,
                            init: Some(expr(ExprKind::Number("0".into()))),
                            span: Span::default(),
                        }],
                    })),
                    init_span: None,
                    cond: Some(expr(ExprKind::Binary(Binary {
                        op: BinaryOp::Less,
                        left: boxed(ExprKind::Ident(var.clone())),
                        right: Box::new(self.required(block, "TIMES")?),
                    }))),
                    update: Some(expr(ExprKind::Update(Update {
                        op: UpdateOp::Increment,
                        prefix: false,
                        target: boxed(ExprKind::Ident(var)),
                    }))),
                    body: self.body(block)?,
                })
            }
            ControlsForOf => StmtKind::ForOf(ForEach {
                kind: DeclKind::Let,
                name: literal(block, "VAR")?.to_owned(),
                ty: None,
                iterable: self.required(block, "LIST")?,
                body: self.body(block)?,
            }),
            BreakKeyword => StmtKind::Break,
            ContinueKeyword => StmtKind::Continue,
            other => return Err(EmitError::UnexpectedBlock(other)),
        };
        Ok(vec![stmt(kind)])
    }

    /// Assignment, compound assignment or `++`/`--` on `target`.
    fn change(&mut self, block: &BlockNode, target: Expr) -> EmitResult<Expr> {
        let op = literal(block, "OP")?;
        if let Ok(op) = op.parse::<UpdateOp>() {
            return Ok(expr(ExprKind::Update(Update {
                op,
                prefix: false,
                target: Box::new(target),
            })));
        }
        Ok(expr(ExprKind::Assign(Assign {
            op: operator(block, "OP")?,
            target: Box::new(target),
            value: Box::new(self.required(block, "VALUE")?),
        })))
    }

    fn if_chain(&mut self, block: &BlockNode) -> EmitResult<StmtKind> {
        let mut else_branch = None;
        for branch in block.children.iter().rev() {
            match branch.kind {
                BlockKind::ControlsElse => else_branch = Some(self.body(branch)?),
                BlockKind::ControlsIfBranch => {
                    let kind = StmtKind::If(If {
                        cond: self.required(branch, "COND")?,
                        then_branch: self.body(branch)?,
                        else_branch,
                    });
                    else_branch = Some(Box::new(stmt(kind)));
                }
                other => return Err(EmitError::UnexpectedBlock(other)),
            }
        }
        match else_branch.map(|s| s.kind) {
            Some(kind @ StmtKind::If(_)) => Ok(kind),
            _ => Err(missing(block, "controls_if_branch")),
        }
    }

    fn for_loop(&mut self, block: &BlockNode) -> EmitResult<StmtKind> {
        let var = literal(block, "VAR")?.to_owned();
        let ident = || boxed(ExprKind::Ident(var.clone()));
        let update_op = literal(block, "UPDATE")?;
        let update = match update_op.parse::<UpdateOp>() {
            Ok(op) => ExprKind::Update(Update {
                op,
                prefix: false,
                target: ident(),
            }),
            Err(_) => ExprKind::Assign(Assign {
                op: operator(block, "UPDATE")?,
                target: ident(),
                value: boxed(ExprKind::Number(literal(block, "BY")?.to_owned())),
            }),
        };
        Ok(StmtKind::For(For {
            init: Some(ForInit::Decl(VarDecl {
                kind: DeclKind::Let,
                declarators: vec![Declarator {
                    name: var.clone(),
                    ty: None,
                    init: Some(self.required(block, "FROM")?),
                    span: Span::default(),
                }],
            })),
            init_span: None,
            cond: Some(expr(ExprKind::Binary(Binary {
                op: operator(block, "COMPARE")?,
                left: ident(),
                right: Box::new(self.required(block, "TO")?),
            }))),
            update: Some(expr(update)),
            body: self.body(block)?,
        }))
    }

    fn call(&mut self, block: &BlockNode) -> EmitResult<Call> {
        let callee = match block.literal_of("FUNC") {
            Some(path) => path_expr(path),
            None => expr(ExprKind::Member(Member {
                object: Box::new(self.required(block, "OBJECT")?),
                property: literal(block, "METHOD")?.to_owned(),
            })),
        };
        Ok(Call {
            callee: Box::new(callee),
            args: self.indexed(block, "ARG")?,
        })
    }

    fn indexed(&mut self, block: &BlockNode, prefix: &str) -> EmitResult<Vec<Expr>> {
        block
            .indexed(prefix)
            .into_iter()
            .map(|field| match field {
                Field::Child(node) => self.expr(node),
                Field::Literal(_) => Err(missing(block, prefix)),
            })
            .collect()
    }

    fn required(&mut self, block: &BlockNode, slot: &str) -> EmitResult<Expr> {
        match block.child_of(slot) {
            Some(node) => self.expr(node),
            None => Err(missing(block, slot)),
        }
    }

    fn optional(&mut self, block: &BlockNode, slot: &str) -> EmitResult<Option<Expr>> {
        block.child_of(slot).map(|node| self.expr(node)).transpose()
    }

    fn binary(&mut self, block: &BlockNode, op: BinaryOp) -> EmitResult<Expr> {
        Ok(expr(ExprKind::Binary(Binary {
            op,
            left: Box::new(self.required(block, "A")?),
            right: Box::new(self.required(block, "B")?),
        })))
    }

    fn expr(&mut self, block: &BlockNode) -> EmitResult<Expr> {
        use BlockKind::*;
        let kind = match block.kind {
            MathNumber => ExprKind::Number(literal(block, "NUM")?.to_owned()),
            Text => ExprKind::Str(literal(block, "TEXT")?.to_owned()),
            LogicBoolean => ExprKind::Bool(literal(block, "BOOL")? == "true"),
            LogicNull => ExprKind::Null,
            VariablesGet => ExprKind::Ident(literal(block, "VAR")?.to_owned()),
            MathArithmetic | LogicCompare | LogicOperation => {
                return self.binary(block, operator(block, "OP")?)
            }
            TextJoin => return self.binary(block, BinaryOp::Add),
            LogicNegate => ExprKind::Unary(Unary {
                op: UnaryOp::Not,
                operand: Box::new(self.required(block, "BOOL")?),
            }),
            MathNeg => ExprKind::Unary(Unary {
                op: UnaryOp::Minus,
                operand: Box::new(self.required(block, "NUM")?),
            }),
            ListsCreateWith => ExprKind::Array(self.indexed(block, "ADD")?),
            ListsIndexGet => ExprKind::Index(Index {
                object: Box::new(self.required(block, "LIST")?),
                index: Box::new(self.required(block, "INDEX")?),
            }),
            PropertyGet => ExprKind::Member(Member {
                object: Box::new(self.required(block, "OBJECT")?),
                property: literal(block, "PROPERTY")?.to_owned(),
            }),
            EnumMember => ExprKind::Member(Member {
                object: Box::new(path_expr(literal(block, "ENUM")?)),
                property: literal(block, "MEMBER")?.to_owned(),
            }),
            CallExpression => ExprKind::Call(self.call(block)?),
            ObjectCreate => ExprKind::New(New {
                class: literal(block, "CLASS")?.to_owned(),
                args: self.indexed(block, "ARG")?,
            }),
            other => return Err(EmitError::UnexpectedBlock(other)),
        };
        Ok(expr(kind))
    }
}

/// `a.b.c` as a chain of member accesses.
fn path_expr(path: &str) -> Expr {
    let mut parts = path.split('.');
    let root = parts.next().unwrap_or_default().to_owned();
    parts.fold(expr(ExprKind::Ident(root)), |object, property| {
        expr(ExprKind::Member(Member {
            object: Box::new(object),
            property: property.to_owned(),
        }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number(n: &str) -> BlockNode {
        BlockNode::new(BlockKind::MathNumber).literal("NUM", n)
    }

    fn program(children: Vec<BlockNode>) -> BlockNode {
        BlockNode::new(BlockKind::Program).with_children(children)
    }

    #[test]
    fn statements_print_canonically() {
        let tree = program(vec![
            BlockNode::new(BlockKind::VariablesSet)
                .literal("DECL", "let")
                .literal("VAR", "x")
                .child("VALUE", number("1")),
            BlockNode::new(BlockKind::ControlsFor)
                .literal("VAR", "i")
                .child("FROM", number("0"))
                .literal("COMPARE", "<")
                .child("TO", number("4"))
                .literal("UPDATE", "+=")
                .literal("BY", "2")
                .with_children(vec![BlockNode::new(BlockKind::VariablesChange)
                    .literal("VAR", "x")
                    .literal("OP", "++")]),
            BlockNode::new(BlockKind::CallStatement)
                .literal("FUNC", "basic.showNumber")
                .child(
                    "ARG0",
                    BlockNode::new(BlockKind::MathArithmetic)
                        .literal("OP", "*")
                        .child(
                            "A",
                            BlockNode::new(BlockKind::MathArithmetic)
                                .literal("OP", "+")
                                .child("A", number("1"))
                                .child("B", number("2")),
                        )
                        .child("B", number("3")),
                ),
        ]);
        let source = tree.to_source().unwrap().to_string();
        assert_eq!(
            source,
            "let x = 1;\nfor (let i = 0; i < 4; i += 2) {\n    x++;\n}\nbasic.showNumber((1 + 2) * 3);\n"
        );
    }

    #[test]
    fn if_chains_and_callbacks() {
        let cond = |v: &str| BlockNode::new(BlockKind::VariablesGet).literal("VAR", v);
        let tree = program(vec![
            BlockNode::new(BlockKind::ControlsIf).with_children(vec![
                BlockNode::new(BlockKind::ControlsIfBranch)
                    .child("COND", cond("a"))
                    .with_children(vec![BlockNode::new(BlockKind::BreakKeyword)]),
                BlockNode::new(BlockKind::ControlsIfBranch).child("COND", cond("b")),
                BlockNode::new(BlockKind::ControlsElse)
                    .with_children(vec![BlockNode::new(BlockKind::ContinueKeyword)]),
            ]),
            BlockNode::new(BlockKind::CallStatement)
                .literal("FUNC", "input.onEvent")
                .child("ARG0", number("1"))
                .literal("HANDLER", "arrow")
                .literal("HANDLER_PARAM0", "e")
                .literal("HANDLER_TYPE0", "number"),
        ]);
        let source = tree.to_source().unwrap().to_string();
        assert_eq!(
            source,
            "if (a) {\n    break;\n} else if (b) {} else {\n    continue;\n}\ninput.onEvent(1, (e: number) => {});\n"
        );
    }

    #[test]
    fn unrepresentable_needs_source() {
        let bare = program(vec![
            BlockNode::new(BlockKind::BreakKeyword),
            BlockNode::new(BlockKind::Unrepresentable).literal("CODE0", "4010"),
        ]);
        assert_eq!(bare.to_source(), Err(EmitError::MissingSource(2)));

        let with_source = program(vec![BlockNode::new(BlockKind::Unrepresentable)
            .literal("CODE0", "3001")
            .literal("SOURCE", "for (let k in o) {}")]);
        let items = with_source.to_source().unwrap().items;
        assert!(matches!(items[0].kind, StmtKind::ForIn(_)));
    }

    #[test]
    fn misplaced_blocks_are_rejected() {
        let tree = program(vec![number("1")]);
        assert_eq!(
            tree.to_source(),
            Err(EmitError::UnexpectedBlock(BlockKind::MathNumber))
        );
        let incomplete = program(vec![BlockNode::new(BlockKind::ControlsWhile)]);
        assert!(matches!(
            incomplete.to_source(),
            Err(EmitError::MissingField { slot, .. }) if slot == "COND"
        ));
    }
}
