use std::fmt::{Display, Formatter, Result};

use super::*;

const INDENT: &str = "    ";

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        for item in &self.items {
            write_stmt(f, item, 0)?;
        }
        Ok(())
    }
}

impl Display for Stmt {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write_stmt(f, self, 0)
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write_expr(f, self, 0, 0)
    }
}

impl Display for TypeRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Self::Named { name, args } if args.is_empty() => write!(f, "{}", name),
            Self::Named { name, args } => write!(f, "{}<{}>", name, join(args, ", ")),
            Self::Array(elem) if matches!(**elem, Self::Function { .. }) => {
                write!(f, "({})[]", elem)
            }
            Self::Array(elem) => write!(f, "{}[]", elem),
            Self::Function { params, ret } => {
                let params = params
                    .iter()
                    .map(|(name, ty)| format!("{}: {}", name, ty))
                    .collect::<Vec<_>>();
                write!(f, "({}) => {}", params.join(", "), ret)
            }
        }
    }
}

impl Display for Param {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}", self.name)?;
        if self.optional {
            write!(f, "?")?;
        }
        if let Some(ty) = &self.ty {
            write!(f, ": {}", ty)?;
        }
        if let Some(default) = &self.default {
            write!(f, " = {}", default)?;
        }
        Ok(())
    }
}

fn join<T: Display>(items: &[T], sep: &str) -> String {
    items
        .iter()
        .map(T::to_string)
        .collect::<Vec<_>>()
        .join(sep)
}

fn pad(f: &mut Formatter<'_>, depth: usize) -> Result {
    write!(f, "{}", INDENT.repeat(depth))
}

fn write_attributes(f: &mut Formatter<'_>, attributes: &[Attribute], depth: usize) -> Result {
    for attr in attributes {
        pad(f, depth)?;
        writeln!(f, "{}", attr.text)?;
    }
    Ok(())
}

fn write_body(f: &mut Formatter<'_>, body: &[Stmt], depth: usize) -> Result {
    if body.is_empty() {
        return write!(f, "{{}}");
    }
    writeln!(f, "{{")?;
    for stmt in body {
        write_stmt(f, stmt, depth + 1)?;
    }
    pad(f, depth)?;
    write!(f, "}}")
}

/// Writes a nested statement after a header such as `while (c) `.
fn write_nested(f: &mut Formatter<'_>, stmt: &Stmt, depth: usize) -> Result {
    match &stmt.kind {
        StmtKind::Block(body) => write_body(f, body, depth),
        _ => write_body(f, std::slice::from_ref(stmt), depth),
    }
}

fn write_var_decl(f: &mut Formatter<'_>, decl: &VarDecl, depth: usize) -> Result {
    write!(f, "{} ", decl.kind)?;
    for (i, d) in decl.declarators.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", d.name)?;
        if let Some(ty) = &d.ty {
            write!(f, ": {}", ty)?;
        }
        if let Some(init) = &d.init {
            write!(f, " = ")?;
            write_expr(f, init, 0, depth)?;
        }
    }
    Ok(())
}

fn write_signature(
    f: &mut Formatter<'_>,
    params: &[Param],
    ret: &Option<TypeRef>,
    body: &Option<Vec<Stmt>>,
    depth: usize,
) -> Result {
    write!(f, "({})", join(params, ", "))?;
    if let Some(ret) = ret {
        write!(f, ": {}", ret)?;
    }
    match body {
        Some(body) => {
            write!(f, " ")?;
            write_body(f, body, depth)
        }
        None => write!(f, ";"),
    }
}

fn write_stmt(f: &mut Formatter<'_>, stmt: &Stmt, depth: usize) -> Result {
    write_attributes(f, &stmt.attributes, depth)?;
    pad(f, depth)?;
    match &stmt.kind {
        StmtKind::Namespace(ns) => {
            write!(f, "namespace {} ", ns.name)?;
            write_body(f, &ns.body, depth)?;
        }
        StmtKind::Function(func) => {
            if func.declare {
                write!(f, "declare ")?;
            }
            write!(f, "function {}", func.name)?;
            write_signature(f, &func.params, &func.ret, &func.body, depth)?;
        }
        StmtKind::Class(class) => write_class(f, class, depth)?,
        StmtKind::Interface(iface) => {
            write!(f, "interface {}", iface.name)?;
            if !iface.type_params.is_empty() {
                write!(f, "<{}>", iface.type_params.join(", "))?;
            }
            if !iface.extends.is_empty() {
                write!(f, " extends {}", join(&iface.extends, ", "))?;
            }
            writeln!(f, " {{")?;
            for member in &iface.members {
                pad(f, depth + 1)?;
                write!(f, "{}", member.name)?;
                if member.optional {
                    write!(f, "?")?;
                }
                match &member.kind {
                    InterfaceMemberKind::Property(ty) => writeln!(f, ": {};", ty)?,
                    InterfaceMemberKind::Method { params, ret } => {
                        write!(f, "({})", join(params, ", "))?;
                        match ret {
                            Some(ret) => writeln!(f, ": {};", ret)?,
                            None => writeln!(f, ";")?,
                        }
                    }
                }
            }
            pad(f, depth)?;
            write!(f, "}}")?;
        }
        StmtKind::Enum(e) => {
            writeln!(f, "enum {} {{", e.name)?;
            for member in &e.members {
                pad(f, depth + 1)?;
                write!(f, "{}", member.name)?;
                if let Some(value) = &member.value {
                    write!(f, " = {}", value)?;
                }
                writeln!(f, ",")?;
            }
            pad(f, depth)?;
            write!(f, "}}")?;
        }
        StmtKind::VarDecl(decl) => {
            write_var_decl(f, decl, depth)?;
            write!(f, ";")?;
        }
        StmtKind::Expr(expr) => {
            write_expr(f, expr, 0, depth)?;
            write!(f, ";")?;
        }
        StmtKind::If(i) => write_if(f, i, depth)?,
        StmtKind::While(w) => {
            write!(f, "while ({}) ", w.cond)?;
            write_nested(f, &w.body, depth)?;
        }
        StmtKind::For(l) => {
            write!(f, "for (")?;
            match &l.init {
                Some(ForInit::Decl(decl)) => write_var_decl(f, decl, depth)?,
                Some(ForInit::Expr(e)) => write!(f, "{}", e)?,
                None => {}
            }
            write!(f, ";")?;
            if let Some(cond) = &l.cond {
                write!(f, " {}", cond)?;
            }
            write!(f, ";")?;
            if let Some(update) = &l.update {
                write!(f, " {}", update)?;
            }
            write!(f, ") ")?;
            write_nested(f, &l.body, depth)?;
        }
        StmtKind::ForOf(each) | StmtKind::ForIn(each) => {
            let word = if matches!(stmt.kind, StmtKind::ForOf(_)) {
                "of"
            } else {
                "in"
            };
            write!(f, "for ({} {}", each.kind, each.name)?;
            if let Some(ty) = &each.ty {
                write!(f, ": {}", ty)?;
            }
            write!(f, " {} {}) ", word, each.iterable)?;
            write_nested(f, &each.body, depth)?;
        }
        StmtKind::Return(Some(value)) => {
            write!(f, "return ")?;
            write_expr(f, value, 0, depth)?;
            write!(f, ";")?;
        }
        StmtKind::Return(None) => write!(f, "return;")?,
        StmtKind::Break => write!(f, "break;")?,
        StmtKind::Continue => write!(f, "continue;")?,
        StmtKind::Block(body) => write_body(f, body, depth)?,
    }
    writeln!(f)
}

fn write_if(f: &mut Formatter<'_>, i: &If, depth: usize) -> Result {
    write!(f, "if ({}) ", i.cond)?;
    write_nested(f, &i.then_branch, depth)?;
    match i.else_branch.as_deref() {
        Some(Stmt {
            kind: StmtKind::If(nested),
            attributes,
            ..
        }) if attributes.is_empty() => {
            write!(f, " else ")?;
            write_if(f, nested, depth)
        }
        Some(other) => {
            write!(f, " else ")?;
            write_nested(f, other, depth)
        }
        None => Ok(()),
    }
}

fn write_class(f: &mut Formatter<'_>, class: &ClassDecl, depth: usize) -> Result {
    write!(f, "class {}", class.name)?;
    if !class.type_params.is_empty() {
        write!(f, "<{}>", class.type_params.join(", "))?;
    }
    if !class.extends.is_empty() {
        write!(f, " extends {}", join(&class.extends, ", "))?;
    }
    if !class.implements.is_empty() {
        write!(f, " implements {}", join(&class.implements, ", "))?;
    }
    writeln!(f, " {{")?;
    for member in &class.members {
        write_attributes(f, &member.attributes, depth + 1)?;
        pad(f, depth + 1)?;
        if member.is_static {
            write!(f, "static ")?;
        }
        match &member.kind {
            MemberKind::Field { ty, optional, init } => {
                write!(f, "{}", member.name)?;
                if *optional {
                    write!(f, "?")?;
                }
                if let Some(ty) = ty {
                    write!(f, ": {}", ty)?;
                }
                if let Some(init) = init {
                    write!(f, " = ")?;
                    write_expr(f, init, 0, depth + 1)?;
                }
                write!(f, ";")?;
            }
            MemberKind::Method(m) | MemberKind::Constructor(m) => {
                write!(f, "{}", member.name)?;
                write_signature(f, &m.params, &m.ret, &m.body, depth + 1)?;
            }
            MemberKind::Getter(m) => {
                write!(f, "get {}", member.name)?;
                write_signature(f, &m.params, &m.ret, &m.body, depth + 1)?;
            }
            MemberKind::Setter(m) => {
                write!(f, "set {}", member.name)?;
                write_signature(f, &m.params, &m.ret, &m.body, depth + 1)?;
            }
        }
        writeln!(f)?;
    }
    pad(f, depth)?;
    write!(f, "}}")
}

impl Expr {
    /// Binding strength used to decide where parentheses are required.
    pub fn precedence(&self) -> u8 {
        match &self.kind {
            ExprKind::Lambda(_) => 0,
            ExprKind::Assign(_) => 1,
            ExprKind::Binary(bin) => binary_precedence(bin.op),
            ExprKind::Unary(_) | ExprKind::Update(Update { prefix: true, .. }) => 8,
            ExprKind::Update(_) | ExprKind::As(_) => 9,
            _ => 10,
        }
    }
}

pub(crate) fn binary_precedence(op: BinaryOp) -> u8 {
    use BinaryOp::*;
    match op {
        Or => 2,
        And => 3,
        Eq | NotEq | StrictEq | StrictNotEq => 4,
        Less | LessEq | Greater | GreaterEq => 5,
        Add | Sub => 6,
        Mul | Div | Mod => 7,
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            '\u{b}' => out.push_str("\\v"),
            '\u{2028}' | '\u{2029}' => out.push_str(&format!("\\u{:04x}", c as u32)),
            c if c.is_control() => out.push_str(&format!("\\u{{{:x}}}", c as u32)),
            c => out.push(c),
        }
    }
    out
}

fn write_args(f: &mut Formatter<'_>, args: &[Expr], depth: usize) -> Result {
    write!(f, "(")?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write_expr(f, arg, 0, depth)?;
    }
    write!(f, ")")
}

fn starts_with_minus(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Number(n) => n.starts_with('-'),
        ExprKind::Unary(Unary {
            op: UnaryOp::Minus, ..
        }) => true,
        ExprKind::Update(Update {
            op: UpdateOp::Decrement,
            prefix: true,
            ..
        }) => true,
        _ => false,
    }
}

fn write_expr(f: &mut Formatter<'_>, expr: &Expr, min: u8, depth: usize) -> Result {
    let wrap = expr.precedence() < min;
    if wrap {
        write!(f, "(")?;
    }
    match &expr.kind {
        ExprKind::Number(n) => write!(f, "{}", n)?,
        ExprKind::Str(s) => write!(f, "\"{}\"", escape(s))?,
        ExprKind::Bool(b) => write!(f, "{}", b)?,
        ExprKind::Null => write!(f, "null")?,
        ExprKind::Ident(name) => write!(f, "{}", name)?,
        ExprKind::This => write!(f, "this")?,
        ExprKind::Super => write!(f, "super")?,
        ExprKind::Array(elems) => {
            write!(f, "[")?;
            for (i, e) in elems.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_expr(f, e, 0, depth)?;
            }
            write!(f, "]")?;
        }
        ExprKind::Paren(inner) => {
            write!(f, "(")?;
            write_expr(f, inner, 0, depth)?;
            write!(f, ")")?;
        }
        ExprKind::Unary(unary) => {
            write!(f, "{}", unary.op)?;
            if unary.op == UnaryOp::Minus && starts_with_minus(&unary.operand) {
                write!(f, "(")?;
                write_expr(f, &unary.operand, 0, depth)?;
                write!(f, ")")?;
            } else {
                write_expr(f, &unary.operand, 8, depth)?;
            }
        }
        ExprKind::Update(update) if update.prefix => {
            write!(f, "{}", update.op)?;
            write_expr(f, &update.target, 9, depth)?;
        }
        ExprKind::Update(update) => {
            write_expr(f, &update.target, 10, depth)?;
            write!(f, "{}", update.op)?;
        }
        ExprKind::Binary(bin) => {
            let prec = binary_precedence(bin.op);
            write_expr(f, &bin.left, prec, depth)?;
            write!(f, " {} ", bin.op)?;
            write_expr(f, &bin.right, prec + 1, depth)?;
        }
        ExprKind::Assign(assign) => {
            write_expr(f, &assign.target, 9, depth)?;
            write!(f, " {} ", assign.op)?;
            write_expr(f, &assign.value, 1, depth)?;
        }
        ExprKind::Call(call) => {
            write_expr(f, &call.callee, 10, depth)?;
            write_args(f, &call.args, depth)?;
        }
        ExprKind::Member(member) => {
            write_expr(f, &member.object, 10, depth)?;
            write!(f, ".{}", member.property)?;
        }
        ExprKind::Index(index) => {
            write_expr(f, &index.object, 10, depth)?;
            write!(f, "[")?;
            write_expr(f, &index.index, 0, depth)?;
            write!(f, "]")?;
        }
        ExprKind::New(new) => {
            write!(f, "new {}", new.class)?;
            write_args(f, &new.args, depth)?;
        }
        ExprKind::Lambda(lambda) => {
            if lambda.style == LambdaStyle::Function {
                write!(f, "function ")?;
            }
            write!(f, "({})", join(&lambda.params, ", "))?;
            if let Some(ret) = &lambda.ret {
                write!(f, ": {}", ret)?;
            }
            if lambda.style == LambdaStyle::Arrow {
                write!(f, " =>")?;
            }
            write!(f, " ")?;
            write_body(f, &lambda.body, depth)?;
        }
        ExprKind::As(cast) => {
            write_expr(f, &cast.expr, 9, depth)?;
            write!(f, " as {}", cast.ty)?;
        }
    }
    if wrap {
        write!(f, ")")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::syntax::{parse_expr_str, parse_program};

    fn reprint(source: &str) -> String {
        parse_expr_str(source).unwrap().to_string()
    }

    #[test]
    fn minimal_parentheses() {
        assert_eq!(reprint("(a + b) * c"), "(a + b) * c");
        assert_eq!(reprint("a - (b - c)"), "a - (b - c)");
        assert_eq!(reprint("a - b - c"), "a - b - c");
        assert_eq!(reprint("-(-x)"), "-(-x)");
        assert_eq!(reprint("!(a && b)"), "!(a && b)");
    }

    #[test]
    fn canonical_program_is_a_fixpoint() {
        let source = "namespace game {
    //% block=\"spawn\"
    export function spawn(n: number, name?: string): void {
        for (let i = 0; i < n; i++) {
            if (i % 2 == 0) {
                log(\"even\\n\");
            } else if (i > 3) {
                break;
            } else {
                continue;
            }
        }
    }
}
class Point {
    x: number;
    constructor(x: number) {
        this.x = x;
    }
    get double(): number {
        return this.x * 2;
    }
}
";
        let once = parse_program(source).unwrap().to_string();
        let twice = parse_program(&once).unwrap().to_string();
        assert_eq!(once, twice);
        assert!(once.contains("} else if (i > 3) {"));
        assert!(once.contains("//% block=\"spawn\""));
    }
}
