use std::str::FromStr;

use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::PrattParser;
use pest::Parser;

use super::*;
use crate::utils::ParseError;

#[derive(pest_derive::Parser)]
#[grammar = "syntax/grammar.pest"]
struct ScriptParser;

lazy_static::lazy_static! {
    static ref PRATT_PARSER: PrattParser<Rule> = {
        use pest::pratt_parser::{Assoc::*, Op};
        PrattParser::new()
            .op(Op::infix(Rule::or, Left))
            .op(Op::infix(Rule::and, Left))
            .op(Op::infix(Rule::eq, Left) | Op::infix(Rule::neq, Left) | Op::infix(Rule::strict_eq, Left) | Op::infix(Rule::strict_neq, Left))
            .op(Op::infix(Rule::lt, Left) | Op::infix(Rule::lte, Left) | Op::infix(Rule::gt, Left) | Op::infix(Rule::gte, Left))
            .op(Op::infix(Rule::add, Left) | Op::infix(Rule::sub, Left))
            .op(Op::infix(Rule::mul, Left) | Op::infix(Rule::div, Left) | Op::infix(Rule::modulo, Left))
            .op(Op::prefix(Rule::not) | Op::prefix(Rule::neg) | Op::prefix(Rule::pre_inc) | Op::prefix(Rule::pre_dec))
            .op(Op::postfix(Rule::post_inc) | Op::postfix(Rule::post_dec) | Op::postfix(Rule::as_cast))
            .op(Op::postfix(Rule::call_args) | Op::postfix(Rule::member_access) | Op::postfix(Rule::index_access))
    };
}

type ParseResult<T> = Result<T, ParseError>;

pub fn parse_program(source: &str) -> ParseResult<Program> {
    let program = ScriptParser::parse(Rule::program, source)
        .map_err(syntax_error)?
        .next()
        .ok_or(ParseError::Missing("program"))?;
    let items = program
        .into_inner()
        .filter(|p| p.as_rule() == Rule::stmt)
        .map(parse_stmt)
        .collect::<ParseResult<Vec<_>>>()?;
    Ok(Program { items })
}

pub fn parse_expr_str(source: &str) -> ParseResult<Expr> {
    let input = ScriptParser::parse(Rule::expr_input, source)
        .map_err(syntax_error)?
        .next()
        .ok_or(ParseError::Missing("expression"))?;
    let mut inner = Inner::new(input, "expression");
    parse_expression(inner.expect(Rule::expression)?)
}

pub fn parse_type_str(source: &str) -> ParseResult<TypeRef> {
    let input = ScriptParser::parse(Rule::type_input, source)
        .map_err(syntax_error)?
        .next()
        .ok_or(ParseError::Missing("type"))?;
    let mut inner = Inner::new(input, "type");
    parse_type_ref(inner.expect(Rule::type_ref)?)
}

fn syntax_error(err: pest::error::Error<Rule>) -> ParseError {
    let (line, col) = match err.line_col {
        pest::error::LineColLocation::Pos(pos) => pos,
        pest::error::LineColLocation::Span(start, _) => start,
    };
    ParseError::Syntax {
        line,
        col,
        message: err.variant.message().into_owned(),
    }
}

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_as
            | Rule::kw_break
            | Rule::kw_class
            | Rule::kw_continue
            | Rule::kw_else
            | Rule::kw_enum
            | Rule::kw_extends
            | Rule::kw_for
            | Rule::kw_function
            | Rule::kw_if
            | Rule::kw_implements
            | Rule::kw_interface
            | Rule::kw_namespace
            | Rule::kw_new
            | Rule::kw_return
            | Rule::kw_while
    )
}

/// Cursor over the children of a pair that steps over keyword tokens.
struct Inner<'i> {
    pairs: Pairs<'i, Rule>,
    context: &'static str,
}

impl<'i> Inner<'i> {
    fn new(pair: Pair<'i, Rule>, context: &'static str) -> Self {
        Self {
            pairs: pair.into_inner(),
            context,
        }
    }

    fn next(&mut self) -> Option<Pair<'i, Rule>> {
        self.pairs.by_ref().find(|p| !is_keyword(p.as_rule()))
    }

    fn peek(&self) -> Option<Rule> {
        self.pairs
            .clone()
            .find(|p| !is_keyword(p.as_rule()))
            .map(|p| p.as_rule())
    }

    fn next_if(&mut self, rule: Rule) -> Option<Pair<'i, Rule>> {
        if self.peek() == Some(rule) {
            self.next()
        } else {
            None
        }
    }

    fn expect(&mut self, rule: Rule) -> ParseResult<Pair<'i, Rule>> {
        match self.next() {
            Some(pair) if pair.as_rule() == rule => Ok(pair),
            Some(pair) => Err(unexpected(&pair, self.context)),
            None => Err(ParseError::Missing(self.context)),
        }
    }

    fn take_while(&mut self, rule: Rule) -> Vec<Pair<'i, Rule>> {
        let mut taken = vec![];
        while let Some(pair) = self.next_if(rule) {
            taken.push(pair);
        }
        taken
    }
}

fn unexpected(pair: &Pair<'_, Rule>, context: &'static str) -> ParseError {
    ParseError::UnexpectedRule {
        found: format!("{:?}", pair.as_rule()),
        context,
    }
}

fn parse_attributes(pairs: Vec<Pair<'_, Rule>>) -> Vec<Attribute> {
    pairs
        .into_iter()
        .map(|p| Attribute::new(p.as_str().trim_end()))
        .collect()
}

fn parse_stmts<'i>(pairs: impl Iterator<Item = Pair<'i, Rule>>) -> ParseResult<Vec<Stmt>> {
    pairs
        .filter(|p| p.as_rule() == Rule::stmt)
        .map(parse_stmt)
        .collect()
}

fn parse_block(pair: Pair<'_, Rule>) -> ParseResult<Vec<Stmt>> {
    parse_stmts(pair.into_inner())
}

fn parse_stmt(pair: Pair<'_, Rule>) -> ParseResult<Stmt> {
    let mut inner = Inner::new(pair, "statement");
    let attributes = parse_attributes(inner.take_while(Rule::attribute));
    let body = inner.next().ok_or(ParseError::Missing("statement"))?;
    let span = Span::from(body.as_span());
    let kind = match body.as_rule() {
        Rule::declaration => parse_declaration(body)?,
        Rule::block => StmtKind::Block(parse_block(body)?),
        Rule::var_stmt => {
            let mut inner = Inner::new(body, "variable statement");
            StmtKind::VarDecl(parse_var_decl(inner.expect(Rule::var_decl)?)?)
        }
        Rule::if_stmt => {
            let mut inner = Inner::new(body, "if statement");
            let cond = parse_expr(inner.expect(Rule::expr)?)?;
            let then_branch = Box::new(parse_stmt(inner.expect(Rule::stmt)?)?);
            let else_branch = inner
                .next_if(Rule::stmt)
                .map(parse_stmt)
                .transpose()?
                .map(Box::new);
            StmtKind::If(If {
                cond,
                then_branch,
                else_branch,
            })
        }
        Rule::while_stmt => {
            let mut inner = Inner::new(body, "while loop");
            let cond = parse_expr(inner.expect(Rule::expr)?)?;
            let body = Box::new(parse_stmt(inner.expect(Rule::stmt)?)?);
            StmtKind::While(While { cond, body })
        }
        Rule::for_stmt => parse_for(body)?,
        Rule::for_each_stmt => parse_for_each(body)?,
        Rule::return_stmt => {
            let mut inner = Inner::new(body, "return");
            StmtKind::Return(inner.next_if(Rule::expr).map(parse_expr).transpose()?)
        }
        Rule::break_stmt => StmtKind::Break,
        Rule::continue_stmt => StmtKind::Continue,
        Rule::expr_stmt => {
            let mut inner = Inner::new(body, "expression statement");
            StmtKind::Expr(parse_expression(inner.expect(Rule::expression)?)?)
        }
        _ => return Err(unexpected(&body, "statement")),
    };
    Ok(Stmt {
        kind,
        span,
        attributes,
    })
}

fn parse_for(pair: Pair<'_, Rule>) -> ParseResult<StmtKind> {
    let mut inner = Inner::new(pair, "for loop");
    let (init, init_span) = match inner.next_if(Rule::for_init) {
        Some(init) => {
            let span = Span::from(init.as_span());
            let mut init = Inner::new(init, "for loop initializer");
            let init = match init.next() {
                Some(p) if p.as_rule() == Rule::var_decl => ForInit::Decl(parse_var_decl(p)?),
                Some(p) if p.as_rule() == Rule::expression => ForInit::Expr(parse_expression(p)?),
                Some(p) => return Err(unexpected(&p, "for loop initializer")),
                None => return Err(ParseError::Missing("for loop initializer")),
            };
            (Some(init), Some(span))
        }
        None => (None, None),
    };
    let cond = inner
        .next_if(Rule::for_cond)
        .map(|p| parse_expr(Inner::new(p, "for loop condition").expect(Rule::expr)?))
        .transpose()?;
    let update = inner
        .next_if(Rule::for_update)
        .map(|p| parse_expression(Inner::new(p, "for loop update").expect(Rule::expression)?))
        .transpose()?;
    let body = Box::new(parse_stmt(inner.expect(Rule::stmt)?)?);
    Ok(StmtKind::For(For {
        init,
        init_span,
        cond,
        update,
        body,
    }))
}

fn parse_for_each(pair: Pair<'_, Rule>) -> ParseResult<StmtKind> {
    let mut inner = Inner::new(pair, "for-each loop");
    let kind = parse_decl_kind(inner.expect(Rule::decl_kind)?)?;
    let name = inner.expect(Rule::ident)?.as_str().to_owned();
    let ty = inner
        .next_if(Rule::type_annotation)
        .map(parse_type_annotation)
        .transpose()?;
    let of = inner.expect(Rule::for_each_kind)?.as_str() == "of";
    let iterable = parse_expr(inner.expect(Rule::expr)?)?;
    let body = Box::new(parse_stmt(inner.expect(Rule::stmt)?)?);
    let each = ForEach {
        kind,
        name,
        ty,
        iterable,
        body,
    };
    Ok(if of {
        StmtKind::ForOf(each)
    } else {
        StmtKind::ForIn(each)
    })
}

fn parse_decl_kind(pair: Pair<'_, Rule>) -> ParseResult<DeclKind> {
    DeclKind::from_str(pair.as_str()).map_err(|_| unexpected(&pair, "declaration kind"))
}

fn parse_var_decl(pair: Pair<'_, Rule>) -> ParseResult<VarDecl> {
    let mut inner = Inner::new(pair, "variable declaration");
    let kind = parse_decl_kind(inner.expect(Rule::decl_kind)?)?;
    let declarators = inner
        .take_while(Rule::declarator)
        .into_iter()
        .map(|d| {
            let span = Span::from(d.as_span());
            let mut inner = Inner::new(d, "declarator");
            let name = inner.expect(Rule::ident)?.as_str().to_owned();
            let ty = inner
                .next_if(Rule::type_annotation)
                .map(parse_type_annotation)
                .transpose()?;
            let init = inner.next_if(Rule::expr).map(parse_expr).transpose()?;
            Ok(Declarator {
                name,
                ty,
                init,
                span,
            })
        })
        .collect::<ParseResult<Vec<_>>>()?;
    Ok(VarDecl { kind, declarators })
}

fn parse_declaration(pair: Pair<'_, Rule>) -> ParseResult<StmtKind> {
    let mut inner = Inner::new(pair, "declaration");
    let modifiers = inner.take_while(Rule::modifier);
    let declare = modifiers.iter().any(|m| m.as_str() == "declare");
    let decl = inner.next().ok_or(ParseError::Missing("declaration"))?;
    Ok(match decl.as_rule() {
        Rule::namespace_decl => {
            let mut inner = Inner::new(decl, "namespace");
            let name = inner.expect(Rule::qualified_name)?.as_str().to_owned();
            let body = parse_stmts(inner.pairs)?;
            StmtKind::Namespace(Namespace { name, body })
        }
        Rule::class_decl => StmtKind::Class(parse_class(decl)?),
        Rule::interface_decl => StmtKind::Interface(parse_interface(decl)?),
        Rule::enum_decl => {
            let mut inner = Inner::new(decl, "enum");
            let name = inner.expect(Rule::ident)?.as_str().to_owned();
            let members = inner
                .take_while(Rule::enum_member)
                .into_iter()
                .map(|m| {
                    let mut inner = Inner::new(m, "enum member");
                    inner.take_while(Rule::attribute);
                    let name = inner.expect(Rule::ident)?.as_str().to_owned();
                    let value = inner.next_if(Rule::expr).map(parse_expr).transpose()?;
                    Ok(EnumMember { name, value })
                })
                .collect::<ParseResult<Vec<_>>>()?;
            StmtKind::Enum(EnumDecl { name, members })
        }
        Rule::function_decl => {
            let mut inner = Inner::new(decl, "function");
            let name = inner.expect(Rule::ident)?.as_str().to_owned();
            inner.next_if(Rule::type_params);
            let params = parse_params(inner.expect(Rule::params)?)?;
            let ret = inner
                .next_if(Rule::type_annotation)
                .map(parse_type_annotation)
                .transpose()?;
            let body = inner.next_if(Rule::block).map(parse_block).transpose()?;
            StmtKind::Function(FunctionDecl {
                name,
                declare,
                params,
                ret,
                body,
            })
        }
        _ => return Err(unexpected(&decl, "declaration")),
    })
}

fn parse_type_params(pair: Option<Pair<'_, Rule>>) -> Vec<String> {
    pair.map(|p| p.into_inner().map(|i| i.as_str().to_owned()).collect())
        .unwrap_or_default()
}

fn parse_type_list(pair: Option<Pair<'_, Rule>>) -> ParseResult<Vec<TypeRef>> {
    match pair {
        Some(p) => Inner::new(p, "type list")
            .take_while(Rule::type_ref)
            .into_iter()
            .map(parse_type_ref)
            .collect(),
        None => Ok(vec![]),
    }
}

fn parse_class(pair: Pair<'_, Rule>) -> ParseResult<ClassDecl> {
    let mut inner = Inner::new(pair, "class");
    let name = inner.expect(Rule::ident)?.as_str().to_owned();
    let type_params = parse_type_params(inner.next_if(Rule::type_params));
    let extends = parse_type_list(inner.next_if(Rule::extends_clause))?;
    let implements = parse_type_list(inner.next_if(Rule::implements_clause))?;
    let members = inner
        .take_while(Rule::class_member)
        .into_iter()
        .map(parse_class_member)
        .collect::<ParseResult<Vec<_>>>()?;
    Ok(ClassDecl {
        name,
        type_params,
        extends,
        implements,
        members,
    })
}

fn parse_class_member(pair: Pair<'_, Rule>) -> ParseResult<ClassMember> {
    let span = Span::from(pair.as_span());
    let mut inner = Inner::new(pair, "class member");
    let attributes = parse_attributes(inner.take_while(Rule::attribute));
    let is_static = inner
        .take_while(Rule::member_modifier)
        .iter()
        .any(|m| m.as_str() == "static");
    let member = inner.next().ok_or(ParseError::Missing("class member"))?;
    let rule = member.as_rule();
    let mut inner = Inner::new(member, "class member");
    let (name, kind) = match rule {
        Rule::accessor => {
            let getter = inner.expect(Rule::accessor_kind)?.as_str() == "get";
            let name = inner.expect(Rule::prop_name)?.as_str().to_owned();
            let method = parse_method_tail(&mut inner)?;
            let kind = if getter {
                MemberKind::Getter(method)
            } else {
                MemberKind::Setter(method)
            };
            (name, kind)
        }
        Rule::method => {
            let name = inner.expect(Rule::prop_name)?.as_str().to_owned();
            let method = parse_method_tail(&mut inner)?;
            let kind = if name == "constructor" {
                MemberKind::Constructor(method)
            } else {
                MemberKind::Method(method)
            };
            (name, kind)
        }
        Rule::field => {
            let name = inner.expect(Rule::prop_name)?.as_str().to_owned();
            let optional = inner.next_if(Rule::optional_mark).is_some();
            let ty = inner
                .next_if(Rule::type_annotation)
                .map(parse_type_annotation)
                .transpose()?;
            let init = inner.next_if(Rule::expr).map(parse_expr).transpose()?;
            (name, MemberKind::Field { ty, optional, init })
        }
        _ => return Err(ParseError::Missing("class member")),
    };
    Ok(ClassMember {
        kind,
        name,
        is_static,
        span,
        attributes,
    })
}

fn parse_method_tail(inner: &mut Inner<'_>) -> ParseResult<MethodDecl> {
    let params = parse_params(inner.expect(Rule::params)?)?;
    let ret = inner
        .next_if(Rule::type_annotation)
        .map(parse_type_annotation)
        .transpose()?;
    let body = inner.next_if(Rule::block).map(parse_block).transpose()?;
    Ok(MethodDecl { params, ret, body })
}

fn parse_interface(pair: Pair<'_, Rule>) -> ParseResult<InterfaceDecl> {
    let mut inner = Inner::new(pair, "interface");
    let name = inner.expect(Rule::ident)?.as_str().to_owned();
    let type_params = parse_type_params(inner.next_if(Rule::type_params));
    let extends = parse_type_list(inner.next_if(Rule::extends_clause))?;
    let members = inner
        .take_while(Rule::interface_member)
        .into_iter()
        .map(|m| {
            let mut inner = Inner::new(m, "interface member");
            inner.take_while(Rule::attribute);
            let name = inner.expect(Rule::prop_name)?.as_str().to_owned();
            let optional = inner.next_if(Rule::optional_mark).is_some();
            let kind = match inner.next() {
                Some(sig) if sig.as_rule() == Rule::method_signature => {
                    let mut sig = Inner::new(sig, "method signature");
                    let params = parse_params(sig.expect(Rule::params)?)?;
                    let ret = sig
                        .next_if(Rule::type_annotation)
                        .map(parse_type_annotation)
                        .transpose()?;
                    InterfaceMemberKind::Method { params, ret }
                }
                Some(ty) if ty.as_rule() == Rule::type_annotation => {
                    InterfaceMemberKind::Property(parse_type_annotation(ty)?)
                }
                Some(other) => return Err(unexpected(&other, "interface member")),
                None => return Err(ParseError::Missing("interface member type")),
            };
            Ok(InterfaceMember {
                name,
                optional,
                kind,
            })
        })
        .collect::<ParseResult<Vec<_>>>()?;
    Ok(InterfaceDecl {
        name,
        type_params,
        extends,
        members,
    })
}

fn parse_params(pair: Pair<'_, Rule>) -> ParseResult<Vec<Param>> {
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::param)
        .map(|p| {
            let span = Span::from(p.as_span());
            let mut inner = Inner::new(p, "parameter");
            let name = inner.expect(Rule::ident)?.as_str().to_owned();
            let optional = inner.next_if(Rule::optional_mark).is_some();
            let ty = inner
                .next_if(Rule::type_annotation)
                .map(parse_type_annotation)
                .transpose()?;
            let default = inner.next_if(Rule::expr).map(parse_expr).transpose()?;
            Ok(Param {
                name,
                ty,
                optional,
                default,
                span,
            })
        })
        .collect()
}

fn parse_type_annotation(pair: Pair<'_, Rule>) -> ParseResult<TypeRef> {
    parse_type_ref(Inner::new(pair, "type annotation").expect(Rule::type_ref)?)
}

fn parse_type_ref(pair: Pair<'_, Rule>) -> ParseResult<TypeRef> {
    let mut inner = Inner::new(pair, "type");
    let primary = inner.next().ok_or(ParseError::Missing("type"))?;
    let mut ty = match primary.as_rule() {
        Rule::type_ref => parse_type_ref(primary)?,
        Rule::generic_type => {
            let mut inner = Inner::new(primary, "type");
            let name = inner.expect(Rule::qualified_name)?.as_str().to_owned();
            let args = match inner.next_if(Rule::type_args) {
                Some(args) => args
                    .into_inner()
                    .map(parse_type_ref)
                    .collect::<ParseResult<Vec<_>>>()?,
                None => vec![],
            };
            TypeRef::Named { name, args }
        }
        Rule::function_type => {
            let mut inner = Inner::new(primary, "function type");
            let params = inner
                .take_while(Rule::fn_type_param)
                .into_iter()
                .map(|p| {
                    let mut inner = Inner::new(p, "function type parameter");
                    let name = inner.expect(Rule::ident)?.as_str().to_owned();
                    inner.next_if(Rule::optional_mark);
                    Ok((name, parse_type_ref(inner.expect(Rule::type_ref)?)?))
                })
                .collect::<ParseResult<Vec<_>>>()?;
            let ret = Box::new(parse_type_ref(inner.expect(Rule::type_ref)?)?);
            TypeRef::Function { params, ret }
        }
        _ => return Err(unexpected(&primary, "type")),
    };
    for _ in inner.take_while(Rule::array_suffix) {
        ty = TypeRef::Array(Box::new(ty));
    }
    Ok(ty)
}

fn parse_expression(pair: Pair<'_, Rule>) -> ParseResult<Expr> {
    let mut inner = Inner::new(pair, "expression");
    let target = parse_expr(inner.expect(Rule::expr)?)?;
    match inner.next_if(Rule::assign_op) {
        Some(op) => {
            let op = AssignOp::from_str(op.as_str())
                .map_err(|_| ParseError::InvalidOperator(op.as_str().to_owned()))?;
            let value = parse_expression(inner.expect(Rule::expression)?)?;
            let span = target.span.join(&value.span);
            Ok(Expr::new(
                ExprKind::Assign(Assign {
                    op,
                    target: Box::new(target),
                    value: Box::new(value),
                }),
                span,
            ))
        }
        None => Ok(target),
    }
}

fn parse_args(pair: Pair<'_, Rule>) -> ParseResult<Vec<Expr>> {
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::expr)
        .map(parse_expr)
        .collect()
}

fn parse_lambda(pair: Pair<'_, Rule>, style: LambdaStyle) -> ParseResult<Lambda> {
    let mut inner = Inner::new(pair, "anonymous function");
    let params = parse_params(inner.expect(Rule::params)?)?;
    let ret = inner
        .next_if(Rule::type_annotation)
        .map(parse_type_annotation)
        .transpose()?;
    let body = parse_block(inner.expect(Rule::block)?)?;
    Ok(Lambda {
        style,
        params,
        ret,
        body,
    })
}

/// Decodes the escape sequences of a string literal body.
fn unescape(raw: &str) -> ParseResult<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(escaped) = chars.next() else {
            return Err(ParseError::InvalidEscape("\\".into()));
        };
        match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' if !chars.peek().is_some_and(|c| c.is_ascii_digit()) => out.push('\0'),
            'x' => {
                let code = hex_digits(&mut chars, 2, "x")?;
                out.push(char_from(code, "x")?);
            }
            'u' => {
                let code = unicode_escape(&mut chars)?;
                let code = if (0xD800..0xDC00).contains(&code) {
                    // high surrogate, must be followed by `\uDC00`-`\uDFFF`
                    let mut rest = chars.clone();
                    let low = match (rest.next(), rest.next()) {
                        (Some('\\'), Some('u')) => unicode_escape(&mut rest)?,
                        _ => return Err(ParseError::InvalidEscape(format!("u{:X}", code))),
                    };
                    if !(0xDC00..0xE000).contains(&low) {
                        return Err(ParseError::InvalidEscape(format!("u{:X}", code)));
                    }
                    chars = rest;
                    0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00)
                } else {
                    code
                };
                out.push(char_from(code, "u")?);
            }
            '\r' => {
                chars.next_if_eq(&'\n');
            }
            '\n' | '\u{2028}' | '\u{2029}' => {}
            digit @ '0'..='9' => return Err(ParseError::InvalidEscape(digit.to_string())),
            other => out.push(other),
        }
    }
    Ok(out)
}

type Chars<'a> = std::iter::Peekable<std::str::Chars<'a>>;

fn hex_digits(chars: &mut Chars<'_>, count: usize, prefix: &str) -> ParseResult<u32> {
    let digits = chars.by_ref().take(count).collect::<String>();
    if digits.len() != count || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ParseError::InvalidEscape(format!("{}{}", prefix, digits)));
    }
    u32::from_str_radix(&digits, 16).map_err(|_| ParseError::InvalidEscape(format!("{}{}", prefix, digits)))
}

/// `XXXX` or `{X...}` after `\u`.
fn unicode_escape(chars: &mut Chars<'_>) -> ParseResult<u32> {
    if chars.next_if_eq(&'{').is_none() {
        return hex_digits(chars, 4, "u");
    }
    let mut digits = String::new();
    loop {
        match chars.next() {
            Some('}') => break,
            Some(c) if c.is_ascii_hexdigit() && digits.len() < 6 => digits.push(c),
            _ => return Err(ParseError::InvalidEscape(format!("u{{{}", digits))),
        }
    }
    u32::from_str_radix(&digits, 16).map_err(|_| ParseError::InvalidEscape(format!("u{{{}}}", digits)))
}

fn char_from(code: u32, prefix: &str) -> ParseResult<char> {
    char::from_u32(code).ok_or_else(|| ParseError::InvalidEscape(format!("{}{:X}", prefix, code)))
}

fn parse_primary(primary: Pair<'_, Rule>) -> ParseResult<Expr> {
    let span = Span::from(primary.as_span());
    let kind = match primary.as_rule() {
        Rule::number => ExprKind::Number(primary.as_str().to_owned()),
        Rule::string => {
            let raw = primary
                .into_inner()
                .next()
                .map(|p| p.as_str())
                .unwrap_or_default();
            ExprKind::Str(unescape(raw)?)
        }
        Rule::kw_true => ExprKind::Bool(true),
        Rule::kw_false => ExprKind::Bool(false),
        Rule::kw_null => ExprKind::Null,
        Rule::kw_this => ExprKind::This,
        Rule::kw_super => ExprKind::Super,
        Rule::ident => ExprKind::Ident(primary.as_str().to_owned()),
        Rule::paren => {
            let mut inner = Inner::new(primary, "parenthesized expression");
            ExprKind::Paren(Box::new(parse_expr(inner.expect(Rule::expr)?)?))
        }
        Rule::array => ExprKind::Array(parse_args(primary)?),
        Rule::new_expr => {
            let mut inner = Inner::new(primary, "new expression");
            let class = inner.expect(Rule::qualified_name)?.as_str().to_owned();
            let args = inner
                .next_if(Rule::call_args)
                .map(parse_args)
                .transpose()?
                .unwrap_or_default();
            ExprKind::New(New { class, args })
        }
        Rule::lambda => ExprKind::Lambda(parse_lambda(primary, LambdaStyle::Arrow)?),
        Rule::function_expr => ExprKind::Lambda(parse_lambda(primary, LambdaStyle::Function)?),
        _ => return Err(unexpected(&primary, "expression")),
    };
    Ok(Expr::new(kind, span))
}

fn parse_expr(pair: Pair<'_, Rule>) -> ParseResult<Expr> {
    PRATT_PARSER
        .map_primary(parse_primary)
        .map_prefix(|op, rhs| {
            let rhs = rhs?;
            let span = Span::from(op.as_span()).join(&rhs.span);
            let kind = match op.as_rule() {
                Rule::not => ExprKind::Unary(Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(rhs),
                }),
                Rule::neg => ExprKind::Unary(Unary {
                    op: UnaryOp::Minus,
                    operand: Box::new(rhs),
                }),
                Rule::pre_inc | Rule::pre_dec => ExprKind::Update(Update {
                    op: UpdateOp::from_str(op.as_str())
                        .map_err(|_| ParseError::InvalidOperator(op.as_str().to_owned()))?,
                    prefix: true,
                    target: Box::new(rhs),
                }),
                _ => return Err(unexpected(&op, "prefix operator")),
            };
            Ok(Expr::new(kind, span))
        })
        .map_infix(|lhs, op, rhs| {
            let (lhs, rhs) = (lhs?, rhs?);
            let span = lhs.span.join(&rhs.span);
            let op = BinaryOp::from_str(op.as_str())
                .map_err(|_| ParseError::InvalidOperator(op.as_str().to_owned()))?;
            Ok(Expr::new(
                ExprKind::Binary(Binary {
                    op,
                    left: Box::new(lhs),
                    right: Box::new(rhs),
                }),
                span,
            ))
        })
        .map_postfix(|lhs, op| {
            let lhs = lhs?;
            let span = lhs.span.join(&Span::from(op.as_span()));
            let kind = match op.as_rule() {
                Rule::post_inc | Rule::post_dec => ExprKind::Update(Update {
                    op: UpdateOp::from_str(op.as_str())
                        .map_err(|_| ParseError::InvalidOperator(op.as_str().to_owned()))?,
                    prefix: false,
                    target: Box::new(lhs),
                }),
                Rule::call_args => ExprKind::Call(Call {
                    callee: Box::new(lhs),
                    args: parse_args(op)?,
                }),
                Rule::member_access => {
                    let mut inner = Inner::new(op, "member access");
                    ExprKind::Member(Member {
                        object: Box::new(lhs),
                        property: inner.expect(Rule::prop_name)?.as_str().to_owned(),
                    })
                }
                Rule::index_access => {
                    let mut inner = Inner::new(op, "index access");
                    ExprKind::Index(Index {
                        object: Box::new(lhs),
                        index: Box::new(parse_expr(inner.expect(Rule::expr)?)?),
                    })
                }
                Rule::as_cast => {
                    let mut inner = Inner::new(op, "type assertion");
                    ExprKind::As(As {
                        expr: Box::new(lhs),
                        ty: parse_type_ref(inner.expect(Rule::type_ref)?)?,
                    })
                }
                _ => return Err(unexpected(&op, "postfix operator")),
            };
            Ok(Expr::new(kind, span))
        })
        .parse(pair.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_stmt(source: &str) -> Stmt {
        parse_program(source).unwrap().items.remove(0)
    }

    #[test]
    fn precedence() {
        let expr = parse_expr_str("1 + 2 * 3 < x && !done").unwrap();
        assert_eq!(expr.to_string(), "1 + 2 * 3 < x && !done");
        let ExprKind::Binary(and) = expr.kind else {
            panic!("expected binary");
        };
        assert_eq!(and.op, BinaryOp::And);
        let ExprKind::Binary(lt) = and.left.kind else {
            panic!("expected comparison");
        };
        assert_eq!(lt.op, BinaryOp::Less);
    }

    #[test]
    fn postfix_chain() {
        let expr = parse_expr_str("basic.showNumber(a[0], 2)").unwrap();
        let ExprKind::Call(call) = expr.kind else {
            panic!("expected call");
        };
        assert_eq!(call.callee.path().as_deref(), Some("basic.showNumber"));
        assert_eq!(call.args.len(), 2);
    }

    #[test]
    fn assignment_is_right_associative() {
        let expr = parse_expr_str("a = b += 1").unwrap();
        let ExprKind::Assign(outer) = expr.kind else {
            panic!("expected assignment");
        };
        assert_eq!(outer.op, AssignOp::Assign);
        assert!(matches!(outer.value.kind, ExprKind::Assign(_)));
    }

    #[test]
    fn keywords_are_not_identifiers() {
        assert!(parse_expr_str("return").is_err());
        assert_eq!(
            parse_expr_str("returned").unwrap().as_ident(),
            Some("returned")
        );
    }

    #[test]
    fn trailing_callback() {
        let stmt = first_stmt("input.onButtonPressed(Button.A, () => { x = 1; });");
        let StmtKind::Expr(expr) = &stmt.kind else {
            panic!("expected expression statement");
        };
        let ExprKind::Call(call) = &expr.kind else {
            panic!("expected call");
        };
        let callback = call.callback().unwrap();
        assert_eq!(callback.style, LambdaStyle::Arrow);
        assert_eq!(callback.body.len(), 1);
        assert_eq!(call.plain_args().len(), 1);
    }

    #[test]
    fn for_loop_clauses() {
        let stmt = first_stmt("for (let i = 0; i < 10; i++) {}");
        let StmtKind::For(f) = &stmt.kind else {
            panic!("expected for loop");
        };
        assert!(matches!(f.init, Some(ForInit::Decl(_))));
        assert!(f.cond.is_some());
        assert!(matches!(
            f.update.as_ref().map(|u| &u.kind),
            Some(ExprKind::Update(Update { prefix: false, .. }))
        ));

        let stmt = first_stmt("for (;;) {}");
        let StmtKind::For(f) = &stmt.kind else {
            panic!("expected for loop");
        };
        assert!(f.init.is_none() && f.cond.is_none() && f.update.is_none());
    }

    #[test]
    fn for_of_and_in() {
        assert!(matches!(
            first_stmt("for (const x of xs) {}").kind,
            StmtKind::ForOf(_)
        ));
        assert!(matches!(
            first_stmt("for (let k in obj) {}").kind,
            StmtKind::ForIn(_)
        ));
    }

    #[test]
    fn class_members() {
        let stmt = first_stmt(
            "class B extends A implements I {
                static count: number;
                x = 5;
                constructor(x: number) {}
                get value(): number { return 1; }
                set value(v: number) {}
                foo(a: number, b?: string) {}
            }",
        );
        let StmtKind::Class(class) = &stmt.kind else {
            panic!("expected class");
        };
        assert_eq!(class.extends.len(), 1);
        assert_eq!(class.implements.len(), 1);
        let kinds = class
            .members
            .iter()
            .map(|m| match m.kind {
                MemberKind::Field { .. } => "field",
                MemberKind::Method(_) => "method",
                MemberKind::Getter(_) => "get",
                MemberKind::Setter(_) => "set",
                MemberKind::Constructor(_) => "ctor",
            })
            .collect::<Vec<_>>();
        assert_eq!(kinds, ["field", "field", "ctor", "get", "set", "method"]);
        assert!(class.members[0].is_static);
    }

    #[test]
    fn attributes_attach_to_statements() {
        let stmt = first_stmt(
            "//% blockId=show_number block=\"show number %n\"\nfunction showNumber(n: number) {}",
        );
        assert_eq!(stmt.attributes.len(), 1);
        assert_eq!(
            stmt.attributes[0].text,
            "//% blockId=show_number block=\"show number %n\""
        );
    }

    #[test]
    fn plain_comments_are_skipped() {
        let program = parse_program("// hello\nlet x = 1; /* block */ let y = 2;").unwrap();
        assert_eq!(program.items.len(), 2);
        assert!(program.items.iter().all(|s| s.attributes.is_empty()));
    }

    #[test]
    fn type_refs() {
        let stmt = first_stmt("let f: (a: number) => void[] = null;");
        let StmtKind::VarDecl(decl) = &stmt.kind else {
            panic!("expected declaration");
        };
        assert!(matches!(
            decl.declarators[0].ty,
            Some(TypeRef::Function { .. })
        ));
        let stmt = first_stmt("let xs: List<number>[] = [];");
        let StmtKind::VarDecl(decl) = &stmt.kind else {
            panic!("expected declaration");
        };
        assert!(matches!(decl.declarators[0].ty, Some(TypeRef::Array(_))));
    }

    #[test]
    fn spans_are_line_based() {
        let program = parse_program("let a = 1;\n  let b = 2;").unwrap();
        let span = program.items[1].span;
        assert_eq!((span.start_line, span.start_col), (2, 3));
    }

    fn string(source: &str) -> ParseResult<String> {
        match parse_expr_str(source)?.kind {
            ExprKind::Str(s) => Ok(s),
            other => panic!("expected a string literal, got {:?}", other),
        }
    }

    #[test]
    fn escapes_are_decoded() {
        let cases = [
            (r#""\u0041""#, "A"),
            (r#""\u{1F600}""#, "\u{1F600}"),
            (r#""\uD83D\uDE00""#, "\u{1F600}"),
            (r#""\x41\x62""#, "Ab"),
            (r#""\b\f\v\0""#, "\u{8}\u{c}\u{b}\0"),
            (r#"'it\'s "q"'"#, "it's \"q\""),
            (r#""\q\\""#, "q\\"),
            ("\"a\\\nb\"", "ab"),
        ];
        for (source, expected) in cases {
            assert_eq!(string(source).unwrap(), expected, "{}", source);
        }
    }

    #[test]
    fn malformed_escapes_are_rejected() {
        for source in [r#""\u00G1""#, r#""\x4""#, r#""\u{110000}""#, r#""\uDE00""#, r#""\1""#] {
            assert!(
                matches!(string(source), Err(ParseError::InvalidEscape(_))),
                "{}",
                source
            );
        }
    }

    #[test]
    fn printed_strings_read_back_unchanged() {
        let source = r#""A\t\x00\x01\v \\ \"end\"""#;
        let decoded = string(source).unwrap();
        let printed = parse_expr_str(source).unwrap().to_string();
        assert_eq!(string(&printed).unwrap(), decoded);
    }

    #[test]
    fn syntax_errors_carry_location() {
        match parse_program("let = 1;") {
            Err(ParseError::Syntax { line, .. }) => assert_eq!(line, 1),
            other => panic!("expected syntax error, got {:?}", other),
        }
    }
}
