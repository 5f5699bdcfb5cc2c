//! Declaration-level parser.
//!
//! Bodies of functions and initializer expressions are skipped by bracket
//! matching; only the shape the model needs is kept.

use std::sync::Arc;

use stroo_common::syntax::{
    ChanDir, Decl, FieldDecl, FuncDecl, FuncType, Ident, ImportSpec, InterfaceElem,
    InterfaceType, Param, Receiver, SourceFile, StructType, TypeExpr, TypeSpec, ValueInit,
    ValueSpec,
};
use stroo_common::{Pos, UnitError};

use super::lexer::{Comment, Tok, Token, is_keyword, tokenize};

type PResult<T> = Result<T, UnitError>;

/// Parses one file. The first syntax error ends the file.
pub(crate) fn parse_file(path: &Arc<str>, src: &str) -> PResult<SourceFile> {
    let (tokens, comments) = tokenize(src)
        .map_err(|e| UnitError::parse(Pos::new(path.clone(), e.line, e.col), e.msg))?;
    let mut parser = Parser {
        path: path.clone(),
        tokens: &tokens,
        comments: &comments,
        at: 0,
    };
    parser.file()
}

/// Type keywords that may start a type expression.
const TYPE_KEYWORDS: &[&str] = &["map", "chan", "struct", "interface", "func"];

enum ParamEntry {
    /// A lone identifier: a name or a type, decided once the list is read.
    Bare(Ident),
    Named(Ident, TypeExpr, bool),
    Anonymous(TypeExpr, bool),
}

struct Parser<'a> {
    path: Arc<str>,
    tokens: &'a [Token],
    comments: &'a [Comment],
    at: usize,
}

impl Parser<'_> {
    fn peek(&self) -> &Token {
        self.peek_n(0)
    }

    fn peek_n(&self, n: usize) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[(self.at + n).min(last)]
    }

    fn bump(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.at < self.tokens.len() {
            self.at += 1;
        }
        tok
    }

    fn last_line(&self) -> u32 {
        self.at
            .checked_sub(1)
            .map_or(1, |i| self.tokens[i].line)
    }

    fn pos(&self, tok: &Token) -> Pos {
        Pos::new(self.path.clone(), tok.line, tok.col)
    }

    fn ident(&self, tok: &Token) -> Ident {
        Ident::new(tok.text.clone(), self.pos(tok))
    }

    fn unexpected(&self, tok: &Token, expected: &str) -> UnitError {
        UnitError::parse(
            self.pos(tok),
            format!("expected {expected}, found '{}'", tok.describe()),
        )
    }

    fn expect_op(&mut self, op: &str) -> PResult<Token> {
        if self.peek().is_op(op) {
            Ok(self.bump())
        } else {
            Err(self.unexpected(self.peek(), &format!("'{op}'")))
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> PResult<Token> {
        if self.peek().is_keyword(kw) {
            Ok(self.bump())
        } else {
            Err(self.unexpected(self.peek(), &format!("'{kw}'")))
        }
    }

    fn expect_ident(&mut self) -> PResult<Ident> {
        let tok = self.peek();
        if tok.tok == Tok::Ident && !is_keyword(&tok.text) {
            let tok = self.bump();
            Ok(self.ident(&tok))
        } else {
            Err(self.unexpected(tok, "identifier"))
        }
    }

    /// Accepts `;`, or nothing before a closing bracket or the end of file.
    fn expect_semi(&mut self) -> PResult<()> {
        let tok = self.peek();
        match tok.tok {
            Tok::Semi => {
                self.bump();
                Ok(())
            }
            Tok::Eof => Ok(()),
            _ if tok.is_op(")") || tok.is_op("}") => Ok(()),
            _ => Err(self.unexpected(tok, "';'")),
        }
    }

    /// Skips a bracketed run starting at the opening token.
    fn skip_balanced(&mut self, open: &str, close: &str) -> PResult<()> {
        let start = self.expect_op(open)?;
        let mut depth = 1usize;
        while depth > 0 {
            let tok = self.bump();
            if tok.tok == Tok::Eof {
                return Err(self.unexpected(&start, &format!("matching '{close}'")));
            }
            if tok.is_op(open) {
                depth += 1;
            } else if tok.is_op(close) {
                depth -= 1;
            }
        }
        Ok(())
    }

    /// The contiguous own-line comment block ending right above `line`.
    fn doc_for(&self, line: u32) -> Option<String> {
        let mut want = line.checked_sub(1)?;
        let mut lines = Vec::new();
        for comment in self.comments.iter().rev() {
            if comment.end_line > want || comment.trailing {
                continue;
            }
            if comment.end_line != want {
                break;
            }
            lines.push(comment.text.as_str());
            match comment.line.checked_sub(1) {
                Some(prev) => want = prev,
                None => break,
            }
        }
        if lines.is_empty() {
            return None;
        }
        lines.reverse();
        Some(lines.join("\n"))
    }

    fn trailing_comment(&self, line: u32) -> Option<String> {
        self.comments
            .iter()
            .find(|c| c.trailing && c.line == line)
            .map(|c| c.text.clone())
    }

    fn file(&mut self) -> PResult<SourceFile> {
        self.expect_keyword("package")?;
        let package = self.expect_ident()?;
        self.expect_semi()?;

        let mut imports = Vec::new();
        while self.peek().is_keyword("import") {
            self.bump();
            if self.peek().is_op("(") {
                self.bump();
                while !self.peek().is_op(")") {
                    imports.push(self.import_spec()?);
                    self.expect_semi()?;
                }
                self.bump();
            } else {
                imports.push(self.import_spec()?);
            }
            self.expect_semi()?;
        }

        let mut decls = Vec::new();
        loop {
            let tok = self.peek().clone();
            match tok.tok {
                Tok::Eof => break,
                Tok::Semi => {
                    self.bump();
                    continue;
                }
                Tok::Ident if tok.text == "type" => self.type_decl(&mut decls)?,
                Tok::Ident if tok.text == "var" => self.value_decl(&mut decls, false)?,
                Tok::Ident if tok.text == "const" => self.value_decl(&mut decls, true)?,
                Tok::Ident if tok.text == "func" => decls.push(Decl::Func(self.func_decl()?)),
                Tok::Ident if tok.text == "import" => {
                    return Err(UnitError::parse(
                        self.pos(&tok),
                        "imports must appear before other declarations",
                    ));
                }
                _ => return Err(self.unexpected(&tok, "declaration")),
            }
            self.expect_semi()?;
        }

        Ok(SourceFile {
            path: self.path.clone(),
            package,
            imports,
            decls,
        })
    }

    fn import_spec(&mut self) -> PResult<ImportSpec> {
        let tok = self.peek().clone();
        let alias = if tok.is_op(".") || (tok.tok == Tok::Ident && !is_keyword(&tok.text)) {
            self.bump();
            Some(tok.text.clone())
        } else {
            None
        };
        let lit = self.peek().clone();
        if !matches!(lit.tok, Tok::String | Tok::RawString) {
            return Err(self.unexpected(&lit, "import path"));
        }
        self.bump();
        Ok(ImportSpec {
            alias,
            path: unquote(&lit.text),
            pos: self.pos(&tok),
        })
    }

    fn type_decl(&mut self, decls: &mut Vec<Decl>) -> PResult<()> {
        let kw = self.bump();
        if self.peek().is_op("(") {
            self.bump();
            while !self.peek().is_op(")") {
                let doc = self.doc_for(self.peek().line);
                decls.push(Decl::Type(self.type_spec(doc)?));
                self.expect_semi()?;
            }
            self.bump();
        } else {
            let doc = self.doc_for(kw.line);
            decls.push(Decl::Type(self.type_spec(doc)?));
        }
        Ok(())
    }

    fn type_spec(&mut self, doc: Option<String>) -> PResult<TypeSpec> {
        let name = self.expect_ident()?;
        // type parameters: `[K comparable]`, as opposed to an array length
        if self.peek().is_op("[")
            && self.peek_n(1).tok == Tok::Ident
            && !self.peek_n(2).is_op("]")
        {
            self.skip_balanced("[", "]")?;
        }
        let is_alias = self.peek().is_op("=");
        if is_alias {
            self.bump();
        }
        let ty = self.type_expr()?;
        Ok(TypeSpec {
            name,
            is_alias,
            ty,
            doc,
        })
    }

    fn value_decl(&mut self, decls: &mut Vec<Decl>, is_const: bool) -> PResult<()> {
        let wrap = |spec| {
            if is_const {
                Decl::Const(spec)
            } else {
                Decl::Var(spec)
            }
        };
        let kw = self.bump();
        if self.peek().is_op("(") {
            self.bump();
            let mut previous: Option<(Option<TypeExpr>, Vec<ValueInit>)> = None;
            while !self.peek().is_op(")") {
                let doc = self.doc_for(self.peek().line);
                let mut spec = self.value_spec(doc)?;
                if is_const {
                    // a bare constant repeats the previous spec
                    if spec.ty.is_none() && spec.values.is_empty() {
                        if let Some((ty, values)) = &previous {
                            spec.ty.clone_from(ty);
                            spec.values.clone_from(values);
                        }
                    } else {
                        previous = Some((spec.ty.clone(), spec.values.clone()));
                    }
                }
                decls.push(wrap(spec));
                self.expect_semi()?;
            }
            self.bump();
        } else {
            let doc = self.doc_for(kw.line);
            decls.push(wrap(self.value_spec(doc)?));
        }
        Ok(())
    }

    fn value_spec(&mut self, doc: Option<String>) -> PResult<ValueSpec> {
        let names = self.ident_list()?;
        let next = self.peek();
        let ty = if next.is_op("=") || next.is_op(")") || matches!(next.tok, Tok::Semi | Tok::Eof)
        {
            None
        } else {
            Some(self.type_expr()?)
        };
        let values = if self.peek().is_op("=") {
            self.bump();
            self.expr_list()?
        } else {
            Vec::new()
        };
        Ok(ValueSpec {
            names,
            ty,
            values,
            doc,
        })
    }

    fn ident_list(&mut self) -> PResult<Vec<Ident>> {
        let mut names = vec![self.expect_ident()?];
        while self.peek().is_op(",") {
            self.bump();
            names.push(self.expect_ident()?);
        }
        Ok(names)
    }

    /// Reads initializer expressions up to the end of the spec.
    fn expr_list(&mut self) -> PResult<Vec<ValueInit>> {
        let mut exprs = Vec::new();
        let mut current: Vec<Token> = Vec::new();
        let mut depth = 0usize;
        loop {
            let tok = self.peek();
            if tok.tok == Tok::Eof {
                if depth > 0 {
                    return Err(self.unexpected(tok, "closing bracket"));
                }
                break;
            }
            if depth == 0 && (tok.tok == Tok::Semi || tok.is_op(")")) {
                break;
            }
            let tok = self.bump();
            if depth == 0 && tok.is_op(",") {
                exprs.push(self.classify(&current));
                current.clear();
                continue;
            }
            if tok.is_op("(") || tok.is_op("[") || tok.is_op("{") {
                depth += 1;
            } else if tok.is_op(")") || tok.is_op("]") || tok.is_op("}") {
                depth = depth.saturating_sub(1);
            }
            current.push(tok);
        }
        exprs.push(self.classify(&current));
        Ok(exprs)
    }

    fn classify(&self, tokens: &[Token]) -> ValueInit {
        match tokens {
            [] => ValueInit::Other,
            [tok] => match tok.tok {
                Tok::Int => ValueInit::Int,
                Tok::Float => ValueInit::Float,
                Tok::Imag => ValueInit::Imag,
                Tok::Char => ValueInit::Char,
                Tok::String | Tok::RawString => ValueInit::String,
                Tok::Ident if tok.text == "true" || tok.text == "false" => ValueInit::Bool,
                Tok::Ident if !is_keyword(&tok.text) => ValueInit::Name(tok.text.clone()),
                _ => ValueInit::Other,
            },
            [sign, number] if (sign.is_op("-") || sign.is_op("+"))
                && matches!(number.tok, Tok::Int | Tok::Float | Tok::Imag) =>
            {
                self.classify(std::slice::from_ref(number))
            }
            [amp, rest @ ..] if amp.is_op("&") => self
                .composite_type(rest)
                .map_or(ValueInit::Other, ValueInit::AddressOf),
            _ => self
                .composite_type(tokens)
                .map_or(ValueInit::Other, ValueInit::Composite),
        }
    }

    /// The type of a `T{...}` literal, if `tokens` is one.
    fn composite_type(&self, tokens: &[Token]) -> Option<TypeExpr> {
        if !tokens.last()?.is_op("}") {
            return None;
        }
        let mut depth = 0usize;
        let brace = tokens.iter().position(|tok| {
            if depth == 0 && tok.is_op("{") {
                return true;
            }
            if tok.is_op("(") || tok.is_op("[") {
                depth += 1;
            } else if tok.is_op(")") || tok.is_op("]") {
                depth = depth.saturating_sub(1);
            }
            false
        })?;
        if brace == 0 {
            return None;
        }
        let mut sub: Vec<Token> = tokens[..brace].to_vec();
        let last = &tokens[brace - 1];
        sub.push(Token {
            tok: Tok::Eof,
            text: String::new(),
            line: last.line,
            col: last.col,
        });
        let mut parser = Parser {
            path: self.path.clone(),
            tokens: &sub,
            comments: &[],
            at: 0,
        };
        let ty = parser.type_expr().ok()?;
        (parser.peek().tok == Tok::Eof).then_some(ty)
    }

    fn func_decl(&mut self) -> PResult<FuncDecl> {
        let kw = self.bump();
        let doc = self.doc_for(kw.line);
        let recv = if self.peek().is_op("(") {
            let open = self.peek().clone();
            let mut params = self.params()?;
            if params.len() != 1 {
                return Err(UnitError::parse(
                    self.pos(&open),
                    "method must have exactly one receiver",
                ));
            }
            let param = params.remove(0);
            Some(Receiver {
                name: param.name,
                ty: param.ty,
            })
        } else {
            None
        };
        let name = self.expect_ident()?;
        if self.peek().is_op("[") {
            self.skip_balanced("[", "]")?;
        }
        let ty = self.signature()?;
        if self.peek().is_op("{") {
            self.skip_balanced("{", "}")?;
        }
        Ok(FuncDecl {
            name,
            recv,
            ty,
            doc,
        })
    }

    fn starts_type_at(&self, n: usize) -> bool {
        let tok = self.peek_n(n);
        match tok.tok {
            Tok::Ident => !is_keyword(&tok.text) || TYPE_KEYWORDS.contains(&tok.text.as_str()),
            Tok::Op => ["*", "[", "<-", "("].contains(&tok.text.as_str()),
            _ => false,
        }
    }

    fn signature(&mut self) -> PResult<FuncType> {
        let params = self.params()?;
        let results = if self.peek().is_op("(") {
            self.params()?
        } else if self.starts_type_at(0) {
            vec![Param {
                name: None,
                ty: self.type_expr()?,
                variadic: false,
            }]
        } else {
            Vec::new()
        };
        Ok(FuncType { params, results })
    }

    fn params(&mut self) -> PResult<Vec<Param>> {
        let open = self.expect_op("(")?;
        let mut entries = Vec::new();
        while !self.peek().is_op(")") {
            let tok = self.peek().clone();
            if tok.tok == Tok::Ident && !is_keyword(&tok.text) {
                let next = self.peek_n(1);
                if next.is_op(",") || next.is_op(")") {
                    self.bump();
                    entries.push(ParamEntry::Bare(self.ident(&tok)));
                } else if next.is_op("...") || self.starts_type_at(1) {
                    self.bump();
                    let variadic = self.variadic();
                    let ty = self.type_expr()?;
                    entries.push(ParamEntry::Named(self.ident(&tok), ty, variadic));
                } else {
                    entries.push(ParamEntry::Anonymous(self.type_expr()?, false));
                }
            } else {
                let variadic = self.variadic();
                entries.push(ParamEntry::Anonymous(self.type_expr()?, variadic));
            }
            if self.peek().is_op(",") {
                self.bump();
            } else if !self.peek().is_op(")") {
                return Err(self.unexpected(self.peek(), "',' or ')'"));
            }
        }
        self.bump();
        self.resolve_params(&open, entries)
    }

    fn variadic(&mut self) -> bool {
        let dots = self.peek().is_op("...");
        if dots {
            self.bump();
        }
        dots
    }

    /// `a, b int` names both; `int, string` names neither.
    fn resolve_params(&self, open: &Token, entries: Vec<ParamEntry>) -> PResult<Vec<Param>> {
        let named = entries.iter().any(|e| matches!(e, ParamEntry::Named(..)));
        if !named {
            return Ok(entries
                .into_iter()
                .map(|entry| match entry {
                    ParamEntry::Bare(ident) => Param {
                        name: None,
                        ty: TypeExpr::Ident(ident),
                        variadic: false,
                    },
                    ParamEntry::Anonymous(ty, variadic) | ParamEntry::Named(_, ty, variadic) => {
                        Param {
                            name: None,
                            ty,
                            variadic,
                        }
                    }
                })
                .collect());
        }
        let mixed = || UnitError::parse(self.pos(open), "mixed named and unnamed parameters");
        let mut current: Option<TypeExpr> = None;
        let mut params = Vec::with_capacity(entries.len());
        for entry in entries.into_iter().rev() {
            match entry {
                ParamEntry::Named(ident, ty, variadic) => {
                    current = Some(ty.clone());
                    params.push(Param {
                        name: Some(ident.name),
                        ty,
                        variadic,
                    });
                }
                ParamEntry::Bare(ident) => {
                    let ty = current.clone().ok_or_else(mixed)?;
                    params.push(Param {
                        name: Some(ident.name),
                        ty,
                        variadic: false,
                    });
                }
                ParamEntry::Anonymous(..) => return Err(mixed()),
            }
        }
        params.reverse();
        Ok(params)
    }

    fn type_expr(&mut self) -> PResult<TypeExpr> {
        let tok = self.peek().clone();
        match tok.tok {
            Tok::Ident => match tok.text.as_str() {
                "map" => {
                    self.bump();
                    self.expect_op("[")?;
                    let key = self.type_expr()?;
                    self.expect_op("]")?;
                    let value = self.type_expr()?;
                    Ok(TypeExpr::Map {
                        key: Box::new(key),
                        value: Box::new(value),
                    })
                }
                "chan" => {
                    self.bump();
                    let dir = if self.peek().is_op("<-") {
                        self.bump();
                        ChanDir::Send
                    } else {
                        ChanDir::Both
                    };
                    let elem = self.type_expr()?;
                    Ok(TypeExpr::Chan {
                        dir,
                        elem: Box::new(elem),
                    })
                }
                "struct" => self.struct_type().map(TypeExpr::Struct),
                "interface" => self.interface_type().map(TypeExpr::Interface),
                "func" => {
                    self.bump();
                    self.signature().map(TypeExpr::Func)
                }
                kw if is_keyword(kw) => Err(self.unexpected(&tok, "type")),
                _ => self.type_name(),
            },
            Tok::Op => match tok.text.as_str() {
                "*" => {
                    self.bump();
                    Ok(TypeExpr::Pointer(Box::new(self.type_expr()?)))
                }
                "[" => {
                    self.bump();
                    if self.peek().is_op("]") {
                        self.bump();
                        return Ok(TypeExpr::Slice(Box::new(self.type_expr()?)));
                    }
                    let mut len = String::new();
                    let mut depth = 0usize;
                    loop {
                        let tok = self.bump();
                        match tok.tok {
                            Tok::Eof => return Err(self.unexpected(&tok, "']'")),
                            Tok::Op if tok.text == "]" && depth == 0 => break,
                            Tok::Op if tok.text == "[" || tok.text == "(" => depth += 1,
                            Tok::Op if tok.text == "]" || tok.text == ")" => depth = depth.saturating_sub(1),
                            _ => {}
                        }
                        len.push_str(&tok.text);
                    }
                    let elem = self.type_expr()?;
                    Ok(TypeExpr::Array {
                        len,
                        elem: Box::new(elem),
                    })
                }
                "<-" => {
                    self.bump();
                    self.expect_keyword("chan")?;
                    let elem = self.type_expr()?;
                    Ok(TypeExpr::Chan {
                        dir: ChanDir::Recv,
                        elem: Box::new(elem),
                    })
                }
                "(" => {
                    self.bump();
                    let inner = self.type_expr()?;
                    self.expect_op(")")?;
                    Ok(inner)
                }
                _ => Err(self.unexpected(&tok, "type")),
            },
            _ => Err(self.unexpected(&tok, "type")),
        }
    }

    /// `Name` or `pkg.Name`.
    fn type_name(&mut self) -> PResult<TypeExpr> {
        let first = self.expect_ident()?;
        if self.peek().is_op(".") && self.peek_n(1).tok == Tok::Ident {
            self.bump();
            let name = self.expect_ident()?;
            return Ok(TypeExpr::Selector {
                package: first,
                name,
            });
        }
        Ok(TypeExpr::Ident(first))
    }

    fn struct_type(&mut self) -> PResult<StructType> {
        self.expect_keyword("struct")?;
        self.expect_op("{")?;
        let mut fields = Vec::new();
        while !self.peek().is_op("}") {
            if self.peek().tok == Tok::Semi {
                self.bump();
                continue;
            }
            fields.push(self.field_decl()?);
            self.expect_semi()?;
        }
        self.expect_op("}")?;
        Ok(StructType { fields })
    }

    fn field_decl(&mut self) -> PResult<FieldDecl> {
        let first = self.peek().clone();
        let pos = self.pos(&first);
        let (names, ty) = if first.is_op("*") || first.is_op("(") {
            (Vec::new(), self.type_expr()?)
        } else if first.tok == Tok::Ident && !is_keyword(&first.text) {
            let next = self.peek_n(1);
            let embedded = next.is_op(".")
                || next.is_op("}")
                || matches!(next.tok, Tok::Semi | Tok::String | Tok::RawString | Tok::Eof);
            if embedded {
                (Vec::new(), self.type_name()?)
            } else {
                let names = self.ident_list()?;
                (names, self.type_expr()?)
            }
        } else {
            return Err(self.unexpected(&first, "field name or embedded type"));
        };
        let tag = if matches!(self.peek().tok, Tok::String | Tok::RawString) {
            Some(self.bump().text)
        } else {
            None
        };
        let comment = self.trailing_comment(self.last_line());
        Ok(FieldDecl {
            names,
            ty,
            tag,
            comment,
            pos,
        })
    }

    fn interface_type(&mut self) -> PResult<InterfaceType> {
        self.expect_keyword("interface")?;
        self.expect_op("{")?;
        let mut elems = Vec::new();
        while !self.peek().is_op("}") {
            if self.peek().tok == Tok::Semi {
                self.bump();
                continue;
            }
            let tok = self.peek().clone();
            if tok.tok == Tok::Ident && !is_keyword(&tok.text) && self.peek_n(1).is_op("(") {
                self.bump();
                let ty = self.signature()?;
                elems.push(InterfaceElem::Method {
                    name: self.ident(&tok),
                    ty,
                });
            } else {
                // constraint unions keep their first term
                let ty = self.constraint_term()?;
                while self.peek().is_op("|") {
                    self.bump();
                    self.constraint_term()?;
                }
                elems.push(InterfaceElem::Embedded(ty));
            }
            self.expect_semi()?;
        }
        self.expect_op("}")?;
        Ok(InterfaceType { elems })
    }

    fn constraint_term(&mut self) -> PResult<TypeExpr> {
        if self.peek().is_op("~") {
            self.bump();
        }
        self.type_expr()
    }
}

fn unquote(lit: &str) -> String {
    let mut chars = lit.chars();
    chars.next();
    chars.next_back();
    chars.as_str().to_string()
}
