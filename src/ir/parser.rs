//! Textual IR parser
//!
//! Grammar (one declaration per line is conventional but not required):
//!
//! ```text
//! package NAME
//! file_number N "PATH"
//! chan NAME(TYPE, [initial_values={V, ...},] id=N, kind=K, ops=O,
//!           flow_control=F, [fifo_depth=D,] metadata="...")
//! [top] proc NAME(TOK: token, [ST: TYPE, ...] init={V, ...}) {
//!   NAME: TYPE = OP(OPERANDS..., KEY=VALUE...)
//!   next (TOK_NODE, STATE_NODE...)
//! }
//! ```
//!
//! Node `id=` attributes are accepted and ignored; `pos=[(FILE, LINE, COL), ...]`
//! is kept on the node. The result is verified before it is returned.

use std::collections::HashMap;

use super::node::{Node, NodeId, Op, SourcePos};
use super::package::{Channel, ChannelKind, ChannelOps, FileNumber, FlowControl, Package, Proc, StateElement};
use super::types::Type;
use super::value::{compute_mask, Value};
use super::verifier::verify_package;
use crate::error::{Error, Result};

// ============================================================================
// Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    Ident(String),
    Number(String),
    Str(String),
    Punct(char),
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    line: usize,
    col: usize,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            TokenKind::Ident(s) => format!("identifier '{}'", s),
            TokenKind::Number(s) => format!("number '{}'", s),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Punct(c) => format!("'{}'", c),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

fn lex(text: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let (mut i, mut line, mut col) = (0usize, 1usize, 1usize);

    let advance = |i: &mut usize, line: &mut usize, col: &mut usize, c: char| {
        *i += 1;
        if c == '\n' {
            *line += 1;
            *col = 1;
        } else {
            *col += 1;
        }
    };

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            advance(&mut i, &mut line, &mut col, c);
            continue;
        }
        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                let ch = chars[i];
                advance(&mut i, &mut line, &mut col, ch);
            }
            continue;
        }

        let (start_line, start_col) = (line, col);
        let kind = if c.is_ascii_alphabetic() || c == '_' {
            let mut s = String::new();
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_' || chars[i] == '.') {
                s.push(chars[i]);
                let ch = chars[i];
                advance(&mut i, &mut line, &mut col, ch);
            }
            TokenKind::Ident(s)
        } else if c.is_ascii_digit() {
            let mut s = String::new();
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                s.push(chars[i]);
                let ch = chars[i];
                advance(&mut i, &mut line, &mut col, ch);
            }
            TokenKind::Number(s)
        } else if c == '"' {
            let triple = chars.get(i + 1) == Some(&'"') && chars.get(i + 2) == Some(&'"');
            let quote_len = if triple { 3 } else { 1 };
            for _ in 0..quote_len {
                advance(&mut i, &mut line, &mut col, '"');
            }
            let mut s = String::new();
            loop {
                let Some(&ch) = chars.get(i) else {
                    return Err(Error::Parse {
                        line: start_line,
                        col: start_col,
                        message: "unterminated string literal".into(),
                    });
                };
                if triple {
                    if ch == '"' && chars.get(i + 1) == Some(&'"') && chars.get(i + 2) == Some(&'"') {
                        for _ in 0..3 {
                            advance(&mut i, &mut line, &mut col, '"');
                        }
                        break;
                    }
                } else if ch == '"' {
                    advance(&mut i, &mut line, &mut col, ch);
                    break;
                } else if ch == '\\' {
                    advance(&mut i, &mut line, &mut col, ch);
                    if let Some(&escaped) = chars.get(i) {
                        s.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            other => other,
                        });
                        advance(&mut i, &mut line, &mut col, escaped);
                    }
                    continue;
                }
                s.push(ch);
                advance(&mut i, &mut line, &mut col, ch);
            }
            TokenKind::Str(s)
        } else if "()[]{}:,=->".contains(c) {
            advance(&mut i, &mut line, &mut col, c);
            TokenKind::Punct(c)
        } else {
            return Err(Error::Parse {
                line,
                col,
                message: format!("unexpected character '{}'", c),
            });
        };
        tokens.push(Token { kind, line: start_line, col: start_col });
    }
    tokens.push(Token { kind: TokenKind::Eof, line, col });
    Ok(tokens)
}

fn parse_number(text: &str) -> Option<u64> {
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    if let Some(hex) = cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = cleaned.strip_prefix("0b").or_else(|| cleaned.strip_prefix("0B")) {
        u64::from_str_radix(bin, 2).ok()
    } else {
        cleaned.parse::<u64>().ok()
    }
}

// ============================================================================
// Parser
// ============================================================================

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

/// Attribute values collected from a node's argument list.
#[derive(Default)]
struct NodeArgs {
    operands: Vec<NodeId>,
    value: Option<Value>,
    start: Option<usize>,
    width: Option<usize>,
    new_bit_count: Option<usize>,
    index: Option<usize>,
    indices: Option<Vec<NodeId>>,
    cases: Option<Vec<NodeId>>,
    default: Option<NodeId>,
    predicate: Option<NodeId>,
    channel: Option<String>,
    blocking: Option<bool>,
    pos: Vec<SourcePos>,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        let i = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[i].kind
    }

    fn bump(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T> {
        let tok = &self.tokens[self.pos];
        Err(Error::Parse { line: tok.line, col: tok.col, message: message.into() })
    }

    fn at_punct(&self, c: char) -> bool {
        *self.peek() == TokenKind::Punct(c)
    }

    fn at_ident(&self, word: &str) -> bool {
        matches!(self.peek(), TokenKind::Ident(s) if s == word)
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.at_punct(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.at_ident(word) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, c: char) -> Result<()> {
        if self.eat_punct(c) {
            Ok(())
        } else {
            self.error(format!("expected '{}', found {}", c, self.peek().describe()))
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.peek().clone() {
            TokenKind::Ident(s) => {
                self.bump();
                Ok(s)
            }
            other => self.error(format!("expected identifier, found {}", other.describe())),
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<()> {
        if self.at_ident(word) {
            self.bump();
            Ok(())
        } else {
            self.error(format!("expected '{}', found {}", word, self.peek().describe()))
        }
    }

    fn expect_number(&mut self) -> Result<u64> {
        match self.peek().clone() {
            TokenKind::Number(s) => match parse_number(&s) {
                Some(n) => {
                    self.bump();
                    Ok(n)
                }
                None => self.error(format!("invalid number '{}'", s)),
            },
            other => self.error(format!("expected number, found {}", other.describe())),
        }
    }

    fn expect_usize(&mut self) -> Result<usize> {
        let n = self.expect_number()?;
        match usize::try_from(n) {
            Ok(n) => Ok(n),
            Err(_) => self.error(format!("{} is out of range", n)),
        }
    }

    fn expect_string(&mut self) -> Result<String> {
        match self.peek().clone() {
            TokenKind::Str(s) => {
                self.bump();
                Ok(s)
            }
            other => self.error(format!("expected string, found {}", other.describe())),
        }
    }

    /// Comma-separated items between `open` and `close`.
    fn delimited<T>(
        &mut self,
        open: char,
        close: char,
        mut item: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<Vec<T>> {
        self.expect_punct(open)?;
        let mut out = Vec::new();
        if self.eat_punct(close) {
            return Ok(out);
        }
        loop {
            out.push(item(self)?);
            if self.eat_punct(close) {
                return Ok(out);
            }
            self.expect_punct(',')?;
        }
    }

    // ------------------------------------------------------------------------
    // Types and values
    // ------------------------------------------------------------------------

    fn parse_type(&mut self) -> Result<Type> {
        let mut ty = if self.at_punct('(') {
            Type::Tuple(self.delimited('(', ')', Self::parse_type)?)
        } else if self.at_ident("token") {
            self.bump();
            Type::Token
        } else if self.at_ident("bits") {
            self.bump();
            self.expect_punct('[')?;
            let width = self.expect_usize()?;
            self.expect_punct(']')?;
            Type::Bits(width)
        } else {
            return self.error(format!("expected type, found {}", self.peek().describe()));
        };
        while self.at_punct('[') {
            self.bump();
            let size = self.expect_usize()?;
            self.expect_punct(']')?;
            ty = Type::array(ty, size);
        }
        Ok(ty)
    }

    /// Parse a value, untyped (`5`) or typed (`bits[8]:5`), as type `ty`.
    fn parse_value(&mut self, ty: &Type) -> Result<Value> {
        match ty {
            Type::Token => {
                self.expect_keyword("token")?;
                Ok(Value::Token)
            }
            Type::Bits(width) => {
                if self.at_ident("bits") {
                    let declared = self.parse_type()?;
                    if declared != *ty {
                        return self.error(format!("value of type {} where {} expected", declared, ty));
                    }
                    self.expect_punct(':')?;
                }
                let negative = self.eat_punct('-');
                let magnitude = self.expect_number()?;
                let mask = compute_mask(*width);
                if negative {
                    let limit = if *width == 0 { 0 } else { 1u64 << (width - 1) };
                    if magnitude > limit {
                        return self.error(format!("-{} does not fit in bits[{}]", magnitude, width));
                    }
                    Ok(Value::ubits(*width, magnitude.wrapping_neg()))
                } else {
                    if magnitude & !mask != 0 {
                        return self.error(format!("{} does not fit in bits[{}]", magnitude, width));
                    }
                    Ok(Value::ubits(*width, magnitude))
                }
            }
            Type::Tuple(elements) => {
                let mut i = 0;
                let values = self.delimited('(', ')', |p| {
                    let Some(element) = elements.get(i) else {
                        return p.error(format!("too many elements for {}", ty));
                    };
                    i += 1;
                    p.parse_value(element)
                })?;
                if values.len() != elements.len() {
                    return self.error(format!("expected {} tuple elements, got {}", elements.len(), values.len()));
                }
                Ok(Value::Tuple(values))
            }
            Type::Array { element, size } => {
                let values = self.delimited('[', ']', |p| p.parse_value(element))?;
                if values.len() != *size {
                    return self.error(format!("expected {} array elements, got {}", size, values.len()));
                }
                Ok(Value::Array(values))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Declarations
    // ------------------------------------------------------------------------

    fn parse_package(&mut self) -> Result<Package> {
        self.expect_keyword("package")?;
        let name = self.expect_ident()?;
        let mut package = Package::new(name);

        loop {
            match self.peek().clone() {
                TokenKind::Eof => break,
                TokenKind::Ident(word) => match word.as_str() {
                    "file_number" => {
                        self.bump();
                        let number = self.expect_number()?;
                        let path = self.expect_string()?;
                        package.files.push(FileNumber { number, path });
                    }
                    "chan" => {
                        let channel = self.parse_channel()?;
                        if package.channel(&channel.name).is_some() {
                            return self.error(format!("duplicate channel '{}'", channel.name));
                        }
                        package.channels.push(channel);
                    }
                    "top" | "proc" => {
                        let is_top = self.eat_keyword("top");
                        if is_top && package.top.is_some() {
                            return self.error("more than one top proc");
                        }
                        let proc = self.parse_proc()?;
                        if package.proc(&proc.name).is_some() {
                            return self.error(format!("duplicate proc '{}'", proc.name));
                        }
                        if is_top {
                            package.top = Some(proc.name.clone());
                        }
                        package.procs.push(proc);
                    }
                    "fn" | "block" => {
                        return Err(Error::Unsupported(format!(
                            "'{}' declarations are not supported by the proc runtime",
                            word
                        )))
                    }
                    _ => return self.error(format!("unexpected '{}' at top level", word)),
                },
                other => return self.error(format!("unexpected {} at top level", other.describe())),
            }
        }
        Ok(package)
    }

    fn parse_channel(&mut self) -> Result<Channel> {
        self.expect_keyword("chan")?;
        let name = self.expect_ident()?;
        self.expect_punct('(')?;
        let ty = self.parse_type()?;

        let mut id = None;
        let mut kind = None;
        let mut ops = None;
        let mut flow_control = FlowControl::None;
        let mut fifo_depth = None;
        let mut initial_values = Vec::new();
        let mut metadata = String::new();

        while self.eat_punct(',') {
            let key = self.expect_ident()?;
            self.expect_punct('=')?;
            match key.as_str() {
                "initial_values" => {
                    initial_values = self.delimited('{', '}', |p| p.parse_value(&ty))?;
                }
                "id" => id = Some(self.expect_number()?),
                "kind" => {
                    kind = Some(match self.expect_ident()?.as_str() {
                        "streaming" => ChannelKind::Streaming,
                        "single_value" => ChannelKind::SingleValue,
                        other => return self.error(format!("unknown channel kind '{}'", other)),
                    })
                }
                "ops" => {
                    ops = Some(match self.expect_ident()?.as_str() {
                        "send_only" => ChannelOps::SendOnly,
                        "receive_only" => ChannelOps::ReceiveOnly,
                        "send_receive" => ChannelOps::SendReceive,
                        other => return self.error(format!("unknown channel ops '{}'", other)),
                    })
                }
                "flow_control" => {
                    flow_control = match self.expect_ident()?.as_str() {
                        "none" => FlowControl::None,
                        "ready_valid" => FlowControl::ReadyValid,
                        other => return self.error(format!("unknown flow control '{}'", other)),
                    }
                }
                "fifo_depth" => fifo_depth = Some(self.expect_number()?),
                "metadata" => metadata = self.expect_string()?,
                other => return self.error(format!("unknown channel attribute '{}'", other)),
            }
        }
        self.expect_punct(')')?;

        let (Some(id), Some(kind), Some(ops)) = (id, kind, ops) else {
            return self.error(format!("channel '{}' requires id, kind and ops", name));
        };
        Ok(Channel { name, id, kind, ops, ty, flow_control, fifo_depth, initial_values, metadata })
    }

    fn parse_proc(&mut self) -> Result<Proc> {
        self.expect_keyword("proc")?;
        let name = self.expect_ident()?;

        let mut nodes: Vec<Node> = Vec::new();
        let mut names: HashMap<String, NodeId> = HashMap::new();
        let mut state_types: Vec<(String, Type)> = Vec::new();
        let mut init_values: Option<Vec<Value>> = None;

        self.expect_punct('(')?;
        let token_name = self.expect_ident()?;
        self.expect_punct(':')?;
        let token_ty = self.parse_type()?;
        if token_ty != Type::Token {
            return self.error(format!("first proc param must be a token, found {}", token_ty));
        }
        while self.eat_punct(',') {
            if self.at_ident("init") && *self.peek_at(1) == TokenKind::Punct('=') {
                self.bump();
                self.bump();
                let types: Vec<Type> = state_types.iter().map(|(_, t)| t.clone()).collect();
                let mut i = 0;
                let values = self.delimited('{', '}', |p| {
                    let Some(ty) = types.get(i) else {
                        return p.error("more init values than state elements");
                    };
                    i += 1;
                    p.parse_value(ty)
                })?;
                init_values = Some(values);
                break;
            }
            let param = self.expect_ident()?;
            self.expect_punct(':')?;
            let ty = self.parse_type()?;
            state_types.push((param, ty));
        }
        self.expect_punct(')')?;

        let init_values = init_values.unwrap_or_default();
        if init_values.len() != state_types.len() {
            return self.error(format!(
                "proc '{}' has {} state elements but {} init values",
                name,
                state_types.len(),
                init_values.len()
            ));
        }

        self.define(
            &mut names,
            &mut nodes,
            Node { name: token_name, ty: Type::Token, op: Op::TokenParam, operands: vec![], pos: vec![] },
        )?;
        let mut state = Vec::with_capacity(state_types.len());
        for (index, ((param, ty), init)) in state_types.into_iter().zip(init_values).enumerate() {
            state.push(StateElement { name: param.clone(), init });
            let node = Node { name: param, ty, op: Op::StateParam { index }, operands: vec![], pos: vec![] };
            self.define(&mut names, &mut nodes, node)?;
        }

        self.expect_punct('{')?;
        loop {
            if self.at_ident("next") && *self.peek_at(1) == TokenKind::Punct('(') {
                break;
            }
            let node_name = self.expect_ident()?;
            self.expect_punct(':')?;
            let ty = self.parse_type()?;
            self.expect_punct('=')?;
            let node = self.parse_node_body(node_name, ty, &names)?;
            self.define(&mut names, &mut nodes, node)?;
        }

        self.expect_keyword("next")?;
        let next = self.delimited('(', ')', |p| p.operand(&names))?;
        self.expect_punct('}')?;

        let Some((next_token, next_state)) = next.split_first() else {
            return self.error("next requires at least a token");
        };
        Ok(Proc {
            name,
            state,
            nodes,
            next_token: *next_token,
            next_state: next_state.to_vec(),
        })
    }

    fn define(&self, names: &mut HashMap<String, NodeId>, nodes: &mut Vec<Node>, node: Node) -> Result<NodeId> {
        let id = NodeId(nodes.len());
        if names.insert(node.name.clone(), id).is_some() {
            return self.error(format!("duplicate node name '{}'", node.name));
        }
        nodes.push(node);
        Ok(id)
    }

    fn operand(&mut self, names: &HashMap<String, NodeId>) -> Result<NodeId> {
        let name = self.expect_ident()?;
        match names.get(name.as_str()) {
            Some(id) => Ok(*id),
            None => {
                self.pos -= 1;
                self.error(format!("undefined node '{}'", name))
            }
        }
    }

    fn operand_list(&mut self, names: &HashMap<String, NodeId>) -> Result<Vec<NodeId>> {
        self.delimited('[', ']', |p| p.operand(names))
    }

    fn parse_node_body(&mut self, name: String, ty: Type, names: &HashMap<String, NodeId>) -> Result<Node> {
        let op_name = self.expect_ident()?;
        let mut args = NodeArgs::default();

        self.expect_punct('(')?;
        if !self.eat_punct(')') {
            loop {
                let is_attr = matches!(self.peek(), TokenKind::Ident(_)) && *self.peek_at(1) == TokenKind::Punct('=');
                if is_attr {
                    let key = self.expect_ident()?;
                    self.expect_punct('=')?;
                    self.parse_attribute(&key, &ty, names, &mut args)?;
                } else {
                    args.operands.push(self.operand(names)?);
                }
                if self.eat_punct(')') {
                    break;
                }
                self.expect_punct(',')?;
            }
        }

        let missing = |p: &Self, attr: &str| p.error::<Node>(format!("{} requires '{}'", op_name, attr));
        let mut operands = args.operands;
        let op = match op_name.as_str() {
            "literal" => match args.value {
                Some(value) => Op::Literal { value },
                None => return missing(self, "value"),
            },
            "bit_slice" => match (args.start, args.width) {
                (Some(start), Some(width)) => Op::BitSlice { start, width },
                _ => return missing(self, "start and width"),
            },
            "zero_ext" | "sign_ext" => {
                let Some(new_bit_count) = args.new_bit_count else {
                    return missing(self, "new_bit_count");
                };
                if op_name == "zero_ext" {
                    Op::ZeroExt { new_bit_count }
                } else {
                    Op::SignExt { new_bit_count }
                }
            }
            "tuple_index" => match args.index {
                Some(index) => Op::TupleIndex { index },
                None => return missing(self, "index"),
            },
            "array_index" | "array_update" => {
                let Some(indices) = args.indices else {
                    return missing(self, "indices");
                };
                operands.extend(indices);
                if op_name == "array_index" {
                    Op::ArrayIndex
                } else {
                    Op::ArrayUpdate
                }
            }
            "sel" => {
                let Some(cases) = args.cases else {
                    return missing(self, "cases");
                };
                operands.extend(cases);
                let has_default = args.default.is_some();
                operands.extend(args.default);
                Op::Sel { has_default }
            }
            "send" | "receive" => {
                let Some(channel) = args.channel else {
                    return missing(self, "channel");
                };
                let has_predicate = args.predicate.is_some();
                operands.extend(args.predicate);
                if op_name == "send" {
                    Op::Send { channel, has_predicate }
                } else {
                    Op::Receive { channel, blocking: args.blocking.unwrap_or(true), has_predicate }
                }
            }
            "param" => return self.error("params may only appear in the proc signature"),
            other => match Op::from_simple_name(other) {
                Some(op) => op,
                None => return self.error(format!("unknown op '{}'", other)),
            },
        };
        Ok(Node { name, ty, op, operands, pos: args.pos })
    }

    fn parse_attribute(
        &mut self,
        key: &str,
        ty: &Type,
        names: &HashMap<String, NodeId>,
        args: &mut NodeArgs,
    ) -> Result<()> {
        match key {
            "value" => args.value = Some(self.parse_value(ty)?),
            "start" => args.start = Some(self.expect_usize()?),
            "width" => args.width = Some(self.expect_usize()?),
            "new_bit_count" => args.new_bit_count = Some(self.expect_usize()?),
            "index" => args.index = Some(self.expect_usize()?),
            "indices" => args.indices = Some(self.operand_list(names)?),
            "cases" => args.cases = Some(self.operand_list(names)?),
            "default" => args.default = Some(self.operand(names)?),
            "predicate" => args.predicate = Some(self.operand(names)?),
            "channel" => args.channel = Some(self.expect_ident()?),
            "blocking" => {
                args.blocking = Some(match self.expect_ident()?.as_str() {
                    "true" => true,
                    "false" => false,
                    other => return self.error(format!("expected true or false, found '{}'", other)),
                })
            }
            "id" => {
                self.expect_number()?;
            }
            "pos" => {
                args.pos = self.delimited('[', ']', |p| {
                    p.expect_punct('(')?;
                    let file = p.expect_number()?;
                    p.expect_punct(',')?;
                    let line = p.expect_number()?;
                    p.expect_punct(',')?;
                    let col = p.expect_number()?;
                    p.expect_punct(')')?;
                    Ok(SourcePos { file, line, col })
                })?
            }
            other => return self.error(format!("unknown attribute '{}'", other)),
        }
        Ok(())
    }
}

/// Parse and verify a package from its textual IR.
pub fn parse_package(text: &str) -> Result<Package> {
    let mut parser = Parser { tokens: lex(text)?, pos: 0 };
    let package = parser.parse_package()?;
    verify_package(&package)?;
    Ok(package)
}

/// Parse a standalone type such as `(token, bits[32])`.
pub fn parse_type(text: &str) -> Result<Type> {
    let mut parser = Parser { tokens: lex(text)?, pos: 0 };
    let ty = parser.parse_type()?;
    if *parser.peek() != TokenKind::Eof {
        return parser.error("trailing input after type");
    }
    Ok(ty)
}

/// Parse a value of type `ty`, untyped or typed.
pub fn parse_value(text: &str, ty: &Type) -> Result<Value> {
    let mut parser = Parser { tokens: lex(text)?, pos: 0 };
    let value = parser.parse_value(ty)?;
    if *parser.peek() != TokenKind::Eof {
        return parser.error("trailing input after value");
    }
    Ok(value)
}
