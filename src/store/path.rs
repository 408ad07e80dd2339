//! Path expressions - a small XPath subset over a [`Document`]
//!
//! Supported:
//! - absolute (`/files/file`), relative (`class/method`, `./use`) and
//!   descendant (`//trait`) location paths, `.`, `..`, `*`, `@name`, `@*`
//! - predicates with `=`, `!=`, `and`, `or`, parentheses, nested paths
//!   (`[class[@name="C"]/method]`), positions (`[1]`) and the functions
//!   `concat`, `not`, `contains`, `starts-with`, `count`, `name`
//! - string literals in single or double quotes; values holding both quote
//!   kinds are spelled with `concat()`, see [`literal`]
//!
//! Elements have an empty string value; attributes evaluate to their value.
//! Results are deduplicated and returned in document order.

use std::cell::{OnceCell, RefCell};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::node::{Document, NodeId};
use crate::{Error, Result};

/// Quote `value` as a path-expression string literal.
///
/// Values containing both `'` and `"` become a `concat()` call that splices
/// the single quotes back in.
pub fn literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    if !value.contains('"') {
        return format!("\"{}\"", value);
    }

    let parts: Vec<String> = value.split('\'').map(|part| format!("'{}'", part)).collect();
    format!("concat({})", parts.join(", \"'\", "))
}

// ========== Results ==========

/// A single query result
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Match {
    Node(NodeId),
    Attribute { node: NodeId, name: String },
}

/// Snapshot of the nodes/attributes an expression selected.
///
/// Evaluated eagerly against the tree as it was at call time, so the
/// document may be mutated while walking the results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Matches {
    items: Vec<Match>,
}

impl Matches {
    pub fn iter(&self) -> std::slice::Iter<'_, Match> {
        self.items.iter()
    }

    /// Only the node matches, in document order
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.items.iter().filter_map(|m| match m {
            Match::Node(node) => Some(*node),
            Match::Attribute { .. } => None,
        })
    }

    pub fn first(&self) -> Option<&Match> {
        self.items.first()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl IntoIterator for Matches {
    type Item = Match;
    type IntoIter = std::vec::IntoIter<Match>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Matches {
    type Item = &'a Match;
    type IntoIter = std::slice::Iter<'a, Match>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

// ========== Engine ==========

/// Distinct expressions kept compiled before the cache starts over
const CACHE_CAPACITY: usize = 256;

/// Compiles and caches expressions for one document
#[derive(Debug, Default)]
pub struct QueryEngine {
    compiled: RefCell<HashMap<String, Arc<Expr>>>,
}

impl QueryEngine {
    /// Parse `source`, reusing an earlier compilation when available
    pub fn compile(&self, source: &str) -> Result<Arc<Expr>> {
        if let Some(expr) = self.compiled.borrow().get(source) {
            return Ok(Arc::clone(expr));
        }

        let expr = Arc::new(Parser::new(source)?.parse()?);
        let mut compiled = self.compiled.borrow_mut();
        // Per-file and per-member lookups embed literals, so most sources are seen once
        if compiled.len() >= CACHE_CAPACITY {
            compiled.clear();
        }
        compiled.insert(source.to_string(), Arc::clone(&expr));
        Ok(expr)
    }

    pub fn evaluate(&self, doc: &Document, context: NodeId, source: &str) -> Result<Matches> {
        let expr = self.compile(source)?;
        let evaluator = Evaluator::new(doc);
        match evaluator.eval(&expr, &Item::Node(context))? {
            Value::Nodes(items) => Ok(Matches {
                items: items.into_iter().map(|item| item.into_match(doc)).collect(),
            }),
            _ => Err(Error::InvalidQuery {
                expr: source.to_string(),
                offset: 0,
                reason: "expression does not select nodes".to_string(),
            }),
        }
    }
}

// ========== Syntax ==========

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Dot,
    DotDot,
    Star,
    Comma,
    Eq,
    NotEq,
    Literal(String),
    Number(f64),
    Name(String),
}

/// Parsed path expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Path(LocationPath),
    Literal(String),
    Number(f64),
    Eq(Box<Expr>, Box<Expr>),
    NotEq(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Call(Function, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Concat,
    Not,
    Contains,
    StartsWith,
    Count,
    Name,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "concat" => Some(Function::Concat),
            "not" => Some(Function::Not),
            "contains" => Some(Function::Contains),
            "starts-with" => Some(Function::StartsWith),
            "count" => Some(Function::Count),
            "name" => Some(Function::Name),
            _ => None,
        }
    }

    fn arity(&self) -> (usize, usize) {
        match self {
            Function::Concat => (2, usize::MAX),
            Function::Not | Function::Count => (1, 1),
            Function::Contains | Function::StartsWith => (2, 2),
            Function::Name => (0, 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationPath {
    absolute: bool,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Attribute,
    SelfNode,
    Parent,
    DescendantOrSelf,
}

#[derive(Debug, Clone, PartialEq)]
enum NodeTest {
    Any,
    Name(String),
}

impl NodeTest {
    fn matches(&self, name: &str) -> bool {
        match self {
            NodeTest::Any => true,
            NodeTest::Name(expected) => expected == name,
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>> {
    let invalid = |offset: usize, reason: String| Error::InvalidQuery {
        expr: source.to_string(),
        offset,
        reason,
    };

    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let token = match c {
            '/' => {
                chars.next();
                if matches!(chars.peek(), Some((_, '/'))) {
                    chars.next();
                    Token::DoubleSlash
                } else {
                    Token::Slash
                }
            }
            '.' => {
                chars.next();
                if matches!(chars.peek(), Some((_, '.'))) {
                    chars.next();
                    Token::DotDot
                } else {
                    Token::Dot
                }
            }
            '!' => {
                chars.next();
                if matches!(chars.peek(), Some((_, '='))) {
                    chars.next();
                    Token::NotEq
                } else {
                    return Err(invalid(offset, "expected `=` after `!`".to_string()));
                }
            }
            '[' | ']' | '(' | ')' | '@' | '*' | ',' | '=' => {
                chars.next();
                match c {
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '@' => Token::At,
                    '*' => Token::Star,
                    ',' => Token::Comma,
                    _ => Token::Eq,
                }
            }
            '"' | '\'' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                for (_, ch) in chars.by_ref() {
                    if ch == c {
                        closed = true;
                        break;
                    }
                    value.push(ch);
                }
                if !closed {
                    return Err(invalid(offset, "unterminated string literal".to_string()));
                }
                Token::Literal(value)
            }
            c if c.is_ascii_digit() => {
                let mut text = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_ascii_digit() || ch == '.' {
                        text.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let number = text
                    .parse::<f64>()
                    .map_err(|_| invalid(offset, format!("invalid number `{}`", text)))?;
                Token::Number(number)
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' || ch == '-' {
                        name.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                Token::Name(name)
            }
            other => {
                return Err(invalid(offset, format!("unexpected character `{}`", other)));
            }
        };

        tokens.push((token, offset));
    }

    Ok(tokens)
}

struct Parser<'s> {
    source: &'s str,
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl<'s> Parser<'s> {
    fn new(source: &'s str) -> Result<Self> {
        Ok(Self {
            source,
            tokens: tokenize(source)?,
            pos: 0,
        })
    }

    fn parse(mut self) -> Result<Expr> {
        if self.tokens.is_empty() {
            return Err(self.error("empty expression"));
        }
        let expr = self.parse_or()?;
        if self.pos < self.tokens.len() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(expr)
    }

    fn error(&self, reason: &str) -> Error {
        let offset = self
            .tokens
            .get(self.pos)
            .map(|(_, offset)| *offset)
            .unwrap_or(self.source.len());
        Error::InvalidQuery {
            expr: self.source.to_string(),
            offset,
            reason: reason.to_string(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|(token, _)| token)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(token, _)| token.clone());
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<()> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected {}", what)))
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Name(name)) if name == keyword)
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.is_keyword("or") {
            self.pos += 1;
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_comparison()?;
        while self.is_keyword("and") {
            self.pos += 1;
            let right = self.parse_comparison()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let left = self.parse_primary()?;
        match self.peek() {
            Some(Token::Eq) => {
                self.pos += 1;
                let right = self.parse_primary()?;
                Ok(Expr::Eq(Box::new(left), Box::new(right)))
            }
            Some(Token::NotEq) => {
                self.pos += 1;
                let right = self.parse_primary()?;
                Ok(Expr::NotEq(Box::new(left), Box::new(right)))
            }
            _ => Ok(left),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Token::Literal(value)) => {
                let value = value.clone();
                self.pos += 1;
                Ok(Expr::Literal(value))
            }
            Some(Token::Number(number)) => {
                let number = *number;
                self.pos += 1;
                Ok(Expr::Number(number))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.parse_or()?;
                self.expect(Token::RParen, "`)`")?;
                Ok(inner)
            }
            Some(Token::Name(_)) if self.peek_at(1) == Some(&Token::LParen) => self.parse_call(),
            Some(_) => Ok(Expr::Path(self.parse_path()?)),
            None => Err(self.error("unexpected end of expression")),
        }
    }

    fn parse_call(&mut self) -> Result<Expr> {
        let Some(Token::Name(name)) = self.advance() else {
            return Err(self.error("expected function name"));
        };
        let function = Function::from_name(&name).ok_or_else(|| {
            self.pos -= 1;
            self.error(&format!("unknown function `{}`", name))
        })?;
        self.expect(Token::LParen, "`(`")?;

        let mut args = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            args.push(self.parse_or()?);
            while self.peek() == Some(&Token::Comma) {
                self.pos += 1;
                args.push(self.parse_or()?);
            }
        }
        self.expect(Token::RParen, "`)`")?;

        let (min, max) = function.arity();
        if args.len() < min || args.len() > max {
            return Err(self.error(&format!("wrong number of arguments for `{}`", name)));
        }
        Ok(Expr::Call(function, args))
    }

    fn parse_path(&mut self) -> Result<LocationPath> {
        let mut path = LocationPath {
            absolute: false,
            steps: Vec::new(),
        };

        match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                path.absolute = true;
                // A lone `/` selects the document
                if !self.starts_step() {
                    return Ok(path);
                }
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                path.absolute = true;
                path.steps.push(descendant_or_self());
            }
            _ => {}
        }

        path.steps.push(self.parse_step()?);

        loop {
            match self.peek() {
                Some(Token::Slash) => {
                    self.pos += 1;
                }
                Some(Token::DoubleSlash) => {
                    self.pos += 1;
                    path.steps.push(descendant_or_self());
                }
                _ => break,
            }
            path.steps.push(self.parse_step()?);
        }

        Ok(path)
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Name(_) | Token::Star | Token::At | Token::Dot | Token::DotDot)
        )
    }

    fn parse_step(&mut self) -> Result<Step> {
        let (axis, test) = match self.advance() {
            Some(Token::Dot) => (Axis::SelfNode, NodeTest::Any),
            Some(Token::DotDot) => (Axis::Parent, NodeTest::Any),
            Some(Token::Star) => (Axis::Child, NodeTest::Any),
            Some(Token::Name(name)) => (Axis::Child, NodeTest::Name(name)),
            Some(Token::At) => match self.advance() {
                Some(Token::Name(name)) => (Axis::Attribute, NodeTest::Name(name)),
                Some(Token::Star) => (Axis::Attribute, NodeTest::Any),
                _ => {
                    self.pos -= 1;
                    return Err(self.error("expected attribute name after `@`"));
                }
            },
            _ => {
                self.pos -= 1;
                return Err(self.error("expected a location step"));
            }
        };

        let mut predicates = Vec::new();
        while self.peek() == Some(&Token::LBracket) {
            self.pos += 1;
            predicates.push(self.parse_or()?);
            self.expect(Token::RBracket, "`]`")?;
        }

        Ok(Step { axis, test, predicates })
    }
}

fn descendant_or_self() -> Step {
    Step {
        axis: Axis::DescendantOrSelf,
        test: NodeTest::Any,
        predicates: Vec::new(),
    }
}

// ========== Evaluation ==========

/// Evaluation item. `Document` is the virtual parent of the root element
/// that absolute paths start from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Item {
    Document,
    Node(NodeId),
    Attr(NodeId, String),
}

impl Item {
    fn into_match(self, doc: &Document) -> Match {
        match self {
            Item::Document => Match::Node(doc.root()),
            Item::Node(node) => Match::Node(node),
            Item::Attr(node, name) => Match::Attribute { node, name },
        }
    }
}

#[derive(Debug)]
enum Value {
    Nodes(Vec<Item>),
    Str(String),
    Num(f64),
    Bool(bool),
}

struct Evaluator<'d> {
    doc: &'d Document,
    /// Pre-order position of every attached node, computed on first sort
    order: OnceCell<HashMap<NodeId, usize>>,
}

impl<'d> Evaluator<'d> {
    fn new(doc: &'d Document) -> Self {
        Self {
            doc,
            order: OnceCell::new(),
        }
    }

    fn eval(&self, expr: &Expr, context: &Item) -> Result<Value> {
        Ok(match expr {
            Expr::Path(path) => Value::Nodes(self.eval_path(path, context)?),
            Expr::Literal(value) => Value::Str(value.clone()),
            Expr::Number(number) => Value::Num(*number),
            Expr::Eq(left, right) => {
                Value::Bool(self.compare(&self.eval(left, context)?, &self.eval(right, context)?, true))
            }
            Expr::NotEq(left, right) => {
                Value::Bool(self.compare(&self.eval(left, context)?, &self.eval(right, context)?, false))
            }
            Expr::And(left, right) => {
                Value::Bool(self.truthy(&self.eval(left, context)?) && self.truthy(&self.eval(right, context)?))
            }
            Expr::Or(left, right) => {
                Value::Bool(self.truthy(&self.eval(left, context)?) || self.truthy(&self.eval(right, context)?))
            }
            Expr::Call(function, args) => self.call(*function, args, context)?,
        })
    }

    fn call(&self, function: Function, args: &[Expr], context: &Item) -> Result<Value> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, context)?);
        }

        Ok(match function {
            Function::Concat => Value::Str(values.iter().map(|v| self.to_string(v)).collect()),
            Function::Not => Value::Bool(!self.truthy(&values[0])),
            Function::Contains => Value::Bool(self.to_string(&values[0]).contains(&self.to_string(&values[1]))),
            Function::StartsWith => {
                Value::Bool(self.to_string(&values[0]).starts_with(&self.to_string(&values[1])))
            }
            Function::Count => match &values[0] {
                Value::Nodes(items) => Value::Num(items.len() as f64),
                _ => Value::Num(0.0),
            },
            Function::Name => {
                let item = match values.first() {
                    Some(Value::Nodes(items)) => items.first().cloned(),
                    Some(_) => None,
                    None => Some(context.clone()),
                };
                Value::Str(match item {
                    Some(Item::Node(node)) => self.doc.label(node).to_string(),
                    Some(Item::Attr(_, name)) => name,
                    _ => String::new(),
                })
            }
        })
    }

    fn eval_path(&self, path: &LocationPath, context: &Item) -> Result<Vec<Item>> {
        let mut current = if path.absolute {
            vec![Item::Document]
        } else {
            vec![context.clone()]
        };

        for step in &path.steps {
            let mut seen = HashSet::new();
            let mut next = Vec::new();

            for item in &current {
                let candidates = self.axis(item, step);
                for candidate in self.filter(candidates, &step.predicates)? {
                    if seen.insert(candidate.clone()) {
                        next.push(candidate);
                    }
                }
            }

            if current.len() > 1 || step.axis == Axis::Parent {
                self.sort(&mut next);
            }
            current = next;
        }

        Ok(current)
    }

    fn axis(&self, item: &Item, step: &Step) -> Vec<Item> {
        let doc = self.doc;
        match (step.axis, item) {
            (Axis::Child, Item::Document) => {
                let root = doc.root();
                if step.test.matches(doc.label(root)) {
                    vec![Item::Node(root)]
                } else {
                    Vec::new()
                }
            }
            (Axis::Child, Item::Node(node)) => doc
                .children(*node)
                .iter()
                .filter(|child| step.test.matches(doc.label(**child)))
                .map(|child| Item::Node(*child))
                .collect(),
            (Axis::Attribute, Item::Node(node)) => doc
                .attributes(*node)
                .keys()
                .filter(|name| step.test.matches(name))
                .map(|name| Item::Attr(*node, name.clone()))
                .collect(),
            (Axis::SelfNode, _) => vec![item.clone()],
            (Axis::Parent, Item::Node(node)) => match doc.parent(*node) {
                Some(parent) => vec![Item::Node(parent)],
                None if *node == doc.root() => vec![Item::Document],
                None => Vec::new(),
            },
            (Axis::Parent, Item::Attr(node, _)) => vec![Item::Node(*node)],
            (Axis::DescendantOrSelf, Item::Document) => {
                let root = doc.root();
                let mut items = vec![Item::Document, Item::Node(root)];
                items.extend(doc.descendants(root).map(Item::Node));
                items
            }
            (Axis::DescendantOrSelf, Item::Node(node)) => {
                let mut items = vec![Item::Node(*node)];
                items.extend(doc.descendants(*node).map(Item::Node));
                items
            }
            (Axis::DescendantOrSelf, Item::Attr(..)) => vec![item.clone()],
            _ => Vec::new(),
        }
    }

    fn filter(&self, candidates: Vec<Item>, predicates: &[Expr]) -> Result<Vec<Item>> {
        let mut current = candidates;
        for predicate in predicates {
            let mut kept = Vec::with_capacity(current.len());
            for (index, candidate) in current.into_iter().enumerate() {
                let keep = match predicate {
                    Expr::Number(position) => (index + 1) as f64 == *position,
                    _ => self.truthy(&self.eval(predicate, &candidate)?),
                };
                if keep {
                    kept.push(candidate);
                }
            }
            current = kept;
        }
        Ok(current)
    }

    fn sort(&self, items: &mut [Item]) {
        let order = self.order.get_or_init(|| {
            let root = self.doc.root();
            std::iter::once(root)
                .chain(self.doc.descendants(root))
                .enumerate()
                .map(|(index, node)| (node, index))
                .collect()
        });

        let position = |node: &NodeId| order.get(node).map(|p| p + 1).unwrap_or(usize::MAX);
        items.sort_by(|a, b| {
            let key = |item: &Item| match item {
                Item::Document => (0, 0),
                Item::Node(node) => (position(node), 0),
                Item::Attr(node, _) => (position(node), 1),
            };
            key(a).cmp(&key(b)).then_with(|| match (a, b) {
                (Item::Attr(_, x), Item::Attr(_, y)) => x.cmp(y),
                _ => std::cmp::Ordering::Equal,
            })
        });
    }

    fn item_string(&self, item: &Item) -> String {
        match item {
            Item::Attr(node, name) => self.doc.attribute(*node, name).unwrap_or_default().to_string(),
            _ => String::new(),
        }
    }

    fn to_string(&self, value: &Value) -> String {
        match value {
            Value::Nodes(items) => items.first().map(|i| self.item_string(i)).unwrap_or_default(),
            Value::Str(s) => s.clone(),
            Value::Num(n) => format_number(*n),
            Value::Bool(b) => b.to_string(),
        }
    }

    fn truthy(&self, value: &Value) -> bool {
        match value {
            Value::Nodes(items) => !items.is_empty(),
            Value::Str(s) => !s.is_empty(),
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Bool(b) => *b,
        }
    }

    /// XPath 1.0 comparison: node-sets compare existentially
    fn compare(&self, left: &Value, right: &Value, equal: bool) -> bool {
        let test = |a: &str, b: &str| (a == b) == equal;
        let test_num = |a: f64, b: f64| (a == b) == equal;

        match (left, right) {
            (Value::Nodes(xs), Value::Nodes(ys)) => xs.iter().any(|x| {
                let x = self.item_string(x);
                ys.iter().any(|y| test(&x, &self.item_string(y)))
            }),
            (Value::Nodes(xs), Value::Num(n)) | (Value::Num(n), Value::Nodes(xs)) => xs
                .iter()
                .any(|x| test_num(self.item_string(x).trim().parse().unwrap_or(f64::NAN), *n)),
            (Value::Nodes(xs), Value::Str(s)) | (Value::Str(s), Value::Nodes(xs)) => {
                xs.iter().any(|x| test(&self.item_string(x), s))
            }
            (Value::Nodes(_), Value::Bool(b)) | (Value::Bool(b), Value::Nodes(_)) => {
                let nodes = if matches!(left, Value::Nodes(_)) { left } else { right };
                (self.truthy(nodes) == *b) == equal
            }
            (Value::Bool(_), _) | (_, Value::Bool(_)) => (self.truthy(left) == self.truthy(right)) == equal,
            (Value::Num(a), Value::Num(b)) => test_num(*a, *b),
            (Value::Num(n), Value::Str(s)) | (Value::Str(s), Value::Num(n)) => {
                test_num(s.trim().parse().unwrap_or(f64::NAN), *n)
            }
            (Value::Str(a), Value::Str(b)) => test(a, b),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
