//! Recursive-descent parser for the rule language.
//!
//! Dot lookups and `new` expressions are hoisted out of the term they appear
//! in: the parser emits a `Lookup`/`Make` goal binding a fresh `_value#N` or
//! `_new#N` variable, placed just before the goal that uses it, and the term
//! itself becomes that variable.

use crate::error::ParseError;
use crate::term::{Call, Dictionary, InstanceLiteral, Symbol, Term, Value};
use super::lexer::{tokenize, Spanned, Token};
use super::program::{Comparison, Goal, Param, Program, QueryBody, Rule};

/// Parse a whole source file: rules and `?=` inline queries.
pub fn parse_program(src: &str) -> Result<Program, ParseError> {
    let mut parser = Parser::new(src)?;
    let mut program = Program::default();
    while !parser.at_end() {
        if parser.peek_is(&Token::Query) {
            parser.advance();
            program.queries.push(parser.query_body()?);
            parser.expect(Token::Semi)?;
        } else {
            program.rules.push(parser.rule()?);
        }
    }
    Ok(program)
}

/// Parse a query: a rule body, optionally terminated by `;`.
pub fn parse_query(src: &str) -> Result<QueryBody, ParseError> {
    let mut parser = Parser::new(src)?;
    let query = parser.query_body()?;
    if parser.peek_is(&Token::Semi) {
        parser.advance();
    }
    if let Some(extra) = parser.tokens.get(parser.at) {
        return Err(ParseError::ExtraToken {
            token: extra.token.to_string(),
            pos: extra.pos,
        });
    }
    Ok(query)
}


// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Spanned>,
    at: usize,
    /// Position reported for a premature end of input.
    end: usize,
    temps: u64,
    /// Goals hoisted out of the terms of the goal being parsed.
    pre: Vec<Goal>,
    /// Named variables seen since the last reset.
    vars: Vec<String>,
    allow_lookups: bool,
}

impl Parser {
    fn new(src: &str) -> Result<Self, ParseError> {
        Ok(Parser {
            tokens: tokenize(src)?,
            at: 0,
            end: src.len(),
            temps: 0,
            pre: Vec::new(),
            vars: Vec::new(),
            allow_lookups: true,
        })
    }

    // --- token helpers ---

    fn at_end(&self) -> bool {
        self.at >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.at).map(|s| &s.token)
    }

    fn peek_is(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn peek_ident(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s == word)
    }

    fn advance(&mut self) {
        self.at += 1;
    }

    fn next(&mut self) -> Result<Spanned, ParseError> {
        let spanned = self
            .tokens
            .get(self.at)
            .cloned()
            .ok_or(ParseError::UnrecognizedEOF { pos: self.end })?;
        self.at += 1;
        Ok(spanned)
    }

    fn unexpected(spanned: &Spanned) -> ParseError {
        ParseError::UnrecognizedToken {
            token: spanned.token.to_string(),
            pos: spanned.pos,
        }
    }

    fn expect(&mut self, want: Token) -> Result<usize, ParseError> {
        let got = self.next()?;
        if got.token == want {
            Ok(got.pos)
        } else {
            Err(Self::unexpected(&got))
        }
    }

    fn ident(&mut self) -> Result<String, ParseError> {
        let got = self.next()?;
        match got.token {
            Token::Ident(name) => Ok(name),
            _ => Err(Self::unexpected(&got)),
        }
    }

    fn temp(&mut self, prefix: &str) -> Symbol {
        self.temps += 1;
        Symbol(format!("{}#{}", prefix, self.temps))
    }

    // --- rules and queries ---

    fn rule(&mut self) -> Result<Rule, ParseError> {
        let name = self.ident()?;
        self.expect(Token::LParen)?;

        self.allow_lookups = false;
        let params = self.params();
        self.allow_lookups = true;
        let params = params?;

        let body = if self.peek_is(&Token::Define) {
            self.advance();
            self.body()?
        } else {
            Vec::new()
        };
        self.expect(Token::Semi)?;
        Ok(Rule { name, params, body })
    }

    fn params(&mut self) -> Result<Vec<Param>, ParseError> {
        let mut params = Vec::new();
        if self.peek_is(&Token::RParen) {
            self.advance();
            return Ok(params);
        }
        loop {
            let term = self.term()?;
            let specializer = if self.peek_is(&Token::Colon) {
                self.advance();
                Some(self.ident()?)
            } else {
                None
            };
            params.push(Param { term, specializer });
            let sep = self.next()?;
            match sep.token {
                Token::Comma => continue,
                Token::RParen => return Ok(params),
                _ => return Err(Self::unexpected(&sep)),
            }
        }
    }

    fn query_body(&mut self) -> Result<QueryBody, ParseError> {
        self.vars.clear();
        let goals = self.body()?;
        Ok(QueryBody {
            goals,
            vars: std::mem::take(&mut self.vars),
        })
    }

    // --- goals ---

    /// `conj ("|" conj)*`
    fn body(&mut self) -> Result<Vec<Goal>, ParseError> {
        let mut branches = vec![self.conjunction()?];
        while self.peek_is(&Token::Pipe) {
            self.advance();
            branches.push(self.conjunction()?);
        }
        if branches.len() == 1 {
            Ok(branches.remove(0))
        } else {
            Ok(vec![Goal::Or(branches)])
        }
    }

    /// `goal ("," goal)*`
    fn conjunction(&mut self) -> Result<Vec<Goal>, ParseError> {
        let mut goals = self.goal()?;
        while self.peek_is(&Token::Comma) {
            self.advance();
            goals.extend(self.goal()?);
        }
        Ok(goals)
    }

    /// One goal, preceded by whatever its terms hoisted.
    fn goal(&mut self) -> Result<Vec<Goal>, ParseError> {
        if self.peek_is(&Token::LParen) {
            self.advance();
            let goals = self.body()?;
            self.expect(Token::RParen)?;
            return Ok(goals);
        }
        if self.peek_ident("debug")
            && self.tokens.get(self.at + 1).map(|s| &s.token) == Some(&Token::LParen)
        {
            self.at += 2;
            let message = match self.peek() {
                Some(Token::Str(s)) => {
                    let s = s.clone();
                    self.advance();
                    s
                }
                _ => String::new(),
            };
            self.expect(Token::RParen)?;
            return Ok(vec![Goal::Debug(message)]);
        }

        let outer = std::mem::take(&mut self.pre);
        let goal = self.simple_goal();
        let mut goals = std::mem::replace(&mut self.pre, outer);
        goals.push(goal?);
        Ok(goals)
    }

    fn simple_goal(&mut self) -> Result<Goal, ParseError> {
        let left = self.term()?;
        let comparison = match self.peek() {
            Some(Token::Eq) => None,
            Some(Token::Neq) => Some(Comparison::Neq),
            Some(Token::Lt) => Some(Comparison::Lt),
            Some(Token::Leq) => Some(Comparison::Leq),
            Some(Token::Gt) => Some(Comparison::Gt),
            Some(Token::Geq) => Some(Comparison::Geq),
            Some(Token::Ident(word)) if word == "matches" => {
                self.advance();
                let class = self.ident()?;
                return Ok(Goal::Matches(left, class));
            }
            _ => {
                return Ok(match left.value {
                    Value::Call(call) => Goal::Call(call),
                    _ => Goal::Unify(left, Term::new(Value::Boolean(true))),
                })
            }
        };
        self.advance();
        let right = self.term()?;
        Ok(match comparison {
            None => Goal::Unify(left, right),
            Some(op) => Goal::Compare(op, left, right),
        })
    }

    // --- terms ---

    fn term(&mut self) -> Result<Term, ParseError> {
        let mut term = self.primary()?;
        while self.allow_lookups && self.peek_is(&Token::Dot) {
            let pos = self.expect(Token::Dot)?;
            let attribute = self.ident()?;
            let args = if self.peek_is(&Token::LParen) {
                self.advance();
                self.sequence(Token::RParen)?
            } else {
                Vec::new()
            };
            let result = self.temp("_value");
            self.pre.push(Goal::Lookup {
                target: term,
                attribute,
                args,
                result: result.clone(),
            });
            term = located(Value::Symbol(result), pos);
        }
        Ok(term)
    }

    fn primary(&mut self) -> Result<Term, ParseError> {
        let spanned = self.next()?;
        let pos = spanned.pos;
        let value = match spanned.token {
            Token::Integer(i) => Value::Integer(i),
            Token::Float(x) => Value::Float(x),
            Token::Str(s) => Value::String(s),
            Token::Minus => {
                let number = self.next()?;
                match number.token {
                    Token::Integer(i) => Value::Integer(-i),
                    Token::Float(x) => Value::Float(-x),
                    _ => return Err(Self::unexpected(&number)),
                }
            }
            Token::LBracket => Value::List(self.sequence(Token::RBracket)?),
            Token::LBrace => Value::Dictionary(self.fields()?),
            Token::Ident(name) => self.named(name, pos)?,
            other => return Err(Self::unexpected(&Spanned { token: other, pos })),
        };
        Ok(located(value, pos))
    }

    /// A term starting with an identifier.
    fn named(&mut self, name: String, pos: usize) -> Result<Value, ParseError> {
        if name == "true" || name == "false" {
            return Ok(Value::Boolean(name == "true"));
        }
        if name == "new" {
            if !self.allow_lookups {
                return Err(Self::unexpected(&Spanned { token: Token::Ident(name), pos }));
            }
            let tag = self.ident()?;
            self.expect(Token::LBrace)?;
            let fields = self.fields()?;
            let result = self.temp("_new");
            self.pre.push(Goal::Make {
                literal: InstanceLiteral { tag, fields },
                result: result.clone(),
            });
            return Ok(Value::Symbol(result));
        }
        if name == "_" {
            return Ok(Value::Symbol(self.temp("_")));
        }
        if self.peek_is(&Token::LParen) {
            self.advance();
            let args = self.sequence(Token::RParen)?;
            return Ok(Value::Call(Call { name, args }));
        }
        if self.peek_is(&Token::LBrace) && name.starts_with(char::is_uppercase) {
            self.advance();
            let fields = self.fields()?;
            return Ok(Value::InstanceLiteral(InstanceLiteral { tag: name, fields }));
        }
        if !self.vars.contains(&name) {
            self.vars.push(name.clone());
        }
        Ok(Value::Symbol(Symbol(name)))
    }

    /// Comma-separated terms up to and including `close`.
    fn sequence(&mut self, close: Token) -> Result<Vec<Term>, ParseError> {
        let mut items = Vec::new();
        if self.peek_is(&close) {
            self.advance();
            return Ok(items);
        }
        loop {
            items.push(self.term()?);
            let sep = self.next()?;
            if sep.token == Token::Comma {
                continue;
            }
            if sep.token == close {
                return Ok(items);
            }
            return Err(Self::unexpected(&sep));
        }
    }

    /// `key: term, ...}` after the opening brace.
    fn fields(&mut self) -> Result<Dictionary, ParseError> {
        let mut dict = Dictionary::default();
        if self.peek_is(&Token::RBrace) {
            self.advance();
            return Ok(dict);
        }
        loop {
            let key = self.next()?;
            let key = match key.token {
                Token::Ident(name) | Token::Str(name) => name,
                _ => return Err(Self::unexpected(&key)),
            };
            self.expect(Token::Colon)?;
            let value = self.term()?;
            dict.fields.insert(key, value);
            let sep = self.next()?;
            match sep.token {
                Token::Comma => continue,
                Token::RBrace => return Ok(dict),
                _ => return Err(Self::unexpected(&sep)),
            }
        }
    }
}

fn located(value: Value, pos: usize) -> Term {
    Term { id: 0, offset: pos, value }
}
