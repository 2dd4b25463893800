// パス: src/parser/expr.rs
// 役割: 式と参照チェーンの再帰下降解析を提供する
// 意図: 演算子の優先順位・結合規則と参照構文を手続き的に実装する
// 関連ファイル: src/parser/mod.rs, src/parser/directive.rs, src/ast.rs
//! 式解析
//!
//! - 優先順位（低→高）: `or` < `and` < `not` < 比較 < `..` < 加減 < 乗除 <
//!   単項マイナス < プロパティ/メソッド/添字。
//! - `not` と `-` は被演算子の先頭（単項位置）でも受理する。
//! - リスト `[a, b]`・範囲 `[lo..hi]`・マップ `{k:v}` は一次式。

use crate::ast::{AccessKind, AccessNode, Node, OpNode, OpVal, Pos, VarNode};
use crate::errors::ParseError;
use crate::lexer::TokenKind;
use crate::parser::Parser;

impl Parser {
    pub(super) fn parse_expr(&mut self) -> Result<OpNode, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<OpNode, ParseError> {
        let mut left = self.parse_and()?;
        while let Some(t) = self.accept(TokenKind::OR)? {
            let right = self.parse_and()?;
            left = OpNode::binary("or", left, right, Pos::new(t.line));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<OpNode, ParseError> {
        let mut left = self.parse_not()?;
        while let Some(t) = self.accept(TokenKind::AND)? {
            let right = self.parse_not()?;
            left = OpNode::binary("and", left, right, Pos::new(t.line));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<OpNode, ParseError> {
        if let Some(t) = self.accept(TokenKind::NOT)? {
            let operand = self.parse_not()?;
            return Ok(OpNode::unary("not", operand, Pos::new(t.line)));
        }
        self.parse_cmp()
    }

    fn parse_cmp(&mut self) -> Result<OpNode, ParseError> {
        let mut left = self.parse_range()?;
        while self.peek()?.kind == TokenKind::CMP {
            let t = self.next()?;
            let op = cmp_op(&t.literal);
            let right = self.parse_range()?;
            left = OpNode::binary(op, left, right, Pos::new(t.line));
        }
        Ok(left)
    }

    fn parse_range(&mut self) -> Result<OpNode, ParseError> {
        let left = self.parse_add()?;
        if let Some(t) = self.accept(TokenKind::RANGE)? {
            // `..` の右側では `!x` のような単項式も受理する
            let right = if self.peek()?.kind == TokenKind::NOT {
                let not = self.next()?;
                let operand = self.parse_unary()?;
                OpNode::unary("not", operand, Pos::new(not.line))
            } else {
                self.parse_add()?
            };
            return Ok(OpNode::binary("range", left, right, Pos::new(t.line)));
        }
        Ok(left)
    }

    fn parse_add(&mut self) -> Result<OpNode, ParseError> {
        let mut left = self.parse_mul()?;
        loop {
            let op = match self.peek()?.kind {
                TokenKind::PLUS => "+",
                TokenKind::MINUS => "-",
                _ => return Ok(left),
            };
            let t = self.next()?;
            let right = self.parse_mul()?;
            left = OpNode::binary(op, left, right, Pos::new(t.line));
        }
    }

    fn parse_mul(&mut self) -> Result<OpNode, ParseError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek()?.kind {
                TokenKind::STAR => "*",
                TokenKind::SLASH => "/",
                TokenKind::PERCENT => "%",
                _ => return Ok(left),
            };
            let t = self.next()?;
            let right = self.parse_unary()?;
            left = OpNode::binary(op, left, right, Pos::new(t.line));
        }
    }

    fn parse_unary(&mut self) -> Result<OpNode, ParseError> {
        if let Some(t) = self.accept(TokenKind::MINUS)? {
            let operand = self.parse_unary()?;
            return Ok(OpNode::unary("negate", operand, Pos::new(t.line)));
        }
        if let Some(t) = self.accept(TokenKind::NOT)? {
            let operand = self.parse_unary()?;
            return Ok(OpNode::unary("not", operand, Pos::new(t.line)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<OpNode, ParseError> {
        let t = self.next()?;
        let pos = Pos::new(t.line);
        match t.kind {
            TokenKind::INT => {
                let v: i64 = t.literal.parse().map_err(|_| {
                    ParseError::new(
                        "PAR010",
                        format!("整数リテラルを解釈できません: {:?}", t.literal),
                        Some(t.line),
                    )
                })?;
                Ok(OpNode::leaf(OpVal::Int(v), pos))
            }
            TokenKind::FLOAT => {
                // `1.e2` のような表記を f64 が読める形へ整える
                let lit = t.literal.replace(".e", "e");
                let v: f64 = lit.parse().map_err(|_| {
                    ParseError::new(
                        "PAR011",
                        format!("小数リテラルを解釈できません: {:?}", t.literal),
                        Some(t.line),
                    )
                })?;
                Ok(OpNode::leaf(OpVal::Float(v), pos))
            }
            TokenKind::BOOLEAN => Ok(OpNode::leaf(OpVal::Bool(t.literal == "true"), pos)),
            TokenKind::STRING => Ok(OpNode::leaf(OpVal::Str(t.literal), pos)),
            TokenKind::DQUOTE => {
                let items = self.parse_interpolated()?;
                Ok(OpNode::leaf(OpVal::Interp(items), pos))
            }
            TokenKind::DOLLAR => {
                let var = self.parse_reference(t.line)?;
                Ok(OpNode::leaf(OpVal::Var(var), pos))
            }
            TokenKind::LPAREN => {
                let e = self.parse_expr()?;
                self.expect(TokenKind::RPAREN)?;
                Ok(e)
            }
            TokenKind::LBRACK => self.parse_list_or_range(pos),
            TokenKind::LBRACE => self.parse_map_literal(pos),
            _ => Err(self.unexpected(&t, "式")),
        }
    }

    /// `[` の後を読み、リストリテラルまたは範囲リテラルを区別する。
    /// `[lo..hi]` は式レベルで範囲ノードとして読み終わるため、単独なら
    /// そのまま返し、カンマが続けばリスト要素に降格する。
    fn parse_list_or_range(&mut self, pos: Pos) -> Result<OpNode, ParseError> {
        if self.accept(TokenKind::RBRACK)?.is_some() {
            return Ok(OpNode {
                op: "list",
                val: None,
                left: Some(Box::new(OpNode::leaf(OpVal::Args(Vec::new()), pos))),
                right: None,
                pos,
            });
        }
        let first = self.parse_expr()?;
        if first.op == "range" && self.peek()?.kind == TokenKind::RBRACK {
            self.next()?;
            return Ok(first);
        }
        let mut items = vec![first];
        while self.accept(TokenKind::COMMA)?.is_some() {
            items.push(self.parse_expr()?);
        }
        self.expect(TokenKind::RBRACK)?;
        Ok(OpNode {
            op: "list",
            val: None,
            left: Some(Box::new(OpNode::leaf(OpVal::Args(items), pos))),
            right: None,
            pos,
        })
    }

    /// `{k : v, ...}` のマップリテラルを解析する。キーと値は平坦に並べる。
    fn parse_map_literal(&mut self, pos: Pos) -> Result<OpNode, ParseError> {
        let mut items = Vec::new();
        if self.accept(TokenKind::RBRACE)?.is_none() {
            loop {
                let key = self.parse_expr()?;
                self.expect(TokenKind::COLON)?;
                let val = self.parse_expr()?;
                items.push(key);
                items.push(val);
                if self.accept(TokenKind::COMMA)?.is_some() {
                    continue;
                }
                self.expect(TokenKind::RBRACE)?;
                break;
            }
        }
        Ok(OpNode {
            op: "map",
            val: None,
            left: Some(Box::new(OpNode::leaf(OpVal::Args(items), pos))),
            right: None,
            pos,
        })
    }

    /// `$` の直後から参照を解析する。`$!name`・`${name}`・チェーンに対応。
    pub(super) fn parse_reference(&mut self, line: usize) -> Result<VarNode, ParseError> {
        let silent = self.accept(TokenKind::BANG)?.is_some();
        let formal = self.accept(TokenKind::LBRACE)?.is_some();
        let name = self.expect(TokenKind::IDENTIFIER)?;
        let mut items = Vec::new();
        loop {
            match self.peek()?.kind {
                TokenKind::DOT => {
                    self.next()?;
                    let step = self.next()?;
                    match step.kind {
                        TokenKind::IDENTIFIER => items.push(AccessNode {
                            name: step.literal,
                            args: Vec::new(),
                            kind: AccessKind::Property,
                            pos: Pos::new(step.line),
                        }),
                        TokenKind::METHOD => {
                            self.expect(TokenKind::LPAREN)?;
                            let args = self.parse_arg_list_paren()?;
                            items.push(AccessNode {
                                name: step.literal,
                                args,
                                kind: AccessKind::Method,
                                pos: Pos::new(step.line),
                            });
                        }
                        _ => return Err(self.unexpected(&step, "参照チェーン")),
                    }
                }
                TokenKind::LBRACK => {
                    let t = self.next()?;
                    let idx = self.parse_expr()?;
                    self.expect(TokenKind::RBRACK)?;
                    items.push(AccessNode {
                        name: String::new(),
                        args: vec![idx],
                        kind: AccessKind::Index,
                        pos: Pos::new(t.line),
                    });
                }
                _ => break,
            }
        }
        if formal {
            self.expect(TokenKind::RBRACE)?;
        }
        Ok(VarNode {
            name: name.literal,
            items,
            silent,
            pos: Pos::new(line),
        })
    }

    /// メソッド引数を `)` まで読む。
    fn parse_arg_list_paren(&mut self) -> Result<Vec<OpNode>, ParseError> {
        let mut args = Vec::new();
        if self.accept(TokenKind::RPAREN)?.is_some() {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            if self.accept(TokenKind::COMMA)?.is_some() {
                continue;
            }
            self.expect(TokenKind::RPAREN)?;
            return Ok(args);
        }
    }

    /// 補間つき文字列の内部を閉じクォートまで解析する。
    fn parse_interpolated(&mut self) -> Result<Vec<Node>, ParseError> {
        let mut items = Vec::new();
        loop {
            let t = self.next()?;
            match t.kind {
                TokenKind::DQUOTE => return Ok(items),
                TokenKind::TEXT => {
                    if let Some(Node::Text(prev)) = items.last_mut() {
                        prev.push_str(&t.literal);
                    } else {
                        items.push(Node::Text(t.literal));
                    }
                }
                TokenKind::DOLLAR => {
                    let var = self.parse_reference(t.line)?;
                    items.push(Node::Var(var));
                }
                TokenKind::EOF => {
                    return Err(ParseError::new(
                        "PAR012",
                        "補間文字列が閉じていません",
                        Some(t.line),
                    ))
                }
                _ => return Err(self.unexpected(&t, "補間文字列")),
            }
        }
    }
}

/// 比較トークンの正規名を演算子テーブルのキーへ対応付ける。
fn cmp_op(literal: &str) -> &'static str {
    match literal {
        "eq" => "eq",
        "ne" => "ne",
        "lt" => "lt",
        "le" => "le",
        "gt" => "gt",
        _ => "ge",
    }
}
