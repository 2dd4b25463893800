// パス: src/parser/directive.rs
// 役割: ディレクティブとテキストのノード列を解析する
// 意図: `#end` で閉じるブロック構造とテキスト断片の結合規則を一箇所で扱う
// 関連ファイル: src/parser/mod.rs, src/parser/expr.rs, src/ast.rs
//! ディレクティブ解析
//!
//! - `#if` は任意個の `#elseif` と高々 1 個の `#else` を許す。
//! - `#foreach` はゼロ回転時のみ描画される `#else` ブロックを持てる。
//! - `#macro` のヘッダ解析直後に名前を登録し、本体中の再帰呼び出しを可能にする。
//! - 隣接するテキストトークンは 1 つの `Text` ノードへ結合する。

use crate::ast::{
    EvalNode, ForeachNode, IfNode, IncludeNode, MacroCallNode, MacroNode, Node, OpNode, ParseNode,
    Pos, SetNode,
};
use crate::errors::ParseError;
use crate::lexer::TokenKind;
use crate::parser::Parser;

impl Parser {
    /// ノード列を解析する。`top` が偽なら `#end`/`#else`/`#elseif` の手前で戻る。
    pub(super) fn parse_list(&mut self, top: bool) -> Result<Vec<Node>, ParseError> {
        let mut items: Vec<Node> = Vec::new();
        loop {
            let t = self.peek()?.clone();
            match t.kind {
                TokenKind::EOF => return Ok(items),
                TokenKind::END | TokenKind::ELSE | TokenKind::ELSEIF => {
                    if top {
                        return Err(self.unexpected(&t, "トップレベル"));
                    }
                    return Ok(items);
                }
                TokenKind::TEXT => {
                    self.next()?;
                    push_text(&mut items, &t.literal);
                }
                TokenKind::DOLLAR => {
                    self.next()?;
                    let var = self.parse_reference(t.line)?;
                    items.push(Node::Var(var));
                }
                TokenKind::SET => {
                    self.next()?;
                    items.push(self.parse_set(t.line)?);
                }
                TokenKind::IF => {
                    self.next()?;
                    let node = self.parse_if(t.line)?;
                    items.push(Node::If(node));
                }
                TokenKind::FOREACH => {
                    self.next()?;
                    items.push(self.parse_foreach(t.line)?);
                }
                TokenKind::MACRO => {
                    self.next()?;
                    items.push(self.parse_macro(t.line)?);
                }
                TokenKind::MACROCALL => {
                    self.next()?;
                    items.push(self.parse_macro_call(t.literal, t.line)?);
                }
                TokenKind::INCLUDE => {
                    self.next()?;
                    items.push(self.parse_include(t.line)?);
                }
                TokenKind::PARSE => {
                    self.next()?;
                    self.expect(TokenKind::LPAREN)?;
                    let name = self.parse_expr()?;
                    self.expect(TokenKind::RPAREN)?;
                    items.push(Node::Parse(ParseNode {
                        name,
                        pos: Pos::new(t.line),
                    }));
                }
                TokenKind::EVALUATE => {
                    self.next()?;
                    self.expect(TokenKind::LPAREN)?;
                    let content = self.parse_expr()?;
                    self.expect(TokenKind::RPAREN)?;
                    items.push(Node::Evaluate(EvalNode {
                        content,
                        pos: Pos::new(t.line),
                    }));
                }
                TokenKind::STOP => {
                    self.next()?;
                    items.push(Node::Stop(Pos::new(t.line)));
                }
                TokenKind::BREAK => {
                    self.next()?;
                    items.push(Node::Break(Pos::new(t.line)));
                }
                _ => return Err(self.unexpected(&t, "ノード列")),
            }
        }
    }

    /// `#set( $lhs = expr )` を解析する。
    fn parse_set(&mut self, line: usize) -> Result<Node, ParseError> {
        self.expect(TokenKind::LPAREN)?;
        let dollar = self.expect(TokenKind::DOLLAR)?;
        let var = self.parse_reference(dollar.line)?;
        self.expect(TokenKind::EQUAL)?;
        let expr = self.parse_expr()?;
        self.expect(TokenKind::RPAREN)?;
        Ok(Node::Set(SetNode {
            var,
            expr,
            pos: Pos::new(line),
        }))
    }

    /// `#if`/`#elseif` の条件節と本体、後続の else 連鎖を解析する。
    fn parse_if(&mut self, line: usize) -> Result<IfNode, ParseError> {
        self.expect(TokenKind::LPAREN)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RPAREN)?;
        let items = self.parse_list(false)?;
        let t = self.peek()?.clone();
        let els = match t.kind {
            TokenKind::ELSEIF => {
                self.next()?;
                Some(Box::new(self.parse_if(t.line)?))
            }
            TokenKind::ELSE => {
                self.next()?;
                let else_items = self.parse_list(false)?;
                self.expect(TokenKind::END)?;
                Some(Box::new(IfNode {
                    cond: None,
                    items: else_items,
                    els: None,
                    pos: Pos::new(t.line),
                }))
            }
            TokenKind::END => {
                self.next()?;
                None
            }
            _ => return Err(self.unexpected(&t, "#if ブロック")),
        };
        Ok(IfNode {
            cond: Some(cond),
            items,
            els,
            pos: Pos::new(line),
        })
    }

    /// `#foreach( $var in expr ) ... [#else ...] #end` を解析する。
    fn parse_foreach(&mut self, line: usize) -> Result<Node, ParseError> {
        self.expect(TokenKind::LPAREN)?;
        self.expect(TokenKind::DOLLAR)?;
        let name = self.expect(TokenKind::IDENTIFIER)?;
        self.expect(TokenKind::IN)?;
        let iter = self.parse_expr()?;
        self.expect(TokenKind::RPAREN)?;
        let items = self.parse_list(false)?;
        let t = self.next()?;
        let els = match t.kind {
            TokenKind::ELSE => {
                let else_items = self.parse_list(false)?;
                self.expect(TokenKind::END)?;
                Some(else_items)
            }
            TokenKind::END => None,
            _ => return Err(self.unexpected(&t, "#foreach ブロック")),
        };
        Ok(Node::Foreach(ForeachNode {
            var: name.literal,
            iter,
            items,
            els,
            pos: Pos::new(line),
        }))
    }

    /// `#macro( name $p... ) ... #end` を解析し、名前を字句解析器へ登録する。
    fn parse_macro(&mut self, line: usize) -> Result<Node, ParseError> {
        self.expect(TokenKind::LPAREN)?;
        let name = self.expect(TokenKind::IDENTIFIER)?;
        let mut params = Vec::new();
        loop {
            let t = self.next()?;
            match t.kind {
                TokenKind::RPAREN => break,
                TokenKind::COMMA => continue,
                TokenKind::DOLLAR => {
                    let p = self.expect(TokenKind::IDENTIFIER)?;
                    params.push(p.literal);
                }
                _ => return Err(self.unexpected(&t, "#macro 仮引数")),
            }
        }
        // 本体を読む前に登録しないと再帰呼び出しがテキスト扱いになる
        self.register_macro(&name.literal);
        let items = self.parse_list(false)?;
        self.expect(TokenKind::END)?;
        Ok(Node::MacroDef(MacroNode {
            name: name.literal,
            params,
            items,
            pos: Pos::new(line),
        }))
    }

    /// `#name( arg, ... )` 形式のマクロ呼び出しを解析する。
    fn parse_macro_call(&mut self, name: String, line: usize) -> Result<Node, ParseError> {
        self.expect(TokenKind::LPAREN)?;
        let vals = self.parse_arg_list()?;
        Ok(Node::MacroCall(MacroCallNode {
            name,
            vals,
            pos: Pos::new(line),
        }))
    }

    /// `#include( name, ... )` を解析する。
    fn parse_include(&mut self, line: usize) -> Result<Node, ParseError> {
        self.expect(TokenKind::LPAREN)?;
        let names = self.parse_arg_list()?;
        if names.is_empty() {
            return Err(ParseError::new(
                "PAR003",
                "#include には 1 つ以上の名前が必要です",
                Some(line),
            ));
        }
        Ok(Node::Include(IncludeNode {
            names,
            pos: Pos::new(line),
        }))
    }

    /// `)` まで式を読み集める。区切りのカンマは任意。
    fn parse_arg_list(&mut self) -> Result<Vec<OpNode>, ParseError> {
        let mut args = Vec::new();
        loop {
            if self.accept(TokenKind::RPAREN)?.is_some() {
                return Ok(args);
            }
            if !args.is_empty() {
                // カンマは読み飛ばすだけで必須にしない（VTL はスペース区切りも許す）
                let _ = self.accept(TokenKind::COMMA)?;
                if self.accept(TokenKind::RPAREN)?.is_some() {
                    return Ok(args);
                }
            }
            args.push(self.parse_expr()?);
        }
    }
}

/// 直前がテキストノードなら結合し、そうでなければ新規ノードとして追加する。
fn push_text(items: &mut Vec<Node>, text: &str) {
    if let Some(Node::Text(prev)) = items.last_mut() {
        prev.push_str(text);
        return;
    }
    items.push(Node::Text(text.to_string()));
}
