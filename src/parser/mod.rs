// パス: src/parser/mod.rs
// 役割: トークン列から AST を生成するプルパーサのエントリポイント
// 意図: 字句解析と構文解析の境界を整理し、マクロ名の途中登録を仲介する
// 関連ファイル: src/parser/directive.rs, src/parser/expr.rs, src/lexer.rs
//! 構文解析モジュール
//!
//! - 字句解析器から 1 トークンずつ引き出しながら再帰下降で AST を組み立てる。
//! - `#macro` のヘッダを読み終えた時点で名前を字句解析器へ登録し、以後の
//!   `#name` がマクロ呼び出しとして字句解析されるようにする。
//! - 式の優先順位は `or < and < not < 比較 < .. < 加減 < 乗除 < 単項マイナス`。

use crate::ast::Node;
use crate::errors::ParseError;
use crate::lexer::{Lexer, Token, TokenKind};

mod directive;
mod expr;

pub struct Parser {
    lex: Lexer,
    buf: Option<Token>,
}

impl Parser {
    /// ソースと既知のマクロ名（ライブラリ由来）からパーサを構築する。
    pub fn new(src: &str, macro_names: &[String]) -> Self {
        let mut lex = Lexer::new(src);
        for name in macro_names {
            lex.add_macro(name);
        }
        Self { lex, buf: None }
    }

    /// テンプレート全体を解析してノード列を返す。
    pub fn parse(mut self) -> Result<Vec<Node>, ParseError> {
        let items = self.parse_list(true)?;
        let t = self.peek()?.clone();
        if t.kind != TokenKind::EOF {
            return Err(self.unexpected(&t, "テンプレート末尾"));
        }
        Ok(items)
    }

    pub(super) fn peek(&mut self) -> Result<&Token, ParseError> {
        if self.buf.is_none() {
            self.buf = Some(self.lex.next()?);
        }
        Ok(self.buf.as_ref().expect("バッファは直前で充填済み"))
    }

    pub(super) fn next(&mut self) -> Result<Token, ParseError> {
        if let Some(t) = self.buf.take() {
            return Ok(t);
        }
        Ok(self.lex.next()?)
    }

    pub(super) fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        let t = self.next()?;
        if t.kind != kind {
            return Err(ParseError::new(
                "PAR001",
                format!("{:?} を期待しましたが {:?} ({:?})", kind, t.kind, t.literal),
                Some(t.line),
            ));
        }
        Ok(t)
    }

    pub(super) fn accept(&mut self, kind: TokenKind) -> Result<Option<Token>, ParseError> {
        if self.peek()?.kind == kind {
            return Ok(Some(self.next()?));
        }
        Ok(None)
    }

    /// マクロ名を字句解析器へ登録する。先読みバッファが空の状態で呼ぶこと。
    pub(super) fn register_macro(&mut self, name: &str) {
        debug_assert!(self.buf.is_none(), "マクロ登録は先読み前に行う");
        self.lex.add_macro(name);
    }

    pub(super) fn unexpected(&self, t: &Token, ctx: &str) -> ParseError {
        ParseError::new(
            "PAR002",
            format!("{} で予期しないトークン {:?} ({:?})", ctx, t.kind, t.literal),
            Some(t.line),
        )
    }
}

/// テンプレートソースを解析する。`macro_names` はライブラリ由来の既知マクロ。
pub fn parse_template(src: &str, macro_names: &[String]) -> Result<Vec<Node>, ParseError> {
    Parser::new(src, macro_names).parse()
}
