// パス: src/lexer.rs
// 役割: 状態スタック式のバイト駆動トークナイザを提供する
// 意図: テキスト・参照・ディレクティブ・式が交錯する VTL を文脈に応じて字句解析する
// 関連ファイル: src/parser/mod.rs, src/errors.rs, tests/lexer_tokens.rs
//! 字句解析モジュール
//!
//! - 現在のモード（テキスト / ディレクティブ / 参照 / 変数末尾 / 文字列 /
//!   フォーマル / 式）を明示的な `Vec<Mode>` スタックで管理する。
//! - トークンは構文解析器から 1 個ずつ引き出される。マクロ名は解析中に
//!   `add_macro` で登録され、以後 `#name` がマクロ呼び出しとして字句解析される。
//! - テキスト中の `\$` / `\#` エスケープは字句解析時に解決する
//!   （偶数個のバックスラッシュは半減、奇数個は次の記号を文字として取り込む）。

use std::collections::HashSet;

use crate::errors::LexerError;

#[derive(Debug, Clone, PartialEq, Eq)]
/// 生成されたトークンとその位置情報を保持するレコード。
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// 字句解析で識別されるトークンの分類。
pub enum TokenKind {
    EOF,
    // テキストとリテラル
    TEXT,
    STRING, // シングルクォート文字列（補間なし）
    INT,
    FLOAT,
    BOOLEAN,
    // 識別子分類
    IDENTIFIER,
    METHOD, // 直後に `(` が続く識別子
    // ディレクティブ
    SET,
    IF,
    ELSEIF,
    ELSE,
    END,
    FOREACH,
    INCLUDE,
    PARSE,
    STOP,
    BREAK,
    EVALUATE,
    MACRO,
    MACROCALL,
    // 演算子
    IN,
    RANGE, // `..`
    CMP,   // literal に正規名（eq/ne/lt/le/gt/ge）を持つ
    OR,
    AND,
    NOT,
    // 記号トークン
    LPAREN,
    RPAREN,
    LBRACK,
    RBRACK,
    LBRACE,
    RBRACE,
    DOT,
    COMMA,
    COLON,
    EQUAL,
    PLUS,
    MINUS,
    STAR,
    SLASH,
    PERCENT,
    DOLLAR,
    BANG,
    DQUOTE,
    // 分類不能な 1 バイト
    OTHER,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// 字句解析モード。スタックの先頭が現在の文脈を決める。
enum Mode {
    Text,
    Directive,
    Reference,
    VarTail,
    Quoted,
    Formal,
    Expression,
}

/// ディレクティブ名からトークン種別を引く。
fn directive_kind(name: &str) -> Option<TokenKind> {
    Some(match name {
        "set" => TokenKind::SET,
        "if" => TokenKind::IF,
        "elseif" => TokenKind::ELSEIF,
        "else" => TokenKind::ELSE,
        "end" => TokenKind::END,
        "foreach" => TokenKind::FOREACH,
        "include" => TokenKind::INCLUDE,
        "parse" => TokenKind::PARSE,
        "stop" => TokenKind::STOP,
        "break" => TokenKind::BREAK,
        "evaluate" => TokenKind::EVALUATE,
        "macro" => TokenKind::MACRO,
        _ => return None,
    })
}

/// 記号 1 バイトをトークン種別へ対応付ける。
fn punct_kind(b: u8) -> TokenKind {
    match b {
        b'(' => TokenKind::LPAREN,
        b')' => TokenKind::RPAREN,
        b'[' => TokenKind::LBRACK,
        b']' => TokenKind::RBRACK,
        b'{' => TokenKind::LBRACE,
        b'}' => TokenKind::RBRACE,
        b'.' => TokenKind::DOT,
        b',' => TokenKind::COMMA,
        b':' => TokenKind::COLON,
        b'=' => TokenKind::EQUAL,
        b'+' => TokenKind::PLUS,
        b'-' => TokenKind::MINUS,
        b'*' => TokenKind::STAR,
        b'/' => TokenKind::SLASH,
        b'%' => TokenKind::PERCENT,
        b'$' => TokenKind::DOLLAR,
        b'!' => TokenKind::BANG,
        b'"' => TokenKind::DQUOTE,
        _ => TokenKind::OTHER,
    }
}

fn is_num(b: u8) -> bool {
    b.is_ascii_digit()
}

fn is_ident(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphabetic()
}

pub struct Lexer {
    data: Vec<u8>,
    pos: usize,
    mark: usize, // 行番号カウントが済んでいる位置
    line: usize,
    states: Vec<Mode>,
    macros: HashSet<String>,
}

impl Lexer {
    pub fn new(src: &str) -> Self {
        Self {
            data: src.as_bytes().to_vec(),
            pos: 0,
            mark: 0,
            line: 1,
            states: Vec::new(),
            macros: HashSet::new(),
        }
    }

    /// マクロ名を登録し、以後の `#name` をマクロ呼び出しとして認識させる。
    pub fn add_macro(&mut self, name: &str) {
        self.macros.insert(name.to_string());
    }

    pub fn has_macro(&self, name: &str) -> bool {
        self.macros.contains(name)
    }

    /// 次のトークンを返す。入力終端では `EOF` トークンを返し続ける。
    pub fn next(&mut self) -> Result<Token, LexerError> {
        loop {
            self.sync_line();
            if self.pos >= self.data.len() {
                return Ok(self.token(TokenKind::EOF, String::new(), self.line));
            }
            match self.state() {
                Mode::Text => {
                    if let Some(t) = self.lex_text()? {
                        return Ok(t);
                    }
                }
                Mode::Directive => match self.peek(0) {
                    Some(b'(') => {
                        self.push(Mode::Expression);
                        return Ok(self.punct());
                    }
                    _ => {
                        self.pop();
                    }
                },
                Mode::Formal => {
                    if self.peek(0) == Some(b'}') {
                        self.pop();
                    }
                    return Ok(self.punct());
                }
                Mode::Reference => match self.peek(0) {
                    Some(b'$') | Some(b'!') | Some(b'{') => return Ok(self.punct()),
                    Some(c) if is_ident(c) => self.push(Mode::VarTail),
                    _ => {
                        self.pop();
                    }
                },
                Mode::VarTail => {
                    if let Some(t) = self.lex_var_tail() {
                        return Ok(t);
                    }
                }
                Mode::Expression => {
                    if let Some(t) = self.lex_expression()? {
                        return Ok(t);
                    }
                }
                Mode::Quoted => {
                    if let Some(t) = self.lex_quoted() {
                        return Ok(t);
                    }
                }
            }
        }
    }

    /// テキストモードの 1 ステップ。トークンが確定しなければ `None`。
    fn lex_text(&mut self) -> Result<Option<Token>, LexerError> {
        let line = self.line;
        let start = self.pos;
        let text = self.scan_text(b"#$");
        let mut had_comment = false;
        if self.peek(0) == Some(b'#') && self.peek(1) == Some(b'#') {
            // 行コメントは改行ごと読み飛ばす
            self.scan_comment(b"\n");
            self.skip(1);
            had_comment = true;
        }
        if self.pos > start && (!text.is_empty() || had_comment) {
            return Ok(Some(self.token(TokenKind::TEXT, text, line)));
        }
        match self.peek(0) {
            Some(b'$') => {
                let p = self.peek(1);
                match p {
                    Some(c) if c == b'!' || c == b'{' || is_ident(c) => {
                        if c == b'{' || (c == b'!' && self.peek(2) == Some(b'{')) {
                            self.push(Mode::Formal);
                        }
                        self.push(Mode::Reference);
                        Ok(None)
                    }
                    _ => {
                        // 参照が始まらない `$` はそのままテキスト
                        let b = self.scan_byte();
                        Ok(Some(self.token(
                            TokenKind::TEXT,
                            (b as char).to_string(),
                            line,
                        )))
                    }
                }
            }
            Some(b'#') => self.lex_hash(line),
            _ => Ok(None),
        }
    }

    /// `#` で始まる構造（コメント・ディレクティブ・マクロ呼び出し）を処理する。
    fn lex_hash(&mut self, line: usize) -> Result<Option<Token>, LexerError> {
        match self.peek(1) {
            Some(b'*') => {
                // ブロックコメント。閉じ `*#` ごと読み飛ばす
                self.scan_comment(b"*#");
                self.skip(2);
                return Ok(None);
            }
            Some(b'{') => {
                self.skip(2);
                let d = self.scan_identifier();
                if let Some(kind) = directive_kind(&d) {
                    if self.peek(0) == Some(b'}') {
                        self.skip(1);
                        if kind != TokenKind::END && kind != TokenKind::ELSE {
                            self.skip_whitespace();
                            self.push(Mode::Directive);
                        }
                        return Ok(Some(self.token(kind, d, line)));
                    }
                }
                if self.macros.contains(&d) && self.peek(0) == Some(b'}') {
                    self.skip(1);
                    self.skip_whitespace();
                    self.push(Mode::Directive);
                    return Ok(Some(self.token(TokenKind::MACROCALL, d, line)));
                }
                // 閉じ `}` は消費していないので付けずに返す
                return Ok(Some(self.token(TokenKind::TEXT, format!("#{{{}", d), line)));
            }
            _ => {}
        }
        self.skip(1);
        let d = self.scan_identifier();
        if let Some(kind) = directive_kind(&d) {
            if kind != TokenKind::END && kind != TokenKind::ELSE {
                self.skip_whitespace();
                self.push(Mode::Directive);
            }
            return Ok(Some(self.token(kind, d, line)));
        }
        if self.macros.contains(&d) {
            self.skip_whitespace();
            self.push(Mode::Directive);
            return Ok(Some(self.token(TokenKind::MACROCALL, d, line)));
        }
        // ディレクティブでもマクロでもなければ文字通りのテキスト
        Ok(Some(self.token(TokenKind::TEXT, format!("#{}", d), line)))
    }

    /// 参照の末尾（識別子・メソッド・添字）を読む。
    fn lex_var_tail(&mut self) -> Option<Token> {
        match self.peek(0) {
            Some(b'[') | Some(b'(') => {
                self.push(Mode::Expression);
                Some(self.punct())
            }
            Some(b'.') => {
                match self.peek(1) {
                    Some(c) if is_ident(c) => Some(self.punct()),
                    _ => {
                        // `.` の先が識別子でなければ参照はここまで
                        self.pop();
                        None
                    }
                }
            }
            _ => {
                let line = self.line;
                let ident = self.scan_identifier();
                if !ident.is_empty() {
                    let kind = if self.peek(0) == Some(b'(') {
                        TokenKind::METHOD
                    } else {
                        TokenKind::IDENTIFIER
                    };
                    return Some(self.token(kind, ident, line));
                }
                self.pop();
                if self.state() == Mode::Reference {
                    self.pop();
                }
                None
            }
        }
    }

    /// 式モードの 1 ステップ。
    fn lex_expression(&mut self) -> Result<Option<Token>, LexerError> {
        self.skip_whitespace();
        self.sync_line();
        let line = self.line;
        let Some(p) = self.peek(0) else {
            return Ok(None);
        };
        match p {
            b'(' | b'[' => {
                self.push(Mode::Expression);
                Ok(Some(self.punct()))
            }
            b')' | b']' => {
                self.pop();
                Ok(Some(self.punct()))
            }
            b'\'' => {
                self.skip(1);
                let s = self.scan_until(b'\'');
                if self.pos >= self.data.len() {
                    return Err(LexerError::at(
                        "LEX001",
                        "文字列リテラルが閉じていません",
                        Some(self.pos),
                        Some(line),
                    ));
                }
                self.skip(1);
                Ok(Some(self.token(TokenKind::STRING, s, line)))
            }
            b'"' => {
                self.push(Mode::Quoted);
                Ok(Some(self.punct()))
            }
            b'$' => {
                self.push(Mode::VarTail);
                Ok(Some(self.punct()))
            }
            b'.' | b'=' | b'!' | b'<' | b'>' | b'|' | b'&' => {
                if let Some(t) = self.scan_op(line) {
                    return Ok(Some(t));
                }
                Ok(Some(self.punct()))
            }
            c if is_ident(c) => Ok(Some(self.lex_word(line))),
            c if is_num(c) => Ok(Some(self.lex_number(line))),
            _ => Ok(Some(self.punct())),
        }
    }

    /// 式モードの識別子・語演算子・真偽値リテラル。
    fn lex_word(&mut self, line: usize) -> Token {
        let start = self.pos;
        let ident = self.scan_identifier();
        let lower = ident.to_ascii_lowercase();
        let prev = if start > 0 { self.data.get(start - 1).copied() } else { None };
        let prev_ws = matches!(prev, Some(b' ') | Some(b'\t') | Some(b'\n'));
        match lower.as_str() {
            "eq" | "ne" | "lt" | "le" | "gt" | "ge" if prev_ws => {
                return self.token(TokenKind::CMP, lower, line)
            }
            "and" if prev_ws => return self.token(TokenKind::AND, lower, line),
            "or" if prev_ws => return self.token(TokenKind::OR, lower, line),
            "not" if prev_ws => return self.token(TokenKind::NOT, lower, line),
            "in" if prev_ws => return self.token(TokenKind::IN, lower, line),
            "true" | "false" => {
                if !matches!(prev, Some(b'.') | Some(b'$')) {
                    return self.token(TokenKind::BOOLEAN, lower, line);
                }
            }
            _ => {}
        }
        self.token(TokenKind::IDENTIFIER, ident, line)
    }

    /// 整数・小数・指数表記を読む。
    fn lex_number(&mut self, line: usize) -> Token {
        let start = self.pos;
        self.scan_int();
        let mut float = false;
        // `..` は範囲演算子なので小数点と区別する
        if self.peek(0) == Some(b'.') && self.peek(1) != Some(b'.') {
            float = true;
            self.skip(1);
            self.scan_int();
        }
        if self.peek(0) == Some(b'e') {
            float = true;
            self.skip(1);
            if matches!(self.peek(0), Some(b'+') | Some(b'-')) {
                self.skip(1);
            }
            self.scan_int();
        }
        let literal = self.slice(start, self.pos);
        let kind = if float {
            TokenKind::FLOAT
        } else {
            TokenKind::INT
        };
        self.token(kind, literal, line)
    }

    /// 補間つき文字列の内側。
    fn lex_quoted(&mut self) -> Option<Token> {
        let line = self.line;
        let start = self.pos;
        let text = self.scan_text(b"$\"");
        if self.pos > start {
            return Some(self.token(TokenKind::TEXT, text, line));
        }
        match self.peek(0) {
            Some(b'"') => {
                self.pop();
                Some(self.punct())
            }
            Some(b'$') => {
                let p = self.peek(1);
                match p {
                    Some(c) if c == b'!' || c == b'{' || is_ident(c) => {
                        if c == b'{' || (c == b'!' && self.peek(2) == Some(b'{')) {
                            self.push(Mode::Formal);
                        }
                        self.push(Mode::Reference);
                        None
                    }
                    _ => {
                        let b = self.scan_byte();
                        Some(self.token(TokenKind::TEXT, (b as char).to_string(), line))
                    }
                }
            }
            _ => None,
        }
    }

    /// 2 文字→1 文字の順で記号演算子を読む。
    fn scan_op(&mut self, line: usize) -> Option<Token> {
        const TWO: [(&[u8], TokenKind, &str); 7] = [
            (b"..", TokenKind::RANGE, ".."),
            (b"==", TokenKind::CMP, "eq"),
            (b"!=", TokenKind::CMP, "ne"),
            (b"<=", TokenKind::CMP, "le"),
            (b">=", TokenKind::CMP, "ge"),
            (b"&&", TokenKind::AND, "and"),
            (b"||", TokenKind::OR, "or"),
        ];
        let rest = &self.data[self.pos..];
        let (kind, canon, width) = if let Some((_, kind, canon)) =
            TWO.iter().find(|(pat, _, _)| rest.starts_with(pat))
        {
            (*kind, *canon, 2)
        } else {
            match self.peek(0) {
                Some(b'<') => (TokenKind::CMP, "lt", 1),
                Some(b'>') => (TokenKind::CMP, "gt", 1),
                Some(b'!') => (TokenKind::NOT, "not", 1),
                _ => return None,
            }
        };
        self.skip(width);
        Some(self.token(kind, canon.to_string(), line))
    }

    fn state(&self) -> Mode {
        self.states.last().copied().unwrap_or(Mode::Text)
    }

    fn push(&mut self, m: Mode) {
        self.states.push(m);
    }

    fn pop(&mut self) {
        self.states.pop();
    }

    fn peek(&self, n: usize) -> Option<u8> {
        self.data.get(self.pos + n).copied()
    }

    fn skip(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.data.len());
    }

    fn scan_byte(&mut self) -> u8 {
        let b = self.data[self.pos];
        self.pos += 1;
        b
    }

    /// 現在位置の 1 バイトを記号トークンとして切り出す。
    fn punct(&mut self) -> Token {
        let line = self.line;
        let b = self.scan_byte();
        Token {
            kind: punct_kind(b),
            literal: (b as char).to_string(),
            line,
        }
    }

    fn token(&self, kind: TokenKind, literal: impl Into<String>, line: usize) -> Token {
        Token {
            kind,
            literal: literal.into(),
            line,
        }
    }

    fn slice(&self, start: usize, end: usize) -> String {
        String::from_utf8_lossy(&self.data[start..end]).into_owned()
    }

    /// 未カウント区間の改行を行番号へ反映する。
    fn sync_line(&mut self) {
        if self.pos > self.mark {
            self.line += self.data[self.mark..self.pos]
                .iter()
                .filter(|&&b| b == b'\n')
                .count();
            self.mark = self.pos;
        }
    }

    fn scan_identifier(&mut self) -> String {
        let start = self.pos;
        let mut i = self.pos;
        while i < self.data.len() {
            let b = self.data[i];
            if is_ident(b) || (i > start && is_num(b)) {
                i += 1;
            } else {
                break;
            }
        }
        let ident = self.slice(start, i);
        self.pos = i;
        ident
    }

    fn scan_int(&mut self) {
        while matches!(self.peek(0), Some(b) if is_num(b)) {
            self.pos += 1;
        }
    }

    /// 区切り文字まで読み、`\$` / `\#` エスケープ列を解決したテキストを返す。
    /// 区切り直前のバックスラッシュが偶数個なら半減して区切りの手前で止まり、
    /// 奇数個なら区切り文字を 1 文字として取り込んで続行位置を進める。
    fn scan_text(&mut self, delims: &[u8]) -> String {
        let w = &self.data[self.pos..];
        let idx = match w.iter().position(|b| delims.contains(b)) {
            Some(i) => i,
            None => {
                let s = self.slice(self.pos, self.data.len());
                self.pos = self.data.len();
                return s;
            }
        };
        let mut s = w[..idx].to_vec();
        let mut c = 0;
        while c < idx && s[idx - c - 1] == b'\\' {
            c += 1;
        }
        // asdf\$ -> asdf$ / asdf\\$ -> asdf\ / asdf\\\$ -> asdf\$
        self.pos += idx + c % 2;
        if c % 2 == 1 {
            s[idx - c / 2 - 1] = w[idx];
        }
        s.truncate(idx - c / 2);
        String::from_utf8_lossy(&s).into_owned()
    }

    /// 終端パターンの直前まで読み飛ばす（パターン自体は残す）。
    fn scan_comment(&mut self, end: &[u8]) {
        let w = &self.data[self.pos..];
        let idx = w
            .windows(end.len())
            .position(|win| win == end)
            .unwrap_or(w.len());
        self.pos += idx;
    }

    fn scan_until(&mut self, p: u8) -> String {
        let start = self.pos;
        let mut i = self.pos;
        while i < self.data.len() && self.data[i] != p {
            i += 1;
        }
        let s = self.slice(start, i);
        self.pos = i;
        s
    }

    /// 空白（改行を含む）を読み飛ばす。ディレクティブ名と `(` の間で使う。
    fn skip_whitespace(&mut self) {
        while matches!(self.peek(0), Some(b' ') | Some(b'\t') | Some(b'\n')) {
            self.pos += 1;
        }
    }
}
