// パス: src/errors.rs
// 役割: 共通エラー型とメッセージ整形ロジックを集約する
// 意図: 字句・構文・評価を横断して一貫した診断を提供する
// 関連ファイル: src/lexer.rs, src/parser/mod.rs, src/evaluator.rs
//! エラー表現モジュール
//!
//! - 共有フォーマットの `ErrorInfo` を中心にメタデータを保持する。
//! - 各レイヤー向けのエラー型を薄いラッパーとして公開する。
//! - 評価エラーは閉じた種別集合 `EvalErrorKind` を持ち、安定コードへ対応付ける。

use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone)]
/// エラーコード・本文・位置メタデータを保持する基礎構造体。
pub struct ErrorInfo {
    pub code: &'static str,
    pub msg: String,
    pub pos: Option<usize>,      // 原文バイトオフセット
    pub line: Option<usize>,     // 1 始まりの行番号
    pub snippet: Option<String>, // 問題箇所の抜粋文字列
}

impl ErrorInfo {
    /// コードと本文だけでエラー情報を初期化する。
    pub fn new(code: &'static str, msg: impl Into<String>, line: Option<usize>) -> Self {
        Self {
            code,
            msg: msg.into(),
            pos: None,
            line,
            snippet: None,
        }
    }

    /// バイト位置つきでエラー情報を構築する。
    pub fn at(
        code: &'static str,
        msg: impl Into<String>,
        pos: Option<usize>,
        line: Option<usize>,
    ) -> Self {
        Self {
            code,
            msg: msg.into(),
            pos,
            line,
            snippet: None,
        }
    }

    /// エラー周辺の抜粋を追加してチェーン可能にする。
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }

    /// 行番号が未設定なら指定値で埋める。
    pub fn fill_line_if_absent(&mut self, line: usize) {
        if self.line.is_none() {
            self.line = Some(line);
        }
    }
}

/// `ErrorInfo` の整形ルールを `Display` 経由で提供する。
impl Display for ErrorInfo {
    /// `[CODE] message @line=..` の形式で文字列化する。
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match (self.line, self.pos) {
            (Some(l), Some(p)) => write!(f, "[{}] {} @line={} @pos={}", self.code, self.msg, l, p)?,
            (Some(l), None) => write!(f, "[{}] {} @line={}", self.code, self.msg, l)?,
            (None, Some(p)) => write!(f, "[{}] {} @pos={}", self.code, self.msg, p)?,
            (None, None) => write!(f, "[{}] {}", self.code, self.msg)?,
        }
        if let Some(s) = &self.snippet {
            write!(f, "\n{}", s)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// 字句解析で報告されるエラー型。
pub struct LexerError(pub Box<ErrorInfo>);

impl LexerError {
    /// コードと位置を指定して字句解析エラーを作成する。
    pub fn at(
        code: &'static str,
        msg: impl Into<String>,
        pos: Option<usize>,
        line: Option<usize>,
    ) -> Self {
        Self(Box::new(ErrorInfo::at(code, msg, pos, line)))
    }

    /// スニペット付きの字句解析エラーを作成する。
    pub fn at_with_snippet(
        code: &'static str,
        msg: impl Into<String>,
        pos: Option<usize>,
        line: Option<usize>,
        snippet: impl Into<String>,
    ) -> Self {
        Self(Box::new(
            ErrorInfo::at(code, msg, pos, line).with_snippet(snippet),
        ))
    }
}

#[derive(Debug, Clone)]
/// 構文解析で用いるエラー型。
pub struct ParseError(pub Box<ErrorInfo>);

impl ParseError {
    /// コードと本文だけで構文解析エラーを作成する。
    pub fn new(code: &'static str, msg: impl Into<String>, line: Option<usize>) -> Self {
        Self(Box::new(ErrorInfo::new(code, msg, line)))
    }
}

impl From<LexerError> for ParseError {
    /// 字句エラーを位置情報ごと構文エラーへ持ち上げる。
    fn from(e: LexerError) -> Self {
        Self(e.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// 評価時に起こり得る失敗の閉じた種別集合。
pub enum EvalErrorKind {
    UndefinedVar,
    NilResult,
    PropertyAccess,
    Set,
    Arg,
    Type,
    DivisionByZero,
    IndexOutOfRange,
    Overflow,
    IteratorExhausted,
    IteratorInvalidState,
    Unsupported,
    CycleDetected,
    CallDepthExceeded,
    IterationLimitExceeded,
    ArrayTooLarge,
    Resource,
    Parse,
}

impl EvalErrorKind {
    /// 種別ごとの安定したエラーコードを返す。
    pub fn code(self) -> &'static str {
        match self {
            Self::UndefinedVar => "EVAL010",
            Self::NilResult => "EVAL011",
            Self::PropertyAccess => "EVAL020",
            Self::Set => "EVAL021",
            Self::Arg => "EVAL022",
            Self::Type => "EVAL030",
            Self::DivisionByZero => "EVAL031",
            Self::Overflow => "EVAL032",
            Self::IndexOutOfRange => "EVAL040",
            Self::IteratorExhausted => "EVAL041",
            Self::IteratorInvalidState => "EVAL042",
            Self::Unsupported => "EVAL043",
            Self::CycleDetected => "EVAL050",
            Self::CallDepthExceeded => "EVAL060",
            Self::IterationLimitExceeded => "EVAL061",
            Self::ArrayTooLarge => "EVAL062",
            Self::Resource => "EVAL070",
            Self::Parse => "EVAL080",
        }
    }
}

#[derive(Debug, Clone)]
/// 評価器で発生するエラー型。種別と診断情報を併せ持つ。
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub info: Box<ErrorInfo>,
}

impl EvalError {
    /// 種別と本文を指定して評価エラーを作成する。
    pub fn new(kind: EvalErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            info: Box::new(ErrorInfo::new(kind.code(), msg, None)),
        }
    }

    /// 行番号つきの評価エラーを作成する。
    pub fn at(kind: EvalErrorKind, msg: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            info: Box::new(ErrorInfo::new(kind.code(), msg, Some(line))),
        }
    }

    /// 行番号が未設定なら埋めてチェーン可能にする。
    pub fn fill_line(mut self, line: usize) -> Self {
        self.info.fill_line_if_absent(line);
        self
    }
}

/// `Display` 実装を `ErrorInfo` へ委譲する。
impl Display for LexerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}
impl StdError for LexerError {}

impl Display for ParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}
impl StdError for ParseError {}

impl Display for EvalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.info, f)
    }
}
impl StdError for EvalError {}
