// パス: src/lib.rs
// 役割: クレートルートとしてモジュールを束ね、公開 API を定める
// 意図: 利用側からは解析・実行・値・エラーだけを直接参照できるようにする
// 関連ファイル: src/template.rs, src/evaluator.rs, src/value/mod.rs
//! veltl — VTL（Velocity Template Language）互換のテンプレートエンジン
//!
//! 目的:
//! - `$` 参照と `#` ディレクティブが混在するテンプレートを解析し、
//!   呼び出し側の値文脈に対して描画する。
//!
//! 方針:
//! - コメント/ドキュメントは日本語、識別子は英語。
//! - コンパイル（`parse`）と実行（`Template::execute`）を分離する。
//! - 値はラップ済みの `Value` として受け渡す。

pub mod ast;
pub mod context;
pub mod errors;
pub mod evaluator;
pub mod gobble;
pub mod lexer;
pub mod parser;
pub mod render;
pub mod template;
pub mod value;

pub use crate::errors::{EvalError, EvalErrorKind, LexerError, ParseError};
pub use crate::template::{
    parse, parse_file, parse_with_reader, FsReader, ResourceReader, Template, TemplateError,
};
pub use crate::value::{Value, VtlObject};
