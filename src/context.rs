// パス: src/context.rs
// 役割: 名前ごとのフレームスタックを持つ評価コンテキストを提供する
// 意図: `#set`/`#foreach`/マクロ引数のスコープ規則を遅延ポップで再現する
// 関連ファイル: src/evaluator.rs, src/value/mod.rs
//! 評価コンテキスト
//!
//! - `push` は同名のフレーム列へ追記し、その深さ（添字）を返す。
//! - `pop(depth, name)` は深さ 0 のフレームを取り除かない。最初の束縛は
//!   スコープを抜けても残り続ける。`#set` の可視性はこの規則に依存する。
//! - `get` は最上段の束縛を返し、未定義なら UndefinedVar を報告する。

use std::collections::HashMap;

use crate::errors::{EvalError, EvalErrorKind};
use crate::value::Value;

#[derive(Debug, Default)]
pub struct Ctx {
    vars: HashMap<String, Vec<Value>>,
    pub call_depth: usize,
}

impl Ctx {
    pub fn new() -> Self {
        Self::default()
    }

    /// 束縛を積み、その深さ添字を返す。
    pub fn push(&mut self, name: &str, value: Value) -> usize {
        let frames = self.vars.entry(name.to_string()).or_default();
        frames.push(value);
        frames.len() - 1
    }

    /// 指定深さのフレームを取り除く。深さ 0 は据え置く。
    pub fn pop(&mut self, depth: usize, name: &str) {
        if let Some(frames) = self.vars.get_mut(name) {
            if depth > 0 && depth < frames.len() {
                frames.remove(depth);
            }
        }
    }

    /// 最上段の束縛を返す。
    pub fn get(&self, name: &str) -> Result<Value, EvalError> {
        match self.vars.get(name).and_then(|frames| frames.last()) {
            Some(v) => Ok(v.clone()),
            None => Err(EvalError::new(
                EvalErrorKind::UndefinedVar,
                format!("未定義の変数 ${}", name),
            )),
        }
    }

    /// 指定深さのフレームを書き換える。存在しなければ何もしない。
    pub fn set(&mut self, depth: usize, name: &str, value: Value) {
        if let Some(frames) = self.vars.get_mut(name) {
            if depth < frames.len() {
                frames[depth] = value;
            }
        }
    }
}
