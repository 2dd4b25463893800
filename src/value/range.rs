// パス: src/value/range.rs
// 役割: 両端を含む整数区間の読み取り専用コレクションを提供する
// 意図: `[lo..hi]` リテラルを要素を実体化せずに反復・参照できるようにする
// 関連ファイル: src/value/methods.rs, src/value/iterator.rs
//! 範囲型
//!
//! 刻み幅は ±1 のみで、範囲が空になることはない（`[0..0]` は 1 要素）。
//! すべての変更操作は UnsupportedOp で失敗する。

use crate::errors::{EvalError, EvalErrorKind};
use crate::value::list::VList;
use crate::value::Value;

/// `to_array` が一度に実体化してよい要素数の上限。
const MAX_MATERIALIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VRange {
    pub start: i64,
    pub end: i64,
    pub diff: i64,
}

impl VRange {
    pub fn new(start: i64, end: i64) -> Self {
        let diff = if end < start { -1 } else { 1 };
        Self { start, end, diff }
    }

    pub fn size(&self) -> usize {
        ((self.end as i128 - self.start as i128).unsigned_abs() as usize) + 1
    }

    /// 範囲検査なしの添字参照。呼び出し側で検査済みであること。
    pub fn at(&self, i: usize) -> i64 {
        self.start + (i as i64) * self.diff
    }

    pub fn get(&self, i: i64) -> Result<i64, EvalError> {
        if i < 0 || i as usize >= self.size() {
            return Err(EvalError::new(
                EvalErrorKind::IndexOutOfRange,
                format!("添字 {} が長さ {} の範囲外です", i, self.size()),
            ));
        }
        Ok(self.at(i as usize))
    }

    pub fn contains(&self, v: i64) -> bool {
        self.index_of(v) >= 0
    }

    pub fn index_of(&self, v: i64) -> i64 {
        let idx = (v as i128 - self.start as i128) * self.diff as i128;
        if idx >= 0 && idx < self.size() as i128 {
            idx as i64
        } else {
            -1
        }
    }

    /// 要素は重複しないため index_of と同じ。
    pub fn last_index_of(&self, v: i64) -> i64 {
        self.index_of(v)
    }

    pub fn to_array(&self) -> Result<VList, EvalError> {
        if self.size() > MAX_MATERIALIZE {
            return Err(EvalError::new(
                EvalErrorKind::ArrayTooLarge,
                "範囲のサイズが大きすぎます",
            ));
        }
        let mut s = Vec::with_capacity(self.size());
        for i in 0..self.size() {
            s.push(Value::Int(self.at(i)));
        }
        Ok(VList::new(s))
    }

    /// 読み取り専用コレクションに対する変更操作の共通エラー。
    pub fn unsupported() -> EvalError {
        EvalError::new(EvalErrorKind::Unsupported, "範囲は変更できません")
    }
}
