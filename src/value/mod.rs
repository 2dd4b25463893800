// パス: src/value/mod.rs
// 役割: 実行時値のタグ付き表現と横断的な値操作を提供する
// 意図: ホスト値を一度だけラップし、等価・真偽・順序の規則を一箇所に集約する
// 関連ファイル: src/value/list.rs, src/value/map.rs, src/evaluator.rs
//! 値モデル
//!
//! - リストとマップは `Rc<RefCell<_>>` の共有ハンドルで、循環を許す。
//!   循環は所有権ではなくデータであり、検出は描画時に行う。
//! - 等価は「ラップ後の深い等価＋数値の暗黙拡幅」。符号付き・符号なしの
//!   混在は負数が絡むと等しくならない。
//! - 順序づけできるのは数値のみ。数値でない側を区別したエラーを返す。

use std::cell::RefCell;
use std::rc::Rc;

use crate::errors::{EvalError, EvalErrorKind};

pub mod iterator;
pub mod list;
pub mod map;
pub mod methods;
pub mod object;
pub mod range;
pub mod string;

pub use iterator::{AnyIter, CollectionIterator, MapIterator};
pub use list::VList;
pub use map::{MapEntry, MapKey, VMap, View, ViewSelect};
pub use object::{MethodCache, VtlObject};
pub use range::VRange;
pub use string::VStr;

#[derive(Debug, Clone)]
/// 評価器が扱う値。
pub enum Value {
    /// 不在。未定義変数の条件内評価やマップの欠損キーで生じる。
    Undefined,
    /// 明示的な null。参照の最終結果になると NilResult を誘発する。
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(VStr),
    List(Rc<RefCell<VList>>),
    Map(Rc<RefCell<VMap>>),
    Range(VRange),
    Entry(Rc<RefCell<MapEntry>>),
    View(View),
    ListIter(Rc<RefCell<CollectionIterator>>),
    MapIter(Rc<RefCell<MapIterator>>),
    Object(Rc<dyn VtlObject>),
}

impl Value {
    /// 文字列からの生成。
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(VStr(s.into()))
    }

    /// リストハンドルを新設する。
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(VList { s: items })))
    }

    /// マップハンドルを新設する。
    pub fn map(m: VMap) -> Self {
        Value::Map(Rc::new(RefCell::new(m)))
    }

    /// エラーメッセージに現れる型ラベル。
    pub fn kind(&self) -> String {
        match self {
            Value::Undefined => "undefined".into(),
            Value::Null => "null".into(),
            Value::Bool(_) => "boolean".into(),
            Value::Int(_) | Value::Uint(_) => "integer".into(),
            Value::Float(_) => "float".into(),
            Value::Str(_) => "string".into(),
            Value::List(_) => "array".into(),
            Value::Map(_) => "map".into(),
            Value::Range(_) => "range".into(),
            Value::Entry(_) => "entry".into(),
            Value::View(v) => match v.select {
                ViewSelect::Keys => "key view".into(),
                ViewSelect::Values => "value view".into(),
                ViewSelect::Entries => "entry view".into(),
            },
            Value::ListIter(_) | Value::MapIter(_) => "iterator".into(),
            Value::Object(o) => o.kind().to_string(),
        }
    }

    /// VTL の真偽規則。
    pub fn is_true(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Uint(u) => *u != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.0.is_empty(),
            Value::List(l) => !l.borrow().s.is_empty(),
            Value::Map(m) => !m.borrow().is_empty(),
            Value::Range(_) => true,
            Value::Entry(_) => true,
            Value::View(v) => !v.map.borrow().is_empty(),
            Value::ListIter(_) | Value::MapIter(_) => true,
            Value::Object(_) => true,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Uint(_) | Value::Float(_))
    }

    pub fn is_int_like(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Uint(_))
    }

    /// 数値を f64 へ広げる。数値でなければ None。
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Uint(u) => Some(*u as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// 整数文脈への変換。浮動小数は切り捨てる。
    pub fn as_i64(&self) -> Result<i64, EvalError> {
        match self {
            Value::Int(i) => Ok(*i),
            Value::Uint(u) => i64::try_from(*u).map_err(|_| {
                EvalError::new(EvalErrorKind::Overflow, "符号なし整数が i64 を超えています")
            }),
            Value::Float(f) => {
                if *f > i64::MAX as f64 || *f < i64::MIN as f64 {
                    return Err(EvalError::new(
                        EvalErrorKind::Overflow,
                        "浮動小数が i64 の範囲を超えています",
                    ));
                }
                Ok(*f as i64)
            }
            other => Err(EvalError::new(
                EvalErrorKind::Type,
                format!("整数が必要ですが {} が渡されました", other.kind()),
            )),
        }
    }
}

/// ラップ後の深い等価。数値は共通の種類へ拡幅して比較する。
pub fn value_eq(a: &Value, b: &Value) -> bool {
    use Value::*;
    match (a, b) {
        (Undefined | Null, Undefined | Null) => true,
        (Bool(x), Bool(y)) => x == y,
        (Int(x), Int(y)) => x == y,
        (Uint(x), Uint(y)) => x == y,
        (Float(x), Float(y)) => x == y,
        (Int(x), Uint(y)) | (Uint(y), Int(x)) => *x >= 0 && (*x as u64) == *y,
        (Int(x), Float(y)) | (Float(y), Int(x)) => (*x as f64) == *y,
        (Uint(x), Float(y)) | (Float(y), Uint(x)) => *y >= 0.0 && (*x as f64) == *y,
        (Str(x), Str(y)) => x.0 == y.0,
        (List(x), List(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.s.len() == y.s.len() && x.s.iter().zip(y.s.iter()).all(|(a, b)| value_eq(a, b))
        }
        (Map(x), Map(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len()
                && x.iter().zip(y.iter()).all(|((ka, va), (kb, vb))| {
                    ka.text() == kb.text() && value_eq(va, vb)
                })
        }
        (Range(x), Range(y)) => x == y,
        (Range(x), List(y)) | (List(y), Range(x)) => {
            let y = y.borrow();
            x.size() == y.s.len()
                && y.s
                    .iter()
                    .enumerate()
                    .all(|(i, v)| value_eq(&Value::Int(x.at(i)), v))
        }
        // エントリ等価は所属マップを無視する
        (Entry(x), Entry(y)) => {
            let (x, y) = (x.borrow(), y.borrow());
            x.key.text() == y.key.text() && value_eq(&x.val, &y.val)
        }
        (View(x), View(y)) => {
            x.select == y.select
                && (Rc::ptr_eq(&x.map, &y.map) || {
                    let (a, b) = (x.materialize(), y.materialize());
                    a.len() == b.len() && a.iter().zip(b.iter()).all(|(p, q)| value_eq(p, q))
                })
        }
        (ListIter(x), ListIter(y)) => Rc::ptr_eq(x, y),
        (MapIter(x), MapIter(y)) => Rc::ptr_eq(x, y),
        (Object(x), Object(y)) => Rc::ptr_eq(x, y),
        _ => false,
    }
}

/// 数値の小なり比較。符号付き・符号なし混在は負数側を安全に扱う。
pub fn value_lt(a: &Value, b: &Value) -> Result<bool, EvalError> {
    use Value::*;
    if !a.is_number() {
        return Err(EvalError::new(
            EvalErrorKind::Type,
            "比較演算の左辺が数値ではありません",
        ));
    }
    if !b.is_number() {
        return Err(EvalError::new(
            EvalErrorKind::Type,
            "比較演算の右辺が数値ではありません",
        ));
    }
    Ok(match (a, b) {
        (Int(x), Int(y)) => x < y,
        (Uint(x), Uint(y)) => x < y,
        (Float(x), Float(y)) => x < y,
        (Int(x), Uint(y)) => *x < 0 || (*x as u64) < *y,
        (Uint(x), Int(y)) => *y >= 0 && *x < (*y as u64),
        (Float(x), Uint(y)) => *x < 0.0 || *x < (*y as f64),
        (Uint(x), Float(y)) => *y >= 0.0 && (*x as f64) < *y,
        (Int(x), Float(y)) => (*x as f64) < *y,
        (Float(x), Int(y)) => *x < (*y as f64),
        _ => false,
    })
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}
impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}
impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint(v)
    }
}
impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}
impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::str(v)
    }
}
impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::str(v)
    }
}

/// ホストのベクタはリストへラップされる。
impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v.into_iter().map(Into::into).collect())
    }
}

/// ホストのマップはキーの文字列形を正とするマップへラップされる。
impl<T: Into<Value>> From<std::collections::HashMap<String, T>> for Value {
    fn from(v: std::collections::HashMap<String, T>) -> Self {
        let mut m = VMap::new();
        for (k, val) in v {
            m.put(MapKey::string(k), val.into());
        }
        Value::map(m)
    }
}

impl<T: Into<Value>> From<std::collections::BTreeMap<String, T>> for Value {
    fn from(v: std::collections::BTreeMap<String, T>) -> Self {
        let mut m = VMap::new();
        for (k, val) in v {
            m.put(MapKey::string(k), val.into());
        }
        Value::map(m)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(x) => x.into(),
            None => Value::Null,
        }
    }
}
