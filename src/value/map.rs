// パス: src/value/map.rs
// 役割: キー整列マップ・エントリ・ライブビューを提供する
// 意図: 反復と描画の順序をキー昇順で安定させ、ビュー経由の変更をマップへ伝える
// 関連ファイル: src/value/mod.rs, src/value/iterator.rs, src/value/methods.rs
//! マップ型とビュー
//!
//! - キーは任意の値から作れるが、照合には文字列形が正として使われる。
//! - 反復順は昇順: 真偽値は false < true、数値は数値順、その他は辞書順。
//! - ビューはマップハンドル＋セレクタの組で、変更は相互に反映される。

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::value::{value_eq, Value};

#[derive(Debug, Clone)]
/// 文字列形を正体とするマップキー。
///
/// キーの同一性は文字列形だけで決まり、`{1: "a", "1": "b"}` は 1 エントリへ
/// 畳まれる。列挙順のために、文字列形が数値として読める場合はその数値を
/// 併せて保持する。
pub struct MapKey {
    text: String,
    num: Option<f64>, // 文字列形の数値解釈（数値順の列挙に使う）
}

impl MapKey {
    pub fn string(s: impl Into<String>) -> Self {
        let text = s.into();
        let num = text.parse::<f64>().ok().filter(|n| !n.is_nan());
        Self { text, num }
    }

    /// 値からキーを作る。どの型も文字列形へ畳んでから扱う。
    pub fn from_value(v: &Value) -> Self {
        match v {
            Value::Bool(b) => Self::string(b.to_string()),
            Value::Int(i) => Self::string(i.to_string()),
            Value::Uint(u) => Self::string(u.to_string()),
            Value::Float(f) => Self::string(format!("{}", f)),
            Value::Str(s) => Self::string(s.0.clone()),
            Value::Undefined | Value::Null => Self::string("null"),
            other => Self::string(
                crate::render::to_display(other, crate::template::DEFAULT_MAX_ARRAY_SIZE)
                    .unwrap_or_default(),
            ),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// キーを値として返す（描画・エントリ用）。
    pub fn to_value(&self) -> Value {
        Value::str(self.text.clone())
    }
}

/// 同一性は文字列形のみ。`cmp` が Equal を返すのも text が一致するときだけで、
/// BTreeMap 上の一意性と一致する。
impl PartialEq for MapKey {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}
impl Eq for MapKey {}

impl PartialOrd for MapKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MapKey {
    /// 数値として読めるキーは数値順（同値は辞書順で弁別）、数値はその他の
    /// キーより前、残りは辞書順。text のみから導かれる全順序。
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.num, other.num) {
            (Some(x), Some(y)) => x
                .partial_cmp(&y)
                .unwrap_or(Ordering::Equal)
                .then_with(|| self.text.cmp(&other.text)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.text.cmp(&other.text),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct VMap {
    m: BTreeMap<MapKey, Value>,
}

impl VMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.m.clear();
    }

    pub fn len(&self) -> usize {
        self.m.len()
    }

    pub fn is_empty(&self) -> bool {
        self.m.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MapKey, &Value)> {
        self.m.iter()
    }

    pub fn keys(&self) -> Vec<MapKey> {
        self.m.keys().cloned().collect()
    }

    pub fn contains_key(&self, key: &MapKey) -> bool {
        self.m.contains_key(key)
    }

    pub fn contains_value(&self, v: &Value) -> bool {
        self.m.values().any(|e| value_eq(e, v))
    }

    pub fn get(&self, key: &MapKey) -> Option<Value> {
        self.m.get(key).cloned()
    }

    /// 挿入して以前の値を返す。
    pub fn put(&mut self, key: MapKey, value: Value) -> Option<Value> {
        self.m.insert(key, value)
    }

    pub fn put_if_absent(&mut self, key: MapKey, value: Value) -> Option<Value> {
        // Java 同様、null が入っている場合も不在として扱う
        match self.get(&key) {
            Some(v) if !matches!(v, Value::Null | Value::Undefined) => Some(v),
            _ => {
                self.put(key, value);
                None
            }
        }
    }

    pub fn remove(&mut self, key: &MapKey) -> Option<Value> {
        self.m.remove(key)
    }

    /// 既存キーのみ上書きし、以前の値を返す。同一性は put と同じ文字列形。
    pub fn replace(&mut self, key: &MapKey, value: Value) -> Option<Value> {
        if self.contains_key(key) {
            return self.put(key.clone(), value);
        }
        None
    }
}

#[derive(Debug, Clone)]
/// 所属マップに束ねられたキーと値の対。
pub struct MapEntry {
    pub key: MapKey,
    pub val: Value,
    pub owner: Rc<RefCell<VMap>>,
}

impl MapEntry {
    /// 新しい値を所属マップへ書き込み、以前の値を返す。
    pub fn set_value(&mut self, value: Value) -> Value {
        let prev = std::mem::replace(&mut self.val, value.clone());
        self.owner.borrow_mut().put(self.key.clone(), value);
        prev
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// ビューが投影する面。
pub enum ViewSelect {
    Keys,
    Values,
    Entries,
}

#[derive(Debug, Clone)]
/// マップのライブビュー。ハンドルとセレクタのみを持つ。
pub struct View {
    pub map: Rc<RefCell<VMap>>,
    pub select: ViewSelect,
}

impl View {
    pub fn new(map: Rc<RefCell<VMap>>, select: ViewSelect) -> Self {
        Self { map, select }
    }

    /// 現時点の選択面をキー昇順で実体化する。
    pub fn materialize(&self) -> Vec<Value> {
        let m = self.map.borrow();
        m.iter()
            .map(|(k, v)| match self.select {
                ViewSelect::Keys => k.to_value(),
                ViewSelect::Values => v.clone(),
                ViewSelect::Entries => Value::Entry(Rc::new(RefCell::new(MapEntry {
                    key: k.clone(),
                    val: v.clone(),
                    owner: self.map.clone(),
                }))),
            })
            .collect()
    }

    pub fn contains(&self, v: &Value) -> bool {
        self.materialize().iter().any(|e| value_eq(e, v))
    }

    /// ビューから要素を取り除く。対応するマップのエントリも消える。
    pub fn remove(&self, v: &Value) -> bool {
        let target = {
            let m = self.map.borrow();
            let found = m
                .iter()
                .find(|(k, val)| match self.select {
                    ViewSelect::Keys => value_eq(&k.to_value(), v),
                    ViewSelect::Values => value_eq(val, v),
                    ViewSelect::Entries => match v {
                        Value::Entry(e) => {
                            let e = e.borrow();
                            k.text() == e.key.text() && value_eq(val, &e.val)
                        }
                        _ => false,
                    },
                })
                .map(|(k, _)| k.clone());
            found
        };
        match target {
            Some(k) => {
                self.map.borrow_mut().remove(&k);
                true
            }
            None => false,
        }
    }

    pub fn clear(&self) {
        self.map.borrow_mut().clear();
    }

    pub fn size(&self) -> usize {
        self.map.borrow().len()
    }
}
