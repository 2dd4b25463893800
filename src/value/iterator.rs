// パス: src/value/iterator.rs
// 役割: コレクション・マップ双方のカーソル型イテレータを提供する
// 意図: `hasNext`/`next`/`remove` の Java 風契約を `#foreach` と共有する
// 関連ファイル: src/value/list.rs, src/value/map.rs, src/evaluator.rs
//! イテレータ
//!
//! - `next` は要素を返し、尽きていれば IteratorExhausted で失敗する。
//! - `remove` は直前の `next` が無ければ IteratorInvalidState で失敗する。
//!   リストでは直前に返した要素を取り除き、範囲では UnsupportedOp。
//! - マップイテレータは構築時点のキー整列スナップショットを辿り、
//!   `remove` は所属マップへ委譲する。

use std::cell::RefCell;
use std::rc::Rc;

use crate::errors::{EvalError, EvalErrorKind};
use crate::value::map::{MapEntry, MapKey, VMap, ViewSelect};
use crate::value::range::VRange;
use crate::value::{VList, Value};

#[derive(Debug)]
/// イテレータの供給源。
pub enum IterSrc {
    List(Rc<RefCell<VList>>),
    Range(VRange),
    Items(Vec<Value>),
}

#[derive(Debug)]
pub struct CollectionIterator {
    src: IterSrc,
    i: usize,
    last: Option<usize>,
}

impl CollectionIterator {
    pub fn new(src: IterSrc) -> Self {
        Self {
            src,
            i: 0,
            last: None,
        }
    }

    /// 任意の値をイテレータに包む。コレクションでない値は 1 要素になる。
    pub fn over(v: Value) -> Self {
        match v {
            Value::List(rc) => Self::new(IterSrc::List(rc)),
            Value::Range(r) => Self::new(IterSrc::Range(r)),
            other => Self::new(IterSrc::Items(vec![other])),
        }
    }

    fn size(&self) -> usize {
        match &self.src {
            IterSrc::List(rc) => rc.borrow().size(),
            IterSrc::Range(r) => r.size(),
            IterSrc::Items(v) => v.len(),
        }
    }

    pub fn has_next(&self) -> bool {
        self.i < self.size()
    }

    pub fn next(&mut self) -> Result<Value, EvalError> {
        if !self.has_next() {
            return Err(EvalError::new(
                EvalErrorKind::IteratorExhausted,
                "イテレータは末尾に達しています",
            ));
        }
        let v = match &self.src {
            IterSrc::List(rc) => rc.borrow().s[self.i].clone(),
            IterSrc::Range(r) => Value::Int(r.at(self.i)),
            IterSrc::Items(items) => items[self.i].clone(),
        };
        self.last = Some(self.i);
        self.i += 1;
        Ok(v)
    }

    /// 現在位置から `offset` 先の要素を消費せずに覗く（描画用）。
    pub fn peek_at(&self, offset: usize) -> Option<Value> {
        let idx = self.i + offset;
        if idx >= self.size() {
            return None;
        }
        Some(match &self.src {
            IterSrc::List(rc) => rc.borrow().s[idx].clone(),
            IterSrc::Range(r) => Value::Int(r.at(idx)),
            IterSrc::Items(items) => items[idx].clone(),
        })
    }

    pub fn remove(&mut self) -> Result<(), EvalError> {
        let last = self.last.take().ok_or_else(|| {
            EvalError::new(
                EvalErrorKind::IteratorInvalidState,
                "remove の前に next を呼ぶ必要があります",
            )
        })?;
        match &mut self.src {
            IterSrc::List(rc) => {
                rc.borrow_mut().s.remove(last);
            }
            IterSrc::Range(_) => return Err(VRange::unsupported()),
            IterSrc::Items(items) => {
                items.remove(last);
            }
        }
        self.i = last;
        Ok(())
    }
}

#[derive(Debug)]
/// マップのライブビューを辿るイテレータ。
pub struct MapIterator {
    map: Rc<RefCell<VMap>>,
    select: ViewSelect,
    keys: Vec<MapKey>,
    i: usize,
    last: Option<MapKey>,
}

impl MapIterator {
    /// 構築時点のキー整列スナップショットを取る。
    pub fn new(map: Rc<RefCell<VMap>>, select: ViewSelect) -> Self {
        let keys = map.borrow().keys();
        Self {
            map,
            select,
            keys,
            i: 0,
            last: None,
        }
    }

    /// スナップショット中でまだマップに残っている次のキー位置。
    fn next_live(&self) -> Option<usize> {
        let m = self.map.borrow();
        (self.i..self.keys.len()).find(|&j| m.contains_key(&self.keys[j]))
    }

    pub fn has_next(&self) -> bool {
        self.next_live().is_some()
    }

    pub fn next(&mut self) -> Result<Value, EvalError> {
        let j = self.next_live().ok_or_else(|| {
            EvalError::new(
                EvalErrorKind::IteratorExhausted,
                "イテレータは末尾に達しています",
            )
        })?;
        let key = self.keys[j].clone();
        let val = self
            .map
            .borrow()
            .get(&key)
            .expect("next_live で存在確認済みのキー");
        self.i = j + 1;
        self.last = Some(key.clone());
        Ok(match self.select {
            ViewSelect::Keys => key.to_value(),
            ViewSelect::Values => val,
            ViewSelect::Entries => Value::Entry(Rc::new(RefCell::new(MapEntry {
                key,
                val,
                owner: self.map.clone(),
            }))),
        })
    }

    /// 直前に返した要素に対応するマップのエントリを取り除く。
    pub fn remove(&mut self) -> Result<(), EvalError> {
        let key = self.last.take().ok_or_else(|| {
            EvalError::new(
                EvalErrorKind::IteratorInvalidState,
                "remove の前に next を呼ぶ必要があります",
            )
        })?;
        self.map.borrow_mut().remove(&key);
        Ok(())
    }

    /// 残りの要素を消費せずに実体化する（描画用）。
    pub fn remaining(&self) -> Vec<Value> {
        let m = self.map.borrow();
        (self.i..self.keys.len())
            .filter(|&j| m.contains_key(&self.keys[j]))
            .map(|j| {
                let key = self.keys[j].clone();
                let val = m.get(&key).expect("存在確認済みのキー");
                match self.select {
                    ViewSelect::Keys => key.to_value(),
                    ViewSelect::Values => val,
                    ViewSelect::Entries => Value::Entry(Rc::new(RefCell::new(MapEntry {
                        key,
                        val,
                        owner: self.map.clone(),
                    }))),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
/// `#foreach` と foreach メタオブジェクトが共有する反復ハンドル。
pub enum AnyIter {
    Coll(Rc<RefCell<CollectionIterator>>),
    Map(Rc<RefCell<MapIterator>>),
}

impl AnyIter {
    pub fn has_next(&self) -> bool {
        match self {
            AnyIter::Coll(it) => it.borrow().has_next(),
            AnyIter::Map(it) => it.borrow().has_next(),
        }
    }

    pub fn next(&self) -> Result<Value, EvalError> {
        match self {
            AnyIter::Coll(it) => it.borrow_mut().next(),
            AnyIter::Map(it) => it.borrow_mut().next(),
        }
    }
}
