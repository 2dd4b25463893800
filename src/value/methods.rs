// パス: src/value/methods.rs
// 役割: 組み込み値へのメソッドディスパッチを提供する
// 意図: 候補名解決を一箇所へ集め、テンプレートの Java 風呼び出しを実現する
// 関連ファイル: src/value/object.rs, src/evaluator.rs
//! メソッドディスパッチ
//!
//! 呼び出し名は `UcFirst(N)` → 先頭 `get` を剥がした形 → `Get〜` → `Is〜` の
//! 順で解決する。組み込み型は正規名（UpperCamel）での直接分岐、利用者
//! オブジェクトはトレイト経由で同じ候補列を試す。戻り値の `Ok(None)` は
//! 「該当メソッドなし」を意味し、プロパティ解決のフォールバックに使われる。

use std::cell::RefCell;
use std::rc::Rc;

use crate::errors::{EvalError, EvalErrorKind};
use crate::value::iterator::{CollectionIterator, IterSrc, MapIterator};
use crate::value::map::{MapKey, View, ViewSelect};
use crate::value::object::{candidates, MethodCache};
use crate::value::{value_eq, VList, VStr, Value};

/// メソッドを探して呼び出す。見つからなければ `Ok(None)`。
pub fn try_call(
    cache: &MethodCache,
    v: &Value,
    name: &str,
    args: &[Value],
) -> Result<Option<Value>, EvalError> {
    if let Value::Object(obj) = v {
        return match cache.call_object(obj, name, args) {
            Some(result) => result.map(Some),
            None => Ok(None),
        };
    }
    for cand in candidates(name) {
        if let Some(result) = dispatch(v, &cand, args) {
            return result.map(Some);
        }
    }
    Ok(None)
}

/// 値の種類が 1 引数 `get` を持つか（プロパティのフォールバック判定）。
pub fn has_get(v: &Value) -> bool {
    matches!(v, Value::Map(_) | Value::List(_) | Value::Range(_) | Value::Object(_))
}

fn arity(name: &str, args: &[Value], n: usize) -> Result<(), EvalError> {
    if args.len() != n {
        return Err(EvalError::new(
            EvalErrorKind::Arg,
            format!("{} の引数は {} 個ですが {} 個渡されました", name, n, args.len()),
        ));
    }
    Ok(())
}

fn arg_i64(name: &str, args: &[Value], i: usize) -> Result<i64, EvalError> {
    args[i].as_i64().map_err(|_| {
        EvalError::new(
            EvalErrorKind::Arg,
            format!("{} の引数 {} は整数が必要です", name, i),
        )
    })
}

fn arg_str<'a>(name: &str, args: &'a [Value], i: usize) -> Result<&'a str, EvalError> {
    match &args[i] {
        Value::Str(s) => Ok(s.as_str()),
        other => Err(EvalError::new(
            EvalErrorKind::Arg,
            format!(
                "{} の引数 {} は文字列が必要ですが {} が渡されました",
                name,
                i,
                other.kind()
            ),
        )),
    }
}

fn array_expected() -> EvalError {
    EvalError::new(EvalErrorKind::Arg, "配列が必要です")
}

fn map_expected() -> EvalError {
    EvalError::new(EvalErrorKind::Arg, "マップが必要です")
}

/// 正規名で 1 回だけ分岐する。`None` は「この型にその名前はない」。
fn dispatch(v: &Value, name: &str, args: &[Value]) -> Option<Result<Value, EvalError>> {
    match v {
        Value::Str(s) => dispatch_str(s, name, args),
        Value::List(rc) => dispatch_list(rc, name, args),
        Value::Map(rc) => dispatch_map(rc, name, args),
        Value::Range(r) => dispatch_range(r, name, args),
        Value::Entry(rc) => dispatch_entry(rc, name, args),
        Value::View(view) => dispatch_view(view, name, args),
        Value::ListIter(rc) => Some(dispatch_coll_iter(rc, name, args)?),
        Value::MapIter(rc) => Some(dispatch_map_iter(rc, name, args)?),
        _ => None,
    }
}

fn dispatch_str(s: &VStr, name: &str, args: &[Value]) -> Option<Result<Value, EvalError>> {
    let result = match name {
        "CharAt" => arity(name, args, 1)
            .and_then(|_| arg_i64(name, args, 0))
            .and_then(|i| s.char_at(i))
            .map(|c| Value::Int(c as i64)),
        "CodePointAt" | "CodePointBefore" | "CodePointCount" => Err(EvalError::new(
            EvalErrorKind::Unsupported,
            format!("{} は未実装です", name),
        )),
        "CompareTo" => arity(name, args, 1)
            .and_then(|_| arg_str(name, args, 0))
            .map(|o| Value::Int(s.compare_to(o))),
        "CompareToIgnoreCase" => arity(name, args, 1)
            .and_then(|_| arg_str(name, args, 0))
            .map(|o| Value::Int(s.compare_to_ignore_case(o))),
        "Concat" => arity(name, args, 1)
            .and_then(|_| arg_str(name, args, 0))
            .map(|o| Value::str(s.concat(o))),
        "Contains" => arity(name, args, 1)
            .and_then(|_| arg_str(name, args, 0))
            .map(|o| Value::Bool(s.contains(o))),
        "ContentEquals" | "Equals" => arity(name, args, 1)
            .and_then(|_| arg_str(name, args, 0))
            .map(|o| Value::Bool(s.equals(o))),
        "EndsWith" => arity(name, args, 1)
            .and_then(|_| arg_str(name, args, 0))
            .map(|o| Value::Bool(s.ends_with(o))),
        "EqualsIgnoreCase" => arity(name, args, 1)
            .and_then(|_| arg_str(name, args, 0))
            .map(|o| Value::Bool(s.equals_ignore_case(o))),
        "GetBytes" => arity(name, args, 0)
            .map(|_| Value::list(s.0.bytes().map(|b| Value::Int(b as i64)).collect())),
        "IndexOf" => arity(name, args, 1)
            .and_then(|_| arg_str(name, args, 0))
            .map(|o| Value::Int(s.index_of(o))),
        "IsEmpty" => arity(name, args, 0).map(|_| Value::Bool(s.is_empty())),
        "LastIndexOf" => arity(name, args, 1)
            .and_then(|_| arg_str(name, args, 0))
            .map(|o| Value::Int(s.last_index_of(o))),
        "Length" => arity(name, args, 0).map(|_| Value::Int(s.length() as i64)),
        "Matches" => arity(name, args, 1)
            .and_then(|_| arg_str(name, args, 0))
            .and_then(|p| s.matches(p))
            .map(Value::Bool),
        "Replace" => arity(name, args, 2).and_then(|_| {
            let old = arg_str(name, args, 0)?;
            let new = arg_str(name, args, 1)?;
            Ok(Value::str(s.replace(old, new)))
        }),
        "ReplaceAll" => arity(name, args, 2).and_then(|_| {
            let pat = arg_str(name, args, 0)?;
            let rep = arg_str(name, args, 1)?;
            Ok(Value::str(s.replace_all(pat, rep)?))
        }),
        "ReplaceFirst" => arity(name, args, 2).and_then(|_| {
            let pat = arg_str(name, args, 0)?;
            let rep = arg_str(name, args, 1)?;
            Ok(Value::str(s.replace_first(pat, rep)?))
        }),
        "Split" => arity(name, args, 1)
            .and_then(|_| arg_str(name, args, 0))
            .and_then(|p| s.split(p))
            .map(|parts| Value::list(parts.into_iter().map(Value::str).collect())),
        "StartsWith" => arity(name, args, 1)
            .and_then(|_| arg_str(name, args, 0))
            .map(|o| Value::Bool(s.starts_with(o))),
        "SubSequence" | "Substring" => arity(name, args, 2).and_then(|_| {
            let start = arg_i64(name, args, 0)?;
            let end = arg_i64(name, args, 1)?;
            Ok(Value::str(s.sub_sequence(start, end)?))
        }),
        "ToLowerCase" => arity(name, args, 0).map(|_| Value::str(s.to_lower_case())),
        "ToString" => arity(name, args, 0).map(|_| Value::str(s.0.clone())),
        "ToUpperCase" => arity(name, args, 0).map(|_| Value::str(s.to_upper_case())),
        "Trim" => arity(name, args, 0).map(|_| Value::str(s.trim())),
        _ => return None,
    };
    Some(result)
}

fn dispatch_list(
    rc: &Rc<RefCell<VList>>,
    name: &str,
    args: &[Value],
) -> Option<Result<Value, EvalError>> {
    let result = match name {
        "Add" => arity(name, args, 1).map(|_| {
            rc.borrow_mut().add(args[0].clone());
            Value::Bool(true)
        }),
        "AddAll" => arity(name, args, 1).and_then(|_| match &args[0] {
            Value::List(other) => {
                let items = other.borrow().s.clone();
                rc.borrow_mut().s.extend(items);
                Ok(Value::Bool(true))
            }
            _ => Err(array_expected()),
        }),
        "Clear" => arity(name, args, 0).map(|_| {
            rc.borrow_mut().clear();
            Value::Undefined
        }),
        "Contains" => arity(name, args, 1).map(|_| Value::Bool(rc.borrow().contains(&args[0]))),
        "ContainsAll" => arity(name, args, 1).and_then(|_| match &args[0] {
            Value::List(other) => {
                let items = other.borrow().s.clone();
                let me = rc.borrow();
                Ok(Value::Bool(items.iter().all(|v| me.contains(v))))
            }
            _ => Err(array_expected()),
        }),
        "Equals" => arity(name, args, 1).and_then(|_| match &args[0] {
            Value::List(_) => Ok(Value::Bool(value_eq(&Value::List(rc.clone()), &args[0]))),
            _ => Err(array_expected()),
        }),
        "Get" => arity(name, args, 1)
            .and_then(|_| arg_i64(name, args, 0))
            .and_then(|i| rc.borrow().get(i)),
        "IsEmpty" => arity(name, args, 0).map(|_| Value::Bool(rc.borrow().is_empty())),
        "Iterator" => arity(name, args, 0).map(|_| {
            Value::ListIter(Rc::new(RefCell::new(CollectionIterator::new(
                IterSrc::List(rc.clone()),
            ))))
        }),
        "Remove" => arity(name, args, 1).map(|_| Value::Bool(rc.borrow_mut().remove(&args[0]))),
        "RemoveAll" => arity(name, args, 1).and_then(|_| match &args[0] {
            Value::List(other) => {
                let items = other.borrow().s.clone();
                let mut me = rc.borrow_mut();
                let mut found = false;
                for v in &items {
                    found = me.remove(v) || found;
                }
                Ok(Value::Bool(found))
            }
            _ => Err(array_expected()),
        }),
        "RetainAll" => arity(name, args, 1).and_then(|_| match &args[0] {
            Value::List(other) => {
                let keep = other.borrow().s.clone();
                let mut me = rc.borrow_mut();
                let before = me.size();
                me.s.retain(|v| keep.iter().any(|k| value_eq(k, v)));
                Ok(Value::Bool(me.size() != before))
            }
            _ => Err(array_expected()),
        }),
        "Set" => arity(name, args, 2).and_then(|_| {
            let i = arg_i64(name, args, 0)?;
            rc.borrow_mut().set(i, args[1].clone())
        }),
        "Size" => arity(name, args, 0).map(|_| Value::Int(rc.borrow().size() as i64)),
        "ToArray" => arity(name, args, 0).map(|_| {
            Value::List(Rc::new(RefCell::new(rc.borrow().to_array())))
        }),
        _ => return None,
    };
    Some(result)
}

fn dispatch_map(
    rc: &Rc<RefCell<crate::value::VMap>>,
    name: &str,
    args: &[Value],
) -> Option<Result<Value, EvalError>> {
    let result = match name {
        "Clear" => arity(name, args, 0).map(|_| {
            rc.borrow_mut().clear();
            Value::Undefined
        }),
        "ContainsKey" => arity(name, args, 1).map(|_| {
            Value::Bool(rc.borrow().contains_key(&MapKey::from_value(&args[0])))
        }),
        "ContainsValue" => {
            arity(name, args, 1).map(|_| Value::Bool(rc.borrow().contains_value(&args[0])))
        }
        "EntrySet" => arity(name, args, 0)
            .map(|_| Value::View(View::new(rc.clone(), ViewSelect::Entries))),
        "Equals" => arity(name, args, 1).and_then(|_| match &args[0] {
            Value::Map(_) => Ok(Value::Bool(value_eq(&Value::Map(rc.clone()), &args[0]))),
            _ => Err(map_expected()),
        }),
        "Get" => arity(name, args, 1).map(|_| {
            rc.borrow()
                .get(&MapKey::from_value(&args[0]))
                .unwrap_or(Value::Undefined)
        }),
        "GetOrDefault" => arity(name, args, 2).map(|_| {
            rc.borrow()
                .get(&MapKey::from_value(&args[0]))
                .unwrap_or_else(|| args[1].clone())
        }),
        "IsEmpty" => arity(name, args, 0).map(|_| Value::Bool(rc.borrow().is_empty())),
        "KeySet" => {
            arity(name, args, 0).map(|_| Value::View(View::new(rc.clone(), ViewSelect::Keys)))
        }
        "Put" => arity(name, args, 2).map(|_| {
            rc.borrow_mut()
                .put(MapKey::from_value(&args[0]), args[1].clone())
                .unwrap_or(Value::Undefined)
        }),
        "PutAll" => arity(name, args, 1).and_then(|_| match &args[0] {
            Value::Map(other) => {
                let entries: Vec<_> = other
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                let mut me = rc.borrow_mut();
                for (k, v) in entries {
                    me.put(k, v);
                }
                Ok(Value::Undefined)
            }
            _ => Err(map_expected()),
        }),
        "PutIfAbsent" => arity(name, args, 2).map(|_| {
            rc.borrow_mut()
                .put_if_absent(MapKey::from_value(&args[0]), args[1].clone())
                .unwrap_or(Value::Undefined)
        }),
        "Remove" => arity(name, args, 1).map(|_| {
            rc.borrow_mut()
                .remove(&MapKey::from_value(&args[0]))
                .unwrap_or(Value::Undefined)
        }),
        "Replace" => arity(name, args, 2).map(|_| {
            rc.borrow_mut()
                .replace(&MapKey::from_value(&args[0]), args[1].clone())
                .unwrap_or(Value::Undefined)
        }),
        "Size" => arity(name, args, 0).map(|_| Value::Int(rc.borrow().len() as i64)),
        "Values" => {
            arity(name, args, 0).map(|_| Value::View(View::new(rc.clone(), ViewSelect::Values)))
        }
        _ => return None,
    };
    Some(result)
}

fn dispatch_range(
    r: &crate::value::VRange,
    name: &str,
    args: &[Value],
) -> Option<Result<Value, EvalError>> {
    let result = match name {
        "Add" | "AddAll" | "Clear" | "Remove" | "RemoveAll" | "RetainAll" | "Set" => {
            Err(crate::value::VRange::unsupported())
        }
        "Contains" => arity(name, args, 1)
            .and_then(|_| arg_i64(name, args, 0))
            .map(|v| Value::Bool(r.contains(v))),
        "ContainsAll" => arity(name, args, 1).and_then(|_| match &args[0] {
            Value::List(other) => {
                let items = other.borrow().s.clone();
                let mut all = true;
                for v in &items {
                    match v.as_i64() {
                        Ok(i) if r.contains(i) => {}
                        _ => {
                            all = false;
                            break;
                        }
                    }
                }
                Ok(Value::Bool(all))
            }
            _ => Err(array_expected()),
        }),
        "Equals" => {
            arity(name, args, 1).map(|_| Value::Bool(value_eq(&Value::Range(*r), &args[0])))
        }
        "Get" => arity(name, args, 1)
            .and_then(|_| arg_i64(name, args, 0))
            .and_then(|i| r.get(i))
            .map(Value::Int),
        "IndexOf" => arity(name, args, 1)
            .and_then(|_| arg_i64(name, args, 0))
            .map(|v| Value::Int(r.index_of(v))),
        "IsEmpty" => arity(name, args, 0).map(|_| Value::Bool(false)),
        "Iterator" => arity(name, args, 0).map(|_| {
            Value::ListIter(Rc::new(RefCell::new(CollectionIterator::new(
                IterSrc::Range(*r),
            ))))
        }),
        "LastIndexOf" => arity(name, args, 1)
            .and_then(|_| arg_i64(name, args, 0))
            .map(|v| Value::Int(r.last_index_of(v))),
        "Size" => arity(name, args, 0).map(|_| Value::Int(r.size() as i64)),
        "ToArray" => arity(name, args, 0)
            .and_then(|_| r.to_array())
            .map(|l| Value::List(Rc::new(RefCell::new(l)))),
        _ => return None,
    };
    Some(result)
}

fn dispatch_entry(
    rc: &Rc<RefCell<crate::value::MapEntry>>,
    name: &str,
    args: &[Value],
) -> Option<Result<Value, EvalError>> {
    let result = match name {
        "Equals" => arity(name, args, 1).and_then(|_| match &args[0] {
            Value::Entry(_) => Ok(Value::Bool(value_eq(&Value::Entry(rc.clone()), &args[0]))),
            _ => Err(EvalError::new(EvalErrorKind::Arg, "エントリが必要です")),
        }),
        "GetKey" => arity(name, args, 0).map(|_| rc.borrow().key.to_value()),
        "GetValue" => arity(name, args, 0).map(|_| rc.borrow().val.clone()),
        "SetValue" => {
            arity(name, args, 1).map(|_| rc.borrow_mut().set_value(args[0].clone()))
        }
        _ => return None,
    };
    Some(result)
}

fn dispatch_view(view: &View, name: &str, args: &[Value]) -> Option<Result<Value, EvalError>> {
    let result = match name {
        "Add" | "AddAll" => Err(EvalError::new(
            EvalErrorKind::Unsupported,
            "ビューへは追加できません",
        )),
        "Clear" => arity(name, args, 0).map(|_| {
            view.clear();
            Value::Undefined
        }),
        "Contains" => arity(name, args, 1).map(|_| Value::Bool(view.contains(&args[0]))),
        "ContainsAll" => arity(name, args, 1).and_then(|_| match &args[0] {
            Value::List(other) => {
                let items = other.borrow().s.clone();
                Ok(Value::Bool(items.iter().all(|v| view.contains(v))))
            }
            _ => Err(array_expected()),
        }),
        "Equals" => arity(name, args, 1).map(|_| {
            Value::Bool(match &args[0] {
                Value::List(other) => {
                    let mine = view.materialize();
                    let theirs = other.borrow().s.clone();
                    mine.len() == theirs.len()
                        && mine.iter().zip(theirs.iter()).all(|(a, b)| value_eq(a, b))
                }
                Value::View(_) => value_eq(&Value::View(view.clone()), &args[0]),
                _ => false,
            })
        }),
        "IsEmpty" => arity(name, args, 0).map(|_| Value::Bool(view.size() == 0)),
        "Iterator" => arity(name, args, 0).map(|_| {
            Value::MapIter(Rc::new(RefCell::new(MapIterator::new(
                view.map.clone(),
                view.select,
            ))))
        }),
        "Remove" => arity(name, args, 1).map(|_| Value::Bool(view.remove(&args[0]))),
        "RemoveAll" => arity(name, args, 1).and_then(|_| match &args[0] {
            Value::List(other) => {
                let items = other.borrow().s.clone();
                let mut found = false;
                for v in &items {
                    found = view.remove(v) || found;
                }
                Ok(Value::Bool(found))
            }
            _ => Err(array_expected()),
        }),
        "RetainAll" => arity(name, args, 1).and_then(|_| match &args[0] {
            Value::List(other) => {
                let keep = other.borrow().s.clone();
                let mut found = false;
                for item in view.materialize() {
                    if !keep.iter().any(|k| value_eq(k, &item)) {
                        found = view.remove(&item) || found;
                    }
                }
                Ok(Value::Bool(found))
            }
            _ => Err(array_expected()),
        }),
        "Size" => arity(name, args, 0).map(|_| Value::Int(view.size() as i64)),
        "ToArray" => arity(name, args, 0).map(|_| Value::list(view.materialize())),
        _ => return None,
    };
    Some(result)
}

fn dispatch_coll_iter(
    rc: &Rc<RefCell<CollectionIterator>>,
    name: &str,
    args: &[Value],
) -> Option<Result<Value, EvalError>> {
    let result = match name {
        "HasNext" => arity(name, args, 0).map(|_| Value::Bool(rc.borrow().has_next())),
        "Next" => arity(name, args, 0).and_then(|_| rc.borrow_mut().next()),
        "Remove" => arity(name, args, 0).and_then(|_| {
            rc.borrow_mut().remove()?;
            Ok(Value::Undefined)
        }),
        _ => return None,
    };
    Some(result)
}

fn dispatch_map_iter(
    rc: &Rc<RefCell<MapIterator>>,
    name: &str,
    args: &[Value],
) -> Option<Result<Value, EvalError>> {
    let result = match name {
        "HasNext" => arity(name, args, 0).map(|_| Value::Bool(rc.borrow().has_next())),
        "Next" => arity(name, args, 0).and_then(|_| rc.borrow_mut().next()),
        "Remove" => arity(name, args, 0).and_then(|_| {
            rc.borrow_mut().remove()?;
            Ok(Value::Undefined)
        }),
        _ => return None,
    };
    Some(result)
}
