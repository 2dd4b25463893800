// パス: src/render.rs
// 役割: 値を VTL 形式のテキストへ描画する
// 意図: 循環する値グラフでも停止し、数値の書式を原語実装と一致させる
// 関連ファイル: src/value/mod.rs, src/evaluator.rs
//! 描画（vtl_print）
//!
//! - 循環検出は現在の降下経路上の（ポインタ, 種別）集合で行う。
//! - 浮動小数は `%G` 風: 必要最小の桁、指数は E 表記、先頭の `+` を 1 個
//!   取り除き、小数点が無ければ `.0` を後置する。
//! - マップはキー昇順、リスト・範囲は `[a, b, …]`、エントリは `k=v`。
//! - 入れ子の描画バッファはスレッドローカルのプールから借りる。

use std::cell::RefCell;
use std::rc::Rc;

use crate::errors::{EvalError, EvalErrorKind};
use crate::value::{Value, ViewSelect};

thread_local! {
    static BUF_POOL: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// プールから描画バッファを借りる。
pub fn take_buf() -> String {
    BUF_POOL.with(|pool| pool.borrow_mut().pop()).unwrap_or_default()
}

/// バッファをプールへ返す。
pub fn put_buf(mut buf: String) {
    buf.clear();
    BUF_POOL.with(|pool| {
        let mut pool = pool.borrow_mut();
        if pool.len() < 8 {
            pool.push(buf);
        }
    });
}

/// 降下経路上の既出判定に使う識別子。
type PathId = (usize, u8);

fn container_id(v: &Value) -> Option<PathId> {
    match v {
        Value::List(rc) => Some((Rc::as_ptr(rc) as usize, 1)),
        Value::Map(rc) => Some((Rc::as_ptr(rc) as usize, 2)),
        Value::Entry(rc) => Some((Rc::as_ptr(rc) as usize, 3)),
        Value::View(view) => Some((Rc::as_ptr(&view.map) as usize, 4)),
        Value::ListIter(rc) => Some((Rc::as_ptr(rc) as usize, 5)),
        Value::MapIter(rc) => Some((Rc::as_ptr(rc) as usize, 6)),
        _ => None,
    }
}

/// 値を文字列として描画する。
pub fn to_display(v: &Value, max_array: usize) -> Result<String, EvalError> {
    let mut out = String::new();
    let mut path = Vec::new();
    vtl_print(&mut out, v, &mut path, max_array)?;
    Ok(out)
}

/// 値を `out` へ描画する。`path` は現在の降下経路。
pub fn vtl_print(
    out: &mut String,
    v: &Value,
    path: &mut Vec<PathId>,
    max_array: usize,
) -> Result<(), EvalError> {
    if let Some(id) = container_id(v) {
        if path.contains(&id) {
            return Err(EvalError::new(
                EvalErrorKind::CycleDetected,
                "循環参照を検出しました",
            ));
        }
        path.push(id);
        let result = print_container(out, v, path, max_array);
        path.pop();
        return result;
    }
    match v {
        Value::Undefined | Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(i) => out.push_str(&i.to_string()),
        Value::Uint(u) => out.push_str(&u.to_string()),
        Value::Float(f) => out.push_str(&format_float(*f)),
        Value::Str(s) => out.push_str(s.as_str()),
        Value::Range(r) => {
            if r.size() > max_array {
                return Err(EvalError::new(
                    EvalErrorKind::ArrayTooLarge,
                    "範囲のサイズが大きすぎます",
                ));
            }
            out.push('[');
            for i in 0..r.size() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&r.at(i).to_string());
            }
            out.push(']');
        }
        Value::Object(obj) => match obj.to_display() {
            Some(s) => out.push_str(&s),
            None => {
                out.push('{');
                for (i, (name, val)) in obj.fields().into_iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(name);
                    out.push(':');
                    vtl_print(out, &val, path, max_array)?;
                }
                out.push('}');
            }
        },
        // コンテナ類は container_id 経由で処理済み
        _ => {}
    }
    Ok(())
}

fn print_container(
    out: &mut String,
    v: &Value,
    path: &mut Vec<PathId>,
    max_array: usize,
) -> Result<(), EvalError> {
    match v {
        Value::List(rc) => {
            let items = rc.borrow().s.clone();
            print_list(out, &items, path, max_array, "配列のサイズが大きすぎます")
        }
        Value::Map(rc) => {
            let entries: Vec<_> = rc
                .borrow()
                .iter()
                .map(|(k, val)| (k.text().to_string(), val.clone()))
                .collect();
            out.push('{');
            for (i, (k, val)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(k);
                out.push('=');
                vtl_print(out, val, path, max_array)?;
            }
            out.push('}');
            Ok(())
        }
        Value::Entry(rc) => {
            let (k, val) = {
                let e = rc.borrow();
                (e.key.text().to_string(), e.val.clone())
            };
            out.push_str(&k);
            out.push('=');
            vtl_print(out, &val, path, max_array)
        }
        Value::View(view) => {
            let items = view.materialize();
            let msg = match view.select {
                ViewSelect::Keys => "キービューのサイズが大きすぎます",
                ViewSelect::Values => "値ビューのサイズが大きすぎます",
                ViewSelect::Entries => "エントリビューのサイズが大きすぎます",
            };
            print_list(out, &items, path, max_array, msg)
        }
        Value::ListIter(rc) => {
            let items: Vec<Value> = {
                let it = rc.borrow();
                let mut probe = Vec::new();
                // 消費せずに残り要素を覗く
                let mut i = 0;
                loop {
                    match peek_coll(&it, i) {
                        Some(v) => probe.push(v),
                        None => break,
                    }
                    i += 1;
                }
                probe
            };
            print_list(out, &items, path, max_array, "イテレータのサイズが大きすぎます")
        }
        Value::MapIter(rc) => {
            let items = rc.borrow().remaining();
            print_list(out, &items, path, max_array, "イテレータのサイズが大きすぎます")
        }
        _ => Ok(()),
    }
}

/// CollectionIterator の未消費部分を添字で覗く。
fn peek_coll(it: &crate::value::CollectionIterator, offset: usize) -> Option<Value> {
    it.peek_at(offset)
}

fn print_list(
    out: &mut String,
    items: &[Value],
    path: &mut Vec<PathId>,
    max_array: usize,
    too_large: &str,
) -> Result<(), EvalError> {
    if items.len() > max_array {
        return Err(EvalError::new(EvalErrorKind::ArrayTooLarge, too_large));
    }
    out.push('[');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        vtl_print(out, item, path, max_array)?;
    }
    out.push(']');
    Ok(())
}

/// Go の `%G` 相当で浮動小数を書式化し、先頭の `+` を 1 個取り除いて
/// 小数点が無ければ `.0` を後置する。
pub fn format_float(f: f64) -> String {
    let base = format_g(f);
    let stripped = base.replacen('+', "", 1);
    if base.contains('.') {
        stripped
    } else {
        format!("{}.0", stripped)
    }
}

/// 必要最小の桁で、指数が -4 未満または 21 以上のとき E 表記へ切り替える。
fn format_g(f: f64) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    let sci = format!("{:e}", f); // 例: "1.5e2", "-3e-5"
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    if exp < -4 || exp >= 21 {
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{}E{}{:02}", mantissa, sign, exp.abs());
    }
    // 通常表記は f64 の既定表示が最短桁になる
    format!("{}", f)
}
