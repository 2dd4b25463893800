// パス: src/evaluator.rs
// 役割: 構文木を文脈に対して歩き、出力シンクへ描画する
// 意図: 短絡評価・参照解決・マクロ展開・反復の実行規則を一箇所に集約する
// 関連ファイル: src/template.rs, src/context.rs, src/value/methods.rs
//! 評価器
//!
//! 仕様要点:
//! - `#if` の条件では未定義変数と null 結果を偽へ回復する。
//! - `or` は左辺が真なら右辺を評価せず、`and` は左辺が偽なら評価しない。
//!   `false or 1/0` はエラーになり、`false and 1/0` は偽になる。
//! - `#stop` は全スコープを貫通して評価を終える。`#break` は最寄りの
//!   ループまたはマクロ呼び出しだけを巻き戻す。
//! - `#set` で積んだ束縛は、それを含むノード列の実行が終わる時に外す。

use std::any::Any;
use std::cell::Cell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;

use once_cell::sync::Lazy;

use crate::ast::{AccessKind, AccessNode, Node, OpNode, OpVal, VarNode};
use crate::context::Ctx;
use crate::errors::{EvalError, EvalErrorKind};
use crate::template::{Template, DEFAULT_MAX_ARRAY_SIZE};
use crate::value::object::uc_first;
use crate::value::{
    methods, AnyIter, CollectionIterator, MapIterator, MapKey, Value, VtlObject,
};
use crate::value::iterator::IterSrc;
use crate::value::{value_eq, value_lt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// ノード列の実行が上位へ返す制御信号。
pub(crate) enum Flow {
    Normal,
    Break,
    Stop,
}

/// `#foreach` の本体から見えるメタオブジェクト。
///
/// `last` は「基になるイテレータが次の要素を報告しない」ことを意味する。
/// 先読みできないイテレータでは、最後の要素を消費し終えるまで真に
/// ならないことがある。
#[derive(Debug)]
struct ForeachScope {
    it: AnyIter,
    count: Cell<i64>,
}

impl VtlObject for ForeachScope {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn kind(&self) -> &str {
        "foreach"
    }

    fn call_method(&self, name: &str, args: &[Value]) -> Option<Result<Value, EvalError>> {
        if !args.is_empty() {
            return None;
        }
        let v = match name {
            "HasNext" => Value::Bool(self.it.has_next()),
            "First" => Value::Bool(self.count.get() == 1),
            "Last" => Value::Bool(!self.it.has_next()),
            "Count" => Value::Int(self.count.get()),
            "Index" => Value::Int(self.count.get() - 1),
            _ => return None,
        };
        Some(Ok(v))
    }
}

type OpFn = fn(&Value, &Value) -> Result<Value, EvalError>;

/// 固定の演算子テーブル。`or`/`and` の短絡は評価器側で先に処理される。
static OPS: Lazy<HashMap<&'static str, OpFn>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, OpFn> = HashMap::new();
    m.insert("eq", |l, r| Ok(Value::Bool(value_eq(l, r))));
    m.insert("ne", |l, r| Ok(Value::Bool(!value_eq(l, r))));
    m.insert("lt", |l, r| Ok(Value::Bool(value_lt(l, r)?)));
    m.insert("le", |l, r| {
        Ok(Value::Bool(value_lt(l, r)? || value_eq(l, r)))
    });
    m.insert("gt", |l, r| {
        Ok(Value::Bool(!(value_lt(l, r)? || value_eq(l, r))))
    });
    m.insert("ge", |l, r| Ok(Value::Bool(!value_lt(l, r)?)));
    m.insert("+", op_add);
    m.insert("-", op_sub);
    m.insert("*", op_mul);
    m.insert("/", op_div);
    m.insert("%", op_rem);
    m.insert("negate", op_negate);
    m.insert("or", |l, r| Ok(Value::Bool(l.is_true() || r.is_true())));
    m.insert("and", |l, r| Ok(Value::Bool(l.is_true() && r.is_true())));
    m.insert("not", |l, _| Ok(Value::Bool(!l.is_true())));
    m.insert("range", op_range);
    m.insert("list", |l, _| Ok(l.clone()));
    m.insert("map", op_map);
    m
});

fn nan_error() -> EvalError {
    EvalError::new(EvalErrorKind::Type, "数値が必要です")
}

fn overflow() -> EvalError {
    EvalError::new(EvalErrorKind::Overflow, "整数演算があふれました")
}

fn op_add(l: &Value, r: &Value) -> Result<Value, EvalError> {
    if !l.is_number() || !r.is_number() {
        // 数値でなければ VTL の描画形で連結する
        let mut s = crate::render::to_display(l, DEFAULT_MAX_ARRAY_SIZE)?;
        s.push_str(&crate::render::to_display(r, DEFAULT_MAX_ARRAY_SIZE)?);
        return Ok(Value::str(s));
    }
    if l.is_int_like() && r.is_int_like() {
        return l
            .as_i64()?
            .checked_add(r.as_i64()?)
            .map(Value::Int)
            .ok_or_else(overflow);
    }
    Ok(Value::Float(as_f64(l) + as_f64(r)))
}

fn op_sub(l: &Value, r: &Value) -> Result<Value, EvalError> {
    if !l.is_number() || !r.is_number() {
        return Err(nan_error());
    }
    if l.is_int_like() && r.is_int_like() {
        return l
            .as_i64()?
            .checked_sub(r.as_i64()?)
            .map(Value::Int)
            .ok_or_else(overflow);
    }
    Ok(Value::Float(as_f64(l) - as_f64(r)))
}

fn op_mul(l: &Value, r: &Value) -> Result<Value, EvalError> {
    if !l.is_number() || !r.is_number() {
        return Err(nan_error());
    }
    if l.is_int_like() && r.is_int_like() {
        return l
            .as_i64()?
            .checked_mul(r.as_i64()?)
            .map(Value::Int)
            .ok_or_else(overflow);
    }
    Ok(Value::Float(as_f64(l) * as_f64(r)))
}

fn op_div(l: &Value, r: &Value) -> Result<Value, EvalError> {
    if !l.is_number() || !r.is_number() {
        return Err(nan_error());
    }
    if as_f64(r) == 0.0 {
        return Err(EvalError::new(EvalErrorKind::DivisionByZero, "ゼロ除算です"));
    }
    if l.is_int_like() && r.is_int_like() {
        return l
            .as_i64()?
            .checked_div(r.as_i64()?)
            .map(Value::Int)
            .ok_or_else(overflow);
    }
    Ok(Value::Float(as_f64(l) / as_f64(r)))
}

fn op_rem(l: &Value, r: &Value) -> Result<Value, EvalError> {
    if !l.is_int_like() || !r.is_int_like() {
        return Err(EvalError::new(
            EvalErrorKind::Type,
            format!("剰余は整数同士でのみ定義されます（{} と {}）", l.kind(), r.kind()),
        ));
    }
    let rr = r.as_i64()?;
    if rr == 0 {
        return Err(EvalError::new(EvalErrorKind::DivisionByZero, "ゼロ除算です"));
    }
    l.as_i64()?
        .checked_rem(rr)
        .map(Value::Int)
        .ok_or_else(overflow)
}

fn op_negate(l: &Value, _: &Value) -> Result<Value, EvalError> {
    match l {
        Value::Int(i) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
        Value::Uint(u) => i64::try_from(*u)
            .ok()
            .and_then(i64::checked_neg)
            .map(Value::Int)
            .ok_or_else(overflow),
        Value::Float(f) => Ok(Value::Float(-f)),
        _ => Err(nan_error()),
    }
}

/// 範囲の端。文字列は整数として読み、浮動小数は i64 の範囲を検査する。
fn range_end(v: &Value, label: &str) -> Result<i64, EvalError> {
    match v {
        Value::Int(i) => Ok(*i),
        Value::Uint(u) => i64::try_from(*u).map_err(|_| {
            EvalError::new(
                EvalErrorKind::Overflow,
                format!("範囲の{}が int64 を超えています", label),
            )
        }),
        Value::Float(f) => {
            if *f > i64::MAX as f64 || *f < i64::MIN as f64 {
                return Err(EvalError::new(
                    EvalErrorKind::Overflow,
                    format!("範囲の{}が int64 を超えています", label),
                ));
            }
            Ok(*f as i64)
        }
        Value::Str(s) => s
            .as_str()
            .parse::<i64>()
            .map_err(|_| nan_error()),
        _ => Err(nan_error()),
    }
}

fn op_range(l: &Value, r: &Value) -> Result<Value, EvalError> {
    let start = range_end(l, "始端")?;
    let end = range_end(r, "終端")?;
    Ok(Value::Range(crate::value::VRange::new(start, end)))
}

/// マップリテラル。平坦な [k1, v1, k2, v2, …] から構築する。
fn op_map(l: &Value, _: &Value) -> Result<Value, EvalError> {
    let mut m = crate::value::VMap::new();
    if let Value::List(rc) = l {
        let items = rc.borrow().s.clone();
        let mut i = 0;
        while i + 1 < items.len() {
            m.put(MapKey::from_value(&items[i]), items[i + 1].clone());
            i += 2;
        }
    }
    Ok(Value::map(m))
}

fn as_f64(v: &Value) -> f64 {
    v.as_f64().unwrap_or(0.0)
}

fn write_out(w: &mut dyn Write, data: &[u8]) -> Result<(), EvalError> {
    w.write_all(data)
        .map_err(|e| EvalError::new(EvalErrorKind::Resource, format!("書き込みに失敗: {}", e)))
}

impl Template {
    /// ノード列を実行する。ここで積まれた `#set` の束縛は戻り際に外す。
    pub(crate) fn execute_list(
        &self,
        w: &mut dyn Write,
        items: &[Node],
        ctx: &mut Ctx,
    ) -> Result<Flow, EvalError> {
        if ctx.call_depth > self.max_call_depth {
            return Err(EvalError::new(
                EvalErrorKind::CallDepthExceeded,
                "呼び出し深さの上限を超えました",
            ));
        }
        let mut pops: Vec<(usize, String)> = Vec::new();
        let result = self.run_items(w, items, ctx, &mut pops);
        for (depth, name) in pops.iter().rev() {
            ctx.pop(*depth, name);
        }
        result
    }

    fn run_items(
        &self,
        w: &mut dyn Write,
        items: &[Node],
        ctx: &mut Ctx,
        pops: &mut Vec<(usize, String)>,
    ) -> Result<Flow, EvalError> {
        for node in items {
            match node {
                Node::Text(t) => write_out(w, t.as_bytes())?,
                Node::Var(n) => self.emit_var(w, n, ctx)?,
                Node::Set(n) => {
                    let val = match self.eval(&n.expr, ctx, false) {
                        Ok(v) => v,
                        Err(e) if e.kind == EvalErrorKind::NilResult => Value::Undefined,
                        Err(e) => return Err(e),
                    };
                    if n.var.items.is_empty() {
                        let depth = ctx.push(&n.var.name, val);
                        pops.push((depth, n.var.name.clone()));
                    } else if !matches!(val, Value::Undefined) {
                        self.set_var(&n.var, val, ctx)?;
                    }
                }
                Node::If(ifnode) => {
                    let mut arm = Some(ifnode);
                    while let Some(cur) = arm {
                        let taken = match &cur.cond {
                            None => true,
                            Some(cond) => match self.eval(cond, ctx, true) {
                                Ok(v) => v.is_true(),
                                Err(e)
                                    if matches!(
                                        e.kind,
                                        EvalErrorKind::UndefinedVar | EvalErrorKind::NilResult
                                    ) =>
                                {
                                    false
                                }
                                Err(e) => return Err(e),
                            },
                        };
                        if taken {
                            match self.execute_list(w, &cur.items, ctx)? {
                                Flow::Normal => {}
                                other => return Ok(other),
                            }
                            break;
                        }
                        arm = cur.els.as_deref();
                    }
                }
                Node::Foreach(n) => match self.run_foreach(w, n, ctx)? {
                    Flow::Normal => {}
                    other => return Ok(other),
                },
                Node::MacroDef(n) => {
                    let mut macros = self.macros.lock().expect("マクロ表のロック");
                    // 最初の定義が勝つ。再定義は黙って無視する
                    macros
                        .entry(n.name.clone())
                        .or_insert_with(|| std::sync::Arc::new(n.clone()));
                }
                Node::MacroCall(n) => {
                    let def = {
                        let macros = self.macros.lock().expect("マクロ表のロック");
                        macros.get(&n.name).cloned()
                    };
                    let Some(def) = def else {
                        return Err(EvalError::at(
                            EvalErrorKind::Arg,
                            format!("未定義のマクロ '{}' の呼び出しです", n.name),
                            n.pos.line,
                        ));
                    };
                    if n.vals.len() < def.params.len() {
                        return Err(EvalError::at(
                            EvalErrorKind::Arg,
                            format!("変数 ${} が設定されていません", def.params[n.vals.len()]),
                            n.pos.line,
                        ));
                    }
                    // 余分な実引数は評価すらしない
                    for (i, param) in def.params.iter().enumerate() {
                        let v = self.eval(&n.vals[i], ctx, false)?;
                        let depth = ctx.push(param, v);
                        pops.push((depth, param.clone()));
                    }
                    ctx.call_depth += 1;
                    let flow = self.execute_list(w, &def.items, ctx);
                    ctx.call_depth -= 1;
                    match flow? {
                        Flow::Stop => return Ok(Flow::Stop),
                        // #break はマクロ呼び出しを終えるだけ
                        Flow::Break | Flow::Normal => {}
                    }
                }
                Node::Include(n) => {
                    for name_expr in &n.names {
                        let v = self.eval(name_expr, ctx, false)?;
                        let file = self.textual_name(&v).ok_or_else(|| {
                            EvalError::at(
                                EvalErrorKind::Arg,
                                "無効な #include 引数です",
                                n.pos.line,
                            )
                        })?;
                        let data = self.read_resource(&file, n.pos.line)?;
                        write_out(w, &data)?;
                    }
                }
                Node::Parse(n) => {
                    let v = self.eval(&n.name, ctx, false)?;
                    let file = self.textual_name(&v).ok_or_else(|| {
                        EvalError::at(EvalErrorKind::Arg, "無効な #parse 引数です", n.pos.line)
                    })?;
                    let data = self.read_resource(&file, n.pos.line)?;
                    let src = String::from_utf8_lossy(&data).into_owned();
                    let sub = self.subtemplate(&src, n.pos.line)?;
                    ctx.call_depth += 1;
                    let flow = sub.execute_list(w, &sub.tree, ctx);
                    ctx.call_depth -= 1;
                    if flow? == Flow::Stop {
                        return Ok(Flow::Stop);
                    }
                }
                Node::Evaluate(n) => {
                    let v = self.eval(&n.content, ctx, false)?;
                    let src = match &v {
                        Value::Str(s) => s.0.clone(),
                        other => crate::render::to_display(other, self.max_array_size)?,
                    };
                    let sub = self.subtemplate(&src, n.pos.line)?;
                    ctx.call_depth += 1;
                    let flow = sub.execute_list(w, &sub.tree, ctx);
                    ctx.call_depth -= 1;
                    if flow? == Flow::Stop {
                        return Ok(Flow::Stop);
                    }
                }
                Node::Stop(_) => return Ok(Flow::Stop),
                Node::Break(_) => return Ok(Flow::Break),
            }
        }
        Ok(Flow::Normal)
    }

    /// 参照ノードを描画して書き出す。
    fn emit_var(&self, w: &mut dyn Write, n: &VarNode, ctx: &mut Ctx) -> Result<(), EvalError> {
        let v = match self.eval_var(n, ctx) {
            Ok(v) => v,
            Err(e) if n.silent && e.kind == EvalErrorKind::NilResult => return Ok(()),
            Err(e) => return Err(e),
        };
        if matches!(v, Value::Undefined) {
            return Ok(());
        }
        let mut buf = crate::render::take_buf();
        let mut path = Vec::new();
        let result = crate::render::vtl_print(&mut buf, &v, &mut path, self.max_array_size);
        match result {
            Ok(()) => {
                let write_result = write_out(w, buf.as_bytes());
                crate::render::put_buf(buf);
                write_result
            }
            Err(e) => {
                crate::render::put_buf(buf);
                Err(e.fill_line(n.pos.line))
            }
        }
    }

    fn run_foreach(
        &self,
        w: &mut dyn Write,
        n: &crate::ast::ForeachNode,
        ctx: &mut Ctx,
    ) -> Result<Flow, EvalError> {
        let iterable = self.eval(&n.iter, ctx, false)?;
        if matches!(iterable, Value::Undefined) {
            return Ok(Flow::Normal);
        }
        let it = make_iter(&iterable).map_err(|e| e.fill_line(n.pos.line))?;
        let scope = Rc::new(ForeachScope {
            it,
            count: Cell::new(0),
        });
        let fdepth = ctx.push("foreach", Value::Object(scope.clone()));
        let vdepth = ctx.push(&n.var, Value::Undefined);
        let mut empty = true;
        let mut flow = Flow::Normal;
        while scope.it.has_next() {
            scope.count.set(scope.count.get() + 1);
            if let Some(max) = self.max_iterations {
                if scope.count.get() > max {
                    return Err(EvalError::at(
                        EvalErrorKind::IterationLimitExceeded,
                        "反復回数の上限を超えました",
                        n.pos.line,
                    ));
                }
            }
            empty = false;
            let item = scope.it.next()?;
            ctx.set(vdepth, &n.var, item);
            match self.execute_list(w, &n.items, ctx)? {
                Flow::Normal => {}
                Flow::Break => break,
                Flow::Stop => {
                    flow = Flow::Stop;
                    break;
                }
            }
        }
        if empty {
            if let Some(els) = &n.els {
                match self.execute_list(w, els, ctx)? {
                    Flow::Stop => flow = Flow::Stop,
                    Flow::Break | Flow::Normal => {}
                }
            }
        }
        ctx.pop(vdepth, &n.var);
        ctx.pop(fdepth, "foreach");
        Ok(flow)
    }

    /// 式を評価する。`undef_ok` は `#if` 条件内での未定義回復を許す。
    pub(crate) fn eval(
        &self,
        e: &OpNode,
        ctx: &mut Ctx,
        undef_ok: bool,
    ) -> Result<Value, EvalError> {
        if !e.op.is_empty() {
            let Some(f) = OPS.get(e.op) else {
                return Err(EvalError::at(
                    EvalErrorKind::Unsupported,
                    format!("未対応の演算子です: {}", e.op),
                    e.pos.line,
                ));
            };
            let left = match &e.left {
                Some(l) => self.eval_operand(l, ctx, undef_ok)?,
                None => Value::Undefined,
            };
            // 短絡: 真の or は右辺を見ず、偽の and も右辺を見ない
            match e.op {
                "or" if left.is_true() => return Ok(Value::Bool(true)),
                "and" if !left.is_true() => return Ok(Value::Bool(false)),
                _ => {}
            }
            let right = match &e.right {
                Some(r) => self.eval_operand(r, ctx, undef_ok)?,
                None => Value::Undefined,
            };
            return f(&left, &right).map_err(|err| err.fill_line(e.pos.line));
        }
        match &e.val {
            None => Ok(Value::Undefined),
            Some(OpVal::Int(i)) => Ok(Value::Int(*i)),
            Some(OpVal::Float(f)) => Ok(Value::Float(*f)),
            Some(OpVal::Bool(b)) => Ok(Value::Bool(*b)),
            Some(OpVal::Str(s)) => Ok(Value::str(s.clone())),
            Some(OpVal::Var(var)) => self.eval_var(var, ctx),
            Some(OpVal::Interp(items)) => {
                let mut buf: Vec<u8> = Vec::new();
                self.execute_list(&mut buf, items, ctx)?;
                Ok(Value::str(String::from_utf8_lossy(&buf).into_owned()))
            }
            Some(OpVal::Args(args)) => {
                let mut out = Vec::with_capacity(args.len());
                for a in args {
                    let v = self.eval(a, ctx, false)?;
                    out.push(v);
                }
                Ok(Value::list(out))
            }
        }
    }

    fn eval_operand(
        &self,
        e: &OpNode,
        ctx: &mut Ctx,
        undef_ok: bool,
    ) -> Result<Value, EvalError> {
        match self.eval(e, ctx, undef_ok) {
            Ok(v) => Ok(v),
            Err(err) if undef_ok && err.kind == EvalErrorKind::UndefinedVar => {
                Ok(Value::Undefined)
            }
            Err(err) => Err(err),
        }
    }

    /// 参照を解決する。最終結果が null なら NilResult として報告する。
    pub(crate) fn eval_var(&self, n: &VarNode, ctx: &mut Ctx) -> Result<Value, EvalError> {
        let mut v = ctx.get(&n.name).map_err(|e| e.fill_line(n.pos.line))?;
        for step in &n.items {
            v = self.eval_step(v, step, ctx)?;
        }
        if matches!(v, Value::Null) {
            return Err(EvalError::at(
                EvalErrorKind::NilResult,
                format!("${} の結果が null です", n.name),
                n.pos.line,
            ));
        }
        Ok(v)
    }

    fn eval_step(
        &self,
        v: Value,
        step: &AccessNode,
        ctx: &mut Ctx,
    ) -> Result<Value, EvalError> {
        let mut args = Vec::with_capacity(step.args.len());
        for a in &step.args {
            args.push(self.eval(a, ctx, false)?);
        }
        let out = match step.kind {
            AccessKind::Method => self.call_value(&v, &step.name, &args),
            AccessKind::Index => self.call_value(&v, "get", &args),
            AccessKind::Property => self.property(&v, &step.name),
        };
        out.map_err(|e| e.fill_line(step.pos.line))
    }

    fn call_value(&self, v: &Value, name: &str, args: &[Value]) -> Result<Value, EvalError> {
        if matches!(v, Value::Undefined | Value::Null) {
            return Err(EvalError::new(
                EvalErrorKind::PropertyAccess,
                format!("nil 値の {} は呼び出せません", name),
            ));
        }
        match methods::try_call(&self.method_cache, v, name, args)? {
            Some(out) => Ok(out),
            None => Err(EvalError::new(
                EvalErrorKind::PropertyAccess,
                format!("{} 値の {} を呼び出せません", v.kind(), name),
            )),
        }
    }

    /// プロパティ解決: 公開フィールド → メソッド候補 → 1 引数 `get`。
    fn property(&self, v: &Value, name: &str) -> Result<Value, EvalError> {
        if matches!(v, Value::Undefined | Value::Null) {
            return Err(EvalError::new(
                EvalErrorKind::PropertyAccess,
                format!("nil 値のプロパティ {} を取得できません", name),
            ));
        }
        if let Value::Object(obj) = v {
            if let Some(val) = obj
                .get_property(name)
                .or_else(|| obj.get_property(&uc_first(name)))
            {
                return Ok(val);
            }
        }
        if let Ok(Some(val)) = methods::try_call(&self.method_cache, v, name, &[]) {
            return Ok(val);
        }
        if methods::has_get(v) {
            if let Ok(Some(val)) =
                methods::try_call(&self.method_cache, v, "get", &[Value::str(name)])
            {
                return Ok(val);
            }
        }
        Err(EvalError::new(
            EvalErrorKind::PropertyAccess,
            format!("{} 値のプロパティ {} を取得できません", v.kind(), name),
        ))
    }

    /// 代入の左辺を歩く。最後のステップ以外はプロパティ解決で辿る。
    fn set_var(&self, n: &VarNode, val: Value, ctx: &mut Ctx) -> Result<(), EvalError> {
        let mut v = ctx.get(&n.name).map_err(|e| e.fill_line(n.pos.line))?;
        for step in &n.items[..n.items.len() - 1] {
            v = self.eval_step(v, step, ctx)?;
        }
        let last = &n.items[n.items.len() - 1];
        if matches!(v, Value::Undefined | Value::Null) {
            return Err(EvalError::at(
                EvalErrorKind::Set,
                format!("nil 値へ {} を設定できません", last.name),
                last.pos.line,
            ));
        }
        match last.kind {
            AccessKind::Property => {
                match &v {
                    Value::Object(obj) => {
                        let setter = format!("Set{}", uc_first(&last.name));
                        if let Some(result) = obj.call_method(&setter, &[val.clone()]) {
                            result?;
                            return Ok(());
                        }
                        if let Some(result) = obj
                            .call_method("Put", &[Value::str(last.name.clone()), val.clone()])
                        {
                            result?;
                            return Ok(());
                        }
                    }
                    Value::Map(rc) => {
                        rc.borrow_mut().put(MapKey::string(&last.name), val);
                        return Ok(());
                    }
                    _ => {}
                }
                Err(EvalError::at(
                    EvalErrorKind::Set,
                    format!("{} 値へ {} を設定できません", v.kind(), last.name),
                    last.pos.line,
                ))
            }
            AccessKind::Index => {
                let idx = self.eval(&last.args[0], ctx, false)?;
                match &v {
                    Value::List(rc) => {
                        let i = idx.as_i64().map_err(|e| e.fill_line(last.pos.line))?;
                        rc.borrow_mut()
                            .set(i, val)
                            .map_err(|e| e.fill_line(last.pos.line))?;
                        Ok(())
                    }
                    Value::Map(rc) => {
                        rc.borrow_mut().put(MapKey::from_value(&idx), val);
                        Ok(())
                    }
                    Value::Object(obj) => {
                        if let Some(result) = obj.call_method("Set", &[idx.clone(), val.clone()])
                        {
                            result?;
                            return Ok(());
                        }
                        if let Some(result) = obj.call_method("Put", &[idx, val]) {
                            result?;
                            return Ok(());
                        }
                        Err(EvalError::at(
                            EvalErrorKind::Set,
                            format!("{} 値へ添字を設定できません", v.kind()),
                            last.pos.line,
                        ))
                    }
                    _ => Err(EvalError::at(
                        EvalErrorKind::Set,
                        format!("{} 値へ添字を設定できません", v.kind()),
                        last.pos.line,
                    )),
                }
            }
            AccessKind::Method => Err(EvalError::at(
                EvalErrorKind::Set,
                format!("{} を {} 値へ設定できません", last.name, v.kind()),
                last.pos.line,
            )),
        }
    }

    /// #include / #parse の引数から論理名を得る。
    fn textual_name(&self, v: &Value) -> Option<String> {
        match v {
            Value::Str(s) => Some(s.0.clone()),
            Value::Object(obj) => obj.to_display(),
            _ => None,
        }
    }
}

/// 反復対象からイテレータを作る。ビューはライブ投影として反復できる。
fn make_iter(v: &Value) -> Result<AnyIter, EvalError> {
    Ok(match v {
        Value::List(rc) => AnyIter::Coll(Rc::new(std::cell::RefCell::new(
            CollectionIterator::new(IterSrc::List(rc.clone())),
        ))),
        Value::Range(r) => AnyIter::Coll(Rc::new(std::cell::RefCell::new(
            CollectionIterator::new(IterSrc::Range(*r)),
        ))),
        Value::Map(rc) => {
            // マップはキー昇順の値列として回す
            let values: Vec<Value> = rc.borrow().iter().map(|(_, v)| v.clone()).collect();
            AnyIter::Coll(Rc::new(std::cell::RefCell::new(CollectionIterator::new(
                IterSrc::Items(values),
            ))))
        }
        Value::View(view) => AnyIter::Map(Rc::new(std::cell::RefCell::new(MapIterator::new(
            view.map.clone(),
            view.select,
        )))),
        Value::ListIter(rc) => AnyIter::Coll(rc.clone()),
        Value::MapIter(rc) => AnyIter::Map(rc.clone()),
        other => {
            return Err(EvalError::new(
                EvalErrorKind::Type,
                format!("{} は反復できません", other.kind()),
            ))
        }
    })
}
