// パス: tests/user_objects.rs
// 役割: 利用者定義オブジェクトの公開面とメソッド名解決を検証する
// 意図: VtlObject トレイト経由の get/Get/Is 解決と描画上書きを固定する
// 関連ファイル: src/value/object.rs, src/evaluator.rs
#[path = "test_support.rs"]
mod support;

use std::any::Any;
use std::rc::Rc;

use support::render;
use veltl::errors::{EvalError, EvalErrorKind};
use veltl::value::{Value, VtlObject};

/// テンプレートへ公開する情報提供オブジェクト。
#[derive(Debug)]
struct Provider {
    title: String,
    state: bool,
}

impl VtlObject for Provider {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn kind(&self) -> &str {
        "provider"
    }

    fn get_property(&self, name: &str) -> Option<Value> {
        match name {
            "Title" => Some(Value::str(self.title.clone())),
            "State" => Some(Value::Bool(self.state)),
            _ => None,
        }
    }

    fn call_method(&self, name: &str, args: &[Value]) -> Option<Result<Value, EvalError>> {
        match name {
            "GetName" if args.is_empty() => Some(Ok(Value::str("jason"))),
            "GetList" if args.is_empty() => Some(Ok(Value::list(vec![
                Value::str("list element 1"),
                Value::str("list element 2"),
            ]))),
            "IsOnline" if args.is_empty() => Some(Ok(Value::Bool(true))),
            "Chop" if args.len() == 2 => {
                let (Value::Str(s), Ok(n)) = (&args[0], args[1].as_i64()) else {
                    return Some(Err(EvalError::new(
                        EvalErrorKind::Arg,
                        "Chop は (文字列, 整数) を取ります",
                    )));
                };
                let keep = s.0.len().saturating_sub(n as usize);
                Some(Ok(Value::str(s.0[..keep].to_string())))
            }
            "Get" if args.len() == 1 => match &args[0] {
                Value::Str(k) => Some(Ok(Value::str(format!("get:{}", k.0)))),
                _ => Some(Ok(Value::Null)),
            },
            _ => None,
        }
    }

    fn fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("Title", Value::str(self.title.clone())),
            ("State", Value::Bool(self.state)),
        ]
    }
}

/// toString 相当で描画を上書きするオブジェクト。
#[derive(Debug)]
struct Named;

impl VtlObject for Named {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn to_display(&self) -> Option<String> {
        Some("test provider".to_string())
    }
}

fn provider() -> Value {
    Value::Object(Rc::new(Provider {
        title: "lunatic".to_string(),
        state: false,
    }))
}

#[test]
/// 公開フィールドが小文字のプロパティ名からも見えることを検証する。
fn exported_fields() {
    assert_eq!(render("$p.title", vec![("p", provider())]), "lunatic");
    assert_eq!(render("$p.Title", vec![("p", provider())]), "lunatic");
    assert_eq!(render("$p.state", vec![("p", provider())]), "false");
}

#[test]
/// Get/Is 前置のメソッドがプロパティ表記で解決されることを検証する。
fn getter_resolution() {
    assert_eq!(render("$p.name", vec![("p", provider())]), "jason");
    assert_eq!(render("$p.getName()", vec![("p", provider())]), "jason");
    assert_eq!(render("$p.online", vec![("p", provider())]), "true");
    assert_eq!(
        render("$p.list", vec![("p", provider())]),
        "[list element 1, list element 2]"
    );
}

#[test]
/// 引数つきメソッド呼び出しと 1 引数 Get フォールバックを検証する。
fn method_calls_and_get_fallback() {
    assert_eq!(
        render("$p.chop('lunatic', 3)", vec![("p", provider())]),
        "luna"
    );
    // どの候補にも当たらない名前は Get(name) に落ちる
    assert_eq!(render("$p.whatever", vec![("p", provider())]), "get:whatever");
}

#[test]
/// toString 相当の上書きと既定のフィールド描画を検証する。
fn rendering() {
    assert_eq!(
        render("$n", vec![("n", Value::Object(Rc::new(Named)))]),
        "test provider"
    );
    assert_eq!(
        render("$p", vec![("p", provider())]),
        "{Title:lunatic, State:false}"
    );
}

#[test]
/// kind 上書きがエラーメッセージの型ラベルに現れることを検証する。
fn kind_label_in_errors() {
    let tmpl = veltl::parse("#foreach($x in $p)#end", ".", None).expect("解析");
    let mut out: Vec<u8> = Vec::new();
    let err = tmpl
        .execute(&mut out, vec![("p".to_string(), provider())])
        .expect_err("反復できない");
    let msg = err.to_string();
    assert!(msg.contains("provider"), "型ラベルを含む: {}", msg);
}

#[test]
/// メソッド名の解決結果がキャッシュされても同じ答えになることを検証する。
fn repeated_calls_hit_cache() {
    assert_eq!(
        render(
            "#foreach($i in [1..3])$p.name#end",
            vec![("p", provider())]
        ),
        "jasonjasonjason"
    );
}

#[test]
/// オブジェクトの null 戻り値が NilResult として扱われることを検証する。
fn null_return_is_nil_result() {
    let tmpl = veltl::parse("$p.get(1)", ".", None).expect("解析");
    let mut out: Vec<u8> = Vec::new();
    let err = tmpl
        .execute(&mut out, vec![("p".to_string(), provider())])
        .expect_err("null 結果");
    assert!(matches!(
        err,
        veltl::TemplateError::Eval(e) if e.kind == EvalErrorKind::NilResult
    ));
    // サイレント参照なら空出力に回復する
    assert_eq!(render("[$!{p}]", vec![("p", Value::Null)]), "[]");
}
