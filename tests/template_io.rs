// パス: tests/template_io.rs
// 役割: ファイル読込・#include・#parse・ライブラリ・#evaluate を検証する
// 意図: リソースリーダ境界の挙動とマクロライブラリの種まきを固定する
// 関連ファイル: src/template.rs, src/evaluator.rs
#[path = "test_support.rs"]
mod support;

use std::fs;
use std::io;
use std::sync::Arc;

use veltl::errors::EvalErrorKind;
use veltl::template::{parse_with_reader, ResourceReader, TemplateError};
use veltl::value::Value;

/// メモリ上の名前→内容表で応えるテスト用リーダ。
struct MemReader(Vec<(&'static str, &'static str)>);

impl ResourceReader for MemReader {
    fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        self.0
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, body)| body.as_bytes().to_vec())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, name.to_string()))
    }
}

fn run(tmpl: &veltl::Template, bindings: Vec<(&str, Value)>) -> Result<String, TemplateError> {
    let mut out: Vec<u8> = Vec::new();
    tmpl.execute(
        &mut out,
        bindings
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect::<Vec<_>>(),
    )?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

#[test]
/// #include が内容を解析せずそのまま写すことを検証する。
fn include_copies_verbatim() {
    let reader = Arc::new(MemReader(vec![("raw.vm", "$not #parsed")]));
    let tmpl = parse_with_reader("[#include('raw.vm')]", reader, None).expect("解析");
    assert_eq!(run(&tmpl, vec![]).expect("実行"), "[$not #parsed]");
}

#[test]
/// #include が複数の名前を順に写すことを検証する。
fn include_multiple_names() {
    let reader = Arc::new(MemReader(vec![("a.txt", "A"), ("b.txt", "B")]));
    let tmpl = parse_with_reader("#include('a.txt', 'b.txt')", reader, None).expect("解析");
    assert_eq!(run(&tmpl, vec![]).expect("実行"), "AB");
}

#[test]
/// #parse が現在の文脈でコンパイル・実行されることを検証する。
fn parse_directive_shares_context() {
    let reader = Arc::new(MemReader(vec![("inner.vm", "Hello $name")]));
    let tmpl = parse_with_reader("#parse('inner.vm')!", reader, None).expect("解析");
    assert_eq!(
        run(&tmpl, vec![("name", Value::str("World"))]).expect("実行"),
        "Hello World!"
    );
}

#[test]
/// #parse した側で #set した束縛が呼び出し元から見えることを検証する。
fn parse_directive_bindings_leak_back() {
    let reader = Arc::new(MemReader(vec![("def.vm", "#set($fromInner = 42)")]));
    let tmpl = parse_with_reader("#parse('def.vm')$fromInner", reader, None).expect("解析");
    assert_eq!(run(&tmpl, vec![]).expect("実行"), "42");
}

#[test]
/// 見つからないリソースが ResourceError になることを検証する。
fn missing_resource_reports_kind() {
    let reader = Arc::new(MemReader(vec![]));
    let tmpl = parse_with_reader("#include('nope.vm')", reader, None).expect("解析");
    match run(&tmpl, vec![]).expect_err("読めない") {
        TemplateError::Eval(e) => assert_eq!(e.kind, EvalErrorKind::Resource),
        other => panic!("Eval エラーを期待しましたが {:?}", other),
    }
}

#[test]
/// 文字列以外の #include 引数が拒まれることを検証する。
fn include_argument_must_be_textual() {
    let reader = Arc::new(MemReader(vec![]));
    let tmpl = parse_with_reader("#include([0..1])", reader, None).expect("解析");
    match run(&tmpl, vec![]).expect_err("無効な引数") {
        TemplateError::Eval(e) => assert_eq!(e.kind, EvalErrorKind::Arg),
        other => panic!("Eval エラーを期待しましたが {:?}", other),
    }
}

#[test]
/// ライブラリのマクロが本体の解析前に登録されることを検証する。
fn macro_library_seeds_parser() {
    let reader = Arc::new(MemReader(vec![(
        "lib.vm",
        "#macro(hi $who)Hi $who!#end",
    )]));
    let tmpl = parse_with_reader("#hi('there')", reader, Some("lib.vm")).expect("解析");
    assert_eq!(run(&tmpl, vec![]).expect("実行"), "Hi there!");
}

#[test]
/// #parse したテンプレートでもライブラリのマクロが使えることを検証する。
fn parsed_template_inherits_macros() {
    let reader = Arc::new(MemReader(vec![
        ("lib.vm", "#macro(hi)HI#end"),
        ("inner.vm", "#hi()"),
    ]));
    let tmpl = parse_with_reader("#parse('inner.vm')", reader, Some("lib.vm")).expect("解析");
    assert_eq!(run(&tmpl, vec![]).expect("実行"), "HI");
}

#[test]
/// #evaluate が文字列を解析して現在の文脈で実行することを検証する。
fn evaluate_directive() {
    let reader = Arc::new(MemReader(vec![]));
    let tmpl = parse_with_reader(
        "#set($src = '#set($x = 2 + 2)$x')#evaluate($src)",
        reader,
        None,
    )
    .expect("解析");
    assert_eq!(run(&tmpl, vec![]).expect("実行"), "4");
}

#[test]
/// #evaluate の壊れた入力が実行時 Parse エラーになることを検証する。
fn evaluate_reports_parse_failure() {
    let reader = Arc::new(MemReader(vec![]));
    let tmpl =
        parse_with_reader("#evaluate('#if(true)unclosed')", reader, None).expect("解析");
    match run(&tmpl, vec![]).expect_err("壊れた入力") {
        TemplateError::Eval(e) => assert_eq!(e.kind, EvalErrorKind::Parse),
        other => panic!("Eval エラーを期待しましたが {:?}", other),
    }
}

#[test]
/// parse_file と FsReader の連携を一時ディレクトリで検証する。
fn parse_file_with_fs_reader() {
    let dir = tempfile::tempdir().expect("一時ディレクトリ");
    fs::write(dir.path().join("main.vm"), "#parse('sub.vm') $tail").expect("main");
    fs::write(dir.path().join("sub.vm"), "sub=$v").expect("sub");
    let tmpl = veltl::parse_file("main.vm", dir.path(), None).expect("解析");
    let out = run(
        &tmpl,
        vec![("v", Value::Int(7)), ("tail", Value::str("t"))],
    )
    .expect("実行");
    assert_eq!(out, "sub=7 t");
}

/// JSON 値をエンジンの値へ変換する（CLI の文脈取り込みと同じ規則）。
fn from_json(v: serde_json::Value) -> Value {
    use veltl::value::{MapKey, VMap};
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(u) = n.as_u64() {
                Value::Uint(u)
            } else {
                Value::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => Value::str(s),
        serde_json::Value::Array(items) => Value::list(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(obj) => {
            let mut m = VMap::new();
            for (k, val) in obj {
                m.put(MapKey::string(k), from_json(val));
            }
            Value::map(m)
        }
    }
}

#[test]
/// JSON 文脈の取り込みがラップ規則どおりに描画されることを検証する。
fn json_context_ingress() {
    let json: serde_json::Value = serde_json::from_str(
        r#"{"user": {"name": "jason", "tags": ["a", "b"], "age": 30, "score": 1.5}}"#,
    )
    .expect("JSON");
    let serde_json::Value::Object(obj) = json else {
        panic!("オブジェクトを期待する");
    };
    let bindings: Vec<(&str, Value)> = vec![("ctx", {
        let mut m = veltl::value::VMap::new();
        for (k, v) in obj {
            m.put(veltl::value::MapKey::string(k), from_json(v));
        }
        Value::map(m)
    })];
    assert_eq!(
        support::render(
            "$ctx.user.name $ctx.user.tags $ctx.user.age $ctx.user.score",
            bindings
        ),
        "jason [a, b] 30 1.5"
    );
}

#[test]
/// 同じテンプレートを別々の文脈で再実行できることを検証する。
fn template_is_reusable() {
    let tmpl = veltl::parse("Hello $name", ".", None).expect("解析");
    assert_eq!(
        run(&tmpl, vec![("name", Value::str("A"))]).expect("1 回目"),
        "Hello A"
    );
    assert_eq!(
        run(&tmpl, vec![("name", Value::str("B"))]).expect("2 回目"),
        "Hello B"
    );
}
