// パス: tests/test_support.rs
// 役割: 統合テスト共通の補助関数とアサーションを提供する
// 意図: 解析・実行・エラー取得の定型操作を一元化しテストを簡潔に保つ
// 関連ファイル: tests/evaluator_exec.rs, tests/value_model.rs, tests/template_io.rs
#![allow(dead_code)]

use veltl::errors::{EvalError, EvalErrorKind};
use veltl::template::TemplateError;
use veltl::value::Value;

/// テンプレートを束縛つきで描画し、出力文字列を返す。
pub fn render(src: &str, bindings: Vec<(&str, Value)>) -> String {
    try_render(src, bindings).expect("テンプレートの描画に成功する")
}

/// 描画を試み、出力または実行エラーを返す。
pub fn try_render(src: &str, bindings: Vec<(&str, Value)>) -> Result<String, TemplateError> {
    let tmpl = veltl::parse(src, ".", None)?;
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

/// 部分出力つきで描画エラーを取り出す。解析は成功する前提。
pub fn render_err(src: &str, bindings: Vec<(&str, Value)>) -> (String, EvalError) {
    let tmpl = veltl::parse(src, ".", None).expect("解析に成功する");
    let mut out: Vec<u8> = Vec::new();
    let err = tmpl
        .execute(
            &mut out,
            bindings
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<Vec<_>>(),
        )
        .expect_err("実行エラーを期待する");
    match err {
        TemplateError::Eval(e) => (String::from_utf8_lossy(&out).into_owned(), e),
        other => panic!("実行エラーを期待しましたが {:?} でした", other),
    }
}

/// 描画エラーの種別だけを検査する。
pub fn expect_kind(src: &str, bindings: Vec<(&str, Value)>, kind: EvalErrorKind) {
    let (_, err) = render_err(src, bindings);
    assert_eq!(err.kind, kind, "テンプレート {:?} のエラー種別", src);
}
