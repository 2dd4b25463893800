// パス: src/value/object.rs
// 役割: 利用者定義オブジェクトの橋渡しとメソッド名解決キャッシュを提供する
// 意図: リフレクション風の名前探索を静的ディスパッチ＋トレイトで置き換える
// 関連ファイル: src/value/methods.rs, src/evaluator.rs, src/render.rs
//! 利用者オブジェクト
//!
//! テンプレートから見えるのは「公開」フィールドとメソッドだけ、という
//! 契約をトレイトで表す。`toString` 相当で描画を、`kind` 相当でエラー中の
//! 型ラベルを上書きできる。メソッド名は `UcFirst`・`Get〜`・`Is〜` の候補列で
//! 解決し、型ごとの当たり候補をミューテックス越しにキャッシュする。

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt::Debug;
use std::rc::Rc;
use std::sync::Mutex;

use crate::errors::EvalError;
use crate::value::Value;

/// テンプレートへ公開される外部オブジェクトの表面。
pub trait VtlObject: Debug {
    /// 型ごとのキャッシュキーに使う。実装は `self` を返すだけでよい。
    fn as_any(&self) -> &dyn Any;

    /// エラーメッセージに現れる型ラベル。
    fn kind(&self) -> &str {
        "object"
    }

    /// 公開フィールドの参照。存在しなければ None。
    fn get_property(&self, _name: &str) -> Option<Value> {
        None
    }

    /// 公開メソッドの呼び出し。該当メソッドが無ければ None。
    /// 名前は解決済みの候補（UcFirst 形）で渡される。
    fn call_method(&self, _name: &str, _args: &[Value]) -> Option<Result<Value, EvalError>> {
        None
    }

    /// 既定描画を上書きする文字列表現。
    fn to_display(&self) -> Option<String> {
        None
    }

    /// 既定描画（`{Field:value, …}`）に使う公開フィールドの宣言順の列。
    fn fields(&self) -> Vec<(&'static str, Value)> {
        Vec::new()
    }
}

/// 先頭 1 文字を大文字化する。
pub fn uc_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// 探索候補を順に返す: UcFirst(N), Trimmed, "Get"+Trimmed, "Is"+Trimmed。
/// Trimmed は先頭の `get` を剥がした UcFirst 形。
pub fn candidates(name: &str) -> Vec<String> {
    let title = uc_first(name);
    let trimmed = uc_first(name.strip_prefix("get").unwrap_or(name));
    let mut out = vec![title];
    for cand in [
        trimmed.clone(),
        format!("Get{}", trimmed),
        format!("Is{}", trimmed),
    ] {
        if !out.contains(&cand) {
            out.push(cand);
        }
    }
    out
}

#[derive(Debug, Default)]
/// 型×呼び出し名ごとに当たった候補名を覚えるキャッシュ。
pub struct MethodCache {
    map: Mutex<HashMap<(TypeId, String), String>>,
}

impl MethodCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 候補列でオブジェクトのメソッドを探して呼び出す。
    pub fn call_object(
        &self,
        obj: &Rc<dyn VtlObject>,
        name: &str,
        args: &[Value],
    ) -> Option<Result<Value, EvalError>> {
        let tid = obj.as_any().type_id();
        let cached = {
            let map = self.map.lock().expect("メソッドキャッシュのロック");
            map.get(&(tid, name.to_string())).cloned()
        };
        if let Some(hit) = cached {
            return obj.call_method(&hit, args);
        }
        for cand in candidates(name) {
            if let Some(result) = obj.call_method(&cand, args) {
                let mut map = self.map.lock().expect("メソッドキャッシュのロック");
                map.insert((tid, name.to_string()), cand);
                return Some(result);
            }
        }
        None
    }
}
