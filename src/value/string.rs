// パス: src/value/string.rs
// 役割: Java 風メソッド群を備えた文字列型を提供する
// 意図: コードポイント単位の添字と正規表現操作をテンプレートへ公開する
// 関連ファイル: src/value/methods.rs, src/render.rs
//! 文字列型
//!
//! - 添字・長さはすべてコードポイント単位（バイトではない）。
//! - `matches`/`replaceAll`/`replaceFirst`/`split` は `regex` クレートに委ねる。
//! - 大文字小文字の変換はロケール非依存の Unicode 既定写像を使う。

use regex::Regex;

use crate::errors::{EvalError, EvalErrorKind};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VStr(pub String);

/// 1 文字を既定の大文字化→小文字化で畳み込む。
fn fold(c: char) -> char {
    let up = c.to_uppercase().next().unwrap_or(c);
    up.to_lowercase().next().unwrap_or(up)
}

/// 正規表現をコンパイルする。失敗は引数エラーとして報告する。
fn compile(pattern: &str) -> Result<Regex, EvalError> {
    Regex::new(pattern).map_err(|e| {
        EvalError::new(
            EvalErrorKind::Arg,
            format!("正規表現を解釈できません: {}", e),
        )
    })
}

impl VStr {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 指定コードポイント位置の文字を返す。
    pub fn char_at(&self, i: i64) -> Result<char, EvalError> {
        let len = self.length();
        if i < 0 || i >= len as i64 {
            return Err(EvalError::new(
                EvalErrorKind::IndexOutOfRange,
                format!("添字 {} が長さ {} の範囲外です", i, len),
            ));
        }
        Ok(self
            .0
            .chars()
            .nth(i as usize)
            .expect("範囲検査済みの添字"))
    }

    fn compare_with(&self, o: &str, tr: fn(char) -> char) -> i64 {
        let mut a = self.0.chars();
        let mut b = o.chars();
        loop {
            match (a.next(), b.next()) {
                (Some(x), Some(y)) => {
                    let diff = tr(x) as i64 - tr(y) as i64;
                    if diff != 0 {
                        return diff;
                    }
                }
                (None, None) => return 0,
                _ => {
                    return self.length() as i64 - o.chars().count() as i64;
                }
            }
        }
    }

    pub fn compare_to(&self, o: &str) -> i64 {
        self.compare_with(o, |c| c)
    }

    /// Unicode の大小畳み込みで比較する。
    pub fn compare_to_ignore_case(&self, o: &str) -> i64 {
        self.compare_with(o, fold)
    }

    pub fn concat(&self, o: &str) -> String {
        format!("{}{}", self.0, o)
    }

    pub fn contains(&self, o: &str) -> bool {
        self.0.contains(o)
    }

    pub fn ends_with(&self, suffix: &str) -> bool {
        self.0.ends_with(suffix)
    }

    pub fn equals(&self, o: &str) -> bool {
        self.0 == o
    }

    pub fn equals_ignore_case(&self, o: &str) -> bool {
        self.compare_to_ignore_case(o) == 0
    }

    /// 一致位置をコードポイントオフセットで返す（なければ -1）。
    pub fn index_of(&self, o: &str) -> i64 {
        match self.0.find(o) {
            Some(byte) => self.0[..byte].chars().count() as i64,
            None => -1,
        }
    }

    pub fn last_index_of(&self, o: &str) -> i64 {
        match self.0.rfind(o) {
            Some(byte) => self.0[..byte].chars().count() as i64,
            None => -1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn length(&self) -> usize {
        self.0.chars().count()
    }

    pub fn matches(&self, pattern: &str) -> Result<bool, EvalError> {
        Ok(compile(pattern)?.is_match(&self.0))
    }

    /// リテラル置換（正規表現ではない）。
    pub fn replace(&self, old: &str, new: &str) -> String {
        self.0.replace(old, new)
    }

    pub fn replace_all(&self, pattern: &str, replacement: &str) -> Result<String, EvalError> {
        Ok(compile(pattern)?
            .replace_all(&self.0, replacement)
            .into_owned())
    }

    pub fn replace_first(&self, pattern: &str, replacement: &str) -> Result<String, EvalError> {
        Ok(compile(pattern)?.replace(&self.0, replacement).into_owned())
    }

    /// 正規表現で分割し、末尾の空要素を取り除く。
    pub fn split(&self, pattern: &str) -> Result<Vec<String>, EvalError> {
        let re = compile(pattern)?;
        let mut parts: Vec<String> = re.split(&self.0).map(|s| s.to_string()).collect();
        while matches!(parts.last(), Some(last) if last.is_empty()) {
            parts.pop();
        }
        Ok(parts)
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    /// コードポイント境界の部分列。順序と範囲を検査する。
    pub fn sub_sequence(&self, start: i64, end: i64) -> Result<String, EvalError> {
        let len = self.length() as i64;
        if start < 0 || end < 0 || end > len || start > end {
            return Err(EvalError::new(
                EvalErrorKind::IndexOutOfRange,
                format!("範囲 {}:{} が長さ {} に収まりません", start, end, len),
            ));
        }
        Ok(self
            .0
            .chars()
            .skip(start as usize)
            .take((end - start) as usize)
            .collect())
    }

    pub fn to_lower_case(&self) -> String {
        self.0.to_lowercase()
    }

    pub fn to_upper_case(&self) -> String {
        self.0.to_uppercase()
    }

    pub fn trim(&self) -> String {
        self.0.trim().to_string()
    }
}
