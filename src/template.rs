// パス: src/template.rs
// 役割: コンパイル API・実行 API・リソースリーダと資源上限を提供する
// 意図: 解析から実行までの外部境界を一箇所にまとめる
// 関連ファイル: src/parser/mod.rs, src/gobble.rs, src/evaluator.rs
//! テンプレート
//!
//! - `parse(source, root, lib)` が字句解析→構文解析→ゴブリングを行う。
//!   ライブラリ指定時は先にライブラリを空の文脈で一度実行し、登録された
//!   マクロを本体の解析前に種として渡す。
//! - コンパイル済みテンプレートは複数スレッドから同時に実行できる。
//!   実行ごとに独自のシンクと文脈を使うこと。
//! - 資源上限は builder 風のメソッドで変更できる。

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::ast::{MacroNode, Node};
use crate::context::Ctx;
use crate::errors::{EvalError, EvalErrorKind, LexerError, ParseError};
use crate::gobble::gobble;
use crate::parser::parse_template;
use crate::value::{MethodCache, Value};

/// マクロ入れ子の既定上限。
pub const DEFAULT_MAX_CALL_DEPTH: usize = 20;
/// 1 回の描画が辿る要素数の既定上限。
pub const DEFAULT_MAX_ARRAY_SIZE: usize = 1024 * 1024;

/// 論理名からバイト列を引く外部コラボレータ。
/// `#include` は結果をそのまま書き出し、`#parse` は解析して実行する。
pub trait ResourceReader: Send + Sync {
    fn read(&self, name: &str) -> io::Result<Vec<u8>>;
}

/// ルートディレクトリ起点でファイルを読む既定のリーダ。
pub struct FsReader {
    root: PathBuf,
}

impl FsReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ResourceReader for FsReader {
    fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.root.join(name))
    }
}

#[derive(Debug, Error)]
/// コンパイル・実行 API が返す統合エラー。
pub enum TemplateError {
    #[error(transparent)]
    Lexer(#[from] LexerError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error("リソースの読み込みに失敗しました: {0}")]
    Io(#[from] io::Error),
}

pub struct Template {
    pub(crate) tree: Vec<Node>,
    pub(crate) macros: Mutex<HashMap<String, Arc<MacroNode>>>,
    pub(crate) method_cache: MethodCache,
    pub(crate) reader: Arc<dyn ResourceReader>,
    pub(crate) lib: Option<String>,
    pub(crate) max_call_depth: usize,
    pub(crate) max_iterations: Option<i64>,
    pub(crate) max_array_size: usize,
}

/// ソース文字列からテンプレートをコンパイルする。
pub fn parse(
    vtl: &str,
    root: impl Into<PathBuf>,
    lib: Option<&str>,
) -> Result<Template, TemplateError> {
    parse_with_reader(vtl, Arc::new(FsReader::new(root)), lib)
}

/// ファイルをリーダ経由で読み、`parse` へ委譲する。
pub fn parse_file(
    name: &str,
    root: impl Into<PathBuf>,
    lib: Option<&str>,
) -> Result<Template, TemplateError> {
    let reader = Arc::new(FsReader::new(root));
    let data = reader.read(name)?;
    let src = String::from_utf8_lossy(&data).into_owned();
    parse_with_reader(&src, reader, lib)
}

/// 任意のリーダでコンパイルする。テストやメモリ内テンプレートに使う。
pub fn parse_with_reader(
    vtl: &str,
    reader: Arc<dyn ResourceReader>,
    lib: Option<&str>,
) -> Result<Template, TemplateError> {
    let mut seed: HashMap<String, Arc<MacroNode>> = HashMap::new();
    if let Some(libname) = lib {
        let data = reader.read(libname)?;
        let lib_src = String::from_utf8_lossy(&data).into_owned();
        let lib_tmpl = compile(&lib_src, reader.clone(), None, HashMap::new())?;
        // マクロ登録だけが目的なので、出力は捨て実行エラーも無視する
        let _ = lib_tmpl.execute(&mut io::sink(), Vec::new());
        seed = lib_tmpl
            .macros
            .lock()
            .expect("マクロ表のロック")
            .clone();
    }
    compile(vtl, reader, lib.map(str::to_string), seed)
}

fn compile(
    src: &str,
    reader: Arc<dyn ResourceReader>,
    lib: Option<String>,
    seed: HashMap<String, Arc<MacroNode>>,
) -> Result<Template, TemplateError> {
    let names: Vec<String> = seed.keys().cloned().collect();
    let mut tree = parse_template(src, &names)?;
    gobble(&mut tree, false);
    Ok(Template {
        tree,
        macros: Mutex::new(seed),
        method_cache: MethodCache::new(),
        reader,
        lib,
        max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        max_iterations: None,
        max_array_size: DEFAULT_MAX_ARRAY_SIZE,
    })
}

impl Template {
    /// マクロ入れ子の上限を変更する。
    pub fn with_max_call_depth(mut self, n: usize) -> Self {
        self.max_call_depth = n;
        self
    }

    /// `#foreach` 1 つあたりの反復上限を設定する（既定は無制限）。
    pub fn with_max_iterations(mut self, n: i64) -> Self {
        self.max_iterations = Some(n);
        self
    }

    /// 1 回の描画が辿る要素数の上限を変更する。
    pub fn with_max_array_size(mut self, n: usize) -> Self {
        self.max_array_size = n;
        self
    }

    /// 束縛を積んだ文脈でテンプレートを実行し、シンクへ書き出す。
    pub fn execute(
        &self,
        w: &mut dyn Write,
        bindings: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<(), TemplateError> {
        let mut ctx = Ctx::new();
        for (name, value) in bindings {
            ctx.push(&name, value);
        }
        self.execute_list(w, &self.tree, &mut ctx)?;
        Ok(())
    }

    /// 実行中に読むソースを同じ設定でコンパイルする（`#parse`/`#evaluate`）。
    pub(crate) fn subtemplate(&self, src: &str, line: usize) -> Result<Template, EvalError> {
        let seed = self.macros.lock().expect("マクロ表のロック").clone();
        let names: Vec<String> = seed.keys().cloned().collect();
        let mut tree = parse_template(src, &names).map_err(|e| {
            EvalError::at(
                EvalErrorKind::Parse,
                format!("テンプレートの解析に失敗しました: {}", e),
                line,
            )
        })?;
        gobble(&mut tree, false);
        Ok(Template {
            tree,
            macros: Mutex::new(seed),
            method_cache: MethodCache::new(),
            reader: self.reader.clone(),
            lib: self.lib.clone(),
            max_call_depth: self.max_call_depth,
            max_iterations: self.max_iterations,
            max_array_size: self.max_array_size,
        })
    }

    /// リーダ経由で論理名を読む。
    pub(crate) fn read_resource(&self, name: &str, line: usize) -> Result<Vec<u8>, EvalError> {
        self.reader.read(name).map_err(|e| {
            EvalError::at(
                EvalErrorKind::Resource,
                format!("{} を読み込めません: {}", name, e),
                line,
            )
        })
    }
}
