// パス: src/bin/veltl.rs
// 役割: テンプレートを JSON 文脈に対して描画する CLI 実行体
// 意図: ライブラリをコマンドラインから手軽に試せるようにする
// 関連ファイル: src/template.rs, src/value/mod.rs
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use veltl::value::{MapKey, VMap, Value};

/// veltl CLI
#[derive(Parser)]
#[command(author, version, about = "VTL テンプレートを JSON 文脈で描画する")]
struct Cli {
    /// テンプレートファイル（--root からの相対名）
    template: String,
    #[arg(long, default_value = ".", help = "テンプレートのルートディレクトリ")]
    root: PathBuf,
    #[arg(long, help = "マクロライブラリのテンプレート名")]
    lib: Option<String>,
    #[arg(long, help = "文脈として読み込む JSON ファイル")]
    context: Option<PathBuf>,
    #[arg(long, help = "出力ファイル（未指定なら標準出力）")]
    output: Option<PathBuf>,
    #[arg(long, help = "マクロ入れ子の上限")]
    max_call_depth: Option<usize>,
    #[arg(long, help = "#foreach の反復上限")]
    max_iterations: Option<i64>,
    #[arg(long, help = "1 回の描画が辿る要素数の上限")]
    max_array_size: Option<usize>,
}

/// JSON 値をエンジンの値へラップする。
fn from_json(v: serde_json::Value) -> Value {
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
        serde_json::Value::Array(items) => {
            Value::list(items.into_iter().map(from_json).collect())
        }
        serde_json::Value::Object(obj) => {
            let mut m = VMap::new();
            for (k, val) in obj {
                m.put(MapKey::string(k), from_json(val));
            }
            Value::map(m)
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let mut tmpl = veltl::parse_file(&cli.template, &cli.root, cli.lib.as_deref())
        .map_err(|e| e.to_string())?;
    if let Some(n) = cli.max_call_depth {
        tmpl = tmpl.with_max_call_depth(n);
    }
    if let Some(n) = cli.max_iterations {
        tmpl = tmpl.with_max_iterations(n);
    }
    if let Some(n) = cli.max_array_size {
        tmpl = tmpl.with_max_array_size(n);
    }

    let mut bindings: Vec<(String, Value)> = Vec::new();
    if let Some(path) = &cli.context {
        let data = fs::read_to_string(path).map_err(|e| format!("文脈の読み込み: {}", e))?;
        let json: serde_json::Value =
            serde_json::from_str(&data).map_err(|e| format!("JSON の解釈: {}", e))?;
        match json {
            serde_json::Value::Object(obj) => {
                for (k, v) in obj {
                    bindings.push((k, from_json(v)));
                }
            }
            _ => return Err("文脈の JSON はオブジェクトである必要があります".to_string()),
        }
    }

    let mut out: Vec<u8> = Vec::new();
    tmpl.execute(&mut out, bindings).map_err(|e| e.to_string())?;

    match &cli.output {
        Some(path) => fs::write(path, &out).map_err(|e| format!("出力の書き込み: {}", e))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(&out)
                .and_then(|_| stdout.flush())
                .map_err(|e| format!("標準出力への書き込み: {}", e))?;
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(msg) = run(cli) {
        eprintln!("veltl: {}", msg);
        process::exit(1);
    }
}
