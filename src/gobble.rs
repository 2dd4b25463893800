// パス: src/gobble.rs
// 役割: ディレクティブ周辺の空白を取り除く構文木変換パスを提供する
// 意図: ディレクティブだけの行が出力に空行を残さないよう正規化する
// 関連ファイル: src/ast.rs, src/parser/mod.rs, src/template.rs
//! 空白ゴブリング
//!
//! 解析直後の構文木に対して一度だけ適用する。テキストノードの末尾
//! 「改行＋空白」や先頭「空白＋改行」を、隣接ノードが行内に単独で立つ
//! ディレクティブである場合に限って切り詰める。判定はすべて変更前の
//! ノード列に対して行い、変更はまとめて適用する。二度適用しても結果は
//! 変わらない（冪等）。

use crate::ast::{IfNode, Node};

/// ノード列に対してゴブリングを適用する。`nested` は内側のリストで真。
pub fn gobble(items: &mut [Node], nested: bool) {
    // 内側のリストを先に整形してから再帰する
    for node in items.iter_mut() {
        for nest in nested_lists(node) {
            if let Some(Node::Text(t)) = nest.first_mut() {
                if starts_with_spaces_and_newline(t) {
                    let mut s = t.trim_start_matches([' ', '\t']).to_string();
                    if s.starts_with('\n') {
                        s.remove(0);
                    }
                    *t = s;
                }
            }
            if let Some(Node::Text(t)) = nest.last_mut() {
                if ends_with_newline_and_space(t) {
                    *t = t.trim_end_matches([' ', '\t']).to_string();
                }
            }
            gobble(nest, true);
        }
    }

    let len = items.len();
    let mut changes: Vec<(usize, bool, bool)> = Vec::new();
    for i in 0..len {
        let cur = match &items[i] {
            Node::Text(t) => t,
            _ => continue,
        };
        let after = if i < len.saturating_sub(1)
            && directive_before_newline(items, i + 1)
            && ((i == 0 && just_ws(cur)) || ends_with_newline_and_space(cur))
        {
            true
        } else if i > 0
            && i < len - 1
            && directive_at_newline(items, i - 1)
            && ends_with_newline_and_space(cur)
            && directive_before_newline(items, i + 1)
        {
            true
        } else {
            i > 0
                && i == len - 1
                && directive_before_newline(items, i - 1)
                && !(nested && just_ws(cur))
        };
        let before = if i > 0
            && i < len - 1
            && directive_at_newline(items, i - 1)
            && directive_before_newline(items, i - 1)
            && starts_with_spaces_and_newline(cur)
        {
            true
        } else {
            i > 0
                && i == len - 1
                && directive_at_newline(items, i - 1)
                && ends_with_newline_and_space(cur)
        };
        if after || before {
            changes.push((i, after, before));
        }
    }
    for (i, after, before) in changes {
        if let Node::Text(t) = &mut items[i] {
            let mut s = t.clone();
            if after {
                s = s.trim_end_matches([' ', '\t']).to_string();
            }
            if before {
                s = s.trim_start_matches([' ', '\t']).to_string();
                if s.starts_with('\n') {
                    s.remove(0);
                }
            }
            *t = s;
        }
    }
}

/// ノードが持つ入れ子のノード列を列挙する。
fn nested_lists(node: &mut Node) -> Vec<&mut Vec<Node>> {
    let mut out = Vec::new();
    match node {
        Node::If(ifnode) => collect_if_arms(ifnode, &mut out),
        Node::Foreach(f) => {
            out.push(&mut f.items);
            if let Some(els) = &mut f.els {
                out.push(els);
            }
        }
        Node::MacroDef(m) => out.push(&mut m.items),
        _ => {}
    }
    out
}

/// `#if`/`#elseif`/`#else` 連鎖の各本体を集める。
fn collect_if_arms<'a>(mut node: &'a mut IfNode, out: &mut Vec<&'a mut Vec<Node>>) {
    loop {
        let IfNode { items, els, .. } = node;
        out.push(items);
        match els {
            Some(next) => node = next.as_mut(),
            None => break,
        }
    }
}

/// 空白とタブのみ（空文字列を含む）か。
fn just_ws(s: &str) -> bool {
    s.bytes().all(|b| b == b' ' || b == b'\t')
}

/// 末尾方向に空白を飛ばした先が改行か。
fn ends_with_newline_and_space(s: &str) -> bool {
    for b in s.bytes().rev() {
        match b {
            b' ' | b'\t' => continue,
            b'\n' => return true,
            _ => break,
        }
    }
    false
}

/// 先頭方向に空白を飛ばした先が改行か。
fn starts_with_spaces_and_newline(s: &str) -> bool {
    for b in s.bytes() {
        match b {
            b' ' | b'\t' => continue,
            b'\n' => return true,
            _ => break,
        }
    }
    false
}

/// ノード `i` が「行頭に立つディレクティブ」か。
fn directive_at_newline(items: &[Node], i: usize) -> bool {
    if !items[i].is_directive() {
        return false;
    }
    if i == 0 {
        return true;
    }
    let t = match &items[i - 1] {
        Node::Text(t) => t,
        _ => return false,
    };
    ends_with_newline_and_space(t) || (i == 1 && just_ws(t)) || t.is_empty()
}

/// ノード `i` が「行末（または列末）で閉じるディレクティブ」か。
fn directive_before_newline(items: &[Node], i: usize) -> bool {
    if !items[i].is_directive() {
        return false;
    }
    if i == items.len() - 1 {
        return true;
    }
    let t = match &items[i + 1] {
        Node::Text(t) => t,
        _ => return false,
    };
    starts_with_spaces_and_newline(t) || (i == items.len() - 2 && just_ws(t))
}
