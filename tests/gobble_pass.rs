// パス: tests/gobble_pass.rs
// 役割: 空白ゴブリングの規則と冪等性を検証する
// 意図: ディレクティブ単独行の空白処理が回帰しないようにする
// 関連ファイル: src/gobble.rs, src/ast.rs
#[path = "test_support.rs"]
mod support;

use support::render;
use veltl::ast::{IfNode, Node, OpNode, OpVal, Pos, SetNode, VarNode};
use veltl::gobble::gobble;

/// ダミーの #set ノード（ゴブリングはディレクティブの種類を見ない）。
fn set_node() -> Node {
    Node::Set(SetNode {
        var: VarNode {
            name: "x".into(),
            items: Vec::new(),
            silent: false,
            pos: Pos::default(),
        },
        expr: OpNode::leaf(OpVal::Int(1), Pos::default()),
        pos: Pos::default(),
    })
}

fn text(s: &str) -> Node {
    Node::Text(s.to_string())
}

fn if_node(items: Vec<Node>, els: Option<Vec<Node>>) -> Node {
    Node::If(IfNode {
        cond: Some(OpNode::leaf(OpVal::Bool(true), Pos::default())),
        items,
        els: els.map(|items| {
            Box::new(IfNode {
                cond: None,
                items,
                els: None,
                pos: Pos::default(),
            })
        }),
        pos: Pos::default(),
    })
}

#[derive(Clone)]
struct GobbleCase {
    name: &'static str,
    ast: Vec<Node>,
    expected: Vec<Node>,
}

#[test]
/// 原語実装のゴブリング規則表をそのまま検証する。
fn gobble_rule_table() {
    let cases = vec![
        GobbleCase {
            name: "spaces directive",
            ast: vec![text("  "), set_node()],
            expected: vec![text(""), set_node()],
        },
        GobbleCase {
            name: "directive spaces",
            ast: vec![set_node(), text("   ")],
            expected: vec![set_node(), text("")],
        },
        GobbleCase {
            name: "spaces directive spaces",
            ast: vec![text("  "), set_node(), text("   ")],
            expected: vec![text(""), set_node(), text("")],
        },
        GobbleCase {
            name: "nl spaces directive spaces",
            ast: vec![text("\n  "), set_node(), text("   ")],
            expected: vec![text("\n"), set_node(), text("")],
        },
        GobbleCase {
            name: "spaces directive spaces nl",
            ast: vec![text("  "), set_node(), text("   \n")],
            expected: vec![text(""), set_node(), text("")],
        },
        GobbleCase {
            name: "nl spaces directive spaces nl",
            ast: vec![text("\n  "), set_node(), text("   \n")],
            expected: vec![text("\n"), set_node(), text("")],
        },
        GobbleCase {
            name: "nl spaces directive spaces nl directive",
            ast: vec![text("\n  "), set_node(), text("   \n"), set_node()],
            expected: vec![text("\n"), set_node(), text(""), set_node()],
        },
        GobbleCase {
            name: "nl spaces directive spaces nl directive spaces",
            ast: vec![
                text("\n  "),
                set_node(),
                text("   \n"),
                set_node(),
                text("   "),
            ],
            expected: vec![text("\n"), set_node(), text(""), set_node(), text("")],
        },
        GobbleCase {
            name: "text spaces directive",
            ast: vec![text("asd  "), set_node()],
            expected: vec![text("asd  "), set_node()],
        },
        GobbleCase {
            name: "spaces text directive",
            ast: vec![text("  asd"), set_node()],
            expected: vec![text("  asd"), set_node()],
        },
        GobbleCase {
            name: "directive text spaces",
            ast: vec![set_node(), text("asd  ")],
            expected: vec![set_node(), text("asd  ")],
        },
        GobbleCase {
            name: "directive spaces text",
            ast: vec![set_node(), text("  asd")],
            expected: vec![set_node(), text("  asd")],
        },
        GobbleCase {
            name: "text spaces directive spaces text",
            ast: vec![text("asd  "), set_node(), text("  asd")],
            expected: vec![text("asd  "), set_node(), text("  asd")],
        },
        GobbleCase {
            name: "nl spaces nested spaces nl",
            ast: vec![
                text("\n  "),
                if_node(
                    vec![text("  \n  asd\n  ")],
                    Some(vec![text("  \n  asd\n  ")]),
                ),
                text("   \n"),
            ],
            expected: vec![
                text("\n"),
                if_node(vec![text("  asd\n")], Some(vec![text("  asd\n")])),
                text(""),
            ],
        },
    ];
    for case in cases {
        let mut ast = case.ast.clone();
        gobble(&mut ast, false);
        assert_eq!(ast, case.expected, "{}", case.name);
    }
}

#[test]
/// ゴブリングが冪等であることを検証する。
fn gobble_is_idempotent() {
    let samples = vec![
        vec![text("\n  "), set_node(), text("   \n")],
        vec![text("  "), set_node(), text("   ")],
        vec![
            if_node(vec![text("  \n  asd\n  ")], Some(vec![text("  \n  asd\n  ")])),
            text("\n  "),
            set_node(),
        ],
        vec![text("asd  "), set_node(), text("  asd")],
    ];
    for sample in samples {
        let mut once = sample.clone();
        gobble(&mut once, false);
        let mut twice = once.clone();
        gobble(&mut twice, false);
        assert_eq!(once, twice);
    }
}

#[test]
/// ディレクティブ単独行がテンプレート出力に空行を残さないことを検証する。
fn directive_only_lines_in_templates() {
    assert_eq!(
        render("#if(true)\nhello\n#end\n", vec![]),
        "hello\n"
    );
    assert_eq!(
        render("start\n#set($x = 1)\nmid\n#set($y = 2)\nlast", vec![]),
        "start\nmid\n\nlast"
    );
    assert_eq!(
        render("start\n#foreach($i in [1..2])\n$i\n#end", vec![]),
        "start\n1\n2\n"
    );
    assert_eq!(render("  #set($x = 1)\n$x", vec![]), "1");
}
