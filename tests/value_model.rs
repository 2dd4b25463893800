// パス: tests/value_model.rs
// 役割: リスト・マップ・範囲・ビュー・文字列のメソッド面を検証する
// 意図: テンプレートから見た Java 風メソッド群の挙動を固定する
// 関連ファイル: src/value/methods.rs, src/value/map.rs, tests/test_support.rs
#[path = "test_support.rs"]
mod support;

use support::{expect_kind, render};
use veltl::errors::EvalErrorKind;
use veltl::value::{MapKey, VMap, Value};

#[derive(Clone, Copy)]
struct MethodCase {
    tmpl: &'static str,
    want: &'static str,
    note: &'static str,
}

#[test]
/// リスト操作をテーブルドリブンで検証する。
fn list_methods() {
    let cases = [
        MethodCase {
            tmpl: "#set($l = [1, 2, 3])$l.size()",
            want: "3",
            note: "size",
        },
        MethodCase {
            tmpl: "#set($l = [1, 2, 3])$l.get(1)",
            want: "2",
            note: "get",
        },
        MethodCase {
            tmpl: "#set($l = [1, 2])$l.add(3)$l",
            want: "true[1, 2, 3]",
            note: "add は true を返しつつ要素を足す",
        },
        MethodCase {
            tmpl: "#set($l = [1, 2])#set($m = [3])$l.addAll($m)$l",
            want: "true[1, 2, 3]",
            note: "addAll",
        },
        MethodCase {
            tmpl: "#set($l = [1, 2, 1])$l.remove(1)$l",
            want: "true[2, 1]",
            note: "remove は最初の等価要素だけ",
        },
        MethodCase {
            tmpl: "#set($l = [1, 2])$l.contains(2),$l.contains(9)",
            want: "true,false",
            note: "contains",
        },
        MethodCase {
            tmpl: "#set($l = [1, 2])$l.containsAll([2, 1]),$l.containsAll([3])",
            want: "true,false",
            note: "containsAll",
        },
        MethodCase {
            tmpl: "#set($l = [1])$l.isEmpty()#set($e = [])-$e.isEmpty()",
            want: "false-true",
            note: "isEmpty",
        },
        MethodCase {
            tmpl: "#set($l = [1, 2])$l.set(0, 9)$l",
            want: "1[9, 2]",
            note: "set は以前の値を返す",
        },
        MethodCase {
            tmpl: "#set($l = [1, 2])#set($c = $l.toArray())$c.add(3)$l;$c",
            want: "true[1, 2];[1, 2, 3]",
            note: "toArray は独立したコピー",
        },
        MethodCase {
            tmpl: "#set($l = [1, 2])$l.equals([1, 2]),$l.equals([2, 1])",
            want: "true,false",
            note: "equals は順序も見る",
        },
        MethodCase {
            tmpl: "#set($l = [1, 2, 3])$l.removeAll([1, 3])$l",
            want: "true[2]",
            note: "removeAll",
        },
        MethodCase {
            tmpl: "#set($l = [1, 2, 3])$l.retainAll([2])$l",
            want: "true[2]",
            note: "retainAll",
        },
        MethodCase {
            tmpl: "#set($l = [1, 2])$l.clear()$l",
            want: "[]",
            note: "clear",
        },
        MethodCase {
            tmpl: "#set($l = [1, 2])#set($it = $l.iterator())$it.hasNext(),$it.next(),$it.next(),$it.hasNext()",
            want: "true,1,2,false",
            note: "iterator の走査",
        },
    ];
    for case in &cases {
        assert_eq!(render(case.tmpl, vec![]), case.want, "{}", case.note);
    }
}

#[test]
/// リストの失敗ケースを検証する。
fn list_failures() {
    expect_kind("#set($l = [1])$l.get(5)", vec![], EvalErrorKind::IndexOutOfRange);
    expect_kind("#set($l = [1])$l.get(-1)", vec![], EvalErrorKind::IndexOutOfRange);
    expect_kind("#set($l = [1])$l.addAll(3)", vec![], EvalErrorKind::Arg);
    expect_kind("#set($l = [1])$l.set(9, 0)", vec![], EvalErrorKind::IndexOutOfRange);
}

#[test]
/// マップ操作をテーブルドリブンで検証する。
fn map_methods() {
    let cases = [
        MethodCase {
            tmpl: r#"#set($m = {"b": 2, "a": 1})$m"#,
            want: "{a=1, b=2}",
            note: "描画はキー昇順",
        },
        MethodCase {
            tmpl: r#"#set($m = {"a": 1})$m.get("a")"#,
            want: "1",
            note: "get",
        },
        MethodCase {
            tmpl: r#"#set($m = {"a": 1})$m.getOrDefault("b", 9)"#,
            want: "9",
            note: "getOrDefault",
        },
        MethodCase {
            tmpl: r#"#set($m = {})$m.put("k", 1)$m.put("k", 2)$m"#,
            want: "1{k=2}",
            note: "put は以前の値を返す",
        },
        MethodCase {
            tmpl: r#"#set($m = {"a": 1})$m.containsKey("a"),$m.containsKey("b"),$m.containsValue(1)"#,
            want: "true,false,true",
            note: "containsKey/containsValue",
        },
        MethodCase {
            tmpl: r#"#set($m = {"a": 1})$m.size()#set($e = {})-$e.isEmpty()"#,
            want: "1-true",
            note: "size と isEmpty",
        },
        MethodCase {
            tmpl: r#"#set($m = {"a": 1})$m.remove("a")$m"#,
            want: "1{}",
            note: "remove は外した値を返す",
        },
        MethodCase {
            tmpl: r#"#set($m = {"a": 1})$m.replace("a", 2)$m.replace("b", 9)$m"#,
            want: "1{a=2}",
            note: "replace は既存キーのみ",
        },
        MethodCase {
            tmpl: r#"#set($m = {"a": 1})#set($n = {"b": 2})$m.putAll($n)$m"#,
            want: "{a=1, b=2}",
            note: "putAll",
        },
        MethodCase {
            tmpl: r#"#set($m = {"a": 1})$m.putIfAbsent("a", 9)$m.putIfAbsent("b", 2)$m"#,
            want: "1{a=1, b=2}",
            note: "putIfAbsent",
        },
        MethodCase {
            tmpl: r#"#set($m = {"b": 2, "a": 1})$m.keySet()"#,
            want: "[a, b]",
            note: "keySet の描画",
        },
        MethodCase {
            tmpl: r#"#set($m = {"b": 2, "a": 1})$m.values()"#,
            want: "[1, 2]",
            note: "values はキー順の値",
        },
        MethodCase {
            tmpl: r#"#set($m = {"b": 2, "a": 1})$m.entrySet()"#,
            want: "[a=1, b=2]",
            note: "entrySet の描画",
        },
        MethodCase {
            tmpl: r#"#set($m = {"a": 1})$m.equals({"a": 1}),$m.equals({"a": 2})"#,
            want: "true,false",
            note: "equals は深い比較",
        },
        MethodCase {
            tmpl: r#"#set($m = {10: "x", 9: "y"})$m"#,
            want: "{9=y, 10=x}",
            note: "数値キーは数値順",
        },
        MethodCase {
            tmpl: r#"#set($m = {1: "a", "1": "b"})$m.size()$m"#,
            want: "1{1=b}",
            note: "文字列形が同じキーは 1 エントリへ畳まれる",
        },
        MethodCase {
            tmpl: r#"#set($m = {1: "a"})$m.replace("1", "x")$m.size()$m"#,
            want: "a1{1=x}",
            note: "replace は文字列形の同一性で既存キーを上書きする",
        },
        MethodCase {
            tmpl: r#"#set($m = {1: "a"})$m.put("1", "b")$m.containsKey(1)-$m.remove("1")$m.isEmpty()"#,
            want: "atrue-btrue",
            note: "put/containsKey/remove も同じ文字列形で一致する",
        },
        MethodCase {
            tmpl: r#"#set($m = {"a": 1})$m.a"#,
            want: "1",
            note: "プロパティ表記は get へ落ちる",
        },
    ];
    for case in &cases {
        assert_eq!(render(case.tmpl, vec![]), case.want, "{}", case.note);
    }
}

#[test]
/// ビューの変更がマップへ伝わることを検証する。
fn views_are_live() {
    let cases = [
        MethodCase {
            tmpl: r#"#set($m = {"a": 1, "b": 2})#set($k = $m.keySet())$k.remove("a")$m"#,
            want: "true{b=2}",
            note: "キービューの remove",
        },
        MethodCase {
            tmpl: r#"#set($m = {"a": 1, "b": 2})#set($v = $m.values())$v.remove(2)$m"#,
            want: "true{a=1}",
            note: "値ビューの remove",
        },
        MethodCase {
            tmpl: r#"#set($m = {"a": 1})#set($k = $m.keySet())$m.put("b", 2)$k"#,
            want: "[a, b]",
            note: "ビューはマップの変化を映す",
        },
        MethodCase {
            tmpl: r#"#set($m = {"a": 1, "b": 2})#set($k = $m.keySet())$k.retainAll(["b"])$m"#,
            want: "true{b=2}",
            note: "retainAll の委譲",
        },
        MethodCase {
            tmpl: r#"#set($m = {"a": 1})#set($k = $m.keySet())$k.clear()$m.isEmpty()"#,
            want: "true",
            note: "clear はマップを空にする",
        },
        MethodCase {
            tmpl: r#"#set($m = {"a": 1, "b": 2})#set($it = $m.keySet().iterator())$it.next()$it.remove()$m"#,
            want: "a{b=2}",
            note: "ビューイテレータの remove はマップへ委譲",
        },
    ];
    for case in &cases {
        assert_eq!(render(case.tmpl, vec![]), case.want, "{}", case.note);
    }
    expect_kind(
        r#"#set($m = {"a": 1})$m.keySet().add("b")"#,
        vec![],
        EvalErrorKind::Unsupported,
    );
}

#[test]
/// エントリの読み書きを検証する。
fn entries() {
    assert_eq!(
        render(
            r#"#set($m = {"a": 1})#foreach($e in $m.entrySet())$e.key=$e.value#end"#,
            vec![]
        ),
        "a=1"
    );
    // setValue は所属マップを書き換え、以前の値を返す
    assert_eq!(
        render(
            r#"#set($m = {"a": 1})#foreach($e in $m.entrySet())$e.setValue(9)#end$m"#,
            vec![]
        ),
        "1{a=9}"
    );
}

#[test]
/// 範囲の読み取り面と変更拒否を検証する。
fn range_methods() {
    let cases = [
        MethodCase {
            tmpl: "#set($r = [1..3])$r.size(),$r.get(0),$r.get(2)",
            want: "3,1,3",
            note: "size と端点",
        },
        MethodCase {
            tmpl: "#set($r = [3..1])$r",
            want: "[3, 2, 1]",
            note: "下降範囲の描画",
        },
        MethodCase {
            tmpl: "#set($r = [1..3])$r.contains(2),$r.contains(5)",
            want: "true,false",
            note: "contains",
        },
        MethodCase {
            tmpl: "#set($r = [1..3])$r.indexOf(3),$r.indexOf(0)",
            want: "2,-1",
            note: "indexOf",
        },
        MethodCase {
            tmpl: "#set($r = [1..3])$r.isEmpty()",
            want: "false",
            note: "範囲は空にならない",
        },
        MethodCase {
            tmpl: "#set($r = [1..3])#set($a = $r.toArray())$a.add(4)$a",
            want: "true[1, 2, 3, 4]",
            note: "toArray は可変リストを返す",
        },
        MethodCase {
            tmpl: "#set($r = ['2'..'4'])$r",
            want: "[2, 3, 4]",
            note: "整数へ変換できる文字列の端",
        },
    ];
    for case in &cases {
        assert_eq!(render(case.tmpl, vec![]), case.want, "{}", case.note);
    }
    expect_kind("#set($r = [1..3])$r.set(0, 9)", vec![], EvalErrorKind::Unsupported);
    expect_kind("#set($r = [1..3])$r.add(9)", vec![], EvalErrorKind::Unsupported);
    expect_kind("#set($r = [1..3])$r.get(9)", vec![], EvalErrorKind::IndexOutOfRange);
}

#[test]
/// 文字列メソッドをテーブルドリブンで検証する。
fn string_methods() {
    let cases = [
        MethodCase {
            tmpl: r#"#set($s = "Hello")$s.length()"#,
            want: "5",
            note: "length",
        },
        MethodCase {
            tmpl: r#"#set($s = "うなぎ")$s.length()"#,
            want: "3",
            note: "length はコードポイント",
        },
        MethodCase {
            tmpl: r#"#set($s = "Hello")$s.toUpperCase(),$s.toLowerCase()"#,
            want: "HELLO,hello",
            note: "大文字小文字",
        },
        MethodCase {
            tmpl: r#"#set($s = "Hello")$s.substring(1, 3)"#,
            want: "el",
            note: "substring",
        },
        MethodCase {
            tmpl: r#"#set($s = "Hello")$s.indexOf("l"),$s.lastIndexOf("l"),$s.indexOf("z")"#,
            want: "2,3,-1",
            note: "indexOf",
        },
        MethodCase {
            tmpl: r#"#set($s = "Hello")$s.contains("ell"),$s.startsWith("He"),$s.endsWith("lo")"#,
            want: "true,true,true",
            note: "包含と前後綴",
        },
        MethodCase {
            tmpl: r#"#set($s = "HELLO")$s.equalsIgnoreCase("hello"),$s.equals("hello")"#,
            want: "true,false",
            note: "大小無視の等価",
        },
        MethodCase {
            tmpl: r#"#set($s = "  pad  ")[$s.trim()]"#,
            want: "[pad]",
            note: "trim",
        },
        MethodCase {
            tmpl: r#"#set($s = "a-b-c")$s.replace("-", "+")"#,
            want: "a+b+c",
            note: "replace はリテラル",
        },
        MethodCase {
            tmpl: r##"#set($s = "a1b2")$s.replaceAll("[0-9]", "#")"##,
            want: "a#b#",
            note: "replaceAll は正規表現",
        },
        MethodCase {
            tmpl: r##"#set($s = "a1b2")$s.replaceFirst("[0-9]", "#")"##,
            want: "a#b2",
            note: "replaceFirst",
        },
        MethodCase {
            tmpl: r#"#set($s = "a,b,,")$s.split(",")"#,
            want: "[a, b]",
            note: "split は末尾の空要素を落とす",
        },
        MethodCase {
            tmpl: r#"#set($s = "abc123")$s.matches("[a-c]+[0-9]+")"#,
            want: "true",
            note: "matches",
        },
        MethodCase {
            tmpl: r#"#set($s = "abc")$s.concat("def")"#,
            want: "abcdef",
            note: "concat",
        },
        MethodCase {
            tmpl: r#"#set($s = "abc")$s.compareTo("abd")"#,
            want: "-1",
            note: "compareTo は差分",
        },
        MethodCase {
            tmpl: r#"#set($s = "")$s.isEmpty()"#,
            want: "true",
            note: "isEmpty",
        },
        MethodCase {
            tmpl: r#"#set($s = "abc")$s.charAt(0)"#,
            want: "97",
            note: "charAt はコードポイント値",
        },
        MethodCase {
            tmpl: r#"#set($s = "abc")$s.toString()"#,
            want: "abc",
            note: "toString",
        },
    ];
    for case in &cases {
        assert_eq!(render(case.tmpl, vec![]), case.want, "{}", case.note);
    }
    expect_kind(
        r#"#set($s = "a")$s.substring(2, 1)"#,
        vec![],
        EvalErrorKind::IndexOutOfRange,
    );
    expect_kind(
        r#"#set($s = "a")$s.codePointAt(0)"#,
        vec![],
        EvalErrorKind::Unsupported,
    );
    expect_kind(
        r#"#set($s = "a")$s.matches("[")"#,
        vec![],
        EvalErrorKind::Arg,
    );
}

#[test]
/// イテレータ契約（exhausted / invalid state）をテンプレート越しに検証する。
fn iterator_contract() {
    expect_kind(
        "#set($l = [1])#set($it = $l.iterator())$it.next()$it.next()",
        vec![],
        EvalErrorKind::IteratorExhausted,
    );
    expect_kind(
        "#set($l = [1])#set($it = $l.iterator())$it.remove()",
        vec![],
        EvalErrorKind::IteratorInvalidState,
    );
    assert_eq!(
        render(
            "#set($l = [1, 2])#set($it = $l.iterator())$it.next()$it.remove()$l",
            vec![]
        ),
        "1[2]"
    );
}

#[test]
/// ホスト値の取り込みがラップ済みの値として見えることを検証する。
fn host_value_ingress() {
    let mut m = VMap::new();
    m.put(MapKey::string("name"), Value::str("jason"));
    let bindings = vec![
        ("hashtable", Value::map(m)),
        ("intarr", Value::from(vec![10i64, 20, 30])),
        ("int1", Value::Int(1000)),
        ("float1", Value::Float(1000.1234)),
    ];
    assert_eq!(
        render("$hashtable.name $intarr $int1 $float1", bindings),
        "jason [10, 20, 30] 1000 1000.1234"
    );
}

#[test]
/// マップを foreach するとキー昇順の値が回ることを検証する。
fn foreach_over_map_values() {
    assert_eq!(
        render(
            r#"#set($m = {"b": 2, "a": 1, "c": 3})#foreach($v in $m)$v#end"#,
            vec![]
        ),
        "123"
    );
    assert_eq!(
        render(
            r#"#set($m = {"b": 2, "a": 1})#foreach($k in $m.keySet())$k#end"#,
            vec![]
        ),
        "ab"
    );
    // 空文字列キーと空文字列値
    assert_eq!(
        render(r#"x: #foreach($v in $some)$v#end"#, vec![("some", {
            let mut m = VMap::new();
            m.put(MapKey::string(""), Value::str(""));
            Value::map(m)
        })]),
        "x: "
    );
}
