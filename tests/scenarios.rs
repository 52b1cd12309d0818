//! End-to-end scenarios against the public `optimize` entry point, one per
//! row of the testable-properties scenario table (spec §8), plus the
//! idempotence / no-op / determinism / error-surfacing properties.

use deobfuscate_js::optimize;

#[test]
fn s1_folds_numeric_addition() {
    let out = optimize("var x = 123 + 456;").unwrap();
    assert!(out.contains("579"));
}

#[test]
fn s2_takes_true_branch() {
    let out = optimize("if (true) { a(); } else { b(); }").unwrap();
    assert!(out.contains("a()"));
    assert!(!out.contains("b()"));
    assert!(!out.contains('{'), "branch body should be spliced in, not left in a block: {out}");
}

#[test]
fn s3_folds_unary_not_chain() {
    let out = optimize("var x = !0 + !'' + !false;").unwrap();
    assert!(out.contains('3'));
}

#[test]
fn s4_collapses_confirmed_proxy_and_deletes_it() {
    let out = optimize("var p = {aaaaa: 1, bbbbb: 2}; f(p.aaaaa, p['bbbbb']);").unwrap();
    assert!(out.contains("f(1, 2)") || out.contains("f(1,2)"));
    assert!(!out.contains("var p"));
}

#[test]
fn s5_beautifies_member_chain() {
    let out = optimize("window['console']['log']('hi');").unwrap();
    assert!(out.contains("window.console.log"));
}

#[test]
fn s6_unflattens_switch_dispatch() {
    let source = r#"
        var _0xorder = '1|0'['split']('|');
        var _0xi = 0;
        while (true) {
            switch (_0xorder[_0xi++]) {
                case '0':
                    A();
                    continue;
                case '1':
                    B();
                    continue;
            }
            break;
        }
    "#;
    let out = optimize(source).unwrap();
    let pos_a = out.find("A()").expect("A() present");
    let pos_b = out.find("B()").expect("B() present");
    assert!(pos_b < pos_a);
    assert!(!out.contains("_0xorder"));
    assert!(!out.contains("_0xi"));
}

#[test]
fn s7_decoder_call_replaced_and_definition_deleted() {
    let source = r#"
        var _0xsup = ["hello", "world"];
        (function(arr, idx) { arr.push(idx); })(_0xsup, 0);
        function _0xdec(a, b) {
            return (_0xdec = function(a, b) { return _0xsup[a]; }, _0xdec(a, b));
        }
        var x = _0xdec(0);
    "#;
    let out = optimize(source).unwrap();
    assert!(out.contains("\"hello\""));
    assert!(!out.contains("_0xdec"));
    assert!(!out.contains("_0xsup"));
}

#[test]
fn renames_hex_identifiers_by_declaration_hint() {
    let out = optimize("var _0xab1 = 'hello'; console.log(_0xab1);").unwrap();
    assert!(!out.contains("_0xab1"));
    assert!(out.contains("str"));
}

#[test]
fn no_op_on_clean_input_besides_property_syntax() {
    let source = "function add(a, b) { return a + b; } var total = add(1, 2);";
    let out = optimize(source).unwrap();
    assert!(out.contains("function add(a, b)"));
    assert!(out.contains("add(1, 2)"));
}

#[test]
fn idempotent_on_already_clean_output() {
    let source = "var x = 123 + 456; if (true) { a(); }";
    let once = optimize(source).unwrap();
    let twice = optimize(&once).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn deterministic_across_repeated_runs() {
    let source = "var p = {aaaaa: 1, bbbbb: 2}; f(p.aaaaa, p['bbbbb']);";
    let first = optimize(source).unwrap();
    let second = optimize(source).unwrap();
    assert_eq!(first, second);
}

#[test]
fn parse_error_surfaces_to_caller() {
    let result = optimize("function ( { this is not javascript");
    assert!(result.is_err());
}

#[test]
fn prunes_dead_variable_with_no_references() {
    let out = optimize("var unused = 42; f();").unwrap();
    assert!(!out.contains("unused"));
}
