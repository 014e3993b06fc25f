// Round-trip properties: YAML to AST and back, expression print/reparse

use ksy_lang::expr::parse_expr;
use ksy_lang::ksy::{parse_schema, schema_to_spec};

fn assert_schema_roundtrip(src: &str) {
    let first = parse_schema(src.as_bytes()).expect("first parse failed");
    let spec = schema_to_spec(&first);
    let text = serde_yaml::to_string(&spec).expect("serialize failed");
    let second = parse_schema(text.as_bytes())
        .unwrap_or_else(|e| panic!("reparse failed: {}\n---\n{}", e, text));
    assert_eq!(first, second, "round-trip mismatch for:\n{}", text);
}

#[test]
fn test_roundtrip_basic_sequence() {
    assert_schema_roundtrip(
        "meta:\n  id: demo\n  endian: le\nseq:\n  - id: magic\n    contents: [0x89, \"PNG\"]\n  - id: count\n    type: u2\n  - id: body\n    size: count\n",
    );
}

#[test]
fn test_roundtrip_nested_types_and_enums() {
    assert_schema_roundtrip(
        "meta:\n  id: demo\nseq:\n  - id: kind\n    type: u1\n    enum: file_kind\ntypes:\n  sub:\n    meta:\n      endian: be\n    seq:\n      - id: x\n        type: u4\nenums:\n  file_kind:\n    1: a\n    0x10: wide\n",
    );
}

#[test]
fn test_roundtrip_switches_and_repeats() {
    assert_schema_roundtrip(
        "meta:\n  id: demo\n  endian:\n    switch-on: marker\n    cases:\n      '[0x49, 0x49]': le\n      '[0x4d, 0x4d]': be\nseq:\n  - id: marker\n    size: 2\n  - id: items\n    type: u2\n    repeat: until\n    repeat-until: _ == 0\n  - id: body\n    type:\n      switch-on: items\n      cases:\n        1: u4\n        2: strz\n",
    );
}

#[test]
fn test_roundtrip_strings_and_terminators() {
    assert_schema_roundtrip(
        "meta:\n  id: demo\n  encoding: UTF-8\nseq:\n  - id: a\n    type: strz\n    encoding: ASCII\n  - id: b\n    type: str\n    size: 8\n    terminator: 32\n    include: true\n  - id: c\n    size-eos: true\n",
    );
}

#[test]
fn test_roundtrip_params_instances_imports() {
    assert_schema_roundtrip(
        "meta:\n  id: demo\n  imports:\n    - other/format\nparams:\n  - id: depth\n    type: u4\nseq:\n  - id: child\n    type: 'demo(depth + 1)'\n    if: depth < 3\ninstances:\n  doubled:\n    value: depth * 2\n",
    );
}

#[test]
fn test_expr_print_reparse() {
    let sources = [
        "1 + 2 * 3 - 4 % 5",
        "a.b.c[d + 1]",
        "_root.header.count > 0 and not (_io.eof)",
        "flag == 1 ? size : 0",
        "kind::a.to_i << 2 | mask & 0xff ^ 1",
        "\"a\\tb\" + name.reverse",
        "[0x49, 0x49]",
        "2.5 * ratio",
    ];
    for src in sources {
        let first = parse_expr(src).unwrap_or_else(|e| panic!("parse {:?}: {}", src, e));
        let printed = first.to_string();
        let second =
            parse_expr(&printed).unwrap_or_else(|e| panic!("reparse {:?}: {}", printed, e));
        assert_eq!(first, second, "mismatch for {:?} printed as {:?}", src, printed);
    }
}
