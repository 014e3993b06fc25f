// End-to-end evaluation scenarios

use num_bigint::BigInt;

use ksy_lang::engine::Value;
use ksy_lang::eval::{Evaluator, Range};
use ksy_lang::ksy::parse_schema;
use ksy_lang::resolve::{MemorySource, Resolver};
use ksy_lang::Annotation;

fn run(schema_src: &str, data: &[u8]) -> (Vec<Annotation>, u64) {
    let resolver = Resolver::new(MemorySource::new());
    let schema = parse_schema(schema_src.as_bytes()).expect("schema parse failed");
    let mut evaluator = Evaluator::new(&resolver, data);
    let annotations = evaluator.evaluate("", &schema).expect("evaluation failed");
    (annotations, evaluator.stream_pos())
}

fn int(v: i64) -> Value {
    Value::Int(BigInt::from(v))
}

// ========== Trivial magic ==========

#[test]
fn test_trivial_magic() {
    let (anns, pos) = run(
        "meta:\n  id: m\nseq:\n  - id: magic\n    contents: [0x7f, \"ELF\"]\n",
        &[0x7f, 0x45, 0x4c, 0x46, 0x00],
    );
    assert_eq!(anns.len(), 1);
    assert_eq!(anns[0].range, Range { start: 0, end: 4 });
    assert_eq!(anns[0].path, "magic");
    assert_eq!(
        anns[0].value,
        Some(Value::Bytes(vec![0x7f, 0x45, 0x4c, 0x46]))
    );
    assert_eq!(pos, 4);
}

#[test]
fn test_magic_mismatch_is_validation_error() {
    let resolver = Resolver::new(MemorySource::new());
    let schema = parse_schema(
        "meta:\n  id: m\nseq:\n  - id: magic\n    contents: [0x7f, \"ELF\"]\n".as_bytes(),
    )
    .unwrap();
    let mut evaluator = Evaluator::new(&resolver, &[0x7f, 0x45, 0x4c, 0x47]);
    let err = evaluator.evaluate("", &schema).unwrap_err();
    assert!(err.to_string().contains("validation error"));
}

// ========== Endian-switched header ==========

const ENDIAN_SWITCH: &str = "meta:\n  id: m\n  endian:\n    switch-on: _root.marker\n    cases:\n      '[0x49, 0x49]': le\n      '[0x4d, 0x4d]': be\nseq:\n  - id: marker\n    size: 2\n  - id: v\n    type: u2\n";

#[test]
fn test_endian_switch_little() {
    let (anns, _) = run(ENDIAN_SWITCH, &[0x49, 0x49, 0x34, 0x12]);
    assert_eq!(anns.len(), 2);
    assert_eq!(anns[0].path, "marker");
    assert_eq!(anns[0].value, Some(Value::Bytes(vec![0x49, 0x49])));
    assert_eq!(anns[1].path, "v");
    assert_eq!(anns[1].value, Some(int(0x1234)));
}

#[test]
fn test_endian_switch_big_same_value() {
    let (anns, _) = run(ENDIAN_SWITCH, &[0x4d, 0x4d, 0x12, 0x34]);
    assert_eq!(anns[1].value, Some(int(0x1234)));
}

// ========== Repeat-expr with computed count ==========

#[test]
fn test_repeat_expr_computed_count() {
    let (anns, _) = run(
        "meta:\n  id: m\nseq:\n  - id: n\n    type: u1\n  - id: xs\n    type: u2le\n    repeat: expr\n    repeat-expr: n\n",
        &[0x03, 0x01, 0x00, 0x02, 0x00, 0x03, 0x00],
    );
    assert_eq!(anns.len(), 4);
    assert_eq!(anns[1].path, "xs[0]");
    assert_eq!(anns[1].value, Some(int(1)));
    assert_eq!(anns[2].path, "xs[1]");
    assert_eq!(anns[2].value, Some(int(2)));
    assert_eq!(anns[3].path, "xs[2]");
    assert_eq!(anns[3].value, Some(int(3)));
}

// ========== Nested user type with size ==========

#[test]
fn test_user_type_with_size_carves_substream() {
    let (anns, pos) = run(
        "meta:\n  id: m\nseq:\n  - id: inner\n    type: sub\n    size: 4\ntypes:\n  sub:\n    seq:\n      - id: xs\n        type: u1\n        repeat: eos\n",
        &[0x0a, 0x0b, 0x0c, 0x0d, 0xff],
    );
    // Exactly four elements from the carved sub-stream; the outer stream
    // stops at 4.
    assert_eq!(pos, 4);
    let elems: Vec<_> = anns.iter().filter(|a| a.path.starts_with("inner.")).collect();
    assert_eq!(elems.len(), 4);
    assert_eq!(elems[3].path, "inner.xs[3]");
    assert_eq!(elems[3].value, Some(int(0x0d)));
    // Parent marker covers the carved region.
    let marker = anns.iter().find(|a| a.path == "inner").unwrap();
    assert_eq!(marker.range, Range { start: 0, end: 4 });
    assert_eq!(marker.value, None);
}

// ========== Type switch on enum ==========

const ENUM_SWITCH: &str = "meta:\n  id: m\nseq:\n  - id: kind\n    type: u1\n    enum: file_kind\n  - id: body\n    type:\n      switch-on: kind\n      cases:\n        a: u4le\n        b: f4le\nenums:\n  file_kind:\n    1: a\n    2: b\n";

#[test]
fn test_type_switch_enum_integer_case() {
    let (anns, _) = run(ENUM_SWITCH, &[0x01, 0x78, 0x56, 0x34, 0x12]);
    assert_eq!(anns[1].path, "body");
    assert_eq!(anns[1].value, Some(int(0x12345678)));
}

#[test]
fn test_type_switch_enum_float_case() {
    let (anns, _) = run(ENUM_SWITCH, &[0x02, 0x00, 0x00, 0x80, 0x3f]);
    match &anns[1].value {
        Some(Value::Float(v)) => assert!((v - 1.0).abs() < 1e-9),
        other => panic!("expected float, got {:?}", other),
    }
}

#[test]
fn test_type_switch_no_match_skips() {
    let (anns, pos) = run(ENUM_SWITCH, &[0x09]);
    assert_eq!(anns.len(), 1);
    assert_eq!(pos, 1);
}

// ========== If-guarded field ==========

const IF_GUARD: &str = "meta:\n  id: m\nseq:\n  - id: flag\n    type: u1\n  - id: extra\n    type: u2le\n    if: flag == 1\n";

#[test]
fn test_if_guard_true() {
    let (anns, _) = run(IF_GUARD, &[0x01, 0x34, 0x12]);
    assert_eq!(anns.len(), 2);
    assert_eq!(anns[1].path, "extra");
    assert_eq!(anns[1].value, Some(int(0x1234)));
}

#[test]
fn test_if_guard_false_skips_without_error() {
    let (anns, pos) = run(IF_GUARD, &[0x00]);
    assert_eq!(anns.len(), 1);
    assert_eq!(pos, 1);
}

// ========== Ordering and coverage ==========

#[test]
fn test_annotations_cover_read_bytes_without_overlap() {
    let data = [0x02, 0x11, 0x22, 0x33, 0x44, 0x61, 0x62, 0x00];
    let (anns, _) = run(
        "meta:\n  id: m\n  endian: le\nseq:\n  - id: n\n    type: u1\n  - id: pairs\n    type: u2\n    repeat: expr\n    repeat-expr: n\n  - id: name\n    type: strz\n",
        &data,
    );
    let mut covered = vec![false; data.len()];
    for ann in &anns {
        for i in ann.range.start..ann.range.end {
            assert!(!covered[i as usize], "byte {} annotated twice", i);
            covered[i as usize] = true;
        }
    }
    assert!(covered.iter().all(|&c| c), "uncovered bytes: {:?}", covered);
}

#[test]
fn test_annotations_in_read_order() {
    let (anns, _) = run(
        "meta:\n  id: m\nseq:\n  - id: a\n    type: u1\n  - id: b\n    type: u1\n  - id: c\n    type: u1\n",
        &[1, 2, 3],
    );
    let paths: Vec<_> = anns.iter().map(|a| a.path.as_str()).collect();
    assert_eq!(paths, vec!["a", "b", "c"]);
    let starts: Vec<_> = anns.iter().map(|a| a.range.start).collect();
    assert_eq!(starts, vec![0, 1, 2]);
}

// ========== Expressions against earlier fields ==========

#[test]
fn test_size_expression_references_fields() {
    let (anns, _) = run(
        "meta:\n  id: m\nseq:\n  - id: a\n    type: u1\n  - id: b\n    type: u1\n  - id: blob\n    size: a + b\n",
        &[0x01, 0x02, 0xaa, 0xbb, 0xcc],
    );
    assert_eq!(
        anns[2].value,
        Some(Value::Bytes(vec![0xaa, 0xbb, 0xcc]))
    );
}

#[test]
fn test_repeat_until_with_struct_stream() {
    // _io in the predicate refers to the active stream.
    let (anns, _) = run(
        "meta:\n  id: m\nseq:\n  - id: xs\n    type: u1\n    repeat: until\n    repeat-until: _io.eof\n",
        &[5, 6, 7],
    );
    assert_eq!(anns.len(), 3);
    assert_eq!(anns[2].value, Some(int(7)));
}
