// Generated-code smoke tests for the Rust emitter

use ksy_lang::resolve::{MemorySource, Resolver};
use ksy_lang::{Artifact, SchemaEngine};

fn generate(src: &str) -> Vec<Artifact> {
    let engine = SchemaEngine::with_resolver(Resolver::new(MemorySource::new()));
    let schema = engine.parse(src).expect("schema parse failed");
    engine.generate_rust("", &schema).expect("emit failed")
}

fn body(artifact: &Artifact) -> &str {
    std::str::from_utf8(&artifact.body).unwrap()
}

#[test]
fn test_single_artifact_per_schema() {
    let artifacts = generate(
        "meta:\n  id: wire_frame\n  endian: be\nseq:\n  - id: length\n    type: u4\n  - id: payload\n    size: length\n",
    );
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].filename, "wire_frame.rs");
    let out = body(&artifacts[0]);
    assert!(out.contains("pub struct WireFrame {"));
    assert!(out.contains("pub length: u32,"));
    assert!(out.contains("pub payload: Vec<u8>,"));
    assert!(out.contains("io.read_u4be()?"));
    assert!(out.contains("io.read_bytes(((self.length as i64)) as u64)?"));
}

#[test]
fn test_imports_become_artifacts() {
    let mut source = MemorySource::new();
    source.insert(
        "common.ksy",
        "meta:\n  id: common\n  endian: le\nseq:\n  - id: tag\n    type: u2\n",
    );
    let engine = SchemaEngine::with_resolver(Resolver::new(source));
    let schema = engine
        .parse("meta:\n  id: top\n  imports:\n    - common\nseq:\n  - id: head\n    type: common\n")
        .unwrap();
    let artifacts = engine.generate_rust("", &schema).unwrap();
    let names: Vec<_> = artifacts.iter().map(|a| a.filename.as_str()).collect();
    assert_eq!(names, vec!["common.rs", "top.rs"]);
    let top = body(&artifacts[1]);
    assert!(top.contains("pub head: Common,"));
    assert!(top.contains("let mut tmp = Common::default();"));
}

#[test]
fn test_multi_endian_read_functions() {
    let artifacts = generate(
        "meta:\n  id: header\nseq:\n  - id: version\n    type: u2\n",
    );
    let out = body(&artifacts[0]);
    // Unspecified, little, and big variants are all generated.
    assert!(out.contains("pub fn read(&mut self"));
    assert!(out.contains("pub fn read_le(&mut self"));
    assert!(out.contains("pub fn read_be(&mut self"));
    assert!(out.contains("io.read_u2le()?"));
    assert!(out.contains("io.read_u2be()?"));
}

#[test]
fn test_endian_switch_dispatcher() {
    let artifacts = generate(
        "meta:\n  id: header\n  endian:\n    switch-on: order\n    cases:\n      1: le\n      2: be\nseq:\n  - id: order\n    type: u1\n  - id: value\n    type: u4\n",
    );
    let out = body(&artifacts[0]);
    assert!(out.contains("let on: i64 = (self.order as i64);"));
    assert!(out.contains("return self.read_le(io);"));
    assert!(out.contains("return self.read_be(io);"));
    assert!(out.contains("EvalError::undecided_endian"));
}

#[test]
fn test_type_switch_cases_enum() {
    let artifacts = generate(
        "meta:\n  id: packet\n  endian: le\nseq:\n  - id: kind\n    type: u1\n  - id: body\n    type:\n      switch-on: kind\n      cases:\n        1: u4\n        2: inner\ntypes:\n  inner:\n    seq:\n      - id: x\n        type: u2le\n",
    );
    let out = body(&artifacts[0]);
    assert!(out.contains("pub enum Packet_Body_Cases {"));
    assert!(out.contains("C1(u32),"));
    assert!(out.contains("C2(Packet_Inner),"));
    assert!(out.contains("fn read_body_cases(&mut self"));
    assert!(out.contains("self.body = Packet_Body_Cases::C1(tmp);"));
}

#[test]
fn test_doc_free_reserved_fields_do_not_break_emit() {
    let artifacts = generate(
        "meta:\n  id: m\n  endian: le\nseq:\n  - id: n\n    type: u1\n  - id: skipme\n    value: n * 2\n  - id: tail\n    size-eos: true\n",
    );
    let out = body(&artifacts[0]);
    // Computed attributes produce no field and no read.
    assert!(!out.contains("skipme"));
    assert!(out.contains("io.read_bytes_full()?"));
}
