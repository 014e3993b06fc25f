// Binary format schema language: parser, type system, evaluator, and code
// emitters

pub mod emit;
pub mod engine;
pub mod error;
pub mod eval;
pub mod expr;
pub mod ksy;
pub mod resolve;
pub mod schema;
pub mod types;

pub use emit::{Artifact, Emitter, RustEmitter};
pub use error::Error;
pub use eval::{Annotation, Evaluator};
pub use expr::Expr;
pub use ksy::parse_schema;
pub use resolve::{Resolver, SchemaSource};
pub use schema::Struct;

/// Main entry point for the schema engine. Bundles a resolver with the
/// parse, evaluate, and generate operations.
pub struct SchemaEngine {
    resolver: Resolver,
}

impl SchemaEngine {
    /// Engine resolving imports from the filesystem.
    pub fn new() -> Self {
        Self {
            resolver: Resolver::from_fs(),
        }
    }

    /// Engine with a custom import resolver.
    pub fn with_resolver(resolver: Resolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Parse schema source text into the schema AST.
    pub fn parse(&self, source: &str) -> Result<Struct, Error> {
        Ok(parse_schema(source.as_bytes())?)
    }

    /// Evaluate a schema against binary data, producing the annotation log.
    /// `input_name` is the logical name imports resolve relative to; pass
    /// an empty string when there is none.
    pub fn evaluate(
        &self,
        input_name: &str,
        schema: &Struct,
        data: &[u8],
    ) -> Result<Vec<Annotation>, Error> {
        let mut evaluator = Evaluator::new(&self.resolver, data);
        evaluator.evaluate(input_name, schema)
    }

    /// Parse and evaluate in one step.
    pub fn run(&self, source: &str, data: &[u8]) -> Result<Vec<Annotation>, Error> {
        let schema = self.parse(source)?;
        self.evaluate("", &schema, data)
    }

    /// Generate Rust source artifacts for a schema.
    pub fn generate_rust(
        &self,
        input_name: &str,
        schema: &Struct,
    ) -> Result<Vec<Artifact>, Error> {
        let mut emitter = RustEmitter::new(Some(&self.resolver));
        emitter.emit(input_name, schema).map_err(Error::Eval)
    }
}

impl Default for SchemaEngine {
    fn default() -> Self {
        Self::new()
    }
}
