// Stream-directed evaluation: walks a schema against bytes and produces an
// ordered annotation log

pub mod annotation;
pub mod evaluator;
pub mod stream;

pub use annotation::{Annotation, PathItem, Range};
pub use evaluator::Evaluator;
pub use stream::{decode_str, Stream, Whence};
