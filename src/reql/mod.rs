//! Just enough of ReQL to talk to the store: the term encoding and the
//! query/response envelope.

pub mod proto;
pub mod term;

pub use term::Term;
