//! Intent/slot understanding skills and the question correction pass.

pub mod correction;
pub mod manager;
pub mod runtime;
