//! Poll operations. Handlers extract plain request values and call these;
//! nothing here knows about HTTP.

pub mod poll;
pub mod vote;
