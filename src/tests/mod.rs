mod clock;
mod timer;
mod timestamp;

pub(crate) mod support;
