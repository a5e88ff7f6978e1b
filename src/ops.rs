pub mod catch;
pub mod delay;
pub mod join;
pub mod merge;
pub mod merge_all;
pub mod observe_on;
pub mod retry;
pub mod sample;
pub mod switch_on_next;
pub mod zip;
