pub mod cycle_removal;
pub mod decision;
pub mod pat;
pub mod profile;
pub mod stop_label;
pub mod worker;
