pub mod run_cmd;
pub mod seeds_cmd;
