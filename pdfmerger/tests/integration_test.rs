#[path = "integration/common/mod.rs"]
mod common;

#[path = "integration/basic_merge.rs"]
mod basic_merge;

#[path = "integration/dry_run.rs"]
mod dry_run;

#[path = "integration/error_cases.rs"]
mod error_cases;

#[path = "integration/file_wrappers.rs"]
mod file_wrappers;
