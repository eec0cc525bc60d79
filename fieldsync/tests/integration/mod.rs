mod audit_test;
mod common;
mod mirror_test;
mod resume_test;
mod sync_test;
