//! Integration tests for dirmirror-remote
//!
//! Uses wiremock to simulate the disk API and the upload host, and verifies
//! the status classification of `DiskStorage` end to end.

mod common;

mod test_resources;
mod test_upload;
