//! End-to-end scenarios for vdoc stores.

mod harness;
mod scenarios;
