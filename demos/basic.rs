//! A small pipeline: fetch, parse, recover
//!
//! Run with: cargo run --example basic

use std::io;

use stagex::{Cause, Node};

fn parse(raw: &str) -> Result<u32, std::num::ParseIntError> {
    raw.trim().parse()
}

fn main() {
    let response: Node<String> = Node::new();

    let parsed = response.then_apply(|raw| parse(raw));
    let doubled = parsed.then_apply(|n| n.as_ref().map(|n| n * 2).unwrap_or(0));
    let report = doubled
        .then_apply(|n| format!("doubled: {n}"))
        .exceptionally(|cause: &Cause| format!("request failed: {cause}"));

    println!("before completion: {response}");
    response.complete(" 21 ".to_string());
    println!("after completion:  {response}");
    println!("{}", report.join().unwrap());

    // The same pipeline against a failed request
    let failed: Node<String> = Node::new();
    let report = failed
        .then_apply(|raw| raw.len())
        .handle(|result| match result {
            Ok(len) => format!("{len} bytes"),
            Err(cause) => format!("no body: {cause}"),
        });
    failed.complete_exceptionally(io::Error::new(io::ErrorKind::TimedOut, "upstream timed out"));
    println!("{}", report.join().unwrap());
}
