//! Serialization idempotence over `tests/roundtrip-cases/*.xml`.
//!
//! For every case: serialize the parsed document, parse that output again,
//! and check both serializations agree. The output also has to survive a
//! trip through bytes, and pretty output must be stable too.

mod common;

use sapling::{SerializeOptions, parse_xml_bytes, parse_xml};
use std::path::Path;

fn run_roundtrip_test(path: &Path) -> datatest_stable::Result<()> {
    common::setup();

    let bytes = std::fs::read(path)?;
    let doc = parse_xml_bytes(&bytes, &Default::default())
        .map_err(|e| format!("parse failed: {e}"))?;

    let once = doc.to_xml();
    let reparsed = parse_xml(&once).map_err(|e| format!("reparse failed: {e}"))?;
    let twice = reparsed.to_xml();
    if once != twice {
        return Err(format!("Roundtrip failed!\nFirst: {once}\nSecond: {twice}").into());
    }

    // written as UTF-8, so the declaration must say so
    let from_bytes = parse_xml_bytes(once.as_bytes(), &Default::default())
        .map_err(|e| format!("bytes reparse failed: {e}"))?
        .to_xml();
    if once != from_bytes {
        return Err(format!("Bytes roundtrip failed!\nFirst: {once}\nSecond: {from_bytes}").into());
    }

    let pretty = SerializeOptions::new().pretty();
    let pretty_once = doc.to_xml_with(&pretty);
    let pretty_twice = parse_xml(&pretty_once)
        .map_err(|e| format!("pretty reparse failed: {e}"))?
        .to_xml_with(&pretty);
    if pretty_once != pretty_twice {
        return Err(
            format!("Pretty roundtrip failed!\nFirst: {pretty_once}\nSecond: {pretty_twice}").into(),
        );
    }

    Ok(())
}

datatest_stable::harness! {
    { test = run_roundtrip_test, root = "tests/roundtrip-cases", pattern = r".*\.xml$" },
}
