mod common;

use sapling::{
    DocumentKind, NodeKind, ParseError, ParseOptions, parse_html, parse_html_bytes,
    parse_xml, parse_xml_bytes, parse_xml_with,
};

#[test]
fn test_xml_document_structure() {
    common::setup();
    let doc = parse_xml(
        r#"<?xml version="1.0"?><!-- top --><library><book isbn="1"><title>Dune</title></book></library>"#,
    )
    .unwrap();
    assert_eq!(doc.kind(), DocumentKind::Xml);
    assert_eq!(doc.declaration(), Some(r#"version="1.0""#));

    let top: Vec<_> = doc.children(doc.document_node()).collect();
    assert_eq!(top.len(), 2);
    assert!(matches!(doc.get(top[0]), Some(NodeKind::Comment(_))));

    let root = doc.root().unwrap();
    assert_eq!(root.tag_name().as_deref(), Some("library"));
    let book = root.element_children().next().unwrap();
    assert_eq!(book.attr("isbn"), Some("1"));
    assert_eq!(book.content(), "Dune");
}

#[test]
fn test_malformed_xml_is_recovered() {
    common::setup();
    let doc = parse_xml("<r><a>unclosed</r>").unwrap();
    assert_eq!(doc.root().unwrap().tag_name().as_deref(), Some("r"));
    assert_eq!(doc.root().unwrap().content(), "unclosed");
}

#[test]
fn test_failure_policy() {
    common::setup();
    assert_eq!(parse_xml("").unwrap_err(), ParseError::Empty);
    assert_eq!(parse_xml(" \n\t").unwrap_err(), ParseError::Empty);
    assert_eq!(parse_html("").unwrap_err(), ParseError::Empty);
    assert_eq!(
        parse_xml("<!-- only a comment -->").unwrap_err(),
        ParseError::NoRootElement
    );
}

#[test]
fn test_strip_comments_option() {
    common::setup();
    let opts = ParseOptions::new().strip_comments();
    let doc = parse_xml_with("<r><!--gone--><a/></r>", &opts).unwrap();
    assert_eq!(doc.to_xml(), "<r><a/></r>");
}

#[test]
fn test_xml_bytes_follow_declaration() {
    common::setup();
    let bytes = b"<?xml version=\"1.0\" encoding=\"windows-1252\"?><r>\x93quoted\x94</r>";
    let doc = parse_xml_bytes(bytes, &ParseOptions::default()).unwrap();
    assert_eq!(doc.root().unwrap().content(), "\u{201c}quoted\u{201d}");
}

#[test]
fn test_bytes_with_explicit_encoding() {
    common::setup();
    let opts = ParseOptions::new().encoding("latin1");
    let doc = parse_xml_bytes(b"<r>caf\xe9</r>", &opts).unwrap();
    assert_eq!(doc.root().unwrap().content(), "café");

    let opts = ParseOptions::new().encoding("klingon");
    assert_eq!(
        parse_xml_bytes(b"<r/>", &opts).unwrap_err(),
        ParseError::UnknownEncoding("klingon".to_string())
    );
}

#[test]
fn test_invalid_utf8_is_replaced() {
    common::setup();
    let doc = parse_xml_bytes(b"<r>a\xffb</r>", &ParseOptions::default()).unwrap();
    assert_eq!(doc.root().unwrap().content(), "a\u{fffd}b");
}

#[test]
fn test_html_document() {
    common::setup();
    let doc = parse_html(
        "<!DOCTYPE html><title>Shop</title><p class=intro>Hello<p>World",
    )
    .unwrap();
    assert_eq!(doc.kind(), DocumentKind::Html);
    assert_eq!(doc.doctype(), Some("html"));
    assert_eq!(doc.title().as_deref(), Some("Shop"));
    let body = doc.node(doc.body().unwrap()).unwrap();
    assert_eq!(body.element_children().count(), 2);
    assert_eq!(body.inner_html(), "<p class=\"intro\">Hello</p><p>World</p>");
}

#[test]
fn test_html_bytes_meta_charset() {
    common::setup();
    let bytes = b"<html><head><meta charset=\"windows-1252\"><title>caf\xe9</title></head></html>";
    let doc = parse_html_bytes(bytes, &ParseOptions::default()).unwrap();
    assert_eq!(doc.title().as_deref(), Some("café"));
}

#[test]
fn test_utf16_bytes_without_bom() {
    common::setup();
    let xml = "<?xml version=\"1.0\" encoding=\"UTF-16\"?><r>café</r>";
    let bytes: Vec<u8> = xml.encode_utf16().flat_map(u16::to_le_bytes).collect();
    let doc = parse_xml_bytes(&bytes, &ParseOptions::default()).unwrap();
    assert_eq!(doc.root().unwrap().content(), "café");
    assert_eq!(
        doc.to_xml(),
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<r>café</r>"
    );
}

#[test]
fn test_namespaces_are_resolved() {
    common::setup();
    let doc = parse_xml(r#"<x:r xmlns:x="urn:x" xmlns:y="urn:y"><x:a y:k="v"/></x:r>"#).unwrap();
    let a = doc.at_css("a").unwrap().unwrap();
    let elem = doc.element(a).unwrap();
    assert_eq!(elem.tag_name(), "x:a");
    assert_eq!(&*elem.name.ns, "urn:x");
    assert_eq!(elem.attr("y:k"), Some("v"));
    assert_eq!(elem.attr_namespaces.len(), 1);
    assert_eq!(&*elem.attr_namespaces[0].1, "urn:y");
}
