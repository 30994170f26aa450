use std::path::PathBuf;

use slikpdf_to_xlsx::{document_text_from_pages, poppler_extract, PopplerError};

#[test]
fn poppler_extract_file_not_found() {
    let p = PathBuf::from("./this/does/not/exist.pdf");
    let err = poppler_extract(&p, true).unwrap_err();
    match err {
        PopplerError::FileNotFound(_) => {}
        _ => panic!("expected FileNotFound"),
    }
}

#[test]
fn document_text_keeps_first_page_separate() {
    let pages = vec!["page one".to_string(), "page two".to_string()];
    let doc = document_text_from_pages(&pages);
    assert_eq!(doc.first_page, "page one");
    assert_eq!(doc.full, "page one\npage two\n");
}

#[test]
fn document_text_from_no_pages_is_empty() {
    let doc = document_text_from_pages(&[]);
    assert!(doc.full.is_empty());
    assert!(doc.first_page.is_empty());
}
