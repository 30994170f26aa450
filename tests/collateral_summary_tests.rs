use slikpdf_to_xlsx::summarize_collateral;

fn items(texts: &[&str]) -> Vec<String> {
    texts.iter().map(|s| s.to_string()).collect()
}

#[test]
fn large_proof_group_collapses_to_count() {
    let proofs = items(&["SHM NO 7880", "SHM NO 7881", "SHM NO 7882", "SHM.7883"]);
    assert_eq!(summarize_collateral(&proofs, &[]), "4 SHM");
}

#[test]
fn small_proof_groups_are_listed_verbatim() {
    let proofs = items(&["SHM NO 7880", "SHGB.9240"]);
    assert_eq!(summarize_collateral(&proofs, &[]), "SHM NO 7880 | SHGB.9240");
}

#[test]
fn proof_prefix_match_is_case_insensitive() {
    let proofs = items(&["shm no 2", "SHM NO 1"]);
    assert_eq!(summarize_collateral(&proofs, &[]), "shm no 2, SHM NO 1");
}

#[test]
fn unknown_proof_prefixes_group_under_lainnya() {
    let proofs = items(&["Surat Keterangan Lurah"]);
    assert_eq!(summarize_collateral(&proofs, &[]), "Surat Keterangan Lurah");

    let many = items(&["Girik 1", "Girik 2", "Letter C 3", "Petok D 4"]);
    assert_eq!(summarize_collateral(&many, &[]), "4 Lainnya");
}

#[test]
fn repeated_type_text_gets_a_count() {
    let types = items(&["Tanah", "Tanah"]);
    assert_eq!(summarize_collateral(&[], &types), "Tanah (2)");
}

#[test]
fn single_type_is_bare_and_large_type_group_collapses() {
    assert_eq!(summarize_collateral(&[], &items(&["Rumah Tinggal"])), "Rumah Tinggal");
    assert_eq!(
        summarize_collateral(&[], &items(&["Tanah", "Tanah", "Tanah", "Tanah"])),
        "4 Tanah"
    );
}

#[test]
fn groups_keep_first_encounter_order() {
    let proofs = items(&["BPKB 111", "SHM NO 1", "BPKB 222"]);
    let types = items(&["Kendaraan Bermotor", "Tanah", "Kendaraan Bermotor"]);
    assert_eq!(
        summarize_collateral(&proofs, &types),
        "BPKB 111, BPKB 222 | SHM NO 1 | Kendaraan Bermotor (2) | Tanah"
    );
}

#[test]
fn empty_inputs_yield_unknown_sentinel() {
    assert_eq!(summarize_collateral(&[], &[]), "-");
}
