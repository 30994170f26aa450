use slikpdf_to_xlsx::{extract_debtor_name, strip_watermark};

#[test]
fn strip_removes_standalone_watermark_and_disclaimer() {
    let input = "RAHASIA\nInformasi Debitur\nInformasi ini bersifat RAHASIA dan hanya digunakan untuk kepentingan pemohon informasi.\nPosisi Data Terakhir";
    let out = strip_watermark(input);
    assert!(!out.contains("RAHASIA"));
    assert!(!out.contains("hanya digunakan untuk kepentingan"));
    assert!(out.contains("Informasi Debitur"));
    assert!(out.contains("Posisi Data Terakhir"));
}

#[test]
fn strip_removes_fragment_inside_number_without_space() {
    // pdf extraction may interleave the watermark into an amount
    let out = strip_watermark("Rp 1.500.RAHASIA000");
    assert_eq!(out, "Rp 1.500000");
}

#[test]
fn strip_is_idempotent() {
    let input = "RAHASIA\nBaki Debet Rp 383.570.RAHASIA669\nKualitas 1 - Lancar";
    let once = strip_watermark(input);
    let twice = strip_watermark(&once);
    assert_eq!(once, twice);
}

#[test]
fn debtor_name_company_header() {
    let page = "Nama Debitur NPWP Bentuk BU / Go Public Tempat Pendirian\nYAYASAN BUMI MAITRI 024828006214000 Yayasan / Tidak Go Public";
    assert_eq!(extract_debtor_name(page), "YAYASAN BUMI MAITRI");
}

#[test]
fn debtor_name_individual_header() {
    let page = "Nama Sesuai Identitas Identitas Jenis Kelamin Tanggal Lahir\nSAKUAN NIK / LAKI-LAKI / 01-02-1975";
    assert_eq!(extract_debtor_name(page), "SAKUAN");
}

#[test]
fn debtor_name_bare_nama_fallback() {
    let page = "Ringkasan Laporan\nNama\nINDO PERMATA AYU Posisi Data Terakhir";
    assert_eq!(extract_debtor_name(page), "INDO PERMATA AYU");
}

#[test]
fn debtor_name_last_resort_gender_header() {
    let page = "Nama Jenis Kelamin Tanggal Lahir\nSUPRIADI\n";
    assert_eq!(extract_debtor_name(page), "SUPRIADI");
}

#[test]
fn debtor_name_unknown_when_no_pattern_matches() {
    assert_eq!(extract_debtor_name("halaman kosong"), "-");
}

#[test]
fn debtor_name_company_header_wins_over_looser_patterns() {
    // Both the company header and the last-resort pattern could match; the
    // company header must win.
    let page = "Nama Debitur NPWP Bentuk BU / Go Public\nINDO PERMATA AYU 0029032988215000 Perseroan Terbatas\nNama Jenis Kelamin\nSALAH TANGKAP";
    assert_eq!(extract_debtor_name(page), "INDO PERMATA AYU");
}
