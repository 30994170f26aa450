use slikpdf_to_xlsx::{
    build_debtor_summary, parse_batch, parse_report, DocumentText, FacilityRecord, Rupiah,
};

fn record(debtor: &str, raw: u64) -> FacilityRecord {
    FacilityRecord {
        debtor_name: debtor.to_string(),
        reporter: "602607 - PT Bank Perekonomian Rakyat".to_string(),
        facility_type: "Modal Kerja".to_string(),
        quality: "2".to_string(),
        overdue_days: "0".to_string(),
        start_date: "-".to_string(),
        due_date: "-".to_string(),
        approved_limit: "-".to_string(),
        interest_rate: "-".to_string(),
        outstanding: Rupiah::from_raw(raw),
        collateral: "-".to_string(),
    }
}

fn individual_report(name: &str, amount: &str) -> DocumentText {
    let first_page = format!(
        "RAHASIA\nInformasi Debitur\n\
         Nama Sesuai Identitas Identitas Jenis Kelamin\n\
         {} NIK / LAKI-LAKI\n",
        name
    );
    let segment = format!(
        "602607 - PT Bank Perekonomian Rakyat Pusat Rp {} 28 Februari 2024\n\
         Kualitas 2 - Dalam Perhatian Khusus\n",
        amount
    );
    let full = format!(
        "{}Kredit/Pembiayaan\nPelapor Cabang Baki Debet Tanggal Update\n{}",
        first_page, segment
    );
    DocumentText { full, first_page }
}

#[test]
fn summary_groups_and_orders_by_total_descending() {
    let records =
        vec![record("A", 100), record("B", 50), record("A", 200)];
    let summary = build_debtor_summary(&records);
    assert_eq!(summary.len(), 2);
    assert_eq!(summary[0].debtor_name, "A");
    assert_eq!(summary[0].facility_count, 2);
    assert_eq!(summary[0].total_outstanding.raw, 300);
    assert_eq!(summary[0].total_outstanding.display, "Rp 300");
    assert_eq!(summary[1].debtor_name, "B");
    assert_eq!(summary[1].facility_count, 1);
    assert_eq!(summary[1].total_outstanding.raw, 50);
}

#[test]
fn summary_tie_keeps_first_seen_order() {
    let records = vec![record("B", 100), record("A", 100)];
    let summary = build_debtor_summary(&records);
    assert_eq!(summary[0].debtor_name, "B");
    assert_eq!(summary[1].debtor_name, "A");
}

#[test]
fn summary_of_no_records_is_empty() {
    assert!(build_debtor_summary(&[]).is_empty());
}

#[test]
fn report_keeps_passing_segment_and_drops_filtered_one() {
    let first_page = "Nama Sesuai Identitas Identitas Jenis Kelamin\nSAKUAN NIK / LAKI-LAKI\n";
    // the second facility is Lancar and not marked active, so it is dropped;
    // the first carries a watermark fragment inside the amount
    let full = format!(
        "RAHASIA\n{}\
         Kredit/Pembiayaan\nPelapor Cabang Baki Debet Tanggal Update\n\
         602607 - PT Bank Perekonomian Rakyat Pusat Rp 383.570.RAHASIA669,00 28 Februari 2024\n\
         Kualitas 2 - Dalam Perhatian Khusus\n\
         Kredit/Pembiayaan\nPelapor Cabang Baki Debet Tanggal Update\n\
         113 - BANK ABC KPO Rp 0,00 31 Januari 2024\n\
         Kualitas 1 - Lancar\n",
        first_page
    );
    let doc = DocumentText { full, first_page: first_page.to_string() };

    let report = parse_report(&doc);
    assert_eq!(report.debtor_name, "SAKUAN");
    assert_eq!(report.segments_seen, 2);
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].outstanding.raw, 383570669);

    let summary = build_debtor_summary(&report.records);
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].facility_count, 1);
    assert_eq!(summary[0].total_outstanding.raw, 383570669);
}

#[test]
fn batch_continues_past_a_failing_document() {
    let docs = vec![
        ("doc1".to_string(), Ok(individual_report("SAKUAN", "100.000,00"))),
        ("doc2".to_string(), Err("EncryptedPDF: doc2.pdf".to_string())),
        ("doc3".to_string(), Ok(individual_report("SUPRIADI", "50.000,00"))),
    ];
    let outcome = parse_batch(docs);

    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.records[0].debtor_name, "SAKUAN");
    assert_eq!(outcome.records[1].debtor_name, "SUPRIADI");
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].doc_id, "doc2");
    assert!(outcome.failures[0].message.contains("EncryptedPDF"));
}

#[test]
fn batch_reports_documents_without_text() {
    let docs = vec![("doc1".to_string(), Ok(DocumentText::default()))];
    let outcome = parse_batch(docs);
    assert!(outcome.records.is_empty());
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].message, "no text extracted");
}
