use std::collections::HashSet;
use std::fs;
use std::path::Path;

use slikpdf_to_xlsx::{
    build_debtor_summary, check_deps, document_text_from_pages, emit_outputs, enumerate_pdfs,
    export_workbook, format_rupiah, nala_help_for, parse_report, poppler_extract, sha256_hex,
    split_facility_segments, strip_watermark, validate_prd, BatchFailure, DepsResult,
    FacilityRecord, PopplerError,
};

fn main() {
    // Simple CLI flags parsing
    let args: Vec<String> = std::env::args().collect();
    let dump_steps = args.iter().any(|a| a == "--dump-steps");
    // Layout flag supports: --layout, --layout=on, --layout=off
    let mut layout = true;
    if let Some(val) = args.iter().find(|a| a.starts_with("--layout")) {
        if let Some(eqpos) = val.find('=') {
            layout = &val[eqpos + 1..] != "off";
        }
    }

    // Track used slugs for artifact directory uniqueness
    let mut used_doc_ids: HashSet<String> = HashSet::new();

    fn slugify(base: &str) -> String {
        let lower = base.to_lowercase();
        let mut s = String::with_capacity(lower.len());
        for ch in lower.chars() {
            if ch.is_ascii_alphanumeric() {
                s.push(ch);
            } else {
                s.push('-');
            }
        }
        let trimmed = s.trim_matches('-').to_string();
        let mut collapsed = String::with_capacity(trimmed.len());
        let mut prev_dash = false;
        for ch in trimmed.chars() {
            if ch == '-' {
                if !prev_dash {
                    collapsed.push(ch);
                }
                prev_dash = true;
            } else {
                prev_dash = false;
                collapsed.push(ch);
            }
        }
        if collapsed.is_empty() {
            "doc".to_string()
        } else {
            collapsed
        }
    }

    fn unique_slug(slug_in: String, used: &mut HashSet<String>) -> String {
        if !used.contains(&slug_in) {
            used.insert(slug_in.clone());
            return slug_in;
        }
        let mut i = 1;
        loop {
            let candidate = format!("{}-{}", slug_in, i);
            if !used.contains(&candidate) {
                used.insert(candidate.clone());
                return candidate;
            }
            i += 1;
        }
    }

    // 1) Read and validate prd.yaml
    let prd_path = Path::new("prd.yaml");
    let prd = match validate_prd(prd_path) {
        Ok(p) => p,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::json!({
                    "tool": "validate_prd",
                    "file": "prd.yaml",
                    "error": e.to_string()
                })
            );
            std::process::exit(3);
        }
    };

    eprintln!(
        "{}",
        serde_json::json!({
            "tool":"validate_prd",
            "file":"prd.yaml",
            "status":"ok",
            "input_glob": prd.input_glob(),
            "output_dir": prd.output_dir()
        })
    );

    // 2) check_deps
    let deps: DepsResult = check_deps();
    if !deps.ok {
        eprintln!(
            "{}",
            serde_json::json!({
                "tool":"check_deps",
                "missing": deps.missing,
                "error_code": 2
            })
        );
        let help = nala_help_for(&deps.missing);
        if !help.is_empty() {
            eprintln!("{}", help);
        }
        std::process::exit(2);
    } else {
        eprintln!(
            "{}",
            serde_json::json!({
                "tool":"check_deps",
                "status":"ok",
                "missing": deps.missing
            })
        );
    }

    // 3) enumerate_pdfs on configured glob
    let files = match enumerate_pdfs(&prd.input_glob()) {
        Ok(files) => files,
        Err(err) => {
            let guidance = match err {
                slikpdf_to_xlsx::EnumerateError::NoFilesFound { guidance } => guidance,
            };
            eprintln!(
                "{}",
                serde_json::json!({
                    "tool":"enumerate_pdfs",
                    "error":"NoFilesFound",
                    "error_code":1
                })
            );
            eprintln!("{}", guidance);
            std::process::exit(1);
        }
    };

    eprintln!(
        "{}",
        serde_json::json!({
            "tool":"enumerate_pdfs",
            "count": files.len(),
        })
    );

    let started_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i128)
        .unwrap_or(0);

    let base_output = prd.output_dir();
    let mut all_records: Vec<FacilityRecord> = Vec::new();
    let mut failures: Vec<BatchFailure> = Vec::new();

    // Process each file: extract text -> parse facilities. A failing file is
    // reported and skipped; the batch never aborts on a single document.
    for file in &files {
        let fname = file.file_name().and_then(|s| s.to_str()).unwrap_or("doc.pdf").to_string();
        let doc_id = unique_slug(slugify(fname.trim_end_matches(".pdf")), &mut used_doc_ids);

        let pages = match poppler_extract(file, layout) {
            Ok(pages) => pages,
            Err(err) => {
                let label = match err {
                    PopplerError::FileNotFound(_) => "FileNotFound",
                    PopplerError::EncryptedPDF(_) => "EncryptedPDF",
                    PopplerError::Other(_) => "PopplerError",
                };
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "tool":"poppler_extract",
                        "file": file,
                        "error": label
                    })
                );
                failures.push(BatchFailure { doc_id, message: label.to_string() });
                continue;
            }
        };
        eprintln!(
            "{}",
            serde_json::json!({
                "tool":"poppler_extract",
                "file": file,
                "pages": pages.len()
            })
        );

        let doc = document_text_from_pages(&pages);
        if doc.full.trim().is_empty() {
            eprintln!(
                "{}",
                serde_json::json!({
                    "tool":"parse_slik",
                    "file": file,
                    "error":"NoTextExtracted"
                })
            );
            failures.push(BatchFailure { doc_id, message: "no text extracted".to_string() });
            continue;
        }

        if dump_steps {
            let artifacts_dir = format!("{}/artifacts/{}", base_output, doc_id);
            dump_step_files(&artifacts_dir, &doc.full);
        }

        let report = parse_report(&doc);
        eprintln!(
            "{}",
            serde_json::json!({
                "tool":"parse_slik",
                "file": file,
                "debtor": report.debtor_name,
                "segments": report.segments_seen,
                "facilities": report.records.len()
            })
        );
        all_records.extend(report.records);
    }

    if all_records.is_empty() {
        // Nothing passed the inclusion rule anywhere in the batch
        eprintln!(
            "{}",
            serde_json::json!({
                "tool":"parse_slik",
                "status":"no_active_facilities",
                "failures": failures
            })
        );
        return;
    }

    // 4) Per-debtor summary and grand total
    let summary = build_debtor_summary(&all_records);
    let grand_total_raw: u64 = summary.iter().map(|s| s.total_outstanding.raw).sum();
    eprintln!(
        "{}",
        serde_json::json!({
            "tool":"build_debtor_summary",
            "debtors": summary.len(),
            "grand_total": format_rupiah(grand_total_raw)
        })
    );

    let unique_debtors: HashSet<&str> =
        all_records.iter().map(|r| r.debtor_name.as_str()).collect();
    let unique_reporters: HashSet<&str> =
        all_records.iter().map(|r| r.reporter.as_str()).collect();

    let finished_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i128)
        .unwrap_or(0);

    let meta = serde_json::json!({
        "engine": "poppler",
        "documents": files.len(),
        "failures": failures,
        "facilities": all_records.len(),
        "unique_debtors": unique_debtors.len(),
        "unique_reporters": unique_reporters.len(),
        "grand_total": {
            "display": format_rupiah(grand_total_raw),
            "raw": grand_total_raw
        },
        "timestamps": {"started_ms": started_ms, "finished_ms": finished_ms},
    });
    // Compute meta_fingerprint (normalized meta without timestamps)
    let mut meta_norm = meta.clone();
    if let Some(obj) = meta_norm.as_object_mut() {
        obj.remove("timestamps");
    }
    let fingerprint = sha256_hex(&serde_json::to_vec(&meta_norm).unwrap_or_default());
    let mut meta_full = meta.as_object().cloned().unwrap_or_default();
    meta_full.insert("meta_fingerprint".to_string(), serde_json::json!(fingerprint));
    let meta = serde_json::Value::Object(meta_full);

    // 5) Emit workbook + meta (atomic)
    let stem = format!("SLIK_Active_Facilities_{}", finished_ms);
    let xlsx_bytes = match export_workbook(&all_records, &summary) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::json!({
                    "tool":"export_workbook",
                    "error": e.to_string(),
                    "error_code": 6
                })
            );
            std::process::exit(6);
        }
    };
    match emit_outputs(&xlsx_bytes, &meta, &base_output, &stem) {
        Ok(paths) => {
            eprintln!(
                "{}",
                serde_json::json!({
                    "tool":"emit_outputs",
                    "xlsx_path": paths.xlsx_path,
                    "meta_path": paths.meta_path
                })
            );
        }
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::json!({
                    "tool":"emit_outputs",
                    "error": e.to_string(),
                    "error_code": 6
                })
            );
            std::process::exit(6);
        }
    }
}

/// Write per-document troubleshooting artifacts: the raw extracted text, the
/// cleaned text and the first lines of each candidate facility segment.
fn dump_step_files(artifacts_dir: &str, full_text: &str) {
    if let Err(e) = fs::create_dir_all(artifacts_dir) {
        eprintln!(
            "{}",
            serde_json::json!({
                "tool":"dump_steps",
                "dir": artifacts_dir,
                "error": e.to_string()
            })
        );
        return;
    }

    let cleaned = strip_watermark(full_text);
    let segments = split_facility_segments(&cleaned);
    let mut preview = String::new();
    for (i, segment) in segments.iter().enumerate() {
        preview.push_str(&format!("Segment {}:\n", i + 1));
        for line in segment.trim().lines().take(3) {
            preview.push_str(&format!("  |{}|\n", line));
        }
    }

    for (name, contents) in [
        ("step1_extract.txt", full_text),
        ("step2_clean.txt", cleaned.as_str()),
        ("segments_preview.txt", preview.as_str()),
    ] {
        let path = format!("{}/{}", artifacts_dir, name);
        if let Err(e) = fs::write(&path, contents) {
            eprintln!(
                "{}",
                serde_json::json!({
                    "tool":"dump_steps",
                    "file": path,
                    "error": e.to_string()
                })
            );
        }
    }
}
