use std::path::{Path, PathBuf};
use std::process::Command;

use globwalk::GlobWalkerBuilder;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_xlsxwriter::Workbook;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinel for fields the source document does not carry.
pub const UNKNOWN: &str = "-";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DepsResult {
    pub ok: bool,
    pub missing: Vec<String>,
}

/// Check required/optional CLI dependencies.
/// - Required: pdftotext (Poppler)
/// - Optional: pdfinfo (page-count diagnostics)
/// Returns a DepsResult. `ok` is true iff required deps are present.
pub fn check_deps() -> DepsResult {
    let mut missing = Vec::new();

    let has_pdftotext = which::which("pdftotext").is_ok();
    if !has_pdftotext {
        missing.push("pdftotext".to_string());
    }

    // optional
    if which::which("pdfinfo").is_err() {
        missing.push("pdfinfo".to_string());
    }

    DepsResult { ok: has_pdftotext, missing }
}

/// Render Nala installation help for missing deps.
pub fn nala_help_for(missing: &[String]) -> String {
    if !missing.iter().any(|m| m == "pdftotext" || m == "pdfinfo") {
        return String::new();
    }
    "Dependency missing. Install via Nala:\n  sudo nala install poppler-utils".to_string()
}

#[derive(Debug, Error)]
pub enum EnumerateError {
    #[error("NoFilesFound")]
    NoFilesFound { guidance: String },
}

/// Enumerate PDFs using a glob pattern (e.g., "./input/**/*.pdf").
/// Returns a sorted list of paths.
pub fn enumerate_pdfs(glob_pattern: &str) -> Result<Vec<PathBuf>, EnumerateError> {
    let root = if Path::new(glob_pattern).is_absolute() { "/" } else { "." };
    let pat = glob_pattern.trim_start_matches("./");
    let mut paths: Vec<PathBuf> = GlobWalkerBuilder::from_patterns(root, &[pat])
        .case_insensitive(false)
        .follow_links(false)
        .max_depth(usize::MAX)
        .build()
        .map_err(|_| EnumerateError::NoFilesFound { guidance: folder_guidance() })?
        .filter_map(|e| e.ok())
        .map(|e| e.path().to_path_buf())
        .filter(|p| p.is_file())
        .collect();

    paths.sort();

    if paths.is_empty() {
        return Err(EnumerateError::NoFilesFound { guidance: folder_guidance() });
    }

    Ok(paths)
}

fn folder_guidance() -> String {
    let guide = r#"Tidak ada PDF pada pola ./input/**/*.pdf
Struktur yang disarankan:
  ./input/ideb/...
Contoh: letakkan berkas PDF di ./input/ideb/NAMA IDEB 001.pdf"#;
    guide.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrdRoot {
    pub id: String,
    #[serde(default)]
    pub tools: Option<Vec<PrdTool>>,
    #[serde(default)]
    pub datasources: Option<Vec<PrdDatasource>>,
    #[serde(default)]
    pub outputs: Option<PrdOutputs>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrdTool {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrdDatasource {
    pub name: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrdOutputs {
    pub dir: Option<String>,
    #[serde(default)]
    pub artifacts_dir: Option<String>,
}

#[derive(Debug, Error)]
pub enum PrdError {
    #[error("Failed to read prd.yaml: {0}")]
    Read(String),
    #[error("Failed to parse prd.yaml: {0}")]
    Parse(String),
    #[error("Invalid PRD: {0}")]
    Invalid(String),
}

/// Minimal validation for prd.yaml.
pub fn validate_prd(prd_path: &Path) -> Result<PrdRoot, PrdError> {
    let raw = std::fs::read_to_string(prd_path).map_err(|e| PrdError::Read(e.to_string()))?;
    let prd: PrdRoot = serde_yaml::from_str(&raw).map_err(|e| PrdError::Parse(e.to_string()))?;

    if prd.id.trim().is_empty() {
        return Err(PrdError::Invalid("missing id".into()));
    }

    let has_ds_glob = prd
        .datasources
        .as_ref()
        .and_then(|ds| ds.first())
        .and_then(|d| d.path.clone())
        .is_some();
    let has_out_dir = prd.outputs.as_ref().and_then(|o| o.dir.clone()).is_some();
    if !has_ds_glob || !has_out_dir {
        return Err(PrdError::Invalid("missing datasources.path or outputs.dir".into()));
    }

    let tools = prd.tools.clone().unwrap_or_default();
    let names: Vec<String> = tools.into_iter().map(|t| t.name).collect();
    for required in ["check_deps", "parse_slik"] {
        if !names.iter().any(|n| n == required) {
            return Err(PrdError::Invalid(format!("missing tool: {}", required)));
        }
    }

    Ok(prd)
}

impl PrdRoot {
    pub fn input_glob(&self) -> String {
        self.datasources
            .as_ref()
            .and_then(|d| d.first())
            .and_then(|d| d.path.clone())
            .unwrap_or_else(|| "./input/**/*.pdf".to_string())
    }
    pub fn output_dir(&self) -> String {
        self.outputs
            .as_ref()
            .and_then(|o| o.dir.clone())
            .unwrap_or_else(|| "./output".to_string())
    }
}

#[derive(Debug, Error)]
pub enum PopplerError {
    #[error("FileNotFound: {0}")]
    FileNotFound(String),
    #[error("EncryptedPDF: {0}")]
    EncryptedPDF(String),
    #[error("PopplerError: {0}")]
    Other(String),
}

/// Extract page texts using Poppler's pdftotext.
/// Single pass without -nopgbrk; the form-feed page breaks are kept so the
/// first page stays addressable after the split.
pub fn poppler_extract(path: &Path, layout: bool) -> Result<Vec<String>, PopplerError> {
    if !path.exists() {
        return Err(PopplerError::FileNotFound(path.display().to_string()));
    }

    let mut cmd = Command::new("pdftotext");
    if layout {
        cmd.arg("-layout");
    }
    cmd.arg("-q");
    cmd.arg(path);
    cmd.arg("-"); // write to stdout
    let out = cmd.output().map_err(|e| PopplerError::Other(e.to_string()))?;
    if !out.status.success() {
        let err = String::from_utf8_lossy(&out.stderr).to_lowercase();
        if err.contains("encrypt") || err.contains("password") {
            return Err(PopplerError::EncryptedPDF(path.display().to_string()));
        }
        return Err(PopplerError::Other("pdftotext failed".into()));
    }
    let s = String::from_utf8_lossy(&out.stdout);
    let mut pages: Vec<String> = s.split('\u{000C}').map(|x| x.to_string()).collect();
    // drop trailing empty page if any
    while matches!(pages.last(), Some(last) if last.trim().is_empty()) {
        pages.pop();
    }
    Ok(pages)
}

/// Full-document and first-page text of one report, as handed to the parser.
#[derive(Debug, Clone, Default)]
pub struct DocumentText {
    pub full: String,
    pub first_page: String,
}

/// Assemble DocumentText from ordered page texts.
pub fn document_text_from_pages(pages: &[String]) -> DocumentText {
    let mut full = String::new();
    for page in pages {
        full.push_str(page);
        full.push('\n');
    }
    let first_page = pages.first().cloned().unwrap_or_default();
    DocumentText { full, first_page }
}

static RE_WATERMARK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bRAHASIA\b").unwrap());
static RE_DISCLAIMER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Informasi ini bersifat\s+dan hanya digunakan untuk kepentingan pemohon informasi\.?")
        .unwrap()
});
static RE_WATERMARK_EMBEDDED: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\.?RAHASIA\.?").unwrap());

/// Remove the RAHASIA watermark word and the standard disclaimer line.
/// Leftover fragments interleaved into numbers are removed without inserting
/// a space, since the watermark may split a single amount across runs.
/// Idempotent.
pub fn strip_watermark(text: &str) -> String {
    let text = RE_WATERMARK.replace_all(text, "");
    let text = RE_DISCLAIMER.replace_all(&text, "");
    RE_WATERMARK_EMBEDDED.replace_all(&text, "").into_owned()
}

// Debtor-name matchers, most specific layout first. Order matters: the
// patterns are not mutually exclusive and a later, looser pattern would
// mis-capture company layouts if tried earlier.
static DEBTOR_NAME_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // Company / foundation: "Nama Debitur  NPWP  Bentuk BU ..." header,
        // then an all-caps name right before a >=10 digit NPWP
        r"(?s)Nama Debitur\s+NPWP\s+Bentuk BU.*?\n\s*([A-Z][A-Z\s]+?)\s+\d{10,}",
        // Individual: name run right before the identity-document label
        r"(?s)Nama Sesuai Identitas.*?\n\s*([A-Z][A-Z\s,\.]+?)(?:\s+NIK|\s+SIM|\s+Paspor)",
        // Fallback: bare "Nama" line, name on a later line before Posisi/NPWP
        r"(?:^|\n)Nama\s*\n\s*([A-Z][A-Z\s]+?)\s+(?:Posisi|NPWP)",
        // Last resort: combined "Nama  Jenis Kelamin" header, name-only line
        r"(?s)Nama\s+Jenis Kelamin.*?\n([A-Z][A-Z\s]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Extract the debtor name from the cleaned first page.
/// Supports individual reports ("Nama Sesuai Identitas") as well as
/// company/foundation reports ("Nama Debitur").
pub fn extract_debtor_name(first_page_text: &str) -> String {
    for pattern in DEBTOR_NAME_PATTERNS.iter() {
        if let Some(cap) = pattern.captures(first_page_text) {
            let name = cap[1].trim().to_string();
            if !name.is_empty() {
                return name;
            }
        }
    }
    UNKNOWN.to_string()
}

static RE_SECTION_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Kredit/Pembiayaan\s*\n\s*Pelapor\s+Cabang\s+Baki Debet\s+Tanggal Update").unwrap()
});

/// Split cleaned full text into candidate facility segments.
/// Each facility block starts with the "Kredit/Pembiayaan" header followed by
/// the "Pelapor  Cabang  Baki Debet  Tanggal Update" label line; the text
/// before the first marker is summary content, not a facility.
pub fn split_facility_segments(full_text: &str) -> Vec<String> {
    RE_SECTION_MARKER
        .split(full_text)
        .skip(1)
        .map(|s| s.to_string())
        .collect()
}

/// Display string plus the raw integer used for arithmetic. Both sides are
/// always derived from the same source integer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rupiah {
    pub display: String,
    pub raw: u64,
}

impl Rupiah {
    pub fn from_raw(raw: u64) -> Self {
        Rupiah { display: format_rupiah(raw), raw }
    }
}

/// One extracted, accepted credit facility.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FacilityRecord {
    pub debtor_name: String,
    pub reporter: String,
    pub facility_type: String,
    pub quality: String,
    pub overdue_days: String,
    pub start_date: String,
    pub due_date: String,
    pub approved_limit: String,
    pub interest_rate: String,
    pub outstanding: Rupiah,
    pub collateral: String,
}

static RE_REPORTER_ANCHOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{2,6}\s*-\s*.*?)\s+Rp\s*([\d\.,]+)").unwrap());
static RE_CODE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{2,6}\s*-\s*)").unwrap());
static RE_QUALITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"Kualitas\s+(\d)\s*-").unwrap());
static RE_ACTIVE_CONDITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Kondisi\s+Fasilitas Aktif").unwrap());

// Known cabang phrasings, longer/more specific first. The first hit ends the
// scan whether or not its candidate is accepted.
static BRANCH_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\s+(BANK\s+BUKOPIN\s+\S.*)$",      // BANK BUKOPIN KC TJ.PINANG
        r"\s+(BANK\s+OCBC\s+NISP\s+\S.*)$",  // BANK OCBC NISP KC BTM-RGC.PARK
        r"\s+(BANK\s+CIMB\s+NIAGA\s+\S.*)$", // BANK CIMB NIAGA KPO
        r"\s+(BPD\s+\w+\s+KC\s+\S.*)$",      // BPD JATIM KC BATAM
        r"\s+(BMI\s+KC\s+\S.*)$",            // BMI KC TANJUNG PINANG
        r"\s+(BRI\s+KAS\s+\S.*)$",           // BRI KAS KPO
        r"\s+(BCA\s+KANTOR\s+\S.*)$",        // BCA KANTOR PUSAT
        r"\s+(KC\s+\S.*)$",                  // KC Sutami
        r"\s+(KPO)$",                        // KPO (standalone)
        r"\s+(Pusat)$",                      // Pusat (standalone)
    ]
    .iter()
    .map(|p| Regex::new(&format!("(?i){}", p)).unwrap())
    .collect()
});

static RE_NAME_CONTINUATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Rp\s*[\d\.,]+\s+\d{2}\s+\w+\s+\d{4}\s*\n\s*([A-Z][A-Za-z\s.()]+?)\s*\n").unwrap()
});
static RE_CONTINUATION_NOISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(Feb|Mar|Apr|Mei|Jun|Jul|Agt|Sep|Okt|Nov|Des|Kualitas|No Rekening|Sifat)")
        .unwrap()
});

static RE_OVERDUE_DAYS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Jumlah Hari Tunggakan\s+(\d+)").unwrap());
static RE_START_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Tanggal Mulai\s+(\d{2}\s+\w+\s+\d{4})").unwrap());
static RE_DUE_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Tanggal Jatuh Tempo\s+(\d{2}\s+\w+\s+\d{4})").unwrap());
static RE_APPROVED_LIMIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Plafon Awal\s+Rp\s*([\d\.,]+)").unwrap());
static RE_INTEREST_RATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Suku Bunga/Imbalan\s+([\d\.,]+)\s*%").unwrap());
static RE_FACILITY_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)Jenis Penggunaan\s+(.*?)\s+Frekuensi\s+Restrukturisasi").unwrap());
static RE_CREDIT_KIND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Jenis Kredit/Pembiayaan\s+(.*?)(?:\n|$)").unwrap());
static RE_OWNERSHIP_PROOF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Bukti Kepemilikan\s+(.*?)(?:\s+Nilai|\n)").unwrap());
static RE_COLLATERAL_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Jenis Agunan\s+Nilai Agunan.*?\n\s*(.*?)\s+Rp").unwrap());
static RE_WS_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Parse a single facility segment.
/// Returns None when the segment has no reporter/balance anchor or fails the
/// inclusion rule.
///
/// Inclusion criteria (keep if ANY is true):
///   1. The segment says "Kondisi  Fasilitas Aktif"
///   2. Kualitas (Kol) >= 2
pub fn parse_facility_segment(segment: &str, debtor_name: &str) -> Option<FacilityRecord> {
    // Pelapor & Baki Debet from the first data line; every parsable segment
    // has this anchor.
    let anchor = RE_REPORTER_ANCHOR.captures(segment)?;
    let raw_reporter = anchor[1].trim().to_string();
    let outstanding_raw = parse_currency_to_int(anchor[2].trim());

    // Kualitas comes before the filter; the stored value stays "-" when the
    // label is absent while the filter sees 0.
    let quality = RE_QUALITY
        .captures(segment)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| UNKNOWN.to_string());
    let quality_rank: u32 = quality.parse().unwrap_or(0);

    let is_active = RE_ACTIVE_CONDITION.is_match(segment);

    if !is_active && quality_rank < 2 {
        return None;
    }

    // Separate the bank name from the cabang token the source layout couples
    // onto it, and handle names wrapped onto the next line.
    let code_prefix = RE_CODE_PREFIX
        .find(&raw_reporter)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    let name_and_branch = raw_reporter[code_prefix.len()..].trim();

    let mut bank_name = name_and_branch.to_string();
    for pattern in BRANCH_PATTERNS.iter() {
        if let Some(hit) = pattern.find(name_and_branch) {
            let candidate = name_and_branch[..hit.start()].trim();
            // A false positive must not eat the whole name (e.g. leave "PT")
            if candidate.chars().count() >= 10 {
                bank_name = candidate.to_string();
            }
            break;
        }
    }

    if let Some(cont) = RE_NAME_CONTINUATION.captures(segment) {
        let cont_text = cont[1].trim();
        // Only accept if it's not a month row or section label
        if !RE_CONTINUATION_NOISE.is_match(cont_text) {
            bank_name.push(' ');
            bank_name.push_str(cont_text);
        }
    }
    let reporter = format!("{}{}", code_prefix, bank_name).trim().to_string();

    let overdue_days = RE_OVERDUE_DAYS
        .captures(segment)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| "0".to_string());

    let start_date = RE_START_DATE
        .captures(segment)
        .map(|c| format_date_id(&c[1]))
        .unwrap_or_else(|| UNKNOWN.to_string());
    let due_date = RE_DUE_DATE
        .captures(segment)
        .map(|c| format_date_id(&c[1]))
        .unwrap_or_else(|| UNKNOWN.to_string());

    let approved_limit = RE_APPROVED_LIMIT
        .captures(segment)
        .map(|c| format_rupiah(parse_currency_to_int(&c[1])))
        .unwrap_or_else(|| UNKNOWN.to_string());

    let interest_rate = RE_INTEREST_RATE
        .captures(segment)
        .map(|c| format!("{}%", &c[1]))
        .unwrap_or_else(|| UNKNOWN.to_string());

    let facility_type = RE_FACILITY_TYPE
        .captures(segment)
        .map(|c| RE_WS_RUN.replace_all(c[1].trim(), " ").into_owned())
        .unwrap_or_else(|| UNKNOWN.to_string());

    let is_credit_card = RE_CREDIT_KIND
        .captures(segment)
        .map(|c| c[1].contains("Kartu Kredit"))
        .unwrap_or(false);

    let ownership_proofs: Vec<String> = RE_OWNERSHIP_PROOF
        .captures_iter(segment)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let collateral_types: Vec<String> = RE_COLLATERAL_TYPE
        .captures_iter(segment)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let collateral = if is_credit_card {
        "Kartu Kredit".to_string()
    } else if !ownership_proofs.is_empty() || !collateral_types.is_empty() {
        summarize_collateral(&ownership_proofs, &collateral_types)
    } else {
        UNKNOWN.to_string()
    };

    Some(FacilityRecord {
        debtor_name: debtor_name.to_string(),
        reporter,
        facility_type,
        quality,
        overdue_days,
        start_date,
        due_date,
        approved_limit,
        interest_rate,
        outstanding: Rupiah::from_raw(outstanding_raw),
        collateral,
    })
}

static RE_PROOF_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(SHM|SHGB|SKHMT|AJB|BPKB|PPJB|IMB|SIPPT)\b").unwrap());

/// Summarise collateral items for display.
///
/// - Bukti Kepemilikan fragments are grouped by certificate-type prefix
///   (SHM, SHGB, ...), unknown prefixes under "Lainnya"
/// - Jenis Agunan fragments are grouped by exact text with a count
/// - A group with <= 3 items is listed; a larger group collapses to
///   "<count> <key>", e.g. "6 SHM"
/// Groups keep first-encounter order.
pub fn summarize_collateral(ownership_proofs: &[String], collateral_types: &[String]) -> String {
    let mut proof_groups: Vec<(String, Vec<&str>)> = Vec::new();
    for item in ownership_proofs {
        let key = RE_PROOF_PREFIX
            .captures(item)
            .map(|c| c[1].to_uppercase())
            .unwrap_or_else(|| "Lainnya".to_string());
        match proof_groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(item),
            None => proof_groups.push((key, vec![item.as_str()])),
        }
    }

    let mut type_counts: Vec<(&str, usize)> = Vec::new();
    for item in collateral_types {
        match type_counts.iter_mut().find(|(t, _)| *t == item.as_str()) {
            Some((_, n)) => *n += 1,
            None => type_counts.push((item.as_str(), 1)),
        }
    }

    let mut parts: Vec<String> = Vec::new();
    for (key, members) in &proof_groups {
        if members.len() <= 3 {
            parts.push(members.join(", "));
        } else {
            parts.push(format!("{} {}", members.len(), key));
        }
    }
    for (text, count) in &type_counts {
        if *count == 1 {
            parts.push((*text).to_string());
        } else if *count <= 3 {
            parts.push(format!("{} ({})", text, count));
        } else {
            parts.push(format!("{} {}", count, text));
        }
    }

    if parts.is_empty() {
        UNKNOWN.to_string()
    } else {
        parts.join(" | ")
    }
}

// Indonesian month name -> number mapping
const MONTHS_ID: [(&str, &str); 12] = [
    ("januari", "01"),
    ("februari", "02"),
    ("maret", "03"),
    ("april", "04"),
    ("mei", "05"),
    ("juni", "06"),
    ("juli", "07"),
    ("agustus", "08"),
    ("september", "09"),
    ("oktober", "10"),
    ("november", "11"),
    ("desember", "12"),
];

/// Convert an Indonesian date "27 September 2021" to "27/09/2021", the form
/// Excel auto-recognises as a date. Unknown month names map to "00";
/// malformed input comes back unchanged.
pub fn format_date_id(date_str: &str) -> String {
    let parts: Vec<&str> = date_str.trim().split_whitespace().collect();
    if parts.len() != 3 {
        return date_str.to_string();
    }
    let day: u32 = match parts[0].parse() {
        Ok(d) => d,
        Err(_) => return date_str.to_string(),
    };
    let month_lower = parts[1].to_lowercase();
    let month_num = MONTHS_ID
        .iter()
        .find(|(name, _)| *name == month_lower)
        .map(|(_, num)| *num)
        .unwrap_or("00");
    format!("{}/{}/{}", day, month_num, parts[2])
}

/// Parse an Indonesian currency string to an integer.
/// "383.570.669,00" -> 383570669, "0,00" -> 0, garbage -> 0.
/// Accepts a leading "Rp" so any string format_rupiah produced parses back
/// to the same amount.
pub fn parse_currency_to_int(value: &str) -> u64 {
    let value = value.trim().trim_start_matches("Rp").trim_start();
    let integer_part = value.split(',').next().unwrap_or("");
    integer_part.replace('.', "").trim().parse().unwrap_or(0)
}

/// Format an integer as an Indonesian Rupiah string.
/// 383570669 -> "Rp 383.570.669"
pub fn format_rupiah(amount: u64) -> String {
    if amount == 0 {
        return "Rp 0".to_string();
    }
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    format!("Rp {}", grouped)
}

/// Per-document parse result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportOutput {
    pub debtor_name: String,
    pub records: Vec<FacilityRecord>,
    pub segments_seen: usize,
}

/// Run the full extraction over one document's text: strip the watermark,
/// read the debtor identity off the first page, split into facility segments
/// and keep the segments that pass the inclusion rule.
pub fn parse_report(doc: &DocumentText) -> ReportOutput {
    let full = strip_watermark(&doc.full);
    let first_page = strip_watermark(&doc.first_page);
    let debtor_name = extract_debtor_name(&first_page);

    let segments = split_facility_segments(&full);
    let segments_seen = segments.len();
    let records = segments
        .iter()
        .filter_map(|segment| parse_facility_segment(segment, &debtor_name))
        .collect();

    ReportOutput { debtor_name, records, segments_seen }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFailure {
    pub doc_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub records: Vec<FacilityRecord>,
    pub failures: Vec<BatchFailure>,
}

/// Parse a batch of documents in input order. A document whose text
/// extraction failed (or produced no text) is recorded as a failure and the
/// batch carries on; accepted records are concatenated across documents.
pub fn parse_batch(documents: Vec<(String, Result<DocumentText, String>)>) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    for (doc_id, doc) in documents {
        match doc {
            Ok(doc) => {
                if doc.full.trim().is_empty() {
                    outcome
                        .failures
                        .push(BatchFailure { doc_id, message: "no text extracted".to_string() });
                    continue;
                }
                let report = parse_report(&doc);
                outcome.records.extend(report.records);
            }
            Err(message) => outcome.failures.push(BatchFailure { doc_id, message }),
        }
    }
    outcome
}

/// Total outstanding per unique debtor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DebtorSummary {
    pub debtor_name: String,
    pub facility_count: usize,
    pub total_outstanding: Rupiah,
}

/// Group accepted records by debtor name and sum their raw outstanding
/// balances; the display total is formatted from the summed raw value, never
/// from the per-record display strings. Rows are ordered by raw total
/// descending; sort_by is stable, so ties keep first-seen group order.
pub fn build_debtor_summary(records: &[FacilityRecord]) -> Vec<DebtorSummary> {
    let mut groups: Vec<(String, usize, u64)> = Vec::new();
    for record in records {
        match groups.iter_mut().find(|(name, _, _)| *name == record.debtor_name) {
            Some((_, count, total)) => {
                *count += 1;
                *total += record.outstanding.raw;
            }
            None => groups.push((record.debtor_name.clone(), 1, record.outstanding.raw)),
        }
    }

    let mut summary: Vec<DebtorSummary> = groups
        .into_iter()
        .map(|(debtor_name, facility_count, total)| DebtorSummary {
            debtor_name,
            facility_count,
            total_outstanding: Rupiah::from_raw(total),
        })
        .collect();
    summary.sort_by(|a, b| b.total_outstanding.raw.cmp(&a.total_outstanding.raw));
    summary
}

#[derive(Debug, Error)]
pub enum EmitError {
    #[error("ExportFailed: {0}")]
    ExportFailed(String),
    #[error("WriteFailed: {0}")]
    WriteFailed(String),
}

const FACILITY_HEADERS: [&str; 11] = [
    "Nama Debitur",
    "Pelapor",
    "Fasilitas",
    "Kol",
    "Hari Tunggakan",
    "Tanggal Mulai",
    "Tanggal JTO",
    "Plafon",
    "Suku Bunga",
    "Baki Debet",
    "Agunan",
];

const SUMMARY_HEADERS: [&str; 3] = ["Nama Debitur", "Jumlah Fasilitas", "Total Outstanding"];

fn facility_row(record: &FacilityRecord) -> Vec<String> {
    vec![
        record.debtor_name.clone(),
        record.reporter.clone(),
        record.facility_type.clone(),
        record.quality.clone(),
        record.overdue_days.clone(),
        record.start_date.clone(),
        record.due_date.clone(),
        record.approved_limit.clone(),
        record.interest_rate.clone(),
        record.outstanding.display.clone(),
        record.collateral.clone(),
    ]
}

/// Build the xlsx workbook: the facilities sheet plus, when the summary is
/// non-empty, a per-debtor summary sheet. The raw integer columns stay out of
/// the sheets; they only feed the grand total. Returns the workbook bytes.
pub fn export_workbook(
    records: &[FacilityRecord],
    summary: &[DebtorSummary],
) -> Result<Vec<u8>, EmitError> {
    let err = |e: rust_xlsxwriter::XlsxError| EmitError::ExportFailed(e.to_string());

    let mut workbook = Workbook::new();

    {
        let rows: Vec<Vec<String>> = records.iter().map(facility_row).collect();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Fasilitas Aktif").map_err(err)?;
        for (col, header) in FACILITY_HEADERS.iter().enumerate() {
            sheet.write_string(0, col as u16, *header).map_err(err)?;
        }
        for (row_idx, row) in rows.iter().enumerate() {
            for (col_idx, cell) in row.iter().enumerate() {
                sheet
                    .write_string((row_idx + 1) as u32, col_idx as u16, cell)
                    .map_err(err)?;
            }
        }
        for (col, width) in fit_column_widths(&FACILITY_HEADERS, &rows) {
            sheet.set_column_width(col, width).map_err(err)?;
        }
    }

    if !summary.is_empty() {
        let rows: Vec<Vec<String>> = summary
            .iter()
            .map(|s| {
                vec![
                    s.debtor_name.clone(),
                    s.facility_count.to_string(),
                    s.total_outstanding.display.clone(),
                ]
            })
            .collect();
        let sheet = workbook.add_worksheet();
        sheet.set_name("Ringkasan per Debitur").map_err(err)?;
        for (col, header) in SUMMARY_HEADERS.iter().enumerate() {
            sheet.write_string(0, col as u16, *header).map_err(err)?;
        }
        for (row_idx, s) in summary.iter().enumerate() {
            let row = (row_idx + 1) as u32;
            sheet.write_string(row, 0, &s.debtor_name).map_err(err)?;
            sheet
                .write_number(row, 1, s.facility_count as f64)
                .map_err(err)?;
            sheet
                .write_string(row, 2, &s.total_outstanding.display)
                .map_err(err)?;
        }
        for (col, width) in fit_column_widths(&SUMMARY_HEADERS, &rows) {
            sheet.set_column_width(col, width).map_err(err)?;
        }
    }

    workbook.save_to_buffer().map_err(err)
}

// Width = longest cell (or header) + 3, capped at 40.
fn fit_column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<(u16, f64)> {
    headers
        .iter()
        .enumerate()
        .map(|(col, header)| {
            let longest = rows
                .iter()
                .filter_map(|row| row.get(col))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
                .max(header.chars().count());
            (col as u16, (longest + 3).min(40) as f64)
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitPaths {
    pub xlsx_path: String,
    pub meta_path: String,
}

/// Atomically write the workbook and meta JSON into outdir with a run stem.
pub fn emit_outputs(
    xlsx_bytes: &[u8],
    meta: &serde_json::Value,
    outdir: &str,
    stem: &str,
) -> Result<EmitPaths, EmitError> {
    std::fs::create_dir_all(outdir).map_err(|e| EmitError::WriteFailed(e.to_string()))?;
    let xlsx_path = Path::new(outdir).join(format!("{}.xlsx", stem));
    let meta_path = Path::new(outdir).join(format!("{}.meta.json", stem));

    // Write temp files then rename
    let pid = std::process::id();
    let xlsx_tmp = xlsx_path.with_extension(format!("xlsx.tmp.{}", pid));
    let meta_tmp = meta_path.with_extension(format!("meta.json.tmp.{}", pid));

    std::fs::write(&xlsx_tmp, xlsx_bytes).map_err(|e| EmitError::WriteFailed(e.to_string()))?;
    let meta_bytes =
        serde_json::to_vec_pretty(meta).map_err(|e| EmitError::WriteFailed(e.to_string()))?;
    std::fs::write(&meta_tmp, meta_bytes).map_err(|e| EmitError::WriteFailed(e.to_string()))?;

    std::fs::rename(&xlsx_tmp, &xlsx_path).map_err(|e| EmitError::WriteFailed(e.to_string()))?;
    std::fs::rename(&meta_tmp, &meta_path).map_err(|e| EmitError::WriteFailed(e.to_string()))?;

    Ok(EmitPaths {
        xlsx_path: xlsx_path.to_string_lossy().to_string(),
        meta_path: meta_path.to_string_lossy().to_string(),
    })
}

// Utility to compute sha256 hex
pub fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let out = hasher.finalize();
    out.iter().map(|b| format!("{:02x}", b)).collect()
}
