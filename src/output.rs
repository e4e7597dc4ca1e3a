// 📤 Output - compressed result lines, school JSON and checksum info
//
// result.txt line:
//   uid,initials,name,gender,em,oierdb_score,ccf_score,ccf_level,records
// record (joined by '/'):
//   contest:school:score:rank:province:award[:em]

use crate::enrollment;
use crate::oier::Oier;
use crate::record::{Record, RecordStore};
use crate::school::{SchoolRegistry, SchoolScores};
use anyhow::{Context, Result};
use num_bigint::{BigInt, Sign};
use num_rational::BigRational;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha512};
use std::cmp::Ordering;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::warn;

pub const PROVINCES: [&str; 34] = [
    "安徽", "北京", "福建", "甘肃", "广东", "广西", "贵州", "海南", "河北", "河南", "黑龙江",
    "湖北", "湖南", "吉林", "江苏", "江西", "辽宁", "内蒙古", "山东", "山西", "陕西", "上海",
    "四川", "天津", "新疆", "浙江", "重庆", "宁夏", "云南", "澳门", "香港", "青海", "西藏",
    "台湾",
];

pub const AWARD_LEVELS: [&str; 12] = [
    "金牌", "银牌", "铜牌", "一等奖", "二等奖", "三等奖", "国际金牌", "国际银牌", "国际铜牌",
    "前5%", "前15%", "前25%",
];

// ============================================================================
// CODES
// ============================================================================

/// Index into a known list, or the raw string when unknown
#[derive(Debug, Clone, PartialEq)]
pub enum Code<'a> {
    Index(usize),
    Raw(&'a str),
}

impl fmt::Display for Code<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Code::Index(i) => write!(f, "{}", i),
            Code::Raw(s) => write!(f, "{}", s),
        }
    }
}

pub fn province_code(province: &str) -> Code<'_> {
    match PROVINCES.iter().position(|p| *p == province) {
        Some(i) => Code::Index(i),
        None => {
            warn!("Unknown province: '{}'", province);
            Code::Raw(province)
        }
    }
}

pub fn award_code(level: &str) -> Code<'_> {
    match AWARD_LEVELS.iter().position(|l| *l == level) {
        Some(i) => Code::Index(i),
        None => {
            warn!("Unknown award level: '{}'", level);
            Code::Raw(level)
        }
    }
}

// ============================================================================
// NUMBER FORMATTING
// ============================================================================

/// `value * 100` rounded to an integer, ties to even
fn hundredths(value: &BigRational) -> BigInt {
    let scaled = value * BigRational::from_integer(BigInt::from(100));
    let floor = scaled.floor();
    let fraction = &scaled - &floor;
    let floor = floor.to_integer();
    let half = BigRational::new(BigInt::from(1), BigInt::from(2));

    let round_up = match fraction.cmp(&half) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => !(&floor % BigInt::from(2)).is_zero(),
    };
    if round_up {
        floor + 1
    } else {
        floor
    }
}

/// Two decimals, trailing zeros and leading zero stripped ("0.50" → ".5")
pub fn format_score(value: &BigRational) -> String {
    let hundredths = hundredths(value);
    let negative = hundredths.sign() == Sign::Minus;
    let magnitude = hundredths.magnitude();
    let whole = magnitude / 100u32;
    let fraction = magnitude % 100u32;

    let text = format!("{}.{:0>2}", whole, fraction.to_string());
    let text = text.trim_end_matches('0').trim_end_matches('.').trim_start_matches('0');
    match (text.is_empty(), negative) {
        (true, _) => "0".to_string(),
        (false, true) => format!("-{}", text),
        (false, false) => text.to_string(),
    }
}

/// Rounded to two decimals as a plain float (school.json)
pub fn round2(value: &BigRational) -> f64 {
    hundredths(value).to_string().parse::<f64>().unwrap_or(0.0) / 100.0
}

/// Contest score with five significant digits; empty when absent
pub fn format_raw_score(score: Option<f64>) -> String {
    let Some(value) = score else {
        return String::new();
    };
    if value == 0.0 {
        return "0".to_string();
    }

    let exponent = value.abs().log10().floor() as i32;
    if !(-4..5).contains(&exponent) {
        let mantissa = format!("{:.4e}", value);
        let (digits, exp) = mantissa.split_once('e').unwrap_or((mantissa.as_str(), "0"));
        let exp: i32 = exp.parse().unwrap_or(0);
        return format!(
            "{}e{}{:02}",
            strip_fraction(digits),
            if exp < 0 { '-' } else { '+' },
            exp.abs()
        );
    }

    let decimals = (4 - exponent).max(0) as usize;
    strip_fraction(&format!("{:.*}", decimals, value)).to_string()
}

fn strip_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

// ============================================================================
// LINES
// ============================================================================

pub fn record_line(record: &Record) -> String {
    let mut line = format!(
        "{}:{}:{}:{}:{}:{}",
        record.contest,
        record.school,
        format_raw_score(record.score),
        record.rank,
        province_code(&record.province),
        award_code(&record.level)
    );
    if record.is_keep_grade() {
        if let Some(em) = enrollment::weighted_modal_years([&record.ems]).first() {
            line.push_str(&format!(":{}", em));
        }
    }
    line
}

pub fn oier_line(oier: &Oier, store: &RecordStore) -> String {
    let records: Vec<String> = oier
        .records
        .iter()
        .map(|&id| record_line(store.get(id)))
        .collect();

    format!(
        "{},{},{},{},{},{},{},{},{}",
        oier.uid,
        oier.initials,
        oier.name,
        oier.gender.code(),
        oier.enroll_middle.map(|em| em.to_string()).unwrap_or_default(),
        format_score(&oier.oierdb_score),
        format_score(&oier.ccf_score),
        oier.ccf_level,
        records.join("/")
    )
}

// ============================================================================
// FILES
// ============================================================================

/// Write one compressed line per OIer, in the given order
pub fn write_result(path: &Path, oiers: &[Oier], store: &RecordStore) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut writer = BufWriter::new(file);
    for oier in oiers {
        writeln!(writer, "{}", oier_line(oier, store))?;
    }
    writer.flush()?;
    Ok(())
}

/// `[[name, province, city, score], ...]` in registry order
pub fn write_schools(path: &Path, schools: &SchoolRegistry, scores: &SchoolScores) -> Result<()> {
    let rows: Vec<(&str, &str, &str, f64)> = schools
        .all()
        .iter()
        .map(|s| (s.name.as_str(), s.province.as_str(), s.city.as_str(), round2(&scores.get(s.id))))
        .collect();

    let json = serde_json::to_string(&rows).context("Failed to serialize schools")?;
    fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecksumInfo {
    pub sha512: String,
    pub size: u64,
}

/// SHA-512 and size of `source`, written as JSON to `dest`
pub fn write_checksum_info(source: &Path, dest: &Path) -> Result<ChecksumInfo> {
    let bytes = fs::read(source).with_context(|| format!("Failed to read {:?}", source))?;

    let mut hasher = Sha512::new();
    hasher.update(&bytes);
    let info = ChecksumInfo {
        sha512: format!("{:x}", hasher.finalize()),
        size: bytes.len() as u64,
    };

    let json = serde_json::to_string(&info).context("Failed to serialize checksum info")?;
    fs::write(dest, json).with_context(|| format!("Failed to write {:?}", dest))?;
    Ok(info)
}

/// Unknown (province, school name) pairs, one per line
pub fn write_unknown_schools(path: &Path, unknown: &[(String, String)]) -> Result<()> {
    let mut body = String::new();
    for (province, name) in unknown {
        body.push_str(&format!("{},{}\n", province, name));
    }
    fs::write(path, body).with_context(|| format!("Failed to write {:?}", path))
}

/// Bundle every `static/*.json` (keyed by file stem) and `dist/school.json`
/// (as "schools") into `dist/static.json`, write its checksum info to
/// `dist/static.info.json`, then drop `school.json`.
pub fn write_static_bundle(static_dir: &Path, dist_dir: &Path) -> Result<ChecksumInfo> {
    let mut bundle = Map::new();

    if static_dir.is_dir() {
        let entries = fs::read_dir(static_dir)
            .with_context(|| format!("Failed to read static directory: {:?}", static_dir))?;
        let mut paths = Vec::new();
        for entry in entries {
            paths.push(entry?.path());
        }
        paths.sort();

        for path in paths {
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            bundle.insert(stem.to_string(), read_json(&path)?);
        }
    }

    let school_path = dist_dir.join("school.json");
    if school_path.exists() {
        bundle.insert("schools".to_string(), read_json(&school_path)?);
    }

    let bundle_path = dist_dir.join("static.json");
    let json = serde_json::to_string(&Value::Object(bundle)).context("Failed to serialize static bundle")?;
    fs::write(&bundle_path, json).with_context(|| format!("Failed to write {:?}", bundle_path))?;
    let info = write_checksum_info(&bundle_path, &dist_dir.join("static.info.json"))?;

    if school_path.exists() {
        fs::remove_file(&school_path)
            .with_context(|| format!("Failed to remove {:?}", school_path))?;
    }
    Ok(info)
}

fn read_json(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse JSON: {:?}", path))
}

// ============================================================================
// TESTS
// ============================================================================
