// End-to-end pipeline runs over temporary data/, static/ and dist/ trees

use oierdb::output::ChecksumInfo;
use oierdb::pipeline::{self, StaticData};
use oierdb::PipelineConfig;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const CONTESTS: &str = r#"[
    {"name": "NOIP2010提高", "type": "NOIP提高", "year": 2010, "fall_semester": true},
    {"name": "NOI2011", "type": "NOI", "year": 2011, "fall_semester": false},
    {"name": "NOIP2011提高", "type": "NOIP提高", "year": 2011, "fall_semester": true}
]"#;

const SCORING: &str = r#"{"NOIP提高": "1", "NOI": "2.5"}"#;

const SCHOOLS: &str = "# province,city,name,alias...\n\
浙江,杭州,杭州第二中学,杭二\n\
江苏,南京,南京外国语学校\n";

const RAW: &str = "NOIP2010提高,一等奖,张三,高一,杭州第二中学,400,浙江,男,\n\
NOIP2010提高,一等奖,李四,高一,南京外国语学校,350,江苏,女,\n\
NOIP2010提高,二等奖,李四,高一,杭州第二中学,300,浙江,男,\n\
NOIP2011提高,一等奖,张三,高二,杭二,390,浙江,男,\n\
NOIP2011提高,一等奖,王五,高二,火星中学,100,浙江,男,\n";

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn setup() -> (TempDir, PipelineConfig) {
    setup_with(RAW)
}

fn setup_with(raw: &str) -> (TempDir, PipelineConfig) {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::rooted_at(dir.path());

    write(&config.static_path("contests.json"), CONTESTS);
    write(&config.static_path("scoring.json"), SCORING);
    write(&config.school_path(), SCHOOLS);
    write(&config.raw_path(), raw);

    (dir, config)
}

#[test]
fn test_full_run_resolves_and_writes() {
    let (_dir, config) = setup();

    let summary = pipeline::run(&config).unwrap();

    assert_eq!(summary.schools, 2);
    assert_eq!(summary.records, 4);
    assert_eq!(summary.provisional_oiers, 2);
    assert_eq!(summary.oiers, 3);
    assert_eq!(summary.rejected_lines, 1);
    assert_eq!(summary.unknown_schools, 1);

    let result = fs::read_to_string(config.dist_path("result.txt")).unwrap();
    let lines: Vec<&str> = result.lines().collect();
    assert_eq!(lines.len(), 3);

    // Two NOIP records of one senior student collapse into uid 1
    assert!(lines[0].starts_with("1,zs,张三,1,2007,"), "{}", lines[0]);
    assert!(lines[0].ends_with("0:0:400:1:25:3/2:0:390:1:25:3"), "{}", lines[0]);

    // Same contest twice: two different people
    let lisi: Vec<&&str> = lines.iter().filter(|l| l.contains(",李四,")).collect();
    assert_eq!(lisi.len(), 2);
    assert!(lisi.iter().any(|l| l.starts_with("2,ls,李四,-1,2007,")));
    assert!(lisi.iter().any(|l| l.starts_with("3,ls,李四,1,2007,")));
}

#[test]
fn test_side_outputs() {
    let (_dir, config) = setup();
    pipeline::run(&config).unwrap();

    let info: ChecksumInfo =
        serde_json::from_str(&fs::read_to_string(config.dist_path("result.info.json")).unwrap())
            .unwrap();
    let result = fs::read(config.dist_path("result.txt")).unwrap();
    assert_eq!(info.size, result.len() as u64);
    assert_eq!(info.sha512.len(), 128);

    let bundle: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(config.dist_path("static.json")).unwrap())
            .unwrap();
    assert!(bundle["contests"].is_array());
    assert_eq!(bundle["scoring"]["NOI"], "2.5");
    let schools: Vec<(String, String, String, f64)> =
        serde_json::from_value(bundle["schools"].clone()).unwrap();
    assert_eq!(schools.len(), 2);
    assert_eq!(schools[0].0, "杭州第二中学");
    assert_eq!(schools[0].2, "杭州");
    assert!(schools[0].3 > schools[1].3);
    assert!(schools[1].3 > 0.0);

    let static_info: ChecksumInfo =
        serde_json::from_str(&fs::read_to_string(config.dist_path("static.info.json")).unwrap())
            .unwrap();
    let bundle_bytes = fs::read(config.dist_path("static.json")).unwrap();
    assert_eq!(static_info.size, bundle_bytes.len() as u64);
    assert!(!config.dist_path("school.json").exists());

    let unknown = fs::read_to_string(config.dist_path("unknown_schools.txt")).unwrap();
    assert_eq!(unknown, "浙江,火星中学\n");
}

#[test]
fn test_output_is_deterministic() {
    let (_dir, config) = setup();

    pipeline::run(&config).unwrap();
    let first = fs::read_to_string(config.dist_path("result.txt")).unwrap();
    pipeline::run(&config).unwrap();
    let second = fs::read_to_string(config.dist_path("result.txt")).unwrap();

    assert_eq!(first, second);
}

#[test]
fn test_missing_contests_is_an_error() {
    let (_dir, config) = setup();
    fs::remove_file(config.static_path("contests.json")).unwrap();

    assert!(StaticData::load(&config).is_err());
    assert!(pipeline::run(&config).is_err());
}

#[test]
fn test_threshold_below_cost_keeps_records_apart() {
    let (_dir, mut config) = setup();
    // Same school, same enrollment year: cost -120
    config.merge_threshold = -121;

    let summary = pipeline::run(&config).unwrap();
    assert_eq!(summary.oiers, 4);
}

#[test]
fn test_record_owners_follow_score_order() {
    // 王五 is alone in NOIP2011 (last place scores 0) and comes first in the
    // file; 张三 outscores everyone and moves to the front
    let raw = "NOIP2011提高,一等奖,王五,高二,杭二,100,浙江,男,\n\
NOIP2010提高,一等奖,张三,高一,杭州第二中学,400,浙江,男,\n\
NOIP2010提高,二等奖,李四,高一,南京外国语学校,350,江苏,女,\n";
    let (_dir, config) = setup_with(raw);
    let mut data = StaticData::load(&config).unwrap();

    let resolution = pipeline::resolve(&config, &mut data).unwrap();

    let names: Vec<&str> = resolution.oiers.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["张三", "王五", "李四"]);
    for (idx, oier) in resolution.oiers.iter().enumerate() {
        for &id in &oier.records {
            assert_eq!(resolution.store.get(id).owner, idx, "record {} of {}", id, oier.name);
        }
    }
}
