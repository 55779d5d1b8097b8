//! Decoding of list items into child tasks and stored records

use crate::crawler::task::{MajorRef, ProvinceRef, SchoolRef};
use crate::storage::Record;
use serde_json::{Map, Value};

/// Portal key read for each record column
const DETAIL_KEYS: DetailKeys = DetailKeys {
    school_name: "dwmc",
    major_name: "zymc",
    province: "szdqmc",
    major_code: "zydm",
    degree_type: "xwlxmc",
    exam_type: "ksfsmc",
    department: "yxsmc",
    study_mode: "xxfsmc",
    research_direction: "yjfxmc",
    veteran_program: "tydxs",
    shaogu_program: "jsggjh",
    advisor: "zdjs",
    planned_enrollment: "nzsrs",
    exam_subjects: ["kskm1", "kskm2", "kskm3", "kskm4"],
};

struct DetailKeys {
    school_name: &'static str,
    major_name: &'static str,
    province: &'static str,
    major_code: &'static str,
    degree_type: &'static str,
    exam_type: &'static str,
    department: &'static str,
    study_mode: &'static str,
    research_direction: &'static str,
    veteran_program: &'static str,
    shaogu_program: &'static str,
    advisor: &'static str,
    planned_enrollment: &'static str,
    exam_subjects: [&'static str; 4],
}

/// Reads a scalar field as text; missing and null values become empty
fn text(item: &Map<String, Value>, key: &str) -> String {
    match item.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn or_fallback(value: String, fallback: Option<&str>) -> String {
    if value.is_empty() {
        fallback.unwrap_or_default().to_string()
    } else {
        value
    }
}

/// A school from a school-list page; `None` if the item is not an object
pub fn school_from_item(item: &Value, province: &ProvinceRef) -> Option<SchoolRef> {
    let item = item.as_object()?;
    Some(SchoolRef {
        code: text(item, "dwdm"),
        name: text(item, "dwmc"),
        province: Some(province.clone()),
    })
}

/// A major from a major-list page; `None` if the item is not an object
pub fn major_from_item(item: &Value, school: &SchoolRef) -> Option<MajorRef> {
    let item = item.as_object()?;
    let degree_type = text(item, "xwlxmc");
    let school_code = or_fallback(text(item, "dwdm"), Some(school.code.as_str()));

    Some(MajorRef {
        code: text(item, "zydm"),
        name: text(item, "zymc"),
        school_code,
        school_name: Some(school.name.clone()),
        degree_type: (!degree_type.is_empty()).then_some(degree_type),
        province: school.province.clone(),
    })
}

/// Normalizes one detail item into a record
///
/// Hierarchy fields the detail omits are filled from the parent major.
pub fn record_from_detail(item: &Value, major: &MajorRef) -> Option<Record> {
    let item = item.as_object()?;
    let keys = &DETAIL_KEYS;
    let province_name = major.province.as_ref().map(|p| p.name.as_str());

    Some(Record {
        school_name: or_fallback(text(item, keys.school_name), major.school_name.as_deref()),
        major_name: or_fallback(text(item, keys.major_name), Some(major.name.as_str())),
        province: match province_name {
            Some(name) => name.to_string(),
            None => text(item, keys.province),
        },
        major_code: or_fallback(text(item, keys.major_code), Some(major.code.as_str())),
        degree_type: match &major.degree_type {
            Some(degree) => degree.clone(),
            None => text(item, keys.degree_type),
        },
        exam_type: text(item, keys.exam_type),
        department: text(item, keys.department),
        study_mode: text(item, keys.study_mode),
        research_direction: text(item, keys.research_direction),
        veteran_program: text(item, keys.veteran_program),
        shaogu_program: text(item, keys.shaogu_program),
        advisor: text(item, keys.advisor),
        planned_enrollment: text(item, keys.planned_enrollment),
        exam_subject1: text(item, keys.exam_subjects[0]),
        exam_subject2: text(item, keys.exam_subjects[1]),
        exam_subject3: text(item, keys.exam_subjects[2]),
        exam_subject4: text(item, keys.exam_subjects[3]),
    })
}
