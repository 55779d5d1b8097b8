//! Fixed province table, grouped by the portal's two score regions
//!
//! The top-level traversal walks regions and their provinces in this order.

/// A score region and the provinces it contains
#[derive(Debug, Clone, Copy)]
pub struct Region {
    pub code: &'static str,
    pub name: &'static str,
    pub provinces: &'static [Province],
}

/// A province as the portal identifies it (`ssdm`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Province {
    pub code: &'static str,
    pub name: &'static str,
}

const fn p(code: &'static str, name: &'static str) -> Province {
    Province { code, name }
}

pub const REGIONS: &[Region] = &[
    Region {
        code: "1",
        name: "一区",
        provinces: &[
            p("11", "北京"),
            p("12", "天津"),
            p("13", "河北"),
            p("14", "山西"),
            p("21", "辽宁"),
            p("22", "吉林"),
            p("23", "黑龙江"),
            p("31", "上海"),
            p("32", "江苏"),
            p("33", "浙江"),
            p("34", "安徽"),
            p("35", "福建"),
            p("36", "江西"),
            p("37", "山东"),
            p("41", "河南"),
            p("42", "湖北"),
            p("43", "湖南"),
            p("44", "广东"),
            p("50", "重庆"),
            p("51", "四川"),
            p("61", "陕西"),
        ],
    },
    Region {
        code: "2",
        name: "二区",
        provinces: &[
            p("15", "内蒙"),
            p("45", "广西"),
            p("46", "海南"),
            p("52", "贵州"),
            p("53", "云南"),
            p("54", "西藏"),
            p("62", "甘肃"),
            p("63", "青海"),
            p("64", "宁夏"),
            p("65", "新疆"),
        ],
    },
];

/// All provinces in traversal order
pub fn all_provinces() -> impl Iterator<Item = &'static Province> {
    REGIONS.iter().flat_map(|region| region.provinces.iter())
}

/// Looks up a province by its display name
pub fn province_by_name(name: &str) -> Option<&'static Province> {
    all_provinces().find(|p| p.name == name)
}

/// Looks up a province by its portal code
pub fn province_by_code(code: &str) -> Option<&'static Province> {
    all_provinces().find(|p| p.code == code)
}
