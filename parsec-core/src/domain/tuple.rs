//! Positional result tuple used at the presentation boundary
//!
//! Layout: [0] id, [1] first name, [2] last name, [3] middle names,
//! [4] alias, [5] DOB as `YYYYMMDD`, [6] street address, [7] city,
//! [8] county, [9] state, [10] zip, [11]..=[18] reserved (always empty),
//! [19] SSN.

use serde::{Deserialize, Serialize};

use crate::domain::IdentityRecord;

pub const TUPLE_LEN: usize = 20;

/// Fixed 20-position result row
pub type ResultTuple = [String; TUPLE_LEN];

/// Map a record onto the positional contract
pub fn format_record(record: &IdentityRecord) -> ResultTuple {
    let opt = |v: &Option<String>| v.clone().unwrap_or_default();

    let mut tuple: ResultTuple = Default::default();
    tuple[0] = record.id.to_string();
    tuple[1] = record.first_name.clone();
    tuple[2] = record.last_name.clone();
    tuple[3] = opt(&record.middle_names);
    tuple[4] = opt(&record.aka);
    tuple[5] = record
        .dob
        .map(|d| d.format("%Y%m%d").to_string())
        .unwrap_or_default();
    tuple[6] = opt(&record.address);
    tuple[7] = opt(&record.city);
    tuple[8] = opt(&record.county);
    tuple[9] = opt(&record.state);
    tuple[10] = record.zip.clone();
    tuple[19] = opt(&record.ssn);
    tuple
}

/// Named view of a tuple, used when exporting results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_names: String,
    pub aka: String,
    pub dob: String,
    pub address: String,
    pub city: String,
    pub county: String,
    pub state: String,
    pub zip: String,
    pub ssn: String,
}

impl From<&ResultTuple> for ExportRow {
    fn from(t: &ResultTuple) -> Self {
        Self {
            id: t[0].clone(),
            first_name: t[1].clone(),
            last_name: t[2].clone(),
            middle_names: t[3].clone(),
            aka: t[4].clone(),
            dob: t[5].clone(),
            address: t[6].clone(),
            city: t[7].clone(),
            county: t[8].clone(),
            state: t[9].clone(),
            zip: t[10].clone(),
            ssn: t[19].clone(),
        }
    }
}
