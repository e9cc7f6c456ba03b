//! Built-in initial fleet for seeding an empty store

use serde_json::json;

use crate::normalize::RawReport;

/// Reports of the initial fleet, in the upper-case shape of the export API
pub fn initial_fleet() -> Vec<RawReport> {
    [
        ("577193000", "21.209629", "-17.462400", "99", "181", "184", "0", "2025-11-03T15:40:31"),
        ("352005591", "43.393684", "-8.238202", "0", "194", "24", "1", "2025-11-03T15:37:43"),
        ("271002569", "28.017010", "-14.748518", "84", "100", "101", "0", "2025-11-03T15:40:31"),
        ("577138000", "36.779732", "3.065223", "0", "18", "274", "5", "2025-11-03T15:37:44"),
        ("305748000", "29.341734", "-14.981618", "77", "193", "196", "0", "2025-11-03T15:40:30"),
        ("314645000", "53.969105", "14.248827", "0", "222", "153", "1", "2025-11-03T15:38:41"),
        ("577212000", "5.306760", "-4.024919", "0", "47", "111", "5", "2025-11-03T15:38:08"),
        ("566090000", "14.674448", "-17.422186", "0", "20", "353", "5", "2025-11-03T15:39:09"),
        ("246199000", "13.907795", "-18.328714", "90", "174", "173", "0", "2025-11-03T15:40:28"),
        ("311000851", "51.455860", "3.725388", "1", "239", "350", "5", "2025-11-03T15:39:01"),
        ("314728000", "40.419159", "29.086246", "0", "125", "157", "5", "2025-11-03T15:37:31"),
    ]
    .into_iter()
    .map(|(mmsi, lat, lon, speed, heading, course, status, timestamp)| {
        json!({
            "MMSI": mmsi,
            "LAT": lat,
            "LON": lon,
            "SPEED": speed,
            "HEADING": heading,
            "COURSE": course,
            "STATUS": status,
            "TIMESTAMP": timestamp,
        })
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize_batch;

    #[test]
    fn initial_fleet_normalizes() {
        let batch = normalize_batch(&initial_fleet());
        assert_eq!(batch.reports.len(), 11);
        assert_eq!(batch.skipped, 0);
        assert_eq!(batch.reports[1].mmsi.as_str(), "352005591");
        assert_eq!(batch.reports[1].speed, Some(0));
    }
}
