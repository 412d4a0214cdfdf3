// Mapper from parsed catalog rows to domain models
use crate::domain::case::{CaseId, CaseSummary, LabResult, Track};
use crate::infrastructure::csv_parser::ParsedRow;

fn case_id(row: &ParsedRow) -> Option<CaseId> {
    row.number("caseid")
        .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= CaseId::MAX as f64)
        .map(|n| n as CaseId)
}

/// Rows without a usable `caseid` are dropped.
pub fn rows_to_cases(rows: &[ParsedRow]) -> Vec<CaseSummary> {
    rows.iter()
        .filter_map(|row| {
            let mut case = CaseSummary::new(case_id(row)?, row.text("opname"), row.text("department"));
            case.operation_type = row.text("operation_type");
            case.complexity_score = row.number("complexity_score");
            Some(case)
        })
        .collect()
}

/// Tracks of `case` from a whole-table or already-filtered file.
pub fn rows_to_tracks(rows: &[ParsedRow], case: CaseId) -> Vec<Track> {
    rows.iter()
        .filter(|row| case_id(row) == Some(case))
        .filter_map(|row| {
            Some(Track {
                case_id: case,
                tid: row.text("tid")?,
                tname: row.text("tname")?,
            })
        })
        .collect()
}

/// Labs of `case`, ordered by `dt`.
pub fn rows_to_labs(rows: &[ParsedRow], case: CaseId) -> Vec<LabResult> {
    let mut labs: Vec<LabResult> = rows
        .iter()
        .filter(|row| case_id(row) == Some(case))
        .filter_map(|row| {
            Some(LabResult {
                case_id: case,
                dt: row.number("dt")?,
                name: row.text("name").unwrap_or_default(),
                result: row.text("result").unwrap_or_default(),
            })
        })
        .collect();
    labs.sort_by(|a, b| a.dt.total_cmp(&b.dt));
    labs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::csv_parser::parse_delimited;

    #[test]
    fn test_cases_with_defaults_and_processed_columns() {
        let rows = parse_delimited(
            "caseid,opname,department,operation_type,complexity_score\n\
             1,Lobectomy,Thoracic surgery,thoracic,72.5\n\
             2,,,,\n\
             x,bad,row,,\n",
        );
        let cases = rows_to_cases(&rows);
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].label(), "Case 1: Lobectomy");
        assert_eq!(cases[0].operation_type.as_deref(), Some("thoracic"));
        assert_eq!(cases[0].complexity_score, Some(72.5));
        assert_eq!(cases[1].opname, CaseSummary::UNKNOWN_OPERATION);
        assert_eq!(cases[1].department, CaseSummary::UNKNOWN_DEPARTMENT);
    }

    #[test]
    fn test_tracks_filtered_by_case() {
        let rows = parse_delimited(
            "caseid,tname,tid\n1,Solar8000/HR,aa11\n2,BIS/BIS,bb22\n1,SNUADC/ECG_II,cc33\n",
        );
        let tracks = rows_to_tracks(&rows, 1);
        let names: Vec<&str> = tracks.iter().map(|t| t.tname.as_str()).collect();
        assert_eq!(names, vec!["Solar8000/HR", "SNUADC/ECG_II"]);
    }

    #[test]
    fn test_numeric_tid_keeps_its_text() {
        let rows = parse_delimited("caseid,tname,tid\n4,BIS/BIS,12345\n");
        assert_eq!(rows_to_tracks(&rows, 4)[0].tid, "12345");
    }

    #[test]
    fn test_padded_and_exponent_tids_are_not_rewritten() {
        let rows = parse_delimited("caseid,tname,tid\n4,BIS/BIS,00123\n4,Solar8000/HR,12e3\n");
        let tids: Vec<String> = rows_to_tracks(&rows, 4).into_iter().map(|t| t.tid).collect();
        assert_eq!(tids, vec!["00123", "12e3"]);
    }

    #[test]
    fn test_labs_sorted_by_dt() {
        let rows = parse_delimited(
            "caseid,dt,name,result\n3,600,hb,12.1\n3,-120,hb,13.0\n4,0,na,140\n3,60,k,4.1\n",
        );
        let labs = rows_to_labs(&rows, 3);
        let times: Vec<f64> = labs.iter().map(|l| l.dt).collect();
        assert_eq!(times, vec![-120.0, 60.0, 600.0]);
        assert_eq!(labs[0].result, "13.0");
    }
}
