/// NUnit-style report parsing
/// Accepts only `test-run > test-suite > test-suite > test-suite > test-case`
/// and reduces every case to pass (`result="Passed"`) or not.
use crate::config::types::{GraderError, Result, ResultMap};

const ROOT: &str = "test-run";
const SUITE: &str = "test-suite";
const CASE: &str = "test-case";
const SUITE_DEPTH: usize = 3;
const PASSED: &str = "Passed";

/// Parse report XML into a pass/fail map keyed by fully-qualified test name.
/// A case reported more than once passes only if every occurrence passed.
pub fn parse_report(text: &str) -> Result<ResultMap> {
    let doc = roxmltree::Document::parse(text)
        .map_err(|e| GraderError::MalformedReport(format!("invalid XML: {}", e)))?;

    let root = doc.root_element();
    if root.tag_name().name() != ROOT {
        return Err(GraderError::MalformedReport(format!(
            "root element is <{}>, expected <{}>",
            root.tag_name().name(),
            ROOT
        )));
    }

    let mut results = ResultMap::new();

    for case in root
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == CASE)
    {
        let chain: Vec<&str> = case
            .ancestors()
            .skip(1)
            .filter(|n| n.is_element())
            .map(|n| n.tag_name().name())
            .collect();
        let well_placed = chain.len() == SUITE_DEPTH + 1
            && chain[..SUITE_DEPTH].iter().all(|name| *name == SUITE)
            && chain[SUITE_DEPTH] == ROOT;
        if !well_placed {
            return Err(GraderError::MalformedReport(format!(
                "<{}> at line {} is not nested as {} > {} x{} > {}",
                CASE,
                doc.text_pos_at(case.range().start).row,
                ROOT,
                SUITE,
                SUITE_DEPTH,
                CASE
            )));
        }

        let fullname = case.attribute("fullname").ok_or_else(|| {
            GraderError::MalformedReport(format!(
                "<{}> at line {} has no fullname",
                CASE,
                doc.text_pos_at(case.range().start).row
            ))
        })?;
        let result = case.attribute("result").ok_or_else(|| {
            GraderError::MalformedReport(format!("test case {} has no result", fullname))
        })?;

        let passed = result == PASSED;
        results
            .entry(fullname.to_string())
            .and_modify(|p| *p &= passed)
            .or_insert(passed);
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(cases: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8" standalone="no"?>
<test-run id="0" testcasecount="3" result="Failed">
  <test-suite type="Assembly" name="AzureProjectTest.dll">
    <test-suite type="TestSuite" name="AzureProjectTest">
      <test-suite type="TestFixture" name="StorageAccountTest">
        {}
      </test-suite>
    </test-suite>
  </test-suite>
</test-run>"#,
            cases
        )
    }

    #[test]
    fn test_passed_failed_skipped() {
        let text = report(
            r#"<test-case fullname="N.C.A" result="Passed"/>
               <test-case fullname="N.C.B" result="Failed"><failure><message>no</message></failure></test-case>
               <test-case fullname="N.C.C" result="Skipped"/>"#,
        );
        let results = parse_report(&text).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results["N.C.A"], true);
        assert_eq!(results["N.C.B"], false);
        assert_eq!(results["N.C.C"], false);
    }

    #[test]
    fn test_other_statuses_are_false() {
        let text = report(
            r#"<test-case fullname="N.C.I" result="Inconclusive"/>
               <test-case fullname="N.C.W" result="Warning"/>
               <test-case fullname="N.C.L" result="passed"/>"#,
        );
        let results = parse_report(&text).unwrap();
        assert!(results.values().all(|passed| !passed));
    }

    #[test]
    fn test_zero_cases_is_empty_map() {
        assert!(parse_report(&report("")).unwrap().is_empty());
        assert!(parse_report("<test-run/>").unwrap().is_empty());
    }

    #[test]
    fn test_parse_is_pure() {
        let text = report(r#"<test-case fullname="N.C.A" result="Passed"/>"#);
        assert_eq!(parse_report(&text).unwrap(), parse_report(&text).unwrap());
    }

    #[test]
    fn test_repeated_case_passes_only_if_all_passed() {
        let text = report(
            r#"<test-case fullname="N.C.A" result="Passed"/>
               <test-case fullname="N.C.A" result="Failed"/>"#,
        );
        assert_eq!(parse_report(&text).unwrap()["N.C.A"], false);
    }

    #[test]
    fn test_rejects_invalid_xml() {
        assert!(matches!(
            parse_report("<test-run><test-suite>"),
            Err(GraderError::MalformedReport(_))
        ));
        assert!(matches!(
            parse_report(""),
            Err(GraderError::MalformedReport(_))
        ));
    }

    #[test]
    fn test_rejects_wrong_root() {
        assert!(matches!(
            parse_report("<testsuites><test-case fullname=\"a\" result=\"Passed\"/></testsuites>"),
            Err(GraderError::MalformedReport(_))
        ));
    }

    #[test]
    fn test_rejects_case_at_wrong_depth() {
        let shallow = r#"<test-run><test-suite><test-suite>
            <test-case fullname="N.C.A" result="Passed"/>
        </test-suite></test-suite></test-run>"#;
        assert!(matches!(
            parse_report(shallow),
            Err(GraderError::MalformedReport(_))
        ));

        let deep = report(r#"<test-suite><test-case fullname="N.C.A" result="Passed"/></test-suite>"#);
        assert!(matches!(
            parse_report(&deep),
            Err(GraderError::MalformedReport(_))
        ));
    }

    #[test]
    fn test_rejects_missing_attributes() {
        assert!(matches!(
            parse_report(&report(r#"<test-case result="Passed"/>"#)),
            Err(GraderError::MalformedReport(_))
        ));
        assert!(matches!(
            parse_report(&report(r#"<test-case fullname="N.C.A"/>"#)),
            Err(GraderError::MalformedReport(_))
        ));
    }
}
