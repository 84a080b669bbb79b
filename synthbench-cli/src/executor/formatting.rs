//! Output Formatting
//!
//! Views over decoded result files, one sorted sample per test and element type:
//! - `human`: grouped tables for the terminal
//! - `json`: the same data as pretty JSON
//! - `csv`: one row per sample point
//!
//! A missing elapsed time (malformed timing line) shows as `-` in tables and as an
//! empty cell or `null` elsewhere.

use serde::Serialize;
use synthbench_core::ElementType;
use synthbench_record::{SamplePoint, TestResult};

/// Output format for `synthbench show`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ShowFormat {
    /// Terminal tables
    #[default]
    Human,
    /// Pretty-printed JSON
    Json,
    /// Comma-separated values
    Csv,
}

#[derive(Serialize)]
struct ResultView<'a> {
    series_name: &'a str,
    test_name: &'a str,
    function_name: &'a str,
    types: Vec<TypeView>,
}

#[derive(Serialize)]
struct TypeView {
    element_type: ElementType,
    sample: Vec<SamplePoint>,
}

fn view(result: &TestResult) -> ResultView<'_> {
    ResultView {
        series_name: &result.series_name,
        test_name: &result.test_name,
        function_name: &result.function_name,
        types: result
            .types()
            .map(|element_type| TypeView {
                element_type,
                sample: result.get_sorted_sample(element_type),
            })
            .collect(),
    }
}

fn seconds(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.6}", v))
}

/// Format results for human-readable terminal display
pub fn format_human_output(results: &[TestResult]) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str("Synthbench Results\n");
    output.push_str(&"=".repeat(60));
    output.push_str("\n\n");

    for result in results {
        output.push_str(&format!("Test: {} ({})", result.test_name, result.function_name));
        if !result.series_name.is_empty() {
            output.push_str(&format!(" [{}]", result.series_name));
        }
        output.push('\n');
        output.push_str(&"-".repeat(60));
        output.push('\n');

        for element_type in result.types() {
            output.push_str(&format!("  {}\n", element_type));
            output.push_str(&format!(
                "      {:>10}  {:>12}  {:>10}  {:>14}\n",
                "size", "elapsed (s)", "repeat", "per call (s)"
            ));
            for point in result.get_sorted_sample(element_type) {
                let per_call = point
                    .time_per_call()
                    .map_or_else(|| "-".to_string(), |v| format!("{:.3e}", v));
                output.push_str(&format!(
                    "      {:>10}  {:>12}  {:>10}  {:>14}\n",
                    point.size,
                    seconds(point.elapsed),
                    point.repeat_count,
                    per_call
                ));
            }
        }
        output.push('\n');
    }

    let failed: usize = results
        .iter()
        .flat_map(|r| r.data.iter())
        .flat_map(|series| series.cases.iter())
        .filter(|case| case.elapsed.is_none())
        .count();
    output.push_str(&format!("{} results", results.len()));
    if failed > 0 {
        output.push_str(&format!(", {} measurements failed", failed));
    }
    output.push('\n');

    output
}

/// Format results as pretty-printed JSON
pub fn format_json_output(results: &[TestResult]) -> serde_json::Result<String> {
    let views: Vec<ResultView<'_>> = results.iter().map(view).collect();
    serde_json::to_string_pretty(&views)
}

/// Format results as CSV, one row per sample point
pub fn format_csv_output(results: &[TestResult]) -> String {
    let mut output =
        String::from("series,test,function,type,size,repeat_count,elapsed_s,time_per_call_s\n");
    for result in results {
        for element_type in result.types() {
            for point in result.get_sorted_sample(element_type) {
                output.push_str(&format!(
                    "{},{},{},{},{},{},{},{}\n",
                    result.series_name,
                    result.test_name,
                    result.function_name,
                    element_type,
                    point.size,
                    point.repeat_count,
                    point.elapsed.map(|v| v.to_string()).unwrap_or_default(),
                    point
                        .time_per_call()
                        .map(|v| v.to_string())
                        .unwrap_or_default(),
                ));
            }
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use synthbench_record::CaseRecord;

    fn results() -> Vec<TestResult> {
        let mut add = TestResult::new("add", "idx_add").with_series("baseline");
        add.add_case(ElementType::UByte, CaseRecord::shaped(10, &[8], 0, Some(0.5)));
        add.add_case(ElementType::UByte, CaseRecord::shaped(20, &[4], 0, None));
        vec![add]
    }

    #[test]
    fn test_human_output() {
        let text = format_human_output(&results());
        assert!(text.contains("Test: add (idx_add) [baseline]"));
        assert!(text.contains("0.500000"));
        assert!(text.contains("1 results, 1 measurements failed"));
        // sorted by size
        let small = text.find("         4").unwrap();
        let large = text.find("         8").unwrap();
        assert!(small < large);
    }

    #[test]
    fn test_csv_output() {
        let text = format_csv_output(&results());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "baseline,add,idx_add,ubyte,4,20,,");
        assert_eq!(lines[2], "baseline,add,idx_add,ubyte,8,10,0.5,0.05");
    }

    #[test]
    fn test_json_output() {
        let text = format_json_output(&results()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value[0]["test_name"], "add");
        assert_eq!(value[0]["types"][0]["element_type"], "ubyte");
        assert_eq!(value[0]["types"][0]["sample"][0]["elapsed"], serde_json::Value::Null);
        assert_eq!(value[0]["types"][0]["sample"][1]["size"], 8);
    }
}
