/// Result Comparator - language-agnostic grading
///
/// **Normalization Rules:**
/// - Every whitespace character is removed (spaces, tabs, `\n`, `\r\n`, `\r`)
/// - Case sensitivity: YES
/// - Punctuation: preserved
///
/// So `[1, 2, 3]` matches `[1,2,3]`, and `a b` matches `ab`, but `Hello`
/// does not match `hello`.
use crate::runner::RunReport;
use judge_common::types::{ExecutionOutcome, OutcomeStatus, TestCase};

fn normalize_output(output: &str) -> String {
    output.chars().filter(|c| !c.is_whitespace()).collect()
}

pub fn compare(actual: &str, expected: &str) -> bool {
    normalize_output(actual) == normalize_output(expected)
}

/// Grade a finished run. Runs that did not complete never pass.
pub fn evaluate_run(test_case: &TestCase, report: &RunReport) -> ExecutionOutcome {
    let passed = report.completed() && compare(&report.output, &test_case.expected_output);
    outcome(test_case, report.output.clone(), passed)
}

/// A test case that failed before reaching the sandbox.
pub fn failed_outcome(test_case: &TestCase, detail: String) -> ExecutionOutcome {
    outcome(test_case, detail, false)
}

fn outcome(test_case: &TestCase, your_output: String, passed: bool) -> ExecutionOutcome {
    ExecutionOutcome {
        input: test_case.input.clone(),
        expected_output: test_case.expected_output.clone(),
        your_output,
        passed,
        status: if passed { OutcomeStatus::Passed } else { OutcomeStatus::Failed },
    }
}
