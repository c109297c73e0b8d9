//! Session state keys written and read by the built-in steps.
//!
//! | Key | Written by | Read by |
//! |---|---|---|
//! | `branch_name` | Initialize | Finalize |
//! | `started_at` | Initialize | - |
//! | `design_path` | GenerateComponentDesign, GenerateContextDesign | ValidateDesign, ReviseDesign, ExecuteReview, Finalize |
//! | `validation_errors` | ValidateDesign (error) | ReviseDesign |
//! | `validated_at` | ValidateDesign (ok) | - |
//! | `implementation_path` | GenerateImplementation | RunTests, Finalize, parent AggregateFinalize |
//! | `output_path` | GenerateTests | RunTests, FixTestFailures, Finalize, parent AggregateFinalize |
//! | `test_failures` | RunTests (error) | FixTestFailures |
//! | `tests_passed_at` | RunTests (ok) | - |
//! | `fix_attempts` | FixTestFailures | - |
//! | `child_sessions_completed` | SpawnComponentSessions | - |
//! | `review_path` | ExecuteReview | Finalize |
//! | `artifacts`, `committed_at` | Finalize, AggregateFinalize | - |
//! | `error` | any step on failure, cleared on success | - |

pub const BRANCH_NAME: &str = "branch_name";
pub const STARTED_AT: &str = "started_at";
pub const DESIGN_PATH: &str = "design_path";
pub const VALIDATION_ERRORS: &str = "validation_errors";
pub const VALIDATED_AT: &str = "validated_at";
pub const IMPLEMENTATION_PATH: &str = "implementation_path";
pub const OUTPUT_PATH: &str = "output_path";
pub const TEST_FAILURES: &str = "test_failures";
pub const TESTS_PASSED_AT: &str = "tests_passed_at";
pub const FIX_ATTEMPTS: &str = "fix_attempts";
pub const CHILD_SESSIONS_COMPLETED: &str = "child_sessions_completed";
pub const REVIEW_PATH: &str = "review_path";
pub const ARTIFACTS: &str = "artifacts";
pub const COMMITTED_AT: &str = "committed_at";
pub const ERROR: &str = "error";
