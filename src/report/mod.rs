pub mod junit;

pub use junit::{CASE_NAME, JunitReport, TestCase, TestSuite};
