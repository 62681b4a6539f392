pub mod fake_executor;
pub mod fixtures;
pub mod workbook;

pub use fake_executor::{
    BoundedRead, FakeExecutor, FakeExecutorStats, FakeMetadata, FakeQueryOutcome,
};
pub use workbook::{RecordingWorkbook, WorkbookRecord};

/// Route `log` output through the test harness. Safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
