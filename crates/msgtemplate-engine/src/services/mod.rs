pub mod call_site;
pub mod multiline;
pub mod structural;
#[cfg(feature = "cli")]
pub mod tracing_setup;
